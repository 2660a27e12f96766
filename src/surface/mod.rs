//! External command surfaces (playerctl, wpctl, helper scripts)
//!
//! Every integration goes through a [`CommandRunner`]. Query commands return their
//! captured stdout; fire-and-forget commands return as soon as the child is spawned.
//! Callers are allowed to ignore both results: errors are observed (logged) but
//! not acted upon, and the next event or poll naturally retries.

pub mod media;
pub mod mixer;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, trace};

pub use media::MediaControl;
pub use mixer::Mixer;

/// Failure of an external command
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("command not found: {0}")]
    NotFound(String),
    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },
    #[error("{program} exited with {status}")]
    Failed { program: String, status: String },
    #[error("{program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

pub type SurfaceResult<T> = std::result::Result<T, SurfaceError>;

/// Runs external programs on behalf of the surfaces
///
/// Note: all methods take &self so a runner can be shared behind `Arc<dyn CommandRunner>`.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a program to completion and return its trimmed stdout
    async fn output(&self, program: &str, args: &[String]) -> SurfaceResult<String>;

    /// Start a program without waiting for it
    fn spawn(&self, program: &str, args: &[String]) -> SurfaceResult<()>;

    /// Whether a program can be launched at all
    fn is_available(&self, program: &str) -> bool;
}

/// Runs real subprocesses with a per-command timeout
#[derive(Debug, Clone)]
pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

fn io_error(program: &str, source: std::io::Error) -> SurfaceError {
    if source.kind() == std::io::ErrorKind::NotFound {
        SurfaceError::NotFound(program.to_string())
    } else {
        SurfaceError::Io {
            program: program.to_string(),
            source,
        }
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn output(&self, program: &str, args: &[String]) -> SurfaceResult<String> {
        trace!("exec {} {:?}", program, args);

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| SurfaceError::Timeout {
                program: program.to_string(),
                timeout: self.timeout,
            })?
            .map_err(|e| io_error(program, e))?;

        if !output.status.success() {
            return Err(SurfaceError::Failed {
                program: program.to_string(),
                status: output.status.to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn spawn(&self, program: &str, args: &[String]) -> SurfaceResult<()> {
        trace!("spawn {} {:?}", program, args);

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| io_error(program, e))?;

        // Reap the child in the background so it never lingers as a zombie
        let program = program.to_string();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if !status.success() => {
                    debug!("{} exited with {}", program, status);
                }
                Ok(_) => {}
                Err(e) => debug!("Failed to wait for {}: {}", program, e),
            }
        });

        Ok(())
    }

    fn is_available(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// Turn a list of string slices into owned arguments
pub(crate) fn args<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
