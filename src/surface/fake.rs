//! Scripted command runner for tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

use super::{CommandRunner, SurfaceError, SurfaceResult};

/// Records every invocation and answers queries from a script
///
/// Responses are keyed by the full command line (`"wpctl get-volume 83"`).
/// Unscripted queries fail as if the tool had exited non-zero.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<String>>,
    spawned: Mutex<Vec<String>>,
    missing: Mutex<HashSet<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, command_line: &str, stdout: &str) {
        self.responses
            .lock()
            .insert(command_line.to_string(), stdout.to_string());
    }

    pub fn mark_missing(&self, program: &str) {
        self.missing.lock().insert(program.to_string());
    }

    /// Query command lines, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Fire-and-forget command lines, in order
    pub fn spawned(&self) -> Vec<String> {
        self.spawned.lock().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn line(program: &str, args: &[String]) -> String {
        std::iter::once(program.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn output(&self, program: &str, args: &[String]) -> SurfaceResult<String> {
        let line = Self::line(program, args);
        self.calls.lock().push(line.clone());

        if self.missing.lock().contains(program) {
            return Err(SurfaceError::NotFound(program.to_string()));
        }

        self.responses
            .lock()
            .get(&line)
            .cloned()
            .ok_or_else(|| SurfaceError::Failed {
                program: program.to_string(),
                status: "exit status: 1".to_string(),
            })
    }

    fn spawn(&self, program: &str, args: &[String]) -> SurfaceResult<()> {
        if self.missing.lock().contains(program) {
            return Err(SurfaceError::NotFound(program.to_string()));
        }
        self.spawned.lock().push(Self::line(program, args));
        Ok(())
    }

    fn is_available(&self, program: &str) -> bool {
        !self.missing.lock().contains(program)
    }
}
