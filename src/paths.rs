//! Application path resolution.
//!
//! ## Lookup order
//!
//! 1. An explicit `--config` path always wins.
//! 2. **Dev mode** (debug builds only): `config.yaml` in the current working
//!    directory, so `cargo run` picks up the project's file.
//! 3. **Installed mode**: `<config_dir>/vinyl-gw/config.yaml`
//!    (`~/.config/vinyl-gw` on Linux).
//!
//! A config path that does not exist is fine; the defaults apply.

use std::path::{Path, PathBuf};

/// Directory name under the platform config dir
const APP_NAME: &str = "vinyl-gw";

/// Application paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    /// Path to the configuration file
    pub config: PathBuf,
}

impl AppPaths {
    /// Resolve paths for this process.
    ///
    /// Called before logging is initialized, so diagnostics go to stderr.
    pub fn detect(explicit_config: Option<&Path>) -> Self {
        if let Some(config) = explicit_config {
            return Self {
                config: config.to_path_buf(),
            };
        }

        #[cfg(debug_assertions)]
        {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            let cwd_config = cwd.join("config.yaml");
            if cwd_config.exists() {
                eprintln!(
                    "[paths] Running in DEV mode (config.yaml found in cwd: {})",
                    cwd.display()
                );
                return Self { config: cwd_config };
            }
        }

        Self::installed(dirs::config_dir())
    }

    fn installed(config_dir: Option<PathBuf>) -> Self {
        let base = config_dir
            .unwrap_or_else(|| {
                eprintln!("[paths] WARNING: no config directory, falling back to cwd");
                PathBuf::from(".")
            })
            .join(APP_NAME);

        Self {
            config: base.join("config.yaml"),
        }
    }

    /// Directory holding the config file
    pub fn base_dir(&self) -> PathBuf {
        self.config
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Resolve a path from the config file; relative paths are relative to its directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir().join(path)
        }
    }
}
