//! Configuration hot-reload
//!
//! The directory holding the config file is watched rather than the file itself,
//! so editors that save by writing a temp file and renaming it over the original
//! keep being picked up. Bursts of filesystem events collapse into one reload.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::AppConfig;

/// Quiet period after the last event before the file is read
const SETTLE: Duration = Duration::from_millis(100);

/// Delivers a freshly loaded [`AppConfig`] each time the file changes
///
/// Invalid edits are logged and skipped; the consumer keeps its current config.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<AppConfig>,
}

impl ConfigWatcher {
    /// Watch an existing config file
    ///
    /// Must be called from inside a Tokio runtime.
    pub fn new(config_path: impl Into<PathBuf>) -> Result<Self> {
        let path = config_path.into();
        let dir = watch_dir(&path).to_path_buf();
        let file_name = path.file_name().map(OsStr::to_os_string);

        // notify calls back on its own thread; an unbounded send needs no runtime there
        let (touch_tx, touch_rx) = mpsc::unbounded_channel::<()>();
        let (config_tx, config_rx) = mpsc::channel(4);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) if touches(&event, file_name.as_deref()) => {
                    let _ = touch_tx.send(());
                }
                Ok(_) => {}
                Err(e) => warn!("Config watch error: {}", e),
            }
        })?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;

        tokio::spawn(reload_loop(path.clone(), touch_rx, config_tx));
        info!("👀 Watching {} for changes", path.display());

        Ok(Self {
            _watcher: watcher,
            rx: config_rx,
        })
    }

    /// Next successfully reloaded config; `None` once the watcher is gone
    pub async fn next_config(&mut self) -> Option<AppConfig> {
        self.rx.recv().await
    }
}

fn watch_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}

/// Whether `event` wrote to (or replaced) the watched file
fn touches(event: &Event, file_name: Option<&OsStr>) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
        && event.paths.iter().any(|p| p.file_name() == file_name)
}

async fn reload_loop(
    path: PathBuf,
    mut signals: mpsc::UnboundedReceiver<()>,
    tx: mpsc::Sender<AppConfig>,
) {
    while signals.recv().await.is_some() {
        tokio::time::sleep(SETTLE).await;
        while signals.try_recv().is_ok() {}

        match AppConfig::load(&path).await {
            Ok(config) => {
                debug!("Reloaded {}", path.display());
                if tx.send(config).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!("⚠️  Ignoring config change: {:#}", e),
        }
    }
}
