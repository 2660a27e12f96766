//! Serial event bridge
//!
//! Reads controller lines, classifies them, gates them through the [`Debouncer`]
//! and hands applied events to the [`Dispatcher`]. Losing the serial port is
//! routine: the bridge waits a fixed delay and reconnects, forever.

pub mod debounce;
pub mod dispatch;

use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::config::{AppConfig, ConfigWatcher, SerialConfig};
use crate::protocol::{decode_line, ControllerEvent};
use crate::serial::SerialLink;
use crate::surface::CommandRunner;

pub use debounce::{DebounceSettings, Debouncer, Decision};
pub use dispatch::{Dispatcher, Outcome};

/// Lower bound for the pending-volume flush tick
const MIN_FLUSH_TICK: Duration = Duration::from_millis(10);

/// State owned by the bridge loop
pub struct SerialBridge {
    config: AppConfig,
    debouncer: Debouncer,
    dispatcher: Dispatcher,
    /// Command-line port, kept across config reloads
    port_override: Option<String>,
}

impl SerialBridge {
    pub fn new(config: AppConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            debouncer: Debouncer::new(DebounceSettings::from_config(&config)),
            dispatcher: Dispatcher::new(&config, runner),
            config,
            port_override: None,
        }
    }

    /// Pin the serial port regardless of what the config file says
    pub fn with_port_override(mut self, port: Option<String>) -> Self {
        if let Some(port) = &port {
            self.config.serial.port = port.clone();
        }
        self.port_override = port;
        self
    }

    /// Handle one raw line from the controller
    pub async fn handle_raw(&mut self, raw: &[u8], now: Instant) {
        let line = decode_line(raw);
        if line.is_empty() {
            return;
        }

        let Some(event) = ControllerEvent::parse(&line, self.config.volume.range) else {
            trace!("Ignoring line {:?}", line);
            return;
        };

        self.handle_event(event, now).await;
    }

    /// Gate and dispatch a classified event
    pub async fn handle_event(&mut self, event: ControllerEvent, now: Instant) {
        match self.debouncer.check(&event, now) {
            Decision::Apply => self.apply(event, now).await,
            Decision::Defer => debug!("{} deferred", event),
            Decision::Suppress => trace!("{} suppressed", event),
        }
    }

    /// Dispatch the pending volume target once its interval has elapsed
    pub async fn flush_pending(&mut self, now: Instant) {
        if let Some(value) = self.debouncer.take_due_volume(now) {
            self.apply(ControllerEvent::Volume(value), now).await;
        }
    }

    async fn apply(&mut self, event: ControllerEvent, now: Instant) {
        match self.dispatcher.dispatch(&event, now).await {
            Outcome::Issued => {
                debug!("✅ {}", event);
                self.debouncer.record(&event, now);
            }
            Outcome::Skipped(reason) => debug!("{} skipped: {}", event, reason),
            Outcome::Failed => {}
        }
    }

    /// Adopt a reloaded configuration without dropping the link
    pub fn apply_config(&mut self, mut config: AppConfig) {
        if let Some(port) = &self.port_override {
            config.serial.port = port.clone();
        }
        if config.serial.port != self.config.serial.port
            || config.serial.baud != self.config.serial.baud
        {
            info!("Serial settings changed; they apply on next reconnect");
        }
        self.debouncer.reconfigure(DebounceSettings::from_config(&config));
        self.dispatcher.reconfigure(&config);
        self.config = config;
    }

    fn flush_tick(&self) -> Duration {
        self.debouncer.settings().min_interval.max(MIN_FLUSH_TICK)
    }

    /// Run until `shutdown` resolves
    pub async fn run(
        self,
        watcher: Option<ConfigWatcher>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        self.run_with(watcher, shutdown, SerialLink::open).await
    }

    async fn run_with<F>(
        mut self,
        mut watcher: Option<ConfigWatcher>,
        shutdown: impl Future<Output = ()>,
        mut open: F,
    ) -> Result<()>
    where
        F: FnMut(&SerialConfig) -> Result<SerialLink>,
    {
        tokio::pin!(shutdown);

        loop {
            let serial = self.config.serial.clone();

            match open(&serial) {
                Ok(mut link) => {
                    let mut flush = tokio::time::interval(self.flush_tick());
                    flush.set_missed_tick_behavior(MissedTickBehavior::Delay);

                    let lost = loop {
                        tokio::select! {
                            line = link.next_line() => match line {
                                Some(raw) => self.handle_raw(&raw, Instant::now()).await,
                                None => break true,
                            },

                            _ = flush.tick() => self.flush_pending(Instant::now()).await,

                            Some(new_config) = next_config(&mut watcher) => {
                                info!("📝 Configuration file changed, reloading...");
                                self.apply_config(new_config);
                                flush = tokio::time::interval(self.flush_tick());
                                flush.set_missed_tick_behavior(MissedTickBehavior::Delay);
                            }

                            _ = &mut shutdown => break false,
                        }
                    };

                    if !lost {
                        info!("Shutdown signal received, closing {}", link.port_name());
                        return Ok(());
                    }
                    warn!("⚠️  Serial link {} lost", link.port_name());
                }
                Err(e) => {
                    warn!("⚠️  {:#}", e);
                }
            }

            let delay = serial.reconnect_delay();
            info!("Reconnecting in {}ms", delay.as_millis());

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = &mut shutdown => {
                    info!("Shutdown signal received while disconnected");
                    return Ok(());
                }
            }
        }
    }
}

async fn next_config(watcher: &mut Option<ConfigWatcher>) -> Option<AppConfig> {
    match watcher {
        Some(w) => w.next_config().await,
        None => std::future::pending().await,
    }
}
