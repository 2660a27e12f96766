//! Target application stream resolution with a freshness window
//!
//! Listing the mixer status is far more expensive than a single volume call, so a
//! resolved handle is reused until its deadline passes. After that it is resolved
//! again on next use, whether or not the old stream still exists. A failed lookup
//! is not cached: the next use queries the mixer again.

use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::StreamConfig;
use crate::surface::mixer::{find_stream, Mixer};

/// Time-bounded identifier of the target application's audio stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHandle {
    pub id: u32,
    resolved_at: Instant,
}

impl StreamHandle {
    fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.resolved_at) <= ttl
    }
}

/// Shared resolver used by both the serial bridge and the display
#[derive(Debug, Clone)]
pub struct StreamResolver {
    targets: Vec<String>,
    ttl: Duration,
    cached: Option<StreamHandle>,
}

impl StreamResolver {
    pub fn new(targets: Vec<String>, ttl: Duration) -> Self {
        Self {
            targets,
            ttl,
            cached: None,
        }
    }

    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new(
            config.targets.clone(),
            Duration::from_millis(config.refresh_ms),
        )
    }

    /// Replace targets and window; drops the cached handle when targets change
    pub fn reconfigure(&mut self, config: &StreamConfig) {
        if self.targets != config.targets {
            self.cached = None;
        }
        self.targets = config.targets.clone();
        self.ttl = Duration::from_millis(config.refresh_ms);
    }

    /// Cached handle, if it is still within its freshness window
    pub fn cached(&self, now: Instant) -> Option<StreamHandle> {
        self.cached.filter(|h| h.is_fresh(now, self.ttl))
    }

    /// Resolve the target stream, reusing a fresh cached handle
    ///
    /// `None` means the application has no active stream right now.
    pub async fn resolve(&mut self, mixer: &Mixer, now: Instant) -> Option<StreamHandle> {
        if let Some(handle) = self.cached(now) {
            return Some(handle);
        }

        let streams = mixer.streams().await;
        let handle = find_stream(&streams, &self.targets).map(|id| StreamHandle {
            id,
            resolved_at: now,
        });

        match handle {
            Some(h) if self.cached.map(|c| c.id) != Some(h.id) => {
                debug!("Resolved target stream {} for {:?}", h.id, self.targets);
            }
            None if self.cached.is_some() => {
                debug!("Target stream for {:?} disappeared", self.targets);
            }
            _ => {}
        }

        self.cached = handle;
        handle
    }

    /// Forget the cached handle
    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}
