//! Debounce and deadband gating for controller events
//!
//! Volume changes need both a minimum magnitude (deadband) and a minimum spacing
//! (interval). A change that clears the deadband but arrives too soon is not
//! queued: it becomes the pending target and is replaced by any newer one, so the
//! value finally applied once the interval elapses is the latest knob position.
//!
//! Discrete actions (needle/transport, button) only need a minimum spacing per
//! category; categories never block each other.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::AppConfig;
use crate::protocol::{ActionCategory, ControllerEvent};

/// Gate outcome for one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Dispatch now
    Apply,
    /// Volume held as the pending target until the interval elapses
    Defer,
    /// Drop
    Suppress,
}

/// Timing limits applied by the [`Debouncer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceSettings {
    pub deadband: u16,
    pub min_interval: Duration,
    pub transport: Duration,
    pub button: Duration,
}

impl DebounceSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            deadband: config.volume.deadband,
            min_interval: Duration::from_millis(config.volume.min_interval_ms),
            transport: Duration::from_millis(config.debounce.transport_ms),
            button: Duration::from_millis(config.debounce.button_ms),
        }
    }

    fn window(&self, category: ActionCategory) -> Duration {
        match category {
            ActionCategory::Volume => self.min_interval,
            ActionCategory::Transport => self.transport,
            ActionCategory::Button => self.button,
        }
    }
}

/// Last applied volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AppliedVolume {
    value: u16,
    at: Instant,
}

/// What has actually been dispatched, per category
///
/// Only [`Debouncer::record`] writes here, after a command was issued.
#[derive(Debug, Default)]
struct DebounceState {
    volume: Option<AppliedVolume>,
    last_action: HashMap<ActionCategory, Instant>,
}

/// Per-category debounce gate owned by the serial bridge loop
#[derive(Debug)]
pub struct Debouncer {
    settings: DebounceSettings,
    state: DebounceState,
    pending_volume: Option<u16>,
}

impl Debouncer {
    pub fn new(settings: DebounceSettings) -> Self {
        Self {
            settings,
            state: DebounceState::default(),
            pending_volume: None,
        }
    }

    pub fn settings(&self) -> DebounceSettings {
        self.settings
    }

    /// Swap timing limits, keeping history
    pub fn reconfigure(&mut self, settings: DebounceSettings) {
        self.settings = settings;
    }

    /// Decide whether `event` should be dispatched at `now`
    pub fn check(&mut self, event: &ControllerEvent, now: Instant) -> Decision {
        match event {
            ControllerEvent::Volume(value) => self.check_volume(*value, now),
            other => {
                let category = other.category();
                match self.state.last_action.get(&category) {
                    Some(last) if now.saturating_duration_since(*last) < self.settings.window(category) => {
                        Decision::Suppress
                    }
                    _ => Decision::Apply,
                }
            }
        }
    }

    fn check_volume(&mut self, value: u16, now: Instant) -> Decision {
        let Some(last) = self.state.volume else {
            // No baseline yet
            self.pending_volume = None;
            return Decision::Apply;
        };

        if value.abs_diff(last.value) < self.settings.deadband {
            // Knob came back near the applied value; nothing left to catch up on
            self.pending_volume = None;
            return Decision::Suppress;
        }

        if now.saturating_duration_since(last.at) >= self.settings.min_interval {
            // The new value supersedes anything held back, whether or not it gets issued
            self.pending_volume = None;
            Decision::Apply
        } else {
            self.pending_volume = Some(value);
            Decision::Defer
        }
    }

    /// Record a dispatched event
    pub fn record(&mut self, event: &ControllerEvent, now: Instant) {
        let category = event.category();
        let at = self
            .state
            .last_action
            .get(&category)
            .map_or(now, |last| (*last).max(now));
        self.state.last_action.insert(category, at);

        if let ControllerEvent::Volume(value) = event {
            self.state.volume = Some(AppliedVolume { value: *value, at });
            self.pending_volume = None;
        }
    }

    /// Pending volume target whose interval has elapsed
    pub fn take_due_volume(&mut self, now: Instant) -> Option<u16> {
        let last = self.state.volume?;
        if now.saturating_duration_since(last.at) >= self.settings.min_interval {
            self.pending_volume.take()
        } else {
            None
        }
    }

    #[cfg(test)]
    pub fn has_pending_volume(&self) -> bool {
        self.pending_volume.is_some()
    }

    #[cfg(test)]
    pub fn last_applied_volume(&self) -> Option<u16> {
        self.state.volume.map(|v| v.value)
    }
}
