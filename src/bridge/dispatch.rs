//! Controller event -> external command translation

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::{expand_home, AppConfig};
use crate::protocol::{ButtonPress, ControllerEvent, NeedleState, TransportCommand};
use crate::resolver::StreamResolver;
use crate::surface::media::{MediaControl, PlayerVerb};
use crate::surface::mixer::{Mixer, VolumeTarget};
use crate::surface::{CommandRunner, SurfaceResult};
use crate::volume::VolumeMapping;

/// Result of handing one event to the command surfaces
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A command was started
    Issued,
    /// Nothing to do (no target stream, no hook configured)
    Skipped(&'static str),
    /// The command could not be started
    Failed,
}

/// Issues exactly one external command per applied event
pub struct Dispatcher {
    runner: Arc<dyn CommandRunner>,
    media: MediaControl,
    mixer: Mixer,
    resolver: StreamResolver,
    mapping: VolumeMapping,
    fallback_to_default_sink: bool,
    /// Last time the target stream could not be found
    last_miss: Option<Instant>,
    /// Minimum gap between lookups after a miss
    miss_holdoff: Duration,
    short_press: Option<PathBuf>,
    long_press: Option<PathBuf>,
}

impl Dispatcher {
    pub fn new(config: &AppConfig, runner: Arc<dyn CommandRunner>) -> Self {
        let helper = config.hooks.play_pause.as_deref().map(expand_home);
        Self {
            media: MediaControl::new(runner.clone(), helper),
            mixer: Mixer::new(runner.clone()),
            runner,
            resolver: StreamResolver::from_config(&config.stream),
            mapping: VolumeMapping::from_config(&config.volume),
            fallback_to_default_sink: config.volume.fallback_to_default_sink,
            last_miss: None,
            miss_holdoff: Duration::from_millis(config.volume.min_interval_ms),
            short_press: config.hooks.short_press.as_deref().map(expand_home),
            long_press: config.hooks.long_press.as_deref().map(expand_home),
        }
    }

    /// Apply reloaded settings; the stream handle survives unless targets changed
    pub fn reconfigure(&mut self, config: &AppConfig) {
        let helper = config.hooks.play_pause.as_deref().map(expand_home);
        self.media = MediaControl::new(self.runner.clone(), helper);
        self.resolver.reconfigure(&config.stream);
        self.mapping = VolumeMapping::from_config(&config.volume);
        self.fallback_to_default_sink = config.volume.fallback_to_default_sink;
        self.miss_holdoff = Duration::from_millis(config.volume.min_interval_ms);
        self.last_miss = None;
        self.short_press = config.hooks.short_press.as_deref().map(expand_home);
        self.long_press = config.hooks.long_press.as_deref().map(expand_home);
    }

    pub async fn dispatch(&mut self, event: &ControllerEvent, now: Instant) -> Outcome {
        match event {
            ControllerEvent::Volume(percent) => self.set_volume(*percent, now).await,
            ControllerEvent::Needle(NeedleState::Down)
            | ControllerEvent::Transport(TransportCommand::Play) => {
                observe("play", self.media.transport(None, PlayerVerb::Play))
            }
            ControllerEvent::Needle(NeedleState::Up)
            | ControllerEvent::Transport(TransportCommand::Pause) => {
                observe("pause", self.media.transport(None, PlayerVerb::Pause))
            }
            ControllerEvent::Transport(TransportCommand::Toggle) => {
                observe("play-pause", self.media.smart_play_pause())
            }
            ControllerEvent::Button(press) => self.run_hook(*press),
        }
    }

    /// Target stream, without listing the mixer again right after a miss
    async fn resolve_stream(&mut self, now: Instant) -> Option<u32> {
        let recently_missed = self
            .last_miss
            .is_some_and(|at| now.saturating_duration_since(at) < self.miss_holdoff);
        if recently_missed {
            return None;
        }

        let handle = self.resolver.resolve(&self.mixer, now).await;
        self.last_miss = if handle.is_none() { Some(now) } else { None };
        handle.map(|h| h.id)
    }

    async fn set_volume(&mut self, percent: u16, now: Instant) -> Outcome {
        let target = match self.resolve_stream(now).await {
            Some(id) => VolumeTarget::Stream(id),
            None if self.fallback_to_default_sink => VolumeTarget::DefaultSink,
            None => {
                debug!("No active target stream, dropping volume {}%", percent);
                return Outcome::Skipped("no target stream");
            }
        };

        let fraction = self.mapping.format(percent);
        debug!("🔊 Volume {}% -> {:?} = {}", percent, target, fraction);
        observe("set-volume", self.mixer.set_volume(target, &fraction))
    }

    fn run_hook(&self, press: ButtonPress) -> Outcome {
        let hook = match press {
            ButtonPress::Short => &self.short_press,
            ButtonPress::Long => &self.long_press,
        };

        let Some(path) = hook else {
            return Outcome::Skipped("no hook configured");
        };

        info!("🔘 {:?} press -> {}", press, path.display());
        observe("button hook", self.runner.spawn(&path.to_string_lossy(), &[]))
    }
}

/// Errors are observed but not acted upon
fn observe(what: &str, result: SurfaceResult<()>) -> Outcome {
    match result {
        Ok(()) => Outcome::Issued,
        Err(e) => {
            warn!("{} not issued: {}", what, e);
            Outcome::Failed
        }
    }
}
