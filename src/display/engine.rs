//! Frame-driven refresh scheduler for the now-playing display
//!
//! Every frame the engine drains finished queries, starts the ones that are due,
//! and advances animations. Queries run as tokio tasks so a slow player never
//! stalls rendering; their results come back over a channel and are applied at
//! the start of the next frame.
//!
//! Each refresh class (players, playback, volume) has at most one query in
//! flight. Playback results carry the player generation they were issued for;
//! results for a player that is no longer selected are dropped.

use anyhow::Result;
use crossbeam::channel::{unbounded, Receiver, Sender};
use egui::ColorImage;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use super::artwork::ArtworkLoader;
use super::overlay::{OverlayTimings, VolumeOverlay};
use super::reconcile::{ArtworkChange, PlaybackReconciler};
use crate::config::{expand_home, AppConfig};
use crate::resolver::StreamResolver;
use crate::surface::media::{pick_player, MediaControl, PlaybackSnapshot, PlayerVerb};
use crate::surface::mixer::{Mixer, VolumeReading};
use crate::surface::{CommandRunner, SurfaceResult};
use crate::volume::fraction_to_percent;

/// A finished background query
pub enum PollResult {
    Players(Vec<String>),
    Playback {
        generation: u64,
        snapshot: Option<PlaybackSnapshot>,
        observed_at: Instant,
    },
    /// The resolver travels with the query and comes back with its result
    Volume {
        resolver: StreamResolver,
        reading: Option<VolumeReading>,
        observed_at: Instant,
    },
    Artwork {
        reference: String,
        image: Option<ColorImage>,
    },
}

/// Interval gate plus in-flight flag for one refresh class
#[derive(Debug, Clone, Copy)]
struct PollTimer {
    interval: Duration,
    last_started: Option<Instant>,
    in_flight: bool,
}

impl PollTimer {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_started: None,
            in_flight: false,
        }
    }

    fn is_due(&self, now: Instant) -> bool {
        !self.in_flight
            && self
                .last_started
                .map_or(true, |t| now.saturating_duration_since(t) >= self.interval)
    }

    fn start(&mut self, now: Instant) {
        self.in_flight = true;
        self.last_started = Some(now);
    }

    fn finish(&mut self) {
        self.in_flight = false;
    }

    /// Make the next check due immediately
    fn expedite(&mut self) {
        self.last_started = None;
    }
}

/// Everything the renderer needs for one frame
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub snapshot: Option<&'a PlaybackSnapshot>,
    pub position: f64,
    pub progress: Option<f32>,
    pub playing: bool,
    /// Disc rotation in degrees
    pub angle: f32,
    pub overlay_alpha: u8,
    pub overlay_value: f64,
    pub overlay_max: f64,
    pub muted: bool,
}

pub struct DisplayEngine {
    runtime: Handle,
    media: MediaControl,
    mixer: Mixer,
    artwork: ArtworkLoader,
    preferred_players: Vec<String>,

    player: Option<String>,
    generation: u64,
    players_timer: PollTimer,
    playback_timer: PollTimer,
    volume_timer: PollTimer,
    volume_enabled: bool,
    /// `None` while a volume query owns it
    resolver: Option<StreamResolver>,

    reconciler: PlaybackReconciler,
    overlay: VolumeOverlay,
    overlay_max: f64,
    degrees_per_second: f32,
    angle: f32,
    artwork_update: Option<Option<ColorImage>>,

    tx: Sender<PollResult>,
    rx: Receiver<PollResult>,
}

impl DisplayEngine {
    pub fn new(
        config: &AppConfig,
        runner: Arc<dyn CommandRunner>,
        runtime: Handle,
        volume_enabled: bool,
    ) -> Result<Self> {
        let display = &config.display;
        let helper = config.hooks.play_pause.as_deref().map(expand_home);
        let (tx, rx) = unbounded();

        Ok(Self {
            runtime,
            media: MediaControl::new(runner.clone(), helper),
            mixer: Mixer::new(runner),
            artwork: ArtworkLoader::new(
                display.size.max(1),
                Duration::from_millis(display.artwork_timeout_ms),
            )?,
            preferred_players: config.media.preferred_players.clone(),

            player: None,
            generation: 0,
            players_timer: PollTimer::new(Duration::from_millis(config.media.player_check_ms)),
            playback_timer: PollTimer::new(Duration::from_millis(config.media.poll_ms)),
            volume_timer: PollTimer::new(Duration::from_millis(display.volume_poll_ms)),
            volume_enabled,
            resolver: Some(StreamResolver::from_config(&config.stream)),

            reconciler: PlaybackReconciler::new(),
            overlay: VolumeOverlay::new(OverlayTimings::from_config(&display.overlay)),
            overlay_max: f64::from(config.volume.range.max_percent()),
            degrees_per_second: display.angle_speed * display.fps as f32,
            angle: 0.0,
            artwork_update: None,

            tx,
            rx,
        })
    }

    /// Advance one frame: apply results, start due queries, animate
    pub fn frame(&mut self, now: Instant, dt: f64) {
        while let Ok(result) = self.rx.try_recv() {
            self.handle_result(result);
        }

        self.schedule(now);

        self.overlay.tick(dt);
        if self.reconciler.is_playing() {
            self.angle = (self.angle + self.degrees_per_second * dt as f32).rem_euclid(360.0);
        }
    }

    fn handle_result(&mut self, result: PollResult) {
        match result {
            PollResult::Players(players) => {
                self.players_timer.finish();
                let picked = pick_player(&players, &self.preferred_players);
                if picked != self.player {
                    self.select_player(picked);
                }
            }

            PollResult::Playback {
                generation,
                snapshot,
                observed_at,
            } => {
                self.playback_timer.finish();
                if generation != self.generation {
                    debug!("Dropping playback result for an old player");
                    return;
                }
                match self.reconciler.apply(snapshot, observed_at) {
                    ArtworkChange::Unchanged => {}
                    ArtworkChange::Cleared => self.artwork_update = Some(None),
                    ArtworkChange::Fetch(reference) => self.fetch_artwork(reference),
                }
            }

            PollResult::Volume {
                resolver,
                reading,
                observed_at,
            } => {
                self.volume_timer.finish();
                self.resolver = Some(resolver);
                if let Some(reading) = reading {
                    let percent = f64::from(fraction_to_percent(reading.fraction));
                    self.overlay.observe(percent, reading.muted, observed_at);
                }
            }

            PollResult::Artwork { reference, image } => {
                if reference == self.reconciler.art_reference() {
                    self.artwork_update = Some(image);
                } else {
                    debug!("Dropping artwork for {}", reference);
                }
            }
        }
    }

    fn select_player(&mut self, player: Option<String>) {
        match &player {
            Some(name) => info!("🎵 Following player {}", name),
            None => info!("No media player available"),
        }
        self.player = player;
        self.generation += 1;
        self.reconciler.reset();
        self.artwork_update = Some(None);
        self.playback_timer.expedite();
    }

    fn schedule(&mut self, now: Instant) {
        if self.players_timer.is_due(now) {
            self.players_timer.start(now);
            let media = self.media.clone();
            let tx = self.tx.clone();
            self.runtime.spawn(async move {
                let players = media.list_players().await;
                let _ = tx.send(PollResult::Players(players));
            });
        }

        if let Some(player) = self.player.clone() {
            if self.playback_timer.is_due(now) {
                self.playback_timer.start(now);
                let media = self.media.clone();
                let tx = self.tx.clone();
                let generation = self.generation;
                self.runtime.spawn(async move {
                    let snapshot = media.snapshot(&player).await;
                    let _ = tx.send(PollResult::Playback {
                        generation,
                        snapshot,
                        observed_at: Instant::now(),
                    });
                });
            }
        }

        if self.volume_enabled && self.volume_timer.is_due(now) {
            if let Some(mut resolver) = self.resolver.take() {
                self.volume_timer.start(now);
                let mixer = self.mixer.clone();
                let tx = self.tx.clone();
                self.runtime.spawn(async move {
                    let reading = match resolver.resolve(&mixer, Instant::now()).await {
                        Some(handle) => {
                            let reading = mixer.get_volume(handle.id).await;
                            if reading.is_none() {
                                resolver.invalidate();
                            }
                            reading
                        }
                        None => None,
                    };
                    let _ = tx.send(PollResult::Volume {
                        resolver,
                        reading,
                        observed_at: Instant::now(),
                    });
                });
            }
        }
    }

    fn fetch_artwork(&mut self, reference: String) {
        let loader = self.artwork.clone();
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let image = loader.load(&reference).await;
            let _ = tx.send(PollResult::Artwork { reference, image });
        });
    }

    /// Artwork to upload, if it changed since the last call (`Some(None)` clears it)
    pub fn take_artwork_update(&mut self) -> Option<Option<ColorImage>> {
        self.artwork_update.take()
    }

    pub fn view(&self, now: Instant) -> FrameView<'_> {
        FrameView {
            snapshot: self.reconciler.snapshot(),
            position: self.reconciler.displayed_position(now),
            progress: self.reconciler.progress(now),
            playing: self.reconciler.is_playing(),
            angle: self.angle,
            overlay_alpha: self.overlay.alpha(now),
            overlay_value: self.overlay.displayed(),
            overlay_max: self.overlay_max,
            muted: self.overlay.muted(),
        }
    }

    pub fn player(&self) -> Option<&str> {
        self.player.as_deref()
    }

    pub fn previous(&self) {
        report("previous", self.media.transport(self.player(), PlayerVerb::Previous));
    }

    pub fn next(&self) {
        report("next", self.media.transport(self.player(), PlayerVerb::Next));
    }

    pub fn play_pause(&self) {
        report("play-pause", self.media.smart_play_pause());
    }

    /// Seek to a fraction of the current track
    pub fn seek_fraction(&mut self, fraction: f32, now: Instant) {
        let Some(duration) = self.reconciler.snapshot().and_then(|s| s.duration) else {
            return;
        };
        let target = duration * f64::from(fraction.clamp(0.0, 1.0));
        report("seek", self.media.seek(self.player.as_deref(), target));
        self.reconciler.seek_to(target, now);
    }
}

fn report(what: &str, result: SurfaceResult<()>) {
    if let Err(e) = result {
        warn!("{} not issued: {}", what, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::fake::ScriptedRunner;

    const STATUS: &str = "Audio\n └─ Streams:\n        83. Chromium\n";

    fn script_player(runner: &ScriptedRunner, player: &str, status: &str) {
        let p = format!("playerctl -p {}", player);
        runner.respond(&format!("{} status", p), status);
        runner.respond(&format!("{} metadata xesam:title", p), "Freddie Freeloader");
        runner.respond(&format!("{} metadata xesam:artist", p), "Miles Davis");
        runner.respond(&format!("{} position", p), "30.0");
        runner.respond(&format!("{} metadata mpris:length", p), "120000000");
    }

    fn engine(runner: &Arc<ScriptedRunner>) -> DisplayEngine {
        let mut config = AppConfig::default();
        config.hooks.play_pause = None;
        DisplayEngine::new(&config, runner.clone(), Handle::current(), true).unwrap()
    }

    /// Let spawned queries finish, then run a frame
    async fn settle(engine: &mut DisplayEngine, now: Instant) {
        tokio::time::sleep(Duration::from_millis(50)).await;
        engine.frame(now, 0.0);
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[tokio::test]
    async fn test_follows_preferred_player_and_shows_snapshot() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.respond("playerctl -l", "spotify\nchromium.instance9\n");
        script_player(&runner, "chromium.instance9", "Playing");
        let mut engine = engine(&runner);
        let t0 = Instant::now();

        engine.frame(t0, 0.0);
        settle(&mut engine, t0).await;
        assert_eq!(engine.player(), Some("chromium.instance9"));

        settle(&mut engine, t0).await;
        let view = engine.view(t0);
        let snap = view.snapshot.unwrap();
        assert_eq!(snap.title, "Freddie Freeloader");
        assert!(view.playing);
        assert_eq!(snap.duration, Some(120.0));
    }

    #[tokio::test]
    async fn test_one_query_in_flight_per_class() {
        let runner = Arc::new(ScriptedRunner::new());
        let mut engine = engine(&runner);
        let t0 = Instant::now();

        engine.frame(t0, 0.0);
        engine.frame(t0 + secs(5), 0.0);
        engine.frame(t0 + secs(10), 0.0);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(runner.count_calls("playerctl -l"), 1);
        assert_eq!(runner.count_calls("wpctl status"), 1);
    }

    #[tokio::test]
    async fn test_stale_generation_discarded() {
        let runner = Arc::new(ScriptedRunner::new());
        let mut engine = engine(&runner);
        let now = Instant::now();

        engine.handle_result(PollResult::Players(vec!["spotify".into()]));
        let current = engine.generation;

        engine.handle_result(
            PollResult::Playback {
                generation: current - 1,
                snapshot: Some(PlaybackSnapshot {
                    title: "Old".into(),
                    ..Default::default()
                }),
                observed_at: now,
            },
        );
        assert!(engine.view(now).snapshot.is_none());

        engine.handle_result(
            PollResult::Playback {
                generation: current,
                snapshot: Some(PlaybackSnapshot {
                    title: "New".into(),
                    ..Default::default()
                }),
                observed_at: now,
            },
        );
        assert_eq!(engine.view(now).snapshot.unwrap().title, "New");
    }

    #[tokio::test]
    async fn test_player_change_clears_snapshot_and_artwork() {
        let runner = Arc::new(ScriptedRunner::new());
        let mut engine = engine(&runner);
        let now = Instant::now();

        engine.handle_result(PollResult::Players(vec!["spotify".into()]));
        engine.handle_result(
            PollResult::Playback {
                generation: engine.generation,
                snapshot: Some(PlaybackSnapshot::default()),
                observed_at: now,
            },
        );
        assert!(engine.view(now).snapshot.is_some());
        engine.take_artwork_update();

        engine.handle_result(PollResult::Players(vec!["vlc".into()]));
        assert_eq!(engine.player(), Some("vlc"));
        assert!(engine.view(now).snapshot.is_none());
        assert!(matches!(engine.take_artwork_update(), Some(None)));
    }

    #[tokio::test]
    async fn test_late_artwork_for_old_reference_ignored() {
        let runner = Arc::new(ScriptedRunner::new());
        let mut engine = engine(&runner);

        engine.handle_result(PollResult::Players(vec!["spotify".into()]));
        engine.take_artwork_update();

        engine.handle_result(
            PollResult::Artwork {
                reference: "file:///old.jpg".into(),
                image: Some(ColorImage::new([1, 1], egui::Color32::RED)),
            },
        );
        assert!(engine.take_artwork_update().is_none());
    }

    #[tokio::test]
    async fn test_volume_readings_raise_overlay() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.respond("wpctl status", STATUS);
        runner.respond("wpctl get-volume 83", "Volume: 0.40");
        let mut engine = engine(&runner);
        let t0 = Instant::now();

        engine.frame(t0, 0.0);
        settle(&mut engine, t0).await;

        // The very first reading is shown, with the number gliding up from zero
        let first = engine.view(Instant::now() + Duration::from_millis(300));
        assert_eq!(first.overlay_alpha, 255);
        assert_eq!(first.overlay_value, 0.0);
        engine.frame(t0, 0.05);
        let value = engine.view(t0).overlay_value;
        assert!(value > 0.0 && value < 40.0, "value {}", value);

        runner.respond("wpctl get-volume 83", "Volume: 0.55 [MUTED]");
        let t1 = Instant::now();
        engine.frame(t1 + secs(1), 0.0);
        settle(&mut engine, t1 + secs(1)).await;

        let view = engine.view(Instant::now() + Duration::from_millis(400));
        assert_eq!(view.overlay_alpha, 255);
        assert!(view.muted);
        // Status was listed once; the handle is reused within its window
        assert_eq!(runner.count_calls("wpctl status"), 1);
    }

    #[tokio::test]
    async fn test_seek_updates_local_position() {
        let runner = Arc::new(ScriptedRunner::new());
        let mut engine = engine(&runner);
        let now = Instant::now();

        engine.handle_result(PollResult::Players(vec!["spotify".into()]));
        engine.handle_result(
            PollResult::Playback {
                generation: engine.generation,
                snapshot: Some(PlaybackSnapshot {
                    duration: Some(200.0),
                    ..Default::default()
                }),
                observed_at: now,
            },
        );

        engine.seek_fraction(0.25, now);
        assert_eq!(engine.view(now).position, 50.0);
        assert_eq!(runner.spawned(), vec!["playerctl -p spotify position 50.00"]);
    }
}
