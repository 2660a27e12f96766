//! Volume overlay envelope
//!
//! The overlay fades in, holds at full opacity and fades out:
//!
//! ```text
//! Idle -> FadingIn -> Holding -> FadingOut -> Idle
//! ```
//!
//! A significant volume change starts a sequence when idle, or pushes the end of
//! the running one further out (never earlier). New sequences are rate-limited so
//! a spinning knob does not make the overlay flicker. The number shown is a
//! low-pass filtered copy of the latest volume, so it glides rather than steps.

use std::time::{Duration, Instant};

use crate::config::OverlayConfig;

/// Envelope phase at a point in time
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayPhase {
    Idle,
    FadingIn,
    Holding,
    FadingOut,
}

/// Envelope and filter parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayTimings {
    pub fade_in: Duration,
    pub hold: Duration,
    pub fade_out: Duration,
    pub min_retrigger: Duration,
    pub deadband: f64,
    /// Convergence rate of the displayed value, per second
    pub smooth_speed: f64,
}

impl OverlayTimings {
    pub fn from_config(config: &OverlayConfig) -> Self {
        Self {
            fade_in: Duration::from_millis(config.fade_in_ms),
            hold: Duration::from_millis(config.hold_ms),
            fade_out: Duration::from_millis(config.fade_out_ms),
            min_retrigger: Duration::from_millis(config.min_retrigger_ms),
            deadband: f64::from(config.deadband),
            smooth_speed: config.smooth_speed,
        }
    }

    fn total(&self) -> Duration {
        self.fade_in + self.hold + self.fade_out
    }
}

/// Volume indicator animation state
#[derive(Debug, Clone)]
pub struct VolumeOverlay {
    timings: OverlayTimings,
    target: f64,
    displayed: f64,
    last_observed: Option<f64>,
    start: Option<Instant>,
    end: Option<Instant>,
    last_trigger: Option<Instant>,
    muted: bool,
}

impl VolumeOverlay {
    pub fn new(timings: OverlayTimings) -> Self {
        Self {
            timings,
            target: 0.0,
            displayed: 0.0,
            last_observed: None,
            start: None,
            end: None,
            last_trigger: None,
            muted: false,
        }
    }

    /// Feed a polled volume (percent)
    ///
    /// The first observation counts as a change, so the overlay appears and the
    /// displayed value glides up from zero. Returns true when the observation
    /// started or extended a fade sequence.
    pub fn observe(&mut self, value: f64, muted: bool, now: Instant) -> bool {
        let mute_changed = muted != self.muted;
        self.muted = muted;

        let significant = match self.last_observed {
            None => true,
            Some(last) => (value - last).abs() >= self.timings.deadband || mute_changed,
        };
        if !significant {
            return false;
        }

        self.target = value;
        self.last_observed = Some(value);

        if let Some(end) = self.end.filter(|end| now < *end) {
            let extended = now + self.timings.hold + self.timings.fade_out;
            self.end = Some(end.max(extended));
            return true;
        }

        let may_retrigger = self
            .last_trigger
            .map_or(true, |t| now.saturating_duration_since(t) >= self.timings.min_retrigger);

        if may_retrigger {
            self.start = Some(now);
            self.end = Some(now + self.timings.total());
            self.last_trigger = Some(now);
        }
        may_retrigger
    }

    /// Advance the displayed value by `dt` seconds
    pub fn tick(&mut self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let k = (self.timings.smooth_speed * dt).clamp(0.0, 1.0);
        self.displayed += (self.target - self.displayed) * k;
    }

    #[cfg(test)]
    pub fn phase(&self, now: Instant) -> OverlayPhase {
        let (Some(start), Some(end)) = (self.start, self.end) else {
            return OverlayPhase::Idle;
        };
        if now < start || now > end {
            return OverlayPhase::Idle;
        }

        let t = now.duration_since(start);
        let hold_end = end.duration_since(start).saturating_sub(self.timings.fade_out);
        if t <= self.timings.fade_in {
            OverlayPhase::FadingIn
        } else if t <= hold_end {
            OverlayPhase::Holding
        } else {
            OverlayPhase::FadingOut
        }
    }

    /// Opacity at `now`, 0 (hidden) to 255
    pub fn alpha(&self, now: Instant) -> u8 {
        let (Some(start), Some(end)) = (self.start, self.end) else {
            return 0;
        };
        if now < start || now > end {
            return 0;
        }

        let t = now.duration_since(start).as_secs_f64();
        let total = end.duration_since(start).as_secs_f64();
        let fade_in = self.timings.fade_in.as_secs_f64();
        let fade_out = self.timings.fade_out.as_secs_f64();
        let hold_end = total - fade_out;

        let level = if t <= fade_in {
            smoothstep(t / fade_in.max(1e-4))
        } else if t <= hold_end {
            1.0
        } else {
            1.0 - smoothstep((t - hold_end) / fade_out.max(1e-4))
        };

        (255.0 * level).round().clamp(0.0, 255.0) as u8
    }

    /// Filtered value to draw
    pub fn displayed(&self) -> f64 {
        self.displayed
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn start_time(&self) -> Option<Instant> {
        self.start
    }

    pub fn end_time(&self) -> Option<Instant> {
        self.end
    }
}

/// Cubic Hermite ease on `[0, 1]`
pub fn smoothstep(x: f64) -> f64 {
    let x = x.clamp(0.0, 1.0);
    x * x * (3.0 - 2.0 * x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timings() -> OverlayTimings {
        OverlayTimings {
            fade_in: Duration::from_millis(180),
            hold: Duration::from_millis(900),
            fade_out: Duration::from_millis(350),
            min_retrigger: Duration::from_millis(350),
            deadband: 1.0,
            smooth_speed: 10.0,
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    /// Overlay that saw 50 long ago, with a fresh sequence for 60 at the returned instant
    fn triggered() -> (VolumeOverlay, Instant) {
        let mut overlay = VolumeOverlay::new(timings());
        let t0 = Instant::now();
        overlay.observe(50.0, false, t0);
        overlay.tick(5.0);
        let start = t0 + ms(2000);
        assert!(overlay.observe(60.0, false, start));
        (overlay, start)
    }

    #[test]
    fn test_first_observation_shows_overlay() {
        let mut overlay = VolumeOverlay::new(timings());
        let t0 = Instant::now();
        assert!(overlay.observe(42.0, false, t0));
        assert_eq!(overlay.start_time(), Some(t0));
        assert_eq!(overlay.alpha(t0 + ms(500)), 255);

        // Glides up from zero instead of jumping
        assert_eq!(overlay.displayed(), 0.0);
        overlay.tick(0.05);
        assert!(overlay.displayed() > 0.0 && overlay.displayed() < 42.0);
    }

    #[test]
    fn test_envelope_endpoints() {
        let (overlay, start) = triggered();

        assert_eq!(overlay.alpha(start - ms(1)), 0);
        assert_eq!(overlay.alpha(start), 0);
        assert_eq!(overlay.alpha(start + ms(180)), 255);
        assert_eq!(overlay.alpha(start + ms(600)), 255);
        assert_eq!(overlay.alpha(start + ms(1080)), 255);
        assert_eq!(overlay.alpha(start + ms(1430)), 0);
        assert_eq!(overlay.alpha(start + ms(1431)), 0);
        assert_eq!(overlay.alpha(start + ms(5000)), 0);
    }

    #[test]
    fn test_envelope_monotonic_edges() {
        let (overlay, start) = triggered();

        let rise: Vec<u8> = (0..=180).step_by(10).map(|t| overlay.alpha(start + ms(t))).collect();
        assert!(rise.windows(2).all(|w| w[0] <= w[1]));
        assert!(rise.iter().any(|a| *a > 0 && *a < 255));

        let fall: Vec<u8> = (1080..=1430)
            .step_by(10)
            .map(|t| overlay.alpha(start + ms(t)))
            .collect();
        assert!(fall.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_fade_in_is_eased_not_linear() {
        let (overlay, start) = triggered();
        // smoothstep(0.25) = 0.15625, well under the linear 0.25
        let quarter = overlay.alpha(start + ms(45));
        assert!(quarter < 60, "alpha {} looks linear", quarter);
    }

    #[test]
    fn test_phases() {
        let (overlay, start) = triggered();
        assert_eq!(overlay.phase(start - ms(1)), OverlayPhase::Idle);
        assert_eq!(overlay.phase(start + ms(100)), OverlayPhase::FadingIn);
        assert_eq!(overlay.phase(start + ms(500)), OverlayPhase::Holding);
        assert_eq!(overlay.phase(start + ms(1200)), OverlayPhase::FadingOut);
        assert_eq!(overlay.phase(start + ms(1500)), OverlayPhase::Idle);
    }

    #[test]
    fn test_rapid_observations_start_once() {
        let (mut overlay, start) = triggered();
        let end_before = overlay.end_time().unwrap();

        assert!(overlay.observe(62.0, false, start + ms(100)));
        assert_eq!(overlay.start_time(), Some(start));
        assert!(overlay.end_time().unwrap() >= end_before);
    }

    #[test]
    fn test_retrigger_in_hold_extends_end() {
        let (mut overlay, start) = triggered();
        overlay.observe(70.0, false, start + ms(800));
        assert_eq!(overlay.start_time(), Some(start));
        assert_eq!(overlay.end_time(), Some(start + ms(800 + 900 + 350)));
        assert_eq!(overlay.alpha(start + ms(1500)), 255);
    }

    #[test]
    fn test_end_never_retreats() {
        let (mut overlay, start) = triggered();
        overlay.observe(70.0, false, start + ms(1000));
        let extended = overlay.end_time().unwrap();
        // A change during fade-in of the same sequence cannot pull the end back
        overlay.observe(80.0, false, start + ms(1001));
        assert!(overlay.end_time().unwrap() >= extended);
    }

    #[test]
    fn test_small_change_ignored() {
        let mut overlay = VolumeOverlay::new(OverlayTimings {
            deadband: 3.0,
            ..timings()
        });
        let t0 = Instant::now();
        overlay.observe(50.0, false, t0);
        assert!(!overlay.observe(52.0, false, t0 + ms(2000)));
        assert_eq!(overlay.alpha(t0 + ms(2200)), 0);
        assert_eq!(overlay.target(), 50.0);
    }

    #[test]
    fn test_new_sequence_rate_limited() {
        let short = OverlayTimings {
            fade_in: ms(10),
            hold: ms(10),
            fade_out: ms(10),
            min_retrigger: ms(350),
            ..timings()
        };
        let mut overlay = VolumeOverlay::new(short);
        let t0 = Instant::now();
        assert!(overlay.observe(10.0, false, t0));

        // Previous sequence is over but the retrigger window is not
        assert!(!overlay.observe(30.0, false, t0 + ms(100)));
        assert_eq!(overlay.start_time(), Some(t0));
        assert_eq!(overlay.target(), 30.0);

        assert!(overlay.observe(40.0, false, t0 + ms(400)));
        assert_eq!(overlay.start_time(), Some(t0 + ms(400)));
    }

    #[test]
    fn test_mute_toggle_shows_overlay() {
        let mut overlay = VolumeOverlay::new(timings());
        let t0 = Instant::now();
        overlay.observe(50.0, false, t0);
        assert!(overlay.observe(50.0, true, t0 + ms(2000)));
        assert_eq!(overlay.start_time(), Some(t0 + ms(2000)));
        assert!(overlay.muted());
    }

    #[test]
    fn test_displayed_value_converges_smoothly() {
        let (mut overlay, _) = triggered();
        assert!((overlay.displayed() - 50.0).abs() < 1e-9);

        let mut last = overlay.displayed();
        for _ in 0..120 {
            overlay.tick(1.0 / 60.0);
            let d = overlay.displayed();
            assert!(d >= last && d <= 60.0);
            last = d;
        }
        assert!((overlay.displayed() - 60.0).abs() < 0.01);
    }

    #[test]
    fn test_large_dt_snaps_to_target() {
        let (mut overlay, _) = triggered();
        overlay.tick(5.0);
        assert_eq!(overlay.displayed(), 60.0);
    }

    #[test]
    fn test_smoothstep_endpoints() {
        assert_eq!(smoothstep(-1.0), 0.0);
        assert_eq!(smoothstep(0.0), 0.0);
        assert_eq!(smoothstep(0.5), 0.5);
        assert_eq!(smoothstep(1.0), 1.0);
        assert_eq!(smoothstep(2.0), 1.0);
    }
}
