//! Authoritative playback state for the renderer
//!
//! Player queries are slow and arrive a few times per second; the renderer runs at
//! the display rate. Between refreshes the position is extrapolated from the last
//! snapshot using wall-clock time while playing, and frozen while paused.

use std::time::Instant;

use crate::surface::media::PlaybackSnapshot;

/// What the artwork cache should do after a refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtworkChange {
    Unchanged,
    /// Reference went away; drop the current image
    Cleared,
    /// New reference; fetch it
    Fetch(String),
}

/// Holds the latest snapshot and when it was taken
#[derive(Debug, Default)]
pub struct PlaybackReconciler {
    snapshot: Option<PlaybackSnapshot>,
    refreshed_at: Option<Instant>,
    art_reference: String,
}

impl PlaybackReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot with the result of a refresh taken at `observed_at`
    ///
    /// A failed refresh (`None`) clears the snapshot instead of leaving it stale.
    pub fn apply(&mut self, result: Option<PlaybackSnapshot>, observed_at: Instant) -> ArtworkChange {
        let new_reference = result
            .as_ref()
            .map(|s| s.art_reference.clone())
            .unwrap_or_default();

        self.snapshot = result;
        self.refreshed_at = Some(observed_at);

        if new_reference == self.art_reference {
            return ArtworkChange::Unchanged;
        }

        self.art_reference = new_reference;
        if self.art_reference.is_empty() {
            ArtworkChange::Cleared
        } else {
            ArtworkChange::Fetch(self.art_reference.clone())
        }
    }

    /// Forget everything (the selected player changed)
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn snapshot(&self) -> Option<&PlaybackSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn art_reference(&self) -> &str {
        &self.art_reference
    }

    pub fn is_playing(&self) -> bool {
        self.snapshot.as_ref().is_some_and(|s| s.is_playing)
    }

    /// Position to draw at `now`, in seconds
    pub fn displayed_position(&self, now: Instant) -> f64 {
        let Some(snapshot) = &self.snapshot else {
            return 0.0;
        };

        let elapsed = match (snapshot.is_playing, self.refreshed_at) {
            (true, Some(at)) => now.saturating_duration_since(at).as_secs_f64(),
            _ => 0.0,
        };

        let position = snapshot.position + elapsed;
        match snapshot.duration {
            Some(duration) if duration > 0.0 => position.min(duration),
            _ => position,
        }
    }

    /// Track progress in `[0, 1]`, when the track length is meaningful
    pub fn progress(&self, now: Instant) -> Option<f32> {
        let duration = self.snapshot.as_ref()?.duration.filter(|d| *d > 1.0)?;
        Some((self.displayed_position(now) / duration).clamp(0.0, 1.0) as f32)
    }

    /// Optimistically move the local position after a user seek
    pub fn seek_to(&mut self, position: f64, now: Instant) {
        if let Some(snapshot) = &mut self.snapshot {
            snapshot.position = position.max(0.0);
            self.refreshed_at = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn snapshot(playing: bool, position: f64, art: &str) -> PlaybackSnapshot {
        PlaybackSnapshot {
            is_playing: playing,
            title: "So What".to_string(),
            artist: "Miles Davis".to_string(),
            position,
            duration: None,
            art_reference: art.to_string(),
        }
    }

    #[test]
    fn test_position_extrapolated_while_playing() {
        let t = Instant::now();
        let mut rec = PlaybackReconciler::new();
        rec.apply(Some(snapshot(true, 10.0, "")), t);

        let pos = rec.displayed_position(t + Duration::from_millis(2500));
        assert!((pos - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_position_frozen_while_paused() {
        let t = Instant::now();
        let mut rec = PlaybackReconciler::new();
        rec.apply(Some(snapshot(false, 10.0, "")), t);

        assert_eq!(rec.displayed_position(t + Duration::from_millis(2500)), 10.0);
        assert_eq!(rec.displayed_position(t + Duration::from_secs(600)), 10.0);
    }

    #[test]
    fn test_position_capped_at_duration() {
        let t = Instant::now();
        let mut rec = PlaybackReconciler::new();
        let mut snap = snapshot(true, 58.0, "");
        snap.duration = Some(60.0);
        rec.apply(Some(snap), t);

        assert_eq!(rec.displayed_position(t + Duration::from_secs(5)), 60.0);
        assert_eq!(rec.progress(t + Duration::from_secs(5)), Some(1.0));
    }

    #[test]
    fn test_failed_refresh_clears_snapshot() {
        let t = Instant::now();
        let mut rec = PlaybackReconciler::new();
        rec.apply(Some(snapshot(true, 1.0, "file:///a.jpg")), t);

        assert_eq!(rec.apply(None, t), ArtworkChange::Cleared);
        assert!(rec.snapshot().is_none());
        assert!(!rec.is_playing());
        assert_eq!(rec.displayed_position(t), 0.0);
    }

    #[test]
    fn test_artwork_fetched_only_on_change() {
        let t = Instant::now();
        let mut rec = PlaybackReconciler::new();

        assert_eq!(
            rec.apply(Some(snapshot(true, 1.0, "https://img/a.jpg")), t),
            ArtworkChange::Fetch("https://img/a.jpg".to_string())
        );
        assert_eq!(
            rec.apply(Some(snapshot(true, 2.0, "https://img/a.jpg")), t),
            ArtworkChange::Unchanged
        );
        assert_eq!(
            rec.apply(Some(snapshot(true, 0.0, "https://img/b.jpg")), t),
            ArtworkChange::Fetch("https://img/b.jpg".to_string())
        );
        assert_eq!(rec.apply(Some(snapshot(true, 0.0, "")), t), ArtworkChange::Cleared);
    }

    #[test]
    fn test_no_progress_without_length() {
        let t = Instant::now();
        let mut rec = PlaybackReconciler::new();
        rec.apply(Some(snapshot(true, 5.0, "")), t);
        assert_eq!(rec.progress(t), None);
    }

    #[test]
    fn test_seek_moves_local_position() {
        let t = Instant::now();
        let mut rec = PlaybackReconciler::new();
        rec.apply(Some(snapshot(false, 5.0, "")), t);
        rec.seek_to(42.0, t + Duration::from_secs(1));
        assert_eq!(rec.displayed_position(t + Duration::from_secs(3)), 42.0);
    }
}
