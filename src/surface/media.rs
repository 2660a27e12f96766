//! Media player control via `playerctl` (MPRIS)

use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use super::{args, CommandRunner, SurfaceResult};

const PLAYERCTL: &str = "playerctl";

/// Transport verbs understood by playerctl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerVerb {
    Play,
    Pause,
    PlayPause,
    Next,
    Previous,
}

impl PlayerVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerVerb::Play => "play",
            PlayerVerb::Pause => "pause",
            PlayerVerb::PlayPause => "play-pause",
            PlayerVerb::Next => "next",
            PlayerVerb::Previous => "previous",
        }
    }
}

/// Point-in-time copy of a player's state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaybackSnapshot {
    pub is_playing: bool,
    pub title: String,
    pub artist: String,
    /// Seconds into the track when the snapshot was taken
    pub position: f64,
    /// Track length in seconds, if the player reports one
    pub duration: Option<f64>,
    /// Artwork URL (`file://` or `http(s)://`), empty when absent
    pub art_reference: String,
}

/// playerctl-backed media control surface
#[derive(Clone)]
pub struct MediaControl {
    runner: Arc<dyn CommandRunner>,
    play_pause_helper: Option<PathBuf>,
}

impl MediaControl {
    pub fn new(runner: Arc<dyn CommandRunner>, play_pause_helper: Option<PathBuf>) -> Self {
        Self {
            runner,
            play_pause_helper,
        }
    }

    fn player_args(player: Option<&str>, rest: &[&str]) -> Vec<String> {
        let mut out = Vec::with_capacity(rest.len() + 2);
        if let Some(player) = player {
            out.push("-p".to_string());
            out.push(player.to_string());
        }
        out.extend(rest.iter().map(|s| s.to_string()));
        out
    }

    async fn query(&self, player: &str, rest: &[&str]) -> Option<String> {
        match self
            .runner
            .output(PLAYERCTL, &Self::player_args(Some(player), rest))
            .await
        {
            Ok(out) => Some(out),
            Err(e) => {
                debug!("playerctl {:?} failed: {}", rest, e);
                None
            }
        }
    }

    /// Names of all players currently on the session bus
    pub async fn list_players(&self) -> Vec<String> {
        match self.runner.output(PLAYERCTL, &args(["-l"])).await {
            Ok(out) => out
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) => {
                debug!("No media players listed: {}", e);
                Vec::new()
            }
        }
    }

    /// Query every field of a player in parallel
    ///
    /// Returns `None` when the player does not answer the status query.
    pub async fn snapshot(&self, player: &str) -> Option<PlaybackSnapshot> {
        let (status, title, artist, position, length, art) = tokio::join!(
            self.query(player, &["status"]),
            self.query(player, &["metadata", "xesam:title"]),
            self.query(player, &["metadata", "xesam:artist"]),
            self.query(player, &["position"]),
            self.query(player, &["metadata", "mpris:length"]),
            self.query(player, &["metadata", "mpris:artUrl"]),
        );

        let status = status.filter(|s| !s.is_empty())?;

        Some(PlaybackSnapshot {
            is_playing: status.eq_ignore_ascii_case("playing"),
            title: title.unwrap_or_default(),
            artist: clean_artist(&artist.unwrap_or_default()),
            position: position.and_then(|p| p.trim().parse().ok()).unwrap_or(0.0),
            duration: length.as_deref().and_then(parse_length),
            art_reference: art.unwrap_or_default(),
        })
    }

    /// Fire-and-forget transport command, optionally scoped to one player
    pub fn transport(&self, player: Option<&str>, verb: PlayerVerb) -> SurfaceResult<()> {
        self.runner
            .spawn(PLAYERCTL, &Self::player_args(player, &[verb.as_str()]))
    }

    /// Fire-and-forget absolute seek
    pub fn seek(&self, player: Option<&str>, seconds: f64) -> SurfaceResult<()> {
        let position = format!("{:.2}", seconds.max(0.0));
        self.runner
            .spawn(PLAYERCTL, &Self::player_args(player, &["position", &position]))
    }

    /// Toggle playback through the helper script, or playerctl when it is missing
    ///
    /// The helper knows how to drive players that ignore MPRIS.
    pub fn smart_play_pause(&self) -> SurfaceResult<()> {
        if let Some(helper) = &self.play_pause_helper {
            let helper = helper.to_string_lossy();
            if self.runner.is_available(&helper) {
                return self.runner.spawn(&helper, &args(["play-pause"]));
            }
        }
        self.transport(None, PlayerVerb::PlayPause)
    }
}

/// Pick the first player whose name starts with a preferred prefix, else the first one
pub fn pick_player(players: &[String], preferred_prefixes: &[String]) -> Option<String> {
    players
        .iter()
        .find(|p| {
            let lower = p.to_lowercase();
            preferred_prefixes
                .iter()
                .any(|prefix| lower.starts_with(&prefix.to_lowercase()))
        })
        .or_else(|| players.first())
        .cloned()
}

/// `mpris:length` is in microseconds
fn parse_length(raw: &str) -> Option<f64> {
    raw.trim().parse::<i64>().ok().map(|us| us as f64 / 1_000_000.0)
}

/// Some players report the artist list as a Python-style list literal
fn clean_artist(raw: &str) -> String {
    raw.trim_matches(|c| matches!(c, '[' | ']' | '\'' | '"'))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::fake::ScriptedRunner;

    fn media(runner: &Arc<ScriptedRunner>) -> MediaControl {
        MediaControl::new(runner.clone(), None)
    }

    fn script_player(runner: &ScriptedRunner, player: &str, status: &str) {
        let p = format!("playerctl -p {}", player);
        runner.respond(&format!("{} status", p), status);
        runner.respond(&format!("{} metadata xesam:title", p), "Blue in Green");
        runner.respond(&format!("{} metadata xesam:artist", p), "['Miles Davis']");
        runner.respond(&format!("{} position", p), "12.345");
        runner.respond(&format!("{} metadata mpris:length", p), "337000000");
        runner.respond(&format!("{} metadata mpris:artUrl", p), "file:///tmp/cover.jpg");
    }

    #[tokio::test]
    async fn test_snapshot_parses_all_fields() {
        let runner = Arc::new(ScriptedRunner::new());
        script_player(&runner, "chromium.instance42", "Playing");

        let snap = media(&runner).snapshot("chromium.instance42").await.unwrap();
        assert!(snap.is_playing);
        assert_eq!(snap.title, "Blue in Green");
        assert_eq!(snap.artist, "Miles Davis");
        assert!((snap.position - 12.345).abs() < 1e-9);
        assert_eq!(snap.duration, Some(337.0));
        assert_eq!(snap.art_reference, "file:///tmp/cover.jpg");
    }

    #[tokio::test]
    async fn test_snapshot_absent_without_status() {
        let runner = Arc::new(ScriptedRunner::new());
        assert!(media(&runner).snapshot("spotify").await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_tolerates_missing_metadata() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.respond("playerctl -p spotify status", "Paused");
        runner.respond("playerctl -p spotify position", "not-a-number");

        let snap = media(&runner).snapshot("spotify").await.unwrap();
        assert!(!snap.is_playing);
        assert_eq!(snap.position, 0.0);
        assert_eq!(snap.duration, None);
        assert!(snap.title.is_empty());
    }

    #[tokio::test]
    async fn test_list_players() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.respond("playerctl -l", "spotify\n\nchromium.instance7\n");
        assert_eq!(
            media(&runner).list_players().await,
            vec!["spotify".to_string(), "chromium.instance7".to_string()]
        );
    }

    #[test]
    fn test_pick_player_prefers_prefix() {
        let players = vec!["spotify".to_string(), "Chromium.instance7".to_string()];
        let preferred = vec!["chromium".to_string(), "chrome".to_string()];
        assert_eq!(
            pick_player(&players, &preferred).as_deref(),
            Some("Chromium.instance7")
        );
        assert_eq!(
            pick_player(&players[..1], &preferred).as_deref(),
            Some("spotify")
        );
        assert_eq!(pick_player(&[], &preferred), None);
    }

    #[tokio::test]
    async fn test_transport_and_seek_are_spawned() {
        let runner = Arc::new(ScriptedRunner::new());
        let media = media(&runner);
        media.transport(Some("spotify"), PlayerVerb::Next).unwrap();
        media.transport(None, PlayerVerb::Pause).unwrap();
        media.seek(Some("spotify"), 42.0).unwrap();
        assert_eq!(
            runner.spawned(),
            vec![
                "playerctl -p spotify next",
                "playerctl pause",
                "playerctl -p spotify position 42.00",
            ]
        );
    }

    #[tokio::test]
    async fn test_smart_play_pause_falls_back_without_helper() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.mark_missing("/home/me/bin/spotify_cmd.sh");
        let media = MediaControl::new(
            runner.clone(),
            Some(PathBuf::from("/home/me/bin/spotify_cmd.sh")),
        );
        media.smart_play_pause().unwrap();
        assert_eq!(runner.spawned(), vec!["playerctl play-pause"]);
    }

    #[tokio::test]
    async fn test_smart_play_pause_uses_helper() {
        let runner = Arc::new(ScriptedRunner::new());
        let media = MediaControl::new(runner.clone(), Some(PathBuf::from("/opt/pp.sh")));
        media.smart_play_pause().unwrap();
        assert_eq!(runner.spawned(), vec!["/opt/pp.sh play-pause"]);
    }
}
