//! PipeWire mixer control via `wpctl`

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

use super::{args, CommandRunner, SurfaceResult};

const WPCTL: &str = "wpctl";
const DEFAULT_SINK: &str = "@DEFAULT_AUDIO_SINK@";

static STREAM_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\*?\s*(\d+)\.\s+(.*)$").expect("valid stream regex"));
static VOLUME_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Volume:\s*([0-9.]+)").expect("valid volume regex"));

/// One entry of the "Streams:" section of `wpctl status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioStream {
    pub id: u32,
    pub name: String,
}

/// Where a volume change is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeTarget {
    Stream(u32),
    DefaultSink,
}

impl VolumeTarget {
    fn arg(&self) -> String {
        match self {
            VolumeTarget::Stream(id) => id.to_string(),
            VolumeTarget::DefaultSink => DEFAULT_SINK.to_string(),
        }
    }
}

/// Volume as reported by `wpctl get-volume`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeReading {
    pub fraction: f64,
    pub muted: bool,
}

/// wpctl-backed audio mixer surface
#[derive(Clone)]
pub struct Mixer {
    runner: Arc<dyn CommandRunner>,
}

impl Mixer {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Active streams from the mixer status dump
    ///
    /// An unavailable mixer yields an empty list.
    pub async fn streams(&self) -> Vec<AudioStream> {
        match self.runner.output(WPCTL, &args(["status"])).await {
            Ok(status) => parse_streams(&status),
            Err(e) => {
                debug!("wpctl status failed: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn get_volume(&self, stream_id: u32) -> Option<VolumeReading> {
        let out = self
            .runner
            .output(WPCTL, &["get-volume".to_string(), stream_id.to_string()])
            .await
            .map_err(|e| debug!("wpctl get-volume {} failed: {}", stream_id, e))
            .ok()?;
        parse_volume(&out)
    }

    /// Fire-and-forget volume change; `fraction` is already formatted
    pub fn set_volume(&self, target: VolumeTarget, fraction: &str) -> SurfaceResult<()> {
        self.runner.spawn(
            WPCTL,
            &["set-volume".to_string(), target.arg(), fraction.to_string()],
        )
    }
}

/// Extract the entries of every "Streams:" section
///
/// Tree glyphs are ignored. A non-indented line ends the current section.
pub fn parse_streams(status: &str) -> Vec<AudioStream> {
    let mut in_streams = false;
    let mut streams = Vec::new();

    for line in status.lines() {
        let stripped = strip_tree(line);

        if stripped.ends_with(':') && !STREAM_LINE.is_match(stripped) {
            in_streams = stripped == "Streams:";
            continue;
        }

        // Top-level headers ("Audio", "Video", "Settings") leave the section
        if !line.starts_with(char::is_whitespace) && !line.trim().is_empty() {
            in_streams = false;
            continue;
        }

        if !in_streams {
            continue;
        }

        if let Some(caps) = STREAM_LINE.captures(stripped) {
            let Ok(id) = caps[1].parse() else {
                continue;
            };
            streams.push(AudioStream {
                id,
                name: caps[2].trim().to_string(),
            });
        }
    }

    streams
}

/// First stream whose name contains any of `targets` (case-insensitive)
pub fn find_stream(streams: &[AudioStream], targets: &[String]) -> Option<u32> {
    let targets: Vec<String> = targets
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    streams
        .iter()
        .find(|s| {
            let name = s.name.to_lowercase();
            targets.iter().any(|t| name.contains(t.as_str()))
        })
        .map(|s| s.id)
}

/// Parse `Volume: 0.45` or `Volume: 0.45 [MUTED]`
pub fn parse_volume(out: &str) -> Option<VolumeReading> {
    let caps = VOLUME_LINE.captures(out)?;
    let fraction = caps[1].parse().ok()?;
    Some(VolumeReading {
        fraction,
        muted: out.contains("[MUTED]"),
    })
}

fn strip_tree(line: &str) -> &str {
    line.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '│' | '├' | '└' | '─'))
        .trim_end()
}
