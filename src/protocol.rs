//! Turntable controller wire protocol
//!
//! The controller sends newline-terminated ASCII lines. Several firmware revisions
//! exist, so one logical event can arrive in more than one spelling:
//!
//! | Event            | Accepted forms                                                |
//! |------------------|---------------------------------------------------------------|
//! | Volume           | `VOL:<n>`, `V:<n>`, `VOL=<n>`                                  |
//! | Needle down      | `NEEDLE:DOWN`, `NEEDLE_ON`, `ARM_ON`, `NEEDLE:1`, `N:1`        |
//! | Needle up        | `NEEDLE:UP`, `NEEDLE_OFF`, `ARM_OFF`, `NEEDLE:0`, `N:0`        |
//! | Transport        | `PLAY`, `PAUSE`, `TOGGLE`                                      |
//! | Button           | `BTN:SHORT`, `BTN:LONG`                                        |
//!
//! Matching is case-insensitive. Anything else is ignored.

use serde::Serialize;
use std::fmt;

use crate::config::VolumeRange;

/// Needle (tone arm) position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NeedleState {
    Down,
    Up,
}

/// Explicit transport command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportCommand {
    Play,
    Pause,
    Toggle,
}

/// Front-panel button press length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonPress {
    Short,
    Long,
}

/// A classified controller line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ControllerEvent {
    /// Knob position in percent, clamped to the configured range
    Volume(u16),
    Transport(TransportCommand),
    Button(ButtonPress),
    Needle(NeedleState),
}

/// Debounce category an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionCategory {
    Volume,
    /// Needle and transport lines both drive playback
    Transport,
    Button,
}

impl ControllerEvent {
    /// Classify one line
    ///
    /// Returns `None` for empty, unknown, or malformed lines. Volume values are
    /// clamped into `range`; a non-integer payload is rejected, never zeroed.
    pub fn parse(line: &str, range: VolumeRange) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let upper = line.to_ascii_uppercase();

        if let Some(payload) = volume_payload(&upper) {
            let value: i64 = payload.trim().parse().ok()?;
            let clamped = value.clamp(0, i64::from(range.max_percent()));
            return Some(ControllerEvent::Volume(clamped as u16));
        }

        let event = match upper.as_str() {
            "NEEDLE:DOWN" | "NEEDLE_ON" | "ARM_ON" | "NEEDLE:1" | "N:1" => {
                ControllerEvent::Needle(NeedleState::Down)
            }
            "NEEDLE:UP" | "NEEDLE_OFF" | "ARM_OFF" | "NEEDLE:0" | "N:0" => {
                ControllerEvent::Needle(NeedleState::Up)
            }
            "PLAY" => ControllerEvent::Transport(TransportCommand::Play),
            "PAUSE" => ControllerEvent::Transport(TransportCommand::Pause),
            "TOGGLE" => ControllerEvent::Transport(TransportCommand::Toggle),
            "BTN:SHORT" => ControllerEvent::Button(ButtonPress::Short),
            "BTN:LONG" => ControllerEvent::Button(ButtonPress::Long),
            _ => return None,
        };

        Some(event)
    }

    pub fn category(&self) -> ActionCategory {
        match self {
            ControllerEvent::Volume(_) => ActionCategory::Volume,
            ControllerEvent::Transport(_) | ControllerEvent::Needle(_) => ActionCategory::Transport,
            ControllerEvent::Button(_) => ActionCategory::Button,
        }
    }
}

impl fmt::Display for ControllerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerEvent::Volume(v) => write!(f, "Volume {}%", v),
            ControllerEvent::Transport(cmd) => write!(f, "Transport {:?}", cmd),
            ControllerEvent::Button(press) => write!(f, "Button {:?}", press),
            ControllerEvent::Needle(state) => write!(f, "Needle {:?}", state),
        }
    }
}

fn volume_payload(upper: &str) -> Option<&str> {
    ["VOL:", "VOL=", "V:"]
        .iter()
        .find_map(|prefix| upper.strip_prefix(prefix))
}

/// Decode raw serial bytes into a line, dropping invalid UTF-8 and line terminators
pub fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .chars()
        .filter(|c| *c != char::REPLACEMENT_CHARACTER && *c != '\0')
        .collect::<String>()
        .trim()
        .to_string()
}
