//! Vinyl GW - turntable controller gateway
//!
//! Bridges a serial turntable-style controller (needle, volume knob, buttons) to
//! desktop media playback via `playerctl` and per-application volume via `wpctl`,
//! and drives a now-playing display for the same player.

pub mod bridge;
pub mod config;
pub mod display;
pub mod paths;
pub mod protocol;
pub mod resolver;
pub mod serial;
pub mod sniffer;
pub mod surface;
pub mod volume;
