//! Serial sniffer for debugging the turntable controller
//!
//! Prints every line the controller sends together with how the bridge would
//! classify it. Nothing is dispatched.

use anyhow::Result;
use chrono::{DateTime, Local};
use colored::*;
use serde::Serialize;

use crate::config::{SerialConfig, VolumeRange};
use crate::protocol::{decode_line, ControllerEvent};
use crate::serial::{list_ports, SerialLink};

/// One observed line
#[derive(Debug, Clone, Serialize)]
pub struct SnifferEvent {
    pub timestamp: DateTime<Local>,
    pub port: String,
    pub raw: String,
    pub event: Option<ControllerEvent>,
}

impl SnifferEvent {
    pub fn classify(port: &str, raw: &[u8], range: VolumeRange) -> Option<Self> {
        let line = decode_line(raw);
        if line.is_empty() {
            return None;
        }
        Some(Self {
            timestamp: Local::now(),
            port: port.to_string(),
            event: ControllerEvent::parse(&line, range),
            raw: line,
        })
    }

    fn to_line(&self) -> String {
        let timestamp = self.timestamp.format("%H:%M:%S%.3f").to_string();
        let raw = format!("{:<16}", self.raw);

        let parsed = match &self.event {
            Some(event) => {
                let text = event.to_string();
                match event {
                    ControllerEvent::Volume(_) => text.bright_yellow(),
                    ControllerEvent::Transport(_) => text.bright_green(),
                    ControllerEvent::Button(_) => text.bright_magenta(),
                    ControllerEvent::Needle(_) => text.bright_cyan(),
                }
            }
            None => "(ignored)".bright_black(),
        };

        format!("[{}] {} => {}", timestamp.dimmed(), raw.white(), parsed)
    }
}

/// Print classified lines until Ctrl+C or the port goes away
pub async fn run_sniffer(config: &SerialConfig, range: VolumeRange, json: bool) -> Result<()> {
    let mut link = SerialLink::open(config)?;

    if !json {
        println!("{}", "=== Serial Sniffer ===".bold().cyan());
        println!("Listening on {} @ {} baud", config.port, config.baud);
        println!("Press Ctrl+C to exit\n");
        println!("{}", "Format: [time] RAW => CLASSIFIED".dimmed());
        println!("{}\n", "─".repeat(60).dimmed());
    }

    loop {
        tokio::select! {
            line = link.next_line() => match line {
                Some(raw) => {
                    let Some(event) = SnifferEvent::classify(link.port_name(), &raw, range) else {
                        continue;
                    };
                    if json {
                        println!("{}", serde_json::to_string(&event)?);
                    } else {
                        println!("{}", event.to_line());
                    }
                }
                None => {
                    eprintln!("{}", "Serial link lost".red());
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    if !json {
        println!("\n{}", "Sniffer stopped".yellow());
    }
    Ok(())
}

/// List all serial ports in a formatted way
pub fn list_ports_formatted() {
    println!("\n{}", "=== Available Serial Ports ===".bold().cyan());

    match list_ports() {
        Ok(ports) if ports.is_empty() => println!("  {}", "No serial ports found".dimmed()),
        Ok(ports) => {
            for port in ports {
                println!("  {}", port);
            }
        }
        Err(e) => println!("  {}", format!("{:#}", e).red()),
    }
    println!();
}
