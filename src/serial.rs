//! Serial link to the turntable controller
//!
//! The port is read on a dedicated blocking thread with a read timeout. Complete
//! lines are forwarded over a channel; when the port fails or reaches EOF the
//! thread exits, the channel closes, and the owner reconnects.

use anyhow::{Context, Result};
use serialport::{ClearBuffer, SerialPort, SerialPortType};
use std::io::{BufRead, BufReader, ErrorKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::config::SerialConfig;

/// An open serial port delivering raw lines
pub struct SerialLink {
    port_name: String,
    rx: mpsc::Receiver<Vec<u8>>,
    stop: Arc<AtomicBool>,
}

impl SerialLink {
    /// Open the configured port and start the reader thread
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let port = serialport::new(&config.port, config.baud)
            .timeout(config.read_timeout())
            .open()
            .with_context(|| format!("Failed to open serial port {}", config.port))?;

        // Drop whatever the controller sent while nobody was listening
        if let Err(e) = port.clear(ClearBuffer::Input) {
            debug!("Could not clear serial input buffer: {}", e);
        }

        let (tx, rx) = mpsc::channel(256);
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let thread_port = config.port.clone();

        std::thread::Builder::new()
            .name("serial-reader".to_string())
            .spawn(move || read_lines(port, tx, thread_stop, thread_port))
            .context("Failed to spawn serial reader thread")?;

        info!("🔌 Serial connected: {} @ {} baud", config.port, config.baud);

        Ok(Self {
            port_name: config.port.clone(),
            rx,
            stop,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Next raw line, or `None` once the link is lost
    pub async fn next_line(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

fn read_lines(
    port: Box<dyn SerialPort>,
    tx: mpsc::Sender<Vec<u8>>,
    stop: Arc<AtomicBool>,
    port_name: String,
) {
    let mut reader = BufReader::new(port);
    let mut buf = Vec::with_capacity(64);

    while !stop.load(Ordering::Relaxed) {
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => {
                warn!("Serial port {} reached EOF", port_name);
                return;
            }
            Ok(_) => {
                if buf.last() != Some(&b'\n') {
                    // Partial line; wait for the rest
                    continue;
                }
                trace!("serial <- {:?}", String::from_utf8_lossy(&buf));
                if tx.blocking_send(std::mem::take(&mut buf)).is_err() {
                    return;
                }
            }
            // Bytes read before the timeout stay in `buf`
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {}
            Err(e) => {
                warn!("Serial read error on {}: {}", port_name, e);
                return;
            }
        }
    }

    debug!("Serial reader for {} stopped", port_name);
}

/// Describe every serial port the OS knows about
pub fn list_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports().context("Failed to enumerate serial ports")?;

    Ok(ports
        .into_iter()
        .map(|p| match p.port_type {
            SerialPortType::UsbPort(usb) => format!(
                "{} (USB {:04x}:{:04x}{})",
                p.port_name,
                usb.vid,
                usb.pid,
                usb.product.map(|s| format!(" {}", s)).unwrap_or_default()
            ),
            SerialPortType::BluetoothPort => format!("{} (Bluetooth)", p.port_name),
            SerialPortType::PciPort => format!("{} (PCI)", p.port_name),
            SerialPortType::Unknown => p.port_name,
        })
        .collect())
}
