//! Serial port line source.

use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use std::io::{self, BufRead, BufReader};
use std::time::Duration;
use tokio::sync::mpsc;

use super::LineSource;
use crate::logutil::preview;

/// Lines buffered between the reader thread and the pipeline.
const CHANNEL_DEPTH: usize = 256;

/// Reads newline-terminated frames from a serial port.
///
/// The port is drained by a dedicated thread so a blocking read never stalls the
/// async runtime. The thread exits once this source is dropped.
pub struct SerialLineSource {
    port_name: String,
    rx: mpsc::Receiver<io::Result<String>>,
}

impl SerialLineSource {
    /// Open `port_name`. Failing to open the port is fatal to the caller.
    pub async fn open(port_name: &str, baud_rate: u32) -> Result<Self> {
        info!(
            "Opening serial port {} at {} baud",
            port_name, baud_rate
        );
        let mut builder =
            serialport::new(port_name, baud_rate).timeout(Duration::from_millis(500));
        // Some USB serial adapters need explicit settings
        #[cfg(unix)]
        {
            builder = builder
                .data_bits(serialport::DataBits::Eight)
                .stop_bits(serialport::StopBits::One)
                .parity(serialport::Parity::None);
        }
        let mut port = builder
            .open()
            .map_err(|e| anyhow!("Failed to open serial port {}: {}", port_name, e))?;
        // Toggle DTR/RTS so ESP32 based boards wake up
        let _ = port.write_data_terminal_ready(true);
        let _ = port.write_request_to_send(true);
        tokio::time::sleep(Duration::from_millis(150)).await;
        // Whatever the node printed before we attached is usually a partial line
        if let Err(e) = port.clear(serialport::ClearBuffer::Input) {
            debug!("Could not clear serial input buffer: {}", e);
        }

        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
        let name = port_name.to_string();
        std::thread::Builder::new()
            .name(format!("serial-{}", name.rsplit('/').next().unwrap_or("port")))
            .spawn(move || read_lines(port, tx, name))
            .map_err(|e| anyhow!("Failed to spawn serial reader thread: {}", e))?;

        Ok(Self {
            port_name: port_name.to_string(),
            rx,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl LineSource for SerialLineSource {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        match self.rx.recv().await {
            Some(result) => result.map(Some),
            None => Ok(None),
        }
    }
}

fn read_lines(
    port: Box<dyn serialport::SerialPort>,
    tx: mpsc::Sender<io::Result<String>>,
    port_name: String,
) {
    let mut reader = BufReader::new(port);
    let mut buf = Vec::with_capacity(512);
    loop {
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => {
                // Port reported EOF; keep the device semantics of "no data yet".
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\r', '\n'])
                    .to_string();
                buf.clear();
                if tx.blocking_send(Ok(line)).is_err() {
                    break;
                }
            }
            // Timeouts are normal when the mesh is quiet; keep the partial line.
            Err(ref e) if e.kind() == io::ErrorKind::TimedOut => continue,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                if !buf.is_empty() {
                    debug!(
                        "Discarding partial line after read error: {}",
                        preview(&String::from_utf8_lossy(&buf), 80)
                    );
                    buf.clear();
                }
                warn!("Serial read error on {}: {}", port_name, e);
                if tx.blocking_send(Err(e)).is_err() {
                    break;
                }
                // Avoid a tight error loop while the device is gone
                std::thread::sleep(Duration::from_millis(500));
            }
        }
    }
    debug!("Serial reader for {} stopped", port_name);
}
