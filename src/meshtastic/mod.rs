//! # Meshtastic line sources
//!
//! The field node prints one frame per line on its serial console. The ingestion
//! pipeline only sees the [`LineSource`] seam; this module provides:
//!
//! - [`SerialLineSource`] - reads a USB/UART serial port on a dedicated OS thread
//!   (the port API is blocking) and hands complete lines to the async side.
//! - [`AsyncLineSource`] - wraps any `AsyncBufRead` (stdin, sockets, test mocks).
//!
//! ```rust,no_run
//! # #[cfg(feature = "serial")]
//! # {
//! use meshrelay::meshtastic::{LineSource, SerialLineSource};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut source = SerialLineSource::open("/dev/ttyUSB0", 115200).await?;
//!     while let Some(line) = source.next_line().await? {
//!         println!("Received: {}", line);
//!     }
//!     Ok(())
//! }
//! # }
//! ```

use std::future::Future;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// A source of newline-terminated frames.
///
/// `Ok(None)` means the source is exhausted for good. A read error is transient from
/// the caller's point of view: it may call `next_line` again after a pause.
pub trait LineSource: Send {
    fn next_line(&mut self) -> impl Future<Output = io::Result<Option<String>>> + Send;
}

/// Line source over any buffered async reader.
///
/// Bytes are decoded lossily, as on the serial path: a frame with invalid UTF-8 is
/// still a line for the parser to judge, not a transport failure.
pub struct AsyncLineSource<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin + Send> AsyncLineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(512),
        }
    }
}

impl<R: AsyncBufRead + Unpin + Send> LineSource for AsyncLineSource<R> {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        // A read error drops whatever part of the line was buffered.
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
            return Ok(None);
        }
        let mut line = self.buf.as_slice();
        if let Some(rest) = line.strip_suffix(b"\n") {
            line = rest.strip_suffix(b"\r").unwrap_or(rest);
        }
        Ok(Some(String::from_utf8_lossy(line).into_owned()))
    }
}

#[cfg(feature = "serial")]
mod serial;

#[cfg(feature = "serial")]
pub use serial::SerialLineSource;

#[cfg(not(feature = "serial"))]
pub struct SerialLineSource;

#[cfg(not(feature = "serial"))]
impl SerialLineSource {
    pub async fn open(port_name: &str, _baud_rate: u32) -> anyhow::Result<Self> {
        anyhow::bail!(
            "Cannot open {}: serial support not compiled in (enable the 'serial' feature)",
            port_name
        )
    }
}

#[cfg(not(feature = "serial"))]
impl LineSource for SerialLineSource {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn async_source_yields_lines_then_end() {
        let mock = tokio_test::io::Builder::new()
            .read(b"SRC=1,CUR=1,ID=1:a-b\n{\"src\":2}\n")
            .build();
        let mut source = AsyncLineSource::new(BufReader::new(mock));
        assert_eq!(
            source.next_line().await.unwrap().as_deref(),
            Some("SRC=1,CUR=1,ID=1:a-b")
        );
        assert_eq!(source.next_line().await.unwrap().as_deref(), Some("{\"src\":2}"));
        assert_eq!(source.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn read_errors_are_reported_and_reading_can_resume() {
        let mock = tokio_test::io::Builder::new()
            .read(b"first\n")
            .read_error(io::Error::new(io::ErrorKind::Other, "usb unplugged"))
            .read(b"second\n")
            .build();
        let mut source = AsyncLineSource::new(BufReader::new(mock));
        assert_eq!(source.next_line().await.unwrap().as_deref(), Some("first"));
        assert!(source.next_line().await.is_err());
        assert_eq!(source.next_line().await.unwrap().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn invalid_utf8_is_decoded_lossily() {
        let mock = tokio_test::io::Builder::new()
            .read(b"SRC=1,CUR=1,ID=1:A-caf\xff\r\nlast")
            .build();
        let mut source = AsyncLineSource::new(BufReader::new(mock));
        assert_eq!(
            source.next_line().await.unwrap().as_deref(),
            Some("SRC=1,CUR=1,ID=1:A-caf\u{FFFD}")
        );
        assert_eq!(source.next_line().await.unwrap().as_deref(), Some("last"));
        assert_eq!(source.next_line().await.unwrap(), None);
    }
}
