//! UART transport for the companion receiver/transmitter modules.

use std::io::{Read, Write};
use std::time::Duration;

use anyhow::{Context, Result};

/// Byte-at-a-time source for the line-oriented receive path. `None` means no
/// byte is waiting; reads never block the polling tick.
pub trait LineSource: Send {
    fn read_byte(&mut self) -> Option<u8>;
}

/// Line-oriented sink for the companion transmitter.
pub trait LineSink: Send {
    fn write_line(&mut self, line: &str) -> std::io::Result<()>;
}

/// A serial port carrying the companion modules' line protocol.
pub struct SerialLine {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialLine {
    /// Open `path` at `baud` (the companion modules run 9600 8N1).
    pub fn open(path: &str, baud: u32) -> Result<Self> {
        let port = serialport::new(path, baud)
            .timeout(Duration::from_millis(10))
            .open()
            .with_context(|| format!("failed to open serial port {path}"))?;
        tracing::info!(path, baud, "serial port open");
        Ok(Self { port })
    }
}

impl LineSource for SerialLine {
    fn read_byte(&mut self) -> Option<u8> {
        match self.port.bytes_to_read() {
            Ok(n) if n > 0 => {
                let mut buf = [0u8; 1];
                match self.port.read(&mut buf) {
                    Ok(1) => Some(buf[0]),
                    Ok(_) => None,
                    Err(e) if e.kind() == std::io::ErrorKind::TimedOut => None,
                    Err(e) => {
                        tracing::warn!(error = %e, "serial read failed");
                        None
                    }
                }
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "serial poll failed");
                None
            }
        }
    }
}

impl LineSink for SerialLine {
    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.port.write_all(line.as_bytes())?;
        self.port.write_all(b"\n")?;
        self.port.flush()
    }
}

/// Source with nothing to say. Used in demo mode when no port is configured.
pub struct DemoLineSource;

impl LineSource for DemoLineSource {
    fn read_byte(&mut self) -> Option<u8> {
        None
    }
}
