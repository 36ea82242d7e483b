//! The byte-serial link consumed by [`DeviceConnection`](crate::connection::DeviceConnection).
//!
//! A link is split into two capabilities:
//! - [`Connect`]: acquires and configures a link from a [`SerialConfig`].
//! - [`Transport`]: an open link moving single bytes.
//!
//! The protocol layer only ever sees these traits. The platform serial port
//! lives in [`crate::serial`], the scripted test link in [`crate::loopback`]
//! and the simulated peripherals in [`crate::simulator`].
use crate::{protocol::BaudRate, Result};
use std::time::Duration;

/// Default per-byte read timeout of a transport.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Settings used to open a link. Framing is always 8N1 without flow control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Device path or port name, e.g. `/dev/ttyUSB0` or `COM3`.
    pub path: String,
    pub baud_rate: BaudRate,
    /// How long a single byte read may block.
    pub timeout: Duration,
}

impl SerialConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: BaudRate::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: BaudRate) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// An open byte link.
pub trait Transport {
    /// Writes one byte. No response is expected.
    fn send_byte(&mut self, byte: u8) -> Result<()>;

    /// Blocks until one byte arrives or the transport's own timeout elapses.
    fn read_byte(&mut self) -> Result<u8>;

    /// Releases the link. Called once before the transport is dropped.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Factory for [`Transport`]s.
pub trait Connect {
    type Transport: Transport;

    /// Acquires and configures a link, or fails with [`crate::Error::Transport`].
    fn open(&self, config: &SerialConfig) -> Result<Self::Transport>;
}
