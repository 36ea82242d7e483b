//! Deterministic in-memory link for exercising the protocol without hardware.
//!
//! A [`Loopback`] is a cheap, clonable handle to a shared wire. Hand one clone
//! to a controller as its connector and keep the other to script responses
//! and inspect what was sent:
//!
//! ```
//! use homelink_lib::{air_conditioner::AirConditioner, loopback::Loopback, transport::SerialConfig};
//!
//! let wire = Loopback::new();
//! wire.respond(&[5, 21, 3, 0, 22]);
//!
//! let mut ac = AirConditioner::new(wire.clone(), SerialConfig::new("loopback"));
//! ac.open().unwrap();
//! ac.update();
//!
//! assert_eq!(wire.sent(), vec![0x03, 0x04, 0x05, 0x01, 0x02]);
//! assert_eq!(ac.ambient_temperature(), 21.5);
//! ```
use crate::{
    protocol::Command,
    transport::{Connect, SerialConfig, Transport},
    Error, Result,
};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// A byte written to the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentByte {
    pub byte: u8,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct Wire {
    /// `None` makes the matching read fail.
    responses: VecDeque<Option<u8>>,
    sent: Vec<SentByte>,
    refuse_open: bool,
    fail_writes: bool,
    opened: usize,
    closed: usize,
}

/// Scripted link and its connector.
#[derive(Debug, Clone, Default)]
pub struct Loopback {
    wire: Arc<Mutex<Wire>>,
}

impl Loopback {
    pub fn new() -> Self {
        Self::default()
    }

    fn wire(&self) -> MutexGuard<'_, Wire> {
        self.wire.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues response bytes, answered one per read.
    pub fn respond(&self, bytes: &[u8]) -> &Self {
        self.wire().responses.extend(bytes.iter().copied().map(Some));
        self
    }

    /// Queues one read that fails with a timeout.
    pub fn fail_read(&self) -> &Self {
        self.wire().responses.push_back(None);
        self
    }

    /// Makes every following `open` fail.
    pub fn refuse_open(&self, refuse: bool) {
        self.wire().refuse_open = refuse;
    }

    /// Makes every following write fail.
    pub fn fail_writes(&self, fail: bool) {
        self.wire().fail_writes = fail;
    }

    /// All bytes written so far.
    pub fn sent(&self) -> Vec<u8> {
        self.wire().sent.iter().map(|sent| sent.byte).collect()
    }

    /// All bytes written so far, decoded the way the peripheral sees them.
    pub fn sent_commands(&self) -> Vec<Command> {
        self.wire()
            .sent
            .iter()
            .map(|sent| Command::decode(sent.byte))
            .collect()
    }

    pub fn sent_with_timestamps(&self) -> Vec<SentByte> {
        self.wire().sent.clone()
    }

    pub fn clear_sent(&self) {
        self.wire().sent.clear();
    }

    /// Scripted responses not consumed yet.
    pub fn pending_responses(&self) -> usize {
        self.wire().responses.len()
    }

    /// How many transports were opened.
    pub fn open_count(&self) -> usize {
        self.wire().opened
    }

    /// How many transports were closed.
    pub fn close_count(&self) -> usize {
        self.wire().closed
    }
}

impl Connect for Loopback {
    type Transport = LoopbackTransport;

    fn open(&self, config: &SerialConfig) -> Result<LoopbackTransport> {
        let mut wire = self.wire();
        if wire.refuse_open {
            return Err(Error::Transport {
                path: config.path.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "loopback refused to open"),
            });
        }
        wire.opened += 1;
        Ok(LoopbackTransport {
            wire: self.clone(),
        })
    }
}

/// The transport end of a [`Loopback`].
#[derive(Debug)]
pub struct LoopbackTransport {
    wire: Loopback,
}

impl Transport for LoopbackTransport {
    fn send_byte(&mut self, byte: u8) -> Result<()> {
        let mut wire = self.wire.wire();
        if wire.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "loopback write failed").into());
        }
        wire.sent.push(SentByte {
            byte,
            at: Instant::now(),
        });
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8> {
        match self.wire.wire().responses.pop_front() {
            Some(Some(byte)) => Ok(byte),
            Some(None) | None => {
                Err(io::Error::new(io::ErrorKind::TimedOut, "no response byte").into())
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.wire.wire().closed += 1;
        Ok(())
    }
}
