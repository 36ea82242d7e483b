//! Connection lifecycle and the request/response primitives every peripheral uses.
//!
//! A [`DeviceConnection`] starts disconnected. [`DeviceConnection::open`]
//! acquires a transport from its connector and [`DeviceConnection::close`]
//! releases it again; the transport only exists while connected, so nothing
//! can be sent or received on a closed link.
//!
//! Read failures never surface from [`DeviceConnection::request_register`]:
//! the raw value becomes `0`, exactly like a peripheral reporting zero. The
//! two cases cannot be told apart on the wire, so the connection counts the
//! failures in its [`Diagnostics`] instead.
use crate::{
    protocol::{self as proto, Decode, Register, Setpoint},
    transport::{Connect, SerialConfig, Transport},
    Error, Result,
};
use std::time::Duration;

/// Observable state of a [`DeviceConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Counters for masked link failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Register requests issued while connected.
    pub requests: u64,
    /// Reads that failed and were reported as `0`.
    pub read_failures: u64,
    /// Writes that failed and were dropped.
    pub write_failures: u64,
}

enum State<T> {
    Disconnected,
    Connected(T),
}

/// A link to one peripheral.
pub struct DeviceConnection<C: Connect> {
    connector: C,
    config: SerialConfig,
    command_delay: Duration,
    state: State<C::Transport>,
    diagnostics: Diagnostics,
}

impl<C: Connect> DeviceConnection<C> {
    /// Creates a disconnected connection.
    pub fn new(connector: C, config: SerialConfig) -> Self {
        Self {
            connector,
            config,
            command_delay: proto::COMMAND_DELAY,
            state: State::Disconnected,
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    /// Delay between the two bytes of a setpoint, [`proto::COMMAND_DELAY`] by default.
    pub fn command_delay(&self) -> Duration {
        self.command_delay
    }

    pub fn set_command_delay(&mut self, delay: Duration) {
        self.command_delay = delay;
    }

    pub fn state(&self) -> ConnectionState {
        match self.state {
            State::Disconnected => ConnectionState::Disconnected,
            State::Connected(_) => ConnectionState::Connected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics
    }

    pub fn reset_diagnostics(&mut self) {
        self.diagnostics = Diagnostics::default();
    }

    /// Acquires the transport.
    ///
    /// Opening an already connected link keeps the current transport. On
    /// failure the connection stays disconnected.
    pub fn open(&mut self) -> Result<()> {
        if self.is_connected() {
            log::debug!("{} is already open", self.config.path);
            return Ok(());
        }
        let transport = self.connector.open(&self.config)?;
        log::debug!("Connected to {}", self.config.path);
        self.state = State::Connected(transport);
        Ok(())
    }

    /// Releases the transport.
    ///
    /// Returns `true` if a transport was released and `false` if the
    /// connection was already closed.
    pub fn close(&mut self) -> bool {
        match std::mem::replace(&mut self.state, State::Disconnected) {
            State::Connected(mut transport) => {
                if let Err(err) = transport.close() {
                    log::warn!("Closing {} failed: {err}", self.config.path);
                }
                log::debug!("Disconnected from {}", self.config.path);
                true
            }
            State::Disconnected => false,
        }
    }

    /// Sends `register` and returns the single byte answered.
    ///
    /// Returns `0` while disconnected or if the exchange fails.
    pub fn request_register(&mut self, register: u8) -> u8 {
        let State::Connected(transport) = &mut self.state else {
            return 0;
        };
        self.diagnostics.requests += 1;
        let response = transport
            .send_byte(register)
            .and_then(|_| transport.read_byte());
        match response {
            Ok(byte) => {
                log::trace!("{} register {register:#04x} -> {byte}", self.config.path);
                byte
            }
            Err(err) => {
                self.diagnostics.read_failures += 1;
                log::warn!(
                    "{} register {register:#04x} failed, using 0: {err}",
                    self.config.path
                );
                0
            }
        }
    }

    /// Transmits one raw byte. No-op while disconnected.
    pub fn send_command_byte(&mut self, byte: u8) {
        let State::Connected(transport) = &mut self.state else {
            return;
        };
        log::trace!("{} <- {byte:#010b}", self.config.path);
        if let Err(err) = transport.send_byte(byte) {
            self.diagnostics.write_failures += 1;
            log::warn!("{} write of {byte:#04x} failed: {err}", self.config.path);
        }
    }

    /// Encodes `value` and sends the fraction byte, waits the command delay,
    /// then sends the integer byte.
    pub fn send_setpoint(&mut self, value: f32) -> Result<Setpoint> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        if !proto::setpoint_in_range(value) {
            log::warn!("Setpoint {value} is outside the 6 bit range and will wrap");
        }
        let setpoint = Setpoint::encode(value);
        log::debug!(
            "{} setpoint {value} -> [{:#010b}, {:#010b}]",
            self.config.path,
            setpoint.fraction,
            setpoint.integer
        );
        self.send_command_byte(setpoint.fraction);
        std::thread::sleep(self.command_delay);
        self.send_command_byte(setpoint.integer);
        Ok(setpoint)
    }

    /// Reads every entry of `map` strictly in order.
    ///
    /// A failed read does not stop the poll; the entry is decoded from `0`.
    /// Returns `None` without touching the link while disconnected.
    pub fn poll<Q: Copy>(&mut self, map: &[Register<Q>]) -> Option<Vec<(Q, f32)>> {
        if !self.is_connected() {
            return None;
        }
        let readings = map
            .iter()
            .map(|entry| {
                let value = match entry.decode {
                    Decode::FixedPoint { fraction, integer } => {
                        let fraction = self.request_register(fraction);
                        let integer = self.request_register(integer);
                        proto::decode_fixed_point(integer, fraction)
                    }
                    Decode::Raw(register) => self.request_register(register) as f32,
                    Decode::Scaled { register, factor } => {
                        self.request_register(register) as f32 * factor
                    }
                };
                (entry.quantity, value)
            })
            .collect();
        Some(readings)
    }
}

impl<C: Connect> Drop for DeviceConnection<C> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<C: Connect + std::fmt::Debug> std::fmt::Debug for DeviceConnection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceConnection")
            .field("connector", &self.connector)
            .field("config", &self.config)
            .field("state", &self.state())
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::Loopback;
    use crate::protocol::{AirConditionerQuantity, AIR_CONDITIONER_REGISTERS};
    use assert_matches::assert_matches;

    fn connection(wire: &Loopback) -> DeviceConnection<Loopback> {
        DeviceConnection::new(wire.clone(), SerialConfig::new("loopback"))
    }

    #[test]
    fn lifecycle() {
        let wire = Loopback::new();
        let mut conn = connection(&wire);
        assert_eq!(conn.state(), ConnectionState::Disconnected);

        conn.open().unwrap();
        assert_eq!(conn.state(), ConnectionState::Connected);
        // A second open keeps the transport.
        conn.open().unwrap();
        assert_eq!(wire.open_count(), 1);

        assert!(conn.close());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(!conn.close());
        assert_eq!(wire.close_count(), 1);

        conn.open().unwrap();
        assert_eq!(wire.open_count(), 2);
    }

    #[test]
    fn failed_open_stays_disconnected() {
        let wire = Loopback::new();
        wire.refuse_open(true);
        let mut conn = connection(&wire);
        assert_matches!(conn.open(), Err(Error::Transport { .. }));
        assert!(!conn.is_connected());
        assert!(!conn.close());
    }

    #[test]
    fn drop_releases_transport() {
        let wire = Loopback::new();
        {
            let mut conn = connection(&wire);
            conn.open().unwrap();
        }
        assert_eq!(wire.close_count(), 1);
    }

    #[test]
    fn disconnected_primitives_are_inert() {
        let wire = Loopback::new();
        wire.respond(&[42]);
        let mut conn = connection(&wire);

        assert_eq!(conn.request_register(0x03), 0);
        conn.send_command_byte(0xC5);
        assert_matches!(conn.send_setpoint(23.5), Err(Error::NotConnected));
        assert!(conn.poll(&AIR_CONDITIONER_REGISTERS).is_none());

        assert!(wire.sent().is_empty());
        assert_eq!(wire.pending_responses(), 1);
        assert_eq!(conn.diagnostics(), Diagnostics::default());
    }

    #[test]
    fn read_failure_is_masked_and_counted() {
        let wire = Loopback::new();
        wire.respond(&[17]).fail_read();
        let mut conn = connection(&wire);
        conn.open().unwrap();

        assert_eq!(conn.request_register(0x05), 17);
        assert_eq!(conn.request_register(0x05), 0);
        // Nothing scripted: transport timeout.
        assert_eq!(conn.request_register(0x05), 0);

        assert_eq!(
            conn.diagnostics(),
            Diagnostics {
                requests: 3,
                read_failures: 2,
                write_failures: 0,
            }
        );
        conn.reset_diagnostics();
        assert_eq!(conn.diagnostics(), Diagnostics::default());
    }

    #[test]
    fn write_failure_is_counted() {
        let wire = Loopback::new();
        let mut conn = connection(&wire);
        conn.open().unwrap();
        wire.fail_writes(true);

        conn.send_command_byte(0x80);
        assert_eq!(conn.request_register(0x01), 0);
        assert_eq!(conn.diagnostics().write_failures, 1);
        assert_eq!(conn.diagnostics().read_failures, 1);
    }

    #[test]
    fn setpoint_bytes_and_delay() {
        let wire = Loopback::new();
        let mut conn = connection(&wire);
        conn.set_command_delay(Duration::from_millis(20));
        conn.open().unwrap();

        let setpoint = conn.send_setpoint(23.5).unwrap();
        assert_eq!(setpoint.bytes(), [0b1000_0101, 0b1101_0111]);

        let sent = wire.sent_with_timestamps();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].byte, 0b1000_0101);
        assert_eq!(sent[1].byte, 0b1101_0111);
        assert!(sent[1].at.duration_since(sent[0].at) >= Duration::from_millis(20));
    }

    #[test]
    fn poll_keeps_going_after_failures() {
        let wire = Loopback::new();
        // ambient fraction fails, everything else answers
        wire.fail_read().respond(&[20, 4, 1, 23]);
        let mut conn = connection(&wire);
        conn.open().unwrap();

        let readings = conn.poll(&AIR_CONDITIONER_REGISTERS).unwrap();
        assert_eq!(wire.sent(), vec![0x03, 0x04, 0x05, 0x01, 0x02]);
        assert_eq!(
            readings,
            vec![
                (AirConditionerQuantity::AmbientTemperature, 20.0),
                (AirConditionerQuantity::FanSpeed, 4.0),
                (AirConditionerQuantity::DesiredTemperature, 23.1),
            ]
        );
        assert_eq!(conn.diagnostics().read_failures, 1);
    }
}
