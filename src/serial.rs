//! Platform serial port transport built on `tokio-serial`'s blocking port.
use crate::{
    protocol as proto,
    transport::{Connect, SerialConfig, Transport},
    Error, Result,
};
use std::io::{Read, Write};
use tokio_serial::SerialPort as _;

/// The parity used for serial communication.
pub const PARITY: &tokio_serial::Parity = &tokio_serial::Parity::None;
/// The number of stop bits used for serial communication.
pub const STOP_BITS: &tokio_serial::StopBits = &tokio_serial::StopBits::One;
/// The number of data bits used for serial communication.
pub const DATA_BITS: &tokio_serial::DataBits = &tokio_serial::DataBits::Eight;

/// Creates a `tokio_serial::SerialPortBuilder` with 8N1 framing and no flow control.
///
/// # Arguments
///
/// * `device` - The path to the serial port device (e.g., `/dev/ttyUSB0`).
/// * `baud_rate` - The baud rate for the serial communication.
pub fn serial_port_builder(
    device: &str,
    baud_rate: &proto::BaudRate,
) -> tokio_serial::SerialPortBuilder {
    tokio_serial::new(device, u32::from(*baud_rate))
        .parity(*PARITY)
        .stop_bits(*STOP_BITS)
        .data_bits(*DATA_BITS)
        .flow_control(tokio_serial::FlowControl::None)
}

/// Opens [`SerialTransport`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialConnector;

impl Connect for SerialConnector {
    type Transport = SerialTransport;

    fn open(&self, config: &SerialConfig) -> Result<SerialTransport> {
        let port = serial_port_builder(&config.path, &config.baud_rate)
            .timeout(config.timeout)
            .open()
            .map_err(|err| Error::Transport {
                path: config.path.clone(),
                source: err.into(),
            })?;
        // Bytes left over from a previous session would shift every response.
        if let Err(err) = port.clear(tokio_serial::ClearBuffer::All) {
            log::warn!("Cannot clear buffers of {}: {err}", config.path);
        }
        log::debug!(
            "Opened serial port {} at {} baud, timeout {:?}",
            config.path,
            config.baud_rate,
            config.timeout
        );
        Ok(SerialTransport {
            path: config.path.clone(),
            port,
        })
    }
}

/// An open serial port.
pub struct SerialTransport {
    path: String,
    port: Box<dyn tokio_serial::SerialPort>,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Transport for SerialTransport {
    fn send_byte(&mut self, byte: u8) -> Result<()> {
        self.port.write_all(&[byte])?;
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8> {
        let mut buffer = [0u8; 1];
        self.port.read_exact(&mut buffer)?;
        Ok(buffer[0])
    }

    fn close(&mut self) -> Result<()> {
        log::debug!("Closing serial port {}", self.path);
        self.port.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn open_missing_device_fails() {
        let config = SerialConfig::new("/dev/homelink-does-not-exist");
        assert_matches!(
            SerialConnector.open(&config),
            Err(Error::Transport { path, .. }) if path == "/dev/homelink-does-not-exist"
        );
    }
}
