//! Air-conditioner controller: ambient temperature, desired temperature and fan speed.
//!
//! ## Example
//!
//! ```no_run
//! use homelink_lib::{
//!     air_conditioner::AirConditioner, serial::SerialConnector, transport::SerialConfig,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut ac = AirConditioner::new(SerialConnector, SerialConfig::new("/dev/ttyUSB0"));
//!     ac.open()?;
//!
//!     ac.update();
//!     println!("{}", ac.readings());
//!
//!     ac.set_desired_temp(23.5)?;
//!     Ok(())
//! }
//! ```
use crate::{
    connection::DeviceConnection,
    protocol::{AirConditionerQuantity, AIR_CONDITIONER_REGISTERS},
    transport::{Connect, SerialConfig},
    Result,
};
use std::fmt;

/// Snapshot of the stored air-conditioner values.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AirConditionerReadings {
    /// °C
    pub ambient_temperature: f32,
    /// °C
    pub desired_temperature: f32,
    /// Revolutions per second.
    pub fan_speed: u8,
}

impl fmt::Display for AirConditionerReadings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ambient {:.1} °C, desired {:.1} °C, fan {} rps",
            self.ambient_temperature, self.desired_temperature, self.fan_speed
        )
    }
}

/// Air-conditioner peripheral behind its own connection.
#[derive(Debug)]
pub struct AirConditioner<C: Connect> {
    connection: DeviceConnection<C>,
    readings: AirConditionerReadings,
}

impl<C: Connect> AirConditioner<C> {
    pub fn new(connector: C, config: SerialConfig) -> Self {
        Self {
            connection: DeviceConnection::new(connector, config),
            readings: AirConditionerReadings::default(),
        }
    }

    pub fn open(&mut self) -> Result<()> {
        self.connection.open()
    }

    pub fn close(&mut self) -> bool {
        self.connection.close()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn connection(&self) -> &DeviceConnection<C> {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut DeviceConnection<C> {
        &mut self.connection
    }

    /// Re-reads every register: ambient temperature, fan speed, desired temperature.
    ///
    /// Does nothing while disconnected.
    pub fn update(&mut self) {
        let Some(values) = self.connection.poll(&AIR_CONDITIONER_REGISTERS) else {
            log::debug!("Air conditioner is not connected, keeping previous values");
            return;
        };
        for (quantity, value) in values {
            match quantity {
                AirConditionerQuantity::AmbientTemperature => {
                    self.readings.ambient_temperature = value
                }
                AirConditionerQuantity::FanSpeed => self.readings.fan_speed = value as u8,
                AirConditionerQuantity::DesiredTemperature => {
                    self.readings.desired_temperature = value
                }
            }
        }
        log::debug!("Air conditioner: {}", self.readings);
    }

    /// Sends a new desired temperature and stores it without waiting for confirmation.
    ///
    /// # Errors
    ///
    /// [`crate::Error::NotConnected`] if the connection is closed.
    pub fn set_desired_temp(&mut self, value: f32) -> Result<()> {
        self.connection.send_setpoint(value)?;
        self.readings.desired_temperature = value;
        Ok(())
    }

    pub fn ambient_temperature(&self) -> f32 {
        self.readings.ambient_temperature
    }

    pub fn desired_temperature(&self) -> f32 {
        self.readings.desired_temperature
    }

    pub fn fan_speed(&self) -> u8 {
        self.readings.fan_speed
    }

    pub fn readings(&self) -> AirConditionerReadings {
        self.readings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{loopback::Loopback, protocol::Command, Error};
    use assert_matches::assert_matches;
    use std::time::Duration;

    fn connected() -> (AirConditioner<Loopback>, Loopback) {
        let wire = Loopback::new();
        let mut ac = AirConditioner::new(wire.clone(), SerialConfig::new("loopback"));
        ac.open().unwrap();
        (ac, wire)
    }

    #[test]
    fn update_requests_registers_in_order() {
        let (mut ac, wire) = connected();
        wire.respond(&[5, 21, 30, 0, 24]);
        ac.update();

        assert_eq!(wire.sent(), vec![0x03, 0x04, 0x05, 0x01, 0x02]);
        assert_eq!(ac.ambient_temperature(), 21.5);
        assert_eq!(ac.fan_speed(), 30);
        assert_eq!(ac.desired_temperature(), 24.0);
    }

    #[test]
    fn update_is_a_full_resync() {
        let (mut ac, wire) = connected();
        wire.respond(&[5, 21, 30, 0, 24]);
        ac.update();
        wire.clear_sent();

        // Fan speed read fails this time.
        wire.respond(&[2, 22]).fail_read().respond(&[5, 24]);
        ac.update();
        assert_eq!(wire.sent(), vec![0x03, 0x04, 0x05, 0x01, 0x02]);
        assert_eq!(ac.ambient_temperature(), 22.2);
        assert_eq!(ac.fan_speed(), 0);
        assert_eq!(ac.desired_temperature(), 24.5);
        assert_eq!(ac.connection().diagnostics().read_failures, 1);
    }

    #[test]
    fn update_while_disconnected_keeps_values() {
        let (mut ac, wire) = connected();
        wire.respond(&[5, 21, 30, 0, 24]);
        ac.update();
        assert!(ac.close());
        wire.clear_sent();

        wire.respond(&[1, 1, 1, 1, 1]);
        ac.update();
        assert!(wire.sent().is_empty());
        assert_eq!(
            ac.readings(),
            AirConditionerReadings {
                ambient_temperature: 21.5,
                desired_temperature: 24.0,
                fan_speed: 30,
            }
        );
    }

    #[test]
    fn set_desired_temp_sends_fraction_then_integer() {
        let (mut ac, wire) = connected();
        ac.set_desired_temp(23.5).unwrap();

        let sent = wire.sent_with_timestamps();
        assert_eq!(
            sent.iter().map(|sent| sent.byte).collect::<Vec<_>>(),
            vec![0b1000_0101, 0b1101_0111]
        );
        assert!(sent[1].at.duration_since(sent[0].at) >= Duration::from_millis(50));
        assert_eq!(ac.desired_temperature(), 23.5);
    }

    #[test]
    fn set_desired_temp_wraps_out_of_range_values() {
        let (mut ac, wire) = connected();
        ac.connection_mut().set_command_delay(Duration::ZERO);
        ac.set_desired_temp(70.5).unwrap();

        assert_eq!(
            wire.sent_commands(),
            vec![Command::SetpointFraction(5), Command::SetpointInteger(6)]
        );
        // The stored value is what the operator asked for.
        assert_eq!(ac.desired_temperature(), 70.5);
    }

    #[test]
    fn set_desired_temp_fails_while_disconnected() {
        let wire = Loopback::new();
        let mut ac = AirConditioner::new(wire.clone(), SerialConfig::new("loopback"));
        assert_matches!(ac.set_desired_temp(23.5), Err(Error::NotConnected));
        assert!(wire.sent().is_empty());
        assert_eq!(ac.desired_temperature(), 0.0);
    }
}
