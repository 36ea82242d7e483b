//! Curtain controller: curtain position plus the outdoor sensors of the same board.
use crate::{
    connection::DeviceConnection,
    protocol::{CurtainQuantity, PositionEncoding},
    transport::{Connect, SerialConfig},
    Result,
};
use std::fmt;

/// Snapshot of the stored curtain-board values.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CurtainReadings {
    /// Percent closed.
    pub curtain_status: f32,
    /// °C
    pub outdoor_temperature: f32,
    /// hPa
    pub outdoor_pressure: f32,
    /// Lux
    pub light_intensity: f32,
}

impl fmt::Display for CurtainReadings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "curtain {:.1} %, outdoor {:.1} °C, {:.0} hPa, {:.0} lux",
            self.curtain_status,
            self.outdoor_temperature,
            self.outdoor_pressure,
            self.light_intensity
        )
    }
}

/// Curtain peripheral behind its own connection.
#[derive(Debug)]
pub struct Curtain<C: Connect> {
    connection: DeviceConnection<C>,
    position_encoding: PositionEncoding,
    readings: CurtainReadings,
}

impl<C: Connect> Curtain<C> {
    /// Creates a controller reading the position as [`PositionEncoding::FixedPoint`].
    pub fn new(connector: C, config: SerialConfig) -> Self {
        Self::with_position_encoding(connector, config, PositionEncoding::default())
    }

    pub fn with_position_encoding(
        connector: C,
        config: SerialConfig,
        position_encoding: PositionEncoding,
    ) -> Self {
        Self {
            connection: DeviceConnection::new(connector, config),
            position_encoding,
            readings: CurtainReadings::default(),
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

    pub fn position_encoding(&self) -> PositionEncoding {
        self.position_encoding
    }

    /// Re-reads outdoor temperature, curtain position, pressure and light intensity.
    ///
    /// Does nothing while disconnected.
    pub fn update(&mut self) {
        let map = self.position_encoding.register_map();
        let Some(values) = self.connection.poll(map) else {
            log::debug!("Curtain is not connected, keeping previous values");
            return;
        };
        for (quantity, value) in values {
            match quantity {
                CurtainQuantity::OutdoorTemperature => self.readings.outdoor_temperature = value,
                CurtainQuantity::Position => self.readings.curtain_status = value,
                CurtainQuantity::OutdoorPressure => self.readings.outdoor_pressure = value,
                CurtainQuantity::LightIntensity => self.readings.light_intensity = value,
            }
        }
        log::debug!("Curtain: {}", self.readings);
    }

    /// Sends a new curtain position (percent) and stores it without waiting for confirmation.
    ///
    /// The position goes out in the same two-byte form as every other
    /// setpoint, tenths included.
    ///
    /// # Errors
    ///
    /// [`crate::Error::NotConnected`] if the connection is closed.
    pub fn set_curtain_status(&mut self, value: f32) -> Result<()> {
        self.connection.send_setpoint(value)?;
        self.readings.curtain_status = value;
        Ok(())
    }

    pub fn curtain_status(&self) -> f32 {
        self.readings.curtain_status
    }

    pub fn outdoor_temperature(&self) -> f32 {
        self.readings.outdoor_temperature
    }

    pub fn outdoor_pressure(&self) -> f32 {
        self.readings.outdoor_pressure
    }

    pub fn light_intensity(&self) -> f32 {
        self.readings.light_intensity
    }

    pub fn readings(&self) -> CurtainReadings {
        self.readings
    }
}
