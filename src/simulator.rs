//! Simulated peripheral firmware.
//!
//! Select it instead of [`crate::serial::SerialConnector`] to run the whole
//! stack without hardware. Each simulated board keeps a register file,
//! answers register requests from it, applies setpoint commands to its own
//! setpoint registers and, with jitter enabled, rolls a fresh random value
//! for its sensor registers on every request.
use crate::{
    protocol::{self as proto, Command},
    transport::{Connect, SerialConfig, Transport},
    Result,
};
use std::io;

/// Which firmware to simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Board {
    AirConditioner,
    Curtain,
}

impl Board {
    /// Registers written by a setpoint command, as (fraction, integer).
    fn setpoint_registers(&self) -> (u8, u8) {
        match self {
            Board::AirConditioner => (
                proto::air_conditioner::DESIRED_TEMPERATURE_FRACTION,
                proto::air_conditioner::DESIRED_TEMPERATURE_INTEGER,
            ),
            Board::Curtain => (
                proto::curtain::POSITION_FRACTION,
                proto::curtain::POSITION_INTEGER,
            ),
        }
    }

    /// Sensor registers and the exclusive upper bound of their random values.
    fn sensor_registers(&self) -> &'static [(u8, u8)] {
        match self {
            Board::AirConditioner => &[
                (proto::air_conditioner::AMBIENT_TEMPERATURE_FRACTION, 10),
                (proto::air_conditioner::AMBIENT_TEMPERATURE_INTEGER, 100),
                (proto::air_conditioner::FAN_SPEED, 100),
            ],
            Board::Curtain => &[
                (proto::curtain::OUTDOOR_TEMPERATURE_FRACTION, 10),
                (proto::curtain::OUTDOOR_TEMPERATURE_INTEGER, 100),
                (proto::curtain::OUTDOOR_PRESSURE, 100),
                (proto::curtain::LIGHT_INTENSITY, 100),
            ],
        }
    }

    fn initial_registers(&self) -> [u8; proto::REGISTER_MAX as usize + 1] {
        let mut registers = [0u8; proto::REGISTER_MAX as usize + 1];
        match self {
            Board::AirConditioner => {
                registers[proto::air_conditioner::DESIRED_TEMPERATURE_INTEGER as usize] = 22;
                registers[proto::air_conditioner::AMBIENT_TEMPERATURE_INTEGER as usize] = 21;
                registers[proto::air_conditioner::AMBIENT_TEMPERATURE_FRACTION as usize] = 5;
                registers[proto::air_conditioner::FAN_SPEED as usize] = 12;
            }
            Board::Curtain => {
                registers[proto::curtain::OUTDOOR_TEMPERATURE_INTEGER as usize] = 14;
                registers[proto::curtain::OUTDOOR_TEMPERATURE_FRACTION as usize] = 2;
                registers[proto::curtain::OUTDOOR_PRESSURE as usize] = 101;
                registers[proto::curtain::LIGHT_INTENSITY as usize] = 35;
            }
        }
        registers
    }
}

/// Connector producing [`SimulatedPeripheral`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Simulator {
    board: Board,
    jitter: bool,
}

impl Simulator {
    pub fn new(board: Board) -> Self {
        Self {
            board,
            jitter: true,
        }
    }

    pub fn air_conditioner() -> Self {
        Self::new(Board::AirConditioner)
    }

    pub fn curtain() -> Self {
        Self::new(Board::Curtain)
    }

    /// With jitter disabled the sensor registers keep their initial values.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }
}

impl Connect for Simulator {
    type Transport = SimulatedPeripheral;

    fn open(&self, config: &SerialConfig) -> Result<SimulatedPeripheral> {
        log::info!(
            "[SIM] {:?} attached to {} at {} baud",
            self.board,
            config.path,
            config.baud_rate
        );
        Ok(SimulatedPeripheral {
            board: self.board,
            jitter: self.jitter,
            registers: self.board.initial_registers(),
            pending_request: None,
            pending_fraction: None,
        })
    }
}

/// One simulated board behind an open link.
#[derive(Debug)]
pub struct SimulatedPeripheral {
    board: Board,
    jitter: bool,
    registers: [u8; proto::REGISTER_MAX as usize + 1],
    pending_request: Option<u8>,
    pending_fraction: Option<u8>,
}

impl SimulatedPeripheral {
    pub fn register(&self, register: u8) -> u8 {
        self.registers
            .get(register as usize)
            .copied()
            .unwrap_or_default()
    }

    fn roll(&mut self, register: u8) {
        if !self.jitter {
            return;
        }
        if let Some((_, bound)) = self
            .board
            .sensor_registers()
            .iter()
            .find(|(sensor, _)| *sensor == register)
        {
            self.registers[register as usize] = rand::random::<u8>() % bound;
        }
    }
}

impl Transport for SimulatedPeripheral {
    fn send_byte(&mut self, byte: u8) -> Result<()> {
        match Command::decode(byte) {
            Command::RegisterRequest(register) => {
                self.roll(register);
                self.pending_request = Some(register);
            }
            Command::SetpointFraction(fraction) => {
                self.pending_fraction = Some(fraction);
            }
            Command::SetpointInteger(integer) => {
                let (fraction_register, integer_register) = self.board.setpoint_registers();
                let fraction = self.pending_fraction.take().unwrap_or_default();
                self.registers[fraction_register as usize] = fraction;
                self.registers[integer_register as usize] = integer;
                log::info!(
                    "[SIM] {:?} setpoint -> {}",
                    self.board,
                    proto::decode_fixed_point(integer, fraction)
                );
            }
            Command::Unknown(byte) => {
                log::debug!("[SIM] {:?} ignores byte {byte:#04x}", self.board);
            }
        }
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8> {
        match self.pending_request.take() {
            Some(register) => Ok(self.register(register)),
            None => Err(io::Error::new(io::ErrorKind::TimedOut, "no register requested").into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn open(simulator: Simulator) -> SimulatedPeripheral {
        simulator.open(&SerialConfig::new("sim")).unwrap()
    }

    fn request(peripheral: &mut SimulatedPeripheral, register: u8) -> u8 {
        peripheral.send_byte(register).unwrap();
        peripheral.read_byte().unwrap()
    }

    #[test]
    fn answers_register_requests() {
        let mut peripheral = open(Simulator::air_conditioner().with_jitter(false));
        assert_eq!(request(&mut peripheral, 0x04), 21);
        assert_eq!(request(&mut peripheral, 0x03), 5);
        assert_eq!(request(&mut peripheral, 0x02), 22);
        // Only one answer per request.
        assert_matches!(peripheral.read_byte(), Err(..));
    }

    #[test]
    fn applies_setpoint_commands() {
        let mut peripheral = open(Simulator::curtain().with_jitter(false));
        for byte in proto::Setpoint::encode(37.5).bytes() {
            peripheral.send_byte(byte).unwrap();
        }
        assert_eq!(request(&mut peripheral, 0x02), 37);
        assert_eq!(request(&mut peripheral, 0x01), 5);
    }

    #[test]
    fn jitter_keeps_values_in_range() {
        let mut peripheral = open(Simulator::air_conditioner());
        for _ in 0..50 {
            assert!(request(&mut peripheral, 0x03) < 10);
            assert!(request(&mut peripheral, 0x05) < 100);
        }
        // Setpoint registers are never rolled.
        assert_eq!(request(&mut peripheral, 0x02), 22);
    }
}
