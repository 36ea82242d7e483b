//! Byte-level protocol shared by the home-automation peripherals.
//!
//! Telemetry is polled one register at a time: the host sends a single
//! request byte in the range `0x01..=0x08` and the peripheral answers with a
//! single raw byte. Quantities that need a decimal place are split over two
//! registers, an integer part and a fractional part in tenths.
//!
//! Setpoints travel the other way as one or two control bytes whose two high
//! bits carry a tag:
//!
//! | Byte pattern | Meaning |
//! |---|---|
//! | `0b10xxxxxx` | fractional part (tenths) in the low 6 bits |
//! | `0b11xxxxxx` | integer part in the low 6 bits |
//!
//! Both payloads are masked to 6 bits, so values outside `0..64` wrap
//! silently. This mirrors the peripheral firmware and is kept as is.
use crate::Error;
use std::fmt;
use std::time::Duration;

/// Tag of a setpoint byte that carries the fractional part.
pub const SETPOINT_FRACTION_TAG: u8 = 0b1000_0000;
/// Tag of a setpoint byte that carries the integer part.
pub const SETPOINT_INTEGER_TAG: u8 = 0b1100_0000;
/// Mask selecting the tag bits of a control byte.
pub const SETPOINT_TAG_MASK: u8 = 0b1100_0000;
/// Mask selecting the 6 bit payload of a setpoint byte.
pub const SETPOINT_PAYLOAD_MASK: u8 = 0b0011_1111;

/// Smallest register request code.
pub const REGISTER_MIN: u8 = 0x01;
/// Largest register request code.
pub const REGISTER_MAX: u8 = 0x08;

/// Minimum spacing between the two bytes of one setpoint.
pub const COMMAND_DELAY: Duration = Duration::from_millis(50);

/// Smallest setpoint that survives the 6 bit mask unchanged.
pub const SETPOINT_MIN: f32 = 0.0;
/// Upper bound (exclusive) of setpoints that survive the 6 bit mask unchanged.
pub const SETPOINT_MAX: f32 = 64.0;

/// Reconstructs a two-register telemetry value: `integer + fraction / 10`.
pub fn decode_fixed_point(integer: u8, fraction: u8) -> f32 {
    integer as f32 + fraction as f32 / 10.0
}

/// Returns `true` if `value` can be sent without being wrapped by the mask.
pub fn setpoint_in_range(value: f32) -> bool {
    (SETPOINT_MIN..SETPOINT_MAX).contains(&value)
}

/// The two control bytes of one setpoint command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setpoint {
    /// `0b10` tagged byte, sent first.
    pub fraction: u8,
    /// `0b11` tagged byte, sent after [`COMMAND_DELAY`].
    pub integer: u8,
}

impl Setpoint {
    /// Splits `value` into integer part and tenths and packs both.
    ///
    /// Both parts are truncated towards negative infinity and then masked to
    /// 6 bits; `70.5` is therefore sent as `6.5`.
    pub fn encode(value: f32) -> Self {
        let integer_part = value.floor();
        let fraction_part = ((value - integer_part) * 10.0).floor();
        Self {
            fraction: SETPOINT_FRACTION_TAG | (fraction_part as i32 & 0x3F) as u8,
            integer: SETPOINT_INTEGER_TAG | (integer_part as i32 & 0x3F) as u8,
        }
    }

    /// The bytes in the order the firmware expects them on the wire.
    pub fn bytes(&self) -> [u8; 2] {
        [self.fraction, self.integer]
    }

    /// The value the peripheral reconstructs from this command.
    pub fn value(&self) -> f32 {
        decode_fixed_point(
            self.integer & SETPOINT_PAYLOAD_MASK,
            self.fraction & SETPOINT_PAYLOAD_MASK,
        )
    }
}

/// Shorthand for [`Setpoint::encode`].
pub fn encode_setpoint(value: f32) -> Setpoint {
    Setpoint::encode(value)
}

/// Classification of a single byte as seen by the peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    RegisterRequest(u8),
    SetpointFraction(u8),
    SetpointInteger(u8),
    Unknown(u8),
}

impl Command {
    pub fn decode(byte: u8) -> Self {
        match byte & SETPOINT_TAG_MASK {
            SETPOINT_INTEGER_TAG => Command::SetpointInteger(byte & SETPOINT_PAYLOAD_MASK),
            SETPOINT_FRACTION_TAG => Command::SetpointFraction(byte & SETPOINT_PAYLOAD_MASK),
            _ if (REGISTER_MIN..=REGISTER_MAX).contains(&byte) => Command::RegisterRequest(byte),
            _ => Command::Unknown(byte),
        }
    }
}

/// How one quantity is reconstructed from register reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decode {
    /// Two registers, requested fraction first: `integer + fraction / 10`.
    FixedPoint { fraction: u8, integer: u8 },
    /// One register taken as is.
    Raw(u8),
    /// One register multiplied by a constant factor.
    Scaled { register: u8, factor: f32 },
}

impl Decode {
    /// The request codes in the order they go on the wire.
    pub fn requests(&self) -> Vec<u8> {
        match *self {
            Decode::FixedPoint { fraction, integer } => vec![fraction, integer],
            Decode::Raw(register) | Decode::Scaled { register, .. } => vec![register],
        }
    }
}

/// One entry of a peripheral register map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Register<Q> {
    pub quantity: Q,
    pub decode: Decode,
}

/// Request codes in the order a full poll of `map` sends them.
pub fn wire_order<Q>(map: &[Register<Q>]) -> Vec<u8> {
    map.iter().flat_map(|entry| entry.decode.requests()).collect()
}

/// Register codes of the air-conditioner controller.
pub mod air_conditioner {
    pub const DESIRED_TEMPERATURE_FRACTION: u8 = 0x01;
    pub const DESIRED_TEMPERATURE_INTEGER: u8 = 0x02;
    pub const AMBIENT_TEMPERATURE_FRACTION: u8 = 0x03;
    pub const AMBIENT_TEMPERATURE_INTEGER: u8 = 0x04;
    pub const FAN_SPEED: u8 = 0x05;
}

/// Register codes of the curtain controller.
pub mod curtain {
    pub const POSITION_FRACTION: u8 = 0x01;
    pub const POSITION_INTEGER: u8 = 0x02;
    pub const OUTDOOR_TEMPERATURE_FRACTION: u8 = 0x03;
    pub const OUTDOOR_TEMPERATURE_INTEGER: u8 = 0x04;
    pub const OUTDOOR_PRESSURE: u8 = 0x06;
    pub const LIGHT_INTENSITY: u8 = 0x08;
    /// Pressure and light intensity registers report tens of their unit.
    pub const SCALE_FACTOR: f32 = 10.0;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AirConditionerQuantity {
    AmbientTemperature,
    FanSpeed,
    DesiredTemperature,
}

/// Poll order of the air-conditioner controller.
///
/// The firmware multiplexes on request order, keep it as is.
pub const AIR_CONDITIONER_REGISTERS: [Register<AirConditionerQuantity>; 3] = [
    Register {
        quantity: AirConditionerQuantity::AmbientTemperature,
        decode: Decode::FixedPoint {
            fraction: air_conditioner::AMBIENT_TEMPERATURE_FRACTION,
            integer: air_conditioner::AMBIENT_TEMPERATURE_INTEGER,
        },
    },
    Register {
        quantity: AirConditionerQuantity::FanSpeed,
        decode: Decode::Raw(air_conditioner::FAN_SPEED),
    },
    Register {
        quantity: AirConditionerQuantity::DesiredTemperature,
        decode: Decode::FixedPoint {
            fraction: air_conditioner::DESIRED_TEMPERATURE_FRACTION,
            integer: air_conditioner::DESIRED_TEMPERATURE_INTEGER,
        },
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurtainQuantity {
    OutdoorTemperature,
    Position,
    OutdoorPressure,
    LightIntensity,
}

const OUTDOOR_TEMPERATURE: Register<CurtainQuantity> = Register {
    quantity: CurtainQuantity::OutdoorTemperature,
    decode: Decode::FixedPoint {
        fraction: curtain::OUTDOOR_TEMPERATURE_FRACTION,
        integer: curtain::OUTDOOR_TEMPERATURE_INTEGER,
    },
};

const OUTDOOR_PRESSURE: Register<CurtainQuantity> = Register {
    quantity: CurtainQuantity::OutdoorPressure,
    decode: Decode::Scaled {
        register: curtain::OUTDOOR_PRESSURE,
        factor: curtain::SCALE_FACTOR,
    },
};

const LIGHT_INTENSITY: Register<CurtainQuantity> = Register {
    quantity: CurtainQuantity::LightIntensity,
    decode: Decode::Scaled {
        register: curtain::LIGHT_INTENSITY,
        factor: curtain::SCALE_FACTOR,
    },
};

/// Curtain poll order with the position read as two fixed-point registers.
pub const CURTAIN_REGISTERS_FIXED_POINT: [Register<CurtainQuantity>; 4] = [
    OUTDOOR_TEMPERATURE,
    Register {
        quantity: CurtainQuantity::Position,
        decode: Decode::FixedPoint {
            fraction: curtain::POSITION_FRACTION,
            integer: curtain::POSITION_INTEGER,
        },
    },
    OUTDOOR_PRESSURE,
    LIGHT_INTENSITY,
];

/// Curtain poll order with the position read as a single whole percentage.
pub const CURTAIN_REGISTERS_WHOLE_PERCENT: [Register<CurtainQuantity>; 4] = [
    OUTDOOR_TEMPERATURE,
    Register {
        quantity: CurtainQuantity::Position,
        decode: Decode::Raw(curtain::POSITION_INTEGER),
    },
    OUTDOOR_PRESSURE,
    LIGHT_INTENSITY,
];

/// How the curtain firmware reports its position.
///
/// Firmware revisions differ: some answer the position as integer and tenths
/// on `0x02`/`0x01`, others only expose the whole percentage on `0x02`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum PositionEncoding {
    #[default]
    FixedPoint,
    WholePercent,
}

impl PositionEncoding {
    pub fn register_map(&self) -> &'static [Register<CurtainQuantity>] {
        match self {
            PositionEncoding::FixedPoint => &CURTAIN_REGISTERS_FIXED_POINT,
            PositionEncoding::WholePercent => &CURTAIN_REGISTERS_WHOLE_PERCENT,
        }
    }
}

impl fmt::Display for PositionEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionEncoding::FixedPoint => write!(f, "fixed-point"),
            PositionEncoding::WholePercent => write!(f, "whole-percent"),
        }
    }
}

/// Supported serial baud rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "u32", into = "u32")
)]
pub enum BaudRate {
    B1200,
    B2400,
    B4800,
    #[default]
    B9600,
    B19200,
    B38400,
    B57600,
    B115200,
}

impl BaudRate {
    pub const ALL: [BaudRate; 8] = [
        BaudRate::B1200,
        BaudRate::B2400,
        BaudRate::B4800,
        BaudRate::B9600,
        BaudRate::B19200,
        BaudRate::B38400,
        BaudRate::B57600,
        BaudRate::B115200,
    ];
}

impl From<BaudRate> for u32 {
    fn from(baud_rate: BaudRate) -> u32 {
        match baud_rate {
            BaudRate::B1200 => 1200,
            BaudRate::B2400 => 2400,
            BaudRate::B4800 => 4800,
            BaudRate::B9600 => 9600,
            BaudRate::B19200 => 19200,
            BaudRate::B38400 => 38400,
            BaudRate::B57600 => 57600,
            BaudRate::B115200 => 115200,
        }
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        BaudRate::ALL
            .into_iter()
            .find(|baud_rate| u32::from(*baud_rate) == value)
            .ok_or(Error::BaudRateOutOfRange(value))
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u32::from(*self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn fixed_point_decode() {
        assert_eq!(decode_fixed_point(23, 5), 23.5);
        assert_eq!(decode_fixed_point(0, 0), 0.0);
        assert_eq!(decode_fixed_point(99, 9), 99.9);
        // Out of range tenths are not clamped.
        assert_eq!(decode_fixed_point(1, 25), 3.5);

        for integer in 0..=99u8 {
            for fraction in 0..=99u8 {
                assert_eq!(
                    decode_fixed_point(integer, fraction),
                    integer as f32 + fraction as f32 / 10.0
                );
            }
        }
    }

    #[test]
    fn setpoint_encode() {
        let setpoint = Setpoint::encode(23.5);
        assert_eq!(setpoint.fraction, 0b1000_0101);
        assert_eq!(setpoint.integer, 0b1101_0111);
        assert_eq!(setpoint.bytes(), [0b1000_0101, 0b1101_0111]);

        assert_eq!(Setpoint::encode(0.0).bytes(), [0x80, 0xC0]);
        assert_eq!(Setpoint::encode(63.9).bytes(), [0x89, 0xFF]);
        assert_eq!(Setpoint::encode(18.0).bytes(), [0x80, 0xC0 | 18]);
    }

    #[test]
    fn setpoint_mask_truncates() {
        // 70 & 0x3F == 6
        let setpoint = encode_setpoint(70.5);
        assert_eq!(setpoint.integer, 0b1100_0110);
        assert_eq!(setpoint.fraction, 0b1000_0101);
        assert_eq!(setpoint.value(), 6.5);

        assert_eq!(encode_setpoint(64.0).integer, SETPOINT_INTEGER_TAG);
        assert!(!setpoint_in_range(70.5));
        assert!(!setpoint_in_range(-0.1));
        assert!(setpoint_in_range(63.9));
    }

    #[test]
    fn setpoint_round_trip_within_a_tenth() {
        for integer in 0..=63u8 {
            for tenth in 0..=9u8 {
                let value = integer as f32 + tenth as f32 / 10.0;
                let decoded = Setpoint::encode(value).value();
                assert!(
                    (decoded - value).abs() <= 0.1 + f32::EPSILON * 64.0,
                    "{value} decoded as {decoded}"
                );
            }
        }
    }

    #[test]
    fn command_classification() {
        assert_eq!(Command::decode(0x03), Command::RegisterRequest(0x03));
        assert_eq!(Command::decode(0x08), Command::RegisterRequest(0x08));
        assert_eq!(Command::decode(0x00), Command::Unknown(0x00));
        assert_eq!(Command::decode(0x09), Command::Unknown(0x09));
        assert_eq!(Command::decode(0b1000_0101), Command::SetpointFraction(5));
        assert_eq!(Command::decode(0b1101_0111), Command::SetpointInteger(23));
    }

    #[test]
    fn register_map_wire_order() {
        assert_eq!(
            wire_order(&AIR_CONDITIONER_REGISTERS),
            vec![0x03, 0x04, 0x05, 0x01, 0x02]
        );
        assert_eq!(
            wire_order(PositionEncoding::FixedPoint.register_map()),
            vec![0x03, 0x04, 0x01, 0x02, 0x06, 0x08]
        );
        assert_eq!(
            wire_order(PositionEncoding::WholePercent.register_map()),
            vec![0x03, 0x04, 0x02, 0x06, 0x08]
        );
    }

    #[test]
    fn baud_rate() {
        assert_matches!(BaudRate::try_from(9600), Ok(BaudRate::B9600));
        assert_matches!(BaudRate::try_from(115200), Ok(BaudRate::B115200));
        assert_matches!(
            BaudRate::try_from(9601),
            Err(Error::BaudRateOutOfRange(9601))
        );
        assert_eq!(BaudRate::default(), BaudRate::B9600);
        assert_eq!(BaudRate::B19200.to_string(), "19200");
    }
}
