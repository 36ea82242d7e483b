use crate::mqtt::MqttConfig;
use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use homelink_lib::{protocol as proto, transport::SerialConfig};
use std::time::Duration;

fn default_ac_device() -> String {
    if cfg!(target_os = "windows") {
        String::from("COM3")
    } else {
        String::from("/dev/ttyUSB0")
    }
}

fn default_curtain_device() -> String {
    if cfg!(target_os = "windows") {
        String::from("COM4")
    } else {
        String::from("/dev/ttyUSB1")
    }
}

fn parse_baud_rate(s: &str) -> Result<proto::BaudRate, String> {
    let rate_val = s
        .parse::<u32>()
        .map_err(|e| format!("Invalid baud rate number format: {e}"))?;
    proto::BaudRate::try_from(rate_val).map_err(|e| e.to_string())
}

fn parse_register(s: &str) -> Result<u8, String> {
    let register =
        clap_num::maybe_hex::<u8>(s).map_err(|e| format!("Invalid register format: {e}"))?;
    if (proto::REGISTER_MIN..=proto::REGISTER_MAX).contains(&register) {
        Ok(register)
    } else {
        Err(format!(
            "Register {register:#04x} is outside {:#04x}..={:#04x}",
            proto::REGISTER_MIN,
            proto::REGISTER_MAX
        ))
    }
}

fn parse_byte(s: &str) -> Result<u8, String> {
    clap_num::maybe_hex::<u8>(s).map_err(|e| format!("Invalid byte format: {e}"))
}

fn parse_setpoint(s: &str) -> Result<f32, String> {
    let value = s
        .parse::<f32>()
        .map_err(|e| format!("Invalid setpoint format: {e}"))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(String::from("Setpoint must be a finite number"))
    }
}

fn parse_position_encoding(s: &str) -> Result<proto::PositionEncoding, String> {
    match s {
        "fixed-point" => Ok(proto::PositionEncoding::FixedPoint),
        "whole-percent" => Ok(proto::PositionEncoding::WholePercent),
        _ => Err(format!(
            "Unknown position encoding '{s}', expected 'fixed-point' or 'whole-percent'"
        )),
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CliTransport {
    /// Talk to the peripherals over two serial ports.
    Serial {
        /// Serial port of the air-conditioner board.
        /// Examples: "/dev/ttyUSB0" (Linux), "/dev/tty.usbserial-A" (macOS), "COM3" (Windows).
        #[arg(long, default_value_t = default_ac_device(), verbatim_doc_comment)]
        ac_device: String,

        /// Serial port of the curtain board.
        /// Examples: "/dev/ttyUSB1" (Linux), "/dev/tty.usbserial-B" (macOS), "COM4" (Windows).
        #[arg(long, default_value_t = default_curtain_device(), verbatim_doc_comment)]
        curtain_device: String,

        #[command(subcommand)]
        command: CliCommands,
    },
    /// Talk to simulated peripherals instead of real hardware.
    Simulate {
        /// Keep the simulated sensor values constant.
        #[arg(long)]
        no_jitter: bool,

        #[command(subcommand)]
        command: CliCommands,
    },
}

impl CliTransport {
    pub fn command(&self) -> &CliCommands {
        match self {
            CliTransport::Serial { command, .. } | CliTransport::Simulate { command, .. } => {
                command
            }
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum DaemonOutput {
    /// Continuously read all values and print them to the standard output (console).
    Console,
    /// Continuously read all values and publish them to an MQTT broker.
    Mqtt {
        /// The configuration file for the MQTT broker
        #[arg(long, default_value_t = MqttConfig::DEFAULT_CONFIG_FILE.to_string())]
        config_file: String,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum AcCommands {
    /// Read and display ambient temperature, desired temperature and fan speed.
    Read,
    /// Set the desired temperature in degrees Celsius (°C).
    /// Integer and tenths are sent separately, each limited to 0..63;
    /// larger values wrap around on the device.
    #[clap(verbatim_doc_comment)]
    SetTemp {
        #[arg(value_parser = parse_setpoint, allow_negative_numbers = true)]
        value: f32,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CurtainCommands {
    /// Read and display curtain position, outdoor temperature, pressure and light intensity.
    Read,
    /// Set the curtain position in percent.
    /// Integer and tenths are sent separately, each limited to 0..63;
    /// larger values wrap around on the device.
    #[clap(verbatim_doc_comment)]
    SetPosition {
        #[arg(value_parser = parse_setpoint, allow_negative_numbers = true)]
        value: f32,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum RawCommands {
    /// Send a register request code and print the response byte.
    Request {
        /// Register code, 0x01 to 0x08. Decimal or hexadecimal.
        #[arg(value_parser = parse_register)]
        register: u8,
    },
    /// Send one raw byte without waiting for a response.
    Send {
        /// Decimal or hexadecimal, e.g. "0xD7".
        #[arg(value_parser = parse_byte)]
        byte: u8,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Ac,
    Curtain,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CliCommands {
    /// Air-conditioner commands.
    Ac {
        #[command(subcommand)]
        command: AcCommands,
    },

    /// Curtain commands.
    Curtain {
        #[command(subcommand)]
        command: CurtainCommands,
    },

    /// Read and display all values of both boards.
    ReadAll,

    /// Interactive console menu for both boards.
    Menu,

    /// Run in daemon mode: continuously poll both boards at a specified interval.
    /// Output can be directed to stdout or an MQTT broker.
    #[clap(verbatim_doc_comment)]
    Daemon {
        /// Interval for polling (e.g., "10s", "1m")
        #[arg(value_parser = humantime::parse_duration, short, long, default_value = "2sec", verbatim_doc_comment)]
        poll_interval: Duration,

        /// Specifies the output.
        #[command(subcommand)]
        output: DaemonOutput,
    },

    /// Low-level access for diagnosing a board.
    Raw {
        /// Board to talk to.
        #[arg(value_enum)]
        device: Device,

        #[command(subcommand)]
        command: RawCommands,
    },
}

const fn about_text() -> &'static str {
    "homectl - Poll and control the air-conditioner and curtain boards over serial links."
}

#[derive(Parser, Debug)]
#[command(name="homectl", author, version, about=about_text(), long_about = None, propagate_version = true)]
pub struct CliArgs {
    /// Configure verbosity of logging output.
    /// -v for info, -vv for debug, -vvv for trace. Default is warnings.
    #[command(flatten)]
    pub verbose: Verbosity<WarnLevel>,

    /// Selects real serial ports or simulated boards.
    #[command(subcommand)]
    pub transport: CliTransport,

    /// Baud rate of both serial links.
    /// Supported values: 1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200.
    #[arg(global = true, long, default_value_t = proto::BaudRate::default(), value_parser = parse_baud_rate, verbatim_doc_comment)]
    pub baud_rate: proto::BaudRate,

    /// How long a single response byte may take before it counts as 0.
    /// Examples: "1s", "500ms".
    #[arg(global = true, long, default_value = "500ms", value_parser = humantime::parse_duration, verbatim_doc_comment)]
    pub timeout: Duration,

    /// Delay between the two bytes of a setpoint command.
    /// The boards drop the second byte if it arrives earlier than about 50ms.
    #[arg(global = true, long, default_value = "50ms", value_parser = humantime::parse_duration, verbatim_doc_comment)]
    pub delay: Duration,

    /// How the curtain board reports its position:
    /// "fixed-point" (registers 0x01/0x02) or "whole-percent" (register 0x02).
    #[arg(global = true, long, default_value_t = proto::PositionEncoding::default(), value_parser = parse_position_encoding, verbatim_doc_comment)]
    pub curtain_position: proto::PositionEncoding,
}

impl CliArgs {
    pub fn serial_config(&self, path: &str) -> SerialConfig {
        SerialConfig::new(path)
            .with_baud_rate(self.baud_rate)
            .with_timeout(self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let args = CliArgs::try_parse_from(["homectl", "simulate", "read-all"]).unwrap();
        assert_eq!(args.baud_rate, proto::BaudRate::B9600);
        assert_eq!(args.timeout, Duration::from_millis(500));
        assert_eq!(args.delay, Duration::from_millis(50));
        assert_eq!(args.curtain_position, proto::PositionEncoding::FixedPoint);
        assert_eq!(args.transport.command(), &CliCommands::ReadAll);
    }

    #[test]
    fn serial_setpoint() {
        let args = CliArgs::try_parse_from([
            "homectl",
            "serial",
            "--ac-device",
            "/dev/ttyACM0",
            "ac",
            "set-temp",
            "23.5",
            "--baud-rate",
            "19200",
        ])
        .unwrap();
        match &args.transport {
            CliTransport::Serial {
                ac_device, command, ..
            } => {
                assert_eq!(ac_device, "/dev/ttyACM0");
                assert_eq!(
                    command,
                    &CliCommands::Ac {
                        command: AcCommands::SetTemp { value: 23.5 }
                    }
                );
            }
            other => panic!("unexpected transport {other:?}"),
        }
        assert_eq!(
            args.serial_config("/dev/ttyACM0").baud_rate,
            proto::BaudRate::B19200
        );
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(CliArgs::try_parse_from(["homectl", "simulate", "ac", "set-temp", "NaN"]).is_err());
        assert!(
            CliArgs::try_parse_from(["homectl", "--baud-rate", "1000", "simulate", "read-all"])
                .is_err()
        );
        assert!(
            CliArgs::try_parse_from(["homectl", "simulate", "raw", "ac", "request", "0x09"])
                .is_err()
        );
    }

    #[test]
    fn raw_hex_arguments() {
        let args =
            CliArgs::try_parse_from(["homectl", "simulate", "raw", "curtain", "send", "0xD7"])
                .unwrap();
        assert_eq!(
            args.transport.command(),
            &CliCommands::Raw {
                device: Device::Curtain,
                command: RawCommands::Send { byte: 0xD7 }
            }
        );
    }

    #[test]
    fn position_encoding_option() {
        let args = CliArgs::try_parse_from([
            "homectl",
            "simulate",
            "curtain",
            "read",
            "--curtain-position",
            "whole-percent",
        ])
        .unwrap();
        assert_eq!(args.curtain_position, proto::PositionEncoding::WholePercent);
    }
}
