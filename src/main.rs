//! homectl
//!
//! A command-line interface (CLI) application for the air-conditioner and
//! curtain boards of the home-automation system. Each board sits on its own
//! serial link; both can also be simulated.
//!
//! This tool allows users to:
//! - Read the telemetry of either board or both.
//! - Set the desired temperature and the curtain position.
//! - Navigate an interactive console menu.
//! - Run in a continuous daemon mode to poll both boards and either print the
//!   values to the console or publish them to an MQTT broker.
//! - Send raw register requests and command bytes for diagnosis.
//!
//! The CLI leverages the `homelink_lib` crate for the protocol and the controllers.

use anyhow::{Context, Result};
use clap::Parser;
use flexi_logger::{Logger, LoggerHandle};
use homelink_lib::{
    air_conditioner::AirConditioner,
    connection::DeviceConnection,
    curtain::Curtain,
    protocol::Command,
    serial::SerialConnector,
    simulator::Simulator,
    transport::Connect,
};
use log::*;
use std::panic;

mod commandline;
mod menu;
mod mqtt;

fn logging_init(loglevel: LevelFilter) -> LoggerHandle {
    let log_handle = Logger::try_with_env_or_str(loglevel.as_str())
        .expect("Cannot init logging")
        .start()
        .expect("Cannot start logging");

    panic::set_hook(Box::new(|panic_info| {
        let (filename, line, column) = panic_info
            .location()
            .map(|loc| (loc.file(), loc.line(), loc.column()))
            .unwrap_or(("<unknown_file>", 0, 0));

        let cause_str = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            *s
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.as_str()
        } else {
            "<unknown_panic_cause>"
        };

        error!(
            target: "panic",
            "Thread '{}' panicked at '{}': {}:{} - Cause: {}",
            std::thread::current().name().unwrap_or("<unnamed>"),
            filename,
            line,
            column,
            cause_str
        );
    }));
    log_handle
}

macro_rules! print_air_conditioner {
    ($device:expr) => {
        $device.update();
        println!("Air conditioner: {}", $device.readings());
        warn_on_read_failures($device.connection());
    };
}

macro_rules! print_curtain {
    ($device:expr) => {
        $device.update();
        println!("Curtain: {}", $device.readings());
        warn_on_read_failures($device.connection());
    };
}

/// Zero and a failed read look the same, so say when a value may be the latter.
fn warn_on_read_failures<C: Connect>(connection: &DeviceConnection<C>) {
    let diagnostics = connection.diagnostics();
    if diagnostics.read_failures > 0 {
        warn!(
            "{} of {} reads on {} failed and are shown as 0",
            diagnostics.read_failures,
            diagnostics.requests,
            connection.config().path
        );
    }
}

fn open_air_conditioner<C: Connect>(ac: &mut AirConditioner<C>) -> Result<()> {
    info!(
        "Opening air conditioner on {} (Baud: {})...",
        ac.connection().config().path,
        ac.connection().config().baud_rate
    );
    ac.open().with_context(|| {
        format!(
            "Failed to open air conditioner port {}",
            ac.connection().config().path
        )
    })
}

fn open_curtain<C: Connect>(curtain: &mut Curtain<C>) -> Result<()> {
    info!(
        "Opening curtain on {} (Baud: {})...",
        curtain.connection().config().path,
        curtain.connection().config().baud_rate
    );
    curtain.open().with_context(|| {
        format!(
            "Failed to open curtain port {}",
            curtain.connection().config().path
        )
    })
}

fn handle_raw<C: Connect>(
    connection: &mut DeviceConnection<C>,
    command: &commandline::RawCommands,
) {
    match command {
        commandline::RawCommands::Request { register } => {
            info!("Executing: Raw request of register {register:#04x}");
            let failures = connection.diagnostics().read_failures;
            let value = connection.request_register(*register);
            if connection.diagnostics().read_failures > failures {
                println!("Register {register:#04x}: no response");
            } else {
                println!("Register {register:#04x}: {value} ({value:#04x})");
            }
        }
        commandline::RawCommands::Send { byte } => {
            info!("Executing: Raw send of {byte:#04x}");
            connection.send_command_byte(*byte);
            println!("Sent {byte:#010b} ({:?})", Command::decode(*byte));
        }
    }
}

fn execute<A: Connect, B: Connect>(
    mut ac: AirConditioner<A>,
    mut curtain: Curtain<B>,
    args: &commandline::CliArgs,
) -> Result<()> {
    ac.connection_mut().set_command_delay(args.delay);
    curtain.connection_mut().set_command_delay(args.delay);

    match args.transport.command() {
        commandline::CliCommands::Ac { command } => {
            open_air_conditioner(&mut ac)?;
            match command {
                commandline::AcCommands::Read => {
                    info!("Executing: Read Air Conditioner");
                    print_air_conditioner!(ac);
                }
                commandline::AcCommands::SetTemp { value } => {
                    info!("Executing: Set Desired Temperature to {value} °C");
                    ac.set_desired_temp(*value).with_context(|| {
                        format!("Failed to set desired temperature to {value}")
                    })?;
                    println!("Desired temperature set to {value} °C.");
                }
            }
        }
        commandline::CliCommands::Curtain { command } => {
            open_curtain(&mut curtain)?;
            match command {
                commandline::CurtainCommands::Read => {
                    info!("Executing: Read Curtain");
                    print_curtain!(curtain);
                }
                commandline::CurtainCommands::SetPosition { value } => {
                    info!("Executing: Set Curtain Position to {value} %");
                    curtain.set_curtain_status(*value).with_context(|| {
                        format!("Failed to set curtain position to {value}")
                    })?;
                    println!("Curtain position set to {value} %.");
                }
            }
        }
        commandline::CliCommands::ReadAll => {
            info!("Executing: Read All");
            open_air_conditioner(&mut ac)?;
            open_curtain(&mut curtain)?;
            print_air_conditioner!(ac);
            print_curtain!(curtain);
        }
        commandline::CliCommands::Menu => {
            open_air_conditioner(&mut ac)?;
            open_curtain(&mut curtain)?;
            menu::run(&mut ac, &mut curtain)?;
        }
        commandline::CliCommands::Daemon {
            poll_interval,
            output,
        } => {
            open_air_conditioner(&mut ac)?;
            open_curtain(&mut curtain)?;
            info!("Starting daemon mode: output={output:?}, interval={poll_interval:?}");
            match output {
                commandline::DaemonOutput::Console => loop {
                    debug!("Daemon: Polling both boards for stdout...");
                    print_air_conditioner!(ac);
                    print_curtain!(curtain);
                    std::thread::sleep(*poll_interval);
                },
                commandline::DaemonOutput::Mqtt { config_file } => {
                    mqtt::run_daemon(&mut ac, &mut curtain, poll_interval, config_file)?;
                }
            }
        }
        commandline::CliCommands::Raw { device, command } => match device {
            commandline::Device::Ac => {
                open_air_conditioner(&mut ac)?;
                handle_raw(ac.connection_mut(), command);
            }
            commandline::Device::Curtain => {
                open_curtain(&mut curtain)?;
                handle_raw(curtain.connection_mut(), command);
            }
        },
    }

    ac.close();
    curtain.close();
    Ok(())
}

fn main() -> Result<()> {
    let args = commandline::CliArgs::parse();

    // 1. Initialize logging as early as possible
    let _log_handle = logging_init(args.verbose.log_level_filter());
    info!(
        "homectl started. Log level: {}",
        args.verbose.log_level_filter()
    );

    // 2. Pick the transport and run the command
    match &args.transport {
        commandline::CliTransport::Serial {
            ac_device,
            curtain_device,
            ..
        } => execute(
            AirConditioner::new(SerialConnector, args.serial_config(ac_device)),
            Curtain::with_position_encoding(
                SerialConnector,
                args.serial_config(curtain_device),
                args.curtain_position,
            ),
            &args,
        ),
        commandline::CliTransport::Simulate { no_jitter, .. } => execute(
            AirConditioner::new(
                Simulator::air_conditioner().with_jitter(!no_jitter),
                args.serial_config("sim-ac"),
            ),
            Curtain::with_position_encoding(
                Simulator::curtain().with_jitter(!no_jitter),
                args.serial_config("sim-curtain"),
                args.curtain_position,
            ),
            &args,
        ),
    }
}
