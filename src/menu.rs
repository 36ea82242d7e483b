//! Interactive console menu: one info screen per board with a setpoint prompt.
use anyhow::{Context, Result};
use dialoguer::{Input, Select};
use homelink_lib::{
    air_conditioner::AirConditioner, connection::DeviceConnection, curtain::Curtain,
    transport::Connect,
};
use std::io::{stdout, Write};

fn clear_screen() -> Result<()> {
    print!("\x1B[2J\x1B[1;1H");
    stdout().flush().context("Failed to flush stdout")
}

fn print_connection<C: Connect>(connection: &DeviceConnection<C>) {
    let diagnostics = connection.diagnostics();
    println!("-----------------------");
    println!("Connection Port: {}", connection.config().path);
    println!("Connection Baudrate: {}", connection.config().baud_rate);
    if diagnostics.read_failures > 0 {
        println!(
            "Failed reads: {} of {} (shown as 0)",
            diagnostics.read_failures, diagnostics.requests
        );
    }
    println!("-----------------------");
}

fn read_setpoint(prompt: &str) -> Result<f32> {
    Input::<f32>::new()
        .with_prompt(prompt)
        .validate_with(|value: &f32| -> std::result::Result<(), &'static str> {
            if value.is_finite() {
                Ok(())
            } else {
                Err("Please enter a number")
            }
        })
        .interact_text()
        .context("Failed to read setpoint")
}

/// Returns `true` if the operator picked the setpoint entry.
fn sub_menu(setpoint_item: &str) -> Result<bool> {
    let choice = Select::new()
        .with_prompt("MENU")
        .items(&[setpoint_item, "Return"])
        .default(0)
        .interact()
        .context("Failed to read menu choice")?;
    Ok(choice == 0)
}

fn air_conditioner_menu<C: Connect>(ac: &mut AirConditioner<C>) -> Result<()> {
    loop {
        ac.update();
        clear_screen()?;
        println!("--- AIR CONDITIONER ---");
        println!("Home Ambient Temperature: {:.1} °C", ac.ambient_temperature());
        println!("Home Desired Temperature: {:.1} °C", ac.desired_temperature());
        println!("Fan Speed: {} rps", ac.fan_speed());
        print_connection(ac.connection());

        if !sub_menu("Enter the desired temperature")? {
            return Ok(());
        }
        let value = read_setpoint("Enter Desired Temp (°C)")?;
        ac.set_desired_temp(value)
            .with_context(|| format!("Cannot set desired temperature to {value}"))?;
    }
}

fn curtain_menu<C: Connect>(curtain: &mut Curtain<C>) -> Result<()> {
    loop {
        curtain.update();
        clear_screen()?;
        println!("--- CURTAIN CONTROL ---");
        println!("Outdoor Temperature: {:.1} °C", curtain.outdoor_temperature());
        println!("Outdoor Pressure: {:.0} hPa", curtain.outdoor_pressure());
        println!("Curtain Status: {:.1} %", curtain.curtain_status());
        println!("Light Intensity: {:.0} Lux", curtain.light_intensity());
        print_connection(curtain.connection());

        if !sub_menu("Enter the desired curtain status")? {
            return Ok(());
        }
        let value = read_setpoint("Enter Desired Curtain (%)")?;
        curtain
            .set_curtain_status(value)
            .with_context(|| format!("Cannot set curtain status to {value}"))?;
    }
}

pub fn run<A: Connect, B: Connect>(ac: &mut AirConditioner<A>, curtain: &mut Curtain<B>) -> Result<()> {
    loop {
        clear_screen()?;
        let choice = Select::new()
            .with_prompt("=== MAIN MENU ===")
            .items(&["Air Conditioner", "Curtain Control", "Exit"])
            .default(0)
            .interact()
            .context("Failed to read menu choice")?;
        match choice {
            0 => air_conditioner_menu(ac)?,
            1 => curtain_menu(curtain)?,
            _ => return Ok(()),
        }
    }
}
