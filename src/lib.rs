//! A library for polling home-automation peripherals over a byte-serial link.
//!
//! Two peripherals are supported, each on its own serial port:
//!
//! 1.  **Air conditioner** ([`air_conditioner::AirConditioner`]): ambient
//!     temperature, desired temperature and fan speed; the desired
//!     temperature can be set.
//! 2.  **Curtain control** ([`curtain::Curtain`]): curtain position, outdoor
//!     temperature, outdoor pressure and light intensity; the curtain position
//!     can be set.
//!
//! ## Features
//!
//! - **Protocol Implementation**: Register maps, fixed-point telemetry decoding
//!   and bit-packed setpoint commands, see [`protocol`].
//! - **Connection Lifecycle**: An explicit connected/disconnected state machine
//!   owning its transport, see [`connection`].
//! - **Pluggable Transports**: The platform serial port (`serial` feature), a
//!   scripted [`loopback`] for tests and a simulated firmware (`simulator`
//!   feature).
//!
//! ## Quick Start
//!
//! ```no_run
//! use homelink_lib::{
//!     curtain::Curtain, serial::SerialConnector, transport::SerialConfig,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut curtain = Curtain::new(SerialConnector, SerialConfig::new("/dev/ttyUSB1"));
//!     curtain.open()?;
//!
//!     curtain.update();
//!     println!("Curtain is {} % closed", curtain.curtain_status());
//!
//!     curtain.set_curtain_status(50.0)?;
//!     curtain.close();
//!     Ok(())
//! }
//! ```

mod error;
pub use error::{Error, Result};

pub mod air_conditioner;
pub mod connection;
pub mod curtain;
pub mod loopback;
pub mod protocol;
pub mod transport;

#[cfg_attr(docsrs, doc(cfg(feature = "serial")))]
#[cfg(feature = "serial")]
pub mod serial;

#[cfg_attr(docsrs, doc(cfg(feature = "simulator")))]
#[cfg(feature = "simulator")]
pub mod simulator;
