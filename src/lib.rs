//! A library for reading UVR1611 heating controllers through a D-LOGG USB data logger.
//!
//! The D-LOGG is attached as a serial device. After a one byte mode handshake
//! it answers each data request with a binary frame holding the state of all
//! inputs, outputs and heat registers of the controller.
//!
//! ## Features
//!
//! - **Protocol Implementation**: Decoding of the UVR1611 frame into a strongly typed [`protocol::SystemState`].
//! - **Serial Handling**: Raw line configuration with guaranteed restoration of the previous settings (unix only).
//! - **Transport Agnostic Client**: [`client::DLogg`] works on any blocking `Read + Write` port.
//!
//! ## Quick Start
//!
//! ```no_run
//! use dlogg_lib::client::DLogg;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut dlogg = DLogg::open("/dev/ttyUSB0")?;
//!     let state = dlogg.poll()?;
//!     for input in state.inputs() {
//!         println!("S{}: {}", input.id, input.reading);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod protocol;

#[cfg_attr(docsrs, doc(cfg(unix)))]
#[cfg(unix)]
pub mod serial;

pub use error::{ConnectionError, Error, ParseError, ReadError};
