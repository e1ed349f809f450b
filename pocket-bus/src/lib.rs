//! SPI peripheral bus of a PocketTRS board.
//!
//! Bridges an emulated host's bus to real hardware through two MCP23Sxx port
//! expanders and sets the video reference levels through an MCP4351 digital
//! potentiometer. Everything talks through the [`hw_trait`] seams, so the
//! same bring-up runs on a microcontroller SPI master or on the [`sim`]
//! board model.

pub mod board;
pub mod error;
pub mod hw_trait;
pub mod peripheral;
pub mod sim;
pub mod tracing;
pub mod transport;

pub use board::{initialize_bus, BoardConfig, DeviceRole, PeripheralBus};
pub use error::BusError;
