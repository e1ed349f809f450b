//! Hardware abstraction layer traits.
//!
//! This module defines the hardware interface traits (SPI, GPIO) that allow
//! the peripheral drivers to work with different underlying implementations,
//! whether a microcontroller's SPI master driver or the register-accurate
//! simulator in [`crate::sim`].

pub mod gpio;
pub mod spi;

// Re-export traits
pub use gpio::{InterruptType, PinConfig, PinConfigurator, PinMode, Pull};
pub use spi::{BusConfig, DeviceConfig, SpiDevice, SpiError, SpiHost, SpiMode};

/// Common error type for hardware operations
#[derive(Debug, thiserror::Error)]
pub enum HwError {
    /// Transport-level SPI failure
    #[error("SPI error: {0}")]
    Spi(#[from] SpiError),

    /// Invalid parameter or argument
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, HwError>;
