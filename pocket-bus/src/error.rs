//! Error types for peripheral bus bring-up and access.

use thiserror::Error;

use crate::board::DeviceRole;
use crate::hw_trait::HwError;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("SPI bus initialization failed: {0}")]
    BusInit(#[source] HwError),

    #[error("Chip select GPIO{pin} assigned to both {first} and {second}")]
    ChipSelectConflict {
        pin: u8,
        first: DeviceRole,
        second: DeviceRole,
    },

    #[error("Failed to attach {role}: {source}")]
    Attach {
        role: DeviceRole,
        #[source]
        source: HwError,
    },

    #[error("Failed to configure GPIO{pin}: {source}")]
    PinConfig {
        pin: u8,
        #[source]
        source: HwError,
    },

    #[error("{role} transaction failed: {source}")]
    Transport {
        role: DeviceRole,
        #[source]
        source: HwError,
    },

    #[error("{role} not found: {register} reads 0x{actual:02X}, expected 0x{expected:02X}")]
    DeviceNotFound {
        role: DeviceRole,
        register: &'static str,
        expected: u8,
        actual: u8,
    },

    #[error("{role} not found: channel {channel} reads back {actual}, wrote {expected}")]
    CalibrationMismatch {
        role: DeviceRole,
        channel: u8,
        expected: u8,
        actual: u8,
    },
}

pub type Result<T> = std::result::Result<T, BusError>;
