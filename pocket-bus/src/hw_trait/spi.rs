//! SPI hardware abstraction traits.
//!
//! The SPI master is modelled the way microcontroller SDKs expose it: the bus
//! is initialized once with its pin assignment, then each device is attached
//! with its own clock rate and chip-select line, yielding a handle that is
//! used for every later transaction with that device.

use async_trait::async_trait;
use super::Result;

/// SPI transport errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpiError {
    /// Transfer did not complete
    #[error("Transfer of {len} bytes failed")]
    Transfer { len: usize },

    /// Transfer longer than the bus was initialized for
    #[error("Transfer of {len} bytes exceeds bus limit of {max} bytes")]
    TooLong { len: usize, max: usize },

    /// Chip-select line already claimed by an attached device
    #[error("Chip select GPIO{0} already in use")]
    ChipSelectInUse(u8),

    /// Host controller has no free device slot
    #[error("No free device slot on SPI host")]
    NoFreeSlot,

    /// Device attached or used before the bus was initialized
    #[error("SPI bus not initialized")]
    NotInitialized,
}

/// SPI clock polarity and phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpiMode {
    /// CPOL=0, CPHA=0
    #[default]
    Mode0,
    /// CPOL=0, CPHA=1
    Mode1,
    /// CPOL=1, CPHA=0
    Mode2,
    /// CPOL=1, CPHA=1
    Mode3,
}

/// Bus-wide parameters, declared once before any device is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Clock output pin
    pub sclk: u8,
    /// Controller-out pin
    pub mosi: u8,
    /// Controller-in pin
    pub miso: u8,
    /// Largest single transfer in bytes
    pub max_transfer_size: usize,
}

/// Per-device attachment parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Human-readable device name used in logs
    pub label: &'static str,
    /// Chip-select pin owned by this device
    pub chip_select: u8,
    /// SCLK rate for this device in Hz
    pub clock_hz: u32,
    /// Clock polarity and phase
    pub mode: SpiMode,
    /// Transactions the host may queue for this device
    pub queue_size: usize,
}

/// A device attached to an SPI host.
#[async_trait]
pub trait SpiDevice: Send + Sync {
    /// Full-duplex exchange.
    ///
    /// Asserts this device's chip select, clocks out every byte of `buf` and
    /// overwrites it in place with the bytes clocked in, then releases chip
    /// select. Returns only once the transfer has completed.
    async fn transfer_in_place(&mut self, buf: &mut [u8]) -> Result<()>;
}

/// An SPI master controller.
#[async_trait]
pub trait SpiHost: Send {
    /// Handle type returned for attached devices
    type Device: SpiDevice;

    /// Initialize the bus pins and transfer limits.
    async fn initialize(&mut self, config: &BusConfig) -> Result<()>;

    /// Attach a device and return its transaction handle.
    async fn attach(&mut self, config: &DeviceConfig) -> Result<Self::Device>;
}
