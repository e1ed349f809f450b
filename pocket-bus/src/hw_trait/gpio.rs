//! GPIO hardware abstraction trait.

use async_trait::async_trait;
use super::Result;

/// GPIO pin mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input,
    Output,
}

/// Internal pull resistor selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    None,
    Up,
    Down,
}

/// Edge or level that raises a pin interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptType {
    Disabled,
    RisingEdge,
    FallingEdge,
    AnyEdge,
}

/// Complete configuration of a single microcontroller pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinConfig {
    pub mode: PinMode,
    pub pull: Pull,
    pub interrupt: InterruptType,
}

impl PinConfig {
    /// Input with pull-up and no interrupt, as used for open-drain lines
    /// that are polled rather than serviced.
    pub const fn polled_open_drain_input() -> Self {
        Self {
            mode: PinMode::Input,
            pull: Pull::Up,
            interrupt: InterruptType::Disabled,
        }
    }
}

/// Pin configuration service
#[async_trait]
pub trait PinConfigurator: Send {
    /// Apply direction, pull and interrupt settings to one pin.
    async fn configure(&mut self, pin: u8, config: PinConfig) -> Result<()>;
}
