//! MCP23S17 16-bit SPI port expander.
//!
//! Register addresses assume IOCON.BANK = 0 (the power-on default), where the
//! A and B registers of each pair are interleaved.

use strum::{FromRepr, IntoStaticStr};

use super::mcp23sxx::{Expander, ExpanderRegister};

/// MCP23S17 driver
pub type Mcp23s17<D> = Expander<D, Mcp23s17Register>;

/// MCP23S17 register map (BANK = 0)
#[derive(FromRepr, IntoStaticStr, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mcp23s17Register {
    /// I/O direction, port A (1 = input)
    #[strum(serialize = "IODIRA")]
    IodirA = 0x00,
    /// I/O direction, port B
    #[strum(serialize = "IODIRB")]
    IodirB = 0x01,
    /// Input polarity, port A
    #[strum(serialize = "IPOLA")]
    IpolA = 0x02,
    /// Input polarity, port B
    #[strum(serialize = "IPOLB")]
    IpolB = 0x03,
    /// Interrupt-on-change enable, port A
    #[strum(serialize = "GPINTENA")]
    GpintenA = 0x04,
    /// Interrupt-on-change enable, port B
    #[strum(serialize = "GPINTENB")]
    GpintenB = 0x05,
    /// Default compare value, port A
    #[strum(serialize = "DEFVALA")]
    DefvalA = 0x06,
    /// Default compare value, port B
    #[strum(serialize = "DEFVALB")]
    DefvalB = 0x07,
    /// Interrupt control, port A
    #[strum(serialize = "INTCONA")]
    IntconA = 0x08,
    /// Interrupt control, port B
    #[strum(serialize = "INTCONB")]
    IntconB = 0x09,
    /// Configuration (shared, also mapped at 0x0B)
    #[strum(serialize = "IOCON")]
    Iocon = 0x0A,
    /// Pull-up enable, port A
    #[strum(serialize = "GPPUA")]
    GppuA = 0x0C,
    /// Pull-up enable, port B
    #[strum(serialize = "GPPUB")]
    GppuB = 0x0D,
    /// Interrupt flags, port A (read-only)
    #[strum(serialize = "INTFA")]
    IntfA = 0x0E,
    /// Interrupt flags, port B (read-only)
    #[strum(serialize = "INTFB")]
    IntfB = 0x0F,
    /// Interrupt capture, port A (read-only)
    #[strum(serialize = "INTCAPA")]
    IntcapA = 0x10,
    /// Interrupt capture, port B (read-only)
    #[strum(serialize = "INTCAPB")]
    IntcapB = 0x11,
    /// Port A pin levels
    #[strum(serialize = "GPIOA")]
    GpioA = 0x12,
    /// Port B pin levels
    #[strum(serialize = "GPIOB")]
    GpioB = 0x13,
    /// Output latch, port A
    #[strum(serialize = "OLATA")]
    OlatA = 0x14,
    /// Output latch, port B
    #[strum(serialize = "OLATB")]
    OlatB = 0x15,
}

impl Mcp23s17Register {
    /// Every register, in address order.
    pub const ALL: [Self; 21] = [
        Self::IodirA,
        Self::IodirB,
        Self::IpolA,
        Self::IpolB,
        Self::GpintenA,
        Self::GpintenB,
        Self::DefvalA,
        Self::DefvalB,
        Self::IntconA,
        Self::IntconB,
        Self::Iocon,
        Self::GppuA,
        Self::GppuB,
        Self::IntfA,
        Self::IntfB,
        Self::IntcapA,
        Self::IntcapB,
        Self::GpioA,
        Self::GpioB,
        Self::OlatA,
        Self::OlatB,
    ];
}

impl ExpanderRegister for Mcp23s17Register {
    const CHIP: &'static str = "MCP23S17";

    const PRESENCE_CHECKS: [(Self, u8); 3] = [
        (Self::IodirA, 0xFF),
        (Self::IpolA, 0x00),
        (Self::GpintenA, 0x00),
    ];

    fn address(self) -> u8 {
        self as u8
    }

    fn name(self) -> &'static str {
        self.into()
    }
}
