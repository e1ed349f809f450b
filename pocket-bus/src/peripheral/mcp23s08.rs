//! MCP23S08 8-bit SPI port expander.

use strum::{FromRepr, IntoStaticStr};

use super::mcp23sxx::{Expander, ExpanderRegister};

/// MCP23S08 driver
pub type Mcp23s08<D> = Expander<D, Mcp23s08Register>;

/// MCP23S08 register map
#[derive(FromRepr, IntoStaticStr, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mcp23s08Register {
    #[strum(serialize = "IODIR")]
    Iodir = 0x00,
    #[strum(serialize = "IPOL")]
    Ipol = 0x01,
    #[strum(serialize = "GPINTEN")]
    Gpinten = 0x02,
    #[strum(serialize = "DEFVAL")]
    Defval = 0x03,
    #[strum(serialize = "INTCON")]
    Intcon = 0x04,
    #[strum(serialize = "IOCON")]
    Iocon = 0x05,
    #[strum(serialize = "GPPU")]
    Gppu = 0x06,
    /// Interrupt flags (read-only)
    #[strum(serialize = "INTF")]
    Intf = 0x07,
    /// Interrupt capture (read-only)
    #[strum(serialize = "INTCAP")]
    Intcap = 0x08,
    #[strum(serialize = "GPIO")]
    Gpio = 0x09,
    #[strum(serialize = "OLAT")]
    Olat = 0x0A,
}

impl Mcp23s08Register {
    /// Every register, in address order.
    pub const ALL: [Self; 11] = [
        Self::Iodir,
        Self::Ipol,
        Self::Gpinten,
        Self::Defval,
        Self::Intcon,
        Self::Iocon,
        Self::Gppu,
        Self::Intf,
        Self::Intcap,
        Self::Gpio,
        Self::Olat,
    ];
}

impl ExpanderRegister for Mcp23s08Register {
    const CHIP: &'static str = "MCP23S08";

    const PRESENCE_CHECKS: [(Self, u8); 3] = [
        (Self::Iodir, 0xFF),
        (Self::Ipol, 0x00),
        (Self::Gpinten, 0x00),
    ];

    fn address(self) -> u8 {
        self as u8
    }

    fn name(self) -> &'static str {
        self.into()
    }
}
