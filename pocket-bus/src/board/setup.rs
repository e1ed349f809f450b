//! Steady-state bus role configuration of both expanders.
//!
//! The MCP23S17 bridges the host's data bus (port A, D0-D7) and low address
//! lines (port B, A0-A7). The MCP23S08 carries the host's control lines.
//!
//! Every port is programmed direction first, then pull-ups, then interrupt
//! enables. Enabling interrupts on pins whose direction is not yet set is
//! undefined on this device family.

use bitflags::bitflags;

use super::{transport_fault, DeviceRole};
use crate::error::Result;
use crate::hw_trait::SpiDevice;
use crate::peripheral::{
    Expander, ExpanderRegister, IoCon, Mcp23s08, Mcp23s08Register, Mcp23s17, Mcp23s17Register,
};
use crate::tracing::prelude::*;

bitflags! {
    /// Host control lines on the MCP23S08 port
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ControlLines: u8 {
        /// Host I/O bus interrupt request
        const IO_BUS_INT = 1 << 2;
        /// Host I/O bus wait request
        const IO_BUS_WAIT = 1 << 3;
        /// External I/O select
        const EXT_IO_SEL = 1 << 4;
    }
}

/// Intended state of one 8-pin port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortConfig {
    /// Set bits are inputs
    pub direction: u8,
    /// Set bits invert the input level. Left at its reset value when zero.
    pub polarity: u8,
    pub pull_up: u8,
    pub interrupt_enable: u8,
    /// Output latch value written after the port is configured
    pub initial_output: Option<u8>,
}

/// Register addresses of one port.
#[derive(Debug, Clone, Copy)]
pub struct PortRegisters<R> {
    pub direction: R,
    pub polarity: R,
    pub pull_up: R,
    pub interrupt_enable: R,
    pub gpio: R,
}

impl PortRegisters<Mcp23s17Register> {
    pub const PORT_A: Self = Self {
        direction: Mcp23s17Register::IodirA,
        polarity: Mcp23s17Register::IpolA,
        pull_up: Mcp23s17Register::GppuA,
        interrupt_enable: Mcp23s17Register::GpintenA,
        gpio: Mcp23s17Register::GpioA,
    };

    pub const PORT_B: Self = Self {
        direction: Mcp23s17Register::IodirB,
        polarity: Mcp23s17Register::IpolB,
        pull_up: Mcp23s17Register::GppuB,
        interrupt_enable: Mcp23s17Register::GpintenB,
        gpio: Mcp23s17Register::GpioB,
    };
}

impl PortRegisters<Mcp23s08Register> {
    pub const PORT: Self = Self {
        direction: Mcp23s08Register::Iodir,
        polarity: Mcp23s08Register::Ipol,
        pull_up: Mcp23s08Register::Gppu,
        interrupt_enable: Mcp23s08Register::Gpinten,
        gpio: Mcp23s08Register::Gpio,
    };
}

/// Steady-state configuration of both expanders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusRoleConfig {
    /// MCP23S17 port A, host D0-D7
    pub data_port: PortConfig,
    /// MCP23S17 port B, host A0-A7
    pub address_port: PortConfig,
    /// MCP23S08 port, host control lines
    pub control_port: PortConfig,
    /// MCP23S08 IOCON
    pub control_iocon: IoCon,
}

impl Default for BusRoleConfig {
    fn default() -> Self {
        Self {
            // The host drives data; only sampled here
            data_port: PortConfig {
                direction: 0xFF,
                polarity: 0x00,
                pull_up: 0xFF,
                interrupt_enable: 0x00,
                initial_output: None,
            },
            address_port: PortConfig {
                direction: 0x00,
                polarity: 0x00,
                pull_up: 0x00,
                interrupt_enable: 0x00,
                initial_output: Some(0x00),
            },
            control_port: PortConfig {
                direction: ControlLines::all().bits(),
                polarity: 0x00,
                pull_up: 0xFF,
                interrupt_enable: 0x00,
                initial_output: None,
            },
            control_iocon: IoCon::ODR,
        }
    }
}

async fn apply_port<D, R>(
    expander: &mut Expander<D, R>,
    registers: &PortRegisters<R>,
    port: &PortConfig,
) -> crate::hw_trait::Result<()>
where
    D: SpiDevice,
    R: ExpanderRegister,
{
    expander
        .write_register(registers.direction, port.direction)
        .await?;
    if port.polarity != 0 {
        expander
            .write_register(registers.polarity, port.polarity)
            .await?;
    }
    expander.write_register(registers.pull_up, port.pull_up).await?;
    expander
        .write_register(registers.interrupt_enable, port.interrupt_enable)
        .await?;
    if let Some(value) = port.initial_output {
        expander.write_register(registers.gpio, value).await?;
    }
    Ok(())
}

/// Program the MCP23S17 then the MCP23S08.
pub async fn apply<D: SpiDevice>(
    config: &BusRoleConfig,
    data_bus: &mut Mcp23s17<D>,
    address_bus: &mut Mcp23s08<D>,
) -> Result<()> {
    let role = DeviceRole::DataBusExpander;
    apply_port(data_bus, &PortRegisters::PORT_A, &config.data_port)
        .await
        .map_err(transport_fault(role))?;
    apply_port(data_bus, &PortRegisters::PORT_B, &config.address_port)
        .await
        .map_err(transport_fault(role))?;
    debug!(
        "{} configured: data port 0x{:02X} in, address port 0x{:02X} in",
        role, config.data_port.direction, config.address_port.direction
    );

    let role = DeviceRole::AddressBusExpander;
    apply_port(address_bus, &PortRegisters::PORT, &config.control_port)
        .await
        .map_err(transport_fault(role))?;
    address_bus
        .write_register(Mcp23s08Register::Iocon, config.control_iocon.bits())
        .await
        .map_err(transport_fault(role))?;
    debug!(
        "{} configured: control lines 0x{:02X} in, IOCON {:?}",
        role, config.control_port.direction, config.control_iocon
    );

    Ok(())
}
