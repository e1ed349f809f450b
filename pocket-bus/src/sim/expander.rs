//! Register model of an MCP23S17 or MCP23S08.

use crate::peripheral::{Mcp23s08Register, Mcp23s17Register, RegisterFrame};

/// Which expander is modelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpanderModel {
    Mcp23s17,
    Mcp23s08,
}

/// How a register address behaves
enum Slot {
    /// Pin levels of a port
    Gpio(usize),
    /// Stored register that writes cannot change
    ReadOnly(usize),
    /// Plain read/write register
    Stored(usize),
    Unmapped,
}

/// Simulated expander with power-on-reset register state.
#[derive(Debug, Clone)]
pub struct SimExpander {
    model: ExpanderModel,
    registers: [u8; 0x16],
    /// Levels driven onto each port's pins from outside
    inputs: [u8; 2],
}

impl SimExpander {
    pub fn new(model: ExpanderModel) -> Self {
        let mut registers = [0u8; 0x16];
        // IODIR resets to all inputs
        match model {
            ExpanderModel::Mcp23s17 => {
                registers[Mcp23s17Register::IodirA as usize] = 0xFF;
                registers[Mcp23s17Register::IodirB as usize] = 0xFF;
            }
            ExpanderModel::Mcp23s08 => {
                registers[Mcp23s08Register::Iodir as usize] = 0xFF;
            }
        }
        Self {
            model,
            registers,
            inputs: [0xFF; 2],
        }
    }

    fn slot(&self, register: u8) -> Slot {
        match self.model {
            ExpanderModel::Mcp23s17 => {
                use Mcp23s17Register::*;
                // 0x0B mirrors IOCON
                let register = if register == 0x0B { Iocon as u8 } else { register };
                match Mcp23s17Register::from_repr(register) {
                    Some(GpioA) => Slot::Gpio(0),
                    Some(GpioB) => Slot::Gpio(1),
                    Some(r @ (IntfA | IntfB | IntcapA | IntcapB)) => Slot::ReadOnly(r as usize),
                    Some(r) => Slot::Stored(r as usize),
                    None => Slot::Unmapped,
                }
            }
            ExpanderModel::Mcp23s08 => {
                use Mcp23s08Register::*;
                match Mcp23s08Register::from_repr(register) {
                    Some(Gpio) => Slot::Gpio(0),
                    Some(r @ (Intf | Intcap)) => Slot::ReadOnly(r as usize),
                    Some(r) => Slot::Stored(r as usize),
                    None => Slot::Unmapped,
                }
            }
        }
    }

    /// (IODIR, IPOL, OLAT) addresses of a port.
    fn port_registers(&self, port: usize) -> (usize, usize, usize) {
        match self.model {
            ExpanderModel::Mcp23s17 => (
                Mcp23s17Register::IodirA as usize + port,
                Mcp23s17Register::IpolA as usize + port,
                Mcp23s17Register::OlatA as usize + port,
            ),
            ExpanderModel::Mcp23s08 => (
                Mcp23s08Register::Iodir as usize,
                Mcp23s08Register::Ipol as usize,
                Mcp23s08Register::Olat as usize,
            ),
        }
    }

    fn pin_levels(&self, port: usize) -> u8 {
        let (iodir, ipol, olat) = self.port_registers(port);
        let iodir = self.registers[iodir];
        let levels = (self.inputs[port] & iodir) | (self.registers[olat] & !iodir);
        // Polarity inversion applies to input pins only
        levels ^ (self.registers[ipol] & iodir)
    }

    /// Value the device would return for `register`.
    pub fn read(&self, register: u8) -> u8 {
        match self.slot(register) {
            Slot::Gpio(port) => self.pin_levels(port),
            Slot::ReadOnly(i) | Slot::Stored(i) => self.registers[i],
            Slot::Unmapped => 0x00,
        }
    }

    /// Apply a register write as the device would.
    pub fn write(&mut self, register: u8, value: u8) {
        match self.slot(register) {
            Slot::Gpio(port) => {
                let (_, _, olat) = self.port_registers(port);
                self.registers[olat] = value;
            }
            Slot::Stored(i) => self.registers[i] = value,
            Slot::ReadOnly(_) | Slot::Unmapped => {}
        }
    }

    /// Force a register to a value, bypassing read-only rules.
    pub fn poke(&mut self, register: u8, value: u8) {
        match self.slot(register) {
            Slot::ReadOnly(i) | Slot::Stored(i) => self.registers[i] = value,
            Slot::Gpio(port) => self.inputs[port] = value,
            Slot::Unmapped => {}
        }
    }

    /// Drive external levels onto a port's pins.
    pub fn set_inputs(&mut self, port: usize, levels: u8) {
        if let Some(input) = self.inputs.get_mut(port) {
            *input = levels;
        }
    }

    /// Respond to one chip-select cycle.
    ///
    /// MISO is released (reads high) except while the addressed register is
    /// shifted out in the third byte of a read.
    pub fn exchange(&mut self, buf: &mut [u8]) {
        let frame = <[u8; 3]>::try_from(&*buf)
            .ok()
            .and_then(RegisterFrame::parse);
        buf.fill(0xFF);
        if let Some(frame) = frame {
            if frame.is_read() {
                buf[2] = self.read(frame.register());
            } else {
                self.write(frame.register(), frame.data());
            }
        }
    }
}
