//! Memory model of an MCP4351.

use crate::peripheral::mcp4351::{memory, Command};

/// Wiper power-on-reset position (mid-scale of 257 steps)
const WIPER_POR: u16 = 0x080;
/// TCON power-on-reset value (all terminals connected)
const TCON_POR: u16 = 0x1FF;
/// Highest wiper position
const WIPER_MAX: u16 = 0x100;

/// Simulated potentiometer with volatile wiper and TCON memory.
#[derive(Debug, Clone)]
pub struct SimPotentiometer {
    memory: [u16; 16],
}

impl Default for SimPotentiometer {
    fn default() -> Self {
        Self::new()
    }
}

impl SimPotentiometer {
    pub fn new() -> Self {
        let mut memory = [0u16; 16];
        for wiper in [memory::WIPER0, memory::WIPER1, memory::WIPER2, memory::WIPER3] {
            memory[wiper as usize] = WIPER_POR;
        }
        memory[memory::TCON0 as usize] = TCON_POR;
        memory[memory::TCON1 as usize] = TCON_POR;
        Self { memory }
    }

    fn is_wiper(address: u8) -> bool {
        matches!(
            address,
            memory::WIPER0 | memory::WIPER1 | memory::WIPER2 | memory::WIPER3
        )
    }

    fn is_writable(address: u8) -> bool {
        Self::is_wiper(address) || matches!(address, memory::TCON0 | memory::TCON1)
    }

    /// Low eight bits of a memory location.
    pub fn read(&self, address: u8) -> u8 {
        self.memory[(address & 0x0F) as usize] as u8
    }

    /// Store a value, bypassing command decoding.
    pub fn poke(&mut self, address: u8, value: u8) {
        self.memory[(address & 0x0F) as usize] = value as u16;
    }

    /// Respond to one chip-select cycle carrying a 16-bit command.
    pub fn exchange(&mut self, buf: &mut [u8]) {
        let Ok([command, data]) = <[u8; 2]>::try_from(&*buf) else {
            buf.fill(0xFF);
            return;
        };
        let address = command >> 4;
        let value = (((command & 0x03) as u16) << 8) | data as u16;

        match Command::from_bits(command >> 2) {
            Some(Command::Write) => {
                if Self::is_writable(address) {
                    let value = if Self::is_wiper(address) {
                        value.min(WIPER_MAX)
                    } else {
                        value
                    };
                    self.memory[address as usize] = value;
                }
                buf.copy_from_slice(&[0xFF, 0xFF]);
            }
            Some(Command::Read) => {
                let stored = self.memory[address as usize];
                // CMDERR bit stays high on a valid command
                buf.copy_from_slice(&[0xFE | (stored >> 8) as u8, stored as u8]);
            }
            None => buf.fill(0xFF),
        }
    }
}
