//! MCP23Sxx SPI port expander framing.
//!
//! The MCP23S17 (16 pins, two ports) and MCP23S08 (8 pins, one port) share
//! one SPI protocol. Every access is a three byte frame:
//!
//! ```text
//! byte 0: 0 1 0 0 A2 A1 A0 R/W    device opcode
//! byte 1: register address
//! byte 2: data (write) or 0x00 placeholder (read)
//! ```
//!
//! On a read the expander drives the register contents while the third byte
//! is clocked, so the value is taken from response byte 2.
//!
//! Datasheets: <https://ww1.microchip.com/downloads/en/devicedoc/20001952c.pdf>,
//! <https://ww1.microchip.com/downloads/en/DeviceDoc/MCP23008-MCP23S08-Data-Sheet-20001919F.pdf>

use std::fmt;
use std::marker::PhantomData;

use bitflags::bitflags;

use crate::hw_trait::{Result, SpiDevice};
use crate::tracing::prelude::*;
use crate::transport::Transaction;

/// Opcode prefix with hardware address pins A2..A0 = 000
pub const CHIP_ADDRESS: u8 = 0x40;
/// R/W bit value for a register write
pub const WRITE: u8 = 0x00;
/// R/W bit value for a register read
pub const READ: u8 = 0x01;

bitflags! {
    /// IOCON configuration register bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IoCon: u8 {
        /// Register banking (MCP23S17 only; this crate assumes BANK = 0)
        const BANK = 0x80;
        /// INTA/INTB mirrored (MCP23S17 only)
        const MIRROR = 0x40;
        /// Sequential operation disabled
        const SEQOP = 0x20;
        /// SDA slew rate disabled
        const DISSLW = 0x10;
        /// Hardware address pins enabled
        const HAEN = 0x08;
        /// INT pin configured as open-drain
        const ODR = 0x04;
        /// INT pin active-high
        const INTPOL = 0x02;
    }
}

/// A register of an MCP23Sxx family device.
pub trait ExpanderRegister: Copy + fmt::Debug + Send + Sync + 'static {
    /// Chip family name used in logs
    const CHIP: &'static str;

    /// Registers and power-on-reset values checked to confirm the chip is
    /// present: direction (all inputs), polarity and interrupt enable.
    const PRESENCE_CHECKS: [(Self, u8); 3];

    /// Register address on the wire.
    fn address(self) -> u8;

    /// Datasheet name of the register.
    fn name(self) -> &'static str;
}

/// Wire-level frame exchanged with an expander.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterFrame([u8; 3]);

impl RegisterFrame {
    /// Frame that stores `value` into `register`.
    pub const fn write(register: u8, value: u8) -> Self {
        Self([CHIP_ADDRESS | WRITE, register, value])
    }

    /// Frame that reads `register`.
    pub const fn read(register: u8) -> Self {
        Self([CHIP_ADDRESS | READ, register, 0x00])
    }

    /// Parse a frame as seen by the device on MOSI.
    ///
    /// Returns `None` if the opcode does not address an MCP23Sxx at
    /// hardware address 0.
    pub fn parse(bytes: [u8; 3]) -> Option<Self> {
        (bytes[0] & !READ == CHIP_ADDRESS).then_some(Self(bytes))
    }

    pub fn is_read(&self) -> bool {
        self.0[0] & READ == READ
    }

    pub fn register(&self) -> u8 {
        self.0[1]
    }

    pub fn data(&self) -> u8 {
        self.0[2]
    }

    pub fn bytes(&self) -> [u8; 3] {
        self.0
    }
}

/// Register-level driver for one MCP23Sxx expander.
pub struct Expander<D, R> {
    transaction: Transaction<D>,
    _register: PhantomData<fn() -> R>,
}

impl<D: SpiDevice, R: ExpanderRegister> Expander<D, R> {
    /// Create a driver on an attached device handle.
    pub fn new(transaction: Transaction<D>) -> Self {
        Self {
            transaction,
            _register: PhantomData,
        }
    }

    /// Write `value` to `register`.
    pub async fn write_register(&mut self, register: R, value: u8) -> Result<()> {
        debug!(
            "{} write {} (0x{:02X}) = 0x{:02X}",
            self.transaction.label(),
            register.name(),
            register.address(),
            value
        );
        let frame = RegisterFrame::write(register.address(), value);
        self.transaction.exchange(frame.bytes()).await?;
        Ok(())
    }

    /// Read the current value of `register`.
    pub async fn read_register(&mut self, register: R) -> Result<u8> {
        let frame = RegisterFrame::read(register.address());
        let rx = self.transaction.exchange(frame.bytes()).await?;
        Ok(rx[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripheral::Mcp23s17Register;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Records MOSI bytes and answers with a fixed MISO pattern.
    #[derive(Clone)]
    struct Scripted {
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
        reply: [u8; 3],
    }

    #[async_trait]
    impl SpiDevice for Scripted {
        async fn transfer_in_place(&mut self, buf: &mut [u8]) -> Result<()> {
            self.sent.lock().unwrap().push(buf.to_vec());
            buf.copy_from_slice(&self.reply[..buf.len()]);
            Ok(())
        }
    }

    type Sent = Arc<Mutex<Vec<Vec<u8>>>>;

    fn expander(reply: [u8; 3]) -> (Expander<Scripted, Mcp23s17Register>, Sent) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let dev = Scripted { sent: sent.clone(), reply };
        (Expander::new(Transaction::new(dev, "MCP23S17")), sent)
    }

    #[test]
    fn test_frame_layout() {
        assert_eq!(RegisterFrame::write(0x0C, 0xFF).bytes(), [0x40, 0x0C, 0xFF]);
        assert_eq!(RegisterFrame::read(0x12).bytes(), [0x41, 0x12, 0x00]);

        let parsed = RegisterFrame::parse([0x41, 0x04, 0x00]).unwrap();
        assert!(parsed.is_read());
        assert_eq!(parsed.register(), 0x04);

        // Wrong family prefix is not addressed to us
        assert!(RegisterFrame::parse([0x20, 0x00, 0x00]).is_none());
    }

    #[tokio::test]
    async fn test_write_register_sends_write_frame() {
        let (mut exp, sent) = expander([0xFF; 3]);
        exp.write_register(Mcp23s17Register::GppuA, 0xFF).await.unwrap();
        assert_eq!(*sent.lock().unwrap(), vec![vec![0x40, 0x0C, 0xFF]]);
    }

    #[tokio::test]
    async fn test_read_register_takes_third_byte() {
        let (mut exp, sent) = expander([0x11, 0x22, 0x5A]);
        let value = exp.read_register(Mcp23s17Register::GpioA).await.unwrap();
        assert_eq!(value, 0x5A);
        assert_eq!(*sent.lock().unwrap(), vec![vec![0x41, 0x12, 0x00]]);
    }

    #[test]
    fn test_iocon_bits() {
        assert_eq!(IoCon::ODR.bits(), 0x04);
        assert_eq!((IoCon::HAEN | IoCon::ODR).bits(), 0x0C);
    }
}
