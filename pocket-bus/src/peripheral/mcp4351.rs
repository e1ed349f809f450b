//! MCP4351 quad 8-bit digital potentiometer.
//!
//! Three of the four wipers set the analog reference levels of the video
//! output. Commands are two byte frames:
//!
//! ```text
//! byte 0: AD3 AD2 AD1 AD0 C1 C0 D9 D8    memory address, command, data MSBs
//! byte 1: D7..D0                         wiper step (write) or 0x00 (read)
//! ```
//!
//! A read returns the addressed location in the second response byte.
//!
//! Datasheet: <https://ww1.microchip.com/downloads/en/DeviceDoc/22242A.pdf>

use crate::hw_trait::{HwError, Result, SpiDevice};
use crate::tracing::prelude::*;
use crate::transport::Transaction;

/// Volatile memory map (datasheet table 7-2)
pub mod memory {
    pub const WIPER0: u8 = 0x00;
    pub const WIPER1: u8 = 0x01;
    pub const TCON0: u8 = 0x04;
    pub const WIPER2: u8 = 0x06;
    pub const WIPER3: u8 = 0x07;
    pub const TCON1: u8 = 0x0A;
}

/// Reference voltage at full-scale wiper position
pub const FULL_SCALE_MILLIVOLTS: u32 = 3300;

/// Highest 8-bit wiper step
pub const MAX_STEP: u8 = 255;

/// Two-bit command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Write = 0b00,
    Read = 0b11,
}

impl Command {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0b11 {
            0b00 => Some(Self::Write),
            0b11 => Some(Self::Read),
            _ => None,
        }
    }
}

/// One of the three calibration channels.
///
/// The channel-to-wiper mapping is fixed by board wiring: channels 0, 1 and 2
/// drive wipers 0, 1 and 2, which live at memory addresses 0, 1 and 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Channel(u8);

impl Channel {
    const MEMORY_ADDRESS: [u8; 3] = [memory::WIPER0, memory::WIPER1, memory::WIPER2];

    /// All calibration channels in index order.
    pub const ALL: [Channel; 3] = [Channel(0), Channel(1), Channel(2)];

    /// Channel by index (0, 1 or 2).
    pub fn new(index: u8) -> Result<Self> {
        if (index as usize) < Self::MEMORY_ADDRESS.len() {
            Ok(Self(index))
        } else {
            Err(HwError::InvalidParameter(format!(
                "Calibration channel {} out of range (0-2)",
                index
            )))
        }
    }

    pub fn index(self) -> u8 {
        self.0
    }

    /// Potentiometer memory address of this channel's wiper.
    pub fn memory_address(self) -> u8 {
        Self::MEMORY_ADDRESS[self.0 as usize]
    }
}

impl TryFrom<u8> for Channel {
    type Error = HwError;

    fn try_from(index: u8) -> Result<Self> {
        Self::new(index)
    }
}

/// Wire-level potentiometer frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PotFrame([u8; 2]);

impl PotFrame {
    /// Pack a memory address and command into the command byte.
    pub const fn command_byte(address: u8, command: Command) -> u8 {
        ((address & 0x0F) << 4) | ((command as u8) << 2)
    }

    /// Frame that sets `channel`'s wiper to `step`.
    pub fn write(channel: Channel, step: u8) -> Self {
        Self([Self::command_byte(channel.memory_address(), Command::Write), step])
    }

    /// Frame that reads back `channel`'s wiper.
    pub fn read(channel: Channel) -> Self {
        Self([Self::command_byte(channel.memory_address(), Command::Read), 0x00])
    }

    pub fn bytes(&self) -> [u8; 2] {
        self.0
    }
}

/// Convert a reference level in millivolts to the nearest lower wiper step.
pub const fn step_for_millivolts(millivolts: u32) -> u8 {
    let mv = if millivolts > FULL_SCALE_MILLIVOLTS {
        FULL_SCALE_MILLIVOLTS
    } else {
        millivolts
    };
    (mv * MAX_STEP as u32 / FULL_SCALE_MILLIVOLTS) as u8
}

/// MCP4351 driver
pub struct Mcp4351<D> {
    transaction: Transaction<D>,
}

impl<D: SpiDevice> Mcp4351<D> {
    /// Create a driver on an attached device handle.
    pub fn new(transaction: Transaction<D>) -> Self {
        Self { transaction }
    }

    /// Set a channel's wiper step.
    pub async fn write_channel(&mut self, channel: Channel, step: u8) -> Result<()> {
        debug!(
            channel = channel.index(),
            address = channel.memory_address(),
            step,
            "Set calibration wiper"
        );
        self.transaction.exchange(PotFrame::write(channel, step).bytes()).await?;
        Ok(())
    }

    /// Read a channel's current wiper step.
    pub async fn read_channel(&mut self, channel: Channel) -> Result<u8> {
        let rx = self.transaction.exchange(PotFrame::read(channel).bytes()).await?;
        Ok(rx[1])
    }

    /// Set a channel to the step closest below a reference voltage.
    pub async fn set_millivolts(&mut self, channel: Channel, millivolts: u32) -> Result<()> {
        self.write_channel(channel, step_for_millivolts(millivolts)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Minimal wiper memory answering read frames from its contents.
    #[derive(Clone, Default)]
    struct Wipers {
        memory: Arc<Mutex<[u8; 16]>>,
        sent: Arc<Mutex<Vec<[u8; 2]>>>,
    }

    #[async_trait]
    impl SpiDevice for Wipers {
        async fn transfer_in_place(&mut self, buf: &mut [u8]) -> Result<()> {
            let frame = [buf[0], buf[1]];
            self.sent.lock().unwrap().push(frame);
            let address = (frame[0] >> 4) as usize;
            let mut memory = self.memory.lock().unwrap();
            match Command::from_bits(frame[0] >> 2) {
                Some(Command::Write) => {
                    memory[address] = frame[1];
                    buf.copy_from_slice(&[0xFF, 0xFF]);
                }
                Some(Command::Read) => buf.copy_from_slice(&[0xFE, memory[address]]),
                None => buf.copy_from_slice(&[0xFF, 0xFF]),
            }
            Ok(())
        }
    }

    fn pot() -> (Mcp4351<Wipers>, Wipers) {
        let dev = Wipers::default();
        (Mcp4351::new(Transaction::new(dev.clone(), "MCP4351")), dev)
    }

    #[test]
    fn test_channel_map() {
        let addresses: Vec<u8> = Channel::ALL.iter().map(|c| c.memory_address()).collect();
        assert_eq!(addresses, vec![0, 1, 6]);
        assert!(Channel::new(3).is_err());
        assert!(Channel::try_from(255).is_err());
        assert_eq!(Channel::try_from(2).unwrap(), Channel::ALL[2]);
    }

    #[test]
    fn test_step_for_millivolts() {
        assert_eq!(step_for_millivolts(0), 0);
        assert_eq!(step_for_millivolts(1000), 77);
        assert_eq!(step_for_millivolts(2000), 154);
        assert_eq!(step_for_millivolts(3000), 231);
        assert_eq!(step_for_millivolts(3300), 255);
        // Clamped at full scale
        assert_eq!(step_for_millivolts(5000), 255);
    }

    #[tokio::test]
    async fn test_write_channel_frame() {
        let (mut pot, dev) = pot();
        pot.write_channel(Channel::new(1).unwrap(), 128).await.unwrap();
        assert_eq!(dev.sent.lock().unwrap()[0], [0x10, 128]);
    }

    #[tokio::test]
    async fn test_set_millivolts_writes_truncated_step() {
        let (mut pot, dev) = pot();
        pot.set_millivolts(Channel::ALL[2], 2000).await.unwrap();
        pot.set_millivolts(Channel::ALL[0], 9999).await.unwrap();
        assert_eq!(*dev.sent.lock().unwrap(), vec![[0x60, 154], [0x00, 255]]);
    }

    #[tokio::test]
    async fn test_read_channel_frame_and_value() {
        let (mut pot, dev) = pot();
        dev.memory.lock().unwrap()[6] = 0x42;

        let value = pot.read_channel(Channel::new(2).unwrap()).await.unwrap();

        assert_eq!(dev.sent.lock().unwrap()[0], [0x6C, 0x00]);
        assert_eq!(value, 0x42);
    }

    #[tokio::test]
    async fn test_channel_round_trip() {
        let (mut pot, _dev) = pot();
        for channel in Channel::ALL {
            for step in [0u8, 1, 77, 128, 254, 255] {
                pot.write_channel(channel, step).await.unwrap();
                assert_eq!(pot.read_channel(channel).await.unwrap(), step);
            }
        }
    }
}
