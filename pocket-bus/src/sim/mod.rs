//! Register-accurate simulation of the peripheral board.
//!
//! [`SimBoard`] holds the simulated chips keyed by chip-select pin and a log
//! of every frame exchanged. [`SimHost`] and [`SimPins`] implement the
//! hardware traits on top of it, so bring-up can be run on a workstation or
//! in tests with no hardware attached.
//!
//! A chip-select line with no chip installed behaves like an open MISO line
//! and reads back 0xFF.

mod expander;
mod potentiometer;

pub use expander::{ExpanderModel, SimExpander};
pub use potentiometer::SimPotentiometer;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::board::config::BoardConfig;
use crate::board::DeviceRole;
use crate::hw_trait::{
    BusConfig, DeviceConfig, PinConfig, PinConfigurator, Result, SpiDevice, SpiError, SpiHost,
};
use crate::peripheral::RegisterFrame;
use crate::tracing::prelude::*;

/// Device slots on the simulated SPI master
const MAX_DEVICES: usize = 3;

/// One chip-select cycle as seen on the wires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimFrame {
    pub chip_select: u8,
    pub tx: Vec<u8>,
    pub rx: Vec<u8>,
}

/// A simulated chip behind one chip-select line.
#[derive(Debug, Clone)]
pub enum SimChip {
    Expander(SimExpander),
    Potentiometer(SimPotentiometer),
}

impl SimChip {
    pub fn mcp23s17() -> Self {
        Self::Expander(SimExpander::new(ExpanderModel::Mcp23s17))
    }

    pub fn mcp23s08() -> Self {
        Self::Expander(SimExpander::new(ExpanderModel::Mcp23s08))
    }

    pub fn mcp4351() -> Self {
        Self::Potentiometer(SimPotentiometer::new())
    }

    fn exchange(&mut self, buf: &mut [u8]) {
        match self {
            Self::Expander(chip) => chip.exchange(buf),
            Self::Potentiometer(chip) => chip.exchange(buf),
        }
    }

    fn read(&self, address: u8) -> u8 {
        match self {
            Self::Expander(chip) => chip.read(address),
            Self::Potentiometer(chip) => chip.read(address),
        }
    }

    fn poke(&mut self, address: u8, value: u8) {
        match self {
            Self::Expander(chip) => chip.poke(address, value),
            Self::Potentiometer(chip) => chip.poke(address, value),
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    chips: HashMap<u8, SimChip>,
    bus: Option<BusConfig>,
    attached: Vec<DeviceConfig>,
    pins: HashMap<u8, PinConfig>,
    failing: Vec<u8>,
    frames: Vec<SimFrame>,
}

/// Shared handle to the simulated board.
#[derive(Debug, Clone, Default)]
pub struct SimBoard {
    state: Arc<Mutex<SimState>>,
}

impl SimBoard {
    /// Empty board: no chips, bus uninitialized.
    pub fn new() -> Self {
        Self::default()
    }

    /// Board populated with all three chips on the chip selects of `config`.
    pub fn for_config(config: &BoardConfig) -> Self {
        let board = Self::new();
        board.install(
            config.chip_select(DeviceRole::DataBusExpander),
            SimChip::mcp23s17(),
        );
        board.install(
            config.chip_select(DeviceRole::AddressBusExpander),
            SimChip::mcp23s08(),
        );
        board.install(
            config.chip_select(DeviceRole::AnalogCalibrator),
            SimChip::mcp4351(),
        );
        board
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        // A panic while the lock is held leaves the state consistent
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Place a chip on a chip-select line, replacing any chip there.
    pub fn install(&self, chip_select: u8, chip: SimChip) {
        self.state().chips.insert(chip_select, chip);
    }

    /// Remove the chip on a chip-select line.
    pub fn remove(&self, chip_select: u8) -> Option<SimChip> {
        self.state().chips.remove(&chip_select)
    }

    /// Force a register or memory location, bypassing device rules.
    pub fn poke(&self, chip_select: u8, address: u8, value: u8) {
        if let Some(chip) = self.state().chips.get_mut(&chip_select) {
            chip.poke(address, value);
        }
    }

    /// Current value of a register or memory location.
    pub fn peek(&self, chip_select: u8, address: u8) -> Option<u8> {
        self.state().chips.get(&chip_select).map(|c| c.read(address))
    }

    /// Drive external levels onto an expander port.
    pub fn set_inputs(&self, chip_select: u8, port: usize, levels: u8) {
        if let Some(SimChip::Expander(chip)) = self.state().chips.get_mut(&chip_select) {
            chip.set_inputs(port, levels);
        }
    }

    /// Make every transfer on a chip-select line fail.
    pub fn fail_transfers(&self, chip_select: u8, fail: bool) {
        let mut state = self.state();
        state.failing.retain(|&cs| cs != chip_select);
        if fail {
            state.failing.push(chip_select);
        }
    }

    /// Every frame exchanged so far, in order.
    pub fn frames(&self) -> Vec<SimFrame> {
        self.state().frames.clone()
    }

    /// Expander register writes on a chip-select line as (register, value).
    pub fn writes_to(&self, chip_select: u8) -> Vec<(u8, u8)> {
        self.state()
            .frames
            .iter()
            .filter(|f| f.chip_select == chip_select)
            .filter_map(|f| <[u8; 3]>::try_from(f.tx.as_slice()).ok())
            .filter_map(RegisterFrame::parse)
            .filter(|frame| !frame.is_read())
            .map(|frame| (frame.register(), frame.data()))
            .collect()
    }

    /// Bus parameters passed to [`SpiHost::initialize`].
    pub fn bus_config(&self) -> Option<BusConfig> {
        self.state().bus.clone()
    }

    /// Device parameters passed to [`SpiHost::attach`], in order.
    pub fn attached(&self) -> Vec<DeviceConfig> {
        self.state().attached.clone()
    }

    /// Configuration applied to a GPIO pin.
    pub fn pin_config(&self, pin: u8) -> Option<PinConfig> {
        self.state().pins.get(&pin).copied()
    }

    pub fn host(&self) -> SimHost {
        SimHost {
            board: self.clone(),
        }
    }

    pub fn pins(&self) -> SimPins {
        SimPins {
            board: self.clone(),
        }
    }

    fn transfer(&self, chip_select: u8, buf: &mut [u8]) -> Result<()> {
        let mut state = self.state();
        let Some(max) = state.bus.as_ref().map(|b| b.max_transfer_size) else {
            return Err(SpiError::NotInitialized.into());
        };
        if buf.len() > max {
            return Err(SpiError::TooLong {
                len: buf.len(),
                max,
            }
            .into());
        }
        if state.failing.contains(&chip_select) {
            return Err(SpiError::Transfer { len: buf.len() }.into());
        }

        let tx = buf.to_vec();
        match state.chips.get_mut(&chip_select) {
            Some(chip) => chip.exchange(buf),
            None => buf.fill(0xFF),
        }
        state.frames.push(SimFrame {
            chip_select,
            tx,
            rx: buf.to_vec(),
        });
        Ok(())
    }
}

/// Simulated SPI master.
pub struct SimHost {
    board: SimBoard,
}

#[async_trait]
impl SpiHost for SimHost {
    type Device = SimDevice;

    async fn initialize(&mut self, config: &BusConfig) -> Result<()> {
        debug!(
            sclk = config.sclk,
            mosi = config.mosi,
            miso = config.miso,
            max_transfer_size = config.max_transfer_size,
            "Simulated SPI bus initialized"
        );
        self.board.state().bus = Some(config.clone());
        Ok(())
    }

    async fn attach(&mut self, config: &DeviceConfig) -> Result<SimDevice> {
        let mut state = self.board.state();
        if state.bus.is_none() {
            return Err(SpiError::NotInitialized.into());
        }
        if state
            .attached
            .iter()
            .any(|d| d.chip_select == config.chip_select)
        {
            return Err(SpiError::ChipSelectInUse(config.chip_select).into());
        }
        if state.attached.len() >= MAX_DEVICES {
            return Err(SpiError::NoFreeSlot.into());
        }
        state.attached.push(config.clone());
        debug!(
            device = config.label,
            cs = config.chip_select,
            clock_hz = config.clock_hz,
            "Simulated device attached"
        );
        Ok(SimDevice {
            board: self.board.clone(),
            chip_select: config.chip_select,
        })
    }
}

/// Handle to one attached simulated device.
pub struct SimDevice {
    board: SimBoard,
    chip_select: u8,
}

#[async_trait]
impl SpiDevice for SimDevice {
    async fn transfer_in_place(&mut self, buf: &mut [u8]) -> Result<()> {
        self.board.transfer(self.chip_select, buf)
    }
}

/// Simulated GPIO block.
pub struct SimPins {
    board: SimBoard,
}

#[async_trait]
impl PinConfigurator for SimPins {
    async fn configure(&mut self, pin: u8, config: PinConfig) -> Result<()> {
        self.board.state().pins.insert(pin, config);
        Ok(())
    }
}
