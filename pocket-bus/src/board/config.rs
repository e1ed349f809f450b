//! Board wiring and bring-up configuration.
//!
//! Defaults describe the production board. Bench setups with different
//! wiring override them through environment variables.

use std::str::FromStr;
use std::time::Duration;

use super::DeviceRole;
use crate::error::{BusError, Result};
use crate::hw_trait::{BusConfig, DeviceConfig, SpiMode};

/// Largest transfer the bus is initialized for, in bytes
pub const MAX_TRANSFER_SIZE: usize = 32;

/// SPI clock ceiling shared by the MCP23Sxx and MCP4351
pub const MAX_CLOCK_HZ: u32 = 10_000_000;

/// Microcontroller pins used by the peripheral bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardPins {
    pub sclk: u8,
    pub mosi: u8,
    pub miso: u8,
    /// Chip select of the MCP23S17
    pub cs_data_bus: u8,
    /// Chip select of the MCP23S08
    pub cs_address_bus: u8,
    /// Chip select of the MCP4351
    pub cs_calibrator: u8,
    /// Input wired to the MCP23S08 open-drain INT output
    pub expander_int: u8,
}

impl Default for BoardPins {
    fn default() -> Self {
        Self {
            sclk: 14,
            mosi: 13,
            miso: 12,
            cs_data_bus: 5,
            cs_address_bus: 17,
            cs_calibrator: 16,
            expander_int: 27,
        }
    }
}

/// What to verify before the bus is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfTestMode {
    /// Configure without checking
    Skip,
    /// Check power-on-reset defaults and calibrator read-back
    Presence,
    /// Presence check, then toggle every expander pin so each line can be
    /// probed, then configure
    Wiring {
        /// Number of output inversions
        half_periods: u32,
        /// Time between inversions
        period: Duration,
    },
}

/// Complete bring-up configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    pub pins: BoardPins,
    /// SCLK rate for both expanders
    pub expander_clock_hz: u32,
    /// SCLK rate for the calibrator
    pub calibrator_clock_hz: u32,
    pub max_transfer_size: usize,
    pub self_test: SelfTestMode,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            pins: BoardPins::default(),
            expander_clock_hz: MAX_CLOCK_HZ,
            calibrator_clock_hz: 5_000_000,
            max_transfer_size: MAX_TRANSFER_SIZE,
            self_test: SelfTestMode::Skip,
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

impl BoardConfig {
    /// Parse configuration from environment variables.
    ///
    /// Unset or unparsable variables keep their defaults.
    ///
    /// # Environment Variables
    ///
    /// - `POCKET_BUS_PIN_SCLK`, `POCKET_BUS_PIN_MOSI`, `POCKET_BUS_PIN_MISO`
    /// - `POCKET_BUS_PIN_CS_DATA`, `POCKET_BUS_PIN_CS_ADDRESS`,
    ///   `POCKET_BUS_PIN_CS_CALIBRATOR`, `POCKET_BUS_PIN_INT`
    /// - `POCKET_BUS_EXPANDER_HZ`, `POCKET_BUS_CALIBRATOR_HZ`: clamped to
    ///   1 Hz..10 MHz
    /// - `POCKET_BUS_SELF_TEST`: `off`, `presence` or `wiring`
    /// - `POCKET_BUS_WIRING_HALF_PERIODS` (default 10),
    ///   `POCKET_BUS_WIRING_PERIOD_MS` (default 1000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let d = &defaults.pins;

        let pins = BoardPins {
            sclk: env_parse("POCKET_BUS_PIN_SCLK").unwrap_or(d.sclk),
            mosi: env_parse("POCKET_BUS_PIN_MOSI").unwrap_or(d.mosi),
            miso: env_parse("POCKET_BUS_PIN_MISO").unwrap_or(d.miso),
            cs_data_bus: env_parse("POCKET_BUS_PIN_CS_DATA").unwrap_or(d.cs_data_bus),
            cs_address_bus: env_parse("POCKET_BUS_PIN_CS_ADDRESS").unwrap_or(d.cs_address_bus),
            cs_calibrator: env_parse("POCKET_BUS_PIN_CS_CALIBRATOR").unwrap_or(d.cs_calibrator),
            expander_int: env_parse("POCKET_BUS_PIN_INT").unwrap_or(d.expander_int),
        };

        let expander_clock_hz = env_parse("POCKET_BUS_EXPANDER_HZ")
            .unwrap_or(defaults.expander_clock_hz)
            .clamp(1, MAX_CLOCK_HZ);
        let calibrator_clock_hz = env_parse("POCKET_BUS_CALIBRATOR_HZ")
            .unwrap_or(defaults.calibrator_clock_hz)
            .clamp(1, MAX_CLOCK_HZ);

        let self_test = match std::env::var("POCKET_BUS_SELF_TEST")
            .map(|s| s.trim().to_ascii_lowercase())
            .as_deref()
        {
            Ok("presence") => SelfTestMode::Presence,
            Ok("wiring") => SelfTestMode::Wiring {
                half_periods: env_parse("POCKET_BUS_WIRING_HALF_PERIODS").unwrap_or(10),
                period: Duration::from_millis(
                    env_parse("POCKET_BUS_WIRING_PERIOD_MS").unwrap_or(1000),
                ),
            },
            _ => defaults.self_test,
        };

        Self {
            pins,
            expander_clock_hz,
            calibrator_clock_hz,
            max_transfer_size: defaults.max_transfer_size,
            self_test,
        }
    }

    /// Bus-wide SPI parameters.
    pub fn bus_config(&self) -> BusConfig {
        BusConfig {
            sclk: self.pins.sclk,
            mosi: self.pins.mosi,
            miso: self.pins.miso,
            max_transfer_size: self.max_transfer_size,
        }
    }

    /// Chip-select pin wired to `role`.
    pub fn chip_select(&self, role: DeviceRole) -> u8 {
        match role {
            DeviceRole::DataBusExpander => self.pins.cs_data_bus,
            DeviceRole::AddressBusExpander => self.pins.cs_address_bus,
            DeviceRole::AnalogCalibrator => self.pins.cs_calibrator,
        }
    }

    /// SPI attachment parameters for `role`.
    pub fn device_config(&self, role: DeviceRole) -> DeviceConfig {
        let clock_hz = match role {
            DeviceRole::DataBusExpander | DeviceRole::AddressBusExpander => self.expander_clock_hz,
            DeviceRole::AnalogCalibrator => self.calibrator_clock_hz,
        };
        DeviceConfig {
            label: role.chip(),
            chip_select: self.chip_select(role),
            clock_hz,
            mode: SpiMode::Mode0,
            queue_size: 1,
        }
    }

    /// Reject wiring where two devices share a chip-select line.
    pub fn check_chip_selects(&self) -> Result<()> {
        for (i, &first) in DeviceRole::ALL.iter().enumerate() {
            for &second in &DeviceRole::ALL[i + 1..] {
                let pin = self.chip_select(first);
                if pin == self.chip_select(second) {
                    return Err(BusError::ChipSelectConflict { pin, first, second });
                }
            }
        }
        Ok(())
    }
}
