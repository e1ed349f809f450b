//! Bench tool: bring up the peripheral bus on the simulated board and dump
//! the resulting register state.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use pocket_bus::board::{BoardConfig, DeviceRole, SelfTestMode};
use pocket_bus::peripheral::{Channel, ExpanderRegister, Mcp23s08Register, Mcp23s17Register};
use pocket_bus::sim::SimBoard;
use pocket_bus::tracing::prelude::*;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Absent {
    /// MCP23S17
    Data,
    /// MCP23S08
    Address,
    /// MCP4351
    Calibrator,
}

impl From<Absent> for DeviceRole {
    fn from(absent: Absent) -> Self {
        match absent {
            Absent::Data => DeviceRole::DataBusExpander,
            Absent::Address => DeviceRole::AddressBusExpander,
            Absent::Calibrator => DeviceRole::AnalogCalibrator,
        }
    }
}

/// Bring up the PocketTRS peripheral bus against the board simulator.
///
/// Settings come from POCKET_BUS_* environment variables; flags override them.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Run the presence self-test before configuring
    #[arg(long)]
    self_test: bool,

    /// Run the wiring test for N half-periods after the presence test
    #[arg(long, value_name = "N")]
    wiring_cycles: Option<u32>,

    /// Wiring test half-period in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    wiring_period_ms: u64,

    /// Leave a chip off the simulated board
    #[arg(long, value_enum)]
    absent: Vec<Absent>,
}

impl Args {
    fn board_config(&self) -> BoardConfig {
        let mut config = BoardConfig::from_env();
        if let Some(half_periods) = self.wiring_cycles {
            config.self_test = SelfTestMode::Wiring {
                half_periods,
                period: Duration::from_millis(self.wiring_period_ms),
            };
        } else if self.self_test {
            config.self_test = SelfTestMode::Presence;
        }
        config
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    pocket_bus::tracing::init_journald_or_stdout();

    let args = Args::parse();
    let config = args.board_config();
    info!(self_test = ?config.self_test, "Starting peripheral bus bring-up");

    let board = SimBoard::for_config(&config);
    for &absent in &args.absent {
        let role = DeviceRole::from(absent);
        board.remove(config.chip_select(role));
        warn!("{} removed from simulated board", role);
    }

    let mut bus = pocket_bus::initialize_bus(&mut board.host(), &mut board.pins(), config)
        .await
        .context("Peripheral bus bring-up failed")?;

    for register in Mcp23s17Register::ALL {
        let value = bus.read_register(register).await?;
        info!("{:<10} {:<8} = 0x{:02X}", "MCP23S17", register.name(), value);
    }
    for register in Mcp23s08Register::ALL {
        let value = bus.read_register(register).await?;
        info!("{:<10} {:<8} = 0x{:02X}", "MCP23S08", register.name(), value);
    }
    for channel in Channel::ALL {
        let step = bus.read_channel(channel).await?;
        info!("{:<10} channel {} = {}", "MCP4351", channel.index(), step);
    }

    info!(
        frames = board.frames().len(),
        self_test = ?bus.config().self_test,
        "Bring-up complete"
    );
    Ok(())
}
