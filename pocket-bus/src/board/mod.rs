//! Peripheral board bring-up.
//!
//! The board carries three SPI devices on one bus: an MCP23S17 bridging the
//! host's data and low address lines, an MCP23S08 carrying the host's control
//! lines, and an MCP4351 setting the video reference levels.
//!
//! Bring-up moves through three typestates, so registers cannot be touched
//! before the bus is attached and configured:
//!
//! ```text
//! BusBuilder --attach--> AttachedBus --configure--> PeripheralBus
//!                         |      ^
//!                         +------+ self_test (optional)
//! ```
//!
//! [`initialize_bus`] runs the whole sequence as set by [`BoardConfig`].

pub mod config;
pub mod setup;

use std::fmt;
use std::sync::Arc;

use crate::error::{BusError, Result};
use crate::hw_trait::{HwError, PinConfig, PinConfigurator, SpiDevice, SpiHost};
use crate::peripheral::{
    Channel, Expander, Mcp23s08, Mcp23s08Register, Mcp23s17, Mcp23s17Register, Mcp4351,
};
use crate::tracing::prelude::*;
use crate::transport::Transaction;

pub use config::{BoardConfig, BoardPins, SelfTestMode};
pub use setup::{BusRoleConfig, ControlLines, PortConfig};

/// The three devices on the peripheral bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceRole {
    /// MCP23S17 on the host's data bus and A0-A7
    DataBusExpander,
    /// MCP23S08 on the host's control lines
    AddressBusExpander,
    /// MCP4351 setting video reference levels
    AnalogCalibrator,
}

impl DeviceRole {
    /// Every role, in attach order.
    pub const ALL: [DeviceRole; 3] = [
        DeviceRole::DataBusExpander,
        DeviceRole::AddressBusExpander,
        DeviceRole::AnalogCalibrator,
    ];

    /// Part number of the chip filling this role.
    pub fn chip(self) -> &'static str {
        match self {
            DeviceRole::DataBusExpander => "MCP23S17",
            DeviceRole::AddressBusExpander => "MCP23S08",
            DeviceRole::AnalogCalibrator => "MCP4351",
        }
    }
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let function = match self {
            DeviceRole::DataBusExpander => "data bus",
            DeviceRole::AddressBusExpander => "control lines",
            DeviceRole::AnalogCalibrator => "calibrator",
        };
        write!(f, "{} ({})", self.chip(), function)
    }
}

/// An expander register on either chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusRegister {
    DataBus(Mcp23s17Register),
    AddressBus(Mcp23s08Register),
}

impl From<Mcp23s17Register> for BusRegister {
    fn from(register: Mcp23s17Register) -> Self {
        BusRegister::DataBus(register)
    }
}

impl From<Mcp23s08Register> for BusRegister {
    fn from(register: Mcp23s08Register) -> Self {
        BusRegister::AddressBus(register)
    }
}

/// Wrap a transport fault with the device it happened on.
pub(crate) fn transport_fault(role: DeviceRole) -> impl Fn(HwError) -> BusError {
    move |source| BusError::Transport { role, source }
}

/// Start of bring-up: nothing attached yet.
pub struct BusBuilder {
    config: BoardConfig,
}

impl BusBuilder {
    pub fn new(config: BoardConfig) -> Self {
        Self { config }
    }

    /// Initialize the bus, attach all three devices and set up the
    /// expander interrupt input.
    ///
    /// Chip-select conflicts are rejected before anything is attached.
    pub async fn attach<S, G>(self, spi: &mut S, gpio: &mut G) -> Result<AttachedBus<S::Device>>
    where
        S: SpiHost,
        G: PinConfigurator,
    {
        let config = self.config;
        config.check_chip_selects()?;

        let bus = config.bus_config();
        spi.initialize(&bus).await.map_err(BusError::BusInit)?;
        debug!(
            sclk = bus.sclk,
            mosi = bus.mosi,
            miso = bus.miso,
            max_transfer_size = bus.max_transfer_size,
            "SPI bus initialized"
        );

        let data_bus = Expander::new(attach_role(spi, &config, DeviceRole::DataBusExpander).await?);
        let address_bus =
            Expander::new(attach_role(spi, &config, DeviceRole::AddressBusExpander).await?);
        let calibrator =
            Mcp4351::new(attach_role(spi, &config, DeviceRole::AnalogCalibrator).await?);

        // Interrupt-on-change is not used; the line is polled
        let pin = config.pins.expander_int;
        gpio.configure(pin, PinConfig::polled_open_drain_input())
            .await
            .map_err(|source| BusError::PinConfig { pin, source })?;

        Ok(AttachedBus {
            config,
            data_bus,
            address_bus,
            calibrator,
        })
    }
}

async fn attach_role<S: SpiHost>(
    spi: &mut S,
    config: &BoardConfig,
    role: DeviceRole,
) -> Result<Transaction<S::Device>> {
    let device = config.device_config(role);
    let handle = spi
        .attach(&device)
        .await
        .map_err(|source| BusError::Attach { role, source })?;
    debug!(
        cs = device.chip_select,
        clock_hz = device.clock_hz,
        "{} attached",
        role
    );
    Ok(Transaction::new(handle, device.label))
}

/// Devices attached, not yet configured.
pub struct AttachedBus<D> {
    config: BoardConfig,
    data_bus: Mcp23s17<D>,
    address_bus: Mcp23s08<D>,
    calibrator: Mcp4351<D>,
}

impl<D: SpiDevice> AttachedBus<D> {
    /// Run the checks selected by the configured self-test mode.
    ///
    /// The calibrator is checked first, then the MCP23S17, then the
    /// MCP23S08. The first failure stops the test.
    pub async fn self_test(&mut self) -> Result<()> {
        let (half_periods, period) = match self.config.self_test {
            SelfTestMode::Skip => return Ok(()),
            SelfTestMode::Presence => (None, None),
            SelfTestMode::Wiring {
                half_periods,
                period,
            } => (Some(half_periods), Some(period)),
        };

        self_test::check_calibrator(&mut self.calibrator).await?;
        self_test::check_expander(DeviceRole::DataBusExpander, &mut self.data_bus).await?;
        self_test::check_expander(DeviceRole::AddressBusExpander, &mut self.address_bus).await?;

        if let (Some(half_periods), Some(period)) = (half_periods, period) {
            self_test::wiring_test(
                &mut self.data_bus,
                &mut self.address_bus,
                half_periods,
                period,
            )
            .await?;
        }
        Ok(())
    }

    /// Apply the steady-state bus role configuration.
    pub async fn configure(self) -> Result<PeripheralBus<D>> {
        self.configure_with(&BusRoleConfig::default()).await
    }

    /// Apply a specific bus role configuration.
    pub async fn configure_with(mut self, roles: &BusRoleConfig) -> Result<PeripheralBus<D>> {
        setup::apply(roles, &mut self.data_bus, &mut self.address_bus).await?;
        info!("Peripheral bus configured");
        Ok(PeripheralBus {
            config: self.config,
            data_bus: self.data_bus,
            address_bus: self.address_bus,
            calibrator: self.calibrator,
        })
    }
}

/// Configured bus, ready for register access.
pub struct PeripheralBus<D> {
    config: BoardConfig,
    data_bus: Mcp23s17<D>,
    address_bus: Mcp23s08<D>,
    calibrator: Mcp4351<D>,
}

impl<D: SpiDevice> PeripheralBus<D> {
    /// Write an expander register.
    pub async fn write_register(
        &mut self,
        register: impl Into<BusRegister>,
        value: u8,
    ) -> Result<()> {
        match register.into() {
            BusRegister::DataBus(r) => self
                .data_bus
                .write_register(r, value)
                .await
                .map_err(transport_fault(DeviceRole::DataBusExpander)),
            BusRegister::AddressBus(r) => self
                .address_bus
                .write_register(r, value)
                .await
                .map_err(transport_fault(DeviceRole::AddressBusExpander)),
        }
    }

    /// Read an expander register.
    pub async fn read_register(&mut self, register: impl Into<BusRegister>) -> Result<u8> {
        match register.into() {
            BusRegister::DataBus(r) => self
                .data_bus
                .read_register(r)
                .await
                .map_err(transport_fault(DeviceRole::DataBusExpander)),
            BusRegister::AddressBus(r) => self
                .address_bus
                .read_register(r)
                .await
                .map_err(transport_fault(DeviceRole::AddressBusExpander)),
        }
    }

    /// Set a calibration channel's wiper step.
    pub async fn write_channel(&mut self, channel: Channel, step: u8) -> Result<()> {
        self.calibrator
            .write_channel(channel, step)
            .await
            .map_err(transport_fault(DeviceRole::AnalogCalibrator))
    }

    /// Read a calibration channel's wiper step.
    pub async fn read_channel(&mut self, channel: Channel) -> Result<u8> {
        self.calibrator
            .read_channel(channel)
            .await
            .map_err(transport_fault(DeviceRole::AnalogCalibrator))
    }

    /// Configuration the bus was brought up with.
    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Share the bus between tasks.
    pub fn into_shared(self) -> Arc<tokio::sync::Mutex<Self>> {
        Arc::new(tokio::sync::Mutex::new(self))
    }
}

/// Bring up the peripheral bus: attach, optional self-test, configure.
///
/// Call once at startup. Any error leaves the expanders unconfigured.
pub async fn initialize_bus<S, G>(
    spi: &mut S,
    gpio: &mut G,
    config: BoardConfig,
) -> Result<PeripheralBus<S::Device>>
where
    S: SpiHost,
    G: PinConfigurator,
{
    let mut bus = BusBuilder::new(config).attach(spi, gpio).await?;
    bus.self_test().await?;
    bus.configure().await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::hw_trait::{InterruptType, PinMode, Pull};
    use crate::sim::{SimBoard, SimDevice};

    async fn bring_up(
        config: BoardConfig,
        board: &SimBoard,
    ) -> Result<PeripheralBus<SimDevice>> {
        initialize_bus(&mut board.host(), &mut board.pins(), config).await
    }

    fn presence_config() -> BoardConfig {
        BoardConfig {
            self_test: SelfTestMode::Presence,
            ..BoardConfig::default()
        }
    }

    #[test]
    fn test_role_display() {
        assert_eq!(
            DeviceRole::DataBusExpander.to_string(),
            "MCP23S17 (data bus)"
        );
        assert_eq!(
            DeviceRole::AddressBusExpander.to_string(),
            "MCP23S08 (control lines)"
        );
        assert_eq!(DeviceRole::AnalogCalibrator.chip(), "MCP4351");
    }

    #[tokio::test]
    async fn test_ports_configured_after_init() {
        let config = presence_config();
        let board = SimBoard::for_config(&config);
        let mut bus = bring_up(config, &board).await.unwrap();

        assert_eq!(bus.read_register(Mcp23s17Register::IodirA).await.unwrap(), 0xFF);
        assert_eq!(bus.read_register(Mcp23s17Register::IodirB).await.unwrap(), 0x00);
        assert_eq!(bus.read_register(Mcp23s17Register::GppuA).await.unwrap(), 0xFF);
        assert_eq!(bus.read_register(Mcp23s17Register::OlatB).await.unwrap(), 0x00);
        assert_eq!(bus.read_register(Mcp23s08Register::Iodir).await.unwrap(), 0x1C);
        assert_eq!(bus.read_register(Mcp23s08Register::Iocon).await.unwrap(), 0x04);
    }

    #[tokio::test]
    async fn test_write_order_per_expander() {
        let config = BoardConfig::default();
        let board = SimBoard::for_config(&config);
        bring_up(config.clone(), &board).await.unwrap();

        let s17: Vec<u8> = board
            .writes_to(config.pins.cs_data_bus)
            .into_iter()
            .map(|(register, _)| register)
            .collect();
        assert_eq!(
            s17,
            vec![
                Mcp23s17Register::IodirA as u8,
                Mcp23s17Register::GppuA as u8,
                Mcp23s17Register::GpintenA as u8,
                Mcp23s17Register::IodirB as u8,
                Mcp23s17Register::GppuB as u8,
                Mcp23s17Register::GpintenB as u8,
                Mcp23s17Register::GpioB as u8,
            ]
        );

        let s08: Vec<u8> = board
            .writes_to(config.pins.cs_address_bus)
            .into_iter()
            .map(|(register, _)| register)
            .collect();
        assert_eq!(
            s08,
            vec![
                Mcp23s08Register::Iodir as u8,
                Mcp23s08Register::Gppu as u8,
                Mcp23s08Register::Gpinten as u8,
                Mcp23s08Register::Iocon as u8,
            ]
        );
    }

    #[tokio::test]
    async fn test_self_test_order() {
        let config = presence_config();
        let board = SimBoard::for_config(&config);
        bring_up(config.clone(), &board).await.unwrap();

        let mut order: Vec<u8> = board.frames().iter().map(|f| f.chip_select).collect();
        order.dedup();
        assert_eq!(
            &order[..3],
            &[
                config.pins.cs_calibrator,
                config.pins.cs_data_bus,
                config.pins.cs_address_bus
            ]
        );
    }

    #[tokio::test]
    async fn test_absent_expander_halts_before_configuration() {
        let config = presence_config();
        let board = SimBoard::for_config(&config);
        board.remove(config.pins.cs_address_bus);

        match bring_up(config.clone(), &board).await {
            Err(BusError::DeviceNotFound { role, .. }) => {
                assert_eq!(role, DeviceRole::AddressBusExpander)
            }
            Err(e) => panic!("Expected device not found, got {}", e),
            Ok(_) => panic!("Bring-up succeeded with an absent expander"),
        }
        assert!(board.writes_to(config.pins.cs_data_bus).is_empty());
    }

    #[tokio::test]
    async fn test_deviating_register_halts_before_configuration() {
        let config = presence_config();
        let board = SimBoard::for_config(&config);
        board.poke(
            config.pins.cs_data_bus,
            Mcp23s17Register::GpintenA as u8,
            0x01,
        );

        assert!(matches!(
            bring_up(config.clone(), &board).await,
            Err(BusError::DeviceNotFound {
                role: DeviceRole::DataBusExpander,
                register: "GPINTENA",
                expected: 0x00,
                actual: 0x01,
            })
        ));
        assert!(board.writes_to(config.pins.cs_data_bus).is_empty());
        assert!(board.writes_to(config.pins.cs_address_bus).is_empty());
    }

    #[tokio::test]
    async fn test_absent_calibrator_is_fatal() {
        let config = presence_config();
        let board = SimBoard::for_config(&config);
        board.remove(config.pins.cs_calibrator);

        assert!(matches!(
            bring_up(config, &board).await,
            Err(BusError::CalibrationMismatch {
                role: DeviceRole::AnalogCalibrator,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_skipped_self_test_still_configures() {
        let config = BoardConfig::default();
        let board = SimBoard::for_config(&config);
        board.remove(config.pins.cs_calibrator);

        let bus = bring_up(config.clone(), &board).await;
        assert!(bus.is_ok());
        assert_eq!(
            board.peek(config.pins.cs_data_bus, Mcp23s17Register::IodirB as u8),
            Some(0x00)
        );
    }

    #[tokio::test]
    async fn test_chip_select_conflict_rejected_before_attach() {
        let mut config = BoardConfig::default();
        config.pins.cs_address_bus = config.pins.cs_data_bus;
        let board = SimBoard::new();

        assert!(matches!(
            bring_up(config, &board).await,
            Err(BusError::ChipSelectConflict { .. })
        ));
        assert!(board.bus_config().is_none());
        assert!(board.attached().is_empty());
    }

    #[tokio::test]
    async fn test_attach_parameters_and_interrupt_pin() {
        let config = BoardConfig::default();
        let board = SimBoard::for_config(&config);
        bring_up(config.clone(), &board).await.unwrap();

        assert_eq!(board.bus_config(), Some(config.bus_config()));
        let attached = board.attached();
        assert_eq!(attached.len(), 3);
        assert_eq!(attached[0].chip_select, config.pins.cs_data_bus);
        assert_eq!(attached[2].clock_hz, config.calibrator_clock_hz);

        let pin = board.pin_config(config.pins.expander_int).unwrap();
        assert_eq!(pin.mode, PinMode::Input);
        assert_eq!(pin.pull, Pull::Up);
        assert_eq!(pin.interrupt, InterruptType::Disabled);
    }

    #[tokio::test]
    async fn test_every_read_write_register_round_trips() {
        let config = BoardConfig::default();
        let board = SimBoard::for_config(&config);
        let mut bus = bring_up(config, &board).await.unwrap();

        let s17 = Mcp23s17Register::ALL.into_iter().filter(|r| {
            !matches!(
                r,
                Mcp23s17Register::IntfA
                    | Mcp23s17Register::IntfB
                    | Mcp23s17Register::IntcapA
                    | Mcp23s17Register::IntcapB
                    | Mcp23s17Register::GpioA
                    | Mcp23s17Register::GpioB
            )
        });
        for register in s17 {
            for value in 0..=255u8 {
                bus.write_register(register, value).await.unwrap();
                assert_eq!(
                    bus.read_register(register).await.unwrap(),
                    value,
                    "{:?}",
                    register
                );
            }
        }

        let s08 = Mcp23s08Register::ALL.into_iter().filter(|r| {
            !matches!(
                r,
                Mcp23s08Register::Intf | Mcp23s08Register::Intcap | Mcp23s08Register::Gpio
            )
        });
        for register in s08 {
            for value in 0..=255u8 {
                bus.write_register(register, value).await.unwrap();
                assert_eq!(
                    bus.read_register(register).await.unwrap(),
                    value,
                    "{:?}",
                    register
                );
            }
        }
    }

    #[tokio::test]
    async fn test_every_channel_step_round_trips() {
        let config = BoardConfig::default();
        let board = SimBoard::for_config(&config);
        let mut bus = bring_up(config.clone(), &board).await.unwrap();

        for channel in Channel::ALL {
            for step in 0..=255u8 {
                bus.write_channel(channel, step).await.unwrap();
                assert_eq!(bus.read_channel(channel).await.unwrap(), step);
                assert_eq!(
                    board.peek(config.pins.cs_calibrator, channel.memory_address()),
                    Some(step)
                );
            }
        }
    }

    /// Every expander register, read back through the bus.
    async fn register_dump(bus: &mut PeripheralBus<SimDevice>) -> Vec<u8> {
        let mut values = Vec::new();
        for register in Mcp23s17Register::ALL {
            values.push(bus.read_register(register).await.unwrap());
        }
        for register in Mcp23s08Register::ALL {
            values.push(bus.read_register(register).await.unwrap());
        }
        values
    }

    #[tokio::test(start_paused = true)]
    async fn test_wiring_test_leaves_same_configured_state() {
        let plain = BoardConfig::default();
        let board = SimBoard::for_config(&plain);
        let mut bus = bring_up(plain, &board).await.unwrap();
        let expected = register_dump(&mut bus).await;

        // An even count ends the toggling with the latches high
        let wiring = BoardConfig {
            self_test: SelfTestMode::Wiring {
                half_periods: 10,
                period: Duration::from_secs(1),
            },
            ..BoardConfig::default()
        };
        let board = SimBoard::for_config(&wiring);
        let mut bus = bring_up(wiring.clone(), &board).await.unwrap();

        assert_eq!(bus.config(), &wiring);
        assert_eq!(register_dump(&mut bus).await, expected);
        assert_eq!(
            board.peek(wiring.pins.cs_address_bus, Mcp23s08Register::Olat as u8),
            Some(0x00)
        );
        assert_eq!(
            board.peek(wiring.pins.cs_data_bus, Mcp23s17Register::OlatA as u8),
            Some(0x00)
        );
    }

    #[tokio::test]
    async fn test_register_and_channel_access() {
        let config = BoardConfig::default();
        let board = SimBoard::for_config(&config);
        let mut bus = bring_up(config.clone(), &board).await.unwrap();

        bus.write_register(Mcp23s17Register::GpioB, 0x3C).await.unwrap();
        assert_eq!(bus.read_register(Mcp23s17Register::OlatB).await.unwrap(), 0x3C);
        assert_eq!(bus.read_register(Mcp23s17Register::GpioB).await.unwrap(), 0x3C);

        bus.write_register(Mcp23s08Register::Defval, 0xA5).await.unwrap();
        assert_eq!(bus.read_register(Mcp23s08Register::Defval).await.unwrap(), 0xA5);

        // Host drives D0-D7
        board.set_inputs(config.pins.cs_data_bus, 0, 0x5A);
        assert_eq!(bus.read_register(Mcp23s17Register::GpioA).await.unwrap(), 0x5A);

        let channel = Channel::new(2).unwrap();
        bus.write_channel(channel, 200).await.unwrap();
        assert_eq!(bus.read_channel(channel).await.unwrap(), 200);
        assert_eq!(board.peek(config.pins.cs_calibrator, 6), Some(200));
    }

    #[tokio::test]
    async fn test_transport_fault_names_device() {
        let config = BoardConfig::default();
        let board = SimBoard::for_config(&config);
        let mut bus = bring_up(config.clone(), &board).await.unwrap();

        board.fail_transfers(config.pins.cs_calibrator, true);
        assert!(matches!(
            bus.read_channel(Channel::ALL[0]).await,
            Err(BusError::Transport {
                role: DeviceRole::AnalogCalibrator,
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wiring_mode_then_configured() {
        let config = BoardConfig {
            self_test: SelfTestMode::Wiring {
                half_periods: 2,
                period: Duration::from_millis(500),
            },
            ..BoardConfig::default()
        };
        let board = SimBoard::for_config(&config);
        let shared = bring_up(config.clone(), &board).await.unwrap().into_shared();

        let mut bus = shared.lock().await;
        assert_eq!(bus.read_register(Mcp23s17Register::IodirA).await.unwrap(), 0xFF);
        assert_eq!(bus.read_register(Mcp23s08Register::Iodir).await.unwrap(), 0x1C);
    }
}
