//! Register-level drivers for the devices on the peripheral SPI bus.
//!
//! These modules are the only place where register and command encodings
//! are packed into frames; everything above works with typed registers and
//! channels.

pub mod mcp23s08;
pub mod mcp23s17;
pub mod mcp23sxx;
pub mod mcp4351;

pub use mcp23s08::{Mcp23s08, Mcp23s08Register};
pub use mcp23s17::{Mcp23s17, Mcp23s17Register};
pub use mcp23sxx::{Expander, ExpanderRegister, IoCon, RegisterFrame};
pub use mcp4351::{step_for_millivolts, Channel, Mcp4351, PotFrame};
