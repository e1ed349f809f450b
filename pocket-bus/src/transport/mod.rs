//! Transaction primitive.
//!
//! Every byte that reaches a peripheral passes through
//! [`Transaction::exchange`]. Frames are fixed-length arrays, so the length of
//! each exchange is known at compile time (two bytes for the calibrator, three
//! for the expanders). A transport failure is returned to the caller as-is;
//! SPI transactions are atomic at the hardware level, so there is no partial
//! result to retry from.

use crate::hw_trait::{Result, SpiDevice};
use crate::tracing::prelude::*;

/// Owned transaction handle for one attached device.
pub struct Transaction<D> {
    device: D,
    label: &'static str,
}

impl<D: SpiDevice> Transaction<D> {
    /// Wrap an attached device handle.
    pub fn new(device: D, label: &'static str) -> Self {
        Self { device, label }
    }

    /// Name of the device this handle talks to.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Send `tx` and return the bytes received in the same positions.
    pub async fn exchange<const N: usize>(&mut self, tx: [u8; N]) -> Result<[u8; N]> {
        let mut buf = tx;
        if let Err(e) = self.device.transfer_in_place(&mut buf).await {
            error!(device = self.label, tx = ?tx, "SPI transaction failed: {}", e);
            return Err(e);
        }
        trace!(device = self.label, tx = ?tx, rx = ?buf, "SPI exchange");
        Ok(buf)
    }
}
