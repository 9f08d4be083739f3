//! Driver error type.

use embedded_hal::{digital, spi};
use thiserror::Error;

/// Errors reported by the transport, codec, patch loader and device layers.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A control or data channel transfer failed.
    #[error("bus transfer failed: {0:?}")]
    Transport(spi::ErrorKind),

    /// The reset line could not be driven.
    #[error("reset line error: {0:?}")]
    Gpio(digital::ErrorKind),

    /// The ready line did not come back after a register access.
    #[error("ready line timeout after {timeout_ms} ms (reg={reg:#x})")]
    Timeout { reg: u8, timeout_ms: u32 },

    /// The status register reported a chip family this driver has no support for.
    #[error("unsupported device (vrs={0})")]
    UnsupportedDevice(u8),

    /// A patch program ended in the middle of a record.
    #[error("patch incomplete ({consumed}/{total} words)")]
    PatchIncomplete { consumed: usize, total: usize },

    /// The device is already open.
    #[error("device {0} already open")]
    AlreadyOpen(usize),

    /// The operation needs an open device.
    #[error("device {0} not open")]
    NotOpen(usize),

    /// The slot index is out of range or has no device attached.
    #[error("device {0} not valid")]
    InvalidDevice(usize),

    /// A device is already attached to the slot.
    #[error("slot {0} already attached")]
    SlotOccupied(usize),

    /// The configuration was rejected by [`DriverConfig::validate`](crate::DriverConfig::validate).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// The worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(std::io::ErrorKind),
}

impl Error {
    /// `true` for errors caused by the chip or its wiring rather than by the caller.
    pub fn is_hardware(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Gpio(_) | Error::Timeout { .. }
        )
    }
}
