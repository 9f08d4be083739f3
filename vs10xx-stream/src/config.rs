//! Driver configuration.
//!
//! One [`DriverConfig`] is shared by every slot of a [`Driver`](crate::Driver).
//! The defaults match a board with an edge-capable ready line and no
//! controllable reset line.

use std::time::Duration;

use crate::constants::DEFAULT_QUEUE_LEN;
use crate::error::Error;

/// How the ready line is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ReadinessMode {
    /// The platform calls [`ReadyLine::on_edge`](crate::io::ReadyLine::on_edge)
    /// on every transition; waiters sleep until the cached level goes high.
    #[default]
    EdgeDriven,
    /// The line is sampled on every query; waits poll at 1 ms.
    Polled,
}

/// Per-driver settings.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DriverConfig {
    /// Buffers per device queue.
    pub queue_len: usize,
    /// Ready line observation mode.
    pub readiness: ReadinessMode,
    /// Treat the ready line as permanently asserted.
    pub ignore_ready: bool,
    /// Drive the reset line. When off, resets are soft resets only.
    pub hardware_reset: bool,
    /// Clock register value written after every soft reset.
    pub clock_override: Option<u16>,
    /// Apply the chip family's patch program after reset.
    pub load_patch: bool,
    /// How long `release()` lets the queue drain before discarding it (ms).
    pub close_wait_ms: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            queue_len: DEFAULT_QUEUE_LEN,
            readiness: ReadinessMode::EdgeDriven,
            ignore_ready: false,
            hardware_reset: false,
            clock_override: Some(0xC000),
            load_patch: true,
            close_wait_ms: 0,
        }
    }
}

impl DriverConfig {
    pub fn with_queue_len(mut self, queue_len: usize) -> Self {
        self.queue_len = queue_len;
        self
    }

    pub fn with_readiness(mut self, readiness: ReadinessMode) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn with_ignore_ready(mut self, ignore_ready: bool) -> Self {
        self.ignore_ready = ignore_ready;
        self
    }

    pub fn with_hardware_reset(mut self, hardware_reset: bool) -> Self {
        self.hardware_reset = hardware_reset;
        self
    }

    pub fn with_clock_override(mut self, clock: Option<u16>) -> Self {
        self.clock_override = clock;
        self
    }

    pub fn with_load_patch(mut self, load_patch: bool) -> Self {
        self.load_patch = load_patch;
        self
    }

    pub fn with_close_wait_ms(mut self, close_wait_ms: u32) -> Self {
        self.close_wait_ms = close_wait_ms;
        self
    }

    /// The close wait as a [`Duration`].
    pub fn close_wait(&self) -> Duration {
        Duration::from_millis(u64::from(self.close_wait_ms))
    }

    /// Reject settings the driver cannot run with.
    pub fn validate(&self) -> Result<(), Error> {
        if self.queue_len == 0 {
            return Err(Error::InvalidConfig("queue_len must be at least 1"));
        }
        if self.clock_override == Some(0) {
            return Err(Error::InvalidConfig(
                "clock_override of 0 is not a clock setting, use None",
            ));
        }
        Ok(())
    }
}
