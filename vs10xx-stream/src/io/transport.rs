//! Control/data channel transport.
//!
//! The chip sits on two SPI chip selects: the control channel carries the
//! two-phase register protocol (command bytes out, result bytes in) and the
//! data channel carries the compressed bitstream with no response. The
//! transport also owns the reset line.
//!
//! Neither channel pipelines: every call here completes before it returns.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, OutputPin};
use embedded_hal::spi::{Error as _, Operation, SpiDevice};
use tracing::error;

use crate::constants::{RESET_PULSE_US, RESET_SETTLE_US};
use crate::error::Error;

/// Reset line stand-in for boards without a controllable reset pin.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoReset;

impl digital::ErrorType for NoReset {
    type Error = core::convert::Infallible;
}

impl OutputPin for NoReset {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Raw access to one chip: control channel, data channel and reset line.
pub struct Transport<CTRL, DATA, RST, DELAY> {
    ctrl: CTRL,
    data: DATA,
    reset: RST,
    delay: DELAY,
    hardware_reset: bool,
}

impl<CTRL, DATA, RST, DELAY> Transport<CTRL, DATA, RST, DELAY>
where
    CTRL: SpiDevice,
    DATA: SpiDevice,
    RST: OutputPin,
    DELAY: DelayNs,
{
    /// Take ownership of the bus handles.
    ///
    /// With `hardware_reset` set the chip is held in reset until the first
    /// [`pulse_reset`](Self::pulse_reset); otherwise the line is driven high
    /// and never touched again.
    pub fn new(
        ctrl: CTRL,
        data: DATA,
        mut reset: RST,
        delay: DELAY,
        hardware_reset: bool,
    ) -> Result<Self, Error> {
        let level = if hardware_reset {
            reset.set_low()
        } else {
            reset.set_high()
        };
        level.map_err(|e| Error::Gpio(digital::Error::kind(&e)))?;

        Ok(Self {
            ctrl,
            data,
            reset,
            delay,
            hardware_reset,
        })
    }

    /// Write `tx` on the control channel and, when `rx` is non-empty, read
    /// `rx.len()` bytes in the same chip-select assertion.
    pub fn control_exchange(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), Error> {
        let result = if rx.is_empty() {
            self.ctrl.write(tx)
        } else {
            self.ctrl
                .transaction(&mut [Operation::Write(tx), Operation::Read(rx)])
        };
        result.map_err(|e| {
            error!(kind = ?e.kind(), "control transfer failed");
            Error::Transport(e.kind())
        })
    }

    /// Write one block on the data channel.
    pub fn data_write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.data.write(bytes).map_err(|e| {
            error!(kind = ?e.kind(), len = bytes.len(), "data transfer failed");
            Error::Transport(e.kind())
        })
    }

    /// Whether [`pulse_reset`](Self::pulse_reset) drives the line.
    pub fn hardware_reset_enabled(&self) -> bool {
        self.hardware_reset
    }

    /// Pull the reset line low for 50 µs, release it, and wait 1.8 ms.
    /// A no-op unless hardware reset is enabled.
    pub fn pulse_reset(&mut self) -> Result<(), Error> {
        if !self.hardware_reset {
            return Ok(());
        }
        self.reset
            .set_low()
            .map_err(|e| Error::Gpio(digital::Error::kind(&e)))?;
        self.delay.delay_us(RESET_PULSE_US);
        self.reset
            .set_high()
            .map_err(|e| Error::Gpio(digital::Error::kind(&e)))?;
        self.delay.delay_us(RESET_SETTLE_US);
        Ok(())
    }

    /// Park the chip in reset. Used at teardown.
    pub fn hold_reset(&mut self) -> Result<(), Error> {
        if !self.hardware_reset {
            return Ok(());
        }
        self.reset
            .set_low()
            .map_err(|e| Error::Gpio(digital::Error::kind(&e)))
    }

    /// Sleep for `ms` milliseconds on the transport's delay provider.
    pub fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}
