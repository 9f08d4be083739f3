//! VS1053/VS1063 register access over a [`Transport`].
//!
//! Every register access is a blocking exchange followed by a 10 ms wait for
//! the ready line: the chip drops the line while it executes the command and
//! no further command may be issued until it comes back.

use std::sync::Arc;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;
use tracing::{debug, trace, warn};

use super::registers as reg;
use crate::constants::{REGISTER_TIMEOUT, RESET_TIMEOUT};
use crate::control::RegisterControl;
use crate::error::Error;
use crate::io::{ReadyLine, Transport};

/// One decoder chip: its bus handles plus a shared view of its ready line.
pub struct Vs10xx<CTRL, DATA, RST, DREQ, DELAY> {
    id: usize,
    transport: Transport<CTRL, DATA, RST, DELAY>,
    ready: Arc<ReadyLine<DREQ>>,
}

impl<CTRL, DATA, RST, DREQ, DELAY> Vs10xx<CTRL, DATA, RST, DREQ, DELAY>
where
    CTRL: SpiDevice,
    DATA: SpiDevice,
    RST: OutputPin,
    DREQ: InputPin,
    DELAY: DelayNs,
{
    pub fn new(
        id: usize,
        transport: Transport<CTRL, DATA, RST, DELAY>,
        ready: Arc<ReadyLine<DREQ>>,
    ) -> Self {
        Self {
            id,
            transport,
            ready,
        }
    }

    pub fn ready_line(&self) -> &Arc<ReadyLine<DREQ>> {
        &self.ready
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_ready()
    }

    pub fn wait_ready(&self, timeout: Duration) -> bool {
        self.ready.wait_ready(timeout)
    }

    /// Pulse the reset line and give the chip up to 50 ms to come back.
    ///
    /// A missing ready line afterwards is only logged; the soft reset that
    /// follows reports the real failure.
    pub fn hardware_reset(&mut self) -> Result<(), Error> {
        if !self.transport.hardware_reset_enabled() {
            return Ok(());
        }
        self.transport.pulse_reset()?;
        if !self.ready.wait_ready(RESET_TIMEOUT) {
            warn!(id = self.id, "chip not ready after hardware reset");
        }
        Ok(())
    }

    /// Park the chip in reset.
    pub fn hold_reset(&mut self) -> Result<(), Error> {
        self.transport.hold_reset()
    }

    /// Send raw bytes on the data channel.
    pub fn data_write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.transport.data_write(bytes)
    }

    /// Look up the byte the chip wants as end-of-stream padding.
    pub fn end_fill_byte(&mut self) -> Result<u8, Error> {
        self.write_register_u16(reg::SCI_WRAMADDR, reg::PAR_END_FILL_BYTE)?;
        let (_, lsb) = self.read_register(reg::SCI_WRAM)?;
        debug!(id = self.id, end_fill = lsb, "end fill byte");
        Ok(lsb)
    }

    /// Sleep on the transport's delay provider.
    pub fn delay_ms(&mut self, ms: u32) {
        self.transport.delay_ms(ms);
    }

    fn settle(&self, reg: u8) -> Result<(), Error> {
        if self.ready.wait_ready(REGISTER_TIMEOUT) {
            return Ok(());
        }
        warn!(id = self.id, reg, "ready line timeout after register access");
        Err(Error::Timeout {
            reg,
            timeout_ms: REGISTER_TIMEOUT.as_millis() as u32,
        })
    }
}

impl<CTRL, DATA, RST, DREQ, DELAY> RegisterControl for Vs10xx<CTRL, DATA, RST, DREQ, DELAY>
where
    CTRL: SpiDevice,
    DATA: SpiDevice,
    RST: OutputPin,
    DREQ: InputPin,
    DELAY: DelayNs,
{
    fn read_register(&mut self, reg: u8) -> Result<(u8, u8), Error> {
        let reg = reg & 0x0F;
        let mut rx = [0u8; 2];
        self.transport
            .control_exchange(&[reg::OP_READ, reg], &mut rx)?;
        trace!(id = self.id, reg, msb = rx[0], lsb = rx[1], "sci read");
        self.settle(reg)?;
        Ok((rx[0], rx[1]))
    }

    fn write_register(&mut self, reg: u8, msb: u8, lsb: u8) -> Result<(), Error> {
        let reg = reg & 0x0F;
        self.transport
            .control_exchange(&[reg::OP_WRITE, reg, msb, lsb], &mut [])?;
        trace!(id = self.id, reg, msb, lsb, "sci write");
        self.settle(reg)
    }
}
