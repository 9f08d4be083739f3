use tracing::debug;

use crate::codec::registers as reg;
use crate::codec::{ChipVersion, ClockF, StreamFormat, Tone, Volume};
use crate::error::Error;

/// Register-level access to a decoder chip.
///
/// Implementors provide the two raw SCI primitives; the typed accessors are
/// derived from them. Both the worker-side codec and test doubles implement
/// this, so the patch loader and the device layer never depend on a concrete
/// bus.
pub trait RegisterControl {
    /// Read one 16-bit register as `(msb, lsb)`.
    fn read_register(&mut self, reg: u8) -> Result<(u8, u8), Error>;

    /// Write one 16-bit register.
    fn write_register(&mut self, reg: u8, msb: u8, lsb: u8) -> Result<(), Error>;

    fn write_register_u16(&mut self, reg: u8, value: u16) -> Result<(), Error> {
        let [msb, lsb] = value.to_be_bytes();
        self.write_register(reg, msb, lsb)
    }

    fn clock(&mut self) -> Result<ClockF, Error> {
        let (msb, lsb) = self.read_register(reg::SCI_CLOCKF)?;
        Ok(ClockF::from_wire(msb, lsb))
    }

    fn set_clock(&mut self, clock: ClockF) -> Result<(), Error> {
        let (msb, lsb) = clock.to_wire();
        self.write_register(reg::SCI_CLOCKF, msb, lsb)
    }

    fn volume(&mut self) -> Result<Volume, Error> {
        let (msb, lsb) = self.read_register(reg::SCI_VOL)?;
        Ok(Volume::from_wire(msb, lsb))
    }

    fn set_volume(&mut self, volume: Volume) -> Result<(), Error> {
        let (msb, lsb) = volume.to_wire();
        self.write_register(reg::SCI_VOL, msb, lsb)
    }

    fn tone(&mut self) -> Result<Tone, Error> {
        let (msb, lsb) = self.read_register(reg::SCI_BASS)?;
        Ok(Tone::from_wire(msb, lsb))
    }

    fn set_tone(&mut self, tone: Tone) -> Result<(), Error> {
        let (msb, lsb) = tone.to_wire();
        self.write_register(reg::SCI_BASS, msb, lsb)
    }

    /// Probe the format of the stream being decoded.
    fn stream_format(&mut self) -> Result<StreamFormat, Error> {
        let (msb, lsb) = self.read_register(reg::SCI_HDAT1)?;
        Ok(StreamFormat::from_hdat1(msb, lsb))
    }

    /// Soft reset in native SPI mode, optionally with SDI tests allowed, then
    /// program `clock` if given. Does not wait for the chip to come back.
    fn soft_reset(&mut self, test_mode: bool, clock: Option<u16>) -> Result<(), Error> {
        let mut mode = reg::SM_SDINEW | reg::SM_RESET;
        if test_mode {
            mode |= reg::SM_TESTS;
        }
        debug!("soft reset (mode={mode:#06x})");
        self.write_register_u16(reg::SCI_MODE, mode)?;
        if let Some(clock) = clock {
            self.write_register_u16(reg::SCI_CLOCKF, clock)?;
        }
        Ok(())
    }

    /// Read the chip family from `SCI_STATUS`.
    fn chip_version(&mut self) -> Result<ChipVersion, Error> {
        let (_, lsb) = self.read_register(reg::SCI_STATUS)?;
        ChipVersion::from_status(lsb)
    }
}
