//! Fixed table of device slots.
//!
//! A [`Driver`] owns [`MAX_DEVICES`] slots, each empty or holding a running
//! [`Device`]. Every operation takes a slot index and fails with
//! [`Error::InvalidDevice`] when the index is out of range or the slot is
//! empty, so callers never hold a reference across a detach.

use std::sync::Arc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;
use tracing::{debug, error, info};

use crate::codec::{ChipVersion, ClockF, ScRegister, StreamFormat, Tone, Volume};
use crate::config::DriverConfig;
use crate::constants::MAX_DEVICES;
use crate::device::{Board, Device, Status};
use crate::error::Error;
use crate::io::ReadyLine;
use crate::patch::PatchSet;

pub struct Driver<CTRL, DATA, RST, DREQ, DELAY>
where
    CTRL: SpiDevice + Send + 'static,
    DATA: SpiDevice + Send + 'static,
    RST: OutputPin + Send + 'static,
    DREQ: InputPin + Send + 'static,
    DELAY: DelayNs + Send + 'static,
{
    config: DriverConfig,
    patches: PatchSet,
    slots: Vec<Option<Device<CTRL, DATA, RST, DREQ, DELAY>>>,
}

impl<CTRL, DATA, RST, DREQ, DELAY> Driver<CTRL, DATA, RST, DREQ, DELAY>
where
    CTRL: SpiDevice + Send + 'static,
    DATA: SpiDevice + Send + 'static,
    RST: OutputPin + Send + 'static,
    DREQ: InputPin + Send + 'static,
    DELAY: DelayNs + Send + 'static,
{
    /// An empty slot table. `config` and `patches` apply to every device
    /// attached later.
    pub fn new(config: DriverConfig, patches: PatchSet) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            config,
            patches,
            slots: (0..MAX_DEVICES).map(|_| None).collect(),
        })
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Bring up the chip on `board` in slot `id`. On failure the slot stays
    /// empty.
    pub fn attach(
        &mut self,
        id: usize,
        board: Board<CTRL, DATA, RST, DREQ, DELAY>,
    ) -> Result<(), Error> {
        let slot = self.slots.get_mut(id).ok_or(Error::InvalidDevice(id))?;
        if slot.is_some() {
            return Err(Error::SlotOccupied(id));
        }
        match Device::start(id, board, self.config.clone(), self.patches) {
            Ok(device) => {
                *slot = Some(device);
                info!(id, "device attached");
                Ok(())
            }
            Err(e) => {
                error!(id, error = %e, "device init failed");
                Err(e)
            }
        }
    }

    /// Stop the slot's worker and release its chip.
    pub fn detach(&mut self, id: usize) -> Result<(), Error> {
        let device = self
            .slots
            .get_mut(id)
            .and_then(Option::take)
            .ok_or(Error::InvalidDevice(id))?;
        drop(device);
        info!(id, "device detached");
        Ok(())
    }

    /// Detach every slot, highest index first.
    pub fn shutdown(&mut self) {
        for (id, slot) in self.slots.iter_mut().enumerate().rev() {
            if let Some(device) = slot.take() {
                drop(device);
                debug!(id, "device detached");
            }
        }
    }

    /// Whether slot `id` holds a device.
    pub fn is_valid(&self, id: usize) -> bool {
        matches!(self.slots.get(id), Some(Some(_)))
    }

    pub fn device(&self, id: usize) -> Result<&Device<CTRL, DATA, RST, DREQ, DELAY>, Error> {
        self.slots
            .get(id)
            .and_then(Option::as_ref)
            .ok_or(Error::InvalidDevice(id))
    }

    // ── Stream ─────────────────────────────────────────────────────────

    pub fn open(&self, id: usize) -> Result<(), Error> {
        self.device(id)?.open()
    }

    pub fn release(&self, id: usize) -> Result<(), Error> {
        self.device(id)?.release()
    }

    /// Queue bytes on slot `id`, blocking while its queue is full.
    pub fn write(&self, id: usize, data: &[u8]) -> Result<usize, Error> {
        self.device(id)?.write(data)
    }

    pub fn free_count(&self, id: usize) -> Result<usize, Error> {
        Ok(self.device(id)?.free_count())
    }

    // ── Commands ───────────────────────────────────────────────────────

    pub fn reset(&self, id: usize) -> Result<ChipVersion, Error> {
        self.device(id)?.reset()
    }

    pub fn sine_test(&self, id: usize) -> Result<(), Error> {
        self.device(id)?.sine_test()
    }

    pub fn mem_test(&self, id: usize) -> Result<u16, Error> {
        self.device(id)?.mem_test()
    }

    pub fn register(&self, id: usize, reg: u8) -> Result<ScRegister, Error> {
        self.device(id)?.register(reg)
    }

    pub fn set_register(&self, id: usize, value: ScRegister) -> Result<(), Error> {
        self.device(id)?.set_register(value)
    }

    pub fn clock(&self, id: usize) -> Result<ClockF, Error> {
        self.device(id)?.clock()
    }

    pub fn set_clock(&self, id: usize, clock: ClockF) -> Result<(), Error> {
        self.device(id)?.set_clock(clock)
    }

    pub fn volume(&self, id: usize) -> Result<Volume, Error> {
        self.device(id)?.volume()
    }

    pub fn set_volume(&self, id: usize, volume: Volume) -> Result<(), Error> {
        self.device(id)?.set_volume(volume)
    }

    pub fn tone(&self, id: usize) -> Result<Tone, Error> {
        self.device(id)?.tone()
    }

    pub fn set_tone(&self, id: usize, tone: Tone) -> Result<(), Error> {
        self.device(id)?.set_tone(tone)
    }

    pub fn stream_format(&self, id: usize) -> Result<StreamFormat, Error> {
        self.device(id)?.stream_format()
    }

    // ── Diagnostics ────────────────────────────────────────────────────

    pub fn status(&self, id: usize) -> Result<Status, Error> {
        Ok(self.device(id)?.status())
    }

    /// Line-oriented status report, see [`Status`].
    pub fn status_text(&self, id: usize) -> Result<String, Error> {
        Ok(self.device(id)?.status_text())
    }

    /// The slot's ready line, for wiring up the platform's edge handler.
    pub fn ready_line(&self, id: usize) -> Result<Arc<ReadyLine<DREQ>>, Error> {
        Ok(self.device(id)?.ready_line())
    }
}

impl<CTRL, DATA, RST, DREQ, DELAY> Drop for Driver<CTRL, DATA, RST, DREQ, DELAY>
where
    CTRL: SpiDevice + Send + 'static,
    DATA: SpiDevice + Send + 'static,
    RST: OutputPin + Send + 'static,
    DREQ: InputPin + Send + 'static,
    DELAY: DelayNs + Send + 'static,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}
