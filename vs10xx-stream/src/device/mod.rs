//! One decoder chip and its streaming worker.
//!
//! A [`Device`] owns a shared slot (state, queue, chip) and the worker
//! thread that drains the queue to the chip:
//!
//! ```text
//! write() ──▶ BufferQueue ──▶ worker ──▶ data channel
//!                               ▲
//!                         ready line edge
//! ```
//!
//! Each worker iteration, in order:
//! 1. paused: wait up to 10 ms for a resume
//! 2. queue empty: pause, counting an underrun unless finishing
//! 3. chip not ready within 10 ms: try again
//! 4. otherwise transmit and retire buffers while the chip stays ready
//!
//! The worker is started once the chip has been reset and identified, and
//! stopped and joined when the device is dropped. Stopping never interrupts
//! a transfer in flight.

mod drain;
mod slot;
mod status;


pub use status::{PlayState, Status};

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;
use tracing::{debug, warn};

use self::slot::Slot;
use crate::codec::{ChipVersion, ClockF, ScRegister, StreamFormat, Tone, Volume, Vs10xx};
use crate::config::DriverConfig;
use crate::error::Error;
use crate::io::{ReadyLine, Transport};
use crate::patch::PatchSet;

/// Bus handles for one chip.
pub struct Board<CTRL, DATA, RST, DREQ, DELAY> {
    /// Control channel (SCI chip select).
    pub ctrl: CTRL,
    /// Data channel (SDI chip select).
    pub data: DATA,
    /// Reset line. Use [`NoReset`](crate::io::NoReset) when not wired.
    pub reset: RST,
    /// Ready line (DREQ).
    pub ready: DREQ,
    pub delay: DELAY,
}

/// A reset, identified chip with a running worker.
pub struct Device<CTRL, DATA, RST, DREQ, DELAY>
where
    CTRL: SpiDevice + Send + 'static,
    DATA: SpiDevice + Send + 'static,
    RST: OutputPin + Send + 'static,
    DREQ: InputPin + Send + 'static,
    DELAY: DelayNs + Send + 'static,
{
    slot: Arc<Slot<CTRL, DATA, RST, DREQ, DELAY>>,
    worker: Option<JoinHandle<()>>,
}

impl<CTRL, DATA, RST, DREQ, DELAY> Device<CTRL, DATA, RST, DREQ, DELAY>
where
    CTRL: SpiDevice + Send + 'static,
    DATA: SpiDevice + Send + 'static,
    RST: OutputPin + Send + 'static,
    DREQ: InputPin + Send + 'static,
    DELAY: DelayNs + Send + 'static,
{
    /// Bring up the chip on `board`: reset it, load its patch and start the
    /// worker thread `vs10xx-{id}`.
    pub fn start(
        id: usize,
        board: Board<CTRL, DATA, RST, DREQ, DELAY>,
        config: DriverConfig,
        patches: PatchSet,
    ) -> Result<Self, Error> {
        config.validate()?;
        debug!(id, "start");

        let ready = Arc::new(ReadyLine::new(
            board.ready,
            config.readiness,
            config.ignore_ready,
        ));
        let transport = Transport::new(
            board.ctrl,
            board.data,
            board.reset,
            board.delay,
            config.hardware_reset,
        )?;
        let slot = Arc::new(Slot::new(
            id,
            Vs10xx::new(id, transport, ready),
            config,
            patches,
        ));

        slot.reset()?;

        let worker_slot = Arc::clone(&slot);
        let worker = thread::Builder::new()
            .name(format!("vs10xx-{id}"))
            .spawn(move || run(worker_slot))
            .map_err(|e| Error::WorkerSpawn(e.kind()))?;

        Ok(Self {
            slot,
            worker: Some(worker),
        })
    }

    pub fn id(&self) -> usize {
        self.slot.id()
    }

    /// The ready line, for the platform's edge handler.
    pub fn ready_line(&self) -> Arc<ReadyLine<DREQ>> {
        Arc::clone(self.slot.ready_line())
    }

    pub fn open(&self) -> Result<(), Error> {
        self.slot.open()
    }

    pub fn is_open(&self) -> bool {
        self.slot.is_open()
    }

    /// Queue bitstream bytes. Blocks while the queue is full.
    pub fn write(&self, data: &[u8]) -> Result<usize, Error> {
        self.slot.write(data)
    }

    /// End the stream and close the device.
    pub fn release(&self) -> Result<(), Error> {
        self.slot.release()
    }

    pub fn free_count(&self) -> usize {
        self.slot.free_count()
    }

    /// Discard queued data, reset the chip and reload its patch.
    pub fn reset(&self) -> Result<ChipVersion, Error> {
        self.slot.reset()
    }

    pub fn sine_test(&self) -> Result<(), Error> {
        self.slot.sine_test()
    }

    /// Run the memory self test and return the masked result word.
    pub fn mem_test(&self) -> Result<u16, Error> {
        self.slot.mem_test()
    }

    pub fn register(&self, reg: u8) -> Result<ScRegister, Error> {
        self.slot.register(reg)
    }

    pub fn set_register(&self, value: ScRegister) -> Result<(), Error> {
        self.slot.set_register(value)
    }

    pub fn clock(&self) -> Result<ClockF, Error> {
        self.slot.clock()
    }

    pub fn set_clock(&self, clock: ClockF) -> Result<(), Error> {
        self.slot.set_clock(clock)
    }

    pub fn volume(&self) -> Result<Volume, Error> {
        self.slot.volume()
    }

    pub fn set_volume(&self, volume: Volume) -> Result<(), Error> {
        self.slot.set_volume(volume)
    }

    pub fn tone(&self) -> Result<Tone, Error> {
        self.slot.tone()
    }

    pub fn set_tone(&self, tone: Tone) -> Result<(), Error> {
        self.slot.set_tone(tone)
    }

    pub fn stream_format(&self) -> Result<StreamFormat, Error> {
        self.slot.stream_format()
    }

    pub fn status(&self) -> Status {
        self.slot.status()
    }

    pub fn status_text(&self) -> String {
        self.slot.status().to_string()
    }

    pub fn underruns(&self) -> u64 {
        self.slot.underruns()
    }

    /// Stop and join the worker, then park the chip in reset.
    fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.slot.request_stop();
        if worker.join().is_err() {
            warn!(id = self.id(), "worker panicked");
        }
        if let Err(e) = self.slot.hold_reset() {
            warn!(id = self.id(), error = %e, "could not hold chip in reset");
        }
        debug!(id = self.id(), "stopped");
    }
}

impl<CTRL, DATA, RST, DREQ, DELAY> Drop for Device<CTRL, DATA, RST, DREQ, DELAY>
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

fn run<CTRL, DATA, RST, DREQ, DELAY>(slot: Arc<Slot<CTRL, DATA, RST, DREQ, DELAY>>)
where
    CTRL: SpiDevice,
    DATA: SpiDevice,
    RST: OutputPin,
    DREQ: InputPin,
    DELAY: DelayNs,
{
    debug!(id = slot.id(), "worker running");
    while !slot.should_stop() {
        slot.service();
    }
    debug!(id = slot.id(), "worker exiting");
}
