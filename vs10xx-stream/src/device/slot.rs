//! Per-device state and the worker's drain step.
//!
//! A [`Slot`] is shared between the worker thread and callers. All of its
//! mutable state, the buffer queue and the chip itself sit behind one mutex,
//! so register transactions and data transfers never interleave on the
//! wire. The ready line and the resume signal live outside that lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;
use tracing::{debug, error, info, trace, warn};

use super::drain;
use super::status::{PlayState, Status};
use crate::block::BufferQueue;
use crate::codec::registers as reg;
use crate::codec::{ChipVersion, ClockF, ScRegister, StreamFormat, Tone, Volume, Vs10xx};
use crate::config::DriverConfig;
use crate::constants::{
    MAX_TRANSFER_FAILURES, MEM_TEST_SETTLE_MS, PAUSE_WAIT, QUEUE_FULL_BACKOFF, TRANSFER_TIMEOUT,
};
use crate::control::RegisterControl;
use crate::error::Error;
use crate::io::ReadyLine;
use crate::patch::PatchSet;
use crate::sync::{lock, wait_while};

pub(crate) struct SlotState<CTRL, DATA, RST, DREQ, DELAY> {
    pub(crate) open: bool,
    /// Worker allowed to transmit. Cleared means paused.
    pub(crate) playing: bool,
    pub(crate) finishing: bool,
    pub(crate) underruns: u64,
    pub(crate) version: Option<ChipVersion>,
    /// Transfer failure parked by the worker, reported by the next write.
    pub(crate) fault: Option<Error>,
    failures: u32,
    pub(crate) queue: BufferQueue,
    codec: Vs10xx<CTRL, DATA, RST, DREQ, DELAY>,
}

pub(crate) struct Slot<CTRL, DATA, RST, DREQ, DELAY> {
    id: usize,
    state: Mutex<SlotState<CTRL, DATA, RST, DREQ, DELAY>>,
    resume: Condvar,
    ready: Arc<ReadyLine<DREQ>>,
    stop: AtomicBool,
    config: DriverConfig,
    patches: PatchSet,
}

impl<CTRL, DATA, RST, DREQ, DELAY> Slot<CTRL, DATA, RST, DREQ, DELAY>
where
    CTRL: SpiDevice,
    DATA: SpiDevice,
    RST: OutputPin,
    DREQ: InputPin,
    DELAY: DelayNs,
{
    pub(crate) fn new(
        id: usize,
        codec: Vs10xx<CTRL, DATA, RST, DREQ, DELAY>,
        config: DriverConfig,
        patches: PatchSet,
    ) -> Self {
        Self {
            id,
            ready: Arc::clone(codec.ready_line()),
            state: Mutex::new(SlotState {
                open: false,
                playing: false,
                finishing: false,
                underruns: 0,
                version: None,
                fault: None,
                failures: 0,
                queue: BufferQueue::new(config.queue_len),
                codec,
            }),
            resume: Condvar::new(),
            stop: AtomicBool::new(false),
            config,
            patches,
        }
    }

    pub(crate) fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn ready_line(&self) -> &Arc<ReadyLine<DREQ>> {
        &self.ready
    }

    #[cfg(test)]
    pub(crate) fn state(
        &self,
    ) -> std::sync::MutexGuard<'_, SlotState<CTRL, DATA, RST, DREQ, DELAY>> {
        lock(&self.state)
    }

    fn set_playing(&self, state: &mut SlotState<CTRL, DATA, RST, DREQ, DELAY>) {
        if !state.playing {
            trace!(id = self.id, "resume");
            state.playing = true;
            self.resume.notify_all();
        }
    }

    // ── Worker ─────────────────────────────────────────────────────────

    /// Ask the worker to exit after its current iteration.
    pub(crate) fn request_stop(&self) {
        let _state = lock(&self.state);
        self.stop.store(true, Ordering::Release);
        self.resume.notify_all();
    }

    pub(crate) fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// One worker iteration.
    pub(crate) fn service(&self) {
        let mut state = lock(&self.state);

        if !state.playing {
            let _state = wait_while(&self.resume, state, PAUSE_WAIT, |s| {
                !s.playing && !self.stop.load(Ordering::Acquire)
            });
            return;
        }

        if state.queue.is_empty() {
            state.playing = false;
            if state.open && !state.finishing {
                state.underruns += 1;
                trace!(id = self.id, underruns = state.underruns, "underrun");
            }
            return;
        }

        drop(state);
        if !self.ready.wait_ready(TRANSFER_TIMEOUT) {
            trace!(id = self.id, "not ready");
            return;
        }

        let mut state = lock(&self.state);
        self.transmit(&mut state);
    }

    /// Send pending buffers while the chip keeps its ready line up.
    fn transmit(&self, state: &mut SlotState<CTRL, DATA, RST, DREQ, DELAY>) {
        let SlotState {
            playing,
            failures,
            fault,
            queue,
            codec,
            ..
        } = state;

        while *playing && self.ready.is_ready() {
            let Some(head) = queue.head() else {
                break;
            };
            match codec.data_write(head.as_slice()) {
                Ok(()) => {
                    queue.retire();
                    *failures = 0;
                }
                Err(e) => {
                    *failures += 1;
                    if *failures >= MAX_TRANSFER_FAILURES {
                        error!(
                            id = self.id,
                            failures = *failures,
                            "data transfer keeps failing, pausing"
                        );
                        *failures = 0;
                        *playing = false;
                        *fault = Some(e);
                    }
                    break;
                }
            }
        }
        if queue.is_empty() {
            self.resume.notify_all();
        }
    }

    // ── Stream ─────────────────────────────────────────────────────────

    pub(crate) fn open(&self) -> Result<(), Error> {
        let mut state = lock(&self.state);
        if state.open {
            return Err(Error::AlreadyOpen(self.id));
        }
        state.open = true;
        state.fault = None;
        debug!(id = self.id, "open");
        Ok(())
    }

    pub(crate) fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    /// Queue `data`, blocking while the queue is full. Returns the number of
    /// bytes accepted, which is all of them unless an error is returned.
    ///
    /// A transfer fault parked by the worker ends the call with that error,
    /// also while blocked; bytes already queued stay queued.
    pub(crate) fn write(&self, data: &[u8]) -> Result<usize, Error> {
        {
            let mut state = lock(&self.state);
            if !state.open {
                return Err(Error::NotOpen(self.id));
            }
            if let Some(fault) = state.fault.take() {
                return Err(fault);
            }
        }

        let mut written = 0;
        while written < data.len() {
            let mut state = lock(&self.state);
            // parked by the worker while we were blocked
            if let Some(fault) = state.fault.take() {
                debug!(id = self.id, written, "write aborted by transfer fault");
                return Err(fault);
            }
            let Some(buffer) = state.queue.acquire() else {
                // full: make sure someone is draining, then back off
                self.set_playing(&mut state);
                drop(state);
                thread::sleep(QUEUE_FULL_BACKOFF);
                continue;
            };
            written += buffer.fill(&data[written..]);
            state.queue.commit();
            if state.queue.is_full() {
                self.set_playing(&mut state);
            }
        }
        trace!(id = self.id, written, "write");
        Ok(written)
    }

    pub(crate) fn free_count(&self) -> usize {
        lock(&self.state).queue.free_count()
    }

    /// Close the stream: let the queue play out for the configured close
    /// wait, discard the rest, and run the end-of-stream protocol.
    pub(crate) fn release(&self) -> Result<(), Error> {
        let mut state = lock(&self.state);
        if !state.open {
            return Err(Error::NotOpen(self.id));
        }

        if !state.queue.is_empty() {
            state.finishing = true;
            self.set_playing(&mut state);
        }
        let mut state = wait_while(&self.resume, state, self.config.close_wait(), |s| {
            !s.queue.is_empty()
        });
        if !state.queue.is_empty() {
            debug!(
                id = self.id,
                pending = state.queue.pending_count(),
                "queue not empty, closing anyway"
            );
        }
        state.queue.flush();
        state.playing = false;

        let result = drain::end_of_stream(self.id, &mut state.codec, self.config.clock_override);
        if let Err(e) = &result {
            warn!(id = self.id, error = %e, "end of stream incomplete");
        }

        state.finishing = false;
        state.open = false;
        self.resume.notify_all();
        debug!(id = self.id, "released");
        result
    }

    // ── Reset and self tests ───────────────────────────────────────────

    /// Flush, then hardware and soft reset. A hardware failure in either
    /// step repeats both once.
    fn restart(
        &self,
        state: &mut SlotState<CTRL, DATA, RST, DREQ, DELAY>,
        test_mode: bool,
    ) -> Result<(), Error> {
        state.queue.flush();
        state.playing = false;

        let clock = self.config.clock_override;
        match reset_cycle(&mut state.codec, test_mode, clock) {
            Err(e) if e.is_hardware() => {
                warn!(id = self.id, error = %e, "reset failed, retrying");
                reset_cycle(&mut state.codec, test_mode, clock)
            }
            result => result,
        }
    }

    /// Reset the chip, identify it and load its patch.
    pub(crate) fn reset(&self) -> Result<ChipVersion, Error> {
        let mut state = lock(&self.state);
        debug!(id = self.id, "reset");
        state.version = None;
        self.restart(&mut state, false)?;

        let version = match state.codec.chip_version() {
            Ok(version) => version,
            Err(e) => {
                error!(id = self.id, error = %e, "chip identification failed");
                return Err(e);
            }
        };
        state.version = Some(version);
        info!(id = self.id, "found {version} device");

        if self.config.load_patch {
            self.patches.for_chip(version).apply(&mut state.codec)?;
        }
        state.codec.data_write(&[0, 0])?;
        Ok(version)
    }

    /// Reset into test mode and start the built-in sine generator.
    pub(crate) fn sine_test(&self) -> Result<(), Error> {
        info!(id = self.id, "started sine test");
        let mut state = lock(&self.state);
        self.restart(&mut state, true)?;
        // raw attenuation, about 75 % output
        state.codec.write_register(reg::SCI_VOL, 64, 64)?;
        state.codec.data_write(&reg::SINE_TEST)
    }

    /// Reset into test mode and run the memory self test.
    pub(crate) fn mem_test(&self) -> Result<u16, Error> {
        info!(id = self.id, "started mem test");
        let mut state = lock(&self.state);
        self.restart(&mut state, true)?;
        state.codec.data_write(&reg::MEMORY_TEST)?;
        state.codec.delay_ms(MEM_TEST_SETTLE_MS);
        let (msb, lsb) = state.codec.read_register(reg::SCI_HDAT0)?;
        let result = u16::from_be_bytes([msb & reg::MEMORY_TEST_MSB_MASK, lsb]);
        info!(id = self.id, "mem test complete - result: {result:04X}");
        Ok(result)
    }

    // ── Registers ──────────────────────────────────────────────────────

    fn with_codec<T>(
        &self,
        f: impl FnOnce(&mut Vs10xx<CTRL, DATA, RST, DREQ, DELAY>) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut state = lock(&self.state);
        f(&mut state.codec)
    }

    pub(crate) fn register(&self, reg: u8) -> Result<ScRegister, Error> {
        let reg = reg & 0x0F;
        let (msb, lsb) = self.with_codec(|codec| codec.read_register(reg))?;
        Ok(ScRegister::new(reg, msb, lsb))
    }

    pub(crate) fn set_register(&self, value: ScRegister) -> Result<(), Error> {
        self.with_codec(|codec| codec.write_register(value.reg & 0x0F, value.msb, value.lsb))
    }

    pub(crate) fn clock(&self) -> Result<ClockF, Error> {
        self.with_codec(|codec| codec.clock())
    }

    pub(crate) fn set_clock(&self, clock: ClockF) -> Result<(), Error> {
        self.with_codec(|codec| codec.set_clock(clock))
    }

    pub(crate) fn volume(&self) -> Result<Volume, Error> {
        self.with_codec(|codec| codec.volume())
    }

    pub(crate) fn set_volume(&self, volume: Volume) -> Result<(), Error> {
        self.with_codec(|codec| codec.set_volume(volume))
    }

    pub(crate) fn tone(&self) -> Result<Tone, Error> {
        self.with_codec(|codec| codec.tone())
    }

    pub(crate) fn set_tone(&self, tone: Tone) -> Result<(), Error> {
        self.with_codec(|codec| codec.set_tone(tone))
    }

    pub(crate) fn stream_format(&self) -> Result<StreamFormat, Error> {
        self.with_codec(|codec| codec.stream_format())
    }

    // ── Diagnostics ────────────────────────────────────────────────────

    pub(crate) fn status(&self) -> Status {
        let mut state = lock(&self.state);
        let format = state.codec.stream_format().unwrap_or_else(|e| {
            debug!(id = self.id, error = %e, "format probe failed");
            StreamFormat::None
        });
        let play = match (state.playing, state.finishing) {
            (false, _) => PlayState::Stopped,
            (true, false) => PlayState::Playing,
            (true, true) => PlayState::Finishing,
        };
        Status {
            version: state.version,
            play,
            format,
            ready: self.ready.is_ready(),
            underruns: state.underruns,
        }
    }

    pub(crate) fn underruns(&self) -> u64 {
        lock(&self.state).underruns
    }

    /// Park the chip in reset. Used once the worker has exited.
    pub(crate) fn hold_reset(&self) -> Result<(), Error> {
        lock(&self.state).codec.hold_reset()
    }
}

fn reset_cycle<CTRL, DATA, RST, DREQ, DELAY>(
    codec: &mut Vs10xx<CTRL, DATA, RST, DREQ, DELAY>,
    test_mode: bool,
    clock: Option<u16>,
) -> Result<(), Error>
where
    CTRL: SpiDevice,
    DATA: SpiDevice,
    RST: OutputPin,
    DREQ: InputPin,
    DELAY: DelayNs,
{
    codec.hardware_reset()?;
    codec.soft_reset(test_mode, clock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReadinessMode;
    use crate::io::{NoReset, Transport};
    use crate::sim::{SimChip, SimCtrl, SimData, SimPin};
    use embedded_hal::digital;
    use embedded_hal_mock::eh1::delay::NoopDelay;

    type TestSlot = Slot<SimCtrl, SimData, NoReset, SimPin, NoopDelay>;

    fn slot(chip: &SimChip, pin: &SimPin, queue_len: usize) -> TestSlot {
        let config = DriverConfig::default()
            .with_queue_len(queue_len)
            .with_readiness(ReadinessMode::Polled);
        let transport =
            Transport::new(chip.ctrl(), chip.data(), NoReset, NoopDelay::new(), false).unwrap();
        let ready = Arc::new(ReadyLine::new(pin.clone(), ReadinessMode::Polled, false));
        Slot::new(0, Vs10xx::new(0, transport, ready), config, PatchSet::EMPTY)
    }

    #[test]
    fn empty_queue_pauses_and_counts_one_underrun() {
        let chip = SimChip::new(4);
        let pin = SimPin::new(true);
        let slot = slot(&chip, &pin, 4);
        slot.open().unwrap();
        slot.state().playing = true;

        slot.service();
        assert!(!slot.state().playing);
        assert_eq!(slot.underruns(), 1);

        // paused iterations do not count again
        slot.service();
        assert_eq!(slot.underruns(), 1);
    }

    #[test]
    fn finishing_drain_is_not_an_underrun() {
        let chip = SimChip::new(4);
        let slot = slot(&chip, &SimPin::new(true), 4);
        slot.open().unwrap();
        {
            let mut state = slot.state();
            state.playing = true;
            state.finishing = true;
        }
        slot.service();
        assert!(!slot.state().playing);
        assert_eq!(slot.underruns(), 0);
    }

    #[test]
    fn filling_the_queue_resumes_a_paused_worker() {
        let chip = SimChip::new(4);
        let slot = slot(&chip, &SimPin::new(true), 2);
        slot.open().unwrap();

        slot.write(&[1; 32]).unwrap();
        assert!(!slot.state().playing);
        slot.write(&[2; 32]).unwrap();
        assert!(slot.state().playing);
    }

    #[test]
    fn write_splits_into_buffers() {
        let chip = SimChip::new(4);
        let slot = slot(&chip, &SimPin::new(true), 8);
        slot.open().unwrap();
        assert_eq!(slot.write(&[7; 70]).unwrap(), 70);
        assert_eq!(slot.free_count(), 5);
        assert_eq!(slot.state().queue.head().unwrap().len(), 32);
    }

    #[test]
    fn service_transmits_in_order_while_ready() {
        let chip = SimChip::new(4);
        let slot = slot(&chip, &SimPin::new(true), 3);
        slot.open().unwrap();
        slot.write(&[1; 32]).unwrap();
        slot.write(&[2; 32]).unwrap();
        slot.write(&[3; 16]).unwrap();
        assert!(slot.state().playing);

        slot.service();
        let sent = chip.data_writes();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0], vec![1; 32]);
        assert_eq!(sent[1], vec![2; 32]);
        assert_eq!(sent[2], vec![3; 16]);
        assert_eq!(slot.free_count(), 3);
    }

    #[test]
    fn not_ready_chip_gets_nothing() {
        let chip = SimChip::new(4);
        let pin = SimPin::new(false);
        let slot = slot(&chip, &pin, 1);
        slot.open().unwrap();
        slot.write(&[1; 4]).unwrap();

        slot.service();
        assert!(chip.data_writes().is_empty());
        assert_eq!(slot.free_count(), 0);

        pin.set(true);
        slot.service();
        assert_eq!(chip.data_writes(), vec![vec![1; 4]]);
    }

    #[test]
    fn failed_transfer_keeps_the_head() {
        let chip = SimChip::new(4);
        let slot = slot(&chip, &SimPin::new(true), 1);
        slot.open().unwrap();
        slot.write(&[9; 8]).unwrap();
        chip.fail_data_writes(1);

        slot.service();
        assert_eq!(slot.free_count(), 0);
        assert!(slot.state().playing);

        slot.service();
        assert_eq!(chip.data_writes(), vec![vec![9; 8]]);
        assert_eq!(slot.free_count(), 1);
    }

    #[test]
    fn persistent_failure_pauses_and_surfaces_on_write() {
        let chip = SimChip::new(4);
        let slot = slot(&chip, &SimPin::new(true), 1);
        slot.open().unwrap();
        slot.write(&[9; 8]).unwrap();
        chip.fail_data_writes(usize::MAX);

        for _ in 0..MAX_TRANSFER_FAILURES {
            slot.service();
        }
        assert!(!slot.state().playing);
        // nothing dropped
        assert_eq!(slot.state().queue.pending_count(), 1);

        assert!(matches!(slot.write(&[1]), Err(Error::Transport(_))));
        // reported once
        chip.fail_data_writes(0);
        slot.service(); // paused, idles
        assert!(slot.state().fault.is_none());
    }

    #[test]
    fn blocked_writer_receives_parked_fault() {
        let chip = SimChip::new(4);
        let slot = Arc::new(slot(&chip, &SimPin::new(true), 1));
        slot.open().unwrap();
        slot.write(&[9; 8]).unwrap();
        chip.fail_data_writes(usize::MAX);

        // blocks on the full queue
        let writer = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || slot.write(&[1; 64]))
        };
        for _ in 0..500 {
            if writer.is_finished() {
                break;
            }
            slot.service();
        }
        assert!(writer.is_finished());
        assert!(matches!(writer.join().unwrap(), Err(Error::Transport(_))));

        // worker stays parked, head kept
        assert!(!slot.state().playing);
        assert!(slot.state().fault.is_none());
        assert_eq!(slot.state().queue.pending_count(), 1);
        assert!(chip.data_writes().is_empty());
    }

    #[test]
    fn failed_soft_reset_is_retried() {
        let chip = SimChip::new(4);
        let slot = slot(&chip, &SimPin::new(true), 1);
        // first mode write of the reset fails
        chip.fail_control_exchanges(1);

        assert_eq!(slot.reset().unwrap(), ChipVersion::Vs1053);
        assert_eq!(
            chip.sci_writes(),
            vec![(reg::SCI_MODE, 0x0804), (reg::SCI_CLOCKF, 0xC000)]
        );
    }

    #[test]
    fn reset_gives_up_after_one_retry() {
        let chip = SimChip::new(4);
        let slot = slot(&chip, &SimPin::new(true), 1);
        chip.fail_control_exchanges(2);

        assert!(matches!(slot.reset(), Err(Error::Transport(_))));
        assert!(chip.sci_writes().is_empty());
        assert_eq!(slot.status().version, None);
    }

    /// Reset line whose `fail_at`-th low transition fails.
    struct FlakyReset {
        lows: usize,
        fail_at: usize,
    }

    impl digital::ErrorType for FlakyReset {
        type Error = digital::ErrorKind;
    }

    impl OutputPin for FlakyReset {
        fn set_low(&mut self) -> Result<(), digital::ErrorKind> {
            self.lows += 1;
            if self.lows == self.fail_at {
                Err(digital::ErrorKind::Other)
            } else {
                Ok(())
            }
        }

        fn set_high(&mut self) -> Result<(), digital::ErrorKind> {
            Ok(())
        }
    }

    #[test]
    fn failed_reset_pulse_is_retried() {
        let chip = SimChip::new(4);
        // low #1 holds the line at construction, low #2 starts the first pulse
        let reset = FlakyReset { lows: 0, fail_at: 2 };
        let transport =
            Transport::new(chip.ctrl(), chip.data(), reset, NoopDelay::new(), true).unwrap();
        let ready = Arc::new(ReadyLine::new(SimPin::new(true), ReadinessMode::Polled, false));
        let config = DriverConfig::default().with_readiness(ReadinessMode::Polled);
        let slot = Slot::new(0, Vs10xx::new(0, transport, ready), config, PatchSet::EMPTY);

        assert_eq!(slot.reset().unwrap(), ChipVersion::Vs1053);
        assert_eq!(
            chip.sci_writes(),
            vec![(reg::SCI_MODE, 0x0804), (reg::SCI_CLOCKF, 0xC000)]
        );
    }

    #[test]
    fn open_twice_is_rejected() {
        let chip = SimChip::new(4);
        let slot = slot(&chip, &SimPin::new(true), 1);
        slot.open().unwrap();
        assert_eq!(slot.open(), Err(Error::AlreadyOpen(0)));
    }

    #[test]
    fn closed_slot_rejects_stream_operations() {
        let chip = SimChip::new(4);
        let slot = slot(&chip, &SimPin::new(true), 1);
        assert_eq!(slot.write(&[1]), Err(Error::NotOpen(0)));
        assert_eq!(slot.release(), Err(Error::NotOpen(0)));
    }

    #[test]
    fn status_reflects_state() {
        let chip = SimChip::new(6);
        chip.set_reg(reg::SCI_HDAT1, 0x4F67);
        let slot = slot(&chip, &SimPin::new(true), 1);
        assert_eq!(slot.reset().unwrap(), ChipVersion::Vs1063);
        slot.open().unwrap();
        slot.state().playing = true;

        let status = slot.status();
        assert_eq!(status.version, Some(ChipVersion::Vs1063));
        assert_eq!(status.play, PlayState::Playing);
        assert_eq!(status.format, StreamFormat::Ogg);
        assert!(status.ready);
        assert_eq!(
            status.to_string(),
            "xversion: 6\nplaystat: P\nstrmtype: 5\ndreq/rdy: 1\nunderrun: 0\n"
        );
    }
}
