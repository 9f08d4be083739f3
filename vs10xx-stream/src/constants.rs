use std::time::Duration;

/// Bytes per queue buffer. The chip accepts this many data bytes per
/// assertion of the ready line without re-checking it.
pub const BUFFER_BYTES: usize = 32;

/// Default number of buffers per device queue.
pub const DEFAULT_QUEUE_LEN: usize = 2048;

/// Number of device slots a driver manages.
pub const MAX_DEVICES: usize = 4;

/// Readiness wait after every register read or write.
pub const REGISTER_TIMEOUT: Duration = Duration::from_millis(10);

/// Readiness wait before each worker drain pass and each end-fill buffer.
pub const TRANSFER_TIMEOUT: Duration = Duration::from_millis(10);

/// Readiness wait after a hardware reset pulse.
pub const RESET_TIMEOUT: Duration = Duration::from_millis(50);

/// Readiness wait before the end-of-stream protocol starts.
pub const RELEASE_TIMEOUT: Duration = Duration::from_millis(250);

/// How long a paused worker sleeps on the resume signal per iteration.
pub const PAUSE_WAIT: Duration = Duration::from_millis(10);

/// Writer back-off while the queue is full.
pub const QUEUE_FULL_BACKOFF: Duration = Duration::from_millis(1);

/// Polling granularity of the polled readiness mode.
pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Consecutive failed data transfers before the worker parks the slot.
pub const MAX_TRANSFER_FAILURES: u32 = 8;

/// Reset line low time.
pub const RESET_PULSE_US: u32 = 50;

/// Settle time after the reset line is released.
pub const RESET_SETTLE_US: u32 = 1800;

/// Chip clock assumed before the clock multiplier is programmed (kHz).
pub const XTAL_KHZ: u64 = 12_288;

/// Memory self-test run time: 1 100 000 clock cycles, in ms.
pub const MEM_TEST_SETTLE_MS: u32 = (1_100_000 / XTAL_KHZ + 1) as u32;

/// End-fill buffers sent at stream end for FLAC.
pub const END_FILL_BUFFERS_FLAC: usize = 384;

/// End-fill buffers sent at stream end for every other format.
pub const END_FILL_BUFFERS: usize = 65;

/// Maximum end-fill buffers sent while waiting for the cancel bit to clear.
pub const CANCEL_BUFFERS: usize = 64;
