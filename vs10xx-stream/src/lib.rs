//! # vs10xx-stream
//!
//! A streaming driver for VLSI VS1053 / VS1063 audio decoder chips attached
//! over [`embedded-hal`](https://docs.rs/embedded-hal) 1.0: one SPI device for
//! the register (control) channel, one for the bitstream (data) channel, a
//! ready line (DREQ) and an optional reset line.
//!
//! Callers write compressed audio into a per-device buffer queue; a worker
//! thread per device drains it to the chip whenever the ready line allows.
//!
//! ## Architecture
//!
//! | Layer | Module | Purpose |
//! |-------|--------|---------|
//! | Transport | [`io`] | Control/data channel transfers, reset line, ready line |
//! | Codec | [`codec`] / [`control`] | SCI wire protocol, typed register views |
//! | Patch | [`patch`] | Compressed register-write programs applied after reset |
//! | Queue | [`block`] | Bounded pool of 32-byte buffers, FIFO pending list |
//! | Device | [`device`] | Per-chip state machine, worker thread, end-of-stream |
//! | Lifecycle | [`driver`] | Fixed table of device slots |
//!
//! ## Quick start
//!
//! ```ignore
//! use vs10xx_stream::{Board, Driver, DriverConfig, PatchSet};
//!
//! let mut driver = Driver::new(DriverConfig::default(), PatchSet::EMPTY)?;
//! driver.attach(0, Board { ctrl, data, reset, ready, delay })?;
//!
//! // from the platform's DREQ edge handler:
//! let line = driver.ready_line(0)?;
//! // line.on_edge();
//!
//! driver.open(0)?;
//! driver.write(0, &mp3_bytes)?;
//! driver.release(0)?;
//! ```
//!
//! ## Features
//!
//! | Feature | Default | Enables |
//! |---------|---------|---------|
//! | `serde` | no | `Serialize`/`Deserialize` on configuration and register types |
//!
//! ## Stream parameters
//!
//! - **Buffer size:** 32 bytes ([`constants::BUFFER_BYTES`])
//! - **Queue length:** 2048 buffers by default ([`constants::DEFAULT_QUEUE_LEN`])
//! - **Device slots:** 4 ([`constants::MAX_DEVICES`])

pub mod block;
pub mod codec;
pub mod config;
pub mod constants;
pub mod control;
pub mod device;
pub mod driver;
pub mod error;
pub mod io;
pub mod patch;

mod sync;

#[cfg(test)]
mod sim;

pub use block::{Buffer, BufferQueue};
pub use codec::{ChipVersion, ClockF, ScRegister, StreamFormat, Tone, Volume};
pub use config::{DriverConfig, ReadinessMode};
pub use control::RegisterControl;
pub use device::{Board, Device, PlayState, Status};
pub use driver::Driver;
pub use error::Error;
pub use patch::{Patch, PatchSet};
