//! VS10xx decoder chip register codec.
//!
//! [`Vs10xx`] turns the raw control channel into 16-bit register reads and
//! writes; the value types in this module encode and decode the registers
//! the driver exposes.

pub(crate) mod registers;
mod types;
mod vs10xx;

pub use types::{ChipVersion, ClockF, ScRegister, StreamFormat, Tone, Volume};
pub use vs10xx::Vs10xx;
