//! Bus access for the decoder chip.
//!
//! | Type | Role |
//! |------|------|
//! | [`Transport`] | Control channel exchanges, data channel writes, reset line |
//! | [`ReadyLine`] | Ready line level and waits (edge-driven or polled) |
//! | [`NoReset`] | Reset pin stand-in for boards without one |

mod ready;
mod transport;

pub use ready::ReadyLine;
pub use transport::{NoReset, Transport};
