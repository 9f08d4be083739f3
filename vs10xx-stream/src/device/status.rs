use core::fmt;

use crate::codec::{ChipVersion, StreamFormat};

/// Worker state as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PlayState {
    /// Worker paused, nothing is sent.
    Stopped,
    /// Worker draining the queue.
    Playing,
    /// Draining the tail of a stream being released.
    Finishing,
}

impl PlayState {
    pub fn letter(self) -> char {
        match self {
            Self::Stopped => 'S',
            Self::Playing => 'P',
            Self::Finishing => 'F',
        }
    }
}

/// Diagnostic snapshot of one slot.
///
/// `Display` renders the line-oriented status report:
///
/// ```text
/// xversion: 4
/// playstat: S
/// strmtype: 6
/// dreq/rdy: 1
/// underrun: 0
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Status {
    pub version: Option<ChipVersion>,
    pub play: PlayState,
    pub format: StreamFormat,
    pub ready: bool,
    pub underruns: u64,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let version = self.version.map_or(-1, |v| i32::from(v.number()));
        writeln!(f, "xversion: {version}")?;
        writeln!(f, "playstat: {}", self.play.letter())?;
        writeln!(f, "strmtype: {}", self.format as u8)?;
        writeln!(f, "dreq/rdy: {}", u8::from(self.ready))?;
        writeln!(f, "underrun: {}", self.underruns)
    }
}
