//! Compressed patch (plugin) loader.
//!
//! A patch is a stream of 16-bit words made of records:
//!
//! | Words | Meaning |
//! |-------|---------|
//! | `addr` | SCI register to write |
//! | `len` with bit 15 set | `len & 0x7FFF` copies of the next word |
//! | `len` with bit 15 clear | the next `len` words, once each |
//!
//! Values are written msb first through [`RegisterControl::write_register`].

use tracing::{error, info};

use crate::codec::ChipVersion;
use crate::control::RegisterControl;
use crate::error::Error;

const RLE_FLAG: u16 = 0x8000;

/// A compressed register-write program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Patch<'a>(&'a [u16]);

impl<'a> Patch<'a> {
    pub const fn new(words: &'a [u16]) -> Self {
        Self(words)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replay the program against `chip`.
    ///
    /// Each record is checked for completeness before any of its writes go
    /// out. A record that runs past the end of the program fails with
    /// [`Error::PatchIncomplete`], `consumed` being the index of that
    /// record's first word. Write errors abort the load as they are.
    pub fn apply<C: RegisterControl + ?Sized>(&self, chip: &mut C) -> Result<(), Error> {
        let words = self.0;
        let total = words.len();
        let mut i = 0;

        while i < total {
            let start = i;
            let incomplete = || {
                error!(consumed = start, total, "patch incomplete");
                Error::PatchIncomplete {
                    consumed: start,
                    total,
                }
            };

            let (Some(&addr), Some(&len)) = (words.get(i), words.get(i + 1)) else {
                return Err(incomplete());
            };
            i += 2;
            let reg = addr as u8;

            if len & RLE_FLAG != 0 {
                let Some(&value) = words.get(i) else {
                    return Err(incomplete());
                };
                i += 1;
                let [msb, lsb] = value.to_be_bytes();
                for _ in 0..(len & !RLE_FLAG) {
                    chip.write_register(reg, msb, lsb)?;
                }
            } else {
                let Some(values) = words.get(i..i + usize::from(len)) else {
                    return Err(incomplete());
                };
                i += values.len();
                for value in values {
                    let [msb, lsb] = value.to_be_bytes();
                    chip.write_register(reg, msb, lsb)?;
                }
            }
        }

        info!("patch loaded ({i}/{total} words)");
        Ok(())
    }
}

/// Patch programs for each supported chip family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchSet {
    pub vs1053: &'static [u16],
    pub vs1063: &'static [u16],
}

impl PatchSet {
    /// No patches; reset skips the load step.
    pub const EMPTY: PatchSet = PatchSet {
        vs1053: &[],
        vs1063: &[],
    };

    pub fn for_chip(&self, version: ChipVersion) -> Patch<'static> {
        match version {
            ChipVersion::Vs1053 => Patch::new(self.vs1053),
            ChipVersion::Vs1063 => Patch::new(self.vs1063),
        }
    }
}
