//! Register value types.
//!
//! None of these are cached: each is decoded from a fresh two-byte read or
//! encoded right before a two-byte write.

use core::fmt;

use crate::error::Error;

use super::registers as reg;

// ── Clock ──────────────────────────────────────────────────────────────────

/// Clock register contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClockF {
    /// Fixed clock multiplier, 0..=7.
    pub mul: u8,
    /// Additional multiplier allowed by the decoder, 0..=3.
    pub add: u8,
    /// Input clock in 4 kHz steps, 0..=2047.
    pub clk: u16,
}

impl ClockF {
    pub fn to_wire(self) -> (u8, u8) {
        let msb =
            ((self.mul & 0x07) << 5) | ((self.add & 0x03) << 3) | ((self.clk >> 8) as u8 & 0x07);
        (msb, self.clk as u8)
    }

    pub fn from_wire(msb: u8, lsb: u8) -> Self {
        Self {
            mul: (msb >> 5) & 0x07,
            add: (msb >> 3) & 0x03,
            clk: (u16::from(msb & 0x07) << 8) | u16::from(lsb),
        }
    }
}

// ── Volume ─────────────────────────────────────────────────────────────────

/// Channel loudness, 0 = silent, 255 = loudest.
///
/// The chip stores attenuation; the inversion happens in
/// [`to_wire`](Self::to_wire) and [`from_wire`](Self::from_wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Volume {
    pub left: u8,
    pub right: u8,
}

impl Volume {
    pub fn to_wire(self) -> (u8, u8) {
        (255 - self.left, 255 - self.right)
    }

    pub fn from_wire(msb: u8, lsb: u8) -> Self {
        Self {
            left: 255 - msb,
            right: 255 - lsb,
        }
    }

    /// Build from per-channel attenuation in dB (0.0 = full scale).
    ///
    /// The chip attenuates in 0.5 dB steps. Values are rounded to the nearest
    /// step and clamped to 0..=127 dB; the fully attenuated wire value 255
    /// (analog power-down) is never produced.
    pub fn from_attenuation_db(left_db: f32, right_db: f32) -> Self {
        fn steps(db: f32) -> u8 {
            if db.is_nan() {
                return 0;
            }
            (db * 2.0).round().clamp(0.0, 254.0) as u8
        }
        Self::from_wire(steps(left_db), steps(right_db))
    }
}

// ── Tone ───────────────────────────────────────────────────────────────────

/// Bass/treble enhancer settings. All fields are 4-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tone {
    /// Treble boost in 1.5 dB steps.
    pub treble_boost: u8,
    /// Treble lower limit in 1 kHz steps.
    pub treble_limit: u8,
    /// Bass boost in 1 dB steps.
    pub bass_boost: u8,
    /// Bass upper limit in 10 Hz steps.
    pub bass_limit: u8,
}

impl Tone {
    pub fn to_wire(self) -> (u8, u8) {
        (
            ((self.treble_boost & 0x0F) << 4) | (self.treble_limit & 0x0F),
            ((self.bass_boost & 0x0F) << 4) | (self.bass_limit & 0x0F),
        )
    }

    pub fn from_wire(msb: u8, lsb: u8) -> Self {
        Self {
            treble_boost: msb >> 4,
            treble_limit: msb & 0x0F,
            bass_boost: lsb >> 4,
            bass_limit: lsb & 0x0F,
        }
    }
}

// ── Stream format ──────────────────────────────────────────────────────────

/// Format of the stream currently being decoded, probed from `SCI_HDAT1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum StreamFormat {
    #[default]
    None = 0,
    Wav = 1,
    Aac = 2,
    Wma = 3,
    Midi = 4,
    Ogg = 5,
    Mp3 = 6,
    Flac = 7,
}

impl StreamFormat {
    pub fn from_hdat1(msb: u8, lsb: u8) -> Self {
        match (msb, lsb) {
            (0x76, 0x65) => Self::Wav,
            (0x41, 0x54) | (0x41, 0x44) | (0x4D, 0x34) => Self::Aac,
            (0x57, 0x4D) => Self::Wma,
            (0x4D, 0x54) => Self::Midi,
            (0x4F, 0x67) => Self::Ogg,
            (0x66, 0x4C) => Self::Flac,
            (0xFF, lsb) if lsb >= 0xE0 => Self::Mp3,
            _ => Self::None,
        }
    }
}

// ── Raw register ───────────────────────────────────────────────────────────

/// One SCI register and its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScRegister {
    /// Register address; only the low nibble is used.
    pub reg: u8,
    pub msb: u8,
    pub lsb: u8,
}

impl ScRegister {
    pub fn new(reg: u8, msb: u8, lsb: u8) -> Self {
        Self {
            reg: reg & 0x0F,
            msb,
            lsb,
        }
    }

    pub fn value(&self) -> u16 {
        u16::from_be_bytes([self.msb, self.lsb])
    }
}

// ── Chip family ────────────────────────────────────────────────────────────

/// Supported chip families, keyed by the `SCI_STATUS` version field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ChipVersion {
    Vs1053 = 4,
    Vs1063 = 6,
}

impl ChipVersion {
    /// Decode the version field from the low byte of `SCI_STATUS`.
    pub fn from_status(lsb: u8) -> Result<Self, Error> {
        Self::try_from((lsb & reg::SS_VER_MASK) >> reg::SS_VER_SHIFT)
    }

    pub fn number(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ChipVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vs1053 => f.write_str("vs1053"),
            Self::Vs1063 => f.write_str("vs1063"),
        }
    }
}

impl TryFrom<u8> for ChipVersion {
    type Error = Error;

    fn try_from(version: u8) -> Result<Self, Error> {
        match version {
            4 => Ok(Self::Vs1053),
            6 => Ok(Self::Vs1063),
            other => Err(Error::UnsupportedDevice(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn clock_round_trips(mul in 0u8..8, add in 0u8..4, clk in 0u16..2048) {
            let clock = ClockF { mul, add, clk };
            let (msb, lsb) = clock.to_wire();
            prop_assert_eq!(ClockF::from_wire(msb, lsb), clock);
        }

        #[test]
        fn tone_round_trips(tb in 0u8..16, tl in 0u8..16, bb in 0u8..16, bl in 0u8..16) {
            let tone = Tone { treble_boost: tb, treble_limit: tl, bass_boost: bb, bass_limit: bl };
            let (msb, lsb) = tone.to_wire();
            prop_assert_eq!(Tone::from_wire(msb, lsb), tone);
        }
    }

    #[test]
    fn clock_default_override_layout() {
        // 0xC000: mul 6, add 0, clk 0
        assert_eq!(ClockF::from_wire(0xC0, 0x00), ClockF { mul: 6, add: 0, clk: 0 });
        let clock = ClockF { mul: 3, add: 1, clk: 0x5AB };
        assert_eq!(clock.to_wire(), (0x6D, 0xAB));
    }

    #[test]
    fn volume_is_inverted_on_the_wire() {
        assert_eq!(Volume { left: 64, right: 64 }.to_wire(), (191, 191));
        assert_eq!(Volume::from_wire(0, 0), Volume { left: 255, right: 255 });
        assert_eq!(Volume::from_wire(255, 0), Volume { left: 0, right: 255 });
    }

    #[test]
    fn volume_from_attenuation() {
        assert_eq!(Volume::from_attenuation_db(0.0, 0.0).to_wire(), (0, 0));
        assert_eq!(Volume::from_attenuation_db(10.0, 3.25).to_wire(), (20, 7));
        // clamped, never the power-down value
        assert_eq!(Volume::from_attenuation_db(200.0, -5.0).to_wire(), (254, 0));
    }

    #[test]
    fn format_signatures() {
        assert_eq!(StreamFormat::from_hdat1(0xFF, 0xE0), StreamFormat::Mp3);
        assert_eq!(StreamFormat::from_hdat1(0xFF, 0xFB), StreamFormat::Mp3);
        assert_eq!(StreamFormat::from_hdat1(0xFF, 0xDF), StreamFormat::None);
        assert_eq!(StreamFormat::from_hdat1(0x4F, 0x67), StreamFormat::Ogg);
        assert_eq!(StreamFormat::from_hdat1(0x00, 0x00), StreamFormat::None);
        assert_eq!(StreamFormat::from_hdat1(0x76, 0x65), StreamFormat::Wav);
        assert_eq!(StreamFormat::from_hdat1(0x66, 0x4C), StreamFormat::Flac);
        assert_eq!(StreamFormat::from_hdat1(0x57, 0x4D), StreamFormat::Wma);
        assert_eq!(StreamFormat::from_hdat1(0x4D, 0x54), StreamFormat::Midi);
        for (msb, lsb) in [(0x41, 0x54), (0x41, 0x44), (0x4D, 0x34)] {
            assert_eq!(StreamFormat::from_hdat1(msb, lsb), StreamFormat::Aac);
        }
        assert_eq!(StreamFormat::Flac as u8, 7);
    }

    #[test]
    fn raw_register_masks_address() {
        let reg = ScRegister::new(0x1B, 0x12, 0x34);
        assert_eq!(reg.reg, 0x0B);
        assert_eq!(reg.value(), 0x1234);
    }

    #[test]
    fn chip_version_from_status() {
        assert_eq!(ChipVersion::from_status(0x40).unwrap(), ChipVersion::Vs1053);
        assert_eq!(ChipVersion::from_status(0x68).unwrap(), ChipVersion::Vs1063);
        assert_eq!(ChipVersion::from_status(0x30), Err(Error::UnsupportedDevice(3)));
        assert_eq!(ChipVersion::Vs1063.number(), 6);
        assert_eq!(ChipVersion::Vs1063.to_string(), "vs1063");
    }
}
