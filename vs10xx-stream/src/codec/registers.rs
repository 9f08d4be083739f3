//! VS10xx serial control interface (SCI) register map.
//!
//! Register addresses are 4-bit; every register holds 16 bits transferred
//! msb first. Only the registers and mode bits the driver touches are listed.

#![allow(dead_code)]

// ── Opcodes ────────────────────────────────────────────────────────────────

/// SCI write opcode: `[WRITE, addr, msb, lsb]`.
pub const OP_WRITE: u8 = 0x02;

/// SCI read opcode: `[READ, addr]`, then two bytes in.
pub const OP_READ: u8 = 0x03;

// ── Registers ──────────────────────────────────────────────────────────────

/// Mode control.
pub const SCI_MODE: u8 = 0x00;

/// Status. Bits 7:4 carry the chip version.
pub const SCI_STATUS: u8 = 0x01;

/// Built-in bass/treble control.
/// - Bits 15:12 : treble boost (1.5 dB steps)
/// - Bits 11:8  : treble lower limit (1 kHz steps)
/// - Bits  7:4  : bass boost (1 dB steps)
/// - Bits  3:0  : bass upper limit (10 Hz steps)
pub const SCI_BASS: u8 = 0x02;

/// Clock frequency and multiplier.
/// - Bits 15:13 : SC_MULT
/// - Bits 12:11 : SC_ADD
/// - Bits 10:0  : SC_FREQ (input clock in 4 kHz steps above 8 MHz)
pub const SCI_CLOCKF: u8 = 0x03;

/// Decode time in seconds.
pub const SCI_DECODE_TIME: u8 = 0x04;

/// Misc. audio data.
pub const SCI_AUDATA: u8 = 0x05;

/// RAM write/read data.
pub const SCI_WRAM: u8 = 0x06;

/// Base address for RAM write/read.
pub const SCI_WRAMADDR: u8 = 0x07;

/// Stream header data 0. Memory test result after a memory test.
pub const SCI_HDAT0: u8 = 0x08;

/// Stream header data 1. Identifies the stream format being decoded.
pub const SCI_HDAT1: u8 = 0x09;

/// Start address of an application.
pub const SCI_AIADDR: u8 = 0x0A;

/// Volume control. 0.5 dB attenuation steps per channel, 0 = loudest.
pub const SCI_VOL: u8 = 0x0B;

// ── Mode bits ──────────────────────────────────────────────────────────────

/// Soft reset.
pub const SM_RESET: u16 = 0x0004;

/// Cancel decoding of the current stream.
pub const SM_CANCEL: u16 = 0x0008;

/// Allow SDI tests.
pub const SM_TESTS: u16 = 0x0020;

/// Native SPI mode.
pub const SM_SDINEW: u16 = 0x0800;

// ── X memory ───────────────────────────────────────────────────────────────

/// Parametric block location of the end-fill byte.
pub const PAR_END_FILL_BYTE: u16 = 0x1E06;

// ── Status ─────────────────────────────────────────────────────────────────

/// Version field of [`SCI_STATUS`] (low byte).
pub const SS_VER_MASK: u8 = 0xF0;
pub const SS_VER_SHIFT: u8 = 4;

// ── SDI test commands ──────────────────────────────────────────────────────

/// Sine test at the chip's reference frequency.
pub const SINE_TEST: [u8; 8] = [0x53, 0xEF, 0x6E, 0xA3, 0x00, 0x00, 0x00, 0x00];

/// Memory test.
pub const MEMORY_TEST: [u8; 8] = [0x4D, 0xEA, 0x6D, 0x54, 0x00, 0x00, 0x00, 0x00];

/// Reserved bits cleared from the memory test result msb.
pub const MEMORY_TEST_MSB_MASK: u8 = 0x83;
