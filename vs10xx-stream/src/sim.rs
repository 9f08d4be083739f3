//! Software model of a VS10xx chip for tests.
//!
//! [`SimChip`] keeps a register file and logs every SCI write and data
//! block. Its control and data handles implement [`SpiDevice`] by decoding
//! the SCI opcodes, so the codec, patch loader and device layers run
//! unmodified against it.

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use embedded_hal::digital::{self, InputPin};
use embedded_hal::spi::{self, Operation, SpiDevice};

use crate::codec::registers as reg;
use crate::sync::lock;

#[derive(Debug)]
pub(crate) struct SimError;

impl spi::Error for SimError {
    fn kind(&self) -> spi::ErrorKind {
        spi::ErrorKind::Other
    }
}

struct ChipModel {
    regs: [u16; 16],
    wram_addr: u16,
    end_fill: u8,
    sci_writes: Vec<(u8, u16)>,
    data: Vec<Vec<u8>>,
    fail_control: bool,
    /// Control exchanges left to fail before the bus recovers.
    fail_exchanges: usize,
    /// Register and count of upcoming reads to fail.
    fail_reads: Option<(u8, usize)>,
    fail_data: usize,
    sticky_cancel: bool,
    /// Data blocks left before a pending cancel clears.
    cancel_countdown: Option<usize>,
}

impl ChipModel {
    fn sci_write(&mut self, addr: u8, value: u16) {
        let addr = addr & 0x0F;
        self.sci_writes.push((addr, value));
        match addr {
            reg::SCI_MODE => {
                let mut mode = value & !reg::SM_RESET;
                if value & reg::SM_RESET != 0 {
                    self.cancel_countdown = None;
                    mode &= !reg::SM_CANCEL;
                } else if value & reg::SM_CANCEL != 0 {
                    self.cancel_countdown = Some(2);
                }
                self.regs[usize::from(reg::SCI_MODE)] = mode;
            }
            reg::SCI_WRAMADDR => self.wram_addr = value,
            _ => self.regs[usize::from(addr)] = value,
        }
    }

    fn sci_read(&self, addr: u8) -> u16 {
        let addr = addr & 0x0F;
        if addr == reg::SCI_WRAM && self.wram_addr == reg::PAR_END_FILL_BYTE {
            return u16::from(self.end_fill);
        }
        self.regs[usize::from(addr)]
    }

    fn take_read_fault(&mut self, addr: u8) -> bool {
        match self.fail_reads.as_mut() {
            Some((target, left)) if *target == addr & 0x0F && *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        }
    }

    fn data_write(&mut self, bytes: &[u8]) -> Result<(), SimError> {
        if self.fail_data > 0 {
            self.fail_data -= 1;
            return Err(SimError);
        }
        self.data.push(bytes.to_vec());
        if let Some(left) = self.cancel_countdown.as_mut() {
            if !self.sticky_cancel {
                *left = left.saturating_sub(1);
                if *left == 0 {
                    self.regs[usize::from(reg::SCI_MODE)] &= !reg::SM_CANCEL;
                    self.cancel_countdown = None;
                }
            }
        }
        Ok(())
    }
}

/// Shared handle on one simulated chip.
#[derive(Clone)]
pub(crate) struct SimChip(Arc<Mutex<ChipModel>>);

impl SimChip {
    /// A chip whose status register reports `version`.
    pub fn new(version: u8) -> Self {
        let mut regs = [0u16; 16];
        regs[usize::from(reg::SCI_STATUS)] = u16::from(version) << 4;
        Self(Arc::new(Mutex::new(ChipModel {
            regs,
            wram_addr: 0,
            end_fill: 0,
            sci_writes: Vec::new(),
            data: Vec::new(),
            fail_control: false,
            fail_exchanges: 0,
            fail_reads: None,
            fail_data: 0,
            sticky_cancel: false,
            cancel_countdown: None,
        })))
    }

    pub fn ctrl(&self) -> SimCtrl {
        SimCtrl(self.clone())
    }

    pub fn data(&self) -> SimData {
        SimData(self.clone())
    }

    pub fn set_reg(&self, addr: u8, value: u16) {
        lock(&self.0).regs[usize::from(addr & 0x0F)] = value;
    }

    pub fn reg(&self, addr: u8) -> u16 {
        lock(&self.0).regs[usize::from(addr & 0x0F)]
    }

    pub fn set_end_fill(&self, byte: u8) {
        lock(&self.0).end_fill = byte;
    }

    /// Make every control exchange fail until cleared.
    pub fn fail_control(&self, fail: bool) {
        lock(&self.0).fail_control = fail;
    }

    /// Fail the next `count` control exchanges, then recover.
    pub fn fail_control_exchanges(&self, count: usize) {
        lock(&self.0).fail_exchanges = count;
    }

    /// Fail the next `count` reads of register `addr`.
    pub fn fail_reads(&self, addr: u8, count: usize) {
        lock(&self.0).fail_reads = Some((addr & 0x0F, count));
    }

    /// Fail the next `count` data writes.
    pub fn fail_data_writes(&self, count: usize) {
        lock(&self.0).fail_data = count;
    }

    /// Never clear a requested cancel.
    pub fn set_sticky_cancel(&self, sticky: bool) {
        lock(&self.0).sticky_cancel = sticky;
    }

    pub fn sci_writes(&self) -> Vec<(u8, u16)> {
        lock(&self.0).sci_writes.clone()
    }

    pub fn data_writes(&self) -> Vec<Vec<u8>> {
        lock(&self.0).data.clone()
    }

    pub fn clear_logs(&self) {
        let mut model = lock(&self.0);
        model.sci_writes.clear();
        model.data.clear();
    }
}

/// Control channel of a [`SimChip`].
pub(crate) struct SimCtrl(SimChip);

impl spi::ErrorType for SimCtrl {
    type Error = SimError;
}

impl SpiDevice for SimCtrl {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), SimError> {
        let mut model = lock(&(self.0).0);
        if model.fail_control {
            return Err(SimError);
        }
        if model.fail_exchanges > 0 {
            model.fail_exchanges -= 1;
            return Err(SimError);
        }
        let mut reply = None;
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => match *bytes {
                    &[reg::OP_WRITE, addr, msb, lsb] => {
                        model.sci_write(addr, u16::from_be_bytes([msb, lsb]))
                    }
                    &[reg::OP_READ, addr] => {
                        if model.take_read_fault(addr) {
                            return Err(SimError);
                        }
                        reply = Some(model.sci_read(addr));
                    }
                    _ => {}
                },
                Operation::Read(buf) => {
                    let value = reply.take().unwrap_or(0).to_be_bytes();
                    for (dst, src) in buf.iter_mut().zip(value) {
                        *dst = src;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Data channel of a [`SimChip`].
pub(crate) struct SimData(SimChip);

impl spi::ErrorType for SimData {
    type Error = SimError;
}

impl SpiDevice for SimData {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), SimError> {
        let mut model = lock(&(self.0).0);
        for op in operations.iter_mut() {
            if let Operation::Write(bytes) = op {
                model.data_write(*bytes)?;
            }
        }
        Ok(())
    }
}

/// Ready line driven from the test.
#[derive(Clone)]
pub(crate) struct SimPin(Arc<AtomicBool>);

impl SimPin {
    pub fn new(high: bool) -> Self {
        Self(Arc::new(AtomicBool::new(high)))
    }

    pub fn set(&self, high: bool) {
        self.0.store(high, Ordering::SeqCst);
    }
}

impl digital::ErrorType for SimPin {
    type Error = Infallible;
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.load(Ordering::SeqCst))
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.load(Ordering::SeqCst))
    }
}
