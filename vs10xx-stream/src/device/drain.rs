//! End-of-stream protocol.
//!
//! After the queue is discarded the chip still holds part of the stream in
//! its input buffer. It is pushed through with end-fill bytes, then decoding
//! is cancelled; a chip that never acknowledges the cancel is soft reset.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;
use tracing::{debug, warn};

use crate::block::Buffer;
use crate::codec::registers as reg;
use crate::codec::{StreamFormat, Vs10xx};
use crate::constants::{
    BUFFER_BYTES, CANCEL_BUFFERS, END_FILL_BUFFERS, END_FILL_BUFFERS_FLAC, RELEASE_TIMEOUT,
    TRANSFER_TIMEOUT,
};
use crate::control::RegisterControl;
use crate::error::Error;

/// Keeps the first error of a best-effort sequence.
#[derive(Default)]
struct FirstError(Option<Error>);

impl FirstError {
    fn check<T>(&mut self, result: Result<T, Error>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.0.get_or_insert(e);
                None
            }
        }
    }

    fn into_result(self) -> Result<(), Error> {
        self.0.map_or(Ok(()), Err)
    }
}

/// Run the whole protocol. Every step is attempted even if an earlier one
/// failed; the first failure is returned.
pub(super) fn end_of_stream<CTRL, DATA, RST, DREQ, DELAY>(
    id: usize,
    codec: &mut Vs10xx<CTRL, DATA, RST, DREQ, DELAY>,
    clock: Option<u16>,
) -> Result<(), Error>
where
    CTRL: SpiDevice,
    DATA: SpiDevice,
    RST: OutputPin,
    DREQ: InputPin,
    DELAY: DelayNs,
{
    let mut errors = FirstError::default();

    if !codec.wait_ready(RELEASE_TIMEOUT) {
        warn!(id, "chip not ready at end of stream");
    }
    let format = errors.check(codec.stream_format()).unwrap_or_default();
    let fill = errors.check(codec.end_fill_byte()).unwrap_or(0);
    let buffer = Buffer::filled(fill, BUFFER_BYTES);

    let count = if format == StreamFormat::Flac {
        END_FILL_BUFFERS_FLAC
    } else {
        END_FILL_BUFFERS
    };
    debug!(id, ?format, fill, count, "sending end fill");
    for _ in 0..count {
        codec.wait_ready(TRANSFER_TIMEOUT);
        errors.check(codec.data_write(buffer.as_slice()));
    }

    errors.check(codec.write_register_u16(reg::SCI_MODE, reg::SM_SDINEW | reg::SM_CANCEL));

    // an unread mode register counts as still cancelling
    let mut cancelled = false;
    for _ in 0..CANCEL_BUFFERS {
        errors.check(codec.data_write(buffer.as_slice()));
        codec.wait_ready(TRANSFER_TIMEOUT);
        if let Some((_, lsb)) = errors.check(codec.read_register(reg::SCI_MODE)) {
            if u16::from(lsb) & reg::SM_CANCEL == 0 {
                cancelled = true;
                break;
            }
        }
    }

    if !cancelled {
        warn!(id, "device did not cancel, soft reset issued");
        errors.check(codec.soft_reset(false, clock));
    }

    errors.into_result()
}
