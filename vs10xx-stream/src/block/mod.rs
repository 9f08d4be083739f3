//! Fixed-size data buffers and the per-device buffer queue.

mod queue;

pub use queue::BufferQueue;

use crate::constants::BUFFER_BYTES;

/// One 32-byte block of bitstream. `len == 0` marks an unused buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Buffer {
    data: [u8; BUFFER_BYTES],
    len: usize,
}

impl Buffer {
    pub const fn new() -> Self {
        Self {
            data: [0; BUFFER_BYTES],
            len: 0,
        }
    }

    /// A buffer of `len` copies of `byte`.
    pub fn filled(byte: u8, len: usize) -> Self {
        let len = len.min(BUFFER_BYTES);
        let mut data = [0; BUFFER_BYTES];
        data[..len].fill(byte);
        Self { data, len }
    }

    /// Copy as much of `bytes` as fits and return how much that was.
    pub fn fill(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(BUFFER_BYTES);
        self.data[..n].copy_from_slice(&bytes[..n]);
        self.len = n;
        n
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub(crate) fn clear(&mut self) {
        self.len = 0;
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_truncates_to_capacity() {
        let mut buffer = Buffer::new();
        assert!(buffer.is_empty());
        let src: Vec<u8> = (0..40).collect();
        assert_eq!(buffer.fill(&src), 32);
        assert_eq!(buffer.as_slice(), &src[..32]);

        assert_eq!(buffer.fill(&[9, 8, 7]), 3);
        assert_eq!(buffer.as_slice(), &[9, 8, 7]);
    }

    #[test]
    fn filled_buffer() {
        let buffer = Buffer::filled(0x5A, 32);
        assert_eq!(buffer.len(), 32);
        assert!(buffer.as_slice().iter().all(|&b| b == 0x5A));
    }
}
