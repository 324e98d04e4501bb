//! Endpoint memory buffers
//!
//! The endpoint memory pool is shared with the SIE, so every access is a
//! volatile, byte-wide access. A [`Buffer`] is a window into the pool that
//! belongs to one endpoint direction.

use crate::vcell::VCell;

/// An endpoint buffer
pub struct Buffer<'a> {
    cells: &'a [VCell<u8>],
}

impl<'a> Buffer<'a> {
    /// Select `len` bytes of `pool`, starting at `offset`
    ///
    /// The window is truncated if it extends past the end of the pool.
    pub fn new(pool: &'a [VCell<u8>], offset: usize, len: usize) -> Self {
        let start = offset.min(pool.len());
        let end = offset.saturating_add(len).min(pool.len());
        Buffer {
            cells: &pool[start..end],
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Read the contents of the buffer into `buffer`
    ///
    /// Returns the number of bytes copied, the smaller of the two lengths.
    pub fn volatile_read(&self, buffer: &mut [u8]) -> usize {
        let size = self.cells.len().min(buffer.len());
        for (dst, src) in buffer.iter_mut().zip(self.cells.iter()) {
            *dst = src.read();
        }
        size
    }

    /// Write `buffer` into the buffer
    ///
    /// Returns the number of bytes copied, the smaller of the two lengths.
    pub fn volatile_write(&self, buffer: &[u8]) -> usize {
        let size = self.cells.len().min(buffer.len());
        for (dst, src) in self.cells.iter().zip(buffer.iter()) {
            dst.write(*src);
        }
        size
    }
}
