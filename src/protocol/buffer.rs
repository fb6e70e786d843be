//! Bounded Line Buffer
//!
//! Serial links deliver command lines in arbitrary fragments, so incoming
//! bytes are accumulated here until a CR or LF arrives. Unlike the unbounded
//! connection buffers of a network server, an AT engine runs with a small,
//! fixed amount of memory: the buffer refuses to grow past its capacity and
//! reports [`AtError::LineTooLong`] instead.

use crate::error::{AtError, AtResult};
use crate::protocol::types::is_line_end;
use bytes::{Buf, BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Default capacity of the request buffer
pub const DEFAULT_BUFFER_CAPACITY: usize = 512;

/// Fixed-capacity byte accumulator with line boundary detection.
#[derive(Debug)]
pub struct LineBuffer {
    buf: BytesMut,
    capacity: usize,
    /// Offset of the first line terminator, cached by the last scan
    line_end: Option<usize>,
}

impl LineBuffer {
    /// Creates an empty buffer holding at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
            line_end: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Free space left before the buffer is full.
    pub fn remaining(&self) -> usize {
        self.capacity - self.buf.len()
    }

    pub fn is_full(&self) -> bool {
        self.remaining() == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Returns the last `n` buffered bytes.
    pub fn tail(&self, n: usize) -> &[u8] {
        let n = n.min(self.buf.len());
        &self.buf[self.buf.len() - n..]
    }

    /// Appends `data`, failing without modifying the buffer if it does not fit.
    pub fn append(&mut self, data: &[u8]) -> AtResult<()> {
        if data.len() > self.remaining() {
            return Err(AtError::LineTooLong {
                capacity: self.capacity,
            });
        }
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// Reads from `reader` directly into the free space of the buffer.
    ///
    /// Returns the number of bytes read. A return of zero with free space
    /// left means the reader reached end of stream.
    pub async fn read_from<R>(&mut self, reader: &mut R) -> std::io::Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        let remaining = self.remaining();
        if remaining == 0 {
            return Ok(0);
        }
        let mut limited = (&mut self.buf).limit(remaining);
        reader.read_buf(&mut limited).await
    }

    /// Scans from the start of the buffer for the first CR or LF.
    ///
    /// The offset is cached and can be fetched again with [`line_end`](Self::line_end)
    /// until the buffer contents shift.
    pub fn find_line(&mut self) -> Option<usize> {
        self.line_end = self.buf.iter().position(|&b| is_line_end(b));
        self.line_end
    }

    /// Offset of the line terminator found by the last [`find_line`](Self::find_line).
    pub fn line_end(&self) -> Option<usize> {
        self.line_end
    }

    /// Drops the first `n` bytes, shifting the rest to the front.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.buf.len());
        self.buf.advance(n);
        self.line_end = None;
    }

    /// Empties the buffer.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.line_end = None;
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}
