//! Bounded capture of a response body prefix.

use bytes::{Buf, Bytes, BytesMut};
use std::io;

/// How many bytes of a response body are kept for error diagnostics.
pub const DEFAULT_CAPTURE_LIMIT: usize = 512;

/// Mirrors the first `limit` bytes written to it and silently drops the rest.
///
/// Writes never fail and never come up short: every call reports the full input
/// as consumed so that whatever tees into the buffer keeps flowing unaffected.
/// Only the stored prefix is truncated.
///
/// ```rust
/// use httplog::limit_buffer::LimitBuffer;
/// use std::io::{Read, Write};
///
/// let mut buf = LimitBuffer::new(4);
/// assert_eq!(buf.write(b"abcdef").unwrap(), 6);
///
/// let mut out = Vec::new();
/// buf.read_to_end(&mut out).unwrap();
/// assert_eq!(out, b"abcd");
/// ```
#[derive(Debug, Clone)]
pub struct LimitBuffer {
    buf: BytesMut,
    limit: usize,
}

impl LimitBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(limit),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of bytes currently held.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buf.len() >= self.limit
    }

    /// Stores as much of `data` as still fits and drops the rest.
    pub fn capture(&mut self, data: &[u8]) {
        let keep = self.limit.saturating_sub(self.buf.len()).min(data.len());
        self.buf.extend_from_slice(&data[..keep]);
    }

    /// Drains everything captured so far.
    pub fn take_bytes(&mut self) -> Bytes {
        self.buf.split().freeze()
    }
}

impl Default for LimitBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPTURE_LIMIT)
    }
}

impl io::Write for LimitBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.capture(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Read for LimitBuffer {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let n = self.buf.len().min(out.len());
        self.buf.copy_to_slice(&mut out[..n]);
        Ok(n)
    }
}
