//! Byte sources for the wire scanner.
//!
//! The scanner consumes bytes through the `ByteSource` trait: strict reads,
//! forward skips, an end-of-stream probe, and a bounded backward rewind
//! within whatever the source currently holds in memory.

use std::io::{self, Read};

/// Default refill chunk for [`StreamSource`].
const STREAM_BUFFER_SIZE: usize = 8192;

/// A forward byte stream with a bounded rewind window.
///
/// `offset` reports how many bytes of the current in-memory buffer lie
/// behind the read position; `rewind(n)` is only valid for `n <= offset()`.
pub trait ByteSource {
    /// Probe for end of stream without consuming anything.
    fn eof(&mut self) -> io::Result<bool>;

    /// Fill `dst` completely or fail with `UnexpectedEof`.
    fn read_strict(&mut self, dst: &mut [u8]) -> io::Result<()>;

    /// Advance past `n` bytes.
    fn ignore(&mut self, n: u64) -> io::Result<()>;

    /// Rewind budget: bytes of the current buffer before the read position.
    fn offset(&self) -> u64;

    /// Move the read position back by `n` bytes. Callers must check
    /// `offset()` first.
    fn rewind(&mut self, n: u64);
}

fn eof_error() -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "unexpected end of protobuf stream",
    )
}

/// A source over an in-memory slice. The whole slice counts as the current
/// buffer, so any rewind within it succeeds.
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl ByteSource for SliceSource<'_> {
    fn eof(&mut self) -> io::Result<bool> {
        Ok(self.pos >= self.data.len())
    }

    fn read_strict(&mut self, dst: &mut [u8]) -> io::Result<()> {
        if self.remaining() < dst.len() {
            return Err(eof_error());
        }
        dst.copy_from_slice(&self.data[self.pos..self.pos + dst.len()]);
        self.pos += dst.len();
        Ok(())
    }

    fn ignore(&mut self, n: u64) -> io::Result<()> {
        if (self.remaining() as u64) < n {
            return Err(eof_error());
        }
        self.pos += n as usize;
        Ok(())
    }

    fn offset(&self) -> u64 {
        self.pos as u64
    }

    fn rewind(&mut self, n: u64) {
        self.pos -= n as usize;
    }
}

/// A buffered source over any `Read`, refilling in fixed-size chunks.
///
/// Rewinds are limited to the current chunk; a rewind that would cross a
/// refill boundary is reported as exhausted budget by `offset()`.
pub struct StreamSource<R: Read> {
    inner: R,
    buf: Vec<u8>,
    pos: usize,
}

impl<R: Read> StreamSource<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            pos: 0,
        }
    }

    /// Replace the buffer with the next chunk. Returns the chunk length,
    /// zero at end of stream.
    fn fill(&mut self) -> io::Result<usize> {
        self.buf.resize(STREAM_BUFFER_SIZE, 0);
        let n = self.inner.read(&mut self.buf)?;
        self.buf.truncate(n);
        self.pos = 0;
        Ok(n)
    }

    fn available(&self) -> usize {
        self.buf.len() - self.pos
    }
}

impl<R: Read> ByteSource for StreamSource<R> {
    fn eof(&mut self) -> io::Result<bool> {
        if self.available() > 0 {
            return Ok(false);
        }
        Ok(self.fill()? == 0)
    }

    fn read_strict(&mut self, dst: &mut [u8]) -> io::Result<()> {
        let mut written = 0;
        while written < dst.len() {
            if self.available() == 0 && self.fill()? == 0 {
                return Err(eof_error());
            }
            let n = self.available().min(dst.len() - written);
            dst[written..written + n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
            self.pos += n;
            written += n;
        }
        Ok(())
    }

    fn ignore(&mut self, mut n: u64) -> io::Result<()> {
        while n > 0 {
            if self.available() == 0 && self.fill()? == 0 {
                return Err(eof_error());
            }
            let step = (self.available() as u64).min(n);
            self.pos += step as usize;
            n -= step;
        }
        Ok(())
    }

    fn offset(&self) -> u64 {
        self.pos as u64
    }

    fn rewind(&mut self, n: u64) {
        self.pos -= n as usize;
    }
}
