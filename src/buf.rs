//! Buffer primitives shared by the decoder and encoder.
//!
//! The codec never owns or grows a caller's I/O buffers (see the crate's
//! top-level buffer contract). `Cursor` and `Sink` are thin, non-owning
//! views that track how much of the caller's slice has been consumed or
//! produced during a single `decode`/`encode` call. `Accumulator` is the
//! one piece of state the decoder legitimately owns: a header line (or a
//! chunk-size line) may straddle two separate `decode` calls, so it has
//! to be buffered somewhere that isn't the caller's slice.

/// A read-only view over a caller-supplied input buffer.
///
/// `position()` only ever grows within one call; bytes past it are left
/// untouched for the caller to re-present (or not) on the next call.
#[derive(Debug)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Cursor<'a> {
        Cursor { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Marks `n` more bytes as consumed.
    ///
    /// # Panics
    /// When `n` would advance past the end of the buffer.
    pub fn advance(&mut self, n: usize) {
        assert!(self.pos + n <= self.buf.len(), "advance past end of input");
        self.pos += n;
    }

    pub fn peek(&self, n: usize) -> Option<&[u8]> {
        self.remaining().get(..n)
    }
}

/// A write-only view over a caller-supplied output buffer.
#[derive(Debug)]
pub struct Sink<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Sink<'a> {
    pub fn new(buf: &'a mut [u8]) -> Sink<'a> {
        Sink { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_full(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// The writable remainder, for callees that fill it directly (e.g. the
    /// charset decoder, which writes through `encoding_rs`).
    pub fn remaining_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.pos..]
    }

    /// Marks `n` bytes (already written into `remaining_mut()`) as produced.
    pub fn advance(&mut self, n: usize) {
        assert!(self.pos + n <= self.buf.len(), "advance past end of output");
        self.pos += n;
    }

    /// Writes as much of `data` as fits, returning the number of bytes
    /// actually written.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.remaining());
        self.buf[self.pos..self.pos + n].copy_from_slice(&data[..n]);
        self.pos += n;
        n
    }
}

/// A growing, owned byte accumulator.
///
/// Used for the decoder's in-progress header/chunk-size line and for the
/// encoder's pending-data buffer (`pending_limit`, see the encoder module).
#[derive(Debug, Default, Clone)]
pub struct Accumulator {
    data: Vec<u8>,
}

impl Accumulator {
    pub fn new() -> Accumulator {
        Accumulator { data: Vec::new() }
    }

    pub fn with_capacity(n: usize) -> Accumulator {
        Accumulator { data: Vec::with_capacity(n) }
    }

    pub fn push(&mut self, byte: u8) {
        self.data.push(byte);
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn drain_to(&mut self, n: usize) {
        self.data.drain(..n);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}
