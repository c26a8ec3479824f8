//! Chunked transfer-coding (RFC 7230 §4.1), rewritten against the
//! `Cursor`/`Sink` buffer contract instead of the teacher's owned
//! `tk_bufstream::Buf`. `httparse::parse_chunk_size` already reports
//! `Partial` when a chunk-size line hasn't fully arrived, so unlike the
//! HTTP header block this needs no separate line-accumulation step.
//!
//! Trailer fields (§4.1.2) are a supplemented feature: the teacher's
//! `chunked::State` stopped at `done`, discarding anything after the
//! final `0\r\n`. We collect them into a `FieldMap` instead.

use httparse::Status;

use crate::buf::{Cursor, Sink};
use crate::error::ProtocolError;
use crate::headers::canonical_name;
use crate::message::FieldMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    ChunkSize,
    ChunkData { remaining: usize },
    ChunkCrlf,
    Trailer,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkedOutcome {
    /// Ran out of input before the current step could complete.
    Underflow,
    /// Ran out of output space before the current step could complete.
    Overflow,
    /// The terminating chunk, trailer fields, and final CRLF have all
    /// been consumed.
    Done,
}

/// Incremental dechunker: strips chunk-size lines and the terminating
/// `0\r\n` + trailers, writing the raw body bytes through to `Sink`.
#[derive(Debug, Clone)]
pub struct ChunkedDecoder {
    state: State,
    trailers: FieldMap,
}

impl ChunkedDecoder {
    pub fn new() -> ChunkedDecoder {
        ChunkedDecoder { state: State::ChunkSize, trailers: FieldMap::new() }
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    pub fn trailers(&self) -> &FieldMap {
        &self.trailers
    }

    /// Drain as much of `input` as currently possible, writing dechunked
    /// bytes to `output`. Call again with more input/drained output as
    /// directed by the returned outcome.
    pub fn decode(&mut self, input: &mut Cursor, output: &mut Sink) -> Result<ChunkedOutcome, ProtocolError> {
        loop {
            match self.state {
                State::Done => return Ok(ChunkedOutcome::Done),

                State::ChunkSize => match httparse::parse_chunk_size(input.remaining()) {
                    Ok(Status::Complete((consumed, size))) => {
                        input.advance(consumed);
                        self.state = if size == 0 {
                            State::Trailer
                        } else {
                            State::ChunkData { remaining: size as usize }
                        };
                    }
                    Ok(Status::Partial) => return Ok(ChunkedOutcome::Underflow),
                    Err(_) => return Err(ProtocolError::bad_request("invalid chunk size line")),
                },

                State::ChunkData { remaining } => {
                    if remaining == 0 {
                        self.state = State::ChunkCrlf;
                        continue;
                    }
                    let avail = input.remaining();
                    if avail.is_empty() {
                        return Ok(ChunkedOutcome::Underflow);
                    }
                    if output.is_full() {
                        return Ok(ChunkedOutcome::Overflow);
                    }
                    let n = avail.len().min(remaining).min(output.remaining());
                    if n == 0 {
                        return Ok(ChunkedOutcome::Overflow);
                    }
                    let written = output.write(&avail[..n]);
                    input.advance(written);
                    self.state = State::ChunkData { remaining: remaining - written };
                }

                State::ChunkCrlf => {
                    let avail = input.remaining();
                    if avail.len() < 2 {
                        return Ok(ChunkedOutcome::Underflow);
                    }
                    if &avail[..2] != b"\r\n" {
                        return Err(ProtocolError::bad_request("chunk data not followed by CRLF"));
                    }
                    input.advance(2);
                    self.state = State::ChunkSize;
                }

                State::Trailer => {
                    let mut storage = [httparse::EMPTY_HEADER; 16];
                    match httparse::parse_headers(input.remaining(), &mut storage) {
                        Ok(Status::Complete((consumed, headers))) => {
                            for h in headers {
                                let name = canonical_name(h.name);
                                let value = String::from_utf8_lossy(h.value).into_owned();
                                self.trailers.append(&name, value);
                            }
                            input.advance(consumed);
                            self.state = State::Done;
                        }
                        Ok(Status::Partial) => return Ok(ChunkedOutcome::Underflow),
                        Err(_) => return Err(ProtocolError::bad_request("invalid trailer fields")),
                    }
                }
            }
        }
    }
}

impl Default for ChunkedDecoder {
    fn default() -> ChunkedDecoder {
        ChunkedDecoder::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn run(input: &[u8], out_cap: usize) -> (ChunkedOutcome, Vec<u8>, usize) {
        let mut decoder = ChunkedDecoder::new();
        let mut cursor = Cursor::new(input);
        let mut out_buf = vec![0u8; out_cap];
        let mut sink = Sink::new(&mut out_buf);
        let outcome = decoder.decode(&mut cursor, &mut sink).unwrap();
        let written = sink.position();
        (outcome, out_buf[..written].to_vec(), cursor.position())
    }

    #[test]
    fn single_chunk_then_terminator() {
        let (outcome, body, _) = run(b"5\r\nhello\r\n0\r\n\r\n", 64);
        assert_eq!(outcome, ChunkedOutcome::Done);
        assert_eq!(body, b"hello");
    }

    #[test]
    fn multiple_chunks() {
        let (outcome, body, _) = run(b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n", 64);
        assert_eq!(outcome, ChunkedOutcome::Done);
        assert_eq!(body, b"Wikipedia");
    }

    #[test]
    fn partial_chunk_size_is_underflow() {
        let mut decoder = ChunkedDecoder::new();
        let mut cursor = Cursor::new(b"5\r\nhel");
        let mut out_buf = vec![0u8; 64];
        let mut sink = Sink::new(&mut out_buf);
        let outcome = decoder.decode(&mut cursor, &mut sink).unwrap();
        assert_eq!(outcome, ChunkedOutcome::Underflow);
        assert_eq!(&out_buf[..sink.position()], b"hel");
    }

    #[test]
    fn trailers_are_collected() {
        let mut decoder = ChunkedDecoder::new();
        let mut cursor = Cursor::new(b"0\r\nX-Checksum: abc123\r\n\r\n");
        let mut out_buf = vec![0u8; 16];
        let mut sink = Sink::new(&mut out_buf);
        let outcome = decoder.decode(&mut cursor, &mut sink).unwrap();
        assert_eq!(outcome, ChunkedOutcome::Done);
        assert_eq!(decoder.trailers().get("X-Checksum"), Some("abc123"));
    }

    #[test]
    fn bad_chunk_size_is_framing_error() {
        let mut decoder = ChunkedDecoder::new();
        let mut cursor = Cursor::new(b"zz\r\n");
        let mut out_buf = vec![0u8; 16];
        let mut sink = Sink::new(&mut out_buf);
        assert!(decoder.decode(&mut cursor, &mut sink).is_err());
    }

    #[test]
    fn small_output_buffer_overflows() {
        let (outcome, body, consumed) = run(b"5\r\nhello\r\n0\r\n\r\n", 3);
        assert_eq!(outcome, ChunkedOutcome::Overflow);
        assert_eq!(body, b"hel");
        assert!(consumed > 0);
    }
}
