//! The encoder-side message writer (C4's inner state machine): renders a
//! start-line + header block, then streams a body in fixed-length,
//! chunked, or until-close mode. Carried over from the teacher's
//! `base_serializer::MessageState`/`Body`, reworked in two ways:
//!
//! - it writes into a caller `Sink` instead of an owned `tk_bufstream::Buf`,
//!   so any step may suspend on `Overflow` and resume on the next call;
//! - the header block is now rendered in one shot from an already-assembled
//!   `FieldMap` (per spec.md's `encode(header)` taking a complete header)
//!   rather than built up through repeated `add_header` calls, since there
//!   is no application-facing builder API in this crate -- the engine (C6)
//!   assembles the full `RequestHead`/`ResponseHead` before handing it to
//!   the serializer.

use crate::buf::{Accumulator, Cursor, Sink};
use crate::error::ProtocolError;
use crate::headers::converter;
use crate::message::FieldMap;
use crate::method::Method;
use crate::status::StatusCode;
use crate::version::Version;

/// How the body following this header is framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// No body is ever written (1xx/204/304, HEAD responses, bodyless
    /// requests).
    None,
    /// Exactly `n` bytes follow, framed by `Content-Length`.
    Fixed(u64),
    /// `Transfer-Encoding: chunked` framing.
    Chunked,
    /// No length is known up front; the connection close (or a later
    /// promotion) marks the end. Used for the HTTP/1.0 pending-data path
    /// (§4.2.4) before a final length/chunked decision is made.
    UntilClose,
}

/// Renders the start-line and header block for a request or response.
///
/// The full block is rendered once into an internal `Accumulator`, then
/// drained into the caller's `Sink` across as many `write_header` calls
/// as it takes -- the same buffering trick the decoder's chunk-size line
/// accumulator uses in reverse.
pub struct HeaderWriter {
    block: Accumulator,
    drained: usize,
    body_mode: BodyMode,
    is_head: bool,
}

impl HeaderWriter {
    pub fn for_response(version: Version, status: StatusCode, headers: &FieldMap, body_mode: BodyMode, is_head: bool) -> HeaderWriter {
        let mut block = Accumulator::new();
        block.extend(format!("{} {} {}\r\n", version, status.code(), status.reason()).as_bytes());
        render_headers(&mut block, headers);
        block.extend(b"\r\n");
        HeaderWriter { block, drained: 0, body_mode, is_head }
    }

    pub fn for_request(method: &Method, path: &str, version: Version, headers: &FieldMap, body_mode: BodyMode) -> HeaderWriter {
        let mut block = Accumulator::new();
        block.extend(format!("{} {} {}\r\n", method, path, version).as_bytes());
        render_headers(&mut block, headers);
        block.extend(b"\r\n");
        HeaderWriter { block, drained: 0, body_mode, is_head: false }
    }

    pub fn body_mode(&self) -> BodyMode {
        self.body_mode
    }

    pub fn is_head(&self) -> bool {
        self.is_head
    }

    pub fn is_complete(&self) -> bool {
        self.drained >= self.block.len()
    }

    /// Drain as much of the rendered header block into `output` as fits.
    /// Returns `true` once the whole block has been written.
    pub fn write_header(&mut self, output: &mut Sink) -> bool {
        let remaining = &self.block.as_slice()[self.drained..];
        let written = output.write(remaining);
        self.drained += written;
        self.is_complete()
    }
}

/// Renders one physical line per `FieldMap` entry, except that repeated
/// occurrences of a non-`separate_values` converter are folded into a
/// single line joined by `Converter::delimiter` (spec.md: "the encoder
/// ... emits one physical header line per item iff separate-values is
/// set"), emitted at the position of the name's first occurrence.
/// `Set-Cookie` (and anything else with `separate_values()`) keeps one
/// line per occurrence, in order, right where `FieldMap` has them.
fn render_headers(block: &mut Accumulator, headers: &FieldMap) {
    let mut seen: Vec<&str> = Vec::new();
    for (name, _) in headers.iter() {
        if seen.contains(&name) {
            continue;
        }
        seen.push(name);

        let conv = converter(name);
        let values: Vec<&str> = headers.get_all(name).collect();
        match conv.delimiter() {
            Some(delimiter) if !conv.separate_values() && values.len() > 1 => {
                write_header_line(block, name, &values.join(delimiter));
            }
            _ => {
                for value in values {
                    write_header_line(block, name, value);
                }
            }
        }
    }
}

fn write_header_line(block: &mut Accumulator, name: &str, value: &str) {
    block.extend(name.as_bytes());
    block.extend(b": ");
    block.extend(value.as_bytes());
    block.extend(b"\r\n");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncodeOutcome {
    /// Output buffer is full; drain and call again with the same input.
    Overflow,
    /// All currently-available input has been written; supply more or,
    /// if this was the last of the body, call again with `end_of_input`.
    Underflow,
    /// The body (and, for chunked, the terminating `0\r\n` + trailers)
    /// has been fully written.
    Done,
}

#[derive(Debug)]
enum ChunkPhase {
    Idle,
    WritingSize { pending: Accumulator, drained: usize, payload_len: usize },
    WritingPayload { remaining: usize },
    WritingCrlf { drained: usize },
    WritingFinal { pending: Accumulator, drained: usize },
    Done,
}

/// Streams a body that's already had its framing mode decided, writing
/// from a caller-owned input `Cursor` into a caller-owned output `Sink`.
pub struct BodyWriter {
    mode: BodyMode,
    is_head: bool,
    remaining: Option<u64>,
    chunk: ChunkPhase,
}

impl BodyWriter {
    pub fn new(mode: BodyMode, is_head: bool) -> BodyWriter {
        let remaining = match mode {
            BodyMode::Fixed(n) => Some(n),
            _ => None,
        };
        BodyWriter { mode, is_head, remaining, chunk: ChunkPhase::Idle }
    }

    /// Write as much of `input` as the current body mode and `output`
    /// capacity allow. `end_of_input` signals no more body bytes are
    /// coming after this call (required to terminate `Chunked`/
    /// `UntilClose` bodies); `trailers`, when non-empty, are appended to
    /// the final chunked terminator (§4.1.4 round-trip).
    pub fn write_body(
        &mut self,
        input: &mut Cursor,
        output: &mut Sink,
        end_of_input: bool,
        trailers: &FieldMap,
    ) -> Result<BodyEncodeOutcome, ProtocolError> {
        match self.mode {
            BodyMode::None => Ok(BodyEncodeOutcome::Done),
            BodyMode::Fixed(_) => self.write_fixed(input, output),
            BodyMode::Chunked => self.write_chunked(input, output, end_of_input, trailers),
            BodyMode::UntilClose => self.write_until_close(input, output, end_of_input),
        }
    }

    fn write_fixed(&mut self, input: &mut Cursor, output: &mut Sink) -> Result<BodyEncodeOutcome, ProtocolError> {
        let remaining = self.remaining.expect("Fixed mode always carries a remaining count");
        if remaining == 0 {
            return Ok(BodyEncodeOutcome::Done);
        }
        if self.is_head {
            // Responses to HEAD requests carry the real Content-Length but
            // no actual bytes are written; drop whatever the caller supplied.
            let n = input.remaining().len().min(remaining as usize);
            input.advance(n);
            self.remaining = Some(remaining - n as u64);
            return Ok(if self.remaining == Some(0) { BodyEncodeOutcome::Done } else { BodyEncodeOutcome::Underflow });
        }
        let avail = input.remaining();
        if avail.is_empty() {
            return Ok(BodyEncodeOutcome::Underflow);
        }
        if output.is_full() {
            return Ok(BodyEncodeOutcome::Overflow);
        }
        let n = avail.len().min(remaining as usize).min(output.remaining());
        if n == 0 {
            return Ok(BodyEncodeOutcome::Overflow);
        }
        let written = output.write(&avail[..n]);
        input.advance(written);
        self.remaining = Some(remaining - written as u64);
        Ok(if self.remaining == Some(0) { BodyEncodeOutcome::Done } else { BodyEncodeOutcome::Underflow })
    }

    fn write_until_close(&mut self, input: &mut Cursor, output: &mut Sink, end_of_input: bool) -> Result<BodyEncodeOutcome, ProtocolError> {
        let avail = input.remaining();
        if !avail.is_empty() {
            if output.is_full() {
                return Ok(BodyEncodeOutcome::Overflow);
            }
            let n = avail.len().min(output.remaining());
            let written = output.write(&avail[..n]);
            input.advance(written);
            if written < avail.len() {
                return Ok(BodyEncodeOutcome::Overflow);
            }
        }
        Ok(if end_of_input { BodyEncodeOutcome::Done } else { BodyEncodeOutcome::Underflow })
    }

    fn write_chunked(
        &mut self,
        input: &mut Cursor,
        output: &mut Sink,
        end_of_input: bool,
        trailers: &FieldMap,
    ) -> Result<BodyEncodeOutcome, ProtocolError> {
        loop {
            match &mut self.chunk {
                ChunkPhase::Done => return Ok(BodyEncodeOutcome::Done),

                ChunkPhase::Idle => {
                    let avail_len = input.remaining().len();
                    if avail_len == 0 {
                        if end_of_input {
                            self.chunk = ChunkPhase::WritingFinal { pending: render_final_chunk(trailers), drained: 0 };
                        } else {
                            return Ok(BodyEncodeOutcome::Underflow);
                        }
                    } else {
                        let mut pending = Accumulator::new();
                        pending.extend(format!("{:x}\r\n", avail_len).as_bytes());
                        self.chunk = ChunkPhase::WritingSize { pending, drained: 0, payload_len: avail_len };
                    }
                }

                ChunkPhase::WritingSize { pending, drained, payload_len } => {
                    if self.is_head {
                        self.chunk = ChunkPhase::WritingPayload { remaining: *payload_len };
                        continue;
                    }
                    let remaining_bytes = &pending.as_slice()[*drained..];
                    if remaining_bytes.is_empty() {
                        self.chunk = ChunkPhase::WritingPayload { remaining: *payload_len };
                        continue;
                    }
                    if output.is_full() {
                        return Ok(BodyEncodeOutcome::Overflow);
                    }
                    let written = output.write(remaining_bytes);
                    *drained += written;
                    if written < remaining_bytes.len() {
                        return Ok(BodyEncodeOutcome::Overflow);
                    }
                }

                ChunkPhase::WritingPayload { remaining } => {
                    if *remaining == 0 {
                        self.chunk = ChunkPhase::WritingCrlf { drained: 0 };
                        continue;
                    }
                    if self.is_head {
                        let n = input.remaining().len().min(*remaining);
                        input.advance(n);
                        *remaining -= n;
                        continue;
                    }
                    if output.is_full() {
                        return Ok(BodyEncodeOutcome::Overflow);
                    }
                    let avail = input.remaining();
                    let n = avail.len().min(*remaining).min(output.remaining());
                    if n == 0 {
                        return Ok(BodyEncodeOutcome::Overflow);
                    }
                    let written = output.write(&avail[..n]);
                    input.advance(written);
                    *remaining -= written;
                }

                ChunkPhase::WritingCrlf { drained } => {
                    const CRLF: &[u8] = b"\r\n";
                    if self.is_head {
                        self.chunk = ChunkPhase::Idle;
                        continue;
                    }
                    if *drained >= CRLF.len() {
                        self.chunk = ChunkPhase::Idle;
                        continue;
                    }
                    if output.is_full() {
                        return Ok(BodyEncodeOutcome::Overflow);
                    }
                    let written = output.write(&CRLF[*drained..]);
                    *drained += written;
                    if *drained < CRLF.len() {
                        return Ok(BodyEncodeOutcome::Overflow);
                    }
                }

                ChunkPhase::WritingFinal { pending, drained } => {
                    if self.is_head {
                        self.chunk = ChunkPhase::Done;
                        return Ok(BodyEncodeOutcome::Done);
                    }
                    let remaining_bytes = &pending.as_slice()[*drained..];
                    if remaining_bytes.is_empty() {
                        self.chunk = ChunkPhase::Done;
                        return Ok(BodyEncodeOutcome::Done);
                    }
                    if output.is_full() {
                        return Ok(BodyEncodeOutcome::Overflow);
                    }
                    let written = output.write(remaining_bytes);
                    *drained += written;
                    if written < remaining_bytes.len() {
                        return Ok(BodyEncodeOutcome::Overflow);
                    }
                }
            }
        }
    }
}

fn render_final_chunk(trailers: &FieldMap) -> Accumulator {
    let mut acc = Accumulator::new();
    acc.extend(b"0\r\n");
    render_headers(&mut acc, trailers);
    acc.extend(b"\r\n");
    acc
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::message::FieldMap;

    fn headers_with(pairs: &[(&str, &str)]) -> FieldMap {
        let mut m = FieldMap::new();
        for (k, v) in pairs {
            m.set(k, *v);
        }
        m
    }

    #[test]
    fn minimal_response_header() {
        let headers = headers_with(&[("Content-Length", "0")]);
        let mut writer = HeaderWriter::for_response(Version::Http10, StatusCode::OK, &headers, BodyMode::Fixed(0), false);
        let mut out = vec![0u8; 256];
        let mut sink = Sink::new(&mut out);
        assert!(writer.write_header(&mut sink));
        assert_eq!(&out[..sink.position()], b"HTTP/1.0 200 OK\r\nContent-Length: 0\r\n\r\n");
    }

    #[test]
    fn header_drains_across_small_sinks() {
        let headers = headers_with(&[("Content-Length", "0")]);
        let mut writer = HeaderWriter::for_response(Version::Http11, StatusCode::OK, &headers, BodyMode::Fixed(0), false);
        let mut collected = Vec::new();
        loop {
            let mut out = vec![0u8; 5];
            let mut sink = Sink::new(&mut out);
            let done = writer.write_header(&mut sink);
            collected.extend_from_slice(&out[..sink.position()]);
            if done {
                break;
            }
        }
        assert_eq!(collected, b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
    }

    #[test]
    fn repeated_list_header_folds_into_one_delimited_line() {
        let mut headers = FieldMap::new();
        headers.append("Cache-Control", "no-cache");
        headers.append("Cache-Control", "must-revalidate");
        headers.set("Content-Length", "0");
        let mut writer = HeaderWriter::for_response(Version::Http11, StatusCode::OK, &headers, BodyMode::Fixed(0), false);
        let mut out = vec![0u8; 256];
        let mut sink = Sink::new(&mut out);
        writer.write_header(&mut sink);
        let text = String::from_utf8(out[..sink.position()].to_vec()).unwrap();
        assert_eq!(text.matches("Cache-Control").count(), 1, "repeats of a List header must fold into one line: {}", text);
        assert!(text.contains("Cache-Control: no-cache, must-revalidate"), "{}", text);
    }

    #[test]
    fn repeated_set_cookie_keeps_one_line_per_occurrence() {
        let mut headers = FieldMap::new();
        headers.append("Set-Cookie", "a=1");
        headers.append("Set-Cookie", "b=2");
        headers.set("Content-Length", "0");
        let mut writer = HeaderWriter::for_response(Version::Http11, StatusCode::OK, &headers, BodyMode::Fixed(0), false);
        let mut out = vec![0u8; 256];
        let mut sink = Sink::new(&mut out);
        writer.write_header(&mut sink);
        let text = String::from_utf8(out[..sink.position()].to_vec()).unwrap();
        assert_eq!(text.matches("Set-Cookie").count(), 2, "{}", text);
        assert!(text.contains("Set-Cookie: a=1\r\n"), "{}", text);
        assert!(text.contains("Set-Cookie: b=2\r\n"), "{}", text);
    }

    #[test]
    fn fixed_body_round_trip() {
        let mut writer = BodyWriter::new(BodyMode::Fixed(5), false);
        let mut input = Cursor::new(b"Hello");
        let mut out = vec![0u8; 64];
        let mut sink = Sink::new(&mut out);
        let outcome = writer.write_body(&mut input, &mut sink, true, &FieldMap::new()).unwrap();
        assert_eq!(outcome, BodyEncodeOutcome::Done);
        assert_eq!(&out[..sink.position()], b"Hello");
    }

    #[test]
    fn chunked_body_single_chunk_then_terminator() {
        let mut writer = BodyWriter::new(BodyMode::Chunked, false);
        let mut input = Cursor::new(b"hello");
        let mut out = vec![0u8; 64];
        let mut sink = Sink::new(&mut out);
        let outcome = writer.write_body(&mut input, &mut sink, true, &FieldMap::new()).unwrap();
        assert_eq!(outcome, BodyEncodeOutcome::Done);
        assert_eq!(&out[..sink.position()], b"5\r\nhello\r\n0\r\n\r\n");
    }

    #[test]
    fn chunked_body_with_trailers() {
        let mut writer = BodyWriter::new(BodyMode::Chunked, false);
        let mut input = Cursor::new(b"");
        let mut out = vec![0u8; 64];
        let mut sink = Sink::new(&mut out);
        let trailers = headers_with(&[("X-Checksum", "abc123")]);
        let outcome = writer.write_body(&mut input, &mut sink, true, &trailers).unwrap();
        assert_eq!(outcome, BodyEncodeOutcome::Done);
        assert_eq!(&out[..sink.position()], b"0\r\nX-Checksum: abc123\r\n\r\n");
    }

    #[test]
    fn head_response_suppresses_fixed_body_bytes() {
        let mut writer = BodyWriter::new(BodyMode::Fixed(5), true);
        let mut input = Cursor::new(b"Hello");
        let mut out = vec![0u8; 64];
        let mut sink = Sink::new(&mut out);
        let outcome = writer.write_body(&mut input, &mut sink, true, &FieldMap::new()).unwrap();
        assert_eq!(outcome, BodyEncodeOutcome::Done);
        assert_eq!(sink.position(), 0);
    }
}
