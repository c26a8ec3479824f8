//! The HTTP encoder state machine (C4): renders a start-line + header
//! block, then streams a body in fixed-length, chunked, or until-close
//! mode, per spec.md §4.2.
//!
//! The framing decision at header time (§4.2.1) and the response-side
//! fixups (§4.2.3: `Date` injection, `Expires` synthesis, `Content-Length`
//! presence rules) live here; the byte-level rendering is delegated to
//! `serializer::{HeaderWriter, BodyWriter}`, carried over from the
//! teacher's `base_serializer.rs`.

use crate::buf::{Accumulator, Cursor, Sink};
use crate::clock::{Clock, SystemClock};
use crate::error::ProtocolError;
use crate::headers::util;
use crate::message::{FieldMap, RequestHead, ResponseHead};
use crate::result::{EncoderResult, ProtocolSwitch};
use crate::serializer::{BodyEncodeOutcome, BodyMode, BodyWriter, HeaderWriter};
use crate::status::StatusCode;
use crate::version::Version;

#[derive(Debug, Clone, Copy)]
pub struct EncoderConfig {
    /// Maximum bytes the encoder buffers internally before an unknown
    /// body length must be promoted to chunked framing (HTTP/1.1) or the
    /// connection must be closed at the end of the body (HTTP/1.0),
    /// per §4.2.4 "Pending-data buffer".
    pub pending_limit: usize,
}

impl Default for EncoderConfig {
    fn default() -> EncoderConfig {
        EncoderConfig { pending_limit: 16 * 1024 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Request,
    Response,
}

enum State {
    /// No header has been handed to the encoder yet.
    Idle,
    /// The header block is still draining into the caller's `Sink`. Any
    /// bytes already buffered by a resolved `Pending` state are carried
    /// in `prefix` and handed to the body writer before fresh input.
    Header { writer: HeaderWriter, trailers: FieldMap, switch_on_finish: Option<String>, prefix: Accumulator },
    /// Body framing is fully decided; streaming straight through.
    Body { writer: BodyWriter, trailers: FieldMap, switch_on_finish: Option<String>, prefix: Accumulator },
    /// HTTP/1.0 body of unknown length: buffering until either
    /// `end_of_input` (promote to `Fixed`) or `pending_limit` is
    /// exceeded (promote to `UntilClose`, which will close the
    /// connection once the body completes).
    Pending { head_kind: PendingHead, buffered: Accumulator, is_head: bool },
    Done,
}

enum PendingHead {
    Request(RequestHead),
    Response(ResponseHead),
}

/// Streams a request (client side) or response (server side) header
/// followed by its body, per spec.md §4.2.
pub struct HttpEncoder<C: Clock = SystemClock> {
    role: Role,
    config: EncoderConfig,
    clock: C,
    state: State,
    version: Version,
}

impl HttpEncoder<SystemClock> {
    pub fn new_request() -> HttpEncoder<SystemClock> {
        HttpEncoder::with_clock(Role::Request, SystemClock)
    }

    pub fn new_response() -> HttpEncoder<SystemClock> {
        HttpEncoder::with_clock(Role::Response, SystemClock)
    }
}

impl<C: Clock> HttpEncoder<C> {
    pub fn new_response_with_clock(clock: C) -> HttpEncoder<C> {
        HttpEncoder::with_clock(Role::Response, clock)
    }

    pub fn new_request_with_clock(clock: C) -> HttpEncoder<C> {
        HttpEncoder::with_clock(Role::Request, clock)
    }

    fn with_clock(role: Role, clock: C) -> HttpEncoder<C> {
        HttpEncoder { role, config: EncoderConfig::default(), clock, state: State::Idle, version: Version::Http11 }
    }

    pub fn with_config(mut self, config: EncoderConfig) -> Self {
        self.config = config;
        self
    }

    /// Accepts the request to be sent. Produces no output; call `encode`
    /// to stream the header and body bytes.
    pub fn encode_request(&mut self, head: &RequestHead, has_payload: bool) -> Result<(), ProtocolError> {
        self.version = head.version;
        let mut head = head.clone();
        let body_mode = decide_body_mode(&mut head.headers, head.version, has_payload);
        self.start(PendingHead::Request(head), body_mode, false, None)
    }

    /// Accepts the response to be sent, applying the response-side
    /// fixups of §4.2.3. `switch` is `Some(protocol)` when an upgrade
    /// provider has accepted a `101` handshake for this response.
    pub fn encode_response(&mut self, head: &ResponseHead, has_payload: bool, switch: Option<String>) -> Result<(), ProtocolError> {
        self.version = head.version;
        let mut head = head.clone();
        head.headers.set("Date", crate::headers::date::format(self.clock.now()));

        if head.version.at_most_http10() {
            synthesize_expires(&mut head.headers, self.clock.now());
        }

        // HEAD responses go through `encode_head_response` instead, which
        // passes `is_head = true` to the header writer so it renders
        // `Content-Length` without ever streaming body bytes.
        let is_head = false;
        fixup_content_length_presence(&mut head.headers, head.status, has_payload);

        let body_mode = if head.status.forbids_body() {
            BodyMode::None
        } else {
            decide_body_mode(&mut head.headers, head.version, has_payload)
        };
        self.start(PendingHead::Response(head), body_mode, is_head, switch)
    }

    /// Like `encode_response`, but for a response to a `HEAD` request:
    /// the header (including `Content-Length`) is rendered as normal but
    /// no body bytes are ever written (§4.2.1/RFC 7230 §3.3.3).
    pub fn encode_head_response(&mut self, head: &ResponseHead, content_length: Option<u64>, switch: Option<String>) -> Result<(), ProtocolError> {
        self.version = head.version;
        let mut head = head.clone();
        head.headers.set("Date", crate::headers::date::format(self.clock.now()));
        head.headers.remove("Transfer-Encoding");
        if let Some(n) = content_length {
            head.headers.set("Content-Length", n.to_string());
        }
        let body_mode = match content_length {
            Some(n) => BodyMode::Fixed(n),
            None => BodyMode::None,
        };
        self.start(PendingHead::Response(head), body_mode, true, switch)
    }

    fn start(&mut self, head: PendingHead, body_mode: BodyMode, is_head: bool, switch: Option<String>) -> Result<(), ProtocolError> {
        match body_mode {
            BodyMode::UntilClose if matches!(head, PendingHead::Response(_)) && self.pending_eligible(&head) => {
                self.state = State::Pending { head_kind: head, buffered: Accumulator::new(), is_head };
                return Ok(());
            }
            _ => {}
        }
        let trailers = trailer_fields(&head);
        let writer = match &head {
            PendingHead::Request(h) => HeaderWriter::for_request(&h.method, &h.path, h.version, &h.headers, body_mode),
            PendingHead::Response(h) => HeaderWriter::for_response(h.version, h.status, &h.headers, body_mode, is_head),
        };
        self.state = State::Header { writer, trailers, switch_on_finish: switch, prefix: Accumulator::new() };
        Ok(())
    }

    /// Pending-data buffering (§4.2.4) only applies to the HTTP/1.0,
    /// unknown-length, has-payload case: the header can't be rendered
    /// until either the whole body has arrived (so `Content-Length` can
    /// be set) or `pending_limit` is exceeded (so the response must fall
    /// back to until-close framing).
    fn pending_eligible(&self, head: &PendingHead) -> bool {
        match head {
            PendingHead::Response(h) => h.version.at_most_http10() && !h.headers.contains("Transfer-Encoding") && !h.headers.contains("Content-Length"),
            PendingHead::Request(_) => false,
        }
    }

    /// Streams header bytes into `output`, then (once the header is
    /// complete) body bytes from `input`. `end_of_input = true` signals
    /// no further body bytes will be supplied after this call.
    pub fn encode(&mut self, mut input: Option<&mut Cursor>, output: &mut Sink, end_of_input: bool) -> Result<EncoderResult, ProtocolError> {
        loop {
            match &mut self.state {
                State::Idle => return Ok(EncoderResult::done()),
                State::Done => return Ok(EncoderResult::done()),

                State::Pending { buffered, is_head, .. } => {
                    if let Some(cursor) = input.as_deref_mut() {
                        let avail = cursor.remaining();
                        let room = self.config.pending_limit.saturating_sub(buffered.len());
                        let take = avail.len().min(room);
                        buffered.extend(&avail[..take]);
                        cursor.advance(take);
                        if take < avail.len() {
                            // pending_limit exceeded: fall back to until-close framing.
                            let head = match std::mem::replace(&mut self.state, State::Done) {
                                State::Pending { head_kind, buffered, is_head } => (head_kind, buffered, is_head),
                                _ => unreachable!(),
                            };
                            self.promote_to_until_close(head.0, head.1, head.2)?;
                            continue;
                        }
                    }
                    if end_of_input {
                        let head = match std::mem::replace(&mut self.state, State::Done) {
                            State::Pending { head_kind, buffered, is_head } => (head_kind, buffered, is_head),
                            _ => unreachable!(),
                        };
                        self.finalize_pending(head.0, head.1, head.2)?;
                        continue;
                    }
                    return Ok(EncoderResult::underflow());
                }

                State::Header { writer, .. } => {
                    let complete = writer.write_header(output);
                    if !complete {
                        if output.is_full() {
                            return Ok(EncoderResult::overflow());
                        }
                        return Ok(EncoderResult::underflow());
                    }
                    let body_mode = writer.body_mode();
                    let is_head = writer.is_head();
                    let (trailers, switch_on_finish, prefix) = match std::mem::replace(&mut self.state, State::Done) {
                        State::Header { trailers, switch_on_finish, prefix, .. } => (trailers, switch_on_finish, prefix),
                        _ => unreachable!(),
                    };
                    self.state = State::Body { writer: BodyWriter::new(body_mode, is_head), trailers, switch_on_finish, prefix };
                }

                State::Body { writer, trailers, switch_on_finish, prefix } => {
                    if !prefix.is_empty() {
                        let mut prefix_cursor = Cursor::new(prefix.as_slice());
                        let outcome = writer.write_body(&mut prefix_cursor, output, false, trailers)?;
                        let consumed = prefix_cursor.position();
                        prefix.drain_to(consumed);
                        match outcome {
                            BodyEncodeOutcome::Overflow => return Ok(EncoderResult::overflow()),
                            BodyEncodeOutcome::Done => {
                                let switch = switch_on_finish.take().map(|protocol| ProtocolSwitch { protocol });
                                let close_connection = self.version.at_most_http10();
                                self.state = State::Done;
                                return Ok(EncoderResult { close_connection, switch, ..Default::default() });
                            }
                            BodyEncodeOutcome::Underflow if !prefix.is_empty() => return Ok(EncoderResult::overflow()),
                            BodyEncodeOutcome::Underflow => {} // prefix drained; fall through to real input below
                        }
                    }
                    let empty_cursor = &mut Cursor::new(&[]);
                    let cursor = input.as_deref_mut().unwrap_or(empty_cursor);
                    let outcome = writer.write_body(cursor, output, end_of_input, trailers)?;
                    return match outcome {
                        BodyEncodeOutcome::Overflow => Ok(EncoderResult::overflow()),
                        BodyEncodeOutcome::Underflow => Ok(EncoderResult::underflow()),
                        BodyEncodeOutcome::Done => {
                            let switch = switch_on_finish.take().map(|protocol| ProtocolSwitch { protocol });
                            let close_connection = self.version.at_most_http10();
                            self.state = State::Done;
                            Ok(EncoderResult { close_connection, switch, ..Default::default() })
                        }
                    };
                }
            }
        }
    }

    fn finalize_pending(&mut self, head: PendingHead, buffered: Accumulator, is_head: bool) -> Result<(), ProtocolError> {
        let len = buffered.len() as u64;
        let mut head = head;
        set_headers_mut(&mut head).set("Content-Length", len.to_string());
        let trailers = trailer_fields(&head);
        let writer = match &head {
            PendingHead::Request(h) => HeaderWriter::for_request(&h.method, &h.path, h.version, &h.headers, BodyMode::Fixed(len)),
            PendingHead::Response(h) => HeaderWriter::for_response(h.version, h.status, &h.headers, BodyMode::Fixed(len), is_head),
        };
        self.state = State::Header { writer, trailers, switch_on_finish: None, prefix: buffered };
        Ok(())
    }

    fn promote_to_until_close(&mut self, head: PendingHead, buffered: Accumulator, is_head: bool) -> Result<(), ProtocolError> {
        let trailers = trailer_fields(&head);
        let writer = match &head {
            PendingHead::Request(h) => HeaderWriter::for_request(&h.method, &h.path, h.version, &h.headers, BodyMode::UntilClose),
            PendingHead::Response(h) => HeaderWriter::for_response(h.version, h.status, &h.headers, BodyMode::UntilClose, is_head),
        };
        self.state = State::Header { writer, trailers, switch_on_finish: None, prefix: buffered };
        Ok(())
    }
}

fn set_headers_mut(head: &mut PendingHead) -> &mut FieldMap {
    match head {
        PendingHead::Request(h) => &mut h.headers,
        PendingHead::Response(h) => &mut h.headers,
    }
}

fn trailer_fields(head: &PendingHead) -> FieldMap {
    let headers = match head {
        PendingHead::Request(h) => &h.headers,
        PendingHead::Response(h) => &h.headers,
    };
    let mut trailers = FieldMap::new();
    if let Some(names) = headers.get("Trailer") {
        for name in names.split(',') {
            let name = name.trim();
            if !name.is_empty() {
                trailers.set(name, "");
            }
        }
    }
    trailers
}

/// §4.2.1: decide body framing from whatever `Transfer-Encoding`/
/// `Content-Length` the caller already set, injecting `chunked` framing
/// when neither is present and a payload is expected.
fn decide_body_mode(headers: &mut FieldMap, version: Version, has_payload: bool) -> BodyMode {
    let te_chunked = headers.get("Transfer-Encoding").map(|v| util::list_contains(v, "chunked")).unwrap_or(false);
    if te_chunked {
        return BodyMode::Chunked;
    }
    if let Some(len) = headers.get("Content-Length").and_then(|v| v.parse::<u64>().ok()) {
        return BodyMode::Fixed(len);
    }
    if !has_payload {
        return BodyMode::None;
    }
    if version.at_most_http10() {
        BodyMode::UntilClose
    } else {
        headers.set("Transfer-Encoding", "chunked");
        BodyMode::Chunked
    }
}

/// §4.2.3 Content-Length presence check (RFC 7230 §3.3.2): strip where
/// forbidden, inject `Content-Length: 0` where required. Stripping is
/// narrower than `StatusCode::forbids_body`: a `304` carries no body but
/// must still report the `Content-Length` it would have carried on the
/// equivalent `200` (RFC 7232 §4.1), so it is excluded here even though
/// `forbids_body` correctly groups it with 1xx/204 for body suppression.
fn fixup_content_length_presence(headers: &mut FieldMap, status: StatusCode, has_payload: bool) {
    if forbids_content_length_header(status) {
        headers.remove("Content-Length");
        headers.remove("Transfer-Encoding");
        return;
    }
    if headers.contains("Transfer-Encoding") {
        headers.remove("Content-Length");
        return;
    }
    if !has_payload && !headers.contains("Content-Length") {
        headers.set("Content-Length", "0");
    }
}

/// spec.md §4.2.3's strip-list: 1xx and 204 never report a length. `304`
/// is a deliberate exception -- see `fixup_content_length_presence`.
fn forbids_content_length_header(status: StatusCode) -> bool {
    status.is_informational() || status == StatusCode::NO_CONTENT
}

/// §4.2.3: HTTP/1.0 responses whose `Cache-Control` carries `max-age=N`
/// and no explicit `Expires` get one synthesized. A malformed `max-age`
/// is ignored rather than propagated as an error (Open Question #2).
fn synthesize_expires(headers: &mut FieldMap, now: std::time::SystemTime) {
    if headers.contains("Expires") {
        return;
    }
    let Some(cc) = headers.get("Cache-Control").map(|s| s.to_string()) else { return };
    for directive in cc.split(',') {
        let directive = directive.trim();
        if let Some(value) = directive.strip_prefix("max-age=") {
            if let Ok(secs) = value.trim().parse::<u64>() {
                headers.set("Expires", crate::headers::date::format_plus_seconds(now, secs));
            }
            return;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::clock::FixedClock;
    use std::time::{Duration, UNIX_EPOCH};

    fn encode_all(encoder: &mut HttpEncoder<FixedClock>, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut cursor = Cursor::new(body);
        loop {
            let mut buf = vec![0u8; 256];
            let mut sink = Sink::new(&mut buf);
            let result = encoder.encode(Some(&mut cursor), &mut sink, true).unwrap();
            out.extend_from_slice(&buf[..sink.position()]);
            if !result.overflow {
                break;
            }
        }
        out
    }

    fn fixed_clock() -> FixedClock {
        FixedClock(UNIX_EPOCH + Duration::from_secs(784111777))
    }

    #[test]
    fn injects_chunked_framing_for_http11_unknown_length() {
        let mut encoder = HttpEncoder::new_response_with_clock(fixed_clock());
        let mut head = ResponseHead::new(Version::Http11, StatusCode::OK);
        head.headers.set("Content-Type", "text/plain");
        encoder.encode_response(&head, true, None).unwrap();
        let out = encode_all(&mut encoder, b"Hello World!");
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Transfer-Encoding: chunked"));
        assert!(text.ends_with("c\r\nHello World!\r\n0\r\n\r\n"));
    }

    #[test]
    fn injects_content_length_zero_when_bodyless() {
        let mut encoder = HttpEncoder::new_response_with_clock(fixed_clock());
        let head = ResponseHead::new(Version::Http11, StatusCode::OK);
        encoder.encode_response(&head, false, None).unwrap();
        let out = encode_all(&mut encoder, b"");
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Content-Length: 0"));
    }

    #[test]
    fn strips_content_length_for_204() {
        let mut encoder = HttpEncoder::new_response_with_clock(fixed_clock());
        let mut head = ResponseHead::new(Version::Http11, StatusCode::NO_CONTENT);
        head.headers.set("Content-Length", "5");
        encoder.encode_response(&head, false, None).unwrap();
        let out = encode_all(&mut encoder, b"");
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("Content-Length"));
    }

    #[test]
    fn preserves_content_length_for_304() {
        let mut encoder = HttpEncoder::new_response_with_clock(fixed_clock());
        let mut head = ResponseHead::new(Version::Http11, StatusCode::NOT_MODIFIED);
        head.headers.set("Content-Length", "1234");
        encoder.encode_response(&head, false, None).unwrap();
        let out = encode_all(&mut encoder, b"");
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Content-Length: 1234"), "a 304 must still report the length it would have carried on a 200: {}", text);
    }

    #[test]
    fn injects_date_header() {
        let mut encoder = HttpEncoder::new_response_with_clock(fixed_clock());
        let head = ResponseHead::new(Version::Http11, StatusCode::OK);
        encoder.encode_response(&head, false, None).unwrap();
        let out = encode_all(&mut encoder, b"");
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Date: "));
    }

    #[test]
    fn http10_pending_body_finalizes_as_fixed_length() {
        let mut encoder = HttpEncoder::new_response_with_clock(fixed_clock());
        let head = ResponseHead::new(Version::Http10, StatusCode::OK);
        encoder.encode_response(&head, true, None).unwrap();
        let out = encode_all(&mut encoder, b"hi");
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Content-Length: 2"));
        assert!(text.ends_with("hi"));
    }

    #[test]
    fn expires_synthesized_from_max_age_on_http10() {
        let mut encoder = HttpEncoder::new_response_with_clock(fixed_clock());
        let mut head = ResponseHead::new(Version::Http10, StatusCode::OK);
        head.headers.set("Cache-Control", "public, max-age=60");
        head.headers.set("Content-Length", "0");
        encoder.encode_response(&head, false, None).unwrap();
        let out = encode_all(&mut encoder, b"");
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Expires: "));
    }

    #[test]
    fn head_response_emits_length_without_bytes() {
        let mut encoder = HttpEncoder::new_response_with_clock(fixed_clock());
        let head = ResponseHead::new(Version::Http11, StatusCode::OK);
        encoder.encode_head_response(&head, Some(12), None).unwrap();
        let out = encode_all(&mut encoder, b"");
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Content-Length: 12"));
        assert!(text.ends_with("\r\n\r\n"));
    }
}
