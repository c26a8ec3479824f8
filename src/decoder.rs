//! The HTTP decoder state machine (C3): `AWAIT_MESSAGE_START` -> header
//! block -> body (fixed/chunked/until-close) -> back to
//! `AWAIT_MESSAGE_START` or `CLOSED`, per RFC 7230 §3.
//!
//! Grounded on the teacher's `client/parser.rs` (the overall
//! header-then-body drive loop) and `chunked.rs`; the line-oriented
//! sub-states the design notes describe as a suspendable stack collapse
//! here into `httparse::Request`/`Response::parse` against an
//! accumulator that survives across calls, since `httparse` already
//! understands start-line + header-block grammar in one shot -- the only
//! thing it doesn't handle is legacy line folding (§4.1.2), which this
//! module undoes itself (`headers::util::unfold`) before every parse
//! attempt, and multi-message pipelining, which falls out for free by
//! re-entering `AWAIT_MESSAGE_START` after each message (P2).
//!
//! One accumulator (`buf`) is carried for the whole decoder's lifetime:
//! whatever a call pulls out of the caller's `input` but can't yet fully
//! account for (a still-incomplete header block, or body/next-message
//! bytes that happened to arrive bundled with the tail of a header)
//! lives there until it's processed, rather than being silently dropped
//! at a state transition.
//!
//! `Transfer-Encoding` with `chunked` not last: permissively routed to
//! until-close on the response side (RFC 7230 doesn't forbid it there);
//! on the request side it is always a hard `NOT_IMPLEMENTED`, since a
//! request body's length must be unambiguous for the server to frame the
//! next pipelined request.

use httparse::Status;
use log::{debug, trace};

use crate::buf::{Accumulator, Cursor, Sink};
use crate::charset;
use crate::chunked::{ChunkedDecoder, ChunkedOutcome};
use crate::error::ProtocolError;
use crate::headers::{canonical_name, converter, util};
use crate::message::{FieldMap, RequestHead, ResponseHead};
use crate::method::Method;
use crate::result::{DecoderResult, ProtocolSwitch};
use crate::serializer::BodyMode;
use crate::status::StatusCode;
use crate::version::Version;

const MAX_HEADERS: usize = 64;

#[derive(Debug, Clone, Copy)]
pub struct DecoderConfig {
    /// Maximum accumulated bytes for the start-line + header block
    /// before giving up with `413 Payload Too Large` (§6 "max-header-length").
    pub max_header_length: usize,
}

impl Default for DecoderConfig {
    fn default() -> DecoderConfig {
        DecoderConfig { max_header_length: 4 * 1024 * 1024 }
    }
}

/// What the response decoder needs to know about the request that
/// produced it, installed by the engine before each `decode` call
/// (Design Notes §9, "cyclic encoder <-> decoder peer links").
#[derive(Debug, Clone, Copy)]
pub struct PeerRequestInfo {
    pub is_head: bool,
    pub is_connect: bool,
}

#[derive(Debug)]
enum Head {
    Request(RequestHead),
    Response(ResponseHead),
}

struct BodyCtx {
    mode: BodyMode,
    remaining: Option<u64>,
    chunked: Option<ChunkedDecoder>,
    charset: charset::Decoder,
    /// Dechunked bytes not yet pushed through `charset` (Chunked mode
    /// only; Fixed/UntilClose transcode straight out of `buf`).
    pending: Accumulator,
    framing_done: bool,
}

enum State {
    AwaitStart,
    Body(BodyCtx),
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Request,
    Response,
}

/// Parses either HTTP requests (server side) or HTTP responses (client
/// side); which is selected at construction and fixed for the instance's
/// lifetime (the engine owns one decoder per direction, per C6).
pub struct HttpDecoder {
    role: Role,
    config: DecoderConfig,
    state: State,
    /// Bytes pulled from the caller's input but not yet fully accounted
    /// for: an in-progress header block, or body bytes that arrived
    /// bundled with the end of one.
    buf: Accumulator,
    peer_request: Option<PeerRequestInfo>,
    head: Option<Head>,
    close_connection: bool,
}

impl HttpDecoder {
    pub fn new_request() -> HttpDecoder {
        HttpDecoder::with_config(Role::Request, DecoderConfig::default())
    }

    pub fn new_response() -> HttpDecoder {
        HttpDecoder::with_config(Role::Response, DecoderConfig::default())
    }

    fn with_config(role: Role, config: DecoderConfig) -> HttpDecoder {
        HttpDecoder {
            role,
            config,
            state: State::AwaitStart,
            buf: Accumulator::new(),
            peer_request: None,
            head: None,
            close_connection: false,
        }
    }

    pub fn with_max_header_length(role_is_request: bool, max_header_length: usize) -> HttpDecoder {
        let role = if role_is_request { Role::Request } else { Role::Response };
        HttpDecoder::with_config(role, DecoderConfig { max_header_length })
    }

    /// Installed by the engine before decoding a response, so body-mode
    /// disambiguation (§4.1.3) can see whether the request that solicited
    /// it was `HEAD` or a successful `CONNECT`.
    pub fn set_peer_request(&mut self, info: Option<PeerRequestInfo>) {
        self.peer_request = info;
    }

    pub fn request(&self) -> Option<&RequestHead> {
        match &self.head {
            Some(Head::Request(h)) => Some(h),
            _ => None,
        }
    }

    pub fn response(&self) -> Option<&ResponseHead> {
        match &self.head {
            Some(Head::Response(h)) => Some(h),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// Drains and returns bytes this decoder already pulled from a prior
    /// call's `input` but hasn't accounted for as part of any HTTP
    /// message -- concretely, whatever arrived in the same read as a
    /// message whose header just completed with a protocol switch (a
    /// realistic case: the peer's first WebSocket frame, sent in the same
    /// write as the handshake). The engine must prepend these to the next
    /// read it feeds the newly-installed codec (P6); calling this at any
    /// other time would steal bytes the decoder still needs for the
    /// in-progress body.
    pub fn take_leftover(&mut self) -> Vec<u8> {
        let bytes = self.buf.as_slice().to_vec();
        self.buf.clear();
        bytes
    }

    /// Drive the state machine with whatever of `input` is available,
    /// writing any body bytes produced into `output`. `end_of_input`
    /// signals the peer half-closed the connection (relevant only to
    /// until-close bodies).
    pub fn decode(&mut self, input: &mut Cursor, output: &mut Sink, end_of_input: bool) -> Result<DecoderResult, ProtocolError> {
        if matches!(self.state, State::Closed) {
            return Ok(DecoderResult { close_connection: true, ..Default::default() });
        }

        match self.state {
            State::AwaitStart => {
                let room = self.config.max_header_length.saturating_sub(self.buf.len());
                let avail = input.remaining();
                let take = avail.len().min(room);
                self.buf.extend(&avail[..take]);
                input.advance(take);
                self.drive_start(output, end_of_input)
            }
            State::Body(_) => {
                let avail = input.remaining();
                let n = avail.len();
                self.buf.extend(avail);
                input.advance(n);
                self.drive_body(output, end_of_input)
            }
            State::Closed => unreachable!(),
        }
    }

    /// Parses whatever header bytes are available; if a header completes,
    /// immediately continues into `drive_body` against the same call's
    /// `output` so body bytes that were already pulled into `self.buf`
    /// alongside the header (pipelining, or a response whose body arrived
    /// in the same read as its header) aren't left stranded until the next
    /// call.
    fn drive_start(&mut self, output: &mut Sink, end_of_input: bool) -> Result<DecoderResult, ProtocolError> {
        let unfolded = util::unfold(self.buf.as_slice());
        let result = match self.role {
            Role::Request => self.parse_request(&unfolded),
            Role::Response => self.parse_response(&unfolded),
        }?;
        if !result.header_completed {
            return Ok(result);
        }
        let mut body_result = self.drive_body(output, end_of_input)?;
        body_result.header_completed = true;
        body_result.switch = result.switch;
        Ok(body_result)
    }

    fn parse_request(&mut self, unfolded: &[u8]) -> Result<DecoderResult, ProtocolError> {
        let mut header_storage = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut header_storage);
        match req.parse(unfolded) {
            Ok(Status::Partial) => self.start_underflow_or_too_large(),
            Ok(Status::Complete(consumed)) => {
                let raw_consumed = util::raw_offset_for_unfolded(self.buf.as_slice(), consumed);
                let method = Method::from(req.method.unwrap_or("GET"));
                let version = Version::from_httparse_minor(req.version.unwrap_or(1));
                let path = req.path.unwrap_or("/").to_string();
                let mut head = RequestHead::new(method, path, version);
                if let Err(e) = populate_headers(&mut head.headers, req.headers) {
                    return self.fail_request(raw_consumed, e);
                }
                normalize_length_vs_chunked(&mut head.headers);

                if version == Version::Http11 && !head.headers.contains("Host") {
                    debug!("HTTP/1.1 request without Host header");
                    return self.fail_request(raw_consumed, ProtocolError::bad_request("HTTP/1.1 request without Host"));
                }

                let body_mode = match self.request_body_mode(&head.headers) {
                    Ok(m) => m,
                    Err(e) => return self.fail_request(raw_consumed, e),
                };

                self.buf.drain_to(raw_consumed);
                let charset_label = content_type_charset(&head.headers);
                self.head = Some(Head::Request(head));
                self.enter_body(body_mode, charset_label.as_deref());
                let mut result = DecoderResult::header_completed();
                result.close_connection = self.close_connection;
                Ok(result)
            }
            Err(e) => self.fail_request(0, ProtocolError::bad_request(format!("malformed request line/headers: {}", e))),
        }
    }

    fn parse_response(&mut self, unfolded: &[u8]) -> Result<DecoderResult, ProtocolError> {
        let mut header_storage = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut resp = httparse::Response::new(&mut header_storage);
        match resp.parse(unfolded) {
            Ok(Status::Partial) => self.start_underflow_or_too_large(),
            Ok(Status::Complete(consumed)) => {
                let raw_consumed = util::raw_offset_for_unfolded(self.buf.as_slice(), consumed);
                let version = Version::from_httparse_minor(resp.version.unwrap_or(1));
                let status = StatusCode(resp.code.unwrap_or(200));
                let mut head = ResponseHead::new(version, status);
                populate_headers(&mut head.headers, resp.headers)?;
                normalize_length_vs_chunked(&mut head.headers);
                fixup_retry_after(&mut head.headers);

                let body_mode = self.response_body_mode(status, &head.headers)?;

                let switch = if status == StatusCode::SWITCHING_PROTOCOLS {
                    let upgrade = head.headers.get("Upgrade").map(|s| s.trim().to_string());
                    match upgrade {
                        Some(protocol) if !protocol.is_empty() => Some(ProtocolSwitch { protocol }),
                        _ => {
                            debug!("101 response without Upgrade header");
                            return Err(ProtocolError::bad_request("101 response without Upgrade header"));
                        }
                    }
                } else {
                    None
                };
                if let Some(ref s) = switch {
                    trace!("response requests protocol switch to {}", s.protocol);
                }

                self.buf.drain_to(raw_consumed);
                let charset_label = content_type_charset(&head.headers);
                self.head = Some(Head::Response(head));
                self.enter_body(body_mode, charset_label.as_deref());
                let mut result = DecoderResult::header_completed();
                result.switch = switch;
                Ok(result)
            }
            Err(e) => Err(ProtocolError::bad_request(format!("malformed status line/headers: {}", e))),
        }
    }

    fn start_underflow_or_too_large(&mut self) -> Result<DecoderResult, ProtocolError> {
        if self.buf.len() >= self.config.max_header_length {
            let err = ProtocolError::header_too_large("header block exceeds max-header-length");
            return match self.role {
                Role::Request => self.fail_request(self.buf.len(), err),
                Role::Response => Err(err),
            };
        }
        Ok(DecoderResult::underflow())
    }

    fn fail_request(&mut self, consumed: usize, err: ProtocolError) -> Result<DecoderResult, ProtocolError> {
        debug!("rejecting request: {}", err);
        self.buf.drain_to(consumed.min(self.buf.len()));
        let mut response = ResponseHead::new(Version::Http11, err.status);
        response.headers.set("Connection", "close");
        response.headers.set("Content-Length", "0");
        self.close_connection = true;
        self.state = State::Closed;
        Ok(DecoderResult { close_connection: true, response: Some(response), response_only: true, ..Default::default() })
    }

    fn request_body_mode(&self, headers: &FieldMap) -> Result<BodyMode, ProtocolError> {
        if let Some(te_chunked) = transfer_encoding_last_is_chunked(headers) {
            return if te_chunked {
                Ok(BodyMode::Chunked)
            } else {
                Err(ProtocolError::not_implemented("Transfer-Encoding without chunked as the last coding"))
            };
        }
        if let Some(len) = headers.get("Content-Length") {
            let n: u64 = len.parse().map_err(|_| ProtocolError::bad_request("invalid Content-Length"))?;
            return Ok(BodyMode::Fixed(n));
        }
        Ok(BodyMode::None)
    }

    fn response_body_mode(&self, status: StatusCode, headers: &FieldMap) -> Result<BodyMode, ProtocolError> {
        let peer = self.peer_request.unwrap_or(PeerRequestInfo { is_head: false, is_connect: false });
        if peer.is_head || status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED {
            return Ok(BodyMode::None);
        }
        if peer.is_connect && status.is_success() {
            return Ok(BodyMode::None);
        }
        if let Some(te_chunked) = transfer_encoding_last_is_chunked(headers) {
            return Ok(if te_chunked { BodyMode::Chunked } else { BodyMode::UntilClose });
        }
        if let Some(len) = headers.get("Content-Length") {
            let n: u64 = len.parse().map_err(|_| ProtocolError::bad_request("invalid Content-Length"))?;
            return Ok(BodyMode::Fixed(n));
        }
        Ok(BodyMode::UntilClose)
    }

    fn enter_body(&mut self, mode: BodyMode, charset_label: Option<&str>) {
        let charset = match charset_label {
            Some(label) => charset::Decoder::for_label(label),
            None => charset::Decoder::utf8(),
        };
        let remaining = match mode {
            BodyMode::Fixed(n) => Some(n),
            _ => None,
        };
        let chunked = if mode == BodyMode::Chunked { Some(ChunkedDecoder::new()) } else { None };
        let framing_done = matches!(mode, BodyMode::None | BodyMode::Fixed(0));
        self.state = State::Body(BodyCtx { mode, remaining, chunked, charset, pending: Accumulator::new(), framing_done });
    }

    /// Process whatever is in `self.buf` for the current body, writing
    /// transcoded body bytes to `output`.
    fn drive_body(&mut self, output: &mut Sink, end_of_input: bool) -> Result<DecoderResult, ProtocolError> {
        loop {
            let ctx = match &mut self.state {
                State::Body(ctx) => ctx,
                _ => unreachable!(),
            };
            let done = ctx.framing_done && body_exhausted(ctx);
            if done {
                return self.finish_message();
            }

            let ctx = match &mut self.state {
                State::Body(ctx) => ctx,
                _ => unreachable!(),
            };
            match ctx.mode {
                BodyMode::None => unreachable!("None bodies are marked framing_done immediately"),
                BodyMode::Fixed(_) => {
                    let remaining = ctx.remaining.unwrap_or(0);
                    if remaining == 0 {
                        ctx.framing_done = true;
                    } else if !self.buf.is_empty() {
                        let n = (self.buf.len() as u64).min(remaining) as usize;
                        let mut raw_cursor = Cursor::new(&self.buf.as_slice()[..n]);
                        let last = (n as u64) == remaining;
                        let outcome = ctx.charset.decode_to_sink(&mut raw_cursor, output, last);
                        let consumed = raw_cursor.position();
                        self.buf.drain_to(consumed);
                        ctx.remaining = Some(remaining - consumed as u64);
                        if ctx.remaining == Some(0) {
                            ctx.framing_done = true;
                        }
                        if matches!(outcome, charset::DecodeOutcome::OutputFull) || output.is_full() {
                            return Ok(DecoderResult::overflow());
                        }
                        if consumed == 0 {
                            return Ok(DecoderResult::underflow());
                        }
                        continue;
                    } else {
                        return Ok(DecoderResult::underflow());
                    }
                }
                BodyMode::UntilClose => {
                    if end_of_input && self.buf.is_empty() {
                        ctx.framing_done = true;
                    } else if !self.buf.is_empty() {
                        let mut raw_cursor = Cursor::new(self.buf.as_slice());
                        let outcome = ctx.charset.decode_to_sink(&mut raw_cursor, output, end_of_input);
                        let consumed = raw_cursor.position();
                        self.buf.drain_to(consumed);
                        if matches!(outcome, charset::DecodeOutcome::OutputFull) || output.is_full() {
                            return Ok(DecoderResult::overflow());
                        }
                        if consumed == 0 {
                            return Ok(DecoderResult::underflow());
                        }
                        continue;
                    } else {
                        return Ok(DecoderResult::underflow());
                    }
                }
                BodyMode::Chunked => {
                    if !ctx.pending.is_empty() {
                        let mut raw_cursor = Cursor::new(ctx.pending.as_slice());
                        let last = ctx.framing_done;
                        let outcome = ctx.charset.decode_to_sink(&mut raw_cursor, output, last);
                        let consumed = raw_cursor.position();
                        ctx.pending.drain_to(consumed);
                        if matches!(outcome, charset::DecodeOutcome::OutputFull) || output.is_full() {
                            return Ok(DecoderResult::overflow());
                        }
                        if !ctx.pending.is_empty() {
                            return Ok(DecoderResult::underflow());
                        }
                    }

                    if ctx.framing_done {
                        // fallthrough to completion check below
                    } else {
                        let decoder = ctx.chunked.as_mut().expect("Chunked mode always carries a chunk decoder");
                        let mut input_cursor = Cursor::new(self.buf.as_slice());
                        let mut raw_buf = [0u8; 4096];
                        let mut raw_sink = Sink::new(&mut raw_buf);
                        let chunk_outcome = decoder.decode(&mut input_cursor, &mut raw_sink)?;
                        let consumed = input_cursor.position();
                        self.buf.drain_to(consumed);
                        let produced = raw_sink.position();
                        if produced > 0 {
                            ctx.pending.extend(&raw_buf[..produced]);
                        }
                        match chunk_outcome {
                            ChunkedOutcome::Done => {
                                ctx.framing_done = true;
                                let trailers = ctx.chunked.as_ref().expect("still Chunked mode").trailers().clone();
                                merge_trailers(&mut self.head, &trailers);
                            }
                            ChunkedOutcome::Underflow if produced == 0 => return Ok(DecoderResult::underflow()),
                            _ => {}
                        }
                        continue;
                    }
                }
            }

            if ctx.framing_done && body_exhausted(ctx) {
                return self.finish_message();
            }
        }
    }

    fn finish_message(&mut self) -> Result<DecoderResult, ProtocolError> {
        let close = match &self.head {
            Some(Head::Request(h)) => util::list_contains_any(h.headers.get_all("Connection"), "close"),
            Some(Head::Response(h)) => util::list_contains_any(h.headers.get_all("Connection"), "close"),
            None => true,
        };
        let http10 = matches!(&self.head, Some(Head::Request(h)) if h.version == Version::Http10)
            || matches!(&self.head, Some(Head::Response(h)) if h.version == Version::Http10);
        let close = close || http10;
        self.close_connection = close;
        if close {
            trace!("connection closing after this message");
        }
        self.state = if close { State::Closed } else { State::AwaitStart };
        Ok(DecoderResult { close_connection: close, ..Default::default() })
    }
}

fn body_exhausted(ctx: &BodyCtx) -> bool {
    ctx.pending.is_empty()
}

/// §4.1.4: once the terminating chunk's trailer block has been parsed,
/// fold it into the completed message's headers and append each
/// trailer's name to the `Trailer` field.
fn merge_trailers(head: &mut Option<Head>, trailers: &FieldMap) {
    if trailers.is_empty() {
        return;
    }
    let headers = match head {
        Some(Head::Request(h)) => &mut h.headers,
        Some(Head::Response(h)) => &mut h.headers,
        None => return,
    };
    for (name, value) in trailers.iter() {
        headers.append(name, value.to_string());
        headers.append("Trailer", name.to_string());
    }
}

fn populate_headers(map: &mut FieldMap, headers: &[httparse::Header]) -> Result<(), ProtocolError> {
    for h in headers {
        let name = canonical_name(h.name);
        let raw_value = std::str::from_utf8(h.value).map_err(|_| ProtocolError::converter(format!("{} value is not valid UTF-8", name)))?;
        let conv = converter(&name);
        let validated = conv.validate(raw_value)?.to_string();
        if map.contains(&name) {
            if conv.is_multi() {
                map.append(&name, validated);
            } else {
                return Err(ProtocolError::bad_request(format!("duplicate single-valued header {}", name)));
            }
        } else {
            map.set(&name, validated);
        }
    }
    Ok(())
}

/// I3: Content-Length/Transfer-Encoding are mutually exclusive; if both
/// arrive, Content-Length is dropped (RFC 7230 §3.3.3).
fn normalize_length_vs_chunked(headers: &mut FieldMap) {
    if headers.contains("Transfer-Encoding") && headers.contains("Content-Length") {
        headers.remove("Content-Length");
    }
}

/// Pulls the `charset` parameter off a completed `Content-Type` header, so
/// the body can be transcoded into the char buffer the caller asked for
/// (§4.1 "for char buffers, the decoder transcodes according to the
/// `charset` parameter of `Content-Type`, defaulting to UTF-8").
fn content_type_charset(headers: &FieldMap) -> Option<String> {
    let value = headers.get("Content-Type")?;
    for param in value.split(';').skip(1) {
        let mut parts = param.splitn(2, '=');
        let key = parts.next()?.trim();
        if key.eq_ignore_ascii_case("charset") {
            let raw = parts.next()?.trim();
            return Some(raw.trim_matches('"').to_string());
        }
    }
    None
}

fn transfer_encoding_last_is_chunked(headers: &FieldMap) -> Option<bool> {
    let tokens: Vec<&str> = headers
        .get_all("Transfer-Encoding")
        .flat_map(|v| v.split(','))
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    tokens.last().map(|last| util::is_chunked(last.as_bytes()))
}

/// §4.1.6: `Retry-After` with a delta-seconds value is rewritten to an
/// absolute HTTP-date using `Date` (or now, if absent) as the base.
fn fixup_retry_after(headers: &mut FieldMap) {
    let Some(raw) = headers.get("Retry-After").map(|s| s.to_string()) else { return };
    let Some(first) = raw.as_bytes().first() else { return };
    if !first.is_ascii_digit() {
        return;
    }
    let Ok(secs) = raw.trim().parse::<u64>() else { return };
    let base = headers.get("Date").and_then(crate::headers::date::parse).unwrap_or_else(std::time::SystemTime::now);
    headers.set("Retry-After", crate::headers::date::format_plus_seconds(base, secs));
}

#[cfg(test)]
mod test {
    use super::*;

    fn decode_all(decoder: &mut HttpDecoder, input: &[u8], out_cap: usize) -> (DecoderResult, Vec<u8>) {
        let mut cursor = Cursor::new(input);
        let mut out_buf = vec![0u8; out_cap];
        let mut sink = Sink::new(&mut out_buf);
        let result = decoder.decode(&mut cursor, &mut sink, true).unwrap();
        (result, out_buf[..sink.position()].to_vec())
    }

    #[test]
    fn chunked_response_to_get() {
        let mut decoder = HttpDecoder::new_response();
        decoder.set_peer_request(Some(PeerRequestInfo { is_head: false, is_connect: false }));
        let input = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nContent-Type: text/plain\r\n\r\n7\r\nHello W\r\n5\r\norld!\r\n0\r\n\r\n";
        let (result, body) = decode_all(&mut decoder, input, 64);
        assert!(result.header_completed || !body.is_empty());
        assert_eq!(decoder.response().unwrap().status, StatusCode::OK);
        assert_eq!(body, b"Hello World!");
    }

    #[test]
    fn request_without_host_on_http11_is_bad_request() {
        let mut decoder = HttpDecoder::new_request();
        let input = b"GET / HTTP/1.1\r\n\r\n";
        let mut cursor = Cursor::new(input);
        let mut out_buf = vec![0u8; 16];
        let mut sink = Sink::new(&mut out_buf);
        let result = decoder.decode(&mut cursor, &mut sink, true).unwrap();
        assert!(result.response_only);
        assert_eq!(result.response.unwrap().status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn length_framed_body_split_across_buffers() {
        let mut decoder = HttpDecoder::new_request();
        let head = b"POST /submit HTTP/1.1\r\nHost: x\r\nContent-Length: 28\r\n\r\n";
        let body = b"firstname=J.&lastname=Grapes";
        let mut full = Vec::new();
        full.extend_from_slice(head);
        full.extend_from_slice(body);

        let mut out_buf = vec![0u8; 64];
        let mut sink = Sink::new(&mut out_buf);

        let mut cursor = Cursor::new(&full[..head.len() + 20]);
        let result = decoder.decode(&mut cursor, &mut sink, false).unwrap();
        assert!(result.header_completed);

        let mut cursor2 = Cursor::new(&full[head.len() + 20..]);
        let result = decoder.decode(&mut cursor2, &mut sink, false).unwrap();
        assert!(!result.overflow);
        assert!(!result.underflow);
        assert_eq!(&out_buf[..sink.position()], &body[..]);
    }

    #[test]
    fn pipelined_requests_reuse_decoder() {
        let mut decoder = HttpDecoder::new_request();
        let input = b"GET /a HTTP/1.1\r\nHost: x\r\n\r\nGET /b HTTP/1.1\r\nHost: x\r\n\r\n";
        let mut cursor = Cursor::new(input);
        let mut out_buf = vec![0u8; 16];
        let mut sink = Sink::new(&mut out_buf);

        let result = decoder.decode(&mut cursor, &mut sink, false).unwrap();
        assert!(result.header_completed);
        assert_eq!(decoder.request().unwrap().path, "/a");

        let result = decoder.decode(&mut cursor, &mut sink, false).unwrap();
        assert!(result.header_completed);
        assert_eq!(decoder.request().unwrap().path, "/b");
        assert!(!decoder.is_closed());
    }

    #[test]
    fn chunked_trailers_are_merged_into_the_completed_header() {
        let mut decoder = HttpDecoder::new_response();
        decoder.set_peer_request(Some(PeerRequestInfo { is_head: false, is_connect: false }));
        let input = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nTrailer: X-Checksum\r\n\r\n5\r\nhello\r\n0\r\nX-Checksum: abc123\r\n\r\n";
        let (result, body) = decode_all(&mut decoder, input, 64);
        assert!(result.header_completed || !body.is_empty());
        assert_eq!(body, b"hello");
        let resp = decoder.response().unwrap();
        assert_eq!(resp.headers.get("X-Checksum"), Some("abc123"));
        assert_eq!(resp.headers.get_all("Trailer").count(), 2);
    }

    #[test]
    fn connection_close_in_request_closes_decoder() {
        let mut decoder = HttpDecoder::new_request();
        let input = b"GET / HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n";
        let mut cursor = Cursor::new(input);
        let mut out_buf = vec![0u8; 16];
        let mut sink = Sink::new(&mut out_buf);
        let result = decoder.decode(&mut cursor, &mut sink, false).unwrap();
        assert!(result.close_connection);
        assert!(decoder.is_closed());
    }
}
