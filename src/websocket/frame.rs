//! The WebSocket frame codec (C5), per spec.md §4.3 / RFC 6455 §5.
//!
//! Frame parsing/writing is carried directly from the teacher's
//! `websocket/zero_copy.rs` (`parse_frame`/`write_packet`/`write_close`),
//! generalized from "parse against one complete in-memory buffer" to
//! "parse incrementally against a caller cursor with an explicit state
//! enum" (`Header` -> `Payload`/`Control`, collapsing the spec's
//! `READING_HEADER`/`READING_LENGTH`/`READING_MASK` sub-states into one
//! accumulator-driven step the way `decoder.rs` collapses the HTTP
//! header sub-states into one `httparse` call) since the teacher's
//! version assumed the whole frame was already buffered.
//!
//! RFC 6455 §5.5.1 redesign flag: a close frame payload of exactly one
//! byte is a framing error here (`WsError::InvalidClosePayloadLength`),
//! where the teacher's `parse_frame` silently treated any payload
//! shorter than two bytes as "status 1006".

use log::trace;

use crate::buf::{Accumulator, Cursor, Sink};
use crate::charset;
use crate::websocket::error::WsError;
use crate::websocket::mask;

/// Which side of the connection this codec instance speaks for --
/// determines masking direction (RFC 6455 §5.1: clients mask, servers
/// never do).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// A completed (or in-progress) WebSocket frame header, per spec.md §3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameHeader {
    /// A data frame (text or binary). `fin` marks the end of the whole
    /// message, not just this frame -- a `false` means more continuation
    /// frames follow before the message is complete.
    Data { text: bool, fin: bool },
    Ping { app_data: Vec<u8> },
    Pong { app_data: Vec<u8> },
    Close { status: Option<u16>, reason: String },
    /// Decoder-internal: signals "this close was initiated by the peer;
    /// confirm it" -- never produced for a close the local side sent.
    CloseResponse { status: Option<u16> },
}

/// What the decoder wants the encoder to send back automatically, paired
/// with a `WsDecoderResult` carrying a `Ping`/`Close` `FrameHeader`.
#[derive(Debug, Clone)]
pub enum AutoResponse {
    Pong(Vec<u8>),
    Close(Option<u16>),
}

#[derive(Debug, Default)]
pub struct WsDecoderResult {
    pub overflow: bool,
    pub underflow: bool,
    /// Set once a frame (data or control) has been fully parsed. For
    /// `Data`, the payload bytes for *this* frame have already been
    /// written to `output`.
    pub frame: Option<FrameHeader>,
    /// Ping auto-response (pong with identical app-data, P7) or a
    /// close-response to a peer-initiated close.
    pub auto_response: Option<AutoResponse>,
}

impl WsDecoderResult {
    fn underflow() -> WsDecoderResult {
        WsDecoderResult { underflow: true, ..Default::default() }
    }

    fn overflow() -> WsDecoderResult {
        WsDecoderResult { overflow: true, ..Default::default() }
    }
}

#[derive(Debug, Clone, Copy)]
struct FrameMeta {
    fin: bool,
    opcode: u8,
    masked: bool,
    mask_key: [u8; 4],
    len: u64,
}

impl FrameMeta {
    fn is_control(&self) -> bool {
        self.opcode >= 8
    }
}

enum State {
    Header,
    Payload { meta: FrameMeta, consumed: u64 },
    Control { meta: FrameMeta, buf: Vec<u8> },
}

/// Parses a stream of WebSocket frames against a caller-supplied
/// input/output buffer pair, per the same non-blocking contract as
/// `HttpDecoder`.
pub struct FrameDecoder {
    expect_masked: bool,
    max_frame_len: usize,
    header_acc: Accumulator,
    state: State,
    /// Persists across continuation frames of one text message (P8); is
    /// only reset when that message's final frame (`fin = true`)
    /// completes, not by interleaved control frames.
    text_decoder: Option<charset::Decoder>,
    /// `Some(1)` / `Some(2)` while a text/binary message is still being
    /// assembled across continuation frames; `None` between messages.
    message_opcode: Option<u8>,
}

impl FrameDecoder {
    pub fn new(role_of_peer: Role, max_frame_len: usize) -> FrameDecoder {
        // A server decodes frames sent by a client (always masked); a
        // client decodes frames sent by a server (never masked).
        let expect_masked = matches!(role_of_peer, Role::Client);
        FrameDecoder {
            expect_masked,
            max_frame_len,
            header_acc: Accumulator::new(),
            state: State::Header,
            text_decoder: None,
            message_opcode: None,
        }
    }

    pub fn for_server(max_frame_len: usize) -> FrameDecoder {
        FrameDecoder::new(Role::Client, max_frame_len)
    }

    pub fn for_client(max_frame_len: usize) -> FrameDecoder {
        FrameDecoder::new(Role::Server, max_frame_len)
    }

    pub fn decode(&mut self, input: &mut Cursor, output: &mut Sink) -> Result<WsDecoderResult, WsError> {
        loop {
            if matches!(self.state, State::Header) {
                let Some(meta) = self.pull_header(input)? else {
                    return Ok(WsDecoderResult::underflow());
                };
                self.validate_frame_start(&meta)?;
                if meta.is_control() {
                    self.state = State::Control { meta, buf: Vec::with_capacity(meta.len as usize) };
                } else {
                    if meta.opcode != 0 {
                        self.message_opcode = Some(meta.opcode);
                        self.text_decoder = if meta.opcode == 1 { Some(charset::Decoder::utf8()) } else { None };
                    }
                    self.state = State::Payload { meta, consumed: 0 };
                }
                continue;
            }

            if matches!(self.state, State::Payload { .. }) {
                match self.drive_payload(input, output)? {
                    Some(result) => return Ok(result),
                    None => continue,
                }
            }

            match self.drive_control(input)? {
                Some(result) => return Ok(result),
                None => continue,
            }
        }
    }

    fn validate_frame_start(&self, meta: &FrameMeta) -> Result<(), WsError> {
        if meta.masked != self.expect_masked {
            return Err(WsError::MaskMismatch { expected: self.expect_masked });
        }
        if meta.len as usize > self.max_frame_len {
            return Err(WsError::FrameTooLarge(self.max_frame_len));
        }
        if !meta.is_control() {
            if meta.opcode == 0 && self.message_opcode.is_none() {
                return Err(WsError::ContinuationWithoutMessage);
            }
            if meta.opcode != 0 && self.message_opcode.is_some() {
                return Err(WsError::UnexpectedContinuation);
            }
        }
        Ok(())
    }

    /// Pulls exactly as many bytes as needed to determine (and then
    /// fully read) the next frame's header, resuming across calls via
    /// `self.header_acc`.
    fn pull_header(&mut self, input: &mut Cursor) -> Result<Option<FrameMeta>, WsError> {
        if !self.take_into_acc(input, 2) {
            return Ok(None);
        }
        let b1 = self.header_acc.as_slice()[1];
        let masked = b1 & 0x80 != 0;
        let len7 = b1 & 0x7F;
        let ext_len_bytes = match len7 {
            126 => 2,
            127 => 8,
            _ => 0,
        };
        let pre_mask_len = 2 + ext_len_bytes;
        if !self.take_into_acc(input, pre_mask_len) {
            return Ok(None);
        }
        let total_header = pre_mask_len + if masked { 4 } else { 0 };
        if !self.take_into_acc(input, total_header) {
            return Ok(None);
        }

        let bytes = self.header_acc.as_slice();
        let b0 = bytes[0];
        let fin = b0 & 0x80 != 0;
        let opcode = b0 & 0x0F;
        let len: u64 = match len7 {
            126 => u16::from_be_bytes([bytes[2], bytes[3]]) as u64,
            127 => u64::from_be_bytes(bytes[2..10].try_into().unwrap()),
            n => n as u64,
        };
        let mask_key = if masked {
            let m = &bytes[total_header - 4..total_header];
            [m[0], m[1], m[2], m[3]]
        } else {
            [0; 4]
        };
        self.header_acc.clear();

        if !matches!(opcode, 0 | 1 | 2 | 8 | 9 | 10) {
            return Err(WsError::InvalidOpcode(opcode));
        }
        let meta = FrameMeta { fin, opcode, masked, mask_key, len };
        if meta.is_control() {
            if !fin {
                return Err(WsError::FragmentedControlFrame);
            }
            if opcode == 8 && len == 1 {
                return Err(WsError::InvalidClosePayloadLength);
            }
        }
        Ok(Some(meta))
    }

    /// Grows `header_acc` to `target` bytes from `input`, returning
    /// `true` once it holds at least that many.
    fn take_into_acc(&mut self, input: &mut Cursor, target: usize) -> bool {
        if self.header_acc.len() >= target {
            return true;
        }
        let need = target - self.header_acc.len();
        let avail = input.remaining();
        let take = avail.len().min(need);
        self.header_acc.extend(&avail[..take]);
        input.advance(take);
        self.header_acc.len() >= target
    }

    fn drive_payload(&mut self, input: &mut Cursor, output: &mut Sink) -> Result<Option<WsDecoderResult>, WsError> {
        let State::Payload { meta, consumed } = &mut self.state else { unreachable!() };
        let meta = *meta;
        let remaining_in_frame = (meta.len - *consumed) as usize;

        if remaining_in_frame == 0 {
            let fin = meta.fin;
            let text = self.message_opcode == Some(1);
            if fin {
                self.message_opcode = None;
                self.text_decoder = None;
            }
            self.state = State::Header;
            return Ok(Some(WsDecoderResult { frame: Some(FrameHeader::Data { text, fin }), ..Default::default() }));
        }

        let avail = input.remaining();
        if avail.is_empty() {
            return Ok(Some(WsDecoderResult::underflow()));
        }

        let mut scratch = [0u8; 4096];
        let n = avail.len().min(remaining_in_frame).min(scratch.len());
        scratch[..n].copy_from_slice(&avail[..n]);
        if meta.masked {
            mask::apply(&mut scratch[..n], meta.mask_key, *consumed as usize);
        }

        if self.message_opcode == Some(1) {
            let decoder = self.text_decoder.as_mut().expect("text message always carries a decoder");
            let mut scratch_cursor = Cursor::new(&scratch[..n]);
            let last = meta.fin && n == remaining_in_frame;
            let outcome = decoder.decode_to_sink(&mut scratch_cursor, output, last);
            let used = scratch_cursor.position();
            input.advance(used);
            *consumed += used as u64;
            if matches!(outcome, charset::DecodeOutcome::OutputFull) {
                return Ok(Some(WsDecoderResult::overflow()));
            }
            if used == 0 {
                return Ok(Some(WsDecoderResult::overflow()));
            }
        } else {
            if output.is_full() {
                return Ok(Some(WsDecoderResult::overflow()));
            }
            let can = n.min(output.remaining());
            output.write(&scratch[..can]);
            input.advance(can);
            *consumed += can as u64;
            if can < n {
                return Ok(Some(WsDecoderResult::overflow()));
            }
        }
        Ok(None)
    }

    fn drive_control(&mut self, input: &mut Cursor) -> Result<Option<WsDecoderResult>, WsError> {
        let State::Control { meta, buf } = &mut self.state else { unreachable!() };
        let meta = *meta;
        while (buf.len() as u64) < meta.len {
            let avail = input.remaining();
            if avail.is_empty() {
                return Ok(Some(WsDecoderResult::underflow()));
            }
            let need = (meta.len as usize) - buf.len();
            let take = avail.len().min(need);
            let start = buf.len();
            buf.extend_from_slice(&avail[..take]);
            if meta.masked {
                mask::apply(&mut buf[start..], meta.mask_key, start);
            }
            input.advance(take);
        }

        let payload = std::mem::take(buf);
        self.state = State::Header;
        match meta.opcode {
            9 => {
                trace!("received ping ({} bytes)", payload.len());
                Ok(Some(WsDecoderResult {
                    frame: Some(FrameHeader::Ping { app_data: payload.clone() }),
                    auto_response: Some(AutoResponse::Pong(payload)),
                    ..Default::default()
                }))
            }
            10 => {
                trace!("received pong ({} bytes)", payload.len());
                Ok(Some(WsDecoderResult { frame: Some(FrameHeader::Pong { app_data: payload }), ..Default::default() }))
            }
            8 => {
                let (status, reason) = parse_close_payload(&payload)?;
                trace!("peer closed [{:?}] {:?}", status, reason);
                Ok(Some(WsDecoderResult {
                    frame: Some(FrameHeader::Close { status, reason }),
                    auto_response: Some(AutoResponse::Close(status)),
                    ..Default::default()
                }))
            }
            _ => unreachable!("non-control opcode routed to drive_control"),
        }
    }
}

fn parse_close_payload(payload: &[u8]) -> Result<(Option<u16>, String), WsError> {
    if payload.is_empty() {
        return Ok((None, String::new()));
    }
    // len == 1 is already rejected in `pull_header`.
    let status = u16::from_be_bytes([payload[0], payload[1]]);
    let reason = std::str::from_utf8(&payload[2..])?;
    Ok((Some(status), reason.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeOutcome {
    Overflow,
    Underflow,
    Done,
}

enum EncodeState {
    Idle,
    /// Draining an already-rendered frame (header + payload in one
    /// accumulator) -- used for control frames, whose payload is always
    /// known upfront and small (<= 125 bytes).
    DrainingWhole { block: Accumulator, drained: usize },
    /// Streaming a data frame's header, then its payload straight from
    /// the caller's input cursor.
    DrainingHeader { block: Accumulator, drained: usize, payload_len: usize, masked: bool, mask_key: [u8; 4] },
    DrainingPayload { remaining: usize, masked: bool, mask_key: [u8; 4], consumed_for_mask: usize },
}

/// Writes WebSocket frames into a caller-supplied output buffer.
pub struct FrameEncoder {
    role: Role,
    mask_output: Option<bool>,
    state: EncodeState,
    in_message: bool,
    pending_opcode: Option<u8>,
}

impl FrameEncoder {
    pub fn new(role: Role) -> FrameEncoder {
        FrameEncoder { role, mask_output: None, state: EncodeState::Idle, in_message: false, pending_opcode: None }
    }

    /// The `mask-output` engine knob (spec.md §6): overrides the
    /// role-derived masking default (RFC 6455 §5.1: clients mask, servers
    /// don't). Only a test harness simulating the non-conforming peer
    /// should ever need this.
    pub fn with_mask_output(role: Role, mask_output: bool) -> FrameEncoder {
        FrameEncoder { role, mask_output: Some(mask_output), state: EncodeState::Idle, in_message: false, pending_opcode: None }
    }

    fn masks(&self) -> bool {
        self.mask_output.unwrap_or_else(|| matches!(self.role, Role::Client))
    }

    fn fresh_mask_key(&self) -> [u8; 4] {
        if self.masks() {
            let mut key = [0u8; 4];
            rand::Rng::fill(&mut rand::thread_rng(), &mut key);
            key
        } else {
            [0; 4]
        }
    }

    /// Begins a data frame (text or binary on the first call of a
    /// message; continuation on subsequent calls of the same message).
    /// Call `write` afterward to stream the payload.
    pub fn start_data_frame(&mut self, text: bool) {
        let opcode = if self.in_message { 0 } else if text { 1 } else { 2 };
        self.in_message = true;
        self.state = EncodeState::Idle;
        self.pending_opcode = Some(opcode);
    }

    /// Streams `input` as the current data frame's payload. `end_of_input`
    /// marks FIN for this frame -- per spec.md §4.3.2, FIN also marks
    /// the end of the whole message.
    pub fn write(&mut self, input: &mut Cursor, output: &mut Sink, end_of_input: bool) -> Result<EncodeOutcome, WsError> {
        loop {
            if matches!(self.state, EncodeState::Idle) {
                let opcode = self.pending_opcode.take().unwrap_or(0);
                let avail_len = input.remaining().len();
                if avail_len == 0 && !end_of_input {
                    return Ok(EncodeOutcome::Underflow);
                }
                let masked = self.masks();
                let mask_key = self.fresh_mask_key();
                let mut block = Accumulator::new();
                write_frame_header(&mut block, end_of_input, opcode, masked, mask_key, avail_len);
                if end_of_input {
                    self.in_message = false;
                }
                self.state = EncodeState::DrainingHeader { block, drained: 0, payload_len: avail_len, masked, mask_key };
                continue;
            }

            if let EncodeState::DrainingHeader { block, drained, payload_len, masked, mask_key } = &mut self.state {
                let remaining = &block.as_slice()[*drained..];
                if !remaining.is_empty() {
                    if output.is_full() {
                        return Ok(EncodeOutcome::Overflow);
                    }
                    let written = output.write(remaining);
                    *drained += written;
                    if written < remaining.len() {
                        return Ok(EncodeOutcome::Overflow);
                    }
                }
                let payload_len = *payload_len;
                let masked = *masked;
                let mask_key = *mask_key;
                self.state = EncodeState::DrainingPayload { remaining: payload_len, masked, mask_key, consumed_for_mask: 0 };
                continue;
            }

            if let EncodeState::DrainingPayload { remaining, masked, mask_key, consumed_for_mask } = &mut self.state {
                if *remaining == 0 {
                    self.state = EncodeState::Idle;
                    return Ok(EncodeOutcome::Done);
                }
                let avail = input.remaining();
                if avail.is_empty() {
                    return Ok(EncodeOutcome::Underflow);
                }
                if output.is_full() {
                    return Ok(EncodeOutcome::Overflow);
                }
                let n = avail.len().min(*remaining).min(output.remaining()).min(4096);
                let mut scratch = [0u8; 4096];
                scratch[..n].copy_from_slice(&avail[..n]);
                if *masked {
                    mask::apply(&mut scratch[..n], *mask_key, *consumed_for_mask);
                }
                output.write(&scratch[..n]);
                input.advance(n);
                *remaining -= n;
                *consumed_for_mask += n;
                continue;
            }

            unreachable!("control frame state used in data write()");
        }
    }

    /// One-shot control frame (ping/pong/close): payload is bounded at
    /// 125 bytes and known upfront, so it's rendered and drained as one
    /// block rather than streamed.
    pub fn encode_control(&mut self, opcode: u8, payload: &[u8], output: &mut Sink) -> Result<EncodeOutcome, WsError> {
        debug_assert!(payload.len() <= 125);
        if !matches!(self.state, EncodeState::DrainingWhole { .. }) {
            let mask_key = self.fresh_mask_key();
            let mut block = Accumulator::new();
            write_frame_header(&mut block, true, opcode, self.masks(), mask_key, payload.len());
            if self.masks() {
                let mut masked = payload.to_vec();
                mask::apply(&mut masked, mask_key, 0);
                block.extend(&masked);
            } else {
                block.extend(payload);
            }
            self.state = EncodeState::DrainingWhole { block, drained: 0 };
        }
        let EncodeState::DrainingWhole { block, drained } = &mut self.state else { unreachable!() };
        let remaining = &block.as_slice()[*drained..];
        if remaining.is_empty() {
            self.state = EncodeState::Idle;
            return Ok(EncodeOutcome::Done);
        }
        if output.is_full() {
            return Ok(EncodeOutcome::Overflow);
        }
        let written = output.write(remaining);
        *drained += written;
        if *drained >= block.len() {
            self.state = EncodeState::Idle;
            Ok(EncodeOutcome::Done)
        } else {
            Ok(EncodeOutcome::Overflow)
        }
    }

    pub fn encode_close(&mut self, status: Option<u16>, reason: &str, output: &mut Sink) -> Result<EncodeOutcome, WsError> {
        let mut payload = Vec::new();
        if let Some(status) = status {
            payload.extend_from_slice(&status.to_be_bytes());
            payload.extend_from_slice(reason.as_bytes());
        }
        self.encode_control(0x8, &payload, output)
    }
}

fn write_frame_header(block: &mut Accumulator, fin: bool, opcode: u8, masked: bool, mask_key: [u8; 4], len: usize) {
    let first_byte = (if fin { 0x80 } else { 0 }) | opcode;
    let mask_bit = if masked { 0x80 } else { 0 };
    match len {
        0..=125 => block.extend(&[first_byte, (len as u8) | mask_bit]),
        126..=65535 => {
            block.extend(&[first_byte, 126 | mask_bit]);
            block.extend(&(len as u16).to_be_bytes());
        }
        _ => {
            block.extend(&[first_byte, 127 | mask_bit]);
            block.extend(&(len as u64).to_be_bytes());
        }
    }
    if masked {
        block.extend(&mask_key);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unmasked_text_frame_round_trip() {
        let mut encoder = FrameEncoder::new(Role::Server);
        let mut out = vec![0u8; 64];
        let mut sink = Sink::new(&mut out);
        encoder.start_data_frame(true);
        let mut input = Cursor::new(b"hello");
        let outcome = encoder.write(&mut input, &mut sink, true).unwrap();
        assert_eq!(outcome, EncodeOutcome::Done);
        let wire = &out[..sink.position()];

        let mut decoder = FrameDecoder::for_client(1 << 20);
        let mut dec_cursor = Cursor::new(wire);
        let mut dec_out = vec![0u8; 64];
        let mut dec_sink = Sink::new(&mut dec_out);
        let result = decoder.decode(&mut dec_cursor, &mut dec_sink).unwrap();
        assert_eq!(result.frame, Some(FrameHeader::Data { text: true, fin: true }));
        assert_eq!(&dec_out[..dec_sink.position()], b"hello");
    }

    #[test]
    fn ping_elicits_pong_with_identical_data() {
        let mut encoder = FrameEncoder::new(Role::Client);
        let mut out = vec![0u8; 64];
        let mut sink = Sink::new(&mut out);
        encoder.encode_control(0x9, b"abc", &mut sink).unwrap();
        let wire = out[..sink.position()].to_vec();

        let mut decoder = FrameDecoder::for_server(1 << 20);
        let mut dec_cursor = Cursor::new(&wire);
        let mut dec_out = vec![0u8; 16];
        let mut dec_sink = Sink::new(&mut dec_out);
        let result = decoder.decode(&mut dec_cursor, &mut dec_sink).unwrap();
        assert_eq!(result.frame, Some(FrameHeader::Ping { app_data: b"abc".to_vec() }));
        match result.auto_response {
            Some(AutoResponse::Pong(data)) => assert_eq!(data, b"abc"),
            other => panic!("expected pong auto-response, got {:?}", other),
        }
    }

    #[test]
    fn masked_close_frame_with_status_and_reason() {
        let mut encoder = FrameEncoder::new(Role::Client);
        let mut out = vec![0u8; 64];
        let mut sink = Sink::new(&mut out);
        encoder.encode_close(Some(258), "Hello", &mut sink).unwrap();
        let wire = out[..sink.position()].to_vec();

        let mut decoder = FrameDecoder::for_server(1 << 20);
        let mut dec_cursor = Cursor::new(&wire);
        let mut dec_out = vec![0u8; 16];
        let mut dec_sink = Sink::new(&mut dec_out);
        let result = decoder.decode(&mut dec_cursor, &mut dec_sink).unwrap();
        match result.frame {
            Some(FrameHeader::Close { status: Some(258), ref reason }) => assert_eq!(reason, "Hello"),
            other => panic!("expected close(258, Hello), got {:?}", other),
        }
        match result.auto_response {
            Some(AutoResponse::Close(Some(258))) => {}
            other => panic!("expected close auto-response with status 258, got {:?}", other),
        }
    }

    #[test]
    fn close_payload_of_one_byte_is_a_framing_error() {
        let mut decoder = FrameDecoder::for_server(1 << 20);
        let frame = [0x88u8, 0x81, 0, 0, 0, 0, 0x05];
        let mut cursor = Cursor::new(&frame);
        let mut out = vec![0u8; 16];
        let mut sink = Sink::new(&mut out);
        assert!(decoder.decode(&mut cursor, &mut sink).is_err());
    }

    #[test]
    fn invalid_opcode_is_rejected() {
        let mut decoder = FrameDecoder::for_server(1 << 20);
        let frame = [0x83u8, 0x80, 0, 0, 0, 0];
        let mut cursor = Cursor::new(&frame);
        let mut out = vec![0u8; 16];
        let mut sink = Sink::new(&mut out);
        assert!(matches!(decoder.decode(&mut cursor, &mut sink), Err(WsError::InvalidOpcode(3))));
    }

    #[test]
    fn fragmented_text_message_across_three_frames() {
        let text: String = "x".repeat(256);
        let parts = [&text[..100], &text[100..200], &text[200..]];

        let mut encoder = FrameEncoder::new(Role::Server);
        let mut wire = Vec::new();
        for (i, part) in parts.iter().enumerate() {
            let mut out = vec![0u8; 512];
            let mut sink = Sink::new(&mut out);
            if i == 0 {
                encoder.start_data_frame(true);
            } else {
                encoder.start_data_frame(true); // opcode auto-demotes to continuation via in_message
            }
            let mut input = Cursor::new(part.as_bytes());
            let last = i == parts.len() - 1;
            encoder.write(&mut input, &mut sink, last).unwrap();
            wire.extend_from_slice(&out[..sink.position()]);
        }

        let mut decoder = FrameDecoder::for_client(1 << 20);
        let mut collected = Vec::new();
        let mut offset = 0;
        while offset < wire.len() {
            let mut cursor = Cursor::new(&wire[offset..(offset + 100).min(wire.len())]);
            let mut out = vec![0u8; 100];
            loop {
                let mut sink = Sink::new(&mut out);
                let result = decoder.decode(&mut cursor, &mut sink).unwrap();
                collected.extend_from_slice(&out[..sink.position()]);
                if result.underflow {
                    break;
                }
            }
            offset += cursor.position().max(1);
        }
        assert_eq!(String::from_utf8(collected).unwrap(), text);
    }
}
