//! The tri-state decoder/encoder outcome (C8).
//!
//! Every `decode`/`encode` call returns one of these instead of throwing;
//! the caller inspects `overflow`/`underflow`/`close_connection` to decide
//! what to do next (drain output, supply more input, or tear the
//! connection down). See the buffer contract in the crate root docs.

use crate::message::ResponseHead;

/// A staged protocol switch, attached to the result that announced it.
///
/// Per the engine's swap invariant (P6), the codecs named here are not
/// yet active when this result is returned -- they become active on the
/// very next `encode`/`decode` call made through the owning engine.
#[derive(Debug)]
pub struct ProtocolSwitch {
    pub protocol: String,
}

/// Outcome of a `Decoder::decode` call.
#[derive(Debug, Default)]
pub struct DecoderResult {
    /// The output buffer is full; drain it and call again with the same
    /// (or advanced) input.
    pub overflow: bool,
    /// More input is needed to make progress.
    pub underflow: bool,
    /// The connection should be closed after any `response` is sent.
    pub close_connection: bool,
    /// A full header (request or response) has just been assembled; fetch
    /// it via `header()`/`request()`/`response()` on the decoder.
    pub header_completed: bool,
    /// A response the caller must send verbatim -- a synthesized error
    /// page, a `100 Continue`, or (for the WebSocket decoder) an
    /// auto-generated pong/close-response.
    pub response: Option<ResponseHead>,
    /// When `response` is set: if true, this response is the entire
    /// intent of the result and no further decoding is needed for the
    /// current message (e.g. a framing error). If false, the response is
    /// informational (e.g. `100 Continue`) and decoding continues.
    pub response_only: bool,
    /// Set on the response decoder when a `101` handshake for a known
    /// protocol has just been observed and validated.
    pub switch: Option<ProtocolSwitch>,
}

impl DecoderResult {
    pub fn underflow() -> DecoderResult {
        DecoderResult { underflow: true, ..Default::default() }
    }

    pub fn overflow() -> DecoderResult {
        DecoderResult { overflow: true, ..Default::default() }
    }

    pub fn header_completed() -> DecoderResult {
        DecoderResult { header_completed: true, ..Default::default() }
    }
}

/// Outcome of an `Encoder::encode` call.
#[derive(Debug, Default)]
pub struct EncoderResult {
    /// The output buffer is full; drain it and call again.
    pub overflow: bool,
    /// The caller has more body data to supply before the encoder can make
    /// further progress (e.g. pending-data buffer is full, see §4.2.4).
    pub underflow: bool,
    /// The connection must be closed once this result's bytes are sent.
    pub close_connection: bool,
    /// Set on the last successful (not overflow, not underflow) `encode`
    /// call of a `101` response whose upgrade provider accepted the
    /// switch.
    pub switch: Option<ProtocolSwitch>,
}

impl EncoderResult {
    pub fn underflow() -> EncoderResult {
        EncoderResult { underflow: true, ..Default::default() }
    }

    pub fn overflow() -> EncoderResult {
        EncoderResult { overflow: true, ..Default::default() }
    }

    pub fn done() -> EncoderResult {
        EncoderResult::default()
    }
}
