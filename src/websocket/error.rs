//! WebSocket protocol errors (RFC 6455 §5), carried over from the
//! teacher's `websocket/error.rs` `ErrorEnum` but trimmed to the cases
//! the non-blocking frame codec can actually discover -- the teacher's
//! variants for socket/channel plumbing (`Io`, `Timeout`, `Closed`,
//! `Custom`) have no counterpart here since this crate does no I/O.

use std::str::Utf8Error;

use quick_error::quick_error;

quick_error! {
    #[derive(Debug)]
    pub enum WsError {
        /// Frame opcode is not one of continuation/text/binary/close/ping/pong.
        InvalidOpcode(code: u8) {
            display("invalid WebSocket opcode: {}", code)
        }
        /// A text frame's payload (or the reason text of a close frame)
        /// isn't valid UTF-8.
        InvalidUtf8(err: Utf8Error) {
            display("invalid UTF-8 in WebSocket frame: {}", err)
            from()
        }
        /// A data frame arrived with FIN=0 immediately followed by
        /// another *new* data frame (opcode != continuation) instead of
        /// a continuation frame -- RFC 6455 §5.4.
        UnexpectedContinuation {
            display("data frame started before the previous message's continuation completed")
        }
        ContinuationWithoutMessage {
            display("continuation frame received with no message in progress")
        }
        /// A control frame (close/ping/pong) was fragmented; RFC 6455
        /// §5.5 forbids this.
        FragmentedControlFrame {
            display("control frames must not be fragmented")
        }
        /// Declared payload length exceeds the configured frame-size limit.
        FrameTooLarge(limit: usize) {
            display("frame payload exceeds the {}-byte limit", limit)
        }
        /// A close frame's payload is exactly one byte -- per the
        /// redesign flag applied to RFC 6455 §5.5.1: this is a framing
        /// error, not "close with no status".
        InvalidClosePayloadLength {
            display("close frame payload must be 0 or >= 2 bytes")
        }
        /// A frame that should have been masked (client-to-server)
        /// wasn't, or vice versa.
        MaskMismatch { expected: bool } {
            display("expected masked={}", expected)
        }
    }
}
