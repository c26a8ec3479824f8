//! WebSocket framing (RFC 6455), layered on top of the HTTP/1.1 upgrade
//! handshake in [`crate::upgrade`].

mod error;
mod frame;
mod keys;
mod mask;

pub use self::error::WsError;
pub use self::frame::{AutoResponse, EncodeOutcome, FrameDecoder, FrameEncoder, FrameHeader, Role, WsDecoderResult};
pub use self::keys::{Accept, Key};
