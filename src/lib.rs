//! A non-blocking, buffer-in/buffer-out HTTP/1.x codec, with in-band
//! upgrade to WebSocket (RFC 6455). This crate performs no I/O and owns
//! no sockets: every public entry point is a plain function over
//! caller-supplied byte slices, following the buffer contract below.
//!
//! # Buffer contract
//!
//! Every `decode`/`encode` call takes a [`buf::Cursor`] of input and a
//! [`buf::Sink`] of output and returns a tri-state result (C8,
//! [`result::DecoderResult`]/[`result::EncoderResult`]):
//!
//! - `underflow` -- more input is needed before further progress is
//!   possible; supply more bytes (or pass `end_of_input = true` once the
//!   peer has half-closed) and call again.
//! - `overflow` -- the output buffer filled up mid-call; drain it and
//!   call again with the same (or advanced) input.
//! - otherwise -- the call consumed everything it could from `input` and
//!   wrote everything it could to `output`; inspect `header_completed`/
//!   `close_connection`/`switch` for what happened.
//!
//! [`server::ServerEngine`] and [`client::ClientEngine`] (C6) are the
//! entry points most applications want: each pairs a decoder with an
//! encoder for one connection direction and performs the `101`-triggered
//! swap to a WebSocket frame codec automatically, consulting the
//! [`upgrade::UpgradeRegistry`] (C7).
#![recursion_limit = "100"]

#[macro_use]
extern crate quick_error;

pub mod buf;
mod charset;
mod chunked;
mod clock;
mod decoder;
mod encoder;
mod error;
mod headers;
mod message;
mod method;
mod result;
mod serializer;
mod status;
pub mod upgrade;
mod version;
pub mod websocket;

pub mod client;
pub mod server;

pub use clock::{Clock, FixedClock, SystemClock};
pub use decoder::{DecoderConfig, HttpDecoder, PeerRequestInfo};
pub use encoder::{EncoderConfig, HttpEncoder};
pub use error::{ErrorKind, ProtocolError};
pub use message::{FieldMap, RequestHead, ResponseHead};
pub use method::Method;
pub use result::{DecoderResult, EncoderResult, ProtocolSwitch};
pub use status::StatusCode;
pub use upgrade::{UpgradeProvider, UpgradeRegistry, WebSocketProvider};
pub use version::Version;

pub use client::{ClientDecode, ClientEngine};
pub use server::{ServerDecode, ServerEngine};
