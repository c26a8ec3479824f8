//! The server engine (C6): binds a request decoder to a response encoder,
//! per spec.md §4.4 "server engine holds (request-decoder, response-encoder)".
//!
//! Grounded on the teacher's `server/proto.rs` (the `Proto` state machine
//! that drives one connection's request/response cycle end to end) but
//! with no socket, no `Dispatcher` callback, and no `Body` future: the
//! caller drives `decode`/`encode` directly against its own buffers, and
//! the engine's only job is the bookkeeping `Proto` used to do for free by
//! owning the socket -- remembering whether the request in flight was a
//! `HEAD`, propagating `Connection: close`, and performing the
//! `101`-triggered codec swap (§4.4, P6).

use std::sync::Arc;

use log::debug;

use crate::buf::{Cursor, Sink};
use crate::decoder::{DecoderConfig, HttpDecoder};
use crate::encoder::{EncoderConfig, HttpEncoder};
use crate::error::ProtocolError;
use crate::headers::util;
use crate::message::{RequestHead, ResponseHead};
use crate::result::DecoderResult;
use crate::upgrade::UpgradeRegistry;
use crate::websocket::{FrameDecoder, FrameEncoder, WsDecoderResult};

/// Either an ordinary HTTP decode outcome, or (once the connection has
/// switched protocols) a WebSocket frame decode outcome.
#[derive(Debug)]
pub enum ServerDecode {
    Http(DecoderResult),
    WebSocket(WsDecoderResult),
}

/// Drives one server-side HTTP/1.x connection: decodes requests, tracks
/// what each one needs from the matching response, and encodes responses.
/// Installs a WebSocket frame codec pair in place of the HTTP pair the
/// moment a `101` response it encoded finishes draining (§4.4).
pub struct ServerEngine {
    registry: Arc<UpgradeRegistry>,
    decoder: HttpDecoder,
    encoder: HttpEncoder,
    max_frame_len: usize,
    ws: Option<(FrameDecoder, FrameEncoder)>,
    switched_to: Option<String>,
    /// The request currently being answered, so `encode_response` can
    /// apply the `HEAD`/`Connection: close` fixups of §4.1.3/§4.1.7
    /// without the caller threading them through by hand.
    current_request: Option<RequestHead>,
}

impl ServerEngine {
    pub fn new(registry: Arc<UpgradeRegistry>) -> ServerEngine {
        ServerEngine::with_config(registry, DecoderConfig::default(), EncoderConfig::default(), 16 * 1024 * 1024)
    }

    pub fn with_config(registry: Arc<UpgradeRegistry>, decoder_config: DecoderConfig, encoder_config: EncoderConfig, max_frame_len: usize) -> ServerEngine {
        ServerEngine {
            registry,
            decoder: HttpDecoder::with_max_header_length(true, decoder_config.max_header_length),
            encoder: HttpEncoder::new_response().with_config(encoder_config),
            max_frame_len,
            ws: None,
            switched_to: None,
            current_request: None,
        }
    }

    pub fn current_request(&self) -> Option<&RequestHead> {
        self.current_request.as_ref()
    }

    pub fn switched_to(&self) -> Option<&str> {
        self.switched_to.as_deref()
    }

    /// Bytes the request decoder already pulled from some prior `decode`
    /// call's `input` but left unconsumed because they belong to the
    /// protocol just switched to, not the HTTP request that requested the
    /// switch (P6) -- e.g. a client that writes its handshake request and
    /// first WebSocket frame in one go, both landing in the same read.
    /// Call this once after `encode()` reports `switched_to()`, and
    /// prepend the result to whatever `input` the next `decode()` call is
    /// given; by then it already routes to the installed codec.
    pub fn take_leftover_input(&mut self) -> Vec<u8> {
        self.decoder.take_leftover()
    }

    /// Decodes whatever is available. Once a request header completes,
    /// it is cloned into `current_request` so `encode_response` can see
    /// it even after the decoder has moved on to a pipelined successor.
    pub fn decode(&mut self, input: &mut Cursor, output: &mut Sink, end_of_input: bool) -> Result<ServerDecode, ProtocolError> {
        if let Some((ws_decoder, _)) = &mut self.ws {
            let result = ws_decoder.decode(input, output).map_err(|e| ProtocolError::bad_request(e.to_string()))?;
            return Ok(ServerDecode::WebSocket(result));
        }
        let result = self.decoder.decode(input, output, end_of_input)?;
        if result.header_completed {
            self.current_request = self.decoder.request().cloned();
        }
        Ok(ServerDecode::Http(result))
    }

    /// Stages the response to `self.current_request()`. `switch`, when
    /// `Some`, names an upgrade provider whose `augment_initial_response`
    /// has already been applied to `response`'s headers by the caller
    /// (§4.2.3); on this response's final successful `encode` call the
    /// engine installs that provider's codec pair (§4.4).
    pub fn encode_response(&mut self, response: &ResponseHead, has_payload: bool, switch: Option<&str>) -> Result<(), ProtocolError> {
        let mut response = response.clone();
        let is_head = if let Some(request) = &self.current_request {
            if util::list_contains_any(request.headers.get_all("Connection"), "close") {
                response.headers.set("Connection", "close");
            }
            request.method.is_head()
        } else {
            false
        };
        if is_head {
            let content_length = response.headers.get("Content-Length").and_then(|v| v.parse().ok());
            self.encoder.encode_head_response(&response, content_length, switch.map(|s| s.to_string()))
        } else {
            self.encoder.encode_response(&response, has_payload, switch.map(|s| s.to_string()))
        }
    }

    /// Streams response bytes, performing the protocol swap (§4.4, P6) the
    /// call after a `101` response whose switch this engine staged has
    /// finished draining.
    pub fn encode(&mut self, input: Option<&mut Cursor>, output: &mut Sink, end_of_input: bool) -> Result<(), ProtocolError> {
        let result = self.encoder.encode(input, output, end_of_input)?;
        if let Some(switch) = result.switch {
            if let Some(handle) = self.registry.find(&switch.protocol) {
                debug!("switching connection to {}", switch.protocol);
                let (dec, enc) = handle.with(|p| p.create_server_codec(self.max_frame_len));
                self.ws = Some((dec, enc));
                self.switched_to = Some(switch.protocol);
            } else {
                debug!("101 response named unregistered protocol {}, leaving HTTP codec in place", switch.protocol);
            }
        }
        Ok(())
    }

    pub fn ws_encoder_mut(&mut self) -> Option<&mut FrameEncoder> {
        self.ws.as_mut().map(|(_, enc)| enc)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::method::Method;
    use crate::status::StatusCode;
    use crate::upgrade::WebSocketProvider;
    use crate::version::Version;

    fn registry() -> Arc<UpgradeRegistry> {
        Arc::new(UpgradeRegistry::with_defaults())
    }

    #[test]
    fn head_request_suppresses_body_bytes() {
        let mut engine = ServerEngine::new(registry());
        let mut cursor = Cursor::new(b"HEAD / HTTP/1.1\r\nHost: x\r\n\r\n");
        let mut discard = vec![0u8; 256];
        let mut sink = Sink::new(&mut discard);
        let result = engine.decode(&mut cursor, &mut sink, true).unwrap();
        assert!(matches!(result, ServerDecode::Http(r) if r.header_completed));
        assert_eq!(engine.current_request().unwrap().method, Method::Head);

        let mut response = ResponseHead::new(Version::Http11, StatusCode::OK);
        response.headers.set("Content-Length", "12");
        engine.encode_response(&response, false, None).unwrap();

        let mut out = vec![0u8; 256];
        let mut out_sink = Sink::new(&mut out);
        engine.encode(None, &mut out_sink, true).unwrap();
        let text = String::from_utf8(out[..out_sink.position()].to_vec()).unwrap();
        assert!(text.contains("Content-Length: 12"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn close_in_request_propagates_to_response() {
        let mut engine = ServerEngine::new(registry());
        let mut cursor = Cursor::new(b"GET / HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n");
        let mut discard = vec![0u8; 256];
        let mut sink = Sink::new(&mut discard);
        engine.decode(&mut cursor, &mut sink, true).unwrap();

        let response = ResponseHead::new(Version::Http11, StatusCode::OK);
        engine.encode_response(&response, false, None).unwrap();
        let mut out = vec![0u8; 256];
        let mut out_sink = Sink::new(&mut out);
        engine.encode(None, &mut out_sink, true).unwrap();
        let text = String::from_utf8(out[..out_sink.position()].to_vec()).unwrap();
        assert!(text.contains("Connection: close"));
    }

    #[test]
    fn websocket_upgrade_installs_frame_codec() {
        let mut engine = ServerEngine::new(registry());
        let provider = WebSocketProvider;
        let mut handshake_request = RequestHead::new(Method::Get, "/chat", Version::Http11);
        provider.augment_initial_request(&mut handshake_request);
        handshake_request.headers.set("Host", "x");
        let raw = format!(
            "GET /chat HTTP/1.1\r\nHost: x\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Key: {}\r\nSec-WebSocket-Version: 13\r\n\r\n",
            handshake_request.headers.get("Sec-WebSocket-Key").unwrap()
        );
        let mut cursor = Cursor::new(raw.as_bytes());
        let mut discard = vec![0u8; 16];
        let mut sink = Sink::new(&mut discard);
        let result = engine.decode(&mut cursor, &mut sink, true).unwrap();
        assert!(matches!(result, ServerDecode::Http(r) if r.header_completed));

        let decoded_request = engine.current_request().unwrap().clone();
        let mut response = ResponseHead::new(Version::Http11, StatusCode::SWITCHING_PROTOCOLS);
        provider.augment_initial_response(&decoded_request, &mut response).unwrap();
        engine.encode_response(&response, false, Some("websocket")).unwrap();

        let mut out = vec![0u8; 256];
        let mut out_sink = Sink::new(&mut out);
        engine.encode(None, &mut out_sink, true).unwrap();
        assert_eq!(engine.switched_to(), Some("websocket"));
        assert!(engine.ws_encoder_mut().is_some());
    }
}
