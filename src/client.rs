//! The client engine (C6): binds a request encoder to a response decoder,
//! per spec.md §4.4 "client engine holds (request-encoder, response-decoder)".
//!
//! Grounded on the teacher's `client/client.rs`/`client/proto.rs` (the
//! `HttpClient`/`Proto` pair that sends one request and tracks the
//! response matching it) with the socket and `tokio_curl`-backed DNS
//! resolution stripped out entirely: the caller owns the connection and
//! drives `encode`/`decode` against its own buffers. What's kept is the
//! bookkeeping the teacher's `Proto` did for free by owning the request --
//! remembering whether it was `HEAD`/`CONNECT` so the response decoder can
//! disambiguate body framing (§4.1.3), and validating a `101` handshake
//! before trusting it (unlike the server side, an unrecognized upgrade
//! here is fatal, per §4.5).

use std::sync::Arc;

use log::debug;

use crate::buf::{Cursor, Sink};
use crate::decoder::{DecoderConfig, HttpDecoder, PeerRequestInfo};
use crate::encoder::{EncoderConfig, HttpEncoder};
use crate::error::ProtocolError;
use crate::message::RequestHead;
use crate::result::EncoderResult;
use crate::upgrade::UpgradeRegistry;
use crate::websocket::{FrameDecoder, FrameEncoder, WsDecoderResult};

/// Either an ordinary HTTP decode outcome, or (once the connection has
/// switched protocols) a WebSocket frame decode outcome.
#[derive(Debug)]
pub enum ClientDecode {
    Http(crate::result::DecoderResult),
    WebSocket(WsDecoderResult),
}

/// Drives one client-side HTTP/1.x connection: encodes the outgoing
/// request, decodes the matching response, and -- if that response is a
/// validated `101` -- installs a WebSocket frame codec pair in its place
/// (§4.4).
pub struct ClientEngine {
    registry: Arc<UpgradeRegistry>,
    encoder: HttpEncoder,
    decoder: HttpDecoder,
    max_frame_len: usize,
    ws: Option<(FrameDecoder, FrameEncoder)>,
    switched_to: Option<String>,
    current_request: Option<RequestHead>,
}

impl ClientEngine {
    pub fn new(registry: Arc<UpgradeRegistry>) -> ClientEngine {
        ClientEngine::with_config(registry, DecoderConfig::default(), EncoderConfig::default(), 16 * 1024 * 1024)
    }

    pub fn with_config(registry: Arc<UpgradeRegistry>, decoder_config: DecoderConfig, encoder_config: EncoderConfig, max_frame_len: usize) -> ClientEngine {
        ClientEngine {
            registry,
            encoder: HttpEncoder::new_request().with_config(encoder_config),
            decoder: HttpDecoder::with_max_header_length(false, decoder_config.max_header_length),
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

    /// Bytes the response decoder already pulled from some prior `decode`
    /// call's `input` but left unconsumed because they belong to the
    /// protocol just switched to, not the `101` response that requested
    /// the switch (P6) -- e.g. a server that writes its handshake
    /// response and first WebSocket frame in one go, both landing in the
    /// same read. Call this once after `decode()` reports a new
    /// `switched_to()`, and prepend the result to whatever `input` the
    /// next `decode()` call is given; by then it already routes to the
    /// installed codec.
    pub fn take_leftover_input(&mut self) -> Vec<u8> {
        self.decoder.take_leftover()
    }

    /// Stages `request` to be sent, and tells the response decoder what it
    /// needs to know about it (Design Notes §9's cyclic peer link) ahead
    /// of the response that will eventually arrive for it.
    pub fn encode_request(&mut self, request: &RequestHead, has_payload: bool) -> Result<(), ProtocolError> {
        self.current_request = Some(request.clone());
        self.decoder.set_peer_request(Some(PeerRequestInfo { is_head: request.method.is_head(), is_connect: request.method.is_connect() }));
        self.encoder.encode_request(request, has_payload)
    }

    pub fn encode(&mut self, input: Option<&mut Cursor>, output: &mut Sink, end_of_input: bool) -> Result<EncoderResult, ProtocolError> {
        self.encoder.encode(input, output, end_of_input)
    }

    /// Decodes whatever is available. A `101` response is validated
    /// against the request that solicited it (`check_switching_response`)
    /// before the WebSocket codec pair is installed; an unrecognized
    /// `Upgrade` protocol is a fatal error on the client side (§4.5),
    /// unlike the server, which may simply ignore it.
    pub fn decode(&mut self, input: &mut Cursor, output: &mut Sink, end_of_input: bool) -> Result<ClientDecode, ProtocolError> {
        if let Some((ws_decoder, _)) = &mut self.ws {
            let result = ws_decoder.decode(input, output).map_err(|e| ProtocolError::bad_request(e.to_string()))?;
            return Ok(ClientDecode::WebSocket(result));
        }

        let result = self.decoder.decode(input, output, end_of_input)?;
        if let Some(switch) = result.switch.as_ref() {
            let protocol = switch.protocol.clone();
            let handle = self.registry.find(&protocol).ok_or_else(|| {
                debug!("101 response named unregistered protocol {}", protocol);
                ProtocolError::upgrade_failed(format!("no upgrade provider registered for {}", protocol))
            })?;
            {
                let request = self.current_request.as_ref().ok_or_else(|| ProtocolError::upgrade_failed("101 response with no matching request"))?;
                let response = self.decoder.response().ok_or_else(|| ProtocolError::upgrade_failed("101 response missing after header completed"))?;
                handle.with(|p| p.check_switching_response(request, response))?;
            }
            debug!("switching connection to {}", protocol);
            let (dec, enc) = handle.with(|p| p.create_client_codec(self.max_frame_len));
            self.ws = Some((dec, enc));
            self.switched_to = Some(protocol);
        }
        Ok(ClientDecode::Http(result))
    }

    pub fn ws_encoder_mut(&mut self) -> Option<&mut FrameEncoder> {
        self.ws.as_mut().map(|(_, enc)| enc)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::method::Method;
    use crate::version::Version;
    use crate::upgrade::WebSocketProvider;

    fn registry() -> Arc<UpgradeRegistry> {
        Arc::new(UpgradeRegistry::with_defaults())
    }

    fn drain(engine: &mut ClientEngine) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let mut buf = vec![0u8; 256];
            let mut sink = Sink::new(&mut buf);
            let result = engine.encode(None, &mut sink, true).unwrap();
            out.extend_from_slice(&buf[..sink.position()]);
            if !result.overflow {
                break;
            }
        }
        out
    }

    #[test]
    fn get_request_round_trips_through_the_wire() {
        let mut engine = ClientEngine::new(registry());
        let mut request = RequestHead::new(Method::Get, "/", Version::Http11);
        request.headers.set("Host", "example.com");
        engine.encode_request(&request, false).unwrap();
        let wire = drain(&mut engine);
        let text = String::from_utf8(wire).unwrap();
        assert!(text.starts_with("GET / HTTP/1.1\r\n"));
        assert!(text.contains("Host: example.com"));
    }

    #[test]
    fn websocket_handshake_is_validated_and_installs_frame_codec() {
        let mut engine = ClientEngine::new(registry());
        let provider = WebSocketProvider;
        let mut request = RequestHead::new(Method::Get, "/chat", Version::Http11);
        provider.augment_initial_request(&mut request);
        request.headers.set("Host", "example.com");
        engine.encode_request(&request, false).unwrap();
        let _ = drain(&mut engine);

        let accept = crate::websocket::Accept::from_key_str(request.headers.get("Sec-WebSocket-Key").unwrap());
        let raw = format!(
            "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {}\r\n\r\n",
            accept.as_str()
        );
        let mut cursor = Cursor::new(raw.as_bytes());
        let mut out = vec![0u8; 16];
        let mut sink = Sink::new(&mut out);
        let result = engine.decode(&mut cursor, &mut sink, true).unwrap();
        assert!(matches!(result, ClientDecode::Http(r) if r.header_completed));
        assert_eq!(engine.switched_to(), Some("websocket"));
    }

    #[test]
    fn unknown_upgrade_protocol_is_fatal_on_the_client_side() {
        let mut engine = ClientEngine::new(registry());
        let mut request = RequestHead::new(Method::Get, "/chat", Version::Http11);
        request.headers.set("Host", "example.com");
        request.headers.set("Upgrade", "carrier-pigeon");
        engine.encode_request(&request, false).unwrap();
        let _ = drain(&mut engine);

        let raw = b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: carrier-pigeon\r\nConnection: Upgrade\r\n\r\n";
        let mut cursor = Cursor::new(&raw[..]);
        let mut out = vec![0u8; 16];
        let mut sink = Sink::new(&mut out);
        assert!(engine.decode(&mut cursor, &mut sink, true).is_err());
    }
}
