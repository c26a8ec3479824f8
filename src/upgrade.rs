//! Upgrade provider registry (C7), per spec.md §4.5.
//!
//! New relative to the teacher -- `tk-http` has no protocol-upgrade
//! concept at all; WebSocket support there is wired up by hand in each
//! application (`server/websocket.rs`). Grounded on that file for what a
//! provider's handshake hooks must actually do (validate
//! `Sec-WebSocket-Key`, compute and set `Sec-WebSocket-Accept`) and on
//! `websocket/keys.rs` for the digest itself.
//!
//! The registry is specialized to the WebSocket frame codec rather than
//! a fully generic `Box<dyn Any>` factory: this crate ships exactly one
//! provider, and a generic factory would buy pluggability this exercise
//! never exercises. A second provider would need the factory methods
//! generalized to an associated codec type; noted in DESIGN.md.

use std::sync::RwLock;

use log::debug;

use crate::error::ProtocolError;
use crate::message::{RequestHead, ResponseHead};
use crate::websocket::{Accept, FrameDecoder, FrameEncoder, Key, Role as WsRole};

/// A pluggable protocol-switch handshake, per spec.md §4.5.
pub trait UpgradeProvider: Send + Sync {
    /// The `Upgrade` header token this provider handles, e.g. `"websocket"`.
    fn protocol_name(&self) -> &str;

    fn supports_protocol(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case(self.protocol_name())
    }

    /// Client-side: add handshake headers (key, version) to the request
    /// about to be sent.
    fn augment_initial_request(&self, request: &mut RequestHead);

    /// Server-side: validate the handshake request headers and set the
    /// response headers that complete it (e.g. `Sec-WebSocket-Accept`).
    /// The caller demotes the response to `400 Bad Request` on `Err`.
    fn augment_initial_response(&self, request: &RequestHead, response: &mut ResponseHead) -> Result<(), ProtocolError>;

    /// Client-side: verify the server actually accepted the handshake it
    /// was asked to perform.
    fn check_switching_response(&self, request: &RequestHead, response: &ResponseHead) -> Result<(), ProtocolError>;

    fn create_server_codec(&self, max_frame_len: usize) -> (FrameDecoder, FrameEncoder);
    fn create_client_codec(&self, max_frame_len: usize) -> (FrameDecoder, FrameEncoder);
}

/// The WebSocket upgrade provider the core ships (spec.md §6 "the core
/// ships a WebSocket provider").
#[derive(Debug, Default)]
pub struct WebSocketProvider;

const SEC_WEBSOCKET_VERSION: &str = "13";

impl UpgradeProvider for WebSocketProvider {
    fn protocol_name(&self) -> &str {
        "websocket"
    }

    fn augment_initial_request(&self, request: &mut RequestHead) {
        request.headers.set("Upgrade", "websocket");
        set_connection_token(request, "Upgrade");
        request.headers.set("Sec-WebSocket-Key", Key::new().to_string());
        request.headers.set("Sec-WebSocket-Version", SEC_WEBSOCKET_VERSION);
    }

    fn augment_initial_response(&self, request: &RequestHead, response: &mut ResponseHead) -> Result<(), ProtocolError> {
        let client_key = request.headers.get("Sec-WebSocket-Key").ok_or_else(|| {
            debug!("handshake request missing Sec-WebSocket-Key");
            ProtocolError::upgrade_failed("missing Sec-WebSocket-Key")
        })?;
        let version = request.headers.get("Sec-WebSocket-Version").unwrap_or("");
        if version != SEC_WEBSOCKET_VERSION {
            debug!("unsupported Sec-WebSocket-Version {:?}", version);
            return Err(ProtocolError::upgrade_failed(format!("unsupported Sec-WebSocket-Version: {}", version)));
        }
        let accept = Accept::from_key_str(client_key);
        response.headers.set("Upgrade", "websocket");
        response.headers.set("Connection", "Upgrade");
        response.headers.set("Sec-WebSocket-Accept", accept.as_str());
        Ok(())
    }

    fn check_switching_response(&self, request: &RequestHead, response: &ResponseHead) -> Result<(), ProtocolError> {
        let client_key = request
            .headers
            .get("Sec-WebSocket-Key")
            .ok_or_else(|| ProtocolError::upgrade_failed("no Sec-WebSocket-Key was sent"))?;
        let accept = response
            .headers
            .get("Sec-WebSocket-Accept")
            .ok_or_else(|| ProtocolError::upgrade_failed("missing Sec-WebSocket-Accept"))?;
        if !Accept::from_key_str(client_key).matches(accept) {
            return Err(ProtocolError::upgrade_failed("Sec-WebSocket-Accept does not match the request key"));
        }
        Ok(())
    }

    fn create_server_codec(&self, max_frame_len: usize) -> (FrameDecoder, FrameEncoder) {
        (FrameDecoder::new(WsRole::Client, max_frame_len), FrameEncoder::new(WsRole::Server))
    }

    fn create_client_codec(&self, max_frame_len: usize) -> (FrameDecoder, FrameEncoder) {
        (FrameDecoder::new(WsRole::Server, max_frame_len), FrameEncoder::new(WsRole::Client))
    }
}

/// `Upgrade` implies `Upgrade` appears in `Connection` (I2), merged with
/// whatever tokens are already present rather than stomping them.
fn set_connection_token(request: &mut RequestHead, token: &str) {
    let mut tokens: Vec<String> = request
        .headers
        .get("Connection")
        .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    if !tokens.iter().any(|t| t.eq_ignore_ascii_case(token)) {
        tokens.push(token.to_string());
    }
    request.headers.set("Connection", tokens.join(", "));
}

/// A process-wide, read-mostly lookup table from protocol name to
/// provider (spec.md §4.5), iterated fresh on every lookup so dynamic
/// registration is visible without a restart.
pub struct UpgradeRegistry {
    providers: RwLock<Vec<Box<dyn UpgradeProvider>>>,
}

impl UpgradeRegistry {
    pub fn new() -> UpgradeRegistry {
        UpgradeRegistry { providers: RwLock::new(Vec::new()) }
    }

    /// A registry pre-populated with the core's `WebSocketProvider`.
    pub fn with_defaults() -> UpgradeRegistry {
        let registry = UpgradeRegistry::new();
        registry.register(Box::new(WebSocketProvider));
        registry
    }

    pub fn register(&self, provider: Box<dyn UpgradeProvider>) {
        self.providers.write().expect("upgrade registry lock poisoned").push(provider);
    }

    pub fn find(&self, protocol_name: &str) -> Option<ProviderHandle> {
        let providers = self.providers.read().expect("upgrade registry lock poisoned");
        providers
            .iter()
            .position(|p| p.supports_protocol(protocol_name))
            .map(|index| ProviderHandle { registry: self, index })
    }
}

impl Default for UpgradeRegistry {
    fn default() -> UpgradeRegistry {
        UpgradeRegistry::new()
    }
}

/// A borrowed reference to a matched provider, since `RwLockReadGuard`
/// can't be returned directly without tying the registry's lifetime into
/// the guard type.
pub struct ProviderHandle<'a> {
    registry: &'a UpgradeRegistry,
    index: usize,
}

impl<'a> ProviderHandle<'a> {
    pub fn with<R>(&self, f: impl FnOnce(&dyn UpgradeProvider) -> R) -> R {
        let providers = self.registry.providers.read().expect("upgrade registry lock poisoned");
        f(providers[self.index].as_ref())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::method::Method;
    use crate::status::StatusCode;
    use crate::version::Version;

    #[test]
    fn handshake_round_trips_through_provider() {
        let provider = WebSocketProvider;
        let mut request = RequestHead::new(Method::Get, "/chat", Version::Http11);
        provider.augment_initial_request(&mut request);
        set_connection_token(&mut request, "Upgrade");

        let mut response = ResponseHead::new(Version::Http11, StatusCode::SWITCHING_PROTOCOLS);
        provider.augment_initial_response(&request, &mut response).unwrap();
        provider.check_switching_response(&request, &response).unwrap();
    }

    #[test]
    fn missing_key_fails_the_handshake() {
        let provider = WebSocketProvider;
        let request = RequestHead::new(Method::Get, "/chat", Version::Http11);
        let mut response = ResponseHead::new(Version::Http11, StatusCode::SWITCHING_PROTOCOLS);
        assert!(provider.augment_initial_response(&request, &mut response).is_err());
    }

    #[test]
    fn registry_finds_the_default_websocket_provider() {
        let registry = UpgradeRegistry::with_defaults();
        let handle = registry.find("websocket").expect("websocket provider registered");
        assert_eq!(handle.with(|p| p.protocol_name().to_string()), "websocket");
        assert!(registry.find("spdy").is_none());
    }
}
