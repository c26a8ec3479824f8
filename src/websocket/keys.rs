//! WebSocket handshake key/accept computation (RFC 6455 §1.3).
//!
//! Carried over from the teacher's `websocket/keys.rs` (`Key`/`Accept`
//! wrapping a fixed-size byte array with a `Display` impl), but computed
//! with the `sha1`/`base64` crates instead of the teacher's hand-rolled
//! base64 table -- the one spot in this crate where reaching for the
//! ecosystem crate is strictly better than the hand-rolled version.

use std::fmt;

use rand::{thread_rng, Rng};
use sha1::{Digest, Sha1};

/// The GUID RFC 6455 §1.3 concatenates onto the client's key before
/// hashing, to prove the peer understood it was asked for a WebSocket
/// handshake specifically (and not replaying an unrelated response).
pub const GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// A `Sec-WebSocket-Key` value: 16 random bytes, base64-encoded.
#[derive(Clone)]
pub struct Key([u8; 16]);

impl Key {
    pub fn new() -> Key {
        let mut key = [0u8; 16];
        thread_rng().fill(&mut key);
        Key(key)
    }
}

impl Default for Key {
    fn default() -> Key {
        Key::new()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", base64::encode(self.0))
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "websocket::Key({})", self)
    }
}

/// The `Sec-WebSocket-Accept` value a server sends back to prove it
/// understood the handshake: `base64(SHA-1(key + GUID))`.
#[derive(Clone)]
pub struct Accept(String);

impl Accept {
    /// `key` is the raw (base64-encoded) text of the client's
    /// `Sec-WebSocket-Key` header value.
    pub fn from_key_str(key: &str) -> Accept {
        let mut hasher = Sha1::new();
        hasher.update(key.as_bytes());
        hasher.update(GUID.as_bytes());
        let digest = hasher.finalize();
        Accept(base64::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, other: &str) -> bool {
        self.0 == other.trim()
    }
}

impl fmt::Display for Accept {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Accept {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "websocket::Accept({})", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn known_vector_from_rfc6455() {
        // RFC 6455 §1.3's worked example.
        let accept = Accept::from_key_str("dGhlIHNhbXBsZSBub25jZQ==");
        assert_eq!(accept.as_str(), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn key_round_trips_through_base64() {
        let key = Key::new();
        let encoded = key.to_string();
        assert_eq!(base64::decode(&encoded).unwrap().len(), 16);
    }
}
