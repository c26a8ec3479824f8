use std::fmt;

use quick_error::quick_error;

use crate::status::StatusCode;
use crate::version::Version;

quick_error! {
    /// Coarse classification of what went wrong, per the error taxonomy
    /// in the design notes (framing / policy / upgrade / converter).
    /// `ProtocolError` below carries the HTTP-meaningful detail; this enum
    /// is mostly useful for `match`ing on error *kind* without string
    /// comparison.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ErrorKind {
        /// Malformed start line, bad CRLF, illegal chunk size.
        Framing {
            description("malformed protocol framing")
        }
        /// Header length exceeded, conflicting framing headers, unsupported
        /// transfer-coding.
        Policy {
            description("protocol policy violation")
        }
        /// A `101` handshake could not be validated or completed.
        Upgrade {
            description("protocol upgrade failed")
        }
        /// A header field converter rejected an incoming value.
        Converter {
            description("header value could not be parsed")
        }
    }
}

/// A protocol-level error, carrying everything needed to synthesize the
/// response the spec requires every error to produce within the same
/// `decode`/`encode` call that discovered it.
#[derive(Debug, Clone)]
pub struct ProtocolError {
    pub kind: ErrorKind,
    pub version: Version,
    pub status: StatusCode,
    pub reason: String,
    pub detail: String,
}

impl ProtocolError {
    pub fn new(kind: ErrorKind, version: Version, status: StatusCode, detail: impl Into<String>) -> ProtocolError {
        ProtocolError {
            kind,
            version,
            reason: status.reason().to_string(),
            status,
            detail: detail.into(),
        }
    }

    /// Most framing errors are discovered before a version has even been
    /// parsed off the start line; HTTP/1.1 is as good a default as any
    /// for the synthesized error response (RFC 7230 doesn't mandate one).
    pub fn bad_request(detail: impl Into<String>) -> ProtocolError {
        ProtocolError::new(ErrorKind::Framing, Version::Http11, StatusCode::BAD_REQUEST, detail)
    }

    pub fn header_too_large(detail: impl Into<String>) -> ProtocolError {
        ProtocolError::new(ErrorKind::Policy, Version::Http11, StatusCode::PAYLOAD_TOO_LARGE, detail)
    }

    pub fn not_implemented(detail: impl Into<String>) -> ProtocolError {
        ProtocolError::new(ErrorKind::Policy, Version::Http11, StatusCode::NOT_IMPLEMENTED, detail)
    }

    pub fn upgrade_failed(detail: impl Into<String>) -> ProtocolError {
        ProtocolError::new(ErrorKind::Upgrade, Version::Http11, StatusCode::BAD_REQUEST, detail)
    }

    pub fn converter(detail: impl Into<String>) -> ProtocolError {
        ProtocolError::new(ErrorKind::Converter, Version::Http11, StatusCode::BAD_REQUEST, detail)
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}: {}", self.version, self.status.code(), self.reason, self.detail)
    }
}

impl std::error::Error for ProtocolError {}
