use std::fmt;

/// HTTP protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    /// Version 1.0 of the HTTP protocol.
    Http10,
    /// Version 1.1 of the HTTP protocol.
    Http11,
}

impl Version {
    /// Maps the minor version byte `httparse` reports (0 or 1).
    pub fn from_httparse_minor(minor: u8) -> Version {
        if minor == 1 { Version::Http11 } else { Version::Http10 }
    }

    pub fn at_most_http10(&self) -> bool {
        matches!(self, Version::Http10)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Version::Http10 => f.write_str("HTTP/1.0"),
            Version::Http11 => f.write_str("HTTP/1.1"),
        }
    }
}
