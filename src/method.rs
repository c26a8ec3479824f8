use std::fmt;

/// HTTP request method.
///
/// Known methods get their own variant so hot-path comparisons (is this a
/// `HEAD`? a `CONNECT`?) don't allocate or do string compares; anything
/// else is carried verbatim as a token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Options,
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Trace,
    Connect,
    Other(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match *self {
            Method::Options => "OPTIONS",
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
            Method::Other(ref s) => s,
        }
    }

    pub fn is_head(&self) -> bool {
        matches!(self, Method::Head)
    }

    pub fn is_connect(&self) -> bool {
        matches!(self, Method::Connect)
    }
}

impl<'a> From<&'a str> for Method {
    fn from(s: &'a str) -> Method {
        match s {
            "OPTIONS" => Method::Options,
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "PATCH" => Method::Patch,
            "DELETE" => Method::Delete,
            "TRACE" => Method::Trace,
            "CONNECT" => Method::Connect,
            other => Method::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::Method;

    #[test]
    fn known_methods_round_trip() {
        for m in ["GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "OPTIONS", "TRACE", "CONNECT"] {
            assert_eq!(Method::from(m).as_str(), m);
        }
    }

    #[test]
    fn unknown_method_is_preserved() {
        let m = Method::from("PROPFIND");
        assert_eq!(m.as_str(), "PROPFIND");
        assert!(matches!(m, Method::Other(_)));
    }
}
