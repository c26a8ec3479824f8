//! The static header-field registry: canonical spelling and converter for
//! every field name the codec cares about, plus a title-case fallback for
//! anything else (RFC 7230 §3.2 treats field names as case-insensitive but
//! recommends preserving the sender's casing; we don't have a sender to
//! preserve, so unknown fields get conventional title-casing instead).

use super::convert::Converter;

struct FieldSpec {
    canonical: &'static str,
    converter: Converter,
}

const TABLE: &[FieldSpec] = &[
    FieldSpec { canonical: "Host", converter: Converter::String },
    FieldSpec { canonical: "Connection", converter: Converter::List },
    FieldSpec { canonical: "Content-Length", converter: Converter::Integer },
    FieldSpec { canonical: "Transfer-Encoding", converter: Converter::List },
    FieldSpec { canonical: "Content-Type", converter: Converter::String },
    FieldSpec { canonical: "Content-Encoding", converter: Converter::List },
    FieldSpec { canonical: "Accept", converter: Converter::List },
    FieldSpec { canonical: "Accept-Encoding", converter: Converter::List },
    FieldSpec { canonical: "Accept-Charset", converter: Converter::List },
    FieldSpec { canonical: "Accept-Language", converter: Converter::List },
    FieldSpec { canonical: "Cache-Control", converter: Converter::List },
    FieldSpec { canonical: "Date", converter: Converter::Date },
    FieldSpec { canonical: "Expires", converter: Converter::Date },
    FieldSpec { canonical: "If-Modified-Since", converter: Converter::Date },
    FieldSpec { canonical: "If-Unmodified-Since", converter: Converter::Date },
    FieldSpec { canonical: "Last-Modified", converter: Converter::Date },
    FieldSpec { canonical: "If-Match", converter: Converter::List },
    FieldSpec { canonical: "If-None-Match", converter: Converter::List },
    FieldSpec { canonical: "ETag", converter: Converter::String },
    FieldSpec { canonical: "Retry-After", converter: Converter::String },
    FieldSpec { canonical: "Expect", converter: Converter::List },
    FieldSpec { canonical: "Upgrade", converter: Converter::List },
    FieldSpec { canonical: "Via", converter: Converter::Product },
    FieldSpec { canonical: "Server", converter: Converter::Product },
    FieldSpec { canonical: "User-Agent", converter: Converter::Product },
    FieldSpec { canonical: "Authorization", converter: Converter::Credentials },
    FieldSpec { canonical: "WWW-Authenticate", converter: Converter::Credentials },
    FieldSpec { canonical: "Proxy-Authenticate", converter: Converter::Credentials },
    FieldSpec { canonical: "Proxy-Authorization", converter: Converter::Credentials },
    FieldSpec { canonical: "Cookie", converter: Converter::List },
    FieldSpec { canonical: "Set-Cookie", converter: Converter::SetCookieList },
    FieldSpec { canonical: "Location", converter: Converter::String },
    FieldSpec { canonical: "Vary", converter: Converter::List },
    FieldSpec { canonical: "Allow", converter: Converter::List },
    FieldSpec { canonical: "Range", converter: Converter::String },
    FieldSpec { canonical: "Content-Range", converter: Converter::String },
    FieldSpec { canonical: "Sec-WebSocket-Key", converter: Converter::String },
    FieldSpec { canonical: "Sec-WebSocket-Accept", converter: Converter::String },
    FieldSpec { canonical: "Sec-WebSocket-Version", converter: Converter::String },
    FieldSpec { canonical: "Sec-WebSocket-Protocol", converter: Converter::List },
    FieldSpec { canonical: "Sec-WebSocket-Extensions", converter: Converter::List },
];

fn lookup(name: &str) -> Option<&'static FieldSpec> {
    TABLE.iter().find(|f| f.canonical.eq_ignore_ascii_case(name))
}

/// The converter governing `name`'s values, falling back to `String` for
/// anything not in the registry.
pub fn converter(name: &str) -> Converter {
    lookup(name).map(|f| f.converter).unwrap_or(Converter::String)
}

/// The canonical spelling for `name` (e.g. `content-length` ->
/// `Content-Length`). Unknown fields are title-cased at each `-`-separated
/// word boundary so the wire output still looks like a real header.
pub fn canonical_name(name: &str) -> String {
    if let Some(spec) = lookup(name) {
        return spec.canonical.to_string();
    }
    title_case(name)
}

fn title_case(name: &str) -> String {
    name.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}
