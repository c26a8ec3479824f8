//! Header value converters (C2).
//!
//! Each registered header field names a `Converter`, which governs how raw
//! bytes are validated and, where a field may be repeated, how multiple
//! occurrences combine. This mirrors the teacher's `enums/headers.rs`
//! per-header-constant dispatch, generalized into data instead of one
//! match arm per header name.

use crate::error::ProtocolError;

/// How a header field's value is validated and combined across repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
    /// Opaque text, taken as-is (e.g. `User-Agent`).
    String,
    /// A single non-negative integer (e.g. `Content-Length`).
    Integer,
    /// An HTTP-date (e.g. `Date`, `If-Modified-Since`).
    Date,
    /// A comma-separated list where repeats append to one logical list
    /// (e.g. `Connection`, `Transfer-Encoding`, `Accept-Encoding`).
    List,
    /// Like `List`, but each *occurrence* of the header is a separate
    /// logical value rather than a comma-joined member -- `Set-Cookie`
    /// must never be comma-folded since cookie-values may contain commas.
    SetCookieList,
    /// `user:pass`-shaped or scheme-prefixed credential text
    /// (e.g. `Authorization`, `WWW-Authenticate`).
    Credentials,
    /// A `name/version` product list (e.g. `Server`, `User-Agent` variants,
    /// `Via`).
    Product,
}

impl Converter {
    /// Whether this field may legally appear more than once and still be
    /// meaningful (as opposed to the last/only occurrence winning).
    pub fn is_multi(&self) -> bool {
        matches!(self, Converter::List | Converter::SetCookieList)
    }

    /// The separator used when folding repeated occurrences into one
    /// value for presentation, or `None` if occurrences must stay
    /// distinct (see `separate_values`).
    pub fn delimiter(&self) -> Option<&'static str> {
        match self {
            Converter::List => Some(", "),
            Converter::SetCookieList => None,
            _ => None,
        }
    }

    /// Whether repeated occurrences of this field must be kept as
    /// separate values (never comma-joined) when re-serialized.
    pub fn separate_values(&self) -> bool {
        matches!(self, Converter::SetCookieList)
    }

    /// Validate a raw value against this converter's syntax, without
    /// interpreting it further. Returns the trimmed value on success.
    pub fn validate<'a>(&self, raw: &'a str) -> Result<&'a str, ProtocolError> {
        let trimmed = raw.trim();
        match self {
            Converter::String | Converter::Credentials | Converter::Product => Ok(trimmed),
            Converter::Integer => {
                if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
                    Ok(trimmed)
                } else {
                    Err(ProtocolError::converter(format!("not a valid integer: {:?}", raw)))
                }
            }
            Converter::Date => {
                if super::date::parse(trimmed).is_some() {
                    Ok(trimmed)
                } else {
                    Err(ProtocolError::converter(format!("not a valid HTTP-date: {:?}", raw)))
                }
            }
            Converter::List | Converter::SetCookieList => {
                if trimmed.is_empty() {
                    Err(ProtocolError::converter("empty list value"))
                } else {
                    Ok(trimmed)
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::Converter;

    #[test]
    fn integer_rejects_non_digits() {
        assert!(Converter::Integer.validate("42").is_ok());
        assert!(Converter::Integer.validate("-1").is_err());
        assert!(Converter::Integer.validate("4x2").is_err());
    }

    #[test]
    fn set_cookie_never_folds() {
        assert!(Converter::SetCookieList.separate_values());
        assert_eq!(Converter::SetCookieList.delimiter(), None);
        assert!(Converter::List.delimiter().is_some());
    }

    #[test]
    fn date_validates_via_httpdate() {
        assert!(Converter::Date.validate("Sun, 06 Nov 1994 08:49:37 GMT").is_ok());
        assert!(Converter::Date.validate("garbage").is_err());
    }
}
