//! HTTP-date parsing/formatting (RFC 7231 §7.1.1.1).
//!
//! `httpdate` already accepts all three historical formats (IMF-fixdate,
//! RFC 850, asctime) on parse and always emits IMF-fixdate on format, so
//! there is no hand-rolled format juggling here.

use std::time::{Duration, SystemTime};

pub fn parse(raw: &str) -> Option<SystemTime> {
    httpdate::parse_http_date(raw.trim()).ok()
}

pub fn format(time: SystemTime) -> String {
    httpdate::fmt_http_date(time)
}

/// Format `base + secs` as an HTTP-date; used to turn a relative
/// `Retry-After`/derived `Expires` value into an absolute one.
pub fn format_plus_seconds(base: SystemTime, secs: u64) -> String {
    format(base + Duration::from_secs(secs))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_imf_fixdate() {
        let raw = "Sun, 06 Nov 1994 08:49:37 GMT";
        let parsed = parse(raw).expect("valid IMF-fixdate");
        assert_eq!(format(parsed), raw);
    }

    #[test]
    fn accepts_rfc850_and_asctime() {
        assert!(parse("Sunday, 06-Nov-94 08:49:37 GMT").is_some());
        assert!(parse("Sun Nov  6 08:49:37 1994").is_some());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("not a date").is_none());
    }
}
