//! Byte-level matchers for the handful of header values whose *meaning*
//! the state machines depend on directly (RFC 7230 framing keywords),
//! rather than going through the full converter registry in `table.rs`.
//!
//! Ported from the case-insensitive, whitespace-tolerant scanners the
//! teacher used for the same purpose (`headers.rs::is_close`/`is_chunked`).

/// Is `val` (one comma-separated `Connection` token) the `close` directive?
pub fn is_close(val: &[u8]) -> bool {
    matches_token(val, b"close")
}

/// Is `val` (one comma-separated `Transfer-Encoding` token) `chunked`?
pub fn is_chunked(val: &[u8]) -> bool {
    matches_token(val, b"chunked")
}

/// Is `val` (the `Expect` header value) `100-continue`?
pub fn is_continue(val: &[u8]) -> bool {
    matches_token(val, b"100-continue")
}

fn matches_token(val: &[u8], token: &[u8]) -> bool {
    let trimmed = trim_ows(val);
    trimmed.eq_ignore_ascii_case(token)
}

fn trim_ows(val: &[u8]) -> &[u8] {
    let is_ows = |b: &u8| matches!(*b, b'\r' | b'\n' | b' ' | b'\t');
    let start = val.iter().position(|b| !is_ows(b)).unwrap_or(val.len());
    let end = val.iter().rposition(|b| !is_ows(b)).map(|i| i + 1).unwrap_or(start);
    &val[start..end]
}

/// Is any comma-separated token of `value` (repeated occurrences of the
/// same header already joined by the caller, one list per call) equal to
/// `token`? Used for `Connection: keep-alive, upgrade`-style values where
/// several directives share one physical line.
pub fn list_contains(value: &str, token: &str) -> bool {
    value.split(',').any(|part| matches_token(part.trim().as_bytes(), token.as_bytes()))
}

/// Like `list_contains`, but across every occurrence of a possibly
/// multi-valued header (`Connection` may legally repeat, each occurrence
/// itself comma-separated).
pub fn list_contains_any<'a>(values: impl Iterator<Item = &'a str>, token: &str) -> bool {
    values.flat_map(|v| v.split(',')).any(|part| matches_token(part.trim().as_bytes(), token.as_bytes()))
}

/// Undo legacy header line folding (RFC 7230 §3.2.4, obs-fold): a CRLF
/// immediately followed by a run of SP/HT is replaced by a single SP.
/// Applied to the decoder's whole accumulated header block before each
/// parse attempt, since `httparse` itself rejects folded lines outright.
pub fn unfold(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if is_fold_point(raw, i) {
            out.push(b' ');
            i += 2;
            while i < raw.len() && matches!(raw[i], b' ' | b'\t') {
                i += 1;
            }
        } else {
            out.push(raw[i]);
            i += 1;
        }
    }
    out
}

/// Given the same `raw` bytes `unfold` was run on, find how many raw
/// bytes correspond to the first `target_out_len` bytes of its unfolded
/// form -- lets the decoder map an `httparse` consumed-length (measured
/// against the unfolded buffer) back to a position in the original
/// accumulator.
pub fn raw_offset_for_unfolded(raw: &[u8], target_out_len: usize) -> usize {
    let mut i = 0;
    let mut out_len = 0;
    while i < raw.len() && out_len < target_out_len {
        if is_fold_point(raw, i) {
            out_len += 1;
            i += 2;
            while i < raw.len() && matches!(raw[i], b' ' | b'\t') {
                i += 1;
            }
        } else {
            out_len += 1;
            i += 1;
        }
    }
    i
}

fn is_fold_point(raw: &[u8], i: usize) -> bool {
    raw.get(i) == Some(&b'\r')
        && raw.get(i + 1) == Some(&b'\n')
        && matches!(raw.get(i + 2), Some(&b' ') | Some(&b'\t'))
}

#[cfg(test)]
mod test {
    use super::{is_chunked, is_close, is_continue};

    #[test]
    fn test_chunked() {
        assert!(is_chunked(b"chunked"));
        assert!(is_chunked(b"Chunked"));
        assert!(is_chunked(b"chuNKED"));
        assert!(is_chunked(b"CHUNKED"));
        assert!(is_chunked(b"   CHUNKED"));
        assert!(is_chunked(b"   CHUNKED  "));
        assert!(is_chunked(b"chunked  "));
        assert!(!is_chunked(b"   CHUNKED 1 "));
    }

    #[test]
    fn test_close() {
        assert!(is_close(b"close"));
        assert!(is_close(b"Close"));
        assert!(is_close(b"clOSE"));
        assert!(is_close(b"CLOSE"));
        assert!(is_close(b" CLOSE"));
        assert!(is_close(b"   close   "));
        assert!(!is_close(b"Close  1 "));
        assert!(!is_close(b" xclose   "));
    }

    #[test]
    fn test_continue() {
        assert!(is_continue(b"100-continue"));
        assert!(is_continue(b"100-Continue"));
        assert!(is_continue(b"100-conTINUE"));
        assert!(is_continue(b"  100-CONTINUE"));
        assert!(!is_continue(b"100-continue y  "));
        assert!(!is_continue(b"100-coztinue   "));
    }

    #[test]
    fn test_list_contains() {
        assert!(list_contains("keep-alive, Upgrade", "upgrade"));
        assert!(list_contains("close", "close"));
        assert!(!list_contains("keep-alive", "close"));
    }

    #[test]
    fn test_list_contains_any_across_repeats() {
        use super::list_contains_any;
        let values = vec!["keep-alive", "Upgrade"];
        assert!(list_contains_any(values.into_iter(), "upgrade"));
        let values = vec!["keep-alive"];
        assert!(!list_contains_any(values.into_iter(), "close"));
    }

    #[test]
    fn test_unfold_joins_continuation_lines() {
        let raw = b"Foo: bar\r\n baz\r\nBar: 1\r\n\r\n";
        let unfolded = unfold(raw);
        assert_eq!(&unfolded, b"Foo: bar baz\r\nBar: 1\r\n\r\n");
    }

    #[test]
    fn test_unfold_noop_without_folding() {
        let raw = b"Foo: bar\r\nBar: 1\r\n\r\n";
        assert_eq!(unfold(raw), raw.to_vec());
    }

    #[test]
    fn test_raw_offset_for_unfolded_maps_back() {
        let raw = b"Foo: bar\r\n baz\r\n\r\nBODY";
        let unfolded = unfold(raw);
        let header_len_unfolded = unfolded.len() - 2; // without trailing CRLF
        let header_end = unfolded.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
        let raw_end = raw_offset_for_unfolded(raw, header_end);
        assert_eq!(&raw[raw_end..], b"BODY");
        let _ = header_len_unfolded;
    }
}
