//! Incremental charset transcoding (C1), used by the decoder to turn a
//! text body into UTF-8 according to the `charset` parameter of
//! `Content-Type` (defaulting to UTF-8 when absent or unrecognized).
//!
//! Built on `encoding_rs::Decoder`, which already suspends correctly mid
//! multi-byte sequence when either buffer runs out -- exactly the
//! suspend-on-any-byte-boundary discipline the rest of this crate's state
//! machines follow by hand.

use encoding_rs::{CoderResult, Encoding, UTF_8};

use crate::buf::{Cursor, Sink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// All available input was consumed; more may still be supplied.
    InputEmpty,
    /// The output buffer is full; drain it and call again.
    OutputFull,
}

/// An incremental bytes-to-UTF-8 transcoder for one body's lifetime.
pub struct Decoder {
    inner: encoding_rs::Decoder,
}

impl Decoder {
    pub fn new(encoding: &'static Encoding) -> Decoder {
        Decoder { inner: encoding.new_decoder() }
    }

    pub fn utf8() -> Decoder {
        Decoder::new(UTF_8)
    }

    /// Resolve a `charset` parameter value (e.g. from `Content-Type`) to a
    /// decoder, falling back to UTF-8 for anything unrecognized.
    pub fn for_label(label: &str) -> Decoder {
        let encoding = Encoding::for_label(label.as_bytes()).unwrap_or(UTF_8);
        Decoder::new(encoding)
    }

    /// Transcode as much of `input` into `output` as fits. `last` must be
    /// `true` on the final call for this body (end-of-input or a known
    /// content-length reached) so trailing incomplete sequences are
    /// reported rather than silently dropped.
    pub fn decode_to_sink(&mut self, input: &mut Cursor, output: &mut Sink, last: bool) -> DecodeOutcome {
        let (result, read, written, _had_errors) =
            self.inner.decode_to_utf8(input.remaining(), output.remaining_mut(), last);
        input.advance(read);
        output.advance(written);
        match result {
            CoderResult::InputEmpty => DecodeOutcome::InputEmpty,
            CoderResult::OutputFull => DecodeOutcome::OutputFull,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn utf8_passthrough() {
        let mut decoder = Decoder::utf8();
        let mut input = Cursor::new("héllo".as_bytes());
        let mut out_buf = vec![0u8; 64];
        let mut output = Sink::new(&mut out_buf);
        let outcome = decoder.decode_to_sink(&mut input, &mut output, true);
        assert_eq!(outcome, DecodeOutcome::InputEmpty);
        assert_eq!(&out_buf[..output.position()], "héllo".as_bytes());
    }

    #[test]
    fn small_output_buffer_splits_across_calls() {
        let mut decoder = Decoder::utf8();
        let mut input = Cursor::new("hello world".as_bytes());
        let mut collected = Vec::new();
        loop {
            let mut out_buf = vec![0u8; 4];
            let mut output = Sink::new(&mut out_buf);
            let outcome = decoder.decode_to_sink(&mut input, &mut output, true);
            collected.extend_from_slice(&out_buf[..output.position()]);
            if outcome == DecodeOutcome::InputEmpty && input.is_empty() {
                break;
            }
        }
        assert_eq!(collected, b"hello world");
    }

    #[test]
    fn unknown_label_falls_back_to_utf8() {
        let mut decoder = Decoder::for_label("not-a-real-charset");
        let mut input = Cursor::new(b"abc");
        let mut out_buf = vec![0u8; 16];
        let mut output = Sink::new(&mut out_buf);
        decoder.decode_to_sink(&mut input, &mut output, true);
        assert_eq!(&out_buf[..output.position()], b"abc");
    }
}
