//! The header field converter registry (C2): canonical names, per-field
//! converters, HTTP-date helpers, and the small byte-level matchers the
//! decoder/encoder state machines consult directly for framing decisions.

pub mod convert;
pub mod date;
pub mod table;
pub mod util;

pub use convert::Converter;
pub use table::{canonical_name, converter};
