//! Text encodings and record buffering for string sockets.
//!
//! Converts raw bytes into delivered strings:
//! - An [`Encoding`] turns text into bytes and counts encoded lengths
//! - A [`Decoder`] turns bytes back into text, carrying partial multi-byte
//!   sequences across reads
//! - A [`DecodedBuffer`] cuts the decoded text into newline-terminated
//!   records and serves line or exact byte-count takes
//!
//! Nothing here performs I/O; the socket layer feeds bytes in.

pub mod buffer;
pub mod decoder;
pub mod encoding;
pub mod error;

pub use buffer::{DecodedBuffer, ReceiveKind};
pub use decoder::{DecodedText, Decoder, REPLACEMENT_CHARACTER};
pub use encoding::{encoding_for_label, Ascii, Encoding, Latin1, SharedEncoding, Utf8};
pub use error::{CodecError, Result};
