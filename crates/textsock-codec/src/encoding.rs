use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::decoder::{Decoder, SingleByteDecoder, Utf8Decoder};
use crate::error::{CodecError, Result};

/// Byte used for characters the encoding cannot represent.
const UNMAPPABLE: u8 = b'?';

/// A text encoding: converts strings to bytes and back.
///
/// `char_len` must agree with `encode`: the encoded length of a string is
/// always the sum of `char_len` over its characters. Byte-count receives
/// depend on this to split decoded text at exact encoded-byte offsets.
pub trait Encoding: fmt::Debug + Send + Sync {
    /// Canonical label, e.g. `"utf-8"`.
    fn name(&self) -> &'static str;

    /// Number of bytes `ch` occupies once encoded.
    fn char_len(&self, ch: char) -> usize;

    /// Number of bytes `text` occupies once encoded.
    fn encoded_len(&self, text: &str) -> usize {
        text.chars().map(|ch| self.char_len(ch)).sum()
    }

    /// Encode `text` in full.
    fn encode(&self, text: &str) -> Bytes;

    /// A fresh incremental decoder with no carry state.
    fn new_decoder(&self) -> Box<dyn Decoder>;
}

/// Encoding handle shared between a socket's send and receive paths.
pub type SharedEncoding = Arc<dyn Encoding>;

/// UTF-8, the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8;

impl Encoding for Utf8 {
    fn name(&self) -> &'static str {
        "utf-8"
    }

    fn char_len(&self, ch: char) -> usize {
        ch.len_utf8()
    }

    fn encoded_len(&self, text: &str) -> usize {
        text.len()
    }

    fn encode(&self, text: &str) -> Bytes {
        Bytes::copy_from_slice(text.as_bytes())
    }

    fn new_decoder(&self) -> Box<dyn Decoder> {
        Box::new(Utf8Decoder::new())
    }
}

/// ISO-8859-1: one byte per character, U+0000..=U+00FF.
#[derive(Debug, Clone, Copy, Default)]
pub struct Latin1;

impl Encoding for Latin1 {
    fn name(&self) -> &'static str {
        "iso-8859-1"
    }

    fn char_len(&self, _ch: char) -> usize {
        1
    }

    fn encode(&self, text: &str) -> Bytes {
        encode_single_byte(text, 0xFF)
    }

    fn new_decoder(&self) -> Box<dyn Decoder> {
        Box::new(SingleByteDecoder::new(0xFF))
    }
}

/// US-ASCII: one byte per character, U+0000..=U+007F.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ascii;

impl Encoding for Ascii {
    fn name(&self) -> &'static str {
        "us-ascii"
    }

    fn char_len(&self, _ch: char) -> usize {
        1
    }

    fn encode(&self, text: &str) -> Bytes {
        encode_single_byte(text, 0x7F)
    }

    fn new_decoder(&self) -> Box<dyn Decoder> {
        Box::new(SingleByteDecoder::new(0x7F))
    }
}

fn encode_single_byte(text: &str, max: u8) -> Bytes {
    text.chars()
        .map(|ch| match u8::try_from(u32::from(ch)) {
            Ok(byte) if byte <= max => byte,
            _ => UNMAPPABLE,
        })
        .collect::<Vec<u8>>()
        .into()
}

/// Resolve an encoding label (case-insensitive) to a shared encoding.
pub fn encoding_for_label(label: &str) -> Result<SharedEncoding> {
    match label.trim().to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => Ok(Arc::new(Utf8)),
        "latin1" | "latin-1" | "iso-8859-1" | "iso8859-1" => Ok(Arc::new(Latin1)),
        "ascii" | "us-ascii" => Ok(Arc::new(Ascii)),
        _ => Err(CodecError::UnknownEncoding(label.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_lengths_follow_char_width() {
        let enc = Utf8;
        assert_eq!(enc.encoded_len("café"), 5);
        assert_eq!(enc.char_len('é'), 2);
        assert_eq!(enc.char_len('€'), 3);
        assert_eq!(enc.char_len('🦀'), 4);
        assert_eq!(enc.encode("café").as_ref(), "café".as_bytes());
    }

    #[test]
    fn default_encoded_len_sums_char_len() {
        let enc = Latin1;
        assert_eq!(enc.encoded_len("café"), 4);
        assert_eq!(enc.encoded_len(""), 0);
    }

    #[test]
    fn latin1_encodes_high_range_and_replaces_unmappable() {
        let enc = Latin1;
        assert_eq!(enc.encode("café").as_ref(), b"caf\xE9");
        assert_eq!(enc.encode("€1").as_ref(), b"?1");
        assert_eq!(enc.encode("€1").len(), enc.encoded_len("€1"));
    }

    #[test]
    fn ascii_replaces_anything_above_7f() {
        let enc = Ascii;
        assert_eq!(enc.encode("naïve").as_ref(), b"na?ve");
    }

    #[test]
    fn labels_resolve_case_insensitively() {
        assert_eq!(encoding_for_label("UTF-8").unwrap().name(), "utf-8");
        assert_eq!(encoding_for_label(" latin1 ").unwrap().name(), "iso-8859-1");
        assert_eq!(encoding_for_label("US-ASCII").unwrap().name(), "us-ascii");
    }

    #[test]
    fn unknown_label_is_rejected() {
        let err = encoding_for_label("ebcdic").unwrap_err();
        assert!(matches!(err, CodecError::UnknownEncoding(label) if label == "ebcdic"));
    }
}
