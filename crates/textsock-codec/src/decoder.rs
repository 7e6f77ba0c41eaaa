/// Substituted for byte sequences that are not valid in the encoding.
pub const REPLACEMENT_CHARACTER: char = '\u{FFFD}';

/// Decoded characters, plus the raw width of each substituted character.
///
/// A [`REPLACEMENT_CHARACTER`] standing in for invalid input re-encodes to a
/// different number of bytes than it was decoded from, so the raw width is
/// recorded next to its position.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    /// `(byte offset in text, raw bytes consumed)`, in ascending offset order.
    pub substitutions: Vec<(usize, usize)>,
}

impl DecodedText {
    pub fn push_str(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// Push a replacement character decoded from `raw_len` invalid bytes.
    pub fn push_substitution(&mut self, raw_len: usize) {
        self.substitutions.push((self.text.len(), raw_len));
        self.text.push(REPLACEMENT_CHARACTER);
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.substitutions.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Incremental bytes-to-text decoder.
///
/// Bytes handed to [`decode`](Decoder::decode) are consumed exactly once.
/// When `is_final` is false, a trailing incomplete multi-byte sequence is
/// kept as carry state and completed by the next call instead of being
/// reported as invalid.
pub trait Decoder: Send {
    /// Decode `bytes`, appending the characters to `out`.
    fn decode(&mut self, bytes: &[u8], is_final: bool, out: &mut DecodedText);

    /// Whether a partial multi-byte sequence is being carried.
    fn has_pending(&self) -> bool;

    /// Flush carry state at end of stream.
    fn finish(&mut self, out: &mut DecodedText) {
        self.decode(&[], true, out);
    }
}

/// Incremental UTF-8 decoder.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn decode_slice(&mut self, input: &[u8], is_final: bool, out: &mut DecodedText) {
        let mut rest = input;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    return;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    // `valid` is known-good, so this borrows without copying.
                    out.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(invalid) => {
                            out.push_substitution(invalid);
                            rest = &after[invalid..];
                        }
                        None if is_final => {
                            out.push_substitution(after.len());
                            return;
                        }
                        None => {
                            self.pending.extend_from_slice(after);
                            return;
                        }
                    }
                }
            }
        }
    }
}

impl Decoder for Utf8Decoder {
    fn decode(&mut self, bytes: &[u8], is_final: bool, out: &mut DecodedText) {
        if self.pending.is_empty() {
            self.decode_slice(bytes, is_final, out);
            return;
        }
        let mut joined = std::mem::take(&mut self.pending);
        joined.extend_from_slice(bytes);
        self.decode_slice(&joined, is_final, out);
    }

    fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Decoder for single-byte encodings whose code points map 1:1 onto
/// U+0000..=`max`. Bytes above `max` decode to U+FFFD.
#[derive(Debug, Clone, Copy)]
pub struct SingleByteDecoder {
    max: u8,
}

impl SingleByteDecoder {
    pub fn new(max: u8) -> Self {
        Self { max }
    }
}

impl Decoder for SingleByteDecoder {
    fn decode(&mut self, bytes: &[u8], _is_final: bool, out: &mut DecodedText) {
        out.text.reserve(bytes.len());
        for &byte in bytes {
            if byte <= self.max {
                out.text.push(char::from(byte));
            } else {
                out.push_substitution(1);
            }
        }
    }

    fn has_pending(&self) -> bool {
        false
    }
}
