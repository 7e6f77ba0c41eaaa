use std::collections::VecDeque;
use std::fmt;

use tracing::trace;

use crate::decoder::{DecodedText, Decoder, REPLACEMENT_CHARACTER};
use crate::encoding::{Encoding, SharedEncoding};

const NEWLINE: char = '\n';
const CARRIAGE_RETURN: char = '\r';

/// What a receive request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveKind {
    /// The next newline-terminated record, without its terminator.
    Line,
    /// Exactly this many encoded bytes, newlines included.
    Bytes(usize),
}

impl ReceiveKind {
    /// Map a requested byte length to a kind. Non-positive lengths mean
    /// "next line" rather than an error.
    pub fn from_length(byte_length: i64) -> Self {
        if byte_length <= 0 {
            Self::Line
        } else {
            Self::Bytes(usize::try_from(byte_length).unwrap_or(usize::MAX))
        }
    }
}

/// Decoded text waiting to be delivered.
///
/// Holds complete records (newline stripped, carriage return kept), the
/// trailing text not yet terminated by a newline, and the decoder's carry
/// state. Records followed by a newline each, then the trailing text, are
/// exactly the decoded bytes received and not yet taken.
///
/// Byte counts are raw wire bytes. A byte count that ends inside a
/// multi-byte character pays for part of it; the character is delivered by
/// the take that pays for the rest.
pub struct DecodedBuffer {
    encoding: SharedEncoding,
    decoder: Box<dyn Decoder>,
    records: VecDeque<Segment>,
    partial: Segment,
    newline_len: usize,
    buffered_bytes: usize,
    /// Raw bytes of the front character (or front newline) already taken.
    prepaid: usize,
    scratch: DecodedText,
}

impl DecodedBuffer {
    /// Create an empty buffer decoding with `encoding`.
    pub fn new(encoding: SharedEncoding) -> Self {
        let mut newline = [0u8; 4];
        let newline_len = encoding.encoded_len(NEWLINE.encode_utf8(&mut newline));
        Self {
            decoder: encoding.new_decoder(),
            encoding,
            records: VecDeque::new(),
            partial: Segment::default(),
            newline_len,
            buffered_bytes: 0,
            prepaid: 0,
            scratch: DecodedText::default(),
        }
    }

    /// Decode freshly read bytes and buffer the result.
    ///
    /// Returns the number of complete records that became available.
    pub fn feed(&mut self, bytes: &[u8]) -> usize {
        let mut decoded = std::mem::take(&mut self.scratch);
        self.decoder.decode(bytes, false, &mut decoded);
        let cut = self.push_decoded(&decoded);
        decoded.clear();
        self.scratch = decoded;
        trace!(
            read = bytes.len(),
            records = self.records.len(),
            buffered_bytes = self.buffered_bytes,
            "buffered decoded text"
        );
        cut
    }

    /// Flush decoder carry state at end of stream.
    pub fn finish(&mut self) {
        let mut decoded = DecodedText::default();
        self.decoder.finish(&mut decoded);
        self.push_decoded(&decoded);
    }

    /// Append decoded text, cutting a record at every newline in one pass.
    fn push_decoded(&mut self, decoded: &DecodedText) -> usize {
        if decoded.is_empty() {
            return 0;
        }
        self.buffered_bytes += raw_len(&*self.encoding, &decoded.text, &decoded.substitutions);

        let base = self.partial.text.len();
        self.partial.text.push_str(&decoded.text);
        self.partial
            .substitutions
            .extend(decoded.substitutions.iter().map(|&(at, raw)| (base + at, raw)));

        let ends: Vec<usize> = decoded
            .text
            .match_indices(NEWLINE)
            .map(|(offset, _)| base + offset)
            .collect();
        if ends.is_empty() {
            return 0;
        }

        let Segment { text, substitutions } = std::mem::take(&mut self.partial);
        let mut substitutions = substitutions.into_iter().peekable();
        let mut start = 0;
        for &end in &ends {
            let mut record = Segment {
                text: text[start..end].to_owned(),
                substitutions: Vec::new(),
            };
            while let Some(&(at, raw)) = substitutions.peek() {
                if at >= end {
                    break;
                }
                record.substitutions.push((at - start, raw));
                substitutions.next();
            }
            self.records.push_back(record);
            start = end + NEWLINE.len_utf8();
        }
        self.partial = Segment {
            text: text[start..].to_owned(),
            substitutions: substitutions.map(|(at, raw)| (at - start, raw)).collect(),
        };
        ends.len()
    }

    /// Take whatever `kind` asks for, or `None` if not enough is buffered yet.
    pub fn take(&mut self, kind: ReceiveKind) -> Option<String> {
        match kind {
            ReceiveKind::Line => self.take_line(),
            ReceiveKind::Bytes(count) => self.take_bytes(count),
        }
    }

    /// Take the next complete record, trimming one trailing carriage return.
    pub fn take_line(&mut self) -> Option<String> {
        let record = self.records.pop_front()?;
        self.buffered_bytes -= record.raw_len(&*self.encoding) + self.newline_len - self.prepaid;
        self.prepaid = 0;
        let mut line = record.text;
        if line.ends_with(CARRIAGE_RETURN) {
            line.pop();
        }
        Some(line)
    }

    /// Take exactly `count` raw bytes of text, newlines included.
    ///
    /// A character straddling the end of the count is not returned; the
    /// bytes of it already counted are remembered, and the next take
    /// returns the whole character while counting only its remaining bytes.
    pub fn take_bytes(&mut self, count: usize) -> Option<String> {
        if self.buffered_bytes < count {
            return None;
        }

        let encoding = &*self.encoding;
        let mut out = String::new();
        let mut budget = count;
        while budget > 0 {
            let Some(record) = self.records.front_mut() else {
                let cut = pay_chars(encoding, &self.partial, &mut budget, &mut self.prepaid);
                out.push_str(&self.partial.split_front(cut).text);
                break;
            };

            let cut = pay_chars(encoding, record, &mut budget, &mut self.prepaid);
            out.push_str(&record.split_front(cut).text);
            if budget == 0 {
                // The record's newline, possibly with its text, stays buffered.
                break;
            }

            let newline_cost = self.newline_len - self.prepaid;
            if newline_cost > budget {
                self.prepaid += budget;
                break;
            }
            budget -= newline_cost;
            self.prepaid = 0;
            self.records.pop_front();
            out.push(NEWLINE);
        }

        self.buffered_bytes -= count;
        Some(out)
    }

    /// Raw bytes decoded and not yet taken. Bytes held as decoder carry
    /// state are counted once their character completes.
    pub fn buffered_bytes(&self) -> usize {
        self.buffered_bytes
    }

    /// Trailing text not yet terminated by a newline.
    pub fn partial(&self) -> &str {
        &self.partial.text
    }

    /// Whether the decoder is carrying a partial multi-byte sequence.
    pub fn has_pending_decode(&self) -> bool {
        self.decoder.has_pending()
    }

    pub fn is_empty(&self) -> bool {
        self.buffered_bytes == 0 && !self.decoder.has_pending()
    }
}

impl fmt::Debug for DecodedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedBuffer")
            .field("encoding", &self.encoding.name())
            .field("records", &self.records.len())
            .field("partial_len", &self.partial.text.len())
            .field("buffered_bytes", &self.buffered_bytes)
            .field("prepaid", &self.prepaid)
            .field("pending_decode", &self.decoder.has_pending())
            .finish()
    }
}

/// A run of decoded text with the raw widths of its substituted characters.
#[derive(Debug, Default)]
struct Segment {
    text: String,
    substitutions: Vec<(usize, usize)>,
}

impl Segment {
    fn raw_len(&self, encoding: &dyn Encoding) -> usize {
        raw_len(encoding, &self.text, &self.substitutions)
    }

    fn char_raw_len(&self, encoding: &dyn Encoding, index: usize, ch: char) -> usize {
        match self.substitutions.binary_search_by_key(&index, |&(at, _)| at) {
            Ok(found) => self.substitutions[found].1,
            Err(_) => encoding.char_len(ch),
        }
    }

    /// Remove and return `text[..at]`, shifting the remaining offsets.
    fn split_front(&mut self, at: usize) -> Segment {
        let tail = self.text.split_off(at);
        let head = std::mem::replace(&mut self.text, tail);
        let split = self.substitutions.partition_point(|&(offset, _)| offset < at);
        let mut tail_substitutions = self.substitutions.split_off(split);
        for (offset, _) in &mut tail_substitutions {
            *offset -= at;
        }
        Segment {
            text: head,
            substitutions: std::mem::replace(&mut self.substitutions, tail_substitutions),
        }
    }
}

fn raw_len(encoding: &dyn Encoding, text: &str, substitutions: &[(usize, usize)]) -> usize {
    let replacement = encoding.char_len(REPLACEMENT_CHARACTER);
    substitutions
        .iter()
        .fold(encoding.encoded_len(text), |len, &(_, raw)| len - replacement + raw)
}

/// Pay for characters at the front of `segment` out of `budget`.
///
/// Returns the index of the first character not fully paid for. When the
/// budget runs out inside a character, the part paid is added to `prepaid`.
fn pay_chars(
    encoding: &dyn Encoding,
    segment: &Segment,
    budget: &mut usize,
    prepaid: &mut usize,
) -> usize {
    for (index, ch) in segment.text.char_indices() {
        if *budget == 0 {
            return index;
        }
        let cost = segment.char_raw_len(encoding, index, ch) - *prepaid;
        if cost > *budget {
            *prepaid += *budget;
            *budget = 0;
            return index;
        }
        *budget -= cost;
        *prepaid = 0;
    }
    segment.text.len()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::encoding::{Ascii, Latin1, Utf8};

    fn utf8_buffer() -> DecodedBuffer {
        DecodedBuffer::new(Arc::new(Utf8))
    }

    #[test]
    fn lines_are_cut_at_each_newline() {
        let mut buf = utf8_buffer();
        assert_eq!(buf.feed(b"one\ntwo\nthr"), 2);
        assert_eq!(buf.partial(), "thr");
        assert_eq!(buf.take_line().as_deref(), Some("one"));
        assert_eq!(buf.take_line().as_deref(), Some("two"));
        assert_eq!(buf.take_line(), None);

        assert_eq!(buf.feed(b"ee\n"), 1);
        assert_eq!(buf.take_line().as_deref(), Some("three"));
        assert!(buf.is_empty());
    }

    #[test]
    fn one_carriage_return_is_trimmed_from_lines() {
        let mut buf = utf8_buffer();
        buf.feed(b"crlf\r\ndouble\r\r\n\n");
        assert_eq!(buf.take_line().as_deref(), Some("crlf"));
        assert_eq!(buf.take_line().as_deref(), Some("double\r"));
        assert_eq!(buf.take_line().as_deref(), Some(""));
        assert_eq!(buf.buffered_bytes(), 0);
    }

    #[test]
    fn two_byte_counts_split_a_flat_stream() {
        let mut buf = utf8_buffer();
        buf.feed(b"ABCDEFGHIJ");
        assert_eq!(buf.take_bytes(5).as_deref(), Some("ABCDE"));
        assert_eq!(buf.take_bytes(5).as_deref(), Some("FGHIJ"));
        assert_eq!(buf.take_bytes(1), None);
    }

    #[test]
    fn byte_count_spans_records_and_keeps_remainder() {
        let mut buf = utf8_buffer();
        buf.feed(b"ab\ncd\nef");
        assert_eq!(buf.take_bytes(4).as_deref(), Some("ab\nc"));
        assert_eq!(buf.take_line().as_deref(), Some("d"));
        assert_eq!(buf.take_bytes(2).as_deref(), Some("ef"));
        assert!(buf.is_empty());
    }

    #[test]
    fn byte_count_ending_on_record_text_leaves_empty_line() {
        let mut buf = utf8_buffer();
        buf.feed(b"abc\nx");
        assert_eq!(buf.take_bytes(3).as_deref(), Some("abc"));
        assert_eq!(buf.take_line().as_deref(), Some(""));
        assert_eq!(buf.partial(), "x");
    }

    #[test]
    fn byte_count_keeps_carriage_returns() {
        let mut buf = utf8_buffer();
        buf.feed(b"a\r\nb");
        assert_eq!(buf.take_bytes(4).as_deref(), Some("a\r\nb"));
    }

    #[test]
    fn byte_count_counts_encoded_bytes_not_chars() {
        let mut buf = utf8_buffer();
        buf.feed("café!".as_bytes());
        assert_eq!(buf.take_bytes(5).as_deref(), Some("café"));
        assert_eq!(buf.take_bytes(1).as_deref(), Some("!"));
    }

    #[test]
    fn byte_count_ending_inside_a_character_delivers_it_with_the_rest() {
        let mut buf = utf8_buffer();
        buf.feed("aé\n".as_bytes());
        assert_eq!(buf.take_bytes(2).as_deref(), Some("a"));
        assert_eq!(buf.buffered_bytes(), 2);
        assert_eq!(buf.take_bytes(1).as_deref(), Some("é"));
        assert_eq!(buf.buffered_bytes(), 1);
        assert_eq!(buf.take_line().as_deref(), Some(""));
        assert!(buf.is_empty());
    }

    #[test]
    fn line_after_partly_counted_character_returns_it_whole() {
        let mut buf = utf8_buffer();
        buf.feed("aé\nb".as_bytes());
        assert_eq!(buf.take_bytes(2).as_deref(), Some("a"));
        assert_eq!(buf.take_line().as_deref(), Some("é"));
        assert_eq!(buf.buffered_bytes(), 1);
        assert_eq!(buf.take_bytes(1).as_deref(), Some("b"));
    }

    #[test]
    fn small_byte_counts_stay_aligned_with_the_wire() {
        let wire = "🦀é\nz";
        let mut buf = utf8_buffer();
        buf.feed(wire.as_bytes());

        let mut taken = Vec::new();
        for count in [3, 2, 1, 2] {
            let before = buf.buffered_bytes();
            taken.push(buf.take_bytes(count).expect("enough bytes are buffered"));
            assert_eq!(buf.buffered_bytes(), before - count);
        }
        assert_eq!(taken, ["", "🦀", "é", "\nz"]);
        assert_eq!(taken.concat(), wire);
        assert!(buf.is_empty());
    }

    #[test]
    fn single_byte_counts_rebuild_multibyte_text() {
        let wire = "ñ€🦀\n";
        let mut buf = utf8_buffer();
        buf.feed(wire.as_bytes());

        let mut out = String::new();
        for _ in 0..wire.len() {
            out.push_str(&buf.take_bytes(1).expect("one byte is buffered"));
        }
        assert_eq!(out, wire);
        assert_eq!(buf.take_bytes(1), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn invalid_bytes_count_their_raw_width() {
        let mut buf = utf8_buffer();
        buf.feed(b"\xFF\xFF");
        assert_eq!(buf.buffered_bytes(), 2);
        assert_eq!(buf.take_bytes(3), None);
        assert_eq!(buf.take_bytes(2).as_deref(), Some("\u{FFFD}\u{FFFD}"));
        assert!(buf.is_empty());
    }

    #[test]
    fn invalid_bytes_inside_records_keep_their_width() {
        let mut buf = utf8_buffer();
        assert_eq!(buf.feed(b"\xFFa\n\xFEb\n\xFD"), 2);
        assert_eq!(buf.buffered_bytes(), 7);
        assert_eq!(buf.take_line().as_deref(), Some("\u{FFFD}a"));
        assert_eq!(buf.buffered_bytes(), 4);
        assert_eq!(buf.take_bytes(4).as_deref(), Some("\u{FFFD}b\n\u{FFFD}"));
        assert!(buf.is_empty());
    }

    #[test]
    fn literal_replacement_character_counts_three_bytes() {
        let mut buf = utf8_buffer();
        buf.feed(b"\xEF\xBF\xBD\xFF");
        assert_eq!(buf.buffered_bytes(), 4);
        assert_eq!(buf.take_bytes(3).as_deref(), Some("\u{FFFD}"));
        assert_eq!(buf.take_bytes(1).as_deref(), Some("\u{FFFD}"));
    }

    #[test]
    fn many_records_in_one_feed_keep_order() {
        let wire: String = (0..2000).map(|n| format!("{n}\n")).collect();
        let mut buf = utf8_buffer();
        assert_eq!(buf.feed(wire.as_bytes()), 2000);
        for n in 0..2000 {
            assert_eq!(buf.take_line(), Some(n.to_string()));
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn insufficient_data_consumes_nothing() {
        let mut buf = utf8_buffer();
        buf.feed(b"abc");
        assert_eq!(buf.take_bytes(4), None);
        assert_eq!(buf.take_line(), None);
        assert_eq!(buf.buffered_bytes(), 3);
        assert_eq!(buf.partial(), "abc");
    }

    #[test]
    fn carry_state_completes_across_feeds() {
        let mut buf = utf8_buffer();
        assert_eq!(buf.feed(b"caf\xC3"), 0);
        assert!(buf.has_pending_decode());
        assert_eq!(buf.buffered_bytes(), 3);

        assert_eq!(buf.feed(b"\xA9\n"), 1);
        assert_eq!(buf.take_line().as_deref(), Some("café"));
    }

    #[test]
    fn finish_flushes_truncated_tail() {
        let mut buf = utf8_buffer();
        buf.feed(b"x\xC3");
        assert_eq!(buf.buffered_bytes(), 1);
        buf.finish();
        assert_eq!(buf.partial(), "x\u{FFFD}");
        assert_eq!(buf.buffered_bytes(), 2);
        assert!(!buf.has_pending_decode());
    }

    #[test]
    fn single_byte_encoding_counts_one_per_char() {
        let mut buf = DecodedBuffer::new(Arc::new(Latin1));
        buf.feed(b"caf\xE9\nz");
        assert_eq!(buf.buffered_bytes(), 6);
        assert_eq!(buf.take_bytes(5).as_deref(), Some("café\n"));
        assert_eq!(buf.take(ReceiveKind::Bytes(1)).as_deref(), Some("z"));
    }

    #[test]
    fn ascii_high_bytes_count_one_each() {
        let mut buf = DecodedBuffer::new(Arc::new(Ascii));
        buf.feed(b"a\x80\n");
        assert_eq!(buf.buffered_bytes(), 3);
        assert_eq!(buf.take_line().as_deref(), Some("a\u{FFFD}"));
        assert!(buf.is_empty());
    }

    #[test]
    fn receive_kind_from_length() {
        assert_eq!(ReceiveKind::from_length(0), ReceiveKind::Line);
        assert_eq!(ReceiveKind::from_length(-7), ReceiveKind::Line);
        assert_eq!(ReceiveKind::from_length(12), ReceiveKind::Bytes(12));
    }
}
