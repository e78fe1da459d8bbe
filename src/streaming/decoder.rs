//! Incremental UTF-8 decoder for streamed response bodies
//!
//! Transport chunks are cut at arbitrary byte offsets, so a multi-byte
//! character can straddle two chunks. The decoder keeps the incomplete tail
//! of one chunk and prepends it to the next instead of emitting replacement
//! characters.
//!
//! ```text
//! chunk 1: [.. 0xE2]         -> emits "..", keeps [0xE2]
//! chunk 2: [0x82 0xAC ..]    -> emits "€.."
//! ```
//!
//! Bytes that can never start or continue a valid sequence are replaced with
//! U+FFFD; decoding never fails.

use std::borrow::Cow;

/// Longest incomplete UTF-8 prefix that can be carried between chunks
const MAX_PENDING: usize = 3;

/// Stateful decoder carrying partial sequences between calls
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self {
            pending: Vec::with_capacity(MAX_PENDING),
        }
    }

    /// Decode one chunk, returning all text that is complete so far
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let data: Cow<'_, [u8]> = if self.pending.is_empty() {
            Cow::Borrowed(bytes)
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.extend_from_slice(bytes);
            Cow::Owned(joined)
        };

        let mut out = String::with_capacity(data.len());
        let mut rest: &[u8] = &data;

        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid]));

                    match err.error_len() {
                        // Truncated sequence at the end: wait for the next chunk
                        None => {
                            self.pending.extend_from_slice(&rest[valid..]);
                            break;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[valid + len..];
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush at end of stream; a dangling partial sequence becomes U+FFFD
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }

    /// Number of bytes held back waiting for continuation
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn decode_in_chunks(bytes: &[u8], cuts: &[usize]) -> String {
        let mut points: Vec<usize> = cuts
            .iter()
            .map(|c| if bytes.is_empty() { 0 } else { c % (bytes.len() + 1) })
            .collect();
        points.sort_unstable();

        let mut decoder = Utf8Decoder::new();
        let mut out = String::new();
        let mut start = 0;
        for point in points {
            out.push_str(&decoder.decode(&bytes[start..point]));
            start = point;
        }
        out.push_str(&decoder.decode(&bytes[start..]));
        out.push_str(&decoder.finish());
        out
    }

    #[test]
    fn test_ascii_passthrough() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"hello "), "hello ");
        assert_eq!(decoder.decode(b"world"), "world");
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_three_byte_char_split_one_plus_two() {
        let euro = "€".as_bytes();
        assert_eq!(euro.len(), 3);

        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&euro[..1]), "");
        assert_eq!(decoder.pending_len(), 1);
        assert_eq!(decoder.decode(&euro[1..]), "€");
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_four_byte_char_split_byte_by_byte() {
        let text = "a😀b";
        let mut decoder = Utf8Decoder::new();
        let mut out = String::new();
        for byte in text.as_bytes() {
            out.push_str(&decoder.decode(std::slice::from_ref(byte)));
        }
        assert_eq!(out, text);
    }

    #[test]
    fn test_invalid_byte_is_replaced_not_fatal() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"ok\xFFok"), "ok\u{FFFD}ok");
    }

    #[test]
    fn test_dangling_sequence_flushed_on_finish() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"x\xE2\x82"), "x");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_empty_chunk_keeps_pending_state() {
        let bytes = "ß".as_bytes();
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&bytes[..1]), "");
        assert_eq!(decoder.decode(b""), "");
        assert_eq!(decoder.decode(&bytes[1..]), "ß");
    }

    #[quickcheck]
    fn prop_chunked_decode_matches_whole(text: String, cuts: Vec<usize>) -> bool {
        decode_in_chunks(text.as_bytes(), &cuts) == text
    }

    #[quickcheck]
    fn prop_chunked_decode_matches_lossy_for_any_bytes(bytes: Vec<u8>, cuts: Vec<usize>) -> bool {
        decode_in_chunks(&bytes, &cuts) == String::from_utf8_lossy(&bytes)
    }
}
