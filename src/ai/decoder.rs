use crate::error::{StreamError, StreamResult};

const REPLACEMENT: char = '\u{FFFD}';

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DecodeMode {
    /// Replace each malformed sequence with U+FFFD.
    #[default]
    Lossy,
    /// Fail on the first malformed sequence.
    Strict,
}

/// Incremental UTF-8 decoder.
///
/// A multi-byte character split across chunks is held back until the rest of
/// its bytes arrive, so chunk boundaries never corrupt text.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
    mode: DecodeMode,
    /// Strict-mode failure held back so the text before it can be emitted first.
    failed: Option<usize>,
}

impl Utf8StreamDecoder {
    pub fn new(mode: DecodeMode) -> Self {
        Self {
            pending: Vec::new(),
            mode,
            failed: None,
        }
    }

    /// Bytes of an unfinished character carried over from the last chunk.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Decode the next chunk.
    ///
    /// In strict mode, text that precedes a malformed sequence is still
    /// returned; the error surfaces on the following `decode` or `finish`.
    pub fn decode(&mut self, chunk: &[u8]) -> StreamResult<String> {
        if let Some(len) = self.failed.take() {
            return Err(StreamError::Decode { len });
        }
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(std::str::from_utf8(&rest[..valid]).unwrap_or_default());
                    match err.error_len() {
                        Some(len) if self.mode == DecodeMode::Strict => {
                            if out.is_empty() {
                                return Err(StreamError::Decode { len });
                            }
                            self.failed = Some(len);
                            break;
                        }
                        Some(len) => {
                            out.push(REPLACEMENT);
                            rest = &rest[valid + len..];
                        }
                        None => {
                            self.pending.extend_from_slice(&rest[valid..]);
                            break;
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    /// Flush at end of stream. A dangling partial character is malformed.
    pub fn finish(&mut self) -> StreamResult<String> {
        if let Some(len) = self.failed.take() {
            self.pending.clear();
            return Err(StreamError::Decode { len });
        }
        if self.pending.is_empty() {
            return Ok(String::new());
        }
        let len = self.pending.len();
        self.pending.clear();
        self.reject(len)?;
        Ok(REPLACEMENT.to_string())
    }

    fn reject(&self, len: usize) -> StreamResult<()> {
        match self.mode {
            DecodeMode::Lossy => Ok(()),
            DecodeMode::Strict => Err(StreamError::Decode { len }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_ascii_through() {
        let mut decoder = Utf8StreamDecoder::default();
        assert_eq!(decoder.decode(b"Section 420").unwrap(), "Section 420");
        assert_eq!(decoder.finish().unwrap(), "");
    }

    #[test]
    fn joins_character_split_across_chunks() {
        // "धारा" (Hindi), split inside the second character.
        let text = "धारा";
        let bytes = text.as_bytes();
        let mut decoder = Utf8StreamDecoder::default();
        let first = decoder.decode(&bytes[..4]).unwrap();
        assert_eq!(first, "ध");
        assert_eq!(decoder.pending().len(), 1);
        let second = decoder.decode(&bytes[4..]).unwrap();
        assert_eq!(format!("{first}{second}"), text);
        assert!(decoder.pending().is_empty());
    }

    #[test]
    fn survives_one_byte_chunks() {
        let text = "ন্যায় ⚖ justice";
        let mut decoder = Utf8StreamDecoder::default();
        let mut out = String::new();
        for byte in text.as_bytes() {
            out.push_str(&decoder.decode(std::slice::from_ref(byte)).unwrap());
        }
        out.push_str(&decoder.finish().unwrap());
        assert_eq!(out, text);
    }

    #[test]
    fn lossy_mode_replaces_bad_bytes() {
        let mut decoder = Utf8StreamDecoder::new(DecodeMode::Lossy);
        assert_eq!(decoder.decode(b"ok\xFFok").unwrap(), "ok\u{FFFD}ok");
    }

    #[test]
    fn strict_mode_rejects_bad_bytes() {
        let mut decoder = Utf8StreamDecoder::new(DecodeMode::Strict);
        assert!(matches!(
            decoder.decode(b"\xFFok"),
            Err(StreamError::Decode { len: 1 })
        ));
    }

    #[test]
    fn strict_mode_returns_text_before_the_bad_bytes() {
        let mut decoder = Utf8StreamDecoder::new(DecodeMode::Strict);
        assert_eq!(decoder.decode(b"Section 420 \xFFrest").unwrap(), "Section 420 ");
        assert!(matches!(
            decoder.decode(b"more"),
            Err(StreamError::Decode { len: 1 })
        ));

        let mut flushed = Utf8StreamDecoder::new(DecodeMode::Strict);
        assert_eq!(flushed.decode(b"ok\xFF").unwrap(), "ok");
        assert!(matches!(flushed.finish(), Err(StreamError::Decode { len: 1 })));
    }

    #[test]
    fn dangling_bytes_at_end_of_stream() {
        let euro = "€".as_bytes();
        let mut lossy = Utf8StreamDecoder::new(DecodeMode::Lossy);
        assert_eq!(lossy.decode(&euro[..2]).unwrap(), "");
        assert_eq!(lossy.finish().unwrap(), "\u{FFFD}");

        let mut strict = Utf8StreamDecoder::new(DecodeMode::Strict);
        assert_eq!(strict.decode(&euro[..2]).unwrap(), "");
        assert!(matches!(strict.finish(), Err(StreamError::Decode { len: 2 })));
    }
}
