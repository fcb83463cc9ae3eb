//! Incremental NDJSON parsing for the question-answering stream.
//!
//! Bytes flow through [`Utf8Decoder`] into [`LineBuffer`], and every complete
//! line is handed to [`parse_fragment`]. [`StreamParser`] wires the three
//! together so callers feed raw chunks and get parsed lines back in order.

use crate::config::TrailingLinePolicy;
use crate::error::{DecodeError, FragmentParseError};
use serde_json::Value;

/// Key carrying the answer text in each NDJSON object.
pub const FRAGMENT_TEXT_KEY: &str = "response";

const REPLACEMENT: char = '\u{FFFD}';
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Streaming UTF-8 decoder that carries partial code points between chunks.
/// A byte order mark at the very start of the stream is dropped.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    carry: Vec<u8>,
    offset: usize,
    bom_checked: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    pub errors: Vec<DecodeError>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one chunk. An incomplete trailing sequence is held back and
    /// prepended to the next chunk; invalid sequences become U+FFFD.
    pub fn decode(&mut self, chunk: &[u8]) -> Decoded {
        let mut decoded = Decoded::default();
        if chunk.is_empty() {
            return decoded;
        }

        let mut bytes = std::mem::take(&mut self.carry);
        bytes.extend_from_slice(chunk);
        let mut rest: &[u8] = &bytes;

        if !self.bom_checked {
            if rest.len() < UTF8_BOM.len() && UTF8_BOM.starts_with(rest) {
                self.carry = bytes;
                return decoded;
            }
            self.bom_checked = true;
            if rest.starts_with(UTF8_BOM) {
                rest = &rest[UTF8_BOM.len()..];
                self.offset += UTF8_BOM.len();
            }
        }

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    decoded.text.push_str(valid);
                    self.offset += rest.len();
                    break;
                }
                Err(error) => {
                    let valid_up_to = error.valid_up_to();
                    decoded
                        .text
                        .push_str(&String::from_utf8_lossy(&rest[..valid_up_to]));
                    self.offset += valid_up_to;

                    match error.error_len() {
                        Some(len) => {
                            decoded.errors.push(DecodeError::InvalidSequence {
                                offset: self.offset,
                                len,
                            });
                            decoded.text.push(REPLACEMENT);
                            self.offset += len;
                            rest = &rest[valid_up_to + len..];
                        }
                        None => {
                            self.carry = rest[valid_up_to..].to_vec();
                            break;
                        }
                    }
                }
            }
        }

        decoded
    }

    /// Flush at end of stream. A leftover partial sequence is substituted
    /// and reported.
    pub fn finish(&mut self) -> Decoded {
        let mut decoded = Decoded::default();
        if self.carry.is_empty() {
            return decoded;
        }

        let len = self.carry.len();
        self.carry.clear();
        self.offset += len;
        decoded.errors.push(DecodeError::TruncatedSequence { len });
        decoded.text.push(REPLACEMENT);
        decoded
    }

    pub fn carried_len(&self) -> usize {
        self.carry.len()
    }
}

/// Accumulates decoded text and releases only newline-terminated lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text and return the non-blank complete lines, in order. Text
    /// after the last newline stays pending.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        // Pending text never holds a newline between pushes.
        let Some(newline_in_text) = text.rfind('\n') else {
            self.pending.push_str(text);
            return Vec::new();
        };
        let last_newline = self.pending.len() + newline_in_text;
        self.pending.push_str(text);

        let remainder = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, remainder);

        complete
            .split('\n')
            .filter(|line| !line.trim().is_empty())
            .map(ToOwned::to_owned)
            .collect()
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn take_remainder(&mut self) -> String {
        std::mem::take(&mut self.pending)
    }
}

/// Answer text carried by one NDJSON line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
}

impl Fragment {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Parse one complete line. Any JSON value is accepted; text comes from a
/// string `response` field and is empty otherwise.
pub fn parse_fragment(line: &str) -> Result<Fragment, FragmentParseError> {
    let value: Value =
        serde_json::from_str(line).map_err(|error| FragmentParseError::new(line, error))?;

    let text = value
        .get(FRAGMENT_TEXT_KEY)
        .and_then(Value::as_str)
        .unwrap_or_default();

    Ok(Fragment::new(text))
}

pub type ParsedLine = Result<Fragment, FragmentParseError>;

/// Everything one chunk (or the end-of-stream flush) produced.
#[derive(Debug, Default)]
pub struct ParsedChunk {
    pub lines: Vec<ParsedLine>,
    pub decode_errors: Vec<DecodeError>,
    /// Unterminated text dropped at end of stream.
    pub discarded: Option<String>,
}

#[derive(Debug, Default)]
pub struct StreamParser {
    decoder: Utf8Decoder,
    lines: LineBuffer,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, chunk: &[u8]) -> ParsedChunk {
        let decoded = self.decoder.decode(chunk);
        let lines = self
            .lines
            .push(&decoded.text)
            .iter()
            .map(|line| parse_fragment(line))
            .collect();

        ParsedChunk {
            lines,
            decode_errors: decoded.errors,
            discarded: None,
        }
    }

    /// Flush the decoder and resolve whatever is left in the line buffer
    /// according to `policy`.
    pub fn finish(&mut self, policy: TrailingLinePolicy) -> ParsedChunk {
        let decoded = self.decoder.finish();
        let mut lines: Vec<ParsedLine> = self
            .lines
            .push(&decoded.text)
            .iter()
            .map(|line| parse_fragment(line))
            .collect();

        let residual = self.lines.take_remainder();
        let mut discarded = None;
        if !residual.trim().is_empty() {
            match policy {
                TrailingLinePolicy::Flush => lines.push(parse_fragment(&residual)),
                TrailingLinePolicy::Discard => discarded = Some(residual),
            }
        }

        ParsedChunk {
            lines,
            decode_errors: decoded.errors,
            discarded,
        }
    }

    pub fn pending(&self) -> &str {
        self.lines.pending()
    }
}
