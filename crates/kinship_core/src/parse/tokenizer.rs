//! Document decoding and line tokenizing.
//!
//! # Responsibility
//! - Detect the document encoding from its byte-order mark and decode to UTF-8.
//! - Normalize line endings and split the document into `RawLine` tokens.
//!
//! # Invariants
//! - Blank lines are dropped without producing a diagnostic.
//! - A line that does not match the grammar yields a `LineDiagnostic`; it
//!   never aborts tokenizing of the remaining lines.
//! - Ids are stored without their `@` delimiters.
//! - Invalid UTF-8 bytes are replaced with U+FFFD, never rejected; only
//!   UTF-16 payloads can make a document unreadable.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::Lines;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16_LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16_BE_BOM: &[u8] = &[0xFE, 0xFF];
const MAX_DIAGNOSTIC_CHARS: usize = 200;
const REPLACEMENT_CHAR: char = char::REPLACEMENT_CHARACTER;

// level, optional @id@, tag, optional rest of line
static LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]+)\s+(?:@([^@\s]+)@\s+)?([A-Za-z0-9_]+)(?:\s+(.*))?$")
        .expect("valid line regex")
});

/// Encoding detected from the document prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl Display for DocumentEncoding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Utf8 => write!(f, "utf-8"),
            Self::Utf16Le => write!(f, "utf-16le"),
            Self::Utf16Be => write!(f, "utf-16be"),
        }
    }
}

/// Document bytes could not be decoded at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Bytes are not valid for the detected encoding.
    InvalidEncoding {
        encoding: DocumentEncoding,
        message: String,
    },
    /// UTF-16 payload has an odd number of bytes.
    TruncatedUtf16 { encoding: DocumentEncoding },
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEncoding { encoding, message } => {
                write!(f, "document is not valid {encoding}: {message}")
            }
            Self::TruncatedUtf16 { encoding } => {
                write!(f, "document {encoding} payload has an odd byte length")
            }
        }
    }
}

impl Error for DecodeError {}

/// One tokenized line of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// 1-based line position in the normalized document.
    pub line_number: usize,
    pub level: u32,
    pub id: Option<String>,
    pub tag: String,
    pub value: String,
}

/// Non-fatal report for one line that did not match the line grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineDiagnostic {
    pub line_number: usize,
    /// Offending line content, newline-free and length-capped.
    pub content: String,
    pub reason: String,
}

impl Display for LineDiagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "line {} skipped ({}): {}",
            self.line_number, self.reason, self.content
        )
    }
}

/// Detects the encoding of `bytes` by byte-order mark.
pub fn detect_encoding(bytes: &[u8]) -> DocumentEncoding {
    if bytes.starts_with(UTF16_LE_BOM) {
        DocumentEncoding::Utf16Le
    } else if bytes.starts_with(UTF16_BE_BOM) {
        DocumentEncoding::Utf16Be
    } else {
        DocumentEncoding::Utf8
    }
}

/// Decodes a whole document into UTF-8 text with `\n` line endings.
///
/// Unmarked input is treated as UTF-8; invalid sequences become U+FFFD.
///
/// # Errors
/// - Returns `DecodeError` when a UTF-16 payload is truncated or holds
///   unpaired surrogates.
pub fn decode_document(bytes: &[u8]) -> Result<String, DecodeError> {
    let text = match detect_encoding(bytes) {
        DocumentEncoding::Utf8 => {
            let payload = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
            String::from_utf8_lossy(payload).into_owned()
        }
        encoding @ (DocumentEncoding::Utf16Le | DocumentEncoding::Utf16Be) => {
            decode_utf16(&bytes[2..], encoding)?
        }
    };
    Ok(normalize_line_endings(&text))
}

fn decode_utf16(payload: &[u8], encoding: DocumentEncoding) -> Result<String, DecodeError> {
    if payload.len() % 2 != 0 {
        return Err(DecodeError::TruncatedUtf16 { encoding });
    }
    let units = payload
        .chunks_exact(2)
        .map(|pair| match encoding {
            DocumentEncoding::Utf16Be => u16::from_be_bytes([pair[0], pair[1]]),
            _ => u16::from_le_bytes([pair[0], pair[1]]),
        })
        .collect::<Vec<_>>();
    String::from_utf16(&units).map_err(|err| DecodeError::InvalidEncoding {
        encoding,
        message: err.to_string(),
    })
}

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// 1-based numbers of lines holding U+FFFD, i.e. bytes lost while decoding.
///
/// Numbering matches [`tokenize`].
pub fn lossy_line_numbers(text: &str) -> Vec<usize> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| line.contains(REPLACEMENT_CHAR))
        .map(|(index, _)| index + 1)
        .collect()
}

/// Starts lazy tokenizing of decoded document text.
pub fn tokenize(text: &str) -> LineTokens<'_> {
    LineTokens {
        lines: text.lines(),
        line_number: 0,
    }
}

/// Single-pass iterator over document lines.
///
/// Yields `Ok(RawLine)` for grammar matches and `Err(LineDiagnostic)` for
/// skipped lines. Blank lines produce nothing.
pub struct LineTokens<'a> {
    lines: Lines<'a>,
    line_number: usize,
}

impl Iterator for LineTokens<'_> {
    type Item = Result<RawLine, LineDiagnostic>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_number += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Some(parse_line(self.line_number, trimmed));
        }
    }
}

/// Parses one trimmed, non-blank line.
pub fn parse_line(line_number: usize, line: &str) -> Result<RawLine, LineDiagnostic> {
    let captures = LINE_RE
        .captures(line)
        .ok_or_else(|| diagnostic(line_number, line, "line does not match level/tag grammar"))?;

    let level = captures[1]
        .parse::<u32>()
        .map_err(|_| diagnostic(line_number, line, "level number out of range"))?;

    Ok(RawLine {
        line_number,
        level,
        id: captures.get(2).map(|m| m.as_str().to_string()),
        tag: captures[3].to_string(),
        value: captures
            .get(4)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default(),
    })
}

/// Splits a token stream into its lines, pushing diagnostics into `sink`.
pub fn split_diagnostics<'s, I>(
    tokens: I,
    sink: &'s mut Vec<LineDiagnostic>,
) -> impl Iterator<Item = RawLine> + 's
where
    I: IntoIterator<Item = Result<RawLine, LineDiagnostic>>,
    I::IntoIter: 's,
{
    tokens.into_iter().filter_map(move |token| match token {
        Ok(line) => Some(line),
        Err(diagnostic) => {
            sink.push(diagnostic);
            None
        }
    })
}

fn diagnostic(line_number: usize, line: &str, reason: &str) -> LineDiagnostic {
    let mut content = line.chars().take(MAX_DIAGNOSTIC_CHARS).collect::<String>();
    if line.chars().count() > MAX_DIAGNOSTIC_CHARS {
        content.push_str("...");
    }
    LineDiagnostic {
        line_number,
        content,
        reason: reason.to_string(),
    }
}
