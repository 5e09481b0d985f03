//! Position Context Analysis
//!
//! Classifies a byte offset inside raw, possibly incomplete JSON text and
//! computes the chain of object keys enclosing it. The scanner never fails:
//! the user is usually mid-edit, so anything it cannot make sense of comes
//! back as [`ContextKind::Root`] with an empty path.
//!
//! Array indices are never part of the path. An object nested in an array
//! sees the key that owns the array, so `{"a": [{"b": 1}]}` gives `["a"]`
//! inside `"b"` for every element of `a`.

use serde::{Deserialize, Serialize};

use crate::document::{clamp_offset, Position, TextDocument};

/// What the cursor is sitting on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextKind {
    PropertyKey,
    PropertyValue,
    ArrayItem,
    Root,
}

/// Result of analyzing one offset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonPositionContext {
    pub kind: ContextKind,
    /// Object keys from the document root to the enclosing object
    pub path: Vec<String>,
    /// Partial identifier under the cursor
    pub current_token: String,
    /// Key whose value encloses the cursor in the innermost scope, if any
    pub property_key: Option<String>,
    /// Whether the innermost open container is an array
    pub in_array: bool,
}

impl JsonPositionContext {
    fn root(current_token: String) -> Self {
        Self {
            kind: ContextKind::Root,
            path: Vec::new(),
            current_token,
            property_key: None,
            in_array: false,
        }
    }

    /// Path to the value being edited: `path` plus `property_key`
    pub fn value_path(&self) -> Vec<String> {
        let mut path = self.path.clone();
        path.extend(self.property_key.iter().cloned());
        path
    }
}

const DELIMITERS: &[u8] = b"{}[],:\"";

fn is_token_byte(b: u8) -> bool {
    !DELIMITERS.contains(&b) && !b.is_ascii_whitespace()
}

#[derive(Debug)]
enum Frame {
    /// `pushed` records whether opening this object pushed a path segment
    Object { pushed: bool },
    /// Key that owns the array, inherited by objects opened directly inside it
    Array { owner: Option<String> },
}

/// Left-to-right scanner state over `text[..offset]`
#[derive(Debug, Default)]
struct Scanner {
    frames: Vec<Frame>,
    path: Vec<String>,
    /// Last closed string, candidate key until the next significant byte
    last_string: Option<String>,
    /// Key awaiting its value in the innermost object
    pending_key: Option<String>,
    in_string: bool,
    escape: bool,
    string_start: usize,
}

impl Scanner {
    fn run(text: &str, end: usize) -> Self {
        let mut scanner = Self::default();
        let bytes = text.as_bytes();

        for (i, &b) in bytes[..end].iter().enumerate() {
            if scanner.in_string {
                if scanner.escape {
                    scanner.escape = false;
                } else if b == b'\\' {
                    scanner.escape = true;
                } else if b == b'"' {
                    scanner.in_string = false;
                    scanner.last_string = Some(unquote(&text[scanner.string_start..=i]));
                }
                continue;
            }

            if b.is_ascii_whitespace() {
                continue;
            }

            match b {
                b'"' => {
                    scanner.in_string = true;
                    scanner.string_start = i;
                }
                b':' => {
                    if matches!(scanner.frames.last(), Some(Frame::Object { .. })) {
                        scanner.pending_key = scanner.last_string.take();
                    }
                }
                b'{' => scanner.open_object(),
                b'[' => scanner.open_array(),
                b'}' => scanner.close(false),
                b']' => scanner.close(true),
                b',' => {
                    if matches!(scanner.frames.last(), Some(Frame::Object { .. })) {
                        scanner.pending_key = None;
                    }
                }
                _ => {}
            }

            if b != b'"' {
                scanner.last_string = None;
            }
        }

        scanner
    }

    fn owning_key(&mut self) -> Option<String> {
        match self.frames.last() {
            Some(Frame::Array { owner }) => owner.clone(),
            _ => self.pending_key.take(),
        }
    }

    fn open_object(&mut self) {
        let key = self.owning_key();
        let pushed = key.is_some();
        if let Some(key) = key {
            self.path.push(key);
        }
        self.pending_key = None;
        self.frames.push(Frame::Object { pushed });
    }

    fn open_array(&mut self) {
        let owner = self.owning_key();
        self.pending_key = None;
        self.frames.push(Frame::Array { owner });
    }

    fn close(&mut self, array: bool) {
        match (self.frames.last(), array) {
            (Some(Frame::Object { pushed }), false) => {
                if *pushed {
                    self.path.pop();
                }
                self.frames.pop();
            }
            (Some(Frame::Array { .. }), true) => {
                self.frames.pop();
            }
            // Mismatched bracket: ignore it, the user is mid-edit
            _ => {}
        }
        self.pending_key = None;
    }

    fn innermost_key(&self) -> Option<String> {
        match self.frames.last() {
            Some(Frame::Array { owner }) => owner.clone(),
            Some(Frame::Object { .. }) => self.pending_key.clone(),
            None => None,
        }
    }

    fn in_array(&self) -> bool {
        matches!(self.frames.last(), Some(Frame::Array { .. }))
    }

    fn in_object(&self) -> bool {
        matches!(self.frames.last(), Some(Frame::Object { .. }))
    }
}

/// Decode a quoted JSON string slice, falling back to the raw contents
fn unquote(quoted: &str) -> String {
    serde_json::from_str::<String>(quoted)
        .unwrap_or_else(|_| quoted.trim_matches('"').to_string())
}

/// Analyze `offset` in `text`
pub fn analyze(text: &str, offset: usize) -> JsonPositionContext {
    let offset = clamp_offset(text, offset);
    let bytes = text.as_bytes();
    let token = current_token(text, offset);
    let scanner = Scanner::run(text, offset);

    if scanner.frames.is_empty() && !scanner.in_string {
        return JsonPositionContext::root(token);
    }

    let kind = if scanner.in_string {
        classify_in_string(bytes, &scanner, offset)
    } else {
        classify_outside_string(bytes, &scanner, offset)
    };

    // Inside a key string the key being typed is not yet a pending key
    let property_key = match kind {
        ContextKind::PropertyKey | ContextKind::Root => None,
        _ => scanner.innermost_key(),
    };

    JsonPositionContext {
        kind,
        path: scanner.path.clone(),
        current_token: token,
        property_key,
        in_array: scanner.in_array(),
    }
}

/// Analyze a line/character position in a document
pub fn analyze_position(doc: &dyn TextDocument, position: Position) -> JsonPositionContext {
    analyze(doc.text(), doc.offset_at(position))
}

fn classify_in_string(bytes: &[u8], scanner: &Scanner, offset: usize) -> ContextKind {
    if string_followed_by_colon(bytes, offset) {
        return ContextKind::PropertyKey;
    }
    // Unterminated or value-less string right where a key belongs
    if scanner.in_object() && scanner.pending_key.is_none() {
        if let Some(prev) = previous_significant(bytes, scanner.string_start) {
            if prev == b'{' || prev == b',' {
                return ContextKind::PropertyKey;
            }
        }
    }
    ContextKind::PropertyValue
}

fn classify_outside_string(bytes: &[u8], scanner: &Scanner, offset: usize) -> ContextKind {
    // Look past the partial token being typed
    let mut start = offset;
    while start > 0 && is_token_byte(bytes[start - 1]) {
        start -= 1;
    }

    match previous_significant(bytes, start) {
        Some(b'{') => ContextKind::PropertyKey,
        Some(b',') if scanner.in_array() => ContextKind::ArrayItem,
        Some(b',') => ContextKind::PropertyKey,
        Some(b':') => ContextKind::PropertyValue,
        Some(b'[') => ContextKind::ArrayItem,
        _ => ContextKind::Root,
    }
}

/// Nearest non-whitespace byte strictly before `pos`
fn previous_significant(bytes: &[u8], pos: usize) -> Option<u8> {
    bytes[..pos].iter().rev().copied().find(|b| !b.is_ascii_whitespace())
}

/// From inside an open string, the index of its closing quote on the same line
fn closing_quote(bytes: &[u8], offset: usize) -> Option<usize> {
    let mut escape = false;
    for (i, &b) in bytes.iter().enumerate().skip(offset) {
        if escape {
            escape = false;
        } else if b == b'\\' {
            escape = true;
        } else if b == b'"' {
            return Some(i);
        } else if b == b'\n' {
            return None;
        }
    }
    None
}

/// From inside an open string, find its closing quote and check for a `:`
fn string_followed_by_colon(bytes: &[u8], offset: usize) -> bool {
    closing_quote(bytes, offset)
        .and_then(|i| bytes[i + 1..].iter().find(|b| !b.is_ascii_whitespace()))
        .map(|b| *b == b':')
        .unwrap_or(false)
}

/// Decoded contents and inner byte span of the string literal around `offset`
///
/// Unlike [`current_token`] this keeps `:` and other delimiters, so the cursor
/// anywhere in `"minecraft:health"` yields the whole key. `None` outside
/// strings and for strings not closed on the same line.
pub fn enclosing_string(text: &str, offset: usize) -> Option<(String, (usize, usize))> {
    let offset = clamp_offset(text, offset);
    let scanner = Scanner::run(text, offset);
    if !scanner.in_string {
        return None;
    }
    let close = closing_quote(text.as_bytes(), offset)?;
    let start = scanner.string_start;
    Some((unquote(&text[start..=close]), (start + 1, close)))
}

/// Byte span of the identifier fragment around `offset`
pub fn token_range(text: &str, offset: usize) -> (usize, usize) {
    let offset = clamp_offset(text, offset);
    let bytes = text.as_bytes();
    let mut start = offset;
    while start > 0 && is_token_byte(bytes[start - 1]) {
        start -= 1;
    }
    let mut end = offset;
    while end < bytes.len() && is_token_byte(bytes[end]) {
        end += 1;
    }
    (start, end)
}

/// Identifier fragment around `offset`
pub fn current_token(text: &str, offset: usize) -> String {
    let (start, end) = token_range(text, offset);
    // Token bytes exclude only ASCII delimiters, so both ends sit on char boundaries
    text[start..end].to_string()
}

/// Byte range of the first occurrence of `"key"`, quotes included
pub fn find_key_range(text: &str, key: &str) -> Option<(usize, usize)> {
    let quoted = format!("\"{}\"", key);
    text.find(&quoted).map(|start| (start, start + quoted.len()))
}

/// Byte range of the first occurrence of `word` anywhere in the text
pub fn find_word_range(text: &str, word: &str) -> Option<(usize, usize)> {
    if word.is_empty() {
        return None;
    }
    text.find(word).map(|start| (start, start + word.len()))
}
