//! Document source abstraction
//!
//! The engine only needs the current text of a document and a mapping
//! between byte offsets and line/character positions. Characters are counted
//! in UTF-16 code units, matching editor protocol positions.

use serde::{Deserialize, Serialize};

/// Zero-based line/character position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// Half-open range between two positions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Empty range at the start of the document
    pub fn document_start() -> Self {
        Self::default()
    }
}

/// Source of document text
pub trait TextDocument {
    /// Document identifier (usually a file path or URI)
    fn uri(&self) -> &str;

    /// Monotonic edit version
    fn version(&self) -> i32;

    /// Current full text
    fn text(&self) -> &str;

    /// Byte offset of a position
    fn offset_at(&self, position: Position) -> usize;

    /// Position of a byte offset
    fn position_at(&self, offset: usize) -> Position;
}

/// Precomputed line starts for offset/position conversion
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            line_starts,
            len: text.len(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Convert a byte offset to a position; offsets past the end clamp to the end
    pub fn position_at(&self, text: &str, offset: usize) -> Position {
        let offset = clamp_offset(text, offset);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let line_start = self.line_starts[line];
        let character: usize = text[line_start..offset].chars().map(char::len_utf16).sum();
        Position::new(line as u32, character as u32)
    }

    /// Convert a position to a byte offset; positions past a line's end clamp to it
    pub fn offset_at(&self, text: &str, position: Position) -> usize {
        let line = position.line as usize;
        if line >= self.line_starts.len() {
            return self.len;
        }
        let line_start = self.line_starts[line];
        let line_end = self
            .line_starts
            .get(line + 1)
            .map(|next| next - 1)
            .unwrap_or(self.len);

        let mut utf16 = 0u32;
        for (byte_off, ch) in text[line_start..line_end].char_indices() {
            if utf16 >= position.character {
                return line_start + byte_off;
            }
            utf16 += ch.len_utf16() as u32;
        }
        line_end
    }
}

/// Clamp an offset into `text` and down to the previous char boundary
pub fn clamp_offset(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// In-memory document
#[derive(Debug, Clone)]
pub struct SourceDocument {
    uri: String,
    version: i32,
    text: String,
    index: LineIndex,
}

impl SourceDocument {
    pub fn new(uri: impl Into<String>, version: i32, text: impl Into<String>) -> Self {
        let text = text.into();
        let index = LineIndex::new(&text);
        Self {
            uri: uri.into(),
            version,
            text,
            index,
        }
    }

    /// Replace the full text
    pub fn update(&mut self, version: i32, text: impl Into<String>) {
        self.text = text.into();
        self.index = LineIndex::new(&self.text);
        self.version = version;
    }

    /// Range covering the byte span `start..end`
    pub fn range_of(&self, start: usize, end: usize) -> Range {
        Range::new(self.position_at(start), self.position_at(end))
    }
}

impl TextDocument for SourceDocument {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn offset_at(&self, position: Position) -> usize {
        self.index.offset_at(&self.text, position)
    }

    fn position_at(&self, offset: usize) -> Position {
        self.index.position_at(&self.text, offset)
    }
}
