use crate::url::ResolvedUrl;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Zero-based line/column position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Translate a position relative to an inline document into its
    /// container. Only the first line is shifted horizontally.
    pub fn offset_by(self, offset: Position) -> Self {
        if self.line == 0 {
            Self::new(offset.line, self.column + offset.column)
        } else {
            Self::new(self.line + offset.line, self.column)
        }
    }
}

/// Half-open range inside one file. The file is the owning document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRange {
    pub file: ResolvedUrl,
    pub start: Position,
    pub end: Position,
}

impl SourceRange {
    pub fn new(file: ResolvedUrl, start: Position, end: Position) -> Self {
        Self { file, start, end }
    }

    /// Zero-width range at the start of `file`
    pub fn zero(file: ResolvedUrl) -> Self {
        Self::new(file, Position::default(), Position::default())
    }

    /// Range covering `contents`, beginning at `start`.
    pub fn spanning(file: ResolvedUrl, start: Position, contents: &str) -> Self {
        let mut end = Position::default();
        for (idx, line) in contents.split('\n').enumerate() {
            end = Position::new(idx as u32, line.len() as u32);
        }
        let end = end.offset_by(start);
        Self::new(file, start, end)
    }

    pub fn contains(&self, other: &SourceRange) -> bool {
        self.file == other.file && self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.file,
            self.start.line + 1,
            self.start.column + 1
        )
    }
}
