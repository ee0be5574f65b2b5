use std::fmt;

/// A single point in a schema source file, 1-indexed to match editor conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Position {
    pub filename: &'static str,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(filename: &'static str, line: usize, column: usize) -> Self {
        Self {
            filename,
            line,
            column,
        }
    }

    /// A placeholder position for synthesized nodes (built-in fields, the implicit
    /// Identity model) that don't originate from any source file.
    pub fn synthetic() -> Self {
        Self {
            filename: "<built-in>",
            line: 0,
            column: 0,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.line, self.column)
    }
}

/// A span covering the full extent of a token or node, used for
/// multi-character corrections (e.g. suggesting a rename).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}
