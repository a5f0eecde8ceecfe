use std::fmt;

/// A line/column pair. Lines and columns are 1-based; line 0 marks an
/// unknown position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Source range of a node. `end.column` is exclusive, matching the parser
/// output the tree is built from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Location {
    pub begin: Position,
    pub end: Position,
}

impl Location {
    pub fn new(begin: Position, end: Position) -> Self {
        Self { begin, end }
    }

    /// Single-line span covering `start_col..end_col` on `line`.
    pub fn line(line: u32, start_col: u32, end_col: u32) -> Self {
        Self {
            begin: Position::new(line, start_col),
            end: Position::new(line, end_col),
        }
    }

    pub fn is_known(&self) -> bool {
        self.begin.line != 0
    }

    pub fn is_multiline(&self) -> bool {
        self.begin.line < self.end.line
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_multiline() {
            write!(f, "{}-{}", self.begin.line, self.end.line)
        } else {
            write!(
                f,
                "{}:{}-{}",
                self.begin.line, self.begin.column, self.end.column
            )
        }
    }
}
