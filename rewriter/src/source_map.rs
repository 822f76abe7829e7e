// Byte offset → line:column mapping with preamble correction.
//
// Positions recorded in metadata must refer to the user's original file. When
// a compatibility preamble of N lines was injected ahead of the real source
// before parsing, every location's line component is corrected by
// subtracting N here, structurally — downstream code never does arithmetic
// on printed "file:line:col" strings.
//
// Preconditions: the map is built over exactly the text that was parsed.
// Postconditions: locations are 1-based in the user's file.
// Failure modes: none (offsets past the end clamp to the last line).
// Side effects: none.

use serde::Serialize;
use std::fmt;

/// A 1-based line:column position in the user's original file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Line-start table over the parsed text, carrying the preamble correction.
#[derive(Debug)]
pub struct SourceMap {
    line_starts: Vec<usize>,
    preamble_lines: u32,
}

impl SourceMap {
    /// Build the map over `text`. `preamble_lines` is the number of injected
    /// preamble lines to subtract from every reported line (0 if none).
    pub fn new(text: &str, preamble_lines: u32) -> Self {
        let mut line_starts = vec![0usize];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        SourceMap {
            line_starts,
            preamble_lines,
        }
    }

    /// Location of a byte offset, corrected for the injected preamble.
    pub fn location(&self, offset: usize) -> SourceLocation {
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let line = (line_idx as u32 + 1).saturating_sub(self.preamble_lines);
        let col = (offset - self.line_starts[line_idx]) as u32 + 1;
        SourceLocation { line, col }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_line_first_column() {
        let map = SourceMap::new("abc\ndef\n", 0);
        assert_eq!(map.location(0), SourceLocation { line: 1, col: 1 });
    }

    #[test]
    fn second_line() {
        let map = SourceMap::new("abc\ndef\n", 0);
        assert_eq!(map.location(4), SourceLocation { line: 2, col: 1 });
        assert_eq!(map.location(6), SourceLocation { line: 2, col: 3 });
    }

    #[test]
    fn preamble_correction_subtracts_lines() {
        // 2 preamble lines of 4 bytes each, then user code.
        let map = SourceMap::new("aaa\nbbb\nuser code\n", 2);
        assert_eq!(map.location(8), SourceLocation { line: 1, col: 1 });
        assert_eq!(map.location(13), SourceLocation { line: 1, col: 6 });
    }

    #[test]
    fn offset_at_newline_belongs_to_its_line() {
        let map = SourceMap::new("ab\ncd\n", 0);
        assert_eq!(map.location(2), SourceLocation { line: 1, col: 3 });
    }

    #[test]
    fn display_is_line_colon_col() {
        let loc = SourceLocation { line: 12, col: 5 };
        assert_eq!(loc.to_string(), "12:5");
    }
}
