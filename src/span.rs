//! Source positions.
//!
//! Every token carries a [`Span`], a half-open **byte** range into the
//! original source string. Byte offsets are the only currency used
//! throughout the crate; the [`SpanMap`] translates them into
//! line/column pairs for diagnostics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A half-open byte range `[start, end)` into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// The smallest span covering both `self` and `other`.
    pub fn join(&self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// A resolved source region, all fields 0-indexed.
///
/// Columns are byte columns within their line, consistent with [`Span`]
/// being a byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineCol {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl fmt::Display for LineCol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start_line, self.start_col, self.end_line, self.end_col
        )
    }
}

/// Per-line byte range recorded by the [`SpanMap`].
///
/// The range includes the terminating `\n`, so every byte offset of the
/// source falls into exactly one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct LineEntry {
    start: usize,
    /// Line length in bytes, excluding the terminating `\n`.
    len: usize,
}

/// Precomputed line table mapping byte offsets to line/column pairs.
///
/// Built once per source; `lookup` is O(log lines). The map is read-only
/// after construction and may be shared freely with diagnostics
/// consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanMap {
    lines: Vec<LineEntry>,
}

impl SpanMap {
    /// Scans the source once, recording the byte range of every line.
    pub fn new(source: &str) -> Self {
        let mut lines = Vec::new();
        let mut start = 0;
        for (offset, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                lines.push(LineEntry {
                    start,
                    len: offset - start,
                });
                start = offset + 1;
            }
        }
        if start <= source.len() {
            lines.push(LineEntry {
                start,
                len: source.len() - start,
            });
        }
        Self { lines }
    }

    /// Resolves a span to its line/column region.
    ///
    /// Returns `None` when the span's start lies beyond the recorded
    /// lines. An end beyond the last line clamps to it. Single-line
    /// spans collapse the end column to `start_col + len - 1`.
    pub fn lookup(&self, span: Span) -> Option<LineCol> {
        let (start_line, start_col) = self.position_of(span.start)?;
        let last_byte = if span.end > span.start {
            span.end - 1
        } else {
            span.start
        };
        let (end_line, end_col) = match self.position_of(last_byte) {
            Some(position) => position,
            None => {
                let last = self.lines.last()?;
                (self.lines.len() - 1, last.len)
            }
        };
        if start_line == end_line {
            let len = span.len().max(1);
            return Some(LineCol {
                start_line,
                start_col,
                end_line: start_line,
                end_col: start_col + len - 1,
            });
        }
        Some(LineCol {
            start_line,
            start_col,
            end_line,
            end_col,
        })
    }

    /// Number of recorded lines.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Binary-searches the line containing the given byte offset.
    fn position_of(&self, offset: usize) -> Option<(usize, usize)> {
        let index = self.lines.partition_point(|line| line.start <= offset);
        if index == 0 {
            return None;
        }
        let line = self.lines[index - 1];
        // The line's range includes its terminating newline; the last
        // line additionally absorbs the end-of-input offset.
        let end = line.start + line.len + 1;
        if offset < end || (index == self.lines.len() && offset == end) {
            Some((index - 1, offset - line.start))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_offsets_across_lines() {
        let map = SpanMap::new("abc\ndefg\nh");
        let region = map.lookup(Span::new(0, 3)).unwrap();
        assert_eq!(
            region,
            LineCol {
                start_line: 0,
                start_col: 0,
                end_line: 0,
                end_col: 2
            }
        );

        let region = map.lookup(Span::new(4, 8)).unwrap();
        assert_eq!(region.start_line, 1);
        assert_eq!(region.start_col, 0);
        assert_eq!(region.end_col, 3);
    }

    #[test]
    fn multi_line_span() {
        let map = SpanMap::new("abc\ndefg\nh");
        let region = map.lookup(Span::new(1, 6)).unwrap();
        assert_eq!(region.start_line, 0);
        assert_eq!(region.start_col, 1);
        assert_eq!(region.end_line, 1);
        assert_eq!(region.end_col, 1);
    }

    #[test]
    fn newline_belongs_to_its_line() {
        let map = SpanMap::new("ab\ncd");
        let region = map.lookup(Span::new(2, 3)).unwrap();
        assert_eq!(region.start_line, 0);
        assert_eq!(region.start_col, 2);
    }

    #[test]
    fn end_clamps_to_last_line() {
        let map = SpanMap::new("ab\ncd");
        // End-of-input sentinel span, one byte past the source.
        let region = map.lookup(Span::new(5, 6)).unwrap();
        assert_eq!(region.start_line, 1);
        assert_eq!(region.start_col, 2);
    }

    #[test]
    fn start_out_of_range_is_none() {
        let map = SpanMap::new("ab");
        assert!(map.lookup(Span::new(40, 41)).is_none());
    }

    #[test]
    fn empty_source_has_one_line() {
        let map = SpanMap::new("");
        assert_eq!(map.line_count(), 1);
        assert!(map.lookup(Span::new(0, 1)).is_some());
    }

    #[test]
    fn display_format() {
        let map = SpanMap::new("hello\nworld");
        let region = map.lookup(Span::new(6, 11)).unwrap();
        assert_eq!(region.to_string(), "1:0-1:4");
    }
}
