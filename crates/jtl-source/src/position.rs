use serde::Serialize;

/// A point in template source.
///
/// `offset` is a byte offset into the source. `line` and `column` are 1-based;
/// columns count characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Position {
    offset: u32,
    line: u32,
    column: u32,
}

impl Position {
    #[must_use]
    pub fn new(offset: u32, line: u32, column: u32) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }

    /// The position of the first byte of a source.
    #[must_use]
    pub fn start() -> Self {
        Self::new(0, 1, 1)
    }

    #[must_use]
    pub fn offset(self) -> u32 {
        self.offset
    }

    #[must_use]
    pub fn offset_usize(self) -> usize {
        self.offset as usize
    }

    #[must_use]
    pub fn line(self) -> u32 {
        self.line
    }

    #[must_use]
    pub fn column(self) -> u32 {
        self.column
    }

    /// Advance past `ch`, moving to the next line on `\n`.
    #[must_use]
    pub fn advance(self, ch: char) -> Self {
        let offset = self
            .offset
            .saturating_add(u32::try_from(ch.len_utf8()).unwrap_or(u32::MAX));
        if ch == '\n' {
            Self::new(offset, self.line + 1, 1)
        } else {
            Self::new(offset, self.line, self.column + 1)
        }
    }

    /// Advance past every character of `text`.
    #[must_use]
    pub fn advance_str(self, text: &str) -> Self {
        text.chars().fold(self, Position::advance)
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

/// Line start table for converting byte offsets back into [`Position`]s.
///
/// Hosts use this when they hold a bare offset (an editor cursor, a byte range
/// from another tool) and need the same line/column the lexer would report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<u32>,
    length: u32,
}

impl LineIndex {
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let mut line_starts = vec![0];
        let mut pos = 0u32;

        for c in text.chars() {
            pos += u32::try_from(c.len_utf8()).unwrap_or(0);
            if c == '\n' {
                line_starts.push(pos);
            }
        }

        Self {
            line_starts,
            length: pos,
        }
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Resolve `offset` against `text`, which must be the text this index was built from.
    ///
    /// Offsets past the end clamp to the end of the text; offsets inside a
    /// multi-byte character resolve to the start of that character.
    #[must_use]
    pub fn position(&self, text: &str, offset: u32) -> Position {
        let offset = offset.min(self.length);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next.saturating_sub(1),
        };
        let line_start = self.line_starts[line] as usize;
        let mut end = offset as usize;
        while end > line_start && !text.is_char_boundary(end) {
            end -= 1;
        }
        let column = text
            .get(line_start..end)
            .map_or(0, |prefix| prefix.chars().count());

        Position::new(
            u32::try_from(end).unwrap_or(u32::MAX),
            u32::try_from(line + 1).unwrap_or(u32::MAX),
            u32::try_from(column + 1).unwrap_or(u32::MAX),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_tracks_lines_and_columns() {
        let pos = Position::start().advance_str("ab\ncd");
        assert_eq!(pos, Position::new(5, 2, 3));
    }

    #[test]
    fn test_advance_counts_multibyte_as_one_column() {
        let pos = Position::start().advance_str("é!");
        assert_eq!(pos.offset(), 3);
        assert_eq!(pos.column(), 3);
    }

    #[test]
    fn test_line_index_matches_incremental_positions() {
        let text = "{% if x %}\n  héllo\n{% endif %}";
        let index = LineIndex::from_text(text);
        let mut expected = Position::start();
        for (offset, ch) in text.char_indices() {
            let got = index.position(text, u32::try_from(offset).unwrap());
            assert_eq!(got, expected, "offset {offset}");
            expected = expected.advance(ch);
        }
        assert_eq!(index.line_count(), 3);
    }

    #[test]
    fn test_line_index_clamps_past_end() {
        let text = "ab";
        let index = LineIndex::from_text(text);
        assert_eq!(index.position(text, 99), Position::new(2, 1, 3));
    }
}
