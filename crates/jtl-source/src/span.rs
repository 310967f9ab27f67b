use std::ops::Range;

use serde::Serialize;

use crate::Position;

/// A half-open source range `[start, end)`.
///
/// Construction never yields an end before the start: an inverted pair is
/// collapsed to an empty span at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
    start: Position,
    end: Position,
}

impl Span {
    #[must_use]
    pub fn new(start: Position, end: Position) -> Self {
        if end.offset() < start.offset() {
            return Self::point(start);
        }
        Self { start, end }
    }

    /// An empty span at `position`.
    #[must_use]
    pub fn point(position: Position) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    #[must_use]
    pub fn start(self) -> Position {
        self.start
    }

    #[must_use]
    pub fn end(self) -> Position {
        self.end
    }

    #[must_use]
    pub fn len(self) -> u32 {
        self.end.offset() - self.start.offset()
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn range(self) -> Range<usize> {
        self.start.offset_usize()..self.end.offset_usize()
    }

    /// The smallest span covering both `self` and `other`.
    #[must_use]
    pub fn cover(self, other: Span) -> Self {
        let start = if other.start.offset() < self.start.offset() {
            other.start
        } else {
            self.start
        };
        let end = if other.end.offset() > self.end.offset() {
            other.end
        } else {
            self.end
        };
        Self { start, end }
    }

    #[must_use]
    pub fn contains(self, offset: u32) -> bool {
        self.start.offset() <= offset && offset < self.end.offset()
    }

    /// Slice the covered text out of `source`, if the span fits it.
    #[must_use]
    pub fn text(self, source: &str) -> Option<&str> {
        source.get(self.range())
    }
}
