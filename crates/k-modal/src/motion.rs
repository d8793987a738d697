//! Row motions and operators.
//!
//! Everything kestrel moves through is a list of rows, so motions are
//! row-wise: each one maps a starting row, a count, and the list's
//! [`Extent`] to a target row. Operators act on the rows between the start
//! and the target, inclusive, which is what [`Motion::range`] returns.
//!
//! | Keys                 | Motion         | Count means               |
//! |----------------------|----------------|---------------------------|
//! | `j` `<Down>`         | `Down`         | rows                      |
//! | `k` `<Up>`           | `Up`           | rows                      |
//! | `<C-d>` / `<C-u>`    | `HalfPage*`    | half pages                |
//! | `<C-f>` / `<C-b>`    | `Page*`        | pages                     |
//! | `gg`                 | `First`        | 1-based row number        |
//! | `G`                  | `Last`         | ignored                   |
//! | `dd` `yy`            | `Line`         | rows, starting at current |

use std::fmt;
use std::ops::Range;

// ---------------------------------------------------------------------------
// Extent
// ---------------------------------------------------------------------------

/// What a motion needs to know about the list it moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    /// Number of rows.
    pub len: usize,
    /// Rows visible at once.
    pub page: usize,
}

impl Extent {
    #[must_use]
    pub const fn new(len: usize, page: usize) -> Self {
        Self { len, page }
    }

    const fn last(self) -> usize {
        self.len.saturating_sub(1)
    }
}

// ---------------------------------------------------------------------------
// Motion
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Motion {
    Down,
    Up,
    HalfPageDown,
    HalfPageUp,
    PageDown,
    PageUp,
    First,
    Last,
    /// The current row and `count - 1` below it. Selected by doubling an
    /// operator key.
    Line,
}

impl Motion {
    /// The row this motion lands on from `from`, clamped to the list.
    ///
    /// A count of 0 is treated as 1. An empty list always yields row 0.
    #[must_use]
    pub fn target(self, from: usize, count: usize, extent: Extent) -> usize {
        let count = count.max(1);
        let last = extent.last();
        let half = (extent.page / 2).max(1);
        let page = extent.page.max(1);
        let target = match self {
            Self::Down => from.saturating_add(count),
            Self::Up => from.saturating_sub(count),
            Self::HalfPageDown => from.saturating_add(count.saturating_mul(half)),
            Self::HalfPageUp => from.saturating_sub(count.saturating_mul(half)),
            Self::PageDown => from.saturating_add(count.saturating_mul(page)),
            Self::PageUp => from.saturating_sub(count.saturating_mul(page)),
            Self::First => count - 1,
            Self::Last => last,
            Self::Line => from.saturating_add(count - 1),
        };
        target.min(last)
    }

    /// The rows an operator with this motion covers, start and target
    /// inclusive. Empty for an empty list.
    #[must_use]
    pub fn range(self, from: usize, count: usize, extent: Extent) -> Range<usize> {
        if extent.len == 0 {
            return 0..0;
        }
        let from = from.min(extent.last());
        let to = self.target(from, count, extent);
        from.min(to)..from.max(to) + 1
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Down => "down",
            Self::Up => "up",
            Self::HalfPageDown => "half-page-down",
            Self::HalfPageUp => "half-page-up",
            Self::PageDown => "page-down",
            Self::PageUp => "page-up",
            Self::First => "first",
            Self::Last => "last",
            Self::Line => "line",
        }
    }
}

impl fmt::Display for Motion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Operator
// ---------------------------------------------------------------------------

/// An action applied to the rows a motion covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Delete,
    Yank,
}

impl Operator {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Yank => "yank",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
