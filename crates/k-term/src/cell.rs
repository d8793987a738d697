// SPDX-License-Identifier: MIT
//
// Cell: one character position on screen.
//
// A cell carries a codepoint, a resolved style (foreground, background,
// attribute bits) and a width tag. The width tag is what makes wide
// characters work:
//
//   width 1  an ordinary glyph
//   width 2  the leading half of a wide glyph (CJK, most emoji)
//   width 0  the trailing slot of the wide glyph to its left
//
// A continuation cell never produces output of its own; the terminal
// fills it when the leader is printed. Cells are replaced wholesale,
// never patched field by field, so equality is all the renderer needs.
//
// Size: 16 bytes. A 200×50 terminal is 10,000 cells, 160 KB per grid.

use unicode_width::UnicodeWidthChar;

use crate::color::Color;

// ─── Text Attributes ─────────────────────────────────────────────────────────

bitflags::bitflags! {
    /// Text attributes stored as a compact bitfield.
    ///
    /// Each flag maps to one SGR parameter:
    ///
    /// ```
    /// use k_term::cell::Attr;
    ///
    /// let a = Attr::BOLD | Attr::UNDERLINE;
    /// assert!(a.contains(Attr::BOLD));
    /// assert!(!a.contains(Attr::REVERSE));
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Attr: u8 {
        /// SGR 1.
        const BOLD      = 1 << 0;
        /// SGR 2.
        const DIM       = 1 << 1;
        /// SGR 3.
        const ITALIC    = 1 << 2;
        /// SGR 4.
        const UNDERLINE = 1 << 3;
        /// SGR 5.
        const BLINK     = 1 << 4;
        /// SGR 7, swaps foreground and background.
        const REVERSE   = 1 << 5;
    }
}

impl Attr {
    /// SGR parameter for each flag, in emission order.
    pub(crate) const SGR: [(Self, u8); 6] = [
        (Self::BOLD, 1),
        (Self::DIM, 2),
        (Self::ITALIC, 3),
        (Self::UNDERLINE, 4),
        (Self::BLINK, 5),
        (Self::REVERSE, 7),
    ];
}

// ─── Style ───────────────────────────────────────────────────────────────────

/// Foreground, background and attributes: everything an SGR sequence sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Style {
    pub fg: Color,
    pub bg: Color,
    pub attrs: Attr,
}

impl Style {
    /// Terminal defaults, no attributes. What SGR 0 leaves behind.
    pub const DEFAULT: Self = Self {
        fg: Color::Default,
        bg: Color::Default,
        attrs: Attr::empty(),
    };

    #[inline]
    #[must_use]
    pub const fn fg(self, fg: Color) -> Self {
        Self { fg, ..self }
    }

    #[inline]
    #[must_use]
    pub const fn bg(self, bg: Color) -> Self {
        Self { bg, ..self }
    }

    /// Add attributes on top of the ones already set.
    #[inline]
    #[must_use]
    pub const fn attrs(self, attrs: Attr) -> Self {
        Self {
            attrs: self.attrs.union(attrs),
            ..self
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_default(self) -> bool {
        self.fg.is_default() && self.bg.is_default() && self.attrs.is_empty()
    }
}

// ─── Cell ────────────────────────────────────────────────────────────────────

/// A single terminal cell.
///
/// # Layout (16 bytes)
///
/// ```text
/// ┌──────────┬──────────┬──────────┬───────┬───────┬─────────┐
/// │ ch: char │ fg Color │ bg Color │ attrs │ width │ padding │
/// │ 4 bytes  │ 4 bytes  │ 4 bytes  │  u8   │  u8   │ 2 bytes │
/// └──────────┴──────────┴──────────┴───────┴───────┴─────────┘
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    /// Codepoint to display. Ignored for continuation cells.
    pub ch: char,
    pub style: Style,
    /// 0 = continuation, 1 = narrow, 2 = wide leader.
    pub width: u8,
}

impl Cell {
    /// A space in the default style.
    pub const BLANK: Self = Self {
        ch: ' ',
        style: Style::DEFAULT,
        width: 1,
    };

    /// A cell for `ch`, with its width taken from the Unicode tables.
    ///
    /// Zero-width and control characters are stored as a blank. They have
    /// no column of their own, and a cell that prints nothing would leave
    /// the terminal's cursor out of step with the grid.
    #[must_use]
    pub fn new(ch: char, style: Style) -> Self {
        match ch.width() {
            Some(2) => Self { ch, style, width: 2 },
            Some(1) => Self { ch, style, width: 1 },
            _ => Self {
                ch: ' ',
                style,
                width: 1,
            },
        }
    }

    /// The trailing slot of a wide character. Carries the leader's style so
    /// a background fill covers both columns.
    #[inline]
    #[must_use]
    pub const fn continuation(style: Style) -> Self {
        Self {
            ch: ' ',
            style,
            width: 0,
        }
    }

    /// A space carrying `style`, used by fills.
    #[inline]
    #[must_use]
    pub const fn blank(style: Style) -> Self {
        Self {
            ch: ' ',
            style,
            width: 1,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_continuation(self) -> bool {
        self.width == 0
    }

    #[inline]
    #[must_use]
    pub const fn is_wide(self) -> bool {
        self.width == 2
    }

    /// Space in the default style, i.e. what erase-to-end-of-line produces.
    #[inline]
    #[must_use]
    pub fn is_blank(self) -> bool {
        self == Self::BLANK
    }
}

impl Default for Cell {
    #[inline]
    fn default() -> Self {
        Self::BLANK
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_continuation() {
            return write!(f, "Cell(continuation)");
        }
        write!(f, "Cell({:?}", self.ch)?;
        if !self.style.is_default() {
            write!(f, ", {:?}", self.style)?;
        }
        write!(f, ")")
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
