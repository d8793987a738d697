// SPDX-License-Identifier: MIT
//
// Grid: the 2D cell array that widgets draw into.
//
// The screen keeps two of these, one mirroring what the terminal shows and
// one being drawn for the next frame. Everything in here is about keeping
// a single grid internally consistent:
//
//   - Flat `Vec<Cell>`, row-major, `index = y * width + x`. The renderer
//     scans rows left to right, so a row is one contiguous slice.
//
//   - Every drawing call takes an optional clip `Rect`. A widget draws in
//     its own coordinates and the clip keeps it inside its box.
//
//   - Wide characters are a leader (width 2) followed by a continuation
//     (width 0). Any write that lands on either half clears BOTH halves to
//     blank first, so the grid never holds half a wide glyph. A wide glyph
//     that would hang off the right edge is stored as a blank instead.
//
//   - Allocation goes through `try_reserve_exact`: a grid that cannot be
//     allocated is an `AllocationFailure`, not an abort.

use unicode_segmentation::UnicodeSegmentation;

use crate::cell::{Cell, Style};
use crate::error::{Error, Result};

// ─── Rect ───────────────────────────────────────────────────────────────────────

/// An axis-aligned rectangle in cell coordinates.
///
/// ```
/// use k_term::buffer::Rect;
///
/// let r = Rect::new(10, 5, 80, 24);
/// assert!(r.contains(10, 5));
/// assert!(r.contains(89, 28));
/// assert!(!r.contains(90, 5));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    #[inline]
    #[must_use]
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge, exclusive.
    #[inline]
    #[must_use]
    pub const fn right(self) -> u16 {
        self.x.saturating_add(self.width)
    }

    /// Bottom edge, exclusive.
    #[inline]
    #[must_use]
    pub const fn bottom(self) -> u16 {
        self.y.saturating_add(self.height)
    }

    #[inline]
    #[must_use]
    pub const fn area(self) -> u32 {
        self.width as u32 * self.height as u32
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    #[must_use]
    pub const fn contains(self, px: u16, py: u16) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    /// Overlap of two rectangles, or `None` if they don't touch.
    #[must_use]
    pub fn intersect(self, other: Self) -> Option<Self> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());
        (x2 > x1 && y2 > y1).then(|| Self::new(x1, y1, x2 - x1, y2 - y1))
    }

    /// The single row `dy` rows below the top, or `None` past the bottom.
    #[must_use]
    pub const fn line(self, dy: u16) -> Option<Self> {
        if dy >= self.height {
            return None;
        }
        Some(Self::new(self.x, self.y + dy, self.width, 1))
    }
}

// ─── Grid ───────────────────────────────────────────────────────────────────────

/// A `width × height` array of cells.
///
/// ```
/// use k_term::buffer::Grid;
/// use k_term::cell::Style;
///
/// let mut g = Grid::new(10, 2);
/// let used = g.put_str(0, 0, "hi 世", Style::DEFAULT, None);
/// assert_eq!(used, 5);
/// assert_eq!(g.get(3, 0).map(|c| c.ch), Some('世'));
/// assert!(g.get(4, 0).is_some_and(|c| c.is_continuation()));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Grid {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl Grid {
    // ─── Construction ────────────────────────────────────────────────────

    /// A blank grid. Aborts like any `Vec` if memory runs out; the screen
    /// uses [`Grid::try_new`].
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::BLANK; usize::from(width) * usize::from(height)],
        }
    }

    /// A blank grid, reporting allocation failure instead of aborting.
    ///
    /// # Errors
    ///
    /// [`Error::AllocationFailure`] if the cell array cannot be reserved.
    pub fn try_new(width: u16, height: u16) -> Result<Self> {
        let len = usize::from(width) * usize::from(height);
        let mut cells = Vec::new();
        cells
            .try_reserve_exact(len)
            .map_err(|_| Error::AllocationFailure { width, height })?;
        cells.resize(len, Cell::BLANK);
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.width
    }

    #[inline]
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// The whole grid as a [`Rect`] at the origin.
    #[inline]
    #[must_use]
    pub const fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    #[inline]
    #[must_use]
    pub const fn in_bounds(&self, x: u16, y: u16) -> bool {
        x < self.width && y < self.height
    }

    #[inline]
    const fn index(&self, x: u16, y: u16) -> usize {
        y as usize * self.width as usize + x as usize
    }

    #[inline]
    #[must_use]
    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        if self.in_bounds(x, y) {
            Some(&self.cells[self.index(x, y)])
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// One row as a slice, or `None` past the bottom.
    #[inline]
    #[must_use]
    pub fn row(&self, y: u16) -> Option<&[Cell]> {
        if y < self.height {
            let start = self.index(0, y);
            Some(&self.cells[start..start + usize::from(self.width)])
        } else {
            None
        }
    }

    #[inline]
    pub(crate) fn row_mut(&mut self, y: u16) -> Option<&mut [Cell]> {
        if y < self.height {
            let start = self.index(0, y);
            let w = usize::from(self.width);
            Some(&mut self.cells[start..start + w])
        } else {
            None
        }
    }

    /// Row `y` as text, continuation cells omitted. Handy for assertions.
    #[must_use]
    pub fn row_text(&self, y: u16) -> String {
        self.row(y)
            .map(|r| {
                r.iter()
                    .filter(|c| !c.is_continuation())
                    .map(|c| c.ch)
                    .collect()
            })
            .unwrap_or_default()
    }

    // ─── Clear & Resize ──────────────────────────────────────────────────

    pub fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    /// Replace the grid with a blank one of the new size.
    ///
    /// The new array is allocated before the old one is dropped, so on
    /// failure the grid is unchanged.
    ///
    /// # Errors
    ///
    /// [`Error::AllocationFailure`] if the new array cannot be reserved.
    pub fn resize(&mut self, width: u16, height: u16) -> Result<()> {
        *self = Self::try_new(width, height)?;
        Ok(())
    }

    // ─── Direct Cell Access ──────────────────────────────────────────────

    /// Store a cell as-is. Bounds-checked, nothing else: no clipping and no
    /// wide-char cleanup. Returns `false` if out of bounds.
    #[inline]
    pub fn set(&mut self, x: u16, y: u16, cell: Cell) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        let idx = self.index(x, y);
        self.cells[idx] = cell;
        true
    }

    // ─── Wide Character Cleanup ──────────────────────────────────────────

    /// If `(x, y)` is either half of a wide character, blank both halves.
    pub fn break_wide_at(&mut self, x: u16, y: u16) {
        if !self.in_bounds(x, y) {
            return;
        }
        let idx = self.index(x, y);
        let cell = self.cells[idx];
        if cell.is_continuation() && x > 0 {
            self.cells[idx - 1] = Cell::BLANK;
            self.cells[idx] = Cell::BLANK;
        } else if cell.is_wide() {
            self.cells[idx] = Cell::BLANK;
            if x + 1 < self.width {
                self.cells[idx + 1] = Cell::BLANK;
            }
        }
    }

    // ─── Drawing ─────────────────────────────────────────────────────────

    /// Fill `rect` with spaces in `style`.
    pub fn fill(&mut self, rect: Rect, style: Style, clip: Option<Rect>) {
        let Some(mut area) = rect.intersect(self.bounds()) else {
            return;
        };
        if let Some(clip) = clip {
            let Some(clipped) = area.intersect(clip) else {
                return;
            };
            area = clipped;
        }
        let blank = Cell::blank(style);
        for y in area.y..area.bottom() {
            // Only the edge columns can cut through a wide glyph.
            self.break_wide_at(area.x, y);
            self.break_wide_at(area.right() - 1, y);
            let start = self.index(area.x, y);
            let end = self.index(area.right(), y);
            self.cells[start..end].fill(blank);
        }
    }

    /// Place one character at `(x, y)`.
    ///
    /// Returns the number of columns the character advances (1 or 2), even
    /// when the clip hides it, so callers can keep laying out text. Returns
    /// 0 only when `(x, y)` is off the grid.
    pub fn put_char(&mut self, x: u16, y: u16, ch: char, style: Style, clip: Option<Rect>) -> u16 {
        if !self.in_bounds(x, y) {
            return 0;
        }
        let cell = Cell::new(ch, style);
        let visible = |px: u16| self.in_bounds(px, y) && clip.is_none_or(|c| c.contains(px, y));
        let here = visible(x);
        let next = x.checked_add(1).is_some_and(visible);

        if !cell.is_wide() {
            if here {
                self.break_wide_at(x, y);
                self.set(x, y, cell);
            }
            return 1;
        }

        if !here {
            return 2;
        }
        if !next {
            // Half a wide glyph cannot be shown; a blank holds its place.
            self.break_wide_at(x, y);
            self.set(x, y, Cell::blank(style));
            return 2;
        }
        self.break_wide_at(x, y);
        self.break_wide_at(x + 1, y);
        self.set(x, y, cell);
        self.set(x + 1, y, Cell::continuation(style));
        2
    }

    /// Place a string starting at `(x, y)`, one grapheme cluster per glyph.
    ///
    /// Stops at the right edge of the grid. Returns the columns consumed.
    pub fn put_str(&mut self, x: u16, y: u16, text: &str, style: Style, clip: Option<Rect>) -> u16 {
        if y >= self.height {
            return 0;
        }
        let mut col = x;
        for g in text.graphemes(true) {
            if col >= self.width {
                break;
            }
            let Some(ch) = g.chars().next() else { continue };
            col = col.saturating_add(self.put_char(col, y, ch, style, clip));
        }
        col.saturating_sub(x).min(self.width.saturating_sub(x))
    }
}

impl std::fmt::Debug for Grid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Grid({}x{})", self.width, self.height)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use pretty_assertions::assert_eq;

    fn red() -> Style {
        Style::DEFAULT.fg(Color::RED)
    }

    // ── Rect ─────────────────────────────────────────────────────────────

    #[test]
    fn rect_edges() {
        let r = Rect::new(2, 3, 4, 5);
        assert_eq!(r.right(), 6);
        assert_eq!(r.bottom(), 8);
        assert_eq!(r.area(), 20);
        assert!(!r.is_empty());
        assert!(Rect::new(0, 0, 0, 5).is_empty());
    }

    #[test]
    fn rect_intersect() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 10, 10);
        assert_eq!(a.intersect(b), Some(Rect::new(5, 5, 5, 5)));
        assert_eq!(a.intersect(Rect::new(10, 0, 5, 5)), None);
    }

    #[test]
    fn rect_line() {
        let r = Rect::new(1, 1, 5, 2);
        assert_eq!(r.line(0), Some(Rect::new(1, 1, 5, 1)));
        assert_eq!(r.line(1), Some(Rect::new(1, 2, 5, 1)));
        assert_eq!(r.line(2), None);
    }

    // ── Construction ─────────────────────────────────────────────────────

    #[test]
    fn new_grid_is_blank() {
        let g = Grid::new(4, 3);
        assert_eq!(g.cells().len(), 12);
        assert!(g.cells().iter().all(|c| c.is_blank()));
    }

    #[test]
    fn try_new_matches_new() {
        let g = Grid::try_new(7, 2).unwrap();
        assert_eq!(g, Grid::new(7, 2));
    }

    #[test]
    fn resize_discards_content() {
        let mut g = Grid::new(4, 2);
        g.put_str(0, 0, "abcd", red(), None);
        g.resize(6, 3).unwrap();
        assert_eq!(g.width(), 6);
        assert_eq!(g.height(), 3);
        assert!(g.cells().iter().all(|c| c.is_blank()));
    }

    #[test]
    fn out_of_bounds_access() {
        let mut g = Grid::new(3, 3);
        assert!(g.get(3, 0).is_none());
        assert!(g.row(3).is_none());
        assert!(!g.set(0, 3, Cell::BLANK));
        assert_eq!(g.put_char(5, 0, 'x', Style::DEFAULT, None), 0);
    }

    // ── Text ─────────────────────────────────────────────────────────────

    #[test]
    fn put_str_ascii() {
        let mut g = Grid::new(10, 1);
        assert_eq!(g.put_str(2, 0, "abc", red(), None), 3);
        assert_eq!(g.row_text(0), "  abc     ");
        assert_eq!(g.get(2, 0).unwrap().style, red());
    }

    #[test]
    fn put_str_stops_at_edge() {
        let mut g = Grid::new(4, 1);
        assert_eq!(g.put_str(1, 0, "abcdef", red(), None), 3);
        assert_eq!(g.row_text(0), " abc");
    }

    #[test]
    fn wide_char_takes_two_cells() {
        let mut g = Grid::new(4, 1);
        assert_eq!(g.put_str(0, 0, "世", Style::DEFAULT, None), 2);
        assert_eq!(g.get(0, 0).unwrap().width, 2);
        assert_eq!(g.get(1, 0).unwrap().width, 0);
    }

    #[test]
    fn wide_char_in_last_column_becomes_blank() {
        let mut g = Grid::new(3, 1);
        g.put_str(0, 0, "ab世", red(), None);
        let last = *g.get(2, 0).unwrap();
        assert_eq!(last.ch, ' ');
        assert_eq!(last.width, 1);
        assert_eq!(last.style, red());
    }

    #[test]
    fn overwriting_continuation_clears_both_halves() {
        let mut g = Grid::new(4, 1);
        g.put_str(0, 0, "世", Style::DEFAULT, None);
        g.put_char(1, 0, 'x', red(), None);
        assert!(g.get(0, 0).unwrap().is_blank());
        assert_eq!(g.get(1, 0).unwrap().ch, 'x');
        assert_eq!(g.get(1, 0).unwrap().width, 1);
    }

    #[test]
    fn overwriting_leader_clears_both_halves() {
        let mut g = Grid::new(4, 1);
        g.put_str(0, 0, "世", Style::DEFAULT, None);
        g.put_char(0, 0, 'x', red(), None);
        assert_eq!(g.get(0, 0).unwrap().ch, 'x');
        assert!(g.get(1, 0).unwrap().is_blank());
    }

    #[test]
    fn wide_over_offset_wide() {
        // "世界" at 0, then "中" at 1 splits both.
        let mut g = Grid::new(5, 1);
        g.put_str(0, 0, "世界", Style::DEFAULT, None);
        g.put_str(1, 0, "中", Style::DEFAULT, None);
        assert!(g.get(0, 0).unwrap().is_blank());
        assert_eq!(g.get(1, 0).unwrap().ch, '中');
        assert!(g.get(2, 0).unwrap().is_continuation());
        assert!(g.get(3, 0).unwrap().is_blank());
        for x in 0..5 {
            let c = g.get(x, 0).unwrap();
            if c.is_continuation() {
                assert!(g.get(x - 1, 0).unwrap().is_wide());
            }
        }
    }

    // ── Clipping ─────────────────────────────────────────────────────────

    #[test]
    fn clip_hides_but_advances() {
        let mut g = Grid::new(10, 1);
        let clip = Rect::new(2, 0, 3, 1);
        assert_eq!(g.put_str(0, 0, "abcdefg", red(), Some(clip)), 7);
        assert_eq!(g.row_text(0), "  cde     ");
    }

    #[test]
    fn wide_char_straddling_clip_is_blank() {
        let mut g = Grid::new(6, 1);
        let clip = Rect::new(0, 0, 3, 1);
        g.put_str(0, 0, "ab世", red(), Some(clip));
        assert_eq!(g.get(2, 0).unwrap().ch, ' ');
        assert!(g.get(3, 0).unwrap().is_blank());
    }

    // ── Fill ─────────────────────────────────────────────────────────────

    #[test]
    fn fill_rect_with_style() {
        let mut g = Grid::new(4, 3);
        let bg = Style::DEFAULT.bg(Color::BLUE);
        g.fill(Rect::new(1, 1, 10, 10), bg, None);
        assert!(g.get(0, 1).unwrap().is_blank());
        assert_eq!(g.get(1, 1).unwrap().style, bg);
        assert_eq!(g.get(3, 2).unwrap().style, bg);
        assert!(g.get(1, 0).unwrap().is_blank());
    }

    #[test]
    fn fill_edge_breaks_wide_char() {
        let mut g = Grid::new(4, 1);
        g.put_str(0, 0, "世", Style::DEFAULT, None);
        g.fill(Rect::new(1, 0, 3, 1), red(), None);
        assert!(g.get(0, 0).unwrap().is_blank());
        assert_eq!(g.get(1, 0).unwrap().style, red());
    }
}
