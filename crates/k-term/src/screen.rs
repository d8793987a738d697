// SPDX-License-Identifier: MIT
//
// Screen: double-buffered grid and differential renderer.
//
// Two grids of the same size:
//
//   committed  what the terminal is showing right now
//   pending    what widgets drew for the next frame
//
// `render()` walks the rows, finds runs of cells where the two disagree,
// and emits just enough to make the terminal match `pending`:
//
//   1. Rows that compare equal are skipped with one slice comparison.
//   2. Each run gets a cursor move only if the physical cursor is not
//      already there, and the move is the cheapest of CR, CR LF, a relative
//      step or an absolute CUP.
//   3. SGR is emitted only when the style changes, as one combined sequence.
//   4. A run that ends in a blank tail of the row is finished with EL
//      instead of spaces when that is shorter.
//   5. The run is copied into `committed` as it is written.
//
// Wide glyphs are never written by halves: a run that starts on a
// continuation slot backs up to its leader, and a run that ends on a leader
// takes its continuation along, in either grid.
//
// All bytes of one render land in one `OutputBuffer` and reach the terminal
// in a single write. Rendering twice without drawing in between emits
// nothing the second time.

use std::io::{self, Write};

use tracing::debug;

use crate::ansi;
use crate::buffer::Grid;
use crate::cell::{Cell, Style};
use crate::error::Result;
use crate::output::OutputBuffer;

// ─── RenderStats ─────────────────────────────────────────────────────────────

/// What one render pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStats {
    /// Cells rewritten (or erased) because they changed.
    pub cells_rendered: usize,
    /// Cells left alone because they matched.
    pub cells_skipped: usize,
    /// Runs of changed cells, each needing at most one cursor move.
    pub runs: usize,
    /// Bytes appended to the output buffer.
    pub bytes_written: usize,
    /// Whether the pass started with a clear screen.
    pub full_redraw: bool,
}

impl RenderStats {
    #[inline]
    #[must_use]
    pub const fn total_cells(&self) -> usize {
        self.cells_rendered + self.cells_skipped
    }
}

// ─── Physical state ──────────────────────────────────────────────────────────

/// What the renderer knows about the terminal outside the grid.
/// `None` means unknown, which forces the absolute form next time.
#[derive(Debug, Clone, Copy, Default)]
struct Physical {
    cursor: Option<(u16, u16)>,
    style: Option<Style>,
    cursor_visible: Option<bool>,
}

// ─── Screen ──────────────────────────────────────────────────────────────────

/// Double-buffered screen with differential output.
///
/// ```
/// use k_term::cell::Style;
/// use k_term::screen::Screen;
///
/// let mut screen = Screen::new(20, 2).unwrap();
/// screen.pending_mut().put_str(0, 0, "hello", Style::DEFAULT, None);
/// let first = screen.render();
/// assert!(first.bytes_written > 0);
///
/// let mut sink = Vec::new();
/// screen.flush_to(&mut sink).unwrap();
///
/// // Nothing changed: nothing to send.
/// assert_eq!(screen.render().bytes_written, 0);
/// ```
pub struct Screen {
    committed: Grid,
    pending: Grid,
    out: OutputBuffer,
    phys: Physical,
    full_redraw: bool,
    /// Where the application wants a visible cursor; `None` hides it.
    cursor: Option<(u16, u16)>,
}

impl Screen {
    /// A screen whose first render clears the terminal.
    ///
    /// # Errors
    ///
    /// [`Error::AllocationFailure`](crate::Error::AllocationFailure) if the
    /// grids cannot be allocated.
    pub fn new(width: u16, height: u16) -> Result<Self> {
        Ok(Self {
            committed: Grid::try_new(width, height)?,
            pending: Grid::try_new(width, height)?,
            out: OutputBuffer::new(),
            phys: Physical::default(),
            full_redraw: true,
            cursor: None,
        })
    }

    #[inline]
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.pending.width()
    }

    #[inline]
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.pending.height()
    }

    /// The grid to draw the next frame into.
    #[inline]
    pub fn pending_mut(&mut self) -> &mut Grid {
        &mut self.pending
    }

    #[inline]
    #[must_use]
    pub const fn pending(&self) -> &Grid {
        &self.pending
    }

    /// What the terminal is believed to show.
    #[inline]
    #[must_use]
    pub const fn committed(&self) -> &Grid {
        &self.committed
    }

    /// Replace both grids with blank ones of the new size. The next render
    /// is a full redraw.
    ///
    /// Both grids are allocated before either is replaced, so a failure
    /// leaves the screen as it was.
    ///
    /// # Errors
    ///
    /// [`Error::AllocationFailure`](crate::Error::AllocationFailure).
    pub fn resize(&mut self, width: u16, height: u16) -> Result<()> {
        let committed = Grid::try_new(width, height)?;
        let pending = Grid::try_new(width, height)?;
        self.committed = committed;
        self.pending = pending;
        self.full_redraw = true;
        self.phys.cursor = None;
        if self
            .cursor
            .is_some_and(|(x, y)| x >= width || y >= height)
        {
            self.cursor = None;
        }
        Ok(())
    }

    /// Forget what the terminal shows; the next render repaints everything.
    pub fn invalidate(&mut self) {
        self.full_redraw = true;
    }

    /// Show the hardware cursor at `(x, y)` after each render, or hide it
    /// with `None`. Only changes reach the terminal.
    pub fn set_cursor(&mut self, pos: Option<(u16, u16)>) {
        self.cursor = pos.filter(|&(x, y)| self.pending.in_bounds(x, y));
    }

    /// Bytes produced by renders and not yet flushed.
    #[inline]
    #[must_use]
    pub fn output_bytes(&self) -> &[u8] {
        self.out.as_bytes()
    }

    /// Send the accumulated output to `w` in one write.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails. The terminal state is then
    /// unknown and the next render is a full redraw.
    pub fn flush_to(&mut self, w: &mut impl Write) -> io::Result<()> {
        let result = self.out.flush_to(w);
        if result.is_err() {
            self.full_redraw = true;
            self.phys = Physical::default();
        }
        result
    }

    // ─── Render ──────────────────────────────────────────────────────────

    /// Diff `pending` against `committed`, append the ANSI needed to turn
    /// one into the other, and make `committed` equal `pending`.
    pub fn render(&mut self) -> RenderStats {
        let before = self.out.len();
        let mut stats = RenderStats::default();
        let width = self.pending.width();
        let height = self.pending.height();

        if self.full_redraw {
            debug!(width, height, "full redraw");
            write_ok(ansi::reset(&mut self.out));
            write_ok(ansi::clear_screen(&mut self.out));
            self.committed.clear();
            self.phys.style = Some(Style::DEFAULT);
            self.phys.cursor = None;
            self.full_redraw = false;
            stats.full_redraw = true;
        }

        for y in 0..height {
            let (Some(new), Some(old)) = (self.pending.row(y), self.committed.row_mut(y)) else {
                continue;
            };
            if new == old {
                stats.cells_skipped += usize::from(width);
                continue;
            }
            let rendered = render_row(&mut self.out, &mut self.phys, y, new, old, &mut stats);
            stats.cells_rendered += rendered;
            stats.cells_skipped += usize::from(width) - rendered;
        }

        self.place_cursor();

        debug_assert!(self.committed == self.pending);
        stats.bytes_written = self.out.len() - before;
        stats
    }

    /// Bring the hardware cursor's position and visibility in line with
    /// what was requested through [`set_cursor`](Self::set_cursor).
    fn place_cursor(&mut self) {
        match self.cursor {
            Some((x, y)) => {
                move_to(&mut self.out, &mut self.phys, x, y);
                if self.phys.cursor_visible != Some(true) {
                    write_ok(ansi::cursor_show(&mut self.out));
                    self.phys.cursor_visible = Some(true);
                }
            }
            None => {
                if self.phys.cursor_visible != Some(false) {
                    write_ok(ansi::cursor_hide(&mut self.out));
                    self.phys.cursor_visible = Some(false);
                }
            }
        }
    }
}

impl std::fmt::Debug for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Screen")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("pending_bytes", &self.out.len())
            .field("full_redraw", &self.full_redraw)
            .finish_non_exhaustive()
    }
}

/// `OutputBuffer` is a `Vec`; its writes cannot fail.
#[inline]
fn write_ok(result: io::Result<()>) {
    debug_assert!(result.is_ok());
}

// ─── Row diff ────────────────────────────────────────────────────────────────

/// Render the differences in one row. Returns the number of cells rewritten.
fn render_row(
    out: &mut OutputBuffer,
    phys: &mut Physical,
    y: u16,
    new: &[Cell],
    old: &mut [Cell],
    stats: &mut RenderStats,
) -> usize {
    let w = new.len();
    // Everything from here to the end of the row is blank in `new`.
    let tail = new.iter().rposition(|c| !c.is_blank()).map_or(0, |i| i + 1);
    let mut rendered = 0;
    let mut x = 0;

    while x < w {
        if new[x] == old[x] {
            x += 1;
            continue;
        }
        let (start, end) = run_bounds(new, old, x);
        stats.runs += 1;

        let el_from = start.max(tail);
        let use_el = el_from < end && end - el_from > ansi::CLEAR_TO_EOL_LEN;
        let write_end = if use_el { el_from } else { end };

        if write_end > start {
            move_to(out, phys, col(start), y);
            write_cells(out, phys, y, &new[start..write_end], col(w));
        }
        if use_el {
            move_to(out, phys, col(el_from), y);
            if phys.style != Some(Style::DEFAULT) {
                write_ok(ansi::sgr(out, phys.style, Style::DEFAULT));
                phys.style = Some(Style::DEFAULT);
            }
            write_ok(ansi::clear_to_eol(out));
            // The erase reaches the end of the row, which is blank in `new`.
            old[el_from..].copy_from_slice(&new[el_from..]);
            rendered += w - el_from;
            old[start..el_from].copy_from_slice(&new[start..el_from]);
            rendered += el_from - start;
            break;
        }

        old[start..end].copy_from_slice(&new[start..end]);
        rendered += end - start;
        x = end;
    }
    rendered
}

/// The run of differing cells that starts at `x`, widened so neither end
/// splits a wide glyph in either grid.
fn run_bounds(new: &[Cell], old: &[Cell], x: usize) -> (usize, usize) {
    let w = new.len();
    let mut start = x;
    if start > 0 && (new[start].is_continuation() || old[start].is_continuation()) {
        start -= 1;
    }
    let mut end = x;
    loop {
        while end < w && new[end] != old[end] {
            end += 1;
        }
        if end < w && (new[end - 1].is_wide() || old[end - 1].is_wide()) {
            end += 1;
            continue;
        }
        break;
    }
    (start, end)
}

/// Write glyphs for `cells`, which start at the physical cursor.
fn write_cells(out: &mut OutputBuffer, phys: &mut Physical, y: u16, cells: &[Cell], width: u16) {
    let Some((mut x, _)) = phys.cursor else {
        return;
    };
    for cell in cells {
        if cell.is_continuation() {
            // Filled by the leader before it.
            continue;
        }
        if phys.style != Some(cell.style) {
            write_ok(ansi::sgr(out, phys.style, cell.style));
            phys.style = Some(cell.style);
        }
        out.push_char(cell.ch);
        x = x.saturating_add(u16::from(cell.width));
    }
    // Past the last column the terminal sits in its pending-wrap state,
    // where relative moves are unreliable.
    phys.cursor = (x < width).then_some((x, y));
}

#[inline]
#[allow(clippy::cast_possible_truncation)]
const fn col(x: usize) -> u16 {
    // Row indices come from a grid whose width is a u16.
    x as u16
}

// ─── Cursor movement ─────────────────────────────────────────────────────────

/// One way of getting the cursor from where it is to where it should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Vertical {
    Stay,
    Up(u16),
    Down(u16),
    /// CR LF, one row down and to column 0.
    NextLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Horizontal {
    Stay,
    Forward(u16),
    Back(u16),
    /// CR, then forward to the column if it isn't 0.
    Home(u16),
}

/// Move the physical cursor to `(x, y)` with the fewest bytes.
fn move_to(out: &mut OutputBuffer, phys: &mut Physical, x: u16, y: u16) {
    let target = (x, y);
    let Some((cx, cy)) = phys.cursor else {
        write_ok(ansi::cursor_to(out, x, y));
        phys.cursor = Some(target);
        return;
    };
    if (cx, cy) == target {
        return;
    }

    let mut best: Option<(usize, Vertical, Horizontal)> = None;
    let mut consider = |cost: usize, v: Vertical, h: Horizontal| {
        if best.is_none_or(|(c, _, _)| cost < c) {
            best = Some((cost, v, h));
        }
    };

    let verticals: [(Vertical, usize, u16); 2] = if y == cy {
        [(Vertical::Stay, 0, cx), (Vertical::Stay, 0, cx)]
    } else if y == cy + 1 {
        [(Vertical::Down(1), ansi::step_len(1), cx), (Vertical::NextLine, 2, 0)]
    } else if y > cy {
        let v = Vertical::Down(y - cy);
        [(v, ansi::step_len(y - cy), cx), (v, ansi::step_len(y - cy), cx)]
    } else {
        let v = Vertical::Up(cy - y);
        [(v, ansi::step_len(cy - y), cx), (v, ansi::step_len(cy - y), cx)]
    };

    for (v, v_cost, from_x) in verticals {
        let (h, h_cost) = if x == from_x {
            (Horizontal::Stay, 0)
        } else if x > from_x {
            (Horizontal::Forward(x - from_x), ansi::step_len(x - from_x))
        } else {
            (Horizontal::Back(from_x - x), ansi::step_len(from_x - x))
        };
        consider(v_cost + h_cost, v, h);
        if from_x != 0 {
            let home = 1 + if x == 0 { 0 } else { ansi::step_len(x) };
            consider(v_cost + home, v, Horizontal::Home(x));
        }
    }

    let absolute = ansi::cursor_to_len(x, y);
    match best {
        Some((cost, v, h)) if cost < absolute => {
            emit_vertical(out, v);
            emit_horizontal(out, h);
        }
        _ => write_ok(ansi::cursor_to(out, x, y)),
    }
    phys.cursor = Some(target);
}

fn emit_vertical(out: &mut OutputBuffer, v: Vertical) {
    match v {
        Vertical::Stay => {}
        Vertical::Up(n) => write_ok(ansi::cursor_up(out, n)),
        Vertical::Down(n) => write_ok(ansi::cursor_down(out, n)),
        Vertical::NextLine => write_ok(ansi::next_line(out)),
    }
}

fn emit_horizontal(out: &mut OutputBuffer, h: Horizontal) {
    match h {
        Horizontal::Stay => {}
        Horizontal::Forward(n) => write_ok(ansi::cursor_forward(out, n)),
        Horizontal::Back(n) => write_ok(ansi::cursor_back(out, n)),
        Horizontal::Home(x) => {
            write_ok(ansi::carriage_return(out));
            if x > 0 {
                write_ok(ansi::cursor_forward(out, x));
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
