// SPDX-License-Identifier: MIT
//
// Status line: one row at the bottom of the layout.
//
//   Normal / Insert   " NORMAL  title          3d  4/120 "   (reverse video)
//   Command-line      ":text█"
//
// It holds a copy of what it shows and is refreshed from the engine and the
// table once per frame with `sync`, just before drawing.

use k_modal::motion::Operator;
use k_modal::{ModalEngine, Mode};
use k_term::buffer::{Grid, Rect};
use k_term::cell::{Attr, Style};
use k_term::color::Color;
use k_term::input::KeyCode;
use k_term::text::{str_width, truncate};

const BAR: Style = Style::DEFAULT.attrs(Attr::REVERSE);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusLine {
    title: String,
    mode: Mode,
    command: String,
    /// Char offset into `command`.
    command_cursor: usize,
    /// Count, operator and partial sequence typed so far.
    pending: String,
    /// 1-based selection and row count.
    position: Option<(usize, usize)>,
}

impl StatusLine {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Copy what the line shows from the engine and the selection.
    /// `position` is the 0-based selected row and the row count.
    pub fn sync(&mut self, engine: &ModalEngine, position: Option<(usize, usize)>) {
        self.mode = engine.mode();
        let line = engine.command_line();
        line.input().clone_into(&mut self.command);
        self.command_cursor = line.cursor();
        self.pending = pending_keys(engine);
        self.position = position.map(|(row, len)| (row + 1, len));
    }

    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    #[must_use]
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Where the terminal cursor belongs: after the typed text while the
    /// command line is open, nowhere otherwise.
    #[must_use]
    pub fn cursor(&self, rect: Rect) -> Option<(u16, u16)> {
        if self.mode != Mode::CommandLine || rect.is_empty() {
            return None;
        }
        let before: String = self.command.chars().take(self.command_cursor).collect();
        let col = 1 + str_width(&before);
        let x = rect.x.saturating_add(u16::try_from(col).unwrap_or(u16::MAX));
        Some((x.min(rect.right() - 1), rect.y))
    }

    pub(crate) fn draw(&self, grid: &mut Grid, rect: Rect) {
        let Some(line) = rect.line(0) else {
            return;
        };
        let clip = Some(line);

        if self.mode == Mode::CommandLine {
            grid.put_char(line.x, line.y, ':', Style::DEFAULT, clip);
            grid.put_str(line.x + 1, line.y, &self.command, Style::DEFAULT, clip);
            return;
        }

        grid.fill(line, BAR, clip);

        let right = match self.position {
            Some((row, len)) => format!(" {}  {row}/{len} ", self.pending),
            None => format!(" {} ", self.pending),
        };
        let right_w = u16::try_from(str_width(&right)).unwrap_or(line.width);
        let right_x = line.right().saturating_sub(right_w).max(line.x);

        let mode = format!(" {} ", self.mode.display_name());
        let mode_style = mode_style(self.mode);
        let mut x = line.x;
        x += grid.put_str(x, line.y, &mode, mode_style, clip);

        let room = usize::from(right_x.saturating_sub(x));
        let left = format!(" {}", self.title);
        grid.put_str(x, line.y, truncate(&left, room), BAR, clip);
        grid.put_str(right_x, line.y, &right, BAR, clip);
    }
}

const fn mode_style(mode: Mode) -> Style {
    let bg = match mode {
        Mode::Normal => Color::BLUE,
        Mode::Insert => Color::GREEN,
        Mode::CommandLine => Color::YELLOW,
    };
    Style::DEFAULT.fg(Color::BLACK).bg(bg).attrs(Attr::BOLD)
}

/// `3d2g`-style echo of the keys the engine is holding.
fn pending_keys(engine: &ModalEngine) -> String {
    let mut out = String::new();
    if let Some(count) = engine.count() {
        out.push_str(&count.to_string());
    }
    if let Some(op) = engine.pending_operator() {
        out.push(match op {
            Operator::Delete => 'd',
            Operator::Yank => 'y',
        });
    }
    for key in engine.pending_keys() {
        if let KeyCode::Char(ch) = key.code {
            out.push(ch);
        }
    }
    out
}
