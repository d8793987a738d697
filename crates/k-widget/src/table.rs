// SPDX-License-Identifier: MIT
//
// Scrollable table with a selection.
//
// Layout inside the table's rect:
//
//   row 0        header (column titles, filter at the right)
//   rows 1..     body: one table row per line, `~` past the last one
//
// Column widths come from the same partition containers use. The body
// shows `page` rows starting at `offset`; after every selection change the
// offset is moved just far enough to keep the selection on screen.
//
// Typing in Insert mode edits a filter. Only rows with a cell containing
// the filter text (case-insensitive) are shown, and every index the table
// hands out (selection, offset, operator ranges) counts shown rows.

use k_modal::Command;
use k_modal::motion::{Extent, Operator};
use k_modal::trie::Action;
use k_term::buffer::{Grid, Rect};
use k_term::cell::{Attr, Style};
use k_term::color::Color;
use k_term::input::{KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use k_term::text::{str_width, truncate_with_ellipsis};

use crate::layout::{Constraint, partition};
use crate::notify::Level;
use crate::tree::Effect;

/// One table row: a string per column.
pub type Row = Vec<String>;

/// Rows one wheel notch scrolls.
const WHEEL_STEP: usize = 3;

const HEADER: Style = Style::DEFAULT.attrs(Attr::BOLD.union(Attr::UNDERLINE));
const FILLER: Style = Style::DEFAULT.fg(Color::BLUE);
const SELECTED: Style = Style::DEFAULT.attrs(Attr::REVERSE);
const SELECTED_BLURRED: Style = Style::DEFAULT.attrs(Attr::BOLD);
const FILTER: Style = Style::DEFAULT.fg(Color::YELLOW);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub title: String,
    pub constraint: Constraint,
}

impl Column {
    #[must_use]
    pub fn new(title: impl Into<String>, constraint: Constraint) -> Self {
        Self {
            title: title.into(),
            constraint,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Row>,
    filter: String,
    /// Indices into `rows` of the rows the filter lets through.
    view: Vec<usize>,
    /// Index into `view`.
    selected: usize,
    /// First shown row, index into `view`.
    offset: usize,
    /// Body lines, set on resize.
    page: usize,
    focused: bool,
    /// Rows taken by the last delete or yank.
    register: Vec<Row>,
    /// Shown instead of the body while there are no rows.
    placeholder: String,
}

impl Table {
    #[must_use]
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_placeholder(mut self, text: impl Into<String>) -> Self {
        self.placeholder = text.into();
        self
    }

    pub fn set_placeholder(&mut self, text: impl Into<String>) {
        self.placeholder = text.into();
    }

    #[must_use]
    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.set_rows(rows);
        self
    }

    /// Replace the contents. The selection keeps its index, clamped.
    pub fn set_rows(&mut self, rows: Vec<Row>) {
        self.rows = rows;
        self.refilter();
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// All rows, filtered or not.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Rows the filter lets through.
    #[must_use]
    pub fn len(&self) -> usize {
        self.view.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    /// The `i`-th shown row.
    #[must_use]
    pub fn row(&self, i: usize) -> Option<&Row> {
        self.view.get(i).map(|&r| &self.rows[r])
    }

    /// Index of the selected row among the shown rows.
    #[must_use]
    pub fn selected(&self) -> Option<usize> {
        (self.selected < self.view.len()).then_some(self.selected)
    }

    #[must_use]
    pub fn selected_row(&self) -> Option<&Row> {
        self.row(self.selected)
    }

    /// Move the selection to shown row `i`, clamped.
    pub fn select(&mut self, i: usize) {
        self.selected = i.min(self.view.len().saturating_sub(1));
        self.scroll();
    }

    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub const fn page(&self) -> usize {
        self.page
    }

    #[must_use]
    pub fn register(&self) -> &[Row] {
        &self.register
    }

    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: impl Into<String>) {
        self.filter = filter.into();
        self.refilter();
    }

    #[must_use]
    pub const fn is_focused(&self) -> bool {
        self.focused
    }

    fn extent(&self) -> Extent {
        Extent::new(self.view.len(), self.page)
    }

    fn refilter(&mut self) {
        let needle = self.filter.to_lowercase();
        self.view = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                needle.is_empty() || row.iter().any(|c| c.to_lowercase().contains(&needle))
            })
            .map(|(i, _)| i)
            .collect();
        self.select(self.selected);
    }

    /// Keep the selection inside the shown window.
    fn scroll(&mut self) {
        if self.selected < self.offset {
            self.offset = self.selected;
        }
        if self.page > 0 && self.selected >= self.offset + self.page {
            self.offset = self.selected + 1 - self.page;
        }
        let max_offset = self.view.len().saturating_sub(self.page.max(1));
        self.offset = self.offset.min(max_offset);
    }

    fn operate(&mut self, operator: Operator, range: std::ops::Range<usize>, effects: &mut Vec<Effect>) {
        if range.is_empty() {
            return;
        }
        let n = range.len();
        let noun = if n == 1 { "row" } else { "rows" };
        let indices = &self.view[range.clone()];
        match operator {
            Operator::Yank => {
                self.register = indices.iter().map(|&r| self.rows[r].clone()).collect();
                effects.push(Effect::Notify {
                    text: format!("{n} {noun} yanked"),
                    level: Level::Info,
                });
            }
            Operator::Delete => {
                let mut doomed = indices.to_vec();
                doomed.sort_unstable();
                let mut taken = Vec::with_capacity(n);
                for &r in doomed.iter().rev() {
                    taken.push(self.rows.remove(r));
                }
                taken.reverse();
                self.register = taken;
                effects.push(Effect::Notify {
                    text: format!("{n} {noun} deleted"),
                    level: Level::Info,
                });
            }
        }
        self.selected = range.start;
        self.refilter();
    }

    fn edit_filter(&mut self, key: KeyEvent) -> bool {
        if key.code == KeyCode::Backspace {
            if self.filter.pop().is_none() {
                return false;
            }
        } else if let Some(ch) = key.printable() {
            self.filter.push(ch);
        } else {
            return false;
        }
        self.refilter();
        true
    }

    // ─── Widget hooks ────────────────────────────────────────────────────

    pub(crate) fn on_command(&mut self, command: &Command, effects: &mut Vec<Effect>) -> bool {
        match command {
            Command::Move { motion, count } => {
                self.selected = motion.target(self.selected, *count, self.extent());
                self.scroll();
                true
            }
            Command::Operate {
                operator,
                motion,
                count,
            } => {
                let range = motion.range(self.selected, *count, self.extent());
                self.operate(*operator, range, effects);
                true
            }
            Command::Action {
                action: Action::Open,
                ..
            } => {
                if let Some(row) = self.selected_row() {
                    effects.push(Effect::Open(row.clone()));
                }
                true
            }
            Command::Input(key) => self.edit_filter(*key),
            _ => false,
        }
    }

    pub(crate) fn on_mouse(&mut self, mouse: MouseEvent, rect: Rect) -> bool {
        match mouse.kind {
            MouseEventKind::Press(MouseButton::Left) => {
                let Some(line) = mouse.y.checked_sub(rect.y + 1) else {
                    return false;
                };
                let i = self.offset + usize::from(line);
                if i >= self.view.len() {
                    return false;
                }
                self.selected = i;
                true
            }
            MouseEventKind::ScrollDown => {
                let max_offset = self.view.len().saturating_sub(self.page.max(1));
                self.offset = (self.offset + WHEEL_STEP).min(max_offset);
                self.keep_selection_on_screen();
                true
            }
            MouseEventKind::ScrollUp => {
                self.offset = self.offset.saturating_sub(WHEEL_STEP);
                self.keep_selection_on_screen();
                true
            }
            _ => false,
        }
    }

    /// After the window moved on its own, drag the selection into it.
    fn keep_selection_on_screen(&mut self) {
        let last = (self.offset + self.page.max(1)).saturating_sub(1);
        self.selected = self
            .selected
            .clamp(self.offset, last)
            .min(self.view.len().saturating_sub(1));
    }

    pub(crate) const fn on_focus(&mut self, focused: bool) {
        self.focused = focused;
    }

    pub(crate) fn on_resize(&mut self, rect: Rect) {
        self.page = usize::from(rect.height.saturating_sub(1));
        self.scroll();
    }

    pub(crate) fn draw(&self, grid: &mut Grid, rect: Rect) {
        let clip = Some(rect);
        let constraints: Vec<Constraint> = self.columns.iter().map(|c| c.constraint).collect();
        let widths = partition(rect.width, &constraints);

        // Header.
        grid.fill(Rect::new(rect.x, rect.y, rect.width, 1), HEADER, clip);
        let titles = self.columns.iter().map(|c| c.title.as_str());
        Self::draw_cells(grid, rect.x, rect.y, titles, &widths, HEADER, clip);
        if !self.filter.is_empty() {
            let label = format!("/{}", self.filter);
            let w = u16::try_from(str_width(&label)).unwrap_or(u16::MAX);
            let x = rect.right().saturating_sub(w).max(rect.x);
            grid.put_str(x, rect.y, &label, HEADER.fg(FILTER.fg), clip);
        }

        // Body.
        for line in 0..rect.height.saturating_sub(1) {
            let y = rect.y + 1 + line;
            let i = self.offset + usize::from(line);
            match self.row(i) {
                Some(row) => {
                    let style = match (i == self.selected, self.focused) {
                        (true, true) => SELECTED,
                        (true, false) => SELECTED_BLURRED,
                        (false, _) => Style::DEFAULT,
                    };
                    if style != Style::DEFAULT {
                        grid.fill(Rect::new(rect.x, y, rect.width, 1), style, clip);
                    }
                    let cells = row.iter().map(String::as_str);
                    Self::draw_cells(grid, rect.x, y, cells, &widths, style, clip);
                }
                None => {
                    grid.put_char(rect.x, y, '~', FILLER, clip);
                }
            }
        }

        if self.view.is_empty() && !self.placeholder.is_empty() {
            let body = rect.height.saturating_sub(1);
            let y = rect.y + 1 + body / 3;
            if y < rect.bottom() {
                let text = truncate_with_ellipsis(&self.placeholder, usize::from(rect.width));
                let w = u16::try_from(str_width(&text)).unwrap_or(rect.width);
                let x = rect.x + (rect.width - w) / 2;
                grid.put_str(x, y, &text, Style::DEFAULT, clip);
            }
        }
    }

    /// Lay out one line of cells, one column gap between them.
    fn draw_cells<'a>(
        grid: &mut Grid,
        x: u16,
        y: u16,
        cells: impl Iterator<Item = &'a str>,
        widths: &[u16],
        style: Style,
        clip: Option<Rect>,
    ) {
        let mut col = x;
        let last = widths.len().saturating_sub(1);
        for (i, (text, &w)) in cells.zip(widths).enumerate() {
            let room = if i == last { w } else { w.saturating_sub(1) };
            let text = truncate_with_ellipsis(text, usize::from(room));
            grid.put_str(col, y, &text, style, clip);
            col = col.saturating_add(w);
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use k_modal::motion::Motion;
    use k_term::input::Modifiers;
    use pretty_assertions::assert_eq;

    fn rows(n: usize) -> Vec<Row> {
        (0..n).map(|i| vec![format!("r{i}"), format!("msg {i}")]).collect()
    }

    fn table(n: usize, height: u16) -> Table {
        let mut t = Table::new(vec![
            Column::new("id", Constraint::Fixed(4)),
            Column::new("message", Constraint::Fill(1)),
        ])
        .with_rows(rows(n));
        t.on_resize(Rect::new(0, 0, 20, height));
        t
    }

    fn mv(t: &mut Table, motion: Motion, count: usize) {
        t.on_command(&Command::Move { motion, count }, &mut Vec::new());
    }

    fn op(t: &mut Table, operator: Operator, motion: Motion, count: usize) -> Vec<Effect> {
        let mut effects = Vec::new();
        t.on_command(
            &Command::Operate {
                operator,
                motion,
                count,
            },
            &mut effects,
        );
        effects
    }

    fn first_cells(t: &Table) -> Vec<String> {
        (0..t.len()).map(|i| t.row(i).unwrap()[0].clone()).collect()
    }

    #[test]
    fn counted_moves_clamp() {
        let mut t = table(10, 5);
        mv(&mut t, Motion::Down, 3);
        assert_eq!(t.selected(), Some(3));
        mv(&mut t, Motion::Down, 30);
        assert_eq!(t.selected(), Some(9));
        mv(&mut t, Motion::Up, 4);
        assert_eq!(t.selected(), Some(5));
        mv(&mut t, Motion::First, 1);
        assert_eq!(t.selected(), Some(0));
    }

    #[test]
    fn scroll_follows_selection() {
        // 5 lines: header plus a 4-row page.
        let mut t = table(10, 5);
        assert_eq!(t.page(), 4);
        mv(&mut t, Motion::Down, 4);
        assert_eq!(t.offset(), 1);
        mv(&mut t, Motion::Last, 1);
        assert_eq!(t.offset(), 6);
        mv(&mut t, Motion::Up, 5);
        assert_eq!(t.offset(), 4);
        mv(&mut t, Motion::First, 1);
        assert_eq!(t.offset(), 0);
    }

    #[test]
    fn delete_line_range() {
        let mut t = table(5, 10);
        mv(&mut t, Motion::Down, 1);
        let effects = op(&mut t, Operator::Delete, Motion::Line, 2);
        assert_eq!(first_cells(&t), vec!["r0", "r3", "r4"]);
        assert_eq!(t.register().len(), 2);
        assert_eq!(t.register()[0][0], "r1");
        assert_eq!(t.selected(), Some(1));
        assert_eq!(
            effects,
            vec![Effect::Notify {
                text: "2 rows deleted".into(),
                level: Level::Info,
            }]
        );
    }

    #[test]
    fn delete_to_end_moves_selection_up() {
        let mut t = table(5, 10);
        mv(&mut t, Motion::Down, 3);
        op(&mut t, Operator::Delete, Motion::Last, 1);
        assert_eq!(first_cells(&t), vec!["r0", "r1", "r2"]);
        assert_eq!(t.selected(), Some(2));
    }

    #[test]
    fn yank_copies_and_reports() {
        let mut t = table(5, 10);
        mv(&mut t, Motion::Down, 2);
        let effects = op(&mut t, Operator::Yank, Motion::Up, 1);
        assert_eq!(t.len(), 5);
        assert_eq!(t.register().iter().map(|r| r[0].as_str()).collect::<Vec<_>>(), vec!["r1", "r2"]);
        assert_eq!(t.selected(), Some(1));
        assert_eq!(
            effects,
            vec![Effect::Notify {
                text: "2 rows yanked".into(),
                level: Level::Info,
            }]
        );
    }

    #[test]
    fn operating_on_empty_table_is_harmless() {
        let mut t = table(0, 10);
        assert!(op(&mut t, Operator::Delete, Motion::Line, 3).is_empty());
        assert_eq!(t.selected(), None);
    }

    #[test]
    fn open_emits_selected_row() {
        let mut t = table(3, 10);
        mv(&mut t, Motion::Down, 1);
        let mut effects = Vec::new();
        t.on_command(
            &Command::Action {
                action: Action::Open,
                count: 1,
            },
            &mut effects,
        );
        assert_eq!(effects, vec![Effect::Open(vec!["r1".into(), "msg 1".into()])]);
    }

    #[test]
    fn filter_narrows_rows() {
        let mut t = table(12, 10);
        for ch in ['m', 's', 'g', ' ', '1'] {
            assert!(t.on_command(&Command::Input(KeyEvent::plain(KeyCode::Char(ch))), &mut Vec::new()));
        }
        assert_eq!(first_cells(&t), vec!["r1", "r10", "r11"]);

        // Deleting through a filter removes the underlying row.
        mv(&mut t, Motion::Down, 1);
        op(&mut t, Operator::Delete, Motion::Line, 1);
        assert_eq!(first_cells(&t), vec!["r1", "r11"]);
        assert_eq!(t.rows().len(), 11);

        assert!(t.on_command(&Command::Input(KeyEvent::plain(KeyCode::Backspace)), &mut Vec::new()));
        assert_eq!(t.filter(), "msg ");
        assert_eq!(t.len(), 11);
    }

    #[test]
    fn unhandled_input_falls_through() {
        let mut t = table(3, 10);
        assert!(!t.on_command(&Command::Input(KeyEvent::plain(KeyCode::Backspace)), &mut Vec::new()));
        assert!(!t.on_command(&Command::Input(KeyEvent::ctrl('x')), &mut Vec::new()));
        assert!(!t.on_command(&Command::Submit("q".into()), &mut Vec::new()));
    }

    fn mouse(kind: MouseEventKind, y: u16) -> MouseEvent {
        MouseEvent {
            kind,
            x: 3,
            y,
            modifiers: Modifiers::empty(),
        }
    }

    #[test]
    fn click_selects_and_wheel_scrolls() {
        let area = Rect::new(0, 0, 20, 5);
        let mut t = table(20, 5);
        assert!(t.on_mouse(mouse(MouseEventKind::Press(MouseButton::Left), 3), area));
        assert_eq!(t.selected(), Some(2));
        // The header is not a row.
        assert!(!t.on_mouse(mouse(MouseEventKind::Press(MouseButton::Left), 0), area));

        assert!(t.on_mouse(mouse(MouseEventKind::ScrollDown, 0), area));
        assert_eq!(t.offset(), 3);
        assert_eq!(t.selected(), Some(3));

        for _ in 0..10 {
            t.on_mouse(mouse(MouseEventKind::ScrollDown, 0), area);
        }
        assert_eq!(t.offset(), 16);

        t.on_mouse(mouse(MouseEventKind::ScrollUp, 0), area);
        assert_eq!(t.offset(), 13);
        assert_eq!(t.selected(), Some(16));
    }

    #[test]
    fn draws_header_rows_and_filler() {
        let area = Rect::new(0, 0, 16, 5);
        let mut t = table(2, 5);
        t.on_resize(area);
        t.on_focus(true);
        let mut grid = Grid::new(16, 5);
        t.draw(&mut grid, area);
        assert_eq!(grid.row_text(0), "id  message     ");
        assert_eq!(grid.row_text(1), "r0  msg 0       ");
        assert_eq!(grid.row_text(2), "r1  msg 1       ");
        assert_eq!(grid.row_text(3), "~               ");
        assert_eq!(grid.get(8, 1).unwrap().style, SELECTED);
        assert_eq!(grid.get(8, 2).unwrap().style, Style::DEFAULT);
    }

    #[test]
    fn truncates_cells_to_columns() {
        let area = Rect::new(0, 0, 10, 3);
        let mut t = Table::new(vec![
            Column::new("id", Constraint::Fixed(4)),
            Column::new("message", Constraint::Fill(1)),
        ])
        .with_rows(vec![vec!["abcdef".into(), "a long message".into()]]);
        t.on_resize(area);
        let mut grid = Grid::new(10, 3);
        t.draw(&mut grid, area);
        assert_eq!(grid.row_text(1), "ab… a lon…");
    }

    #[test]
    fn placeholder_when_empty() {
        let area = Rect::new(0, 0, 12, 7);
        let mut t = table(0, 7).with_placeholder("no rows");
        t.on_resize(area);
        let mut grid = Grid::new(12, 7);
        t.draw(&mut grid, area);
        assert_eq!(grid.row_text(3), "~ no rows   ");
    }
}
