// SPDX-License-Identifier: MIT
//
// The application context: engine, widget tree and row source behind the
// event loop's `App` interface.
//
//   bytes → Decoder → Event::Key → ModalEngine → Command
//                                                  │
//                    focused widget ◄──────────────┤
//                                                  │ not handled
//                    global commands ◄─────────────┘
//                    (quit, redraw, focus, `:` commands, Esc)
//
// Widgets never reach the overlay or the source directly; they return
// `Effect`s, which are applied here once the widget is done.

use std::time::Instant;

use k_modal::trie::{Action as KeyAction, KeyTrie};
use k_modal::{Command, EngineConfig, ModalEngine, Mode};
use k_term::buffer::Rect;
use k_term::event_loop::{Action, App};
use k_term::input::{Event, KeyCode};
use k_term::screen::Screen;
use tracing::{debug, info};

use crate::layout::{Axis, Constraint};
use crate::notify::{Level, Notifications, OverlayConfig};
use crate::source::{Fetch, RowSource};
use crate::status::StatusLine;
use crate::table::{Column, Row, Table};
use crate::tree::{Container, Effect, Input, Widget, WidgetId, WidgetTree};

/// Overlay z, above everything else.
const OVERLAY_Z: i32 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UiConfig {
    pub engine: EngineConfig,
    pub overlay: OverlayConfig,
}

/// A table browser: one table, a status line and the notification
/// overlay, fed by a [`RowSource`].
pub struct Ui<S> {
    engine: ModalEngine,
    tree: WidgetTree,
    table: WidgetId,
    status: WidgetId,
    notices: WidgetId,
    source: S,
    size: (u16, u16),
    opened: Vec<Row>,
}

impl<S: RowSource> Ui<S> {
    /// A browser with the default key bindings.
    #[must_use]
    pub fn new(source: S, columns: Vec<Column>, config: UiConfig) -> Self {
        Self::with_keymap(source, columns, k_modal::keymap::default_keymap(), config)
    }

    #[must_use]
    pub fn with_keymap(source: S, columns: Vec<Column>, keymap: KeyTrie, config: UiConfig) -> Self {
        let mut tree = WidgetTree::new(Widget::Container(Container::new(Axis::Vertical)));
        let root = tree.root();
        let table = Table::new(columns).with_placeholder("loading…");
        let status = StatusLine::new(source.title());

        // Adding to a fresh container cannot fail.
        let table = tree
            .add(root, Widget::Table(table), Constraint::Fill(1))
            .unwrap_or(root);
        let status = tree
            .add(root, Widget::StatusLine(status), Constraint::Fixed(1))
            .unwrap_or(root);
        let notices = tree
            .add(
                root,
                Widget::Notifications(Notifications::new(config.overlay)),
                Constraint::Overlay,
            )
            .unwrap_or(root);
        tree.set_z(notices, OVERLAY_Z);
        tree.set_focus(table);

        Self {
            engine: ModalEngine::new(keymap, config.engine),
            tree,
            table,
            status,
            notices,
            source,
            size: (0, 0),
            opened: Vec::new(),
        }
    }

    #[must_use]
    pub const fn engine(&self) -> &ModalEngine {
        &self.engine
    }

    #[must_use]
    pub const fn tree(&self) -> &WidgetTree {
        &self.tree
    }

    #[must_use]
    pub fn table(&self) -> Option<&Table> {
        self.tree.get(self.table).and_then(Widget::as_table)
    }

    #[must_use]
    pub fn notifications(&self) -> Option<&Notifications> {
        self.tree.get(self.notices).and_then(Widget::as_notifications)
    }

    /// Rows the user opened, oldest first.
    pub fn take_opened(&mut self) -> Vec<Row> {
        std::mem::take(&mut self.opened)
    }

    fn notices_mut(&mut self) -> Option<&mut Notifications> {
        self.tree.get_mut(self.notices).and_then(Widget::as_notifications_mut)
    }

    fn notify(&mut self, text: impl Into<String>, level: Level, now: Instant) {
        if let Some(n) = self.notices_mut() {
            n.notify(text, level, now);
        }
    }

    fn layout(&mut self, cols: u16, rows: u16) {
        self.size = (cols, rows);
        self.tree.layout(Rect::new(0, 0, cols, rows));
    }

    /// Hand each command to the focused widget, then to the global
    /// handlers if the widget passed.
    fn run(&mut self, commands: Vec<Command>, now: Instant) -> Action {
        let mut action = Action::Continue;
        let mut effects = Vec::new();
        for command in commands {
            if self.tree.dispatch(Input::Command(&command), &mut effects) {
                continue;
            }
            match self.global(command, now) {
                Action::Continue => {}
                Action::Quit => action = Action::Quit,
                Action::Redraw if action == Action::Continue => action = Action::Redraw,
                Action::Redraw => {}
            }
        }
        self.apply(effects, now);
        action
    }

    fn global(&mut self, command: Command, now: Instant) -> Action {
        match command {
            Command::Action { action, .. } => match action {
                KeyAction::Quit => Action::Quit,
                KeyAction::Redraw => Action::Redraw,
                KeyAction::FocusNext => {
                    self.tree.focus_next();
                    Action::Continue
                }
                KeyAction::Open | KeyAction::EnterInsert | KeyAction::EnterCommandLine => {
                    Action::Continue
                }
            },
            Command::Submit(text) => self.execute(&text, now),
            Command::Unbound(key) if key.code == KeyCode::Escape => {
                if let Some(n) = self.notices_mut() {
                    n.dismiss_all();
                }
                Action::Continue
            }
            Command::Move { .. }
            | Command::Operate { .. }
            | Command::Input(_)
            | Command::ModeChanged(_)
            | Command::Unbound(_) => Action::Continue,
        }
    }

    /// Run a `:` command.
    fn execute(&mut self, text: &str, now: Instant) -> Action {
        let text = text.trim();
        debug!(command = text, "command line");
        match text {
            "" => Action::Continue,
            "q" | "quit" => Action::Quit,
            "e" | "reload" => {
                self.source.refresh();
                self.notify("reloading", Level::Info, now);
                Action::Continue
            }
            _ => {
                self.notify(format!("not a command: {text}"), Level::Error, now);
                Action::Continue
            }
        }
    }

    fn apply(&mut self, effects: Vec<Effect>, now: Instant) {
        for effect in effects {
            match effect {
                Effect::Notify { text, level } => self.notify(text, level, now),
                Effect::Open(row) => {
                    let label = row.first().cloned().unwrap_or_default();
                    info!(row = %label, "opened");
                    self.notify(format!("opened {label}"), Level::Info, now);
                    self.opened.push(row);
                }
            }
        }
    }
}

impl<S: RowSource> App for Ui<S> {
    fn on_event(&mut self, event: &Event, now: Instant) -> Action {
        match *event {
            Event::Key(key) => {
                let commands = self.engine.handle_key(key, now);
                self.run(commands, now)
            }
            Event::Mouse(mouse) => {
                self.tree.dispatch(Input::Mouse(mouse), &mut Vec::new());
                Action::Continue
            }
            Event::Resize { cols, rows } => {
                self.layout(cols, rows);
                Action::Continue
            }
        }
    }

    fn on_tick(&mut self, now: Instant) -> Option<Action> {
        let engine_due = self.engine.deadline().is_some_and(|at| now >= at);
        let commands = self.engine.expire(now);
        let action = self.run(commands, now);
        let expired = self.notices_mut().is_some_and(|n| n.tick(now));
        (engine_due || expired).then_some(action)
    }

    fn next_deadline(&self) -> Option<Instant> {
        let notices = self.notifications().and_then(Notifications::next_deadline);
        [self.engine.deadline(), notices].into_iter().flatten().min()
    }

    fn before_draw(&mut self) -> bool {
        match self.source.poll() {
            Some(Fetch::Rows(rows)) => {
                debug!(rows = rows.len(), "rows fetched");
                if let Some(table) = self.tree.get_mut(self.table).and_then(Widget::as_table_mut) {
                    table.set_rows(rows);
                    table.set_placeholder("no rows");
                }
                true
            }
            Some(Fetch::Failed(reason)) => {
                self.notify(reason, Level::Error, Instant::now());
                true
            }
            None => false,
        }
    }

    fn draw(&mut self, screen: &mut Screen) {
        let size = (screen.width(), screen.height());
        if size != self.size {
            self.layout(size.0, size.1);
        }

        let position = self
            .table()
            .and_then(|t| t.selected().map(|row| (row, t.len())));
        if let Some(status) = self.tree.get_mut(self.status).and_then(Widget::as_status_line_mut) {
            status.sync(&self.engine, position);
        }

        self.tree.draw(screen.pending_mut());

        let cursor = match (self.engine.mode(), self.tree.rect(self.status)) {
            (Mode::CommandLine, Some(rect)) => self
                .tree
                .get(self.status)
                .and_then(Widget::as_status_line)
                .and_then(|s| s.cursor(rect)),
            _ => None,
        };
        screen.set_cursor(cursor);
    }
}

impl<S> std::fmt::Debug for Ui<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ui")
            .field("engine", &self.engine)
            .field("tree", &self.tree)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
