// SPDX-License-Identifier: MIT
//
// k-term demo: a live event viewer.
//
// Wires the whole pipeline: Terminal → poll → Decoder → Events → Screen →
// one write per frame. Press keys, click, scroll, resize the terminal.
// Ctrl-Q quits, Ctrl-L repaints everything.
//
// Usage:
//   cargo run -p k-term --example demo

use std::collections::VecDeque;
use std::time::Instant;

use k_term::buffer::Rect;
use k_term::cell::{Attr, Style};
use k_term::color::Color;
use k_term::event_loop::{Action, App, EventLoop};
use k_term::input::{Event, KeyCode, KeyEvent, Modifiers};
use k_term::screen::Screen;

/// Events kept in the scrolling log.
const MAX_LOG_ENTRIES: usize = 200;

const HEADER: Style = Style::DEFAULT.fg(Color::BLACK).bg(Color::CYAN).attrs(Attr::BOLD);
const STATUS: Style = Style::DEFAULT.fg(Color::WHITE).bg(Color::BLUE);
const DIM: Style = Style::DEFAULT.attrs(Attr::DIM);

struct Demo {
    log: VecDeque<String>,
    event_count: u64,
    start: Instant,
}

impl Demo {
    fn new() -> Self {
        Self {
            log: VecDeque::with_capacity(MAX_LOG_ENTRIES),
            event_count: 0,
            start: Instant::now(),
        }
    }

    fn push_log(&mut self, msg: String) {
        if self.log.len() == MAX_LOG_ENTRIES {
            self.log.pop_front();
        }
        self.log.push_back(msg);
    }
}

impl App for Demo {
    fn on_event(&mut self, event: &Event, _now: Instant) -> Action {
        self.event_count += 1;
        let action = match event {
            Event::Key(KeyEvent {
                code: KeyCode::Char('q'),
                modifiers,
            }) if modifiers.contains(Modifiers::CTRL) => Action::Quit,
            Event::Key(KeyEvent {
                code: KeyCode::Char('l'),
                modifiers,
            }) if modifiers.contains(Modifiers::CTRL) => Action::Redraw,
            _ => Action::Continue,
        };
        self.push_log(format!("{:>6}  {event:?}", self.event_count));
        action
    }

    fn draw(&mut self, screen: &mut Screen) {
        let (width, height) = (screen.width(), screen.height());
        let grid = screen.pending_mut();
        if height < 3 {
            grid.put_str(0, 0, "too small", Style::DEFAULT, None);
            return;
        }

        grid.fill(Rect::new(0, 0, width, 1), HEADER, None);
        grid.put_str(1, 0, "k-term demo  Ctrl-Q quit  Ctrl-L repaint", HEADER, None);

        let body = Rect::new(0, 1, width, height - 2);
        let visible = usize::from(body.height);
        let skip = self.log.len().saturating_sub(visible);
        for (row, line) in (body.y..).zip(self.log.iter().skip(skip)) {
            grid.put_str(1, row, line, Style::DEFAULT, Some(body));
        }
        if self.log.is_empty() {
            grid.put_str(1, 1, "waiting for input…", DIM, Some(body));
        }

        let status_row = height - 1;
        grid.fill(Rect::new(0, status_row, width, 1), STATUS, None);
        let status = format!(
            " {}x{}  events {}  up {}s",
            width,
            height,
            self.event_count,
            self.start.elapsed().as_secs(),
        );
        grid.put_str(0, status_row, &status, STATUS, None);
    }
}

fn main() -> k_term::Result<()> {
    let mut demo = Demo::new();
    EventLoop::new().run(&mut demo)
}
