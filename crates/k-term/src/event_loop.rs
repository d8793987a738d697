// SPDX-License-Identifier: MIT
//
// Event loop: the heartbeat of the terminal application.
//
// Stdin bytes are decoded into events, the application handles them and
// draws into the screen's pending grid, and the renderer sends only what
// changed. One thread, one loop, one suspension point.
//
// # One wait per iteration
//
// The loop blocks in `poll()` on the input fd. The timeout is the
// earliest of every pending deadline:
//
//   - the decoder's ESC window (a lone ESC waiting for its sequence)
//   - whatever the application reports (key-sequence timeouts,
//     notification expiry)
//   - the optional tick interval
//
// With nothing pending the wait is unbounded, so an idle screen costs
// no CPU at all.
//
// # Order of work after a wake-up
//
//   1. quit flag (set by the application or by SIGTERM/SIGHUP/SIGINT/SIGQUIT)
//   2. resize flag (set by SIGWINCH), delivered as `Event::Resize`
//   3. input bytes, decoded and delivered in arrival order
//   4. timers: ESC expiry, then the application's own deadlines
//   5. `before_draw`, the safe point for merging external data
//   6. draw and render, only when something changed
//
// Input is decoded before timers run, so a sequence whose last bytes
// arrive in the same wake-up as its deadline is never mistaken for a
// bare Escape.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::Result;
use crate::input::{DEFAULT_ESCAPE_TIMEOUT, Decoder, Event};
use crate::screen::{RenderStats, Screen};
use crate::terminal::Terminal;

// ─── App Trait ───────────────────────────────────────────────────────────────

/// What the application tells the event loop to do after handling an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Action {
    /// Continue running.
    #[default]
    Continue,
    /// Exit the event loop cleanly.
    Quit,
    /// Repaint the whole terminal on the next frame, not just the diff.
    Redraw,
}

/// Application interface for the event loop.
///
/// The event loop calls these methods in this order each iteration:
///
/// 1. [`on_event`](App::on_event) for each decoded input event
/// 2. [`on_tick`](App::on_tick) after input, for time-based state
/// 3. [`before_draw`](App::before_draw) once, before any drawing
/// 4. [`draw`](App::draw) when the frame is dirty
///
/// Only [`draw`](App::draw) is required.
pub trait App {
    /// Handle a key, mouse or resize event received at `now`.
    fn on_event(&mut self, _event: &Event, _now: Instant) -> Action {
        Action::Continue
    }

    /// Run timer work due at `now`. Return `None` if nothing changed;
    /// otherwise the frame is repainted and the action applied as for an
    /// event, so a key sequence that settles on a timer can still quit.
    fn on_tick(&mut self, _now: Instant) -> Option<Action> {
        None
    }

    /// The earliest instant the application needs [`on_tick`](App::on_tick)
    /// called, if any.
    fn next_deadline(&self) -> Option<Instant> {
        None
    }

    /// Merge data produced outside the loop. Return `true` if anything
    /// visible changed.
    fn before_draw(&mut self) -> bool {
        false
    }

    /// Draw the current state into `screen.pending_mut()`.
    ///
    /// The pending grid has been cleared before this call; draw everything
    /// that should be visible and place the cursor with
    /// [`Screen::set_cursor`].
    fn draw(&mut self, screen: &mut Screen);
}

// ─── Loop Config ─────────────────────────────────────────────────────────────

/// Timing configuration for the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    /// How long a lone ESC waits for the rest of a sequence. Clamped to
    /// 25..=50 ms by the decoder.
    pub escape_timeout: Duration,
    /// Wake at least this often even when nothing is pending. `None`
    /// sleeps until input or a deadline.
    pub tick_interval: Option<Duration>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            escape_timeout: DEFAULT_ESCAPE_TIMEOUT,
            tick_interval: None,
        }
    }
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// Everything one loop iteration touches except the terminal itself:
/// the decoder, the screen and the dirty/quit flags.
///
/// [`EventLoop`] feeds it real input; tests feed it bytes directly.
pub struct Session {
    decoder: Decoder,
    screen: Screen,
    config: LoopConfig,
    dirty: bool,
    quit: bool,
}

impl Session {
    /// A session with a `cols`×`rows` screen. The first frame always draws.
    ///
    /// # Errors
    ///
    /// [`Error::AllocationFailure`](crate::Error::AllocationFailure) if the
    /// screen cannot be allocated.
    pub fn new(cols: u16, rows: u16, config: LoopConfig) -> Result<Self> {
        Ok(Self {
            decoder: Decoder::new(config.escape_timeout),
            screen: Screen::new(cols, rows)?,
            config,
            dirty: true,
            quit: false,
        })
    }

    #[inline]
    #[must_use]
    pub const fn screen(&self) -> &Screen {
        &self.screen
    }

    #[inline]
    pub fn screen_mut(&mut self) -> &mut Screen {
        &mut self.screen
    }

    #[inline]
    #[must_use]
    pub const fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    /// Whether the application (or a signal) asked to stop.
    #[inline]
    #[must_use]
    pub const fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn request_quit(&mut self) {
        self.quit = true;
    }

    /// How long the loop may sleep at `now` before some deadline is due.
    /// `None` means no deadline at all.
    #[must_use]
    pub fn wait_timeout(&self, now: Instant, app: &impl App) -> Option<Duration> {
        let tick = self.config.tick_interval.map(|d| now + d);
        [self.decoder.deadline(), app.next_deadline(), tick]
            .into_iter()
            .flatten()
            .min()
            .map(|at| at.saturating_duration_since(now))
    }

    /// Decode `bytes` received at `now` and deliver the events.
    pub fn input(&mut self, bytes: &[u8], now: Instant, app: &mut impl App) {
        let events = self.decoder.feed_at(bytes, now);
        self.deliver(&events, now, app);
    }

    /// Resize the screen and tell the application.
    ///
    /// # Errors
    ///
    /// [`Error::AllocationFailure`](crate::Error::AllocationFailure) if the
    /// new grids cannot be allocated.
    pub fn resize(&mut self, cols: u16, rows: u16, now: Instant, app: &mut impl App) -> Result<()> {
        if (cols, rows) != (self.screen.width(), self.screen.height()) {
            debug!(cols, rows, "resize");
            self.screen.resize(cols, rows)?;
        }
        self.deliver(&[Event::Resize { cols, rows }], now, app);
        Ok(())
    }

    /// Run everything due at `now`: the ESC window first, then the
    /// application's timers.
    pub fn timers(&mut self, now: Instant, app: &mut impl App) {
        let events = self.decoder.expire(now);
        self.deliver(&events, now, app);
        if self.quit {
            return;
        }
        if let Some(action) = app.on_tick(now) {
            self.dirty = true;
            self.apply(action);
        }
    }

    /// Draw and render if anything changed. The output is left in the
    /// screen's buffer for the caller to flush.
    pub fn frame(&mut self, app: &mut impl App) -> Option<RenderStats> {
        if app.before_draw() {
            self.dirty = true;
        }
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        self.screen.pending_mut().clear();
        app.draw(&mut self.screen);
        Some(self.screen.render())
    }

    fn deliver(&mut self, events: &[Event], now: Instant, app: &mut impl App) {
        for event in events {
            if self.quit {
                return;
            }
            self.dirty = true;
            let action = app.on_event(event, now);
            self.apply(action);
        }
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::Continue => {}
            Action::Quit => self.quit = true,
            Action::Redraw => self.screen.invalidate(),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("decoder", &self.decoder)
            .field("screen", &self.screen)
            .field("dirty", &self.dirty)
            .field("quit", &self.quit)
            .finish_non_exhaustive()
    }
}

// ─── EventLoop ───────────────────────────────────────────────────────────────

/// Bytes read from the terminal per wake-up.
const READ_CHUNK: usize = 4096;

/// The terminal event loop.
///
/// Owns the terminal. Call [`run`](Self::run) to enter the loop; it returns
/// when the application signals [`Action::Quit`], a termination signal
/// arrives, or input reaches end of file.
///
/// # Example
///
/// ```no_run
/// use std::time::Instant;
/// use k_term::event_loop::{Action, App, EventLoop};
/// use k_term::input::{Event, KeyCode, KeyEvent};
/// use k_term::screen::Screen;
///
/// struct MyApp;
///
/// impl App for MyApp {
///     fn on_event(&mut self, event: &Event, _now: Instant) -> Action {
///         if let Event::Key(KeyEvent { code: KeyCode::Char('q'), .. }) = event {
///             return Action::Quit;
///         }
///         Action::Continue
///     }
///
///     fn draw(&mut self, screen: &mut Screen) {
///         // Draw your UI here...
///     }
/// }
///
/// EventLoop::new().run(&mut MyApp)?;
/// # Ok::<(), k_term::Error>(())
/// ```
#[derive(Debug)]
pub struct EventLoop {
    terminal: Terminal,
    config: LoopConfig,
}

impl EventLoop {
    /// An event loop on stdin/stdout with default timing.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(LoopConfig::default())
    }

    #[must_use]
    pub fn with_config(config: LoopConfig) -> Self {
        Self {
            terminal: Terminal::new(),
            config,
        }
    }

    /// Use `terminal` instead of a default stdin/stdout handle.
    #[must_use]
    pub fn with_terminal(mut self, terminal: Terminal) -> Self {
        self.terminal = terminal;
        self
    }

    /// Run the loop until the application quits.
    ///
    /// Enters raw mode first and restores the terminal on the way out,
    /// whether the loop ended cleanly or with an error.
    ///
    /// # Errors
    ///
    /// - [`Error::TerminalUnavailable`](crate::Error::TerminalUnavailable)
    ///   if the terminal cannot be put in raw mode.
    /// - [`Error::AllocationFailure`](crate::Error::AllocationFailure) if a
    ///   resize cannot allocate the new screen.
    /// - [`Error::Io`](crate::Error::Io) if reading or writing the terminal
    ///   fails.
    pub fn run(&mut self, app: &mut impl App) -> Result<()> {
        self.terminal.enter()?;
        let result = self.run_inner(app);
        let restored = self.terminal.restore();
        result.and(restored)
    }

    fn run_inner(&mut self, app: &mut impl App) -> Result<()> {
        let size = self.terminal.size();
        let mut session = Session::new(size.cols, size.rows, self.config)?;
        let mut buf = [0u8; READ_CHUNK];

        loop {
            if session.should_quit() || self.terminal.quit_requested() {
                return Ok(());
            }

            if self.terminal.take_resize() {
                let size = self.terminal.query_geometry();
                session.resize(size.cols, size.rows, Instant::now(), app)?;
            }

            let timeout = session.wait_timeout(Instant::now(), app);
            let readable = self.terminal.wait_readable(timeout)?;
            let now = Instant::now();
            if readable {
                let n = self.terminal.read_input(&mut buf)?;
                if n == 0 {
                    debug!("input closed");
                    return Ok(());
                }
                session.input(&buf[..n], now, app);
            }
            session.timers(now, app);

            if session.frame(app).is_some() {
                session.screen_mut().flush_to(&mut self.terminal)?;
            }
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Style;
    use crate::input::{KeyCode, KeyEvent};
    use pretty_assertions::assert_eq;

    /// Records events and draws the last typed character.
    #[derive(Default)]
    struct Recorder {
        events: Vec<Event>,
        draws: usize,
        ticks: usize,
        deadline: Option<Instant>,
        tick_action: Action,
        fresh_data: bool,
    }

    impl App for Recorder {
        fn on_event(&mut self, event: &Event, _now: Instant) -> Action {
            self.events.push(*event);
            match event {
                Event::Key(KeyEvent {
                    code: KeyCode::Char('q'),
                    ..
                }) => Action::Quit,
                Event::Key(KeyEvent {
                    code: KeyCode::Char('l'),
                    ..
                }) => Action::Redraw,
                _ => Action::Continue,
            }
        }

        fn on_tick(&mut self, now: Instant) -> Option<Action> {
            self.ticks += 1;
            match self.deadline {
                Some(at) if now >= at => {
                    self.deadline = None;
                    Some(self.tick_action)
                }
                _ => None,
            }
        }

        fn next_deadline(&self) -> Option<Instant> {
            self.deadline
        }

        fn before_draw(&mut self) -> bool {
            std::mem::take(&mut self.fresh_data)
        }

        fn draw(&mut self, screen: &mut Screen) {
            self.draws += 1;
            let text = format!("{}", self.events.len());
            screen.pending_mut().put_str(0, 0, &text, Style::DEFAULT, None);
        }
    }

    fn session() -> Session {
        Session::new(10, 2, LoopConfig::default()).unwrap()
    }

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::plain(code))
    }

    #[test]
    fn default_config() {
        let config = LoopConfig::default();
        assert_eq!(config.escape_timeout, DEFAULT_ESCAPE_TIMEOUT);
        assert_eq!(config.tick_interval, None);
    }

    #[test]
    fn first_frame_always_draws() {
        let mut s = session();
        let mut app = Recorder::default();
        let stats = s.frame(&mut app).unwrap();
        assert!(stats.full_redraw);
        assert_eq!(app.draws, 1);
        assert!(s.frame(&mut app).is_none());
        assert_eq!(app.draws, 1);
    }

    #[test]
    fn input_is_delivered_in_order_and_marks_dirty() {
        let mut s = session();
        let mut app = Recorder::default();
        s.frame(&mut app);
        s.input(b"ab\x1b[A", Instant::now(), &mut app);
        assert_eq!(
            app.events,
            vec![key(KeyCode::Char('a')), key(KeyCode::Char('b')), key(KeyCode::Up)]
        );
        assert!(s.frame(&mut app).is_some());
        assert_eq!(s.screen().pending().row_text(0).trim_end(), "3");
    }

    #[test]
    fn quit_stops_delivery() {
        let mut s = session();
        let mut app = Recorder::default();
        s.input(b"aqb", Instant::now(), &mut app);
        assert!(s.should_quit());
        assert_eq!(app.events.len(), 2);
    }

    #[test]
    fn redraw_forces_full_repaint() {
        let mut s = session();
        let mut app = Recorder::default();
        s.frame(&mut app);
        let mut sink = Vec::new();
        s.screen_mut().flush_to(&mut sink).unwrap();
        s.input(b"l", Instant::now(), &mut app);
        assert!(s.frame(&mut app).unwrap().full_redraw);
    }

    #[test]
    fn lone_escape_resolves_after_window() {
        let t0 = Instant::now();
        let mut s = session();
        let mut app = Recorder::default();
        s.input(b"\x1b", t0, &mut app);
        assert!(app.events.is_empty());
        assert_eq!(s.wait_timeout(t0, &app), Some(DEFAULT_ESCAPE_TIMEOUT));

        s.timers(t0 + Duration::from_millis(10), &mut app);
        assert!(app.events.is_empty());

        s.timers(t0 + Duration::from_millis(40), &mut app);
        assert_eq!(app.events, vec![key(KeyCode::Escape)]);
        assert_eq!(s.wait_timeout(t0, &app), None);
    }

    #[test]
    fn input_before_timers_completes_sequence() {
        let t0 = Instant::now();
        let mut s = session();
        let mut app = Recorder::default();
        s.input(b"\x1b", t0, &mut app);
        // The rest arrives in the same wake-up that the window would expire.
        let late = t0 + Duration::from_millis(100);
        s.input(b"[B", late, &mut app);
        s.timers(late, &mut app);
        assert_eq!(app.events, vec![key(KeyCode::Down)]);
    }

    #[test]
    fn wait_timeout_takes_earliest_deadline() {
        let t0 = Instant::now();
        let config = LoopConfig {
            tick_interval: Some(Duration::from_secs(5)),
            ..LoopConfig::default()
        };
        let s = Session::new(4, 1, config).unwrap();
        let mut app = Recorder::default();
        assert_eq!(s.wait_timeout(t0, &app), Some(Duration::from_secs(5)));
        app.deadline = Some(t0 + Duration::from_millis(500));
        assert_eq!(s.wait_timeout(t0, &app), Some(Duration::from_millis(500)));
        // A deadline already in the past means no sleep at all.
        assert_eq!(
            s.wait_timeout(t0 + Duration::from_secs(1), &app),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn tick_and_before_draw_mark_dirty() {
        let t0 = Instant::now();
        let mut s = session();
        let mut app = Recorder::default();
        s.frame(&mut app);

        app.deadline = Some(t0);
        s.timers(t0, &mut app);
        assert_eq!(app.ticks, 1);
        assert!(s.frame(&mut app).is_some());

        app.fresh_data = true;
        assert!(s.frame(&mut app).is_some());
        assert!(s.frame(&mut app).is_none());
    }

    #[test]
    fn tick_can_quit_and_redraw() {
        let t0 = Instant::now();
        let mut s = session();
        let mut app = Recorder::default();
        s.frame(&mut app);

        app.deadline = Some(t0);
        app.tick_action = Action::Redraw;
        s.timers(t0, &mut app);
        assert!(!s.should_quit());
        assert!(s.frame(&mut app).unwrap().full_redraw);

        app.deadline = Some(t0);
        app.tick_action = Action::Quit;
        s.timers(t0, &mut app);
        assert!(s.should_quit());
    }

    #[test]
    fn resize_reaches_screen_and_app() {
        let mut s = session();
        let mut app = Recorder::default();
        s.resize(30, 5, Instant::now(), &mut app).unwrap();
        assert_eq!((s.screen().width(), s.screen().height()), (30, 5));
        assert_eq!(app.events, vec![Event::Resize { cols: 30, rows: 5 }]);
        assert!(s.frame(&mut app).unwrap().full_redraw);
    }

    #[test]
    fn idle_frame_writes_nothing() {
        let mut s = session();
        let mut app = Recorder::default();
        s.input(b"x", Instant::now(), &mut app);
        s.frame(&mut app);
        let mut sink = Vec::new();
        s.screen_mut().flush_to(&mut sink).unwrap();
        assert!(!sink.is_empty());

        // Same content drawn again: render runs but sends nothing.
        app.fresh_data = true;
        let stats = s.frame(&mut app).unwrap();
        assert_eq!(stats.bytes_written, 0);
    }

    #[test]
    fn run_without_tty_fails_before_any_output() {
        if crate::terminal::is_tty() {
            return;
        }
        let mut app = Recorder::default();
        let err = EventLoop::new().run(&mut app).unwrap_err();
        assert!(matches!(err, crate::Error::TerminalUnavailable(_)));
        assert_eq!(app.draws, 0);
    }
}
