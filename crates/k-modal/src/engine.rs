//! The modal state machine.
//!
//! Raw keys in, [`Command`]s out. The engine owns everything Vim keeps
//! between keystrokes:
//!
//! - the current [`Mode`]
//! - the count being typed (`1`-`9` start one, `0` only extends it)
//! - a pending operator (`d`, `y`) waiting for its motion
//! - a pending key sequence (`g` waiting for the second `g`)
//! - the command-line text
//!
//! Vim's grammar for Normal mode is `[count] operator [count] motion`.
//! Both counts multiply: `2d3j` deletes over six rows. Doubling the
//! operator key (`dd`, `yy`) selects [`Motion::Line`].
//!
//! # Timeouts
//!
//! Two things wait on time, and neither involves sleeping:
//!
//! - A sequence that is a prefix of a longer one (`g` of `gg`) waits
//!   [`EngineConfig::sequence_timeout`]. When it runs out the prefix's own
//!   binding fires if it has one; otherwise the keys are discarded.
//! - An operator with no follow-up is dropped after
//!   [`EngineConfig::operator_timeout`].
//!
//! [`ModalEngine::deadline`] reports the earliest of these and
//! [`ModalEngine::expire`] settles whatever is due.

use std::time::{Duration, Instant};

use k_term::input::{KeyCode, KeyEvent};
use tracing::debug;

use crate::command_line::CommandLine;
use crate::keymap::default_keymap;
use crate::mode::Mode;
use crate::motion::{Motion, Operator};
use crate::trie::{Action, Binding, KeyTrie, Lookup};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Timing for multi-key input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long an ambiguous prefix waits for the next key.
    pub sequence_timeout: Duration,
    /// How long an operator waits for its motion.
    pub operator_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sequence_timeout: Duration::from_millis(500),
            operator_timeout: Duration::from_secs(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// What the engine made of the keys so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Move the selection.
    Move { motion: Motion, count: usize },
    /// Apply `operator` to the rows `motion` covers. The receiver computes
    /// the rows with [`Motion::range`].
    Operate {
        operator: Operator,
        motion: Motion,
        count: usize,
    },
    Action { action: Action, count: usize },
    /// An Insert-mode key, passed through untouched.
    Input(KeyEvent),
    /// Enter in command-line mode, with the typed text (no leading `:`).
    Submit(String),
    ModeChanged(Mode),
    /// A Normal-mode key with no binding. The focused widget or the
    /// application's global keys may still want it.
    Unbound(KeyEvent),
}

// ---------------------------------------------------------------------------
// ModalEngine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct PendingOperator {
    operator: Operator,
    /// Count typed before the operator.
    count: Option<usize>,
    /// The key that started it, so doubling it means "this line".
    key: KeyEvent,
    deadline: Instant,
}

/// Modal input engine.
#[derive(Debug)]
pub struct ModalEngine {
    keymap: KeyTrie,
    config: EngineConfig,
    mode: Mode,
    count: Option<usize>,
    operator: Option<PendingOperator>,
    sequence: Vec<KeyEvent>,
    sequence_deadline: Option<Instant>,
    command_line: CommandLine,
}

impl ModalEngine {
    #[must_use]
    pub fn new(keymap: KeyTrie, config: EngineConfig) -> Self {
        Self {
            keymap,
            config,
            mode: Mode::Normal,
            count: None,
            operator: None,
            sequence: Vec::with_capacity(4),
            sequence_deadline: None,
            command_line: CommandLine::new(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub const fn command_line(&self) -> &CommandLine {
        &self.command_line
    }

    /// The count typed so far, if any.
    #[inline]
    #[must_use]
    pub const fn count(&self) -> Option<usize> {
        self.count
    }

    /// The operator waiting for a motion, if any.
    #[must_use]
    pub fn pending_operator(&self) -> Option<Operator> {
        self.operator.map(|op| op.operator)
    }

    /// Keys of an unfinished sequence.
    #[must_use]
    pub fn pending_keys(&self) -> &[KeyEvent] {
        &self.sequence
    }

    /// When [`expire`](Self::expire) next has work to do.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        [self.sequence_deadline, self.operator.map(|op| op.deadline)]
            .into_iter()
            .flatten()
            .min()
    }

    /// Feed one key received at `now`.
    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) -> Vec<Command> {
        let mut out = Vec::new();
        match self.mode {
            Mode::Normal => self.normal(key, now, &mut out),
            Mode::Insert => self.insert(key, &mut out),
            Mode::CommandLine => self.command(key, &mut out),
        }
        out
    }

    /// Settle whatever has timed out by `now`.
    pub fn expire(&mut self, now: Instant) -> Vec<Command> {
        let mut out = Vec::new();
        if self.sequence_deadline.is_some_and(|at| now >= at) {
            self.settle_sequence(now, &mut out);
        }
        if self.operator.is_some_and(|op| now >= op.deadline) {
            self.drop_operator("timed out");
        }
        out
    }

    // -- Normal mode --------------------------------------------------------

    fn normal(&mut self, key: KeyEvent, now: Instant, out: &mut Vec<Command>) {
        if let Some(op) = self.operator.as_mut() {
            op.deadline = now + self.config.operator_timeout;
        }

        if self.sequence.is_empty() {
            if let Some(digit) = self.count_digit(key) {
                self.push_count_digit(digit);
                return;
            }
            if self.operator.is_some_and(|op| op.key == key) {
                self.resolve(Binding::Motion(Motion::Line), key, now, out);
                return;
            }
        }

        self.sequence.push(key);
        match self.keymap.lookup(&self.sequence) {
            Lookup::Leaf(binding) => {
                self.clear_sequence();
                self.resolve(binding, key, now, out);
            }
            Lookup::Prefix { .. } => {
                self.sequence_deadline = Some(now + self.config.sequence_timeout);
            }
            Lookup::None if self.sequence.len() > 1 => {
                // `key` does not continue the sequence: settle what came
                // before it, then start over with `key` alone.
                self.sequence.pop();
                self.settle_sequence(now, out);
                self.normal(key, now, out);
            }
            Lookup::None => {
                self.clear_sequence();
                if self.operator.is_some() {
                    self.drop_operator("not a motion");
                    self.normal(key, now, out);
                } else {
                    self.count = None;
                    out.push(Command::Unbound(key));
                }
            }
        }
    }

    /// Resolve the pending sequence on its own: fire its binding if it has
    /// one, otherwise discard it.
    fn settle_sequence(&mut self, now: Instant, out: &mut Vec<Command>) {
        let keys = std::mem::take(&mut self.sequence);
        self.sequence_deadline = None;
        match (self.keymap.lookup(&keys), keys.last()) {
            (Lookup::Leaf(binding) | Lookup::Prefix { binding: Some(binding) }, Some(&key)) => {
                self.resolve(binding, key, now, out);
            }
            _ => {
                debug!(?keys, "key sequence discarded");
                self.count = None;
                if self.operator.is_some() {
                    self.drop_operator("not a motion");
                }
            }
        }
    }

    fn resolve(&mut self, binding: Binding, key: KeyEvent, now: Instant, out: &mut Vec<Command>) {
        match binding {
            Binding::Motion(motion) => {
                let count = self.count.take();
                match self.operator.take() {
                    Some(op) => out.push(Command::Operate {
                        operator: op.operator,
                        motion,
                        count: merge_counts(op.count, count),
                    }),
                    None => out.push(Command::Move {
                        motion,
                        count: count.unwrap_or(1),
                    }),
                }
            }
            Binding::Operator(operator) => {
                if self.operator.is_some() {
                    self.drop_operator("replaced");
                }
                self.operator = Some(PendingOperator {
                    operator,
                    count: self.count.take(),
                    key,
                    deadline: now + self.config.operator_timeout,
                });
            }
            Binding::Action(action) => {
                if self.operator.is_some() {
                    self.drop_operator("not a motion");
                }
                let count = self.count.take().unwrap_or(1);
                match action {
                    Action::EnterInsert => self.set_mode(Mode::Insert, out),
                    Action::EnterCommandLine => {
                        self.command_line.clear();
                        self.set_mode(Mode::CommandLine, out);
                    }
                    _ => out.push(Command::Action { action, count }),
                }
            }
        }
    }

    /// The digit `key` adds to the count, if it is a count key. `0` only
    /// counts once a count has started.
    fn count_digit(&self, key: KeyEvent) -> Option<u8> {
        if !key.modifiers.is_empty() {
            return None;
        }
        match key.code {
            KeyCode::Char(ch @ '1'..='9') => ch.to_digit(10).and_then(|d| u8::try_from(d).ok()),
            KeyCode::Char('0') if self.count.is_some() => Some(0),
            _ => None,
        }
    }

    fn push_count_digit(&mut self, digit: u8) {
        let current = self.count.unwrap_or(0);
        self.count = Some(current.saturating_mul(10).saturating_add(usize::from(digit)));
    }

    fn drop_operator(&mut self, reason: &'static str) {
        if let Some(op) = self.operator.take() {
            debug!(operator = %op.operator, reason, "operator dropped");
        }
        self.count = None;
    }

    fn clear_sequence(&mut self) {
        self.sequence.clear();
        self.sequence_deadline = None;
    }

    // -- Insert and command-line modes --------------------------------------

    fn insert(&mut self, key: KeyEvent, out: &mut Vec<Command>) {
        if key.code == KeyCode::Escape {
            self.set_mode(Mode::Normal, out);
        } else {
            out.push(Command::Input(key));
        }
    }

    fn command(&mut self, key: KeyEvent, out: &mut Vec<Command>) {
        let line = &mut self.command_line;
        match key.code {
            KeyCode::Enter => {
                out.push(Command::Submit(line.take()));
                self.set_mode(Mode::Normal, out);
            }
            KeyCode::Escape => {
                line.clear();
                self.set_mode(Mode::Normal, out);
            }
            KeyCode::Backspace if line.is_empty() => self.set_mode(Mode::Normal, out),
            KeyCode::Backspace => {
                line.backspace();
            }
            KeyCode::Delete => {
                line.delete();
            }
            KeyCode::Left => line.move_left(),
            KeyCode::Right => line.move_right(),
            KeyCode::Home => line.move_home(),
            KeyCode::End => line.move_end(),
            _ => {
                if let Some(ch) = key.printable() {
                    line.insert_char(ch);
                }
            }
        }
    }

    fn set_mode(&mut self, mode: Mode, out: &mut Vec<Command>) {
        if mode == self.mode {
            return;
        }
        debug!(from = %self.mode, to = %mode, "mode change");
        self.mode = mode;
        self.count = None;
        self.operator = None;
        self.clear_sequence();
        out.push(Command::ModeChanged(mode));
    }
}

impl Default for ModalEngine {
    fn default() -> Self {
        Self::new(default_keymap(), EngineConfig::default())
    }
}

/// Multiply the count typed before an operator by the one typed before
/// its motion. A missing count is 1.
fn merge_counts(a: Option<usize>, b: Option<usize>) -> usize {
    a.unwrap_or(1).saturating_mul(b.unwrap_or(1))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::plain(code)
    }

    fn ch(c: char) -> KeyEvent {
        key(KeyCode::Char(c))
    }

    /// Feed `text` one char per key, all at `now`, collecting commands.
    fn type_str(engine: &mut ModalEngine, text: &str, now: Instant) -> Vec<Command> {
        text.chars()
            .flat_map(|c| engine.handle_key(ch(c), now))
            .collect()
    }

    fn mv(motion: Motion, count: usize) -> Command {
        Command::Move { motion, count }
    }

    fn op(operator: Operator, motion: Motion, count: usize) -> Command {
        Command::Operate {
            operator,
            motion,
            count,
        }
    }

    // -- Counts and motions ---------------------------------------------------

    #[test]
    fn plain_motion() {
        let mut e = ModalEngine::default();
        assert_eq!(type_str(&mut e, "j", Instant::now()), vec![mv(Motion::Down, 1)]);
    }

    #[test]
    fn count_then_motion() {
        let mut e = ModalEngine::default();
        let now = Instant::now();
        assert_eq!(type_str(&mut e, "3", now), vec![]);
        assert_eq!(e.count(), Some(3));
        assert_eq!(type_str(&mut e, "j", now), vec![mv(Motion::Down, 3)]);
        assert_eq!(e.count(), None);
    }

    #[test]
    fn zero_extends_but_never_starts_a_count() {
        let mut e = ModalEngine::default();
        let now = Instant::now();
        assert_eq!(type_str(&mut e, "10k", now), vec![mv(Motion::Up, 10)]);
        assert_eq!(type_str(&mut e, "0", now), vec![Command::Unbound(ch('0'))]);
    }

    #[test]
    fn count_resets_after_unbound_key() {
        let mut e = ModalEngine::default();
        let now = Instant::now();
        assert_eq!(type_str(&mut e, "5x", now), vec![Command::Unbound(ch('x'))]);
        assert_eq!(type_str(&mut e, "j", now), vec![mv(Motion::Down, 1)]);
    }

    #[test]
    fn named_keys_and_ctrl_bindings() {
        let mut e = ModalEngine::default();
        let now = Instant::now();
        assert_eq!(e.handle_key(key(KeyCode::Down), now), vec![mv(Motion::Down, 1)]);
        assert_eq!(
            e.handle_key(KeyEvent::ctrl('d'), now),
            vec![mv(Motion::HalfPageDown, 1)]
        );
        assert_eq!(
            e.handle_key(KeyEvent::ctrl('l'), now),
            vec![Command::Action {
                action: Action::Redraw,
                count: 1
            }]
        );
    }

    // -- Operators -------------------------------------------------------------

    #[test]
    fn counts_multiply_across_operator() {
        let mut e = ModalEngine::default();
        assert_eq!(
            type_str(&mut e, "2d3j", Instant::now()),
            vec![op(Operator::Delete, Motion::Down, 6)]
        );
        assert_eq!(e.pending_operator(), None);
    }

    #[test]
    fn doubled_operator_is_line() {
        let mut e = ModalEngine::default();
        let now = Instant::now();
        assert_eq!(type_str(&mut e, "dd", now), vec![op(Operator::Delete, Motion::Line, 1)]);
        assert_eq!(type_str(&mut e, "3yy", now), vec![op(Operator::Yank, Motion::Line, 3)]);
    }

    #[test]
    fn operator_with_sequence_motion() {
        let mut e = ModalEngine::default();
        assert_eq!(
            type_str(&mut e, "ygg", Instant::now()),
            vec![op(Operator::Yank, Motion::First, 1)]
        );
    }

    #[test]
    fn operator_then_non_motion_is_dropped() {
        let mut e = ModalEngine::default();
        let now = Instant::now();
        assert_eq!(type_str(&mut e, "dx", now), vec![Command::Unbound(ch('x'))]);
        assert_eq!(e.pending_operator(), None);
        // The next motion moves instead of deleting.
        assert_eq!(type_str(&mut e, "j", now), vec![mv(Motion::Down, 1)]);
    }

    #[test]
    fn operator_then_action_runs_action() {
        let mut e = ModalEngine::default();
        assert_eq!(
            type_str(&mut e, "di", Instant::now()),
            vec![Command::ModeChanged(Mode::Insert)]
        );
    }

    #[test]
    fn different_operator_replaces_pending_one() {
        let mut e = ModalEngine::default();
        assert_eq!(
            type_str(&mut e, "dyj", Instant::now()),
            vec![op(Operator::Yank, Motion::Down, 1)]
        );
    }

    #[test]
    fn operator_times_out() {
        let t0 = Instant::now();
        let mut e = ModalEngine::default();
        type_str(&mut e, "d", t0);
        assert_eq!(e.deadline(), Some(t0 + Duration::from_secs(1)));

        assert_eq!(e.expire(t0 + Duration::from_millis(999)), vec![]);
        assert_eq!(e.pending_operator(), Some(Operator::Delete));

        assert_eq!(e.expire(t0 + Duration::from_secs(1)), vec![]);
        assert_eq!(e.pending_operator(), None);
        assert_eq!(e.deadline(), None);
    }

    // -- Sequences ---------------------------------------------------------------

    #[test]
    fn gg_within_window() {
        let t0 = Instant::now();
        let mut e = ModalEngine::default();
        assert_eq!(type_str(&mut e, "g", t0), vec![]);
        assert_eq!(e.pending_keys(), &[ch('g')]);
        assert_eq!(e.deadline(), Some(t0 + Duration::from_millis(500)));
        let t1 = t0 + Duration::from_millis(200);
        assert_eq!(type_str(&mut e, "g", t1), vec![mv(Motion::First, 1)]);
        assert_eq!(e.deadline(), None);
    }

    #[test]
    fn lone_prefix_is_discarded_on_expiry() {
        let t0 = Instant::now();
        let mut e = ModalEngine::default();
        type_str(&mut e, "g", t0);
        assert_eq!(e.expire(t0 + Duration::from_millis(499)), vec![]);
        assert_eq!(e.pending_keys(), &[ch('g')]);
        assert_eq!(e.expire(t0 + Duration::from_millis(500)), vec![]);
        assert!(e.pending_keys().is_empty());
        assert_eq!(type_str(&mut e, "g", t0), vec![]);
    }

    #[test]
    fn non_continuation_is_reprocessed() {
        let mut e = ModalEngine::default();
        assert_eq!(
            type_str(&mut e, "gj", Instant::now()),
            vec![mv(Motion::Down, 1)]
        );
    }

    #[test]
    fn count_with_sequence() {
        let mut e = ModalEngine::default();
        assert_eq!(
            type_str(&mut e, "4gg", Instant::now()),
            vec![mv(Motion::First, 4)]
        );
    }

    #[test]
    fn prefix_with_own_binding_fires_on_expiry() {
        let mut keymap = KeyTrie::new();
        keymap
            .bind(&[ch('q')], Binding::Action(Action::Quit))
            .bind(&[ch('q'), ch('q')], Binding::Action(Action::Redraw));
        let mut e = ModalEngine::new(keymap, EngineConfig::default());
        let t0 = Instant::now();
        assert_eq!(type_str(&mut e, "q", t0), vec![]);
        assert_eq!(
            e.expire(t0 + Duration::from_secs(1)),
            vec![Command::Action {
                action: Action::Quit,
                count: 1
            }]
        );
    }

    #[test]
    fn prefix_with_own_binding_fires_before_next_key() {
        let mut keymap = KeyTrie::new();
        keymap
            .bind(&[ch('q')], Binding::Action(Action::Quit))
            .bind(&[ch('q'), ch('q')], Binding::Action(Action::Redraw))
            .bind(&[ch('j')], Binding::Motion(Motion::Down));
        let mut e = ModalEngine::new(keymap, EngineConfig::default());
        assert_eq!(
            type_str(&mut e, "qj", Instant::now()),
            vec![
                Command::Action {
                    action: Action::Quit,
                    count: 1
                },
                mv(Motion::Down, 1),
            ]
        );
    }

    #[test]
    fn zz_quits() {
        let mut e = ModalEngine::default();
        assert_eq!(
            type_str(&mut e, "ZZ", Instant::now()),
            vec![Command::Action {
                action: Action::Quit,
                count: 1
            }]
        );
    }

    // -- Modes -------------------------------------------------------------------

    #[test]
    fn insert_passes_keys_through() {
        let mut e = ModalEngine::default();
        let now = Instant::now();
        assert_eq!(type_str(&mut e, "i", now), vec![Command::ModeChanged(Mode::Insert)]);
        assert_eq!(
            type_str(&mut e, "j3", now),
            vec![Command::Input(ch('j')), Command::Input(ch('3'))]
        );
        assert_eq!(
            e.handle_key(key(KeyCode::Escape), now),
            vec![Command::ModeChanged(Mode::Normal)]
        );
        assert_eq!(e.mode(), Mode::Normal);
    }

    #[test]
    fn mode_change_clears_pending_count() {
        let mut e = ModalEngine::default();
        let now = Instant::now();
        type_str(&mut e, "5i", now);
        e.handle_key(key(KeyCode::Escape), now);
        assert_eq!(e.count(), None);
        assert_eq!(type_str(&mut e, "j", now), vec![mv(Motion::Down, 1)]);
    }

    #[test]
    fn command_line_editing_and_submit() {
        let mut e = ModalEngine::default();
        let now = Instant::now();
        assert_eq!(
            type_str(&mut e, ":", now),
            vec![Command::ModeChanged(Mode::CommandLine)]
        );
        assert_eq!(type_str(&mut e, "abc", now), vec![]);
        e.handle_key(key(KeyCode::Backspace), now);
        e.handle_key(key(KeyCode::Left), now);
        type_str(&mut e, "X", now);
        assert_eq!(e.command_line().input(), "aXb");
        assert_eq!(
            e.handle_key(key(KeyCode::Enter), now),
            vec![
                Command::Submit("aXb".to_string()),
                Command::ModeChanged(Mode::Normal),
            ]
        );
        assert!(e.command_line().is_empty());
    }

    #[test]
    fn command_line_escape_discards() {
        let mut e = ModalEngine::default();
        let now = Instant::now();
        type_str(&mut e, ":quit", now);
        assert_eq!(
            e.handle_key(key(KeyCode::Escape), now),
            vec![Command::ModeChanged(Mode::Normal)]
        );
        assert!(e.command_line().is_empty());
    }

    #[test]
    fn command_line_backspace_when_empty_leaves() {
        let mut e = ModalEngine::default();
        let now = Instant::now();
        type_str(&mut e, ":a", now);
        assert_eq!(e.handle_key(key(KeyCode::Backspace), now), vec![]);
        assert_eq!(
            e.handle_key(key(KeyCode::Backspace), now),
            vec![Command::ModeChanged(Mode::Normal)]
        );
    }

    #[test]
    fn command_line_ignores_ctrl_keys() {
        let mut e = ModalEngine::default();
        let now = Instant::now();
        type_str(&mut e, ":", now);
        assert_eq!(e.handle_key(KeyEvent::ctrl('w'), now), vec![]);
        assert!(e.command_line().is_empty());
    }
}
