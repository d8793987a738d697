// SPDX-License-Identifier: MIT
//
// Terminal input decoder.
//
// Turns raw stdin bytes into structured events: keys and mouse actions.
// Handles every protocol we enable in `terminal.rs`:
//
// - Legacy CSI sequences (arrows, function keys, editing keys)
// - SS3 sequences (application-cursor arrows, F1-F4)
// - SGR mouse protocol (press / release / drag / move / scroll)
// - Alt+key (ESC followed by a printable character)
// - UTF-8 multi-byte characters
//
// # Design
//
// The decoder is a byte-wise state machine. Each byte moves it between
// Ground, Escape, Csi, Ss3 and Utf8, so a sequence split across any
// number of `read()` calls decodes exactly as if it arrived whole.
//
// A lone ESC is ambiguous: it is either the Escape key or the start of
// a sequence whose remaining bytes have not arrived yet. The decoder
// never sleeps. It records a deadline instead, and the event loop calls
// [`Decoder::expire`] once that deadline passes.
//
// Garbage never stops the decoder. Every discarded byte or sequence is
// counted as a [`DecodeAnomaly`] and traced, and decoding resumes at
// the next byte.

use std::mem;
use std::time::{Duration, Instant};

use bitflags::bitflags;
use tracing::trace;

// ─── Event Types ────────────────────────────────────────────────────────────

/// A decoded terminal input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A key press.
    Key(KeyEvent),
    /// A mouse event (button action or movement with position).
    Mouse(MouseEvent),
    /// The window changed size. Injected by the event loop after SIGWINCH,
    /// never produced by the decoder.
    Resize { cols: u16, rows: u16 },
}

/// A key press with its modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    /// Which key was pressed.
    pub code: KeyCode,
    /// Active modifier keys (Shift, Alt, Ctrl, Super).
    pub modifiers: Modifiers,
}

impl KeyEvent {
    #[must_use]
    pub const fn new(code: KeyCode, modifiers: Modifiers) -> Self {
        Self { code, modifiers }
    }

    /// A key with no modifiers.
    #[must_use]
    pub const fn plain(code: KeyCode) -> Self {
        Self::new(code, Modifiers::empty())
    }

    /// Ctrl + `ch`.
    #[must_use]
    pub const fn ctrl(ch: char) -> Self {
        Self::new(KeyCode::Char(ch), Modifiers::CTRL)
    }

    /// The character this key types, if any.
    ///
    /// Only unmodified (or Shift-only) `Char` keys type text.
    #[must_use]
    pub fn printable(&self) -> Option<char> {
        match self.code {
            KeyCode::Char(ch)
                if (self.modifiers - Modifiers::SHIFT).is_empty() && !ch.is_control() =>
            {
                Some(ch)
            }
            _ => None,
        }
    }
}

impl From<KeyCode> for KeyEvent {
    fn from(code: KeyCode) -> Self {
        Self::plain(code)
    }
}

/// Identity of a key.
///
/// Named keys have dedicated variants; printable characters use
/// [`Char`](KeyCode::Char). Function keys use [`F`](KeyCode::F).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A Unicode character.
    Char(char),
    // ── Named keys ──────────────────────────────────────────────
    Enter,
    Tab,
    /// Shift-Tab (`CSI Z`).
    BackTab,
    Backspace,
    Escape,
    Delete,
    Insert,
    // ── Navigation ──────────────────────────────────────────────
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    // ── Function keys ───────────────────────────────────────────
    /// F1 through F12.
    F(u8),
}

bitflags! {
    /// Keyboard modifier flags.
    ///
    /// Matches the xterm CSI modifier encoding where `param = 1 + bitmask`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const ALT   = 0b0010;
        const CTRL  = 0b0100;
        const SUPER = 0b1000;
    }
}

/// A mouse event with button/scroll/move action, position, and modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    /// What happened (press, release, drag, move, scroll).
    pub kind: MouseEventKind,
    /// 0-indexed column.
    pub x: u16,
    /// 0-indexed row.
    pub y: u16,
    /// Active modifier keys during the mouse event.
    pub modifiers: Modifiers,
}

/// Mouse event classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseEventKind {
    Press(MouseButton),
    Release(MouseButton),
    /// Mouse moved while a button is held.
    Drag(MouseButton),
    /// Mouse moved without any button held.
    Move,
    ScrollUp,
    ScrollDown,
    ScrollLeft,
    ScrollRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

// ─── Anomalies ──────────────────────────────────────────────────────────────

/// Input the decoder could not make sense of and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeAnomaly {
    /// Invalid lead byte, bad continuation, overlong form or surrogate.
    /// Decoded as U+FFFD.
    InvalidUtf8,
    /// Well-formed CSI or SS3 sequence with no known meaning.
    UnknownSequence,
    /// CSI sequence with more parameter bytes than we store.
    ParamOverflow,
    /// A byte that cannot appear inside a CSI sequence cut it short.
    Interrupted,
}

// ─── Decoder ────────────────────────────────────────────────────────────────

/// How long a lone ESC waits for the rest of a sequence.
pub const DEFAULT_ESCAPE_TIMEOUT: Duration = Duration::from_millis(35);

/// Accepted range for the ESC window.
pub const MIN_ESCAPE_TIMEOUT: Duration = Duration::from_millis(25);
pub const MAX_ESCAPE_TIMEOUT: Duration = Duration::from_millis(50);

/// Parameter and intermediate bytes stored per CSI sequence.
pub const MAX_CSI_PARAMS: usize = 32;

const REPLACEMENT: char = char::REPLACEMENT_CHARACTER;

enum State {
    Ground,
    /// ESC seen.
    Escape,
    /// `ESC [` seen; collecting parameter/intermediate bytes.
    Csi { params: Vec<u8>, overflow: bool },
    /// `ESC O` seen.
    Ss3,
    /// Multi-byte character in progress. `need` is its total length.
    Utf8 { buf: [u8; 4], len: u8, need: u8 },
}

/// Terminal input decoder.
///
/// Feed raw bytes via [`feed`](Decoder::feed) and collect structured
/// [`Event`]s. Incomplete sequences are kept as decoder state and resume
/// when more bytes arrive.
pub struct Decoder {
    state: State,
    timeout: Duration,
    deadline: Option<Instant>,
    anomalies: u64,
}

impl Decoder {
    /// Create a decoder whose ESC window is `timeout`, clamped to
    /// [`MIN_ESCAPE_TIMEOUT`]..=[`MAX_ESCAPE_TIMEOUT`].
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: State::Ground,
            timeout: timeout.clamp(MIN_ESCAPE_TIMEOUT, MAX_ESCAPE_TIMEOUT),
            deadline: None,
            anomalies: 0,
        }
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Decode `bytes` received now.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Event> {
        self.feed_at(bytes, Instant::now())
    }

    /// Decode `bytes` received at `now`.
    ///
    /// If the chunk ends mid-sequence, the ESC window restarts at `now`.
    pub fn feed_at(&mut self, bytes: &[u8], now: Instant) -> Vec<Event> {
        let mut events = Vec::new();
        for &b in bytes {
            self.step(b, &mut events);
        }
        self.deadline = self.has_pending().then(|| now + self.timeout);
        events
    }

    /// When the pending sequence must be resolved, if one is pending.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Resolve the pending sequence if its deadline has passed.
    ///
    /// A lone ESC becomes one Escape key. Call this after feeding the
    /// bytes read in the same wake-up, never before.
    pub fn expire(&mut self, now: Instant) -> Vec<Event> {
        match self.deadline {
            Some(deadline) if now >= deadline => self.flush(),
            _ => Vec::new(),
        }
    }

    /// Resolve the pending sequence immediately.
    ///
    /// ESC becomes an Escape key and any collected sequence bytes become
    /// `Char` keys. A truncated UTF-8 character becomes U+FFFD.
    pub fn flush(&mut self) -> Vec<Event> {
        self.deadline = None;
        let mut events = Vec::new();
        match mem::replace(&mut self.state, State::Ground) {
            State::Ground => {}
            State::Escape => events.push(key(KeyCode::Escape)),
            State::Csi { params, .. } => {
                events.push(key(KeyCode::Escape));
                events.push(key(KeyCode::Char('[')));
                events.extend(params.iter().map(|&b| key(KeyCode::Char(char::from(b)))));
            }
            State::Ss3 => {
                events.push(key(KeyCode::Escape));
                events.push(key(KeyCode::Char('O')));
            }
            State::Utf8 { .. } => {
                self.anomaly(DecodeAnomaly::InvalidUtf8);
                events.push(key(KeyCode::Char(REPLACEMENT)));
            }
        }
        events
    }

    /// Are there bytes of an unfinished sequence waiting?
    #[must_use]
    pub const fn has_pending(&self) -> bool {
        !matches!(self.state, State::Ground)
    }

    /// Number of bytes or sequences discarded since creation.
    #[must_use]
    pub const fn anomalies(&self) -> u64 {
        self.anomalies
    }

    fn anomaly(&mut self, kind: DecodeAnomaly) {
        self.anomalies += 1;
        trace!(?kind, "input discarded");
    }

    // ── State machine ───────────────────────────────────────────────

    fn step(&mut self, b: u8, out: &mut Vec<Event>) {
        match mem::replace(&mut self.state, State::Ground) {
            State::Ground => self.ground(b, out),
            State::Escape => self.escape(b, out),
            State::Csi {
                mut params,
                mut overflow,
            } => match b {
                0x40..=0x7E => self.finish_csi(&params, overflow, b, out),
                0x20..=0x3F => {
                    if params.len() < MAX_CSI_PARAMS {
                        params.push(b);
                    } else {
                        overflow = true;
                    }
                    self.state = State::Csi { params, overflow };
                }
                _ => {
                    self.anomaly(DecodeAnomaly::Interrupted);
                    self.ground(b, out);
                }
            },
            State::Ss3 => match ss3_key(b) {
                Some(code) => out.push(key(code)),
                None => self.anomaly(DecodeAnomaly::UnknownSequence),
            },
            State::Utf8 {
                mut buf,
                len,
                need,
            } => {
                if b & 0xC0 != 0x80 {
                    // Bad continuation: the partial character is lost and
                    // `b` starts over from ground.
                    self.anomaly(DecodeAnomaly::InvalidUtf8);
                    out.push(key(KeyCode::Char(REPLACEMENT)));
                    self.ground(b, out);
                    return;
                }
                buf[usize::from(len)] = b;
                let len = len + 1;
                if len < need {
                    self.state = State::Utf8 { buf, len, need };
                    return;
                }
                // from_utf8 rejects overlong forms and surrogates.
                let decoded = std::str::from_utf8(&buf[..usize::from(need)])
                    .ok()
                    .and_then(|s| s.chars().next());
                let ch = decoded.unwrap_or_else(|| {
                    self.anomaly(DecodeAnomaly::InvalidUtf8);
                    REPLACEMENT
                });
                out.push(key(KeyCode::Char(ch)));
            }
        }
    }

    fn ground(&mut self, b: u8, out: &mut Vec<Event>) {
        match b {
            0x1B => self.state = State::Escape,
            0x00..=0x1F | 0x7F => out.push(Event::Key(control_key(b))),
            0x20..=0x7E => out.push(key(KeyCode::Char(char::from(b)))),
            _ => match utf8_char_len(b) {
                0 => {
                    self.anomaly(DecodeAnomaly::InvalidUtf8);
                    out.push(key(KeyCode::Char(REPLACEMENT)));
                }
                need => {
                    self.state = State::Utf8 {
                        buf: [b, 0, 0, 0],
                        len: 1,
                        need,
                    };
                }
            },
        }
    }

    fn escape(&mut self, b: u8, out: &mut Vec<Event>) {
        match b {
            b'[' => {
                self.state = State::Csi {
                    params: Vec::with_capacity(8),
                    overflow: false,
                };
            }
            b'O' => self.state = State::Ss3,
            // The first ESC was a key; the second may start a sequence.
            0x1B => {
                out.push(key(KeyCode::Escape));
                self.state = State::Escape;
            }
            0x20..=0x7E => out.push(key_with(KeyCode::Char(char::from(b)), Modifiers::ALT)),
            0x00..=0x1F | 0x7F => {
                let mut event = control_key(b);
                event.modifiers |= Modifiers::ALT;
                out.push(Event::Key(event));
            }
            // Not a sequence: the ESC was a key and `b` starts fresh.
            _ => {
                out.push(key(KeyCode::Escape));
                self.ground(b, out);
            }
        }
    }

    fn finish_csi(&mut self, params: &[u8], overflow: bool, final_byte: u8, out: &mut Vec<Event>) {
        if overflow {
            self.anomaly(DecodeAnomaly::ParamOverflow);
            return;
        }
        let event = match params.first() {
            Some(b'<') => sgr_mouse(&params[1..], final_byte).map(Event::Mouse),
            _ => csi_key(params, final_byte).map(Event::Key),
        };
        match event {
            Some(event) => out.push(event),
            None => self.anomaly(DecodeAnomaly::UnknownSequence),
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(DEFAULT_ESCAPE_TIMEOUT)
    }
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("pending", &self.has_pending())
            .field("deadline", &self.deadline)
            .field("anomalies", &self.anomalies)
            .finish_non_exhaustive()
    }
}

// ─── Sequence tables ────────────────────────────────────────────────────────

/// Decode a complete CSI key sequence: `ESC [ params final`.
fn csi_key(params: &[u8], final_byte: u8) -> Option<KeyEvent> {
    // Private-mode sequences (`?`, `>`, `=`) are replies, never keys.
    if params.first().is_some_and(|&b| matches!(b, b'?' | b'>' | b'=')) {
        return None;
    }
    let mut values = parse_params(params);
    let first = values.next().unwrap_or(0);
    let modifiers = values.next().map_or(Modifiers::empty(), decode_modifiers);

    let code = match final_byte {
        b'A' => KeyCode::Up,
        b'B' => KeyCode::Down,
        b'C' => KeyCode::Right,
        b'D' => KeyCode::Left,
        b'H' => KeyCode::Home,
        b'F' => KeyCode::End,
        b'P' => KeyCode::F(1),
        b'Q' => KeyCode::F(2),
        b'R' => KeyCode::F(3),
        b'S' => KeyCode::F(4),
        b'Z' => KeyCode::BackTab,
        b'~' => tilde_key(first)?,
        _ => return None,
    };
    Some(KeyEvent::new(code, modifiers))
}

/// Keys reported as `ESC [ n ~`.
const fn tilde_key(n: u16) -> Option<KeyCode> {
    let code = match n {
        1 | 7 => KeyCode::Home,
        2 => KeyCode::Insert,
        3 => KeyCode::Delete,
        4 | 8 => KeyCode::End,
        5 => KeyCode::PageUp,
        6 => KeyCode::PageDown,
        11 => KeyCode::F(1),
        12 => KeyCode::F(2),
        13 => KeyCode::F(3),
        14 => KeyCode::F(4),
        15 => KeyCode::F(5),
        17 => KeyCode::F(6),
        18 => KeyCode::F(7),
        19 => KeyCode::F(8),
        20 => KeyCode::F(9),
        21 => KeyCode::F(10),
        23 => KeyCode::F(11),
        24 => KeyCode::F(12),
        _ => return None,
    };
    Some(code)
}

/// Keys reported as `ESC O x` in application-cursor mode.
const fn ss3_key(b: u8) -> Option<KeyCode> {
    let code = match b {
        b'A' => KeyCode::Up,
        b'B' => KeyCode::Down,
        b'C' => KeyCode::Right,
        b'D' => KeyCode::Left,
        b'H' => KeyCode::Home,
        b'F' => KeyCode::End,
        b'P' => KeyCode::F(1),
        b'Q' => KeyCode::F(2),
        b'R' => KeyCode::F(3),
        b'S' => KeyCode::F(4),
        _ => return None,
    };
    Some(code)
}

/// Decode an SGR mouse report: `ESC [ < Pb ; Px ; Py M|m`.
///
/// `params` excludes the leading `<`. `m` is a release, `M` everything else.
fn sgr_mouse(params: &[u8], final_byte: u8) -> Option<MouseEvent> {
    let is_release = match final_byte {
        b'm' => true,
        b'M' => false,
        _ => return None,
    };
    if !params.iter().all(|b| b.is_ascii_digit() || *b == b';') {
        return None;
    }
    let mut values = parse_params(params);
    let (cb, raw_x, raw_y) = (values.next()?, values.next()?, values.next()?);
    if values.next().is_some() {
        return None;
    }

    let mut modifiers = Modifiers::empty();
    if cb & 4 != 0 {
        modifiers |= Modifiers::SHIFT;
    }
    if cb & 8 != 0 {
        modifiers |= Modifiers::ALT;
    }
    if cb & 16 != 0 {
        modifiers |= Modifiers::CTRL;
    }

    let base = cb & 3;
    let kind = if cb & 64 != 0 {
        match base {
            0 => MouseEventKind::ScrollUp,
            1 => MouseEventKind::ScrollDown,
            2 => MouseEventKind::ScrollLeft,
            _ => MouseEventKind::ScrollRight,
        }
    } else if cb & 32 != 0 {
        // Motion. Base 3 means no button is held.
        match base {
            3 => MouseEventKind::Move,
            b => MouseEventKind::Drag(decode_mouse_button(b)),
        }
    } else if is_release {
        MouseEventKind::Release(decode_mouse_button(base))
    } else {
        MouseEventKind::Press(decode_mouse_button(base))
    };

    // SGR coordinates are 1-indexed; cells are 0-indexed.
    Some(MouseEvent {
        kind,
        x: raw_x.saturating_sub(1),
        y: raw_y.saturating_sub(1),
        modifiers,
    })
}

// ─── Helpers ────────────────────────────────────────────────────────────────

const fn key(code: KeyCode) -> Event {
    Event::Key(KeyEvent::plain(code))
}

const fn key_with(code: KeyCode, modifiers: Modifiers) -> Event {
    Event::Key(KeyEvent::new(code, modifiers))
}

/// Map a C0 control byte (or DEL) to its key.
const fn control_key(b: u8) -> KeyEvent {
    match b {
        b'\r' | b'\n' => KeyEvent::plain(KeyCode::Enter),
        b'\t' => KeyEvent::plain(KeyCode::Tab),
        0x08 | 0x7F => KeyEvent::plain(KeyCode::Backspace),
        0x1B => KeyEvent::plain(KeyCode::Escape),
        0x00 => KeyEvent::ctrl(' '),
        // 0x01..=0x1A is Ctrl+a..z, 0x1C..=0x1F is Ctrl+\ ] ^ _.
        0x01..=0x1A => KeyEvent::ctrl((b + b'a' - 1) as char),
        _ => KeyEvent::ctrl((b + 0x40) as char),
    }
}

/// Semicolon-separated numeric parameters. Empty fields are 0; anything
/// after a `:` sub-parameter is ignored.
fn parse_params(raw: &[u8]) -> impl Iterator<Item = u16> + '_ {
    raw.split(|&b| b == b';').map(|field| {
        field
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .fold(0u16, |acc, &b| {
                acc.saturating_mul(10).saturating_add(u16::from(b - b'0'))
            })
    })
}

/// Decode an xterm modifier parameter (`1 + bitmask`) into `Modifiers`.
/// A parameter of 0 or 1 means no modifiers.
#[allow(clippy::cast_possible_truncation)]
const fn decode_modifiers(param: u16) -> Modifiers {
    let val = if param > 0 { param - 1 } else { 0 };
    Modifiers::from_bits_truncate((val & 0x0F) as u8)
}

const fn decode_mouse_button(base: u16) -> MouseButton {
    match base {
        0 => MouseButton::Left,
        1 => MouseButton::Middle,
        _ => MouseButton::Right,
    }
}

/// Total byte length of a UTF-8 character from its lead byte.
/// Returns 0 for bytes that can never start a character.
const fn utf8_char_len(lead: u8) -> u8 {
    match lead {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    /// Decode `data` and resolve anything left pending.
    fn parse(data: &[u8]) -> Vec<Event> {
        let mut decoder = Decoder::default();
        let mut events = decoder.feed(data);
        events.extend(decoder.flush());
        events
    }

    fn parse_one(data: &[u8]) -> Event {
        let events = parse(data);
        assert_eq!(events.len(), 1, "expected 1 event, got {events:?}");
        events[0]
    }

    fn key_mod(code: KeyCode, modifiers: Modifiers) -> Event {
        key_with(code, modifiers)
    }

    fn mouse(kind: MouseEventKind, x: u16, y: u16) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            x,
            y,
            modifiers: Modifiers::empty(),
        })
    }

    // ── ASCII and control bytes ─────────────────────────────────────────

    #[test]
    fn ascii_chars() {
        assert_eq!(
            parse(b"ab~"),
            vec![
                key(KeyCode::Char('a')),
                key(KeyCode::Char('b')),
                key(KeyCode::Char('~')),
            ]
        );
    }

    #[test]
    fn enter_from_cr_and_lf() {
        assert_eq!(parse(b"\r\n"), vec![key(KeyCode::Enter), key(KeyCode::Enter)]);
    }

    #[test]
    fn tab_and_backspace() {
        assert_eq!(parse_one(b"\t"), key(KeyCode::Tab));
        assert_eq!(parse_one(b"\x08"), key(KeyCode::Backspace));
        assert_eq!(parse_one(b"\x7f"), key(KeyCode::Backspace));
    }

    #[test]
    fn ctrl_letters() {
        assert_eq!(parse_one(b"\x01"), key_mod(KeyCode::Char('a'), Modifiers::CTRL));
        assert_eq!(parse_one(b"\x03"), key_mod(KeyCode::Char('c'), Modifiers::CTRL));
        assert_eq!(parse_one(b"\x1a"), key_mod(KeyCode::Char('z'), Modifiers::CTRL));
    }

    #[test]
    fn ctrl_space_and_punctuation() {
        assert_eq!(parse_one(b"\x00"), key_mod(KeyCode::Char(' '), Modifiers::CTRL));
        assert_eq!(parse_one(b"\x1c"), key_mod(KeyCode::Char('\\'), Modifiers::CTRL));
        assert_eq!(parse_one(b"\x1d"), key_mod(KeyCode::Char(']'), Modifiers::CTRL));
        assert_eq!(parse_one(b"\x1e"), key_mod(KeyCode::Char('^'), Modifiers::CTRL));
        assert_eq!(parse_one(b"\x1f"), key_mod(KeyCode::Char('_'), Modifiers::CTRL));
    }

    // ── UTF-8 ───────────────────────────────────────────────────────────

    #[test]
    fn utf8_multibyte() {
        assert_eq!(
            parse("é中🔥".as_bytes()),
            vec![
                key(KeyCode::Char('é')),
                key(KeyCode::Char('中')),
                key(KeyCode::Char('🔥')),
            ]
        );
    }

    #[test]
    fn invalid_continuation_is_replaced_and_reprocessed() {
        let mut decoder = Decoder::default();
        let events = decoder.feed(b"\xe4\xb8a");
        assert_eq!(
            events,
            vec![key(KeyCode::Char(REPLACEMENT)), key(KeyCode::Char('a'))]
        );
        assert_eq!(decoder.anomalies(), 1);
        assert!(!decoder.has_pending());
    }

    #[test]
    fn invalid_lead_bytes_are_replaced() {
        assert_eq!(
            parse(b"\x80\xff\xc0"),
            vec![key(KeyCode::Char(REPLACEMENT)); 3]
        );
    }

    #[test]
    fn overlong_and_surrogate_are_replaced() {
        // Overlong '/' and an encoded surrogate half.
        assert_eq!(parse_one(b"\xe0\x80\xaf"), key(KeyCode::Char(REPLACEMENT)));
        assert_eq!(parse_one(b"\xed\xa0\x80"), key(KeyCode::Char(REPLACEMENT)));
    }

    #[test]
    fn truncated_utf8_flushes_as_replacement() {
        let mut decoder = Decoder::default();
        assert!(decoder.feed(b"\xf0\x9f").is_empty());
        assert!(decoder.has_pending());
        assert_eq!(decoder.flush(), vec![key(KeyCode::Char(REPLACEMENT))]);
    }

    // ── CSI keys ────────────────────────────────────────────────────────

    #[test]
    fn arrows() {
        assert_eq!(parse_one(b"\x1b[A"), key(KeyCode::Up));
        assert_eq!(parse_one(b"\x1b[B"), key(KeyCode::Down));
        assert_eq!(parse_one(b"\x1b[C"), key(KeyCode::Right));
        assert_eq!(parse_one(b"\x1b[D"), key(KeyCode::Left));
    }

    #[test]
    fn modified_arrows() {
        assert_eq!(parse_one(b"\x1b[1;2A"), key_mod(KeyCode::Up, Modifiers::SHIFT));
        assert_eq!(parse_one(b"\x1b[1;3B"), key_mod(KeyCode::Down, Modifiers::ALT));
        assert_eq!(parse_one(b"\x1b[1;5C"), key_mod(KeyCode::Right, Modifiers::CTRL));
        assert_eq!(
            parse_one(b"\x1b[1;4D"),
            key_mod(KeyCode::Left, Modifiers::SHIFT | Modifiers::ALT)
        );
    }

    #[test]
    fn home_and_end_variants() {
        for seq in [&b"\x1b[H"[..], b"\x1b[1~", b"\x1b[7~", b"\x1bOH"] {
            assert_eq!(parse_one(seq), key(KeyCode::Home), "{seq:?}");
        }
        for seq in [&b"\x1b[F"[..], b"\x1b[4~", b"\x1b[8~", b"\x1bOF"] {
            assert_eq!(parse_one(seq), key(KeyCode::End), "{seq:?}");
        }
    }

    #[test]
    fn editing_keys() {
        assert_eq!(parse_one(b"\x1b[2~"), key(KeyCode::Insert));
        assert_eq!(parse_one(b"\x1b[3~"), key(KeyCode::Delete));
        assert_eq!(parse_one(b"\x1b[5~"), key(KeyCode::PageUp));
        assert_eq!(parse_one(b"\x1b[6~"), key(KeyCode::PageDown));
        assert_eq!(parse_one(b"\x1b[3;5~"), key_mod(KeyCode::Delete, Modifiers::CTRL));
    }

    #[test]
    fn function_keys() {
        let table: [(&[u8], u8); 16] = [
            (b"\x1bOP", 1),
            (b"\x1bOQ", 2),
            (b"\x1bOR", 3),
            (b"\x1bOS", 4),
            (b"\x1b[11~", 1),
            (b"\x1b[12~", 2),
            (b"\x1b[13~", 3),
            (b"\x1b[14~", 4),
            (b"\x1b[15~", 5),
            (b"\x1b[17~", 6),
            (b"\x1b[18~", 7),
            (b"\x1b[19~", 8),
            (b"\x1b[20~", 9),
            (b"\x1b[21~", 10),
            (b"\x1b[23~", 11),
            (b"\x1b[24~", 12),
        ];
        for (seq, n) in table {
            assert_eq!(parse_one(seq), key(KeyCode::F(n)), "{seq:?}");
        }
        assert_eq!(parse_one(b"\x1b[15;2~"), key_mod(KeyCode::F(5), Modifiers::SHIFT));
    }

    #[test]
    fn shift_tab() {
        assert_eq!(parse_one(b"\x1b[Z"), key(KeyCode::BackTab));
    }

    #[test]
    fn unknown_csi_is_discarded() {
        let mut decoder = Decoder::default();
        assert_eq!(decoder.feed(b"\x1b[99~x"), vec![key(KeyCode::Char('x'))]);
        assert_eq!(decoder.anomalies(), 1);
    }

    #[test]
    fn private_reply_is_discarded() {
        let mut decoder = Decoder::default();
        assert!(decoder.feed(b"\x1b[?1;2c").is_empty());
        assert_eq!(decoder.anomalies(), 1);
    }

    #[test]
    fn overlong_params_are_discarded_at_final_byte() {
        let mut seq = b"\x1b[".to_vec();
        seq.extend(std::iter::repeat_n(b'1', MAX_CSI_PARAMS + 10));
        seq.extend_from_slice(b"Aq");
        let mut decoder = Decoder::default();
        assert_eq!(decoder.feed(&seq), vec![key(KeyCode::Char('q'))]);
        assert_eq!(decoder.anomalies(), 1);
    }

    #[test]
    fn control_byte_interrupts_csi() {
        let mut decoder = Decoder::default();
        assert_eq!(
            decoder.feed(b"\x1b[1\x03"),
            vec![key_mod(KeyCode::Char('c'), Modifiers::CTRL)]
        );
        assert_eq!(decoder.anomalies(), 1);
    }

    // ── Alt and ESC handling ────────────────────────────────────────────

    #[test]
    fn alt_printable() {
        assert_eq!(parse_one(b"\x1ba"), key_mod(KeyCode::Char('a'), Modifiers::ALT));
        assert_eq!(parse_one(b"\x1b "), key_mod(KeyCode::Char(' '), Modifiers::ALT));
    }

    #[test]
    fn alt_ctrl() {
        assert_eq!(
            parse_one(b"\x1b\x01"),
            key_mod(KeyCode::Char('a'), Modifiers::ALT | Modifiers::CTRL)
        );
    }

    #[test]
    fn double_escape_keeps_second_pending() {
        let mut decoder = Decoder::default();
        assert_eq!(decoder.feed(b"\x1b\x1b"), vec![key(KeyCode::Escape)]);
        assert!(decoder.has_pending());
        assert_eq!(decoder.feed(b"[A"), vec![key(KeyCode::Up)]);
    }

    #[test]
    fn lone_escape_waits_for_deadline() {
        let t0 = Instant::now();
        let mut decoder = Decoder::default();
        assert!(decoder.feed_at(b"\x1b", t0).is_empty());
        assert_eq!(decoder.deadline(), Some(t0 + DEFAULT_ESCAPE_TIMEOUT));

        let early = t0 + Duration::from_millis(20);
        assert!(decoder.expire(early).is_empty());

        let late = t0 + Duration::from_millis(40);
        assert_eq!(decoder.expire(late), vec![key(KeyCode::Escape)]);
        assert!(decoder.expire(late).is_empty());
        assert_eq!(decoder.deadline(), None);
    }

    #[test]
    fn sequence_completed_within_window_has_no_escape() {
        let t0 = Instant::now();
        let mut decoder = Decoder::default();
        assert!(decoder.feed_at(b"\x1b", t0).is_empty());
        let t1 = t0 + Duration::from_millis(10);
        assert_eq!(decoder.feed_at(b"[A", t1), vec![key(KeyCode::Up)]);
        assert!(decoder.expire(t1 + Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn partial_csi_flushes_as_keys() {
        let mut decoder = Decoder::default();
        assert!(decoder.feed(b"\x1b[1;").is_empty());
        assert_eq!(
            decoder.flush(),
            vec![
                key(KeyCode::Escape),
                key(KeyCode::Char('[')),
                key(KeyCode::Char('1')),
                key(KeyCode::Char(';')),
            ]
        );
    }

    #[test]
    fn timeout_is_clamped() {
        assert_eq!(Decoder::new(Duration::ZERO).timeout(), MIN_ESCAPE_TIMEOUT);
        assert_eq!(Decoder::new(Duration::from_secs(1)).timeout(), MAX_ESCAPE_TIMEOUT);
        assert_eq!(
            Decoder::new(Duration::from_millis(30)).timeout(),
            Duration::from_millis(30)
        );
    }

    // ── Mouse ───────────────────────────────────────────────────────────

    #[test]
    fn mouse_press_and_release() {
        assert_eq!(
            parse_one(b"\x1b[<0;10;5M"),
            mouse(MouseEventKind::Press(MouseButton::Left), 9, 4)
        );
        assert_eq!(
            parse_one(b"\x1b[<0;10;5m"),
            mouse(MouseEventKind::Release(MouseButton::Left), 9, 4)
        );
        assert_eq!(
            parse_one(b"\x1b[<2;1;1M"),
            mouse(MouseEventKind::Press(MouseButton::Right), 0, 0)
        );
    }

    #[test]
    fn mouse_drag_and_move() {
        assert_eq!(
            parse_one(b"\x1b[<32;3;4M"),
            mouse(MouseEventKind::Drag(MouseButton::Left), 2, 3)
        );
        assert_eq!(parse_one(b"\x1b[<35;3;4M"), mouse(MouseEventKind::Move, 2, 3));
    }

    #[test]
    fn mouse_scroll() {
        assert_eq!(parse_one(b"\x1b[<64;1;1M"), mouse(MouseEventKind::ScrollUp, 0, 0));
        assert_eq!(parse_one(b"\x1b[<65;1;1M"), mouse(MouseEventKind::ScrollDown, 0, 0));
    }

    #[test]
    fn mouse_modifiers() {
        let Event::Mouse(m) = parse_one(b"\x1b[<28;1;1M") else {
            panic!("expected mouse event");
        };
        assert_eq!(m.modifiers, Modifiers::SHIFT | Modifiers::ALT | Modifiers::CTRL);
        assert_eq!(m.kind, MouseEventKind::Press(MouseButton::Left));
    }

    #[test]
    fn malformed_mouse_is_discarded() {
        let mut decoder = Decoder::default();
        assert!(decoder.feed(b"\x1b[<0;10M").is_empty());
        assert_eq!(decoder.anomalies(), 1);
    }

    // ── Chunk boundaries ────────────────────────────────────────────────

    const MIXED: &[u8] = b"a\x1b[A\x1b[1;5C\x1b[<0;10;5M\x1bOP\xe4\xb8\xad\x1b[15~\x1bz\r";

    #[test]
    fn every_split_point_decodes_the_same() {
        let whole = parse(MIXED);
        assert_eq!(whole.len(), 9);
        for split in 0..=MIXED.len() {
            let mut decoder = Decoder::default();
            let mut events = decoder.feed(&MIXED[..split]);
            events.extend(decoder.feed(&MIXED[split..]));
            assert_eq!(events, whole, "split at {split}");
        }
    }

    proptest! {
        #[test]
        fn chunking_never_changes_events(cuts in proptest::collection::vec(0..MIXED.len(), 0..8)) {
            let mut cuts = cuts;
            cuts.sort_unstable();
            let mut decoder = Decoder::default();
            let mut events = Vec::new();
            let mut start = 0;
            for cut in cuts {
                events.extend(decoder.feed(&MIXED[start..cut]));
                start = cut;
            }
            events.extend(decoder.feed(&MIXED[start..]));
            prop_assert_eq!(events, parse(MIXED));
        }

        #[test]
        fn arbitrary_bytes_never_stall(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let mut decoder = Decoder::default();
            decoder.feed(&bytes);
            decoder.flush();
            prop_assert!(!decoder.has_pending());
            prop_assert_eq!(decoder.deadline(), None);
        }
    }
}
