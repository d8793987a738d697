// SPDX-License-Identifier: MIT
//
// ANSI escape sequence generation.
//
// Pure functions that write escape sequences to any `impl Write`. No state
// and no decisions about when to emit; the screen renderer decides that.
// This module knows the byte-level encoding of every terminal command the
// core uses, plus the byte cost of each cursor movement so the renderer can
// pick the cheapest one without encoding them all.
//
// Positions are 0-indexed here and converted to the terminal's 1-indexed
// coordinates on output.
//
// Everything returns `io::Result` from the underlying writer. Writing into
// an `OutputBuffer` (a Vec) never fails.

use std::io::{self, Write};

use crate::cell::{Attr, Style};
use crate::color::Color;

// ─── Cursor: absolute ────────────────────────────────────────────────────────

/// CUP. The origin gets the short `ESC [ H` form.
#[inline]
pub fn cursor_to(w: &mut impl Write, x: u16, y: u16) -> io::Result<()> {
    if x == 0 && y == 0 {
        return w.write_all(b"\x1b[H");
    }
    write!(w, "\x1b[{};{}H", u32::from(y) + 1, u32::from(x) + 1)
}

/// Bytes [`cursor_to`] would write.
#[inline]
#[must_use]
pub const fn cursor_to_len(x: u16, y: u16) -> usize {
    if x == 0 && y == 0 {
        return 3;
    }
    4 + digits(y as u32 + 1) + digits(x as u32 + 1)
}

// ─── Cursor: relative ────────────────────────────────────────────────────────

#[inline]
pub fn cursor_up(w: &mut impl Write, n: u16) -> io::Result<()> {
    step(w, n, b'A')
}

#[inline]
pub fn cursor_down(w: &mut impl Write, n: u16) -> io::Result<()> {
    step(w, n, b'B')
}

#[inline]
pub fn cursor_forward(w: &mut impl Write, n: u16) -> io::Result<()> {
    step(w, n, b'C')
}

#[inline]
pub fn cursor_back(w: &mut impl Write, n: u16) -> io::Result<()> {
    step(w, n, b'D')
}

/// CUU/CUD/CUF/CUB. A count of 1 is the terminal default and is omitted.
fn step(w: &mut impl Write, n: u16, dir: u8) -> io::Result<()> {
    if n == 1 {
        w.write_all(&[0x1b, b'[', dir])
    } else {
        write!(w, "\x1b[{n}{}", char::from(dir))
    }
}

/// Bytes one relative step of `n` cells would write.
#[inline]
#[must_use]
pub const fn step_len(n: u16) -> usize {
    if n == 1 { 3 } else { 3 + digits(n as u32) }
}

/// Carriage return: column 0 of the current row.
#[inline]
pub fn carriage_return(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\r")
}

/// CR LF: column 0 of the next row. Output post-processing is off in raw
/// mode, so both bytes are needed.
#[inline]
pub fn next_line(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\r\n")
}

/// Decimal digits in `n`.
#[inline]
#[must_use]
pub const fn digits(mut n: u32) -> usize {
    let mut d = 1;
    while n >= 10 {
        n /= 10;
        d += 1;
    }
    d
}

#[inline]
pub fn cursor_hide(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25l")
}

#[inline]
pub fn cursor_show(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25h")
}

// ─── Screen ──────────────────────────────────────────────────────────────────

/// ED 2: clear the whole screen. The cursor does not move.
#[inline]
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2J")
}

/// EL 0: erase from the cursor to the end of the line, in the current
/// background. The renderer only uses it with the default style active.
#[inline]
pub fn clear_to_eol(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[K")
}

pub const CLEAR_TO_EOL_LEN: usize = 3;

/// SGR 0.
#[inline]
pub fn reset(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[0m")
}

// ─── SGR ─────────────────────────────────────────────────────────────────────

/// Switch the terminal from style `from` to style `to` with one combined
/// SGR sequence.
///
/// `from = None` means the terminal's state is unknown. SGR has no
/// per-attribute "off" that works everywhere (22 clears bold AND dim), so
/// whenever an attribute has to go away, or the state is unknown, the
/// sequence starts with `0` and rebuilds `to` from scratch. Otherwise only
/// what changed is sent. Nothing is written when the styles match.
///
/// ```
/// use k_term::ansi::sgr;
/// use k_term::cell::{Attr, Style};
/// use k_term::color::Color;
///
/// let mut out = Vec::new();
/// let to = Style::DEFAULT.fg(Color::RED).attrs(Attr::BOLD);
/// sgr(&mut out, Some(Style::DEFAULT), to).unwrap();
/// assert_eq!(out, b"\x1b[1;31m");
/// ```
pub fn sgr(w: &mut impl Write, from: Option<Style>, to: Style) -> io::Result<()> {
    if from == Some(to) {
        return Ok(());
    }
    let mut params = Params::default();
    let base = match from {
        Some(from) if from.attrs.difference(to.attrs).is_empty() => from,
        _ => {
            params.push("0");
            Style::DEFAULT
        }
    };

    for (flag, code) in Attr::SGR {
        if to.attrs.contains(flag) && !base.attrs.contains(flag) {
            params.push_num(u32::from(code));
        }
    }
    if to.fg != base.fg {
        fg_params(&mut params, to.fg);
    }
    if to.bg != base.bg {
        bg_params(&mut params, to.bg);
    }

    w.write_all(b"\x1b[")?;
    w.write_all(params.buf.as_bytes())?;
    w.write_all(b"m")
}

/// Foreground parameters. Palette 0–7 and 8–15 use the compact 30–37 and
/// 90–97 codes; the rest of the palette is 38;5;N and RGB is 38;2;R;G;B.
fn fg_params(p: &mut Params, color: Color) {
    match color {
        Color::Default => p.push("39"),
        Color::Indexed(i) if i < 8 => p.push_num(30 + u32::from(i)),
        Color::Indexed(i) if i < 16 => p.push_num(82 + u32::from(i)),
        Color::Indexed(i) => {
            p.push("38;5");
            p.push_num(u32::from(i));
        }
        Color::Rgb(r, g, b) => {
            p.push("38;2");
            p.push_num(u32::from(r));
            p.push_num(u32::from(g));
            p.push_num(u32::from(b));
        }
    }
}

/// Background counterpart of [`fg_params`]: 40–47, 100–107, 48;5;N, 48;2.
fn bg_params(p: &mut Params, color: Color) {
    match color {
        Color::Default => p.push("49"),
        Color::Indexed(i) if i < 8 => p.push_num(40 + u32::from(i)),
        Color::Indexed(i) if i < 16 => p.push_num(92 + u32::from(i)),
        Color::Indexed(i) => {
            p.push("48;5");
            p.push_num(u32::from(i));
        }
        Color::Rgb(r, g, b) => {
            p.push("48;2");
            p.push_num(u32::from(r));
            p.push_num(u32::from(g));
            p.push_num(u32::from(b));
        }
    }
}

/// `;`-separated SGR parameter list.
#[derive(Default)]
struct Params {
    buf: String,
}

impl Params {
    fn push(&mut self, s: &str) {
        if !self.buf.is_empty() {
            self.buf.push(';');
        }
        self.buf.push_str(s);
    }

    fn push_num(&mut self, n: u32) {
        use std::fmt::Write as _;
        if !self.buf.is_empty() {
            self.buf.push(';');
        }
        // Writing into a String cannot fail.
        let _ = write!(self.buf, "{n}");
    }
}

// ─── Alternate Screen ───────────────────────────────────────────────────────

/// Switch to the alternate screen (DEC 1049), saving the primary screen.
#[inline]
pub fn enter_alt_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1049h")
}

#[inline]
pub fn exit_alt_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1049l")
}

// ─── Mouse Protocol ─────────────────────────────────────────────────────────

/// Mouse tracking granularity for SGR mouse protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseMode {
    /// Button press and release (DEC 1000).
    Click,
    /// Buttons plus motion while a button is held (DEC 1000 + 1002).
    #[default]
    Drag,
    /// All motion, buttons or not (DEC 1000 + 1002 + 1003).
    Motion,
}

/// Enable mouse tracking with SGR extended coordinates (DEC 1006).
pub fn enable_mouse(w: &mut impl Write, mode: MouseMode) -> io::Result<()> {
    w.write_all(b"\x1b[?1000h")?;
    if matches!(mode, MouseMode::Drag | MouseMode::Motion) {
        w.write_all(b"\x1b[?1002h")?;
    }
    if mode == MouseMode::Motion {
        w.write_all(b"\x1b[?1003h")?;
    }
    w.write_all(b"\x1b[?1006h")
}

pub fn disable_mouse(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1006l\x1b[?1003l\x1b[?1002l\x1b[?1000l")
}

// ─── Restore ─────────────────────────────────────────────────────────────────

/// Undo everything `Terminal::enter` turns on: mouse off, SGR reset,
/// cursor visible, back to the primary screen.
///
/// A plain byte string so the panic hook can write it with one `write(2)`
/// and no allocation.
pub const RESTORE: &[u8] =
    b"\x1b[?1006l\x1b[?1003l\x1b[?1002l\x1b[?1000l\x1b[0m\x1b[?25h\x1b[?1049l";

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Run an ANSI function and return its output as a string.
    fn emit<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn sgr_str(from: Option<Style>, to: Style) -> String {
        emit(|w| sgr(w, from, to))
    }

    // ── Cursor ──────────────────────────────────────────────────────────

    #[test]
    fn cursor_to_origin() {
        assert_eq!(emit(|w| cursor_to(w, 0, 0)), "\x1b[H");
    }

    #[test]
    fn cursor_to_position() {
        assert_eq!(emit(|w| cursor_to(w, 9, 4)), "\x1b[5;10H");
    }

    #[test]
    fn cursor_to_max_does_not_overflow() {
        assert_eq!(
            emit(|w| cursor_to(w, u16::MAX, u16::MAX)),
            "\x1b[65536;65536H"
        );
    }

    #[test]
    fn relative_steps() {
        assert_eq!(emit(|w| cursor_up(w, 1)), "\x1b[A");
        assert_eq!(emit(|w| cursor_down(w, 3)), "\x1b[3B");
        assert_eq!(emit(|w| cursor_forward(w, 12)), "\x1b[12C");
        assert_eq!(emit(|w| cursor_back(w, 1)), "\x1b[D");
    }

    #[test]
    fn line_moves() {
        assert_eq!(emit(|w| carriage_return(w)), "\r");
        assert_eq!(emit(|w| next_line(w)), "\r\n");
    }

    #[test]
    fn digit_counts() {
        assert_eq!(digits(0), 1);
        assert_eq!(digits(9), 1);
        assert_eq!(digits(10), 2);
        assert_eq!(digits(65_536), 5);
    }

    proptest! {
        #[test]
        fn cursor_to_len_matches_output(x in 0u16..500, y in 0u16..500) {
            prop_assert_eq!(emit(|w| cursor_to(w, x, y)).len(), cursor_to_len(x, y));
        }

        #[test]
        fn step_len_matches_output(n in 1u16..2000) {
            prop_assert_eq!(emit(|w| cursor_forward(w, n)).len(), step_len(n));
        }
    }

    #[test]
    fn cursor_visibility() {
        assert_eq!(emit(|w| cursor_hide(w)), "\x1b[?25l");
        assert_eq!(emit(|w| cursor_show(w)), "\x1b[?25h");
    }

    // ── Screen ──────────────────────────────────────────────────────────

    #[test]
    fn screen_sequences() {
        assert_eq!(emit(|w| clear_screen(w)), "\x1b[2J");
        assert_eq!(emit(|w| clear_to_eol(w)), "\x1b[K");
        assert_eq!(emit(|w| clear_to_eol(w)).len(), CLEAR_TO_EOL_LEN);
        assert_eq!(emit(|w| reset(w)), "\x1b[0m");
    }

    // ── SGR: colors ─────────────────────────────────────────────────────

    fn fg_only(c: Color) -> String {
        sgr_str(Some(Style::DEFAULT), Style::DEFAULT.fg(c))
    }

    fn bg_only(c: Color) -> String {
        sgr_str(Some(Style::DEFAULT), Style::DEFAULT.bg(c))
    }

    #[test]
    fn fg_palette_ranges() {
        assert_eq!(fg_only(Color::BLACK), "\x1b[30m");
        assert_eq!(fg_only(Color::WHITE), "\x1b[37m");
        assert_eq!(fg_only(Color::BRIGHT_BLACK), "\x1b[90m");
        assert_eq!(fg_only(Color::BRIGHT_WHITE), "\x1b[97m");
        assert_eq!(fg_only(Color::Indexed(16)), "\x1b[38;5;16m");
        assert_eq!(fg_only(Color::Indexed(255)), "\x1b[38;5;255m");
    }

    #[test]
    fn fg_rgb() {
        assert_eq!(fg_only(Color::Rgb(255, 128, 0)), "\x1b[38;2;255;128;0m");
    }

    #[test]
    fn bg_palette_ranges() {
        assert_eq!(bg_only(Color::GREEN), "\x1b[42m");
        assert_eq!(bg_only(Color::BRIGHT_BLACK), "\x1b[100m");
        assert_eq!(bg_only(Color::BRIGHT_WHITE), "\x1b[107m");
        assert_eq!(bg_only(Color::Indexed(200)), "\x1b[48;5;200m");
        assert_eq!(bg_only(Color::Rgb(1, 2, 3)), "\x1b[48;2;1;2;3m");
    }

    #[test]
    fn back_to_default_color() {
        let red = Style::DEFAULT.fg(Color::RED).bg(Color::BLUE);
        assert_eq!(sgr_str(Some(red), Style::DEFAULT), "\x1b[39;49m");
    }

    // ── SGR: attributes ─────────────────────────────────────────────────

    #[test]
    fn same_style_emits_nothing() {
        let s = Style::DEFAULT.fg(Color::RED).attrs(Attr::BOLD);
        assert_eq!(sgr_str(Some(s), s), "");
    }

    #[test]
    fn unknown_state_starts_with_reset() {
        assert_eq!(sgr_str(None, Style::DEFAULT), "\x1b[0m");
        let s = Style::DEFAULT.attrs(Attr::ITALIC).bg(Color::RED);
        assert_eq!(sgr_str(None, s), "\x1b[0;3;41m");
    }

    #[test]
    fn adding_attribute_needs_no_reset() {
        let from = Style::DEFAULT.attrs(Attr::BOLD);
        let to = from.attrs(Attr::UNDERLINE);
        assert_eq!(sgr_str(Some(from), to), "\x1b[4m");
    }

    #[test]
    fn removing_attribute_resets_and_rebuilds() {
        let from = Style::DEFAULT
            .fg(Color::RED)
            .attrs(Attr::BOLD | Attr::REVERSE);
        let to = Style::DEFAULT.fg(Color::RED).attrs(Attr::BOLD);
        assert_eq!(sgr_str(Some(from), to), "\x1b[0;1;31m");
    }

    #[test]
    fn every_attribute_code() {
        let all = Style::DEFAULT.attrs(Attr::all());
        assert_eq!(sgr_str(Some(Style::DEFAULT), all), "\x1b[1;2;3;4;5;7m");
    }

    #[test]
    fn one_sequence_per_change() {
        let to = Style::DEFAULT
            .fg(Color::Indexed(100))
            .bg(Color::Rgb(9, 9, 9))
            .attrs(Attr::DIM);
        let s = sgr_str(Some(Style::DEFAULT), to);
        assert_eq!(s.matches('\x1b').count(), 1);
        assert_eq!(s, "\x1b[2;38;5;100;48;2;9;9;9m");
    }

    // ── Modes ───────────────────────────────────────────────────────────

    #[test]
    fn alt_screen() {
        assert_eq!(emit(|w| enter_alt_screen(w)), "\x1b[?1049h");
        assert_eq!(emit(|w| exit_alt_screen(w)), "\x1b[?1049l");
    }

    #[test]
    fn mouse_modes() {
        assert_eq!(
            emit(|w| enable_mouse(w, MouseMode::Click)),
            "\x1b[?1000h\x1b[?1006h"
        );
        assert_eq!(
            emit(|w| enable_mouse(w, MouseMode::Drag)),
            "\x1b[?1000h\x1b[?1002h\x1b[?1006h"
        );
        assert_eq!(
            emit(|w| enable_mouse(w, MouseMode::Motion)),
            "\x1b[?1000h\x1b[?1002h\x1b[?1003h\x1b[?1006h"
        );
        assert_eq!(
            emit(|w| disable_mouse(w)),
            "\x1b[?1006l\x1b[?1003l\x1b[?1002l\x1b[?1000l"
        );
    }

    #[test]
    fn restore_undoes_every_mode() {
        let s = std::str::from_utf8(RESTORE).unwrap();
        assert!(s.contains(&emit(|w| disable_mouse(w))));
        assert!(s.contains(&emit(|w| cursor_show(w))));
        assert!(s.contains(&emit(|w| exit_alt_screen(w))));
        assert!(s.contains(&emit(|w| reset(w))));
    }
}
