// SPDX-License-Identifier: MIT
//
// Terminal colors.
//
// A cell color is one of the three things an SGR sequence can express:
// the terminal's own default, a palette index, or a 24-bit RGB triple.
// Palette indices 0–7 are the classic 8 colors (SGR 30–37 / 40–47),
// 8–15 their bright variants (SGR 90–97 / 100–107), and 16–255 the
// xterm 256-color cube and grayscale ramp (SGR 38;5;N / 48;5;N).
//
// Colors are resolved before they reach a cell: there is no alpha, no
// theme indirection, nothing the diff has to interpret. Equality is
// plain structural equality, which is what the renderer compares.

/// A fully resolved cell color.
///
/// Four bytes (tag + up to three channels) so a [`Cell`](crate::cell::Cell)
/// stays compact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Color {
    /// The terminal's configured default (SGR 39 / 49).
    #[default]
    Default,
    /// Palette index (0–255).
    Indexed(u8),
    /// 24-bit truecolor.
    Rgb(u8, u8, u8),
}

impl Color {
    pub const BLACK: Self = Self::Indexed(0);
    pub const RED: Self = Self::Indexed(1);
    pub const GREEN: Self = Self::Indexed(2);
    pub const YELLOW: Self = Self::Indexed(3);
    pub const BLUE: Self = Self::Indexed(4);
    pub const MAGENTA: Self = Self::Indexed(5);
    pub const CYAN: Self = Self::Indexed(6);
    pub const WHITE: Self = Self::Indexed(7);
    pub const BRIGHT_BLACK: Self = Self::Indexed(8);
    pub const BRIGHT_RED: Self = Self::Indexed(9);
    pub const BRIGHT_GREEN: Self = Self::Indexed(10);
    pub const BRIGHT_YELLOW: Self = Self::Indexed(11);
    pub const BRIGHT_BLUE: Self = Self::Indexed(12);
    pub const BRIGHT_MAGENTA: Self = Self::Indexed(13);
    pub const BRIGHT_CYAN: Self = Self::Indexed(14);
    pub const BRIGHT_WHITE: Self = Self::Indexed(15);

    /// Whether this is the terminal default color.
    #[inline]
    #[must_use]
    pub const fn is_default(self) -> bool {
        matches!(self, Self::Default)
    }

    /// Parse a `#rrggbb` (or `rrggbb`) hex string into an RGB color.
    ///
    /// ```
    /// use k_term::color::Color;
    ///
    /// assert_eq!(Color::hex("#ff8000"), Some(Color::Rgb(255, 128, 0)));
    /// assert_eq!(Color::hex("nope"), None);
    /// ```
    #[must_use]
    pub fn hex(s: &str) -> Option<Self> {
        let s = s.strip_prefix('#').unwrap_or(s);
        if s.len() != 6 || !s.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&s[i..i + 2], 16).ok();
        Some(Self::Rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}
