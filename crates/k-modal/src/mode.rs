//! Vim-style input modes.
//!
//! The engine is always in exactly one [`Mode`]. Each mode changes how keys
//! are interpreted:
//!
//! | Mode        | Keys are...                         | Left with      |
//! |-------------|-------------------------------------|----------------|
//! | Normal      | counts, motions, operators, actions | `i`, `:`       |
//! | Insert      | passed through to the focused widget | Esc           |
//! | CommandLine | typed into the `:` prompt           | Enter, Esc     |

use std::fmt;

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// The current input mode.
///
/// Pure data: what mode we're in, not how keys are handled. Transitions
/// live in [`ModalEngine`](crate::engine::ModalEngine).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Default mode. Keys are commands, not text input.
    #[default]
    Normal,
    /// Keys go to the focused widget untouched.
    Insert,
    /// Keys edit the `:` prompt at the bottom of the screen.
    CommandLine,
}

impl Mode {
    /// Human-readable name for the status line.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Insert => "INSERT",
            Self::CommandLine => "COMMAND",
        }
    }

    /// True if this mode treats printable keys as text.
    #[inline]
    #[must_use]
    pub const fn is_input(self) -> bool {
        matches!(self, Self::Insert | Self::CommandLine)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
