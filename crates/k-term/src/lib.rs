// SPDX-License-Identifier: MIT
//
// k-term — Terminal core for kestrel.
//
// Everything between the raw terminal file descriptors and the widget
// layer lives here: raw-mode lifecycle, a byte-wise input decoder that
// turns stdin into key/mouse events, a double-buffered cell grid with a
// differential renderer, and the single-threaded loop that ties them
// together.
//
// No curses, no crossterm. Every byte sent to the terminal is produced
// by `ansi`, every frame is diffed against what the terminal already
// shows, and every byte read is accounted for by the decoder.
//
// The terminal driver and the loop speak termios, poll and signals, so
// they exist on unix only. Everything else is plain data and builds
// anywhere.

pub mod ansi;
pub mod buffer;
pub mod cell;
pub mod color;
pub mod error;
#[cfg(unix)]
pub mod event_loop;
pub mod input;
pub mod output;
pub mod screen;
#[cfg(unix)]
pub mod terminal;
pub mod text;

pub use error::{Error, Result};
