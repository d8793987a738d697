//! # k-modal — Modal input engine for kestrel
//!
//! Sits between the input decoder and the widgets. Raw key events go in,
//! [`Command`](engine::Command)s come out:
//!
//! - **[`mode`]** — `Normal`, `Insert`, `CommandLine`
//! - **[`motion`]** — row motions, operators, and the ranges they cover
//! - **[`trie`]** — key-sequence trie mapping sequences to bindings
//! - **[`keymap`]** — the default Normal-mode bindings
//! - **[`command_line`]** — the `:` prompt's text buffer
//! - **[`engine`]** — the state machine: counts, pending operators,
//!   sequence timeouts, mode transitions
//!
//! The engine never sleeps. Anything waiting on time (an ambiguous prefix
//! like `g`, an operator with no motion yet) shows up in
//! [`ModalEngine::deadline`](engine::ModalEngine::deadline), and the event
//! loop calls [`ModalEngine::expire`](engine::ModalEngine::expire) when it
//! passes.

pub mod command_line;
pub mod engine;
pub mod keymap;
pub mod mode;
pub mod motion;
pub mod trie;

pub use engine::{Command, EngineConfig, ModalEngine};
pub use mode::Mode;
