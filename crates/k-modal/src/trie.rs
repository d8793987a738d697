//! Key-sequence trie.
//!
//! Normal-mode bindings are key sequences (`j`, `gg`, `ZZ`). The trie maps
//! each sequence to a [`Binding`]; a node can carry a binding of its own
//! *and* children, in which case the engine waits for the disambiguation
//! window before settling on the shorter one.
//!
//! The trie is built once and only read afterwards.

use std::collections::HashMap;

use k_term::input::KeyEvent;

use crate::motion::{Motion, Operator};

// ---------------------------------------------------------------------------
// Binding
// ---------------------------------------------------------------------------

/// Actions that are neither motions nor operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Switch to Insert mode.
    EnterInsert,
    /// Switch to command-line mode (the `:` prompt).
    EnterCommandLine,
    Quit,
    /// Repaint the whole screen.
    Redraw,
    /// Open the selected row.
    Open,
    /// Move focus to the next focusable widget.
    FocusNext,
}

/// What a key sequence is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binding {
    Motion(Motion),
    Operator(Operator),
    Action(Action),
}

// ---------------------------------------------------------------------------
// KeyTrie
// ---------------------------------------------------------------------------

/// Result of looking a sequence up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Nothing starts with this sequence.
    None,
    /// Bound, and no longer sequence starts with it.
    Leaf(Binding),
    /// Longer sequences start with this one. `binding` is what the sequence
    /// means on its own, if anything.
    Prefix { binding: Option<Binding> },
}

#[derive(Debug, Clone, Default)]
struct Node {
    binding: Option<Binding>,
    children: HashMap<KeyEvent, Node>,
}

/// Trie of key sequences.
#[derive(Debug, Clone, Default)]
pub struct KeyTrie {
    root: Node,
}

impl KeyTrie {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `keys` to `binding`, replacing any previous binding for exactly
    /// that sequence. An empty sequence is ignored.
    pub fn bind(&mut self, keys: &[KeyEvent], binding: Binding) -> &mut Self {
        if keys.is_empty() {
            return self;
        }
        let node = keys
            .iter()
            .fold(&mut self.root, |node, key| node.children.entry(*key).or_default());
        node.binding = Some(binding);
        self
    }

    /// Look `keys` up.
    #[must_use]
    pub fn lookup(&self, keys: &[KeyEvent]) -> Lookup {
        let mut node = &self.root;
        for key in keys {
            match node.children.get(key) {
                Some(child) => node = child,
                None => return Lookup::None,
            }
        }
        match (node.binding, node.children.is_empty()) {
            (_, false) => Lookup::Prefix {
                binding: node.binding,
            },
            (Some(binding), true) => Lookup::Leaf(binding),
            (None, true) => Lookup::None,
        }
    }

    /// Number of bound sequences.
    #[must_use]
    pub fn len(&self) -> usize {
        fn count(node: &Node) -> usize {
            usize::from(node.binding.is_some()) + node.children.values().map(count).sum::<usize>()
        }
        count(&self.root)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
