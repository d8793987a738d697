//! Default Normal-mode key bindings.
//!
//! | Keys                     | Binding                  |
//! |--------------------------|--------------------------|
//! | `j` `<Down>`             | down                     |
//! | `k` `<Up>`               | up                       |
//! | `gg` `<Home>`            | first row                |
//! | `G` `<End>`              | last row                 |
//! | `<C-d>` `<C-u>`          | half page down / up      |
//! | `<C-f>` `<PageDown>`     | page down                |
//! | `<C-b>` `<PageUp>`       | page up                  |
//! | `d` `y`                  | delete / yank operator   |
//! | `i`                      | Insert mode              |
//! | `:`                      | command line             |
//! | `ZZ` `<C-q>`             | quit                     |
//! | `<C-l>`                  | redraw                   |
//! | `<CR>`                   | open                     |
//! | `<Tab>`                  | focus next widget        |

use k_term::input::{KeyCode, KeyEvent};

use crate::motion::{Motion, Operator};
use crate::trie::{Action, Binding, KeyTrie};

fn ch(c: char) -> KeyEvent {
    KeyEvent::plain(KeyCode::Char(c))
}

/// The bindings kestrel starts with.
#[must_use]
pub fn default_keymap() -> KeyTrie {
    use Binding::{Action as A, Motion as M, Operator as O};

    let mut trie = KeyTrie::new();
    trie.bind(&[ch('j')], M(Motion::Down))
        .bind(&[KeyCode::Down.into()], M(Motion::Down))
        .bind(&[ch('k')], M(Motion::Up))
        .bind(&[KeyCode::Up.into()], M(Motion::Up))
        .bind(&[ch('g'), ch('g')], M(Motion::First))
        .bind(&[KeyCode::Home.into()], M(Motion::First))
        .bind(&[ch('G')], M(Motion::Last))
        .bind(&[KeyCode::End.into()], M(Motion::Last))
        .bind(&[KeyEvent::ctrl('d')], M(Motion::HalfPageDown))
        .bind(&[KeyEvent::ctrl('u')], M(Motion::HalfPageUp))
        .bind(&[KeyEvent::ctrl('f')], M(Motion::PageDown))
        .bind(&[KeyCode::PageDown.into()], M(Motion::PageDown))
        .bind(&[KeyEvent::ctrl('b')], M(Motion::PageUp))
        .bind(&[KeyCode::PageUp.into()], M(Motion::PageUp))
        .bind(&[ch('d')], O(Operator::Delete))
        .bind(&[ch('y')], O(Operator::Yank))
        .bind(&[ch('i')], A(Action::EnterInsert))
        .bind(&[ch(':')], A(Action::EnterCommandLine))
        .bind(&[ch('Z'), ch('Z')], A(Action::Quit))
        .bind(&[KeyEvent::ctrl('q')], A(Action::Quit))
        .bind(&[KeyEvent::ctrl('l')], A(Action::Redraw))
        .bind(&[KeyCode::Enter.into()], A(Action::Open))
        .bind(&[KeyCode::Tab.into()], A(Action::FocusNext));
    trie
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trie::Lookup;

    #[test]
    fn vim_motions_are_bound() {
        let map = default_keymap();
        assert_eq!(map.lookup(&[ch('j')]), Lookup::Leaf(Binding::Motion(Motion::Down)));
        assert_eq!(map.lookup(&[ch('g')]), Lookup::Prefix { binding: None });
        assert_eq!(
            map.lookup(&[KeyEvent::ctrl('d')]),
            Lookup::Leaf(Binding::Motion(Motion::HalfPageDown))
        );
    }

    #[test]
    fn digits_are_left_for_counts() {
        let map = default_keymap();
        for d in '0'..='9' {
            assert_eq!(map.lookup(&[ch(d)]), Lookup::None);
        }
    }

    #[test]
    fn every_binding_is_reachable() {
        assert_eq!(default_keymap().len(), 23);
    }
}
