//! Key bindings: arrows, WASD, and vim-style.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    MoveLeft,
    MoveRight,
    Rotate,
    SoftDrop,
    HardDrop,
    Pause,
    Restart,
    Quit,
    None,
}

/// Map key event to game action. Supports arrows + Enter/Space, WASD, and
/// vim keys (hjkl).
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent {
        code, modifiers, ..
    } = key;
    let no_mod = modifiers.is_empty() || modifiers == KeyModifiers::SHIFT;
    if !no_mod {
        return Action::None;
    }
    match code {
        KeyCode::Char('q' | 'Q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('p' | 'P') => Action::Pause,
        KeyCode::Char('r' | 'R') => Action::Restart,
        KeyCode::Left | KeyCode::Char('h' | 'a' | 'A') => Action::MoveLeft,
        KeyCode::Right | KeyCode::Char('l' | 'd' | 'D') => Action::MoveRight,
        KeyCode::Up | KeyCode::Char('k' | 'w' | 'W') => Action::Rotate,
        KeyCode::Down | KeyCode::Char('j' | 's' | 'S') => Action::SoftDrop,
        KeyCode::Enter | KeyCode::Char(' ') => Action::HardDrop,
        _ => Action::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState};

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn arrow_wasd_and_vim_layouts_agree() {
        for code in [KeyCode::Left, KeyCode::Char('h'), KeyCode::Char('a')] {
            assert_eq!(key_to_action(press(code)), Action::MoveLeft);
        }
        for code in [KeyCode::Right, KeyCode::Char('l'), KeyCode::Char('d')] {
            assert_eq!(key_to_action(press(code)), Action::MoveRight);
        }
        for code in [KeyCode::Up, KeyCode::Char('k'), KeyCode::Char('w')] {
            assert_eq!(key_to_action(press(code)), Action::Rotate);
        }
        for code in [KeyCode::Down, KeyCode::Char('j'), KeyCode::Char('s')] {
            assert_eq!(key_to_action(press(code)), Action::SoftDrop);
        }
        assert_eq!(key_to_action(press(KeyCode::Enter)), Action::HardDrop);
        assert_eq!(key_to_action(press(KeyCode::Char(' '))), Action::HardDrop);
        assert_eq!(key_to_action(press(KeyCode::Esc)), Action::Quit);
        assert_eq!(key_to_action(press(KeyCode::Char('p'))), Action::Pause);
        assert_eq!(key_to_action(press(KeyCode::Char('r'))), Action::Restart);
    }

    #[test]
    fn modified_keys_are_ignored() {
        let mut key = press(KeyCode::Left);
        key.modifiers = KeyModifiers::ALT;
        assert_eq!(key_to_action(key), Action::None);
        key.modifiers = KeyModifiers::CONTROL;
        assert_eq!(key_to_action(key), Action::None);
    }
}
