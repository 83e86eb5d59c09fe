use crossterm::event::{Event, KeyCode, KeyEventKind, KeyModifiers};

/// Keys the interpreter understands, stripped of terminal detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Char(char),
    Up,
    Down,
    Enter,
    Backspace,
    Esc,
    Resize,
    /// Ctrl+C, quits from anywhere.
    Interrupt,
}

impl Input {
    pub fn from_event(event: &Event) -> Option<Input> {
        match event {
            Event::Resize(..) => Some(Input::Resize),
            Event::Key(key) if key.kind != KeyEventKind::Release => {
                if key.modifiers.contains(KeyModifiers::CONTROL) {
                    return matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
                        .then_some(Input::Interrupt);
                }
                match key.code {
                    KeyCode::Char(c) => Some(Input::Char(c)),
                    KeyCode::Up => Some(Input::Up),
                    KeyCode::Down => Some(Input::Down),
                    KeyCode::Enter => Some(Input::Enter),
                    KeyCode::Backspace => Some(Input::Backspace),
                    KeyCode::Esc => Some(Input::Esc),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}
