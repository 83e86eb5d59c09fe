//! Cursor over the store's enumeration order.
//!
//! Positions are 1-based: position 1 is the title row, which can hold the
//! cursor but selects nothing, and positions `2..=count + 1` are entries.

/// First position that holds an entry.
pub const FIRST_ENTRY: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    cursor: usize,
}

impl Default for Selection {
    fn default() -> Self {
        Self { cursor: 1 }
    }
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Zero-based store position under the cursor, if it is on an entry.
    pub fn entry_index(&self, count: usize) -> Option<usize> {
        (self.cursor >= FIRST_ENTRY && self.cursor <= count + 1).then(|| self.cursor - FIRST_ENTRY)
    }

    /// Wraps from the last entry back to the first.
    pub fn down(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        self.cursor = if self.cursor == count + 1 {
            FIRST_ENTRY
        } else {
            self.cursor + 1
        };
    }

    /// Wraps from the title row to the last entry.
    pub fn up(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        self.cursor = if self.cursor == 1 {
            count + 1
        } else {
            self.cursor - 1
        };
    }

    pub fn top(&mut self, count: usize) {
        if count > 0 {
            self.cursor = FIRST_ENTRY;
        }
    }

    pub fn bottom(&mut self, count: usize) {
        if count > 0 {
            self.cursor = count + 1;
        }
    }

    pub fn middle(&mut self, count: usize) {
        if count > 0 {
            self.cursor = count / 2 + FIRST_ENTRY;
        }
    }

    pub fn jump_to(&mut self, position: usize, count: usize) {
        if position < count {
            self.cursor = position + FIRST_ENTRY;
        }
    }

    /// Pull the cursor back into `1..=count + 1` after the store changed size.
    pub fn reclamp(&mut self, count: usize) {
        self.cursor = if count == 0 {
            1
        } else {
            self.cursor.clamp(1, count + 1)
        };
    }
}

/// Which slice of the store is on screen and where the cursor sits in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Store position of the first visible entry.
    pub first: usize,
    /// Number of visible entries.
    pub len: usize,
    /// Cursor position after scrolling, in `1..=capacity`.
    pub cursor_row: usize,
}

impl Window {
    /// Index into the visible slice of the highlighted entry.
    pub fn selected(&self) -> Option<usize> {
        let idx = self.cursor_row.checked_sub(FIRST_ENTRY)?;
        (idx < self.len).then_some(idx)
    }
}

/// Derive the visible window from the cursor alone. Once the cursor passes
/// `capacity`, the window is pushed down by the overshoot; it only moves back
/// up as the cursor does.
pub fn window(cursor: usize, count: usize, capacity: usize) -> Window {
    let first = cursor.saturating_sub(capacity).min(count);
    let len = count.saturating_sub(first).min(capacity);
    Window {
        first,
        len,
        cursor_row: cursor - first,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Chord {
    #[default]
    Idle,
    Armed,
}

impl Chord {
    /// Feed the next key. Returns true when `g` completes the `gg` chord.
    /// Any other key disarms it.
    pub fn feed(&mut self, key: char) -> bool {
        match (*self, key) {
            (Chord::Idle, 'g') => {
                *self = Chord::Armed;
                false
            }
            (Chord::Armed, 'g') => {
                *self = Chord::Idle;
                true
            }
            _ => {
                *self = Chord::Idle;
                false
            }
        }
    }

    pub fn disarm(&mut self) {
        *self = Chord::Idle;
    }

    pub fn is_armed(&self) -> bool {
        *self == Chord::Armed
    }
}
