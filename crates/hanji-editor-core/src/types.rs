//! Core input types: selection and key events.
//!
//! These types are framework-agnostic. Adapters translate DOM or native
//! events into them before handing them to the coordinator.

use std::ops::Range;

use smol_str::SmolStr;

/// Text selection with anchor and head positions.
///
/// The anchor is where the selection started, the head is where the cursor is now.
/// They may be in any order - use `start()` and `end()` for ordered bounds.
#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Where selection started
    pub anchor: usize,
    /// Where cursor is now
    pub head: usize,
}

impl Selection {
    /// Create a new selection.
    pub fn new(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    /// Create a collapsed selection (cursor position).
    pub fn collapsed(offset: usize) -> Self {
        Self {
            anchor: offset,
            head: offset,
        }
    }

    /// Get the start (lower bound) of the selection.
    pub fn start(&self) -> usize {
        self.anchor.min(self.head)
    }

    /// Get the end (upper bound) of the selection.
    pub fn end(&self) -> usize {
        self.anchor.max(self.head)
    }

    /// Check if the selection is collapsed (empty, cursor only).
    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.head
    }

    /// Get the selection length.
    pub fn len(&self) -> usize {
        self.end() - self.start()
    }

    /// Check if empty (same as is_collapsed).
    pub fn is_empty(&self) -> bool {
        self.is_collapsed()
    }

    /// Convert to a Range<usize> (ordered).
    pub fn to_range(&self) -> Range<usize> {
        self.start()..self.end()
    }

    /// Clamp both ends to a document of `len` chars.
    pub fn clamped(self, len: usize) -> Self {
        Self {
            anchor: self.anchor.min(len),
            head: self.head.min(len),
        }
    }
}

/// Logical key identifier, independent of the platform event source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Enter,
    Escape,
    /// A printable character (or grapheme) produced by the key.
    Character(SmolStr),
    /// Anything else, carrying the platform's key name.
    Other(SmolStr),
}

impl Key {
    /// Parse a W3C `KeyboardEvent.key` value.
    pub fn from_dom_key(key: &str) -> Self {
        match key {
            "Enter" => Key::Enter,
            "Escape" | "Esc" => Key::Escape,
            k if k.chars().count() == 1 => Key::Character(k.into()),
            other => Key::Other(other.into()),
        }
    }
}

/// A key press as seen by the coordinator.
///
/// `offset` is the caret position the event source reported, if any. When it
/// is absent the coordinator asks the surface for its current selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
    pub offset: Option<usize>,
}

impl KeyEvent {
    /// A key press with no modifiers and no carried offset.
    pub fn new(key: Key) -> Self {
        Self {
            key,
            shift: false,
            ctrl: false,
            alt: false,
            meta: false,
            offset: None,
        }
    }

    /// Plain Enter.
    pub fn enter() -> Self {
        Self::new(Key::Enter)
    }

    /// Shift+Enter.
    pub fn shift_enter() -> Self {
        Self::enter().with_shift(true)
    }

    pub fn with_shift(mut self, shift: bool) -> Self {
        self.shift = shift;
        self
    }

    pub fn with_ctrl(mut self, ctrl: bool) -> Self {
        self.ctrl = ctrl;
        self
    }

    pub fn with_meta(mut self, meta: bool) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_alt(mut self, alt: bool) -> Self {
        self.alt = alt;
        self
    }

    /// Attach the caret offset the event source reported.
    pub fn at(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Ctrl, Alt or Meta held. Shift alone does not count.
    pub fn has_command_modifier(&self) -> bool {
        self.ctrl || self.alt || self.meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_bounds() {
        let sel = Selection::new(10, 5);
        assert_eq!(sel.start(), 5);
        assert_eq!(sel.end(), 10);
        assert_eq!(sel.len(), 5);
        assert_eq!(sel.to_range(), 5..10);
    }

    #[test]
    fn test_selection_clamped() {
        let sel = Selection::new(3, 40).clamped(12);
        assert_eq!(sel, Selection::new(3, 12));
    }

    #[test]
    fn test_key_from_dom() {
        assert_eq!(Key::from_dom_key("Enter"), Key::Enter);
        assert_eq!(Key::from_dom_key("Esc"), Key::Escape);
        assert_eq!(Key::from_dom_key("ㅎ"), Key::Character("ㅎ".into()));
        assert_eq!(Key::from_dom_key("Process"), Key::Other("Process".into()));
        assert_eq!(Key::from_dom_key("Backspace"), Key::Other("Backspace".into()));
    }

    #[test]
    fn test_command_modifier() {
        assert!(!KeyEvent::shift_enter().has_command_modifier());
        assert!(KeyEvent::enter().with_meta(true).has_command_modifier());
    }
}
