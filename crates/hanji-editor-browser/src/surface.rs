//! `TextSurface` adapter over a `<textarea>`.
//!
//! The DOM reports selection offsets in UTF-16 code units while the
//! coordinator works in chars, so every offset crossing the boundary is
//! converted. Embeds are written as markdown since a textarea holds only text.

use hanji_editor_core::{Embed, Formatting, Selection, SurfaceError, TextSurface};
use web_sys::HtmlTextAreaElement;

use crate::error::js_error_message;

/// Convert a UTF-16 offset into a char offset. Offsets inside a surrogate
/// pair round down.
pub fn utf16_to_char(text: &str, utf16_offset: usize) -> usize {
    let mut units = 0;
    for (chars, c) in text.chars().enumerate() {
        units += c.len_utf16();
        if units > utf16_offset {
            return chars;
        }
    }
    text.chars().count()
}

/// Convert a char offset into a UTF-16 offset, clamping to the end.
pub fn char_to_utf16(text: &str, char_offset: usize) -> usize {
    text.chars().take(char_offset).map(char::len_utf16).sum()
}

/// Markdown written into the textarea for an embed.
pub fn embed_markup(embed: &Embed) -> String {
    match embed {
        Embed::Image(src) => format!("![]({src})"),
        Embed::Video(src) => format!("[video]({src})"),
    }
}

pub struct TextAreaSurface {
    element: HtmlTextAreaElement,
}

impl TextAreaSurface {
    pub fn new(element: HtmlTextAreaElement) -> Self {
        Self { element }
    }

    pub fn element(&self) -> &HtmlTextAreaElement {
        &self.element
    }

    pub fn value(&self) -> String {
        self.element.value()
    }

    fn replace(&self, text: &str, offset: usize) -> Result<(), SurfaceError> {
        let value = self.element.value();
        let len = value.chars().count();
        if offset > len {
            return Err(SurfaceError::OutOfBounds { offset, len });
        }
        let at = char_to_utf16(&value, offset) as u32;
        self.element
            .set_range_text_with_start_and_end(text, at, at)
            .map_err(|e| SurfaceError::Platform(js_error_message(&e)))?;
        self.notify_input();
        Ok(())
    }

    /// Programmatic edits don't fire `input`; frameworks bound to the
    /// textarea need it to see the new value.
    fn notify_input(&self) {
        let dispatched = web_sys::Event::new("input")
            .and_then(|event| self.element.dispatch_event(&event));
        if let Err(e) = dispatched {
            tracing::debug!(error = %js_error_message(&e), "failed to dispatch input event");
        }
    }
}

impl TextSurface for TextAreaSurface {
    fn selection(&self) -> Option<Selection> {
        let start = self.element.selection_start().ok().flatten()? as usize;
        let end = self.element.selection_end().ok().flatten()? as usize;
        let value = self.element.value();
        let start = utf16_to_char(&value, start);
        let end = utf16_to_char(&value, end);

        let backward = self
            .element
            .selection_direction()
            .ok()
            .flatten()
            .is_some_and(|d| d == "backward");
        Some(if backward {
            Selection::new(end, start)
        } else {
            Selection::new(start, end)
        })
    }

    fn set_selection(&mut self, selection: Selection) -> Result<(), SurfaceError> {
        let value = self.element.value();
        let len = value.chars().count();
        if selection.end() > len {
            return Err(SurfaceError::OutOfBounds {
                offset: selection.end(),
                len,
            });
        }
        let start = char_to_utf16(&value, selection.start()) as u32;
        let end = char_to_utf16(&value, selection.end()) as u32;
        let direction = if selection.head < selection.anchor {
            "backward"
        } else {
            "forward"
        };
        self.element
            .set_selection_range_with_direction(start, end, direction)
            .map_err(|e| SurfaceError::Platform(js_error_message(&e)))
    }

    /// Plain text has no attributes.
    fn format_at(&self, _offset: usize) -> Formatting {
        Formatting::plain()
    }

    fn insert_text(
        &mut self,
        offset: usize,
        text: &str,
        _formatting: &Formatting,
    ) -> Result<(), SurfaceError> {
        self.replace(text, offset)
    }

    fn insert_embed(&mut self, offset: usize, embed: &Embed) -> Result<(), SurfaceError> {
        self.replace(&embed_markup(embed), offset)
    }

    fn focus(&mut self) {
        if let Err(e) = self.element.focus() {
            tracing::debug!(error = %js_error_message(&e), "focus failed");
        }
    }

    fn len_chars(&self) -> usize {
        self.element.value().chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf16_ascii_and_hangul() {
        // BMP chars are one unit each
        let text = "ab한글";
        assert_eq!(utf16_to_char(text, 3), 3);
        assert_eq!(char_to_utf16(text, 4), 4);
    }

    #[test]
    fn test_utf16_surrogate_pairs() {
        let text = "a😀b";
        assert_eq!(char_to_utf16(text, 2), 3);
        assert_eq!(utf16_to_char(text, 3), 2);
        // inside the pair
        assert_eq!(utf16_to_char(text, 2), 1);
        assert_eq!(utf16_to_char(text, 99), 3);
        assert_eq!(char_to_utf16(text, 99), 4);
    }

    #[test]
    fn test_embed_markup() {
        assert_eq!(
            embed_markup(&Embed::Image("data:image/png;base64,AA".into())),
            "![](data:image/png;base64,AA)"
        );
    }
}
