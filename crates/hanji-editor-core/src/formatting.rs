//! Text attributes and the toolbar commands that change them.
//!
//! `Formatting` is the attribute set captured at the caret before a manual
//! newline insertion, so the new line keeps the style the user was typing in.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::embed::sanitize_link;

/// Paragraph alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Center,
    Right,
    Justify,
}

/// Inline and line attributes attached to a run of text.
///
/// Serializes the way delta-based editors expect: unset attributes are
/// omitted entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Formatting {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub bold: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub italic: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub underline: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub strike: bool,
    /// Heading level 1..=6.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<SmolStr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<SmolStr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<SmolStr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub align: Option<Align>,
}

impl Formatting {
    pub fn plain() -> Self {
        Self::default()
    }

    pub fn is_plain(&self) -> bool {
        *self == Self::default()
    }

    pub fn bold() -> Self {
        Self {
            bold: true,
            ..Self::default()
        }
    }
}

/// A toolbar action applied to a selection range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatCommand {
    ToggleBold,
    ToggleItalic,
    ToggleUnderline,
    ToggleStrike,
    /// Heading level, or `None` for body text. Levels above 6 are clamped.
    Header(Option<u8>),
    Color(Option<SmolStr>),
    Background(Option<SmolStr>),
    Align(Option<Align>),
    /// Link target. Sanitized before it is stored.
    Link(Option<String>),
}

impl FormatCommand {
    /// Whether every char currently carries the attribute this command toggles.
    ///
    /// Toggles flip to "off" only when the whole range is already on, which
    /// matches how editor toolbars behave on mixed selections.
    pub(crate) fn is_active_in<'a>(&self, mut formats: impl Iterator<Item = &'a Formatting>) -> bool {
        match self {
            FormatCommand::ToggleBold => formats.all(|f| f.bold),
            FormatCommand::ToggleItalic => formats.all(|f| f.italic),
            FormatCommand::ToggleUnderline => formats.all(|f| f.underline),
            FormatCommand::ToggleStrike => formats.all(|f| f.strike),
            _ => false,
        }
    }

    /// Apply to one attribute set. `active` is the result of `is_active_in`
    /// for the whole range.
    pub(crate) fn apply(&self, formatting: &mut Formatting, active: bool) {
        match self {
            FormatCommand::ToggleBold => formatting.bold = !active,
            FormatCommand::ToggleItalic => formatting.italic = !active,
            FormatCommand::ToggleUnderline => formatting.underline = !active,
            FormatCommand::ToggleStrike => formatting.strike = !active,
            FormatCommand::Header(level) => {
                formatting.header = level.filter(|l| *l > 0).map(|l| l.min(6))
            }
            FormatCommand::Color(color) => formatting.color = color.clone(),
            FormatCommand::Background(color) => formatting.background = color.clone(),
            FormatCommand::Align(align) => formatting.align = *align,
            FormatCommand::Link(href) => {
                formatting.link = href.as_deref().map(|h| SmolStr::new(sanitize_link(h)))
            }
        }
    }
}
