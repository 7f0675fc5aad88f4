//! Reference text surface with formatting runs and embeds.
//!
//! `RichDocument` models a delta-style editor: a linear char sequence that
//! always ends in a newline, where each embed occupies one char. It is the
//! surface the CLI replays sessions against and the one the coordinator tests
//! run on; browser widgets get their own adapters.

use std::fmt;
use std::ops::Range;

use serde::Serialize;

use crate::embed::{EMBED_CHAR, Embed};
use crate::error::SurfaceError;
use crate::formatting::{FormatCommand, Formatting};
use crate::surface::TextSurface;
use crate::text::{EditorRope, TextBuffer};
use crate::types::Selection;

#[derive(Debug, Clone, PartialEq)]
struct Run {
    len: usize,
    formatting: Formatting,
}

/// Run-length encoded formatting, one run per maximal span of equal
/// attributes. Run lengths always sum to the document length.
#[derive(Debug, Clone, Default)]
struct FormatRuns {
    runs: Vec<Run>,
}

impl FormatRuns {
    fn plain(len: usize) -> Self {
        let mut runs = Self::default();
        runs.insert(0, len, Formatting::plain());
        runs
    }

    /// Make sure a run starts at `offset`, returning its index.
    fn split_at(&mut self, offset: usize) -> usize {
        let mut pos = 0;
        for i in 0..self.runs.len() {
            if pos == offset {
                return i;
            }
            let len = self.runs[i].len;
            if offset < pos + len {
                let right = Run {
                    len: pos + len - offset,
                    formatting: self.runs[i].formatting.clone(),
                };
                self.runs[i].len = offset - pos;
                self.runs.insert(i + 1, right);
                return i + 1;
            }
            pos += len;
        }
        self.runs.len()
    }

    fn normalize(&mut self) {
        let mut merged: Vec<Run> = Vec::with_capacity(self.runs.len());
        for run in self.runs.drain(..) {
            if run.len == 0 {
                continue;
            }
            match merged.last_mut() {
                Some(last) if last.formatting == run.formatting => last.len += run.len,
                _ => merged.push(run),
            }
        }
        self.runs = merged;
    }

    fn insert(&mut self, offset: usize, len: usize, formatting: Formatting) {
        if len == 0 {
            return;
        }
        let i = self.split_at(offset);
        self.runs.insert(i, Run { len, formatting });
        self.normalize();
    }

    fn delete(&mut self, range: Range<usize>) {
        let start = self.split_at(range.start);
        let end = self.split_at(range.end);
        self.runs.drain(start..end);
        self.normalize();
    }

    fn apply(&mut self, range: Range<usize>, mut f: impl FnMut(&mut Formatting)) {
        let start = self.split_at(range.start);
        let end = self.split_at(range.end);
        for run in &mut self.runs[start..end] {
            f(&mut run.formatting);
        }
        self.normalize();
    }

    /// Formatting of the char at `offset`.
    fn at(&self, offset: usize) -> Option<&Formatting> {
        let mut pos = 0;
        for run in &self.runs {
            if offset < pos + run.len {
                return Some(&run.formatting);
            }
            pos += run.len;
        }
        None
    }

    fn overlapping(&self, range: Range<usize>) -> impl Iterator<Item = &Formatting> {
        let mut pos = 0;
        self.runs.iter().filter_map(move |run| {
            let run_range = pos..pos + run.len;
            pos += run.len;
            (run_range.start < range.end && range.start < run_range.end).then_some(&run.formatting)
        })
    }
}

/// Content as a list of delta operations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeltaOp {
    pub insert: DeltaInsert,
    #[serde(skip_serializing_if = "Formatting::is_plain")]
    pub attributes: Formatting,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DeltaInsert {
    Text(String),
    Embed(Embed),
}

/// Counter shown under the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DocumentStats {
    /// Characters, excluding embeds and the trailing newline.
    pub chars: usize,
    pub embeds: usize,
    pub limit: Option<usize>,
    pub over_limit: bool,
}

impl fmt::Display for DocumentStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.limit {
            Some(limit) => write!(f, "{}/{}", self.chars, limit),
            None => write!(f, "{}", self.chars),
        }
    }
}

/// Delta-style document implementing `TextSurface`.
#[derive(Clone)]
pub struct RichDocument<T: TextBuffer = EditorRope> {
    text: T,
    runs: FormatRuns,
    /// Embeds in document order; the nth `EMBED_CHAR` is `embeds[n]`.
    embeds: Vec<Embed>,
    selection: Option<Selection>,
    focused: bool,
}

impl RichDocument<EditorRope> {
    /// An empty document (a single newline).
    pub fn new() -> Self {
        Self::from_text("")
    }

    /// A plain document with `text`. A trailing newline is added if missing.
    pub fn from_text(text: &str) -> Self {
        Self::with_buffer(EditorRope::from_str(text))
    }
}

impl Default for RichDocument<EditorRope> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TextBuffer> RichDocument<T> {
    /// Wrap an existing buffer. Embed chars already in it are dropped.
    pub fn with_buffer(mut text: T) -> Self {
        let mut offset = 0;
        while offset < text.len_chars() {
            if text.char_at(offset) == Some(EMBED_CHAR) {
                text.delete(offset..offset + 1);
            } else {
                offset += 1;
            }
        }
        let len = text.len_chars();
        if text.char_at(len.wrapping_sub(1)) != Some('\n') {
            text.insert(len, "\n");
        }
        let runs = FormatRuns::plain(text.len_chars());
        Self {
            text,
            runs,
            embeds: Vec::new(),
            selection: None,
            focused: false,
        }
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn blur(&mut self) {
        self.focused = false;
    }

    pub fn embeds(&self) -> &[Embed] {
        &self.embeds
    }

    /// Text without embeds.
    pub fn to_plain_text(&self) -> String {
        self.text.to_string().chars().filter(|c| *c != EMBED_CHAR).collect()
    }

    /// Only the trailing newline remains.
    pub fn is_blank(&self) -> bool {
        self.text.len_chars() <= 1
    }

    pub fn stats(&self, limit: Option<usize>) -> DocumentStats {
        let chars = self
            .to_plain_text()
            .chars()
            .count()
            .saturating_sub(1);
        DocumentStats {
            chars,
            embeds: self.embeds.len(),
            limit,
            over_limit: limit.is_some_and(|l| chars > l),
        }
    }

    fn check_offset(&self, offset: usize) -> Result<(), SurfaceError> {
        let len = self.text.len_chars();
        if offset > len {
            return Err(SurfaceError::OutOfBounds { offset, len });
        }
        Ok(())
    }

    /// Insertions and carets must stay before the final newline.
    fn check_content_offset(&self, offset: usize) -> Result<(), SurfaceError> {
        if offset > self.end_offset() {
            return Err(SurfaceError::OutOfBounds {
                offset,
                len: self.text.len_chars(),
            });
        }
        Ok(())
    }

    /// Shift the selection for `len` chars inserted at `offset`.
    ///
    /// Positions at the insertion point move too, so a caret sitting where
    /// text is inserted ends up after it.
    fn shift_selection_insert(&mut self, offset: usize, len: usize) {
        if let Some(sel) = self.selection.as_mut() {
            if sel.anchor >= offset {
                sel.anchor += len;
            }
            if sel.head >= offset {
                sel.head += len;
            }
        }
    }

    fn shift_selection_delete(&mut self, range: &Range<usize>) {
        let map = |pos: usize| {
            if pos <= range.start {
                pos
            } else if pos >= range.end {
                pos - range.len()
            } else {
                range.start
            }
        };
        if let Some(sel) = self.selection.as_mut() {
            sel.anchor = map(sel.anchor);
            sel.head = map(sel.head);
        }
    }

    /// Delete a char range. The final newline can't be deleted.
    pub fn delete(&mut self, range: Range<usize>) -> Result<(), SurfaceError> {
        let len = self.text.len_chars();
        let end = range.end.min(len.saturating_sub(1));
        if range.start > end {
            return Err(SurfaceError::OutOfBounds {
                offset: range.start,
                len,
            });
        }
        let range = range.start..end;
        if range.is_empty() {
            return Ok(());
        }

        let first_embed = self.text.count_before(range.start, EMBED_CHAR);
        let removed_embeds = self.text.count_before(range.end, EMBED_CHAR) - first_embed;
        self.embeds.drain(first_embed..first_embed + removed_embeds);

        self.text.delete(range.clone());
        self.runs.delete(range.clone());
        self.shift_selection_delete(&range);
        Ok(())
    }

    /// Apply a toolbar command to `range`.
    ///
    /// Header and alignment are line attributes and extend to the whole lines
    /// the range touches, including their newline.
    pub fn apply_format(
        &mut self,
        range: Range<usize>,
        command: &FormatCommand,
    ) -> Result<(), SurfaceError> {
        self.check_offset(range.end)?;
        let range = match command {
            FormatCommand::Header(_) | FormatCommand::Align(_) => self.line_range(range),
            _ => range,
        };
        if range.is_empty() {
            return Ok(());
        }
        let active = command.is_active_in(self.runs.overlapping(range.clone()));
        self.runs.apply(range, |f| command.apply(f, active));
        Ok(())
    }

    /// Insert `text` as a link to `href`.
    pub fn insert_link(&mut self, offset: usize, text: &str, href: &str) -> Result<(), SurfaceError> {
        let mut formatting = self.format_at(offset);
        FormatCommand::Link(Some(href.to_string())).apply(&mut formatting, false);
        self.insert_text(offset, text, &formatting)
    }

    fn line_range(&self, range: Range<usize>) -> Range<usize> {
        let len = self.text.len_chars();
        let mut start = range.start.min(len);
        while start > 0 && self.text.char_at(start - 1) != Some('\n') {
            start -= 1;
        }
        let mut end = range.end.min(len);
        while end < len && self.text.char_at(end) != Some('\n') {
            end += 1;
        }
        start..(end + 1).min(len)
    }

    pub fn to_delta(&self) -> Vec<DeltaOp> {
        let text = self.text.to_string();
        let mut chars = text.chars();
        let mut embeds = self.embeds.iter();
        let mut ops: Vec<DeltaOp> = Vec::new();

        for run in &self.runs.runs {
            let mut buf = String::new();
            for c in chars.by_ref().take(run.len) {
                if c == EMBED_CHAR {
                    flush_text(&mut ops, &mut buf, &run.formatting);
                    if let Some(embed) = embeds.next() {
                        ops.push(DeltaOp {
                            insert: DeltaInsert::Embed(embed.clone()),
                            attributes: run.formatting.clone(),
                        });
                    }
                } else {
                    buf.push(c);
                }
            }
            flush_text(&mut ops, &mut buf, &run.formatting);
        }
        ops
    }
}

fn flush_text(ops: &mut Vec<DeltaOp>, buf: &mut String, attributes: &Formatting) {
    if !buf.is_empty() {
        ops.push(DeltaOp {
            insert: DeltaInsert::Text(std::mem::take(buf)),
            attributes: attributes.clone(),
        });
    }
}

impl<T: TextBuffer> TextSurface for RichDocument<T> {
    fn selection(&self) -> Option<Selection> {
        self.selection
    }

    fn set_selection(&mut self, selection: Selection) -> Result<(), SurfaceError> {
        self.check_content_offset(selection.end())?;
        self.selection = Some(selection);
        Ok(())
    }

    /// Formatting of the char before `offset`, as typing there would inherit.
    fn format_at(&self, offset: usize) -> Formatting {
        let probe = offset.saturating_sub(1);
        let formatting = match self.text.char_at(probe) {
            // typing after an embed doesn't inherit its (empty) attributes
            Some(EMBED_CHAR) => None,
            _ => self.runs.at(probe),
        };
        formatting.cloned().unwrap_or_default()
    }

    fn insert_text(
        &mut self,
        offset: usize,
        text: &str,
        formatting: &Formatting,
    ) -> Result<(), SurfaceError> {
        self.check_content_offset(offset)?;
        let text: String = text.chars().filter(|c| *c != EMBED_CHAR).collect();
        let len = text.chars().count();
        if len == 0 {
            return Ok(());
        }
        self.text.insert(offset, &text);
        self.runs.insert(offset, len, formatting.clone());
        self.shift_selection_insert(offset, len);
        Ok(())
    }

    fn insert_embed(&mut self, offset: usize, embed: &Embed) -> Result<(), SurfaceError> {
        self.check_content_offset(offset)?;
        let index = self.text.count_before(offset, EMBED_CHAR);
        self.text.insert(offset, &EMBED_CHAR.to_string());
        self.embeds.insert(index, embed.clone());
        self.runs.insert(offset, 1, Formatting::plain());
        self.shift_selection_insert(offset, 1);
        Ok(())
    }

    fn focus(&mut self) {
        self.focused = true;
    }

    fn len_chars(&self) -> usize {
        self.text.len_chars()
    }

    fn end_offset(&self) -> usize {
        self.text.len_chars().saturating_sub(1)
    }
}

/// Text with `[image]` / `[video]` placeholders for embeds.
impl<T: TextBuffer> fmt::Display for RichDocument<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut embeds = self.embeds.iter();
        for c in self.text.to_string().chars() {
            if c == EMBED_CHAR {
                let kind = embeds.next().map(Embed::kind).unwrap_or("embed");
                write!(f, "[{kind}]")?;
            } else {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

impl<T: TextBuffer> fmt::Debug for RichDocument<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RichDocument")
            .field("text", &self.to_string())
            .field("embeds", &self.embeds.len())
            .field("selection", &self.selection)
            .field("focused", &self.focused)
            .finish()
    }
}

impl From<&str> for RichDocument<EditorRope> {
    fn from(s: &str) -> Self {
        Self::from_text(s)
    }
}
