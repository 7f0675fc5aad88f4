//! The capability interface an editor widget exposes to the coordinator.
//!
//! Each underlying editor library gets one adapter implementing
//! `TextSurface`. The coordinator never reaches into the widget beyond these
//! operations.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::embed::Embed;
use crate::error::SurfaceError;
use crate::formatting::Formatting;
use crate::types::Selection;

/// Narrow editing capabilities of a mounted text surface.
///
/// Offsets are chars in the surface's linear content model, where every
/// embed counts as one char.
pub trait TextSurface {
    /// Current selection, or `None` if the surface has no caret (unfocused,
    /// never clicked).
    fn selection(&self) -> Option<Selection>;

    /// Move the selection. Offsets past the end are an error.
    fn set_selection(&mut self, selection: Selection) -> Result<(), SurfaceError>;

    /// Attributes in effect at `offset` (the formatting new text typed there
    /// would receive).
    fn format_at(&self, offset: usize) -> Formatting;

    /// Insert text at `offset` with the given formatting.
    fn insert_text(
        &mut self,
        offset: usize,
        text: &str,
        formatting: &Formatting,
    ) -> Result<(), SurfaceError>;

    /// Insert an embed at `offset`.
    fn insert_embed(&mut self, offset: usize, embed: &Embed) -> Result<(), SurfaceError>;

    /// Give the surface input focus.
    fn focus(&mut self);

    /// Content length in chars.
    fn len_chars(&self) -> usize;

    /// Last offset content can be inserted at, where "end of document"
    /// insertions go. Surfaces that keep a trailing newline return the
    /// offset before it.
    fn end_offset(&self) -> usize {
        self.len_chars()
    }
}

/// A surface shared between the host page and the coordinator.
pub type SharedSurface<S> = Rc<RefCell<S>>;

/// Non-owning handle used by deferred work.
///
/// Resolves only while the coordinator is mounted and the surface is alive,
/// so a task that fires after teardown touches nothing.
pub(crate) struct SurfaceLink<S> {
    surface: Weak<RefCell<S>>,
    mounted: Rc<Cell<bool>>,
}

impl<S> Clone for SurfaceLink<S> {
    fn clone(&self) -> Self {
        Self {
            surface: self.surface.clone(),
            mounted: self.mounted.clone(),
        }
    }
}

impl<S: TextSurface> SurfaceLink<S> {
    pub(crate) fn new(surface: &SharedSurface<S>, mounted: Rc<Cell<bool>>) -> Self {
        Self {
            surface: Rc::downgrade(surface),
            mounted,
        }
    }

    /// Run `f` against the surface, or report why it can't be reached.
    pub(crate) fn with_mut<R>(&self, f: impl FnOnce(&mut S) -> R) -> Result<R, SurfaceError> {
        if !self.mounted.get() {
            return Err(SurfaceError::Unmounted);
        }
        let surface = self.surface.upgrade().ok_or(SurfaceError::Unmounted)?;
        let mut guard = surface.try_borrow_mut().map_err(|_| SurfaceError::Busy)?;
        Ok(f(&mut guard))
    }

    pub(crate) fn with<R>(&self, f: impl FnOnce(&S) -> R) -> Result<R, SurfaceError> {
        if !self.mounted.get() {
            return Err(SurfaceError::Unmounted);
        }
        let surface = self.surface.upgrade().ok_or(SurfaceError::Unmounted)?;
        let guard = surface.try_borrow().map_err(|_| SurfaceError::Busy)?;
        Ok(f(&guard))
    }
}
