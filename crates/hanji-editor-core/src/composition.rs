//! IME composition tracking.
//!
//! During composition the user is building up characters (Hangul syllables,
//! kana) that the surface has not committed yet. Intervening in Enter while
//! that is happening moves the caret out from under the IME.

/// Composition state for one mounted surface.
///
/// Starts not composing. Transitions are plain assignments, so repeated
/// start or end signals are harmless.
#[derive(Debug, Clone, Default)]
pub struct CompositionTracker {
    composing: bool,
    /// Uncommitted preview text from the latest update.
    preview: String,
}

impl CompositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_composition_start(&mut self) {
        if self.composing {
            tracing::debug!("compositionstart while already composing");
        }
        self.composing = true;
        self.preview.clear();
    }

    /// Record the in-progress text. Does not change the composing flag: an
    /// update without a start is logged and otherwise ignored.
    pub fn on_composition_update(&mut self, data: &str) {
        if !self.composing {
            tracing::debug!("compositionupdate without active composition");
            return;
        }
        self.preview.clear();
        self.preview.push_str(data);
    }

    pub fn on_composition_end(&mut self) {
        self.composing = false;
        self.preview.clear();
    }

    /// Drop any in-progress composition (focus loss, Escape).
    pub fn cancel(&mut self) {
        if self.composing {
            tracing::debug!(preview = %self.preview, "cancelling active composition");
        }
        self.composing = false;
        self.preview.clear();
    }

    pub fn is_composing(&self) -> bool {
        self.composing
    }

    pub fn preview(&self) -> &str {
        &self.preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_idle() {
        let tracker = CompositionTracker::new();
        assert!(!tracker.is_composing());
        assert_eq!(tracker.preview(), "");
    }

    #[test]
    fn test_start_update_end() {
        let mut tracker = CompositionTracker::new();
        tracker.on_composition_start();
        assert!(tracker.is_composing());

        tracker.on_composition_update("ㅎ");
        tracker.on_composition_update("한");
        assert_eq!(tracker.preview(), "한");

        tracker.on_composition_end();
        assert!(!tracker.is_composing());
        assert_eq!(tracker.preview(), "");
    }

    #[test]
    fn test_end_is_idempotent() {
        let mut tracker = CompositionTracker::new();
        tracker.on_composition_start();
        tracker.on_composition_end();
        tracker.on_composition_end();
        assert!(!tracker.is_composing());

        // end without start never flips to composing
        let mut fresh = CompositionTracker::new();
        fresh.on_composition_end();
        assert!(!fresh.is_composing());
        assert_eq!(fresh.preview(), "");
    }

    #[test]
    fn test_update_without_start_ignored() {
        let mut tracker = CompositionTracker::new();
        tracker.on_composition_update("가");
        assert!(!tracker.is_composing());
        assert_eq!(tracker.preview(), "");
    }

    #[test]
    fn test_cancel() {
        let mut tracker = CompositionTracker::new();
        tracker.on_composition_start();
        tracker.on_composition_update("가");
        tracker.cancel();
        assert!(!tracker.is_composing());
        assert_eq!(tracker.preview(), "");
    }
}
