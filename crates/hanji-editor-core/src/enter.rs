//! Enter key interception.
//!
//! Mobile browsers handle Enter inconsistently while an East Asian IME is
//! active: the surface's own newline can be inserted twice, or the caret jumps
//! back before the new line. When nothing is being composed the coordinator
//! inserts the newline itself and suppresses the surface's handling.

use crate::composition::CompositionTracker;
use crate::config::GuardConfig;
use crate::platform::Platform;
use crate::types::{Key, KeyEvent, Selection};

/// What should happen to an Enter key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnterAction {
    /// The newline was inserted manually; the caller must prevent the
    /// surface's default handling.
    Suppress,
    /// Classification only: a newline should be inserted at `offset`.
    /// `InputCoordinator::on_enter_key` acts on this and reports `Suppress`.
    InsertNewlineManually { offset: usize },
    /// Let the surface (and IME) handle the key normally.
    Default,
}

impl EnterAction {
    /// Whether the caller must call `preventDefault` (or equivalent).
    pub fn prevents_default(&self) -> bool {
        matches!(self, EnterAction::Suppress)
    }
}

/// Decides whether an Enter press is intercepted.
///
/// Plain Enter and Shift+Enter are treated identically since both must
/// produce a newline.
#[derive(Debug, Clone, Copy)]
pub struct EnterPolicy {
    active: bool,
}

impl EnterPolicy {
    /// Build from config for the given platform.
    pub fn new(config: &GuardConfig, platform: &Platform) -> Self {
        let active = config.enter_workaround.applies_to(platform);
        if !active {
            tracing::debug!(
                mode = ?config.enter_workaround,
                "enter workaround not active on this platform"
            );
        }
        Self { active }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Classify `event`.
    ///
    /// `current_selection` is only consulted when the event carries no offset.
    pub fn classify(
        &self,
        composition: &CompositionTracker,
        event: &KeyEvent,
        current_selection: impl FnOnce() -> Option<Selection>,
    ) -> EnterAction {
        if event.key != Key::Enter || event.has_command_modifier() || !self.active {
            return EnterAction::Default;
        }

        // Intervening mid-composition is what causes the caret jump.
        if composition.is_composing() {
            tracing::debug!("enter during composition - delegating to surface");
            return EnterAction::Default;
        }

        match event.offset.or_else(|| current_selection().map(|s| s.start())) {
            Some(offset) => EnterAction::InsertNewlineManually { offset },
            None => {
                tracing::debug!("enter with no resolvable caret - delegating to surface");
                EnterAction::Default
            }
        }
    }
}
