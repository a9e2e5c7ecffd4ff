//! Single-slot undo for dose marks.
//!
//! Only the state immediately before the most recent mark is kept. Marking
//! the same dose twice in a row means undo restores the state between the
//! two marks, not the state before the first one.

use crate::dose_log::DoseLog;
use crate::types::{DoseKey, LastAction};
use uuid::Uuid;

#[derive(Clone, Debug, Default)]
pub struct UndoBuffer {
    last: Option<LastAction>,
}

impl UndoBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the buffer from a persisted capture
    pub fn from_last_action(last: Option<LastAction>) -> Self {
        Self { last }
    }

    /// Record the current state of `key` in `log`, replacing any earlier capture
    pub fn capture_before_mark(&mut self, log: &DoseLog, key: DoseKey) -> LastAction {
        let action = LastAction {
            key,
            previous: log.status(&key),
        };
        self.last = Some(action);
        action
    }

    /// Restore the captured state into `log` and clear the slot.
    ///
    /// Returns the action that was undone, or `None` if nothing was captured.
    pub fn undo(&mut self, log: &mut DoseLog) -> Option<LastAction> {
        let action = self.last.take()?;
        log.restore(action.key, action.previous);
        Some(action)
    }

    /// Drop the capture if it refers to `medication_id`
    pub fn forget_medication(&mut self, medication_id: Uuid) -> bool {
        if self
            .last
            .is_some_and(|a| a.key.medication_id == medication_id)
        {
            self.last = None;
            return true;
        }
        false
    }

    pub fn last_action(&self) -> Option<LastAction> {
        self.last
    }
}
