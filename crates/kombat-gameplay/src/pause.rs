//! Pause state handling.
//!
//! This module manages fight pausing:
//! - Freeze fighter updates while paused
//! - Nested pause reasons (menu over editor, focus loss over menu)
//! - Track paused time so deadlines can be shifted on resume

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::clock::Millis;

// ============================================================================
// Pause State
// ============================================================================

/// Why the fight is frozen, if it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PauseReason {
    /// Running.
    #[default]
    NotPaused,
    /// Pause menu opened by a player.
    PlayerPaused,
    /// Hitbox editor open; fighters hold their current frame.
    HitboxEditor,
    /// Window lost focus.
    FocusLost,
}

impl PauseReason {
    /// Whether this reason freezes the fight.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        !matches!(self, Self::NotPaused)
    }

    /// Check if the hitbox editor owns the frame.
    #[must_use]
    pub const fn editor_active(&self) -> bool {
        matches!(self, Self::HitboxEditor)
    }

    /// Banner text shown over the frozen fight.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::NotPaused => "",
            Self::PlayerPaused => "PAUSED",
            Self::HitboxEditor => "HITBOX EDITOR",
            Self::FocusLost => "PAUSED - Click to resume",
        }
    }
}

// ============================================================================
// Pause Manager
// ============================================================================

/// Nested pause reasons plus the wall time spent frozen.
#[derive(Debug)]
pub struct PauseManager {
    reason: PauseReason,
    /// Reasons buried under the current one
    pause_stack: Vec<PauseReason>,
    /// Start of the pause in progress
    pause_start: Option<Millis>,
    /// Completed pauses, summed
    total_paused_ms: u64,
    pause_on_focus_loss: bool,
}

impl Default for PauseManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PauseManager {
    /// A running (unpaused) manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            reason: PauseReason::NotPaused,
            pause_stack: Vec::new(),
            pause_start: None,
            total_paused_ms: 0,
            pause_on_focus_loss: true,
        }
    }

    /// Topmost pause reason.
    #[must_use]
    pub fn reason(&self) -> PauseReason {
        self.reason
    }

    /// Whether any reason is active.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.reason.is_paused()
    }

    /// Total paused time including the pause in progress.
    #[must_use]
    pub fn total_paused_ms(&self, now: Millis) -> u64 {
        self.total_paused_ms + self.current_pause_ms(now)
    }

    /// Length of the pause in progress.
    #[must_use]
    pub fn current_pause_ms(&self, now: Millis) -> u64 {
        self.pause_start.map_or(0, |s| now.since(s))
    }

    /// Whether losing focus should freeze the fight.
    pub fn set_pause_on_focus_loss(&mut self, enabled: bool) {
        self.pause_on_focus_loss = enabled;
    }

    /// Pushes `reason`, starting the pause clock if the fight was running.
    pub fn pause(&mut self, reason: PauseReason, now: Millis) {
        if !reason.is_paused() {
            return;
        }
        if reason == PauseReason::FocusLost && !self.pause_on_focus_loss {
            return;
        }

        if !self.is_paused() {
            self.pause_start = Some(now);
            info!("Paused ({:?})", reason);
        }

        if self.reason != reason && self.reason.is_paused() {
            self.pause_stack.push(self.reason);
        }

        self.reason = reason;
    }

    /// Pops the topmost reason.
    ///
    /// Returns the completed pause length once no reason is left.
    pub fn resume(&mut self, now: Millis) -> Option<u64> {
        self.resume_from(self.reason, now)
    }

    /// Removes `reason` wherever it sits in the stack.
    ///
    /// Returns the completed pause length once no reason is left.
    pub fn resume_from(&mut self, reason: PauseReason, now: Millis) -> Option<u64> {
        if !reason.is_paused() {
            return None;
        }
        if self.reason != reason {
            self.pause_stack.retain(|r| *r != reason);
            return None;
        }

        if let Some(prev_reason) = self.pause_stack.pop() {
            self.reason = prev_reason;
            None
        } else {
            self.complete_resume(now)
        }
    }

    /// Drops every reason at once.
    pub fn force_resume(&mut self, now: Millis) -> Option<u64> {
        self.pause_stack.clear();
        if self.is_paused() {
            self.complete_resume(now)
        } else {
            None
        }
    }

    fn complete_resume(&mut self, now: Millis) -> Option<u64> {
        let paused = self.pause_start.take().map(|start| now.since(start));
        if let Some(ms) = paused {
            self.total_paused_ms += ms;
            info!("Resumed after {}ms", ms);
        }
        self.reason = PauseReason::NotPaused;
        paused
    }

    /// Opens or closes the pause menu.
    pub fn toggle_pause(&mut self, now: Millis) -> Option<u64> {
        if self.reason == PauseReason::PlayerPaused {
            self.resume_from(PauseReason::PlayerPaused, now)
        } else {
            if !self.is_paused() {
                self.pause(PauseReason::PlayerPaused, now);
            }
            None
        }
    }

    /// Toggle the hitbox editor.
    pub fn toggle_editor(&mut self, now: Millis) -> Option<u64> {
        if self.reason == PauseReason::HitboxEditor {
            self.resume_from(PauseReason::HitboxEditor, now)
        } else {
            self.pause(PauseReason::HitboxEditor, now);
            None
        }
    }

    /// Pauses on focus loss and lifts that reason on focus gain.
    pub fn on_focus_change(&mut self, focused: bool, now: Millis) -> Option<u64> {
        if focused {
            self.resume_from(PauseReason::FocusLost, now)
        } else {
            self.pause(PauseReason::FocusLost, now);
            None
        }
    }

    /// Forgets accumulated pause time for a rematch.
    pub fn reset_timing(&mut self) {
        self.total_paused_ms = 0;
        self.pause_start = None;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_reason_default() {
        let reason = PauseReason::default();
        assert!(!reason.is_paused());
        assert!(!reason.editor_active());
        assert_eq!(reason.message(), "");
        assert_eq!(PauseReason::HitboxEditor.message(), "HITBOX EDITOR");
    }

    #[test]
    fn test_pause_and_resume_reports_duration() {
        let mut manager = PauseManager::new();

        manager.pause(PauseReason::PlayerPaused, Millis(1000));
        assert!(manager.is_paused());
        assert_eq!(manager.current_pause_ms(Millis(1400)), 400);

        assert_eq!(manager.resume(Millis(1500)), Some(500));
        assert!(!manager.is_paused());
        assert_eq!(manager.total_paused_ms(Millis(9000)), 500);
    }

    #[test]
    fn test_toggle_pause() {
        let mut manager = PauseManager::new();

        assert_eq!(manager.toggle_pause(Millis(0)), None);
        assert_eq!(manager.reason(), PauseReason::PlayerPaused);

        assert_eq!(manager.toggle_pause(Millis(50)), Some(50));
        assert!(!manager.is_paused());
    }

    #[test]
    fn test_pause_stack() {
        let mut manager = PauseManager::new();

        manager.pause(PauseReason::HitboxEditor, Millis(0));
        manager.pause(PauseReason::PlayerPaused, Millis(100));
        assert_eq!(manager.reason(), PauseReason::PlayerPaused);

        // Popping back to the editor does not end the pause
        assert_eq!(manager.resume(Millis(200)), None);
        assert_eq!(manager.reason(), PauseReason::HitboxEditor);
        assert!(manager.reason().editor_active());

        // Whole pause measured from the first reason
        assert_eq!(manager.toggle_editor(Millis(300)), Some(300));
    }

    #[test]
    fn test_resume_buried_reason() {
        let mut manager = PauseManager::new();
        manager.pause(PauseReason::FocusLost, Millis(0));
        manager.pause(PauseReason::PlayerPaused, Millis(10));
        assert_eq!(manager.on_focus_change(true, Millis(20)), None);
        assert_eq!(manager.resume(Millis(30)), Some(30));
    }

    #[test]
    fn test_focus_loss_setting() {
        let mut manager = PauseManager::new();
        manager.set_pause_on_focus_loss(false);
        manager.on_focus_change(false, Millis(0));
        assert!(!manager.is_paused());
    }

    #[test]
    fn test_force_resume() {
        let mut manager = PauseManager::new();
        manager.pause(PauseReason::FocusLost, Millis(0));
        manager.pause(PauseReason::PlayerPaused, Millis(5));
        assert_eq!(manager.force_resume(Millis(40)), Some(40));
        assert!(!manager.is_paused());
        assert_eq!(manager.force_resume(Millis(50)), None);
    }
}
