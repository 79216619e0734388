//! Logical fighter input.
//!
//! The combat core never sees devices. Glue code maps keys or pads to an
//! [`InputSnapshot`] per fighter per tick, and each fighter latches it into
//! an [`InputState`] once at the top of its update to derive press edges.

use serde::{Deserialize, Serialize};

use crate::moves::AttackId;

/// Logical buttons a fighter reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    /// Walk towards -x
    Left,
    /// Walk towards +x
    Right,
    /// Jump
    Jump,
    /// Crouch (Low stance)
    Crouch,
    /// Block
    Block,
    /// R attack
    AttackR,
    /// E attack
    AttackE,
    /// T attack
    AttackT,
    /// Y attack
    AttackY,
}

impl Button {
    /// Every button, in index order.
    pub const ALL: [Self; 9] = [
        Self::Left,
        Self::Right,
        Self::Jump,
        Self::Crouch,
        Self::Block,
        Self::AttackR,
        Self::AttackE,
        Self::AttackT,
        Self::AttackY,
    ];

    const fn index(self) -> usize {
        self as usize
    }

    /// Button that triggers `attack`.
    #[must_use]
    pub const fn for_attack(attack: AttackId) -> Self {
        match attack {
            AttackId::R => Self::AttackR,
            AttackId::E => Self::AttackE,
            AttackId::T => Self::AttackT,
            AttackId::Y => Self::AttackY,
        }
    }
}

/// Held state of every logical button for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InputSnapshot {
    held: [bool; 9],
}

impl InputSnapshot {
    /// Nothing held.
    pub const NEUTRAL: Self = Self { held: [false; 9] };

    /// Returns true if `button` is held.
    #[must_use]
    pub const fn held(&self, button: Button) -> bool {
        self.held[button.index()]
    }

    /// Sets the held state of `button`.
    pub fn set(&mut self, button: Button, held: bool) {
        self.held[button.index()] = held;
    }

    /// Builder form of [`set`](Self::set) that presses `button`.
    #[must_use]
    pub const fn with(mut self, button: Button) -> Self {
        self.held[button.index()] = true;
        self
    }

    /// Returns true if no button is held.
    #[must_use]
    pub fn is_neutral(&self) -> bool {
        self.held.iter().all(|h| !h)
    }
}

/// State of one button across ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonState {
    /// Held this tick
    pub pressed: bool,
    /// Went down this tick
    pub just_pressed: bool,
    /// Went up this tick
    pub just_released: bool,
}

impl ButtonState {
    /// Latches this tick's held value.
    pub fn update(&mut self, is_pressed: bool) {
        self.just_pressed = is_pressed && !self.pressed;
        self.just_released = !is_pressed && self.pressed;
        self.pressed = is_pressed;
    }
}

/// Per-fighter edge latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputState {
    buttons: [ButtonState; 9],
}

impl InputState {
    /// Creates a latch with nothing held.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Latches a snapshot. Call exactly once per tick.
    pub fn update(&mut self, snapshot: &InputSnapshot) {
        for button in Button::ALL {
            self.buttons[button.index()].update(snapshot.held(button));
        }
    }

    /// Forgets every held button, so buttons still down after a pause or
    /// round change need a fresh press.
    pub fn reset_to(&mut self, snapshot: &InputSnapshot) {
        for button in Button::ALL {
            self.buttons[button.index()] = ButtonState {
                pressed: snapshot.held(button),
                just_pressed: false,
                just_released: false,
            };
        }
    }

    /// Held this tick.
    #[must_use]
    pub const fn held(&self, button: Button) -> bool {
        self.buttons[button.index()].pressed
    }

    /// Pressed this tick but not last tick.
    #[must_use]
    pub const fn just_pressed(&self, button: Button) -> bool {
        self.buttons[button.index()].just_pressed
    }

    /// Horizontal intent: -1, 0 or 1. Both or neither held is 0.
    #[must_use]
    pub const fn horizontal(&self) -> i32 {
        match (self.held(Button::Left), self.held(Button::Right)) {
            (true, false) => -1,
            (false, true) => 1,
            _ => 0,
        }
    }

    /// First attack (in R, E, T, Y order) whose button went down this tick.
    #[must_use]
    pub fn attack_pressed(&self) -> Option<AttackId> {
        AttackId::ALL
            .into_iter()
            .find(|a| self.just_pressed(Button::for_attack(*a)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_builder() {
        let snap = InputSnapshot::NEUTRAL.with(Button::Left).with(Button::AttackT);
        assert!(snap.held(Button::Left));
        assert!(snap.held(Button::AttackT));
        assert!(!snap.held(Button::Right));
        assert!(!snap.is_neutral());
        assert!(InputSnapshot::default().is_neutral());
    }

    #[test]
    fn test_edges() {
        let mut state = InputState::new();
        let jump = InputSnapshot::NEUTRAL.with(Button::Jump);

        state.update(&jump);
        assert!(state.just_pressed(Button::Jump));

        state.update(&jump);
        assert!(state.held(Button::Jump));
        assert!(!state.just_pressed(Button::Jump));

        state.update(&InputSnapshot::NEUTRAL);
        assert!(!state.held(Button::Jump));
    }

    #[test]
    fn test_reset_requires_fresh_press() {
        let mut state = InputState::new();
        let held = InputSnapshot::NEUTRAL.with(Button::AttackR);
        state.reset_to(&held);
        state.update(&held);
        assert!(!state.just_pressed(Button::AttackR));
    }

    #[test]
    fn test_horizontal() {
        let mut state = InputState::new();
        state.update(&InputSnapshot::NEUTRAL.with(Button::Left).with(Button::Right));
        assert_eq!(state.horizontal(), 0);
        state.update(&InputSnapshot::NEUTRAL.with(Button::Right));
        assert_eq!(state.horizontal(), 1);
    }

    #[test]
    fn test_attack_priority() {
        let mut state = InputState::new();
        state.update(&InputSnapshot::NEUTRAL.with(Button::AttackY).with(Button::AttackE));
        assert_eq!(state.attack_pressed(), Some(AttackId::E));
    }
}
