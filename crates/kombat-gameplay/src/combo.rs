//! Hit-confirmed attack chaining.
//!
//! A fighter with a [`ComboConfig`] may queue a different standing attack
//! near the end of the current one, provided its last hit landed recently.
//! The queued attack starts the moment the current clip finishes.

use serde::{Deserialize, Serialize};

use crate::clock::{Deadline, Millis};
use crate::input::{Button, InputState};
use crate::moves::AttackId;

/// Combo timing window configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComboConfig {
    /// How long after a landed hit a follow-up may be queued and started
    pub window_ms: u64,
    /// Fraction of the current clip after which input is buffered
    pub cancel_from_frac: f32,
    /// Longest chain that may still queue a follow-up
    pub max_chain: u8,
    /// Chain length from which starting a follow-up arms the cooldown
    pub cooldown_after_chain: u8,
    /// Lockout on fresh attacks after a long chain
    pub cooldown_ms: u64,
    /// A hit arriving later than this after the previous one restarts the chain
    pub chain_gap_ms: u64,
    /// Idle time after which chain state is forgotten
    pub stale_ms: u64,
}

impl Default for ComboConfig {
    fn default() -> Self {
        Self {
            window_ms: 450,
            cancel_from_frac: 0.6,
            max_chain: 3,
            cooldown_after_chain: 2,
            cooldown_ms: 220,
            chain_gap_ms: 800,
            stale_ms: 900,
        }
    }
}

impl ComboConfig {
    /// First frame index of the buffering window for a clip of `len` frames.
    #[must_use]
    pub fn cancel_from(&self, len: usize) -> usize {
        (len as f32 * self.cancel_from_frac) as usize
    }
}

/// State of a fighter's combo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComboState {
    /// Hits landed in the current chain
    pub chain: u8,
    /// Longest chain this round
    pub best_chain: u8,
    last_hit: Option<Millis>,
    queued: Option<AttackId>,
    cooldown: Deadline,
}

impl ComboState {
    /// Create new combo state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn since_last_hit(&self, now: Millis) -> Option<u64> {
        self.last_hit.map(|t| now.since(t))
    }

    fn in_window(&self, now: Millis, config: &ComboConfig) -> bool {
        self.since_last_hit(now)
            .is_some_and(|dt| dt <= config.window_ms)
    }

    /// Records a landed hit.
    pub fn register_hit(&mut self, now: Millis, config: &ComboConfig) {
        if self
            .since_last_hit(now)
            .map_or(true, |dt| dt > config.chain_gap_ms)
        {
            self.chain = 0;
        }
        self.last_hit = Some(now);
        self.chain = self.chain.saturating_add(1);
        self.best_chain = self.best_chain.max(self.chain);
    }

    /// Buffers a follow-up while an attack plays.
    ///
    /// The first freshly pressed attack other than `current` is queued when
    /// the clip is inside its buffering window and the chain is still open.
    pub fn try_queue(
        &mut self,
        now: Millis,
        config: &ComboConfig,
        current: AttackId,
        clip_index: usize,
        clip_len: usize,
        input: &InputState,
    ) {
        if self.cooldown.is_active(now) {
            return;
        }
        let can_chain = self.in_window(now, config) && self.chain < config.max_chain;
        let in_cancel = clip_len > 0 && clip_index >= config.cancel_from(clip_len);
        if !(can_chain && in_cancel) {
            return;
        }
        if let Some(next) = AttackId::ALL
            .into_iter()
            .find(|a| *a != current && input.just_pressed(Button::for_attack(*a)))
        {
            self.queued = Some(next);
        }
    }

    /// Takes the queued follow-up once the current attack ends.
    ///
    /// Returns `None` when nothing is queued or the hit-confirm window closed.
    pub fn take_followup(&mut self, now: Millis, config: &ComboConfig) -> Option<AttackId> {
        let queued = self.queued.take()?;
        if !self.in_window(now, config) {
            return None;
        }
        if self.chain >= config.cooldown_after_chain {
            self.cooldown.extend(now, config.cooldown_ms);
        }
        Some(queued)
    }

    /// Returns true while fresh attack starts are locked out.
    #[must_use]
    pub fn on_cooldown(&self, now: Millis) -> bool {
        self.cooldown.is_active(now)
    }

    /// Forgets the chain after a long pause between hits.
    pub fn expire_stale(&mut self, now: Millis, config: &ComboConfig) {
        if self
            .since_last_hit(now)
            .map_or(true, |dt| dt > config.stale_ms)
        {
            self.chain = 0;
            self.queued = None;
        }
    }

    /// Queued follow-up, if any.
    #[must_use]
    pub const fn queued(&self) -> Option<AttackId> {
        self.queued
    }

    /// Moves stored times forward after a pause.
    pub fn shift(&mut self, ms: u64) {
        if let Some(t) = self.last_hit {
            self.last_hit = Some(t.plus(ms));
        }
        self.cooldown.shift(ms);
    }

    /// Reset combo.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputSnapshot;

    fn pressed(button: Button) -> InputState {
        let mut input = InputState::new();
        input.update(&InputSnapshot::NEUTRAL.with(button));
        input
    }

    #[test]
    fn test_chain_counts_and_restarts_after_gap() {
        let config = ComboConfig::default();
        let mut combo = ComboState::new();
        combo.register_hit(Millis(1000), &config);
        combo.register_hit(Millis(1300), &config);
        assert_eq!(combo.chain, 2);

        combo.register_hit(Millis(2200), &config);
        assert_eq!(combo.chain, 1);
        assert_eq!(combo.best_chain, 2);
    }

    #[test]
    fn test_queue_requires_window_and_cancel_frame() {
        let config = ComboConfig::default();
        let mut combo = ComboState::new();
        let input = pressed(Button::AttackT);

        // No hit yet
        combo.try_queue(Millis(100), &config, AttackId::E, 5, 6, &input);
        assert_eq!(combo.queued(), None);

        combo.register_hit(Millis(100), &config);
        // Too early in the clip (cancel_from = 3)
        combo.try_queue(Millis(150), &config, AttackId::E, 2, 6, &input);
        assert_eq!(combo.queued(), None);

        combo.try_queue(Millis(150), &config, AttackId::E, 3, 6, &input);
        assert_eq!(combo.queued(), Some(AttackId::T));
    }

    #[test]
    fn test_same_attack_is_not_queued() {
        let config = ComboConfig::default();
        let mut combo = ComboState::new();
        combo.register_hit(Millis(0), &config);
        combo.try_queue(Millis(10), &config, AttackId::R, 4, 5, &pressed(Button::AttackR));
        assert_eq!(combo.queued(), None);
    }

    #[test]
    fn test_followup_arms_cooldown_after_two_hits() {
        let config = ComboConfig::default();
        let mut combo = ComboState::new();
        combo.register_hit(Millis(0), &config);
        combo.register_hit(Millis(100), &config);
        combo.try_queue(Millis(150), &config, AttackId::R, 4, 5, &pressed(Button::AttackY));

        assert_eq!(combo.take_followup(Millis(200), &config), Some(AttackId::Y));
        assert!(combo.on_cooldown(Millis(300)));
        assert!(!combo.on_cooldown(Millis(420)));
    }

    #[test]
    fn test_followup_dropped_outside_window() {
        let config = ComboConfig::default();
        let mut combo = ComboState::new();
        combo.register_hit(Millis(0), &config);
        combo.try_queue(Millis(100), &config, AttackId::R, 4, 5, &pressed(Button::AttackE));
        assert_eq!(combo.take_followup(Millis(600), &config), None);
        assert_eq!(combo.queued(), None);
    }

    #[test]
    fn test_stale_chain_expires() {
        let config = ComboConfig::default();
        let mut combo = ComboState::new();
        combo.register_hit(Millis(0), &config);
        combo.expire_stale(Millis(500), &config);
        assert_eq!(combo.chain, 1);
        combo.expire_stale(Millis(901), &config);
        assert_eq!(combo.chain, 0);
    }
}
