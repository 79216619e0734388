//! CPU opponent.
//!
//! The controller produces an [`InputSnapshot`] for its fighter each tick,
//! exactly as a human's device binding would. It thinks at an interval that
//! shrinks with difficulty and:
//! - Hovers in a strike band, creeping closer after landing damage
//! - Blocks an attacking opponent with a difficulty-scaled chance
//! - Picks attacks by distance with per-move cooldowns and combo pressure

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::clock::Millis;
use crate::fighter::Fighter;
use crate::input::{Button, InputSnapshot};
use crate::moves::AttackId;
use crate::round::MatchPhase;

/// Difficulty tuning for a CPU opponent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NpcConfig {
    /// Base difficulty from 0 to 1
    pub base_difficulty: f32,
    /// Added per round after the first
    pub round_ramp: f32,
    /// Added per round the opponent leads by
    pub rubber_band: f32,
    /// Random spread applied on every tick
    pub jitter: f32,
}

impl Default for NpcConfig {
    fn default() -> Self {
        Self {
            base_difficulty: 0.55,
            round_ramp: 0.08,
            rubber_band: 0.10,
            jitter: 0.03,
        }
    }
}

/// Distance-weighted attack choices.
const CLOSE_WEIGHTS: [(AttackId, u32); 4] = [
    (AttackId::R, 4),
    (AttackId::E, 3),
    (AttackId::T, 2),
    (AttackId::Y, 1),
];

const fn mid_weights(hard: bool) -> [(AttackId, u32); 4] {
    [
        (AttackId::T, if hard { 5 } else { 4 }),
        (AttackId::R, 2),
        (AttackId::E, 2),
        (AttackId::Y, 2),
    ]
}

const fn far_weights(hard: bool) -> [(AttackId, u32); 4] {
    [
        (AttackId::Y, if hard { 6 } else { 5 }),
        (AttackId::T, 3),
        (AttackId::R, 1),
        (AttackId::E, 1),
    ]
}

const fn base_cooldown_ms(attack: AttackId) -> i64 {
    match attack {
        AttackId::R => 520,
        AttackId::E => 560,
        AttackId::T => 650,
        AttackId::Y => 760,
    }
}

/// A CPU player.
#[derive(Debug, Clone)]
pub struct NpcController {
    config: NpcConfig,
    rng: fastrand::Rng,
    next_think: Millis,
    next_attack: Millis,
    next_block: Millis,
    move_hold_until: Millis,
    hold_dir: i32,
    last_attack: Option<AttackId>,
    combo_until: Millis,
    last_opp_health: i32,
}

impl NpcController {
    /// Creates a controller with a fixed RNG seed.
    #[must_use]
    pub fn new(config: NpcConfig, seed: u64) -> Self {
        let mut config = config;
        config.base_difficulty = config.base_difficulty.clamp(0.0, 1.0);
        Self {
            config,
            rng: fastrand::Rng::with_seed(seed),
            next_think: Millis::ZERO,
            next_attack: Millis::ZERO,
            next_block: Millis::ZERO,
            move_hold_until: Millis::ZERO,
            hold_dir: 0,
            last_attack: None,
            combo_until: Millis::ZERO,
            last_opp_health: crate::fighter::MAX_HEALTH,
        }
    }

    /// Changes the base difficulty (clamped to 0..=1).
    pub fn set_base_difficulty(&mut self, base: f32) {
        self.config.base_difficulty = base.clamp(0.0, 1.0);
    }

    /// Current configuration.
    #[must_use]
    pub const fn config(&self) -> &NpcConfig {
        &self.config
    }

    /// Effective difficulty for this tick.
    ///
    /// The base is curved so the top of the range bites harder, then later
    /// rounds and an opponent lead push it up.
    fn difficulty(&mut self, round: u8, wins: [u8; 2], me: &Fighter) -> f32 {
        let base = self.config.base_difficulty.clamp(0.0, 1.0).powf(0.70);
        let mine = i32::from(wins[me.slot().index()]);
        let theirs = i32::from(wins[me.slot().other().index()]);
        let jitter = (self.rng.f32() * 2.0 - 1.0) * self.config.jitter;
        let adapt = f32::from(round.saturating_sub(1)) * self.config.round_ramp
            + (theirs - mine) as f32 * self.config.rubber_band
            + jitter;
        (base + adapt).clamp(0.05, 0.98)
    }

    fn pick(&mut self, weights: &[(AttackId, u32)]) -> AttackId {
        let total: u32 = weights.iter().map(|(_, w)| w).sum();
        let mut roll = self.rng.u32(0..total.max(1));
        for (attack, weight) in weights {
            if roll < *weight {
                return *attack;
            }
            roll -= weight;
        }
        weights.first().map_or(AttackId::R, |(a, _)| *a)
    }

    /// Decides this tick's input for `me` against `opp`.
    ///
    /// Returns a neutral snapshot outside the fighting phase.
    pub fn think(
        &mut self,
        me: &Fighter,
        opp: &Fighter,
        now: Millis,
        round: u8,
        wins: [u8; 2],
        phase: MatchPhase,
    ) -> InputSnapshot {
        let mut keys = InputSnapshot::NEUTRAL;
        if !phase.is_fighting() {
            return keys;
        }

        // Movement holds persist between think ticks
        if now < self.move_hold_until {
            hold_direction(&mut keys, self.hold_dir);
        }

        let diff = self.difficulty(round, wins, me);
        let error = (1.0 - diff).powi(2);
        let think_ms = (260.0 - 210.0 * diff).max(55.0) as u64;

        if opp.health() < self.last_opp_health {
            self.combo_until = now.plus((650.0 + 550.0 * diff) as u64);
        }
        self.last_opp_health = opp.health();

        if now < self.next_think {
            return keys;
        }
        self.next_think = now.plus(think_ms);

        let dx = opp.rect().center_x() - me.rect().center_x();
        let dist = dx.abs();
        let toward = if dx > 0 { 1 } else { -1 };

        self.plan_movement(now, dist, toward, diff, error);
        keys = InputSnapshot::NEUTRAL;
        hold_direction(&mut keys, self.hold_dir);

        self.plan_block(&mut keys, me, opp, now, dist, diff, error);
        self.plan_attack(&mut keys, opp, now, dist, diff, error);

        trace!("CPU {} think: dist {} diff {:.2}", me.slot(), dist, diff);
        keys
    }

    fn plan_movement(&mut self, now: Millis, dist: i32, toward: i32, diff: f32, error: f32) {
        self.hold_dir = 0;
        let in_combo = now < self.combo_until;

        let mut optimal_min = 95 + (20.0 * (1.0 - diff)) as i32;
        let mut optimal_max = 150 + (10.0 * (1.0 - diff)) as i32;
        if in_combo {
            optimal_min = (optimal_min - 15).max(70);
            optimal_max = (optimal_max - 15).max(optimal_min + 25);
        }

        let attack_ready_soon = now.plus(120) >= self.next_attack;
        let far_gap = optimal_max + if diff < 0.45 { 95 } else { 75 };
        let hold = |base: f32, spread: f32| now.plus((base + spread * error) as u64);

        if dist > far_gap {
            self.hold_dir = toward;
            self.move_hold_until = hold(200.0, 160.0);
        } else if dist > optimal_max {
            self.hold_dir = toward;
            let step = if attack_ready_soon { 110.0 } else { 85.0 };
            self.move_hold_until = hold(step, 80.0);
        } else if dist < optimal_min {
            // Back off rather than face-hug
            self.hold_dir = -toward;
            self.move_hold_until = hold(95.0, 90.0);
        } else if diff > 0.70 && self.rng.f32() < 0.22 {
            if !attack_ready_soon && self.rng.f32() < 0.35 + 0.25 * diff {
                // Bait a whiff
                self.hold_dir = -toward;
                self.move_hold_until = hold(70.0, 60.0);
            } else if attack_ready_soon
                && dist > (optimal_min + optimal_max) / 2
                && self.rng.f32() < 0.55
            {
                self.hold_dir = toward;
                self.move_hold_until = hold(60.0, 50.0);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn plan_block(
        &mut self,
        keys: &mut InputSnapshot,
        me: &Fighter,
        opp: &Fighter,
        now: Millis,
        dist: i32,
        diff: f32,
        error: f32,
    ) {
        if now < self.next_block || dist >= 190 {
            return;
        }
        let me_stunned = me.hitstun_until().is_active(now);
        let opp_stunned = opp.hitstun_until().is_active(now);

        if !me_stunned && opp.is_attacking() && !opp_stunned {
            let chance = (0.18 + 0.78 * diff) * (1.0 - 0.85 * error);
            if self.rng.f32() < chance {
                keys.set(Button::Block, true);
                // Hold it a little so the pose does not flicker
                let hold = if diff > 0.75 {
                    220.0 - 120.0 * diff
                } else {
                    260.0 - 110.0 * diff
                };
                self.next_block = now.plus(hold as u64);
            }
        } else {
            self.next_block = now.plus((300.0 - 110.0 * diff) as u64);
        }
    }

    fn plan_attack(
        &mut self,
        keys: &mut InputSnapshot,
        opp: &Fighter,
        now: Millis,
        dist: i32,
        diff: f32,
        error: f32,
    ) {
        if now < self.next_attack || dist >= 175 || keys.held(Button::Block) {
            return;
        }

        let in_combo = now < self.combo_until;
        let pressure = in_combo || opp.hitstun_until().is_active(now);
        let mut aggression = 0.20 + 0.55 * diff;
        if pressure {
            aggression += 0.20 + 0.15 * diff;
        }
        if opp.blockstun_until().is_active(now) && self.rng.f32() < 0.20 + 0.30 * diff {
            aggression *= 0.65;
        }
        if self.rng.f32() >= aggression * (1.0 - 0.55 * error) {
            return;
        }

        let hard = diff > 0.70;
        let weights = if dist < 90 {
            CLOSE_WEIGHTS
        } else if dist < 130 {
            mid_weights(hard)
        } else {
            far_weights(hard)
        };

        let mut which = self.pick(&weights);
        if !in_combo && self.last_attack == Some(which) && self.rng.f32() < 0.70 - 0.35 * diff {
            which = self.pick(&weights);
        }
        keys.set(Button::for_attack(which), true);
        self.last_attack = Some(which);

        let combo_bonus = if pressure { 180 + (120.0 * diff) as i64 } else { 0 };
        let cooldown = base_cooldown_ms(which) - (260.0 * diff) as i64 - combo_bonus
            + self.rng.i64(-60..=60);
        self.next_attack = now.plus(cooldown.max(120).unsigned_abs());
    }
}

fn hold_direction(keys: &mut InputSnapshot, dir: i32) {
    match dir.signum() {
        -1 => keys.set(Button::Left, true),
        1 => keys.set(Button::Right, true),
        _ => {}
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fighter::fixtures::Arena;
    use kombat_common::PlayerSlot;

    fn cpu(base: f32) -> NpcController {
        NpcController::new(
            NpcConfig {
                base_difficulty: base,
                ..NpcConfig::default()
            },
            7,
        )
    }

    #[test]
    fn test_neutral_outside_fighting() {
        let arena = Arena::new();
        let (p1, p2) = arena.close_pair();
        let mut npc = cpu(0.9);
        for phase in [MatchPhase::Intro, MatchPhase::RoundOver, MatchPhase::MatchOver] {
            let keys = npc.think(&p2, &p1, Millis(1000), 1, [0, 0], phase);
            assert!(keys.is_neutral());
        }
    }

    #[test]
    fn test_closes_distance_when_far() {
        let arena = Arena::new();
        let mut p1 = arena.fighter(PlayerSlot::One, "nate");
        let mut p2 = arena.fighter(PlayerSlot::Two, "nate");
        p1.rect.x = 0;
        p2.rect.x = 700;
        let mut npc = cpu(0.5);
        let keys = npc.think(&p2, &p1, Millis(0), 1, [0, 0], MatchPhase::Fighting);
        assert!(keys.held(Button::Left));
        assert!(!keys.held(Button::Right));

        // The hold persists between think ticks
        let keys = npc.think(&p2, &p1, Millis(30), 1, [0, 0], MatchPhase::Fighting);
        assert!(keys.held(Button::Left));
    }

    #[test]
    fn test_backs_off_when_too_close() {
        let arena = Arena::new();
        let mut p1 = arena.fighter(PlayerSlot::One, "nate");
        let mut p2 = arena.fighter(PlayerSlot::Two, "nate");
        p1.rect.x = 300;
        p2.rect.x = 320;
        let mut npc = cpu(0.5);
        let keys = npc.think(&p2, &p1, Millis(0), 1, [0, 0], MatchPhase::Fighting);
        assert!(keys.held(Button::Right));
    }

    #[test]
    fn test_difficulty_is_clamped_and_ramps() {
        let arena = Arena::new();
        let (_, p2) = arena.close_pair();
        let mut easy = cpu(0.0);
        let d = easy.difficulty(1, [0, 0], &p2);
        assert!((0.05..=0.1).contains(&d), "got {d}");

        let mut hard = cpu(1.0);
        assert!(hard.difficulty(3, [1, 0], &p2) <= 0.98);

        let mut mid = cpu(0.5);
        let first = mid.difficulty(1, [0, 0], &p2);
        let later = mid.difficulty(3, [1, 0], &p2);
        assert!(later > first);
    }

    #[test]
    fn test_attacks_in_range_eventually() {
        let arena = Arena::new();
        let mut p1 = arena.fighter(PlayerSlot::One, "nate");
        let mut p2 = arena.fighter(PlayerSlot::Two, "nate");
        p1.rect.x = 300;
        p2.rect.x = 420;
        let mut npc = cpu(1.0);
        let attacked = (0..200).any(|i| {
            let keys = npc.think(&p2, &p1, Millis(i * 16), 1, [0, 0], MatchPhase::Fighting);
            AttackId::ALL
                .iter()
                .any(|a| keys.held(Button::for_attack(*a)))
        });
        assert!(attacked);
    }

    #[test]
    fn test_blocks_attacking_opponent() {
        let arena = Arena::new();
        let (mut p1, mut p2) = arena.close_pair();
        p1.update(
            &InputSnapshot::NEUTRAL.with(Button::AttackE),
            &mut p2,
            &arena.ctx(0),
        );
        assert!(p1.is_attacking());
        p2.rect.x = p1.rect.x + 120;
        let mut npc = cpu(1.0);
        let blocked = (0..50).any(|i| {
            npc.think(&p2, &p1, Millis(i * 16), 1, [0, 0], MatchPhase::Fighting)
                .held(Button::Block)
        });
        assert!(blocked);
    }

    #[test]
    fn test_same_seed_same_choices() {
        let arena = Arena::new();
        let (p1, p2) = arena.close_pair();
        let mut a = cpu(0.7);
        let mut b = cpu(0.7);
        for i in 0..100 {
            let now = Millis(i * 16);
            assert_eq!(
                a.think(&p2, &p1, now, 2, [1, 0], MatchPhase::Fighting),
                b.think(&p2, &p1, now, 2, [1, 0], MatchPhase::Fighting)
            );
        }
    }
}
