//! Fight orchestration.
//!
//! [`Fight`] owns both fighters and everything they share. One call to
//! [`Fight::tick`] is one logical step: the clock value passed in is the only
//! time source every component sees during that step.

use kombat_common::PlayerSlot;
use tracing::{debug, info};

use crate::character::CharacterConfig;
use crate::clock::Millis;
use crate::combat;
use crate::config::{FighterTuning, Playfield};
use crate::events::{CombatEvent, EventBus};
use crate::fighter::{EndState, Fighter, TickContext};
use crate::hitbox::HitboxTable;
use crate::input::InputSnapshot;
use crate::moves::MoveTable;
use crate::pause::{PauseManager, PauseReason};
use crate::round::{MatchPhase, RoundController, RoundOutcome, RoundRules, RoundTransition};

/// Shared tables and rules a fight is built from.
#[derive(Debug, Default)]
pub struct FightSetup {
    /// Authored boxes
    pub hitboxes: HitboxTable,
    /// Balance data
    pub moves: MoveTable,
    /// Physics constants
    pub tuning: FighterTuning,
    /// Stage bounds
    pub playfield: Playfield,
    /// Match format
    pub rules: RoundRules,
    /// Event bus capacity
    pub event_capacity: Option<usize>,
}

/// A best-of-three match between two fighters.
#[derive(Debug)]
pub struct Fight {
    fighters: [Fighter; 2],
    round: RoundController,
    pause: PauseManager,
    hitboxes: HitboxTable,
    moves: MoveTable,
    tuning: FighterTuning,
    playfield: Playfield,
    events: EventBus,
    last_inputs: [InputSnapshot; 2],
    now: Millis,
}

impl Fight {
    /// Starts a match in its intro phase with the given fighters.
    #[must_use]
    pub fn new(setup: FightSetup, fighters: [Fighter; 2], now: Millis) -> Self {
        let events = setup.event_capacity.map_or_else(EventBus::default, EventBus::new);
        let mut fight = Self {
            fighters,
            round: RoundController::new(setup.rules, now),
            pause: PauseManager::new(),
            hitboxes: setup.hitboxes,
            moves: setup.moves,
            tuning: setup.tuning,
            playfield: setup.playfield,
            events,
            last_inputs: [InputSnapshot::NEUTRAL; 2],
            now,
        };
        fight.reset_fighters(now);
        info!(
            "Fight: {} vs {}",
            fight.fighters[0].config().name,
            fight.fighters[1].config().name
        );
        fight
    }

    /// Starts a match between two characters with placeholder clips.
    #[must_use]
    pub fn with_characters(setup: FightSetup, characters: [CharacterConfig; 2], now: Millis) -> Self {
        let [p1, p2] = characters;
        let fighters = [
            Fighter::placeholder(PlayerSlot::One, p1, &setup.tuning, &setup.playfield),
            Fighter::placeholder(PlayerSlot::Two, p2, &setup.tuning, &setup.playfield),
        ];
        Self::new(setup, fighters, now)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Fighter in `slot`.
    #[must_use]
    pub fn fighter(&self, slot: PlayerSlot) -> &Fighter {
        &self.fighters[slot.index()]
    }

    /// Both fighters, P1 first.
    #[must_use]
    pub const fn fighters(&self) -> &[Fighter; 2] {
        &self.fighters
    }

    /// Round controller.
    #[must_use]
    pub const fn round(&self) -> &RoundController {
        &self.round
    }

    /// Current match phase.
    #[must_use]
    pub const fn phase(&self) -> MatchPhase {
        self.round.phase()
    }

    /// Pause manager.
    #[must_use]
    pub const fn pause_state(&self) -> &PauseManager {
        &self.pause
    }

    /// Event bus.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Drains every pending event.
    pub fn drain_events(&self) -> Vec<CombatEvent> {
        self.events.drain()
    }

    /// Hitbox table in use.
    #[must_use]
    pub const fn hitboxes(&self) -> &HitboxTable {
        &self.hitboxes
    }

    /// Swaps in a freshly loaded hitbox table (e.g. after editing).
    pub fn set_hitboxes(&mut self, table: HitboxTable) {
        debug!("Hitbox table replaced ({} frames)", table.frame_count());
        self.hitboxes = table;
    }

    /// Timestamp of the last tick or control call.
    #[must_use]
    pub const fn now(&self) -> Millis {
        self.now
    }

    /// Whole seconds left on the round timer.
    #[must_use]
    pub fn time_left(&self) -> u64 {
        // The round clock is only shifted on resume, so read it at pause start
        let paused_for = self.pause.current_pause_ms(self.now);
        self.round
            .time_left(Millis(self.now.as_u64().saturating_sub(paused_for)))
    }

    // ------------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------------

    /// Runs one logical step at `now` with both players' inputs.
    pub fn tick(&mut self, now: Millis, inputs: [InputSnapshot; 2]) {
        self.now = now;
        self.last_inputs = inputs;

        if self.pause.is_paused() {
            if self.pause.reason().editor_active() {
                self.update_fighters(now, [InputSnapshot::NEUTRAL; 2], true);
            }
            return;
        }

        match self.round.phase() {
            MatchPhase::Intro => {
                if self.round.update_intro(now) {
                    self.on_round_start(now);
                }
            }
            MatchPhase::Fighting => {
                self.update_fighters(now, inputs, false);
                let [p1, p2] = &mut self.fighters;
                combat::resolve_pushboxes(p1, p2, &self.hitboxes, &self.playfield, now);

                let (h1, h2) = (p1.health(), p2.health());
                if let Some(outcome) = self.round.check_end(h1, h2, now) {
                    self.on_round_end(outcome, now);
                }
            }
            MatchPhase::RoundOver => {
                // Only the end poses advance
                self.update_fighters(now, [InputSnapshot::NEUTRAL; 2], false);
                match self.round.advance(now) {
                    Some(RoundTransition::NextRound(_)) => self.on_round_start(now),
                    Some(RoundTransition::MatchOver(winner)) => {
                        self.events.publish(CombatEvent::MatchEnded { winner });
                    }
                    None => {}
                }
            }
            MatchPhase::MatchOver => {
                self.update_fighters(now, [InputSnapshot::NEUTRAL; 2], false);
            }
        }
    }

    fn update_fighters(&mut self, now: Millis, inputs: [InputSnapshot; 2], editor: bool) {
        let ctx = TickContext::new(now, &self.hitboxes, &self.moves, &self.tuning, &self.playfield)
            .with_events(&self.events)
            .with_editor(editor);
        let [p1, p2] = &mut self.fighters;
        p1.update(&inputs[0], p2, &ctx);
        p2.update(&inputs[1], p1, &ctx);
    }

    fn reset_fighters(&mut self, now: Millis) {
        for fighter in &mut self.fighters {
            let left_side = fighter.slot() == PlayerSlot::One;
            let x = self.playfield.start_x(left_side, fighter.rect().w);
            fighter.reset_for_round(x, &self.playfield, now);
        }
    }

    fn on_round_start(&mut self, now: Millis) {
        self.reset_fighters(now);
        self.events.publish(CombatEvent::RoundStarted {
            round: self.round.round(),
        });
    }

    fn on_round_end(&mut self, outcome: RoundOutcome, now: Millis) {
        match (outcome.winner, outcome.loser()) {
            (Some(winner), Some(loser)) => {
                self.fighters[winner.index()].set_end_state(Some(EndState::Win), now);
                self.fighters[loser.index()].set_end_state(Some(EndState::Lose), now);
            }
            _ => {
                for fighter in &mut self.fighters {
                    fighter.set_end_state(None, now);
                }
            }
        }
        self.events.publish(CombatEvent::RoundEnded {
            round: outcome.round,
            winner: outcome.winner,
            reason: outcome.reason,
        });
    }

    /// Cuts the round-over display short.
    pub fn skip_round_over(&mut self, now: Millis) {
        self.round.skip_round_over(now);
    }

    /// Ends the intro immediately.
    pub fn finish_intro(&mut self, now: Millis) {
        if self.round.finish_intro(now) {
            self.on_round_start(now);
        }
    }

    // ------------------------------------------------------------------------
    // Pause
    // ------------------------------------------------------------------------

    /// Pauses the fight. Only a round in progress can be paused.
    pub fn pause(&mut self, reason: PauseReason, now: Millis) {
        if !self.round.phase().is_fighting() || self.pause.reason() == reason {
            return;
        }
        self.now = now;
        self.pause.pause(reason, now);
        if self.pause.reason() == reason {
            self.events.publish(CombatEvent::Paused { reason });
        }
    }

    /// Resumes from the current pause reason.
    pub fn resume(&mut self, now: Millis) {
        self.now = now;
        let paused = self.pause.resume(now);
        self.after_resume(paused);
    }

    /// Toggles the player pause.
    pub fn toggle_pause(&mut self, now: Millis) {
        if self.pause.reason() == PauseReason::PlayerPaused {
            self.resume(now);
        } else if !self.pause.is_paused() {
            self.pause(PauseReason::PlayerPaused, now);
        }
    }

    /// Toggles the hitbox editor. Fighters hold their pose while it is open.
    pub fn toggle_editor(&mut self, now: Millis) {
        if self.pause.reason() == PauseReason::HitboxEditor {
            self.now = now;
            let paused = self.pause.resume_from(PauseReason::HitboxEditor, now);
            self.after_resume(paused);
        } else {
            self.pause(PauseReason::HitboxEditor, now);
        }
    }

    /// Reacts to the window gaining or losing focus.
    pub fn on_focus_change(&mut self, focused: bool, now: Millis) {
        if focused {
            self.now = now;
            let paused = self.pause.resume_from(PauseReason::FocusLost, now);
            self.after_resume(paused);
        } else {
            self.pause(PauseReason::FocusLost, now);
        }
    }

    fn after_resume(&mut self, paused: Option<u64>) {
        let Some(ms) = paused else {
            return;
        };
        // Nothing may expire during the pause
        for (fighter, input) in self.fighters.iter_mut().zip(&self.last_inputs) {
            fighter.shift_timers(ms);
            fighter.resync_input(input);
        }
        self.round.shift(ms);
        self.events.publish(CombatEvent::Resumed { paused_ms: ms });
    }

    /// Starts a new match with the same fighters. Scores are cleared.
    pub fn rematch(&mut self, now: Millis) {
        self.now = now;
        self.pause.force_resume(now);
        self.pause.reset_timing();
        self.round.reset_match(now);
        for fighter in &mut self.fighters {
            fighter.score = 0;
        }
        self.reset_fighters(now);
        info!("Rematch");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FrameClock, ManualClock};
    use crate::fighter::fixtures::assert_exclusive;
    use crate::fighter::MAX_HEALTH;
    use crate::input::Button;
    use crate::round::RoundReason;
    use proptest::prelude::*;

    fn fight() -> Fight {
        let characters = [
            CharacterConfig::preset("nate").expect("preset"),
            CharacterConfig::preset("scorpion").expect("preset"),
        ];
        Fight::with_characters(FightSetup::default(), characters, Millis(0))
    }

    const IDLE: [InputSnapshot; 2] = [InputSnapshot::NEUTRAL; 2];

    fn run(fight: &mut Fight, from: u64, to: u64, inputs: [InputSnapshot; 2]) {
        for t in (from..=to).step_by(16) {
            fight.tick(Millis(t), inputs);
        }
    }

    #[test]
    fn test_starts_at_sides_and_waits_for_intro() {
        let mut fight = fight();
        let playfield = Playfield::default();
        assert_eq!(fight.fighter(PlayerSlot::One).rect().x, 40);
        assert_eq!(
            fight.fighter(PlayerSlot::Two).rect().right(),
            playfield.max_x - 40
        );

        let walk = [InputSnapshot::NEUTRAL.with(Button::Right), InputSnapshot::NEUTRAL];
        fight.tick(Millis(100), walk);
        assert_eq!(fight.phase(), MatchPhase::Intro);
        assert_eq!(fight.fighter(PlayerSlot::One).rect().x, 40);

        fight.tick(Millis(2000), IDLE);
        assert_eq!(fight.phase(), MatchPhase::Fighting);
        assert!(fight
            .drain_events()
            .contains(&CombatEvent::RoundStarted { round: 1 }));
    }

    #[test]
    fn test_push_resolution_after_both_updates() {
        let mut fight = fight();
        fight.finish_intro(Millis(0));
        let toward = [
            InputSnapshot::NEUTRAL.with(Button::Right),
            InputSnapshot::NEUTRAL.with(Button::Left),
        ];
        run(&mut fight, 16, 3000, toward);
        let [p1, p2] = fight.fighters();
        assert!(p1.rect().overlap_x(p2.rect()) <= 0);
        assert!(p1.rect().x > 40);
    }

    #[test]
    fn test_ko_sets_end_poses_and_next_round_resets() {
        let mut fight = fight();
        fight.finish_intro(Millis(0));
        fight.fighters[1].health = 0;
        fight.tick(Millis(16), IDLE);

        assert_eq!(fight.phase(), MatchPhase::RoundOver);
        assert_eq!(
            fight.fighter(PlayerSlot::One).end_state(),
            Some(EndState::Win)
        );
        assert_eq!(
            fight.fighter(PlayerSlot::Two).end_state(),
            Some(EndState::Lose)
        );
        let events = fight.drain_events();
        assert!(events.contains(&CombatEvent::RoundEnded {
            round: 1,
            winner: Some(PlayerSlot::One),
            reason: RoundReason::Ko,
        }));

        fight.fighters[0].score = 400;
        fight.tick(Millis(2516), IDLE);
        assert_eq!(fight.round().round(), 2);
        assert_eq!(fight.phase(), MatchPhase::Fighting);
        let p2 = fight.fighter(PlayerSlot::Two);
        assert_eq!(p2.health(), 100);
        assert_eq!(p2.end_state(), None);
        assert_eq!(fight.fighter(PlayerSlot::One).score(), 400);
    }

    #[test]
    fn test_match_ends_after_two_wins() {
        let mut fight = fight();
        fight.finish_intro(Millis(0));
        let mut now = 0;
        for _ in 0..2 {
            now += 16;
            fight.fighters[0].health = 0;
            fight.tick(Millis(now), IDLE);
            now += 2500;
            fight.tick(Millis(now), IDLE);
        }
        assert_eq!(fight.phase(), MatchPhase::MatchOver);
        assert!(fight.drain_events().contains(&CombatEvent::MatchEnded {
            winner: Some(PlayerSlot::Two)
        }));
        assert_eq!(
            fight.fighter(PlayerSlot::Two).end_state(),
            Some(EndState::Win)
        );
    }

    #[test]
    fn test_pause_freezes_timers_and_round_clock() {
        let mut fight = fight();
        fight.finish_intro(Millis(0));
        fight.fighters[0].hitstun_until.extend(Millis(100), 200);
        fight.tick(Millis(100), IDLE);

        fight.toggle_pause(Millis(100));
        assert!(fight.pause_state().is_paused());
        let walk = [InputSnapshot::NEUTRAL.with(Button::Right), InputSnapshot::NEUTRAL];
        fight.tick(Millis(5000), walk);
        assert_eq!(fight.fighter(PlayerSlot::One).rect().x, 40);
        assert_eq!(fight.time_left(), 90);

        fight.toggle_pause(Millis(10_100));
        assert_eq!(
            fight.fighter(PlayerSlot::One).hitstun_until().get(),
            Some(Millis(10_300))
        );
        assert_eq!(fight.round().time_left(Millis(10_100)), 90);
        let events = fight.drain_events();
        assert!(events.contains(&CombatEvent::Resumed { paused_ms: 10_000 }));
    }

    #[test]
    fn test_held_button_needs_fresh_press_after_resume() {
        let mut fight = fight();
        fight.finish_intro(Millis(0));
        let hold = [InputSnapshot::NEUTRAL.with(Button::AttackE), InputSnapshot::NEUTRAL];
        fight.toggle_pause(Millis(0));
        fight.tick(Millis(16), hold);
        fight.toggle_pause(Millis(32));
        fight.tick(Millis(48), hold);
        assert!(!fight.fighter(PlayerSlot::One).is_attacking());
    }

    #[test]
    fn test_editor_holds_pose() {
        let mut fight = fight();
        fight.finish_intro(Millis(0));
        fight.toggle_editor(Millis(0));
        assert!(fight.pause_state().reason().editor_active());
        let walk = [InputSnapshot::NEUTRAL.with(Button::Right), InputSnapshot::NEUTRAL];
        run(&mut fight, 16, 500, walk);
        assert_eq!(fight.fighter(PlayerSlot::One).rect().x, 40);

        fight.toggle_editor(Millis(600));
        assert!(!fight.pause_state().is_paused());
    }

    #[test]
    fn test_cannot_pause_outside_fighting() {
        let mut fight = fight();
        fight.toggle_pause(Millis(0));
        assert!(!fight.pause_state().is_paused());
    }

    #[test]
    fn test_rematch_clears_wins_and_scores() {
        let mut fight = fight();
        fight.finish_intro(Millis(0));
        fight.fighters[0].score = 1200;
        fight.fighters[1].health = 0;
        fight.tick(Millis(16), IDLE);
        fight.rematch(Millis(100));
        assert_eq!(fight.phase(), MatchPhase::Intro);
        assert_eq!(fight.round().all_wins(), [0, 0]);
        assert_eq!(fight.fighter(PlayerSlot::One).score(), 0);
        assert_eq!(fight.fighter(PlayerSlot::One).end_state(), None);
    }

    fn snapshot() -> impl Strategy<Value = InputSnapshot> {
        prop::array::uniform9(any::<bool>()).prop_map(|held| {
            let mut snapshot = InputSnapshot::NEUTRAL;
            for (button, on) in Button::ALL.into_iter().zip(held) {
                snapshot.set(button, on);
            }
            snapshot
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_random_inputs_keep_fighters_consistent(
            steps in prop::collection::vec((snapshot(), snapshot(), 1u64..120), 1..400)
        ) {
            let mut fight = fight();
            let mut clock = ManualClock::default();
            fight.finish_intro(clock.now());
            let ground = Playfield::default().ground_y;

            for (p1, p2, dt) in steps {
                clock.advance(dt);
                fight.tick(clock.now(), [p1, p2]);
                for fighter in fight.fighters() {
                    assert_exclusive(fighter);
                    prop_assert!((0..=MAX_HEALTH).contains(&fighter.health()));
                    prop_assert!(fighter.rect().bottom() <= ground);
                }
            }
        }
    }
}
