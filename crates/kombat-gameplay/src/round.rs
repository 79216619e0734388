//! Round and match lifecycle.
//!
//! Best-of-three: `Intro -> Fighting -> RoundOver -> (Fighting | MatchOver)`.
//! The controller only looks at health and time; it owns no combat logic.

use kombat_common::PlayerSlot;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::clock::Millis;

/// Phase of the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Character intros before round one
    #[default]
    Intro,
    /// Round in progress
    Fighting,
    /// Result shown before the next round
    RoundOver,
    /// Terminal
    MatchOver,
}

impl MatchPhase {
    /// Returns true while fighters take input.
    #[must_use]
    pub const fn is_fighting(self) -> bool {
        matches!(self, Self::Fighting)
    }
}

/// Why a round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundReason {
    /// One fighter reached zero health
    Ko,
    /// Timer ran out with unequal health
    Time,
    /// Double KO or equal health at time-out
    Draw,
}

/// Result of a finished round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundOutcome {
    /// Round number that ended
    pub round: u8,
    /// Winner, `None` on a draw
    pub winner: Option<PlayerSlot>,
    /// Why the round ended
    pub reason: RoundReason,
}

impl RoundOutcome {
    /// Loser, `None` on a draw.
    #[must_use]
    pub fn loser(&self) -> Option<PlayerSlot> {
        self.winner.map(PlayerSlot::other)
    }
}

/// What happened when the round-over pause ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundTransition {
    /// A new round started (same number after a draw)
    NextRound(u8),
    /// The match is decided
    MatchOver(Option<PlayerSlot>),
}

/// Timing and format of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundRules {
    /// Round length in seconds
    pub round_seconds: u64,
    /// Result display before the next round starts
    pub round_over_pause_ms: u64,
    /// Intro length before round one
    pub intro_ms: u64,
    /// Round wins needed to take the match
    pub wins_needed: u8,
    /// Highest round number
    pub max_rounds: u8,
}

impl Default for RoundRules {
    fn default() -> Self {
        Self {
            round_seconds: 90,
            round_over_pause_ms: 2500,
            intro_ms: 2000,
            wins_needed: 2,
            max_rounds: 3,
        }
    }
}

/// Drives rounds, the round timer and the win tally.
#[derive(Debug, Clone)]
pub struct RoundController {
    rules: RoundRules,
    round: u8,
    wins: [u8; 2],
    phase: MatchPhase,
    /// When the current phase began
    phase_started: Millis,
    /// Round timer origin
    round_start: Millis,
    /// Timer frozen here once the round ends
    clock_stopped: Option<Millis>,
    last_outcome: Option<RoundOutcome>,
}

impl RoundController {
    /// Starts a match in the intro phase.
    #[must_use]
    pub fn new(rules: RoundRules, now: Millis) -> Self {
        Self {
            rules,
            round: 1,
            wins: [0; 2],
            phase: MatchPhase::Intro,
            phase_started: now,
            round_start: now,
            clock_stopped: None,
            last_outcome: None,
        }
    }

    /// Rules in effect.
    #[must_use]
    pub const fn rules(&self) -> &RoundRules {
        &self.rules
    }

    /// Current round number.
    #[must_use]
    pub const fn round(&self) -> u8 {
        self.round
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> MatchPhase {
        self.phase
    }

    /// Round wins for `slot`.
    #[must_use]
    pub const fn wins(&self, slot: PlayerSlot) -> u8 {
        self.wins[slot.index()]
    }

    /// Round wins indexed by slot.
    #[must_use]
    pub const fn all_wins(&self) -> [u8; 2] {
        self.wins
    }

    /// Result of the most recent round.
    #[must_use]
    pub const fn last_outcome(&self) -> Option<RoundOutcome> {
        self.last_outcome
    }

    /// Whole seconds left on the round timer.
    ///
    /// Full during the intro, frozen once the round has ended.
    #[must_use]
    pub fn time_left(&self, now: Millis) -> u64 {
        if self.phase == MatchPhase::Intro {
            return self.rules.round_seconds;
        }
        let until = self.clock_stopped.map_or(now, |stop| stop.min(now));
        let elapsed = until.since(self.round_start) / 1000;
        self.rules.round_seconds.saturating_sub(elapsed)
    }

    /// Ends the intro once its duration has elapsed.
    ///
    /// Returns true on the tick the first round starts.
    pub fn update_intro(&mut self, now: Millis) -> bool {
        if self.phase != MatchPhase::Intro || now.since(self.phase_started) < self.rules.intro_ms {
            return false;
        }
        self.finish_intro(now)
    }

    /// Ends the intro immediately. Returns false outside the intro.
    pub fn finish_intro(&mut self, now: Millis) -> bool {
        if self.phase != MatchPhase::Intro {
            return false;
        }
        self.start_round(self.round, now);
        true
    }

    fn start_round(&mut self, round: u8, now: Millis) {
        self.round = round;
        self.phase = MatchPhase::Fighting;
        self.phase_started = now;
        self.round_start = now;
        self.clock_stopped = None;
        info!("Round {} start", round);
    }

    /// Checks for a KO or time-out and ends the round if one happened.
    ///
    /// Only active while fighting.
    pub fn check_end(&mut self, p1_health: i32, p2_health: i32, now: Millis) -> Option<RoundOutcome> {
        if self.phase != MatchPhase::Fighting {
            return None;
        }

        let (winner, reason) = match (p1_health <= 0, p2_health <= 0) {
            (true, true) => (None, RoundReason::Draw),
            (false, true) => (Some(PlayerSlot::One), RoundReason::Ko),
            (true, false) => (Some(PlayerSlot::Two), RoundReason::Ko),
            (false, false) => {
                if self.time_left(now) > 0 {
                    return None;
                }
                match p1_health.cmp(&p2_health) {
                    std::cmp::Ordering::Greater => (Some(PlayerSlot::One), RoundReason::Time),
                    std::cmp::Ordering::Less => (Some(PlayerSlot::Two), RoundReason::Time),
                    std::cmp::Ordering::Equal => (None, RoundReason::Draw),
                }
            }
        };

        Some(self.end_round(winner, reason, now))
    }

    fn end_round(&mut self, winner: Option<PlayerSlot>, reason: RoundReason, now: Millis) -> RoundOutcome {
        if let Some(slot) = winner {
            self.wins[slot.index()] = self.wins[slot.index()].saturating_add(1);
        }
        self.phase = MatchPhase::RoundOver;
        self.phase_started = now;
        self.clock_stopped = Some(now);

        let outcome = RoundOutcome {
            round: self.round,
            winner,
            reason,
        };
        self.last_outcome = Some(outcome);
        match winner {
            Some(slot) => info!("Round {} to {} ({:?})", self.round, slot, reason),
            None => info!("Round {} drawn", self.round),
        }
        outcome
    }

    /// Cuts the round-over display short.
    pub fn skip_round_over(&mut self, now: Millis) {
        if self.phase == MatchPhase::RoundOver {
            self.phase_started = Millis(
                now.as_u64()
                    .saturating_sub(self.rules.round_over_pause_ms),
            );
        }
    }

    /// Leaves the round-over phase once its pause has elapsed.
    ///
    /// The match ends when a side has enough wins or the next round would
    /// pass the round cap. A draw replays the same round number.
    pub fn advance(&mut self, now: Millis) -> Option<RoundTransition> {
        if self.phase != MatchPhase::RoundOver
            || now.since(self.phase_started) < self.rules.round_over_pause_ms
        {
            return None;
        }

        if self.wins.iter().any(|w| *w >= self.rules.wins_needed) {
            return Some(self.end_match(now));
        }

        let drawn = self
            .last_outcome
            .is_some_and(|o| o.reason == RoundReason::Draw);
        let next = if drawn { self.round } else { self.round + 1 };
        if next > self.rules.max_rounds {
            return Some(self.end_match(now));
        }

        self.start_round(next, now);
        Some(RoundTransition::NextRound(next))
    }

    fn end_match(&mut self, now: Millis) -> RoundTransition {
        self.phase = MatchPhase::MatchOver;
        self.phase_started = now;
        let winner = self.final_winner();
        info!(
            "Match over: {} ({}-{})",
            winner.map_or_else(|| "draw".to_owned(), |w| w.to_string()),
            self.wins[0],
            self.wins[1]
        );
        RoundTransition::MatchOver(winner)
    }

    /// Side with more round wins, `None` if level.
    #[must_use]
    pub fn final_winner(&self) -> Option<PlayerSlot> {
        match self.wins[0].cmp(&self.wins[1]) {
            std::cmp::Ordering::Greater => Some(PlayerSlot::One),
            std::cmp::Ordering::Less => Some(PlayerSlot::Two),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Moves the round timer and phase clock forward after a pause.
    pub fn shift(&mut self, ms: u64) {
        self.round_start = self.round_start.plus(ms);
        self.phase_started = self.phase_started.plus(ms);
        if let Some(stop) = self.clock_stopped.as_mut() {
            *stop = stop.plus(ms);
        }
    }

    /// Starts over from the intro with no wins.
    pub fn reset_match(&mut self, now: Millis) {
        *self = Self::new(self.rules, now);
    }
}

/// Round-win tally in roman numerals for the HUD.
#[must_use]
pub fn wins_to_roman(wins: u8) -> String {
    "I".repeat(usize::from(wins))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn fighting() -> RoundController {
        let mut round = RoundController::new(RoundRules::default(), Millis(0));
        assert!(round.finish_intro(Millis(0)));
        round
    }

    #[test]
    fn test_intro_ends_after_duration() {
        let mut round = RoundController::new(RoundRules::default(), Millis(0));
        assert_eq!(round.time_left(Millis(50_000)), 90);
        assert!(!round.update_intro(Millis(1999)));
        assert!(round.update_intro(Millis(2000)));
        assert_eq!(round.phase(), MatchPhase::Fighting);
        assert!(!round.update_intro(Millis(3000)));
    }

    #[test]
    fn test_single_ko_ends_round() {
        let mut round = fighting();
        assert_eq!(round.check_end(100, 40, Millis(500)), None);

        let outcome = round.check_end(30, 0, Millis(1000)).expect("round ended");
        assert_eq!(outcome.winner, Some(PlayerSlot::One));
        assert_eq!(outcome.loser(), Some(PlayerSlot::Two));
        assert_eq!(outcome.reason, RoundReason::Ko);
        assert_eq!(round.wins(PlayerSlot::One), 1);
        assert_eq!(round.phase(), MatchPhase::RoundOver);
        // No double counting while the result is shown
        assert_eq!(round.check_end(30, 0, Millis(1100)), None);
    }

    #[test]
    fn test_double_ko_is_draw() {
        let mut round = fighting();
        let outcome = round.check_end(0, 0, Millis(10)).expect("round ended");
        assert_eq!(outcome.winner, None);
        assert_eq!(outcome.reason, RoundReason::Draw);
        assert_eq!(round.all_wins(), [0, 0]);
    }

    #[test]
    fn test_time_out_higher_health_wins() {
        let mut round = fighting();
        assert_eq!(round.check_end(50, 60, Millis(89_999)), None);
        assert_eq!(round.time_left(Millis(89_999)), 1);

        let outcome = round.check_end(50, 60, Millis(90_000)).expect("time over");
        assert_eq!(outcome.winner, Some(PlayerSlot::Two));
        assert_eq!(outcome.reason, RoundReason::Time);
        // Timer stays frozen at zero
        assert_eq!(round.time_left(Millis(95_000)), 0);
    }

    #[test]
    fn test_time_out_draw_replays_round() {
        let mut round = fighting();
        let outcome = round.check_end(70, 70, Millis(90_000)).expect("time over");
        assert_eq!(outcome.reason, RoundReason::Draw);

        assert_eq!(round.advance(Millis(92_499)), None);
        assert_eq!(
            round.advance(Millis(92_500)),
            Some(RoundTransition::NextRound(1))
        );
        assert_eq!(round.round(), 1);
        assert_eq!(round.time_left(Millis(92_500)), 90);
    }

    #[test]
    fn test_two_wins_end_match() {
        let mut round = fighting();
        round.check_end(100, 0, Millis(1000));
        assert_eq!(
            round.advance(Millis(3500)),
            Some(RoundTransition::NextRound(2))
        );
        round.check_end(100, 0, Millis(5000));
        assert_eq!(
            round.advance(Millis(7500)),
            Some(RoundTransition::MatchOver(Some(PlayerSlot::One)))
        );
        assert_eq!(round.phase(), MatchPhase::MatchOver);
        assert_eq!(round.round(), 2);
        assert_eq!(round.final_winner(), Some(PlayerSlot::One));
    }

    #[test]
    fn test_round_cap_ends_match() {
        let mut round = fighting();
        let mut now = 0;
        for (p1, p2) in [(100, 0), (0, 100)] {
            now += 1000;
            round.check_end(p1, p2, Millis(now));
            now += 2500;
            round.advance(Millis(now));
        }
        assert_eq!(round.round(), 3);

        // A draw in round three replays it
        now += 1000;
        round.check_end(0, 0, Millis(now));
        now += 2500;
        assert_eq!(
            round.advance(Millis(now)),
            Some(RoundTransition::NextRound(3))
        );

        now += 1000;
        round.check_end(10, 0, Millis(now));
        now += 2500;
        assert_eq!(
            round.advance(Millis(now)),
            Some(RoundTransition::MatchOver(Some(PlayerSlot::One)))
        );
    }

    #[test]
    fn test_round_cap_with_level_wins() {
        let rules = RoundRules {
            max_rounds: 1,
            ..RoundRules::default()
        };
        let mut round = RoundController::new(rules, Millis(0));
        round.finish_intro(Millis(0));
        round.check_end(100, 0, Millis(100));
        assert_eq!(
            round.advance(Millis(2600)),
            Some(RoundTransition::MatchOver(Some(PlayerSlot::One)))
        );
    }

    #[test]
    fn test_shift_freezes_timer_across_pause() {
        let mut round = fighting();
        assert_eq!(round.time_left(Millis(10_000)), 80);
        round.shift(30_000);
        assert_eq!(round.time_left(Millis(40_000)), 80);
    }

    #[test]
    fn test_skip_round_over() {
        let mut round = fighting();
        round.check_end(0, 100, Millis(1000));
        round.skip_round_over(Millis(1100));
        assert_eq!(
            round.advance(Millis(1100)),
            Some(RoundTransition::NextRound(2))
        );
    }

    #[test]
    fn test_reset_match() {
        let mut round = fighting();
        round.check_end(0, 100, Millis(1000));
        round.reset_match(Millis(5000));
        assert_eq!(round.phase(), MatchPhase::Intro);
        assert_eq!(round.all_wins(), [0, 0]);
        assert_eq!(round.round(), 1);
    }

    #[test]
    fn test_wins_to_roman() {
        assert_eq!(wins_to_roman(0), "");
        assert_eq!(wins_to_roman(1), "I");
        assert_eq!(wins_to_roman(2), "II");
        assert_eq!(wins_to_roman(3), "III");
    }
}
