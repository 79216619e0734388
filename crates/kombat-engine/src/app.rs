//! Headless match runner.
//!
//! Plays a full CPU-vs-CPU match either in real time, paced to the configured
//! tick rate, or as fast as possible on a simulated clock.

use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{Context, Result};
use kombat_common::PlayerSlot;
use kombat_gameplay::{
    CharacterConfig, CombatEvent, EventHandler, Fight, FightSetup, Fighter, FrameClock, HitboxTable,
    ManualClock, MatchPhase, Millis, MoveTable, NpcConfig, NpcController, SystemClock,
};
use tracing::{debug, info, trace, warn};

use crate::config::EngineConfig;
use crate::timing::FrameTiming;

/// How the run advances time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Wall clock, one tick per frame budget
    #[default]
    RealTime,
    /// Simulated clock, no sleeping
    Fast,
}

/// Outcome of a headless run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchReport {
    /// Character names, P1 first
    pub characters: [String; 2],
    /// Match winner, `None` for a level match or an abandoned run
    pub winner: Option<PlayerSlot>,
    /// Round wins, P1 first
    pub wins: [u8; 2],
    /// Final scores, P1 first
    pub scores: [u32; 2],
    /// Rounds that reached a result
    pub rounds_played: u32,
    /// Events drained from the bus
    pub events: u64,
    /// Simulated match time
    pub elapsed_ms: u64,
    /// Whether the match reached its end before the time limit
    pub finished: bool,
}

impl MatchReport {
    /// One-line summary for the console.
    #[must_use]
    pub fn summary(&self) -> String {
        let [p1, p2] = &self.characters;
        let result = match (self.finished, self.winner) {
            (false, _) => "abandoned".to_owned(),
            (true, Some(slot)) => format!("{slot} ({}) wins", self.characters[slot.index()]),
            (true, None) => "draw".to_owned(),
        };
        format!(
            "{p1} vs {p2}: {result}, rounds {}-{}, score {}-{}, {} rounds in {:.1}s",
            self.wins[0],
            self.wins[1],
            self.scores[0],
            self.scores[1],
            self.rounds_played,
            self.elapsed_ms as f64 / 1000.0,
        )
    }
}

/// Builds the fight described by `config`.
fn build_fight(config: &EngineConfig, now: Millis) -> Result<Fight> {
    let hitboxes = HitboxTable::load(&config.hitbox_path);
    let setup = FightSetup {
        hitboxes,
        moves: MoveTable::default(),
        tuning: config.tuning.clone(),
        playfield: config.playfield,
        rules: config.rules(),
        event_capacity: None,
    };

    let mut fighters = Vec::with_capacity(2);
    for (slot, name) in [PlayerSlot::One, PlayerSlot::Two].into_iter().zip(&config.characters) {
        let character = CharacterConfig::preset(name)
            .with_context(|| format!("building {slot} character"))?;
        let fighter = Fighter::placeholder(slot, character, &setup.tuning, &setup.playfield)
            .with_seed(config.seed.wrapping_add(slot.index() as u64));
        fighters.push(fighter);
    }
    let fighters: [Fighter; 2] = fighters
        .try_into()
        .map_err(|_| anyhow::anyhow!("expected exactly two fighters"))?;

    Ok(Fight::new(setup, fighters, now))
}

fn build_npcs(config: &EngineConfig) -> [NpcController; 2] {
    let npc = |slot: PlayerSlot| {
        let npc_config = NpcConfig {
            base_difficulty: config.cpu_difficulty[slot.index()],
            ..NpcConfig::default()
        };
        NpcController::new(npc_config, config.seed.wrapping_mul(31).wrapping_add(slot.index() as u64))
    };
    [npc(PlayerSlot::One), npc(PlayerSlot::Two)]
}

fn log_event(event: &CombatEvent) {
    match event {
        CombatEvent::RoundStarted { round } => info!("Round {round}: fight!"),
        CombatEvent::RoundEnded {
            round,
            winner,
            reason,
        } => match winner {
            Some(slot) => info!("Round {round} to {slot} ({reason:?})"),
            None => info!("Round {round} drawn ({reason:?})"),
        },
        CombatEvent::MatchEnded { winner } => match winner {
            Some(slot) => info!("Match to {slot}"),
            None => info!("Match ended level"),
        },
        CombatEvent::KnockedOut { slot } => info!("{slot} knocked out"),
        CombatEvent::HitLanded {
            attacker,
            attack,
            damage,
            health,
        } => debug!("{attacker} hit with {attack:?} for {damage} ({health} left)"),
        CombatEvent::BlockLanded {
            attacker, attack, ..
        } => debug!("{attacker} blocked with {attack:?}"),
        CombatEvent::Paused { reason } => info!("{}", reason.message()),
        CombatEvent::Resumed { paused_ms } => debug!("Resumed after {paused_ms}ms"),
        CombatEvent::AttackStarted { .. } | CombatEvent::ScoreAwarded { .. } => {
            trace!("{event:?}");
        },
    }
}

/// Logs every event and counts finished rounds for the report.
#[derive(Debug, Default)]
struct MatchLog {
    rounds_ended: AtomicU32,
}

impl EventHandler for MatchLog {
    fn handle(&self, event: &CombatEvent) {
        log_event(event);
        if matches!(event, CombatEvent::RoundEnded { .. }) {
            self.rounds_ended.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Plays one CPU-vs-CPU match to completion or until `max_seconds` of match
/// time have passed.
pub fn run(config: &EngineConfig, mode: RunMode) -> Result<MatchReport> {
    let frame_ms = config.frame_ms();
    let limit_ms = config.max_seconds.saturating_mul(1000);

    let mut manual = ManualClock::default();
    let system = SystemClock::new();
    let mut timing = FrameTiming::new(config.tick_rate);
    let clock_now = |manual: &ManualClock| match mode {
        RunMode::Fast => manual.now(),
        RunMode::RealTime => system.now(),
    };

    let start = clock_now(&manual);
    let mut fight = build_fight(config, start)?;
    let mut npcs = build_npcs(config);
    let log = MatchLog::default();
    let mut report = MatchReport {
        characters: config.characters.clone(),
        winner: None,
        wins: [0; 2],
        scores: [0; 2],
        rounds_played: 0,
        events: 0,
        elapsed_ms: 0,
        finished: false,
    };

    info!(
        "Running {} at {} Hz ({mode:?})",
        report.characters.join(" vs "),
        config.tick_rate
    );

    loop {
        match mode {
            RunMode::Fast => manual.advance(frame_ms),
            RunMode::RealTime => timing.begin_frame(),
        }
        let now = clock_now(&manual);

        let round = fight.round();
        let (round_no, wins, phase) = (round.round(), round.all_wins(), round.phase());
        let [p1, p2] = fight.fighters();
        let inputs = [
            npcs[0].think(p1, p2, now, round_no, wins, phase),
            npcs[1].think(p2, p1, now, round_no, wins, phase),
        ];

        fight.tick(now, inputs);
        report.events += fight.events().dispatch(&[&log]) as u64;

        report.elapsed_ms = now.since(start);
        if fight.phase() == MatchPhase::MatchOver {
            report.finished = true;
            break;
        }
        if report.elapsed_ms >= limit_ms {
            warn!("Match abandoned after {}s", config.max_seconds);
            break;
        }

        if mode == RunMode::RealTime {
            timing.sleep_remainder();
        }
    }

    report.rounds_played = log.rounds_ended.load(Ordering::Relaxed);
    report.wins = fight.round().all_wins();
    report.winner = if report.finished {
        fight.round().final_winner()
    } else {
        None
    };
    report.scores = [
        fight.fighter(PlayerSlot::One).score(),
        fight.fighter(PlayerSlot::Two).score(),
    ];

    if mode == RunMode::RealTime {
        debug!(
            "{} frames, {:.1} Hz average",
            timing.frames(),
            timing.current_fps()
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_config() -> EngineConfig {
        EngineConfig {
            round_seconds: 10,
            round_over_pause_ms: 500,
            intro_ms: 100,
            max_seconds: 300,
            hitbox_path: "/nonexistent/hitboxes.json".into(),
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_fast_run_plays_rounds() {
        let report = run(&quick_config(), RunMode::Fast).expect("run");
        assert!(report.rounds_played >= 1);
        assert!(report.events > 0);
        assert!(report.elapsed_ms <= 300_000);
        if report.finished {
            assert!(report.wins.iter().any(|&w| w >= 2) || report.rounds_played >= 3);
        }
    }

    #[test]
    fn test_fast_run_is_deterministic() {
        let config = quick_config();
        let first = run(&config, RunMode::Fast).expect("first run");
        let second = run(&config, RunMode::Fast).expect("second run");
        assert_eq!(first, second);
    }

    #[test]
    fn test_run_stops_at_time_limit() {
        let config = EngineConfig {
            max_seconds: 1,
            ..quick_config()
        };
        let report = run(&config, RunMode::Fast).expect("run");
        assert!(!report.finished);
        assert_eq!(report.winner, None);
        assert!(report.summary().contains("abandoned"));
    }

    #[test]
    fn test_match_log_counts_round_ends() {
        use kombat_gameplay::{EventBus, PauseReason, RoundReason};

        let bus = EventBus::default();
        let log = MatchLog::default();
        bus.publish(CombatEvent::RoundStarted { round: 1 });
        bus.publish(CombatEvent::Paused {
            reason: PauseReason::PlayerPaused,
        });
        bus.publish(CombatEvent::RoundEnded {
            round: 1,
            winner: None,
            reason: RoundReason::Draw,
        });

        assert_eq!(bus.dispatch(&[&log]), 3);
        assert_eq!(log.rounds_ended.load(Ordering::Relaxed), 1);
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn test_unknown_character_fails() {
        let mut config = quick_config();
        config.characters[0] = "goro".to_owned();
        let err = run(&config, RunMode::Fast).expect_err("unknown preset");
        assert!(format!("{err:#}").contains("goro"));
    }
}
