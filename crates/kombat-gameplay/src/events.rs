//! Combat event bus.
//!
//! The core never calls into audio, VFX or HUD code. It publishes discrete
//! [`CombatEvent`]s that those collaborators drain once per frame.

use crossbeam_channel::{bounded, Receiver, Sender};
use kombat_common::PlayerSlot;
use serde::{Deserialize, Serialize};

use crate::moves::MoveKey;
use crate::pause::PauseReason;
use crate::round::RoundReason;

/// Events emitted by the combat core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatEvent {
    /// A fighter started an attack (swing cue)
    AttackStarted {
        /// Attacking fighter
        slot: PlayerSlot,
        /// Move being performed
        attack: MoveKey,
    },
    /// An attack removed health
    HitLanded {
        /// Attacking fighter
        attacker: PlayerSlot,
        /// Move that connected
        attack: MoveKey,
        /// Health removed
        damage: i32,
        /// Defender health after the hit
        health: i32,
    },
    /// An attack was blocked
    BlockLanded {
        /// Attacking fighter
        attacker: PlayerSlot,
        /// Move that was blocked
        attack: MoveKey,
        /// Pushback applied to the defender
        pushback: i32,
    },
    /// Score awarded for crossing health thresholds
    ScoreAwarded {
        /// Scoring fighter
        slot: PlayerSlot,
        /// Points added by this hit
        points: u32,
        /// Running total
        total: u32,
    },
    /// A fighter's health reached zero
    KnockedOut {
        /// Fighter that fell
        slot: PlayerSlot,
    },
    /// The fighting phase of a round began
    RoundStarted {
        /// Round number (1-3)
        round: u8,
    },
    /// A round finished
    RoundEnded {
        /// Round number
        round: u8,
        /// Winner, `None` for a draw
        winner: Option<PlayerSlot>,
        /// Why the round ended
        reason: RoundReason,
    },
    /// The match finished
    MatchEnded {
        /// Winner by round wins, `None` if level
        winner: Option<PlayerSlot>,
    },
    /// Simulation paused
    Paused {
        /// Why
        reason: PauseReason,
    },
    /// Simulation resumed
    Resumed {
        /// Length of the completed pause
        paused_ms: u64,
    },
}

/// Event bus for broadcasting events to subscribers.
#[derive(Debug)]
pub struct EventBus {
    /// Sender for broadcasting events
    sender: Sender<CombatEvent>,
    /// Receiver for collecting events
    receiver: Receiver<CombatEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    /// Publishes an event to the bus.
    pub fn publish(&self, event: CombatEvent) {
        // Non-blocking: a full bus drops the event rather than stalling a tick
        if self.sender.try_send(event).is_err() {
            tracing::trace!("Event bus full, dropping event");
        }
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<CombatEvent> {
        self.receiver.try_iter().collect()
    }

    /// Drains pending events into every handler, returning how many were
    /// delivered.
    pub fn dispatch(&self, handlers: &[&dyn EventHandler]) -> usize {
        let events = self.drain();
        for event in &events {
            for handler in handlers {
                handler.handle(event);
            }
        }
        events.len()
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }
}

/// Typed event handler trait.
pub trait EventHandler: Send + Sync {
    /// Handles an event.
    fn handle(&self, event: &CombatEvent);
}
