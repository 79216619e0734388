//! # Kombat Gameplay
//!
//! The deterministic combat core of a two-fighter, side-view fighting game.
//!
//! This crate owns everything that happens between two inputs and the next
//! frame, with no rendering or audio:
//! - Millisecond clock and stoppable deadlines
//! - Fighter state machine (ground, air, stun, knockdown, round-end poses)
//! - Per-frame push/hurt/hit boxes and the opaque-bottom foot anchor
//! - Attack resolution: reach, ducking, blocking, damage, knockback, score
//! - Pushbox separation
//! - Round and match flow (intro, timer, KO, draw, best of three)
//! - Pause and editor freeze with timer shifting
//! - A CPU opponent
//! - Event bus for the presentation layer

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod animation;
pub mod character;
pub mod clock;
pub mod combat;
pub mod combo;
pub mod config;
pub mod events;
pub mod fight;
pub mod fighter;
pub mod hitbox;
pub mod input;
pub mod moves;
pub mod npc;
pub mod pause;
pub mod round;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::animation::*;
    pub use crate::character::*;
    pub use crate::clock::*;
    pub use crate::combat::*;
    pub use crate::combo::*;
    pub use crate::config::*;
    pub use crate::events::*;
    pub use crate::fight::*;
    pub use crate::fighter::*;
    pub use crate::hitbox::*;
    pub use crate::input::*;
    pub use crate::moves::*;
    pub use crate::npc::*;
    pub use crate::pause::*;
    pub use crate::round::*;
}

pub use prelude::*;
