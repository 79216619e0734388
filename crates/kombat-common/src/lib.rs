//! # Kombat Common
//!
//! Common types, utilities, and shared abstractions for the Kombat crates.
//!
//! This crate provides foundational types used across all Kombat subsystems:
//! - Rectangle geometry for push, hurt and hit boxes
//! - ID types (PlayerSlot, FrameId)
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod geometry;
pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::*;
    pub use crate::geometry::*;
    pub use crate::ids::*;
}

pub use prelude::*;
