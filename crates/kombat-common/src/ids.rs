//! ID types for players and sprite frames.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for frame IDs.
static FRAME_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Which side of the match a fighter belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerSlot {
    /// Player one (starts on the left)
    One,
    /// Player two (starts on the right)
    Two,
}

impl PlayerSlot {
    /// Both slots in order.
    pub const ALL: [Self; 2] = [Self::One, Self::Two];

    /// Array index of this slot (0 or 1).
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::One => 0,
            Self::Two => 1,
        }
    }

    /// The opposing slot.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }
}

impl std::fmt::Display for PlayerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::One => write!(f, "P1"),
            Self::Two => write!(f, "P2"),
        }
    }
}

/// Unique identifier for a loaded sprite frame image.
///
/// Used as the cache key for per-image computations such as the lowest
/// opaque row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameId(u64);

impl FrameId {
    /// Creates a new unique frame ID.
    #[must_use]
    pub fn new() -> Self {
        Self(FRAME_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates a frame ID from a raw value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl Default for FrameId {
    fn default() -> Self {
        Self::new()
    }
}
