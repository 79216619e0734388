//! Move vocabulary and the balance table.
//!
//! Moves are keyed by grounded stance plus attack button, or by the single
//! air attack. The table is read-only during resolution and can be
//! overridden entry by entry for tuning and tests.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Gross combat posture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    /// Standing
    #[default]
    Medium,
    /// Crouching
    Low,
    /// Airborne, post-air-attack recovery, or knockdown hold
    High,
}

impl Stance {
    /// Lowercase name used in logs and clip keys.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Medium => "medium",
            Self::Low => "low",
            Self::High => "high",
        }
    }

    /// Returns true for the two grounded stances.
    #[must_use]
    pub const fn is_grounded(self) -> bool {
        !matches!(self, Self::High)
    }
}

/// The four attack buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackId {
    /// R button
    R,
    /// E button
    E,
    /// T button
    T,
    /// Y button
    Y,
}

impl AttackId {
    /// All attack buttons in start-priority order.
    pub const ALL: [Self; 4] = [Self::R, Self::E, Self::T, Self::Y];

    /// Lowercase button name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::R => "r",
            Self::E => "e",
            Self::T => "t",
            Self::Y => "y",
        }
    }
}

/// Height class of an attack, which decides what can block it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Height {
    /// Blocked standing; whiffs over crouchers
    High,
    /// Blocked standing or crouching
    Mid,
    /// Blocked crouching only
    Low,
}

impl Height {
    /// Returns true if a defender blocking in `stance` stops this height.
    ///
    /// Standing covers high and mid, crouching covers low and mid, and
    /// airborne fighters cannot block.
    #[must_use]
    pub const fn blocked_by(self, stance: Stance) -> bool {
        match stance {
            Stance::Medium => matches!(self, Self::High | Self::Mid),
            Stance::Low => matches!(self, Self::Low | Self::Mid),
            Stance::High => false,
        }
    }
}

/// Key into the [`MoveTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveKey {
    /// A grounded attack
    Ground {
        /// Stance the attack was started in
        stance: Stance,
        /// Button
        attack: AttackId,
    },
    /// The jump attack
    Air,
}

impl MoveKey {
    /// Grounded key shorthand.
    #[must_use]
    pub const fn ground(stance: Stance, attack: AttackId) -> Self {
        Self::Ground { stance, attack }
    }
}

impl std::fmt::Display for MoveKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ground { stance, attack } => write!(f, "{}/{}", stance.name(), attack.name()),
            Self::Air => write!(f, "air/attack"),
        }
    }
}

/// Balance data for one move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveData {
    /// Health removed on hit
    pub damage: i32,
    /// Height class
    pub height: Height,
    /// Hitstun applied on hit
    pub hitstun_ms: u64,
    /// Blockstun and forced-block applied on block
    pub blockstun_ms: u64,
    /// Horizontal push on hit (halved on block)
    pub knockback_px: i32,
    /// Grounded knockdown duration, 0 for none
    pub knockdown_ms: u64,
}

impl MoveData {
    /// Creates a move without knockdown.
    #[must_use]
    pub const fn new(
        damage: i32,
        height: Height,
        hitstun_ms: u64,
        blockstun_ms: u64,
        knockback_px: i32,
    ) -> Self {
        Self {
            damage,
            height,
            hitstun_ms,
            blockstun_ms,
            knockback_px,
            knockdown_ms: 0,
        }
    }

    /// Adds a grounded knockdown.
    #[must_use]
    pub const fn with_knockdown(mut self, knockdown_ms: u64) -> Self {
        self.knockdown_ms = knockdown_ms;
        self
    }

    /// Pushback applied to a blocking defender.
    #[must_use]
    pub fn block_pushback(&self) -> i32 {
        (self.knockback_px / 2).max(6)
    }
}

/// Static mapping from [`MoveKey`] to [`MoveData`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveTable {
    moves: AHashMap<MoveKey, MoveData>,
}

impl Default for MoveTable {
    fn default() -> Self {
        use AttackId::{E, R, T, Y};
        use Stance::{Low, Medium};

        let mut moves = AHashMap::new();
        moves.insert(MoveKey::ground(Medium, R), MoveData::new(4, Height::Mid, 160, 120, 10));
        moves.insert(MoveKey::ground(Medium, E), MoveData::new(8, Height::High, 220, 150, 16));
        moves.insert(MoveKey::ground(Medium, T), MoveData::new(6, Height::Mid, 180, 130, 14));
        moves.insert(MoveKey::ground(Medium, Y), MoveData::new(10, Height::High, 260, 170, 20));
        moves.insert(
            MoveKey::ground(Low, R),
            MoveData::new(11, Height::Low, 220, 160, 18).with_knockdown(550),
        );
        moves.insert(MoveKey::Air, MoveData::new(10, Height::High, 240, 160, 22));
        Self { moves }
    }
}

impl MoveTable {
    /// A table with no moves.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            moves: AHashMap::new(),
        }
    }

    /// Overrides or adds one entry.
    #[must_use]
    pub fn with_move(mut self, key: MoveKey, data: MoveData) -> Self {
        self.moves.insert(key, data);
        self
    }

    /// Looks up a move.
    #[must_use]
    pub fn get(&self, key: MoveKey) -> Option<&MoveData> {
        self.moves.get(&key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    /// Returns true if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}
