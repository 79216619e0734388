//! Character configuration and clip banks.
//!
//! Every character shares one state machine. What differs is declared here:
//! clip frame counts and rates, and capability flags such as crouch-walking,
//! a separate "jumping away" clip, combo chaining and foot anchoring.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::animation::AnimationClip;
use crate::combo::ComboConfig;
use crate::hitbox::FootAnchor;
use crate::moves::AttackId;

/// Errors raised while building a character.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CharacterError {
    /// No preset with that name
    #[error("unknown character preset: {0}")]
    UnknownPreset(String),
}

// ============================================================================
// Clip identifiers
// ============================================================================

/// Identifies an animation clip of a fighter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClipId {
    /// Standing idle
    MedIdle,
    /// Standing walk towards the opponent
    MedMoveFwd,
    /// Standing walk away from the opponent
    MedMoveBack,
    /// First standing block pose
    MedBlock1,
    /// Second standing block pose
    MedBlock2,
    /// Standing hit reaction
    MedHit,
    /// Standing attack
    MedAttack(AttackId),
    /// Crouch idle
    LowIdle,
    /// Crouch walk
    LowMove,
    /// Crouch block
    LowBlock,
    /// Crouch hit reaction
    LowHit,
    /// Crouch R attack (sweep)
    LowAttackR,
    /// Jump
    HighMove,
    /// Jump away from the opponent
    HighMoveBack,
    /// Jump attack and its landing hold
    HighAttack,
    /// Air hit reaction
    HighHit,
    /// Grounded knockdown hold after an air hit (drawn from [`ClipId::HighHit`])
    HighKnockdown,
    /// Match won
    EndWin,
    /// Match lost
    EndLose,
}

impl ClipId {
    /// Every clip that owns frames.
    pub const BANKED: [Self; 21] = [
        Self::MedIdle,
        Self::MedMoveFwd,
        Self::MedMoveBack,
        Self::MedBlock1,
        Self::MedBlock2,
        Self::MedHit,
        Self::MedAttack(AttackId::R),
        Self::MedAttack(AttackId::E),
        Self::MedAttack(AttackId::T),
        Self::MedAttack(AttackId::Y),
        Self::LowIdle,
        Self::LowMove,
        Self::LowBlock,
        Self::LowHit,
        Self::LowAttackR,
        Self::HighMove,
        Self::HighMoveBack,
        Self::HighAttack,
        Self::HighHit,
        Self::EndWin,
        Self::EndLose,
    ];

    /// Key used by the hitbox authoring file.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::MedIdle => "med_idle",
            Self::MedMoveFwd => "med_move_fwd",
            Self::MedMoveBack => "med_move_back",
            Self::MedBlock1 | Self::MedBlock2 => "med_block",
            Self::MedHit => "med_hit",
            Self::MedAttack(AttackId::R) => "med_attack_r",
            Self::MedAttack(AttackId::E) => "med_attack_e",
            Self::MedAttack(AttackId::T) => "med_attack_t",
            Self::MedAttack(AttackId::Y) => "med_attack_y",
            Self::LowIdle => "low_idle",
            Self::LowMove => "low_move",
            Self::LowBlock => "low_block",
            Self::LowHit => "low_hit",
            Self::LowAttackR => "low_attack_r",
            Self::HighMove | Self::HighMoveBack => "high_move",
            Self::HighAttack => "high_attack",
            Self::HighHit => "high_hit",
            Self::HighKnockdown => "high_knockdown",
            Self::EndWin => "end_win",
            Self::EndLose => "end_lose",
        }
    }

    /// Clip whose frames this id plays.
    #[must_use]
    pub const fn source(self) -> Self {
        match self {
            Self::HighKnockdown => Self::HighHit,
            other => other,
        }
    }

    const fn slot(self) -> usize {
        match self.source() {
            Self::MedIdle => 0,
            Self::MedMoveFwd => 1,
            Self::MedMoveBack => 2,
            Self::MedBlock1 => 3,
            Self::MedBlock2 => 4,
            Self::MedHit => 5,
            Self::MedAttack(AttackId::R) => 6,
            Self::MedAttack(AttackId::E) => 7,
            Self::MedAttack(AttackId::T) => 8,
            Self::MedAttack(AttackId::Y) => 9,
            Self::LowIdle => 10,
            Self::LowMove => 11,
            Self::LowBlock => 12,
            Self::LowHit => 13,
            Self::LowAttackR => 14,
            Self::HighMove => 15,
            Self::HighMoveBack => 16,
            Self::HighAttack => 17,
            Self::HighHit | Self::HighKnockdown => 18,
            Self::EndWin => 19,
            Self::EndLose => 20,
        }
    }
}

impl std::fmt::Display for ClipId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

// ============================================================================
// Clip specs and banks
// ============================================================================

/// Frame count and playback of one clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipSpec {
    /// Number of frames
    pub frames: usize,
    /// Playback rate
    pub fps: u32,
    /// Wrap around at the end
    pub looping: bool,
}

impl ClipSpec {
    const fn looping(frames: usize, fps: u32) -> Self {
        Self {
            frames,
            fps,
            looping: true,
        }
    }

    const fn once(frames: usize, fps: u32) -> Self {
        Self {
            frames,
            fps,
            looping: false,
        }
    }
}

const INTRO_FPS: u32 = 24;
const IDLE_FPS: u32 = 10;
const MOVE_FPS: u32 = 12;
const BLOCK_FPS: u32 = 14;
const ATTACK_FPS: u32 = 14;
const HIT_FPS: u32 = 22;

fn default_spec(id: ClipId) -> ClipSpec {
    match id.source() {
        ClipId::MedIdle => ClipSpec::looping(8, IDLE_FPS),
        ClipId::MedMoveFwd | ClipId::MedMoveBack => ClipSpec::looping(8, MOVE_FPS),
        ClipId::MedBlock1 | ClipId::MedBlock2 => ClipSpec::once(4, BLOCK_FPS),
        ClipId::MedHit => ClipSpec::once(5, HIT_FPS),
        ClipId::MedAttack(AttackId::R) | ClipId::MedAttack(AttackId::T) => {
            ClipSpec::once(5, ATTACK_FPS)
        }
        ClipId::MedAttack(AttackId::E) => ClipSpec::once(6, ATTACK_FPS),
        ClipId::MedAttack(AttackId::Y) => ClipSpec::once(10, ATTACK_FPS),
        ClipId::LowIdle => ClipSpec::looping(6, IDLE_FPS),
        ClipId::LowMove => ClipSpec::looping(6, MOVE_FPS),
        ClipId::LowBlock => ClipSpec::once(3, BLOCK_FPS),
        ClipId::LowHit => ClipSpec::once(4, HIT_FPS),
        ClipId::LowAttackR => ClipSpec::once(6, ATTACK_FPS),
        ClipId::HighMove | ClipId::HighMoveBack => ClipSpec::looping(8, MOVE_FPS),
        ClipId::HighAttack => ClipSpec::once(4, ATTACK_FPS),
        ClipId::HighHit | ClipId::HighKnockdown => ClipSpec::once(6, HIT_FPS),
        ClipId::EndWin | ClipId::EndLose => ClipSpec::once(12, INTRO_FPS),
    }
}

/// The animation clips of one fighter, one slot per banked [`ClipId`].
#[derive(Debug, Clone)]
pub struct ClipBank {
    clips: Vec<AnimationClip>,
}

impl Default for ClipBank {
    fn default() -> Self {
        Self {
            clips: ClipId::BANKED
                .iter()
                .map(|id| {
                    let spec = default_spec(*id);
                    AnimationClip::empty(spec.fps, spec.looping)
                })
                .collect(),
        }
    }
}

impl ClipBank {
    /// Builds placeholder clips (canvas size only) from a character's specs.
    #[must_use]
    pub fn placeholder(config: &CharacterConfig, width: u32, height: u32) -> Self {
        Self {
            clips: ClipId::BANKED
                .iter()
                .map(|id| {
                    let spec = config.clip_spec(*id);
                    AnimationClip::placeholder(spec.frames, spec.fps, spec.looping, width, height)
                })
                .collect(),
        }
    }

    /// Replaces one clip, e.g. with frames decoded from disk.
    pub fn set(&mut self, id: ClipId, clip: AnimationClip) {
        self.clips[id.slot()] = clip;
    }

    /// Builder form of [`set`](Self::set).
    #[must_use]
    pub fn with_clip(mut self, id: ClipId, clip: AnimationClip) -> Self {
        self.set(id, clip);
        self
    }

    /// Clip for `id`.
    #[must_use]
    pub fn get(&self, id: ClipId) -> &AnimationClip {
        &self.clips[id.slot()]
    }

    /// Mutable clip for `id`.
    pub fn get_mut(&mut self, id: ClipId) -> &mut AnimationClip {
        &mut self.clips[id.slot()]
    }

    /// Moves every clip's tick reference forward after a pause.
    pub fn shift(&mut self, ms: u64) {
        for clip in &mut self.clips {
            clip.shift(ms);
        }
    }
}

// ============================================================================
// Character configuration
// ============================================================================

/// Declarative description of a character.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterConfig {
    /// Name, also the hitbox file key
    pub name: String,
    /// May walk while crouching
    pub crouch_walk: bool,
    /// Plays [`ClipId::HighMoveBack`] when a jump moves away from the opponent
    pub air_move_back: bool,
    /// Hit-confirmed chaining of standing attacks
    pub combo: Option<ComboConfig>,
    /// Foot anchoring of hit and push boxes
    pub foot_anchor: Option<FootAnchor>,
    /// Frame of the air-hit clip held during knockdown (last frame if unset)
    pub knockdown_hold_frame: Option<usize>,
    clip_overrides: AHashMap<ClipId, ClipSpec>,
}

impl CharacterConfig {
    /// Preset names accepted by [`preset`](Self::preset).
    pub const PRESETS: [&'static str; 4] = ["nate", "connor", "blake", "scorpion"];

    /// A plain character with default clips and no special capabilities.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            crouch_walk: true,
            air_move_back: false,
            combo: None,
            foot_anchor: None,
            knockdown_hold_frame: None,
            clip_overrides: AHashMap::new(),
        }
    }

    /// Looks up a built-in character.
    ///
    /// # Errors
    ///
    /// Returns [`CharacterError::UnknownPreset`] for names not in [`PRESETS`](Self::PRESETS).
    pub fn preset(name: &str) -> Result<Self, CharacterError> {
        match name {
            "nate" => Ok(Self::new("nate")),
            "connor" => Ok(Self::new("connor")
                .with_clip(ClipId::MedAttack(AttackId::Y), ClipSpec::once(9, ATTACK_FPS))),
            "blake" => Ok(Self::new("blake")
                .with_clip(ClipId::MedIdle, ClipSpec::looping(10, IDLE_FPS))
                .with_clip(ClipId::HighHit, ClipSpec::once(7, HIT_FPS))),
            "scorpion" => Ok(Self::new("scorpion")
                .with_crouch_walk(false)
                .with_air_move_back(true)
                .with_combo(ComboConfig::default())
                .with_foot_anchor(FootAnchor { nudge: -30 })),
            other => Err(CharacterError::UnknownPreset(other.to_owned())),
        }
    }

    /// Enables or disables crouch-walking.
    #[must_use]
    pub fn with_crouch_walk(mut self, enabled: bool) -> Self {
        self.crouch_walk = enabled;
        self
    }

    /// Enables or disables the jump-away clip.
    #[must_use]
    pub fn with_air_move_back(mut self, enabled: bool) -> Self {
        self.air_move_back = enabled;
        self
    }

    /// Enables combo chaining.
    #[must_use]
    pub fn with_combo(mut self, combo: ComboConfig) -> Self {
        self.combo = Some(combo);
        self
    }

    /// Enables foot anchoring.
    #[must_use]
    pub fn with_foot_anchor(mut self, anchor: FootAnchor) -> Self {
        self.foot_anchor = Some(anchor);
        self
    }

    /// Sets the knockdown hold frame.
    #[must_use]
    pub fn with_knockdown_hold_frame(mut self, index: usize) -> Self {
        self.knockdown_hold_frame = Some(index);
        self
    }

    /// Overrides one clip's frame count and playback.
    #[must_use]
    pub fn with_clip(mut self, id: ClipId, spec: ClipSpec) -> Self {
        self.clip_overrides.insert(id.source(), spec);
        self
    }

    /// Frame count and playback for `id`.
    #[must_use]
    pub fn clip_spec(&self, id: ClipId) -> ClipSpec {
        self.clip_overrides
            .get(&id.source())
            .copied()
            .unwrap_or_else(|| default_spec(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        for name in CharacterConfig::PRESETS {
            let config = CharacterConfig::preset(name).expect("preset exists");
            assert_eq!(config.name, name);
        }
        assert_eq!(
            CharacterConfig::preset("raiden"),
            Err(CharacterError::UnknownPreset("raiden".into()))
        );
    }

    #[test]
    fn test_scorpion_capabilities() {
        let scorpion = CharacterConfig::preset("scorpion").expect("scorpion");
        assert!(!scorpion.crouch_walk);
        assert!(scorpion.air_move_back);
        assert!(scorpion.combo.is_some());
        assert_eq!(scorpion.foot_anchor, Some(FootAnchor { nudge: -30 }));

        let nate = CharacterConfig::preset("nate").expect("nate");
        assert!(nate.crouch_walk);
        assert!(nate.combo.is_none());
        assert!(nate.foot_anchor.is_none());
    }

    #[test]
    fn test_clip_keys() {
        assert_eq!(ClipId::MedBlock2.key(), "med_block");
        assert_eq!(ClipId::MedAttack(AttackId::T).key(), "med_attack_t");
        assert_eq!(ClipId::HighKnockdown.key(), "high_knockdown");
        assert_eq!(ClipId::HighKnockdown.source(), ClipId::HighHit);
    }

    #[test]
    fn test_bank_slots_are_distinct() {
        let mut slots: Vec<usize> = ClipId::BANKED.iter().map(|c| c.slot()).collect();
        slots.sort_unstable();
        slots.dedup();
        assert_eq!(slots.len(), ClipId::BANKED.len());
    }

    #[test]
    fn test_placeholder_bank_uses_overrides() {
        let connor = CharacterConfig::preset("connor").expect("connor");
        let bank = ClipBank::placeholder(&connor, 300, 360);
        assert_eq!(bank.get(ClipId::MedAttack(AttackId::Y)).len(), 9);
        assert_eq!(bank.get(ClipId::LowAttackR).len(), 6);
        assert_eq!(bank.get(ClipId::HighKnockdown).len(), 6);
        assert!(bank.get(ClipId::MedIdle).is_looping());
    }

    #[test]
    fn test_default_bank_is_empty() {
        let bank = ClipBank::default();
        assert!(bank.get(ClipId::MedIdle).is_empty());
    }
}
