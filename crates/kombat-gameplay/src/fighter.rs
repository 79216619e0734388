//! Fighter state machine.
//!
//! One parameterised [`Fighter`] runs every character; per-character
//! differences come from its [`CharacterConfig`]. Each tick it:
//! - Latches input and re-derives facing from the opponent's position
//! - Integrates jump physics and landing (knockdown, landing recovery)
//! - Resolves stance, then runs the air or the grounded sub-state machine
//! - Advances the matching clip and resolves attacks on their active frame

use kombat_common::{Facing, PlayerSlot, Rect};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::animation::SpriteFrame;
use crate::character::{CharacterConfig, ClipBank, ClipId};
use crate::clock::{Deadline, Millis};
use crate::combat::{self, Contact};
use crate::combo::ComboState;
use crate::config::{FighterTuning, Playfield};
use crate::events::{CombatEvent, EventBus};
use crate::hitbox::{HitboxTable, WorldBoxes};
use crate::input::{Button, InputSnapshot, InputState};
use crate::moves::{AttackId, MoveKey, MoveTable, Stance};

/// Health at round start.
pub const MAX_HEALTH: i32 = 100;

// ============================================================================
// Tick context
// ============================================================================

/// Everything a fighter reads during one tick besides its opponent.
///
/// Built once per tick by the fight, so both fighters see the same `now`.
#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    /// Timestamp of this tick
    pub now: Millis,
    /// Authored boxes
    pub hitboxes: &'a HitboxTable,
    /// Balance data
    pub moves: &'a MoveTable,
    /// Physics constants
    pub tuning: &'a FighterTuning,
    /// Stage bounds
    pub playfield: &'a Playfield,
    /// Where combat events go, if anywhere
    pub events: Option<&'a EventBus>,
    /// Hitbox editor open: fighters hold their pose
    pub editor: bool,
}

impl<'a> TickContext<'a> {
    /// Creates a context without an event bus.
    #[must_use]
    pub fn new(
        now: Millis,
        hitboxes: &'a HitboxTable,
        moves: &'a MoveTable,
        tuning: &'a FighterTuning,
        playfield: &'a Playfield,
    ) -> Self {
        Self {
            now,
            hitboxes,
            moves,
            tuning,
            playfield,
            events: None,
            editor: false,
        }
    }

    /// Publishes events to `bus`.
    #[must_use]
    pub fn with_events(mut self, bus: &'a EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// Sets the editor flag.
    #[must_use]
    pub fn with_editor(mut self, editor: bool) -> Self {
        self.editor = editor;
        self
    }

    pub(crate) fn publish(&self, event: CombatEvent) {
        if let Some(bus) = self.events {
            bus.publish(event);
        }
    }
}

// ============================================================================
// Sub-states
// ============================================================================

/// Sub-state within the Medium and Low stances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GroundState {
    /// Standing or crouching still
    #[default]
    Idle,
    /// Walking towards the opponent
    MoveFwd,
    /// Walking away from the opponent
    MoveBack,
    /// Blocking
    Block,
    /// Hit reaction
    Hit,
    /// Attacking
    Attack(AttackId),
}

/// Sub-state within the High stance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AirState {
    /// Jump flight
    #[default]
    Move,
    /// Jump attack, also held through landing recovery
    Attack,
    /// Air hit reaction, also held through knockdown
    Hit,
}

/// Terminal end-of-match pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndState {
    /// Won the match
    Win,
    /// Lost the match
    Lose,
}

impl EndState {
    /// Clip played in this state.
    #[must_use]
    pub const fn clip(self) -> ClipId {
        match self {
            Self::Win => ClipId::EndWin,
            Self::Lose => ClipId::EndLose,
        }
    }
}

/// What a renderer or the hitbox editor should show for a fighter.
#[derive(Debug, Clone)]
pub struct AnimationFrame {
    /// Selected clip
    pub clip: ClipId,
    /// Frame index within the clip
    pub index: usize,
    /// Frame to draw, `None` when the clip has no frames
    pub sprite: Option<SpriteFrame>,
}

// ============================================================================
// Fighter
// ============================================================================

/// A fighter and its complete combat state.
#[derive(Debug)]
pub struct Fighter {
    pub(crate) slot: PlayerSlot,
    pub(crate) config: CharacterConfig,
    pub(crate) clips: ClipBank,

    pub(crate) rect: Rect,
    pub(crate) facing: Facing,
    pub(crate) health: i32,
    pub(crate) score: u32,
    pub(crate) tens_lost: u32,

    pub(crate) stance: Stance,
    pub(crate) ground: GroundState,
    pub(crate) air: AirState,
    pub(crate) active_attack: Option<AttackId>,

    pub(crate) is_blocking: bool,
    pub(crate) is_attacking: bool,
    pub(crate) is_hit: bool,
    pub(crate) in_air: bool,

    pub(crate) vy: f32,
    pub(crate) jump_dx: i32,
    pub(crate) air_attack_used: bool,
    pub(crate) air_attack_damage_done: bool,
    pub(crate) air_was_hit: bool,
    pub(crate) air_move_back: bool,

    pub(crate) release_pending: bool,
    pub(crate) damage_done_this_cycle: bool,
    pub(crate) block_clip: ClipId,

    pub(crate) hitstun_until: Deadline,
    pub(crate) blockstun_until: Deadline,
    pub(crate) forced_block_until: Deadline,
    pub(crate) knockdown_until: Deadline,
    pub(crate) air_land_recover_until: Deadline,

    pub(crate) end_state: Option<EndState>,
    pub(crate) input: InputState,
    pub(crate) combo: ComboState,
    rng: fastrand::Rng,
    /// Timestamp of the last tick or action
    pub(crate) now: Millis,
}

impl Fighter {
    /// Creates a fighter at its side's start position, feet on the ground.
    #[must_use]
    pub fn new(
        slot: PlayerSlot,
        config: CharacterConfig,
        clips: ClipBank,
        tuning: &FighterTuning,
        playfield: &Playfield,
    ) -> Self {
        let left_side = slot == PlayerSlot::One;
        let mut rect = Rect::new(
            playfield.start_x(left_side, tuning.fighter_width),
            0,
            tuning.fighter_width,
            tuning.fighter_height,
        );
        rect.set_bottom(playfield.ground_y);

        Self {
            slot,
            config,
            clips,
            rect,
            facing: if left_side { Facing::Right } else { Facing::Left },
            health: MAX_HEALTH,
            score: 0,
            tens_lost: 0,
            stance: Stance::Medium,
            ground: GroundState::Idle,
            air: AirState::Move,
            active_attack: None,
            is_blocking: false,
            is_attacking: false,
            is_hit: false,
            in_air: false,
            vy: 0.0,
            jump_dx: 0,
            air_attack_used: false,
            air_attack_damage_done: false,
            air_was_hit: false,
            air_move_back: false,
            release_pending: false,
            damage_done_this_cycle: false,
            block_clip: ClipId::MedBlock1,
            hitstun_until: Deadline::UNSET,
            blockstun_until: Deadline::UNSET,
            forced_block_until: Deadline::UNSET,
            knockdown_until: Deadline::UNSET,
            air_land_recover_until: Deadline::UNSET,
            end_state: None,
            input: InputState::new(),
            combo: ComboState::new(),
            rng: fastrand::Rng::with_seed(slot.index() as u64 + 1),
            now: Millis::ZERO,
        }
    }

    /// Creates a fighter with placeholder clips sized to the fighter box.
    #[must_use]
    pub fn placeholder(
        slot: PlayerSlot,
        config: CharacterConfig,
        tuning: &FighterTuning,
        playfield: &Playfield,
    ) -> Self {
        let clips = ClipBank::placeholder(
            &config,
            tuning.fighter_width as u32,
            tuning.fighter_height as u32,
        );
        Self::new(slot, config, clips, tuning, playfield)
    }

    /// Reseeds the cosmetic block-pose picker.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = fastrand::Rng::with_seed(seed);
        self
    }

    // ------------------------------------------------------------------------
    // Read-only view
    // ------------------------------------------------------------------------

    /// Player slot.
    #[must_use]
    pub const fn slot(&self) -> PlayerSlot {
        self.slot
    }

    /// Character configuration.
    #[must_use]
    pub const fn config(&self) -> &CharacterConfig {
        &self.config
    }

    /// Bounding box in world space.
    #[must_use]
    pub const fn rect(&self) -> Rect {
        self.rect
    }

    /// Facing direction.
    #[must_use]
    pub const fn facing(&self) -> Facing {
        self.facing
    }

    /// Health, 0 to 100.
    #[must_use]
    pub const fn health(&self) -> i32 {
        self.health
    }

    /// Match score.
    #[must_use]
    pub const fn score(&self) -> u32 {
        self.score
    }

    /// Ten-point health thresholds lost this round.
    #[must_use]
    pub const fn tens_lost(&self) -> u32 {
        self.tens_lost
    }

    /// Current stance.
    #[must_use]
    pub const fn stance(&self) -> Stance {
        self.stance
    }

    /// Grounded sub-state.
    #[must_use]
    pub const fn ground_state(&self) -> GroundState {
        self.ground
    }

    /// Air sub-state.
    #[must_use]
    pub const fn air_state(&self) -> AirState {
        self.air
    }

    /// Attack in progress, if any.
    #[must_use]
    pub const fn active_attack(&self) -> Option<AttackId> {
        self.active_attack
    }

    /// Blocking.
    #[must_use]
    pub const fn is_blocking(&self) -> bool {
        self.is_blocking
    }

    /// In a grounded attack.
    #[must_use]
    pub const fn is_attacking(&self) -> bool {
        self.is_attacking
    }

    /// In a grounded hit reaction.
    #[must_use]
    pub const fn is_hit(&self) -> bool {
        self.is_hit
    }

    /// Airborne.
    #[must_use]
    pub const fn in_air(&self) -> bool {
        self.in_air
    }

    /// In an air attack (flight or landing recovery).
    #[must_use]
    pub fn in_air_attack(&self) -> bool {
        self.stance == Stance::High && self.air == AirState::Attack
    }

    /// Hitstun deadline.
    #[must_use]
    pub const fn hitstun_until(&self) -> Deadline {
        self.hitstun_until
    }

    /// Blockstun deadline.
    #[must_use]
    pub const fn blockstun_until(&self) -> Deadline {
        self.blockstun_until
    }

    /// Block-release lockout deadline.
    #[must_use]
    pub const fn forced_block_until(&self) -> Deadline {
        self.forced_block_until
    }

    /// Knockdown deadline.
    #[must_use]
    pub const fn knockdown_until(&self) -> Deadline {
        self.knockdown_until
    }

    /// Air-attack landing recovery deadline.
    #[must_use]
    pub const fn air_land_recover_until(&self) -> Deadline {
        self.air_land_recover_until
    }

    /// Terminal pose, if the match is over.
    #[must_use]
    pub const fn end_state(&self) -> Option<EndState> {
        self.end_state
    }

    /// Combo tracker.
    #[must_use]
    pub const fn combo(&self) -> &ComboState {
        &self.combo
    }

    /// In hitstun or blockstun.
    #[must_use]
    pub fn is_stunned(&self, now: Millis) -> bool {
        self.hitstun_until.is_active(now) || self.blockstun_until.is_active(now)
    }

    /// Frozen on the ground after an air hit or a sweep.
    #[must_use]
    pub fn is_knocked_down(&self, now: Millis) -> bool {
        self.knockdown_until.is_active(now)
    }

    /// Health reached zero.
    #[must_use]
    pub const fn is_ko(&self) -> bool {
        self.health <= 0
    }

    // ------------------------------------------------------------------------
    // Animation descriptor
    // ------------------------------------------------------------------------

    fn ground_clip(&self, state: GroundState) -> Option<ClipId> {
        let low = self.stance == Stance::Low;
        let id = match state {
            GroundState::Idle if low => ClipId::LowIdle,
            GroundState::Idle => ClipId::MedIdle,
            GroundState::MoveFwd | GroundState::MoveBack if low => ClipId::LowMove,
            GroundState::MoveFwd => ClipId::MedMoveFwd,
            GroundState::MoveBack => ClipId::MedMoveBack,
            GroundState::Block => self.block_clip,
            GroundState::Hit if low => ClipId::LowHit,
            GroundState::Hit => ClipId::MedHit,
            GroundState::Attack(AttackId::R) if low => ClipId::LowAttackR,
            GroundState::Attack(_) if low => return None,
            GroundState::Attack(attack) => ClipId::MedAttack(attack),
        };
        Some(id)
    }

    fn air_clip(&self) -> ClipId {
        match self.air {
            AirState::Move if self.air_move_back => ClipId::HighMoveBack,
            AirState::Move => ClipId::HighMove,
            AirState::Attack => ClipId::HighAttack,
            AirState::Hit => ClipId::HighHit,
        }
    }

    fn frame_of(&self, id: ClipId) -> AnimationFrame {
        let clip = self.clips.get(id);
        AnimationFrame {
            clip: id,
            index: clip.index(),
            sprite: clip.current().cloned(),
        }
    }

    /// Clip, frame index and sprite to draw at `now`.
    #[must_use]
    pub fn animation(&self, now: Millis) -> AnimationFrame {
        if let Some(end) = self.end_state {
            return self.frame_of(end.clip());
        }

        if self.in_air || self.stance == Stance::High {
            if !self.in_air && self.is_knocked_down(now) {
                let hit = self.clips.get(ClipId::HighHit);
                if self.air == AirState::Hit && !hit.is_done() {
                    return self.frame_of(ClipId::HighHit);
                }
                let index = self
                    .config
                    .knockdown_hold_frame
                    .unwrap_or_else(|| hit.last_index())
                    .min(hit.last_index());
                return AnimationFrame {
                    clip: ClipId::HighKnockdown,
                    index,
                    sprite: hit.frame(index).cloned(),
                };
            }
            return self.frame_of(self.air_clip());
        }

        let id = self.ground_clip(self.ground).unwrap_or(if self.stance == Stance::Low {
            ClipId::LowIdle
        } else {
            ClipId::MedIdle
        });
        self.frame_of(id)
    }

    /// Authored boxes for the frame shown at `now`, in world space.
    #[must_use]
    pub fn world_boxes(&self, table: &HitboxTable, now: Millis) -> WorldBoxes {
        let frame = self.animation(now);
        let y_offset = table.foot_offset(frame.sprite.as_ref(), self.config.foot_anchor);
        let index = u32::try_from(frame.index).unwrap_or(u32::MAX);
        table.world_boxes(
            &self.config.name,
            frame.clip.key(),
            index,
            self.rect,
            self.facing,
            y_offset,
        )
    }

    // ------------------------------------------------------------------------
    // Sub-state transitions
    // ------------------------------------------------------------------------

    fn set_ground(&mut self, state: GroundState) {
        if state != self.ground {
            self.restart_ground(state);
        }
    }

    fn restart_ground(&mut self, state: GroundState) {
        self.ground = state;
        if let Some(id) = self.ground_clip(state) {
            self.clips.get_mut(id).reset(self.now);
        }
    }

    fn set_air(&mut self, state: AirState) {
        if state != self.air {
            self.restart_air(state);
        }
    }

    fn restart_air(&mut self, state: AirState) {
        self.air = state;
        let id = self.air_clip();
        self.clips.get_mut(id).reset(self.now);
    }

    fn cancel_attack(&mut self) {
        self.is_attacking = false;
        self.active_attack = None;
        self.release_pending = false;
        self.damage_done_this_cycle = false;
    }

    fn begin_block(&mut self) {
        self.block_clip = match self.stance {
            Stance::Low => ClipId::LowBlock,
            _ if self.rng.bool() => ClipId::MedBlock1,
            _ => ClipId::MedBlock2,
        };
        self.is_blocking = true;
        self.cancel_attack();
        self.restart_ground(GroundState::Block);
    }

    fn end_block(&mut self) {
        self.is_blocking = false;
        self.restart_ground(GroundState::Idle);
    }

    fn begin_attack(&mut self, attack: AttackId, ctx: &TickContext<'_>) {
        let now = ctx.now;
        if self.is_stunned(now) || self.is_knocked_down(now) || self.is_hit {
            return;
        }
        // Crouching only has the R sweep
        if self.stance == Stance::Low && attack != AttackId::R {
            return;
        }

        self.is_attacking = true;
        self.is_blocking = false;
        self.active_attack = Some(attack);
        self.release_pending = false;
        self.damage_done_this_cycle = false;
        self.restart_ground(GroundState::Attack(attack));

        let key = MoveKey::ground(self.stance, attack);
        trace!("{} starts {}", self.slot, key);
        ctx.publish(CombatEvent::AttackStarted {
            slot: self.slot,
            attack: key,
        });
    }

    fn end_attack(&mut self) {
        self.cancel_attack();
        self.restart_ground(GroundState::Idle);
    }

    /// Forces the hit reaction for the current stance.
    ///
    /// Cancels blocking and attacking. A fighter grounded in post-air-attack
    /// recovery snaps back to Medium first.
    pub fn trigger_hit(&mut self, now: Millis) {
        self.now = now;
        self.is_hit = true;
        if !self.in_air && self.stance == Stance::High {
            self.stance = Stance::Medium;
            self.air_land_recover_until.clear();
            self.air = AirState::Move;
        }
        self.is_blocking = false;
        self.cancel_attack();
        self.set_ground(GroundState::Hit);
    }

    /// Forces the air hit reaction. Landing afterwards starts a knockdown.
    pub fn trigger_air_hit(&mut self, now: Millis) {
        self.now = now;
        self.air_was_hit = true;
        self.is_blocking = false;
        self.cancel_attack();
        self.set_air(AirState::Hit);
    }

    /// Puts the fighter back into its block pose after a blocked hit.
    pub(crate) fn force_block(&mut self, now: Millis) {
        self.now = now;
        self.cancel_attack();
        if self.is_blocking && self.ground == GroundState::Block {
            return;
        }
        self.begin_block();
    }

    /// Enters or leaves the terminal win/lose pose.
    pub fn set_end_state(&mut self, state: Option<EndState>, now: Millis) {
        self.now = now;
        self.end_state = state;
        if let Some(end) = state {
            self.clips.get_mut(end.clip()).reset(now);
        }
    }

    /// Full neutral reset for a new round. Score is kept.
    pub fn reset_for_round(&mut self, x: i32, playfield: &Playfield, now: Millis) {
        self.now = now;
        self.rect.x = x;
        self.rect.clamp_x(playfield.min_x, playfield.max_x);
        self.rect.set_bottom(playfield.ground_y);
        self.health = MAX_HEALTH;
        self.tens_lost = 0;

        self.stance = Stance::Medium;
        self.air = AirState::Move;
        self.active_attack = None;
        self.is_blocking = false;
        self.is_attacking = false;
        self.is_hit = false;
        self.in_air = false;
        self.vy = 0.0;
        self.jump_dx = 0;
        self.air_attack_used = false;
        self.air_attack_damage_done = false;
        self.air_was_hit = false;
        self.air_move_back = false;
        self.release_pending = false;
        self.damage_done_this_cycle = false;

        self.hitstun_until.clear();
        self.blockstun_until.clear();
        self.forced_block_until.clear();
        self.knockdown_until.clear();
        self.air_land_recover_until.clear();

        self.end_state = None;
        self.input = InputState::new();
        self.combo.reset();
        self.restart_ground(GroundState::Idle);
    }

    /// Moves every stored deadline and clip tick forward after a pause.
    pub fn shift_timers(&mut self, ms: u64) {
        self.hitstun_until.shift(ms);
        self.blockstun_until.shift(ms);
        self.forced_block_until.shift(ms);
        self.knockdown_until.shift(ms);
        self.air_land_recover_until.shift(ms);
        self.clips.shift(ms);
        self.combo.shift(ms);
        self.now = self.now.plus(ms);
    }

    /// Re-latches input so buttons held across a pause need a fresh press.
    pub fn resync_input(&mut self, snapshot: &InputSnapshot) {
        self.input.reset_to(snapshot);
    }

    // ------------------------------------------------------------------------
    // Per-tick update
    // ------------------------------------------------------------------------

    /// Runs one tick.
    pub fn update(&mut self, input: &InputSnapshot, opponent: &mut Self, ctx: &TickContext<'_>) {
        if ctx.editor {
            return;
        }
        let now = ctx.now;
        self.now = now;
        self.input.update(input);

        if let Some(end) = self.end_state {
            self.clips.get_mut(end.clip()).advance(now);
            return;
        }

        self.facing = Facing::towards(self.rect.center_x(), opponent.rect.center_x());

        self.update_jump(ctx);

        if self.is_knocked_down(now) {
            self.stance = Stance::High;
            if self.air == AirState::Hit {
                let clip = self.clips.get_mut(ClipId::HighHit);
                if !clip.is_done() {
                    clip.advance(now);
                }
            }
            return;
        }

        // Never stay in High on the ground once knockdown and recovery ended
        if !self.in_air
            && self.stance == Stance::High
            && !self.air_land_recover_until.is_active(now)
        {
            self.stance = Stance::Medium;
            self.air_land_recover_until.clear();
            self.air = AirState::Move;
            self.air_was_hit = false;
            self.air_attack_damage_done = false;
        }

        self.update_stance(now);

        if self.stance == Stance::High {
            self.update_air(opponent, ctx);
        } else {
            self.update_ground(opponent, ctx);
        }
    }

    fn update_jump(&mut self, ctx: &TickContext<'_>) {
        let now = ctx.now;
        if self.is_knocked_down(now) {
            self.in_air = false;
            self.vy = 0.0;
            self.jump_dx = 0;
            return;
        }

        if !self.in_air {
            let can_jump = !self.is_stunned(now)
                && self.input.just_pressed(Button::Jump)
                && !self.is_hit
                && !self.is_blocking
                && !self.is_attacking
                && self.rect.bottom() >= ctx.playfield.ground_y;
            if !can_jump {
                return;
            }
            self.start_jump(ctx.tuning);
        }

        // No air block
        if self.is_blocking {
            self.end_block();
        }

        let field = ctx.playfield;
        if self.jump_dx != 0 {
            self.rect.x += self.jump_dx;
            self.rect.clamp_x(field.min_x, field.max_x);
        }
        self.rect.y += self.vy as i32;
        self.vy += ctx.tuning.gravity;

        if self.rect.bottom() >= field.ground_y {
            self.land(ctx);
        }
    }

    fn start_jump(&mut self, tuning: &FighterTuning) {
        // Direction is committed at takeoff
        self.jump_dx = self.input.horizontal() * tuning.jump_speed;
        self.vy = tuning.jump_velocity;
        self.in_air = true;

        self.air_attack_used = false;
        self.air_attack_damage_done = false;
        self.air_was_hit = false;
        self.air_land_recover_until.clear();
        self.air_move_back = self.config.air_move_back
            && self.jump_dx != 0
            && self.jump_dx.signum() != self.facing.sign();

        self.stance = Stance::High;
        self.restart_air(AirState::Move);
        debug!("{} jumps (dx {})", self.slot, self.jump_dx);
    }

    fn land(&mut self, ctx: &TickContext<'_>) {
        let now = ctx.now;
        self.rect.set_bottom(ctx.playfield.ground_y);
        self.in_air = false;
        self.vy = 0.0;
        self.jump_dx = 0;
        self.air_move_back = false;

        if self.air_was_hit {
            self.knockdown_until.extend(now, ctx.tuning.air_knockdown_ms);
            self.air_was_hit = false;
            // Keep playing the air hit clip into the knockdown hold
            self.air = AirState::Hit;
            debug!("{} knocked down until {:?}", self.slot, self.knockdown_until.get());
            return;
        }
        if self.air == AirState::Attack {
            self.air_land_recover_until
                .start(now, ctx.tuning.air_land_recover_ms);
            return;
        }
        self.air = AirState::Move;
    }

    fn update_stance(&mut self, now: Millis) {
        if self.is_stunned(now) || self.is_knocked_down(now) || self.is_hit {
            return;
        }
        if self.in_air || self.air_land_recover_until.is_active(now) {
            self.stance = Stance::High;
            return;
        }

        let next = if self.input.held(Button::Crouch) {
            Stance::Low
        } else {
            Stance::Medium
        };
        if next == self.stance {
            return;
        }

        self.stance = next;
        if self.is_attacking {
            self.end_attack();
        } else if self.is_blocking {
            self.begin_block();
        } else {
            self.restart_ground(self.ground);
        }
    }

    fn update_air(&mut self, opponent: &mut Self, ctx: &TickContext<'_>) {
        let now = ctx.now;

        // Landing recovery holds the last air-attack frame
        if !self.in_air && self.air_land_recover_until.is_active(now) {
            self.air = AirState::Attack;
            return;
        }

        if self.in_air
            && !self.air_attack_used
            && !self.air_was_hit
            && self.air == AirState::Move
            && self.input.attack_pressed().is_some()
        {
            self.air_attack_used = true;
            self.air_attack_damage_done = false;
            self.restart_air(AirState::Attack);
            ctx.publish(CombatEvent::AttackStarted {
                slot: self.slot,
                attack: MoveKey::Air,
            });
            return;
        }

        match self.air {
            AirState::Hit => {
                self.clips.get_mut(ClipId::HighHit).advance(now);
            }
            AirState::Attack => {
                let active = ctx.tuning.air_attack_active_frame;
                let clip = self.clips.get_mut(ClipId::HighAttack);
                let due = if clip.is_empty() {
                    true
                } else {
                    let step = clip.advance(now);
                    step.advanced && clip.index() == active.min(clip.last_index())
                };
                if due && !self.air_attack_damage_done {
                    self.air_attack_damage_done = true;
                    combat::apply_damage(self, opponent, MoveKey::Air, ctx);
                }
            }
            AirState::Move => {
                let id = self.air_clip();
                self.clips.get_mut(id).advance(now);
            }
        }
    }

    fn update_ground(&mut self, opponent: &mut Self, ctx: &TickContext<'_>) {
        let now = ctx.now;
        if !self.is_attacking {
            if let Some(config) = &self.config.combo {
                self.combo.expire_stale(now, config);
            }
        }

        if self.is_hit {
            self.update_hit_anim(now);
            return;
        }

        if !self.is_stunned(now) {
            self.update_block(now);
            if !self.is_blocking {
                self.update_attacks(ctx);
            }
            self.update_movement(ctx);
        }

        match self.ground {
            GroundState::Attack(_) => self.update_attack_anim_and_damage(opponent, ctx),
            GroundState::Hit => self.update_hit_anim(now),
            state => {
                if let Some(id) = self.ground_clip(state) {
                    self.clips.get_mut(id).advance(now);
                }
            }
        }
    }

    fn update_hit_anim(&mut self, now: Millis) {
        let id = if self.stance == Stance::Low {
            ClipId::LowHit
        } else {
            ClipId::MedHit
        };
        let clip = self.clips.get_mut(id);
        clip.advance(now);
        let finished = clip.is_done() || clip.is_empty();
        // Hold the last frame until hitstun runs out
        if finished && !self.hitstun_until.is_active(now) {
            self.is_hit = false;
            self.set_ground(GroundState::Idle);
        }
    }

    fn update_block(&mut self, now: Millis) {
        if self.input.held(Button::Block) {
            if !self.is_blocking && !self.is_hit {
                self.begin_block();
            }
        } else if self.is_blocking && !self.forced_block_until.is_active(now) {
            self.end_block();
        }
    }

    fn update_attacks(&mut self, ctx: &TickContext<'_>) {
        let now = ctx.now;
        let mut pressed = self.input.attack_pressed();
        if self.stance == Stance::Low && pressed != Some(AttackId::R) {
            pressed = None;
        }

        if let (Some(config), Some(current)) = (&self.config.combo, self.active_attack) {
            if self.is_attacking && self.stance == Stance::Medium {
                let clip = self.clips.get(ClipId::MedAttack(current));
                self.combo
                    .try_queue(now, config, current, clip.index(), clip.len(), &self.input);
            }
        }

        // Short lockout after a long chain
        if !self.is_attacking && self.combo.on_cooldown(now) {
            pressed = None;
        }

        if !self.is_hit && !self.is_blocking && !self.is_attacking {
            if let Some(attack) = pressed {
                self.begin_attack(attack, ctx);
            }
        }

        if let (true, Some(attack)) = (self.is_attacking, self.active_attack) {
            let button = if self.stance == Stance::Low {
                Button::AttackR
            } else {
                Button::for_attack(attack)
            };
            self.release_pending = !self.input.held(button);
        }
    }

    fn update_movement(&mut self, ctx: &TickContext<'_>) {
        let now = ctx.now;
        if self.is_stunned(now)
            || self.is_knocked_down(now)
            || self.is_hit
            || self.is_blocking
            || self.is_attacking
            || !self.stance.is_grounded()
        {
            return;
        }

        let mut dir = self.input.horizontal();
        if self.stance == Stance::Low && !self.config.crouch_walk {
            dir = 0;
        }
        if dir == 0 {
            self.set_ground(GroundState::Idle);
            return;
        }

        self.rect.x += dir * ctx.tuning.walk_speed;
        self.rect.clamp_x(ctx.playfield.min_x, ctx.playfield.max_x);
        let state = if dir == self.facing.sign() {
            GroundState::MoveFwd
        } else {
            GroundState::MoveBack
        };
        self.set_ground(state);
    }

    fn update_attack_anim_and_damage(&mut self, opponent: &mut Self, ctx: &TickContext<'_>) {
        let now = ctx.now;
        let Some(attack) = self.active_attack else {
            self.end_attack();
            return;
        };
        let Some(id) = self.ground_clip(GroundState::Attack(attack)) else {
            self.end_attack();
            return;
        };
        let key = MoveKey::ground(self.stance, attack);
        let low = self.stance == Stance::Low;
        let active_frame = ctx.tuning.attack_active_frame;

        let clip = self.clips.get_mut(id);
        let empty = clip.is_empty();
        let (due, finished) = if empty {
            (true, true)
        } else {
            let active = if low {
                clip.last_index()
            } else {
                active_frame.min(clip.last_index())
            };
            let step = clip.advance(now);
            (step.advanced && clip.index() == active, clip.is_done())
        };

        if due && !self.damage_done_this_cycle {
            self.damage_done_this_cycle = true;
            let contact = combat::apply_damage(self, opponent, key, ctx);
            if let (Contact::Hit { damage, .. }, Some(config)) = (contact, &self.config.combo) {
                if damage > 0 {
                    self.combo.register_hit(now, config);
                }
            }
        }

        if !finished {
            return;
        }
        if empty {
            self.end_attack();
        } else {
            self.finish_attack_cycle(ctx);
        }
    }

    fn finish_attack_cycle(&mut self, ctx: &TickContext<'_>) {
        let now = ctx.now;
        let followup = match &self.config.combo {
            Some(config) if self.stance == Stance::Medium => self.combo.take_followup(now, config),
            _ => None,
        };
        if let Some(next) = followup {
            debug!("{} chains into {}", self.slot, next.name());
            self.end_attack();
            self.begin_attack(next, ctx);
            return;
        }

        if self.release_pending {
            self.end_attack();
            return;
        }

        // Held through the cycle: replay it
        self.damage_done_this_cycle = false;
        self.restart_ground(self.ground);
        if let Some(attack) = self.active_attack {
            ctx.publish(CombatEvent::AttackStarted {
                slot: self.slot,
                attack: MoveKey::ground(self.stance, attack),
            });
        }
    }
}

// ============================================================================
// Test fixtures
// ============================================================================

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Shared tables for building fighters and contexts in tests.
    pub(crate) struct Arena {
        pub hitboxes: HitboxTable,
        pub moves: MoveTable,
        pub tuning: FighterTuning,
        pub playfield: Playfield,
        pub events: EventBus,
    }

    impl Arena {
        pub fn new() -> Self {
            Self {
                hitboxes: HitboxTable::new(),
                moves: MoveTable::default(),
                tuning: FighterTuning::default(),
                playfield: Playfield::default(),
                events: EventBus::new(1024),
            }
        }

        pub fn ctx(&self, now: u64) -> TickContext<'_> {
            TickContext::new(
                Millis(now),
                &self.hitboxes,
                &self.moves,
                &self.tuning,
                &self.playfield,
            )
            .with_events(&self.events)
        }

        pub fn fighter(&self, slot: PlayerSlot, preset: &str) -> Fighter {
            let config = CharacterConfig::preset(preset).expect("preset exists");
            Fighter::placeholder(slot, config, &self.tuning, &self.playfield)
        }

        /// Two fighters facing each other, P2 just inside P1's reach.
        pub fn close_pair(&self) -> (Fighter, Fighter) {
            let mut p1 = self.fighter(PlayerSlot::One, "nate");
            let mut p2 = self.fighter(PlayerSlot::Two, "nate");
            p1.rect.x = 200;
            p2.rect.x = p1.rect.right() + 5;
            (p1, p2)
        }
    }

    /// Hit, block, ground attack and air attack never overlap.
    pub(crate) fn assert_exclusive(f: &Fighter) {
        let active = [f.is_hit, f.is_blocking, f.is_attacking, f.in_air_attack()]
            .iter()
            .filter(|b| **b)
            .count();
        assert!(active <= 1, "more than one exclusive flag set: {f:?}");
    }
}
