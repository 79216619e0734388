//! Combat resolution.
//!
//! This module decides what happens when an attack reaches its active frame:
//! - Contact via hit boxes against hurt boxes, or the reach fallback
//! - Crouching under high attacks
//! - Block correctness, blockstun and the forced-block lockout
//! - Damage, threshold scoring, hitstun, knockback and knockdown
//!
//! It also owns the continuous push-box separation run after both fighters
//! have updated.

use kombat_common::{Facing, Rect};
use tracing::{debug, error, trace};

use crate::clock::Millis;
use crate::config::{FighterTuning, Playfield};
use crate::events::CombatEvent;
use crate::fighter::{Fighter, TickContext, MAX_HEALTH};
use crate::hitbox::HitboxTable;
use crate::moves::{Height, MoveKey, Stance};

/// Points awarded per ten-health threshold crossed.
pub const POINTS_PER_THRESHOLD: u32 = 200;

/// Outcome of one attack resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contact {
    /// Out of range, or the move is unknown
    Whiff,
    /// High attack passed over a crouching defender
    Ducked,
    /// Stopped by a correct block
    Blocked {
        /// Pushback applied to the defender
        pushback: i32,
    },
    /// Landed
    Hit {
        /// Health actually removed (0 if the defender was already at 0)
        damage: i32,
        /// Score awarded to the attacker
        points: u32,
    },
}

impl Contact {
    /// Returns true if the attack touched the defender at all.
    #[must_use]
    pub const fn connected(self) -> bool {
        matches!(self, Self::Blocked { .. } | Self::Hit { .. })
    }
}

/// Fallback reach rectangle in front of a fighter, full body height.
#[must_use]
pub fn reach_rect(body: Rect, facing: Facing, pad: i32) -> Rect {
    match facing {
        Facing::Right => Rect::new(body.right(), body.y, pad, body.h),
        Facing::Left => Rect::new(body.left() - pad, body.y, pad, body.h),
    }
}

/// Returns true if the attacker's current frame reaches the defender.
///
/// Uses authored hit boxes against hurt boxes when both sides have them for
/// their current frames, else the reach rectangle against the defender's
/// bounding box.
#[must_use]
pub fn attack_connects(
    attacker: &Fighter,
    defender: &Fighter,
    table: &HitboxTable,
    tuning: &FighterTuning,
    now: Millis,
) -> bool {
    let own = attacker.world_boxes(table, now);
    let other = defender.world_boxes(table, now);
    if !own.hit.is_empty() && !other.hurt.is_empty() {
        return own
            .hit
            .iter()
            .any(|hit| other.hurt.iter().any(|hurt| hit.intersects(*hurt)));
    }

    reach_rect(attacker.rect, attacker.facing, tuning.reach_pad).intersects(defender.rect)
}

/// Awards points for every ten-health threshold newly crossed.
///
/// `tens_lost` only ever grows, so calling this again with the same or a
/// higher health awards nothing.
pub fn award_threshold_score(score: &mut u32, tens_lost: &mut u32, post_health: i32) -> u32 {
    let lost = (MAX_HEALTH - post_health.clamp(0, MAX_HEALTH)) / 10;
    let new_tens = lost.unsigned_abs();
    if new_tens <= *tens_lost {
        return 0;
    }
    let points = (new_tens - *tens_lost) * POINTS_PER_THRESHOLD;
    *score += points;
    *tens_lost = new_tens;
    points
}

fn clamp_to(rect: &mut Rect, playfield: &Playfield) {
    rect.clamp_x(playfield.min_x, playfield.max_x);
}

/// Resolves `key` from `attacker` against `defender` at `ctx.now`.
///
/// An unknown key is a data error: it asserts in debug builds and is logged
/// and skipped in release builds.
pub fn apply_damage(
    attacker: &mut Fighter,
    defender: &mut Fighter,
    key: MoveKey,
    ctx: &TickContext<'_>,
) -> Contact {
    debug_assert!(ctx.moves.get(key).is_some(), "no move data for {key}");
    let Some(data) = ctx.moves.get(key).copied() else {
        error!("No move data for {}, attack skipped", key);
        return Contact::Whiff;
    };
    let now = ctx.now;

    if !attack_connects(attacker, defender, ctx.hitboxes, ctx.tuning, ctx.now) {
        return Contact::Whiff;
    }

    if data.height == Height::High && defender.stance == Stance::Low && !defender.in_air {
        trace!("{} {} passed over a crouch", attacker.slot, key);
        return Contact::Ducked;
    }

    let direction = attacker.facing.sign();

    if defender.is_blocking && data.height.blocked_by(defender.stance) {
        defender.blockstun_until.extend(now, data.blockstun_ms);
        defender.forced_block_until.extend(now, data.blockstun_ms);
        defender.force_block(now);

        let pushback = data.block_pushback();
        defender.rect.x += direction * pushback;
        clamp_to(&mut defender.rect, ctx.playfield);

        debug!("{} blocked {} from {}", defender.slot, key, attacker.slot);
        ctx.publish(CombatEvent::BlockLanded {
            attacker: attacker.slot,
            attack: key,
            pushback,
        });
        return Contact::Blocked { pushback };
    }

    let pre_health = defender.health;
    defender.health = (pre_health - data.damage).max(0);
    let damage = pre_health - defender.health;
    let mut points = 0;

    if damage > 0 {
        points = award_threshold_score(
            &mut attacker.score,
            &mut defender.tens_lost,
            defender.health,
        );
        debug!(
            "{} hit {} with {} for {} ({} left)",
            attacker.slot, defender.slot, key, damage, defender.health
        );
        ctx.publish(CombatEvent::HitLanded {
            attacker: attacker.slot,
            attack: key,
            damage,
            health: defender.health,
        });
        if points > 0 {
            ctx.publish(CombatEvent::ScoreAwarded {
                slot: attacker.slot,
                points,
                total: attacker.score,
            });
        }
        if defender.health == 0 {
            ctx.publish(CombatEvent::KnockedOut {
                slot: defender.slot,
            });
        }
    }

    defender.hitstun_until.extend(now, data.hitstun_ms);
    if defender.in_air {
        defender.trigger_air_hit(now);
    } else {
        defender.trigger_hit(now);
    }

    defender.rect.x += direction * data.knockback_px;
    clamp_to(&mut defender.rect, ctx.playfield);

    if data.knockdown_ms > 0 && !defender.in_air {
        defender.knockdown_until.extend(now, data.knockdown_ms);
    }

    Contact::Hit { damage, points }
}

/// Pushes two overlapping fighters apart along X.
///
/// Uses each fighter's authored push box, or its bounding box when none is
/// authored. The left fighter moves back by half the overlap and the right
/// one takes the remainder; with equal centres `a` counts as the right-hand
/// fighter. Returns the overlap that was resolved.
pub fn resolve_pushboxes(
    a: &mut Fighter,
    b: &mut Fighter,
    table: &HitboxTable,
    playfield: &Playfield,
    now: Millis,
) -> i32 {
    let push_a = a.world_boxes(table, now).push.unwrap_or(a.rect);
    let push_b = b.world_boxes(table, now).push.unwrap_or(b.rect);
    if !push_a.intersects(push_b) {
        return 0;
    }
    let overlap = push_a.overlap_x(push_b);
    if overlap <= 0 {
        return 0;
    }

    let half = overlap / 2;
    if a.rect.center_x() < b.rect.center_x() {
        a.rect.x -= half;
        b.rect.x += overlap - half;
    } else {
        a.rect.x += overlap - half;
        b.rect.x -= half;
    }
    clamp_to(&mut a.rect, playfield);
    clamp_to(&mut b.rect, playfield);
    overlap
}

// ============================================================================
// Tests
// ============================================================================
