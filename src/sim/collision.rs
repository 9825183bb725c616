//! Collision detection and response for balls against bricks and walls
//!
//! The tricky part of the core: one ball, one frame, at most one resolved
//! brick. The scan walks the cells under the ball's bounding box, tests the
//! closest point of each brick rectangle, and resolves the first overlap as
//! a bounce, a pass-through, an execution or an overflow buff.

use glam::Vec2;

use super::board::Board;
use super::brick::Brick;
use super::entity::{Ball, BallRole};
use super::equipment::{self, Equipment, Trackers};
use super::event::{DamageSource, Event, HitSource};
use super::grid::{BrickGrid, BrickId};
use crate::consts::GIANT_DAMAGE_PER_HP;
use crate::sign;

/// Axis a bounce flipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// What happened to the ball this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Contact {
    None,
    /// Reflected off a brick
    Bounced { brick: BrickId, axis: Axis },
    /// Hit without bouncing (phaser charge or executioner)
    NoBounce { brick: BrickId },
    /// Piercing or giant ball went through
    PassedThrough { brick: BrickId },
    /// Overflow charge raised the brick's hp instead of damaging it
    Buffed { brick: BrickId, amount: f32 },
    /// Dying ball touched a brick and died
    Died,
}

/// Result of a brick scan
#[derive(Debug, Clone)]
pub struct Resolution {
    pub contact: Contact,
    pub events: Vec<Event>,
}

impl Resolution {
    pub fn miss() -> Self {
        Self {
            contact: Contact::None,
            events: Vec::new(),
        }
    }
}

/// Inputs the resolver needs besides the ball and the grid
#[derive(Debug, Clone, Copy)]
pub struct HitContext<'a> {
    /// Damage a normal hit deals (equipment already applied)
    pub damage: f32,
    /// Active items for the ball's logical type
    pub items: &'a [Equipment],
    /// Shared hp a primary ball loses per brick hit
    pub brick_hit_damage: f32,
    /// Hp caps for overflow buffs (single cell, merged)
    pub health_caps: (f32, f32),
}

/// Source tag a ball puts on its hits
pub fn ball_source(ball: &Ball) -> HitSource {
    match ball.role {
        BallRole::Mini { .. } => HitSource::MiniBall {
            id: ball.id,
            parent: ball.kind,
        },
        _ => HitSource::Ball {
            id: ball.id,
            kind: ball.kind,
        },
    }
}

/// Shared-pool damage event raised by a ball
pub fn damage_event(ball: &Ball, source: DamageSource, amount: f32) -> Event {
    Event::DamageTaken {
        source,
        ball_kind: ball.kind,
        amount,
        pos: ball.pos,
    }
}

/// Circle vs brick rectangle (closest point)
#[inline]
pub fn circle_overlaps(brick: &Brick, pos: Vec2, radius: f32) -> bool {
    pos.distance_squared(brick.closest_point(pos)) <= radius * radius
}

/// Scan the cells under the ball and resolve the first brick contact
pub fn resolve_bricks(
    ball: &mut Ball,
    grid: &mut BrickGrid,
    board: &Board,
    ctx: &HitContext,
    trackers: &mut Trackers,
) -> Resolution {
    let Some(range) = board.cells_overlapping(ball.pos, ball.radius) else {
        return Resolution::miss();
    };
    let mut resolution = Resolution::miss();
    for c in range.cols.clone() {
        for r in range.rows.clone() {
            let Some(id) = grid.id_at(c, r) else {
                continue;
            };
            if ball.is_giant() {
                if giant_contact(ball, grid, id, ctx, &mut resolution) {
                    return resolution;
                }
                continue;
            }
            let Some(brick) = grid.get(id) else {
                continue;
            };
            if !circle_overlaps(brick, ball.pos, ball.radius) {
                continue;
            }
            if ball.is_ghost() && ball.kind == super::entity::BallKind::Giant {
                continue;
            }
            if ball.is_dying && !ball.is_ghost() {
                ball.is_dead = true;
                resolution.events.push(Event::DyingBallDeath { pos: ball.pos });
                resolution.contact = Contact::Died;
                return resolution;
            }
            if brick_contact(ball, grid, id, ctx, trackers, &mut resolution) {
                return resolution;
            }
        }
    }
    resolution
}

/// Giant balls crush one brick per frame and never bounce. Returns true
/// once a brick was resolved.
fn giant_contact(
    ball: &mut Ball,
    grid: &mut BrickGrid,
    id: BrickId,
    ctx: &HitContext,
    resolution: &mut Resolution,
) -> bool {
    let Some(brick) = grid.get_mut(id) else {
        return false;
    };
    let reach = ball.radius + brick.half_size.max_element();
    if ball.pos.distance(brick.center) >= reach || ball.pierced.contains(&id) {
        return false;
    }
    if ball.is_dying {
        ball.is_dead = true;
        resolution.events.push(Event::DyingBallDeath { pos: ball.pos });
        resolution.contact = Contact::Died;
        return true;
    }
    if let Some(mut hit) = brick.hit(ctx.damage, ball_source(ball)) {
        hit.source_vel = Some(ball.vel);
        ball.damage_dealt_for_hp_loss += hit.damage_dealt;
        resolution.events.push(Event::BrickHit(hit));
        if ball.damage_dealt_for_hp_loss >= GIANT_DAMAGE_PER_HP {
            let hp = (ball.damage_dealt_for_hp_loss / GIANT_DAMAGE_PER_HP).floor();
            resolution
                .events
                .push(damage_event(ball, DamageSource::GiantPower, hp));
            ball.damage_dealt_for_hp_loss %= GIANT_DAMAGE_PER_HP;
        }
    }
    ball.pierced.push(id);
    resolution.contact = Contact::PassedThrough { brick: id };
    true
}

/// Resolve a regular ball touching brick `id`. Returns false when the
/// scan should continue (piercing pass-through).
fn brick_contact(
    ball: &mut Ball,
    grid: &mut BrickGrid,
    id: BrickId,
    ctx: &HitContext,
    trackers: &mut Trackers,
    resolution: &mut Resolution,
) -> bool {
    let Some(brick) = grid.get_mut(id) else {
        return false;
    };
    let is_ghost = ball.is_ghost();
    if !is_ghost {
        ball.hit_count += 1;
    }

    if trackers.overflow_heal_charges > 0 && ball.is_primary() {
        let before = brick.max_health;
        let cap = if brick.is_merged() {
            ctx.health_caps.1
        } else {
            ctx.health_caps.0
        };
        brick.buff_health(ctx.damage, cap);
        trackers.overflow_heal_charges -= 1;
        resolution.contact = Contact::Buffed {
            brick: id,
            amount: brick.max_health - before,
        };
        let (center, half) = (brick.center, brick.half_size);
        if !consume_phaser(ball, trackers) {
            bounce(ball, center, half);
        }
        return true;
    }

    let executioner = equipment::executioner_threshold(ctx.items);
    if let Some(threshold) = executioner.filter(|t| brick.health <= *t && !is_ghost && !brick.is_goal()) {
        log::trace!("Executing brick {:?} (hp {} <= {})", id, brick.health, threshold);
        if let Some(mut hit) = brick.hit(brick.health, ball_source(ball)) {
            hit.source_vel = Some(ball.vel);
            resolution.events.push(Event::BrickHit(hit));
        }
        resolution.contact = Contact::NoBounce { brick: id };
        return true;
    }

    if ball.is_piercing() {
        if ball.pierced.contains(&id) {
            return false;
        }
        ball.pierced.push(id);
        ball.piercing_contacts_left -= 1;
        if !is_ghost && !ball.on_cooldown(id) {
            if let Some(mut hit) = brick.hit(ctx.damage, ball_source(ball)) {
                hit.source_vel = Some(ball.vel);
                resolution.events.push(Event::BrickHit(hit));
            }
            ball.set_cooldown(id);
        }
        resolution.contact = Contact::PassedThrough { brick: id };
        return false;
    }

    let on_cooldown = ball.on_cooldown(id);
    if !is_ghost && !on_cooldown {
        if let Some(mut hit) = brick.hit(ctx.damage, ball_source(ball)) {
            hit.source_vel = Some(ball.vel);
            resolution.events.push(Event::BrickHit(hit));
        }
        ball.set_cooldown(id);
        if ball.is_primary() && equipment::impact_distributor(ctx.items).is_some() {
            resolution
                .events
                .push(damage_event(ball, DamageSource::Brick, 0.0));
        }
    }

    let (center, half) = (brick.center, brick.half_size);
    resolution.contact = if consume_phaser(ball, trackers) {
        Contact::NoBounce { brick: id }
    } else {
        Contact::Bounced {
            brick: id,
            axis: bounce(ball, center, half),
        }
    };

    if !is_ghost && !on_cooldown && ball.is_primary() && ctx.brick_hit_damage > 0.0 {
        resolution
            .events
            .push(damage_event(ball, DamageSource::Brick, ctx.brick_hit_damage));
    }
    true
}

/// Spend a phaser charge (primary balls only)
fn consume_phaser(ball: &Ball, trackers: &mut Trackers) -> bool {
    if trackers.phaser_charges > 0 && ball.is_primary() {
        trackers.phaser_charges -= 1;
        return true;
    }
    false
}

/// Forget pierced bricks the ball has fully left, so the next pass counts
/// again
pub fn release_pierced(ball: &mut Ball, grid: &BrickGrid) {
    let (pos, radius, giant) = (ball.pos, ball.radius, ball.is_giant());
    ball.pierced.retain(|id| {
        grid.get(*id).is_some_and(|brick| {
            if giant {
                pos.distance(brick.center) < radius + brick.half_size.max_element()
            } else {
                circle_overlaps(brick, pos, radius)
            }
        })
    });
}

/// Reflect the ball off a brick rectangle and push it out along the final
/// axis. The dominant axis is picked by normalised offset; if that flip
/// would still send the ball into the brick, the other axis is flipped
/// instead.
pub fn bounce(ball: &mut Ball, center: Vec2, half: Vec2) -> Axis {
    let d = ball.pos - center;
    let horizontal = d.x.abs() / half.x > d.y.abs() / half.y;
    let mut vel = ball.vel;
    if horizontal {
        vel.x = -vel.x;
    } else {
        vel.y = -vel.y;
    }
    let mut axis = if horizontal { Axis::Horizontal } else { Axis::Vertical };
    if vel.dot(d) < 0.0 {
        vel = Vec2::new(-vel.x, -vel.y);
        axis = match axis {
            Axis::Horizontal => Axis::Vertical,
            Axis::Vertical => Axis::Horizontal,
        };
    }
    ball.vel = vel;
    match axis {
        Axis::Horizontal => ball.pos.x = center.x + (half.x + ball.radius) * sign(d.x),
        Axis::Vertical => ball.pos.y = center.y + (half.y + ball.radius) * sign(d.y),
    }
    axis
}

/// Wall contact, velocity before the bounce and the wall's inward normal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallHit {
    pub normal: Vec2,
    pub vel_before: Vec2,
}

/// Reflect off the inner wall rectangle
pub fn resolve_walls(ball: &mut Ball, board: &Board) -> Option<WallHit> {
    let (min, max) = board.walls();
    let vel_before = ball.vel;
    let mut normal = Vec2::ZERO;
    if ball.pos.x - ball.radius < min.x {
        ball.pos.x = min.x + ball.radius;
        ball.vel.x = ball.vel.x.abs();
        normal.x = 1.0;
    } else if ball.pos.x + ball.radius > max.x {
        ball.pos.x = max.x - ball.radius;
        ball.vel.x = -ball.vel.x.abs();
        normal.x = -1.0;
    }
    if ball.pos.y - ball.radius < min.y {
        ball.pos.y = min.y + ball.radius;
        ball.vel.y = ball.vel.y.abs();
        normal.y = 1.0;
    } else if ball.pos.y + ball.radius > max.y {
        ball.pos.y = max.y - ball.radius;
        ball.vel.y = -ball.vel.y.abs();
        normal.y = -1.0;
    }
    (normal != Vec2::ZERO).then(|| WallHit {
        normal: normal.normalize(),
        vel_before,
    })
}
