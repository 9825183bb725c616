//! Event processor and the brick-break cascade
//!
//! `process_events` drains one FIFO of typed events. Handling an event may
//! append follow-ups to the same queue (a mine riding on a brick hit) or
//! schedule delayed damage, but never re-enters the physics step. Once the
//! queue is empty, broken bricks are removed in a fixed-point pass that fires
//! each destruction effect.

use std::collections::VecDeque;
use std::f32::consts::{FRAC_PI_8, TAU};

use glam::Vec2;
use rand::Rng;
use rand::seq::IndexedRandom;

use super::brick::Brick;
use super::catalog::BrickKind;
use super::combo;
use super::entity::{Ball, BallKind, BallRole, Projectile, ProjectileKind, XpOrb};
use super::equipment::{self, Effect};
use super::event::{BlastSource, BrickHit, DamageSource, Event, EventKind, EventRecord, EventSink, HitSource};
use super::grid::{BrickGrid, BrickId};
use super::state::{GamePhase, GameState};
use crate::consts::*;
use crate::settings::SpeedMode;

/// Hit that started a cascade: its source and the hitting ball's velocity
pub type Trigger = (HitSource, Option<Vec2>);

/// Where a hook's effects are anchored
#[derive(Debug, Clone, Copy)]
pub struct EffectOrigin {
    pub pos: Vec2,
    /// Aim for bullet fans and missiles
    pub heading: Vec2,
    /// Ball type credited with spawned projectiles
    pub kind: BallKind,
}

/// Resolve a batch of events in FIFO order, then run the destruction pass
pub fn process_events(state: &mut GameState, events: Vec<Event>, sink: &mut dyn EventSink) {
    let mut queue = VecDeque::from(events);
    let mut trigger: Option<Trigger> = None;
    while let Some(event) = queue.pop_front() {
        sink.emit(event.record());
        match event {
            Event::DamageTaken {
                source,
                ball_kind,
                amount,
                pos,
            } => {
                let follow_up = take_damage(state, source, ball_kind, amount, pos, sink);
                queue.extend(follow_up);
            }
            Event::BrickHit(hit) => {
                trigger.get_or_insert((hit.source, hit.source_vel));
                let follow_up = brick_hit(state, hit, sink);
                queue.extend(follow_up);
            }
            Event::ExplodeMine { pos } => {
                let mine = state.tuning.bricks.mine;
                let radius = mine.radius_tiles * state.board.unit;
                explode(state, pos, radius, mine.damage, BlastSource::Mine, sink);
            }
            Event::DyingBallDeath { pos } => log::debug!("Dying ball removed at {:?}", pos),
        }
    }
    process_broken_bricks(state, trigger, sink);
}

/// Land every delayed action that is due this frame
pub fn drain_delayed(state: &mut GameState, sink: &mut dyn EventSink) {
    for action in state.delayed.drain_due() {
        let hit = state
            .grid
            .get_mut(action.target)
            .and_then(|brick| brick.hit(action.amount, action.source));
        if let Some(hit) = hit {
            process_events(state, vec![Event::BrickHit(hit)], sink);
        }
    }
}

fn take_damage(
    state: &mut GameState,
    source: DamageSource,
    ball_kind: BallKind,
    amount: f32,
    pos: Vec2,
    sink: &mut dyn EventSink,
) -> Vec<Event> {
    // Retaliation counts the raw loss, even while invulnerable
    let effects = equipment::on_hp_lost(state.loadout.active(ball_kind), &mut state.trackers, amount);
    let origin = EffectOrigin {
        pos,
        heading: Vec2::NEG_Y,
        kind: ball_kind,
    };
    let mut follow_up = apply_effects(state, effects, origin, sink);

    let mut amount = amount;
    if let Some((wall, brick)) = equipment::impact_distributor(state.loadout.active(ball_kind)) {
        match source {
            DamageSource::Wall | DamageSource::MiniBallWall => amount = (amount + wall).max(0.0),
            DamageSource::Brick => amount += brick,
            DamageSource::GiantPower => {}
        }
    }

    if state.trackers.invulnerability_frames > 0 {
        log::trace!("Ignoring {} damage while invulnerable", amount);
        return follow_up;
    }

    if source == DamageSource::Wall && !state.giant_turn {
        if let Some(lost) = state.combo.break_streak() {
            log::debug!("Combo lost at {}", lost);
            sink.emit(EventRecord::notice(EventKind::ComboLost, pos, lost as f32));
        }
    }

    if amount > 0.0 {
        state.pool.take_damage(amount);
    }
    if state.pool.is_empty() {
        follow_up.extend(start_dying(state, sink));
    }
    follow_up
}

/// Shared pool ran out: every primary ball starts dying, minis are orphaned
fn start_dying(state: &mut GameState, sink: &mut dyn EventSink) -> Vec<Event> {
    let Some(lead) = state.lead_ball() else {
        return Vec::new();
    };
    if lead.is_dying {
        return Vec::new();
    }
    let (id, pos, heading, kind) = (lead.id, lead.pos, lead.vel, lead.kind);
    log::info!("Shared hp depleted, {} ball dying", kind.as_str());
    sink.emit(EventRecord::notice(EventKind::BallDying, pos, 0.0).with_ball(id));

    for ball in &mut state.balls {
        match ball.role {
            BallRole::Primary => ball.is_dying = true,
            BallRole::Mini { .. } => ball.role = BallRole::Mini { orphaned: true },
            BallRole::Ghost { .. } => {}
        }
    }
    state.giant_turn = false;
    state.speed = SpeedMode::Normal;

    let effects = equipment::on_dying(state.loadout.active(kind), &mut state.trackers);
    apply_effects(state, effects, EffectOrigin { pos, heading, kind }, sink)
}

fn brick_hit(state: &mut GameState, hit: BrickHit, sink: &mut dyn EventSink) -> Vec<Event> {
    state.stats.record_damage(hit.damage_dealt);

    if !state.giant_turn && state.progression.level >= state.tuning.unlocks.combo_mines {
        let count = state.combo.add();
        sink.emit(EventRecord::notice(EventKind::ComboAdded, hit.center, count as f32));
    }

    let kind = hit.source.equipment_kind().unwrap_or_else(|| state.active_kind());
    if hit.coins_dropped > 0 {
        let bonus = equipment::on_coins_collected(state.loadout.active(kind), &mut state.trackers, hit.coins_dropped);
        let total = hit.coins_dropped as u64 + bonus;
        state.coins += total;
        state.stats.coins_collected += total;
        sink.emit(EventRecord::notice(EventKind::CoinsCollected, hit.center, total as f32).with_brick(hit.brick));
    }
    if hit.gems_dropped > 0 {
        state.gems += hit.gems_dropped as u64;
        state.stats.gems_collected += hit.gems_dropped as u64;
        sink.emit(
            EventRecord::notice(EventKind::GemsCollected, hit.center, hit.gems_dropped as f32).with_brick(hit.brick),
        );
    }

    let mut follow_up = Vec::new();
    if let HitSource::Ball { kind, .. } = hit.source {
        let effects = equipment::on_brick_hit(state.loadout.active(kind), &mut state.trackers, hit.overlay);
        let origin = EffectOrigin {
            pos: hit.center,
            heading: hit.source_vel.unwrap_or(Vec2::NEG_Y),
            kind,
        };
        follow_up = apply_effects(state, effects, origin, sink);
    }
    follow_up.extend(hit.sub_events);
    follow_up
}

/// Remove every broken brick and fire its destruction effect, repeating
/// until a pass finds nothing broken. Each pass removes at least one brick,
/// so the loop is bounded by the brick count.
pub fn process_broken_bricks(state: &mut GameState, trigger: Option<Trigger>, sink: &mut dyn EventSink) {
    loop {
        let broken: Vec<BrickId> = state
            .grid
            .scan_ids()
            .into_iter()
            .filter(|id| state.grid.get(*id).is_some_and(Brick::is_broken))
            .collect();
        if broken.is_empty() {
            break;
        }
        for id in broken {
            if let Some(brick) = state.grid.remove(id) {
                destroy_brick(state, &brick, trigger, sink);
            }
        }
    }

    if state.phase == GamePhase::Playing && state.grid.goal_count() == 0 {
        log::info!("Last goal destroyed, level clearing");
        state.phase = GamePhase::LevelClearing;
        let center = state.board.span_center(0, 0, state.board.cols, state.board.rows);
        sink.emit(EventRecord::notice(EventKind::LevelCleared, center, 0.0));
    }
}

fn destroy_brick(state: &mut GameState, brick: &Brick, trigger: Option<Trigger>, sink: &mut dyn EventSink) {
    log::debug!("Brick {:?} ({}) destroyed", brick.id, brick.kind.as_str());
    sink.emit(EventRecord::notice(EventKind::BrickDestroyed, brick.center, brick.max_health).with_brick(brick.id));

    if let Some(kind) = trigger.and_then(|(source, _)| source.equipment_kind()) {
        let effects = equipment::on_brick_destroyed(state.loadout.active(kind));
        let origin = EffectOrigin {
            pos: brick.center,
            heading: Vec2::NEG_Y,
            kind,
        };
        // Destruction hooks only heal, so nothing comes back
        apply_effects(state, effects, origin, sink);
    }

    let orbs = (brick.max_health / state.tuning.xp.per_orb.max(1.0)).floor() as u32;
    spawn_xp_orbs(state, brick.center, orbs);

    match brick.kind {
        BrickKind::ExtraBall => {
            state.balls_left += 1;
            sink.emit(EventRecord::notice(EventKind::BallGained, brick.center, state.balls_left as f32));
        }
        BrickKind::Explosive => {
            let blast = state.tuning.bricks.explosive;
            let radius = blast.radius_tiles * state.board.unit;
            explode(state, brick.center, radius, blast.damage, BlastSource::ChainReaction, sink);
        }
        BrickKind::HorizontalStripe | BrickKind::VerticalStripe => clear_stripe(state, brick, sink),
        BrickKind::BallCage => release_caged_ball(state, brick, trigger.and_then(|(_, vel)| vel), sink),
        BrickKind::Equipment => find_equipment(state, brick.center, sink),
        BrickKind::Normal | BrickKind::Goal | BrickKind::Wool => {}
    }
}

/// Schedule blast damage to every brick whose rectangle reaches within
/// `radius` of `pos`, nearest first
pub fn explode(
    state: &mut GameState,
    pos: Vec2,
    radius: f32,
    damage: f32,
    source: BlastSource,
    sink: &mut dyn EventSink,
) {
    let unit = state.board.unit;
    let (radius, damage) = match equipment::blast_amplifier(state.loadout.active(state.active_kind())) {
        Some((multiplier, bonus_tiles)) => (radius + bonus_tiles * unit, damage * multiplier),
        None => (radius, damage),
    };

    let mut targets: Vec<(f32, BrickId)> = state
        .grid
        .iter()
        .filter(|b| !b.is_broken() && b.closest_point(pos).distance_squared(pos) <= radius * radius)
        .map(|b| (b.center.distance(pos), b.id))
        .collect();
    targets.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    log::debug!(
        "{:?} blast at {:?}: radius {}, damage {}, {} targets",
        source,
        pos,
        radius,
        damage,
        targets.len()
    );
    sink.emit(EventRecord::notice(EventKind::Explosion, pos, radius));
    let step = unit * PROPAGATION_UNIT_FRACTION;
    for (distance, id) in targets {
        state
            .delayed
            .schedule(id, damage, HitSource::Blast(source), (distance / step).floor() as u32);
    }
}

/// Sweep the stripe's row or column outward from the stripe brick
fn clear_stripe(state: &mut GameState, stripe: &Brick, sink: &mut dyn EventSink) {
    let horizontal = stripe.kind == BrickKind::HorizontalStripe;
    let mut targets: Vec<(f32, BrickId)> = state
        .grid
        .iter()
        .filter(|b| !b.is_broken())
        .filter(|b| {
            if horizontal {
                (b.row..b.row + b.height).contains(&stripe.row)
            } else {
                (b.col..b.col + b.width).contains(&stripe.col)
            }
        })
        .map(|b| {
            let offset = b.center - stripe.center;
            let distance = if horizontal { offset.x.abs() } else { offset.y.abs() };
            (distance, b.id)
        })
        .collect();
    targets.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    sink.emit(EventRecord::notice(EventKind::StripeCleared, stripe.center, targets.len() as f32).with_brick(stripe.id));
    let damage = state.tuning.bricks.stripe_damage;
    let step = state.board.unit * PROPAGATION_UNIT_FRACTION;
    for (distance, id) in targets {
        state
            .delayed
            .schedule(id, damage, HitSource::Stripe, (distance / step).floor() as u32);
    }
}

/// Ball cage: clone the lead primary ball at the cage, heading the way the
/// breaking ball was travelling
fn release_caged_ball(state: &mut GameState, cage: &Brick, source_vel: Option<Vec2>, sink: &mut dyn EventSink) {
    let Some(heading) = source_vel.filter(|v| v.length_squared() > 0.0) else {
        log::debug!("Ball cage {:?} broke without a ball impact", cage.id);
        return;
    };
    let Some(lead) = state.lead_ball().cloned() else {
        log::debug!("Ball cage {:?} broke with no primary ball in play", cage.id);
        return;
    };
    let id = state.next_entity_id();
    let mut clone = Ball::new(id, lead.kind, BallRole::Primary, cage.center, state.board.unit);
    clone.launch(heading, lead.vel.length());
    clone.is_dying = lead.is_dying;
    sink.emit(EventRecord::notice(EventKind::BallCloned, cage.center, 0.0).with_ball(id));
    state.balls.push(clone);
}

fn find_equipment(state: &mut GameState, pos: Vec2, sink: &mut dyn EventSink) {
    let unowned = state.loadout.unowned();
    match unowned.choose(&mut state.rng) {
        Some(&id) => {
            log::info!("Found equipment: {}", id.as_str());
            state.loadout.grant(id);
            sink.emit(EventRecord::notice(EventKind::EquipmentFound, pos, id as u32 as f32));
        }
        None => {
            let xp = state.tuning.equipment_fallback_xp;
            log::info!("Every item owned, granting {} xp instead", xp);
            state.progression.add_pending(xp);
            sink.emit(EventRecord::notice(EventKind::XpCollected, pos, xp));
        }
    }
}

fn spawn_xp_orbs(state: &mut GameState, pos: Vec2, count: u32) {
    let cooldown = state.tuning.xp.orb_cooldown_frames;
    for _ in 0..count {
        let angle = state.rng.random_range(0.0..TAU);
        let speed = state.rng.random_range(2.0f32..5.0);
        state.xp_orbs.push(XpOrb {
            pos,
            vel: Vec2::from_angle(angle) * speed,
            cooldown,
            collected: false,
        });
    }
}

/// Carry out hook effects. Returns brick hits that still need processing.
pub fn apply_effects(
    state: &mut GameState,
    effects: Vec<Effect>,
    origin: EffectOrigin,
    sink: &mut dyn EventSink,
) -> Vec<Event> {
    let mut events = Vec::new();
    for effect in effects {
        match effect {
            Effect::HealBall(amount) => {
                if state.pool.is_empty() {
                    continue;
                }
                let before = state.pool.hp;
                state.pool.heal(amount);
                let healed = state.pool.hp - before;
                if healed > 0.0 {
                    sink.emit(EventRecord::notice(EventKind::BallHealed, origin.pos, healed));
                }
            }
            Effect::AddCoins(coins) => {
                state.coins += coins;
                state.stats.coins_collected += coins;
                sink.emit(EventRecord::notice(EventKind::CoinsCollected, origin.pos, coins as f32));
            }
            Effect::AddPendingXp(xp) => state.progression.add_pending(xp),
            Effect::Explode {
                radius_tiles,
                damage,
                source,
            } => {
                let radius = radius_tiles * state.board.unit;
                explode(state, origin.pos, radius, damage, source, sink);
            }
            Effect::WallBullets { count, damage } => {
                let heading = origin.heading.normalize_or(Vec2::NEG_Y);
                for i in 0..count {
                    let t = if count > 1 {
                        i as f32 / (count - 1) as f32 - 0.5
                    } else {
                        0.0
                    };
                    let dir = Vec2::from_angle(t * FRAC_PI_8).rotate(heading);
                    spawn_bullet(state, origin.pos, dir, damage, origin.kind);
                }
            }
            Effect::HomingMissile { damage } => spawn_homing(state, origin.pos, origin.heading, damage, origin.kind),
            Effect::Volley { count, damage } => {
                for i in 0..count {
                    let dir = Vec2::from_angle(TAU * i as f32 / count as f32);
                    spawn_bullet(state, origin.pos, dir, damage, origin.kind);
                }
            }
            Effect::PlaceMines(count) => {
                let placed = combo::place_mines(&mut state.grid, &mut state.rng, count);
                log::debug!("Placed {} of {} mines", placed, count);
            }
            Effect::HealBricksNear { radius_tiles, amount } => {
                let radius = radius_tiles * state.board.unit;
                let mut healed = Vec::new();
                for brick in state.grid.iter_mut() {
                    if brick.kind.can_receive_healing() && brick.center.distance(origin.pos) <= radius {
                        let restored = brick.heal(amount);
                        if restored > 0.0 {
                            healed.push((brick.id, brick.center, restored));
                        }
                    }
                }
                for (id, center, restored) in healed {
                    sink.emit(EventRecord::notice(EventKind::BrickHealed, center, restored).with_brick(id));
                }
            }
            Effect::ZapBricks { radius_tiles, damage } => events.extend(zap(state, radius_tiles, damage)),
        }
    }
    events
}

/// Damage every brick whose centre is within reach of a moving primary ball
fn zap(state: &mut GameState, radius_tiles: f32, damage: f32) -> Vec<Event> {
    let radius = radius_tiles * state.board.unit;
    let centres: Vec<Vec2> = state
        .balls
        .iter()
        .filter(|b| b.is_primary() && b.is_moving)
        .map(|b| b.pos)
        .collect();
    let mut events = Vec::new();
    for pos in centres {
        for brick in state.grid.iter_mut() {
            if brick.center.distance(pos) < radius {
                if let Some(hit) = brick.hit(damage, HitSource::ZapAura) {
                    events.push(Event::BrickHit(hit));
                }
            }
        }
    }
    events
}

pub fn spawn_bullet(state: &mut GameState, pos: Vec2, dir: Vec2, damage: f32, owner: BallKind) {
    let id = state.next_entity_id();
    let unit = state.board.unit;
    let speed = unit * state.tuning.bullet_ball.speed_unit_fraction;
    state.projectiles.push(Projectile {
        id,
        kind: ProjectileKind::Straight,
        owner,
        pos,
        vel: dir.normalize_or(Vec2::NEG_Y) * speed,
        radius: unit * PROJECTILE_RADIUS_FACTOR,
        damage,
        ttl: state.tuning.homing_ball.lifetime_frames,
        is_dead: false,
    });
}

pub fn spawn_homing(state: &mut GameState, pos: Vec2, heading: Vec2, damage: f32, owner: BallKind) {
    let id = state.next_entity_id();
    let unit = state.board.unit;
    let stats = state.tuning.homing_ball;
    let target = homing_target(&state.grid, pos);
    state.projectiles.push(Projectile {
        id,
        kind: ProjectileKind::Homing {
            target,
            turn_rate: stats.turn_rate,
            explosion_radius: (stats.explosion_radius_tiles + stats.bonus_explosion_radius_tiles) * unit,
        },
        owner,
        pos,
        vel: heading.normalize_or(Vec2::NEG_Y) * unit * stats.speed_unit_fraction,
        radius: unit * HOMING_RADIUS_FACTOR,
        damage,
        ttl: stats.lifetime_frames,
        is_dead: false,
    });
}

/// Nearest live goal brick by centre, or the nearest brick when no goal is left
pub fn homing_target(grid: &BrickGrid, pos: Vec2) -> Option<BrickId> {
    let nearest = |goals_only: bool| {
        grid.iter()
            .filter(|b| !b.is_broken() && (!goals_only || b.is_goal()))
            .min_by(|a, b| {
                a.center
                    .distance_squared(pos)
                    .total_cmp(&b.center.distance_squared(pos))
            })
            .map(|b| b.id)
    };
    nearest(true).or_else(|| nearest(false))
}
