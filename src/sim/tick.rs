//! Fixed timestep simulation tick
//!
//! Core game loop that advances the level deterministically. One call to
//! `tick` is one simulation frame; the order inside a frame never changes:
//!
//! 1. input (aim, power-up, ball selection, speed toggle)
//! 2. end-of-turn detection, then the overlay sequence
//! 3. xp drip
//! 4. equipment pulses, balls, projectiles, then delayed damage (turn active only)
//! 5. aim preview balls, flash timers, xp orbs, invulnerability
//! 6. aiming: preview spawn and ball staging
//! 7. debug forced end of turn

use std::f32::consts::TAU;

use glam::Vec2;
use rand::Rng;

use super::brick::Brick;
use super::catalog::BrickKind;
use super::collision::{self, HitContext};
use super::combo::ComboReward;
use super::entity::{Ball, BallKind, BallRole, ProjectileKind, SharedBallStats};
use super::equipment;
use super::event::{BlastSource, DamageSource, Event, EventKind, EventRecord, EventSink, HitSource};
use super::overlay::{self, OverlayAction, OverlayOutcome};
use super::process::{self, EffectOrigin};
use super::state::{GamePhase, GameState};
use crate::consts::*;
use crate::settings::SpeedMode;
use crate::{secs_to_frames, steer_toward};

/// Ring samples used by the brick ball power-up
const BRICK_RING_SAMPLES: u32 = 72;
/// Hit that always destroys the brick a ring replaces
const RING_REPLACE_DAMAGE: f32 = 10_000.0;
/// Xp orb speed cap (pixels per frame)
const ORB_MAX_SPEED: f32 = 15.0;

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Pointer pressed: snap the staged ball to the nearest wall and start aiming
    pub aim_press: Option<Vec2>,
    /// Pointer moved while aiming
    pub aim_drag: Option<Vec2>,
    /// Pointer released: launch toward the last drag position
    pub aim_release: bool,
    /// Spend one shared power-up use
    pub activate_power_up: bool,
    /// Switch the staged ball type (aiming only)
    pub select_ball: Option<BallKind>,
    pub toggle_speed: bool,
    /// Debug: drop every moving entity so the turn ends on the next frame
    pub force_end_turn: bool,
}

/// Advance the game state by one fixed timestep
pub fn tick(state: &mut GameState, input: &TickInput, sink: &mut dyn EventSink) {
    if state.phase.is_finished() {
        return;
    }
    state.frame += 1;

    handle_input(state, input, sink);

    if state.phase.is_turn_active() && state.turn_is_idle() {
        handle_end_turn(state);
    }
    if state.phase == GamePhase::EndTurnSequence {
        run_end_turn_sequence(state, sink);
    }

    for level in state.progression.tick(&state.tuning) {
        let center = board_center(state);
        sink.emit(EventRecord::notice(EventKind::LevelUp, center, level as f32));
    }

    if state.phase.is_turn_active() {
        pulse_equipment(state, sink);
        update_balls(state, sink);
        update_projectiles(state, sink);
        process::drain_delayed(state, sink);
    }

    update_ghosts(state);
    state.pool.flash = state.pool.flash.saturating_sub(1);
    state.grid.iter_mut().for_each(Brick::tick_flash);
    update_xp_orbs(state, sink);
    state.trackers.invulnerability_frames = state.trackers.invulnerability_frames.saturating_sub(1);

    if state.phase == GamePhase::Aiming {
        update_aiming(state, sink);
    }

    if input.force_end_turn && state.phase.is_turn_active() {
        log::info!("Forcing end of turn");
        state.balls.clear();
        state.projectiles.clear();
        state.delayed.clear();
    }
}

/// Run one render frame: one simulation frame, or two in speed-up mode.
/// Input only applies to the first of them.
pub fn render_frame(state: &mut GameState, input: &TickInput, sink: &mut dyn EventSink) {
    let frames = state.speed.frames_per_render();
    let idle = TickInput::default();
    for i in 0..frames {
        tick(state, if i == 0 { input } else { &idle }, sink);
    }
}

fn board_center(state: &GameState) -> Vec2 {
    state.board.span_center(0, 0, state.board.cols, state.board.rows)
}

fn handle_input(state: &mut GameState, input: &TickInput, sink: &mut dyn EventSink) {
    if input.toggle_speed {
        state.speed = state.speed.toggled();
        log::debug!("Speed: {}", state.speed.as_str());
    }

    if let Some(kind) = input.select_ball {
        select_ball(state, kind);
    }

    if state.phase == GamePhase::Aiming {
        if let Some(press) = input.aim_press {
            if let Some(ball) = state.balls.iter_mut().find(|b| b.is_primary() && !b.is_moving) {
                ball.pos = state.board.snap_to_nearest_wall(press, ball.radius);
                state.aim.active = true;
                state.aim.target = None;
                state.aim.ghost_cooldown = 0;
            }
        }
        if let Some(drag) = input.aim_drag.filter(|_| state.aim.active) {
            state.aim.target = Some(drag);
        }
        if input.aim_release && state.aim.active {
            release_aim(state);
        }
    }

    if input.activate_power_up {
        activate_power_up(state, sink);
    }
}

fn select_ball(state: &mut GameState, kind: BallKind) {
    if state.phase != GamePhase::Aiming || state.aim.active {
        return;
    }
    if kind == BallKind::Giant && !(state.giant_balls > 0 && state.giant_unlocked()) {
        log::debug!("Giant ball not available");
        return;
    }
    state.selected_ball = kind;
    if kind != BallKind::Giant {
        state.settings.selected_ball = kind;
    }
    // Restaged with the new type below
    state.balls.retain(|b| b.is_moving);
}

// ============================================================================
// Aiming and launch
// ============================================================================

fn update_aiming(state: &mut GameState, sink: &mut dyn EventSink) {
    if !state.has_primary_balls() {
        stage_next_ball(state, sink);
    }
    if state.phase != GamePhase::Aiming || !state.aim.active {
        return;
    }
    if state.aim.ghost_cooldown > 0 {
        state.aim.ghost_cooldown -= 1;
        return;
    }
    spawn_ghost(state);
    state.aim.ghost_cooldown = state.tuning.aiming.ghost_cooldown_frames;
}

/// Stage a ball for the next launch, buying one if needed. Ends the run
/// when nothing can be launched.
fn stage_next_ball(state: &mut GameState, sink: &mut dyn EventSink) {
    let can_regular = state.balls_left > 0;
    let can_giant = state.giant_balls > 0 && state.giant_unlocked();

    if !can_regular && can_giant {
        state.selected_ball = BallKind::Giant;
    }
    if !can_regular && !can_giant {
        let cost = state.ball_cost();
        if state.progression.level >= state.tuning.unlocks.shop_buy_ball && state.coins >= cost {
            state.coins -= cost;
            state.ball_purchases += 1;
            state.balls_left += 1;
            log::info!("Bought a ball for {} coins", cost);
            let pos = state.board.launch_point(0.0);
            sink.emit(EventRecord::notice(EventKind::BallGained, pos, state.balls_left as f32));
        } else {
            log::info!("Game over: no balls left and none affordable");
            state.phase = GamePhase::GameOver;
            state.speed = SpeedMode::Normal;
            return;
        }
    }
    if state.selected_ball == BallKind::Giant && !(state.giant_balls > 0 && state.giant_unlocked()) {
        state.selected_ball = match state.settings.selected_ball {
            BallKind::Giant => BallKind::Classic,
            kind => kind,
        };
    }
    if state.selected_ball != BallKind::Giant && state.balls_left == 0 {
        return;
    }
    state.stage_ball(state.selected_ball);
}

fn spawn_ghost(state: &mut GameState) {
    let Some(target) = state.aim.target else {
        return;
    };
    let Some(staged) = state.balls.iter().find(|b| b.is_primary() && !b.is_moving) else {
        return;
    };
    let (kind, pos, radius) = (staged.kind, staged.pos, staged.radius);
    let dir = target - pos;
    if dir.length() < radius * state.tuning.aiming.cancel_radius_multiplier {
        return;
    }
    let ttl = secs_to_frames(state.tuning.aiming.aim_length_secs);
    let speed = state.board.unit
        * BALL_SPEED_UNIT_FRACTION
        * state.settings.ball_speed
        * state.tuning.aiming.ghost_speed_multiplier;
    let id = state.next_entity_id();
    let mut ghost = Ball::new(id, kind, BallRole::Ghost { ttl }, pos, state.board.unit);
    ghost.launch(dir, speed);
    state.ghosts.push(ghost);
}

/// Launch the staged ball toward the aim target, or cancel when released
/// on top of the ball
fn release_aim(state: &mut GameState) {
    state.aim.active = false;
    state.ghosts.clear();
    let Some(target) = state.aim.target.take() else {
        return;
    };
    let Some(index) = state.balls.iter().position(|b| b.is_primary() && !b.is_moving) else {
        return;
    };
    let (kind, pos, radius) = {
        let ball = &state.balls[index];
        (ball.kind, ball.pos, ball.radius)
    };
    let dir = target - pos;
    if dir.length() < radius * state.tuning.aiming.cancel_radius_multiplier {
        log::debug!("Aim cancelled");
        return;
    }
    if dir.length_squared() <= 1.0 {
        return;
    }

    if kind == BallKind::Giant {
        if state.giant_balls == 0 {
            return;
        }
        state.giant_balls -= 1;
        state.giant_turn = true;
    } else {
        if state.balls_left == 0 {
            return;
        }
        state.balls_left -= 1;
    }
    state.stats.balls_used += 1;

    let stats = *state.tuning.ball(kind);
    state.pool = SharedBallStats::new(stats.hp, stats.power_up_uses);
    state.trackers.reset_for_launch();
    equipment::on_turn_start(state.loadout.active(kind), &mut state.trackers, &mut state.pool);

    let speed = state.board.unit
        * BALL_SPEED_UNIT_FRACTION
        * state.settings.ball_speed
        * equipment::speed_multiplier(state.loadout.active(kind));
    state.balls[index].launch(dir, speed);
    state.phase = GamePhase::Playing;
    log::info!("Launched {} ball ({} left)", kind.as_str(), state.balls_left);
}

// ============================================================================
// Power-ups
// ============================================================================

fn activate_power_up(state: &mut GameState, sink: &mut dyn EventSink) {
    if !state.phase.is_turn_active() || state.pool.uses == 0 {
        return;
    }
    let live: Vec<(u32, Vec2, Vec2, bool)> = state
        .balls
        .iter()
        .filter(|b| b.is_primary() && b.is_moving && !b.is_dead)
        .map(|b| (b.id, b.pos, b.vel, b.is_dying))
        .collect();
    let Some(&(lead_id, lead_pos, lead_vel, _)) = live.first() else {
        return;
    };
    let kind = state.active_kind();
    state.pool.uses -= 1;
    log::info!("{} power-up ({} uses left)", kind.as_str(), state.pool.uses);
    sink.emit(EventRecord::notice(EventKind::PowerUpUsed, lead_pos, state.pool.uses as f32).with_ball(lead_id));

    let effects = equipment::on_power_up(state.loadout.active(kind), &mut state.trackers);
    let origin = EffectOrigin {
        pos: lead_pos,
        heading: lead_vel,
        kind,
    };
    let events = process::apply_effects(state, effects, origin, sink);

    let unit = state.board.unit;
    for (id, pos, vel, dying) in live {
        match kind {
            BallKind::Explosive => {
                let blast = state.tuning.explosive_ball;
                process::explode(state, pos, blast.radius_tiles * unit, blast.damage, BlastSource::BallPower, sink);
            }
            BallKind::Piercing => {
                let contacts = state.tuning.piercing_ball.contact_count;
                if let Some(ball) = state.balls.iter_mut().find(|b| b.id == id) {
                    ball.piercing_contacts_left = contacts;
                    ball.pierced.clear();
                }
            }
            BallKind::Split => spawn_mini_balls(state, kind, pos, vel, dying),
            BallKind::Brick => brick_ring(state, pos, sink),
            BallKind::Bullet => {
                let stats = state.tuning.bullet_ball;
                let heading = vel.normalize_or(Vec2::NEG_Y);
                for i in 0..stats.count {
                    let dir = Vec2::from_angle(TAU * i as f32 / stats.count.max(1) as f32).rotate(heading);
                    process::spawn_bullet(state, pos, dir, stats.damage, kind);
                }
            }
            BallKind::Homing => {
                let damage = state.tuning.homing_ball.damage;
                process::spawn_homing(state, pos, vel, damage, kind);
            }
            BallKind::Classic | BallKind::Giant => {}
        }
    }
    if !events.is_empty() {
        process::process_events(state, events, sink);
    }
}

fn spawn_mini_balls(state: &mut GameState, kind: BallKind, pos: Vec2, vel: Vec2, orphaned: bool) {
    let stats = state.tuning.mini_ball;
    let spread = stats.spread_degrees.to_radians();
    for i in 0..stats.count {
        let offset = if stats.count > 1 {
            -spread + 2.0 * spread * i as f32 / (stats.count - 1) as f32
        } else {
            0.0
        };
        let id = state.next_entity_id();
        let mut mini = Ball::new(id, kind, BallRole::Mini { orphaned }, pos, state.board.unit);
        mini.launch(Vec2::from_angle(offset).rotate(vel), vel.length());
        state.balls.push(mini);
    }
}

/// Brick ball power-up: replace plain bricks on a ring around the ball and
/// fill the ring's empty cells with fresh bricks
fn brick_ring(state: &mut GameState, center: Vec2, sink: &mut dyn EventSink) {
    let stats = state.tuning.brick_ball;
    let radius = stats.spawn_radius_tiles * state.board.unit;
    let mut cells: Vec<(usize, usize)> = Vec::new();
    for i in 0..BRICK_RING_SAMPLES {
        let p = center + Vec2::from_angle(TAU * i as f32 / BRICK_RING_SAMPLES as f32) * radius;
        // Rounded, not the cell the sample falls in
        if let Some(cell) = state.board.nearest_index(p) {
            if !cells.contains(&cell) {
                cells.push(cell);
            }
        }
    }

    let mut free = Vec::new();
    let mut replaced = Vec::new();
    for &(c, r) in &cells {
        let Some(id) = state.grid.id_at(c, r) else {
            free.push((c, r));
            continue;
        };
        let Some(brick) = state.grid.get_mut(id) else {
            continue;
        };
        if brick.kind != BrickKind::Normal || brick.is_merged() {
            continue;
        }
        if let Some(hit) = brick.hit(RING_REPLACE_DAMAGE, HitSource::Replaced) {
            replaced.push(Event::BrickHit(hit));
            free.push((c, r));
        }
    }
    // Clear the replaced bricks before building on their cells
    process::process_events(state, replaced, sink);

    for (c, r) in free {
        if state.grid.id_at(c, r).is_some() {
            continue;
        }
        let coins = if state.rng.random_bool(stats.coin_chance.clamp(0.0, 1.0) as f64) {
            state
                .rng
                .random_range(stats.coin_min.min(stats.coin_max)..=stats.coin_max.max(stats.coin_min))
        } else {
            0
        };
        let brick = Brick::new(BrickKind::Normal, stats.spawned_hp).with_coins(coins);
        match state.grid.place(brick, c, r, &state.board) {
            Ok(id) => {
                let at = state.board.span_center(c, r, 1, 1);
                sink.emit(EventRecord::notice(EventKind::BrickBuilt, at, stats.spawned_hp).with_brick(id));
            }
            Err(e) => log::warn!("Brick ring skipped ({}, {}): {}", c, r, e),
        }
    }
}

// ============================================================================
// Moving entities
// ============================================================================

/// Equipment timers that run while balls are in flight
fn pulse_equipment(state: &mut GameState, sink: &mut dyn EventSink) {
    let Some(lead) = state.balls.iter().find(|b| b.is_primary() && b.is_moving) else {
        return;
    };
    let origin = EffectOrigin {
        pos: lead.pos,
        heading: lead.vel,
        kind: lead.kind,
    };
    let effects = equipment::pulse(state.loadout.active(origin.kind), &mut state.trackers);
    let events = process::apply_effects(state, effects, origin, sink);
    if !events.is_empty() {
        process::process_events(state, events, sink);
    }
}

/// Primary balls first, then mini-balls, each newest first
fn update_balls(state: &mut GameState, sink: &mut dyn EventSink) {
    let count = state.balls.len();
    for i in (0..count).rev() {
        if state.balls[i].is_primary() {
            update_ball(state, i, sink);
        }
    }
    for i in (0..count).rev() {
        if state.balls[i].is_mini() {
            update_ball(state, i, sink);
        }
    }
    state.balls.retain(|b| !b.is_dead);
}

fn update_ball(state: &mut GameState, index: usize, sink: &mut dyn EventSink) {
    let mut events = Vec::new();
    let mut wall_effects = Vec::new();
    let (kind, pos, vel) = {
        let ball = &mut state.balls[index];
        if !ball.is_moving || ball.is_dead {
            return;
        }
        ball.tick_cooldowns();
        ball.pos += ball.vel;

        let kind = ball.kind;
        let ball_stats = *state.tuning.ball(kind);
        let orphaned = matches!(ball.role, BallRole::Mini { orphaned: true });

        if collision::resolve_walls(ball, &state.board).is_some() {
            if ball.is_dying || orphaned {
                ball.is_dead = true;
                events.push(Event::DyingBallDeath { pos: ball.pos });
            } else if ball.is_primary() {
                events.push(collision::damage_event(ball, DamageSource::Wall, ball_stats.wall_hit_damage));
                wall_effects = equipment::on_wall_hit(state.loadout.active(kind), &mut state.trackers);
            } else {
                let amount = state.tuning.mini_ball.wall_hit_damage;
                events.push(collision::damage_event(ball, DamageSource::MiniBallWall, amount));
            }
        }

        if !ball.is_dead {
            collision::release_pierced(ball, &state.grid);
            let items = state.loadout.active(kind);
            let base = if ball.is_mini() {
                state.tuning.mini_ball.base_damage
            } else if ball.is_piercing() {
                ball_stats.base_damage + state.tuning.piercing_ball.bonus_damage
            } else {
                ball_stats.base_damage
            };
            let ctx = HitContext {
                damage: equipment::ball_damage(items, base, state.combo.count, &state.trackers),
                items,
                brick_hit_damage: if ball.is_primary() { ball_stats.brick_hit_damage } else { 0.0 },
                health_caps: (state.tuning.bricks.max_hp_normal, state.tuning.bricks.max_hp_merged),
            };
            let resolution = collision::resolve_bricks(ball, &mut state.grid, &state.board, &ctx, &mut state.trackers);
            events.extend(resolution.events);
        }

        if !state.board.contains(ball.pos) {
            log::debug!("Ball {} left the board", ball.id);
            ball.is_dead = true;
        }
        (kind, ball.pos, ball.vel)
    };

    let origin = EffectOrigin { pos, heading: vel, kind };
    events.extend(process::apply_effects(state, wall_effects, origin, sink));
    if !events.is_empty() {
        process::process_events(state, events, sink);
    }
}

/// Aim previews bounce like real balls but never touch game state
fn update_ghosts(state: &mut GameState) {
    let ctx = HitContext {
        damage: 0.0,
        items: &[],
        brick_hit_damage: 0.0,
        health_caps: (0.0, 0.0),
    };
    for ghost in &mut state.ghosts {
        ghost.pos += ghost.vel;
        collision::resolve_walls(ghost, &state.board);
        collision::resolve_bricks(ghost, &mut state.grid, &state.board, &ctx, &mut state.trackers);
        if let BallRole::Ghost { ttl } = &mut ghost.role {
            *ttl = ttl.saturating_sub(1);
            ghost.is_dead = *ttl == 0;
        }
    }
    state.ghosts.retain(|g| !g.is_dead);
}

/// What a projectile did this frame
enum Impact {
    None,
    Hit(Event),
    Blast { pos: Vec2, radius: f32, damage: f32 },
}

fn update_projectiles(state: &mut GameState, sink: &mut dyn EventSink) {
    for i in 0..state.projectiles.len() {
        let impact = {
            let p = &mut state.projectiles[i];
            if p.is_dead {
                continue;
            }
            p.ttl = p.ttl.saturating_sub(1);
            if p.ttl == 0 {
                p.is_dead = true;
                continue;
            }

            if let ProjectileKind::Homing { target, turn_rate, .. } = &mut p.kind {
                let alive = target.and_then(|id| state.grid.get(id)).filter(|b| !b.is_broken());
                if alive.is_none() {
                    *target = process::homing_target(&state.grid, p.pos);
                }
                if let Some(aim) = target.and_then(|id| state.grid.get(id)).map(|b| b.center) {
                    p.vel = steer_toward(p.vel, aim - p.pos, *turn_rate);
                }
            }
            p.pos += p.vel;
            if !state.board.contains(p.pos) {
                p.is_dead = true;
                continue;
            }

            let touched = state.board.cells_overlapping(p.pos, p.radius).and_then(|range| {
                range
                    .cols
                    .clone()
                    .flat_map(|c| range.rows.clone().map(move |r| (c, r)))
                    .filter_map(|(c, r)| state.grid.id_at(c, r))
                    .find(|id| {
                        state
                            .grid
                            .get(*id)
                            .is_some_and(|b| collision::circle_overlaps(b, p.pos, p.radius))
                    })
            });
            match touched {
                None => Impact::None,
                Some(brick_id) => {
                    p.is_dead = true;
                    match p.kind {
                        ProjectileKind::Straight => state
                            .grid
                            .get_mut(brick_id)
                            .and_then(|b| b.hit(p.damage, HitSource::Projectile { id: p.id }))
                            .map_or(Impact::None, |mut hit| {
                                hit.source_vel = Some(p.vel);
                                Impact::Hit(Event::BrickHit(hit))
                            }),
                        ProjectileKind::Homing { explosion_radius, .. } => Impact::Blast {
                            pos: p.pos,
                            radius: explosion_radius,
                            damage: p.damage,
                        },
                    }
                }
            }
        };
        match impact {
            Impact::None => {}
            Impact::Hit(event) => process::process_events(state, vec![event], sink),
            Impact::Blast { pos, radius, damage } => {
                process::explode(state, pos, radius, damage, BlastSource::HomingExplode, sink)
            }
        }
    }
    state.projectiles.retain(|p| !p.is_dead);
}

fn update_xp_orbs(state: &mut GameState, sink: &mut dyn EventSink) {
    if state.xp_orbs.is_empty() {
        return;
    }
    let attractors: Vec<(Vec2, f32)> = if state.phase == GamePhase::Aiming {
        Vec::new()
    } else {
        state
            .balls
            .iter()
            .filter(|b| b.is_moving && !b.is_dead)
            .map(|b| (b.pos, b.radius))
            .collect()
    };
    let xp = state.tuning.xp;
    let magnet = equipment::magnet_radius_multiplier(state.loadout.active(state.active_kind()));
    let (min, max) = state.board.walls();

    let mut collected = Vec::new();
    for orb in &mut state.xp_orbs {
        if orb.cooldown > 0 {
            orb.cooldown -= 1;
            orb.vel *= 0.9;
        } else {
            let nearest = attractors
                .iter()
                .min_by(|a, b| a.0.distance_squared(orb.pos).total_cmp(&b.0.distance_squared(orb.pos)));
            match nearest {
                Some(&(pos, radius)) => {
                    let to_ball = pos - orb.pos;
                    let reach = radius * xp.magnetic_radius_multiplier * magnet;
                    if to_ball.length_squared() < reach * reach {
                        orb.vel = (orb.vel + to_ball.normalize_or_zero() * xp.magnetic_strength)
                            .clamp_length_max(ORB_MAX_SPEED);
                    } else {
                        orb.vel *= 0.95;
                    }
                    if to_ball.length() < radius {
                        orb.collected = true;
                        collected.push(orb.pos);
                    }
                }
                None => orb.vel *= 0.95,
            }
        }
        orb.pos = (orb.pos + orb.vel).clamp(min, max);
    }
    state.xp_orbs.retain(|o| !o.collected);

    for pos in collected {
        let per_orb = xp.per_orb;
        state.progression.add_pending(per_orb);
        state.stats.xp_collected += per_orb;
        sink.emit(EventRecord::notice(EventKind::XpCollected, pos, per_orb));
        let kind = state.active_kind();
        let effects = equipment::on_xp_collected(state.loadout.active(kind), &mut state.trackers, per_orb);
        let origin = EffectOrigin {
            pos,
            heading: Vec2::NEG_Y,
            kind,
        };
        let events = process::apply_effects(state, effects, origin, sink);
        if !events.is_empty() {
            process::process_events(state, events, sink);
        }
    }
}

// ============================================================================
// End of turn
// ============================================================================

fn handle_end_turn(state: &mut GameState) {
    log::info!(
        "Turn over: max combo {}, {} damage",
        state.combo.max_this_turn,
        state.stats.damage_this_turn
    );
    state.stats.close_turn();

    let reward = ComboReward::for_combo(
        state.combo.max_this_turn,
        state.progression.level,
        &state.tuning.unlocks,
        &state.tuning.combo,
    );
    reward.place(&mut state.grid, &state.board, &mut state.rng, state.tuning.bricks.stripe_bonus_hp);
    state.giant_balls += reward.giants;
    if reward != ComboReward::default() {
        log::info!(
            "Combo reward: {} mines, {} stripes, {} giant balls",
            reward.mines,
            reward.stripes,
            reward.giants
        );
    }

    state.combo.end_turn();
    state.giant_turn = false;
    state.trackers.end_turn();
    state.pool = SharedBallStats::default();
    state.progression.start_drip(&state.tuning);
    state.ghosts.clear();

    state.end_turn_actions = overlay::collect_actions(&state.grid);
    if state.end_turn_actions.is_empty() {
        finish_turn(state);
    } else {
        state.phase = GamePhase::EndTurnSequence;
        state.end_turn_timer = END_TURN_ACTION_GAP;
    }
}

/// One overlay action every `END_TURN_ACTION_GAP` frames
fn run_end_turn_sequence(state: &mut GameState, sink: &mut dyn EventSink) {
    state.end_turn_timer = state.end_turn_timer.saturating_sub(1);
    if state.end_turn_timer > 0 {
        return;
    }
    let Some(action) = state.end_turn_actions.pop_front() else {
        finish_turn(state);
        return;
    };
    state.end_turn_timer = END_TURN_ACTION_GAP;

    let outcome = match action {
        OverlayAction::Heal(id) => overlay::execute_heal(&mut state.grid, id, state.tuning.bricks.healer_amount),
        OverlayAction::Build(id) => overlay::execute_build(
            &mut state.grid,
            &state.board,
            id,
            state.tuning.bricks.builder_hp,
            &mut state.rng,
        ),
    };
    match outcome {
        OverlayOutcome::Healed(healed) => {
            for (id, amount) in healed {
                if let Some(brick) = state.grid.get(id) {
                    sink.emit(EventRecord::notice(EventKind::BrickHealed, brick.center, amount).with_brick(id));
                }
            }
        }
        OverlayOutcome::Built(id) => {
            if let Some(brick) = state.grid.get(id) {
                sink.emit(EventRecord::notice(EventKind::BrickBuilt, brick.center, brick.health).with_brick(id));
            }
        }
        OverlayOutcome::Skipped => log::trace!("Overlay action {:?} skipped", action),
    }
}

fn finish_turn(state: &mut GameState) {
    if state.grid.goal_count() == 0 {
        log::info!("Level complete after {} balls", state.stats.balls_used);
        state.phase = GamePhase::LevelComplete;
        state.speed = SpeedMode::Normal;
    } else {
        state.phase = GamePhase::Aiming;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use crate::sim::event::NullSink;
    use crate::tuning::Tuning;

    const ONE_GOAL: &str = "0,-6,goal,10,10,0,0,0,0,null,1,1";

    fn new_state(settings: Settings, layout: &str) -> GameState {
        GameState::from_layout(settings, Tuning::default(), layout).expect("valid layout")
    }

    fn run(state: &mut GameState, frames: u32, sink: &mut dyn EventSink) {
        for _ in 0..frames {
            tick(state, &TickInput::default(), sink);
        }
    }

    /// Press on the bottom wall and release toward `target`
    fn launch_toward(state: &mut GameState, target: Vec2, sink: &mut dyn EventSink) {
        let press = state.board.launch_point(0.0);
        tick(
            state,
            &TickInput {
                aim_press: Some(press),
                aim_drag: Some(target),
                ..TickInput::default()
            },
            sink,
        );
        tick(
            state,
            &TickInput {
                aim_release: true,
                ..TickInput::default()
            },
            sink,
        );
    }

    #[test]
    fn test_aiming_stages_a_ball() {
        let mut state = new_state(Settings::default(), ONE_GOAL);
        run(&mut state, 1, &mut NullSink);
        assert_eq!(state.phase, GamePhase::Aiming);
        assert_eq!(state.balls.len(), 1);
        assert!(!state.balls[0].is_moving);
        assert_eq!(state.balls[0].kind, BallKind::Classic);
    }

    #[test]
    fn test_launch_consumes_a_ball_and_starts_playing() {
        let mut state = new_state(Settings::default(), ONE_GOAL);
        run(&mut state, 1, &mut NullSink);
        let target = state.board.span_center(6, 0, 1, 1);
        launch_toward(&mut state, target, &mut NullSink);
        assert_eq!(state.phase, GamePhase::Playing);
        assert_eq!(state.balls_left, 4);
        assert_eq!(state.stats.balls_used, 1);
        assert_eq!(state.pool.hp, 150.0);
        let ball = &state.balls[0];
        assert!(ball.is_moving);
        let expected = state.board.unit * BALL_SPEED_UNIT_FRACTION * state.settings.ball_speed;
        assert!((ball.vel.length() - expected).abs() < 1e-3);
        assert!(ball.vel.y < 0.0);
    }

    #[test]
    fn test_release_on_the_ball_cancels() {
        let mut state = new_state(Settings::default(), ONE_GOAL);
        run(&mut state, 1, &mut NullSink);
        let press = state.board.launch_point(0.0);
        launch_toward(&mut state, press + Vec2::new(1.0, -1.0), &mut NullSink);
        assert_eq!(state.phase, GamePhase::Aiming);
        assert_eq!(state.balls_left, 5);
        assert_eq!(state.stats.balls_used, 0);
        assert!(!state.balls[0].is_moving);
        assert!(state.ghosts.is_empty());
    }

    #[test]
    fn test_aim_spawns_preview_balls() {
        let mut state = new_state(Settings::default(), ONE_GOAL);
        run(&mut state, 1, &mut NullSink);
        let press = state.board.launch_point(0.0);
        let target = state.board.span_center(6, 0, 1, 1);
        tick(
            &mut state,
            &TickInput {
                aim_press: Some(press),
                aim_drag: Some(target),
                ..TickInput::default()
            },
            &mut NullSink,
        );
        assert_eq!(state.ghosts.len(), 1);
        run(&mut state, 10, &mut NullSink);
        assert_eq!(state.ghosts.len(), 1);
        run(&mut state, 1, &mut NullSink);
        assert_eq!(state.ghosts.len(), 2);
        assert_eq!(state.balls_left, 5);
        let goal = state.grid.at(6, 0).expect("goal untouched");
        assert_eq!(goal.health, 10.0);
    }

    #[test]
    fn test_turn_ends_and_returns_to_aiming() {
        let mut state = new_state(Settings::default(), ONE_GOAL);
        run(&mut state, 1, &mut NullSink);
        let target = state.board.span_center(0, 12, 1, 1) + Vec2::new(-200.0, 0.0);
        launch_toward(&mut state, target, &mut NullSink);
        assert_eq!(state.phase, GamePhase::Playing);

        tick(
            &mut state,
            &TickInput {
                force_end_turn: true,
                ..TickInput::default()
            },
            &mut NullSink,
        );
        assert_eq!(state.phase, GamePhase::Playing);
        assert!(state.balls.is_empty());
        run(&mut state, 1, &mut NullSink);
        assert_eq!(state.phase, GamePhase::Aiming);
        assert_eq!(state.balls.len(), 1);
        assert_eq!(state.balls_left, 4);
    }

    #[test]
    fn test_destroying_the_last_goal_completes_the_level() {
        let mut state = new_state(Settings::default(), "0,-6,goal,5,5,0,0,0,0,null,1,1");
        run(&mut state, 1, &mut NullSink);
        let target = state.board.span_center(6, 0, 1, 1);
        let mut sink = Vec::new();
        launch_toward(&mut state, target, &mut sink);

        let mut frames = 0;
        while state.phase == GamePhase::Playing && frames < 2_000 {
            tick(&mut state, &TickInput::default(), &mut sink);
            frames += 1;
        }
        assert_eq!(state.phase, GamePhase::LevelClearing);
        assert!(sink.iter().any(|r| r.kind == EventKind::BrickDestroyed));

        tick(
            &mut state,
            &TickInput {
                force_end_turn: true,
                ..TickInput::default()
            },
            &mut sink,
        );
        run(&mut state, 1, &mut sink);
        assert_eq!(state.phase, GamePhase::LevelComplete);
        let before = state.frame;
        run(&mut state, 5, &mut sink);
        assert_eq!(state.frame, before);
    }

    #[test]
    fn test_game_over_without_balls_or_coins() {
        let settings = Settings {
            starting_balls: 0,
            ..Settings::default()
        };
        let mut state = new_state(settings, ONE_GOAL);
        run(&mut state, 1, &mut NullSink);
        assert_eq!(state.phase, GamePhase::GameOver);
    }

    #[test]
    fn test_auto_buy_when_shop_unlocked() {
        let settings = Settings {
            starting_balls: 0,
            starting_coins: 45,
            player_level: 8,
            ..Settings::default()
        };
        let mut state = new_state(settings, ONE_GOAL);
        run(&mut state, 1, &mut NullSink);
        assert_eq!(state.phase, GamePhase::Aiming);
        assert_eq!(state.coins, 15);
        assert_eq!(state.ball_purchases, 1);
        assert_eq!(state.balls_left, 1);
        assert_eq!(state.ball_cost(), 40);
    }

    #[test]
    fn test_giant_is_auto_selected_when_out_of_balls() {
        let settings = Settings {
            starting_balls: 0,
            starting_giant_balls: 1,
            ..Settings::unlocked(5)
        };
        let mut state = new_state(settings, ONE_GOAL);
        run(&mut state, 1, &mut NullSink);
        assert_eq!(state.balls[0].kind, BallKind::Giant);
        let target = state.board.span_center(6, 0, 1, 1);
        launch_toward(&mut state, target, &mut NullSink);
        assert_eq!(state.giant_balls, 0);
        assert!(state.giant_turn);
        assert_eq!(state.pool.hp, 20.0);
    }

    #[test]
    fn test_end_of_turn_runs_overlay_actions_with_a_gap() {
        let layout = "0,-6,goal,10,10,0,0,0,0,null,1,1;\
                      3,3,normal,10,10,0,0,0,0,builder,1,1;\
                      -3,3,normal,10,10,0,0,0,0,healer,1,1;\
                      -3,2,normal,30,30,0,0,0,0,null,1,1";
        let mut state = new_state(Settings::default(), layout);
        if let Some(hurt) = state.grid.iter_mut().find(|b| b.max_health == 30.0) {
            hurt.health = 12.0;
        }
        run(&mut state, 1, &mut NullSink);
        let target = state.board.span_center(0, 12, 1, 1) + Vec2::new(-300.0, 0.0);
        launch_toward(&mut state, target, &mut NullSink);
        tick(
            &mut state,
            &TickInput {
                force_end_turn: true,
                ..TickInput::default()
            },
            &mut NullSink,
        );

        let mut sink = Vec::new();
        run(&mut state, 1, &mut sink);
        assert_eq!(state.phase, GamePhase::EndTurnSequence);
        assert_eq!(state.end_turn_actions.len(), 2);

        run(&mut state, 2, &mut sink);
        assert_eq!(state.end_turn_actions.len(), 1);
        run(&mut state, 2, &mut sink);
        assert!(state.end_turn_actions.is_empty());
        run(&mut state, 2, &mut sink);
        assert_eq!(state.phase, GamePhase::Aiming);
        assert!(sink.iter().any(|r| r.kind == EventKind::BrickHealed));
        assert!(sink.iter().any(|r| r.kind == EventKind::BrickBuilt));
        assert_eq!(state.grid.at(3, 8).map(|b| b.health), Some(22.0));
        assert_eq!(state.grid.len(), 5);
    }

    #[test]
    fn test_clearing_turn_still_settles_rewards_and_overlays() {
        let layout = "0,-6,goal,10,10,0,0,0,0,null,1,1;\
                      3,3,normal,10,10,0,0,0,0,builder,1,1";
        let mut state = new_state(Settings::unlocked(3), layout);
        run(&mut state, 1, &mut NullSink);
        state.phase = GamePhase::LevelClearing;
        state.balls.clear();
        state.grid.remove(crate::sim::BrickId(0));
        state.combo.max_this_turn = 100;
        state.progression.level = 20;
        let giants = state.giant_balls;

        handle_end_turn(&mut state);
        assert_eq!(state.giant_balls, giants + 2);
        assert_eq!(state.phase, GamePhase::EndTurnSequence);
        assert_eq!(state.end_turn_actions.len(), 1);

        let mut sink = Vec::new();
        run(&mut state, 4, &mut sink);
        assert!(sink.iter().any(|r| r.kind == EventKind::BrickBuilt));
        assert_eq!(state.phase, GamePhase::LevelComplete);
    }

    #[test]
    fn test_delayed_damage_lands_after_balls_move() {
        let layout = "0,-6,goal,10,10,0,0,0,0,null,1,1;\
                      0,0,normal,50,50,0,0,0,0,null,1,1";
        let mut state = new_state(Settings::default(), layout);
        run(&mut state, 1, &mut NullSink);
        let brick = state.grid.id_at(6, 6).expect("brick");
        let below = state.board.span_center(6, 6, 1, 1);
        state.phase = GamePhase::Playing;
        state.pool = SharedBallStats::new(150.0, 0);
        let ball = &mut state.balls[0];
        ball.pos = below + Vec2::new(0.0, state.board.unit / 2.0 + ball.radius + 1.0);
        ball.launch(Vec2::NEG_Y, 3.0);
        state.delayed.schedule(brick, 10_000.0, HitSource::Debug, 1);

        let mut sink = Vec::new();
        tick(&mut state, &TickInput::default(), &mut sink);
        assert!(state.grid.get(brick).is_none());
        assert!(state.balls[0].vel.y > 0.0, "ball bounced off the brick before it broke");
        let order: Vec<EventKind> = sink
            .iter()
            .map(|r| r.kind)
            .filter(|k| matches!(k, EventKind::BrickHit | EventKind::BrickDestroyed))
            .collect();
        assert_eq!(order.first(), Some(&EventKind::BrickHit));
        assert_eq!(order.last(), Some(&EventKind::BrickDestroyed));
    }

    #[test]
    fn test_brick_ring_rounds_samples_to_grid_indices() {
        let mut state = new_state(Settings::default(), ONE_GOAL);
        let center = state.board.span_center(6, 6, 1, 1);
        let mut sink = Vec::new();
        brick_ring(&mut state, center, &mut sink);
        assert!(state.grid.id_at(10, 7).is_some());
        assert!(state.grid.id_at(9, 6).is_some());
        assert!(state.grid.id_at(6, 6).is_none());
        assert!(sink.iter().all(|r| r.kind == EventKind::BrickBuilt));
    }

    #[test]
    fn test_power_up_spends_a_shared_use() {
        let settings = Settings {
            selected_ball: BallKind::Bullet,
            ..Settings::default()
        };
        let mut state = new_state(settings, ONE_GOAL);
        run(&mut state, 1, &mut NullSink);
        let target = state.board.span_center(0, 12, 1, 1) + Vec2::new(-300.0, 0.0);
        launch_toward(&mut state, target, &mut NullSink);
        assert_eq!(state.pool.uses, 3);

        let mut sink = Vec::new();
        tick(
            &mut state,
            &TickInput {
                activate_power_up: true,
                ..TickInput::default()
            },
            &mut sink,
        );
        assert_eq!(state.pool.uses, 2);
        assert_eq!(state.projectiles.len(), 4);
        assert!(sink.iter().any(|r| r.kind == EventKind::PowerUpUsed));
    }

    #[test]
    fn test_split_power_up_spawns_mini_balls() {
        let settings = Settings {
            selected_ball: BallKind::Split,
            ..Settings::default()
        };
        let mut state = new_state(settings, ONE_GOAL);
        run(&mut state, 1, &mut NullSink);
        let target = state.board.span_center(0, 12, 1, 1) + Vec2::new(-300.0, 0.0);
        launch_toward(&mut state, target, &mut NullSink);
        tick(
            &mut state,
            &TickInput {
                activate_power_up: true,
                ..TickInput::default()
            },
            &mut NullSink,
        );
        let minis: Vec<&Ball> = state.balls.iter().filter(|b| b.is_mini()).collect();
        assert_eq!(minis.len(), 2);
        assert!(minis.iter().all(|m| m.kind == BallKind::Split));
        assert_eq!(state.pool.uses, 0);
    }

    #[test]
    fn test_speed_toggle_runs_two_frames_per_render() {
        let mut state = new_state(Settings::default(), ONE_GOAL);
        render_frame(
            &mut state,
            &TickInput {
                toggle_speed: true,
                ..TickInput::default()
            },
            &mut NullSink,
        );
        assert_eq!(state.speed, SpeedMode::SpedUp);
        assert_eq!(state.frame, 1);
        render_frame(&mut state, &TickInput::default(), &mut NullSink);
        assert_eq!(state.frame, 3);
    }

    #[test]
    fn test_determinism() {
        let layout = "0,-6,goal,40,40,0,0,0,0,null,1,1;\
                      -1,-4,explosive,20,20,0,0,0,0,null,1,1;\
                      1,-4,normal,60,60,6,6,0,0,mine,2,1;\
                      0,-2,horizontalStripe,10,10,0,0,0,0,null,1,1";
        let play = || {
            let mut state = new_state(Settings::unlocked(42), layout);
            let mut sink = Vec::new();
            run(&mut state, 1, &mut sink);
            let target = state.board.span_center(7, 0, 1, 1);
            launch_toward(&mut state, target, &mut sink);
            run(&mut state, 600, &mut sink);
            (serde_json::to_string(&state.snapshot()).expect("serialisable"), sink.len())
        };
        assert_eq!(play(), play());
    }
}
