//! Moving entities: balls, projectiles, xp orbs
//!
//! Every primary ball alive in a turn (the launched ball plus any ball-cage
//! clones) draws from one `SharedBallStats` pool held by `GameState`.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::grid::BrickId;
use crate::consts::*;

/// Primary ball type; selects stats, power-up and equipment slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BallKind {
    Classic,
    Explosive,
    Piercing,
    Split,
    Brick,
    Bullet,
    Homing,
    Giant,
}

impl BallKind {
    pub const ALL: [BallKind; 8] = [
        BallKind::Classic,
        BallKind::Explosive,
        BallKind::Piercing,
        BallKind::Split,
        BallKind::Brick,
        BallKind::Bullet,
        BallKind::Homing,
        BallKind::Giant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BallKind::Classic => "classic",
            BallKind::Explosive => "explosive",
            BallKind::Piercing => "piercing",
            BallKind::Split => "split",
            BallKind::Brick => "brick",
            BallKind::Bullet => "bullet",
            BallKind::Homing => "homing",
            BallKind::Giant => "giant",
        }
    }

    /// Radius as a fraction of the grid unit
    pub fn radius_factor(&self) -> f32 {
        match self {
            BallKind::Giant => GIANT_BALL_RADIUS_FACTOR,
            _ => BALL_RADIUS_FACTOR,
        }
    }
}

/// How a ball participates in the turn
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BallRole {
    /// Launched ball or ball-cage clone; draws from the shared pool
    Primary,
    /// Split fragment; `orphaned` once its parent pool is empty
    Mini { orphaned: bool },
    /// Aim preview; never damages, expires after `ttl` frames
    Ghost { ttl: u32 },
}

/// A ball in flight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ball {
    pub id: u32,
    /// Logical type; mini-balls carry their parent's type
    pub kind: BallKind,
    pub role: BallRole,
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    pub is_moving: bool,
    pub is_dying: bool,
    pub is_dead: bool,
    /// Remaining brick contacts that pass through instead of bouncing
    pub piercing_contacts_left: u32,
    /// Bricks currently being pierced (counted once per pass)
    pub pierced: Vec<BrickId>,
    /// Bricks this ball recently damaged, with frames left
    pub hit_cooldowns: Vec<(BrickId, u8)>,
    /// Giant attrition accumulator
    pub damage_dealt_for_hp_loss: f32,
    /// Brick hits this launch
    pub hit_count: u32,
}

impl Ball {
    pub fn new(id: u32, kind: BallKind, role: BallRole, pos: Vec2, unit: f32) -> Self {
        let factor = match role {
            BallRole::Mini { .. } => MINI_BALL_RADIUS_FACTOR,
            _ => kind.radius_factor(),
        };
        Self {
            id,
            kind,
            role,
            pos,
            vel: Vec2::ZERO,
            radius: unit * factor,
            is_moving: false,
            is_dying: false,
            is_dead: false,
            piercing_contacts_left: 0,
            pierced: Vec::new(),
            hit_cooldowns: Vec::new(),
            damage_dealt_for_hp_loss: 0.0,
            hit_count: 0,
        }
    }

    #[inline]
    pub fn is_primary(&self) -> bool {
        matches!(self.role, BallRole::Primary)
    }

    #[inline]
    pub fn is_mini(&self) -> bool {
        matches!(self.role, BallRole::Mini { .. })
    }

    #[inline]
    pub fn is_ghost(&self) -> bool {
        matches!(self.role, BallRole::Ghost { .. })
    }

    #[inline]
    pub fn is_giant(&self) -> bool {
        self.kind == BallKind::Giant && self.is_primary()
    }

    #[inline]
    pub fn is_piercing(&self) -> bool {
        self.piercing_contacts_left > 0
    }

    pub fn launch(&mut self, dir: Vec2, speed: f32) {
        self.vel = dir.normalize_or_zero() * speed;
        self.is_moving = true;
    }

    pub fn on_cooldown(&self, brick: BrickId) -> bool {
        self.hit_cooldowns.iter().any(|&(id, _)| id == brick)
    }

    pub fn set_cooldown(&mut self, brick: BrickId) {
        match self.hit_cooldowns.iter_mut().find(|(id, _)| *id == brick) {
            Some(entry) => entry.1 = BRICK_HIT_COOLDOWN_FRAMES,
            None => self.hit_cooldowns.push((brick, BRICK_HIT_COOLDOWN_FRAMES)),
        }
    }

    /// Age cooldown entries by one frame
    pub fn tick_cooldowns(&mut self) {
        for entry in &mut self.hit_cooldowns {
            entry.1 = entry.1.saturating_sub(1);
        }
        self.hit_cooldowns.retain(|&(_, frames)| frames > 0);
    }
}

/// Hp and power-up charges shared by every primary ball of a turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SharedBallStats {
    pub hp: f32,
    pub max_hp: f32,
    pub uses: u32,
    pub max_uses: u32,
    /// Hp bar flash frames
    pub flash: u8,
}

impl SharedBallStats {
    pub fn new(max_hp: f32, max_uses: u32) -> Self {
        Self {
            hp: max_hp,
            max_hp,
            uses: max_uses,
            max_uses,
            flash: 0,
        }
    }

    pub fn take_damage(&mut self, amount: f32) {
        self.hp = (self.hp - amount).max(0.0);
        self.flash = BALL_FLASH_FRAMES;
    }

    pub fn heal(&mut self, amount: f32) {
        self.hp = (self.hp + amount).min(self.max_hp);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hp <= 0.0
    }
}

impl Default for SharedBallStats {
    fn default() -> Self {
        Self::new(0.0, 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ProjectileKind {
    /// Damages the first brick it touches
    Straight,
    /// Steers toward a target and explodes on contact
    Homing {
        target: Option<BrickId>,
        turn_rate: f32,
        explosion_radius: f32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projectile {
    pub id: u32,
    pub kind: ProjectileKind,
    /// Ball type whose equipment fired it
    pub owner: BallKind,
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    pub damage: f32,
    /// Frames left before it fizzles
    pub ttl: u32,
    pub is_dead: bool,
}

/// Xp pickup dropped by a destroyed brick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XpOrb {
    pub pos: Vec2,
    pub vel: Vec2,
    /// Frames before it can be attracted
    pub cooldown: u32,
    pub collected: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldowns_expire_after_three_frames() {
        let mut ball = Ball::new(1, BallKind::Classic, BallRole::Primary, Vec2::ZERO, 32.0);
        let id = BrickId(4);
        ball.set_cooldown(id);
        assert!(ball.on_cooldown(id));
        ball.tick_cooldowns();
        ball.tick_cooldowns();
        assert!(ball.on_cooldown(id));
        ball.tick_cooldowns();
        assert!(!ball.on_cooldown(id));
    }

    #[test]
    fn mini_balls_are_smaller_and_keep_parent_kind() {
        let mini = Ball::new(2, BallKind::Split, BallRole::Mini { orphaned: false }, Vec2::ZERO, 10.0);
        assert_eq!(mini.kind, BallKind::Split);
        assert!((mini.radius - 2.0).abs() < 1e-6);
        assert!(!mini.is_giant());
    }

    #[test]
    fn shared_pool_clamps() {
        let mut pool = SharedBallStats::new(100.0, 2);
        pool.take_damage(150.0);
        assert_eq!(pool.hp, 0.0);
        assert!(pool.is_empty());
        pool.heal(500.0);
        assert_eq!(pool.hp, 100.0);
    }
}
