//! Bricks: health, currency, overlays and the hit operation

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::catalog::{self, BrickKind};
use super::event::{BrickHit, Event, HitSource};
use super::grid::BrickId;
use crate::consts::BRICK_FLASH_FRAMES;

/// Status effect carried on top of a brick's type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Overlay {
    /// Detonates the first time the brick is hit
    Mine,
    /// Heals neighbours at end of turn
    Healer,
    /// Builds a brick in an empty neighbouring cell at end of turn
    Builder,
}

impl Overlay {
    pub fn as_str(&self) -> &'static str {
        match self {
            Overlay::Mine => "mine",
            Overlay::Healer => "healer",
            Overlay::Builder => "builder",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "mine" => Some(Overlay::Mine),
            "healer" => Some(Overlay::Healer),
            "builder" => Some(Overlay::Builder),
            _ => None,
        }
    }
}

/// A brick occupying a `width x height` span of grid cells
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brick {
    pub id: BrickId,
    pub kind: BrickKind,
    pub overlay: Option<Overlay>,
    /// Top-left cell
    pub col: usize,
    pub row: usize,
    /// Span in cells
    pub width: usize,
    pub height: usize,
    /// Pixel centre of the span
    pub center: Vec2,
    /// Pixel half extents of the span
    pub half_size: Vec2,
    pub health: f32,
    pub max_health: f32,
    pub coins: u32,
    pub max_coins: u32,
    pub gems: u32,
    pub max_gems: u32,
    /// Hit flash frames
    pub flash: u8,
}

impl Brick {
    /// Single-cell brick; geometry is filled in when placed on the grid
    pub fn new(kind: BrickKind, health: f32) -> Self {
        Self {
            id: BrickId(0),
            kind,
            overlay: None,
            col: 0,
            row: 0,
            width: 1,
            height: 1,
            center: Vec2::ZERO,
            half_size: Vec2::ZERO,
            health,
            max_health: health,
            coins: 0,
            max_coins: 0,
            gems: 0,
            max_gems: 0,
            flash: 0,
        }
    }

    pub fn with_span(mut self, width: usize, height: usize) -> Self {
        self.width = width.max(1);
        self.height = height.max(1);
        self
    }

    pub fn with_overlay(mut self, overlay: Option<Overlay>) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn with_coins(mut self, coins: u32) -> Self {
        self.coins = coins;
        self.max_coins = coins;
        self
    }

    pub fn with_gems(mut self, gems: u32) -> Self {
        self.gems = gems;
        self.max_gems = gems;
        self
    }

    #[inline]
    pub fn is_broken(&self) -> bool {
        self.health <= 0.0
    }

    #[inline]
    pub fn is_merged(&self) -> bool {
        self.width > 1 || self.height > 1
    }

    #[inline]
    pub fn is_goal(&self) -> bool {
        self.kind == BrickKind::Goal
    }

    pub fn total_layers(&self) -> u32 {
        catalog::total_layers(self.kind, self.health, self.is_merged())
    }

    /// Closest point of the brick rectangle to `p`
    pub fn closest_point(&self, p: Vec2) -> Vec2 {
        p.clamp(self.center - self.half_size, self.center + self.half_size)
    }

    /// Cells covered by this brick
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (self.row..self.row + self.height)
            .flat_map(move |r| (self.col..self.col + self.width).map(move |c| (c, r)))
    }

    /// Apply damage. Returns `None` (and mutates nothing) when the brick is
    /// already broken or immune to this source.
    pub fn hit(&mut self, damage: f32, source: HitSource) -> Option<BrickHit> {
        if self.is_broken() {
            return None;
        }
        if self.kind == BrickKind::Wool && !source.is_direct() {
            return None;
        }
        let damage = if damage.is_finite() {
            damage.max(0.0)
        } else {
            log::warn!("Brick {:?} hit with invalid damage {}, using 1", self.id, damage);
            1.0
        };

        let total_layers = self.total_layers();
        self.flash = BRICK_FLASH_FRAMES;
        let damage_dealt = damage.min(self.health);
        self.health = (self.health - damage_dealt).max(0.0);

        let coins_dropped = self.shrink_coins();
        let gems_dropped = self.shrink_gems();

        let overlay = self.overlay;
        let mut sub_events = Vec::new();
        if overlay == Some(Overlay::Mine) {
            sub_events.push(Event::ExplodeMine { pos: self.center });
            self.overlay = None;
        }

        Some(BrickHit {
            brick: self.id,
            damage_dealt,
            coins_dropped,
            gems_dropped,
            is_broken: self.is_broken(),
            center: self.center,
            total_layers,
            source,
            source_vel: None,
            overlay,
            sub_events,
        })
    }

    /// Remaining share of a max counter after health changed
    fn remaining_share(&self, max: u32) -> u32 {
        if self.max_health <= 0.0 {
            return 0;
        }
        let effective = self.health.clamp(0.0, self.max_health);
        (effective * max as f32 / self.max_health).floor() as u32
    }

    fn shrink_coins(&mut self) -> u32 {
        if self.max_coins == 0 {
            return 0;
        }
        let after = self.remaining_share(self.max_coins).min(self.coins);
        let dropped = self.coins - after;
        self.coins = after;
        dropped
    }

    fn shrink_gems(&mut self) -> u32 {
        if self.max_gems == 0 {
            return 0;
        }
        let after = self.remaining_share(self.max_gems).min(self.gems);
        let dropped = self.gems - after;
        self.gems = after;
        dropped
    }

    /// Restore health, capped at max. Returns hp actually restored.
    pub fn heal(&mut self, amount: f32) -> f32 {
        if self.is_broken() || !amount.is_finite() || amount <= 0.0 {
            return 0.0;
        }
        let before = self.health;
        self.health = (self.health + amount).min(self.max_health);
        self.health - before
    }

    /// Raise max health (bounded by `cap`) and heal to full
    pub fn buff_health(&mut self, amount: f32, cap: f32) {
        if !amount.is_finite() {
            return;
        }
        let new_max = (self.max_health + amount).min(cap);
        self.max_health = new_max;
        self.health = new_max;
    }

    /// Advance per-frame visual timers
    pub fn tick_flash(&mut self) {
        self.flash = self.flash.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::entity::BallKind;
    use proptest::prelude::*;

    const BALL: HitSource = HitSource::Ball {
        id: 1,
        kind: BallKind::Classic,
    };

    #[test]
    fn half_damage_drops_half_the_coins() {
        let mut brick = Brick::new(BrickKind::Normal, 10.0).with_coins(10);
        let hit = brick.hit(5.0, BALL).expect("brick alive");
        assert_eq!(brick.health, 5.0);
        assert_eq!(brick.coins, 5);
        assert_eq!(hit.coins_dropped, 5);
        assert!(!hit.is_broken);
        assert_eq!(brick.flash, BRICK_FLASH_FRAMES);
    }

    #[test]
    fn hitting_a_broken_brick_is_a_no_op() {
        let mut brick = Brick::new(BrickKind::Normal, 10.0);
        let hit = brick.hit(50.0, BALL).expect("brick alive");
        assert!(hit.is_broken);
        assert_eq!(hit.damage_dealt, 10.0);
        brick.flash = 0;
        assert!(brick.hit(5.0, BALL).is_none());
        assert_eq!(brick.flash, 0);
        assert_eq!(brick.health, 0.0);
    }

    #[test]
    fn non_finite_damage_counts_as_one() {
        let mut brick = Brick::new(BrickKind::Normal, 10.0);
        let hit = brick.hit(f32::NAN, BALL).expect("brick alive");
        assert_eq!(hit.damage_dealt, 1.0);
        assert_eq!(brick.health, 9.0);
    }

    #[test]
    fn wool_ignores_indirect_damage() {
        let mut brick = Brick::new(BrickKind::Wool, 20.0);
        assert!(brick.hit(10.0, HitSource::Stripe).is_none());
        assert_eq!(brick.health, 20.0);
        assert!(brick.hit(10.0, BALL).is_some());
        assert_eq!(brick.health, 10.0);
    }

    #[test]
    fn mine_detonates_once() {
        let mut brick = Brick::new(BrickKind::Normal, 30.0).with_overlay(Some(Overlay::Mine));
        let hit = brick.hit(1.0, BALL).expect("alive");
        assert_eq!(hit.sub_events.len(), 1);
        assert!(matches!(hit.sub_events[0], Event::ExplodeMine { .. }));
        assert_eq!(brick.overlay, None);
        let hit = brick.hit(1.0, BALL).expect("alive");
        assert!(hit.sub_events.is_empty());
    }

    #[test]
    fn heal_and_buff_respect_caps() {
        let mut brick = Brick::new(BrickKind::Normal, 20.0);
        brick.hit(15.0, BALL);
        assert_eq!(brick.heal(100.0), 15.0);
        assert_eq!(brick.health, 20.0);
        brick.buff_health(500.0, 200.0);
        assert_eq!(brick.max_health, 200.0);
        assert_eq!(brick.health, 200.0);
    }

    proptest! {
        #[test]
        fn hit_keeps_counters_in_range(
            max_health in 1.0f32..600.0,
            health_frac in 0.01f32..1.0,
            max_coins in 0u32..50,
            max_gems in 0u32..5,
            hits in proptest::collection::vec(0.0f32..300.0, 1..8),
        ) {
            let mut brick = Brick::new(BrickKind::Normal, max_health).with_coins(max_coins).with_gems(max_gems);
            brick.health = max_health * health_frac;
            for damage in hits {
                let before = brick.health;
                let result = brick.hit(damage, BALL);
                if before <= 0.0 {
                    prop_assert!(result.is_none());
                }
                prop_assert!(brick.health >= 0.0 && brick.health <= brick.max_health);
                prop_assert!(brick.coins <= brick.max_coins);
                prop_assert!(brick.gems <= brick.max_gems);
                prop_assert!(brick.coins <= (brick.health * brick.max_coins as f32 / brick.max_health).floor() as u32);
                prop_assert!(brick.gems <= (brick.health * brick.max_gems as f32 / brick.max_health).floor() as u32);
            }
        }
    }
}
