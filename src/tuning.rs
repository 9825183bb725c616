//! Data-driven game balance
//!
//! Every number the simulation uses for damage, hp, radii and rewards lives
//! here. `Default` is the authoritative balance; a JSON document only needs
//! to name the values it overrides.

use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::sim::entity::BallKind;

/// Per-type stats shared by every primary ball
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BallStats {
    /// Starting (and maximum) shared hp
    pub hp: f32,
    /// Shared hp lost per wall bounce
    pub wall_hit_damage: f32,
    /// Shared hp lost per brick hit
    pub brick_hit_damage: f32,
    /// Damage dealt per brick hit before modifiers
    pub base_damage: f32,
    /// Power-up charges per launch
    pub power_up_uses: u32,
}

impl Default for BallStats {
    fn default() -> Self {
        Self {
            hp: 100.0,
            wall_hit_damage: 10.0,
            brick_hit_damage: 0.0,
            base_damage: 10.0,
            power_up_uses: 0,
        }
    }
}

/// Radius + damage of an area blast
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BlastStats {
    pub radius_tiles: f32,
    pub damage: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MiniBallStats {
    pub wall_hit_damage: f32,
    pub base_damage: f32,
    pub count: u32,
    /// Angle between the parent's heading and each mini-ball, in degrees
    pub spread_degrees: f32,
}

impl Default for MiniBallStats {
    fn default() -> Self {
        Self {
            wall_hit_damage: 5.0,
            base_damage: 6.0,
            count: 2,
            spread_degrees: 30.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PiercingStats {
    pub contact_count: u32,
    pub bonus_damage: f32,
}

impl Default for PiercingStats {
    fn default() -> Self {
        Self {
            contact_count: 5,
            bonus_damage: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BrickBallStats {
    pub spawn_radius_tiles: f32,
    /// Probability a spawned brick carries coins
    pub coin_chance: f32,
    pub coin_min: u32,
    pub coin_max: u32,
    pub spawned_hp: f32,
}

impl Default for BrickBallStats {
    fn default() -> Self {
        Self {
            spawn_radius_tiles: 3.0,
            coin_chance: 0.2,
            coin_min: 5,
            coin_max: 15,
            spawned_hp: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BulletStats {
    pub count: u32,
    pub damage: f32,
    /// Bullet speed relative to the grid unit per frame
    pub speed_unit_fraction: f32,
}

impl Default for BulletStats {
    fn default() -> Self {
        Self {
            count: 4,
            damage: 10.0,
            speed_unit_fraction: 0.4,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HomingStats {
    pub damage: f32,
    /// Max heading change per frame, radians
    pub turn_rate: f32,
    pub explosion_radius_tiles: f32,
    /// Extra explosion radius from upgrades, tiles
    pub bonus_explosion_radius_tiles: f32,
    pub speed_unit_fraction: f32,
    pub lifetime_frames: u32,
}

impl Default for HomingStats {
    fn default() -> Self {
        Self {
            damage: 20.0,
            turn_rate: 0.2,
            explosion_radius_tiles: 1.5,
            bonus_explosion_radius_tiles: 0.0,
            speed_unit_fraction: 0.3,
            lifetime_frames: 600,
        }
    }
}

/// Brick-side balance
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BrickStats {
    pub max_hp_normal: f32,
    pub max_hp_merged: f32,
    pub explosive: BlastStats,
    pub stripe_damage: f32,
    pub mine: BlastStats,
    /// Hp a healer overlay restores to each neighbour
    pub healer_amount: f32,
    /// Hp of a brick placed by a builder overlay
    pub builder_hp: f32,
    /// Hp of combo-reward stripe bricks
    pub stripe_bonus_hp: f32,
}

impl Default for BrickStats {
    fn default() -> Self {
        Self {
            max_hp_normal: 200.0,
            max_hp_merged: 600.0,
            explosive: BlastStats {
                radius_tiles: 2.5,
                damage: 30.0,
            },
            stripe_damage: 30.0,
            mine: BlastStats {
                radius_tiles: 1.2,
                damage: 10.0,
            },
            healer_amount: 10.0,
            builder_hp: 10.0,
            stripe_bonus_hp: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct XpSettings {
    /// Base for the level-up formula: base * L * (L + 1) / 2
    pub base_amount: f32,
    pub per_orb: f32,
    /// Multiplied by the attracting ball's radius
    pub magnetic_radius_multiplier: f32,
    /// Orb pull speed, pixels per frame
    pub magnetic_strength: f32,
    pub orb_cooldown_frames: u32,
    /// Pending xp is credited every this many frames
    pub drip_interval_frames: u32,
    /// Pending xp is credited in this many steps
    pub drip_steps: u32,
}

impl Default for XpSettings {
    fn default() -> Self {
        Self {
            base_amount: 50.0,
            per_orb: 10.0,
            magnetic_radius_multiplier: 5.0,
            magnetic_strength: 10.0,
            orb_cooldown_frames: 20,
            drip_interval_frames: 3,
            drip_steps: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AimingSettings {
    pub ghost_cooldown_frames: u32,
    pub ghost_speed_multiplier: f32,
    /// Multiplied by the ball radius
    pub cancel_radius_multiplier: f32,
    /// Ghost lifetime, seconds
    pub aim_length_secs: f32,
}

impl Default for AimingSettings {
    fn default() -> Self {
        Self {
            ghost_cooldown_frames: 10,
            ghost_speed_multiplier: 0.75,
            cancel_radius_multiplier: 2.5,
            aim_length_secs: 0.4,
        }
    }
}

/// Player level at which each feature switches on
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct UnlockLevels {
    pub combo_mines: u32,
    pub shop_buy_ball: u32,
    pub stripe_bonus: u32,
    pub giant_bonus: u32,
}

impl Default for UnlockLevels {
    fn default() -> Self {
        Self {
            combo_mines: 4,
            shop_buy_ball: 8,
            stripe_bonus: 11,
            giant_bonus: 14,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ComboRewards {
    /// One mine per this many combo
    pub combo_per_mine: u32,
    pub mine_combo_cap: u32,
    pub combo_per_stripe: u32,
    pub stripe_combo_cap: u32,
    pub combo_per_giant: u32,
}

impl Default for ComboRewards {
    fn default() -> Self {
        Self {
            combo_per_mine: 3,
            mine_combo_cap: 15,
            combo_per_stripe: 15,
            stripe_combo_cap: 60,
            combo_per_giant: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ShopParams {
    pub buy_ball_base_cost: u64,
    pub buy_ball_increment: u64,
}

impl Default for ShopParams {
    fn default() -> Self {
        Self {
            buy_ball_base_cost: 30,
            buy_ball_increment: 10,
        }
    }
}

/// Complete balance table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub classic: BallStats,
    pub explosive: BallStats,
    pub piercing: BallStats,
    pub split: BallStats,
    pub brick: BallStats,
    pub bullet: BallStats,
    pub homing: BallStats,
    pub giant: BallStats,

    pub mini_ball: MiniBallStats,
    pub explosive_ball: BlastStats,
    pub piercing_ball: PiercingStats,
    pub brick_ball: BrickBallStats,
    pub bullet_ball: BulletStats,
    pub homing_ball: HomingStats,

    pub bricks: BrickStats,
    pub xp: XpSettings,
    pub aiming: AimingSettings,
    pub unlocks: UnlockLevels,
    pub combo: ComboRewards,
    pub shop: ShopParams,
    /// Pending xp granted when an equipment brick finds nothing new
    pub equipment_fallback_xp: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            classic: BallStats {
                hp: 150.0,
                ..BallStats::default()
            },
            explosive: BallStats {
                power_up_uses: 2,
                ..BallStats::default()
            },
            piercing: BallStats {
                brick_hit_damage: 2.0,
                power_up_uses: 2,
                ..BallStats::default()
            },
            split: BallStats {
                power_up_uses: 1,
                ..BallStats::default()
            },
            brick: BallStats {
                power_up_uses: 1,
                ..BallStats::default()
            },
            bullet: BallStats {
                power_up_uses: 3,
                ..BallStats::default()
            },
            homing: BallStats {
                power_up_uses: 2,
                ..BallStats::default()
            },
            // Dies on its first wall hit
            giant: BallStats {
                hp: 20.0,
                wall_hit_damage: 20.0,
                brick_hit_damage: 1.0,
                base_damage: 1000.0,
                power_up_uses: 0,
            },
            mini_ball: MiniBallStats::default(),
            explosive_ball: BlastStats {
                radius_tiles: 2.5,
                damage: 30.0,
            },
            piercing_ball: PiercingStats::default(),
            brick_ball: BrickBallStats::default(),
            bullet_ball: BulletStats::default(),
            homing_ball: HomingStats::default(),
            bricks: BrickStats::default(),
            xp: XpSettings::default(),
            aiming: AimingSettings::default(),
            unlocks: UnlockLevels::default(),
            combo: ComboRewards::default(),
            shop: ShopParams::default(),
            equipment_fallback_xp: 1000.0,
        }
    }
}

impl Tuning {
    /// Stats for a primary ball type
    pub fn ball(&self, kind: BallKind) -> &BallStats {
        match kind {
            BallKind::Classic => &self.classic,
            BallKind::Explosive => &self.explosive,
            BallKind::Piercing => &self.piercing,
            BallKind::Split => &self.split,
            BallKind::Brick => &self.brick,
            BallKind::Bullet => &self.bullet,
            BallKind::Homing => &self.homing,
            BallKind::Giant => &self.giant,
        }
    }

    /// Parse a (possibly partial) JSON balance document
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let tuning: Tuning = serde_json::from_str(json).map_err(|e| SimError::config("tuning", e))?;
        log::info!("Loaded tuning overrides");
        Ok(tuning)
    }

    /// Xp needed to go from `level` to `level + 1`
    pub fn xp_for_level(&self, level: u32) -> f32 {
        let l = level as f32;
        self.xp.base_amount * l * (l + 1.0) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_balance_sheet() {
        let t = Tuning::default();
        assert_eq!(t.ball(BallKind::Classic).hp, 150.0);
        assert_eq!(t.ball(BallKind::Giant).base_damage, 1000.0);
        assert_eq!(t.ball(BallKind::Bullet).power_up_uses, 3);
        assert_eq!(t.bricks.mine.radius_tiles, 1.2);
    }

    #[test]
    fn partial_json_overrides_only_named_keys() {
        let t = Tuning::from_json(r#"{ "classic": { "hp": 300.0 }, "equipment_fallback_xp": 5.0 }"#)
            .expect("valid json");
        assert_eq!(t.classic.hp, 300.0);
        assert_eq!(t.classic.wall_hit_damage, 10.0);
        assert_eq!(t.equipment_fallback_xp, 5.0);
        assert_eq!(t.giant.hp, 20.0);
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = Tuning::from_json("{ not json").unwrap_err();
        assert!(matches!(err, SimError::Config { what: "tuning", .. }));
    }

    #[test]
    fn xp_threshold_is_triangular() {
        let t = Tuning::default();
        assert_eq!(t.xp_for_level(1), 50.0);
        assert_eq!(t.xp_for_level(3), 300.0);
    }
}
