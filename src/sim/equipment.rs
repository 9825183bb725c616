//! Equipment modifier pipeline
//!
//! Passive items are slotted per ball type and looked up by the ball's
//! logical type (mini-balls use their parent's). Each hook below is a pure
//! function of the active items plus the per-turn trackers; hooks that need
//! the world to change return `Effect`s for the processor to apply.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::brick::Overlay;
use super::entity::{BallKind, SharedBallStats};
use super::event::BlastSource;
use crate::consts::{EQUIPMENT_PULSE_FRAMES, SIM_FPS};

/// Slots per ball type
pub const DEFAULT_SLOTS: usize = 3;

/// Stable item identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentId {
    DirectDamage,
    ComboDamage,
    DamageReduction,
    RampingDamage,
    Executioner,
    Phaser,
    ImpactDistributor,
    Overflow,
    SlowBall,
    WallExplosion,
    WallBullets,
    HealerLeech,
    Vampire,
    CoinBoost,
    XpMagnet,
    XpHeal,
    LastStand,
    Retaliation,
    PowerupInvulnerability,
    MinePower,
    TaxReturn,
    ExplosionRadius,
    ZapAura,
}

impl EquipmentId {
    pub const ALL: [EquipmentId; 23] = [
        EquipmentId::DirectDamage,
        EquipmentId::ComboDamage,
        EquipmentId::DamageReduction,
        EquipmentId::RampingDamage,
        EquipmentId::Executioner,
        EquipmentId::Phaser,
        EquipmentId::ImpactDistributor,
        EquipmentId::Overflow,
        EquipmentId::SlowBall,
        EquipmentId::WallExplosion,
        EquipmentId::WallBullets,
        EquipmentId::HealerLeech,
        EquipmentId::Vampire,
        EquipmentId::CoinBoost,
        EquipmentId::XpMagnet,
        EquipmentId::XpHeal,
        EquipmentId::LastStand,
        EquipmentId::Retaliation,
        EquipmentId::PowerupInvulnerability,
        EquipmentId::MinePower,
        EquipmentId::TaxReturn,
        EquipmentId::ExplosionRadius,
        EquipmentId::ZapAura,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EquipmentId::DirectDamage => "direct_damage",
            EquipmentId::ComboDamage => "combo_damage",
            EquipmentId::DamageReduction => "damage_reduction",
            EquipmentId::RampingDamage => "ramping_damage",
            EquipmentId::Executioner => "executioner",
            EquipmentId::Phaser => "phaser",
            EquipmentId::ImpactDistributor => "impact_distributor",
            EquipmentId::Overflow => "overflow",
            EquipmentId::SlowBall => "slow_ball",
            EquipmentId::WallExplosion => "wall_explosion",
            EquipmentId::WallBullets => "wall_bullets",
            EquipmentId::HealerLeech => "healer_leech",
            EquipmentId::Vampire => "vampire",
            EquipmentId::CoinBoost => "coin_boost",
            EquipmentId::XpMagnet => "xp_magnet",
            EquipmentId::XpHeal => "xp_heal",
            EquipmentId::LastStand => "last_stand",
            EquipmentId::Retaliation => "retaliation",
            EquipmentId::PowerupInvulnerability => "powerup_invulnerability",
            EquipmentId::MinePower => "mine_power",
            EquipmentId::TaxReturn => "tax_return",
            EquipmentId::ExplosionRadius => "explosion_radius",
            EquipmentId::ZapAura => "zap_aura",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.as_str() == s)
    }
}

/// One item with its rolled values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "id", rename_all = "snake_case")]
pub enum Equipment {
    /// Flat damage per hit
    DirectDamage { bonus: f32 },
    /// Damage per current combo point
    ComboDamage { per_combo: f32 },
    /// Negative flat damage (combo building)
    DamageReduction { amount: f32 },
    /// Bonus damage built up every pulse, spent on the next brick hit
    RampingDamage { per_pulse: f32 },
    /// Non-goal bricks at or below this hp die on contact
    Executioner { threshold: f32 },
    /// Brick hits that do not bounce, per turn
    Phaser { charges: u32 },
    /// Shared hp change on wall hits (negative) and brick hits (positive)
    ImpactDistributor { wall: f32, brick: f32 },
    /// Extra hp and a power-up use; the first hits buff bricks instead
    Overflow { hp: f32, buffing_hits: u32 },
    SlowBall { speed_multiplier: f32 },
    /// Wall hits charge a blast released on the next brick hit
    WallExplosion { charge_per_hit: f32, radius_tiles: f32 },
    /// Wall hits fire a fan of straight bullets
    WallBullets { count: u32, damage: f32 },
    /// Heal when hitting a healer brick
    HealerLeech { heal: f32 },
    /// Heal when a brick is destroyed
    Vampire { heal: f32 },
    /// One extra coin per this many collected
    CoinBoost { coins_per_bonus: u32 },
    XpMagnet { xp_multiplier: f32, radius_multiplier: f32 },
    /// Heal 2 hp per this many orbs
    XpHeal { orbs_per_heal: u32 },
    /// Orbs build volley charges fired when the ball starts dying
    LastStand { orbs: u32, bullets: u32, damage: f32 },
    /// Homing missile per this much hp lost
    Retaliation { hp_per_missile: f32, damage: f32 },
    PowerupInvulnerability { seconds: f32 },
    MinePower { mines: u32 },
    TaxReturn { coins: u64, brick_heal: f32, radius_tiles: f32 },
    ExplosionRadius { damage_multiplier: f32, radius_bonus_tiles: f32 },
    ZapAura { damage: f32, radius_tiles: f32 },
}

impl Equipment {
    pub fn id(&self) -> EquipmentId {
        match self {
            Equipment::DirectDamage { .. } => EquipmentId::DirectDamage,
            Equipment::ComboDamage { .. } => EquipmentId::ComboDamage,
            Equipment::DamageReduction { .. } => EquipmentId::DamageReduction,
            Equipment::RampingDamage { .. } => EquipmentId::RampingDamage,
            Equipment::Executioner { .. } => EquipmentId::Executioner,
            Equipment::Phaser { .. } => EquipmentId::Phaser,
            Equipment::ImpactDistributor { .. } => EquipmentId::ImpactDistributor,
            Equipment::Overflow { .. } => EquipmentId::Overflow,
            Equipment::SlowBall { .. } => EquipmentId::SlowBall,
            Equipment::WallExplosion { .. } => EquipmentId::WallExplosion,
            Equipment::WallBullets { .. } => EquipmentId::WallBullets,
            Equipment::HealerLeech { .. } => EquipmentId::HealerLeech,
            Equipment::Vampire { .. } => EquipmentId::Vampire,
            Equipment::CoinBoost { .. } => EquipmentId::CoinBoost,
            Equipment::XpMagnet { .. } => EquipmentId::XpMagnet,
            Equipment::XpHeal { .. } => EquipmentId::XpHeal,
            Equipment::LastStand { .. } => EquipmentId::LastStand,
            Equipment::Retaliation { .. } => EquipmentId::Retaliation,
            Equipment::PowerupInvulnerability { .. } => EquipmentId::PowerupInvulnerability,
            Equipment::MinePower { .. } => EquipmentId::MinePower,
            Equipment::TaxReturn { .. } => EquipmentId::TaxReturn,
            Equipment::ExplosionRadius { .. } => EquipmentId::ExplosionRadius,
            Equipment::ZapAura { .. } => EquipmentId::ZapAura,
        }
    }

    /// Base roll for an item as found in an equipment brick
    pub fn standard(id: EquipmentId) -> Self {
        match id {
            EquipmentId::DirectDamage => Equipment::DirectDamage { bonus: 5.0 },
            EquipmentId::ComboDamage => Equipment::ComboDamage { per_combo: 1.0 },
            EquipmentId::DamageReduction => Equipment::DamageReduction { amount: -5.0 },
            EquipmentId::RampingDamage => Equipment::RampingDamage { per_pulse: 1.0 },
            EquipmentId::Executioner => Equipment::Executioner { threshold: 10.0 },
            EquipmentId::Phaser => Equipment::Phaser { charges: 3 },
            EquipmentId::ImpactDistributor => Equipment::ImpactDistributor {
                wall: -5.0,
                brick: 2.0,
            },
            EquipmentId::Overflow => Equipment::Overflow {
                hp: 50.0,
                buffing_hits: 5,
            },
            EquipmentId::SlowBall => Equipment::SlowBall {
                speed_multiplier: 0.7,
            },
            EquipmentId::WallExplosion => Equipment::WallExplosion {
                charge_per_hit: 10.0,
                radius_tiles: 1.5,
            },
            EquipmentId::WallBullets => Equipment::WallBullets { count: 3, damage: 5.0 },
            EquipmentId::HealerLeech => Equipment::HealerLeech { heal: 5.0 },
            EquipmentId::Vampire => Equipment::Vampire { heal: 2.0 },
            EquipmentId::CoinBoost => Equipment::CoinBoost { coins_per_bonus: 5 },
            EquipmentId::XpMagnet => Equipment::XpMagnet {
                xp_multiplier: 1.5,
                radius_multiplier: 2.0,
            },
            EquipmentId::XpHeal => Equipment::XpHeal { orbs_per_heal: 3 },
            EquipmentId::LastStand => Equipment::LastStand {
                orbs: 5,
                bullets: 2,
                damage: 10.0,
            },
            EquipmentId::Retaliation => Equipment::Retaliation {
                hp_per_missile: 30.0,
                damage: 20.0,
            },
            EquipmentId::PowerupInvulnerability => Equipment::PowerupInvulnerability { seconds: 2.0 },
            EquipmentId::MinePower => Equipment::MinePower { mines: 2 },
            EquipmentId::TaxReturn => Equipment::TaxReturn {
                coins: 10,
                brick_heal: 10.0,
                radius_tiles: 2.0,
            },
            EquipmentId::ExplosionRadius => Equipment::ExplosionRadius {
                damage_multiplier: 0.8,
                radius_bonus_tiles: 0.5,
            },
            EquipmentId::ZapAura => Equipment::ZapAura {
                damage: 2.0,
                radius_tiles: 1.5,
            },
        }
    }
}

/// Owned items and per-ball-type slots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loadout {
    pub max_slots: usize,
    /// Items found this run, in discovery order
    pub owned: Vec<EquipmentId>,
    slots: BTreeMap<BallKind, Vec<Equipment>>,
}

impl Default for Loadout {
    fn default() -> Self {
        Self {
            max_slots: DEFAULT_SLOTS,
            owned: Vec::new(),
            slots: BTreeMap::new(),
        }
    }
}

impl Loadout {
    /// Active items for a ball's logical type, in slot order
    pub fn active(&self, kind: BallKind) -> &[Equipment] {
        self.slots.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn owns(&self, id: EquipmentId) -> bool {
        self.owned.contains(&id)
    }

    /// Slot an item. Rejected if the slots are full or the id is already
    /// equipped on this ball type.
    pub fn equip(&mut self, kind: BallKind, item: Equipment) -> bool {
        let max = self.max_slots;
        let slots = self.slots.entry(kind).or_default();
        if slots.len() >= max || slots.iter().any(|e| e.id() == item.id()) {
            return false;
        }
        slots.push(item);
        if !self.owned.contains(&item.id()) {
            self.owned.push(item.id());
        }
        true
    }

    pub fn unequip(&mut self, kind: BallKind, id: EquipmentId) -> Option<Equipment> {
        let slots = self.slots.get_mut(&kind)?;
        let index = slots.iter().position(|e| e.id() == id)?;
        Some(slots.remove(index))
    }

    /// Ids not owned yet, in catalogue order
    pub fn unowned(&self) -> Vec<EquipmentId> {
        EquipmentId::ALL
            .into_iter()
            .filter(|id| !self.owns(*id))
            .collect()
    }

    /// Record a found item without slotting it
    pub fn grant(&mut self, id: EquipmentId) {
        if !self.owns(id) {
            self.owned.push(id);
        }
    }
}

/// Per-turn equipment bookkeeping; reset at level start
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trackers {
    pub wall_explosion_charge: f32,
    /// Frames of invulnerability left
    pub invulnerability_frames: u32,
    pub ramping_damage: f32,
    pub ramping_timer: u32,
    pub zap_timer: u32,
    pub orbs_for_heal: u32,
    pub hp_lost_for_retaliation: f32,
    pub coins_for_duplication: u32,
    pub phaser_charges: u32,
    pub overflow_heal_charges: u32,
    pub last_stand_charges: u32,
    pub orbs_for_last_stand: u32,
}

impl Trackers {
    /// Clear the counters that only live for one launch
    pub fn reset_for_launch(&mut self) {
        self.ramping_damage = 0.0;
        self.ramping_timer = 0;
        self.orbs_for_heal = 0;
    }

    /// Clear everything that only lives for one turn
    pub fn end_turn(&mut self) {
        self.reset_for_launch();
        self.phaser_charges = 0;
        self.zap_timer = 0;
        self.overflow_heal_charges = 0;
        self.last_stand_charges = 0;
        self.orbs_for_last_stand = 0;
    }
}

/// World change requested by a hook
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    HealBall(f32),
    AddCoins(u64),
    AddPendingXp(f32),
    /// Blast centred on the triggering position
    Explode {
        radius_tiles: f32,
        damage: f32,
        source: BlastSource,
    },
    /// Fan of straight bullets around the reflected heading
    WallBullets { count: u32, damage: f32 },
    /// Homing missile from the triggering position
    HomingMissile { damage: f32 },
    /// Ring of straight bullets
    Volley { count: u32, damage: f32 },
    PlaceMines(u32),
    HealBricksNear { radius_tiles: f32, amount: f32 },
    ZapBricks { radius_tiles: f32, damage: f32 },
}

/// Final per-hit ball damage before the minimum clamp
pub fn ball_damage(items: &[Equipment], base: f32, combo: u32, trackers: &Trackers) -> f32 {
    let mut damage = base;
    for item in items {
        match *item {
            Equipment::DirectDamage { bonus } => damage += bonus,
            Equipment::ComboDamage { per_combo } => damage += combo as f32 * per_combo,
            Equipment::DamageReduction { amount } => damage += amount,
            Equipment::RampingDamage { .. } => damage += trackers.ramping_damage,
            _ => {}
        }
    }
    damage.max(1.0)
}

pub fn executioner_threshold(items: &[Equipment]) -> Option<f32> {
    items.iter().find_map(|item| match *item {
        Equipment::Executioner { threshold } => Some(threshold),
        _ => None,
    })
}

/// (wall adjustment, brick adjustment)
pub fn impact_distributor(items: &[Equipment]) -> Option<(f32, f32)> {
    items.iter().find_map(|item| match *item {
        Equipment::ImpactDistributor { wall, brick } => Some((wall, brick)),
        _ => None,
    })
}

pub fn speed_multiplier(items: &[Equipment]) -> f32 {
    items
        .iter()
        .map(|item| match *item {
            Equipment::SlowBall { speed_multiplier } => speed_multiplier,
            _ => 1.0,
        })
        .product()
}

/// (damage multiplier, extra radius in tiles)
pub fn blast_amplifier(items: &[Equipment]) -> Option<(f32, f32)> {
    items.iter().find_map(|item| match *item {
        Equipment::ExplosionRadius {
            damage_multiplier,
            radius_bonus_tiles,
        } => Some((damage_multiplier, radius_bonus_tiles)),
        _ => None,
    })
}

pub fn magnet_radius_multiplier(items: &[Equipment]) -> f32 {
    items
        .iter()
        .find_map(|item| match *item {
            Equipment::XpMagnet { radius_multiplier, .. } => Some(radius_multiplier),
            _ => None,
        })
        .unwrap_or(1.0)
}

/// Launch: phaser charges, overflow hp/use/buff charges
pub fn on_turn_start(items: &[Equipment], trackers: &mut Trackers, pool: &mut SharedBallStats) {
    for item in items {
        match *item {
            Equipment::Phaser { charges } => trackers.phaser_charges = charges,
            Equipment::Overflow { hp, buffing_hits } => {
                pool.max_hp += hp;
                pool.hp = pool.max_hp;
                pool.uses += 1;
                pool.max_uses += 1;
                trackers.overflow_heal_charges = buffing_hits;
            }
            _ => {}
        }
    }
}

/// Primary ball bounced off a wall
pub fn on_wall_hit(items: &[Equipment], trackers: &mut Trackers) -> Vec<Effect> {
    let mut effects = Vec::new();
    for item in items {
        match *item {
            Equipment::WallExplosion { charge_per_hit, .. } => {
                trackers.wall_explosion_charge += charge_per_hit
            }
            Equipment::WallBullets { count, damage } => {
                effects.push(Effect::WallBullets { count, damage })
            }
            _ => {}
        }
    }
    effects
}

/// Primary ball damaged a brick
pub fn on_brick_hit(items: &[Equipment], trackers: &mut Trackers, overlay: Option<Overlay>) -> Vec<Effect> {
    let mut effects = Vec::new();
    for item in items {
        match *item {
            Equipment::HealerLeech { heal } if overlay == Some(Overlay::Healer) => {
                effects.push(Effect::HealBall(heal))
            }
            Equipment::RampingDamage { .. } => {
                trackers.ramping_damage = 0.0;
                trackers.ramping_timer = 0;
            }
            _ => {}
        }
    }
    if trackers.wall_explosion_charge > 0.0 {
        let capacitor = items.iter().find_map(|item| match *item {
            Equipment::WallExplosion { radius_tiles, .. } => Some(radius_tiles),
            _ => None,
        });
        if let Some(radius_tiles) = capacitor {
            effects.push(Effect::Explode {
                radius_tiles,
                damage: trackers.wall_explosion_charge,
                source: BlastSource::WallCapacitor,
            });
            trackers.wall_explosion_charge = 0.0;
        }
    }
    effects
}

pub fn on_brick_destroyed(items: &[Equipment]) -> Vec<Effect> {
    items
        .iter()
        .filter_map(|item| match *item {
            Equipment::Vampire { heal } => Some(Effect::HealBall(heal)),
            _ => None,
        })
        .collect()
}

/// Bonus coins earned by collecting `amount`
pub fn on_coins_collected(items: &[Equipment], trackers: &mut Trackers, amount: u32) -> u64 {
    let Some(per_bonus) = items.iter().find_map(|item| match *item {
        Equipment::CoinBoost { coins_per_bonus } => Some(coins_per_bonus.max(1)),
        _ => None,
    }) else {
        return 0;
    };
    trackers.coins_for_duplication += amount;
    let bonus = trackers.coins_for_duplication / per_bonus;
    trackers.coins_for_duplication %= per_bonus;
    bonus as u64
}

/// One xp orb collected worth `per_orb`
pub fn on_xp_collected(items: &[Equipment], trackers: &mut Trackers, per_orb: f32) -> Vec<Effect> {
    let mut effects = Vec::new();
    for item in items {
        match *item {
            Equipment::XpMagnet { xp_multiplier, .. } => {
                effects.push(Effect::AddPendingXp(per_orb * (xp_multiplier - 1.0)))
            }
            Equipment::XpHeal { orbs_per_heal } => {
                trackers.orbs_for_heal += 1;
                if trackers.orbs_for_heal >= orbs_per_heal {
                    trackers.orbs_for_heal = 0;
                    effects.push(Effect::HealBall(2.0));
                }
            }
            Equipment::LastStand { orbs, bullets, .. } => {
                trackers.orbs_for_last_stand += 1;
                if trackers.orbs_for_last_stand >= orbs {
                    trackers.orbs_for_last_stand = 0;
                    trackers.last_stand_charges += bullets;
                }
            }
            _ => {}
        }
    }
    effects
}

pub fn on_power_up(items: &[Equipment], trackers: &mut Trackers) -> Vec<Effect> {
    let mut effects = Vec::new();
    for item in items {
        match *item {
            Equipment::PowerupInvulnerability { seconds } => {
                let frames = (seconds * SIM_FPS as f32).round() as u32;
                trackers.invulnerability_frames = trackers.invulnerability_frames.max(frames);
            }
            Equipment::MinePower { mines } => effects.push(Effect::PlaceMines(mines)),
            Equipment::TaxReturn {
                coins,
                brick_heal,
                radius_tiles,
            } => {
                effects.push(Effect::AddCoins(coins));
                effects.push(Effect::HealBricksNear {
                    radius_tiles,
                    amount: brick_heal,
                });
            }
            _ => {}
        }
    }
    effects
}

/// Shared hp was lost
pub fn on_hp_lost(items: &[Equipment], trackers: &mut Trackers, amount: f32) -> Vec<Effect> {
    let mut effects = Vec::new();
    let retaliation = items.iter().find_map(|item| match *item {
        Equipment::Retaliation { hp_per_missile, damage } => Some((hp_per_missile, damage)),
        _ => None,
    });
    if let Some((per_missile, damage)) = retaliation {
        if per_missile <= 0.0 {
            return effects;
        }
        trackers.hp_lost_for_retaliation += amount.max(0.0);
        while trackers.hp_lost_for_retaliation >= per_missile {
            trackers.hp_lost_for_retaliation -= per_missile;
            effects.push(Effect::HomingMissile { damage });
        }
    }
    effects
}

/// Shared pool just ran out
pub fn on_dying(items: &[Equipment], trackers: &mut Trackers) -> Vec<Effect> {
    let last_stand = items.iter().find_map(|item| match *item {
        Equipment::LastStand { damage, .. } => Some(damage),
        _ => None,
    });
    match last_stand {
        Some(damage) if trackers.last_stand_charges > 0 => {
            let count = std::mem::take(&mut trackers.last_stand_charges);
            vec![Effect::Volley { count, damage }]
        }
        _ => Vec::new(),
    }
}

/// Per-frame timers while balls are in play
pub fn pulse(items: &[Equipment], trackers: &mut Trackers) -> Vec<Effect> {
    let mut effects = Vec::new();
    for item in items {
        match *item {
            Equipment::RampingDamage { per_pulse } => {
                trackers.ramping_timer += 1;
                if trackers.ramping_timer >= EQUIPMENT_PULSE_FRAMES {
                    trackers.ramping_timer = 0;
                    trackers.ramping_damage += per_pulse;
                }
            }
            Equipment::ZapAura { damage, radius_tiles } => {
                trackers.zap_timer += 1;
                if trackers.zap_timer >= EQUIPMENT_PULSE_FRAMES {
                    trackers.zap_timer = 0;
                    effects.push(Effect::ZapBricks { radius_tiles, damage });
                }
            }
            _ => {}
        }
    }
    effects
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_and_match_items() {
        for id in EquipmentId::ALL {
            assert_eq!(EquipmentId::from_str(id.as_str()), Some(id));
            assert_eq!(Equipment::standard(id).id(), id);
        }
    }

    #[test]
    fn one_instance_per_id_per_ball_type() {
        let mut loadout = Loadout::default();
        assert!(loadout.equip(BallKind::Classic, Equipment::DirectDamage { bonus: 5.0 }));
        assert!(!loadout.equip(BallKind::Classic, Equipment::DirectDamage { bonus: 9.0 }));
        assert!(loadout.equip(BallKind::Split, Equipment::DirectDamage { bonus: 9.0 }));
        assert!(loadout.equip(BallKind::Classic, Equipment::standard(EquipmentId::Phaser)));
        assert!(loadout.equip(BallKind::Classic, Equipment::standard(EquipmentId::Vampire)));
        assert!(!loadout.equip(BallKind::Classic, Equipment::standard(EquipmentId::ZapAura)));
        assert_eq!(loadout.active(BallKind::Classic).len(), 3);
        assert!(loadout.active(BallKind::Homing).is_empty());
        assert_eq!(loadout.unowned().len(), EquipmentId::ALL.len() - 3);

        let removed = loadout.unequip(BallKind::Classic, EquipmentId::Phaser);
        assert_eq!(removed.map(|e| e.id()), Some(EquipmentId::Phaser));
        assert!(loadout.owns(EquipmentId::Phaser));
        assert!(loadout.equip(BallKind::Classic, Equipment::standard(EquipmentId::ZapAura)));
        assert!(loadout.unequip(BallKind::Homing, EquipmentId::Phaser).is_none());
    }

    #[test]
    fn damage_pipeline_stacks_and_clamps() {
        let trackers = Trackers {
            ramping_damage: 3.0,
            ..Trackers::default()
        };
        let items = [
            Equipment::DirectDamage { bonus: 5.0 },
            Equipment::ComboDamage { per_combo: 2.0 },
            Equipment::RampingDamage { per_pulse: 1.0 },
        ];
        assert_eq!(ball_damage(&items, 10.0, 4, &trackers), 26.0);
        let squishy = [Equipment::DamageReduction { amount: -50.0 }];
        assert_eq!(ball_damage(&squishy, 10.0, 0, &trackers), 1.0);
    }

    #[test]
    fn capacitor_charges_on_walls_and_discharges_on_brick() {
        let items = [Equipment::WallExplosion {
            charge_per_hit: 10.0,
            radius_tiles: 1.5,
        }];
        let mut trackers = Trackers::default();
        on_wall_hit(&items, &mut trackers);
        on_wall_hit(&items, &mut trackers);
        let effects = on_brick_hit(&items, &mut trackers, None);
        assert_eq!(
            effects,
            vec![Effect::Explode {
                radius_tiles: 1.5,
                damage: 20.0,
                source: BlastSource::WallCapacitor
            }]
        );
        assert_eq!(trackers.wall_explosion_charge, 0.0);
    }

    #[test]
    fn coin_boost_pays_every_n_coins() {
        let items = [Equipment::CoinBoost { coins_per_bonus: 5 }];
        let mut trackers = Trackers::default();
        assert_eq!(on_coins_collected(&items, &mut trackers, 3), 0);
        assert_eq!(on_coins_collected(&items, &mut trackers, 8), 2);
        assert_eq!(trackers.coins_for_duplication, 1);
    }

    #[test]
    fn retaliation_fires_per_threshold() {
        let items = [Equipment::Retaliation {
            hp_per_missile: 30.0,
            damage: 20.0,
        }];
        let mut trackers = Trackers::default();
        assert!(on_hp_lost(&items, &mut trackers, 20.0).is_empty());
        assert_eq!(on_hp_lost(&items, &mut trackers, 45.0).len(), 2);
        assert_eq!(trackers.hp_lost_for_retaliation, 5.0);
    }

    #[test]
    fn last_stand_volley_spends_all_charges() {
        let items = [Equipment::LastStand {
            orbs: 2,
            bullets: 3,
            damage: 10.0,
        }];
        let mut trackers = Trackers::default();
        for _ in 0..4 {
            on_xp_collected(&items, &mut trackers, 10.0);
        }
        assert_eq!(trackers.last_stand_charges, 6);
        assert_eq!(on_dying(&items, &mut trackers), vec![Effect::Volley { count: 6, damage: 10.0 }]);
        assert!(on_dying(&items, &mut trackers).is_empty());
    }

    #[test]
    fn overflow_grows_the_pool() {
        let mut pool = SharedBallStats::new(100.0, 1);
        let mut trackers = Trackers::default();
        let items = [Equipment::standard(EquipmentId::Overflow), Equipment::Phaser { charges: 2 }];
        on_turn_start(&items, &mut trackers, &mut pool);
        assert_eq!(pool.max_hp, 150.0);
        assert_eq!(pool.uses, 2);
        assert_eq!(trackers.overflow_heal_charges, 5);
        assert_eq!(trackers.phaser_charges, 2);
    }
}
