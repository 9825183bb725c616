//! Per-type brick capability tables

use serde::{Deserialize, Serialize};

/// Hp bands that make up one colour tier
pub const LAYERS_PER_TIER: u32 = 5;

/// Brick type; orthogonal to the optional overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BrickKind {
    Normal,
    /// Destroying every goal brick clears the level
    Goal,
    ExtraBall,
    Explosive,
    HorizontalStripe,
    VerticalStripe,
    BallCage,
    Equipment,
    /// Only takes damage from balls touching it
    Wool,
}

impl BrickKind {
    pub const ALL: [BrickKind; 9] = [
        BrickKind::Normal,
        BrickKind::Goal,
        BrickKind::ExtraBall,
        BrickKind::Explosive,
        BrickKind::HorizontalStripe,
        BrickKind::VerticalStripe,
        BrickKind::BallCage,
        BrickKind::Equipment,
        BrickKind::Wool,
    ];

    /// Layout-format name
    pub fn as_str(&self) -> &'static str {
        match self {
            BrickKind::Normal => "normal",
            BrickKind::Goal => "goal",
            BrickKind::ExtraBall => "extraBall",
            BrickKind::Explosive => "explosive",
            BrickKind::HorizontalStripe => "horizontalStripe",
            BrickKind::VerticalStripe => "verticalStripe",
            BrickKind::BallCage => "ballCage",
            BrickKind::Equipment => "equipment",
            BrickKind::Wool => "wool",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    pub fn can_receive_healing(&self) -> bool {
        !matches!(self, BrickKind::BallCage | BrickKind::Equipment)
    }

    pub fn can_carry_coin(&self) -> bool {
        matches!(self, BrickKind::Normal)
    }

    pub fn can_carry_gem(&self) -> bool {
        matches!(self, BrickKind::Normal)
    }

    /// Hp is drawn as stacked layers
    pub fn is_layered(&self) -> bool {
        matches!(
            self,
            BrickKind::Normal | BrickKind::ExtraBall | BrickKind::Goal | BrickKind::Wool
        )
    }

    /// Hp represented by one visual layer
    pub fn hp_per_layer(&self, merged: bool) -> f32 {
        match self {
            BrickKind::Normal | BrickKind::ExtraBall if merged => 30.0,
            _ => 10.0,
        }
    }
}

/// Visual layer count for a brick at `health`
pub fn total_layers(kind: BrickKind, health: f32, merged: bool) -> u32 {
    let hp = health.max(0.0);
    if !kind.is_layered() {
        return (((hp - 1.0) / 10.0).floor() + 1.0).max(1.0) as u32;
    }
    let per_layer = kind.hp_per_layer(merged);
    let per_tier = LAYERS_PER_TIER as f32 * per_layer;
    let tier = ((hp - 1.0) / per_tier).floor().max(0.0);
    let in_tier = (hp - 1.0).rem_euclid(per_tier) + 1.0;
    let layers = (in_tier / per_layer).ceil().max(1.0);
    tier as u32 * LAYERS_PER_TIER + layers as u32
}
