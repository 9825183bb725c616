//! Per-level stat counters

use serde::{Deserialize, Serialize};

/// Counters exposed read-only at level complete / game over
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelStats {
    pub balls_used: u32,
    pub total_damage: f32,
    pub max_damage_in_turn: f32,
    pub damage_this_turn: f32,
    pub coins_collected: u64,
    pub gems_collected: u64,
    pub xp_collected: f32,
}

impl LevelStats {
    pub fn record_damage(&mut self, amount: f32) {
        self.total_damage += amount;
        self.damage_this_turn += amount;
    }

    /// Fold the finished turn into the max
    pub fn close_turn(&mut self) {
        self.max_damage_in_turn = self.max_damage_in_turn.max(self.damage_this_turn);
        self.damage_this_turn = 0.0;
    }
}
