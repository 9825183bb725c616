//! Combo counter and end-of-turn combo rewards

use rand::Rng;
use rand::seq::SliceRandom;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::board::Board;
use super::brick::{Brick, Overlay};
use super::catalog::BrickKind;
use super::grid::BrickGrid;
use crate::tuning::{ComboRewards, UnlockLevels};

/// Per-turn streak of brick hits without a primary wall bounce
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Combo {
    pub count: u32,
    /// Best streak this turn, drives the rewards
    pub max_this_turn: u32,
}

impl Combo {
    /// Count a confirmed brick hit; returns the new value
    pub fn add(&mut self) -> u32 {
        self.count += 1;
        self.max_this_turn = self.max_this_turn.max(self.count);
        self.count
    }

    /// Drop the streak; returns the lost value if there was one
    pub fn break_streak(&mut self) -> Option<u32> {
        if self.count == 0 {
            return None;
        }
        Some(std::mem::take(&mut self.count))
    }

    pub fn end_turn(&mut self) {
        self.count = 0;
        self.max_this_turn = 0;
    }
}

/// What a finished turn's best combo earns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComboReward {
    pub mines: u32,
    pub stripes: u32,
    pub giants: u32,
}

impl ComboReward {
    pub fn for_combo(max_combo: u32, player_level: u32, unlocks: &UnlockLevels, table: &ComboRewards) -> Self {
        let per = |n: u32| n.max(1);
        let mut reward = ComboReward::default();
        if player_level >= unlocks.combo_mines {
            reward.mines = max_combo.min(table.mine_combo_cap) / per(table.combo_per_mine);
        }
        if player_level >= unlocks.stripe_bonus {
            reward.stripes = max_combo.min(table.stripe_combo_cap) / per(table.combo_per_stripe);
        }
        if player_level >= unlocks.giant_bonus {
            reward.giants = max_combo / per(table.combo_per_giant);
        }
        reward
    }

    /// Place mines on random plain bricks and stripe bricks in random empty
    /// cells. Giant balls are credited by the caller.
    pub fn place(&self, grid: &mut BrickGrid, board: &Board, rng: &mut Pcg32, stripe_hp: f32) {
        place_mines(grid, rng, self.mines);

        let mut empty = grid.empty_cells();
        empty.shuffle(rng);
        for &(c, r) in empty.iter().take(self.stripes as usize) {
            let kind = if rng.random_bool(0.5) {
                BrickKind::HorizontalStripe
            } else {
                BrickKind::VerticalStripe
            };
            if let Err(e) = grid.place(Brick::new(kind, stripe_hp), c, r, board) {
                log::warn!("Skipping stripe reward at ({}, {}): {}", c, r, e);
            }
        }
    }
}

/// Put a mine overlay on up to `count` random normal bricks without an
/// overlay. Returns how many were placed.
pub fn place_mines(grid: &mut BrickGrid, rng: &mut Pcg32, count: u32) -> u32 {
    let mut eligible: Vec<_> = grid
        .scan_ids()
        .into_iter()
        .filter(|id| {
            grid.get(*id)
                .is_some_and(|b| b.kind == BrickKind::Normal && b.overlay.is_none())
        })
        .collect();
    eligible.shuffle(rng);
    let mut placed = 0;
    for id in eligible.into_iter().take(count as usize) {
        if let Some(brick) = grid.get_mut(id) {
            brick.overlay = Some(Overlay::Mine);
            placed += 1;
        }
    }
    placed
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn streak_tracks_max_and_breaks_to_zero() {
        let mut combo = Combo::default();
        for _ in 0..7 {
            combo.add();
        }
        assert_eq!(combo.break_streak(), Some(7));
        assert_eq!(combo.count, 0);
        assert_eq!(combo.break_streak(), None);
        combo.add();
        assert_eq!(combo.max_this_turn, 7);
    }

    #[test]
    fn rewards_are_gated_and_capped() {
        let unlocks = UnlockLevels::default();
        let table = ComboRewards::default();
        assert_eq!(
            ComboReward::for_combo(100, 20, &unlocks, &table),
            ComboReward {
                mines: 5,
                stripes: 4,
                giants: 2
            }
        );
        assert_eq!(
            ComboReward::for_combo(10, 4, &unlocks, &table),
            ComboReward {
                mines: 3,
                stripes: 0,
                giants: 0
            }
        );
        assert_eq!(ComboReward::for_combo(100, 3, &unlocks, &table), ComboReward::default());
    }

    #[test]
    fn mines_only_land_on_plain_bricks() {
        let board = Board::new(10.0);
        let mut grid = BrickGrid::new(13, 13);
        let plain = grid.place(Brick::new(BrickKind::Normal, 10.0), 0, 0, &board).expect("fits");
        grid.place(Brick::new(BrickKind::Goal, 10.0), 1, 0, &board).expect("fits");
        grid.place(
            Brick::new(BrickKind::Normal, 10.0).with_overlay(Some(Overlay::Healer)),
            2,
            0,
            &board,
        )
        .expect("fits");
        let mut rng = Pcg32::seed_from_u64(3);
        assert_eq!(place_mines(&mut grid, &mut rng, 5), 1);
        assert_eq!(grid.get(plain).and_then(|b| b.overlay), Some(Overlay::Mine));
    }

    #[test]
    fn stripes_fill_empty_cells() {
        let board = Board::new(10.0);
        let mut grid = BrickGrid::new(13, 13);
        let mut rng = Pcg32::seed_from_u64(9);
        let reward = ComboReward {
            mines: 0,
            stripes: 3,
            giants: 0,
        };
        reward.place(&mut grid, &board, &mut rng, 10.0);
        assert_eq!(grid.len(), 3);
        assert!(grid.iter().all(|b| matches!(
            b.kind,
            BrickKind::HorizontalStripe | BrickKind::VerticalStripe
        )));
    }
}
