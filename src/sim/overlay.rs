//! End-of-turn healer/builder overlay actions
//!
//! Actions are collected once when the turn ends and then executed one at a
//! time with a short gap, so a builder can place a brick a later healer
//! sees.

use std::collections::VecDeque;

use rand::seq::IndexedRandom;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::board::Board;
use super::brick::{Brick, Overlay};
use super::catalog::BrickKind;
use super::grid::{BrickGrid, BrickId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlayAction {
    Heal(BrickId),
    Build(BrickId),
}

/// Pending actions in grid scan order
pub fn collect_actions(grid: &BrickGrid) -> VecDeque<OverlayAction> {
    grid.scan_ids()
        .into_iter()
        .filter_map(|id| match grid.get(id)?.overlay? {
            Overlay::Healer => Some(OverlayAction::Heal(id)),
            Overlay::Builder => Some(OverlayAction::Build(id)),
            Overlay::Mine => None,
        })
        .collect()
}

/// Outcome of one executed action
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayOutcome {
    /// (brick, hp restored) per healed neighbour
    Healed(Vec<(BrickId, f32)>),
    Built(BrickId),
    /// Source brick is gone or nothing to do
    Skipped,
}

/// Heal every healable neighbour of a healer brick
pub fn execute_heal(grid: &mut BrickGrid, healer: BrickId, amount: f32) -> OverlayOutcome {
    if grid.get(healer).is_none() {
        return OverlayOutcome::Skipped;
    }
    let mut healed = Vec::new();
    for id in grid.neighbours(healer) {
        if let Some(brick) = grid.get_mut(id) {
            if !brick.kind.can_receive_healing() {
                continue;
            }
            let restored = brick.heal(amount);
            if restored > 0.0 {
                healed.push((id, restored));
            }
        }
    }
    if healed.is_empty() {
        OverlayOutcome::Skipped
    } else {
        OverlayOutcome::Healed(healed)
    }
}

/// Place a normal brick in a random empty cell next to a builder brick
pub fn execute_build(
    grid: &mut BrickGrid,
    board: &Board,
    builder: BrickId,
    hp: f32,
    rng: &mut Pcg32,
) -> OverlayOutcome {
    let Some(brick) = grid.get(builder) else {
        return OverlayOutcome::Skipped;
    };
    let free: Vec<_> = grid
        .adjacent_cells(brick)
        .into_iter()
        .filter(|&(c, r)| grid.id_at(c, r).is_none())
        .collect();
    let Some(&(c, r)) = free.choose(rng) else {
        return OverlayOutcome::Skipped;
    };
    match grid.place(Brick::new(BrickKind::Normal, hp), c, r, board) {
        Ok(id) => OverlayOutcome::Built(id),
        Err(e) => {
            log::warn!("Builder {:?} could not place a brick: {}", builder, e);
            OverlayOutcome::Skipped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn board() -> Board {
        Board::new(10.0)
    }

    #[test]
    fn healer_restores_neighbours_up_to_max() {
        let board = board();
        let mut grid = BrickGrid::new(13, 13);
        let healer = grid
            .place(
                Brick::new(BrickKind::Normal, 10.0).with_overlay(Some(Overlay::Healer)),
                5,
                5,
                &board,
            )
            .expect("fits");
        let hurt = grid.place(Brick::new(BrickKind::Normal, 30.0), 5, 4, &board).expect("fits");
        let cage = grid.place(Brick::new(BrickKind::BallCage, 30.0), 4, 5, &board).expect("fits");
        if let Some(b) = grid.get_mut(hurt) {
            b.health = 25.0;
        }
        if let Some(b) = grid.get_mut(cage) {
            b.health = 5.0;
        }
        assert_eq!(collect_actions(&grid), VecDeque::from([OverlayAction::Heal(healer)]));
        assert_eq!(execute_heal(&mut grid, healer, 10.0), OverlayOutcome::Healed(vec![(hurt, 5.0)]));
        assert_eq!(grid.get(cage).map(|b| b.health), Some(5.0));
    }

    #[test]
    fn builder_fills_an_adjacent_cell() {
        let board = board();
        let mut grid = BrickGrid::new(13, 13);
        let builder = grid
            .place(
                Brick::new(BrickKind::Normal, 10.0).with_overlay(Some(Overlay::Builder)),
                0,
                0,
                &board,
            )
            .expect("fits");
        let mut rng = Pcg32::seed_from_u64(1);
        let OverlayOutcome::Built(id) = execute_build(&mut grid, &board, builder, 10.0, &mut rng) else {
            panic!("expected a build");
        };
        let built = grid.get(id).expect("placed");
        assert!(matches!((built.col, built.row), (1, 0) | (0, 1)));
        assert_eq!(built.health, 10.0);
    }

    #[test]
    fn removed_source_is_skipped() {
        let board = board();
        let mut grid = BrickGrid::new(13, 13);
        let builder = grid.place(Brick::new(BrickKind::Normal, 10.0), 0, 0, &board).expect("fits");
        grid.remove(builder);
        let mut rng = Pcg32::seed_from_u64(1);
        assert_eq!(execute_build(&mut grid, &board, builder, 10.0, &mut rng), OverlayOutcome::Skipped);
        assert_eq!(execute_heal(&mut grid, builder, 10.0), OverlayOutcome::Skipped);
    }
}
