//! Brick arena + per-cell handle grid
//!
//! Bricks live in an arena addressed by `BrickId`; every cell a brick covers
//! stores the same id, so mutation through any cell reaches the one brick.
//! Ids are never reused within a level, which makes a stale id a harmless
//! miss instead of an alias.

use serde::{Deserialize, Serialize};

use super::board::Board;
use super::brick::Brick;
use crate::error::SimError;

/// Stable handle to a brick in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BrickId(pub u32);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrickGrid {
    pub cols: usize,
    pub rows: usize,
    /// Row-major cell handles
    cells: Vec<Option<BrickId>>,
    /// Arena slot per id; `None` once removed
    slots: Vec<Option<Brick>>,
}

impl BrickGrid {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            cells: vec![None; cols * rows],
            slots: Vec::new(),
        }
    }

    #[inline]
    fn index(&self, col: usize, row: usize) -> usize {
        row * self.cols + col
    }

    /// Whether a span fits the grid and every covered cell is free
    pub fn check_span(&self, col: i32, row: i32, width: usize, height: usize) -> Result<(), SimError> {
        let fits = col >= 0
            && row >= 0
            && col as usize + width <= self.cols
            && row as usize + height <= self.rows;
        if !fits {
            return Err(SimError::OutOfBounds {
                col,
                row,
                width,
                height,
            });
        }
        let (col, row) = (col as usize, row as usize);
        for r in row..row + height {
            for c in col..col + width {
                if self.cells[self.index(c, r)].is_some() {
                    return Err(SimError::CellOccupied { col: c, row: r });
                }
            }
        }
        Ok(())
    }

    /// Insert a brick with its top-left cell at (col, row)
    pub fn place(&mut self, mut brick: Brick, col: usize, row: usize, board: &Board) -> Result<BrickId, SimError> {
        self.check_span(col as i32, row as i32, brick.width, brick.height)?;
        let id = BrickId(self.slots.len() as u32);
        brick.id = id;
        brick.col = col;
        brick.row = row;
        brick.center = board.span_center(col, row, brick.width, brick.height);
        brick.half_size = glam::Vec2::new(brick.width as f32, brick.height as f32) * board.unit / 2.0;
        for (c, r) in brick.cells().collect::<Vec<_>>() {
            let i = self.index(c, r);
            self.cells[i] = Some(id);
        }
        self.slots.push(Some(brick));
        Ok(id)
    }

    /// Take a brick out of the arena and clear every cell referencing it
    pub fn remove(&mut self, id: BrickId) -> Option<Brick> {
        let brick = self.slots.get_mut(id.0 as usize)?.take()?;
        for cell in self.cells.iter_mut().filter(|cell| **cell == Some(id)) {
            *cell = None;
        }
        Some(brick)
    }

    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(|cell| *cell = None);
        self.slots.clear();
    }

    #[inline]
    pub fn id_at(&self, col: usize, row: usize) -> Option<BrickId> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        self.cells[self.index(col, row)]
    }

    pub fn at(&self, col: usize, row: usize) -> Option<&Brick> {
        self.id_at(col, row).and_then(|id| self.get(id))
    }

    pub fn get(&self, id: BrickId) -> Option<&Brick> {
        self.slots.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: BrickId) -> Option<&mut Brick> {
        self.slots.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    /// Live bricks in id order
    pub fn iter(&self) -> impl Iterator<Item = &Brick> {
        self.slots.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Brick> {
        self.slots.iter_mut().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Distinct brick ids in column-major cell order
    pub fn scan_ids(&self) -> Vec<BrickId> {
        let mut ids = Vec::new();
        for c in 0..self.cols {
            for r in 0..self.rows {
                if let Some(id) = self.cells[self.index(c, r)] {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
            }
        }
        ids
    }

    pub fn goal_count(&self) -> usize {
        self.iter().filter(|b| b.is_goal() && !b.is_broken()).count()
    }

    /// Unoccupied cells, column-major
    pub fn empty_cells(&self) -> Vec<(usize, usize)> {
        let mut cells = Vec::new();
        for c in 0..self.cols {
            for r in 0..self.rows {
                if self.cells[self.index(c, r)].is_none() {
                    cells.push((c, r));
                }
            }
        }
        cells
    }

    /// Ids of bricks touching the given brick's span edges (no diagonals)
    pub fn neighbours(&self, id: BrickId) -> Vec<BrickId> {
        let Some(brick) = self.get(id) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for (c, r) in self.adjacent_cells(brick) {
            if let Some(other) = self.id_at(c, r) {
                if other != id && !out.contains(&other) {
                    out.push(other);
                }
            }
        }
        out
    }

    /// In-grid cells orthogonally adjacent to a brick's span
    pub fn adjacent_cells(&self, brick: &Brick) -> Vec<(usize, usize)> {
        let (c0, r0) = (brick.col as i32, brick.row as i32);
        let (w, h) = (brick.width as i32, brick.height as i32);
        let mut cells = Vec::new();
        let mut push = |c: i32, r: i32| {
            if c >= 0 && r >= 0 && (c as usize) < self.cols && (r as usize) < self.rows {
                cells.push((c as usize, r as usize));
            }
        };
        for c in c0..c0 + w {
            push(c, r0 - 1);
            push(c, r0 + h);
        }
        for r in r0..r0 + h {
            push(c0 - 1, r);
            push(c0 + w, r);
        }
        cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::catalog::BrickKind;

    fn grid() -> (BrickGrid, Board) {
        (BrickGrid::new(13, 13), Board::new(10.0))
    }

    #[test]
    fn merged_brick_is_shared_by_all_cells() {
        let (mut grid, board) = grid();
        let id = grid
            .place(Brick::new(BrickKind::Normal, 30.0).with_span(3, 1), 2, 4, &board)
            .expect("fits");
        assert_eq!(grid.id_at(2, 4), Some(id));
        assert_eq!(grid.id_at(4, 4), Some(id));
        if let Some(brick) = grid.get_mut(id) {
            brick.health = 7.0;
        }
        assert_eq!(grid.at(3, 4).map(|b| b.health), Some(7.0));
        assert_eq!(grid.scan_ids(), vec![id]);
    }

    #[test]
    fn remove_clears_every_cell_and_ids_are_not_reused() {
        let (mut grid, board) = grid();
        let a = grid
            .place(Brick::new(BrickKind::Normal, 10.0).with_span(2, 2), 0, 0, &board)
            .expect("fits");
        assert!(grid.remove(a).is_some());
        assert!(grid.id_at(1, 1).is_none());
        assert!(grid.remove(a).is_none());
        let b = grid.place(Brick::new(BrickKind::Goal, 10.0), 0, 0, &board).expect("free");
        assert_ne!(a, b);
        assert!(grid.get(a).is_none());
    }

    #[test]
    fn placement_is_validated() {
        let (mut grid, board) = grid();
        grid.place(Brick::new(BrickKind::Normal, 10.0), 5, 5, &board).expect("fits");
        assert!(matches!(
            grid.place(Brick::new(BrickKind::Normal, 10.0).with_span(2, 1), 4, 5, &board),
            Err(SimError::CellOccupied { col: 5, row: 5 })
        ));
        assert!(matches!(
            grid.place(Brick::new(BrickKind::Normal, 10.0).with_span(3, 1), 11, 0, &board),
            Err(SimError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn neighbours_are_orthogonal() {
        let (mut grid, board) = grid();
        let center = grid.place(Brick::new(BrickKind::Normal, 10.0), 5, 5, &board).expect("fits");
        let right = grid.place(Brick::new(BrickKind::Normal, 10.0), 6, 5, &board).expect("fits");
        grid.place(Brick::new(BrickKind::Normal, 10.0), 6, 6, &board).expect("fits");
        assert_eq!(grid.neighbours(center), vec![right]);
    }
}
