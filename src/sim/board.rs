//! Board geometry: grid <-> pixel mapping
//!
//! The board is the 13x13 brick grid plus a two-cell empty border on every
//! side. Pixel space has its origin at the board's top-left corner; the walls
//! sit half a border inside the board edge.

use std::ops::RangeInclusive;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Fixed board geometry (no occupancy, see `BrickGrid`)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Board {
    /// Pixel position of the board's top-left corner
    pub origin: Vec2,
    /// Size of one grid cell in pixels
    pub unit: f32,
    pub cols: usize,
    pub rows: usize,
}

/// Cell span a circle's bounding box overlaps
#[derive(Debug, Clone)]
pub struct CellRange {
    pub cols: RangeInclusive<usize>,
    pub rows: RangeInclusive<usize>,
}

impl Board {
    pub fn new(unit: f32) -> Self {
        Self {
            origin: Vec2::ZERO,
            unit,
            cols: BRICK_COLS,
            rows: BRICK_ROWS,
        }
    }

    #[inline]
    pub fn width(&self) -> f32 {
        TOTAL_COLS as f32 * self.unit
    }

    #[inline]
    pub fn height(&self) -> f32 {
        TOTAL_ROWS as f32 * self.unit
    }

    #[inline]
    pub fn border(&self) -> f32 {
        self.unit / 2.0
    }

    /// Pixel position of grid cell (0, 0)
    #[inline]
    pub fn grid_origin(&self) -> Vec2 {
        self.origin + Vec2::splat(SAFE_ZONE_GRID as f32 * self.unit)
    }

    /// Top-left pixel of a cell
    #[inline]
    pub fn cell_origin(&self, col: usize, row: usize) -> Vec2 {
        self.grid_origin() + Vec2::new(col as f32, row as f32) * self.unit
    }

    /// Centre of a `width x height` span whose top-left cell is (col, row)
    #[inline]
    pub fn span_center(&self, col: usize, row: usize, width: usize, height: usize) -> Vec2 {
        self.cell_origin(col, row) + Vec2::new(width as f32, height as f32) * self.unit / 2.0
    }

    /// Grid index nearest to a pixel, measuring from the grid origin in
    /// whole units (rounds half up)
    pub fn nearest_index(&self, pos: Vec2) -> Option<(usize, usize)> {
        let local = (pos - self.grid_origin()) / self.unit;
        let (c, r) = ((local.x + 0.5).floor(), (local.y + 0.5).floor());
        if c < 0.0 || r < 0.0 || c >= self.cols as f32 || r >= self.rows as f32 {
            return None;
        }
        Some((c as usize, r as usize))
    }

    /// Cells overlapped by a circle's bounding box, clamped to the grid.
    /// The upper bound rounds up so a circle touching a cell edge still
    /// reaches the neighbouring cell.
    pub fn cells_overlapping(&self, center: Vec2, radius: f32) -> Option<CellRange> {
        let g = self.grid_origin();
        let min_c = ((center.x - radius - g.x) / self.unit).floor() as i32;
        let max_c = ((center.x + radius - g.x) / self.unit).ceil() as i32;
        let min_r = ((center.y - radius - g.y) / self.unit).floor() as i32;
        let max_r = ((center.y + radius - g.y) / self.unit).ceil() as i32;
        let (min_c, max_c) = (min_c.max(0), max_c.min(self.cols as i32 - 1));
        let (min_r, max_r) = (min_r.max(0), max_r.min(self.rows as i32 - 1));
        if min_c > max_c || min_r > max_r {
            return None;
        }
        Some(CellRange {
            cols: min_c as usize..=max_c as usize,
            rows: min_r as usize..=max_r as usize,
        })
    }

    /// Inner wall rectangle (min corner, max corner)
    pub fn walls(&self) -> (Vec2, Vec2) {
        let inset = Vec2::splat(self.border() / 2.0);
        (
            self.origin + inset,
            self.origin + Vec2::new(self.width(), self.height()) - inset,
        )
    }

    /// Default launch position: bottom wall, horizontally centred
    pub fn launch_point(&self, radius: f32) -> Vec2 {
        let (_, max) = self.walls();
        Vec2::new(self.origin.x + self.width() / 2.0, max.y - radius)
    }

    /// Project a press position onto the nearest wall, just inside it
    pub fn snap_to_nearest_wall(&self, press: Vec2, radius: f32) -> Vec2 {
        let (min, max) = self.walls();
        let right = self.origin.x + self.width();
        let bottom = self.origin.y + self.height();
        let d_top = (press.y - self.origin.y).abs();
        let d_bottom = (press.y - bottom).abs();
        let d_left = (press.x - self.origin.x).abs();
        let d_right = (press.x - right).abs();
        let nearest = d_top.min(d_bottom).min(d_left).min(d_right);
        if nearest == d_top {
            Vec2::new(press.x, min.y + radius)
        } else if nearest == d_bottom {
            Vec2::new(press.x, max.y - radius)
        } else if nearest == d_left {
            Vec2::new(min.x + radius, press.y)
        } else {
            Vec2::new(max.x - radius, press.y)
        }
    }

    /// Whether a pixel is inside the board rectangle
    pub fn contains(&self, pos: Vec2) -> bool {
        pos.x > self.origin.x
            && pos.y > self.origin.y
            && pos.x < self.origin.x + self.width()
            && pos.y < self.origin.y + self.height()
    }

    /// Centred layout coordinates (-6..=6) to grid indices
    #[inline]
    pub fn from_centered(c: i32, r: i32) -> (i32, i32) {
        (c + GRID_CENTER_OFFSET, r + GRID_CENTER_OFFSET)
    }

    /// Grid indices to centred layout coordinates
    #[inline]
    pub fn to_centered(col: usize, row: usize) -> (i32, i32) {
        (col as i32 - GRID_CENTER_OFFSET, row as i32 - GRID_CENTER_OFFSET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_pixel_mapping_is_affine() {
        let board = Board::new(10.0);
        assert_eq!(board.grid_origin(), Vec2::new(20.0, 20.0));
        assert_eq!(board.cell_origin(3, 4), Vec2::new(50.0, 60.0));
        assert_eq!(board.nearest_index(Vec2::new(54.0, 64.0)), Some((3, 4)));
        assert_eq!(board.nearest_index(Vec2::new(55.0, 65.0)), Some((4, 5)));
        assert_eq!(board.nearest_index(Vec2::new(5.0, 65.0)), None);
        assert_eq!(board.span_center(0, 0, 3, 1), Vec2::new(35.0, 25.0));
    }

    #[test]
    fn overlap_range_is_clamped() {
        let board = Board::new(10.0);
        let range = board.cells_overlapping(Vec2::new(21.0, 21.0), 3.0).expect("in grid");
        assert_eq!(range.cols, 0..=1);
        assert_eq!(range.rows, 0..=1);
        assert!(board.cells_overlapping(Vec2::new(2.0, 2.0), 1.0).is_none());
        let far = board.cells_overlapping(Vec2::new(150.0, 80.0), 50.0).expect("partly in grid");
        assert_eq!(far.cols, 8..=12);
    }

    #[test]
    fn press_snaps_to_nearest_wall() {
        let board = Board::new(10.0);
        let (min, max) = board.walls();
        let p = board.snap_to_nearest_wall(Vec2::new(80.0, 168.0), 3.0);
        assert_eq!(p, Vec2::new(80.0, max.y - 3.0));
        let p = board.snap_to_nearest_wall(Vec2::new(1.0, 80.0), 3.0);
        assert_eq!(p, Vec2::new(min.x + 3.0, 80.0));
    }

    #[test]
    fn centered_coordinates_round_trip() {
        assert_eq!(Board::from_centered(-6, 6), (0, 12));
        assert_eq!(Board::to_centered(0, 12), (-6, 6));
    }
}
