//! Level layout import/export
//!
//! A layout is a `;`-joined list of brick records:
//!
//! ```text
//! col,row,type,health,maxHealth,coin,maxCoin,gem,maxGem,overlay,width,height
//! ```
//!
//! Coordinates are centred on the grid (-6..=6). `overlay` is `null` when the
//! brick carries none. Import builds a fresh grid and only hands it back once
//! every record is valid, so a rejected layout never touches the running
//! level.

use std::str::FromStr;

use super::board::Board;
use super::brick::{Brick, Overlay};
use super::catalog::BrickKind;
use super::grid::BrickGrid;
use crate::error::SimError;

const FIELD_COUNT: usize = 12;
const NO_OVERLAY: &str = "null";
/// Hp of the goal added to layouts that have none
pub const FALLBACK_GOAL_HP: f32 = 10.0;

/// One parsed brick record, still in centred coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutRecord {
    pub col: i32,
    pub row: i32,
    pub kind: BrickKind,
    pub health: f32,
    pub max_health: f32,
    pub coins: u32,
    pub max_coins: u32,
    pub gems: u32,
    pub max_gems: u32,
    pub overlay: Option<Overlay>,
    pub width: usize,
    pub height: usize,
}

impl LayoutRecord {
    fn to_brick(&self) -> Brick {
        let mut brick = Brick::new(self.kind, self.max_health)
            .with_span(self.width, self.height)
            .with_overlay(self.overlay);
        brick.health = self.health;
        brick.coins = self.coins;
        brick.max_coins = self.max_coins;
        brick.gems = self.gems;
        brick.max_gems = self.max_gems;
        brick
    }

    fn from_brick(brick: &Brick) -> Self {
        let (col, row) = Board::to_centered(brick.col, brick.row);
        Self {
            col,
            row,
            kind: brick.kind,
            health: brick.health,
            max_health: brick.max_health,
            coins: brick.coins,
            max_coins: brick.max_coins,
            gems: brick.gems,
            max_gems: brick.max_gems,
            overlay: brick.overlay,
            width: brick.width,
            height: brick.height,
        }
    }

    fn encode(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{},{},{}",
            self.col,
            self.row,
            self.kind.as_str(),
            self.health,
            self.max_health,
            self.coins,
            self.max_coins,
            self.gems,
            self.max_gems,
            self.overlay.map_or(NO_OVERLAY, |o| o.as_str()),
            self.width,
            self.height,
        )
    }
}

fn field<T: FromStr>(index: usize, name: &str, raw: &str) -> Result<T, SimError> {
    raw.trim().parse().map_err(|_| SimError::MalformedRecord {
        index,
        reason: format!("{} {:?} is not a valid number", name, raw),
    })
}

/// Parse one record; `index` is only used for error reporting
pub fn parse_record(index: usize, record: &str) -> Result<LayoutRecord, SimError> {
    let fields: Vec<&str> = record.split(',').collect();
    if fields.len() != FIELD_COUNT {
        return Err(SimError::MalformedRecord {
            index,
            reason: format!("expected {} fields, got {}", FIELD_COUNT, fields.len()),
        });
    }

    let kind = BrickKind::from_str(fields[2].trim()).ok_or_else(|| SimError::MalformedRecord {
        index,
        reason: format!("unknown brick type {:?}", fields[2]),
    })?;
    let overlay = match fields[9].trim() {
        "" | NO_OVERLAY => None,
        name => Some(Overlay::from_str(name).ok_or_else(|| SimError::MalformedRecord {
            index,
            reason: format!("unknown overlay {:?}", name),
        })?),
    };

    let health: f32 = field(index, "health", fields[3])?;
    let max_health: f32 = field(index, "maxHealth", fields[4])?;
    if !health.is_finite() || !max_health.is_finite() || max_health <= 0.0 || health <= 0.0 {
        return Err(SimError::MalformedRecord {
            index,
            reason: format!("health {}/{} out of range", health, max_health),
        });
    }

    let width: usize = field(index, "width", fields[10])?;
    let height: usize = field(index, "height", fields[11])?;
    if width == 0 || height == 0 {
        return Err(SimError::MalformedRecord {
            index,
            reason: format!("empty span {}x{}", width, height),
        });
    }

    let mut parsed = LayoutRecord {
        col: field(index, "col", fields[0])?,
        row: field(index, "row", fields[1])?,
        kind,
        health,
        max_health,
        coins: field(index, "coin", fields[5])?,
        max_coins: field(index, "maxCoin", fields[6])?,
        gems: field(index, "gem", fields[7])?,
        max_gems: field(index, "maxGem", fields[8])?,
        overlay,
        width,
        height,
    };

    // Out-of-range counters are recoverable; clamp and carry on
    if parsed.health > parsed.max_health {
        log::warn!("Layout record #{}: health {} above max, clamping", index, parsed.health);
        parsed.health = parsed.max_health;
    }
    if parsed.coins > parsed.max_coins {
        log::warn!("Layout record #{}: coins {} above max, clamping", index, parsed.coins);
        parsed.coins = parsed.max_coins;
    }
    if parsed.gems > parsed.max_gems {
        log::warn!("Layout record #{}: gems {} above max, clamping", index, parsed.gems);
        parsed.gems = parsed.max_gems;
    }
    if parsed.max_coins > 0 && !kind.can_carry_coin() {
        log::warn!("Layout record #{}: {} bricks carry no coins", index, kind.as_str());
        (parsed.coins, parsed.max_coins) = (0, 0);
    }
    if parsed.max_gems > 0 && !kind.can_carry_gem() {
        log::warn!("Layout record #{}: {} bricks carry no gems", index, kind.as_str());
        (parsed.gems, parsed.max_gems) = (0, 0);
    }
    Ok(parsed)
}

/// Parse a whole layout string. Empty records (trailing `;`) are skipped.
pub fn parse(layout: &str) -> Result<Vec<LayoutRecord>, SimError> {
    layout
        .split(';')
        .map(str::trim)
        .filter(|record| !record.is_empty())
        .enumerate()
        .map(|(index, record)| parse_record(index, record))
        .collect()
}

/// Build a grid from a layout string. A layout without a goal brick gets a
/// 10 hp goal in the first free cell (row-major).
pub fn import(layout: &str, board: &Board) -> Result<BrickGrid, SimError> {
    let records = parse(layout)?;
    let mut grid = BrickGrid::new(board.cols, board.rows);
    for record in &records {
        let (col, row) = Board::from_centered(record.col, record.row);
        grid.check_span(col, row, record.width, record.height)?;
        grid.place(record.to_brick(), col as usize, row as usize, board)?;
    }

    if grid.goal_count() == 0 {
        let free = (0..grid.rows)
            .flat_map(|r| (0..grid.cols).map(move |c| (c, r)))
            .find(|&(c, r)| grid.id_at(c, r).is_none());
        match free {
            Some((c, r)) => {
                log::info!("Layout has no goal brick, adding one at ({}, {})", c, r);
                grid.place(Brick::new(BrickKind::Goal, FALLBACK_GOAL_HP), c, r, board)?;
            }
            None => log::warn!("Layout has no goal brick and no free cell for one"),
        }
    }

    log::info!("Imported layout: {} bricks", grid.len());
    Ok(grid)
}

/// Serialise every brick once, in row-major order of its top-left cell
pub fn export(grid: &BrickGrid) -> String {
    let mut seen = Vec::new();
    let mut records = Vec::new();
    for r in 0..grid.rows {
        for c in 0..grid.cols {
            if let Some(brick) = grid.at(c, r) {
                if !seen.contains(&brick.id) {
                    seen.push(brick.id);
                    records.push(LayoutRecord::from_brick(brick).encode());
                }
            }
        }
    }
    records.join(";")
}
