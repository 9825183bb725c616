//! Run settings
//!
//! Knobs chosen outside the simulation (level setup screen, debug panel,
//! persisted progression) and handed to the core when a level starts.

use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_GRID_UNIT;
use crate::error::SimError;
use crate::sim::entity::BallKind;

/// Simulation speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SpeedMode {
    #[default]
    Normal,
    /// Two simulation frames per render frame
    SpedUp,
}

impl SpeedMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeedMode::Normal => "Normal",
            SpeedMode::SpedUp => "Speed Up",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "normal" | "1x" => Some(SpeedMode::Normal),
            "fast" | "speedup" | "2x" => Some(SpeedMode::SpedUp),
            _ => None,
        }
    }

    /// Simulation frames per render frame
    pub fn frames_per_render(&self) -> u32 {
        match self {
            SpeedMode::Normal => 1,
            SpeedMode::SpedUp => crate::consts::SPEED_UP_FRAMES,
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            SpeedMode::Normal => SpeedMode::SpedUp,
            SpeedMode::SpedUp => SpeedMode::Normal,
        }
    }
}

/// Per-run settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seed for every random choice the core makes
    pub seed: u64,

    // === Stock ===
    /// Regular balls available at level start
    pub starting_balls: u32,
    /// Giant balls available at level start
    pub starting_giant_balls: u32,
    pub starting_coins: u64,
    /// Ball type staged when aiming
    pub selected_ball: BallKind,

    // === Physics ===
    /// Ball speed multiplier (fraction of half a grid unit per frame)
    pub ball_speed: f32,
    /// Size of one grid cell in pixels
    pub grid_unit: f32,
    pub speed: SpeedMode,

    // === Progression (read-only for the core, owned by the save system) ===
    /// Player level, gates unlockable features
    pub player_level: u32,
    pub current_xp: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            seed: 1,

            starting_balls: 5,
            starting_giant_balls: 0,
            starting_coins: 0,
            selected_ball: BallKind::Classic,

            ball_speed: 0.4,
            grid_unit: DEFAULT_GRID_UNIT,
            speed: SpeedMode::Normal,

            player_level: 1,
            current_xp: 0.0,
        }
    }
}

impl Settings {
    /// Parse a (possibly partial) JSON settings document
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let settings: Settings =
            serde_json::from_str(json).map_err(|e| SimError::config("settings", e))?;
        log::info!("Loaded settings (seed {})", settings.seed);
        Ok(settings)
    }

    /// Settings with every feature unlocked (debug / test runs)
    pub fn unlocked(seed: u64) -> Self {
        Self {
            seed,
            player_level: 20,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_mode_round_trips_names() {
        assert_eq!(SpeedMode::from_str("2x"), Some(SpeedMode::SpedUp));
        assert_eq!(SpeedMode::from_str("Normal"), Some(SpeedMode::Normal));
        assert_eq!(SpeedMode::SpedUp.frames_per_render(), 2);
        assert_eq!(SpeedMode::Normal.toggled(), SpeedMode::SpedUp);
    }

    #[test]
    fn partial_settings_keep_defaults() {
        let s = Settings::from_json(r#"{ "seed": 42, "selected_ball": "Split" }"#).expect("valid");
        assert_eq!(s.seed, 42);
        assert_eq!(s.selected_ball, BallKind::Split);
        assert_eq!(s.starting_balls, 5);
    }
}
