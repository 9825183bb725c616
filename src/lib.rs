//! Brick Rush - turn-based brick-breaking arcade simulation core
//!
//! Core modules:
//! - `sim`: Deterministic simulation (collisions, event cascade, turn state machine)
//! - `settings`: Per-run knobs (seed, speed, starting stock)
//! - `tuning`: Data-driven game balance
//! - `error`: Load-time error type

pub mod error;
pub mod settings;
pub mod sim;
pub mod tuning;

pub use error::SimError;
pub use settings::Settings;
pub use tuning::Tuning;

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Fixed simulation rate (frames per second)
    pub const SIM_FPS: u32 = 60;
    /// Simulation frames per render frame in speed-up mode
    pub const SPEED_UP_FRAMES: u32 = 2;

    /// Playable brick grid
    pub const BRICK_COLS: usize = 13;
    pub const BRICK_ROWS: usize = 13;
    /// Empty border around the brick grid, in grid units
    pub const SAFE_ZONE_GRID: usize = 2;
    pub const TOTAL_COLS: usize = BRICK_COLS + SAFE_ZONE_GRID * 2;
    pub const TOTAL_ROWS: usize = BRICK_ROWS + SAFE_ZONE_GRID * 2;
    /// Offset between centred layout coordinates (-6..=6) and grid indices (0..=12)
    pub const GRID_CENTER_OFFSET: i32 = 6;

    /// Default size of one grid cell in pixels
    pub const DEFAULT_GRID_UNIT: f32 = 32.0;

    /// Ball radii as a fraction of the grid unit
    pub const BALL_RADIUS_FACTOR: f32 = 0.32;
    pub const MINI_BALL_RADIUS_FACTOR: f32 = 0.2;
    pub const GIANT_BALL_RADIUS_FACTOR: f32 = 1.0;
    pub const PROJECTILE_RADIUS_FACTOR: f32 = 0.15;
    pub const HOMING_RADIUS_FACTOR: f32 = 0.3;

    /// Frames a ball ignores a brick it just damaged
    pub const BRICK_HIT_COOLDOWN_FRAMES: u8 = 3;
    /// Frames a brick flashes after a hit
    pub const BRICK_FLASH_FRAMES: u8 = 8;
    /// Frames a ball's hp bar flashes after damage
    pub const BALL_FLASH_FRAMES: u8 = 8;
    /// Gap between end-of-turn overlay actions
    pub const END_TURN_ACTION_GAP: u32 = 2;
    /// Giant balls lose 1 hp per this much damage dealt
    pub const GIANT_DAMAGE_PER_HP: f32 = 100.0;
    /// Blast / stripe propagation speed as a fraction of the grid unit per frame
    pub const PROPAGATION_UNIT_FRACTION: f32 = 0.5;
    /// Base ball speed as a fraction of the grid unit per frame (before the speed setting)
    pub const BALL_SPEED_UNIT_FRACTION: f32 = 0.5;
    /// Ramping damage and zap aura tick every this many frames
    pub const EQUIPMENT_PULSE_FRAMES: u32 = 15;
}

/// Sign of a float as -1, 0 or 1 (0 maps to 0, unlike `f32::signum`)
#[inline]
pub fn sign(v: f32) -> f32 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Rotate `current` toward `desired` by at most `max_turn` radians, keeping its length
#[inline]
pub fn steer_toward(current: Vec2, desired: Vec2, max_turn: f32) -> Vec2 {
    let speed = current.length();
    if speed <= f32::EPSILON || desired.length_squared() <= f32::EPSILON {
        return current;
    }
    let angle = current.angle_to(desired);
    let turn = angle.clamp(-max_turn, max_turn);
    Vec2::from_angle(turn).rotate(current)
}

/// Convert a duration in seconds to whole simulation frames
#[inline]
pub fn secs_to_frames(secs: f32) -> u32 {
    (secs * consts::SIM_FPS as f32).round().max(0.0) as u32
}
