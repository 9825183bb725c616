//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only (`GameState::rng`)
//! - Stable iteration order (grid scan order, FIFO queues)
//! - No rendering, audio or platform dependencies

pub mod board;
pub mod brick;
pub mod catalog;
pub mod collision;
pub mod combo;
pub mod delayed;
pub mod entity;
pub mod equipment;
pub mod event;
pub mod grid;
pub mod layout;
pub mod overlay;
pub mod process;
pub mod progression;
pub mod state;
pub mod stats;
pub mod tick;

pub use board::Board;
pub use brick::{Brick, Overlay};
pub use catalog::BrickKind;
pub use entity::{Ball, BallKind, BallRole, Projectile, SharedBallStats, XpOrb};
pub use equipment::{Equipment, EquipmentId, Loadout};
pub use event::{Event, EventKind, EventRecord, EventSink, HitSource, NullSink};
pub use grid::{BrickGrid, BrickId};
pub use state::{GamePhase, GameState, Snapshot};
pub use tick::{TickInput, render_frame, tick};
