//! Game state: the explicit simulation context
//!
//! Everything a frame reads or writes lives in `GameState` and is passed by
//! reference into every core call. The whole struct is serialisable,
//! including the RNG, so a saved state resumes bit-identically.

use std::collections::VecDeque;

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::board::Board;
use super::brick::Brick;
use super::combo::Combo;
use super::delayed::DelayedQueue;
use super::entity::{Ball, BallKind, BallRole, Projectile, SharedBallStats, XpOrb};
use super::equipment::{Loadout, Trackers};
use super::grid::BrickGrid;
use super::layout;
use super::overlay::OverlayAction;
use super::progression::Progression;
use super::stats::LevelStats;
use crate::error::SimError;
use crate::settings::{Settings, SpeedMode};
use crate::tuning::Tuning;

/// Turn life-cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Ball staged, waiting for an aim
    Aiming,
    /// Balls in flight
    Playing,
    /// Last goal gone, waiting for the turn to wind down
    LevelClearing,
    /// Healer/builder actions running one at a time
    EndTurnSequence,
    LevelComplete,
    GameOver,
}

impl GamePhase {
    /// Balls, projectiles and delayed actions advance in these phases
    #[inline]
    pub fn is_turn_active(&self) -> bool {
        matches!(self, GamePhase::Playing | GamePhase::LevelClearing)
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        matches!(self, GamePhase::LevelComplete | GamePhase::GameOver)
    }
}

/// Pointer state while aiming
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Aim {
    pub active: bool,
    /// Current drag position
    pub target: Option<Vec2>,
    /// Frames until the next preview ball
    pub ghost_cooldown: u32,
}

/// Complete simulation context (deterministic, serialisable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub settings: Settings,
    pub tuning: Tuning,
    pub board: Board,
    pub grid: BrickGrid,
    pub phase: GamePhase,
    /// Simulation frames since level start
    pub frame: u64,

    // === Entities ===
    /// Primary and mini balls; a staged (unlaunched) ball sits here while aiming
    pub balls: Vec<Ball>,
    /// Aim preview balls
    pub ghosts: Vec<Ball>,
    pub projectiles: Vec<Projectile>,
    pub xp_orbs: Vec<XpOrb>,

    // === Turn ===
    /// Hp and power-up uses shared by every primary ball
    pub pool: SharedBallStats,
    pub combo: Combo,
    pub delayed: DelayedQueue,
    /// A giant ball was launched this turn (suppresses combo)
    pub giant_turn: bool,
    pub aim: Aim,
    pub selected_ball: BallKind,
    pub end_turn_actions: VecDeque<OverlayAction>,
    pub end_turn_timer: u32,
    pub speed: SpeedMode,

    // === Equipment ===
    pub loadout: Loadout,
    pub trackers: Trackers,

    // === Economy / progression ===
    pub coins: u64,
    pub gems: u64,
    pub balls_left: u32,
    pub giant_balls: u32,
    pub ball_purchases: u32,
    pub progression: Progression,
    pub stats: LevelStats,

    /// Every random choice draws from here
    pub rng: Pcg32,
    next_id: u32,
}

impl GameState {
    /// Start a level on a pre-built grid. The grid must match the board.
    pub fn new(settings: Settings, tuning: Tuning, grid: BrickGrid) -> Result<Self, SimError> {
        let board = Board::new(settings.grid_unit);
        if (grid.cols, grid.rows) != (board.cols, board.rows) {
            return Err(SimError::DimensionMismatch {
                expected: (board.cols, board.rows),
                got: (grid.cols, grid.rows),
            });
        }
        log::info!(
            "Level start: {} bricks, {} goals, seed {}",
            grid.len(),
            grid.goal_count(),
            settings.seed
        );
        Ok(Self {
            board,
            grid,
            phase: GamePhase::Aiming,
            frame: 0,
            balls: Vec::new(),
            ghosts: Vec::new(),
            projectiles: Vec::new(),
            xp_orbs: Vec::new(),
            pool: SharedBallStats::default(),
            combo: Combo::default(),
            delayed: DelayedQueue::default(),
            giant_turn: false,
            aim: Aim::default(),
            selected_ball: settings.selected_ball,
            end_turn_actions: VecDeque::new(),
            end_turn_timer: 0,
            speed: settings.speed,
            loadout: Loadout::default(),
            trackers: Trackers::default(),
            coins: settings.starting_coins,
            gems: 0,
            balls_left: settings.starting_balls,
            giant_balls: settings.starting_giant_balls,
            ball_purchases: 0,
            progression: Progression::new(settings.player_level, settings.current_xp),
            stats: LevelStats::default(),
            rng: Pcg32::seed_from_u64(settings.seed),
            next_id: 1,
            settings,
            tuning,
        })
    }

    /// Start a level from a layout string
    pub fn from_layout(settings: Settings, tuning: Tuning, layout: &str) -> Result<Self, SimError> {
        let board = Board::new(settings.grid_unit);
        let grid = layout::import(layout, &board)?;
        Self::new(settings, tuning, grid)
    }

    /// Replace the level with an imported layout. On error nothing changes.
    pub fn import_layout(&mut self, layout: &str) -> Result<(), SimError> {
        let grid = layout::import(layout, &self.board)?;
        self.grid = grid;
        self.balls.clear();
        self.ghosts.clear();
        self.projectiles.clear();
        self.xp_orbs.clear();
        self.delayed.clear();
        self.end_turn_actions.clear();
        self.aim = Aim::default();
        self.phase = GamePhase::Aiming;
        Ok(())
    }

    pub fn export_layout(&self) -> String {
        layout::export(&self.grid)
    }

    /// Allocate a new entity id
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// First live primary ball (the one whose type drives the turn)
    pub fn lead_ball(&self) -> Option<&Ball> {
        self.balls.iter().find(|b| b.is_primary())
    }

    /// Ball type whose equipment applies to turn-wide effects
    pub fn active_kind(&self) -> BallKind {
        self.lead_ball().map_or(self.selected_ball, |b| b.kind)
    }

    pub fn has_primary_balls(&self) -> bool {
        self.balls.iter().any(Ball::is_primary)
    }

    /// Nothing left that can still change the board this turn
    pub fn turn_is_idle(&self) -> bool {
        self.balls.is_empty() && self.projectiles.is_empty() && self.delayed.is_empty()
    }

    pub fn ball_cost(&self) -> u64 {
        self.tuning.shop.buy_ball_base_cost + self.ball_purchases as u64 * self.tuning.shop.buy_ball_increment
    }

    pub fn giant_unlocked(&self) -> bool {
        self.progression.level >= self.tuning.unlocks.giant_bonus
    }

    /// Place a fresh unlaunched ball of `kind` at the default launch point
    pub fn stage_ball(&mut self, kind: BallKind) {
        let id = self.next_entity_id();
        let mut ball = Ball::new(id, kind, BallRole::Primary, Vec2::ZERO, self.board.unit);
        ball.pos = self.board.launch_point(ball.radius);
        log::debug!("Staged {} ball #{}", kind.as_str(), id);
        self.balls.push(ball);
    }

    /// Read-only view for rendering and debugging
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            frame: self.frame,
            bricks: self.grid.iter().cloned().collect(),
            balls: self.balls.clone(),
            projectiles: self.projectiles.len(),
            xp_orbs: self.xp_orbs.len(),
            delayed_actions: self.delayed.len(),
            pool: self.pool,
            combo: self.combo.count,
            max_combo_this_turn: self.combo.max_this_turn,
            coins: self.coins,
            gems: self.gems,
            balls_left: self.balls_left,
            giant_balls: self.giant_balls,
            level: self.progression.level,
            current_xp: self.progression.current_xp,
            pending_xp: self.progression.pending_xp,
            stats: self.stats.clone(),
        }
    }
}

/// Point-in-time copy of the observable state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub phase: GamePhase,
    pub frame: u64,
    /// Live bricks in id order
    pub bricks: Vec<Brick>,
    pub balls: Vec<Ball>,
    pub projectiles: usize,
    pub xp_orbs: usize,
    pub delayed_actions: usize,
    pub pool: SharedBallStats,
    pub combo: u32,
    pub max_combo_this_turn: u32,
    pub coins: u64,
    pub gems: u64,
    pub balls_left: u32,
    pub giant_balls: u32,
    pub level: u32,
    pub current_xp: f32,
    pub pending_xp: f32,
    pub stats: LevelStats,
}
