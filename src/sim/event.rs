//! Typed simulation events
//!
//! `Event` is the internal tagged union the processor consumes; each variant
//! carries enough payload to be expanded without looking anything up again.
//! `EventRecord` is the flattened, read-only view handed to the outside world
//! (VFX, audio, debug overlays) through an `EventSink`.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::brick::Overlay;
use super::entity::BallKind;
use super::grid::BrickId;

/// Which effect produced an area blast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlastSource {
    /// Explosive ball power-up
    BallPower,
    /// Explosive brick destroyed
    ChainReaction,
    Mine,
    /// Kinetic capacitor discharge
    WallCapacitor,
    HomingExplode,
}

/// What dealt damage to a brick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HitSource {
    Ball { id: u32, kind: BallKind },
    MiniBall { id: u32, parent: BallKind },
    Projectile { id: u32 },
    Blast(BlastSource),
    Stripe,
    ZapAura,
    /// Brick replaced by a brick-ball ring
    Replaced,
    Debug,
}

impl HitSource {
    /// Direct hits come from a ball touching the brick
    pub fn is_direct(&self) -> bool {
        matches!(
            self,
            HitSource::Ball { .. } | HitSource::MiniBall { .. } | HitSource::Debug
        )
    }

    /// Ball type whose equipment applies to this hit
    pub fn equipment_kind(&self) -> Option<BallKind> {
        match self {
            HitSource::Ball { kind, .. } => Some(*kind),
            HitSource::MiniBall { parent, .. } => Some(*parent),
            _ => None,
        }
    }
}

/// Where shared ball hp loss came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageSource {
    /// Primary ball bounced off a wall
    Wall,
    MiniBallWall,
    /// Self-damage from hitting a brick
    Brick,
    /// Giant ball attrition from damage dealt
    GiantPower,
}

/// Outcome of one `Brick::hit`
#[derive(Debug, Clone)]
pub struct BrickHit {
    pub brick: BrickId,
    pub damage_dealt: f32,
    pub coins_dropped: u32,
    pub gems_dropped: u32,
    pub is_broken: bool,
    pub center: Vec2,
    /// Visual layer count before the hit
    pub total_layers: u32,
    pub source: HitSource,
    /// Velocity of the hitting ball, used by ball cages
    pub source_vel: Option<Vec2>,
    /// Overlay the brick carried when hit
    pub overlay: Option<Overlay>,
    /// Follow-up events (mine detonation)
    pub sub_events: Vec<Event>,
}

/// One resolved occurrence, processed in FIFO order
#[derive(Debug, Clone)]
pub enum Event {
    DamageTaken {
        source: DamageSource,
        ball_kind: BallKind,
        amount: f32,
        pos: Vec2,
    },
    BrickHit(BrickHit),
    ExplodeMine {
        pos: Vec2,
    },
    DyingBallDeath {
        pos: Vec2,
    },
}

/// Flattened event kinds visible to the outside world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    // Processed events
    DamageTaken,
    BrickHit,
    ExplodeMine,
    DyingBallDeath,
    // Notifications raised while processing
    BrickDestroyed,
    ComboAdded,
    ComboLost,
    BallDying,
    BallGained,
    BallHealed,
    CoinsCollected,
    GemsCollected,
    XpCollected,
    Explosion,
    StripeCleared,
    BallCloned,
    EquipmentFound,
    PowerUpUsed,
    BrickHealed,
    BrickBuilt,
    LevelCleared,
    LevelUp,
}

/// Read-only record handed to an `EventSink`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub kind: EventKind,
    pub pos: Vec2,
    /// Damage, amount, combo value... depending on kind
    pub magnitude: f32,
    pub brick: Option<BrickId>,
    pub ball: Option<u32>,
    pub sub_events: Vec<EventKind>,
}

impl EventRecord {
    pub fn notice(kind: EventKind, pos: Vec2, magnitude: f32) -> Self {
        Self {
            kind,
            pos,
            magnitude,
            brick: None,
            ball: None,
            sub_events: Vec::new(),
        }
    }

    pub fn with_brick(mut self, brick: BrickId) -> Self {
        self.brick = Some(brick);
        self
    }

    pub fn with_ball(mut self, ball: u32) -> Self {
        self.ball = Some(ball);
        self
    }
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::DamageTaken { .. } => EventKind::DamageTaken,
            Event::BrickHit(_) => EventKind::BrickHit,
            Event::ExplodeMine { .. } => EventKind::ExplodeMine,
            Event::DyingBallDeath { .. } => EventKind::DyingBallDeath,
        }
    }

    /// Flatten into the externally visible record
    pub fn record(&self) -> EventRecord {
        match self {
            Event::DamageTaken { amount, pos, .. } => {
                EventRecord::notice(EventKind::DamageTaken, *pos, *amount)
            }
            Event::BrickHit(hit) => {
                let mut record = EventRecord::notice(EventKind::BrickHit, hit.center, hit.damage_dealt)
                    .with_brick(hit.brick);
                record.sub_events = hit.sub_events.iter().map(Event::kind).collect();
                match hit.source {
                    HitSource::Ball { id, .. } | HitSource::MiniBall { id, .. } => record.with_ball(id),
                    _ => record,
                }
            }
            Event::ExplodeMine { pos } => EventRecord::notice(EventKind::ExplodeMine, *pos, 0.0),
            Event::DyingBallDeath { pos } => {
                EventRecord::notice(EventKind::DyingBallDeath, *pos, 0.0)
            }
        }
    }
}

/// Receives one record per resolved event or notification
pub trait EventSink {
    fn emit(&mut self, record: EventRecord);
}

/// Collects every record (tests, replays)
impl EventSink for Vec<EventRecord> {
    fn emit(&mut self, record: EventRecord) {
        self.push(record);
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _record: EventRecord) {}
}
