//! Brick Rush headless runner
//!
//! Plays a level with a scripted aim and prints the final snapshot as JSON.
//!
//! ```text
//! brick-rush [layout-file] [settings.json] [tuning.json]
//! ```

#[cfg(not(target_arch = "wasm32"))]
mod runner {
    use std::fs;

    use glam::Vec2;

    use brick_rush::sim::{EventKind, EventRecord, EventSink, GamePhase, GameState, TickInput, process, render_frame};
    use brick_rush::{Settings, SimError, Tuning};

    const DEMO_LAYOUT: &str = "0,-6,goal,60,60,0,0,0,0,null,1,1;\
        -2,-5,explosive,20,20,0,0,0,0,null,1,1;\
        2,-5,horizontalStripe,20,20,0,0,0,0,null,1,1;\
        -1,-3,normal,40,80,5,10,0,0,mine,2,1;\
        3,-2,normal,30,30,0,0,0,0,healer,1,1;\
        -4,-1,wool,20,20,0,0,0,0,null,1,1;\
        0,0,extraBall,10,10,0,0,0,0,null,1,1;\
        4,1,normal,25,25,3,3,1,1,builder,1,1";

    /// Give up on a level after this many render frames
    const FRAME_LIMIT: u32 = 60 * 60 * 10;
    /// Render frames a turn may run before it is forced to end
    const TURN_LIMIT: u32 = 60 * 60;

    /// Counts notable events and logs the rare ones
    #[derive(Default)]
    struct LogSink {
        bricks_destroyed: u32,
        level_ups: u32,
    }

    impl EventSink for LogSink {
        fn emit(&mut self, record: EventRecord) {
            match record.kind {
                EventKind::BrickDestroyed => self.bricks_destroyed += 1,
                EventKind::LevelUp => {
                    self.level_ups += 1;
                    log::info!("Reached level {}", record.magnitude);
                }
                EventKind::BallDying => log::info!("Shared ball hp ran out"),
                EventKind::LevelCleared => log::info!("Last goal destroyed"),
                _ => {}
            }
        }
    }

    fn read(path: Option<&String>) -> Result<Option<String>, SimError> {
        path.map(|p| {
            fs::read_to_string(p).map_err(|e| SimError::Io {
                path: p.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
    }

    /// Aim point for a turn: the nearest goal, nudged sideways so turns differ
    fn aim_target(state: &GameState, turn: u32) -> Vec2 {
        let goal = process::homing_target(&state.grid, state.board.launch_point(0.0))
            .and_then(|id| state.grid.get(id))
            .map(|b| b.center)
            .unwrap_or(Vec2::new(state.board.width() / 2.0, 0.0));
        let nudge = ((turn % 5) as f32 - 2.0) * state.board.unit * 0.75;
        goal + Vec2::new(nudge, 0.0)
    }

    pub fn run() -> Result<(), SimError> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let layout = read(args.first())?.unwrap_or_else(|| DEMO_LAYOUT.to_string());
        let settings = match read(args.get(1))? {
            Some(json) => Settings::from_json(&json)?,
            None => Settings::unlocked(7),
        };
        let tuning = match read(args.get(2))? {
            Some(json) => Tuning::from_json(&json)?,
            None => Tuning::default(),
        };

        let mut state = GameState::from_layout(settings, tuning, &layout)?;
        let mut sink = LogSink::default();
        let mut turn = 0;
        let mut turn_frames = 0;

        for _ in 0..FRAME_LIMIT {
            if state.phase.is_finished() {
                break;
            }
            let mut input = TickInput::default();
            match state.phase {
                GamePhase::Aiming if state.has_primary_balls() => {
                    if state.aim.active {
                        input.aim_drag = Some(aim_target(&state, turn));
                        input.aim_release = true;
                        turn += 1;
                        turn_frames = 0;
                    } else {
                        input.aim_press = Some(state.board.launch_point(0.0));
                    }
                }
                GamePhase::Playing | GamePhase::LevelClearing => {
                    turn_frames += 1;
                    input.activate_power_up = turn_frames == 30;
                    input.force_end_turn = turn_frames >= TURN_LIMIT;
                }
                _ => {}
            }
            render_frame(&mut state, &input, &mut sink);
        }

        log::info!(
            "Finished in {:?} after {} turns: {} bricks destroyed, {} level ups",
            state.phase,
            turn,
            sink.bricks_destroyed,
            sink.level_ups
        );
        let json = serde_json::to_string_pretty(&state.snapshot()).map_err(|e| SimError::config("snapshot", e))?;
        println!("{}", json);
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Brick Rush (headless) starting...");
    if let Err(e) = runner::run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The simulation core is a library; there is no wasm entry point
}
