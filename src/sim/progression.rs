//! Pending xp, the per-frame xp drip, and level-ups

use serde::{Deserialize, Serialize};

use crate::tuning::Tuning;

/// Transfer of pending xp started at the end of a turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct XpDrip {
    pub total: f32,
    pub added: f32,
    /// Frames until the next transfer
    pub timer: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progression {
    pub level: u32,
    pub current_xp: f32,
    /// Xp earned but not yet credited
    pub pending_xp: f32,
    pub drip: Option<XpDrip>,
}

impl Progression {
    pub fn new(level: u32, current_xp: f32) -> Self {
        Self {
            level: level.max(1),
            current_xp,
            pending_xp: 0.0,
            drip: None,
        }
    }

    pub fn add_pending(&mut self, amount: f32) {
        if amount.is_finite() && amount > 0.0 {
            self.pending_xp += amount;
        }
    }

    /// Begin crediting everything pending; no-op if a drip is running or
    /// nothing is pending
    pub fn start_drip(&mut self, tuning: &Tuning) {
        if self.drip.is_some() || self.pending_xp <= 0.0 {
            return;
        }
        log::debug!("Xp drip started: {} pending", self.pending_xp);
        self.drip = Some(XpDrip {
            total: self.pending_xp,
            added: 0.0,
            timer: tuning.xp.drip_interval_frames,
        });
    }

    /// Advance the drip one frame. Returns the levels reached this frame.
    pub fn tick(&mut self, tuning: &Tuning) -> Vec<u32> {
        let mut reached = Vec::new();
        let Some(mut drip) = self.drip else {
            return reached;
        };
        drip.timer = drip.timer.saturating_sub(1);
        if drip.timer > 0 {
            self.drip = Some(drip);
            return reached;
        }
        drip.timer = tuning.xp.drip_interval_frames.max(1);

        let step = (drip.total / tuning.xp.drip_steps.max(1) as f32).floor().max(1.0);
        let amount = step.min(drip.total - drip.added);
        self.current_xp += amount;
        self.pending_xp = (self.pending_xp - amount).max(0.0);
        drip.added += amount;

        loop {
            let needed = tuning.xp_for_level(self.level);
            if needed <= 0.0 || self.current_xp < needed {
                break;
            }
            self.current_xp -= needed;
            self.level += 1;
            log::info!("Level up: {}", self.level);
            reached.push(self.level);
        }

        self.drip = (drip.added < drip.total).then_some(drip);
        reached
    }

    pub fn is_dripping(&self) -> bool {
        self.drip.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drip_credits_in_twentieths_every_third_frame() {
        let tuning = Tuning::default();
        let mut prog = Progression::new(1, 0.0);
        prog.add_pending(40.0);
        prog.start_drip(&tuning);
        prog.tick(&tuning);
        prog.tick(&tuning);
        assert_eq!(prog.current_xp, 0.0);
        prog.tick(&tuning);
        assert_eq!(prog.current_xp, 2.0);
        assert_eq!(prog.pending_xp, 38.0);
        for _ in 0..(3 * 19) {
            prog.tick(&tuning);
        }
        assert_eq!(prog.current_xp, 40.0);
        assert!(!prog.is_dripping());
    }

    #[test]
    fn small_totals_drip_one_at_a_time() {
        let tuning = Tuning::default();
        let mut prog = Progression::new(1, 0.0);
        prog.add_pending(3.0);
        prog.start_drip(&tuning);
        for _ in 0..9 {
            prog.tick(&tuning);
        }
        assert_eq!(prog.current_xp, 3.0);
        assert!(!prog.is_dripping());
    }

    #[test]
    fn crossing_thresholds_levels_up() {
        let tuning = Tuning::default();
        let mut prog = Progression::new(1, 45.0);
        prog.add_pending(200.0);
        prog.start_drip(&tuning);
        let mut levels = Vec::new();
        for _ in 0..(3 * 20) {
            levels.extend(prog.tick(&tuning));
        }
        // 245 xp: 50 for L1, 150 for L2, 45 left toward L3
        assert_eq!(levels, vec![2, 3]);
        assert_eq!(prog.level, 3);
        assert_eq!(prog.current_xp, 45.0);
    }
}
