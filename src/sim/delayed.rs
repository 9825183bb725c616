//! Frame-delayed brick damage
//!
//! Blasts and stripe clears schedule one action per target so the damage
//! radiates outward over the following frames instead of landing at once.

use serde::{Deserialize, Serialize};

use super::event::HitSource;
use super::grid::BrickId;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayedAction {
    pub target: BrickId,
    pub amount: f32,
    pub source: HitSource,
    /// Frames until the damage lands
    pub frames_left: u32,
}

/// FIFO of pending damage; actions due on the same frame keep their
/// scheduling order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelayedQueue {
    actions: Vec<DelayedAction>,
}

impl DelayedQueue {
    pub fn schedule(&mut self, target: BrickId, amount: f32, source: HitSource, delay: u32) {
        self.actions.push(DelayedAction {
            target,
            amount,
            source,
            frames_left: delay,
        });
    }

    /// Advance one frame and take every action that is due. Delays of 0
    /// and 1 both land on the next drain.
    pub fn drain_due(&mut self) -> Vec<DelayedAction> {
        let mut due = Vec::new();
        self.actions.retain_mut(|action| {
            action.frames_left = action.frames_left.saturating_sub(1);
            if action.frames_left == 0 {
                due.push(*action);
                false
            } else {
                true
            }
        });
        due
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &DelayedAction> {
        self.actions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::event::BlastSource;

    const SRC: HitSource = HitSource::Blast(BlastSource::Mine);

    #[test]
    fn actions_land_after_their_delay() {
        let mut queue = DelayedQueue::default();
        queue.schedule(BrickId(1), 10.0, SRC, 2);
        queue.schedule(BrickId(2), 10.0, SRC, 0);
        assert_eq!(queue.drain_due().iter().map(|a| a.target).collect::<Vec<_>>(), vec![BrickId(2)]);
        let last = queue.drain_due();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].target, BrickId(1));
        assert!(queue.is_empty());
    }

    #[test]
    fn same_frame_actions_keep_schedule_order() {
        let mut queue = DelayedQueue::default();
        for i in 0..4 {
            queue.schedule(BrickId(i), 1.0, SRC, 2);
        }
        assert!(queue.drain_due().is_empty());
        let ids: Vec<_> = queue.drain_due().iter().map(|a| a.target.0).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }
}
