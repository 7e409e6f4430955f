/// delayed-feedback attribution between mode selection and timing read-back
use std::collections::VecDeque;

use crate::params::{CubeFace, SortingMode};

/// the configuration one frame rendered with, waiting for its timing to come
/// back down the pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingSample {
    /// linear cell index
    pub cell: usize,
    pub face: CubeFace,
    pub mode: SortingMode,
    pub frame: u64,
}

/// fixed-capacity queue matching timing records to the configuration active
/// `depth` frames earlier.
/// each tick pushes the current frame's selection; the entry that falls out
/// is the one the timing arriving that tick belongs to. entries pop exactly
/// once, oldest first, so no record is ever attributed twice.
#[derive(Clone, Debug)]
pub struct DelayQueue {
    pending: VecDeque<PendingSample>,
    depth: usize,
}

impl DelayQueue {
    pub fn new(depth: usize) -> Self {
        Self { pending: VecDeque::with_capacity(depth + 1), depth }
    }

    /// queue this frame's selection and return the one made `depth` frames
    /// ago. returns None while the pipeline is still filling.
    pub fn push(&mut self, sample: PendingSample) -> Option<PendingSample> {
        self.pending.push_back(sample);
        if self.pending.len() > self.depth {
            self.pending.pop_front()
        } else {
            None
        }
    }

    /// take the oldest in-flight entry without pushing, for draining the
    /// pipeline after the last measured frame
    pub fn pop_oldest(&mut self) -> Option<PendingSample> {
        self.pending.pop_front()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// drop every in-flight entry (training restart or cancel)
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(frame: u64) -> PendingSample {
        PendingSample {
            cell: frame as usize,
            face: CubeFace::Up,
            mode: SortingMode::NoSorting,
            frame,
        }
    }

    #[test]
    fn test_warmup_returns_nothing() {
        let mut q = DelayQueue::new(4);
        for f in 0..4 {
            assert_eq!(q.push(sample(f)), None);
        }
        assert_eq!(q.len(), 4);
    }

    #[test]
    fn test_entries_mature_depth_pushes_later() {
        let mut q = DelayQueue::new(4);
        for f in 0..4 {
            q.push(sample(f));
        }
        // push k matures push k - 4, in order, exactly once
        for f in 4..20 {
            let matured = q.push(sample(f)).unwrap();
            assert_eq!(matured.frame, f - 4);
        }
        assert_eq!(q.len(), 4);
    }

    #[test]
    fn test_depth_zero_matures_immediately() {
        let mut q = DelayQueue::new(0);
        assert_eq!(q.push(sample(7)).unwrap().frame, 7);
        assert!(q.is_empty());
    }

    #[test]
    fn test_drain_pops_oldest_first() {
        let mut q = DelayQueue::new(3);
        for f in 0..3 {
            q.push(sample(f));
        }
        assert_eq!(q.pop_oldest().unwrap().frame, 0);
        assert_eq!(q.pop_oldest().unwrap().frame, 1);
        assert_eq!(q.pop_oldest().unwrap().frame, 2);
        assert_eq!(q.pop_oldest(), None);
    }

    #[test]
    fn test_clear_drops_in_flight() {
        let mut q = DelayQueue::new(2);
        q.push(sample(0));
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.push(sample(1)), None);
    }
}
