/// per-cell learned statistics and the smoothing update
use serde::{Deserialize, Serialize};

use crate::params::{CubeFace, SortingMode};

/// adaptive rate every fresh cell starts from
pub const ADAPTIVE_RATE_INITIAL: f64 = 1.0;

/// smoothing configuration, snapshotted from settings when a sweep starts
#[derive(Clone, Copy, Debug)]
pub struct LearningConfig {
    pub use_constant: bool,
    /// fixed smoothing rate in [0, 1]; 0 freezes estimates, 1 keeps only the
    /// newest sample
    pub constant_rate: f64,
    /// per-sample multiplier applied to a cell's adaptive rate
    pub adaptive_decay: f64,
    /// the adaptive rate never drops below this
    pub adaptive_floor: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            use_constant: true,
            constant_rate: 0.2,
            adaptive_decay: 0.97,
            adaptive_floor: 0.05,
        }
    }
}

/// one mode's running statistics at one face
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModeStats {
    /// exponentially smoothed per-thread gpu time
    pub estimate: f64,
    pub samples: u32,
}

/// best-mode-per-face summary for one cell, the unit persistence exports.
/// untrained faces stay None and fall back to the grid's global best mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GridCube {
    pub up: Option<SortingMode>,
    pub down: Option<SortingMode>,
    pub left: Option<SortingMode>,
    pub right: Option<SortingMode>,
    pub front: Option<SortingMode>,
    pub back: Option<SortingMode>,
}

impl GridCube {
    pub fn face(&self, face: CubeFace) -> Option<SortingMode> {
        match face {
            CubeFace::Up => self.up,
            CubeFace::Down => self.down,
            CubeFace::Left => self.left,
            CubeFace::Right => self.right,
            CubeFace::Front => self.front,
            CubeFace::Back => self.back,
        }
    }

    pub fn set_face(&mut self, face: CubeFace, mode: Option<SortingMode>) {
        match face {
            CubeFace::Up => self.up = mode,
            CubeFace::Down => self.down = mode,
            CubeFace::Left => self.left = mode,
            CubeFace::Right => self.right = mode,
            CubeFace::Front => self.front = mode,
            CubeFace::Back => self.back = mode,
        }
    }

    /// true when every face has a learned mode
    pub fn is_complete(&self) -> bool {
        CubeFace::ALL.iter().all(|f| self.face(*f).is_some())
    }

    /// true when no face has learned anything yet
    pub fn is_empty(&self) -> bool {
        CubeFace::ALL.iter().all(|f| self.face(*f).is_none())
    }
}

/// learned state for one grid cell: a smoothed timing estimate and sample
/// count per (face, mode), the cell's adaptive learning rate, and its current
/// best-mode summary
#[derive(Clone, Debug, PartialEq)]
pub struct CellState {
    stats: [[ModeStats; SortingMode::COUNT]; CubeFace::COUNT],
    adaptive_rate: f64,
    best: GridCube,
}

impl CellState {
    pub(crate) fn new() -> Self {
        Self {
            stats: Default::default(),
            adaptive_rate: ADAPTIVE_RATE_INITIAL,
            best: GridCube::default(),
        }
    }

    /// fold one accepted timing sample into the smoothed estimate.
    /// constant mode applies the fixed rate; adaptive mode applies the cell's
    /// decaying rate, then decays it toward the floor so early samples move
    /// the estimate aggressively and later ones fine-tune.
    pub fn record_sample(&mut self, face: CubeFace, mode: SortingMode, t: f64, cfg: &LearningConfig) {
        let rate = if cfg.use_constant {
            cfg.constant_rate
        } else {
            self.adaptive_rate
        };
        let slot = &mut self.stats[face.index()][mode.id()];
        slot.estimate += rate * (t - slot.estimate);
        slot.samples = slot.samples.saturating_add(1);
        if !cfg.use_constant {
            self.adaptive_rate = (self.adaptive_rate * cfg.adaptive_decay).max(cfg.adaptive_floor);
        }
    }

    #[inline]
    pub fn stats(&self, face: CubeFace, mode: SortingMode) -> ModeStats {
        self.stats[face.index()][mode.id()]
    }

    /// a face counts as trained once every mode has at least one sample there
    pub fn face_trained(&self, face: CubeFace) -> bool {
        self.stats[face.index()].iter().all(|s| s.samples > 0)
    }

    /// the whole cell is trained once all six faces are
    pub fn is_trained(&self) -> bool {
        CubeFace::ALL.iter().all(|f| self.face_trained(*f))
    }

    #[inline]
    pub fn adaptive_rate(&self) -> f64 {
        self.adaptive_rate
    }

    #[inline]
    pub fn best(&self) -> &GridCube {
        &self.best
    }

    pub(crate) fn best_mut(&mut self) -> &mut GridCube {
        &mut self.best
    }

    pub(crate) fn set_best(&mut self, best: GridCube) {
        self.best = best;
    }

    pub(crate) fn set_stats(&mut self, face: CubeFace, mode: SortingMode, stats: ModeStats) {
        self.stats[face.index()][mode.id()] = stats;
    }

    pub(crate) fn set_adaptive_rate(&mut self, rate: f64) {
        self.adaptive_rate = rate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(rate: f64) -> LearningConfig {
        LearningConfig { use_constant: true, constant_rate: rate, ..LearningConfig::default() }
    }

    #[test]
    fn test_rate_zero_freezes_estimates() {
        let mut cell = CellState::new();
        let cfg = constant(0.0);
        for _ in 0..10 {
            cell.record_sample(CubeFace::Up, SortingMode::Origin, 42.0, &cfg);
        }
        let s = cell.stats(CubeFace::Up, SortingMode::Origin);
        assert_eq!(s.estimate, 0.0);
        assert_eq!(s.samples, 10);
    }

    #[test]
    fn test_rate_one_keeps_last_sample() {
        let mut cell = CellState::new();
        let cfg = constant(1.0);
        for t in [10.0, 80.0, 5.0] {
            cell.record_sample(CubeFace::Front, SortingMode::Reis, t, &cfg);
        }
        assert_eq!(cell.stats(CubeFace::Front, SortingMode::Reis).estimate, 5.0);
    }

    #[test]
    fn test_partial_rate_converges_toward_signal() {
        let mut cell = CellState::new();
        let cfg = constant(0.2);
        for _ in 0..100 {
            cell.record_sample(CubeFace::Back, SortingMode::Aila, 50.0, &cfg);
        }
        let est = cell.stats(CubeFace::Back, SortingMode::Aila).estimate;
        assert!((est - 50.0).abs() < 1e-6, "estimate {est} did not converge");
    }

    #[test]
    fn test_adaptive_rate_decays_to_floor() {
        let mut cell = CellState::new();
        let cfg = LearningConfig {
            use_constant: false,
            adaptive_decay: 0.5,
            adaptive_floor: 0.1,
            ..LearningConfig::default()
        };
        assert_eq!(cell.adaptive_rate(), ADAPTIVE_RATE_INITIAL);
        for _ in 0..10 {
            cell.record_sample(CubeFace::Up, SortingMode::NoSorting, 1.0, &cfg);
        }
        assert_eq!(cell.adaptive_rate(), 0.1);
    }

    #[test]
    fn test_adaptive_first_sample_lands_fully() {
        // the initial adaptive rate is 1.0, so the first sample becomes the estimate
        let mut cell = CellState::new();
        let cfg = LearningConfig { use_constant: false, ..LearningConfig::default() };
        cell.record_sample(CubeFace::Left, SortingMode::Costa, 33.0, &cfg);
        assert_eq!(cell.stats(CubeFace::Left, SortingMode::Costa).estimate, 33.0);
    }

    #[test]
    fn test_face_trained_needs_every_mode() {
        let mut cell = CellState::new();
        let cfg = constant(0.5);
        for mode in SortingMode::ALL.iter().take(SortingMode::COUNT - 1) {
            cell.record_sample(CubeFace::Right, *mode, 1.0, &cfg);
        }
        assert!(!cell.face_trained(CubeFace::Right));
        cell.record_sample(CubeFace::Right, SortingMode::InferKey, 1.0, &cfg);
        assert!(cell.face_trained(CubeFace::Right));
        assert!(!cell.is_trained());
    }

    #[test]
    fn test_grid_cube_face_roundtrip() {
        let mut cube = GridCube::default();
        assert!(cube.is_empty());
        cube.set_face(CubeFace::Down, Some(SortingMode::TwoPoint));
        assert_eq!(cube.face(CubeFace::Down), Some(SortingMode::TwoPoint));
        assert!(!cube.is_empty());
        assert!(!cube.is_complete());
        for face in CubeFace::ALL {
            cube.set_face(face, Some(SortingMode::NoSorting));
        }
        assert!(cube.is_complete());
    }
}
