/// per-frame parameter selection from the learned tables
use glam::{UVec3, Vec3};

use crate::grid::SortingGrid;
use crate::params::{CubeFace, SortingMode, SortingParameters};
use crate::trainer::TrainingMode;

/// read-only view answering "which parameters should this frame use"
pub struct RuntimeQuery<'a> {
    grid: &'a SortingGrid,
    coherence_bits: u32,
}

impl<'a> RuntimeQuery<'a> {
    pub fn new(grid: &'a SortingGrid, coherence_bits: u32) -> Self {
        Self { grid, coherence_bits }
    }

    /// locate the camera, classify the view direction, and look up the
    /// learned winner. faces without a stored winner fall back to the
    /// grid-wide mode.
    pub fn infer(&self, position: Vec3, look: Vec3) -> (UVec3, CubeFace, SortingMode) {
        let cell_idx = self.grid.locate(position);
        let face = CubeFace::nearest(look);
        let mode = self
            .grid
            .cell(cell_idx)
            .best()
            .face(face)
            .unwrap_or_else(|| self.grid.best_sort_mode());
        (cell_idx, face, mode)
    }

    /// expand the frame's parameter choice for the active mode
    pub fn select(
        &self,
        mode: TrainingMode,
        manual: &SortingParameters,
        manual_override: bool,
        position: Vec3,
        look: Vec3,
    ) -> SortingParameters {
        if manual_override {
            return *manual;
        }
        match mode {
            // a sweep gets its directive from the controller, everything
            // else keeps the hand-set bundle
            TrainingMode::Idle | TrainingMode::Training => *manual,
            TrainingMode::UsingBestFixed => {
                self.grid.best_sort_mode().parameters(self.coherence_bits)
            }
            TrainingMode::Inferring => {
                let (_, _, inferred) = self.infer(position, look);
                inferred.parameters(self.coherence_bits)
            }
        }
    }
}
