/// spatial partition of the scene bounds into a flat arena of learned cells
pub mod cell;

pub use cell::{CellState, GridCube, LearningConfig, ModeStats};

use glam::{UVec3, Vec3};

use crate::error::{GridError, Result};
use crate::params::SortingMode;

/// hard cap on cells per axis
pub const MAX_GRID_SIZE: u32 = 10;

/// axis-aligned scene bounds the grid partitions
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl SceneBounds {
    /// componentwise-sorted bounds, so min really is the lower corner
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self { min: a.min(b), max: a.max(b) }
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// tolerant equality for bounds that travelled through f32 json
    pub fn approx_eq(&self, other: &SceneBounds, eps: f32) -> bool {
        (self.min - other.min).abs().max_element() <= eps
            && (self.max - other.max).abs().max_element() <= eps
    }
}

/// snapshot the host reads to draw cell boundaries
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridOverlay {
    pub enabled: bool,
    pub cube_size: f32,
    pub dimensions: UVec3,
    pub bounds: SceneBounds,
}

/// the sorting grid: `nx * ny * nz` cells over the scene bounds, each holding
/// per-direction per-mode timing statistics and a best-mode summary.
/// cells live in one flat arena; (i, j, k) maps to a linear offset with x
/// fastest and z slowest.
#[derive(Clone, Debug, PartialEq)]
pub struct SortingGrid {
    dims: UVec3,
    bounds: SceneBounds,
    cells: Vec<CellState>,
    best_sort_mode: SortingMode,
}

impl SortingGrid {
    /// build a fresh, untrained grid. every axis must stay within
    /// 1..=MAX_GRID_SIZE; anything else leaves the caller's grid untouched.
    pub fn build(dims: UVec3, bounds: SceneBounds) -> Result<Self> {
        for (axis, value) in [('x', dims.x), ('y', dims.y), ('z', dims.z)] {
            if value < 1 || value > MAX_GRID_SIZE {
                return Err(GridError::InvalidDimension { axis, value, max: MAX_GRID_SIZE });
            }
        }
        let count = (dims.x * dims.y * dims.z) as usize;
        Ok(Self {
            dims,
            bounds,
            cells: vec![CellState::new(); count],
            best_sort_mode: SortingMode::NoSorting,
        })
    }

    #[inline]
    pub fn dimensions(&self) -> UVec3 {
        self.dims
    }

    #[inline]
    pub fn bounds(&self) -> SceneBounds {
        self.bounds
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// linear offset of cell (i, j, k)
    #[inline]
    pub fn linear_index(&self, idx: UVec3) -> usize {
        ((idx.z * self.dims.y + idx.y) * self.dims.x + idx.x) as usize
    }

    /// inverse of `linear_index`
    pub fn index_from_linear(&self, linear: usize) -> UVec3 {
        let nx = self.dims.x as usize;
        let ny = self.dims.y as usize;
        UVec3::new(
            (linear % nx) as u32,
            ((linear / nx) % ny) as u32,
            (linear / (nx * ny)) as u32,
        )
    }

    /// map a world position to its owning cell. positions outside the bounds
    /// clamp to the nearest border cell, so lookup is total.
    pub fn locate(&self, position: Vec3) -> UVec3 {
        let p = position.clamp(self.bounds.min, self.bounds.max);
        let rel = p - self.bounds.min;
        let extent = self.bounds.extent();
        UVec3::new(
            Self::axis_cell(rel.x, extent.x, self.dims.x),
            Self::axis_cell(rel.y, extent.y, self.dims.y),
            Self::axis_cell(rel.z, extent.z, self.dims.z),
        )
    }

    #[inline]
    fn axis_cell(rel: f32, extent: f32, n: u32) -> u32 {
        // a degenerate axis collapses to cell 0
        if extent <= 0.0 {
            return 0;
        }
        (((rel / extent) * n as f32) as u32).min(n - 1)
    }

    /// center point of a cell, the pose training renders from
    pub fn cell_center(&self, idx: UVec3) -> Vec3 {
        let cell_size = self.bounds.extent() / self.dims.as_vec3();
        self.bounds.min + (idx.as_vec3() + 0.5) * cell_size
    }

    #[inline]
    pub fn cell(&self, idx: UVec3) -> &CellState {
        &self.cells[self.linear_index(idx)]
    }

    #[inline]
    pub fn cell_mut(&mut self, idx: UVec3) -> &mut CellState {
        let i = self.linear_index(idx);
        &mut self.cells[i]
    }

    #[inline]
    pub fn cell_linear(&self, linear: usize) -> &CellState {
        &self.cells[linear]
    }

    #[inline]
    pub fn cell_linear_mut(&mut self, linear: usize) -> &mut CellState {
        &mut self.cells[linear]
    }

    /// every cell with its (i, j, k) index, in linear order
    pub fn cells(&self) -> impl Iterator<Item = (UVec3, &CellState)> {
        self.cells
            .iter()
            .enumerate()
            .map(|(i, cell)| (self.index_from_linear(i), cell))
    }

    /// scene-wide fallback mode for untrained lookups
    #[inline]
    pub fn best_sort_mode(&self) -> SortingMode {
        self.best_sort_mode
    }

    pub(crate) fn set_best_sort_mode(&mut self, mode: SortingMode) {
        self.best_sort_mode = mode;
    }

    /// throw away all learned state and rebuild with new dimensions.
    /// bounds are kept; statistics never survive a reshape.
    pub fn resize(&mut self, dims: UVec3) -> Result<()> {
        let rebuilt = SortingGrid::build(dims, self.bounds)?;
        *self = rebuilt;
        Ok(())
    }

    /// reset every cell to untrained, keeping shape and bounds
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            *cell = CellState::new();
        }
        self.best_sort_mode = SortingMode::NoSorting;
    }

    /// snapshot for the host's debug overlay
    pub fn overlay(&self, enabled: bool, cube_size: f32) -> GridOverlay {
        GridOverlay { enabled, cube_size, dimensions: self.dims, bounds: self.bounds }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_bounds() -> SceneBounds {
        SceneBounds::new(Vec3::splat(-1.0), Vec3::splat(1.0))
    }

    #[test]
    fn test_build_allocates_every_cell_untrained() {
        for dims in [UVec3::ONE, UVec3::new(2, 3, 4), UVec3::splat(MAX_GRID_SIZE)] {
            let grid = SortingGrid::build(dims, unit_bounds()).unwrap();
            assert_eq!(grid.cell_count(), (dims.x * dims.y * dims.z) as usize);
            assert!(grid.cells().all(|(_, c)| !c.is_trained() && c.best().is_empty()));
            assert_eq!(grid.best_sort_mode(), SortingMode::NoSorting);
        }
    }

    #[test]
    fn test_build_rejects_out_of_range_axes() {
        assert!(matches!(
            SortingGrid::build(UVec3::new(0, 2, 2), unit_bounds()),
            Err(GridError::InvalidDimension { axis: 'x', value: 0, .. })
        ));
        assert!(matches!(
            SortingGrid::build(UVec3::new(2, MAX_GRID_SIZE + 1, 2), unit_bounds()),
            Err(GridError::InvalidDimension { axis: 'y', .. })
        ));
    }

    #[test]
    fn test_locate_octants() {
        // 2x2x2 over [-1, 1]^3: (0.5, 0.5, 0.5) owns the (+,+,+) octant
        let grid = SortingGrid::build(UVec3::splat(2), unit_bounds()).unwrap();
        assert_eq!(grid.locate(Vec3::splat(0.5)), UVec3::new(1, 1, 1));
        assert_eq!(grid.locate(Vec3::splat(-0.5)), UVec3::new(0, 0, 0));
        assert_eq!(grid.locate(Vec3::new(0.5, -0.5, 0.5)), UVec3::new(1, 0, 1));
    }

    #[test]
    fn test_locate_clamps_outside_positions() {
        let grid = SortingGrid::build(UVec3::new(4, 4, 4), unit_bounds()).unwrap();
        assert_eq!(grid.locate(Vec3::splat(100.0)), UVec3::new(3, 3, 3));
        assert_eq!(grid.locate(Vec3::splat(-100.0)), UVec3::ZERO);
        // the exact upper corner stays inside the last cell
        assert_eq!(grid.locate(Vec3::splat(1.0)), UVec3::new(3, 3, 3));
    }

    #[test]
    fn test_locate_inverts_cell_center() {
        let grid = SortingGrid::build(UVec3::new(3, 4, 5), unit_bounds()).unwrap();
        for (idx, _) in grid.cells() {
            assert_eq!(grid.locate(grid.cell_center(idx)), idx);
        }
    }

    #[test]
    fn test_locate_degenerate_axis() {
        // a flat scene (zero z extent) maps everything to z = 0
        let bounds = SceneBounds::new(Vec3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, 1.0, 0.0));
        let grid = SortingGrid::build(UVec3::new(2, 2, 2), bounds).unwrap();
        assert_eq!(grid.locate(Vec3::new(0.5, 0.5, 123.0)).z, 0);
    }

    #[test]
    fn test_linear_index_roundtrip() {
        let grid = SortingGrid::build(UVec3::new(3, 4, 5), unit_bounds()).unwrap();
        for linear in 0..grid.cell_count() {
            let idx = grid.index_from_linear(linear);
            assert_eq!(grid.linear_index(idx), linear);
        }
    }

    #[test]
    fn test_resize_rebuilds_untrained() {
        let mut grid = SortingGrid::build(UVec3::splat(2), unit_bounds()).unwrap();
        let cfg = LearningConfig::default();
        grid.cell_mut(UVec3::ZERO).record_sample(
            crate::params::CubeFace::Up,
            SortingMode::Origin,
            5.0,
            &cfg,
        );
        grid.resize(UVec3::splat(3)).unwrap();
        assert_eq!(grid.cell_count(), 27);
        assert!(grid.cells().all(|(_, c)| c.best().is_empty()));

        // a rejected resize keeps the grid as it was
        assert!(grid.resize(UVec3::new(0, 1, 1)).is_err());
        assert_eq!(grid.cell_count(), 27);
    }

    #[test]
    fn test_bounds_are_sorted_on_construction() {
        let b = SceneBounds::new(Vec3::new(1.0, -2.0, 3.0), Vec3::new(-1.0, 2.0, -3.0));
        assert_eq!(b.min, Vec3::new(-1.0, -2.0, -3.0));
        assert_eq!(b.max, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(b.center(), Vec3::ZERO);
    }

    #[test]
    fn test_overlay_mirrors_grid_shape() {
        let grid = SortingGrid::build(UVec3::new(2, 3, 4), unit_bounds()).unwrap();
        let overlay = grid.overlay(true, 0.5);
        assert!(overlay.enabled);
        assert_eq!(overlay.cube_size, 0.5);
        assert_eq!(overlay.dimensions, grid.dimensions());
        assert_eq!(overlay.bounds, grid.bounds());
    }
}
