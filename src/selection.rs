/// reduce per-mode statistics into best-mode summaries
use crate::grid::{CellState, GridCube, SortingGrid};
use crate::params::{CubeFace, SortingMode};

/// best mode for one face: the minimum smoothed estimate over a full pass.
/// None until every mode has at least one sample at that face.
/// equal estimates resolve to the lower mode id, so repeated selection over
/// unchanged statistics is stable.
pub fn best_face_mode(cell: &CellState, face: CubeFace) -> Option<SortingMode> {
    if !cell.face_trained(face) {
        return None;
    }
    let mut best = SortingMode::NoSorting;
    let mut best_estimate = f64::INFINITY;
    for mode in SortingMode::ALL {
        let estimate = cell.stats(face, mode).estimate;
        // strict less-than keeps the lowest id on ties
        if estimate < best_estimate {
            best_estimate = estimate;
            best = mode;
        }
    }
    Some(best)
}

/// assemble the full best-mode-per-face summary for one cell
pub fn determine_best_times_cube(cell: &CellState) -> GridCube {
    let mut cube = GridCube::default();
    for face in CubeFace::ALL {
        cube.set_face(face, best_face_mode(cell, face));
    }
    cube
}

/// scene-wide winner: the mode most often optimal across the trained faces of
/// every cell. ties go to the lower id; a grid with nothing trained stays at
/// NoSorting.
pub fn global_best_mode(grid: &SortingGrid) -> SortingMode {
    let mut votes = [0u32; SortingMode::COUNT];
    for (_, cell) in grid.cells() {
        for face in CubeFace::ALL {
            if let Some(mode) = cell.best().face(face) {
                votes[mode.id()] += 1;
            }
        }
    }
    let mut winner = SortingMode::NoSorting;
    let mut most = 0u32;
    for mode in SortingMode::ALL {
        // strict greater-than keeps the lowest id on equal vote counts
        if votes[mode.id()] > most {
            most = votes[mode.id()];
            winner = mode;
        }
    }
    winner
}
