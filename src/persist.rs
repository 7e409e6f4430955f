/// grid snapshots on disk: pretty-printed json, validated on the way back in
use std::fs;
use std::path::Path;

use glam::{UVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};
use crate::grid::cell::ADAPTIVE_RATE_INITIAL;
use crate::grid::{CellState, GridCube, ModeStats, SceneBounds, SortingGrid};
use crate::params::{CubeFace, SortingMode};

/// slack when matching saved bounds against the live scene; f32 coordinates
/// that travelled through json may come back slightly off
const BOUNDS_TOLERANCE: f32 = 1e-3;

/// how much of the learned state a snapshot carries
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveDetail {
    /// per-cell winners and the headline mode only
    BestOnly,
    /// winners plus every raw estimate, so training can resume later
    AllResults,
}

/// the on-disk shape. modes serialize by variant name so the files stay
/// readable and survive reordering of the numeric ids.
#[derive(Debug, Serialize, Deserialize)]
struct GridDocument {
    dimensions: [u32; 3],
    scene_min: [f32; 3],
    scene_max: [f32; 3],
    best_sort_mode: SortingMode,
    cells: Vec<CellRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CellRecord {
    index: [u32; 3],
    best: GridCube,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    adaptive_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    results: Option<Vec<FaceRecord>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FaceRecord {
    face: CubeFace,
    modes: Vec<ModeRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ModeRecord {
    mode: SortingMode,
    estimate: f64,
    samples: u32,
}

fn face_records(cell: &CellState) -> Vec<FaceRecord> {
    CubeFace::ALL
        .iter()
        .map(|&face| FaceRecord {
            face,
            modes: SortingMode::ALL
                .iter()
                .map(|&mode| {
                    let s = cell.stats(face, mode);
                    ModeRecord { mode, estimate: s.estimate, samples: s.samples }
                })
                .collect(),
        })
        .collect()
}

fn to_document(grid: &SortingGrid, detail: SaveDetail) -> GridDocument {
    let bounds = grid.bounds();
    let cells = grid
        .cells()
        .map(|(idx, cell)| CellRecord {
            index: idx.to_array(),
            best: *cell.best(),
            adaptive_rate: match detail {
                SaveDetail::BestOnly => None,
                SaveDetail::AllResults => Some(cell.adaptive_rate()),
            },
            results: match detail {
                SaveDetail::BestOnly => None,
                SaveDetail::AllResults => Some(face_records(cell)),
            },
        })
        .collect();
    GridDocument {
        dimensions: grid.dimensions().to_array(),
        scene_min: bounds.min.to_array(),
        scene_max: bounds.max.to_array(),
        best_sort_mode: grid.best_sort_mode(),
        cells,
    }
}

fn from_document(doc: GridDocument) -> Result<SortingGrid> {
    let dims = UVec3::from_array(doc.dimensions);
    let bounds =
        SceneBounds::new(Vec3::from_array(doc.scene_min), Vec3::from_array(doc.scene_max));
    let mut grid = SortingGrid::build(dims, bounds)
        .map_err(|e| GridError::corrupt(format!("bad dimensions: {e}")))?;
    if doc.cells.len() != grid.cell_count() {
        return Err(GridError::corrupt(format!(
            "expected {} cell records, found {}",
            grid.cell_count(),
            doc.cells.len()
        )));
    }
    let mut seen = vec![false; grid.cell_count()];
    for rec in &doc.cells {
        let [x, y, z] = rec.index;
        if x >= dims.x || y >= dims.y || z >= dims.z {
            return Err(GridError::corrupt(format!("cell index [{x}, {y}, {z}] out of range")));
        }
        let idx = UVec3::new(x, y, z);
        let linear = grid.linear_index(idx);
        if seen[linear] {
            return Err(GridError::corrupt(format!("cell [{x}, {y}, {z}] appears twice")));
        }
        seen[linear] = true;
        let cell = grid.cell_mut(idx);
        cell.set_best(rec.best);
        if let Some(rate) = rec.adaptive_rate {
            if !rate.is_finite() || !(0.0..=ADAPTIVE_RATE_INITIAL).contains(&rate) {
                return Err(GridError::corrupt(format!(
                    "cell [{x}, {y}, {z}] carries adaptive rate {rate}"
                )));
            }
            cell.set_adaptive_rate(rate);
        }
        if let Some(faces) = &rec.results {
            for f in faces {
                for m in &f.modes {
                    if !m.estimate.is_finite() || m.estimate < 0.0 {
                        return Err(GridError::corrupt(format!(
                            "cell [{x}, {y}, {z}] {:?}/{:?} estimate {} is invalid",
                            f.face, m.mode, m.estimate
                        )));
                    }
                    cell.set_stats(
                        f.face,
                        m.mode,
                        ModeStats { estimate: m.estimate, samples: m.samples },
                    );
                }
            }
        }
    }
    grid.set_best_sort_mode(doc.best_sort_mode);
    Ok(grid)
}

pub fn to_json(grid: &SortingGrid, detail: SaveDetail) -> Result<String> {
    Ok(serde_json::to_string_pretty(&to_document(grid, detail))?)
}

/// parse and validate a snapshot. anything structurally off, an index out of
/// range, a duplicate cell, or a non-physical estimate rejects the file.
pub fn from_json(json: &str) -> Result<SortingGrid> {
    let doc: GridDocument =
        serde_json::from_str(json).map_err(|e| GridError::corrupt(e.to_string()))?;
    from_document(doc)
}

pub fn save_grid(path: &Path, grid: &SortingGrid, detail: SaveDetail) -> Result<()> {
    profiling::scope!("save_grid");
    fs::write(path, to_json(grid, detail)?)?;
    log::info!("saved sorting grid to {}", path.display());
    Ok(())
}

pub fn load_grid(path: &Path) -> Result<SortingGrid> {
    profiling::scope!("load_grid");
    let json = fs::read_to_string(path)?;
    from_json(&json)
}

/// load a snapshot if one matches the live scene, otherwise start fresh.
/// a snapshot trained for different bounds or dimensions is stale and gets
/// replaced rather than reinterpreted.
pub fn load_grid_or(path: &Path, dims: UVec3, bounds: SceneBounds) -> Result<SortingGrid> {
    match load_grid(path) {
        Ok(grid) => {
            if grid.dimensions() != dims || !grid.bounds().approx_eq(&bounds, BOUNDS_TOLERANCE) {
                log::warn!(
                    "{} was trained for another scene or grid size, starting fresh",
                    path.display()
                );
                return SortingGrid::build(dims, bounds);
            }
            log::info!("restored sorting grid from {}", path.display());
            Ok(grid)
        }
        Err(GridError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            log::info!("no saved grid at {}, starting fresh", path.display());
            SortingGrid::build(dims, bounds)
        }
        Err(err) => {
            log::warn!("could not load {}: {err}, starting fresh", path.display());
            SortingGrid::build(dims, bounds)
        }
    }
}
