//! online spatial optimizer for ray-dispatch sorting modes.
//!
//! the scene is partitioned into a coarse grid; each cell learns, per view
//! direction, which ray sorting mode renders fastest there. measurements
//! come from noisy per-frame gpu timings that surface a few frames after
//! the configuration that produced them, so the controller carries a small
//! attribution queue. once trained, the grid answers per-frame queries with
//! the learned winner for the camera's cell and look direction.

pub mod error;
pub mod grid;
pub mod params;
pub mod persist;
pub mod query;
pub mod selection;
pub mod settings;
pub mod timing;
pub mod trainer;

pub use error::{GridError, Result};
pub use grid::{CellState, GridCube, GridOverlay, LearningConfig, SceneBounds, SortingGrid};
pub use params::{CubeFace, SortingMode, SortingParameters, MAX_COHERENCE_BITS};
pub use persist::SaveDetail;
pub use query::RuntimeQuery;
pub use settings::OptimizerSettings;
pub use timing::{FrameTiming, ModeTimingTable};
pub use trainer::{Trainer, TrainerConfig, TrainingMode, TrainingStep, DELAY_FRAMES};
