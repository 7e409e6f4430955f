/// the training controller: sweeps the grid cell by cell, pairs delayed
/// timing read-backs with the selections that produced them, and keeps the
/// learned tables current
pub mod attribution;
pub mod schedule;

use glam::{UVec3, Vec3};

use crate::error::{GridError, Result};
use crate::grid::cell::LearningConfig;
use crate::grid::SortingGrid;
use crate::params::{CubeFace, SortingMode, SortingParameters, MAX_COHERENCE_BITS};
use crate::query::RuntimeQuery;
use crate::selection::{best_face_mode, determine_best_times_cube, global_best_mode};
use crate::timing::{FrameTiming, ModeTimingTable};

use attribution::{DelayQueue, PendingSample};
use schedule::{ScheduleConfig, ScheduleStep, TrainingSession};

/// frames between selecting a configuration and its timing surfacing in the
/// read-back; the depth of the attribution queue
pub const DELAY_FRAMES: usize = 4;

/// retained inference selections before the log stops growing
const INFERENCE_LOG_CAP: usize = 1 << 16;

/// what drives parameter selection right now
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrainingMode {
    /// manual parameters pass through untouched
    Idle,
    /// sweeping the grid and measuring
    Training,
    /// answering from the learned per-cell tables
    Inferring,
    /// the single grid-wide best mode everywhere
    UsingBestFixed,
}

/// one frame's training directive: where to put the camera, where to look,
/// and which parameters to measure
#[derive(Clone, Copy, Debug)]
pub struct TrainingStep {
    pub params: SortingParameters,
    pub camera_position: Vec3,
    pub look_direction: Vec3,
    pub cell: UVec3,
    pub face: CubeFace,
    pub mode: SortingMode,
    /// true once the sweep cursor is done and only in-flight timings remain;
    /// the pose holds steady while the pipeline flushes
    pub draining: bool,
}

/// everything the controller needs to know besides the grid itself
#[derive(Clone, Copy, Debug)]
pub struct TrainerConfig {
    pub schedule: ScheduleConfig,
    pub learning: LearningConfig,
    /// key width handed to every expanded parameter bundle
    pub num_coherence_bits: u32,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            schedule: ScheduleConfig::default(),
            learning: LearningConfig::default(),
            num_coherence_bits: MAX_COHERENCE_BITS,
        }
    }
}

/// one inferred selection, kept for offline inspection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InferenceRecord {
    /// controller frame counter at selection time
    pub frame: u64,
    pub cell: UVec3,
    pub face: CubeFace,
    pub mode: SortingMode,
}

/// internal sweep state; Idle here always coincides with a non-Training mode
enum Phase {
    Idle,
    Sweep(TrainingSession),
    Drain { ticks_left: u32, hold: TrainingStep },
}

pub struct Trainer {
    grid: SortingGrid,
    config: TrainerConfig,
    mode: TrainingMode,
    phase: Phase,
    pending: DelayQueue,
    timing_table: ModeTimingTable,
    inference_log: Vec<InferenceRecord>,
    samples_applied: u64,
    frame: u64,
}

impl Trainer {
    pub fn new(grid: SortingGrid, config: TrainerConfig) -> Self {
        Self {
            grid,
            config,
            mode: TrainingMode::Idle,
            phase: Phase::Idle,
            pending: DelayQueue::new(DELAY_FRAMES),
            timing_table: ModeTimingTable::new(),
            inference_log: Vec::new(),
            samples_applied: 0,
            frame: 0,
        }
    }

    #[inline]
    pub fn grid(&self) -> &SortingGrid {
        &self.grid
    }

    #[inline]
    pub fn mode(&self) -> TrainingMode {
        self.mode
    }

    #[inline]
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// timings paired with their selection so far this sweep
    #[inline]
    pub fn samples_applied(&self) -> u64 {
        self.samples_applied
    }

    /// selections still waiting for their timing to surface
    #[inline]
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn timing_table(&self) -> &ModeTimingTable {
        &self.timing_table
    }

    #[inline]
    pub fn inference_log(&self) -> &[InferenceRecord] {
        &self.inference_log
    }

    pub fn clear_inference_log(&mut self) {
        self.inference_log.clear();
    }

    /// sweep completion in [0,1] while training, None otherwise
    pub fn progress(&self) -> Option<f32> {
        match &self.phase {
            Phase::Idle => None,
            Phase::Sweep(session) => Some(session.progress()),
            Phase::Drain { .. } => Some(1.0),
        }
    }

    /// replace the knob bundle. an active sweep keeps the schedule it
    /// started with (budgets and window length); learning and key-width
    /// changes apply immediately
    pub fn update_config(&mut self, config: TrainerConfig) {
        self.config = config;
    }

    /// start (or restart) a measurement sweep over every cell and face.
    /// accumulated estimates are kept and keep refining; use [`Trainer::reset`]
    /// to wipe them first.
    pub fn begin_training(&mut self) {
        self.pending.clear();
        self.samples_applied = 0;
        let session = TrainingSession::new(self.grid.cell_count(), &self.config.schedule);
        log::info!(
            "training sweep started: {} cells, {} sides",
            session.cell_count(),
            session.cell_count() * CubeFace::COUNT
        );
        self.phase = Phase::Sweep(session);
        self.mode = TrainingMode::Training;
    }

    /// cancel whatever mode is active. a cancelled sweep keeps everything it
    /// measured; the best tables are rebuilt from the partial stats.
    pub fn stop(&mut self) {
        if self.mode == TrainingMode::Training {
            self.pending.clear();
            self.recompute_best_tables();
            log::info!("training stopped early, {} samples kept", self.samples_applied);
        }
        self.phase = Phase::Idle;
        self.mode = TrainingMode::Idle;
    }

    /// answer per-frame queries from the learned per-cell tables
    pub fn begin_inference(&mut self) {
        self.stop_if_training();
        self.mode = TrainingMode::Inferring;
        self.inference_log.clear();
        log::info!("inference enabled");
    }

    /// apply the grid-wide best mode everywhere
    pub fn use_best_fixed(&mut self) {
        self.stop_if_training();
        self.mode = TrainingMode::UsingBestFixed;
        log::info!(
            "fixed best mode enabled: {}",
            self.grid.best_sort_mode().label()
        );
    }

    fn stop_if_training(&mut self) {
        if self.mode == TrainingMode::Training {
            self.stop();
        }
    }

    /// rebuild the grid with new dimensions, dropping everything learned
    pub fn resize_grid(&mut self, dims: UVec3) -> Result<()> {
        if self.mode == TrainingMode::Training {
            return Err(GridError::TrainingActive);
        }
        self.grid.resize(dims)?;
        self.inference_log.clear();
        log::info!("grid resized to {}x{}x{}", dims.x, dims.y, dims.z);
        Ok(())
    }

    /// swap in a grid restored from disk
    pub fn install_grid(&mut self, grid: SortingGrid) -> Result<()> {
        if self.mode == TrainingMode::Training {
            return Err(GridError::TrainingActive);
        }
        self.grid = grid;
        self.inference_log.clear();
        Ok(())
    }

    /// wipe every learned estimate, cube, and log
    pub fn reset(&mut self) -> Result<()> {
        if self.mode == TrainingMode::Training {
            return Err(GridError::TrainingActive);
        }
        self.grid.clear();
        self.samples_applied = 0;
        self.inference_log.clear();
        self.timing_table.clear();
        Ok(())
    }

    /// advance one frame of training. `frame_ms` is the host frame time
    /// charged against the schedule budgets; `timing` is the read-back that
    /// surfaced this frame, if any. returns the directive for the next
    /// dispatch while a sweep or its drain is active.
    ///
    /// call exactly one of [`Trainer::tick`] or [`Trainer::observe`] per
    /// presented frame.
    pub fn tick(&mut self, frame_ms: f32, timing: Option<&FrameTiming>) -> Option<TrainingStep> {
        profiling::scope!("trainer_tick");
        self.frame += 1;
        if let Some(t) = timing {
            self.timing_table.record(t);
        }
        let phase = std::mem::replace(&mut self.phase, Phase::Idle);
        match phase {
            Phase::Idle => None,
            Phase::Sweep(session) => Some(self.sweep_tick(session, frame_ms, timing)),
            Phase::Drain { ticks_left, hold } => self.drain_tick(ticks_left, hold, timing),
        }
    }

    /// feed a frame's timing read-back outside of training so the per-mode
    /// table stays fresh; equivalent to [`Trainer::tick`] for frames that
    /// need no training directive
    pub fn observe(&mut self, timing: &FrameTiming) {
        self.frame += 1;
        self.timing_table.record(timing);
    }

    /// per-frame parameter choice for the dispatch side. the manual override
    /// wins over everything; during a sweep the directive comes from
    /// [`Trainer::tick`], so ordinary queries keep the manual bundle.
    pub fn select_parameters(
        &mut self,
        manual: &SortingParameters,
        manual_override: bool,
        camera_position: Vec3,
        look_direction: Vec3,
    ) -> SortingParameters {
        let query = RuntimeQuery::new(&self.grid, self.config.num_coherence_bits);
        if self.mode == TrainingMode::Inferring && !manual_override {
            let (cell, face, mode) = query.infer(camera_position, look_direction);
            if self.inference_log.len() < INFERENCE_LOG_CAP {
                self.inference_log.push(InferenceRecord {
                    frame: self.frame,
                    cell,
                    face,
                    mode,
                });
            }
        }
        query.select(self.mode, manual, manual_override, camera_position, look_direction)
    }

    fn sweep_tick(
        &mut self,
        mut session: TrainingSession,
        frame_ms: f32,
        timing: Option<&FrameTiming>,
    ) -> TrainingStep {
        // capture the selection before the cursor moves
        let cell_linear = session.cell();
        let face = session.face();
        let mode = session.mode();
        let closing = session.window_closing();

        // the timing that surfaced this frame belongs to the selection made
        // DELAY_FRAMES ticks ago, not to the one being scheduled now
        let matured = self.pending.push(PendingSample {
            cell: cell_linear,
            face,
            mode,
            frame: self.frame,
        });
        match (matured, timing) {
            (Some(sample), Some(t)) => self.apply_sample(&sample, t),
            (Some(sample), None) => {
                log::debug!("no read-back surfaced for frame {}", sample.frame)
            }
            _ => {}
        }

        let cell_idx = self.grid.index_from_linear(cell_linear);
        let mut params = mode.parameters(self.config.num_coherence_bits);
        if closing {
            params = params.finished();
        }
        let step = TrainingStep {
            params,
            camera_position: self.grid.cell_center(cell_idx),
            look_direction: face.look_direction(),
            cell: cell_idx,
            face,
            mode,
            draining: false,
        };

        match session.advance(frame_ms) {
            ScheduleStep::Measuring | ScheduleStep::FaceAdvanced => {
                self.phase = Phase::Sweep(session);
            }
            ScheduleStep::CellAdvanced { finished_cell } => {
                // keep the headline mode fresh as cells finish
                self.grid.set_best_sort_mode(global_best_mode(&self.grid));
                log::debug!("cell {} swept", finished_cell);
                self.phase = Phase::Sweep(session);
            }
            ScheduleStep::Completed => {
                log::debug!(
                    "sweep cursor done after {} frames, draining {} in-flight samples",
                    session.frame(),
                    self.pending.len()
                );
                self.phase = Phase::Drain {
                    ticks_left: (2 * DELAY_FRAMES) as u32,
                    hold: TrainingStep { draining: true, ..step },
                };
            }
        }
        step
    }

    fn drain_tick(
        &mut self,
        ticks_left: u32,
        hold: TrainingStep,
        timing: Option<&FrameTiming>,
    ) -> Option<TrainingStep> {
        if let Some(sample) = self.pending.pop_oldest() {
            match timing {
                Some(t) => self.apply_sample(&sample, t),
                None => log::debug!("no read-back surfaced for in-flight frame {}", sample.frame),
            }
        }
        if self.pending.is_empty() || ticks_left <= 1 {
            if !self.pending.is_empty() {
                log::warn!(
                    "dropping {} in-flight samples that never surfaced",
                    self.pending.len()
                );
                self.pending.clear();
            }
            self.finalize();
            return None;
        }
        self.phase = Phase::Drain { ticks_left: ticks_left - 1, hold };
        Some(hold)
    }

    /// fold one matured timing into the cell it was measured for
    fn apply_sample(&mut self, sample: &PendingSample, timing: &FrameTiming) {
        let t = match timing.checked_gpu_average() {
            Ok(t) => t,
            Err(err) => {
                log::debug!("skipping sample for frame {}: {}", sample.frame, err);
                return;
            }
        };
        if timing.mode != sample.mode {
            // attribution trusts the queue; the read-back field is a cross-check
            log::debug!(
                "read-back says {:?} but frame {} ran {:?}",
                timing.mode,
                sample.frame,
                sample.mode
            );
        }
        let learning = self.config.learning;
        let cell = self.grid.cell_linear_mut(sample.cell);
        cell.record_sample(sample.face, sample.mode, t, &learning);
        if cell.face_trained(sample.face) {
            let best = best_face_mode(cell, sample.face);
            cell.best_mut().set_face(sample.face, best);
        }
        self.samples_applied += 1;
    }

    fn finalize(&mut self) {
        self.recompute_best_tables();
        let trained = self.grid.cells().filter(|(_, c)| c.is_trained()).count();
        log::info!(
            "training finished: {}/{} cells fully trained, {} samples, best mode {}",
            trained,
            self.grid.cell_count(),
            self.samples_applied,
            self.grid.best_sort_mode().label()
        );
        self.phase = Phase::Idle;
        self.mode = TrainingMode::Idle;
    }

    /// recompute every per-cell cube and the grid-wide headline mode from the
    /// accumulated stats
    pub fn recompute_best_tables(&mut self) {
        profiling::scope!("recompute_best_tables");
        for linear in 0..self.grid.cell_count() {
            let cell = self.grid.cell_linear_mut(linear);
            let cube = determine_best_times_cube(cell);
            cell.set_best(cube);
        }
        self.grid.set_best_sort_mode(global_best_mode(&self.grid));
    }
}
