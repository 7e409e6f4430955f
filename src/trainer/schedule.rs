/// sweep scheduling: which (cell, face, mode) the trainer measures next
use crate::params::{CubeFace, SortingMode};

/// time and frame budgets for a training sweep
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScheduleConfig {
    /// measurement budget per cube side, in ms of accumulated frame time
    pub time_per_cube_side_ms: f32,
    /// upper bound on the whole sweep; when it runs out the sweep completes
    /// early with whatever has been measured so far
    pub time_per_cycle_ms: f32,
    /// consecutive frames measured per mode before rotating to the next
    pub frames_per_mode: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            time_per_cube_side_ms: 1000.0, // one second per face
            time_per_cycle_ms: 480_000.0,  // eight minutes for the whole sweep
            frames_per_mode: 3,
        }
    }
}

/// what a schedule advance did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScheduleStep {
    /// still inside the current side's budget
    Measuring,
    /// side budget ran out, cursor moved to the next face of the same cell
    FaceAdvanced,
    /// last face wrapped, cursor moved to the next cell
    CellAdvanced { finished_cell: usize },
    /// every cell visited, or the cycle budget ran out
    Completed,
}

/// cursor over one training sweep.
/// cells go in linear order, faces in `CubeFace::ALL` order, and within a
/// side the modes rotate round-robin in `frames_per_mode` windows until the
/// side budget is spent. the cursor only moves forward, and it runs on the
/// schedule it was constructed with: config edits made while a sweep is
/// live only reach the next sweep.
#[derive(Clone, Debug)]
pub struct TrainingSession {
    cfg: ScheduleConfig,
    cell: usize,
    cell_count: usize,
    face_slot: usize,
    mode_slot: usize,
    frames_in_window: u32,
    side_ms_left: f32,
    cycle_ms_left: f32,
    passes_this_side: u32,
    frame: u64,
}

impl TrainingSession {
    pub fn new(cell_count: usize, cfg: &ScheduleConfig) -> Self {
        Self {
            cfg: *cfg,
            cell: 0,
            cell_count,
            face_slot: 0,
            mode_slot: 0,
            frames_in_window: 0,
            side_ms_left: cfg.time_per_cube_side_ms,
            cycle_ms_left: cfg.time_per_cycle_ms,
            passes_this_side: 0,
            frame: 0,
        }
    }

    #[inline]
    pub fn cell(&self) -> usize {
        self.cell
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.cell_count
    }

    #[inline]
    pub fn face(&self) -> CubeFace {
        CubeFace::ALL[self.face_slot]
    }

    #[inline]
    pub fn mode(&self) -> SortingMode {
        SortingMode::ALL[self.mode_slot]
    }

    /// frames scheduled since the sweep started
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// complete mode rotations finished on the current side
    #[inline]
    pub fn passes_this_side(&self) -> u32 {
        self.passes_this_side
    }

    /// true when the frame about to be scheduled is the last of its window
    pub fn window_closing(&self) -> bool {
        self.frames_in_window + 1 >= self.cfg.frames_per_mode.max(1)
    }

    /// fraction of the sweep already behind the cursor, counted in sides
    pub fn progress(&self) -> f32 {
        let total = (self.cell_count * CubeFace::COUNT) as f32;
        if total <= 0.0 {
            return 1.0;
        }
        let done = (self.cell * CubeFace::COUNT + self.face_slot) as f32;
        (done / total).min(1.0)
    }

    /// account for the frame just scheduled and move the cursor.
    /// budget order matters: the cycle cap is checked before the side
    /// budget so a sweep never outlives it.
    pub fn advance(&mut self, frame_ms: f32) -> ScheduleStep {
        self.frame += 1;
        self.cycle_ms_left -= frame_ms;
        self.side_ms_left -= frame_ms;
        if self.cycle_ms_left <= 0.0 {
            return ScheduleStep::Completed;
        }
        if self.side_ms_left <= 0.0 {
            return self.advance_face();
        }
        self.frames_in_window += 1;
        if self.frames_in_window >= self.cfg.frames_per_mode.max(1) {
            self.frames_in_window = 0;
            self.mode_slot += 1;
            if self.mode_slot >= SortingMode::COUNT {
                self.mode_slot = 0;
                self.passes_this_side = self.passes_this_side.saturating_add(1);
            }
        }
        ScheduleStep::Measuring
    }

    fn advance_face(&mut self) -> ScheduleStep {
        self.side_ms_left = self.cfg.time_per_cube_side_ms;
        self.mode_slot = 0;
        self.frames_in_window = 0;
        self.passes_this_side = 0;
        self.face_slot += 1;
        if self.face_slot < CubeFace::COUNT {
            return ScheduleStep::FaceAdvanced;
        }
        self.face_slot = 0;
        let finished = self.cell;
        self.cell += 1;
        if self.cell < self.cell_count {
            ScheduleStep::CellAdvanced { finished_cell: finished }
        } else {
            ScheduleStep::Completed
        }
    }
}
