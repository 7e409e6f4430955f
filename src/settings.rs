/// optimizer settings, adjustable at runtime and persisted between runs
use glam::UVec3;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::grid::{LearningConfig, MAX_GRID_SIZE};
use crate::params::MAX_COHERENCE_BITS;
use crate::persist::SaveDetail;
use crate::trainer::schedule::ScheduleConfig;
use crate::trainer::TrainerConfig;

/// where the settings live between runs
pub const SETTINGS_PATH: &str = "optimizer_settings.json";

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSettings {
    // grid layout
    /// cells along each axis (1-10 per axis; more cells = finer spatial
    /// resolution but a longer sweep)
    pub grid_size_x: u32,
    pub grid_size_y: u32,
    pub grid_size_z: u32,

    // sweep budgets
    /// measurement time per cube side in ms (the sweep parks the camera this
    /// long per direction)
    pub time_per_cube_side_ms: f32,
    /// hard cap on a whole sweep in ms; the sweep completes early with
    /// partial results when it runs out
    pub time_per_cycle_ms: f32,
    /// consecutive frames per mode before rotating to the next (higher =
    /// steadier timings, slower rotation)
    pub frames_per_mode: u32,

    // learning rates
    /// true = fixed blend rate, false = per-cell decaying rate
    pub use_constant_learning: bool,
    /// fixed blend rate for new samples (0.0-1.0; 0.2 = 20% new, 80% old)
    pub constant_learning_speed: f64,
    /// multiplier applied to a cell's rate per accepted sample (e.g. 0.97)
    pub adaptive_decay: f64,
    /// lowest the decaying rate may fall (e.g. 0.05), so cells never stop
    /// adapting entirely
    pub adaptive_floor: f64,

    // dispatch key
    /// coherence key width in bits (0-32)
    pub num_coherence_bits: u32,

    // persistence
    /// true = snapshots carry every raw estimate so training can resume,
    /// false = winners only
    pub save_all_results: bool,

    // overlay
    pub show_grid_overlay: bool,
    /// drawn cell size as a fraction of the real cell (0.1-2.0)
    pub display_cube_size: f32,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            // grid defaults
            grid_size_x: 2,
            grid_size_y: 2,
            grid_size_z: 2,

            // sweep defaults
            time_per_cube_side_ms: 1000.0, // one second per face
            time_per_cycle_ms: 480_000.0,  // eight minutes for the whole sweep
            frames_per_mode: 3,

            // learning defaults
            use_constant_learning: true,
            constant_learning_speed: 0.2,
            adaptive_decay: 0.97,
            adaptive_floor: 0.05,

            // dispatch key
            num_coherence_bits: MAX_COHERENCE_BITS,

            // persistence
            save_all_results: false,

            // overlay
            show_grid_overlay: false,
            display_cube_size: 1.0,
        }
    }
}

impl OptimizerSettings {
    /// clamp every knob into its working range; hand-edited files and stale
    /// versions come through here before anything reads them
    pub fn sanitize(&mut self) {
        self.grid_size_x = self.grid_size_x.clamp(1, MAX_GRID_SIZE);
        self.grid_size_y = self.grid_size_y.clamp(1, MAX_GRID_SIZE);
        self.grid_size_z = self.grid_size_z.clamp(1, MAX_GRID_SIZE);
        self.time_per_cube_side_ms = self.time_per_cube_side_ms.max(1.0);
        self.time_per_cycle_ms = self.time_per_cycle_ms.max(1.0);
        self.frames_per_mode = self.frames_per_mode.max(1);
        self.constant_learning_speed = self.constant_learning_speed.clamp(0.0, 1.0);
        self.adaptive_decay = self.adaptive_decay.clamp(0.0, 1.0);
        self.adaptive_floor = self.adaptive_floor.clamp(0.0, 1.0);
        self.num_coherence_bits = self.num_coherence_bits.min(MAX_COHERENCE_BITS);
        self.display_cube_size = self.display_cube_size.clamp(0.1, 2.0);
    }

    #[inline]
    pub fn grid_dims(&self) -> UVec3 {
        UVec3::new(self.grid_size_x, self.grid_size_y, self.grid_size_z)
    }

    pub fn learning(&self) -> LearningConfig {
        LearningConfig {
            use_constant: self.use_constant_learning,
            constant_rate: self.constant_learning_speed,
            adaptive_decay: self.adaptive_decay,
            adaptive_floor: self.adaptive_floor,
        }
    }

    pub fn schedule(&self) -> ScheduleConfig {
        ScheduleConfig {
            time_per_cube_side_ms: self.time_per_cube_side_ms,
            time_per_cycle_ms: self.time_per_cycle_ms,
            frames_per_mode: self.frames_per_mode,
        }
    }

    /// everything the training controller needs, in one bundle
    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig {
            schedule: self.schedule(),
            learning: self.learning(),
            num_coherence_bits: self.num_coherence_bits,
        }
    }

    #[inline]
    pub fn save_detail(&self) -> SaveDetail {
        if self.save_all_results {
            SaveDetail::AllResults
        } else {
            SaveDetail::BestOnly
        }
    }

    /// save settings to the json file next to the binary
    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(SETTINGS_PATH, json)?;
        Ok(())
    }

    /// load settings from the json file, or return defaults if it is missing
    /// or unreadable
    pub fn load() -> Self {
        match std::fs::read_to_string(SETTINGS_PATH) {
            Ok(json) => match serde_json::from_str::<Self>(&json) {
                Ok(mut settings) => {
                    settings.sanitize();
                    settings
                }
                Err(e) => {
                    log::warn!("failed to parse {SETTINGS_PATH}: {e}, using defaults");
                    Self::default()
                }
            },
            // file doesn't exist or can't be read
            Err(_) => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_already_sane() {
        let mut s = OptimizerSettings::default();
        let before = s;
        s.sanitize();
        assert_eq!(s, before);
    }

    #[test]
    fn test_sanitize_clamps_every_knob() {
        let mut s = OptimizerSettings {
            grid_size_x: 0,
            grid_size_y: 99,
            grid_size_z: 3,
            time_per_cube_side_ms: -5.0,
            time_per_cycle_ms: 0.0,
            frames_per_mode: 0,
            use_constant_learning: true,
            constant_learning_speed: 1.7,
            adaptive_decay: -0.2,
            adaptive_floor: 2.0,
            num_coherence_bits: 64,
            save_all_results: true,
            show_grid_overlay: false,
            display_cube_size: 0.0,
        };
        s.sanitize();
        assert_eq!(s.grid_dims(), UVec3::new(1, 10, 3));
        assert_eq!(s.time_per_cube_side_ms, 1.0);
        assert_eq!(s.time_per_cycle_ms, 1.0);
        assert_eq!(s.frames_per_mode, 1);
        assert_eq!(s.constant_learning_speed, 1.0);
        assert_eq!(s.adaptive_decay, 0.0);
        assert_eq!(s.adaptive_floor, 1.0);
        assert_eq!(s.num_coherence_bits, MAX_COHERENCE_BITS);
        assert_eq!(s.display_cube_size, 0.1);
    }

    #[test]
    fn test_zero_learning_speed_survives_sanitize() {
        // a frozen rate is a legitimate setting, not an error
        let mut s = OptimizerSettings { constant_learning_speed: 0.0, ..Default::default() };
        s.sanitize();
        assert_eq!(s.constant_learning_speed, 0.0);
    }

    #[test]
    fn test_projections_carry_the_knobs_over() {
        let s = OptimizerSettings { frames_per_mode: 7, num_coherence_bits: 12, ..Default::default() };
        let cfg = s.trainer_config();
        assert_eq!(cfg.schedule.frames_per_mode, 7);
        assert_eq!(cfg.num_coherence_bits, 12);
        assert_eq!(cfg.learning.constant_rate, s.constant_learning_speed);
        assert_eq!(s.save_detail(), SaveDetail::BestOnly);
    }
}
