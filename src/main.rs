use std::collections::VecDeque;
use std::path::Path;

use glam::{UVec3, Vec3};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use sortgrid::persist;
use sortgrid::query::RuntimeQuery;
use sortgrid::settings::SETTINGS_PATH;
use sortgrid::{
    CubeFace, FrameTiming, OptimizerSettings, SceneBounds, SortingMode, SortingParameters,
    Trainer, TrainingMode, DELAY_FRAMES,
};

/// where the trained grid is kept between runs
const GRID_PATH: &str = "sorting_grid.json";

/// simulated presentation interval (60 fps)
const FRAME_MS: f32 = 16.7;

/// synthetic cost landscape standing in for a real gpu
enum CostModel {
    /// one mode wins everywhere, the degenerate baseline
    Uniform { preferred: SortingMode },
    /// the winner depends on which scene octant the camera sits in and which
    /// way it looks, so a trained grid should disagree with itself across
    /// cells, exactly like a real scene does
    Octant { dims: UVec3 },
}

impl CostModel {
    fn preferred(&self, cell: UVec3, face: CubeFace) -> SortingMode {
        match self {
            CostModel::Uniform { preferred } => *preferred,
            CostModel::Octant { dims } => {
                let ox = (cell.x * 2 >= dims.x) as usize;
                let oy = (cell.y * 2 >= dims.y) as usize;
                let oz = (cell.z * 2 >= dims.z) as usize;
                let octant = ox | (oy << 1) | (oz << 2);
                SortingMode::from_id((octant + face.index()) % SortingMode::COUNT)
                    .unwrap_or(SortingMode::NoSorting)
            }
        }
    }

    fn gpu_time(&self, cell: UVec3, face: CubeFace, mode: SortingMode, rng: &mut Pcg32) -> u64 {
        let base = if mode == self.preferred(cell, face) {
            60_000.0
        } else {
            100_000.0 + 2_000.0 * mode.id() as f64
        };
        // +-5% frame-to-frame jitter, the reason the estimates are smoothed
        (base * rng.gen_range(0.95..1.05)) as u64
    }
}

/// stand-in for the renderer: consumes one directive per presented frame and
/// surfaces each frame's timing DELAY_FRAMES presentations later
struct SimulatedDispatch {
    model: CostModel,
    in_flight: VecDeque<(u64, FrameTiming)>,
    rng: Pcg32,
    frame: u64,
}

impl SimulatedDispatch {
    fn new(model: CostModel, seed: u64) -> Self {
        Self {
            model,
            in_flight: VecDeque::new(),
            rng: Pcg32::seed_from_u64(seed),
            frame: 0,
        }
    }

    /// advance one presentation and return the timing that finished crossing
    /// the pipeline, if any
    fn begin_frame(&mut self) -> Option<FrameTiming> {
        self.frame += 1;
        match self.in_flight.front() {
            Some((ready, _)) if *ready <= self.frame => {
                self.in_flight.pop_front().map(|(_, t)| t)
            }
            _ => None,
        }
    }

    /// render with the given measurement directive
    fn submit(&mut self, cell: UVec3, face: CubeFace, mode: SortingMode) {
        let timing = FrameTiming {
            frame: self.frame,
            mode,
            gpu_time: self.model.gpu_time(cell, face, mode, &mut self.rng),
            gpu_threads: 1_000,
            cpu_ms: FRAME_MS,
        };
        self.in_flight.push_back((self.frame + DELAY_FRAMES as u64, timing));
    }
}

fn label_or_dash(mode: Option<SortingMode>) -> &'static str {
    match mode {
        Some(m) => m.label(),
        None => "-",
    }
}

fn main() -> sortgrid::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = OptimizerSettings::load();
    if !Path::new(SETTINGS_PATH).exists() {
        settings.save()?;
        log::info!("wrote default settings to {SETTINGS_PATH}");
    }

    let dims = settings.grid_dims();
    let bounds = SceneBounds::new(Vec3::splat(-10.0), Vec3::splat(10.0));
    let grid = persist::load_grid_or(Path::new(GRID_PATH), dims, bounds)?;
    let mut trainer = Trainer::new(grid, settings.trainer_config());

    let model = match std::env::args().nth(1).as_deref() {
        Some("uniform") => CostModel::Uniform { preferred: SortingMode::Costa },
        _ => CostModel::Octant { dims },
    };
    let mut dispatch = SimulatedDispatch::new(model, 42);

    // run one full measurement sweep against the synthetic gpu
    trainer.begin_training();
    while trainer.mode() == TrainingMode::Training {
        let timing = dispatch.begin_frame();
        if let Some(step) = trainer.tick(FRAME_MS, timing.as_ref()) {
            if !step.draining {
                dispatch.submit(step.cell, step.face, step.mode);
            }
        }
        if let Some(progress) = trainer.progress() {
            if trainer.frame() % 600 == 0 {
                log::info!("sweep {:.0}% done", progress * 100.0);
            }
        }
    }

    // what the sweep measured, mode by mode
    for (mode, row) in trainer.timing_table().rows() {
        if row.samples > 0 {
            log::info!(
                "{:>18}: {:>4} frames, {:>8.0} gpu avg",
                mode.label(),
                row.samples,
                row.gpu_mean()
            );
        }
    }

    // and what it learned, cell by cell
    log::info!("grid-wide best mode: {}", trainer.grid().best_sort_mode().label());
    for (idx, cell) in trainer.grid().cells() {
        let cube = cell.best();
        log::info!(
            "cell ({}, {}, {}): up {} / down {} / left {} / right {} / front {} / back {}",
            idx.x,
            idx.y,
            idx.z,
            label_or_dash(cube.face(CubeFace::Up)),
            label_or_dash(cube.face(CubeFace::Down)),
            label_or_dash(cube.face(CubeFace::Left)),
            label_or_dash(cube.face(CubeFace::Right)),
            label_or_dash(cube.face(CubeFace::Front)),
            label_or_dash(cube.face(CubeFace::Back))
        );
    }

    if settings.show_grid_overlay {
        let overlay = trainer.grid().overlay(true, settings.display_cube_size);
        log::info!(
            "overlay: {} cells, drawn at {:.2}x cell size",
            overlay.dimensions.x * overlay.dimensions.y * overlay.dimensions.z,
            overlay.cube_size
        );
    }

    persist::save_grid(Path::new(GRID_PATH), trainer.grid(), settings.save_detail())?;
    let restored = persist::load_grid(Path::new(GRID_PATH))?;
    log::info!(
        "snapshot round trip: saved {}, loaded {}",
        trainer.grid().best_sort_mode().label(),
        restored.best_sort_mode().label()
    );

    // drive a few inference queries the way a host renderer would
    trainer.begin_inference();
    let manual = SortingParameters::default();
    let probes = [
        (Vec3::new(-5.0, -5.0, -5.0), Vec3::Z),
        (Vec3::new(5.0, 5.0, 5.0), Vec3::new(0.0, -1.0, 0.0)),
        (Vec3::new(9.0, -9.0, 0.0), Vec3::X),
    ];
    for (position, look) in probes {
        let (cell, face, mode) =
            RuntimeQuery::new(trainer.grid(), settings.num_coherence_bits).infer(position, look);
        let params = trainer.select_parameters(&manual, false, position, look);
        log::info!(
            "camera {:?} facing {:?}: cell ({}, {}, {}) -> {} ({} key bits)",
            position,
            face,
            cell.x,
            cell.y,
            cell.z,
            mode.label(),
            params.num_coherence_bits
        );
    }

    Ok(())
}
