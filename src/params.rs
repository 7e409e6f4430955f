/// sorting modes, look directions, and the parameter bundle the dispatch
/// side consumes each frame
use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// widest coherence key the dispatch hardware accepts
pub const MAX_COHERENCE_BITS: u32 = 32;

/// discrete ray reordering strategies.
/// the numeric order matters: ties between equally fast modes resolve to the
/// lower id, so the earlier entries act as the conservative defaults.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SortingMode {
    /// dispatch rays in generation order
    NoSorting,
    /// key on the hit-object handle
    HitObject,
    /// key on the quantized ray origin
    Origin,
    /// origin-major origin+direction key
    Reis,
    /// direction-major key
    Costa,
    /// interleaved origin/direction key with the hit-object hint mixed in
    Aila,
    /// two-point key over origin and the real termination point
    TwoPoint,
    /// origin plus estimated endpoint
    EndPointEst,
    /// estimated endpoint only, requantized adaptively
    EndEstAdaptive,
    /// key carried over from the previous frame's dispatch
    InferKey,
}

impl SortingMode {
    pub const COUNT: usize = 10;

    /// every mode, in id order
    pub const ALL: [SortingMode; Self::COUNT] = [
        SortingMode::NoSorting,
        SortingMode::HitObject,
        SortingMode::Origin,
        SortingMode::Reis,
        SortingMode::Costa,
        SortingMode::Aila,
        SortingMode::TwoPoint,
        SortingMode::EndPointEst,
        SortingMode::EndEstAdaptive,
        SortingMode::InferKey,
    ];

    /// stable numeric id (the enumeration order)
    #[inline]
    pub fn id(self) -> usize {
        self as usize
    }

    pub fn from_id(id: usize) -> Option<SortingMode> {
        Self::ALL.get(id).copied()
    }

    /// short display name for logs and reports
    pub fn label(self) -> &'static str {
        match self {
            SortingMode::NoSorting => "no sorting",
            SortingMode::HitObject => "hit object",
            SortingMode::Origin => "ray origin",
            SortingMode::Reis => "origin+direction",
            SortingMode::Costa => "direction+origin",
            SortingMode::Aila => "interleaved",
            SortingMode::TwoPoint => "two point",
            SortingMode::EndPointEst => "endpoint estimate",
            SortingMode::EndEstAdaptive => "adaptive endpoint",
            SortingMode::InferKey => "inferred key",
        }
    }

    /// expand into the concrete bundle the dispatch side consumes.
    /// the table is fixed: every mode maps to a distinct flag combination,
    /// parameterized only by the configured key width.
    pub fn parameters(self, coherence_bits: u32) -> SortingParameters {
        let bits = coherence_bits.min(MAX_COHERENCE_BITS);
        let mut p = SortingParameters::blank(bits);
        match self {
            SortingMode::NoSorting => {
                p.no_sort = true;
                p.num_coherence_bits = 0;
            }
            SortingMode::HitObject => p.hit_object = true,
            SortingMode::Origin => p.ray_origin = true,
            SortingMode::Reis => {
                p.ray_origin = true;
                p.ray_direction = true;
            }
            SortingMode::Costa => p.ray_direction = true,
            SortingMode::Aila => {
                p.hit_object = true;
                p.ray_origin = true;
                p.ray_direction = true;
            }
            SortingMode::TwoPoint => {
                // the real termination point only exists after traversal
                p.sort_after_traversal = true;
                p.ray_origin = true;
                p.real_endpoint = true;
            }
            SortingMode::EndPointEst => {
                p.ray_origin = true;
                p.estimated_endpoint = true;
            }
            SortingMode::EndEstAdaptive => p.estimated_endpoint = true,
            SortingMode::InferKey => {}
        }
        p
    }
}

/// the 6 canonical look directions a cell learns separately
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CubeFace {
    Up,
    Down,
    Left,
    Right,
    Front,
    Back,
}

impl CubeFace {
    pub const COUNT: usize = 6;

    pub const ALL: [CubeFace; Self::COUNT] = [
        CubeFace::Up,
        CubeFace::Down,
        CubeFace::Left,
        CubeFace::Right,
        CubeFace::Front,
        CubeFace::Back,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<CubeFace> {
        Self::ALL.get(index).copied()
    }

    /// canonical training look vector. up and down carry a slight forward
    /// tilt so the view never degenerates against the world up axis.
    pub fn look_direction(self) -> Vec3 {
        match self {
            CubeFace::Up => Vec3::new(0.0, 1.0, 0.1),
            CubeFace::Down => Vec3::new(0.0, -1.0, -0.1),
            CubeFace::Left => Vec3::new(-1.0, 0.0, 0.0),
            CubeFace::Right => Vec3::new(1.0, 0.0, 0.0),
            CubeFace::Front => Vec3::new(0.0, 0.0, 1.0),
            CubeFace::Back => Vec3::new(0.0, 0.0, -1.0),
        }
    }

    /// classify an arbitrary look direction as the canonical face whose
    /// look vector agrees with it most, by largest dot product.
    /// a zero vector lands on Front.
    pub fn nearest(dir: Vec3) -> CubeFace {
        let mut best = CubeFace::Front;
        let mut best_dot = 0.0;
        for face in CubeFace::ALL {
            let dot = dir.dot(face.look_direction());
            if dot > best_dot {
                best = face;
                best_dot = dot;
            }
        }
        best
    }
}

/// the bundle a sorting mode expands into at dispatch time.
/// the flags are interpreted together by the dispatch side; this struct is
/// never mutated in place, every selection builds a fresh value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortingParameters {
    /// coherence key width in bits, 0..=32; 0 disables the key entirely
    pub num_coherence_bits: u32,
    /// sort after acceleration-structure traversal instead of before
    pub sort_after_traversal: bool,
    pub no_sort: bool,
    pub hit_object: bool,
    pub ray_origin: bool,
    pub ray_direction: bool,
    pub estimated_endpoint: bool,
    pub real_endpoint: bool,
    /// set on the final frame of a measurement window so the dispatch side
    /// can close out its counters
    pub is_finished: bool,
}

impl Default for SortingParameters {
    /// the manual baseline: hit-object sorting with a full-width key
    fn default() -> Self {
        Self {
            num_coherence_bits: MAX_COHERENCE_BITS,
            sort_after_traversal: false,
            no_sort: false,
            hit_object: true,
            ray_origin: false,
            ray_direction: false,
            estimated_endpoint: false,
            real_endpoint: false,
            is_finished: false,
        }
    }
}

impl SortingParameters {
    fn blank(num_coherence_bits: u32) -> Self {
        Self {
            num_coherence_bits,
            sort_after_traversal: false,
            no_sort: false,
            hit_object: false,
            ray_origin: false,
            ray_direction: false,
            estimated_endpoint: false,
            real_endpoint: false,
            is_finished: false,
        }
    }

    /// uniformly random bundle for exploratory measurement
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self {
            num_coherence_bits: rng.gen_range(0..=MAX_COHERENCE_BITS),
            sort_after_traversal: rng.gen_bool(0.5),
            no_sort: rng.gen_bool(0.5),
            hit_object: rng.gen_bool(0.5),
            ray_origin: rng.gen_bool(0.5),
            ray_direction: rng.gen_bool(0.5),
            estimated_endpoint: rng.gen_bool(0.5),
            real_endpoint: rng.gen_bool(0.5),
            is_finished: false,
        }
    }

    /// copy with the end-of-measurement marker set
    pub fn finished(mut self) -> Self {
        self.is_finished = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_mode_ids_are_stable() {
        assert_eq!(SortingMode::NoSorting.id(), 0);
        assert_eq!(SortingMode::InferKey.id(), 9);
        for (i, mode) in SortingMode::ALL.iter().enumerate() {
            assert_eq!(mode.id(), i);
            assert_eq!(SortingMode::from_id(i), Some(*mode));
        }
        assert_eq!(SortingMode::from_id(SortingMode::COUNT), None);
    }

    #[test]
    fn test_expansion_is_distinct_per_mode() {
        let bundles: Vec<SortingParameters> = SortingMode::ALL
            .iter()
            .map(|m| m.parameters(MAX_COHERENCE_BITS))
            .collect();
        for i in 0..bundles.len() {
            for j in (i + 1)..bundles.len() {
                assert_ne!(
                    bundles[i], bundles[j],
                    "{:?} and {:?} expand identically",
                    SortingMode::ALL[i], SortingMode::ALL[j]
                );
            }
        }
    }

    #[test]
    fn test_no_sorting_expands_to_no_key() {
        let p = SortingMode::NoSorting.parameters(MAX_COHERENCE_BITS);
        assert!(p.no_sort);
        assert_eq!(p.num_coherence_bits, 0);
        assert!(!p.hit_object && !p.ray_origin && !p.ray_direction);
    }

    #[test]
    fn test_expansion_clamps_key_width() {
        let p = SortingMode::Origin.parameters(64);
        assert_eq!(p.num_coherence_bits, MAX_COHERENCE_BITS);
    }

    #[test]
    fn test_nearest_face_on_axes() {
        assert_eq!(CubeFace::nearest(Vec3::new(0.0, 1.0, 0.0)), CubeFace::Up);
        assert_eq!(CubeFace::nearest(Vec3::new(0.0, -2.0, 0.0)), CubeFace::Down);
        assert_eq!(CubeFace::nearest(Vec3::new(-1.0, 0.0, 0.0)), CubeFace::Left);
        assert_eq!(CubeFace::nearest(Vec3::new(5.0, 0.0, 0.0)), CubeFace::Right);
        assert_eq!(CubeFace::nearest(Vec3::new(0.0, 0.0, 0.5)), CubeFace::Front);
        assert_eq!(CubeFace::nearest(Vec3::new(0.0, 0.0, -0.5)), CubeFace::Back);
    }

    #[test]
    fn test_nearest_face_ignores_small_drift() {
        // mostly forward with a bit of drift still classifies as Front
        assert_eq!(CubeFace::nearest(Vec3::new(0.2, -0.3, 0.9)), CubeFace::Front);
        // the canonical training vectors classify back to their own face
        for face in CubeFace::ALL {
            assert_eq!(CubeFace::nearest(face.look_direction()), face);
        }
    }

    #[test]
    fn test_nearest_face_maximizes_look_agreement() {
        // sweep the pitch arc from Front up to Up; whatever face comes
        // back, no canonical look vector may agree with the direction better
        for deg in 0..=90 {
            let rad = (deg as f32).to_radians();
            let dir = Vec3::new(0.0, rad.sin(), rad.cos());
            let got = CubeFace::nearest(dir);
            let got_dot = dir.dot(got.look_direction());
            for face in CubeFace::ALL {
                assert!(
                    got_dot >= dir.dot(face.look_direction()),
                    "pitch {deg}: {face:?} agrees better than {got:?}"
                );
            }
        }
        // the forward tilt on Up moves the crossover below 45 degrees
        for deg in [42, 43, 44] {
            let rad = (deg as f32).to_radians();
            let dir = Vec3::new(0.0, rad.sin(), rad.cos());
            assert_eq!(CubeFace::nearest(dir), CubeFace::Up, "pitch {deg}");
        }
    }

    #[test]
    fn test_random_parameters_stay_in_range() {
        let mut rng = Pcg32::seed_from_u64(7);
        for _ in 0..100 {
            let p = SortingParameters::random(&mut rng);
            assert!(p.num_coherence_bits <= MAX_COHERENCE_BITS);
            assert!(!p.is_finished);
        }
    }

    #[test]
    fn test_finished_marker() {
        let p = SortingMode::HitObject.parameters(32).finished();
        assert!(p.is_finished);
    }
}
