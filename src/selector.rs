//! Landmark set → control coordinate policies.

use crate::error::SynthError;
use crate::types::{is_absent, ControlPoint, LandmarkSet};
use rand::Rng;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateSelector {
    /// Follow the tracker's hand center.
    Center,
    /// Follow one landmark drawn uniformly at random on every update.
    Random,
}

impl CoordinateSelector {
    pub fn name(&self) -> &'static str {
        match self {
            CoordinateSelector::Center => "center",
            CoordinateSelector::Random => "random",
        }
    }

    pub fn select(
        &self,
        landmarks: &LandmarkSet,
        center: f32,
        frame_height: f32,
    ) -> Option<ControlPoint> {
        self.select_with(&mut rand::rng(), landmarks, center, frame_height)
    }

    /// Same as [`select`](Self::select) with an explicit random source.
    ///
    /// The random policy answers `(0, 0)` when it lands on an absent
    /// landmark, so it never reports "no hand" and a missing hand sounds
    /// like a hand at the top of the frame. The center policy reports
    /// absence as `None`.
    pub fn select_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        landmarks: &LandmarkSet,
        center: f32,
        frame_height: f32,
    ) -> Option<ControlPoint> {
        match self {
            CoordinateSelector::Center => {
                if is_absent(center, frame_height) {
                    None
                } else {
                    Some(ControlPoint::vertical(center))
                }
            }
            CoordinateSelector::Random => {
                if landmarks.is_empty() {
                    return None;
                }
                let index = rng.random_range(0..landmarks.len());
                match landmarks.get(index) {
                    Some(y) if !is_absent(y, frame_height) => Some(ControlPoint::vertical(y)),
                    _ => Some(ControlPoint::ORIGIN),
                }
            }
        }
    }
}

impl FromStr for CoordinateSelector {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "center" => Ok(CoordinateSelector::Center),
            "random" => Ok(CoordinateSelector::Random),
            other => Err(SynthError::Config(format!(
                "unknown hand mapping strategy: {other}"
            ))),
        }
    }
}

impl fmt::Display for CoordinateSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const H: f32 = 480.0;

    #[test]
    fn test_center_returns_center() {
        let set = LandmarkSet::new(vec![10.0, 20.0, 30.0]);
        let p = CoordinateSelector::Center.select(&set, 123.0, H).unwrap();
        assert_eq!(p, ControlPoint { x: 0.0, y: 123.0 });
    }

    #[test]
    fn test_center_absent_is_none() {
        let set = LandmarkSet::absent(21, H);
        assert_eq!(CoordinateSelector::Center.select(&set, -H, H), None);
    }

    #[test]
    fn test_random_sentinel_gives_origin() {
        let set = LandmarkSet::absent(21, H);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let p = CoordinateSelector::Random
                .select_with(&mut rng, &set, -H, H)
                .unwrap();
            assert_eq!(p, ControlPoint { x: 0.0, y: 0.0 });
        }
    }

    #[test]
    fn test_random_picks_from_set() {
        let set = LandmarkSet::new(vec![50.0, 60.0, 70.0]);
        for _ in 0..100 {
            let p = CoordinateSelector::Random.select(&set, 0.0, H).unwrap();
            assert!([50.0, 60.0, 70.0].contains(&p.y), "y={}", p.y);
        }
    }

    #[test]
    fn test_random_is_roughly_uniform() {
        const K: usize = 21;
        const DRAWS: usize = 42_000;
        let set = LandmarkSet::new((0..K).map(|i| (i + 1) as f32 * 10.0).collect());
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut counts = [0usize; K];
        for _ in 0..DRAWS {
            let p = CoordinateSelector::Random
                .select_with(&mut rng, &set, 0.0, H)
                .unwrap();
            let idx = (p.y / 10.0).round() as usize - 1;
            counts[idx] += 1;
        }
        let expected = DRAWS as f64 / K as f64;
        for (i, &c) in counts.iter().enumerate() {
            let dev = (c as f64 - expected).abs() / expected;
            assert!(dev < 0.1, "index {} drawn {} times, expected ~{:.0}", i, c, expected);
        }
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("center".parse::<CoordinateSelector>().unwrap(), CoordinateSelector::Center);
        assert_eq!("random".parse::<CoordinateSelector>().unwrap(), CoordinateSelector::Random);
        assert!(matches!(
            "wrist".parse::<CoordinateSelector>(),
            Err(SynthError::Config(_))
        ));
    }
}
