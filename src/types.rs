use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

// ─── Landmarks ──────────────────────────────────────────────────────────────

/// Vertical pixel positions of every tracked hand point, in tracker order.
///
/// The set is always replaced as a whole; its length never changes for the
/// lifetime of a session. "No hand" is encoded by filling every entry with
/// the sentinel `-frame_height` rather than by an empty set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSet {
    positions: Vec<f32>,
}

impl LandmarkSet {
    pub fn new(positions: Vec<f32>) -> Self {
        Self { positions }
    }

    /// A set with every landmark marked absent.
    pub fn absent(count: usize, frame_height: f32) -> Self {
        Self {
            positions: vec![sentinel(frame_height); count],
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f32> {
        self.positions.get(index).copied()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.positions
    }

    /// Copy of the set with every non-finite entry replaced by the sentinel.
    pub fn sanitized(self, frame_height: f32) -> Self {
        let positions = self
            .positions
            .into_iter()
            .map(|y| if y.is_finite() { y } else { sentinel(frame_height) })
            .collect();
        Self { positions }
    }

    /// True if at least one landmark holds a real coordinate.
    pub fn has_hand(&self, frame_height: f32) -> bool {
        self.positions.iter().any(|&y| !is_absent(y, frame_height))
    }

    /// Mean of the present landmarks. Stands in for the tracker's hand
    /// center when a recording does not carry one.
    pub fn centroid(&self, frame_height: f32) -> Option<f32> {
        let (sum, n) = self
            .positions
            .iter()
            .filter(|&&y| !is_absent(y, frame_height))
            .fold((0.0f32, 0usize), |(s, n), &y| (s + y, n + 1));
        if n == 0 {
            None
        } else {
            Some(sum / n as f32)
        }
    }
}

/// The reserved "no data" value for a frame of the given height.
pub fn sentinel(frame_height: f32) -> f32 {
    -frame_height
}

pub fn is_absent(value: f32, frame_height: f32) -> bool {
    value <= sentinel(frame_height)
}

// ─── Control coordinate ─────────────────────────────────────────────────────

/// Coordinate pair chosen by a selector. Only the vertical axis is tracked,
/// so `x` stays at 0.0; it is carried for a future horizontal mapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    pub x: f32,
    pub y: f32,
}

impl ControlPoint {
    pub const ORIGIN: ControlPoint = ControlPoint { x: 0.0, y: 0.0 };

    pub fn vertical(y: f32) -> Self {
        Self { x: 0.0, y }
    }
}

impl fmt::Display for ControlPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

// ─── Frequency range ────────────────────────────────────────────────────────

/// Numeric bounds shared by every mapping policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyRange {
    pub min_hz: f32,
    pub max_hz: f32,
    /// Capture frame height in pixels; the coordinate domain is `[0, frame_height]`.
    pub frame_height: f32,
}

// ─── Session clock ──────────────────────────────────────────────────────────

/// Monotonic clock for the capture session.
#[derive(Clone)]
pub struct SessionClock {
    start: Instant,
}

impl SessionClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_set_has_no_hand() {
        let set = LandmarkSet::absent(21, 480.0);
        assert_eq!(set.len(), 21);
        assert!(set.as_slice().iter().all(|&y| y == -480.0));
        assert!(!set.has_hand(480.0));
        assert_eq!(set.centroid(480.0), None);
    }

    #[test]
    fn test_centroid_ignores_sentinels() {
        let set = LandmarkSet::new(vec![100.0, -480.0, 200.0]);
        assert!(set.has_hand(480.0));
        assert_eq!(set.centroid(480.0), Some(150.0));
    }

    #[test]
    fn test_zero_is_a_real_coordinate() {
        assert!(!is_absent(0.0, 480.0));
        assert!(is_absent(-480.0, 480.0));
    }
}
