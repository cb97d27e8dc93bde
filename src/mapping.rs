//! Control coordinate → frequency policies.
//!
//! Pixel rows grow downwards, so both policies map a smaller coordinate
//! (hand higher in the frame) to a higher pitch.

use crate::error::SynthError;
use crate::types::FrequencyRange;
use std::fmt;
use std::str::FromStr;

/// Fraction of the frame height covered by the linear policy. Below that
/// row the pitch sits at the minimum.
pub const LINEAR_DOMAIN_FRACTION: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyMapper {
    /// Straight-line interpolation over the upper 80% of the frame, clamped.
    Linear,
    /// Exponential decay from max at row 0 to min at the bottom row.
    /// Equal hand movement gives equal musical intervals. Unclamped:
    /// coordinates above the frame (negative) map above `max_hz` and rows
    /// below it map under `min_hz`.
    Logarithmic,
}

impl FrequencyMapper {
    pub fn name(&self) -> &'static str {
        match self {
            FrequencyMapper::Linear => "linear",
            FrequencyMapper::Logarithmic => "logarithmic",
        }
    }

    /// `None` in means no hand; the caller decides what silence sounds like.
    pub fn map(&self, coordinate: Option<f32>, range: &FrequencyRange) -> Option<f32> {
        let c = coordinate?;
        Some(match self {
            FrequencyMapper::Linear => linear(c, range),
            FrequencyMapper::Logarithmic => logarithmic(c, range),
        })
    }
}

fn linear(c: f32, range: &FrequencyRange) -> f32 {
    // Domain end is a whole pixel row
    let top = (LINEAR_DOMAIN_FRACTION * range.frame_height).floor();
    if c <= 0.0 {
        return range.max_hz;
    }
    if c >= top {
        return range.min_hz;
    }
    let t = c / top;
    range.max_hz + (range.min_hz - range.max_hz) * t
}

fn logarithmic(c: f32, range: &FrequencyRange) -> f32 {
    let ratio = (range.min_hz / range.max_hz).ln();
    range.max_hz * (ratio * c / range.frame_height).exp()
}

impl FromStr for FrequencyMapper {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(FrequencyMapper::Linear),
            "logarithmic" => Ok(FrequencyMapper::Logarithmic),
            other => Err(SynthError::Config(format!(
                "unknown frequency mapping strategy: {other}"
            ))),
        }
    }
}

impl fmt::Display for FrequencyMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
