//! Startup configuration: numeric constants plus the strategy names.
//!
//! Values come from built-in defaults, optionally overlaid by a JSON file,
//! then by command-line flags. Nothing is written back.

use crate::error::{Result, SynthError};
use crate::types::FrequencyRange;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// Lowest pitch, reached with the hand at the bottom of the range (Hz).
    pub min_freq: f32,
    /// Highest pitch, reached with the hand at the top of the frame (Hz).
    pub max_freq: f32,
    pub sample_rate: u32,
    /// Capture frame height in pixels.
    pub frame_height: f32,
    /// Points per tracked hand (21 for the MediaPipe hand model).
    pub landmark_count: usize,
    /// Fixed output amplitude, 0.0–1.0.
    pub amplitude: f32,
    /// Frequency recomputations per second.
    pub update_hz: u32,
    /// Frames per block for the null backend.
    pub block_size: usize,
    /// Capture rate of the simulated producer.
    pub capture_fps: u32,
    /// "linear" | "logarithmic"
    pub freq_mapping: String,
    /// "center" | "random"
    pub hand_mapping: String,
    /// "mute" | "zero"
    pub silence: String,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            min_freq: 200.0,
            max_freq: 800.0,
            sample_rate: 44_100,
            frame_height: 480.0,
            landmark_count: 21,
            amplitude: 0.5,
            update_hz: 60,
            block_size: 512,
            capture_fps: 30,
            freq_mapping: "linear".into(),
            hand_mapping: "center".into(),
            silence: "mute".into(),
        }
    }
}

impl SynthConfig {
    /// Load from a JSON file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let cfg: SynthConfig = serde_json::from_str(&data)
            .map_err(|e| SynthError::Config(format!("parse {:?}: {}", path, e)))?;
        info!("Loaded config from {:?}", path);
        Ok(cfg)
    }

    pub fn range(&self) -> FrequencyRange {
        FrequencyRange {
            min_hz: self.min_freq,
            max_hz: self.max_freq,
            frame_height: self.frame_height,
        }
    }

    /// Reject settings that would make the mapping or the audio callback
    /// misbehave once running.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(SynthError::Config(msg));
        if !(self.min_freq.is_finite() && self.min_freq > 0.0) {
            return bad(format!("min_freq must be positive, got {}", self.min_freq));
        }
        if !(self.max_freq.is_finite() && self.max_freq > self.min_freq) {
            return bad(format!(
                "max_freq ({}) must exceed min_freq ({})",
                self.max_freq, self.min_freq
            ));
        }
        if self.sample_rate == 0 {
            return bad("sample_rate must be non-zero".into());
        }
        if self.max_freq >= self.sample_rate as f32 / 2.0 {
            return bad(format!(
                "max_freq ({}) must stay below Nyquist ({})",
                self.max_freq,
                self.sample_rate / 2
            ));
        }
        if !(self.frame_height.is_finite() && self.frame_height >= 2.0) {
            return bad(format!("frame_height must be at least 2, got {}", self.frame_height));
        }
        if self.landmark_count == 0 {
            return bad("landmark_count must be non-zero".into());
        }
        if !(0.0..=1.0).contains(&self.amplitude) {
            return bad(format!("amplitude must be within 0..=1, got {}", self.amplitude));
        }
        if self.update_hz == 0 || self.capture_fps == 0 {
            return bad("update_hz and capture_fps must be non-zero".into());
        }
        if self.block_size == 0 {
            return bad("block_size must be non-zero".into());
        }
        Ok(())
    }
}
