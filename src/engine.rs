use crate::config::SynthConfig;
use crate::control::ControlState;
use crate::error::{Result, SynthError};
use crate::mapping::FrequencyMapper;
use crate::output::{OutputBackend, OutputRequest, OutputStream};
use crate::selector::CoordinateSelector;
use crate::types::FrequencyRange;
use crate::voice::SynthVoice;
use log::{info, trace, warn};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// What the voice does while no hand is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SilencePolicy {
    /// Close the gate and keep the last frequency, so the tone resumes
    /// from where it left off.
    Mute,
    /// Drop the frequency to 0 Hz with the gate open. The output freezes
    /// at its current sample value.
    Zero,
}

impl FromStr for SilencePolicy {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mute" => Ok(SilencePolicy::Mute),
            "zero" => Ok(SilencePolicy::Zero),
            other => Err(SynthError::Config(format!("unknown silence policy: {other}"))),
        }
    }
}

impl fmt::Display for SilencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SilencePolicy::Mute => "mute",
            SilencePolicy::Zero => "zero",
        })
    }
}

// ─── Update step ────────────────────────────────────────────────────────────

/// The periodic control → frequency step, detached from the output stream
/// so it can move onto the update thread.
#[derive(Clone)]
pub struct FrequencyUpdater {
    control: Arc<ControlState>,
    voice: Arc<SynthVoice>,
    selector: CoordinateSelector,
    mapper: FrequencyMapper,
    silence: SilencePolicy,
    range: FrequencyRange,
    updates: Arc<AtomicU64>,
}

impl FrequencyUpdater {
    /// Read the control state, pick a coordinate, map it and hand the
    /// result to the voice. Returns the mapped frequency, `None` when no
    /// hand is present.
    pub fn update(&self) -> Option<f32> {
        let frame_height = self.range.frame_height;
        let point = self
            .control
            .read(|frame| self.selector.select(&frame.landmarks, frame.center, frame_height));

        let freq = self
            .mapper
            .map(point.map(|p| p.y), &self.range)
            .filter(|hz| hz.is_finite());
        match freq {
            Some(hz) => {
                self.voice.set_frequency(hz);
                self.voice.set_gate(true);
            }
            None => match self.silence {
                SilencePolicy::Mute => self.voice.set_gate(false),
                SilencePolicy::Zero => {
                    self.voice.set_frequency(0.0);
                    self.voice.set_gate(true);
                }
            },
        }

        let n = self.updates.fetch_add(1, Ordering::Relaxed) + 1;
        trace!("update #{}: point={:?} freq={:?}", n, point, freq);
        freq
    }

    pub fn control(&self) -> &Arc<ControlState> {
        &self.control
    }
}

// ─── Engine ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed, device not opened yet.
    Idle,
    Running,
    /// Device released. Terminal.
    Stopped,
}

#[derive(Debug, Clone, Copy)]
pub struct EngineStats {
    pub state: EngineState,
    pub frames_rendered: u64,
    pub updates: u64,
    pub frequency: f32,
    pub gated: bool,
}

/// Owns the output stream and the voice it renders.
///
/// Construction resolves both strategies and validates every numeric
/// setting, so nothing inside the audio callback or the update step can
/// fail afterwards.
pub struct SynthEngine {
    config: SynthConfig,
    backend: OutputBackend,
    voice: Arc<SynthVoice>,
    updater: FrequencyUpdater,
    stream: Option<OutputStream>,
    state: EngineState,
    rendered: Arc<AtomicU64>,
    fault: Arc<AtomicBool>,
}

impl SynthEngine {
    pub fn new(
        config: SynthConfig,
        control: Arc<ControlState>,
        backend: OutputBackend,
    ) -> Result<Self> {
        config.validate()?;
        let mapper: FrequencyMapper = config.freq_mapping.parse()?;
        let selector: CoordinateSelector = config.hand_mapping.parse()?;
        let silence: SilencePolicy = config.silence.parse()?;

        if control.landmark_count() != config.landmark_count
            || control.frame_height() != config.frame_height
        {
            return Err(SynthError::Config(format!(
                "control state shape ({} landmarks, {} px) does not match config ({}, {})",
                control.landmark_count(),
                control.frame_height(),
                config.landmark_count,
                config.frame_height
            )));
        }

        let voice = Arc::new(SynthVoice::new(config.amplitude));
        let updater = FrequencyUpdater {
            control,
            voice: voice.clone(),
            selector,
            mapper,
            silence,
            range: config.range(),
            updates: Arc::new(AtomicU64::new(0)),
        };

        info!(
            "Synth: {} mapping, {} hand, {} on absence, {:.0}–{:.0} Hz",
            mapper, selector, silence, config.min_freq, config.max_freq
        );

        Ok(Self {
            config,
            backend,
            voice,
            updater,
            stream: None,
            state: EngineState::Idle,
            rendered: Arc::new(AtomicU64::new(0)),
            fault: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Open the output device and start rendering.
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            EngineState::Running => {
                warn!("Synth already running");
                return Ok(());
            }
            EngineState::Stopped => {
                return Err(SynthError::Device("engine already stopped".into()));
            }
            EngineState::Idle => {}
        }

        info!("Starting synth on {} output", self.backend);
        let stream = OutputStream::open(
            self.backend,
            OutputRequest {
                voice: self.voice.clone(),
                sample_rate: self.config.sample_rate,
                block_size: self.config.block_size,
                rendered: self.rendered.clone(),
                fault: self.fault.clone(),
                control: self.updater.control.clone(),
            },
        )?;
        self.stream = Some(stream);
        self.state = EngineState::Running;
        Ok(())
    }

    pub fn update(&self) -> Option<f32> {
        self.updater.update()
    }

    /// A handle to the update step for another thread.
    pub fn updater(&self) -> FrequencyUpdater {
        self.updater.clone()
    }

    /// Stop and release the output device. Returns true only for the call
    /// that actually stopped a running stream.
    pub fn stop(&mut self) -> Result<bool> {
        let was_running = self.state == EngineState::Running;
        self.state = EngineState::Stopped;
        match self.stream.take() {
            Some(stream) => {
                info!("Stopping synth");
                stream.close()?;
                info!(
                    "Synth stopped after {} frames, {} updates",
                    self.rendered.load(Ordering::Relaxed),
                    self.updater.updates.load(Ordering::Relaxed)
                );
                Ok(was_running)
            }
            None => Ok(false),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// True once the platform has reported the device lost.
    pub fn device_fault(&self) -> bool {
        self.fault.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            state: self.state,
            frames_rendered: self.rendered.load(Ordering::Relaxed),
            updates: self.updater.updates.load(Ordering::Relaxed),
            frequency: self.voice.frequency(),
            gated: self.voice.is_gated(),
        }
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }
}

impl Drop for SynthEngine {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            warn!("SynthEngine dropped while running; closing output");
            let _ = stream.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LandmarkSet;

    fn engine_with(freq_mapping: &str, hand_mapping: &str, silence: &str) -> SynthEngine {
        let config = SynthConfig {
            freq_mapping: freq_mapping.into(),
            hand_mapping: hand_mapping.into(),
            silence: silence.into(),
            ..SynthConfig::default()
        };
        let control = Arc::new(ControlState::new(config.landmark_count, config.frame_height));
        SynthEngine::new(config, control, OutputBackend::Null).unwrap()
    }

    fn publish_center(engine: &SynthEngine, y: f32) {
        let control = engine.updater().control().clone();
        control
            .publish(LandmarkSet::new(vec![y; 21]), y, 0)
            .unwrap();
    }

    #[test]
    fn test_unknown_strategy_is_fatal() {
        let config = SynthConfig {
            freq_mapping: "quadratic".into(),
            ..SynthConfig::default()
        };
        let control = Arc::new(ControlState::new(21, 480.0));
        let result = SynthEngine::new(config, control.clone(), OutputBackend::Null);
        assert!(matches!(result, Err(SynthError::Config(_))));

        let config = SynthConfig {
            hand_mapping: "thumb".into(),
            ..SynthConfig::default()
        };
        let result = SynthEngine::new(config, control, OutputBackend::Null);
        assert!(matches!(result, Err(SynthError::Config(_))));
    }

    #[test]
    fn test_control_shape_must_match() {
        let control = Arc::new(ControlState::new(5, 480.0));
        let result = SynthEngine::new(SynthConfig::default(), control, OutputBackend::Null);
        assert!(matches!(result, Err(SynthError::Config(_))));
    }

    #[test]
    fn test_update_maps_center() {
        let engine = engine_with("linear", "center", "mute");
        publish_center(&engine, 192.0);
        let f = engine.update().unwrap();
        assert!((f - 500.0).abs() < 1e-3);
        let stats = engine.stats();
        assert!((stats.frequency - 500.0).abs() < 1e-3);
        assert!(stats.gated);
        assert_eq!(stats.updates, 1);
    }

    #[test]
    fn test_absence_mutes_and_holds_frequency() {
        let engine = engine_with("linear", "center", "mute");
        publish_center(&engine, 0.0);
        assert_eq!(engine.update(), Some(800.0));
        engine.updater().control().publish_absent(0).unwrap();
        assert_eq!(engine.update(), None);
        let stats = engine.stats();
        assert!(!stats.gated);
        assert_eq!(stats.frequency, 800.0);
    }

    #[test]
    fn test_absence_zero_policy() {
        let engine = engine_with("logarithmic", "center", "zero");
        publish_center(&engine, 100.0);
        assert!(engine.update().is_some());
        engine.updater().control().publish_absent(0).unwrap();
        assert_eq!(engine.update(), None);
        let stats = engine.stats();
        assert!(stats.gated);
        assert_eq!(stats.frequency, 0.0);
    }

    #[test]
    fn test_nan_hand_degrades_to_silence_then_recovers() {
        use crate::voice::Oscillator;

        let engine = engine_with("linear", "center", "mute");
        let control = engine.updater().control().clone();
        let rendered = Arc::new(AtomicU64::new(0));
        let mut osc = Oscillator::new(engine.voice.clone(), 44_100, rendered);
        let mut buf = vec![0.0f32; 256];

        control
            .publish(LandmarkSet::new(vec![f32::NAN; 21]), f32::NAN, 0)
            .unwrap();
        assert_eq!(engine.update(), None);
        assert!(!engine.stats().gated);
        osc.render(&mut buf);
        assert!(buf.iter().all(|s| s.is_finite()));

        publish_center(&engine, 192.0);
        let f = engine.update().unwrap();
        assert!((f - 500.0).abs() < 1e-3);
        osc.render(&mut buf);
        assert!(osc.phase().is_finite());
        assert!(buf.iter().all(|s| s.is_finite()));
        assert!(buf.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn test_overflowing_mapping_is_treated_as_absent() {
        // A very wide range makes the exponential overflow to +inf for a
        // hand just above the frame.
        let config = SynthConfig {
            min_freq: 1.0e-38,
            freq_mapping: "logarithmic".into(),
            ..SynthConfig::default()
        };
        let control = Arc::new(ControlState::new(config.landmark_count, config.frame_height));
        let engine = SynthEngine::new(config, control, OutputBackend::Null).unwrap();

        publish_center(&engine, 100.0);
        let held = engine.update().unwrap();
        assert!(held.is_finite());

        publish_center(&engine, -470.0);
        assert_eq!(engine.update(), None);
        let stats = engine.stats();
        assert!(!stats.gated);
        assert_eq!(stats.frequency, held);
    }

    #[test]
    fn test_random_absent_hand_plays_max() {
        // The random policy reads a missing hand as (0, 0): top of frame.
        let engine = engine_with("linear", "random", "mute");
        assert_eq!(engine.update(), Some(800.0));
        assert!(engine.stats().gated);
    }

    #[test]
    fn test_lifecycle_and_idempotent_stop() {
        let mut engine = engine_with("linear", "center", "mute");
        assert_eq!(engine.state(), EngineState::Idle);
        engine.start().unwrap();
        assert_eq!(engine.state(), EngineState::Running);
        assert!(engine.stop().unwrap());
        assert_eq!(engine.state(), EngineState::Stopped);
        assert!(!engine.stop().unwrap());
        assert!(engine.start().is_err());
    }

    #[test]
    fn test_parse_silence_policy() {
        assert_eq!("mute".parse::<SilencePolicy>().unwrap(), SilencePolicy::Mute);
        assert_eq!("zero".parse::<SilencePolicy>().unwrap(), SilencePolicy::Zero);
        assert!("hold".parse::<SilencePolicy>().is_err());
    }
}
