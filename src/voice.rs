//! The sine voice and its real-time renderer.
//!
//! `SynthVoice` is the only state crossing from the update thread into the
//! audio callback. Every field is an atomic, so the callback never waits.
//! The phase lives in `Oscillator`, which the callback owns outright.

use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Target frequency and gate, written by the update step.
#[derive(Debug)]
pub struct SynthVoice {
    freq_bits: AtomicU32,
    gate: AtomicBool,
    amplitude: f32,
}

impl SynthVoice {
    /// Starts silent at 0 Hz.
    pub fn new(amplitude: f32) -> Self {
        Self {
            freq_bits: AtomicU32::new(0.0f32.to_bits()),
            gate: AtomicBool::new(false),
            amplitude,
        }
    }

    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    pub fn frequency(&self) -> f32 {
        f32::from_bits(self.freq_bits.load(Ordering::Acquire))
    }

    pub fn set_frequency(&self, hz: f32) {
        self.freq_bits.store(hz.to_bits(), Ordering::Release);
    }

    pub fn is_gated(&self) -> bool {
        self.gate.load(Ordering::Acquire)
    }

    pub fn set_gate(&self, open: bool) {
        self.gate.store(open, Ordering::Release);
    }
}

/// Phase-accumulating sine renderer. Lives inside the audio callback.
///
/// Each block starts where the previous one ended, whatever the frequency
/// did in between, so frequency changes never produce a discontinuity.
pub struct Oscillator {
    voice: Arc<SynthVoice>,
    sample_rate: f64,
    phase: f64,
    rendered: Arc<AtomicU64>,
}

impl Oscillator {
    pub fn new(voice: Arc<SynthVoice>, sample_rate: u32, rendered: Arc<AtomicU64>) -> Self {
        Self {
            voice,
            sample_rate: sample_rate as f64,
            phase: 0.0,
            rendered,
        }
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Fill a mono buffer and advance the phase by the whole block.
    pub fn render(&mut self, out: &mut [f32]) {
        self.render_interleaved(out, 1);
    }

    /// Fill an interleaved buffer, duplicating the mono voice on every channel.
    pub fn render_interleaved(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let n = out.len() / channels;

        // One snapshot per block
        let freq = self.voice.frequency() as f64;
        if !freq.is_finite() {
            out.fill(0.0);
            self.rendered.fetch_add(n as u64, Ordering::Relaxed);
            return;
        }
        let amp = if self.voice.is_gated() {
            self.voice.amplitude() as f64
        } else {
            0.0
        };
        let step = TAU * freq / self.sample_rate;

        let mut frames = out.chunks_exact_mut(channels);
        for (i, frame) in frames.by_ref().enumerate() {
            let s = (amp * (self.phase + step * i as f64).sin()) as f32;
            frame.fill(s);
        }
        // Trailing partial frame is not part of the block
        frames.into_remainder().fill(0.0);

        // sin is periodic; wrapping only keeps the accumulator precise
        self.phase = (self.phase + step * n as f64).rem_euclid(TAU);
        self.rendered.fetch_add(n as u64, Ordering::Relaxed);
    }
}
