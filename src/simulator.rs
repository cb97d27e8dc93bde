use crate::control::ControlState;
use crate::producer::Producer;
use crate::types::{LandmarkSet, SessionClock};
use log::{debug, info, warn};
use std::f32::consts::PI;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Generates a synthetic hand that sweeps up and down the frame, with a
/// regular gap where the hand leaves the picture. Exercises the whole
/// pipeline without a camera.
pub struct HandSimulator {
    clock: SessionClock,
    fps: u32,
    frame_height: f32,
    landmark_count: usize,
    /// Seconds for one full up-and-down sweep.
    sweep_secs: f32,
    /// Every `cycle_secs`, the last `gap_secs` have no hand.
    cycle_secs: f32,
    gap_secs: f32,
}

impl HandSimulator {
    pub fn new(clock: SessionClock, fps: u32, frame_height: f32, landmark_count: usize) -> Self {
        Self {
            clock,
            fps,
            frame_height,
            landmark_count,
            sweep_secs: 4.0,
            cycle_secs: 10.0,
            gap_secs: 1.5,
        }
    }

    pub fn with_sweep(mut self, sweep_secs: f32) -> Self {
        self.sweep_secs = sweep_secs;
        self
    }

    pub fn with_gap(mut self, cycle_secs: f32, gap_secs: f32) -> Self {
        self.cycle_secs = cycle_secs;
        self.gap_secs = gap_secs;
        self
    }

    /// The simulated hand at `t` seconds: `None` while out of frame,
    /// otherwise the landmark rows and the hand center.
    pub fn hand_at(&self, t: f32) -> Option<(LandmarkSet, f32)> {
        if self.cycle_secs > 0.0 && t % self.cycle_secs >= self.cycle_secs - self.gap_secs {
            return None;
        }

        let h = self.frame_height;
        // Center travels between 10% and 90% of the frame
        let s = 0.5 - 0.5 * (2.0 * PI * t / self.sweep_secs).cos();
        let center = lerp(0.1 * h, 0.9 * h, s);

        // Spread the points over a hand-sized band around the center:
        // wrist below, fingertips above.
        let span = 0.25 * h;
        let n = self.landmark_count.max(1);
        let positions = (0..self.landmark_count)
            .map(|i| {
                let k = if n == 1 { 0.5 } else { i as f32 / (n - 1) as f32 };
                (center + span * (0.5 - k)).clamp(0.0, h - 1.0)
            })
            .collect();
        Some((LandmarkSet::new(positions), center))
    }

    fn emit_tick(&self, control: &ControlState) {
        let ts = self.clock.now_us();
        let t = ts as f32 / 1_000_000.0;
        let result = match self.hand_at(t) {
            Some((landmarks, center)) => control.publish(landmarks, center, ts),
            None => control.publish_absent(ts),
        };
        match result {
            Ok(seq) if seq % 300 == 0 => debug!("Simulator: {} frames published", seq),
            Ok(_) => {}
            Err(e) => warn!("Simulator frame rejected: {}", e),
        }
    }
}

impl Producer for HandSimulator {
    fn name(&self) -> &'static str {
        "simulator"
    }

    fn run(self: Box<Self>, control: Arc<ControlState>) {
        info!(
            "Simulator: {} fps, {}-point hand, {:.1}s sweep",
            self.fps, self.landmark_count, self.sweep_secs
        );
        let tick = Duration::from_micros(1_000_000 / self.fps.max(1) as u64);
        while control.is_running() {
            self.emit_tick(&control);
            thread::sleep(tick);
        }
        info!("Simulator stopped");
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
