use crate::error::{Result, SynthError};
use crate::types::{sentinel, LandmarkSet};
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// The latest landmark set published by the producer.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlFrame {
    pub landmarks: LandmarkSet,
    /// Vertical position of the hand center, or the sentinel when absent.
    pub center: f32,
    /// Number of publishes so far; 0 until the first frame arrives.
    pub seq: u64,
    /// Producer timestamp in microseconds since session start.
    pub timestamp_us: u64,
}

/// State shared between the producer thread and the engine's update step.
///
/// One lock guards the frame; it is held only for a whole-set replace or a
/// read, never across a sleep or I/O. The audio callback never touches it.
pub struct ControlState {
    frame: Mutex<ControlFrame>,
    running: AtomicBool,
    landmark_count: usize,
    frame_height: f32,
}

impl ControlState {
    pub fn new(landmark_count: usize, frame_height: f32) -> Self {
        Self {
            frame: Mutex::new(ControlFrame {
                landmarks: LandmarkSet::absent(landmark_count, frame_height),
                center: sentinel(frame_height),
                seq: 0,
                timestamp_us: 0,
            }),
            running: AtomicBool::new(true),
            landmark_count,
            frame_height,
        }
    }

    pub fn landmark_count(&self) -> usize {
        self.landmark_count
    }

    pub fn frame_height(&self) -> f32 {
        self.frame_height
    }

    /// Replace the whole landmark set. Rejects a set of the wrong length so
    /// the count stays fixed for the session. Non-finite coordinates are
    /// stored as the sentinel, so a glitching tracker reads as "no hand".
    pub fn publish(&self, landmarks: LandmarkSet, center: f32, timestamp_us: u64) -> Result<u64> {
        if landmarks.len() != self.landmark_count {
            return Err(SynthError::Config(format!(
                "landmark set has {} entries, expected {}",
                landmarks.len(),
                self.landmark_count
            )));
        }
        let landmarks = landmarks.sanitized(self.frame_height);
        let center = if center.is_finite() {
            center
        } else {
            sentinel(self.frame_height)
        };
        let mut frame = self.lock();
        frame.landmarks = landmarks;
        frame.center = center;
        frame.seq += 1;
        frame.timestamp_us = timestamp_us;
        Ok(frame.seq)
    }

    /// Publish "no hand": every landmark and the center set to the sentinel.
    pub fn publish_absent(&self, timestamp_us: u64) -> Result<u64> {
        let landmarks = LandmarkSet::absent(self.landmark_count, self.frame_height);
        self.publish(landmarks, sentinel(self.frame_height), timestamp_us)
    }

    /// Run `f` against the current frame while holding the lock.
    pub fn read<T>(&self, f: impl FnOnce(&ControlFrame) -> T) -> T {
        f(&self.lock())
    }

    pub fn snapshot(&self) -> ControlFrame {
        self.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Clear the running flag. Returns true only for the call that cleared it.
    pub fn shutdown(&self) -> bool {
        let was_running = self.running.swap(false, Ordering::AcqRel);
        if was_running {
            info!("Shutdown requested");
        }
        was_running
    }

    // A panicking producer must not take the synth down with it: the frame
    // is always fully written before the guard drops, so the data is intact.
    fn lock(&self) -> MutexGuard<'_, ControlFrame> {
        self.frame.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
