//! JSONL landmark replay: feeds a recorded tracker session into the synth.
//!
//! One JSON object per line:
//!
//! ```text
//! {"format":"hand-landmarks","frame_height":480}      (optional header)
//! {"t":0,"lm":[312.0, 298.5, ...],"c":305.0}
//! {"t":33333,"lm":null}                                 (no hand)
//! ```
//!
//! `t` is microseconds since the start of the recording, `lm` the vertical
//! landmark rows and `c` the hand center. Without `c` the centroid of the
//! present landmarks is used. Works with any `BufRead`.

use crate::control::ControlState;
use crate::error::Result;
use crate::producer::Producer;
use crate::types::{sentinel, LandmarkSet};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub const FORMAT: &str = "hand-landmarks";

/// Longest single sleep while waiting for the next frame, so a cleared
/// running flag is noticed promptly even across gaps in the recording.
const MAX_WAIT: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkRecord {
    pub t: u64,
    #[serde(default)]
    pub lm: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c: Option<f32>,
}

/// Parse one line. `Ok(None)` for blank lines and headers.
pub fn parse_line(line: &str) -> std::result::Result<Option<LandmarkRecord>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let raw: serde_json::Value =
        serde_json::from_str(trimmed).map_err(|e| format!("parse line: {}", e))?;
    if let Some(format) = raw.get("format") {
        return match format.as_str() {
            Some(FORMAT) => Ok(None),
            _ => Err(format!("unknown format: {}", format)),
        };
    }
    serde_json::from_value(raw)
        .map(Some)
        .map_err(|e| format!("parse frame: {}", e))
}

pub struct LandmarkReplay<R: BufRead + Send + 'static> {
    reader: R,
    line_buf: String,
}

impl LandmarkReplay<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        info!("Replay: {:?}", path);
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead + Send + 'static> LandmarkReplay<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_buf: String::new(),
        }
    }

    /// Next frame record, skipping headers and malformed lines.
    /// `None` at EOF or on a read error.
    pub fn next_record(&mut self) -> Option<LandmarkRecord> {
        loop {
            self.line_buf.clear();
            match self.reader.read_line(&mut self.line_buf) {
                Ok(0) => return None,
                Ok(_) => match parse_line(&self.line_buf) {
                    Ok(Some(rec)) => return Some(rec),
                    Ok(None) => continue,
                    Err(e) => warn!("Replay: skipping line: {}", e),
                },
                Err(e) => {
                    warn!("Replay: read error: {}", e);
                    return None;
                }
            }
        }
    }
}

fn publish_record(control: &ControlState, rec: LandmarkRecord, ts: u64) -> Result<u64> {
    let h = control.frame_height();
    match rec.lm {
        Some(positions) => {
            let landmarks = LandmarkSet::new(positions);
            let center = rec
                .c
                .or_else(|| landmarks.centroid(h))
                .unwrap_or_else(|| sentinel(h));
            control.publish(landmarks, center, ts)
        }
        None => control.publish_absent(ts),
    }
}

/// Sleep until `deadline`, in slices, while the session is running.
/// Returns false if the running flag cleared first.
fn wait_until(control: &ControlState, deadline: Instant) -> bool {
    loop {
        if !control.is_running() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(MAX_WAIT));
    }
}

impl<R: BufRead + Send + 'static> Producer for LandmarkReplay<R> {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn run(mut self: Box<Self>, control: Arc<ControlState>) {
        let start = Instant::now();
        let mut first_t: Option<u64> = None;
        let mut frames: u64 = 0;

        while let Some(rec) = self.next_record() {
            let t0 = *first_t.get_or_insert(rec.t);
            let offset = rec.t.saturating_sub(t0);
            if !wait_until(&control, start + Duration::from_micros(offset)) {
                break;
            }
            match publish_record(&control, rec, offset) {
                Ok(_) => frames += 1,
                Err(e) => warn!("Replay: frame rejected: {}", e),
            }
        }

        info!("Replay finished after {} frames", frames);
        // End of the recording ends the session
        control.shutdown();
    }
}
