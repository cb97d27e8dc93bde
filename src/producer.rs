//! Landmark producers: whatever stands in for the camera and hand tracker.
//!
//! A producer publishes one full landmark set per captured frame, filling
//! it with the sentinel when no hand is seen, and returns within one frame
//! of the running flag clearing. Its capture resources are released when
//! `run` returns.

use crate::control::ControlState;
use std::sync::Arc;

pub trait Producer: Send + 'static {
    fn name(&self) -> &'static str;

    /// Publish frames until the running flag clears or the source ends.
    /// Blocks the calling thread.
    fn run(self: Box<Self>, control: Arc<ControlState>);
}
