use crate::control::ControlState;
use crate::engine::SynthEngine;
use crate::error::{Result, SynthError};
use crate::producer::Producer;
use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use log::{debug, error, info};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How often the main thread re-checks the running flag and device health.
const POLL: Duration = Duration::from_millis(20);

/// Cloneable trigger for ending a session from a signal handler or timer.
#[derive(Clone)]
pub struct ShutdownHandle {
    control: Arc<ControlState>,
    tx: Sender<()>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.control.shutdown();
        let _ = self.tx.try_send(());
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub frames_published: u64,
    pub updates: u64,
    pub frames_rendered: u64,
    pub elapsed: Duration,
}

/// Runs one session: producer thread, update thread, audio output.
///
/// All three stop when the running flag clears. The stop sequence (join
/// both threads, then stop the engine) runs exactly once, whichever of
/// `run`, `shutdown` or `Drop` gets there first.
pub struct RunLoop {
    control: Arc<ControlState>,
    engine: SynthEngine,
    producer: Option<Box<dyn Producer>>,
    update_period: Duration,
    shutdown_tx: Sender<()>,
    shutdown_rx: Receiver<()>,
    handles: Vec<JoinHandle<()>>,
}

impl RunLoop {
    pub fn new(engine: SynthEngine, producer: Box<dyn Producer>) -> Self {
        let control = engine.updater().control().clone();
        let update_period = Duration::from_secs_f64(1.0 / engine.config().update_hz as f64);
        let (shutdown_tx, shutdown_rx) = bounded(1);
        Self {
            control,
            engine,
            producer: Some(producer),
            update_period,
            shutdown_tx,
            shutdown_rx,
            handles: Vec::new(),
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            control: self.control.clone(),
            tx: self.shutdown_tx.clone(),
        }
    }

    pub fn engine(&self) -> &SynthEngine {
        &self.engine
    }

    /// Start the session and block until it ends: shutdown trigger,
    /// producer end-of-input, device loss, or `duration` elapsed.
    pub fn run(&mut self, duration: Option<Duration>) -> Result<RunSummary> {
        let started = Instant::now();
        self.engine.start()?;
        if let Err(e) = self.spawn_threads() {
            self.shutdown()?;
            return Err(e);
        }

        let deadline = duration.map(|d| started + d);
        let poll = tick(POLL);
        let status_every = (1.0 / POLL.as_secs_f64()).round() as u64;
        let mut polls: u64 = 0;
        loop {
            select! {
                recv(self.shutdown_rx) -> _ => break,
                recv(poll) -> _ => {}
            }
            if !self.control.is_running() || self.engine.device_fault() {
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                info!("Run duration elapsed");
                break;
            }
            polls += 1;
            if polls % status_every == 0 {
                let s = self.engine.stats();
                debug!(
                    "freq={:.1}Hz gate={} updates={} rendered={}",
                    s.frequency, s.gated, s.updates, s.frames_rendered
                );
            }
        }

        let fault = self.engine.device_fault();
        self.shutdown()?;
        if fault {
            error!("Audio device lost mid-session");
            return Err(SynthError::Device("output device lost".into()));
        }

        let stats = self.engine.stats();
        Ok(RunSummary {
            frames_published: self.control.snapshot().seq,
            updates: stats.updates,
            frames_rendered: stats.frames_rendered,
            elapsed: started.elapsed(),
        })
    }

    fn spawn_threads(&mut self) -> Result<()> {
        if let Some(producer) = self.producer.take() {
            let control = self.control.clone();
            let name = producer.name();
            let handle = thread::Builder::new()
                .name(format!("producer-{name}"))
                .spawn(move || producer.run(control))?;
            self.handles.push(handle);
        }

        let updater = self.engine.updater();
        let control = self.control.clone();
        let period = self.update_period;
        let handle = thread::Builder::new().name("update".into()).spawn(move || {
            let ticker = tick(period);
            while control.is_running() {
                updater.update();
                if ticker.recv().is_err() {
                    break;
                }
            }
            debug!("Update thread exiting");
        })?;
        self.handles.push(handle);
        Ok(())
    }

    /// Clear the running flag, join the producer and update threads, stop
    /// the engine. Safe to call repeatedly; returns true only for the call
    /// that stopped a running engine.
    pub fn shutdown(&mut self) -> Result<bool> {
        self.control.shutdown();
        for handle in self.handles.drain(..) {
            let name = handle.thread().name().unwrap_or("?").to_string();
            if handle.join().is_err() {
                error!("Thread {} panicked", name);
            }
        }
        self.engine.stop()
    }
}

impl Drop for RunLoop {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Shutdown failed: {}", e);
        }
    }
}
