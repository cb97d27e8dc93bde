//! End-to-end tests for the hand-theremin pipeline.
//!
//! These drive the full data flow with the null output backend:
//!   producer → ControlState → update thread → SynthVoice → oscillator

use std::io::Cursor;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use hand_theremin::config::SynthConfig;
use hand_theremin::control::ControlState;
use hand_theremin::engine::{EngineState, SynthEngine};
use hand_theremin::output::OutputBackend;
use hand_theremin::replay::{LandmarkRecord, LandmarkReplay};
use hand_theremin::run_loop::RunLoop;
use hand_theremin::simulator::HandSimulator;
use hand_theremin::types::{LandmarkSet, SessionClock};

// ─── Helpers ───────────────────────────────────────────────────────────────

fn test_config() -> SynthConfig {
    SynthConfig {
        min_freq: 200.0,
        max_freq: 800.0,
        frame_height: 480.0,
        sample_rate: 8000,
        block_size: 80,
        update_hz: 200,
        ..SynthConfig::default()
    }
}

fn engine(config: SynthConfig) -> SynthEngine {
    let control = Arc::new(ControlState::new(config.landmark_count, config.frame_height));
    SynthEngine::new(config, control, OutputBackend::Null).unwrap()
}

fn publish(engine: &SynthEngine, y: f32) {
    let control = engine.updater().control().clone();
    let count = control.landmark_count();
    control.publish(LandmarkSet::new(vec![y; count]), y, 0).unwrap();
}

// ─── Integration Tests ─────────────────────────────────────────────────────

#[test]
fn test_linear_scenario_480_200_800() {
    let e = engine(test_config());
    for (coord, expected) in [(0.0, 800.0), (384.0, 200.0), (192.0, 500.0)] {
        publish(&e, coord);
        let f = e.update().unwrap();
        assert!((f - expected).abs() < 1e-3, "coord={} f={} expected={}", coord, f, expected);
    }
}

#[test]
fn test_logarithmic_scenario() {
    let e = engine(SynthConfig {
        freq_mapping: "logarithmic".into(),
        ..test_config()
    });
    publish(&e, 0.0);
    assert!((e.update().unwrap() - 800.0).abs() < 1e-3);
    publish(&e, 480.0);
    assert!((e.update().unwrap() - 200.0).abs() < 1e-2);
}

#[test]
fn test_concurrent_publish_and_update() {
    // Producer and update step hammer the same state; the voice must only
    // ever see frequencies that a whole published set maps to.
    let e = engine(test_config());
    let control = e.updater().control().clone();
    let updater = e.updater();

    let producer = {
        let control = control.clone();
        thread::spawn(move || {
            for i in 0..1000u32 {
                let y = if i % 2 == 0 { 0.0 } else { 384.0 };
                control.publish(LandmarkSet::new(vec![y; 21]), y, i as u64).unwrap();
            }
        })
    };
    let consumer = thread::spawn(move || {
        for _ in 0..1000 {
            if let Some(f) = updater.update() {
                assert!(f == 800.0 || f == 200.0, "torn frequency {}", f);
            }
        }
    });

    producer.join().unwrap();
    consumer.join().unwrap();
    assert_eq!(control.snapshot().seq, 1000);
}

#[test]
fn test_simulated_session_runs_and_stops() {
    let config = test_config();
    let clock = SessionClock::new();
    let sim = HandSimulator::new(clock, 60, config.frame_height, config.landmark_count)
        .with_sweep(0.5);
    let mut rl = RunLoop::new(engine(config), Box::new(sim));

    let summary = rl.run(Some(Duration::from_millis(300))).unwrap();
    assert!(summary.frames_published >= 5, "published {}", summary.frames_published);
    assert!(summary.updates >= 10, "updates {}", summary.updates);
    assert!(summary.frames_rendered > 0);
    assert_eq!(rl.engine().state(), EngineState::Stopped);

    let f = rl.engine().stats().frequency;
    assert!((200.0..=800.0).contains(&f), "frequency {}", f);
}

#[test]
fn test_shutdown_terminates_within_a_period() {
    let config = test_config();
    let sim = HandSimulator::new(SessionClock::new(), 30, config.frame_height, config.landmark_count);
    let mut rl = RunLoop::new(engine(config), Box::new(sim));
    let handle = rl.shutdown_handle();

    let trigger = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        let t = Instant::now();
        handle.trigger();
        t
    });
    rl.run(None).unwrap();
    let ended = Instant::now();
    let triggered_at = trigger.join().unwrap();
    // One capture frame (33 ms) plus scheduling slack
    assert!(
        ended.duration_since(triggered_at) < Duration::from_millis(250),
        "took {:?}",
        ended.duration_since(triggered_at)
    );
    assert!(!rl.shutdown().unwrap(), "engine stopped twice");
}

#[test]
fn test_replay_end_of_input_ends_session() {
    let config = test_config();
    let mut data = String::from("{\"format\":\"hand-landmarks\",\"frame_height\":480}\n");
    for i in 0..10u64 {
        let rec = LandmarkRecord {
            t: i * 10_000,
            lm: if i < 8 { Some(vec![192.0; 21]) } else { None },
            c: None,
        };
        data += &serde_json::to_string(&rec).unwrap();
        data += "\n";
    }
    let replay = LandmarkReplay::new(Cursor::new(data));
    let mut rl = RunLoop::new(engine(config), Box::new(replay));

    let started = Instant::now();
    let summary = rl.run(Some(Duration::from_secs(5))).unwrap();
    assert!(started.elapsed() < Duration::from_secs(2), "replay EOF did not end the run");
    assert_eq!(summary.frames_published, 10);

    // Last frames had no hand: muted, frequency held from the centroid (500 Hz)
    assert_eq!(rl.engine().update(), None);
    let stats = rl.engine().stats();
    assert!(!stats.gated);
    assert!((stats.frequency - 500.0).abs() < 1e-3, "frequency {}", stats.frequency);
}

#[test]
fn test_unknown_strategy_fails_before_any_audio() {
    let config = SynthConfig {
        hand_mapping: "pinky".into(),
        ..test_config()
    };
    let control = Arc::new(ControlState::new(config.landmark_count, config.frame_height));
    assert!(SynthEngine::new(config, control, OutputBackend::Null).is_err());
}
