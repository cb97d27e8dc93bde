//! Audio output backends.
//!
//! `Cpal` plays through the default output device (feature `audio`).
//! `Null` drives the oscillator from a plain thread at real-time pace, for
//! headless machines and tests.

use crate::control::ControlState;
use crate::error::{Result, SynthError};
use crate::voice::{Oscillator, SynthVoice};
use log::{debug, info};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputBackend {
    Cpal,
    Null,
}

impl OutputBackend {
    pub fn name(&self) -> &'static str {
        match self {
            OutputBackend::Cpal => "cpal",
            OutputBackend::Null => "null",
        }
    }
}

impl Default for OutputBackend {
    fn default() -> Self {
        if cfg!(feature = "audio") {
            OutputBackend::Cpal
        } else {
            OutputBackend::Null
        }
    }
}

impl FromStr for OutputBackend {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cpal" => Ok(OutputBackend::Cpal),
            "null" => Ok(OutputBackend::Null),
            other => Err(SynthError::Config(format!("unknown output backend: {other}"))),
        }
    }
}

impl fmt::Display for OutputBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything a backend needs to open a stream.
pub struct OutputRequest {
    pub voice: Arc<SynthVoice>,
    pub sample_rate: u32,
    pub block_size: usize,
    /// Frames rendered so far, bumped by the callback.
    pub rendered: Arc<AtomicU64>,
    /// Set when the platform reports the device lost mid-session.
    pub fault: Arc<AtomicBool>,
    pub control: Arc<ControlState>,
}

/// An open, playing output stream. Dropping it also stops playback, but
/// `close` reports failures.
pub enum OutputStream {
    #[cfg(feature = "audio")]
    Cpal(cpal::Stream),
    Null(NullStream),
}

impl OutputStream {
    pub fn open(backend: OutputBackend, req: OutputRequest) -> Result<Self> {
        match backend {
            #[cfg(feature = "audio")]
            OutputBackend::Cpal => cpal_backend::open(req).map(OutputStream::Cpal),
            #[cfg(not(feature = "audio"))]
            OutputBackend::Cpal => Err(SynthError::Device(
                "built without the `audio` feature; use --output null".into(),
            )),
            OutputBackend::Null => NullStream::open(req).map(OutputStream::Null),
        }
    }

    pub fn close(self) -> Result<()> {
        match self {
            #[cfg(feature = "audio")]
            OutputStream::Cpal(stream) => {
                use cpal::traits::StreamTrait;
                stream
                    .pause()
                    .map_err(|e| SynthError::Device(format!("stop stream: {e}")))?;
                drop(stream);
                Ok(())
            }
            OutputStream::Null(stream) => stream.close(),
        }
    }
}

// ─── Null backend ───────────────────────────────────────────────────────────

/// Pulls `block_size` frames per block period on its own thread and
/// discards them.
pub struct NullStream {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl NullStream {
    fn open(req: OutputRequest) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let block_dur = Duration::from_secs_f64(req.block_size as f64 / req.sample_rate as f64);
        let mut osc = Oscillator::new(req.voice, req.sample_rate, req.rendered);
        let block_size = req.block_size;
        let flag = stop.clone();

        let handle = thread::Builder::new()
            .name("null-audio".into())
            .spawn(move || {
                let mut buf = vec![0.0f32; block_size];
                let start = Instant::now();
                let mut block: u32 = 0;
                while !flag.load(Ordering::Acquire) {
                    osc.render(&mut buf);
                    block += 1;
                    let target = block_dur * block;
                    let elapsed = start.elapsed();
                    if elapsed < target {
                        thread::sleep(target - elapsed);
                    }
                }
                debug!("Null output rendered {} blocks", block);
            })
            .map_err(|e| SynthError::Device(format!("spawn null output: {e}")))?;

        info!(
            "Null output: {} Hz, {} frames/block ({:.1} ms)",
            req.sample_rate,
            block_size,
            block_dur.as_secs_f64() * 1000.0
        );
        Ok(Self { stop, handle })
    }

    fn close(self) -> Result<()> {
        self.stop.store(true, Ordering::Release);
        self.handle
            .join()
            .map_err(|_| SynthError::Device("null output thread panicked".into()))
    }
}

// ─── cpal backend ───────────────────────────────────────────────────────────

/// Full-scale f32 sample to signed 16-bit, clamped to [-1, 1].
#[cfg_attr(not(feature = "audio"), allow(dead_code))]
pub(crate) fn f32_to_i16(s: f32) -> i16 {
    (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

/// Full-scale f32 sample to offset-binary 16-bit; silence is 32768.
#[cfg_attr(not(feature = "audio"), allow(dead_code))]
pub(crate) fn f32_to_u16(s: f32) -> u16 {
    (f32_to_i16(s) as i32 + 32_768) as u16
}

#[cfg(feature = "audio")]
mod cpal_backend {
    use super::{f32_to_i16, f32_to_u16, OutputRequest};
    use crate::error::{Result, SynthError};
    use crate::voice::Oscillator;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::{Device, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig};
    use log::{error, info, warn};
    use std::sync::atomic::Ordering;

    /// Open the default output device. An f32 layout at the requested rate
    /// wins, fewest channels first; otherwise the device default is used
    /// and integer formats are converted from an f32 scratch buffer.
    pub fn open(req: OutputRequest) -> Result<Stream> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| SynthError::Device("No default audio output device found".into()))?;

        info!(
            "Audio output: {}",
            device.name().unwrap_or_else(|_| "unknown".into())
        );

        let wanted = SampleRate(req.sample_rate);
        let preferred = device.supported_output_configs().ok().and_then(|configs| {
            configs
                .filter(|c| {
                    c.sample_format() == SampleFormat::F32
                        && c.min_sample_rate() <= wanted
                        && c.max_sample_rate() >= wanted
                })
                .min_by_key(|c| c.channels())
                .map(|c| c.with_sample_rate(wanted))
        });

        let supported = match preferred {
            Some(cfg) => cfg,
            None => {
                let fallback = device
                    .default_output_config()
                    .map_err(|e| SynthError::Device(format!("No supported output config: {e}")))?;
                warn!(
                    "No f32 output at {} Hz; using device default {} ch at {} Hz {:?}",
                    req.sample_rate,
                    fallback.channels(),
                    fallback.sample_rate().0,
                    fallback.sample_format()
                );
                fallback
            }
        };

        let format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let channels = config.channels as usize;
        let sample_rate = config.sample_rate.0;
        info!(
            "Output config: {}Hz  {} ch  {:?}",
            sample_rate, channels, format
        );

        let mut osc = Oscillator::new(req.voice, sample_rate, req.rendered);
        let scratch_len = req.block_size * channels;
        let fault = req.fault;
        let control = req.control;
        let err_fn = move |e: cpal::StreamError| {
            error!("Audio stream error: {e}");
            fault.store(true, Ordering::Release);
            control.shutdown();
        };

        let stream = match format {
            SampleFormat::F32 => device
                .build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        osc.render_interleaved(data, channels);
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| SynthError::Device(format!("build output stream: {e}")))?,
            SampleFormat::I16 => {
                build_converted(&device, &config, osc, scratch_len, f32_to_i16, err_fn)?
            }
            SampleFormat::U16 => {
                build_converted(&device, &config, osc, scratch_len, f32_to_u16, err_fn)?
            }
            fmt => {
                return Err(SynthError::Device(format!(
                    "Unsupported sample format {fmt:?}. Use an F32, I16 or U16 device."
                )))
            }
        };

        stream
            .play()
            .map_err(|e| SynthError::Device(format!("start output stream: {e}")))?;

        Ok(stream)
    }

    /// Integer-format stream: render f32 into `scratch`, then convert.
    fn build_converted<T, C, E>(
        device: &Device,
        config: &StreamConfig,
        mut osc: Oscillator,
        scratch_len: usize,
        convert: C,
        err_fn: E,
    ) -> Result<Stream>
    where
        T: SizedSample + Send + 'static,
        C: Fn(f32) -> T + Send + 'static,
        E: FnMut(cpal::StreamError) + Send + 'static,
    {
        let channels = config.channels as usize;
        let mut scratch = vec![0.0f32; scratch_len];
        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    // Only grows if the host hands over more than one block
                    if scratch.len() < data.len() {
                        scratch.resize(data.len(), 0.0);
                    }
                    let buf = &mut scratch[..data.len()];
                    osc.render_interleaved(buf, channels);
                    for (out, &s) in data.iter_mut().zip(buf.iter()) {
                        *out = convert(s);
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| SynthError::Device(format!("build output stream: {e}")))
    }
}
