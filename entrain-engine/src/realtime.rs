//! Device output through cpal.
//!
//! [`CpalHost`] opens an output stream on the chosen device. The stream's
//! callback owns a [`Mixer`]; voices reach it over a channel and finished
//! voices travel back over a second one, so the callback neither locks,
//! allocates nor frees.
//!
//! A stream error (device unplugged, backend hiccup) closes the context for
//! good: cpal keeps answering `play()` on a dead stream, so the next
//! `acquire` opens a fresh one instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use log::{debug, info};

use crate::context::{AudioContext, AudioHost, ContextState};
use crate::error::{ContextError, EngineError, Result};
use crate::graph::{Mixer, StereoSource};

type SourceBox = Box<dyn StereoSource + Send>;

/// Frames mixed per pass; larger device buffers are rendered in chunks.
const SCRATCH_FRAMES: usize = 8_192;

/// Voices the callback can hold at once, fading ones included.
const MAX_SOURCES: usize = 16;

/// Names of the default host's output devices.
pub fn list_output_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host.output_devices().map_err(backend)?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Name of the default output device, if there is one.
pub fn default_output_device_name() -> Option<String> {
    cpal::default_host().default_output_device().and_then(|d| d.name().ok())
}

#[derive(Clone, Debug, Default)]
pub struct CpalHost {
    device_name: Option<String>,
    sample_rate: Option<u32>,
}

impl CpalHost {
    pub fn new() -> Self { Self::default() }

    /// Use the output device called `name` instead of the default one.
    pub fn with_device(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    /// Ask for `sr`; the nearest rate the device supports is used.
    pub fn with_sample_rate(mut self, sr: u32) -> Self {
        self.sample_rate = Some(sr);
        self
    }
}

impl AudioHost for CpalHost {
    fn create_context(&mut self) -> Result<Box<dyn AudioContext>> {
        let device = pick_device(self.device_name.as_deref())?;
        let device_name = device.name().unwrap_or_else(|_| "<unnamed>".into());
        let supported = choose_config(&device, self.sample_rate)?;
        if supported.channels() < 2 {
            return Err(EngineError::context_unavailable(format!(
                "{device_name} has no stereo output ({} channel(s))",
                supported.channels()
            )));
        }
        let sample_format = supported.sample_format();
        let cfg = supported.config();
        debug!("stream config for {device_name}: {cfg:?} ({sample_format:?})");

        let (tx, rx) = crossbeam_channel::unbounded::<SourceBox>();
        let (retire_tx, retire_rx) = crossbeam_channel::bounded::<SourceBox>(MAX_SOURCES);
        let faulted = Arc::new(AtomicBool::new(false));
        let queues = Queues { incoming: rx, retired: retire_tx };
        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &cfg, queues, Arc::clone(&faulted))?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &cfg, queues, Arc::clone(&faulted))?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &cfg, queues, Arc::clone(&faulted))?,
            other => {
                return Err(EngineError::context_unavailable(format!(
                    "unsupported device sample format: {other:?}"
                )))
            }
        };
        stream.play().map_err(backend)?;
        info!("output stream on {device_name} started");

        Ok(Box::new(CpalContext {
            stream: Some(stream),
            sources: tx,
            retired: retire_rx,
            faulted,
            sample_rate: cfg.sample_rate.0 as f32,
            channels: cfg.channels,
            device_name,
        }))
    }
}

/// A running cpal output stream.
pub struct CpalContext {
    stream: Option<cpal::Stream>,
    sources: Sender<SourceBox>,
    retired: Receiver<SourceBox>,
    faulted: Arc<AtomicBool>,
    sample_rate: f32,
    channels: u16,
    device_name: String,
}

impl CpalContext {
    pub fn device_name(&self) -> &str { &self.device_name }

    pub fn channels(&self) -> u16 { self.channels }

    /// Free voices the callback has finished with.
    fn reap(&self) -> usize { self.retired.try_iter().count() }
}

/// Context state for a stream that may have reported an error.
fn stream_state(has_stream: bool, faulted: bool) -> ContextState {
    if has_stream && !faulted {
        ContextState::Running
    } else {
        ContextState::Closed
    }
}

impl AudioContext for CpalContext {
    fn state(&self) -> ContextState {
        stream_state(self.stream.is_some(), self.faulted.load(Ordering::Acquire))
    }

    fn resume(&mut self) -> std::result::Result<(), ContextError> {
        if self.state() == ContextState::Closed {
            return Err(ContextError::Closed);
        }
        let stream = self.stream.as_ref().ok_or(ContextError::Closed)?;
        stream.play().map_err(|e| ContextError::ResumeFailed(e.to_string()))
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            // best effort; dropping the stream releases the device either way
            let _ = stream.pause();
        }
    }

    fn sample_rate(&self) -> f32 { self.sample_rate }

    fn connect(&mut self, source: SourceBox) -> std::result::Result<(), ContextError> {
        if self.state() == ContextState::Closed {
            return Err(ContextError::Closed);
        }
        let freed = self.reap();
        if freed > 0 {
            debug!("freed {freed} finished voice(s)");
        }
        self.sources
            .send(source)
            .map_err(|_| ContextError::Backend("output stream dropped its source queue".into()))
    }

    fn describe(&self) -> String {
        format!("{}, {} Hz, {} ch", self.device_name, self.sample_rate, self.channels)
    }
}

fn backend(e: impl std::fmt::Display) -> EngineError {
    EngineError::context_unavailable(e.to_string())
}

fn pick_device(name: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();
    if let Some(name) = name {
        for d in host.output_devices().map_err(backend)? {
            if d.name().map_or(false, |n| n == name) {
                return Ok(d);
            }
        }
        return Err(EngineError::context_unavailable(format!("requested device not found: {name}")));
    }
    host.default_output_device()
        .ok_or_else(|| EngineError::context_unavailable("no default output device"))
}

/// Best supported config for stereo output near `req_sr`.
fn choose_config(device: &cpal::Device, req_sr: Option<u32>) -> Result<cpal::SupportedStreamConfig> {
    if req_sr.is_none() {
        let default = device.default_output_config().map_err(backend)?;
        if default.channels() == 2 {
            return Ok(default);
        }
    }

    let mut best: Option<(u64, cpal::SupportedStreamConfigRange)> = None;
    for range in device.supported_output_configs().map_err(backend)? {
        let ch = range.channels();
        let sr_min = range.min_sample_rate().0;
        let sr_max = range.max_sample_rate().0;

        // mono is only a last resort; more than two channels is fine
        let ch_pen: u64 = if ch < 2 { 1_000_000 } else { u64::from(ch - 2) };
        let sr_pen = match req_sr {
            Some(sr) if !(sr_min..=sr_max).contains(&sr) => u64::from(sr_min.abs_diff(sr).min(sr_max.abs_diff(sr))),
            _ => 0,
        };

        let score = sr_pen.saturating_mul(1000) + ch_pen;
        if best.as_ref().map_or(true, |(s, _)| score < *s) {
            best = Some((score, range));
        }
    }

    let (_, range) = best.ok_or_else(|| EngineError::context_unavailable("no supported output configs"))?;
    let lo = range.min_sample_rate().0;
    let hi = range.max_sample_rate().0;
    let pick_sr = req_sr.unwrap_or(48_000).clamp(lo, hi);
    Ok(range.with_sample_rate(cpal::SampleRate(pick_sr)))
}

/// Channels between the control thread and the stream callback.
struct Queues {
    incoming: Receiver<SourceBox>,
    retired: Sender<SourceBox>,
}

fn build_stream<T>(
    device: &cpal::Device,
    cfg: &cpal::StreamConfig,
    queues: Queues,
    faulted: Arc<AtomicBool>,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::FromSample<f32> + cpal::SizedSample + Send + 'static,
{
    let channels = usize::from(cfg.channels);
    let Queues { incoming, retired } = queues;
    let mut mixer = Mixer::with_capacity(cfg.sample_rate.0 as f32, MAX_SOURCES);
    let mut scratch = vec![0.0f32; SCRATCH_FRAMES * channels.max(1)];

    let stream = device
        .build_output_stream(
            cfg,
            move |output: &mut [T], _| {
                while let Ok(source) = incoming.try_recv() {
                    if let Err(source) = mixer.try_add(source) {
                        // full: hand it straight back, it never sounds
                        let _ = retired.try_send(source);
                    }
                }
                for chunk in output.chunks_mut(scratch.len()) {
                    let buf = &mut scratch[..chunk.len()];
                    mixer.render_with(buf, channels, |done| {
                        // a full return queue means the control side stopped reaping
                        let _ = retired.try_send(done);
                    });
                    for (o, s) in chunk.iter_mut().zip(buf.iter()) {
                        *o = T::from_sample(s.clamp(-1.0, 1.0));
                    }
                }
            },
            move |_err: cpal::StreamError| faulted.store(true, Ordering::Release),
            None,
        )
        .map_err(backend)?;

    Ok(stream)
}
