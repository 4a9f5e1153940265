//! Subcommand implementations.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use log::{info, warn};

use entrain_engine::realtime::{default_output_device_name, list_output_devices};
use entrain_engine::{
    CpalHost, EngineConfig, FrameLoop, LoopExit, ManualClock, MonotonicClock, OfflineHost, PlaybackController,
    PlaybackEvent, Preset, StageTimeline,
};

use crate::cli::{BitDepth, SessionArgs};

/// Frames rendered after the session ends so the voice can fade out.
const TAIL_SECS: f64 = 0.25;

pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(p) => EngineConfig::from_json_file(p).with_context(|| format!("reading config {}", p.display())),
        None => Ok(EngineConfig::default()),
    }
}

/// Timeline named by the session arguments.
pub fn resolve_timeline(args: &SessionArgs) -> Result<StageTimeline> {
    if let Some(path) = &args.timeline {
        return StageTimeline::from_json_file(path).with_context(|| format!("loading timeline {}", path.display()));
    }
    if let Some(name) = &args.preset {
        let Some(preset) = Preset::by_name(name) else {
            let known: Vec<_> = Preset::names().collect();
            bail!("unknown preset '{name}' (available: {})", known.join(", "));
        };
        return Ok(preset.timeline()?);
    }
    Ok(StageTimeline::single(args.carrier, args.beat, args.duration)?)
}

fn log_event(event: &PlaybackEvent) {
    match event {
        PlaybackEvent::Started { stages, total_secs } => {
            info!("started: {stages} stage(s), {}", fmt_secs(*total_secs));
        }
        PlaybackEvent::StageChanged { to, state, .. } => info!(
            "stage {} | carrier {:.1} Hz, beat {:.2} Hz | {} left",
            to + 1,
            state.current_carrier_hz(),
            state.current_beat_hz(),
            fmt_secs(state.remaining_secs)
        ),
        PlaybackEvent::Completed => info!("session complete"),
        PlaybackEvent::Stopped => info!("stopped"),
        PlaybackEvent::Paused(_) | PlaybackEvent::Resumed(_) | PlaybackEvent::Progress(_) => {}
    }
}

fn fmt_secs(secs: f64) -> String {
    let s = secs.max(0.0).round() as u64;
    format!("{}:{:02}", s / 60, s % 60)
}

pub fn play(
    mut config: EngineConfig,
    session: &SessionArgs,
    device: Option<String>,
    sample_rate: Option<u32>,
    limit: Option<f64>,
) -> Result<()> {
    let timeline = resolve_timeline(session)?;
    if let Some(v) = session.volume {
        config.default_volume = v;
    }

    let mut host = CpalHost::new();
    if let Some(name) = device {
        host = host.with_device(name);
    }
    if let Some(sr) = sample_rate.or(config.sample_rate) {
        host = host.with_sample_rate(sr);
    }

    let frame_rate = config.frame_rate_hz;
    let mut ctl = PlaybackController::with_clock(host, MonotonicClock::new(), config);
    ctl.subscribe(log_event);
    ctl.play_timeline(timeline).context("starting playback")?;

    let frame_loop = FrameLoop::with_rate(frame_rate);
    let exit = frame_loop.run(&mut ctl, |ctl, state| {
        if limit.is_some_and(|l| state.total_elapsed_secs >= l) {
            info!("time limit reached");
            ctl.stop();
        }
    });
    if exit == LoopExit::Cancelled {
        warn!("frame loop cancelled");
    }
    ctl.shutdown();
    Ok(())
}

pub fn render(
    mut config: EngineConfig,
    session: &SessionArgs,
    out: &Path,
    sample_rate: u32,
    bits: BitDepth,
) -> Result<()> {
    let timeline = resolve_timeline(session)?;
    if let Some(v) = session.volume {
        config.default_volume = v;
    }
    let total = timeline.total_duration();

    let host = OfflineHost::new(sample_rate as f32);
    let handle = host.handle();
    let clock = ManualClock::new();
    let frame_rate = config.frame_rate_hz;
    let mut ctl = PlaybackController::with_clock(host, clock.clone(), config);
    ctl.subscribe(log_event);
    ctl.play_timeline(timeline).context("starting render")?;

    let mut writer = WavSink::create(out, sample_rate, bits)?;
    let sr = f64::from(sample_rate);
    let block = ((sr / frame_rate).round() as usize).max(1);
    let mut frames: u64 = 0;

    info!("rendering {} to {}", fmt_secs(total), out.display());
    loop {
        // clock from the frame count, so the file and the session agree exactly
        clock.set(Duration::from_secs_f64(frames as f64 / sr));
        ctl.tick();
        if !ctl.is_playing() {
            break;
        }
        writer.write(&handle.render(block))?;
        frames += block as u64;
    }
    writer.write(&handle.render((sr * TAIL_SECS) as usize))?;
    writer.finalize()?;

    ctl.shutdown();
    info!("wrote {} ({} frames at {sample_rate} Hz)", out.display(), handle.frames_rendered());
    Ok(())
}

pub fn presets() {
    for preset in Preset::ALL {
        println!(
            "{:<10} {:>6}  {:>2} stage(s)  {}",
            preset.name,
            fmt_secs(preset.total_duration_secs()),
            preset.stage_count(),
            preset.description
        );
    }
}

pub fn devices() -> Result<()> {
    let default = default_output_device_name();
    let names = list_output_devices().context("listing output devices")?;
    if names.is_empty() {
        println!("No output devices found.");
        return Ok(());
    }
    println!("Available output devices:");
    for name in names {
        let marker = if default.as_deref() == Some(name.as_str()) { " (default)" } else { "" };
        println!("- {name}{marker}");
    }
    Ok(())
}

/// WAV writer for interleaved stereo `f32` blocks.
struct WavSink {
    writer: WavWriter<BufWriter<File>>,
    bits: BitDepth,
}

impl WavSink {
    fn create(path: &Path, sample_rate: u32, bits: BitDepth) -> Result<Self> {
        let spec = match bits {
            BitDepth::Int16 => WavSpec { channels: 2, sample_rate, bits_per_sample: 16, sample_format: SampleFormat::Int },
            BitDepth::Float32 => {
                WavSpec { channels: 2, sample_rate, bits_per_sample: 32, sample_format: SampleFormat::Float }
            }
        };
        let writer = WavWriter::create(path, spec).with_context(|| format!("creating {}", path.display()))?;
        Ok(Self { writer, bits })
    }

    fn write(&mut self, interleaved: &[f32]) -> Result<()> {
        for &s in interleaved {
            let s = s.clamp(-1.0, 1.0);
            match self.bits {
                BitDepth::Int16 => self.writer.write_sample((s * 32_767.0) as i16)?,
                BitDepth::Float32 => self.writer.write_sample(s)?,
            }
        }
        Ok(())
    }

    fn finalize(self) -> Result<()> {
        self.writer.finalize().context("finalizing WAV")?;
        Ok(())
    }
}
