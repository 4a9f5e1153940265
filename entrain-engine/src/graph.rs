//! The binaural tone graph.
//!
//! Two halves share one [`ToneParams`] block:
//! - [`ToneVoice`] runs on the audio thread: two sine generators, a gain per
//!   channel, an explicit stereo merger and a master gain. It reads parameter
//!   targets from atomics and smooths them per sample.
//! - [`ToneGraph`] is the control-side handle owned by the playback
//!   controller. It only writes targets; it never touches the voice.
//!
//! Design goals
//! - No locks while rendering; a [`Mixer`] built with capacity never grows
//!   on the audio thread and can hand finished voices back for freeing
//! - Frequency and gain changes are exponential glides, never steps
//! - Teardown is a flag: the voice fades its channels out, reports itself
//!   finished and the context's [`Mixer`] drops it

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use entrain_core::binaural::BinauralPair;
use log::debug;

use crate::context::AudioContext;
use crate::error::ContextError;
use crate::nodes::{ChannelMerger, Gain, SineOsc};

/// Channel gain while a voice is sounding (headroom for two full-scale sines).
pub const CHANNEL_LEVEL: f32 = 0.5;

/// Fade applied by the per-channel gains on start and teardown.
const CHANNEL_FADE_MS: f32 = 10.0;

/// Channel gain below which a stopping voice counts as silent.
const SILENCE: f32 = 1.0e-4;

/// Anything the audio context can render into an interleaved buffer.
pub trait StereoSource {
    /// Called once when the source is attached, with the device sample rate.
    fn reset(&mut self, sr: f32);

    /// **Add** `out.len() / channels` frames into `out`.
    fn render(&mut self, out: &mut [f32], channels: usize);

    /// A finished source is dropped by the mixer.
    fn is_finished(&self) -> bool;
}

/// Sum of all attached sources; lives wherever the rendering happens.
pub struct Mixer {
    sr: f32,
    sources: Vec<Box<dyn StereoSource + Send>>,
}

impl Mixer {
    pub fn new(sr: f32) -> Self { Self::with_capacity(sr, 4) }

    /// Mixer that holds up to `capacity` sources without reallocating.
    pub fn with_capacity(sr: f32, capacity: usize) -> Self {
        Self { sr: sr.max(1.0), sources: Vec::with_capacity(capacity) }
    }

    pub fn sample_rate(&self) -> f32 { self.sr }

    pub fn add(&mut self, mut source: Box<dyn StereoSource + Send>) {
        source.reset(self.sr);
        self.sources.push(source);
    }

    /// Attach `source` only if that needs no reallocation; otherwise give it back.
    pub fn try_add(
        &mut self,
        source: Box<dyn StereoSource + Send>,
    ) -> std::result::Result<(), Box<dyn StereoSource + Send>> {
        if self.sources.len() == self.sources.capacity() {
            return Err(source);
        }
        self.add(source);
        Ok(())
    }

    /// Number of sources still attached.
    pub fn len(&self) -> usize { self.sources.len() }

    pub fn is_empty(&self) -> bool { self.sources.is_empty() }

    /// Overwrite `out` with the mix of all sources and drop finished ones.
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        self.render_with(out, channels, drop);
    }

    /// Like [`Mixer::render`], but finished sources are passed to `retire`
    /// instead of being dropped in place.
    pub fn render_with(
        &mut self,
        out: &mut [f32],
        channels: usize,
        mut retire: impl FnMut(Box<dyn StereoSource + Send>),
    ) {
        out.fill(0.0);
        if channels == 0 {
            return;
        }
        for source in &mut self.sources {
            source.render(out, channels);
        }
        let mut i = 0;
        while i < self.sources.len() {
            if self.sources[i].is_finished() {
                retire(self.sources.swap_remove(i));
            } else {
                i += 1;
            }
        }
    }

    /// Drop every source immediately.
    pub fn clear(&mut self) { self.sources.clear(); }
}

#[inline]
fn load_f32(cell: &AtomicU32) -> f32 { f32::from_bits(cell.load(Ordering::Relaxed)) }

#[inline]
fn store_f32(cell: &AtomicU32, v: f32) { cell.store(v.to_bits(), Ordering::Relaxed); }

/// Parameter block shared between [`ToneGraph`] and [`ToneVoice`].
#[derive(Debug)]
pub struct ToneParams {
    left_hz: AtomicU32,
    right_hz: AtomicU32,
    master: AtomicU32,
    glide_ms: AtomicU32,
    /// Set with new targets that must be applied without a glide.
    snap: AtomicBool,
    stopped: AtomicBool,
    // published by the voice after every block
    live_left_hz: AtomicU32,
    live_right_hz: AtomicU32,
    live_master: AtomicU32,
}

impl ToneParams {
    fn new(master: f32, glide_ms: f32) -> Self {
        Self {
            left_hz: AtomicU32::new(0f32.to_bits()),
            right_hz: AtomicU32::new(0f32.to_bits()),
            master: AtomicU32::new(master.to_bits()),
            glide_ms: AtomicU32::new(glide_ms.to_bits()),
            snap: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            live_left_hz: AtomicU32::new(0f32.to_bits()),
            live_right_hz: AtomicU32::new(0f32.to_bits()),
            live_master: AtomicU32::new(master.to_bits()),
        }
    }
}

/// Audio-thread half of the graph.
pub struct ToneVoice {
    params: Arc<ToneParams>,
    sr: f32,
    glide_ms: f32,
    osc_l: SineOsc,
    osc_r: SineOsc,
    gain_l: Gain,
    gain_r: Gain,
    merger: ChannelMerger,
    master: Gain,
    finished: bool,
}

impl ToneVoice {
    fn new(params: Arc<ToneParams>) -> Self {
        let sr = 48_000.0;
        let glide_ms = load_f32(&params.glide_ms);
        let master = load_f32(&params.master);
        Self {
            params,
            sr,
            glide_ms,
            osc_l: SineOsc::new(0.0, glide_ms, sr),
            osc_r: SineOsc::new(0.0, glide_ms, sr),
            gain_l: Gain::new(0.0, CHANNEL_FADE_MS, sr),
            gain_r: Gain::new(0.0, CHANNEL_FADE_MS, sr),
            merger: ChannelMerger::default(),
            master: Gain::new(master, glide_ms, sr),
            finished: false,
        }
    }

    fn apply_glide(&mut self, glide_ms: f32) {
        self.glide_ms = glide_ms;
        self.osc_l.set_glide_ms(glide_ms, self.sr);
        self.osc_r.set_glide_ms(glide_ms, self.sr);
        self.master.set_time_ms(glide_ms, self.sr);
    }
}

impl StereoSource for ToneVoice {
    fn reset(&mut self, sr: f32) {
        self.sr = sr.max(1.0);
        self.apply_glide(self.glide_ms);
        self.gain_l.set_time_ms(CHANNEL_FADE_MS, self.sr);
        self.gain_r.set_time_ms(CHANNEL_FADE_MS, self.sr);
        self.osc_l.start();
        self.osc_r.start();
    }

    fn render(&mut self, out: &mut [f32], channels: usize) {
        if self.finished || channels == 0 {
            return;
        }
        let p = &self.params;

        let glide_ms = load_f32(&p.glide_ms);
        if glide_ms != self.glide_ms {
            self.apply_glide(glide_ms);
        }

        let p = &self.params;
        let snap = p.snap.swap(false, Ordering::Acquire);
        let left_hz = load_f32(&p.left_hz);
        let right_hz = load_f32(&p.right_hz);
        let master = load_f32(&p.master);
        let stopping = p.stopped.load(Ordering::Acquire);
        if snap {
            self.osc_l.snap_freq(left_hz);
            self.osc_r.snap_freq(right_hz);
        }
        let channel_target = if stopping { 0.0 } else { CHANNEL_LEVEL };

        let sr = self.sr;
        for frame in out.chunks_mut(channels) {
            let l = self.gain_l.process(self.osc_l.next(left_hz, sr), channel_target);
            let r = self.gain_r.process(self.osc_r.next(right_hz, sr), channel_target);
            let l = self.master.process(l, master);
            // same smoothed level for both ears; the master stage is shared
            let r = r * self.master.level();
            self.merger.mix_into(frame, l, r);
        }

        store_f32(&self.params.live_left_hz, self.osc_l.freq());
        store_f32(&self.params.live_right_hz, self.osc_r.freq());
        store_f32(&self.params.live_master, self.master.level());

        if stopping && self.gain_l.level() < SILENCE && self.gain_r.level() < SILENCE {
            self.osc_l.stop();
            self.osc_r.stop();
            self.finished = true;
        }
    }

    fn is_finished(&self) -> bool { self.finished }
}

/// Receiver of frequency updates from the transition scheduler.
pub trait ToneTarget {
    /// Apply immediately; there is no prior tone to glide from.
    fn snap_to(&mut self, pair: BinauralPair);

    /// Glide to `pair` with the graph's smoothing time constant.
    fn glide_to(&mut self, pair: BinauralPair);

    /// Stop the tones and release the graph.
    fn silence(&mut self);

    /// Frequencies currently requested of the graph.
    fn frequencies(&self) -> BinauralPair;
}

/// Control-side handle of a live tone graph.
///
/// All operations are silent no-ops unless the graph is initialized.
#[derive(Debug)]
pub struct ToneGraph {
    live: Option<Arc<ToneParams>>,
    targets: BinauralPair,
    master: f32,
    glide_ms: f32,
}

impl ToneGraph {
    pub fn new(glide_ms: f32) -> Self {
        Self { live: None, targets: BinauralPair::SILENT, master: 0.0, glide_ms: glide_ms.max(0.0) }
    }

    /// Build the voice and attach it to `ctx`. Any previous voice is torn down.
    /// Both generators start at the same (zero) frequency.
    pub fn initialize(&mut self, ctx: &mut dyn AudioContext, master_gain: f32) -> Result<(), ContextError> {
        self.teardown();
        let master = master_gain.clamp(0.0, 1.0);
        let params = Arc::new(ToneParams::new(master, self.glide_ms));
        ctx.connect(Box::new(ToneVoice::new(Arc::clone(&params))))?;
        self.live = Some(params);
        self.targets = BinauralPair::SILENT;
        self.master = master;
        debug!("tone graph initialized (master {master:.2}, glide {:.0} ms)", self.glide_ms);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool { self.live.is_some() }

    /// Glide both ears to new frequencies.
    pub fn set_frequencies(&mut self, left_hz: f64, right_hz: f64) {
        if let Some(p) = &self.live {
            store_f32(&p.left_hz, left_hz as f32);
            store_f32(&p.right_hz, right_hz as f32);
            self.targets = BinauralPair::new(left_hz, right_hz);
        }
    }

    /// Set both ears without a glide.
    pub fn snap_frequencies(&mut self, left_hz: f64, right_hz: f64) {
        if let Some(p) = &self.live {
            store_f32(&p.left_hz, left_hz as f32);
            store_f32(&p.right_hz, right_hz as f32);
            p.snap.store(true, Ordering::Release);
            self.targets = BinauralPair::new(left_hz, right_hz);
        }
    }

    /// Master level, linear `0..=1`, smoothed.
    pub fn set_master_gain(&mut self, gain: f32) {
        if let Some(p) = &self.live {
            let g = if gain.is_finite() { gain.clamp(0.0, 1.0) } else { 0.0 };
            store_f32(&p.master, g);
            self.master = g;
        }
    }

    /// Change the glide time constant; applies to the live voice too.
    pub fn set_glide_ms(&mut self, glide_ms: f32) {
        self.glide_ms = glide_ms.max(0.0);
        if let Some(p) = &self.live {
            store_f32(&p.glide_ms, self.glide_ms);
        }
    }

    /// Stop generators and disconnect the voice. Idempotent.
    pub fn teardown(&mut self) {
        if let Some(p) = self.live.take() {
            p.stopped.store(true, Ordering::Release);
            debug!("tone graph torn down");
        }
        self.targets = BinauralPair::SILENT;
        self.master = 0.0;
    }

    /// Nominal frequencies last requested ([`BinauralPair::SILENT`] when idle).
    pub fn target_frequencies(&self) -> BinauralPair { self.targets }

    /// Smoothed frequencies as last rendered by the audio thread.
    pub fn live_frequencies(&self) -> Option<BinauralPair> {
        self.live.as_ref().map(|p| {
            BinauralPair::new(f64::from(load_f32(&p.live_left_hz)), f64::from(load_f32(&p.live_right_hz)))
        })
    }

    /// Nominal master gain last requested.
    pub fn master_gain(&self) -> f32 { self.master }

    /// Smoothed master gain as last rendered by the audio thread.
    pub fn live_master_gain(&self) -> Option<f32> {
        self.live.as_ref().map(|p| load_f32(&p.live_master))
    }
}

impl ToneTarget for ToneGraph {
    fn snap_to(&mut self, pair: BinauralPair) { self.snap_frequencies(pair.left_hz, pair.right_hz); }
    fn glide_to(&mut self, pair: BinauralPair) { self.set_frequencies(pair.left_hz, pair.right_hz); }
    fn silence(&mut self) { self.teardown(); }
    fn frequencies(&self) -> BinauralPair { self.targets }
}

impl Drop for ToneGraph {
    fn drop(&mut self) { self.teardown(); }
}
