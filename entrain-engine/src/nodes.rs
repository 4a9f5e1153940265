//! Building blocks (nodes) for the tone graph.
//!
//! These are zero-allocation, per-sample components designed for realtime use.
//! Everything here is `Copy` or small and cheap to move; no locks, no heap.
//!
//! Contents:
//! - `SineOsc`        : sine tone generator with a smoothed frequency input
//! - `Gain`           : smoothed linear gain stage
//! - `ChannelMerger`  : explicit stereo routing into interleaved device frames
//!
//! Notes:
//! - Frequency is **Hz**; methods expect the current **sample rate** when stepping.
//! - Smoothing is exponential (one-pole), never a linear ramp or a step.

use entrain_core::dsp::{kill_denormals, sine01, wrap_phase01};
use entrain_core::smoothing::SlewLimiter;

/// Free-running sine oscillator whose frequency glides towards its target.
#[derive(Copy, Clone, Debug)]
pub struct SineOsc {
    phase: f32,   // [0,1)
    freq:  SlewLimiter,
    running: bool,
}

impl SineOsc {
    #[inline]
    pub fn new(freq_hz: f32, glide_ms: f32, sr: f32) -> Self {
        let mut freq = SlewLimiter::new(glide_ms, sr);
        freq.reset(freq_hz.max(0.0));
        Self { phase: 0.0, freq, running: false }
    }

    #[inline] pub fn start(&mut self) { self.running = true; }
    #[inline] pub fn stop(&mut self) { self.running = false; }

    #[inline] pub fn set_glide_ms(&mut self, glide_ms: f32, sr: f32) { self.freq.set_time_ms(glide_ms, sr); }

    /// Jump to `hz` without a glide.
    #[inline] pub fn snap_freq(&mut self, hz: f32) { self.freq.reset(hz.max(0.0)); }

    /// Current (smoothed) frequency.
    #[inline] pub fn freq(&self) -> f32 { self.freq.value() }

    /// Advance one sample towards `target_hz`. A stopped oscillator is silent
    /// and holds its phase.
    #[inline]
    pub fn next(&mut self, target_hz: f32, sr: f32) -> f32 {
        if !self.running {
            return 0.0;
        }
        let hz = self.freq.process(target_hz.max(0.0));
        let s = sine01(self.phase);
        self.phase = wrap_phase01(self.phase + hz / sr);
        s
    }
}

/// Linear gain stage with exponential smoothing.
#[derive(Copy, Clone, Debug)]
pub struct Gain {
    level: SlewLimiter,
}

impl Gain {
    #[inline]
    pub fn new(initial: f32, t_ms: f32, sr: f32) -> Self {
        let mut level = SlewLimiter::new(t_ms, sr);
        level.reset(initial);
        Self { level }
    }

    #[inline] pub fn set_time_ms(&mut self, t_ms: f32, sr: f32) { self.level.set_time_ms(t_ms, sr); }
    #[inline] pub fn level(&self) -> f32 { self.level.value() }

    /// Apply the gain to `x` while gliding towards `target`.
    #[inline]
    pub fn process(&mut self, x: f32, target: f32) -> f32 {
        kill_denormals(x * self.level.process(target))
    }
}

/// Stereo combiner with an explicit layout: input 0 goes to device channel 0
/// (left), input 1 to device channel 1 (right). Extra device channels stay
/// silent; nothing is down-mixed.
#[derive(Copy, Clone, Debug)]
pub struct ChannelMerger {
    pub left: usize,
    pub right: usize,
}

impl Default for ChannelMerger {
    fn default() -> Self { Self { left: 0, right: 1 } }
}

impl ChannelMerger {
    /// Accumulate one stereo frame into an interleaved device frame.
    #[inline]
    pub fn mix_into(&self, frame: &mut [f32], l: f32, r: f32) {
        if let Some(slot) = frame.get_mut(self.left) { *slot += l; }
        if let Some(slot) = frame.get_mut(self.right) { *slot += r; }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn stopped_osc_is_silent() {
        let mut osc = SineOsc::new(440.0, 100.0, 48_000.0);
        for _ in 0..100 {
            assert_eq!(osc.next(440.0, 48_000.0), 0.0);
        }
    }

    #[test]
    fn osc_period_matches_frequency() {
        let sr = 48_000.0;
        let mut osc = SineOsc::new(1_000.0, 0.0, sr);
        osc.start();
        // count upward zero crossings over one second
        let mut prev = osc.next(1_000.0, sr);
        let mut crossings = 0;
        for _ in 1..48_000 {
            let s = osc.next(1_000.0, sr);
            if prev < 0.0 && s >= 0.0 { crossings += 1; }
            prev = s;
        }
        assert!((999..=1001).contains(&crossings), "crossings={crossings}");
    }

    #[test]
    fn osc_frequency_glides() {
        let sr = 48_000.0;
        let mut osc = SineOsc::new(195.0, 100.0, sr);
        osc.start();
        osc.next(148.0, sr);
        assert!(osc.freq() < 195.0 && osc.freq() > 190.0);
        for _ in 0..48_000 { osc.next(148.0, sr); }
        assert_abs_diff_eq!(osc.freq(), 148.0, epsilon = 0.01);
    }

    #[test]
    fn merger_routes_explicitly() {
        let m = ChannelMerger::default();
        let mut frame = [0.0f32; 4];
        m.mix_into(&mut frame, 0.25, -0.5);
        assert_eq!(frame, [0.25, -0.5, 0.0, 0.0]);

        let mut mono = [0.0f32; 1];
        m.mix_into(&mut mono, 0.25, -0.5);
        assert_eq!(mono, [0.25]);
    }

    #[test]
    fn gain_glides_to_target() {
        let mut g = Gain::new(0.0, 10.0, 48_000.0);
        let first = g.process(1.0, 1.0);
        assert!(first > 0.0 && first < 0.01);
        for _ in 0..48_000 { g.process(1.0, 1.0); }
        assert_abs_diff_eq!(g.level(), 1.0, epsilon = 1e-4);
    }
}
