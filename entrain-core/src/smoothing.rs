//! Parameter smoothing.
//!
//! `SlewLimiter` is the exponential-approach primitive behind every audible
//! parameter change in the engine (tone frequencies, channel and master
//! gains). Step changes at stage boundaries would click; a one-pole glide
//! with a ~100 ms time constant does not.

use crate::dsp::{m_abs, one_pole_coeff_ms};

/// One-pole slew/smoother: `y += (x - y) * (1 - a)`
///
/// With `a = one_pole_coeff_ms(t_ms, sr)` the output covers ~63% of a step in
/// `t_ms` milliseconds and ~95% in three time constants.
#[derive(Copy, Clone, Debug)]
pub struct SlewLimiter {
    alpha: f32,
    y:     f32,
}

impl SlewLimiter {
    #[inline]
    pub fn new(t_ms: f32, sr: f32) -> Self {
        Self { alpha: one_pole_coeff_ms(t_ms, sr), y: 0.0 }
    }

    #[inline]
    pub fn set_time_ms(&mut self, t_ms: f32, sr: f32) {
        self.alpha = one_pole_coeff_ms(t_ms, sr);
    }

    /// Jump straight to `y0` (no glide).
    #[inline]
    pub fn reset(&mut self, y0: f32) { self.y = y0; }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        self.y += (x - self.y) * (1.0 - self.alpha);
        self.y
    }

    #[inline]
    pub fn value(&self) -> f32 { self.y }

    /// True once the output is within `tolerance` of `target`.
    #[inline]
    pub fn is_settled(&self, target: f32, tolerance: f32) -> bool {
        m_abs(target - self.y) <= tolerance
    }
}

// ------------------------------------ Tests --------------------------------------
