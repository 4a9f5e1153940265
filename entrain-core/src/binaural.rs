//! Binaural tone-pair math.
//!
//! A binaural beat is described by a carrier and a beat frequency. The two ear
//! tones sit symmetrically around the carrier: `left = carrier - beat/2`,
//! `right = carrier + beat/2`. Their difference is the beat, their midpoint the
//! carrier.

use crate::dsp::m_abs64;

/// Left/right ear frequencies in Hz.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BinauralPair {
    pub left_hz: f64,
    pub right_hz: f64,
}

impl BinauralPair {
    #[inline]
    pub const fn new(left_hz: f64, right_hz: f64) -> Self {
        Self { left_hz, right_hz }
    }

    /// Split `carrier_hz` symmetrically by `beat_hz`.
    #[inline]
    pub fn from_carrier_beat(carrier_hz: f64, beat_hz: f64) -> Self {
        let half = 0.5 * beat_hz;
        Self { left_hz: carrier_hz - half, right_hz: carrier_hz + half }
    }

    /// Both ears on the same frequency (no beat).
    #[inline]
    pub const fn unison(hz: f64) -> Self {
        Self { left_hz: hz, right_hz: hz }
    }

    #[inline]
    pub fn carrier_hz(&self) -> f64 {
        0.5 * (self.left_hz + self.right_hz)
    }

    #[inline]
    pub fn beat_hz(&self) -> f64 {
        m_abs64(self.right_hz - self.left_hz)
    }

    /// The silent pair reported while nothing is playing.
    pub const SILENT: Self = Self::unison(0.0);
}
