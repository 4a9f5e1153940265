//! Engine configuration.
//!
//! Every field has a default, so a config file only needs the keys it
//! changes. Out-of-range values are clamped on load rather than rejected.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Time constant of frequency and master-gain glides.
    pub smoothing_time_constant_ms: f32,

    /// Cadence of the context keep-alive while a session plays.
    pub keepalive_interval_secs: f64,

    /// Master volume of the first session, linear `0..=1`.
    pub default_volume: f32,

    /// Tick rate of the frame loop.
    pub frame_rate_hz: f64,

    /// Preferred device sample rate; the device default when `None`.
    pub sample_rate: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            smoothing_time_constant_ms: 100.0,
            keepalive_interval_secs: 5.0,
            default_volume: 0.5,
            frame_rate_hz: 60.0,
            sample_rate: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        Ok(cfg.sanitized())
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let cfg: Self = serde_json::from_reader(reader)?;
        Ok(cfg.sanitized())
    }

    /// Clamp every field into its usable range.
    pub fn sanitized(mut self) -> Self {
        let d = Self::default();

        if !self.smoothing_time_constant_ms.is_finite() || self.smoothing_time_constant_ms < 0.0 {
            warn!("invalid smoothing time constant {}, using {}", self.smoothing_time_constant_ms, d.smoothing_time_constant_ms);
            self.smoothing_time_constant_ms = d.smoothing_time_constant_ms;
        }
        if !self.keepalive_interval_secs.is_finite() || self.keepalive_interval_secs <= 0.0 {
            warn!("invalid keep-alive interval {}, using {}", self.keepalive_interval_secs, d.keepalive_interval_secs);
            self.keepalive_interval_secs = d.keepalive_interval_secs;
        }
        self.default_volume = if self.default_volume.is_finite() {
            self.default_volume.clamp(0.0, 1.0)
        } else {
            d.default_volume
        };
        self.frame_rate_hz = if self.frame_rate_hz.is_finite() && self.frame_rate_hz > 0.0 {
            self.frame_rate_hz.clamp(1.0, 1_000.0)
        } else {
            d.frame_rate_hz
        };
        if self.sample_rate == Some(0) {
            self.sample_rate = None;
        }
        self
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs_f64(self.keepalive_interval_secs)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate_hz)
    }
}
