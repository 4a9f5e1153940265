//! Stage timelines.
//!
//! A [`StageTimeline`] is the immutable, validated, ordered list of stages a
//! session walks through. It is pure data plus one query, [`StageTimeline::stage_at`],
//! which maps a session-elapsed time onto `(stage index, time within stage)`.
//!
//! Stage intervals are closed-open: stage `i` covers
//! `[start_i, start_i + duration_i)`, so a time exactly on a boundary belongs
//! to the later stage, and the total duration itself is already "complete".

use std::fmt;
use std::path::Path;

use entrain_core::binaural::BinauralPair;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// One timed segment of a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    #[serde(rename = "carrierHz", alias = "carrier_hz")]
    pub carrier_hz: f64,
    #[serde(rename = "beatHz", alias = "beat_hz")]
    pub beat_hz: f64,
    #[serde(rename = "durationSeconds", alias = "duration_secs")]
    pub duration_secs: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Stage {
    pub fn new(carrier_hz: f64, beat_hz: f64, duration_secs: f64) -> Self {
        Self { carrier_hz, beat_hz, duration_secs, label: None }
    }

    #[must_use]
    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Ear frequencies for this stage.
    pub fn pair(&self) -> BinauralPair {
        BinauralPair::from_carrier_beat(self.carrier_hz, self.beat_hz)
    }

    pub fn left_hz(&self) -> f64 { self.pair().left_hz }
    pub fn right_hz(&self) -> f64 { self.pair().right_hz }

    pub fn band(&self) -> Band { Band::from_beat_hz(self.beat_hz) }

    /// Label if one was given, otherwise the band name.
    pub fn display_name(&self) -> String {
        self.label.clone().unwrap_or_else(|| self.band().to_string())
    }

    fn check(&self) -> std::result::Result<(), String> {
        if !(self.duration_secs.is_finite() && self.duration_secs > 0.0) {
            return Err(format!("duration must be > 0 (got {})", self.duration_secs));
        }
        if !(self.carrier_hz.is_finite() && self.carrier_hz > 0.0) {
            return Err(format!("carrier must be > 0 Hz (got {})", self.carrier_hz));
        }
        if !(self.beat_hz.is_finite() && self.beat_hz >= 0.0) {
            return Err(format!("beat must be >= 0 Hz (got {})", self.beat_hz));
        }
        // A beat wider than twice the carrier would push the left ear below 0 Hz.
        if self.beat_hz >= 2.0 * self.carrier_hz {
            return Err(format!(
                "beat {} Hz leaves no positive left tone around carrier {} Hz",
                self.beat_hz, self.carrier_hz
            ));
        }
        Ok(())
    }
}

/// Brainwave band a beat frequency targets.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Band {
    Delta,
    Theta,
    Alpha,
    Beta,
    Gamma,
}

impl Band {
    pub fn from_beat_hz(beat_hz: f64) -> Self {
        match beat_hz {
            b if b < 4.0 => Band::Delta,
            b if b < 8.0 => Band::Theta,
            b if b < 13.0 => Band::Alpha,
            b if b < 30.0 => Band::Beta,
            _ => Band::Gamma,
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Band::Delta => "Delta",
            Band::Theta => "Theta",
            Band::Alpha => "Alpha",
            Band::Beta => "Beta",
            Band::Gamma => "Gamma",
        };
        f.write_str(name)
    }
}

/// Where a given session time falls in a timeline.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum StagePosition {
    Active { index: usize, elapsed_in_stage: f64 },
    Complete,
}

impl StagePosition {
    pub fn index(&self) -> Option<usize> {
        match self {
            StagePosition::Active { index, .. } => Some(*index),
            StagePosition::Complete => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, StagePosition::Complete)
    }
}

/// Validated, non-empty, ordered sequence of stages.
#[derive(Clone, Debug, PartialEq)]
pub struct StageTimeline {
    stages: Vec<Stage>,
    /// Cumulative end time of each stage.
    ends: Vec<f64>,
}

/// `{ "stages": [...] }` form of a timeline file.
#[derive(Deserialize)]
struct TimelineDoc {
    stages: Vec<Stage>,
}

impl TryFrom<Vec<Stage>> for StageTimeline {
    type Error = EngineError;

    fn try_from(stages: Vec<Stage>) -> Result<Self> {
        StageTimeline::new(stages)
    }
}

impl StageTimeline {
    /// Validate `stages` and build the timeline.
    pub fn new(stages: Vec<Stage>) -> Result<Self> {
        if stages.is_empty() {
            return Err(EngineError::invalid_timeline("timeline has no stages"));
        }
        let mut ends = Vec::with_capacity(stages.len());
        let mut acc = 0.0;
        for (i, stage) in stages.iter().enumerate() {
            stage
                .check()
                .map_err(|why| EngineError::invalid_timeline(format!("stage {i}: {why}")))?;
            acc += stage.duration_secs;
            ends.push(acc);
        }
        Ok(Self { stages, ends })
    }

    /// One fixed carrier/beat for `duration_secs` (the plain two-tone player).
    pub fn single(carrier_hz: f64, beat_hz: f64, duration_secs: f64) -> Result<Self> {
        Self::new(vec![Stage::new(carrier_hz, beat_hz, duration_secs)])
    }

    /// Parse a bare array of stages or a `{ "stages": [...] }` document.
    /// Malformed JSON is a `Json` error; a well-formed file with bad stages
    /// is `InvalidTimeline`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let stages = if value.is_array() {
            serde_json::from_value::<Vec<Stage>>(value)?
        } else {
            serde_json::from_value::<TimelineDoc>(value)?.stages
        };
        Self::new(stages)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn len(&self) -> usize { self.stages.len() }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool { self.stages.is_empty() }

    pub fn stages(&self) -> &[Stage] { &self.stages }

    pub fn stage(&self, index: usize) -> Option<&Stage> { self.stages.get(index) }

    pub fn total_duration(&self) -> f64 {
        self.ends.last().copied().unwrap_or(0.0)
    }

    /// Session time at which stage `index` begins.
    pub fn stage_start(&self, index: usize) -> Option<f64> {
        match index {
            0 if !self.stages.is_empty() => Some(0.0),
            i if i < self.stages.len() => Some(self.ends[i - 1]),
            _ => None,
        }
    }

    /// Resolve `elapsed_secs` (session time) to a stage. Negative or NaN time
    /// counts as the session start.
    pub fn stage_at(&self, elapsed_secs: f64) -> StagePosition {
        let t = elapsed_secs.max(0.0);
        // First stage whose end lies strictly after `t`.
        let index = self.ends.partition_point(|&end| end <= t);
        if index >= self.stages.len() {
            return StagePosition::Complete;
        }
        let start = if index == 0 { 0.0 } else { self.ends[index - 1] };
        StagePosition::Active { index, elapsed_in_stage: t - start }
    }

    /// Session time left at `elapsed_secs`, never negative.
    pub fn remaining_at(&self, elapsed_secs: f64) -> f64 {
        (self.total_duration() - elapsed_secs.max(0.0)).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn two_stage() -> StageTimeline {
        StageTimeline::new(vec![Stage::new(200.0, 10.0, 5.0), Stage::new(150.0, 4.0, 3.0)])
            .unwrap()
    }

    #[test]
    fn boundaries_are_closed_open() {
        let tl = two_stage();
        assert_eq!(tl.stage_at(4.999).index(), Some(0));
        assert_eq!(
            tl.stage_at(5.0),
            StagePosition::Active { index: 1, elapsed_in_stage: 0.0 }
        );
        assert!(tl.stage_at(8.0).is_complete());
        assert!(tl.stage_at(100.0).is_complete());
    }

    #[test]
    fn start_is_stage_zero_at_zero() {
        let tl = two_stage();
        assert_eq!(tl.stage_at(0.0), StagePosition::Active { index: 0, elapsed_in_stage: 0.0 });
        assert_eq!(tl.stage_at(-3.0), StagePosition::Active { index: 0, elapsed_in_stage: 0.0 });
    }

    #[test]
    fn random_timelines_obey_interval_law() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..200 {
            let n = rng.gen_range(1..8);
            let stages: Vec<Stage> = (0..n)
                .map(|_| Stage::new(rng.gen_range(60.0..400.0), rng.gen_range(0.0..30.0), rng.gen_range(0.5..600.0)))
                .collect();
            let tl = StageTimeline::new(stages.clone()).unwrap();

            assert_eq!(tl.stage_at(0.0), StagePosition::Active { index: 0, elapsed_in_stage: 0.0 });
            assert!(tl.stage_at(tl.total_duration()).is_complete());

            for i in 0..n {
                let start = tl.stage_start(i).unwrap();
                let end = start + stages[i].duration_secs;
                let t = rng.gen_range(start..end);
                match tl.stage_at(t) {
                    StagePosition::Active { index, elapsed_in_stage } => {
                        assert_eq!(index, i, "t={t} start={start} end={end}");
                        assert!(elapsed_in_stage >= 0.0 && elapsed_in_stage <= stages[i].duration_secs);
                    }
                    StagePosition::Complete => panic!("t={t} resolved to complete"),
                }
            }
        }
    }

    #[test]
    fn rejects_empty_and_malformed() {
        let err = StageTimeline::new(vec![]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTimeline { .. }));

        for bad in [
            Stage::new(200.0, 10.0, 0.0),
            Stage::new(200.0, 10.0, -1.0),
            Stage::new(0.0, 10.0, 1.0),
            Stage::new(200.0, -1.0, 1.0),
            Stage::new(200.0, f64::NAN, 1.0),
            Stage::new(5.0, 10.0, 1.0),
        ] {
            let err = StageTimeline::new(vec![Stage::new(200.0, 10.0, 1.0), bad]).unwrap_err();
            match err {
                EngineError::InvalidTimeline { reason } => assert!(reason.starts_with("stage 1"), "{reason}"),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn derived_ear_frequencies() {
        let s = Stage::new(150.0, 4.0, 3.0);
        assert_relative_eq!(s.left_hz(), 148.0);
        assert_relative_eq!(s.right_hz(), 152.0);
        assert_eq!(s.band(), Band::Theta);
        assert_eq!(s.display_name(), "Theta");
        assert_eq!(s.labelled("Drift").display_name(), "Drift");
    }

    #[test]
    fn parses_both_json_shapes() {
        let list = r#"[{"carrierHz":200,"beatHz":10,"durationSeconds":2},
                       {"carrierHz":150,"beatHz":4,"durationSeconds":3,"label":"Theta"}]"#;
        let tl = StageTimeline::from_json_str(list).unwrap();
        assert_eq!(tl.len(), 2);
        assert_relative_eq!(tl.total_duration(), 5.0);
        assert_eq!(tl.stage(1).unwrap().label.as_deref(), Some("Theta"));

        let doc = r#"{"stages":[{"carrier_hz":100,"beat_hz":2,"duration_secs":1}]}"#;
        assert_eq!(StageTimeline::from_json_str(doc).unwrap().len(), 1);

        let empty = StageTimeline::from_json_str("[]").unwrap_err();
        assert!(matches!(empty, EngineError::InvalidTimeline { .. }), "{empty:?}");
        let empty_doc = StageTimeline::from_json_str(r#"{"stages":[]}"#).unwrap_err();
        assert_eq!(empty_doc.error_code(), "INVALID_TIMELINE");
    }

    #[test]
    fn json_stage_errors_are_invalid_timeline() {
        let zero = r#"[{"carrierHz":200,"beatHz":10,"durationSeconds":0}]"#;
        let err = StageTimeline::from_json_str(zero).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTimeline { .. }), "{err:?}");
        assert!(err.to_string().contains("stage 0"), "{err}");
    }

    #[test]
    fn json_shape_errors_keep_field_names() {
        let typo = r#"[{"carrierHz":200,"beatHz":10,"duration":60}]"#;
        let err = StageTimeline::from_json_str(typo).unwrap_err();
        assert_eq!(err.error_code(), "JSON_ERROR");
        assert!(err.to_string().contains("durationSeconds"), "{err}");

        let broken = StageTimeline::from_json_str("[{").unwrap_err();
        assert!(matches!(broken, EngineError::Json(_)), "{broken:?}");
    }

    #[test]
    fn remaining_never_negative() {
        let tl = two_stage();
        assert_relative_eq!(tl.remaining_at(2.0), 6.0);
        assert_eq!(tl.remaining_at(9.0), 0.0);
    }

    #[test]
    fn band_edges() {
        assert_eq!(Band::from_beat_hz(0.0), Band::Delta);
        assert_eq!(Band::from_beat_hz(4.0), Band::Theta);
        assert_eq!(Band::from_beat_hz(8.0), Band::Alpha);
        assert_eq!(Band::from_beat_hz(13.0), Band::Beta);
        assert_eq!(Band::from_beat_hz(40.0), Band::Gamma);
    }
}
