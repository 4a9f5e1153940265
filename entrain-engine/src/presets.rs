//! Built-in session programs.
//!
//! Each preset is a static stage table; [`Preset::timeline`] turns it into a
//! validated [`StageTimeline`]. The multi-stage programs step the beat down
//! through the bands (Beta → Alpha → Theta → Delta) and lower the carrier
//! with it, the way guided entrainment sessions usually do.

use crate::error::Result;
use crate::timeline::{Stage, StageTimeline};

/// One row of a preset table: carrier, beat, seconds, label.
type Row = (f64, f64, f64, &'static str);

#[derive(Debug)]
pub struct Preset {
    pub name: &'static str,
    pub description: &'static str,
    rows: &'static [Row],
}

impl Preset {
    /// Every built-in preset, in display order.
    pub const ALL: &'static [Preset] = &[SIMPLE, FOCUS, RELAX, MEDITATE, SLEEP];

    /// Case-insensitive lookup. `-` and `_` are interchangeable.
    pub fn by_name(name: &str) -> Option<&'static Preset> {
        let wanted = name.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL.iter().find(|p| p.name == wanted)
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        Self::ALL.iter().map(|p| p.name)
    }

    pub fn stage_count(&self) -> usize { self.rows.len() }

    pub fn total_duration_secs(&self) -> f64 {
        self.rows.iter().map(|r| r.2).sum()
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.rows
            .iter()
            .map(|&(carrier, beat, secs, label)| Stage::new(carrier, beat, secs).labelled(label))
            .collect()
    }

    pub fn timeline(&self) -> Result<StageTimeline> {
        StageTimeline::new(self.stages())
    }
}

/// One steady 200 Hz / 10 Hz tone for ten minutes.
pub const SIMPLE: Preset = Preset {
    name: "simple",
    description: "steady 200 Hz carrier with a 10 Hz alpha beat",
    rows: &[(200.0, 10.0, 600.0, "steady")],
};

pub const FOCUS: Preset = Preset {
    name: "focus",
    description: "alpha warm-up into sustained low beta, then a short alpha cool-down",
    rows: &[
        (220.0, 10.0, 120.0, "settle"),
        (220.0, 14.0, 300.0, "engage"),
        (240.0, 18.0, 900.0, "focus"),
        (220.0, 12.0, 180.0, "release"),
    ],
};

pub const RELAX: Preset = Preset {
    name: "relax",
    description: "beta down into slow alpha",
    rows: &[
        (200.0, 15.0, 120.0, "unwind"),
        (200.0, 10.0, 300.0, "ease"),
        (180.0, 8.5, 480.0, "rest"),
    ],
};

pub const MEDITATE: Preset = Preset {
    name: "meditate",
    description: "alpha into deepening theta",
    rows: &[
        (200.0, 10.0, 180.0, "arrive"),
        (180.0, 7.0, 300.0, "descend"),
        (160.0, 6.0, 600.0, "deepen"),
        (160.0, 4.5, 420.0, "stillness"),
    ],
};

pub const SLEEP: Preset = Preset {
    name: "sleep",
    description: "beta through alpha and theta down to delta",
    rows: &[
        (200.0, 14.0, 180.0, "wind down"),
        (180.0, 10.0, 300.0, "drift"),
        (150.0, 6.0, 600.0, "drowse"),
        (120.0, 3.0, 600.0, "sink"),
        (100.0, 1.5, 1_200.0, "sleep"),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::Band;

    #[test]
    fn every_preset_is_a_valid_timeline() {
        for preset in Preset::ALL {
            let tl = preset.timeline().unwrap();
            assert_eq!(tl.len(), preset.stage_count(), "{}", preset.name);
            assert!((tl.total_duration() - preset.total_duration_secs()).abs() < 1e-9);
        }
    }

    #[test]
    fn lookup_is_forgiving() {
        assert_eq!(Preset::by_name("Sleep").map(|p| p.name), Some("sleep"));
        assert_eq!(Preset::by_name("  focus ").map(|p| p.name), Some("focus"));
        assert!(Preset::by_name("lucid").is_none());
        assert_eq!(Preset::names().count(), Preset::ALL.len());
    }

    #[test]
    fn simple_is_one_stage() {
        let tl = SIMPLE.timeline().unwrap();
        assert_eq!(tl.len(), 1);
        let stage = tl.stage(0).unwrap();
        assert_eq!((stage.left_hz(), stage.right_hz()), (195.0, 205.0));
    }

    #[test]
    fn sleep_walks_down_the_bands() {
        let bands: Vec<Band> = SLEEP.stages().iter().map(Stage::band).collect();
        assert_eq!(bands, vec![Band::Beta, Band::Alpha, Band::Theta, Band::Delta, Band::Delta]);
    }

    #[test]
    fn beats_never_rise_in_wind_down_programs() {
        for preset in [&RELAX, &MEDITATE, &SLEEP] {
            let beats: Vec<f64> = preset.stages().iter().map(|s| s.beat_hz).collect();
            assert!(beats.windows(2).all(|w| w[1] <= w[0]), "{}", preset.name);
        }
    }
}
