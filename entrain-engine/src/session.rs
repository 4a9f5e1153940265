//! Observable session state and playback events.

use entrain_core::binaural::BinauralPair;

/// Snapshot of a session, recomputed every tick.
///
/// Frequencies are the nominal targets of the active stage as held by the
/// tone graph, not the mid-glide values the audio thread is rendering.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SessionState {
    pub is_playing: bool,
    pub is_paused: bool,
    pub current_stage_index: usize,
    pub elapsed_in_stage_secs: f64,
    pub total_elapsed_secs: f64,
    pub remaining_secs: f64,
    pub current_left_hz: f64,
    pub current_right_hz: f64,
}

impl SessionState {
    /// Terminal/idle values: nothing playing, everything zeroed.
    pub const IDLE: Self = Self {
        is_playing: false,
        is_paused: false,
        current_stage_index: 0,
        elapsed_in_stage_secs: 0.0,
        total_elapsed_secs: 0.0,
        remaining_secs: 0.0,
        current_left_hz: 0.0,
        current_right_hz: 0.0,
    };

    pub fn pair(&self) -> BinauralPair {
        BinauralPair::new(self.current_left_hz, self.current_right_hz)
    }

    pub fn current_carrier_hz(&self) -> f64 { self.pair().carrier_hz() }

    pub fn current_beat_hz(&self) -> f64 { self.pair().beat_hz() }

    pub fn is_idle(&self) -> bool { *self == Self::IDLE }
}

impl Default for SessionState {
    fn default() -> Self { Self::IDLE }
}

/// Pushed to controller subscribers.
#[derive(Clone, Debug, PartialEq)]
pub enum PlaybackEvent {
    Started { stages: usize, total_secs: f64 },
    StageChanged { from: usize, to: usize, state: SessionState },
    Progress(SessionState),
    Paused(SessionState),
    Resumed(SessionState),
    Completed,
    Stopped,
}
