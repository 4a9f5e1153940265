//! Transition scheduler: the session state machine.
//!
//! ```text
//!   Idle ──start──▶ Running ◀──resume── Paused
//!                     │  └──pause──────────▲
//!                     ├──elapsed ≥ total──▶ Completed
//!                     └──stop─────────────▶ Stopped
//! ```
//!
//! Every tick recomputes the session time as `now - start - paused`, resolves
//! it against the timeline and, when the stage index changed, glides the tone
//! target to the new stage. Nothing is integrated per tick, so late or missing
//! ticks cannot accumulate drift; the next tick simply lands on the right
//! stage. `Completed` and `Stopped` are terminal for the session; `start`
//! always begins a fresh one.

use std::time::Duration;

use log::{debug, info};

use crate::graph::ToneTarget;
use crate::session::SessionState;
use crate::timeline::{StagePosition, StageTimeline};

/// Scheduler phase.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Phase {
    Idle,
    Running { stage_index: usize, stage_elapsed: f64 },
    Paused { stage_index: usize, stage_elapsed: f64 },
    Completed,
    Stopped,
}

impl Phase {
    pub fn is_active(&self) -> bool {
        matches!(self, Phase::Running { .. } | Phase::Paused { .. })
    }
}

/// What a tick did.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TickOutcome {
    /// No session (idle, stopped or already completed).
    Inactive,
    /// Same stage as last tick; fresh progress numbers.
    Progress(SessionState),
    /// A stage boundary was crossed (possibly several, after a long gap).
    StageChanged { from: usize, to: usize, state: SessionState },
    /// The session just reached its end; the tone target was silenced.
    Completed,
}

#[derive(Debug)]
pub struct TransitionScheduler {
    phase: Phase,
    timeline: Option<StageTimeline>,
    started_at: Duration,
    paused_at: Option<Duration>,
    paused_total: Duration,
    last: SessionState,
}

impl Default for TransitionScheduler {
    fn default() -> Self { Self::new() }
}

impl TransitionScheduler {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            timeline: None,
            started_at: Duration::ZERO,
            paused_at: None,
            paused_total: Duration::ZERO,
            last: SessionState::IDLE,
        }
    }

    /// Begin a session at `now`: stage 0, applied without a glide.
    pub fn start<T: ToneTarget + ?Sized>(&mut self, timeline: StageTimeline, now: Duration, target: &mut T) -> SessionState {
        self.started_at = now;
        self.paused_at = None;
        self.paused_total = Duration::ZERO;

        if let Some(first) = timeline.stage(0) {
            target.snap_to(first.pair());
        }
        info!(
            "session started: {} stage(s), {:.1} s",
            timeline.len(),
            timeline.total_duration()
        );
        self.timeline = Some(timeline);
        self.phase = Phase::Running { stage_index: 0, stage_elapsed: 0.0 };
        self.last = self.snapshot(0, 0.0, 0.0, target);
        self.last
    }

    /// Advance against `now`. Call once per frame.
    pub fn tick<T: ToneTarget + ?Sized>(&mut self, now: Duration, target: &mut T) -> TickOutcome {
        let current = match self.phase {
            Phase::Running { stage_index, .. } => stage_index,
            Phase::Paused { .. } => return TickOutcome::Progress(self.last),
            Phase::Idle | Phase::Completed | Phase::Stopped => return TickOutcome::Inactive,
        };
        let Some(timeline) = self.timeline.as_ref() else {
            return TickOutcome::Inactive;
        };

        let total = self.session_elapsed(now);
        match timeline.stage_at(total) {
            StagePosition::Complete => {
                target.silence();
                self.phase = Phase::Completed;
                self.timeline = None;
                self.last = SessionState::IDLE;
                info!("session completed after {total:.1} s");
                TickOutcome::Completed
            }
            StagePosition::Active { index, elapsed_in_stage } => {
                if index != current {
                    if let Some(stage) = timeline.stage(index) {
                        debug!(
                            "stage {current} -> {index} at {total:.3} s ({} / {:.2} Hz beat)",
                            stage.display_name(),
                            stage.beat_hz
                        );
                        target.glide_to(stage.pair());
                    }
                }
                self.phase = Phase::Running { stage_index: index, stage_elapsed: elapsed_in_stage };
                self.last = self.snapshot(index, elapsed_in_stage, total, target);
                if index == current {
                    TickOutcome::Progress(self.last)
                } else {
                    TickOutcome::StageChanged { from: current, to: index, state: self.last }
                }
            }
        }
    }

    /// Freeze the session clock at `now`. The reported state is brought up to
    /// the pause instant first, so a boundary crossed since the last tick is
    /// applied and a session already past its end completes instead. Returns
    /// false unless the session is still running.
    pub fn pause<T: ToneTarget + ?Sized>(&mut self, now: Duration, target: &mut T) -> bool {
        if !self.is_running() || matches!(self.tick(now, target), TickOutcome::Completed) {
            return false;
        }
        let Phase::Running { stage_index, stage_elapsed } = self.phase else {
            return false;
        };
        self.paused_at = Some(now);
        self.phase = Phase::Paused { stage_index, stage_elapsed };
        self.last.is_paused = true;
        true
    }

    /// Continue a paused session where it left off. Returns false unless paused.
    pub fn resume(&mut self, now: Duration) -> bool {
        let Phase::Paused { stage_index, stage_elapsed } = self.phase else {
            return false;
        };
        if let Some(at) = self.paused_at.take() {
            self.paused_total += now.saturating_sub(at);
        }
        self.phase = Phase::Running { stage_index, stage_elapsed };
        self.last.is_paused = false;
        true
    }

    /// End the session. Returns whether a session was active. Idempotent.
    pub fn stop<T: ToneTarget + ?Sized>(&mut self, target: &mut T) -> bool {
        let was_active = self.phase.is_active();
        if was_active {
            target.silence();
            self.phase = Phase::Stopped;
            info!("session stopped");
        }
        self.timeline = None;
        self.paused_at = None;
        self.last = SessionState::IDLE;
        was_active
    }

    pub fn phase(&self) -> Phase { self.phase }

    pub fn is_running(&self) -> bool { matches!(self.phase, Phase::Running { .. }) }

    pub fn timeline(&self) -> Option<&StageTimeline> { self.timeline.as_ref() }

    /// State as of the last `start`/`tick`.
    pub fn state(&self) -> SessionState { self.last }

    /// Session time at `now`, excluding paused spans.
    pub fn session_elapsed(&self, now: Duration) -> f64 {
        let end = self.paused_at.unwrap_or(now);
        end.saturating_sub(self.started_at)
            .saturating_sub(self.paused_total)
            .as_secs_f64()
    }

    fn snapshot<T: ToneTarget + ?Sized>(&self, index: usize, in_stage: f64, total: f64, target: &T) -> SessionState {
        let pair = target.frequencies();
        let remaining = self.timeline.as_ref().map_or(0.0, |t| t.remaining_at(total));
        SessionState {
            is_playing: true,
            is_paused: matches!(self.phase, Phase::Paused { .. }),
            current_stage_index: index,
            elapsed_in_stage_secs: in_stage,
            total_elapsed_secs: total,
            remaining_secs: remaining,
            current_left_hz: pair.left_hz,
            current_right_hz: pair.right_hz,
        }
    }
}
