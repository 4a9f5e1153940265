//! Playback controller: the public face of the engine.
//!
//! Owns the context manager, the tone graph and the transition scheduler,
//! and keeps them consistent. Everything here runs on the caller's thread;
//! the only thing that crosses to the audio thread is the voice the graph
//! connects to the context.

use std::time::Duration;

use entrain_core::binaural::BinauralPair;
use log::{debug, info};

use crate::clock::{Clock, MonotonicClock};
use crate::config::EngineConfig;
use crate::context::{AudioHost, ContextManager, ContextState, KeepAlive};
use crate::error::{EngineError, Result};
use crate::graph::ToneGraph;
use crate::scheduler::{Phase, TickOutcome, TransitionScheduler};
use crate::session::{PlaybackEvent, SessionState};
use crate::timeline::{Stage, StageTimeline};

type Observer = Box<dyn FnMut(&PlaybackEvent)>;

pub struct PlaybackController<H: AudioHost, C: Clock = MonotonicClock> {
    config: EngineConfig,
    contexts: ContextManager<H>,
    graph: ToneGraph,
    scheduler: TransitionScheduler,
    clock: C,
    volume: f32,
    keepalive: KeepAlive,
    observers: Vec<Observer>,
}

impl<H: AudioHost> PlaybackController<H, MonotonicClock> {
    /// Controller on the wall clock with default settings.
    pub fn new(host: H) -> Self {
        Self::with_clock(host, MonotonicClock::new(), EngineConfig::default())
    }
}

impl<H: AudioHost, C: Clock> PlaybackController<H, C> {
    pub fn with_clock(host: H, clock: C, config: EngineConfig) -> Self {
        let config = config.sanitized();
        Self {
            contexts: ContextManager::new(host),
            graph: ToneGraph::new(config.smoothing_time_constant_ms),
            scheduler: TransitionScheduler::new(),
            clock,
            volume: config.default_volume,
            keepalive: KeepAlive::new(config.keepalive_interval()),
            observers: Vec::new(),
            config,
        }
    }

    /// Validate `stages` and play them as a new session.
    pub fn play(&mut self, stages: Vec<Stage>) -> Result<SessionState> {
        let timeline = StageTimeline::new(stages)?;
        self.play_timeline(timeline)
    }

    /// Play an already validated timeline, replacing any running session.
    ///
    /// Fails with [`EngineError::ContextUnavailable`] when the platform
    /// refuses an audio context; nothing is started in that case and the
    /// caller has to call `play` again.
    pub fn play_timeline(&mut self, timeline: StageTimeline) -> Result<SessionState> {
        self.contexts.acquire()?;
        self.contexts.ensure_active();

        if self.scheduler.phase().is_active() {
            debug!("replacing running session");
            self.scheduler.stop(&mut self.graph);
            self.emit(&PlaybackEvent::Stopped);
        }

        let ctx = self.contexts.acquire()?;
        self.graph
            .initialize(ctx, self.volume)
            .map_err(|e| EngineError::context_unavailable(e.to_string()))?;

        let now = self.clock.now();
        let stages = timeline.len();
        let total_secs = timeline.total_duration();
        let state = self.scheduler.start(timeline, now, &mut self.graph);
        self.keepalive.arm(now);
        self.emit(&PlaybackEvent::Started { stages, total_secs });
        Ok(state)
    }

    /// End the session. Always safe; a no-op when nothing plays.
    pub fn stop(&mut self) {
        let was_active = self.scheduler.stop(&mut self.graph);
        self.graph.teardown();
        self.keepalive.disarm();
        if was_active {
            self.emit(&PlaybackEvent::Stopped);
        }
    }

    /// Freeze the session and fade the master to silence.
    pub fn pause(&mut self) -> bool {
        if !self.scheduler.is_running() {
            return false;
        }
        let now = self.clock.now();
        // a boundary or the end may have passed since the last frame
        match self.scheduler.tick(now, &mut self.graph) {
            TickOutcome::Progress(_) | TickOutcome::Inactive => {}
            outcome => self.dispatch(outcome),
        }
        if !self.scheduler.pause(now, &mut self.graph) {
            return false;
        }
        self.graph.set_master_gain(0.0);
        info!("session paused");
        let state = self.scheduler.state();
        self.emit(&PlaybackEvent::Paused(state));
        true
    }

    /// Continue a paused session and fade the master back to the volume.
    pub fn resume(&mut self) -> bool {
        let now = self.clock.now();
        if !self.scheduler.resume(now) {
            return false;
        }
        self.contexts.ensure_active();
        self.keepalive.arm(now);
        self.graph.set_master_gain(self.volume);
        info!("session resumed");
        let state = self.scheduler.state();
        self.emit(&PlaybackEvent::Resumed(state));
        true
    }

    /// Set the master volume (linear, clamped to `0..=1`). Applies to the
    /// running session with a glide and to every later session.
    pub fn set_volume(&mut self, volume: f32) -> f32 {
        self.volume = if volume.is_finite() { volume.clamp(0.0, 1.0) } else { 0.0 };
        if !matches!(self.scheduler.phase(), Phase::Paused { .. }) {
            self.graph.set_master_gain(self.volume);
        }
        self.volume
    }

    pub fn volume(&self) -> f32 { self.volume }

    /// One frame: keep-alive, then the scheduler. Returns the fresh state.
    pub fn tick(&mut self) -> SessionState {
        let now = self.clock.now();
        if self.scheduler.is_running() && self.keepalive.due(now) {
            self.contexts.ensure_active();
        }

        let outcome = self.scheduler.tick(now, &mut self.graph);
        self.dispatch(outcome);
        self.scheduler.state()
    }

    /// Host visibility notification. Coming back to the foreground resumes a
    /// suspended context right away instead of waiting for the keep-alive.
    pub fn on_visibility_change(&mut self, visible: bool) -> bool {
        if !visible {
            return false;
        }
        let active = self.contexts.ensure_active();
        if active && self.scheduler.is_running() {
            self.keepalive.arm(self.clock.now());
        }
        active
    }

    /// Stop and release the audio context.
    pub fn shutdown(&mut self) {
        self.stop();
        self.contexts.shutdown();
    }

    /// Register a callback for [`PlaybackEvent`]s.
    pub fn subscribe(&mut self, observer: impl FnMut(&PlaybackEvent) + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn state(&self) -> SessionState { self.scheduler.state() }

    pub fn phase(&self) -> Phase { self.scheduler.phase() }

    pub fn is_playing(&self) -> bool { self.scheduler.phase().is_active() }

    pub fn is_paused(&self) -> bool { matches!(self.scheduler.phase(), Phase::Paused { .. }) }

    pub fn current_stage_index(&self) -> usize { self.state().current_stage_index }

    /// Seconds into the current stage.
    pub fn elapsed_secs(&self) -> f64 { self.state().elapsed_in_stage_secs }

    pub fn total_elapsed_secs(&self) -> f64 { self.state().total_elapsed_secs }

    pub fn remaining_secs(&self) -> f64 { self.state().remaining_secs }

    pub fn current_carrier_hz(&self) -> f64 { self.state().current_carrier_hz() }

    pub fn current_beat_hz(&self) -> f64 { self.state().current_beat_hz() }

    /// Mid-glide frequencies as last rendered, `None` without a live graph.
    pub fn live_frequencies(&self) -> Option<BinauralPair> { self.graph.live_frequencies() }

    pub fn timeline(&self) -> Option<&StageTimeline> { self.scheduler.timeline() }

    pub fn graph(&self) -> &ToneGraph { &self.graph }

    pub fn context_state(&self) -> Option<ContextState> { self.contexts.state() }

    pub fn contexts(&self) -> &ContextManager<H> { &self.contexts }

    pub fn config(&self) -> &EngineConfig { &self.config }

    pub fn clock(&self) -> &C { &self.clock }

    /// Interval the frame loop should tick at.
    pub fn frame_interval(&self) -> Duration { self.config.frame_interval() }

    fn dispatch(&mut self, outcome: TickOutcome) {
        match outcome {
            TickOutcome::Inactive => {}
            TickOutcome::Progress(state) => self.emit(&PlaybackEvent::Progress(state)),
            TickOutcome::StageChanged { from, to, state } => {
                self.emit(&PlaybackEvent::StageChanged { from, to, state });
            }
            TickOutcome::Completed => {
                self.keepalive.disarm();
                self.emit(&PlaybackEvent::Completed);
            }
        }
    }

    fn emit(&mut self, event: &PlaybackEvent) {
        for observer in &mut self.observers {
            observer(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::offline::{OfflineHandle, OfflineHost};
    use approx::assert_relative_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn controller() -> (PlaybackController<OfflineHost, ManualClock>, OfflineHandle, ManualClock) {
        let host = OfflineHost::new(48_000.0);
        let handle = host.handle();
        let clock = ManualClock::new();
        let ctl = PlaybackController::with_clock(host, clock.clone(), EngineConfig::default());
        (ctl, handle, clock)
    }

    fn two_stages() -> Vec<Stage> {
        vec![Stage::new(200.0, 10.0, 2.0), Stage::new(150.0, 4.0, 3.0)]
    }

    #[test]
    fn play_reports_first_stage() {
        let (mut ctl, handle, _clock) = controller();
        let state = ctl.play(two_stages()).unwrap();
        assert!(ctl.is_playing());
        assert_relative_eq!(state.current_left_hz, 195.0);
        assert_relative_eq!(state.current_right_hz, 205.0);
        assert_relative_eq!(ctl.current_carrier_hz(), 200.0);
        assert_relative_eq!(ctl.current_beat_hz(), 10.0);
        assert_eq!(handle.active_sources(), 1);
    }

    #[test]
    fn invalid_stages_touch_nothing() {
        let (mut ctl, handle, _clock) = controller();
        let err = ctl.play(Vec::new()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTimeline { .. }));
        let err = ctl.play(vec![Stage::new(200.0, 10.0, 0.0)]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTimeline { .. }));
        assert!(!ctl.is_playing());
        assert!(!ctl.graph().is_initialized());
        assert_eq!(handle.creation_attempts(), 0);
    }

    #[test]
    fn invalid_stages_leave_running_session_alone() {
        let (mut ctl, _handle, clock) = controller();
        ctl.play(two_stages()).unwrap();
        clock.advance_secs(1.0);
        assert!(ctl.play(Vec::new()).is_err());
        assert!(ctl.is_playing());
        assert_relative_eq!(ctl.tick().total_elapsed_secs, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn context_refusal_is_surfaced() {
        let (mut ctl, handle, _clock) = controller();
        handle.refuse_creation("needs a user gesture");
        let err = ctl.play(two_stages()).unwrap_err();
        assert!(err.is_recoverable());
        assert!(!ctl.is_playing());
        assert!(!ctl.graph().is_initialized());

        handle.allow_creation();
        assert!(ctl.play(two_stages()).is_ok());
    }

    #[test]
    fn replaying_replaces_the_session_and_reuses_the_context() {
        let (mut ctl, handle, clock) = controller();
        ctl.play(two_stages()).unwrap();
        clock.advance_secs(2.5);
        ctl.tick();
        let state = ctl.play(vec![Stage::new(100.0, 6.0, 10.0)]).unwrap();
        assert_eq!(state.current_stage_index, 0);
        assert_relative_eq!(state.current_left_hz, 97.0);
        assert_eq!(handle.contexts_created(), 1);
        handle.render(4_800);
        assert_eq!(handle.active_sources(), 1);
    }

    #[test]
    fn stop_twice_matches_stop_once() {
        let (mut ctl, _handle, _clock) = controller();
        ctl.stop();
        assert!(ctl.state().is_idle());

        ctl.play(two_stages()).unwrap();
        ctl.stop();
        let once = ctl.state();
        ctl.stop();
        assert_eq!(ctl.state(), once);
        assert!(once.is_idle());
        assert!(!ctl.graph().is_initialized());
        assert_eq!(ctl.tick(), once);
    }

    #[test]
    fn volume_is_clamped_and_persists() {
        let (mut ctl, _handle, _clock) = controller();
        assert_eq!(ctl.volume(), 0.5);
        assert_eq!(ctl.set_volume(1.7), 1.0);
        assert_eq!(ctl.set_volume(-2.0), 0.0);
        ctl.set_volume(0.3);
        ctl.play(two_stages()).unwrap();
        assert_relative_eq!(ctl.graph().master_gain(), 0.3);
        ctl.set_volume(0.6);
        assert_relative_eq!(ctl.graph().master_gain(), 0.6);
    }

    #[test]
    fn pause_holds_time_and_mutes() {
        let (mut ctl, _handle, clock) = controller();
        ctl.play(two_stages()).unwrap();
        clock.advance_secs(1.0);
        ctl.tick();
        assert!(ctl.pause());
        assert_eq!(ctl.graph().master_gain(), 0.0);

        clock.advance_secs(60.0);
        let state = ctl.tick();
        assert!(state.is_paused);
        assert_relative_eq!(ctl.total_elapsed_secs(), 1.0, epsilon = 1e-9);

        // volume changes while paused only take effect on resume
        ctl.set_volume(0.8);
        assert_eq!(ctl.graph().master_gain(), 0.0);
        assert!(ctl.resume());
        assert_relative_eq!(ctl.graph().master_gain(), 0.8);
        clock.advance_secs(1.5);
        assert_eq!(ctl.tick().current_stage_index, 1);
    }

    #[test]
    fn pause_between_ticks_reports_the_pause_instant() {
        let (mut ctl, _handle, clock) = controller();
        let paused_states = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&paused_states);
        ctl.subscribe(move |ev| {
            if let PlaybackEvent::Paused(state) = ev {
                sink.borrow_mut().push(*state);
            }
        });
        ctl.play(vec![Stage::new(200.0, 10.0, 60.0)]).unwrap();
        clock.advance_secs(1.0);
        ctl.tick();

        clock.advance_secs(3.0);
        assert!(ctl.pause());
        clock.advance_secs(10.0);
        let state = ctl.tick();
        assert_relative_eq!(state.total_elapsed_secs, 4.0, epsilon = 1e-9);
        assert_relative_eq!(state.remaining_secs, 56.0, epsilon = 1e-9);
        assert_relative_eq!(ctl.remaining_secs(), 56.0, epsilon = 1e-9);

        let events = paused_states.borrow();
        assert_eq!(events.len(), 1);
        assert_relative_eq!(events[0].total_elapsed_secs, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn pause_after_the_end_completes_instead() {
        let (mut ctl, _handle, clock) = controller();
        ctl.play(two_stages()).unwrap();
        clock.advance_secs(10.0);
        assert!(!ctl.pause());
        assert!(!ctl.is_playing());
        assert!(!ctl.is_paused());
        assert!(!ctl.graph().is_initialized());
    }

    #[test]
    fn observers_see_the_session_lifecycle() {
        let (mut ctl, _handle, clock) = controller();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        ctl.subscribe(move |ev| {
            let tag = match ev {
                PlaybackEvent::Started { .. } => "started",
                PlaybackEvent::StageChanged { .. } => "stage",
                PlaybackEvent::Progress(_) => "progress",
                PlaybackEvent::Paused(_) => "paused",
                PlaybackEvent::Resumed(_) => "resumed",
                PlaybackEvent::Completed => "completed",
                PlaybackEvent::Stopped => "stopped",
            };
            sink.borrow_mut().push(tag);
        });

        ctl.play(two_stages()).unwrap();
        clock.advance_secs(1.0);
        ctl.tick();
        clock.advance_secs(1.5);
        ctl.tick();
        clock.advance_secs(3.0);
        ctl.tick();
        ctl.tick();
        ctl.stop();

        assert_eq!(*seen.borrow(), vec!["started", "progress", "stage", "completed"]);
    }

    #[test]
    fn keepalive_recovers_suspension_on_cadence() {
        let (mut ctl, handle, clock) = controller();
        ctl.play(vec![Stage::new(200.0, 10.0, 60.0)]).unwrap();
        handle.suspend();

        clock.advance_secs(1.0);
        ctl.tick();
        assert_eq!(ctl.context_state(), Some(ContextState::Suspended));

        clock.advance_secs(4.0);
        ctl.tick();
        assert_eq!(ctl.context_state(), Some(ContextState::Running));
        assert_eq!(ctl.contexts().resume_count(), 1);
    }

    #[test]
    fn foreground_resumes_immediately() {
        let (mut ctl, handle, _clock) = controller();
        ctl.play(vec![Stage::new(200.0, 10.0, 60.0)]).unwrap();
        handle.suspend();
        assert!(!ctl.on_visibility_change(false));
        assert_eq!(ctl.context_state(), Some(ContextState::Suspended));
        assert!(ctl.on_visibility_change(true));
        assert_eq!(ctl.context_state(), Some(ContextState::Running));
    }

    #[test]
    fn shutdown_closes_the_context() {
        let (mut ctl, handle, _clock) = controller();
        ctl.play(two_stages()).unwrap();
        ctl.shutdown();
        assert!(!ctl.is_playing());
        assert_eq!(handle.state(), Some(ContextState::Closed));
        assert_eq!(ctl.context_state(), None);
    }
}
