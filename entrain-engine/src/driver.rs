//! Cooperative frame loop.
//!
//! Ticks a [`PlaybackController`] at a fixed cadence on the calling thread
//! until the session ends or the loop's [`CancelToken`] is set. The token is
//! checked before every reschedule, so once `cancel` has been observed no
//! further tick runs. Pacing uses absolute deadlines; a late frame shortens
//! the next wait instead of pushing every later frame back. Session timing
//! does not depend on the cadence at all, since the scheduler recomputes
//! elapsed time from its clock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use crate::clock::Clock;
use crate::context::AudioHost;
use crate::controller::PlaybackController;
use crate::session::SessionState;

/// Shared stop flag for a [`FrameLoop`]. Cheap to clone; `Send + Sync`.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self { Self::default() }

    pub fn cancel(&self) { self.0.store(true, Ordering::Release); }

    pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::Acquire) }
}

/// Why [`FrameLoop::run`] returned.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LoopExit {
    /// The session completed or was stopped.
    Finished,
    Cancelled,
}

#[derive(Debug)]
pub struct FrameLoop {
    interval: Duration,
    token: CancelToken,
}

impl FrameLoop {
    pub fn new(interval: Duration) -> Self {
        Self { interval, token: CancelToken::new() }
    }

    /// Loop at `hz` frames per second.
    pub fn with_rate(hz: f64) -> Self {
        let hz = if hz.is_finite() && hz > 0.0 { hz } else { 60.0 };
        Self::new(Duration::from_secs_f64(1.0 / hz))
    }

    pub fn interval(&self) -> Duration { self.interval }

    /// Handle that cancels this loop, from any thread.
    pub fn token(&self) -> CancelToken { self.token.clone() }

    /// Tick `controller` until its session is over or the loop is cancelled.
    /// `on_frame` sees every tick's state and may itself drive the controller.
    pub fn run<H, C, F>(&self, controller: &mut PlaybackController<H, C>, mut on_frame: F) -> LoopExit
    where
        H: AudioHost,
        C: Clock,
        F: FnMut(&mut PlaybackController<H, C>, &SessionState),
    {
        let mut deadline = Instant::now();
        let mut frames: u64 = 0;
        loop {
            if self.token.is_cancelled() {
                debug!("frame loop cancelled after {frames} frame(s)");
                return LoopExit::Cancelled;
            }
            let state = controller.tick();
            frames += 1;
            on_frame(controller, &state);
            if !controller.is_playing() {
                debug!("frame loop finished after {frames} frame(s)");
                return LoopExit::Finished;
            }
            if self.token.is_cancelled() {
                debug!("frame loop cancelled after {frames} frame(s)");
                return LoopExit::Cancelled;
            }

            if self.interval.is_zero() {
                continue;
            }
            deadline += self.interval;
            let now = Instant::now();
            match deadline.checked_duration_since(now) {
                Some(wait) => thread::sleep(wait),
                // behind schedule: tick now and restart the cadence from here
                None => deadline = now,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::EngineConfig;
    use crate::offline::OfflineHost;
    use crate::timeline::Stage;

    fn controller() -> (PlaybackController<OfflineHost, ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let ctl = PlaybackController::with_clock(OfflineHost::new(48_000.0), clock.clone(), EngineConfig::default());
        (ctl, clock)
    }

    #[test]
    fn runs_until_the_session_completes() {
        let (mut ctl, clock) = controller();
        ctl.play(vec![Stage::new(200.0, 10.0, 1.0), Stage::new(180.0, 6.0, 1.0)]).unwrap();

        let mut frames = 0;
        let mut stages_seen = Vec::new();
        let exit = FrameLoop::new(Duration::ZERO).run(&mut ctl, |_, state| {
            frames += 1;
            if state.is_playing && stages_seen.last() != Some(&state.current_stage_index) {
                stages_seen.push(state.current_stage_index);
            }
            clock.advance_secs(1.0 / 60.0);
        });

        assert_eq!(exit, LoopExit::Finished);
        assert_eq!(stages_seen, vec![0, 1]);
        assert!((120..=122).contains(&frames), "frames={frames}");
        assert!(!ctl.is_playing());
    }

    #[test]
    fn cancel_stops_before_the_next_tick() {
        let (mut ctl, clock) = controller();
        ctl.play(vec![Stage::new(200.0, 10.0, 600.0)]).unwrap();

        let frame_loop = FrameLoop::new(Duration::ZERO);
        let token = frame_loop.token();
        let mut frames = 0;
        let exit = frame_loop.run(&mut ctl, |_, _| {
            frames += 1;
            clock.advance_secs(0.5);
            if frames == 3 {
                token.cancel();
            }
        });

        assert_eq!(exit, LoopExit::Cancelled);
        assert_eq!(frames, 3);
        // the session itself is untouched by cancellation
        assert!(ctl.is_playing());
    }

    #[test]
    fn callback_may_stop_the_session() {
        let (mut ctl, _clock) = controller();
        ctl.play(vec![Stage::new(200.0, 10.0, 600.0)]).unwrap();
        let exit = FrameLoop::new(Duration::ZERO).run(&mut ctl, |ctl, _| ctl.stop());
        assert_eq!(exit, LoopExit::Finished);
    }

    #[test]
    fn paces_at_the_requested_rate() {
        let (mut ctl, _clock) = controller();
        ctl.play(vec![Stage::new(200.0, 10.0, 600.0)]).unwrap();
        let frame_loop = FrameLoop::with_rate(200.0);
        let token = frame_loop.token();
        let started = Instant::now();
        let mut frames = 0;
        frame_loop.run(&mut ctl, |_, _| {
            frames += 1;
            if frames == 5 {
                token.cancel();
            }
        });
        // four waits of 5 ms between five frames
        assert!(started.elapsed() >= Duration::from_millis(19));
    }
}
