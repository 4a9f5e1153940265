//! Deterministic, pull-rendered audio context.
//!
//! Nothing here talks to a device. Audio is produced only when someone calls
//! [`OfflineHandle::render`], which makes the context useful for rendering a
//! session to a file and for driving the engine in tests. The handle also
//! plays the platform's part: it can suspend or close the context and refuse
//! context creation, the way a browser or a mobile OS would.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::context::{AudioContext, AudioHost, ContextState};
use crate::error::{ContextError, EngineError, Result};
use crate::graph::{Mixer, StereoSource};

/// Interleaved channel count of offline renders.
pub const OFFLINE_CHANNELS: usize = 2;

struct Shared {
    state: Option<ContextState>,
    mixer: Mixer,
    /// Bumped per created context; stale contexts see themselves as closed.
    generation: u64,
    created: usize,
    attempts: usize,
    refuse: Option<String>,
    resume_failures: u32,
    frames_rendered: u64,
}

/// [`AudioHost`] producing [`OfflineContext`]s.
pub struct OfflineHost {
    shared: Arc<Mutex<Shared>>,
}

impl OfflineHost {
    pub fn new(sample_rate: f32) -> Self {
        let shared = Shared {
            state: None,
            mixer: Mixer::new(sample_rate),
            generation: 0,
            created: 0,
            attempts: 0,
            refuse: None,
            resume_failures: 0,
            frames_rendered: 0,
        };
        Self { shared: Arc::new(Mutex::new(shared)) }
    }

    /// Platform-side view of the contexts this host creates.
    pub fn handle(&self) -> OfflineHandle {
        OfflineHandle { shared: Arc::clone(&self.shared) }
    }
}

impl AudioHost for OfflineHost {
    fn create_context(&mut self) -> Result<Box<dyn AudioContext>> {
        let mut s = self.shared.lock();
        s.attempts += 1;
        if let Some(reason) = &s.refuse {
            return Err(EngineError::context_unavailable(reason.clone()));
        }
        let sr = s.mixer.sample_rate();
        s.mixer = Mixer::new(sr);
        s.generation += 1;
        s.created += 1;
        s.state = Some(ContextState::Running);
        let generation = s.generation;
        drop(s);
        Ok(Box::new(OfflineContext { shared: Arc::clone(&self.shared), generation }))
    }
}

/// Context handed to the engine by [`OfflineHost`].
pub struct OfflineContext {
    shared: Arc<Mutex<Shared>>,
    generation: u64,
}

impl OfflineContext {
    fn is_current(&self, s: &Shared) -> bool { s.generation == self.generation }
}

impl AudioContext for OfflineContext {
    fn state(&self) -> ContextState {
        let s = self.shared.lock();
        if !self.is_current(&s) {
            return ContextState::Closed;
        }
        s.state.unwrap_or(ContextState::Closed)
    }

    fn resume(&mut self) -> std::result::Result<(), ContextError> {
        let mut s = self.shared.lock();
        if !self.is_current(&s) || s.state == Some(ContextState::Closed) {
            return Err(ContextError::Closed);
        }
        if s.resume_failures > 0 {
            s.resume_failures -= 1;
            return Err(ContextError::ResumeFailed("platform refused to resume".into()));
        }
        s.state = Some(ContextState::Running);
        Ok(())
    }

    fn close(&mut self) {
        let mut s = self.shared.lock();
        if self.is_current(&s) {
            s.state = Some(ContextState::Closed);
            s.mixer.clear();
        }
    }

    fn sample_rate(&self) -> f32 { self.shared.lock().mixer.sample_rate() }

    fn connect(&mut self, source: Box<dyn StereoSource + Send>) -> std::result::Result<(), ContextError> {
        let mut s = self.shared.lock();
        if !self.is_current(&s) || s.state == Some(ContextState::Closed) {
            return Err(ContextError::Closed);
        }
        s.mixer.add(source);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("offline, {} Hz", self.sample_rate())
    }
}

/// Platform-side controls and render pump for offline contexts.
#[derive(Clone)]
pub struct OfflineHandle {
    shared: Arc<Mutex<Shared>>,
}

impl OfflineHandle {
    /// Render `frames` interleaved stereo frames. A suspended, closed or
    /// not-yet-created context produces nothing and its sources do not advance.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut s = self.shared.lock();
        if s.state != Some(ContextState::Running) {
            return Vec::new();
        }
        let mut out = vec![0.0; frames * OFFLINE_CHANNELS];
        s.mixer.render(&mut out, OFFLINE_CHANNELS);
        s.frames_rendered += frames as u64;
        out
    }

    /// Suspend the current context, as a backgrounded platform would.
    pub fn suspend(&self) {
        let mut s = self.shared.lock();
        if s.state == Some(ContextState::Running) {
            s.state = Some(ContextState::Suspended);
        }
    }

    /// Close the current context from the platform side.
    pub fn close(&self) {
        let mut s = self.shared.lock();
        if s.state.is_some() {
            s.state = Some(ContextState::Closed);
            s.mixer.clear();
        }
    }

    /// State of the current context, `None` if none was created yet.
    pub fn state(&self) -> Option<ContextState> { self.shared.lock().state }

    /// Make further context creations fail with `reason`.
    pub fn refuse_creation(&self, reason: impl Into<String>) {
        self.shared.lock().refuse = Some(reason.into());
    }

    pub fn allow_creation(&self) { self.shared.lock().refuse = None; }

    /// Make the next `n` resume attempts fail.
    pub fn fail_resumes(&self, n: u32) { self.shared.lock().resume_failures = n; }

    pub fn contexts_created(&self) -> usize { self.shared.lock().created }

    pub fn creation_attempts(&self) -> usize { self.shared.lock().attempts }

    /// Sources currently attached to the context.
    pub fn active_sources(&self) -> usize { self.shared.lock().mixer.len() }

    pub fn frames_rendered(&self) -> u64 { self.shared.lock().frames_rendered }

    pub fn sample_rate(&self) -> f32 { self.shared.lock().mixer.sample_rate() }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dc(f32);

    impl StereoSource for Dc {
        fn reset(&mut self, _sr: f32) {}
        fn render(&mut self, out: &mut [f32], _channels: usize) {
            for s in out.iter_mut() { *s += self.0; }
        }
        fn is_finished(&self) -> bool { false }
    }

    #[test]
    fn renders_only_while_running() {
        let mut host = OfflineHost::new(48_000.0);
        let handle = host.handle();
        assert!(handle.render(16).is_empty());

        let mut ctx = host.create_context().unwrap();
        ctx.connect(Box::new(Dc(0.25))).unwrap();
        let out = handle.render(8);
        assert_eq!(out.len(), 16);
        assert!(out.iter().all(|s| *s == 0.25));

        handle.suspend();
        assert!(handle.render(8).is_empty());
        assert_eq!(handle.frames_rendered(), 8);

        ctx.resume().unwrap();
        assert_eq!(handle.render(4).len(), 8);
    }

    #[test]
    fn stale_context_reads_closed() {
        let mut host = OfflineHost::new(44_100.0);
        let mut first = host.create_context().unwrap();
        let second = host.create_context().unwrap();
        assert_eq!(first.state(), ContextState::Closed);
        assert_eq!(second.state(), ContextState::Running);
        assert_eq!(first.connect(Box::new(Dc(1.0))), Err(ContextError::Closed));
        assert_eq!(second.sample_rate(), 44_100.0);
    }
}
