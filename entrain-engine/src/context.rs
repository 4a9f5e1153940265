//! Audio context lifecycle.
//!
//! The platform seam is two traits: an [`AudioHost`] creates an
//! [`AudioContext`], and the context renders whatever [`StereoSource`]s are
//! connected to it. [`ContextManager`] owns the single context of the
//! application: it creates it lazily on first use, reuses it across sessions,
//! resumes it when the platform has suspended it, and closes it only at
//! shutdown.
//!
//! Suspension is normal on some platforms (backgrounded apps, throttled
//! devices). The manager recovers from it; it never reports it.

use std::fmt;
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::{ContextError, EngineError, Result};
use crate::graph::StereoSource;

/// Processing state of an audio context.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContextState {
    Running,
    Suspended,
    Closed,
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextState::Running => write!(f, "running"),
            ContextState::Suspended => write!(f, "suspended"),
            ContextState::Closed => write!(f, "closed"),
        }
    }
}

/// A platform audio processing context.
pub trait AudioContext {
    fn state(&self) -> ContextState;

    /// Resume a suspended context. Resuming a running context is a no-op.
    fn resume(&mut self) -> std::result::Result<(), ContextError>;

    /// Release the platform resources. Never fails; idempotent.
    fn close(&mut self);

    fn sample_rate(&self) -> f32;

    /// Attach a source to the context's output.
    fn connect(&mut self, source: Box<dyn StereoSource + Send>) -> std::result::Result<(), ContextError>;

    /// Short human-readable description for logs.
    fn describe(&self) -> String {
        format!("{} Hz context", self.sample_rate())
    }
}

/// Factory for audio contexts.
pub trait AudioHost {
    /// Create a context. Platforms that refuse (no device, missing user
    /// activation) return [`EngineError::ContextUnavailable`].
    fn create_context(&mut self) -> Result<Box<dyn AudioContext>>;
}

impl<H: AudioHost + ?Sized> AudioHost for Box<H> {
    fn create_context(&mut self) -> Result<Box<dyn AudioContext>> {
        (**self).create_context()
    }
}

/// Owner of the application's single audio context.
pub struct ContextManager<H: AudioHost> {
    host: H,
    ctx: Option<Box<dyn AudioContext>>,
    resumes: u64,
}

impl<H: AudioHost> ContextManager<H> {
    pub fn new(host: H) -> Self {
        Self { host, ctx: None, resumes: 0 }
    }

    /// The live context, created on first call and reused afterwards. A
    /// context the platform has closed behind our back is replaced.
    pub fn acquire(&mut self) -> Result<&mut (dyn AudioContext + 'static)> {
        if matches!(self.ctx.as_deref().map(|c| c.state()), Some(ContextState::Closed)) {
            warn!("audio context was closed by the platform; creating a new one");
            self.ctx = None;
        }
        if self.ctx.is_none() {
            let ctx = self.host.create_context()?;
            info!("audio context created ({})", ctx.describe());
            self.ctx = Some(ctx);
        }
        self.ctx
            .as_deref_mut()
            .ok_or_else(|| EngineError::context_unavailable("context vanished after creation"))
    }

    /// Resume the context if the platform suspended it. Returns whether the
    /// context is running afterwards. Failures are logged and absorbed.
    pub fn ensure_active(&mut self) -> bool {
        let Some(ctx) = self.ctx.as_deref_mut() else {
            return false;
        };
        match ctx.state() {
            ContextState::Running => true,
            ContextState::Closed => false,
            ContextState::Suspended => match ctx.resume() {
                Ok(()) => {
                    self.resumes += 1;
                    debug!("audio context resumed (resume #{})", self.resumes);
                    ctx.state() == ContextState::Running
                }
                Err(e) => {
                    warn!("audio context resume failed, will retry: {e}");
                    false
                }
            },
        }
    }

    /// State of the context, `None` before the first `acquire`.
    pub fn state(&self) -> Option<ContextState> {
        self.ctx.as_deref().map(|c| c.state())
    }

    pub fn is_created(&self) -> bool { self.ctx.is_some() }

    /// How many suspensions have been recovered so far.
    pub fn resume_count(&self) -> u64 { self.resumes }

    /// Close and release the context. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        if let Some(mut ctx) = self.ctx.take() {
            ctx.close();
            info!("audio context closed");
        }
    }
}

impl<H: AudioHost> Drop for ContextManager<H> {
    fn drop(&mut self) { self.shutdown(); }
}

/// Periodic keep-alive cadence for [`ContextManager::ensure_active`].
#[derive(Copy, Clone, Debug)]
pub struct KeepAlive {
    interval: Duration,
    last: Option<Duration>,
}

impl KeepAlive {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    pub fn interval(&self) -> Duration { self.interval }

    /// Restart the cadence from `now`.
    pub fn arm(&mut self, now: Duration) { self.last = Some(now); }

    pub fn disarm(&mut self) { self.last = None; }

    /// True (and re-armed) when an interval has passed since the last check.
    pub fn due(&mut self, now: Duration) -> bool {
        match self.last {
            Some(last) if now.saturating_sub(last) >= self.interval => {
                self.last = Some(now);
                true
            }
            Some(_) => false,
            None => false,
        }
    }
}
