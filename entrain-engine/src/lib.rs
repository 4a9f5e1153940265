//! Entrain Engine: stage-sequenced binaural beat playback.
//!
//! Crate layout:
//! - [`timeline`]   : stages, bands and the validated [`StageTimeline`]
//! - [`nodes`]      : sine generators, gains and the stereo merger
//! - [`graph`]      : the binaural [`ToneGraph`] and its audio-thread voice
//! - [`context`]    : platform seam ([`AudioHost`], [`AudioContext`]) and lifecycle
//! - [`offline`]    : deterministic pull-rendered context (files, tests)
//! - [`realtime`]   : cpal device output (feature `realtime`)
//! - [`scheduler`]  : the session state machine
//! - [`controller`] : [`PlaybackController`], the public entry point
//! - [`driver`]     : cooperative frame loop with explicit cancellation
//! - [`presets`]    : built-in programs
//!
//! The control side (controller, scheduler, graph handle) lives on one
//! thread. Rendering happens wherever the context puts it; the two halves
//! share nothing but atomics.

pub mod clock;
pub mod config;
pub mod context;
pub mod controller;
pub mod driver;
pub mod error;
pub mod graph;
pub mod nodes;
pub mod offline;
pub mod presets;
pub mod scheduler;
pub mod session;
pub mod timeline;

cfg_if::cfg_if! {
    if #[cfg(feature = "realtime")] {
        pub mod realtime;
        pub use realtime::{CpalContext, CpalHost};
    }
}

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::EngineConfig;
pub use context::{AudioContext, AudioHost, ContextManager, ContextState, KeepAlive};
pub use controller::PlaybackController;
pub use driver::{CancelToken, FrameLoop, LoopExit};
pub use error::{ContextError, EngineError, Result};
pub use graph::{Mixer, StereoSource, ToneGraph, ToneTarget};
pub use offline::{OfflineContext, OfflineHandle, OfflineHost};
pub use presets::Preset;
pub use scheduler::{Phase, TickOutcome, TransitionScheduler};
pub use session::{PlaybackEvent, SessionState};
pub use timeline::{Band, Stage, StagePosition, StageTimeline};

pub use entrain_core::binaural::BinauralPair;
