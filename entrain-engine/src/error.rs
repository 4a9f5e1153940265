//! Error types for the engine.
//!
//! Only two failures ever reach a caller of the playback controller: a
//! malformed timeline and an audio context the platform refuses to create.
//! Context suspension and resume hiccups are [`ContextError`]s, which the
//! lifecycle manager logs and absorbs.

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced to callers of the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Empty stage list or a stage violating the stage invariants.
    #[error("invalid timeline: {reason}")]
    InvalidTimeline { reason: String },

    /// The platform refused to create an audio context (no device, missing
    /// user activation, ...). Not retried automatically.
    #[error("audio context unavailable: {reason}")]
    ContextUnavailable { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub(crate) fn invalid_timeline(reason: impl Into<String>) -> Self {
        EngineError::InvalidTimeline { reason: reason.into() }
    }

    pub(crate) fn context_unavailable(reason: impl Into<String>) -> Self {
        EngineError::ContextUnavailable { reason: reason.into() }
    }

    /// Stable machine-readable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            EngineError::InvalidTimeline { .. } => "INVALID_TIMELINE",
            EngineError::ContextUnavailable { .. } => "CONTEXT_UNAVAILABLE",
            EngineError::Io(_) => "IO_ERROR",
            EngineError::Json(_) => "JSON_ERROR",
        }
    }

    /// Whether the caller can fix the situation and call `play()` again.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EngineError::ContextUnavailable { .. })
    }
}

/// Platform-level context failures. Never surfaced from `play()`; the
/// lifecycle manager retries on its keep-alive cadence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("resume failed: {0}")]
    ResumeFailed(String),

    #[error("context is closed")]
    Closed,

    #[error("audio backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = EngineError::invalid_timeline("empty");
        assert_eq!(err.error_code(), "INVALID_TIMELINE");
        assert!(!err.is_recoverable());
        assert_eq!(err.to_string(), "invalid timeline: empty");
    }

    #[test]
    fn context_unavailable_is_recoverable() {
        let err = EngineError::context_unavailable("no output device");
        assert!(err.is_recoverable());
        assert_eq!(err.error_code(), "CONTEXT_UNAVAILABLE");
    }
}
