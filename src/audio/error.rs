//! Error types for the stimulus engine
//!
//! Only `AudioError` crosses the engine boundary. Node lifecycle errors are
//! internal: the playback graph absorbs them and rebuilds the source node
//! from the retained buffer.

use thiserror::Error;

/// Errors surfaced to callers of the engine.
#[derive(Debug, Error)]
pub enum AudioError {
    /// No usable audio output subsystem on this machine. Fatal for the
    /// engine; callers should disable the playback feature.
    #[error("audio subsystem unavailable: {0}")]
    EnvironmentUnsupported(String),

    /// Fetch or decode failure for a stimulus. Recoverable: the previously
    /// installed buffer (if any) is left untouched and the caller may retry.
    #[error("failed to load stimulus '{name}': {reason}")]
    Load { name: String, reason: String },
}

impl AudioError {
    pub fn load(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Load {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Lifecycle errors raised by the single-use source node.
///
/// These represent expected races (double-start, stop-before-start) and are
/// never surfaced past the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NodeError {
    /// `start()` was called on a node that has already been started once.
    #[error("source node already started")]
    AlreadyStarted,

    /// `stop()` was called on a node that was never started.
    #[error("source node was never started")]
    NeverStarted,
}
