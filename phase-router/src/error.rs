//! Error types for routing and phase execution

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::backend::{Backend, Phase};

/// Result type alias for router operations
pub type Result<T> = std::result::Result<T, RouterError>;

/// Errors surfaced by the router and coordinator
#[derive(Debug, Error)]
pub enum RouterError {
    /// Startup probe failed; recovered by disabling routing
    #[error("backend binary '{binary}' unavailable: {reason}")]
    BackendUnavailable { binary: String, reason: String },

    /// The transport failed while a phase session was open
    #[error("{phase} phase on {backend} failed: {source}")]
    StreamFailure {
        phase: Phase,
        backend: Backend,
        #[source]
        source: TransportError,
    },

    /// Reserved: the routing policy is total, so this is never produced
    #[error("no routing rule matched the {phase} phase")]
    RoutingAmbiguity { phase: Phase },

    #[error("{phase} phase on {backend} was cancelled")]
    Cancelled { phase: Phase, backend: Backend },

    #[error("{phase} phase on {backend} exceeded its {timeout:?} deadline")]
    DeadlineExceeded {
        phase: Phase,
        backend: Backend,
        timeout: Duration,
    },

    #[error("task cost ${spent:.4} exceeds the ${limit:.4} limit")]
    BudgetExceeded { spent: f64, limit: f64 },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse configuration {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RouterError {
    /// Phase and backend the error is attributed to, if any
    pub fn context(&self) -> Option<(Phase, Backend)> {
        match self {
            RouterError::StreamFailure { phase, backend, .. }
            | RouterError::Cancelled { phase, backend }
            | RouterError::DeadlineExceeded { phase, backend, .. } => Some((*phase, *backend)),
            _ => None,
        }
    }
}

/// Errors raised by a [`Transport`](crate::transport::Transport)
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed stream message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("backend process exited with {code:?}: {stderr}")]
    ProcessExit { code: Option<i32>, stderr: String },

    #[error("{0}")]
    Other(String),
}
