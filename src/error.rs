//! Error types for the reply relay.
//!
//! One enum per concern; the binary folds them into `anyhow` at the edge.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors from one exchange with the remote response service.
///
/// `Timeout` and `Transport` mean no response arrived; `Status` means the
/// service answered with a non-success code.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("HTTP client construction failed: {0}")]
    Client(String),
}

impl NetworkError {
    /// True when no response reached us (as opposed to an application failure).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Transport(_) | Self::Client(_)
        )
    }
}

/// Reply injection errors.
#[derive(Debug, thiserror::Error)]
pub enum InjectionError {
    #[error("Reply action has no result slots")]
    NoResultSlots,

    #[error("Invalid trigger handle {handle}: {reason}")]
    InvalidTrigger { handle: String, reason: String },

    #[error("Failed to fire reply trigger: {0}")]
    TriggerFailed(String),
}

/// Notification source errors.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Source {name} already started")]
    AlreadyStarted { name: String },
}
