//! Error types for the HTTP integration

use cod_response::ReplayError;
use cod_scheduler::{CoalesceError, ExecutionFailure, KeyError};
use http::StatusCode;

/// Errors from [`CacheOnDemand::handle`](crate::CacheOnDemand::handle)
#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    /// Key policy failed; the request was not admitted
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Shared execution failed
    #[error(transparent)]
    Execution(#[from] ExecutionFailure),

    /// Captured response could not be delivered to this caller
    #[error(transparent)]
    Replay(#[from] ReplayError),

    /// In-flight limit reached for a new key
    #[error("{limit} executions already in flight")]
    MaxInFlight {
        /// Configured limit
        limit: usize,
    },

    /// Not running inside a Tokio runtime
    #[error("coalescing requires a running Tokio runtime")]
    NoRuntime,
}

impl HandleError {
    /// Status a transport should answer with
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MaxInFlight { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the handler broke the terminal-call contract
    #[inline]
    #[must_use]
    pub fn is_terminal_violation(&self) -> bool {
        matches!(self, Self::Replay(err) if err.is_terminal_violation())
    }
}

impl From<CoalesceError> for HandleError {
    fn from(err: CoalesceError) -> Self {
        match err {
            CoalesceError::Key(err) => Self::Key(err),
            CoalesceError::Execution(failure) => Self::Execution(failure),
            CoalesceError::MaxInFlight { limit } => Self::MaxInFlight { limit },
            CoalesceError::NoRuntime => Self::NoRuntime,
        }
    }
}

/// Errors loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML could not be parsed
    #[error("invalid policy config: {0}")]
    Toml(#[from] toml::de::Error),

    /// Config file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_maps_to_unavailable() {
        let err = HandleError::from(CoalesceError::MaxInFlight { limit: 2 });
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.to_string(), "2 executions already in flight");
    }

    #[test]
    fn missing_terminal_is_flagged() {
        let err = HandleError::from(ReplayError::MissingTerminal);
        assert!(err.is_terminal_violation());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
