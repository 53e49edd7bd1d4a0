//! Error types for the coalescing scheduler
//!
//! - Key computation failures (single caller, synchronous)
//! - Execution failures (shared by every waiter of one execution)
//! - Admission failures (limits, missing runtime)

use cod_response::ExecutionId;
use std::sync::Arc;

/// The key function raised while computing a key
#[derive(Debug, thiserror::Error)]
#[error("key computation failed: {message}")]
pub struct KeyError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl KeyError {
    /// Create key error from a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create key error wrapping an underlying cause
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Error message
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure outcome of one execution, delivered to all its waiters
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecutionFailure {
    /// Work returned an error before any terminal call
    #[error("execution {execution} failed before completing its response: {error}")]
    Work {
        /// Failed execution
        execution: ExecutionId,
        /// Error returned by the work
        error: Arc<anyhow::Error>,
    },

    /// Work panicked before any terminal call
    #[error("execution {execution} panicked: {message}")]
    Panicked {
        /// Failed execution
        execution: ExecutionId,
        /// Panic payload, when it was a string
        message: String,
    },

    /// The driving task went away before the execution completed
    #[error("execution {execution} was abandoned before completing")]
    Abandoned {
        /// Abandoned execution
        execution: ExecutionId,
    },
}

impl ExecutionFailure {
    /// Execution this failure belongs to
    #[inline]
    #[must_use]
    pub fn execution_id(&self) -> ExecutionId {
        match self {
            Self::Work { execution, .. }
            | Self::Panicked { execution, .. }
            | Self::Abandoned { execution } => *execution,
        }
    }
}

/// Errors returned to a caller of the scheduler
#[derive(Debug, thiserror::Error)]
pub enum CoalesceError {
    /// Key function failed
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Shared execution failed
    #[error(transparent)]
    Execution(#[from] ExecutionFailure),

    /// Too many keys in flight to start another execution
    #[error("{limit} executions already in flight")]
    MaxInFlight {
        /// Configured limit
        limit: usize,
    },

    /// `run` was called outside a Tokio runtime
    #[error("coalescing requires a running Tokio runtime")]
    NoRuntime,
}

/// Result type alias for scheduler operations
pub type CoalesceResult<T> = Result<T, CoalesceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_error_display() {
        let err = KeyError::new("session unreadable");
        assert_eq!(err.to_string(), "key computation failed: session unreadable");
        assert_eq!(err.message(), "session unreadable");
    }

    #[test]
    fn key_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = KeyError::with_source("lookup", io);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn execution_failure_is_shareable() {
        let execution = ExecutionId::new();
        let failure = ExecutionFailure::Work {
            execution,
            error: Arc::new(anyhow::anyhow!("db down")),
        };
        let copy = failure.clone();

        assert_eq!(copy.execution_id(), execution);
        assert!(copy.to_string().contains("db down"));
    }

    #[test]
    fn error_conversions() {
        let err: CoalesceError = KeyError::new("x").into();
        assert!(matches!(err, CoalesceError::Key(_)));

        let err: CoalesceError = ExecutionFailure::Abandoned {
            execution: ExecutionId::new(),
        }
        .into();
        assert!(matches!(err, CoalesceError::Execution(_)));
    }
}
