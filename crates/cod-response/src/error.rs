//! Error types for response capture and replay
//!
//! - Sink writes (rejected or already finalized)
//! - Replay of a descriptor onto a sink
//! - Descriptor JSON codec

/// Contract every coalesced execution must honor
pub const TERMINAL_CONTRACT: &str =
    "every execution must end in one of: redirect / send / raw-end";

/// Errors raised by a response sink
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// A terminal call already finalized this sink
    #[error("sink already finalized by a previous {0} call")]
    AlreadyFinalized(&'static str),

    /// The sink refused the write
    #[error("sink rejected write: {0}")]
    Rejected(String),
}

impl SinkError {
    /// Create rejection error
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
}

/// Errors during replay of a descriptor
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    /// Descriptor carries no terminal output
    #[error(
        "response descriptor has no terminal output; every execution must end in one of: redirect / send / raw-end"
    )]
    MissingTerminal,

    /// Sink rejected part of the replay
    #[error("replay rejected by sink: {0}")]
    Sink(#[from] SinkError),
}

impl ReplayError {
    /// Whether this is the terminal-violation fault
    #[inline]
    #[must_use]
    pub fn is_terminal_violation(&self) -> bool {
        matches!(self, Self::MissingTerminal)
    }
}

/// Errors in the descriptor JSON codec
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    /// Serialization failed
    #[error("failed to encode descriptor: {0}")]
    Encode(#[source] serde_json::Error),

    /// Input was not a valid descriptor
    #[error("failed to decode descriptor: {0}")]
    Decode(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_terminal_names_contract() {
        let err = ReplayError::MissingTerminal;
        assert!(err.to_string().contains("redirect / send / raw-end"));
        assert!(err.is_terminal_violation());
    }

    #[test]
    fn sink_error_converts() {
        let err: ReplayError = SinkError::AlreadyFinalized("send").into();
        assert!(matches!(err, ReplayError::Sink(SinkError::AlreadyFinalized("send"))));
        assert_eq!(
            err.to_string(),
            "replay rejected by sink: sink already finalized by a previous send call"
        );
    }
}
