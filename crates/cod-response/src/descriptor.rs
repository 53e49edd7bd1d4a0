//! Response Descriptor
//!
//! The captured, serializable record of one execution's externally
//! observable output. Status and headers accumulate while the execution
//! runs; exactly one [`Terminal`] finalizes it.

use crate::error::DescriptorError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of one underlying execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub Uuid);

impl ExecutionId {
    /// Generate a fresh execution ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque payload delivered by a send-style terminal call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Body {
    /// Text payload
    Text(String),
    /// Structured JSON payload
    Json(serde_json::Value),
    /// Binary payload
    Bytes(Vec<u8>),
}

impl Body {
    /// Content type a sink applies when none was set explicitly
    #[must_use]
    pub fn default_content_type(&self) -> &'static str {
        match self {
            Self::Text(_) => "text/html; charset=utf-8",
            Self::Json(_) => "application/json; charset=utf-8",
            Self::Bytes(_) => "application/octet-stream",
        }
    }

    /// Encode the payload as bytes
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Text(text) => text.as_bytes().to_vec(),
            Self::Json(value) => value.to_string().into_bytes(),
            Self::Bytes(bytes) => bytes.clone(),
        }
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Body {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// Redirect target, optionally with its own status code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    /// Target URL
    pub location: String,
    /// Redirect status; sinks fall back to 302 when absent
    pub status: Option<u16>,
}

impl Redirect {
    /// Status used when a redirect carries none
    pub const DEFAULT_STATUS: u16 = 302;

    /// Redirect to `location` with the default status
    #[inline]
    #[must_use]
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            status: None,
        }
    }

    /// Redirect to `location` with an explicit status
    #[inline]
    #[must_use]
    pub fn with_status(status: u16, location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            status: Some(status),
        }
    }

    /// Status to emit for this redirect
    #[inline]
    #[must_use]
    pub fn effective_status(&self) -> u16 {
        self.status.unwrap_or(Self::DEFAULT_STATUS)
    }
}

/// The one output that finalizes a descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Terminal {
    /// Send-style body
    Body {
        /// Payload
        body: Body,
    },
    /// Redirect-style target
    Redirect {
        /// Target and status
        redirect: Redirect,
    },
    /// End-style raw bytes, bypassing body semantics
    Raw {
        /// Bytes written verbatim
        bytes: Vec<u8>,
    },
}

impl Terminal {
    /// Name of the terminal call that produced this output
    #[must_use]
    pub fn call_name(&self) -> &'static str {
        match self {
            Self::Body { .. } => "send",
            Self::Redirect { .. } => "redirect",
            Self::Raw { .. } => "end",
        }
    }
}

/// Captured output of one finished execution
///
/// Shared read-only (behind `Arc`) once its terminal output is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseDescriptor {
    status_code: Option<u16>,
    #[serde(default)]
    headers: IndexMap<String, String>,
    terminal: Option<Terminal>,
}

impl ResponseDescriptor {
    /// Start building a descriptor
    #[inline]
    #[must_use]
    pub fn builder() -> DescriptorBuilder {
        DescriptorBuilder::default()
    }

    /// Captured status code, if any was set
    #[inline]
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Captured headers, keyed as supplied, in the order last written
    #[inline]
    #[must_use]
    pub fn headers(&self) -> &IndexMap<String, String> {
        &self.headers
    }

    /// Header value by exact name
    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Terminal output, absent on a terminal violation
    #[inline]
    #[must_use]
    pub fn terminal(&self) -> Option<&Terminal> {
        self.terminal.as_ref()
    }

    /// Whether a terminal call finalized this descriptor
    #[inline]
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminal.is_some()
    }

    /// Serialize to JSON
    ///
    /// # Errors
    /// Returns `DescriptorError::Encode` if serialization fails
    pub fn to_json(&self) -> Result<String, DescriptorError> {
        serde_json::to_string(self).map_err(DescriptorError::Encode)
    }

    /// Deserialize from JSON
    ///
    /// # Errors
    /// Returns `DescriptorError::Decode` on malformed input
    pub fn from_json(json: &str) -> Result<Self, DescriptorError> {
        serde_json::from_str(json).map_err(DescriptorError::Decode)
    }
}

/// Mutable phase of a descriptor
///
/// Consumed by [`DescriptorBuilder::finish`], after which the descriptor
/// can no longer change.
#[derive(Debug, Clone, Default)]
pub struct DescriptorBuilder {
    inner: ResponseDescriptor,
}

impl DescriptorBuilder {
    /// Record a status code (last value wins)
    #[inline]
    pub fn status(&mut self, code: u16) -> &mut Self {
        self.inner.status_code = Some(code);
        self
    }

    /// Record a header (last value per name wins)
    ///
    /// A re-written name moves to the end, so a sink that folds names by
    /// case sees the writes in the order they happened.
    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        self.inner.headers.shift_remove(&name);
        self.inner.headers.insert(name, value.into());
        self
    }

    /// Status recorded so far
    #[inline]
    #[must_use]
    pub fn current_status(&self) -> Option<u16> {
        self.inner.status_code
    }

    /// Finalize with a terminal output
    #[must_use]
    pub fn finish(self, terminal: Terminal) -> ResponseDescriptor {
        ResponseDescriptor {
            terminal: Some(terminal),
            ..self.inner
        }
    }

    /// Finalize without a terminal output (a terminal violation)
    #[must_use]
    pub fn finish_unterminated(self) -> ResponseDescriptor {
        self.inner
    }
}
