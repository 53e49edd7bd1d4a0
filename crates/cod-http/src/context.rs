//! Request context seen by the key policy

use http::Method;
use serde_json::{Map, Value};

/// The parts of an inbound request that decide coalescability
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    /// Request method
    pub method: Method,
    /// Path plus query, exactly as received
    pub target: String,
    /// Authenticated user, if any
    pub user: Option<String>,
    /// Session data, if the transport keeps one
    pub session: Option<Map<String, Value>>,
}

impl RequestContext {
    /// Create context for `method` and `target`
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            user: None,
            session: None,
        }
    }

    /// Create GET context
    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    /// Build context from an `http::Request`
    ///
    /// The target is the URI's path and query; user and session start empty.
    pub fn from_request<B>(request: &http::Request<B>) -> Self {
        let target = request
            .uri()
            .path_and_query()
            .map_or_else(|| request.uri().path().to_string(), ToString::to_string);
        Self::new(request.method().clone(), target)
    }

    /// Set authenticated user
    #[inline]
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Add a session entry
    #[must_use]
    pub fn with_session_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.session
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }
}
