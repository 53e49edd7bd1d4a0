//! Reference HTTP key policy
//!
//! A request is coalescable when its method is a configured safe method,
//! no user is authenticated, and its session carries nothing that could
//! make the response specific to one visitor. The key is the request
//! target verbatim, so `/a?x=1` and `/a?x=2` never share an execution.

use crate::context::RequestContext;
use cod_scheduler::{KeyError, KeyFunction};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Rules for [`HttpKeyPolicy`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyPolicyConfig {
    /// Methods that may be coalesced (case-insensitive)
    pub methods: Vec<String>,
    /// Whether an authenticated user disqualifies the request
    pub reject_authenticated: bool,
    /// Session keys whose presence never matters
    pub ignored_session_keys: Vec<String>,
    /// Session keys that disqualify only when non-empty
    pub empty_tolerant_session_keys: Vec<String>,
}

impl KeyPolicyConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With coalescable methods
    #[must_use]
    pub fn with_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = methods.into_iter().map(Into::into).collect();
        self
    }

    /// With authenticated-user check
    #[inline]
    #[must_use]
    pub fn with_reject_authenticated(mut self, reject: bool) -> Self {
        self.reject_authenticated = reject;
        self
    }

    /// With an additional ignored session key
    #[must_use]
    pub fn with_ignored_session_key(mut self, key: impl Into<String>) -> Self {
        self.ignored_session_keys.push(key.into());
        self
    }

    /// With an additional empty-tolerant session key
    #[must_use]
    pub fn with_empty_tolerant_session_key(mut self, key: impl Into<String>) -> Self {
        self.empty_tolerant_session_keys.push(key.into());
        self
    }

    fn allows_method(&self, method: &http::Method) -> bool {
        self.methods
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(method.as_str()))
    }
}

impl Default for KeyPolicyConfig {
    fn default() -> Self {
        Self {
            methods: vec!["GET".to_string(), "HEAD".to_string()],
            reject_authenticated: true,
            ignored_session_keys: vec!["cookie".to_string()],
            empty_tolerant_session_keys: vec!["flash".to_string(), "passport".to_string()],
        }
    }
}

/// Key function for HTTP requests
#[derive(Debug, Clone, Default)]
pub struct HttpKeyPolicy {
    config: KeyPolicyConfig,
}

impl HttpKeyPolicy {
    /// Create policy from rules
    #[inline]
    #[must_use]
    pub fn new(config: KeyPolicyConfig) -> Self {
        Self { config }
    }

    /// Rules in effect
    #[inline]
    #[must_use]
    pub fn config(&self) -> &KeyPolicyConfig {
        &self.config
    }

    /// First session entry that makes the request visitor-specific
    fn disqualifying_session_key<'a>(&self, ctx: &'a RequestContext) -> Option<&'a str> {
        let session = ctx.session.as_ref()?;
        session.iter().find_map(|(key, value)| {
            if self.config.ignored_session_keys.iter().any(|k| k == key) {
                return None;
            }
            if self.config.empty_tolerant_session_keys.iter().any(|k| k == key) && is_empty(value) {
                return None;
            }
            Some(key.as_str())
        })
    }
}

impl KeyFunction for HttpKeyPolicy {
    type Context = RequestContext;
    type Key = String;

    fn key(&self, ctx: &RequestContext) -> Result<Option<String>, KeyError> {
        if ctx.target.is_empty() {
            return Err(KeyError::new(format!("{} request has no target", ctx.method)));
        }
        if !self.config.allows_method(&ctx.method) {
            tracing::trace!(method = %ctx.method, url = %ctx.target, "method not coalescable");
            return Ok(None);
        }
        if self.config.reject_authenticated && ctx.user.is_some() {
            tracing::trace!(url = %ctx.target, "authenticated request not coalescable");
            return Ok(None);
        }
        if let Some(key) = self.disqualifying_session_key(ctx) {
            tracing::trace!(url = %ctx.target, session_key = key, "session not coalescable");
            return Ok(None);
        }
        Ok(Some(ctx.target.clone()))
    }
}

/// Emptiness as session stores report it: scalars carry no per-visitor state
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}
