//! Middleware configuration
//!
//! Loaded from TOML:
//!
//! ```toml
//! [scheduler]
//! name = "welcome-pages"
//! max_in_flight = 64
//!
//! [policy]
//! methods = ["GET", "HEAD"]
//! ignored_session_keys = ["cookie"]
//! ```

use crate::error::ConfigError;
use crate::policy::KeyPolicyConfig;
use cod_scheduler::SchedulerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config values for [`CacheOnDemand`](crate::CacheOnDemand)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodConfig {
    /// Scheduler settings
    pub scheduler: SchedulerConfig,
    /// Key policy rules
    pub policy: KeyPolicyConfig,
}

impl CodConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With scheduler settings
    #[inline]
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// With key policy rules
    #[inline]
    #[must_use]
    pub fn with_policy(mut self, policy: KeyPolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    /// Parse from a TOML document; missing fields keep their defaults
    ///
    /// # Errors
    /// Returns `ConfigError::Toml` on malformed input
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(CodConfig::from_toml_str("").unwrap(), CodConfig::default());
    }

    #[test]
    fn partial_document_overrides_fields() {
        let config = CodConfig::from_toml_str(
            r#"
            [scheduler]
            max_in_flight = 8

            [policy]
            methods = ["GET"]
            reject_authenticated = false
            "#,
        )
        .unwrap();

        assert_eq!(config.scheduler.max_in_flight, Some(8));
        assert_eq!(config.scheduler.name, "cod");
        assert_eq!(config.policy.methods, vec!["GET".to_string()]);
        assert!(!config.policy.reject_authenticated);
        assert_eq!(config.policy.ignored_session_keys, vec!["cookie".to_string()]);
    }

    #[test]
    fn malformed_document_is_rejected() {
        let err = CodConfig::from_toml_str("[policy]\nmethods = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn missing_file_names_path() {
        let err = CodConfig::from_file("/nonexistent/cod.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/cod.toml"));
    }
}
