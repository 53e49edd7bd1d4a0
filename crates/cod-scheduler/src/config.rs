//! Scheduler configuration

use serde::{Deserialize, Serialize};

/// Config values for [`CoalescingScheduler`](crate::CoalescingScheduler)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Name attached to every log event of this scheduler
    pub name: String,
    /// How many distinct keys may be in flight at once; joins are never limited
    pub max_in_flight: Option<usize>,
}

impl SchedulerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With scheduler name
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// With in-flight limit
    #[inline]
    #[must_use]
    pub fn with_max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = Some(limit);
        self
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name: "cod".to_string(),
            max_in_flight: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_unbounded() {
        let config = SchedulerConfig::new();
        assert_eq!(config.max_in_flight, None);
        assert_eq!(config.name, "cod");
    }

    #[test]
    fn partial_config_deserializes_with_defaults() {
        let config: SchedulerConfig = serde_json::from_str(r#"{"max_in_flight": 8}"#).unwrap();
        assert_eq!(config, SchedulerConfig::new().with_max_in_flight(8));
    }
}
