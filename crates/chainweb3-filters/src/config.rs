use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the filter engine.
///
/// Durations are whole seconds on the wire; omitted fields keep their
/// defaults:
///
/// ```json
/// { "poll_interval_secs": 2, "filter_ttl_secs": 60 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterEngineConfig {
    /// Delay between polls of the wrapped provider.
    #[serde(rename = "poll_interval_secs", with = "secs")]
    pub poll_interval: Duration,
    /// Filters not read for this long are dropped on the next poll.
    #[serde(rename = "filter_ttl_secs", with = "secs")]
    pub filter_ttl: Duration,
}

impl Default for FilterEngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(4),
            filter_ttl: Duration::from_secs(300),
        }
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_fields_keep_defaults() {
        let config: FilterEngineConfig =
            serde_json::from_value(json!({ "poll_interval_secs": 1 })).unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.filter_ttl, Duration::from_secs(300));

        let empty: FilterEngineConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty, FilterEngineConfig::default());
    }

    #[test]
    fn durations_are_whole_seconds() {
        let value = serde_json::to_value(FilterEngineConfig::default()).unwrap();
        assert_eq!(value, json!({ "poll_interval_secs": 4, "filter_ttl_secs": 300 }));

        let err = serde_json::from_value::<FilterEngineConfig>(json!({ "filter_ttl_secs": "5m" }));
        assert!(err.is_err());
    }
}
