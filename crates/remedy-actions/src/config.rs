//! Typed reads from the opaque configuration map.
//!
//! Missing keys and values of the wrong JSON type both fall back to the
//! caller's default, so an action always has a well-defined starting point.

use remedy_contracts::action::ConfigMap;

pub(crate) fn read_i64(config: &ConfigMap, key: &str, default: i64) -> i64 {
    config.get(key).and_then(|v| v.as_i64()).unwrap_or(default)
}

pub(crate) fn read_f64(config: &ConfigMap, key: &str, default: f64) -> f64 {
    config.get(key).and_then(|v| v.as_f64()).unwrap_or(default)
}

pub(crate) fn read_str<'c>(config: &'c ConfigMap, key: &str) -> Option<&'c str> {
    config.get(key).and_then(|v| v.as_str())
}

/// A single-entry delta.
pub(crate) fn delta(key: &str, value: serde_json::Value) -> ConfigMap {
    let mut changes = ConfigMap::new();
    changes.insert(key.to_string(), value);
    changes
}
