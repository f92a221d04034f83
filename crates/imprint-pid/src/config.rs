//! Identifier service configuration.

use serde_json::{Map, Value};

use imprint_core::config::{LogLevel, ServerProperties, integer_param, string_list_param, string_param};
use imprint_core::{Error, Result};

/// Default number of identifiers minted per service round trip.
pub const DEFAULT_BULK_COUNT: u64 = 100;
/// Default read size, in bytes, when hashing object content.
pub const DEFAULT_READ_SIZE: u64 = 4_194_304;

/// Configuration of one identifier engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidConfig {
    /// Host-assigned instance name.
    pub instance_name: String,
    /// Identifier service endpoints.
    pub hosts: Vec<String>,
    /// Identifiers minted per service round trip.
    pub bulk_count: u64,
    /// Read size in bytes.
    pub read_size: u64,
    /// Level of routine progress events.
    pub log_level: LogLevel,
}

impl PidConfig {
    /// Decodes the instance's plugin-specific configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a key has the wrong type or a
    /// count is zero.
    pub fn from_plugin_config(instance_name: &str, config: &Map<String, Value>) -> Result<Self> {
        let bulk_count = integer_param(config, "bulk_count", DEFAULT_BULK_COUNT)?;
        let read_size = integer_param(config, "read_size", DEFAULT_READ_SIZE)?;
        if bulk_count == 0 || read_size == 0 {
            return Err(Error::configuration(format!(
                "[{instance_name}] bulk_count and read_size must be positive"
            )));
        }

        Ok(Self {
            instance_name: instance_name.to_string(),
            hosts: string_list_param(config, "hosts", &[])?,
            bulk_count,
            read_size,
            log_level: LogLevel::parse_lenient(&string_param(
                config,
                "log_level",
                LogLevel::default().as_str(),
            )?),
        })
    }

    /// Looks up and decodes `instance_name` in the server properties.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the instance is missing or
    /// misconfigured.
    pub fn load(instance_name: &str, properties: &ServerProperties) -> Result<Self> {
        let config = properties.plugin_specific_configuration(instance_name)?;
        Self::from_plugin_config(instance_name, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: Value) -> Result<PidConfig> {
        match value {
            Value::Object(map) => PidConfig::from_plugin_config("pid", &map),
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn defaults() {
        let config = decode(json!({})).unwrap();
        assert!(config.hosts.is_empty());
        assert_eq!(config.bulk_count, DEFAULT_BULK_COUNT);
        assert_eq!(config.read_size, DEFAULT_READ_SIZE);
    }

    #[test]
    fn read_size_and_bulk_count_are_independent() {
        let config = decode(json!({ "bulk_count": 10, "read_size": 1024 })).unwrap();
        assert_eq!(config.bulk_count, 10);
        assert_eq!(config.read_size, 1024);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(decode(json!({ "bulk_count": 0 })).is_err());
        assert!(decode(json!({ "read_size": "big" })).is_err());
        assert!(decode(json!({ "hosts": [1] })).is_err());
    }
}
