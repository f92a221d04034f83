//! Plugin configuration.
//!
//! The host's server configuration lists every rule engine instance with an
//! opaque `plugin_specific_configuration` object. [`ServerProperties`] models
//! that file; [`PublishingConfig`] is the typed view every publishing engine
//! decodes from its own instance entry at `start`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Default publish marker attribute.
pub const DEFAULT_PUBLISH_MARKER: &str = "irods::publishing::publish";
/// Default attribute holding a user's backend API token.
pub const DEFAULT_API_TOKEN_MARKER: &str = "irods::publishing::api_token";
/// Default retry template handed to the delayed-execution facility.
pub const DEFAULT_DELAY_PARAMETERS: &str = "<EF>60s DOUBLE UNTIL SUCCESS OR 5 TIMES</EF>";
/// Default lower bound of the scheduling delay, in seconds.
pub const DEFAULT_MINIMUM_DELAY_TIME: &str = "1";
/// Default upper bound of the scheduling delay, in seconds.
pub const DEFAULT_MAXIMUM_DELAY_TIME: &str = "30";

/// The host's server configuration, as far as rule engines are concerned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerProperties {
    /// Plugin section.
    #[serde(default)]
    pub plugin_configuration: PluginConfiguration,
}

/// The `plugin_configuration` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginConfiguration {
    /// Rule engine instances in load order.
    #[serde(default)]
    pub rule_engines: Vec<RuleEngineEntry>,
}

/// One rule engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEngineEntry {
    /// Unique instance name.
    pub instance_name: String,
    /// Plugin library name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_name: Option<String>,
    /// Opaque per-instance configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_specific_configuration: Option<Value>,
}

impl ServerProperties {
    /// Parses the server configuration JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the document does not match.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::configuration(format!("invalid server configuration: {e}")))
    }

    /// Appends an instance entry.
    #[must_use]
    pub fn with_instance(mut self, instance_name: impl Into<String>, config: Value) -> Self {
        self.plugin_configuration.rule_engines.push(RuleEngineEntry {
            instance_name: instance_name.into(),
            plugin_name: None,
            plugin_specific_configuration: Some(config),
        });
        self
    }

    /// Returns the plugin-specific configuration object of `instance_name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the instance is not listed, has no
    /// plugin-specific configuration, or that configuration is not an object.
    pub fn plugin_specific_configuration(&self, instance_name: &str) -> Result<&Map<String, Value>> {
        let entry = self
            .plugin_configuration
            .rule_engines
            .iter()
            .find(|e| e.instance_name == instance_name)
            .ok_or_else(|| {
                Error::configuration(format!("no rule engine instance named [{instance_name}]"))
            })?;

        match &entry.plugin_specific_configuration {
            Some(Value::Object(map)) => Ok(map),
            Some(_) => Err(Error::configuration(format!(
                "plugin_specific_configuration for [{instance_name}] is not an object"
            ))),
            None => Err(Error::configuration(format!(
                "no plugin_specific_configuration for [{instance_name}]"
            ))),
        }
    }
}

/// Level used for an engine's routine log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Trace.
    Trace,
    /// Debug.
    #[default]
    Debug,
    /// Info.
    Info,
    /// Warn.
    Warn,
    /// Error.
    Error,
}

impl LogLevel {
    /// Parses a configured level, accepting an optional `log_` prefix.
    ///
    /// Unknown names fall back to `debug` with a warning.
    #[must_use]
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::warn!(value, "unknown log_level, using debug");
            Self::Debug
        })
    }

    /// Lowercase name of the level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        let name = lower.strip_prefix("log_").unwrap_or(&lower);
        match name {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(Error::configuration(format!("unknown log level: {s}"))),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed configuration of a publishing engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishingConfig {
    /// Instance name the engine was started as.
    pub instance_name: String,
    /// Publish marker attribute.
    pub publish: String,
    /// Attribute holding a user's API token.
    pub api_token: String,
    /// Lower delay bound, unparsed.
    pub minimum_delay_time: String,
    /// Upper delay bound, unparsed.
    pub maximum_delay_time: String,
    /// Retry template prepended to the scheduling condition.
    pub delay_parameters: String,
    /// Level for routine log events.
    pub log_level: LogLevel,
}

impl PublishingConfig {
    /// Creates a configuration with every default for `instance_name`.
    #[must_use]
    pub fn new(instance_name: impl Into<String>) -> Self {
        Self {
            instance_name: instance_name.into(),
            publish: DEFAULT_PUBLISH_MARKER.to_string(),
            api_token: DEFAULT_API_TOKEN_MARKER.to_string(),
            minimum_delay_time: DEFAULT_MINIMUM_DELAY_TIME.to_string(),
            maximum_delay_time: DEFAULT_MAXIMUM_DELAY_TIME.to_string(),
            delay_parameters: DEFAULT_DELAY_PARAMETERS.to_string(),
            log_level: LogLevel::default(),
        }
    }

    /// Decodes a plugin-specific configuration object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a key holds a value of the wrong type.
    pub fn from_plugin_config(
        instance_name: impl Into<String>,
        config: &Map<String, Value>,
    ) -> Result<Self> {
        let defaults = Self::new(instance_name);
        Ok(Self {
            publish: string_param(config, "publish", &defaults.publish)?,
            api_token: string_param(config, "api_token", &defaults.api_token)?,
            minimum_delay_time: delay_param(
                config,
                "minimum_delay_time",
                &defaults.minimum_delay_time,
            )?,
            maximum_delay_time: delay_param(
                config,
                "maximum_delay_time",
                &defaults.maximum_delay_time,
            )?,
            delay_parameters: string_param(config, "delay_parameters", &defaults.delay_parameters)?,
            log_level: match config.get("log_level") {
                None | Some(Value::Null) => defaults.log_level,
                Some(Value::String(s)) => LogLevel::parse_lenient(s),
                Some(other) => return Err(type_error("log_level", "a string", other)),
            },
            instance_name: defaults.instance_name,
        })
    }

    /// Loads the configuration of `instance_name` from the server properties.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the instance entry is missing or
    /// mistyped.
    pub fn load(instance_name: &str, properties: &ServerProperties) -> Result<Self> {
        let config = properties.plugin_specific_configuration(instance_name)?;
        Self::from_plugin_config(instance_name, config)
    }
}

fn type_error(key: &str, expected: &str, found: &Value) -> Error {
    Error::configuration(format!("configuration key [{key}] must be {expected}, found {found}"))
}

/// Reads an optional string key.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if the key holds a non-string value.
pub fn string_param(config: &Map<String, Value>, key: &str, default: &str) -> Result<String> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(default.to_string()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(type_error(key, "a string", other)),
    }
}

/// Reads an optional key that may be a string or an integer.
fn delay_param(config: &Map<String, Value>, key: &str, default: &str) -> Result<String> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(default.to_string()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) if n.is_u64() || n.is_i64() => Ok(n.to_string()),
        Some(other) => Err(type_error(key, "a string or integer", other)),
    }
}

/// Reads an optional list of strings. A single string is a one-element list.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if the key holds anything else.
pub fn string_list_param(
    config: &Map<String, Value>,
    key: &str,
    default: &[&str],
) -> Result<Vec<String>> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(default.iter().map(ToString::to_string).collect()),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(type_error(key, "a list of strings", other)),
            })
            .collect(),
        Some(other) => Err(type_error(key, "a list of strings", other)),
    }
}

/// Reads an optional non-negative integer key.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if the key holds anything else.
pub fn integer_param(config: &Map<String, Value>, key: &str, default: u64) -> Result<u64> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| type_error(key, "a non-negative integer", &Value::Number(n.clone()))),
        Some(other) => Err(type_error(key, "a non-negative integer", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn defaults_apply_to_empty_config() {
        let config = PublishingConfig::from_plugin_config("inst", &Map::new()).unwrap();
        assert_eq!(config, PublishingConfig::new("inst"));
        assert_eq!(config.publish, "irods::publishing::publish");
        assert_eq!(config.delay_parameters, "<EF>60s DOUBLE UNTIL SUCCESS OR 5 TIMES</EF>");
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn overrides_are_read() {
        let config = PublishingConfig::from_plugin_config(
            "inst",
            &as_map(json!({
                "publish": "example::publish",
                "minimum_delay_time": 5,
                "maximum_delay_time": "10",
                "log_level": "LOG_INFO",
            })),
        )
        .unwrap();
        assert_eq!(config.publish, "example::publish");
        assert_eq!(config.minimum_delay_time, "5");
        assert_eq!(config.maximum_delay_time, "10");
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn mistyped_keys_are_errors() {
        let err = PublishingConfig::from_plugin_config("inst", &as_map(json!({ "publish": 7 })))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(err.to_string().contains("publish"));
    }

    #[test]
    fn unknown_log_level_falls_back_to_debug() {
        assert_eq!(LogLevel::parse_lenient("chatty"), LogLevel::Debug);
        assert_eq!("log_warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
    }

    #[test]
    fn server_properties_lookup() {
        let props = ServerProperties::from_json(
            r#"{
                "plugin_configuration": {
                    "rule_engines": [
                        {
                            "instance_name": "imprint-instance",
                            "plugin_name": "imprint_publish",
                            "plugin_specific_configuration": { "log_level": "trace" }
                        },
                        { "instance_name": "bare" }
                    ]
                }
            }"#,
        )
        .unwrap();

        let config = PublishingConfig::load("imprint-instance", &props).unwrap();
        assert_eq!(config.log_level, LogLevel::Trace);
        assert!(props.plugin_specific_configuration("bare").is_err());
        assert!(props.plugin_specific_configuration("missing").is_err());
    }

    #[test]
    fn list_and_integer_params() {
        let map = as_map(json!({ "hosts": "https://a", "bulk_count": 7, "read_size": -1 }));
        assert_eq!(string_list_param(&map, "hosts", &[]).unwrap(), vec!["https://a"]);
        assert_eq!(string_list_param(&map, "other", &["x"]).unwrap(), vec!["x"]);
        assert_eq!(integer_param(&map, "bulk_count", 100).unwrap(), 7);
        assert!(integer_param(&map, "read_size", 1).is_err());
    }
}
