//! Handler configuration.

use serde_json::{Map, Value};

use imprint_core::config::{PublishingConfig, ServerProperties, string_list_param};
use imprint_core::{Error, Result};

/// Default API base URL.
pub const DEFAULT_HOST: &str = "https://api.data.world/v0";

/// Configuration of one data.world handler instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataWorldConfig {
    /// Shared publishing keys (`api_token`, `log_level`, ...).
    pub publishing: PublishingConfig,
    /// API base URLs. The first one is used.
    pub hosts: Vec<String>,
}

impl DataWorldConfig {
    /// Decodes the instance's plugin-specific configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a key has the wrong type or
    /// `hosts` is an empty list.
    pub fn from_plugin_config(instance_name: &str, config: &Map<String, Value>) -> Result<Self> {
        let publishing = PublishingConfig::from_plugin_config(instance_name, config)?;
        let hosts = string_list_param(config, "hosts", &[DEFAULT_HOST])?;
        if hosts.is_empty() {
            return Err(Error::configuration(format!(
                "[{instance_name}] lists no data.world hosts"
            )));
        }
        Ok(Self { publishing, hosts })
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

    /// The API base URL requests go to.
    #[must_use]
    pub fn host(&self) -> &str {
        self.hosts.first().map_or(DEFAULT_HOST, String::as_str)
    }
}
