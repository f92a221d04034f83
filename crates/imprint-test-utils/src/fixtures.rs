//! Pre-built test fixtures for common scenarios.

use serde_json::Value;

use imprint_core::plugin::{O_RDWR, O_WRONLY};
use imprint_core::{CollectionInput, DataObjectInput, ModAvuInput, RuleArg, ServerProperties};

/// Instance name of the publishing engine in fixtures.
pub const PUBLISHING_INSTANCE: &str = "imprint-publishing-instance";
/// Instance name of the technology handler in fixtures.
pub const HANDLER_INSTANCE: &str = "imprint-dataworld-instance";
/// Default publish marker.
pub const MARKER: &str = "irods::publishing::publish";
/// Default API token attribute.
pub const API_TOKEN: &str = "irods::publishing::api_token";
/// Acting user.
pub const USER: &str = "alice";
/// Zone home of [`USER`].
pub const HOME: &str = "/tempZone/home/alice";

/// Server properties listing `instances` with their plugin-specific configuration.
pub fn server_properties<'a>(instances: impl IntoIterator<Item = (&'a str, Value)>) -> ServerProperties {
    instances
        .into_iter()
        .fold(ServerProperties::default(), |props, (name, config)| {
            props.with_instance(name, config)
        })
}

/// Arguments for a data object event.
pub fn data_object_args(path: &str, open_flags: i32) -> Vec<RuleArg> {
    RuleArg::pep_args(
        PUBLISHING_INSTANCE,
        USER,
        DataObjectInput::new(path, open_flags).into(),
    )
}

/// Arguments for an open for writing.
pub fn open_for_write_args(path: &str) -> Vec<RuleArg> {
    data_object_args(path, O_WRONLY)
}

/// Arguments for an open for reading and writing.
pub fn open_read_write_args(path: &str) -> Vec<RuleArg> {
    data_object_args(path, O_RDWR)
}

/// Arguments for a collection removal.
pub fn rm_coll_args(path: &str) -> Vec<RuleArg> {
    RuleArg::pep_args(PUBLISHING_INSTANCE, USER, CollectionInput::new(path).into())
}

/// Builds a metadata modification input.
pub fn mod_avu(
    operation: &str,
    item_type: &str,
    path: &str,
    attribute: &str,
    value: &str,
) -> ModAvuInput {
    ModAvuInput {
        operation: operation.to_string(),
        item_type: item_type.to_string(),
        path: path.to_string(),
        attribute: attribute.to_string(),
        value: value.to_string(),
        units: String::new(),
    }
}

/// Arguments for a metadata event.
pub fn mod_avu_args(input: &ModAvuInput) -> Vec<RuleArg> {
    RuleArg::pep_args(PUBLISHING_INSTANCE, USER, input.clone().into())
}
