//! Policy name registry.
//!
//! Policy names are derived, never stored: a technology handler serves
//! `<base>_<technology>` for each of the four base names, and the dispatcher
//! composes the same string when it forwards a delayed invocation. The same
//! inputs always give the same name.

use std::fmt;
use std::str::FromStr;

use imprint_core::{Error, Result};

/// Namespace prefix shared by every publishing policy.
pub const PREFIX: &str = "irods_policy_publishing";

/// Base names for data object policies.
pub mod object {
    /// Publish a data object.
    pub const PUBLISH: &str = "irods_policy_publishing_object_publish";
    /// Purge a published data object.
    pub const PURGE: &str = "irods_policy_publishing_object_purge";
}

/// Base names for collection policies.
pub mod collection {
    /// Publish a collection.
    pub const PUBLISH: &str = "irods_policy_publishing_collection_publish";
    /// Purge a published collection.
    pub const PURGE: &str = "irods_policy_publishing_collection_purge";
}

/// What a policy does to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Push the target to the backend.
    Publish,
    /// Remove the target from the backend.
    Purge,
}

impl Operation {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Publish => "publish",
            Self::Purge => "purge",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "publish" => Ok(Self::Publish),
            "purge" => Ok(Self::Purge),
            _ => Err(Error::invalid_argument(format!("unknown operation [{s}]"))),
        }
    }
}

/// The kind of catalog entity a policy targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublishType {
    /// A single data object.
    Object,
    /// A collection and everything beneath it.
    Collection,
}

impl PublishType {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Collection => "collection",
        }
    }
}

impl fmt::Display for PublishType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PublishType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "object" => Ok(Self::Object),
            "collection" => Ok(Self::Collection),
            _ => Err(Error::invalid_argument(format!("unknown publish type [{s}]"))),
        }
    }
}

/// A canonical policy name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PolicyName(String);

impl PolicyName {
    /// The base name for an `(operation, publish_type)` pair.
    #[must_use]
    pub fn base(operation: Operation, publish_type: PublishType) -> Self {
        let name = match (publish_type, operation) {
            (PublishType::Object, Operation::Publish) => object::PUBLISH,
            (PublishType::Object, Operation::Purge) => object::PURGE,
            (PublishType::Collection, Operation::Publish) => collection::PUBLISH,
            (PublishType::Collection, Operation::Purge) => collection::PURGE,
        };
        Self(name.to_string())
    }

    /// Borrows the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the name.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }

    /// Appends a technology to this name.
    #[must_use]
    pub fn for_technology(&self, technology: &str) -> Self {
        compose(&self.0, technology)
    }
}

impl fmt::Display for PolicyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PolicyName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for PolicyName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for PolicyName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Joins `prefix` and `technology` with `_`. No validation.
///
/// ```rust
/// use imprint_publish::policy::{compose, object};
///
/// assert_eq!(
///     compose(object::PUBLISH, "dataworld").as_str(),
///     "irods_policy_publishing_object_publish_dataworld"
/// );
/// ```
#[must_use]
pub fn compose(prefix: &str, technology: &str) -> PolicyName {
    let mut name = String::with_capacity(prefix.len() + technology.len() + 1);
    name.push_str(prefix);
    name.push('_');
    name.push_str(technology);
    PolicyName(name)
}

/// Maps an operation and publish type, given as strings, to a base name.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] naming both inputs unless the pair is
/// one of `publish`/`purge` by `object`/`collection`.
pub fn resolve(operation: &str, publish_type: &str) -> Result<PolicyName> {
    match (operation.parse(), publish_type.parse()) {
        (Ok(operation), Ok(publish_type)) => Ok(PolicyName::base(operation, publish_type)),
        _ => Err(Error::invalid_argument(format!(
            "no policy for operation [{operation}] and publish type [{publish_type}]"
        ))),
    }
}

/// Recognizes one of the four base names.
#[must_use]
pub fn classify_base(name: &str) -> Option<(Operation, PublishType)> {
    match name {
        object::PUBLISH => Some((Operation::Publish, PublishType::Object)),
        object::PURGE => Some((Operation::Purge, PublishType::Object)),
        collection::PUBLISH => Some((Operation::Publish, PublishType::Collection)),
        collection::PURGE => Some((Operation::Purge, PublishType::Collection)),
        _ => None,
    }
}

/// The four policy names a technology handler serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechnologyPolicies {
    technology: String,
    names: Vec<(PolicyName, Operation, PublishType)>,
}

impl TechnologyPolicies {
    /// Composes the names for `technology`.
    #[must_use]
    pub fn new(technology: impl Into<String>) -> Self {
        let technology = technology.into();
        let names = [PublishType::Object, PublishType::Collection]
            .into_iter()
            .flat_map(|publish_type| {
                [Operation::Publish, Operation::Purge]
                    .into_iter()
                    .map(move |operation| (operation, publish_type))
            })
            .map(|(operation, publish_type)| {
                (
                    PolicyName::base(operation, publish_type).for_technology(&technology),
                    operation,
                    publish_type,
                )
            })
            .collect();
        Self { technology, names }
    }

    /// The technology these names belong to.
    #[must_use]
    pub fn technology(&self) -> &str {
        &self.technology
    }

    /// All four names.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.names
            .iter()
            .map(|(name, _, _)| name.as_str().to_string())
            .collect()
    }

    /// Returns true if `name` is one of the four.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.classify(name).is_some()
    }

    /// Returns the operation and publish type `name` stands for.
    #[must_use]
    pub fn classify(&self, name: &str) -> Option<(Operation, PublishType)> {
        self.names
            .iter()
            .find(|(candidate, _, _)| candidate == &name)
            .map(|(_, operation, publish_type)| (*operation, *publish_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn resolve_covers_the_grid() {
        let grid = [
            ("publish", "object", object::PUBLISH),
            ("purge", "object", object::PURGE),
            ("publish", "collection", collection::PUBLISH),
            ("purge", "collection", collection::PURGE),
        ];
        for (operation, publish_type, expected) in grid {
            assert_eq!(resolve(operation, publish_type).unwrap(), expected);
        }
    }

    #[test]
    fn resolve_rejects_other_pairs() {
        for (operation, publish_type) in [
            ("publish", "resource"),
            ("delete", "object"),
            ("", ""),
            ("Publish", "object"),
        ] {
            let err = resolve(operation, publish_type).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument { .. }));
            let message = err.to_string();
            assert!(message.contains(&format!("[{operation}]")));
            assert!(message.contains(&format!("[{publish_type}]")));
        }
    }

    #[test]
    fn base_names_share_prefix() {
        for name in [object::PUBLISH, object::PURGE, collection::PUBLISH, collection::PURGE] {
            assert!(name.starts_with(PREFIX));
            assert!(classify_base(name).is_some());
        }
        assert_eq!(classify_base("irods_policy_publishing_object"), None);
    }

    #[test]
    fn technology_policies_classify() {
        let policies = TechnologyPolicies::new("dataworld");
        assert_eq!(policies.technology(), "dataworld");
        assert_eq!(policies.names().len(), 4);
        assert_eq!(
            policies.classify("irods_policy_publishing_collection_purge_dataworld"),
            Some((Operation::Purge, PublishType::Collection))
        );
        assert!(!policies.contains("irods_policy_publishing_collection_purge_zenodo"));
        assert!(!policies.contains(collection::PURGE));
    }

    proptest! {
        #[test]
        fn compose_concatenates(prefix in "[a-z_]{0,20}", technology in "[a-z0-9]{0,12}") {
            let name = compose(&prefix, &technology);
            prop_assert_eq!(name.as_str(), format!("{prefix}_{technology}"));
        }

        #[test]
        fn compose_is_injective_for_fixed_prefix(a in "[a-z0-9_]{0,12}", b in "[a-z0-9_]{0,12}") {
            prop_assume!(a != b);
            prop_assert_ne!(compose(object::PUBLISH, &a), compose(object::PUBLISH, &b));
        }
    }
}
