//! Chained invocation wire record.
//!
//! A metadata post-event serializes one of these and hands it to the
//! delayed-execution facility. When the facility fires, the record comes back
//! verbatim through `exec_rule_expression` (or `exec_rule_text`).
//!
//! ```json
//! {
//!   "rule-engine-operation": "irods_policy_publishing_object_publish",
//!   "rule-engine-instance-name": "imprint-instance",
//!   "object-path": "/tempZone/home/alice/file.csv",
//!   "user-name": "alice",
//!   "publisher": "dataworld",
//!   "publish-type": "object"
//! }
//! ```

use serde::{Deserialize, Serialize};

use imprint_core::{Error, Result};

use crate::policy::{Operation, PolicyName, PublishType, classify_base};

/// A serialized publish or purge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ChainedInvocation {
    /// Base policy name.
    pub rule_engine_operation: String,
    /// Instance that scheduled the record and must handle it.
    pub rule_engine_instance_name: String,
    /// Target path for object records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_path: Option<String>,
    /// Target path for collection records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
    /// User who placed or removed the marker.
    pub user_name: String,
    /// Technology named by the marker value.
    pub publisher: String,
    /// `object` or `collection`.
    pub publish_type: String,
}

impl ChainedInvocation {
    /// Builds a record for a data object.
    #[must_use]
    pub fn for_object(
        operation: Operation,
        instance_name: impl Into<String>,
        object_path: impl Into<String>,
        user_name: impl Into<String>,
        publisher: impl Into<String>,
    ) -> Self {
        Self {
            rule_engine_operation: PolicyName::base(operation, PublishType::Object).into_string(),
            rule_engine_instance_name: instance_name.into(),
            object_path: Some(object_path.into()),
            collection_name: None,
            user_name: user_name.into(),
            publisher: publisher.into(),
            publish_type: PublishType::Object.as_str().to_string(),
        }
    }

    /// Builds a record for a collection.
    #[must_use]
    pub fn for_collection(
        operation: Operation,
        instance_name: impl Into<String>,
        collection_name: impl Into<String>,
        user_name: impl Into<String>,
        publisher: impl Into<String>,
    ) -> Self {
        Self {
            rule_engine_operation: PolicyName::base(operation, PublishType::Collection)
                .into_string(),
            rule_engine_instance_name: instance_name.into(),
            object_path: None,
            collection_name: Some(collection_name.into()),
            user_name: user_name.into(),
            publisher: publisher.into(),
            publish_type: PublishType::Collection.as_str().to_string(),
        }
    }

    /// Serializes the record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization {
            message: format!("failed to encode invocation: {e}"),
        })
    }

    /// Parses and validates a record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the JSON is malformed, carries
    /// unknown fields, or does not name exactly one target path.
    pub fn from_json(json: &str) -> Result<Self> {
        let invocation: Self = serde_json::from_str(json)
            .map_err(|e| Error::invalid_argument(format!("malformed invocation: {e}")))?;
        if invocation.object_path.is_some() == invocation.collection_name.is_some() {
            return Err(Error::invalid_argument(
                "invocation must carry exactly one of object-path or collection-name",
            ));
        }
        Ok(invocation)
    }

    /// Returns the operation and publish type of the record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the operation is not a base
    /// policy name or disagrees with `publish-type` or the target field.
    pub fn kind(&self) -> Result<(Operation, PublishType)> {
        let (operation, publish_type) =
            classify_base(&self.rule_engine_operation).ok_or_else(|| {
                Error::invalid_argument(format!(
                    "unknown rule-engine-operation [{}]",
                    self.rule_engine_operation
                ))
            })?;
        let declared: PublishType = self.publish_type.parse()?;
        let by_field = if self.object_path.is_some() {
            PublishType::Object
        } else {
            PublishType::Collection
        };
        if declared != publish_type || by_field != publish_type {
            return Err(Error::invalid_argument(format!(
                "rule-engine-operation [{}] does not match publish-type [{}]",
                self.rule_engine_operation, self.publish_type
            )));
        }
        Ok((operation, publish_type))
    }

    /// Returns the target path.
    #[must_use]
    pub fn target_path(&self) -> &str {
        self.object_path
            .as_deref()
            .or(self.collection_name.as_deref())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_record_uses_kebab_case_fields() {
        let record = ChainedInvocation::for_object(
            Operation::Publish,
            "imprint-instance",
            "/tempZone/home/alice/file.csv",
            "alice",
            "dataworld",
        );
        let json: serde_json::Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "rule-engine-operation": "irods_policy_publishing_object_publish",
                "rule-engine-instance-name": "imprint-instance",
                "object-path": "/tempZone/home/alice/file.csv",
                "user-name": "alice",
                "publisher": "dataworld",
                "publish-type": "object",
            })
        );
    }

    #[test]
    fn collection_record_round_trips() {
        let record = ChainedInvocation::for_collection(
            Operation::Purge,
            "imprint-instance",
            "/tempZone/home/alice/ds",
            "alice",
            "dataworld",
        );
        let parsed = ChainedInvocation::from_json(&record.to_json().unwrap()).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(
            parsed.kind().unwrap(),
            (Operation::Purge, PublishType::Collection)
        );
        assert_eq!(parsed.target_path(), "/tempZone/home/alice/ds");
    }

    #[test]
    fn rejects_records_without_a_single_target() {
        let both = r#"{
            "rule-engine-operation": "irods_policy_publishing_object_publish",
            "rule-engine-instance-name": "i",
            "object-path": "/z/a",
            "collection-name": "/z",
            "user-name": "u",
            "publisher": "p",
            "publish-type": "object"
        }"#;
        assert!(ChainedInvocation::from_json(both).is_err());

        let neither = r#"{
            "rule-engine-operation": "irods_policy_publishing_object_publish",
            "rule-engine-instance-name": "i",
            "user-name": "u",
            "publisher": "p",
            "publish-type": "object"
        }"#;
        assert!(ChainedInvocation::from_json(neither).is_err());
    }

    #[test]
    fn rejects_unknown_fields_and_garbage() {
        assert!(ChainedInvocation::from_json("not json").is_err());
        let extra = r#"{
            "rule-engine-operation": "irods_policy_publishing_object_publish",
            "rule-engine-instance-name": "i",
            "object-path": "/z/a",
            "user-name": "u",
            "publisher": "p",
            "publish-type": "object",
            "priority": 1
        }"#;
        assert!(ChainedInvocation::from_json(extra).is_err());
    }

    #[test]
    fn kind_detects_mismatched_publish_type() {
        let mut record =
            ChainedInvocation::for_object(Operation::Publish, "i", "/z/a", "u", "dataworld");
        record.publish_type = "collection".into();
        assert!(record.kind().is_err());
    }
}
