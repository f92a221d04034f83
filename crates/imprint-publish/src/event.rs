//! Typed policy enforcement point events.
//!
//! The host passes every API event as `[instance, comm, input]`. Decoding
//! turns that positional list into a [`PolicyEvent`] once, so the dispatcher
//! never inspects raw arguments.

use imprint_core::{
    Avu, CollectionInput, DataObjectInput, Error, MetadataTarget, ModAvuInput, Result, RuleArg,
};

/// Data object open.
pub const DATA_OBJ_OPEN_PRE: &str = "pep_api_data_obj_open_pre";
/// Data object create.
pub const DATA_OBJ_CREATE_PRE: &str = "pep_api_data_obj_create_pre";
/// Data object put.
pub const DATA_OBJ_PUT_PRE: &str = "pep_api_data_obj_put_pre";
/// Data object unlink.
pub const DATA_OBJ_UNLINK_PRE: &str = "pep_api_data_obj_unlink_pre";
/// Collection removal.
pub const RM_COLL_PRE: &str = "pep_api_rm_coll_pre";
/// Metadata modification, before commit.
pub const MOD_AVU_METADATA_PRE: &str = "pep_api_mod_avu_metadata_pre";
/// Metadata modification, after commit.
pub const MOD_AVU_METADATA_POST: &str = "pep_api_mod_avu_metadata_post";

/// Every event the publishing engine serves.
pub const RULES: [&str; 7] = [
    RM_COLL_PRE,
    DATA_OBJ_OPEN_PRE,
    DATA_OBJ_CREATE_PRE,
    DATA_OBJ_PUT_PRE,
    DATA_OBJ_UNLINK_PRE,
    MOD_AVU_METADATA_PRE,
    MOD_AVU_METADATA_POST,
];

/// Which data object API raised the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataObjectPep {
    /// Open (guarded only for write access).
    Open,
    /// Create.
    Create,
    /// Put.
    Put,
    /// Unlink.
    Unlink,
}

/// Metadata modification verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvuOperation {
    /// `add`
    Add,
    /// `set`
    Set,
    /// `rm`
    Remove,
    /// Anything else (`mod`, `cp`, `rmw`, ...).
    Other(String),
}

impl AvuOperation {
    fn parse(s: &str) -> Self {
        match s {
            "add" => Self::Add,
            "set" => Self::Set,
            "rm" => Self::Remove,
            other => Self::Other(other.to_string()),
        }
    }

    /// True for `add` and `set`.
    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(self, Self::Add | Self::Set)
    }
}

/// A decoded metadata modification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataChange {
    /// The verb.
    pub operation: AvuOperation,
    /// Data object or collection; `None` for users and resources.
    pub target: Option<MetadataTarget>,
    /// The row being written or removed.
    pub avu: Avu,
}

impl From<ModAvuInput> for MetadataChange {
    fn from(input: ModAvuInput) -> Self {
        let target = match input.item_type.as_str() {
            "-d" => Some(MetadataTarget::DataObject(input.path)),
            "-C" | "-c" => Some(MetadataTarget::Collection(input.path)),
            _ => None,
        };
        Self {
            operation: AvuOperation::parse(&input.operation),
            target,
            avu: Avu {
                attribute: input.attribute,
                value: input.value,
                units: input.units,
            },
        }
    }
}

/// A decoded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyEvent {
    /// A data object API about to run.
    DataObject {
        /// Which API.
        pep: DataObjectPep,
        /// Its input.
        input: DataObjectInput,
    },
    /// A collection about to be removed.
    RemoveCollection(CollectionInput),
    /// Metadata about to change.
    MetadataPre(MetadataChange),
    /// Metadata has changed.
    MetadataPost(MetadataChange),
}

impl PolicyEvent {
    /// Decodes `args` for `rule`.
    ///
    /// Returns `Ok(None)` for rules this module does not know.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the argument count or the input
    /// type does not match the rule.
    pub fn decode(rule: &str, args: &[RuleArg]) -> Result<Option<Self>> {
        let pep = match rule {
            DATA_OBJ_OPEN_PRE => Some(DataObjectPep::Open),
            DATA_OBJ_CREATE_PRE => Some(DataObjectPep::Create),
            DATA_OBJ_PUT_PRE => Some(DataObjectPep::Put),
            DATA_OBJ_UNLINK_PRE => Some(DataObjectPep::Unlink),
            RM_COLL_PRE | MOD_AVU_METADATA_PRE | MOD_AVU_METADATA_POST => None,
            _ => return Ok(None),
        };

        let input = match args {
            [_, _, input] => input.clone(),
            _ => {
                return Err(Error::invalid_argument(format!(
                    "[{rule}] expects 3 arguments, got {}",
                    args.len()
                )));
            }
        };
        let mismatch = |expected: &str| {
            Error::invalid_argument(format!(
                "[{rule}] expects a {expected}, got a {}",
                input.kind()
            ))
        };

        let event = match (pep, rule, &input) {
            (Some(pep), _, RuleArg::DataObject(input)) => Self::DataObject {
                pep,
                input: input.clone(),
            },
            (Some(_), _, _) => return Err(mismatch("data object input")),
            (None, RM_COLL_PRE, RuleArg::Collection(input)) => {
                Self::RemoveCollection(input.clone())
            }
            (None, RM_COLL_PRE, _) => return Err(mismatch("collection input")),
            (None, MOD_AVU_METADATA_PRE, RuleArg::ModAvu(input)) => {
                Self::MetadataPre(input.clone().into())
            }
            (None, _, RuleArg::ModAvu(input)) => Self::MetadataPost(input.clone().into()),
            (None, _, _) => return Err(mismatch("metadata input")),
        };
        Ok(Some(event))
    }

    /// Returns the `(kind, path)` to check for immutability, if any.
    #[must_use]
    pub fn guarded_target(&self) -> Option<(&'static str, &str)> {
        match self {
            Self::DataObject {
                pep: DataObjectPep::Open,
                input,
            } if !input.is_write() => None,
            Self::DataObject { input, .. } => Some(("object", input.obj_path.as_str())),
            Self::RemoveCollection(input) => Some(("collection", input.coll_name.as_str())),
            Self::MetadataPre(_) | Self::MetadataPost(_) => None,
        }
    }
}
