//! # imprint-core
//!
//! Shared contracts for the imprint publishing policy engines.
//!
//! Every engine in the workspace is a plugin living inside a catalog host. This
//! crate defines the pieces they agree on:
//!
//! - **Host Contract**: The rule engine lifecycle, typed rule arguments, and the
//!   per-invocation context handed to every call
//! - **Catalog Contract**: The metadata query interface and a typed model of the
//!   query strings the engines issue
//! - **Delayed Execution**: The contract for submitting work that re-enters an
//!   engine later with retries
//! - **Configuration**: Lookup of plugin-specific configuration and the typed
//!   publishing configuration decoded from it
//! - **Error Types**: The shared error taxonomy and host status codes
//! - **Observability**: Logging initialization and span helpers
//!
//! ## Example
//!
//! ```rust
//! use imprint_core::prelude::*;
//!
//! let query = CatalogQuery::select([Column::MetaCollAttrValue])
//!     .filter(Column::MetaCollAttrName, "irods::publishing::publish")
//!     .filter(Column::CollName, "/tempZone/home/alice/dataset");
//!
//! assert!(query.to_string().starts_with("SELECT META_COLL_ATTR_VALUE WHERE"));
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod catalog;
pub mod config;
pub mod delay;
pub mod error;
pub mod observability;
pub mod path;
pub mod plugin;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use imprint_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::catalog::{Catalog, CatalogQuery, Column, Condition, ObjectStore};
    pub use crate::config::{LogLevel, PublishingConfig, ServerProperties};
    pub use crate::delay::{DelayReceipt, DelaySubmission, DelayedExecutor};
    pub use crate::error::{Error, Result};
    pub use crate::plugin::{
        Avu, MetadataTarget, PendingMarking, PolicyArgs, PolicyInvoker, RuleArg, RuleContext,
        RuleEngine, RuleOutcome,
    };
}

pub use catalog::{Catalog, CatalogQuery, Column, Condition, ObjectStore};
pub use config::{LogLevel, PublishingConfig, ServerProperties};
pub use delay::{DelayReceipt, DelaySubmission, DelayedExecutor};
pub use error::{Error, Result};
pub use observability::{LogFormat, Redacted, init_logging};
pub use plugin::{
    Avu, CollectionInput, DataObjectInput, MetadataTarget, ModAvuInput, PendingMarking,
    PolicyArgs, PolicyInvoker, RuleArg, RuleContext, RuleEngine, RuleOutcome,
};
