//! # imprint-publish
//!
//! The publishing policy engine.
//!
//! Marking a collection or data object with the publish attribute makes it
//! immutable and schedules its publication to the technology named by the
//! attribute value. This crate provides:
//!
//! - **Policy Names**: Derivation of per-technology policy names
//! - **Metadata Gate**: Catalog checks for published paths and ancestors
//! - **Scheduler**: Jittered, retryable delayed submissions
//! - **Dispatch**: The rule engine tying events, gate, and scheduler together
//!
//! ## Flow
//!
//! 1. `pep_api_mod_avu_metadata_pre` records whether the marker row is new
//! 2. `pep_api_mod_avu_metadata_post` schedules a delayed publish for a new row
//! 3. The facility fires `exec_rule_expression` with the serialized invocation
//! 4. The engine re-checks the marker and forwards to
//!    `irods_policy_publishing_<subject>_<operation>_<technology>`
//!
//! ## Example
//!
//! ```rust
//! use imprint_publish::policy::{Operation, PolicyName, PublishType};
//!
//! let name = PolicyName::base(Operation::Publish, PublishType::Collection)
//!     .for_technology("dataworld");
//! assert_eq!(name.as_str(), "irods_policy_publishing_collection_publish_dataworld");
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod dispatch;
pub mod event;
pub mod gate;
pub mod invocation;
pub mod metrics;
pub mod policy;
pub mod queue;
pub mod scheduler;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::dispatch::PublishingEngine;
    pub use crate::event::PolicyEvent;
    pub use crate::gate::MetadataGate;
    pub use crate::invocation::ChainedInvocation;
    pub use crate::metrics::PublishMetrics;
    pub use crate::policy::{Operation, PolicyName, PublishType, TechnologyPolicies};
    pub use crate::queue::InMemoryDelayQueue;
    pub use crate::scheduler::{PublishScheduler, SharedRng};
}

pub use dispatch::PublishingEngine;
