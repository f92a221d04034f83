//! # imprint-dataworld
//!
//! Technology handler publishing marked content to [data.world](https://data.world).
//!
//! The publishing engine forwards delayed publishes to
//! `irods_policy_publishing_<subject>_<operation>_dataworld`; this crate
//! answers those four policies:
//!
//! - **Object publish**: one dataset named after the object, holding its bytes
//! - **Collection publish**: one dataset named after the collection, holding
//!   every data object below it
//! - **Purge**: acknowledged, nothing is removed remotely
//!
//! The acting user's API token is read from their user metadata under the
//! configured `api_token` attribute.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use imprint_core::{RuleEngine, ServerProperties};
//! use imprint_dataworld::DataWorldEngine;
//! # fn catalog() -> Arc<dyn imprint_core::Catalog> { unimplemented!() }
//! # fn store() -> Arc<dyn imprint_core::ObjectStore> { unimplemented!() }
//!
//! # fn main() -> imprint_core::Result<()> {
//! let props = ServerProperties::default().with_instance(
//!     "imprint-dataworld-instance",
//!     serde_json::json!({ "hosts": ["https://api.data.world/v0"] }),
//! );
//! let mut engine = DataWorldEngine::new(catalog(), store());
//! engine.start("imprint-dataworld-instance", &props)?;
//! assert!(engine.rule_exists("irods_policy_publishing_collection_publish_dataworld"));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod config;
pub mod engine;

pub use client::{DataWorldClient, Dataset, DatasetApi, Visibility};
pub use config::DataWorldConfig;
pub use engine::{DataWorldEngine, TECHNOLOGY};
