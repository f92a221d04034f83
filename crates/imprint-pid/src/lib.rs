//! # imprint-pid
//!
//! Mints persistent identifiers for published content.
//!
//! [`PersistentIdentifierEngine`] answers the
//! `irods_policy_publishing_persistent_identifier` policy with a fresh
//! identifier for a path, returned to the caller as a rule value.
//!
//! ## Example
//!
//! ```rust
//! use imprint_core::{RuleArg, RuleContext, RuleEngine, RuleOutcome, ServerProperties};
//! use imprint_pid::PersistentIdentifierEngine;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> imprint_core::Result<()> {
//! let props = ServerProperties::default().with_instance("pid", serde_json::json!({}));
//! let mut engine = PersistentIdentifierEngine::new();
//! engine.start("pid", &props)?;
//!
//! let mut ctx = RuleContext::detached("alice");
//! let args = [
//!     RuleArg::Str("/tempZone/home/alice/ds".into()),
//!     RuleArg::Str("handle".into()),
//! ];
//! let outcome = engine.exec_rule(engine.policy(), &args, &mut ctx).await?;
//! assert!(matches!(outcome, RuleOutcome::Value(_)));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod engine;

pub use config::PidConfig;
pub use engine::{PersistentIdentifierEngine, encode_identifier, mint_identifier};
