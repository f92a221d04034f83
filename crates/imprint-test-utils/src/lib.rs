//! Shared test utilities for imprint integration tests.
//!
//! This crate provides:
//! - [`InMemoryCatalog`]: Query-string driven catalog with operation recording
//! - [`TestHost`]: Host that routes events and chained policies between engines
//! - Fixture builders for rule arguments and server properties
//!
//! # Example
//!
//! ```rust,ignore
//! use imprint_test_utils::{InMemoryCatalog, TestHost, open_for_write_args};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let catalog = Arc::new(InMemoryCatalog::new());
//!     let mut host = TestHost::new();
//!     // ... load engines, raise events ...
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod catalog;
pub mod fixtures;
pub mod host;

pub use catalog::*;
pub use fixtures::*;
pub use host::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("imprint=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
