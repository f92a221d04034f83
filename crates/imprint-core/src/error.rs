//! Error types and result aliases for imprint.
//!
//! Every engine reports failures through [`Error`]. Each variant maps to a
//! host status code so a failure can be surfaced on the caller's error stack
//! and returned across the plugin boundary without losing its class.

use std::fmt;

/// The result type used throughout imprint.
pub type Result<T> = std::result::Result<T, Error>;

/// Host status codes reported alongside errors.
pub mod status {
    /// Malformed rule arguments or invocation records.
    pub const INVALID_ARGUMENT: i32 = -130_000;
    /// An operation was refused because its target is immutable.
    pub const OPERATION_NOT_PERMITTED: i32 = -136_000;
    /// A required configuration entry is missing or has the wrong type.
    pub const CONFIGURATION: i32 = -317_000;
    /// A catalog query failed.
    pub const CATALOG_QUERY: i32 = -808_000;
    /// A serialization or deserialization step failed.
    pub const SERIALIZATION: i32 = -1_004_000;
    /// A publishing backend failed.
    pub const PUBLISHER: i32 = -154_000;
    /// The rule is not handled here; the host should try the next engine.
    pub const RULE_ENGINE_CONTINUE: i32 = 5_000_000;
}

/// Errors that can occur in imprint operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Event arguments or an invocation record had the wrong shape.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the malformed input.
        message: String,
    },

    /// Configuration was missing or mistyped.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// A catalog query could not be executed.
    #[error("catalog query failed: {message}")]
    CatalogQuery {
        /// Description of the query failure.
        message: String,
    },

    /// The delayed-execution facility rejected a submission.
    #[error("scheduling failed ({code}): {message}")]
    Scheduling {
        /// Status code returned by the facility (negative).
        code: i32,
        /// Description of the rejected submission.
        message: String,
    },

    /// The target is published and therefore immutable.
    #[error("{kind} is published and now immutable [{path}]")]
    OperationNotPermitted {
        /// Kind of target (`object` or `collection`).
        kind: &'static str,
        /// Logical path of the target.
        path: String,
    },

    /// The rule is not handled by this engine.
    #[error("unsupported rule: {rule}")]
    UnsupportedRule {
        /// The rule name or a description of the unsupported request.
        rule: String,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// A publishing backend failed.
    #[error("publisher error: {message}")]
    Publisher {
        /// Description of the backend failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a catalog query error.
    #[must_use]
    pub fn catalog_query(message: impl Into<String>) -> Self {
        Self::CatalogQuery {
            message: message.into(),
        }
    }

    /// Creates a scheduling error carrying the facility's status code.
    #[must_use]
    pub fn scheduling(code: i32, message: impl Into<String>) -> Self {
        Self::Scheduling {
            code,
            message: message.into(),
        }
    }

    /// Creates an unsupported rule error.
    #[must_use]
    pub fn unsupported_rule(rule: impl fmt::Display) -> Self {
        Self::UnsupportedRule {
            rule: rule.to_string(),
        }
    }

    /// Creates a publisher error.
    #[must_use]
    pub fn publisher(message: impl Into<String>) -> Self {
        Self::Publisher {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a publisher error with a source cause.
    #[must_use]
    pub fn publisher_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Publisher {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns the host status code for this error.
    #[must_use]
    pub fn status_code(&self) -> i32 {
        match self {
            Self::InvalidArgument { .. } => status::INVALID_ARGUMENT,
            Self::Configuration { .. } => status::CONFIGURATION,
            Self::CatalogQuery { .. } => status::CATALOG_QUERY,
            Self::Scheduling { code, .. } => *code,
            Self::OperationNotPermitted { .. } => status::OPERATION_NOT_PERMITTED,
            Self::UnsupportedRule { .. } => status::RULE_ENGINE_CONTINUE,
            Self::Serialization { .. } => status::SERIALIZATION,
            Self::Publisher { .. } => status::PUBLISHER,
        }
    }

    /// Returns true when the host should continue with the next rule engine.
    #[must_use]
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::UnsupportedRule { .. })
    }
}
