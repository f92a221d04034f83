//! Observability infrastructure for imprint.
//!
//! Structured logging with consistent spans. Engines open a [`rule_span`] for
//! every host call and a [`policy_span`] for every forwarded policy so that a
//! publish can be followed from the metadata event to the backend upload.

use std::fmt;
use std::sync::Once;

use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt as fmt_layer, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once when the host loads the first engine. Safe to call multiple
/// times; subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `imprint_publish=debug`)
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer::layer().json())
                    .try_init();
            }
            LogFormat::Pretty => {
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer::layer().pretty())
                    .try_init();
            }
        }
    });
}

/// Creates a span for a host call into a rule engine.
///
/// # Example
///
/// ```rust
/// use imprint_core::observability::rule_span;
///
/// let span = rule_span("publishing", "pep_api_mod_avu_metadata_post", "imprint-instance");
/// let _guard = span.enter();
/// ```
#[must_use]
pub fn rule_span(engine: &str, rule: &str, instance: &str) -> Span {
    tracing::info_span!("rule", engine = engine, rule = rule, instance = instance)
}

/// Creates a span for a forwarded technology policy.
#[must_use]
pub fn policy_span(policy: &str, path: &str) -> Span {
    tracing::info_span!("policy", policy = policy, path = path)
}

/// Emits a tracing event at a level chosen at runtime.
///
/// Engines log their routine progress at the level named by the
/// `log_level` configuration entry.
///
/// ```rust
/// use imprint_core::{LogLevel, log_at};
///
/// log_at!(LogLevel::Debug, path = "/tempZone/a", "scheduled publish");
/// ```
#[macro_export]
macro_rules! log_at {
    ($level:expr, $($arg:tt)+) => {
        match $level {
            $crate::config::LogLevel::Trace => ::tracing::trace!($($arg)+),
            $crate::config::LogLevel::Debug => ::tracing::debug!($($arg)+),
            $crate::config::LogLevel::Info => ::tracing::info!($($arg)+),
            $crate::config::LogLevel::Warn => ::tracing::warn!($($arg)+),
            $crate::config::LogLevel::Error => ::tracing::error!($($arg)+),
        }
    };
}

/// Wrapper that hides a secret from `Debug` and `Display` output.
///
/// Used for per-user API tokens read from the catalog.
#[derive(Clone, PartialEq, Eq)]
pub struct Redacted<T>(T);

impl<T> Redacted<T> {
    /// Wraps a secret value.
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self(value)
    }

    /// Returns the wrapped secret.
    #[must_use]
    pub const fn expose(&self) -> &T {
        &self.0
    }
}

impl<T> fmt::Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T> fmt::Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_init_logging_succeeds() {
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Json); // Second call should be no-op
    }

    #[test]
    fn test_span_helpers_create_spans() {
        let span = rule_span("publishing", "pep_api_rm_coll_pre", "instance");
        let _guard = span.enter();
        let inner = policy_span("irods_policy_publishing_object_publish_dataworld", "/z/a");
        let _inner = inner.enter();
        tracing::info!("message in span");
    }

    #[test]
    fn log_at_accepts_every_level() {
        for level in [
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
        ] {
            log_at!(level, level = %level, "runtime level");
        }
    }

    #[test]
    fn redacted_hides_secret() {
        let token = Redacted::new("secret-token".to_string());
        assert_eq!(format!("{token:?}"), "[REDACTED]");
        assert_eq!(token.to_string(), "[REDACTED]");
        assert_eq!(token.expose(), "secret-token");
    }
}
