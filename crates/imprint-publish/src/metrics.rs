//! Publishing metrics.
//!
//! Counters are recorded through the `metrics` facade; the host process
//! decides whether and where to export them.
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `imprint_guard_checks_total` | Counter | `result` | Immutability guard outcomes |
//! | `imprint_schedules_total` | Counter | `operation`, `result` | Delayed submissions |
//! | `imprint_chained_dispatch_total` | Counter | `operation`, `result` | Forwarded delayed invocations |
//! | `imprint_catalog_query_failures_total` | Counter | - | Catalog errors treated as "not published" |

use metrics::counter;

/// Metric names.
pub mod names {
    /// Counter: immutability guard outcomes.
    pub const GUARD_CHECKS_TOTAL: &str = "imprint_guard_checks_total";
    /// Counter: delayed submissions.
    pub const SCHEDULES_TOTAL: &str = "imprint_schedules_total";
    /// Counter: forwarded delayed invocations.
    pub const CHAINED_DISPATCH_TOTAL: &str = "imprint_chained_dispatch_total";
    /// Counter: catalog failures swallowed by the metadata gate.
    pub const CATALOG_QUERY_FAILURES_TOTAL: &str = "imprint_catalog_query_failures_total";
}

/// Label keys.
pub mod labels {
    /// Outcome (`allowed`, `rejected`, `submitted`, `failed`, `skipped`, ...).
    pub const RESULT: &str = "result";
    /// `publish` or `purge`.
    pub const OPERATION: &str = "operation";
}

/// Records publishing metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublishMetrics;

impl PublishMetrics {
    /// Creates a recorder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Records a guard decision.
    pub fn record_guard_check(&self, rejected: bool) {
        let result = if rejected { "rejected" } else { "allowed" };
        counter!(names::GUARD_CHECKS_TOTAL, labels::RESULT => result).increment(1);
    }

    /// Records a delayed submission.
    pub fn record_schedule(&self, operation: &'static str, result: &'static str) {
        counter!(
            names::SCHEDULES_TOTAL,
            labels::OPERATION => operation,
            labels::RESULT => result
        )
        .increment(1);
    }

    /// Records a forwarded delayed invocation.
    pub fn record_chained_dispatch(&self, operation: &'static str, result: &'static str) {
        counter!(
            names::CHAINED_DISPATCH_TOTAL,
            labels::OPERATION => operation,
            labels::RESULT => result
        )
        .increment(1);
    }

    /// Records a catalog failure treated as "not published".
    pub fn record_catalog_failure(&self) {
        counter!(names::CATALOG_QUERY_FAILURES_TOTAL).increment(1);
    }
}
