//! Delayed-execution contract.
//!
//! Publish and purge work never runs inside the catalog operation that
//! triggered it. Engines submit a serialized invocation to a
//! [`DelayedExecutor`], which re-enters the originating instance later
//! (through `exec_rule_expression`) and retries according to the condition
//! string. Delivery is at-least-once.

use async_trait::async_trait;

use crate::error::Result;

/// A request to run a serialized invocation later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelaySubmission {
    /// Serialized invocation handed back to the engine on execution.
    pub invocation: String,
    /// Recovery action run if every attempt fails (empty for none).
    pub recovery: String,
    /// Retry/backoff condition, including the target instance and delay.
    pub condition: String,
}

impl DelaySubmission {
    /// Creates a submission with no recovery action.
    #[must_use]
    pub fn new(invocation: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            invocation: invocation.into(),
            recovery: String::new(),
            condition: condition.into(),
        }
    }

    /// Sets the recovery action.
    #[must_use]
    pub fn with_recovery(mut self, recovery: impl Into<String>) -> Self {
        self.recovery = recovery.into();
        self
    }
}

/// Acknowledgement of an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayReceipt {
    /// Facility-assigned identifier of the delayed rule.
    pub rule_id: String,
}

/// The host's delayed-execution facility.
#[async_trait]
pub trait DelayedExecutor: Send + Sync {
    /// Submits an invocation for later execution.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Scheduling`] carrying the facility's negative
    /// status code when the submission is rejected.
    async fn submit(&self, submission: DelaySubmission) -> Result<DelayReceipt>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_builder() {
        let submission = DelaySubmission::new("{}", "<PLUSET>5s</PLUSET>").with_recovery("nop");
        assert_eq!(submission.invocation, "{}");
        assert_eq!(submission.recovery, "nop");
        assert_eq!(submission.condition, "<PLUSET>5s</PLUSET>");
        assert!(DelaySubmission::new("{}", "").recovery.is_empty());
    }
}
