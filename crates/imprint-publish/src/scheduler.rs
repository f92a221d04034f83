//! Publishing scheduler.
//!
//! Turns a publish or purge decision into a delayed, retryable invocation.
//! Each submission gets a uniformly random start delay between the configured
//! bounds so that a burst of markings does not hit the backend at once; the
//! retry template from configuration is passed through untouched.

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use imprint_core::config::PublishingConfig;
use imprint_core::delay::{DelayReceipt, DelaySubmission, DelayedExecutor};
use imprint_core::error::status;
use imprint_core::{Error, Result, log_at};

use crate::invocation::ChainedInvocation;
use crate::metrics::PublishMetrics;
use crate::policy::{Operation, PublishType};

/// Lower delay bound used when the configured value does not parse.
pub const DEFAULT_MINIMUM_DELAY: u32 = 1;
/// Upper delay bound used when the configured value does not parse.
pub const DEFAULT_MAXIMUM_DELAY: u32 = 30;

/// Random source shared by every scheduling call of an engine.
pub type SharedRng = Arc<Mutex<dyn RngCore + Send>>;

/// Creates an entropy-seeded [`SharedRng`].
#[must_use]
pub fn entropy_rng() -> SharedRng {
    Arc::new(Mutex::new(StdRng::from_entropy()))
}

/// Creates a deterministic [`SharedRng`].
#[must_use]
pub fn seeded_rng(seed: u64) -> SharedRng {
    Arc::new(Mutex::new(StdRng::seed_from_u64(seed)))
}

fn parse_bound(raw: &str, default: u32, key: &str) -> u32 {
    raw.trim().parse().unwrap_or_else(|_| {
        tracing::warn!(key, value = raw, default, "unparsable delay bound, using default");
        default
    })
}

/// Draws a delay in seconds, uniform over `[minimum, maximum]` inclusive.
///
/// Unparsable bounds fall back to 1 and 30. Reversed bounds are swapped.
pub fn compute_retry_window(rng: &mut dyn RngCore, minimum: &str, maximum: &str) -> u32 {
    let min = parse_bound(minimum, DEFAULT_MINIMUM_DELAY, "minimum_delay_time");
    let max = parse_bound(maximum, DEFAULT_MAXIMUM_DELAY, "maximum_delay_time");
    let (low, high) = if min > max { (max, min) } else { (min, max) };
    rng.gen_range(low..=high)
}

/// Appends the target instance and start delay to a retry template.
///
/// ```rust
/// use imprint_publish::scheduler::build_retry_expression;
///
/// assert_eq!(
///     build_retry_expression("<EF>60s</EF>", "imprint-instance", 12),
///     "<EF>60s</EF><INST_NAME>imprint-instance</INST_NAME><PLUSET>12s</PLUSET>"
/// );
/// ```
#[must_use]
pub fn build_retry_expression(template: &str, instance_name: &str, delay_seconds: u32) -> String {
    format!("{template}<INST_NAME>{instance_name}</INST_NAME><PLUSET>{delay_seconds}s</PLUSET>")
}

/// Submits chained invocations for one engine instance.
pub struct PublishScheduler<'a> {
    executor: &'a dyn DelayedExecutor,
    config: &'a PublishingConfig,
    rng: &'a Mutex<dyn RngCore + Send>,
    metrics: PublishMetrics,
}

impl std::fmt::Debug for PublishScheduler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishScheduler")
            .field("instance", &self.config.instance_name)
            .finish_non_exhaustive()
    }
}

impl<'a> PublishScheduler<'a> {
    /// Creates a scheduler.
    #[must_use]
    pub fn new(
        executor: &'a dyn DelayedExecutor,
        config: &'a PublishingConfig,
        rng: &'a Mutex<dyn RngCore + Send>,
    ) -> Self {
        Self {
            executor,
            config,
            rng,
            metrics: PublishMetrics::new(),
        }
    }

    /// Schedules a publish or purge of a data object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Scheduling`] if the facility rejects the submission.
    pub async fn schedule_object_event(
        &self,
        operation: Operation,
        object_path: &str,
        user_name: &str,
        technology: &str,
    ) -> Result<DelayReceipt> {
        let invocation = ChainedInvocation::for_object(
            operation,
            &self.config.instance_name,
            object_path,
            user_name,
            technology,
        );
        self.schedule(operation, PublishType::Object, &invocation).await
    }

    /// Schedules a publish or purge of a collection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Scheduling`] if the facility rejects the submission.
    pub async fn schedule_collection_event(
        &self,
        operation: Operation,
        collection_name: &str,
        user_name: &str,
        technology: &str,
    ) -> Result<DelayReceipt> {
        let invocation = ChainedInvocation::for_collection(
            operation,
            &self.config.instance_name,
            collection_name,
            user_name,
            technology,
        );
        self.schedule(operation, PublishType::Collection, &invocation)
            .await
    }

    async fn schedule(
        &self,
        operation: Operation,
        publish_type: PublishType,
        invocation: &ChainedInvocation,
    ) -> Result<DelayReceipt> {
        let payload = invocation.to_json()?;
        let delay = {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| Error::scheduling(status::PUBLISHER, "scheduler rng lock poisoned"))?;
            compute_retry_window(
                &mut *rng,
                &self.config.minimum_delay_time,
                &self.config.maximum_delay_time,
            )
        };
        let condition = build_retry_expression(
            &self.config.delay_parameters,
            &self.config.instance_name,
            delay,
        );

        match self
            .executor
            .submit(DelaySubmission::new(payload, condition))
            .await
        {
            Ok(receipt) => {
                self.metrics.record_schedule(operation.as_str(), "submitted");
                log_at!(
                    self.config.log_level,
                    %operation,
                    %publish_type,
                    path = invocation.target_path(),
                    publisher = %invocation.publisher,
                    delay_seconds = delay,
                    rule_id = %receipt.rule_id,
                    "scheduled delayed policy"
                );
                Ok(receipt)
            }
            Err(error) => {
                self.metrics.record_schedule(operation.as_str(), "failed");
                let code = error.status_code();
                Err(Error::scheduling(
                    if code < 0 { code } else { status::PUBLISHER },
                    format!(
                        "failed to schedule {operation} of {publish_type} [{}]: {error}",
                        invocation.target_path()
                    ),
                ))
            }
        }
    }
}
