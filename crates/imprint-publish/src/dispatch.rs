//! Dispatch state machine.
//!
//! [`PublishingEngine`] is the rule engine the host calls for catalog events.
//! Each call is classified and handled independently:
//!
//! - **Guard**: write-type data object events and collection removal are
//!   rejected when the target or any ancestor is published
//! - **Change detection**: a metadata pre-event that writes the publish marker
//!   records whether the row is new in the caller's [`RuleContext`]
//! - **Scheduling**: the paired post-event turns a new marking into a delayed
//!   publish, and a removed marking into a delayed purge
//! - **Forwarding**: a delayed invocation re-entering through
//!   `exec_rule_expression` is routed to the technology handler
//!
//! The engine holds nothing mutable after `start`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::Instrument;

use imprint_core::catalog::Catalog;
use imprint_core::delay::DelayedExecutor;
use imprint_core::observability::{policy_span, rule_span};
use imprint_core::{
    Error, MetadataTarget, PendingMarking, PolicyArgs, PublishingConfig, Result, RuleArg,
    RuleContext, RuleEngine, RuleOutcome, ServerProperties, log_at,
};

use crate::event::{AvuOperation, MetadataChange, PolicyEvent, RULES};
use crate::gate::MetadataGate;
use crate::invocation::ChainedInvocation;
use crate::metrics::PublishMetrics;
use crate::policy::{Operation, PolicyName};
use crate::scheduler::{PublishScheduler, SharedRng, entropy_rng};

const ENGINE: &str = "publishing";

/// Marks published content immutable and schedules publish/purge work.
///
/// ## Example
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use imprint_core::{RuleEngine, ServerProperties};
/// use imprint_publish::dispatch::PublishingEngine;
/// use imprint_publish::queue::InMemoryDelayQueue;
/// # fn catalog() -> Arc<dyn imprint_core::Catalog> { unimplemented!() }
///
/// # fn main() -> imprint_core::Result<()> {
/// let props = ServerProperties::default()
///     .with_instance("imprint-instance", serde_json::json!({}));
/// let mut engine = PublishingEngine::new(catalog(), Arc::new(InMemoryDelayQueue::new()));
/// engine.start("imprint-instance", &props)?;
/// assert!(engine.rule_exists("pep_api_mod_avu_metadata_post"));
/// # Ok(())
/// # }
/// ```
pub struct PublishingEngine {
    catalog: Arc<dyn Catalog>,
    executor: Arc<dyn DelayedExecutor>,
    rng: SharedRng,
    config: Option<PublishingConfig>,
    metrics: PublishMetrics,
}

impl std::fmt::Debug for PublishingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishingEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PublishingEngine {
    /// Creates an engine reading `catalog` and submitting to `executor`.
    #[must_use]
    pub fn new(catalog: Arc<dyn Catalog>, executor: Arc<dyn DelayedExecutor>) -> Self {
        Self {
            catalog,
            executor,
            rng: entropy_rng(),
            config: None,
            metrics: PublishMetrics::new(),
        }
    }

    /// Replaces the random source used for scheduling delays.
    #[must_use]
    pub fn with_rng(mut self, rng: SharedRng) -> Self {
        self.rng = rng;
        self
    }

    /// The configuration loaded at `start`.
    #[must_use]
    pub const fn config(&self) -> Option<&PublishingConfig> {
        self.config.as_ref()
    }

    fn started(&self) -> Result<&PublishingConfig> {
        self.config
            .as_ref()
            .ok_or_else(|| Error::configuration("publishing engine used before start"))
    }

    fn gate<'a>(&'a self, config: &'a PublishingConfig) -> MetadataGate<'a> {
        MetadataGate::new(self.catalog.as_ref(), &config.publish)
    }

    fn scheduler<'a>(&'a self, config: &'a PublishingConfig) -> PublishScheduler<'a> {
        PublishScheduler::new(self.executor.as_ref(), config, &*self.rng)
    }

    async fn handle_event(
        &self,
        config: &PublishingConfig,
        event: PolicyEvent,
        ctx: &mut RuleContext<'_>,
    ) -> Result<()> {
        if let Some((kind, path)) = event.guarded_target() {
            let published = self.gate(config).is_published_in_ancestry(path).await;
            self.metrics.record_guard_check(published);
            if published {
                return Err(Error::OperationNotPermitted {
                    kind,
                    path: path.to_string(),
                });
            }
            return Ok(());
        }

        match event {
            PolicyEvent::MetadataPre(change) => {
                self.capture_marking(config, change, ctx).await;
            }
            PolicyEvent::MetadataPost(change) => {
                self.schedule_marking(config, change, ctx).await;
            }
            PolicyEvent::DataObject { .. } | PolicyEvent::RemoveCollection(_) => {}
        }
        Ok(())
    }

    async fn capture_marking(
        &self,
        config: &PublishingConfig,
        change: MetadataChange,
        ctx: &mut RuleContext<'_>,
    ) {
        if change.avu.attribute != config.publish || !change.operation.is_write() {
            return;
        }
        let Some(target) = change.target else {
            return;
        };

        let exists = self.gate(config).metadata_exists(&target, &change.avu).await;
        log_at!(
            config.log_level,
            path = target.path(),
            kind = target.kind(),
            is_new = !exists,
            "publish marker write detected"
        );
        ctx.set_pending_marking(PendingMarking {
            target,
            avu: change.avu,
            is_new: !exists,
        });
    }

    async fn schedule_marking(
        &self,
        config: &PublishingConfig,
        change: MetadataChange,
        ctx: &mut RuleContext<'_>,
    ) {
        if change.avu.attribute != config.publish {
            return;
        }
        let Some(target) = change.target else {
            return;
        };

        let operation = match change.operation {
            AvuOperation::Add | AvuOperation::Set => {
                match ctx.take_pending_marking(&target, &change.avu) {
                    Some(marking) if marking.is_new => Operation::Publish,
                    Some(_) => {
                        log_at!(
                            config.log_level,
                            path = target.path(),
                            "publish marker already present, nothing to schedule"
                        );
                        return;
                    }
                    None => {
                        tracing::warn!(
                            path = target.path(),
                            "no matching pre-event for publish marker write, nothing to schedule"
                        );
                        return;
                    }
                }
            }
            AvuOperation::Remove => Operation::Purge,
            AvuOperation::Other(_) => return,
        };

        let technology = change.avu.value.as_str();
        let user_name = ctx.user_name();
        let scheduler = self.scheduler(config);
        let result = match &target {
            MetadataTarget::DataObject(path) => {
                scheduler
                    .schedule_object_event(operation, path, user_name, technology)
                    .await
            }
            MetadataTarget::Collection(path) => {
                scheduler
                    .schedule_collection_event(operation, path, user_name, technology)
                    .await
            }
        };

        if let Err(error) = result {
            tracing::error!(
                path = target.path(),
                %operation,
                %error,
                "failed to schedule publishing event"
            );
        }
    }

    async fn dispatch_invocation(
        &self,
        config: &PublishingConfig,
        text: &str,
        ctx: &mut RuleContext<'_>,
    ) -> Result<RuleOutcome> {
        let Ok(invocation) = ChainedInvocation::from_json(text) else {
            return Err(Error::unsupported_rule("not a publishing invocation"));
        };
        if invocation.rule_engine_instance_name != config.instance_name {
            return Err(Error::unsupported_rule(format!(
                "invocation for instance [{}]",
                invocation.rule_engine_instance_name
            )));
        }

        let (operation, publish_type) = match invocation.kind() {
            Ok(kind) => kind,
            Err(error) => {
                ctx.push_error(&error);
                return Err(error);
            }
        };
        let path = invocation.target_path().to_string();

        if operation == Operation::Publish && !self.gate(config).is_published(&path).await {
            self.metrics
                .record_chained_dispatch(operation.as_str(), "skipped");
            log_at!(
                config.log_level,
                path = %path,
                "publish marker no longer present, skipping"
            );
            return Ok(RuleOutcome::Done);
        }

        ctx.set_user_name(invocation.user_name.as_str());
        let policy = PolicyName::base(operation, publish_type).for_technology(&invocation.publisher);
        let args = PolicyArgs {
            path: path.clone(),
            user_name: invocation.user_name,
            publish_type: publish_type.as_str().to_string(),
        };

        let result = ctx
            .invoke_policy(policy.as_str(), args.into_args())
            .instrument(policy_span(policy.as_str(), &path))
            .await;

        match result {
            Ok(_) => {
                self.metrics
                    .record_chained_dispatch(operation.as_str(), "forwarded");
                log_at!(config.log_level, policy = %policy, path = %path, "policy completed");
                Ok(RuleOutcome::Done)
            }
            Err(error) => {
                self.metrics
                    .record_chained_dispatch(operation.as_str(), "failed");
                let error = if error.is_continue() {
                    Error::configuration(format!("no rule engine serves policy [{policy}]"))
                } else {
                    error
                };
                tracing::error!(policy = %policy, path = %path, %error, "policy failed");
                ctx.push_error(&error);
                Err(error)
            }
        }
    }
}

/// Strips an optional leading `@external` line from rule text.
fn strip_external(text: &str) -> &str {
    let trimmed = text.trim_start();
    match trimmed.strip_prefix("@external") {
        Some(rest) => rest.trim_start(),
        None => trimmed,
    }
}

#[async_trait]
impl RuleEngine for PublishingEngine {
    fn start(&mut self, instance_name: &str, properties: &ServerProperties) -> Result<()> {
        let config = PublishingConfig::load(instance_name, properties)?;
        tracing::info!(
            instance = instance_name,
            marker = %config.publish,
            log_level = %config.log_level,
            "publishing engine started"
        );
        self.config = Some(config);
        Ok(())
    }

    fn stop(&mut self, instance_name: &str) -> Result<()> {
        tracing::info!(instance = instance_name, "publishing engine stopped");
        Ok(())
    }

    fn rule_exists(&self, rule: &str) -> bool {
        RULES.contains(&rule)
    }

    fn list_rules(&self) -> Vec<String> {
        RULES.iter().map(ToString::to_string).collect()
    }

    async fn exec_rule(
        &self,
        rule: &str,
        args: &[RuleArg],
        ctx: &mut RuleContext<'_>,
    ) -> Result<RuleOutcome> {
        let config = self.started()?;
        let event = match PolicyEvent::decode(rule, args) {
            Ok(Some(event)) => event,
            Ok(None) => return Err(Error::unsupported_rule(rule)),
            Err(error) => {
                ctx.push_error(&error);
                return Err(error);
            }
        };

        let span = rule_span(ENGINE, rule, &config.instance_name);
        match self.handle_event(config, event, ctx).instrument(span).await {
            Ok(()) => Ok(RuleOutcome::Continue),
            Err(error) => {
                tracing::info!(rule, %error, "operation rejected");
                ctx.push_error(&error);
                Err(error)
            }
        }
    }

    async fn exec_rule_text(&self, text: &str, ctx: &mut RuleContext<'_>) -> Result<RuleOutcome> {
        let config = self.started()?;
        let span = rule_span(ENGINE, "exec_rule_text", &config.instance_name);
        self.dispatch_invocation(config, strip_external(text), ctx)
            .instrument(span)
            .await
    }

    async fn exec_rule_expression(
        &self,
        expression: &str,
        ctx: &mut RuleContext<'_>,
    ) -> Result<RuleOutcome> {
        let config = self.started()?;
        let span = rule_span(ENGINE, "exec_rule_expression", &config.instance_name);
        self.dispatch_invocation(config, expression, ctx)
            .instrument(span)
            .await
    }
}
