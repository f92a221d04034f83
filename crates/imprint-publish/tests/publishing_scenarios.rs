//! End-to-end scenarios for the publishing engine.
//!
//! Each test loads the engine into a [`TestHost`] next to a recording
//! technology handler, raises catalog events, then fires whatever landed in
//! the delay queue the way the delayed-execution facility would.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use imprint_core::error::status;
use imprint_core::{
    Avu, Error, PolicyArgs, Result, RuleArg, RuleContext, RuleEngine, RuleOutcome,
    ServerProperties,
};
use imprint_publish::event::{
    DATA_OBJ_CREATE_PRE, DATA_OBJ_OPEN_PRE, DATA_OBJ_PUT_PRE, DATA_OBJ_UNLINK_PRE,
    MOD_AVU_METADATA_POST, MOD_AVU_METADATA_PRE, RM_COLL_PRE,
};
use imprint_publish::invocation::ChainedInvocation;
use imprint_publish::policy::{Operation, PublishType, TechnologyPolicies, collection, object};
use imprint_publish::queue::InMemoryDelayQueue;
use imprint_publish::scheduler::seeded_rng;
use imprint_publish::PublishingEngine;
use imprint_test_utils::{
    HOME, InMemoryCatalog, MARKER, PUBLISHING_INSTANCE, TestHost, USER, data_object_args,
    init_test_logging, mod_avu, mod_avu_args, open_for_write_args, open_read_write_args,
    rm_coll_args, server_properties,
};

type Calls = Arc<Mutex<Vec<(String, PolicyArgs, String)>>>;

/// Technology handler that records what it is asked to do.
struct RecordingHandler {
    policies: TechnologyPolicies,
    calls: Calls,
    fail: bool,
}

#[async_trait]
impl RuleEngine for RecordingHandler {
    fn start(&mut self, _instance_name: &str, _properties: &ServerProperties) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self, _instance_name: &str) -> Result<()> {
        Ok(())
    }

    fn rule_exists(&self, rule: &str) -> bool {
        self.policies.contains(rule)
    }

    fn list_rules(&self) -> Vec<String> {
        self.policies.names()
    }

    async fn exec_rule(
        &self,
        rule: &str,
        args: &[RuleArg],
        ctx: &mut RuleContext<'_>,
    ) -> Result<RuleOutcome> {
        let args = PolicyArgs::decode(args)?;
        self.calls
            .lock()
            .unwrap()
            .push((rule.to_string(), args, ctx.user_name().to_string()));
        if self.fail {
            return Err(Error::publisher("backend unavailable"));
        }
        Ok(RuleOutcome::Done)
    }

    async fn exec_rule_text(&self, text: &str, _ctx: &mut RuleContext<'_>) -> Result<RuleOutcome> {
        Err(Error::unsupported_rule(text))
    }

    async fn exec_rule_expression(
        &self,
        expression: &str,
        _ctx: &mut RuleContext<'_>,
    ) -> Result<RuleOutcome> {
        Err(Error::unsupported_rule(expression))
    }
}

struct Harness {
    catalog: Arc<InMemoryCatalog>,
    queue: Arc<InMemoryDelayQueue>,
    calls: Calls,
    host: TestHost,
}

fn harness_with(config: serde_json::Value, handler_fails: bool) -> Harness {
    init_test_logging();
    let catalog = Arc::new(InMemoryCatalog::new());
    let queue = Arc::new(InMemoryDelayQueue::new());
    let calls = Calls::default();

    let props = server_properties([(PUBLISHING_INSTANCE, config)]);
    let engine = PublishingEngine::new(catalog.clone(), queue.clone()).with_rng(seeded_rng(11));

    let mut host = TestHost::new();
    host.load(PUBLISHING_INSTANCE, &props, engine)
        .unwrap()
        .load(
            "handler",
            &props,
            RecordingHandler {
                policies: TechnologyPolicies::new("dataworld"),
                calls: calls.clone(),
                fail: handler_fails,
            },
        )
        .unwrap();

    Harness {
        catalog,
        queue,
        calls,
        host,
    }
}

fn harness() -> Harness {
    harness_with(json!({}), false)
}

fn dataset() -> String {
    format!("{HOME}/dataset")
}

async fn mark(h: &Harness, operation: &str, item_type: &str, path: &str, attribute: &str) {
    let input = mod_avu(operation, item_type, path, attribute, "dataworld");
    let args = mod_avu_args(&input);
    let (pre, post) = h
        .host
        .exec_paired(
            (MOD_AVU_METADATA_PRE, &args),
            || h.catalog.apply_mod_avu(&input),
            (MOD_AVU_METADATA_POST, &args),
            USER,
        )
        .await;
    assert_eq!(pre.result.unwrap(), RuleOutcome::Continue);
    assert_eq!(post.result.unwrap(), RuleOutcome::Continue);
}

fn queued(h: &Harness) -> Vec<ChainedInvocation> {
    h.queue
        .drain()
        .unwrap()
        .into_iter()
        .map(|entry| ChainedInvocation::from_json(&entry.submission.invocation).unwrap())
        .collect()
}

#[tokio::test]
async fn new_collection_marking_schedules_one_publish() {
    let h = harness();
    h.catalog.add_collection(&dataset());

    mark(&h, "add", "-C", &dataset(), MARKER).await;

    let invocations = queued(&h);
    assert_eq!(invocations.len(), 1);
    let invocation = &invocations[0];
    assert_eq!(invocation.rule_engine_operation, collection::PUBLISH);
    assert_eq!(invocation.rule_engine_instance_name, PUBLISHING_INSTANCE);
    assert_eq!(invocation.collection_name.as_deref(), Some(dataset().as_str()));
    assert_eq!(invocation.user_name, USER);
    assert_eq!(invocation.publisher, "dataworld");
    assert_eq!(
        invocation.kind().unwrap(),
        (Operation::Publish, PublishType::Collection)
    );
}

#[tokio::test]
async fn new_object_marking_schedules_object_publish() {
    let h = harness();
    let file = format!("{HOME}/file.csv");
    h.catalog.add_data_object(&file, "a,b\n");

    mark(&h, "set", "-d", &file, MARKER).await;

    let invocations = queued(&h);
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].rule_engine_operation, object::PUBLISH);
    assert_eq!(invocations[0].object_path.as_deref(), Some(file.as_str()));
}

#[tokio::test]
async fn duplicate_marking_schedules_nothing() {
    let h = harness();
    h.catalog
        .add_collection_avu(&dataset(), Avu::new(MARKER, "dataworld", ""));

    mark(&h, "add", "-C", &dataset(), MARKER).await;

    assert!(h.queue.is_empty().unwrap());
}

#[tokio::test]
async fn marker_removal_schedules_purge() {
    let h = harness();
    h.catalog
        .add_collection_avu(&dataset(), Avu::new(MARKER, "dataworld", ""));

    mark(&h, "rm", "-C", &dataset(), MARKER).await;

    let invocations = queued(&h);
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].rule_engine_operation, collection::PURGE);
}

#[tokio::test]
async fn non_marker_writes_do_not_touch_the_catalog() {
    let h = harness();
    h.catalog.add_collection(&dataset());
    h.catalog.clear_operations();

    for operation in ["add", "set", "rm"] {
        mark(&h, operation, "-C", &dataset(), "project::owner").await;
    }

    assert_eq!(h.catalog.round_trips(), 0);
    assert!(h.queue.is_empty().unwrap());
}

#[tokio::test]
async fn open_for_write_under_published_parent_is_rejected() {
    let h = harness();
    let file = format!("{}/sub/file.csv", dataset());
    h.catalog.add_data_object(&file, "x");
    h.catalog
        .add_collection_avu(&dataset(), Avu::new(MARKER, "dataworld", ""));

    for args in [open_for_write_args(&file), open_read_write_args(&file)] {
        let call = h.host.exec_rule(DATA_OBJ_OPEN_PRE, &args, USER).await;
        assert_eq!(call.errors.len(), 1);
        assert_eq!(call.errors[0].0, status::OPERATION_NOT_PERMITTED);
        let error = call.unwrap_err();
        assert!(matches!(error, Error::OperationNotPermitted { kind: "object", .. }));
        assert!(error.to_string().contains("immutable"));
    }

    let read = h
        .host
        .exec_rule(DATA_OBJ_OPEN_PRE, &data_object_args(&file, 0), USER)
        .await;
    assert_eq!(read.result.unwrap(), RuleOutcome::Continue);
}

#[tokio::test]
async fn create_put_unlink_and_rm_coll_are_guarded() {
    let h = harness();
    let file = format!("{}/file.csv", dataset());
    h.catalog.add_data_object(&file, "x");
    h.catalog
        .add_collection_avu(&dataset(), Avu::new(MARKER, "dataworld", ""));

    for rule in [DATA_OBJ_CREATE_PRE, DATA_OBJ_PUT_PRE, DATA_OBJ_UNLINK_PRE] {
        let call = h.host.exec_rule(rule, &data_object_args(&file, 0), USER).await;
        assert!(!call.is_ok(), "{rule} should be rejected");
    }

    let call = h.host.exec_rule(RM_COLL_PRE, &rm_coll_args(&dataset()), USER).await;
    assert!(matches!(
        call.unwrap_err(),
        Error::OperationNotPermitted { kind: "collection", .. }
    ));

    let sibling = format!("{HOME}/scratch");
    h.catalog.add_collection(&sibling);
    let call = h.host.exec_rule(RM_COLL_PRE, &rm_coll_args(&sibling), USER).await;
    assert_eq!(call.result.unwrap(), RuleOutcome::Continue);
}

#[tokio::test]
async fn catalog_failure_fails_open() {
    let h = harness();
    let file = format!("{}/file.csv", dataset());
    h.catalog.add_data_object(&file, "x");
    h.catalog
        .add_collection_avu(&dataset(), Avu::new(MARKER, "dataworld", ""));
    h.catalog.fail_queries(true);

    let call = h.host.exec_rule(DATA_OBJ_UNLINK_PRE, &data_object_args(&file, 0), USER).await;
    assert_eq!(call.result.unwrap(), RuleOutcome::Continue);
    assert!(call.errors.is_empty());
}

#[tokio::test]
async fn malformed_event_arguments_are_reported() {
    let h = harness();
    let call = h
        .host
        .exec_rule(RM_COLL_PRE, &[RuleArg::Str(PUBLISHING_INSTANCE.into())], USER)
        .await;
    assert_eq!(call.errors[0].0, status::INVALID_ARGUMENT);
    assert!(matches!(call.unwrap_err(), Error::InvalidArgument { .. }));
}

#[tokio::test]
async fn scheduling_rejection_is_swallowed() {
    let h = harness();
    h.catalog.add_collection(&dataset());
    h.queue.reject_with(Some(-1_000)).unwrap();

    mark(&h, "add", "-C", &dataset(), MARKER).await;

    h.queue.reject_with(None).unwrap();
    assert!(h.queue.is_empty().unwrap());
}

#[tokio::test]
async fn unrelated_event_does_not_consume_pending_marking() {
    let h = harness();
    let other = format!("{HOME}/other");
    h.catalog.add_collection(&dataset());
    h.catalog.add_collection(&other);

    let input = mod_avu("add", "-C", &dataset(), MARKER, "dataworld");
    let args = mod_avu_args(&input);
    let unrelated = mod_avu_args(&mod_avu("add", "-C", &other, MARKER, "dataworld"));

    let (_, post) = h
        .host
        .exec_paired(
            (MOD_AVU_METADATA_PRE, &args),
            || h.catalog.apply_mod_avu(&input),
            (MOD_AVU_METADATA_POST, &unrelated),
            USER,
        )
        .await;
    assert_eq!(post.result.unwrap(), RuleOutcome::Continue);
    assert!(h.queue.is_empty().unwrap());
}

#[tokio::test]
async fn custom_marker_is_honored() {
    let h = harness_with(json!({ "publish": "site::publish" }), false);
    h.catalog.add_collection(&dataset());

    mark(&h, "add", "-C", &dataset(), MARKER).await;
    assert!(h.queue.is_empty().unwrap());

    mark(&h, "add", "-C", &dataset(), "site::publish").await;
    assert_eq!(h.queue.len().unwrap(), 1);
}

#[tokio::test]
async fn delayed_publish_reaches_the_handler_as_the_marking_user() {
    let h = harness();
    h.catalog.add_collection(&dataset());
    mark(&h, "add", "-C", &dataset(), MARKER).await;

    let entry = h.queue.take().unwrap().expect("scheduled publish");
    assert!(entry
        .submission
        .condition
        .contains(&format!("<INST_NAME>{PUBLISHING_INSTANCE}</INST_NAME>")));

    let call = h
        .host
        .exec_rule_expression(&entry.submission.invocation, "rods")
        .await;
    assert_eq!(call.result.unwrap(), RuleOutcome::Done);

    let calls = h.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (policy, args, user) = &calls[0];
    assert_eq!(policy, "irods_policy_publishing_collection_publish_dataworld");
    assert_eq!(args.path, dataset());
    assert_eq!(args.user_name, USER);
    assert_eq!(args.publish_type, "collection");
    assert_eq!(user, USER);
}

#[tokio::test]
async fn delayed_publish_is_skipped_once_marker_is_gone() {
    let h = harness();
    h.catalog.add_collection(&dataset());
    mark(&h, "add", "-C", &dataset(), MARKER).await;
    h.catalog.remove_avus(&dataset(), MARKER);

    let entry = h.queue.take().unwrap().expect("scheduled publish");
    let call = h
        .host
        .exec_rule_expression(&entry.submission.invocation, USER)
        .await;
    assert_eq!(call.result.unwrap(), RuleOutcome::Done);
    assert!(h.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn delayed_purge_is_forwarded_without_marker() {
    let h = harness();
    let invocation = ChainedInvocation::for_object(
        Operation::Purge,
        PUBLISHING_INSTANCE,
        format!("{HOME}/file.csv"),
        USER,
        "dataworld",
    );

    let call = h
        .host
        .exec_rule_expression(&invocation.to_json().unwrap(), USER)
        .await;
    assert_eq!(call.result.unwrap(), RuleOutcome::Done);
    assert_eq!(
        h.calls.lock().unwrap()[0].0,
        "irods_policy_publishing_object_purge_dataworld"
    );
}

#[tokio::test]
async fn invocations_for_other_instances_continue() {
    let h = harness();
    let invocation = ChainedInvocation::for_object(
        Operation::Purge,
        "some-other-instance",
        format!("{HOME}/file.csv"),
        USER,
        "dataworld",
    );

    let call = h
        .host
        .exec_rule_expression(&invocation.to_json().unwrap(), USER)
        .await;
    assert!(call.unwrap_err().is_continue());
    assert!(h.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn non_invocation_expressions_continue() {
    let h = harness();
    let call = h.host.exec_rule_expression("writeLine('serverLog', 'x')", USER).await;
    assert!(call.unwrap_err().is_continue());
}

#[tokio::test]
async fn rule_text_with_external_prefix_is_dispatched() {
    let h = harness();
    let invocation = ChainedInvocation::for_collection(
        Operation::Purge,
        PUBLISHING_INSTANCE,
        dataset(),
        USER,
        "dataworld",
    );
    let text = format!("@external\n{}", invocation.to_json().unwrap());

    let call = h.host.exec_rule_text(&text, USER).await;
    assert_eq!(call.result.unwrap(), RuleOutcome::Done);
    assert_eq!(h.calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn handler_failure_is_returned_to_the_facility() {
    let h = harness_with(json!({}), true);
    h.catalog
        .add_collection_avu(&dataset(), Avu::new(MARKER, "dataworld", ""));
    let invocation = ChainedInvocation::for_collection(
        Operation::Publish,
        PUBLISHING_INSTANCE,
        dataset(),
        USER,
        "dataworld",
    );

    let call = h
        .host
        .exec_rule_expression(&invocation.to_json().unwrap(), USER)
        .await;
    assert!(call.errors.iter().any(|(_, m)| m.contains("backend unavailable")));
    assert!(matches!(call.unwrap_err(), Error::Publisher { .. }));
}

#[tokio::test]
async fn unknown_technology_is_an_error() {
    let h = harness();
    let invocation = ChainedInvocation::for_object(
        Operation::Purge,
        PUBLISHING_INSTANCE,
        format!("{HOME}/file.csv"),
        USER,
        "zenodo",
    );

    let call = h
        .host
        .exec_rule_expression(&invocation.to_json().unwrap(), USER)
        .await;
    let error = call.unwrap_err();
    assert!(!error.is_continue());
    assert!(error.to_string().contains("_zenodo"));
}

#[tokio::test]
async fn engine_lists_its_events() {
    let mut engine = PublishingEngine::new(
        Arc::new(InMemoryCatalog::new()),
        Arc::new(InMemoryDelayQueue::new()),
    );
    let mut ctx = RuleContext::detached(USER);
    let err = engine
        .exec_rule(RM_COLL_PRE, &rm_coll_args("/z"), &mut ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }));

    let props = server_properties([(PUBLISHING_INSTANCE, json!({}))]);
    engine.start(PUBLISHING_INSTANCE, &props).unwrap();
    assert_eq!(engine.list_rules().len(), 7);
    assert!(engine.rule_exists(MOD_AVU_METADATA_POST));
    assert!(!engine.rule_exists("pep_api_auth_request_pre"));

    let err = engine
        .exec_rule("pep_api_auth_request_pre", &[], &mut ctx)
        .await
        .unwrap_err();
    assert!(err.is_continue());

    assert!(engine.start("missing-instance", &props).is_err());
}
