//! Contract tests for the host plugin interfaces.
//!
//! These pin the behavior engines rely on when chaining through the host:
//! the invoker receives the caller's context, error stacks survive the round
//! trip, and query strings keep their exact textual shape.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::sync::Mutex;

use async_trait::async_trait;
use imprint_core::prelude::*;

#[derive(Default)]
struct RecordingInvoker {
    calls: Mutex<Vec<(String, String, Vec<RuleArg>)>>,
}

#[async_trait]
impl PolicyInvoker for RecordingInvoker {
    async fn invoke_policy(
        &self,
        policy: &str,
        args: Vec<RuleArg>,
        ctx: &mut RuleContext<'_>,
    ) -> Result<RuleOutcome> {
        self.calls
            .lock()
            .unwrap()
            .push((policy.to_string(), ctx.user_name().to_string(), args));
        if policy.ends_with("_broken") {
            let err = Error::publisher("backend unavailable");
            ctx.push_error(&err);
            return Err(err);
        }
        Ok(RuleOutcome::Done)
    }
}

#[tokio::test]
async fn invoker_sees_proxied_user() -> Result<()> {
    let invoker = RecordingInvoker::default();
    let mut ctx = RuleContext::new("rods", &invoker);
    ctx.set_user_name("alice");

    let args = PolicyArgs {
        path: "/tempZone/home/alice/file.csv".into(),
        user_name: "alice".into(),
        publish_type: "object".into(),
    };
    let outcome = ctx
        .invoke_policy(
            "irods_policy_publishing_object_publish_dataworld",
            args.clone().into_args(),
        )
        .await?;
    assert_eq!(outcome, RuleOutcome::Done);

    let calls = invoker.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, "alice");
    assert_eq!(PolicyArgs::decode(&calls[0].2)?, args);
    Ok(())
}

#[tokio::test]
async fn handler_errors_reach_the_caller_stack() {
    let invoker = RecordingInvoker::default();
    let mut ctx = RuleContext::new("alice", &invoker);

    let err = ctx
        .invoke_policy("irods_policy_publishing_object_publish_broken", Vec::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Publisher { .. }));
    assert_eq!(ctx.errors().len(), 1);
    assert!(ctx.errors()[0].1.contains("backend unavailable"));
}

#[test]
fn publish_marker_query_shapes() {
    let object = CatalogQuery::select([Column::MetaDataAttrValue, Column::MetaDataAttrUnits])
        .filter(Column::MetaDataAttrName, "irods::publishing::publish")
        .filter(Column::CollName, "/tempZone/home/alice")
        .filter(Column::DataName, "file.csv");
    let collection = CatalogQuery::select([Column::MetaCollAttrValue, Column::MetaCollAttrUnits])
        .filter(Column::MetaCollAttrName, "irods::publishing::publish")
        .filter(Column::CollName, "/tempZone/home/alice");

    assert_eq!(
        collection.to_string(),
        "SELECT META_COLL_ATTR_VALUE, META_COLL_ATTR_UNITS WHERE \
         META_COLL_ATTR_NAME = 'irods::publishing::publish' and COLL_NAME = '/tempZone/home/alice'"
    );
    assert_eq!(CatalogQuery::parse(&object.to_string()).unwrap(), object);
}

#[test]
fn server_properties_round_trip_through_builder() {
    let props = ServerProperties::default().with_instance(
        "imprint-instance",
        serde_json::json!({ "publish": "site::publish", "log_level": "info" }),
    );
    let config = PublishingConfig::load("imprint-instance", &props).unwrap();
    assert_eq!(config.instance_name, "imprint-instance");
    assert_eq!(config.publish, "site::publish");
    assert_eq!(config.log_level, LogLevel::Info);
}
