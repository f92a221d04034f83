//! The `dataworld` technology handler.
//!
//! Serves the four policies the publishing engine forwards for the
//! `dataworld` technology. A publish creates (or replaces) the dataset keyed
//! by the published path, owned by the acting user, and uploads the published
//! bytes into it. Purges are acknowledged without remote work.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::Instrument;

use imprint_core::catalog::{Catalog, CatalogQuery, Column, ObjectStore};
use imprint_core::observability::rule_span;
use imprint_core::path;
use imprint_core::{
    Error, PolicyArgs, Redacted, Result, RuleArg, RuleContext, RuleEngine, RuleOutcome,
    ServerProperties, log_at,
};
use imprint_publish::policy::{Operation, PublishType, TechnologyPolicies};

use crate::client::{DataWorldClient, Dataset, DatasetApi};
use crate::config::DataWorldConfig;

/// Technology name this handler registers for.
pub const TECHNOLOGY: &str = "dataworld";

/// Rule engine publishing to data.world.
pub struct DataWorldEngine {
    catalog: Arc<dyn Catalog>,
    store: Arc<dyn ObjectStore>,
    api: Option<Arc<dyn DatasetApi>>,
    policies: TechnologyPolicies,
    config: Option<DataWorldConfig>,
}

impl std::fmt::Debug for DataWorldEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataWorldEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DataWorldEngine {
    /// Creates a handler reading metadata from `catalog` and bytes from
    /// `store`. A [`DataWorldClient`] for the configured host is built at
    /// `start` unless [`DataWorldEngine::with_api`] supplied one.
    #[must_use]
    pub fn new(catalog: Arc<dyn Catalog>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            catalog,
            store,
            api: None,
            policies: TechnologyPolicies::new(TECHNOLOGY),
            config: None,
        }
    }

    /// Publishes through `api` instead of the HTTP client.
    #[must_use]
    pub fn with_api(mut self, api: Arc<dyn DatasetApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// The configuration loaded at `start`.
    #[must_use]
    pub const fn config(&self) -> Option<&DataWorldConfig> {
        self.config.as_ref()
    }

    fn started(&self) -> Result<(&DataWorldConfig, &dyn DatasetApi)> {
        match (&self.config, &self.api) {
            (Some(config), Some(api)) => Ok((config, api.as_ref())),
            _ => Err(Error::configuration("data.world handler used before start")),
        }
    }

    async fn api_token(&self, config: &DataWorldConfig, user_name: &str) -> Result<Redacted<String>> {
        let query = CatalogQuery::select([Column::MetaUserAttrValue])
            .filter(Column::UserName, user_name)
            .filter(Column::MetaUserAttrName, config.publishing.api_token.as_str());
        let rows = self.catalog.query(&query.to_string()).await?;

        rows.into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .filter(|token| !token.is_empty())
            .map(Redacted::new)
            .ok_or_else(|| {
                Error::configuration(format!(
                    "no [{}] metadata for user [{user_name}]",
                    config.publishing.api_token
                ))
            })
    }

    async fn publish_object(
        &self,
        config: &DataWorldConfig,
        api: &dyn DatasetApi,
        args: &PolicyArgs,
    ) -> Result<()> {
        let token = self.api_token(config, &args.user_name).await?;
        let dataset = Dataset::for_path(&args.user_name, &args.path);
        api.create_dataset(&token, &dataset).await?;

        let body = self.store.read(&args.path).await?;
        api.upload_file(&token, &dataset, &dataset.title, body).await?;

        log_at!(
            config.publishing.log_level,
            path = %args.path,
            dataset = %dataset.id,
            "data object published"
        );
        Ok(())
    }

    async fn publish_collection(
        &self,
        config: &DataWorldConfig,
        api: &dyn DatasetApi,
        args: &PolicyArgs,
    ) -> Result<()> {
        let token = self.api_token(config, &args.user_name).await?;
        let dataset = Dataset::for_path(&args.user_name, &args.path);
        api.create_dataset(&token, &dataset).await?;

        let objects = self.store.list_data_objects(&args.path).await?;
        let mut uploaded = 0_usize;
        for object in &objects {
            let upload = async {
                let file_name = path::relative(object, &args.path)
                    .unwrap_or_else(|| path::object_name(object));
                let body = self.store.read(object).await?;
                api.upload_file(&token, &dataset, file_name, body).await
            };
            match upload.await {
                Ok(()) => uploaded += 1,
                Err(error) => {
                    tracing::error!(path = %object, %error, "failed to upload data object, skipping");
                }
            }
        }

        log_at!(
            config.publishing.log_level,
            path = %args.path,
            dataset = %dataset.id,
            uploaded,
            skipped = objects.len() - uploaded,
            "collection published"
        );
        Ok(())
    }
}

#[async_trait]
impl RuleEngine for DataWorldEngine {
    fn start(&mut self, instance_name: &str, properties: &ServerProperties) -> Result<()> {
        let config = DataWorldConfig::load(instance_name, properties)?;
        if self.api.is_none() {
            self.api = Some(Arc::new(DataWorldClient::new(config.host())));
        }
        tracing::info!(
            instance = instance_name,
            host = config.host(),
            "data.world handler started"
        );
        self.config = Some(config);
        Ok(())
    }

    fn stop(&mut self, instance_name: &str) -> Result<()> {
        tracing::info!(instance = instance_name, "data.world handler stopped");
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
        let (config, api) = self.started()?;
        let Some((operation, publish_type)) = self.policies.classify(rule) else {
            return Err(Error::unsupported_rule(rule));
        };
        let args = match PolicyArgs::decode(args) {
            Ok(args) => args,
            Err(error) => {
                ctx.push_error(&error);
                return Err(error);
            }
        };

        let span = rule_span(self.policies.technology(), rule, &config.publishing.instance_name);
        let result = async {
            match (operation, publish_type) {
                (Operation::Publish, PublishType::Object) => {
                    self.publish_object(config, api, &args).await
                }
                (Operation::Publish, PublishType::Collection) => {
                    self.publish_collection(config, api, &args).await
                }
                (Operation::Purge, _) => {
                    log_at!(
                        config.publishing.log_level,
                        path = %args.path,
                        %publish_type,
                        "purge requested, nothing to remove remotely"
                    );
                    Ok(())
                }
            }
        }
        .instrument(span)
        .await;

        match result {
            Ok(()) => Ok(RuleOutcome::Done),
            Err(error) => {
                tracing::error!(rule, path = %args.path, %error, "data.world policy failed");
                ctx.push_error(&error);
                Err(error)
            }
        }
    }

    async fn exec_rule_text(&self, _text: &str, _ctx: &mut RuleContext<'_>) -> Result<RuleOutcome> {
        Err(Error::unsupported_rule("exec_rule_text"))
    }

    async fn exec_rule_expression(
        &self,
        _expression: &str,
        _ctx: &mut RuleContext<'_>,
    ) -> Result<RuleOutcome> {
        Err(Error::unsupported_rule("exec_rule_expression"))
    }
}
