//! Persistent identifier policy.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use uuid::Uuid;

use imprint_core::observability::rule_span;
use imprint_core::{
    Error, Result, RuleArg, RuleContext, RuleEngine, RuleOutcome, ServerProperties, log_at,
};
use imprint_publish::policy::{PREFIX, PolicyName, compose};

use crate::config::PidConfig;

/// Technology suffix of the policy this engine answers.
pub const TECHNOLOGY: &str = "persistent_identifier";

/// Encodes an identifier as unpadded base64 of its hyphenated text form.
///
/// ```rust
/// use imprint_pid::engine::encode_identifier;
/// use uuid::Uuid;
///
/// let id = encode_identifier(&Uuid::nil());
/// assert_eq!(id.len(), 48);
/// ```
#[must_use]
pub fn encode_identifier(uuid: &Uuid) -> String {
    STANDARD_NO_PAD.encode(uuid.hyphenated().to_string())
}

/// Mints a fresh random identifier.
#[must_use]
pub fn mint_identifier() -> String {
    encode_identifier(&Uuid::new_v4())
}

/// Rule engine answering `irods_policy_publishing_persistent_identifier`.
#[derive(Debug)]
pub struct PersistentIdentifierEngine {
    policy: PolicyName,
    config: Option<PidConfig>,
}

impl Default for PersistentIdentifierEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistentIdentifierEngine {
    /// Creates an engine; configuration is read at `start`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            policy: compose(PREFIX, TECHNOLOGY),
            config: None,
        }
    }

    /// The policy name served.
    #[must_use]
    pub fn policy(&self) -> &str {
        self.policy.as_str()
    }

    /// The configuration loaded at `start`.
    #[must_use]
    pub const fn config(&self) -> Option<&PidConfig> {
        self.config.as_ref()
    }

    fn decode(args: &[RuleArg]) -> Result<(&str, &str)> {
        match args {
            [RuleArg::Str(path), RuleArg::Str(service_name)] => {
                Ok((path.as_str(), service_name.as_str()))
            }
            _ => Err(Error::invalid_argument(format!(
                "expected [path, service_name] string arguments, got [{}]",
                args.iter().map(RuleArg::kind).collect::<Vec<_>>().join(", ")
            ))),
        }
    }
}

#[async_trait]
impl RuleEngine for PersistentIdentifierEngine {
    fn start(&mut self, instance_name: &str, properties: &ServerProperties) -> Result<()> {
        let config = PidConfig::load(instance_name, properties)?;
        tracing::info!(
            instance = instance_name,
            hosts = config.hosts.len(),
            bulk_count = config.bulk_count,
            "persistent identifier engine started"
        );
        self.config = Some(config);
        Ok(())
    }

    fn stop(&mut self, instance_name: &str) -> Result<()> {
        tracing::info!(instance = instance_name, "persistent identifier engine stopped");
        Ok(())
    }

    fn rule_exists(&self, rule: &str) -> bool {
        self.policy == rule
    }

    fn list_rules(&self) -> Vec<String> {
        vec![self.policy.as_str().to_string()]
    }

    async fn exec_rule(
        &self,
        rule: &str,
        args: &[RuleArg],
        ctx: &mut RuleContext<'_>,
    ) -> Result<RuleOutcome> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| Error::configuration("persistent identifier engine used before start"))?;
        if !self.rule_exists(rule) {
            return Err(Error::unsupported_rule(rule));
        }

        let (path, service_name) = match Self::decode(args) {
            Ok(decoded) => decoded,
            Err(error) => {
                ctx.push_error(&error);
                return Err(error);
            }
        };

        let identifier = rule_span(TECHNOLOGY, rule, &config.instance_name).in_scope(|| {
            let identifier = mint_identifier();
            log_at!(
                config.log_level,
                path,
                service_name,
                identifier = %identifier,
                "persistent identifier minted"
            );
            identifier
        });
        Ok(RuleOutcome::Value(identifier))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_decode_to_uuid_text() {
        let uuid = Uuid::new_v4();
        let encoded = encode_identifier(&uuid);
        let decoded = STANDARD_NO_PAD.decode(&encoded).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), uuid.to_string());
        assert!(!encoded.contains('='));
    }

    #[test]
    fn identifiers_are_unique() {
        assert_ne!(mint_identifier(), mint_identifier());
    }

    #[test]
    fn decode_requires_exactly_two_strings() {
        let path = RuleArg::Str("/tempZone/home/alice/a.csv".into());
        let service = RuleArg::Str("handle".into());
        assert_eq!(
            PersistentIdentifierEngine::decode(&[path.clone(), service.clone()]).unwrap(),
            ("/tempZone/home/alice/a.csv", "handle")
        );

        let trailing = [path.clone(), service, RuleArg::Str(String::new())];
        let err = PersistentIdentifierEngine::decode(&trailing).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
        assert!(PersistentIdentifierEngine::decode(&[path]).is_err());
    }

    #[test]
    fn policy_name() {
        let engine = PersistentIdentifierEngine::new();
        assert_eq!(engine.policy(), "irods_policy_publishing_persistent_identifier");
        assert_eq!(engine.list_rules(), vec![engine.policy().to_string()]);
    }
}
