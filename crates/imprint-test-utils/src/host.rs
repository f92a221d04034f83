//! A minimal rule engine host.
//!
//! [`TestHost`] owns started engines and plays the host's part: it offers
//! each event to every engine serving the rule in load order, stops at the
//! first result that is not "continue", and routes policies invoked through
//! [`RuleContext::invoke_policy`] back into its engines.

use async_trait::async_trait;

use imprint_core::{
    Error, PolicyInvoker, Result, RuleArg, RuleContext, RuleEngine, RuleOutcome, ServerProperties,
};

/// Outcome of one host call, with the error stack the client would see.
#[derive(Debug)]
pub struct HostCall {
    /// Final result.
    pub result: Result<RuleOutcome>,
    /// Client-visible error stack.
    pub errors: Vec<(i32, String)>,
}

impl HostCall {
    /// True if the call did not fail.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Unwraps the error.
    pub fn unwrap_err(self) -> Error {
        match self.result {
            Ok(outcome) => panic!("expected an error, got {outcome:?}"),
            Err(error) => error,
        }
    }
}

/// Routes events and chained policies between engines.
#[derive(Default)]
pub struct TestHost {
    engines: Vec<Box<dyn RuleEngine>>,
}

impl std::fmt::Debug for TestHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestHost")
            .field("engines", &self.engines.len())
            .finish()
    }
}

impl TestHost {
    /// Creates a host with no engines.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts `engine` as `instance_name` and appends it to the load order.
    ///
    /// # Errors
    ///
    /// Propagates the engine's `start` error.
    pub fn load(
        &mut self,
        instance_name: &str,
        properties: &ServerProperties,
        mut engine: impl RuleEngine + 'static,
    ) -> Result<&mut Self> {
        engine.start(instance_name, properties)?;
        self.engines.push(Box::new(engine));
        Ok(self)
    }

    async fn route(
        &self,
        rule: &str,
        args: &[RuleArg],
        ctx: &mut RuleContext<'_>,
    ) -> Result<RuleOutcome> {
        let mut outcome = Err(Error::unsupported_rule(rule));
        for engine in self.engines.iter().filter(|e| e.rule_exists(rule)) {
            outcome = engine.exec_rule(rule, args, ctx).await;
            match &outcome {
                Ok(RuleOutcome::Continue) => {}
                Err(error) if error.is_continue() => {}
                _ => break,
            }
        }
        outcome
    }

    /// Raises an event as `user_name`.
    pub async fn exec_rule(&self, rule: &str, args: &[RuleArg], user_name: &str) -> HostCall {
        let mut ctx = RuleContext::new(user_name, self);
        let result = self.route(rule, args, &mut ctx).await;
        HostCall {
            result,
            errors: ctx.errors().to_vec(),
        }
    }

    /// Raises a metadata pre-event and its post-event in one context, with
    /// `commit` run in between, as the host does for a single API call.
    pub async fn exec_paired(
        &self,
        pre: (&str, &[RuleArg]),
        commit: impl FnOnce(),
        post: (&str, &[RuleArg]),
        user_name: &str,
    ) -> (HostCall, HostCall) {
        let mut ctx = RuleContext::new(user_name, self);
        let pre_result = self.route(pre.0, pre.1, &mut ctx).await;
        let pre_errors = ctx.errors().to_vec();
        if pre_result.as_ref().is_err_and(|e| !e.is_continue()) {
            return (
                HostCall {
                    result: pre_result,
                    errors: pre_errors.clone(),
                },
                HostCall {
                    result: Err(Error::unsupported_rule(post.0)),
                    errors: pre_errors,
                },
            );
        }
        commit();
        let post_result = self.route(post.0, post.1, &mut ctx).await;
        (
            HostCall {
                result: pre_result,
                errors: pre_errors,
            },
            HostCall {
                result: post_result,
                errors: ctx.errors().to_vec(),
            },
        )
    }

    /// Fires a delayed rule expression the way the facility does: every
    /// engine is offered the expression until one does not continue.
    pub async fn exec_rule_expression(&self, expression: &str, user_name: &str) -> HostCall {
        let mut ctx = RuleContext::new(user_name, self);
        let mut result = Err(Error::unsupported_rule("expression"));
        for engine in &self.engines {
            result = engine.exec_rule_expression(expression, &mut ctx).await;
            if !result.as_ref().is_err_and(Error::is_continue) {
                break;
            }
        }
        HostCall {
            result,
            errors: ctx.errors().to_vec(),
        }
    }

    /// Same as [`TestHost::exec_rule_expression`], through `exec_rule_text`.
    pub async fn exec_rule_text(&self, text: &str, user_name: &str) -> HostCall {
        let mut ctx = RuleContext::new(user_name, self);
        let mut result = Err(Error::unsupported_rule("text"));
        for engine in &self.engines {
            result = engine.exec_rule_text(text, &mut ctx).await;
            if !result.as_ref().is_err_and(Error::is_continue) {
                break;
            }
        }
        HostCall {
            result,
            errors: ctx.errors().to_vec(),
        }
    }
}

#[async_trait]
impl PolicyInvoker for TestHost {
    async fn invoke_policy(
        &self,
        policy: &str,
        args: Vec<RuleArg>,
        ctx: &mut RuleContext<'_>,
    ) -> Result<RuleOutcome> {
        self.route(policy, &args, ctx).await
    }
}
