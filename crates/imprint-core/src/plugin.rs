//! Host plugin contract.
//!
//! The host loads each engine, hands it its instance name and the server
//! configuration at [`RuleEngine::start`], then calls into it once per policy
//! enforcement point. Every call carries a [`RuleContext`]: the acting user,
//! an error stack visible to the client, the publish-marking slot shared by a
//! paired pre/post event, and the host's [`PolicyInvoker`] for chaining into
//! other engines.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ServerProperties;
use crate::error::{Error, Result};

/// Open flag requesting write-only access.
pub const O_WRONLY: i32 = 1;
/// Open flag requesting read-write access.
pub const O_RDWR: i32 = 2;
const O_ACCMODE: i32 = 3;

/// Input carried by data object API events.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataObjectInput {
    /// Logical path of the data object.
    pub obj_path: String,
    /// Open flags (access mode in the low two bits).
    pub open_flags: i32,
}

impl DataObjectInput {
    /// Creates an input for `path` with the given open flags.
    #[must_use]
    pub fn new(path: impl Into<String>, open_flags: i32) -> Self {
        Self {
            obj_path: path.into(),
            open_flags,
        }
    }

    /// Returns true if the open requests write or read-write access.
    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(self.open_flags & O_ACCMODE, O_WRONLY | O_RDWR)
    }
}

/// Input carried by collection API events.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CollectionInput {
    /// Logical path of the collection.
    pub coll_name: String,
}

impl CollectionInput {
    /// Creates an input for `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            coll_name: path.into(),
        }
    }
}

/// Input carried by metadata modification events.
///
/// Field order follows the host's positional `arg0..arg5` layout.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModAvuInput {
    /// `add`, `set`, `rm`, ...
    pub operation: String,
    /// `-d` for data objects, `-C` or `-c` for collections.
    pub item_type: String,
    /// Logical path of the target.
    pub path: String,
    /// Attribute name.
    pub attribute: String,
    /// Attribute value.
    pub value: String,
    /// Attribute units (may be empty).
    pub units: String,
}

/// A single argument passed by the host to a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleArg {
    /// Plain string argument.
    Str(String),
    /// Connection handle for the calling client.
    Comm {
        /// Proxy user name of the connection.
        user_name: String,
    },
    /// Data object input.
    DataObject(DataObjectInput),
    /// Collection input.
    Collection(CollectionInput),
    /// Metadata modification input.
    ModAvu(ModAvuInput),
}

impl RuleArg {
    /// Short name of the argument kind, for error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Comm { .. } => "comm",
            Self::DataObject(_) => "data object input",
            Self::Collection(_) => "collection input",
            Self::ModAvu(_) => "metadata input",
        }
    }

    /// Builds the `[instance, comm, input]` argument list of an API event.
    #[must_use]
    pub fn pep_args(instance: &str, user_name: &str, input: Self) -> Vec<Self> {
        vec![
            Self::Str(instance.to_string()),
            Self::Comm {
                user_name: user_name.to_string(),
            },
            input,
        ]
    }
}

impl From<DataObjectInput> for RuleArg {
    fn from(input: DataObjectInput) -> Self {
        Self::DataObject(input)
    }
}

impl From<CollectionInput> for RuleArg {
    fn from(input: CollectionInput) -> Self {
        Self::Collection(input)
    }
}

impl From<ModAvuInput> for RuleArg {
    fn from(input: ModAvuInput) -> Self {
        Self::ModAvu(input)
    }
}

/// An attribute/value/units metadata triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Avu {
    /// Attribute name.
    pub attribute: String,
    /// Value.
    pub value: String,
    /// Units (empty when absent).
    pub units: String,
}

impl Avu {
    /// Creates a new AVU.
    #[must_use]
    pub fn new(
        attribute: impl Into<String>,
        value: impl Into<String>,
        units: impl Into<String>,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
            units: units.into(),
        }
    }
}

/// The catalog entity a metadata row is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetadataTarget {
    /// A data object, by logical path.
    DataObject(String),
    /// A collection, by logical path.
    Collection(String),
}

impl MetadataTarget {
    /// Logical path of the target.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::DataObject(p) | Self::Collection(p) => p,
        }
    }

    /// `object` or `collection`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DataObject(_) => "object",
            Self::Collection(_) => "collection",
        }
    }
}

/// Change-detection state captured by a metadata pre-event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMarking {
    /// Where the marker is being written.
    pub target: MetadataTarget,
    /// The marker row being written.
    pub avu: Avu,
    /// True when no identical row existed before the write.
    pub is_new: bool,
}

impl PendingMarking {
    /// Returns true if this marking was captured for the same target and AVU.
    #[must_use]
    pub fn matches(&self, target: &MetadataTarget, avu: &Avu) -> bool {
        &self.target == target && &self.avu == avu
    }
}

/// The three string arguments forwarded to a technology handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyArgs {
    /// Logical path being published or purged.
    pub path: String,
    /// Acting user.
    pub user_name: String,
    /// `object` or `collection`.
    pub publish_type: String,
}

impl PolicyArgs {
    /// Decodes `[path, user, publish_type]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] unless there are exactly three
    /// string arguments.
    pub fn decode(args: &[RuleArg]) -> Result<Self> {
        match args {
            [RuleArg::Str(path), RuleArg::Str(user), RuleArg::Str(publish_type)] => Ok(Self {
                path: path.clone(),
                user_name: user.clone(),
                publish_type: publish_type.clone(),
            }),
            [_, _, _] => Err(Error::invalid_argument(format!(
                "policy arguments must be strings, got [{}]",
                args.iter().map(RuleArg::kind).collect::<Vec<_>>().join(", ")
            ))),
            _ => Err(Error::invalid_argument(format!(
                "expected 3 policy arguments, got {}",
                args.len()
            ))),
        }
    }

    /// Encodes the arguments for [`RuleContext::invoke_policy`].
    #[must_use]
    pub fn into_args(self) -> Vec<RuleArg> {
        vec![
            RuleArg::Str(self.path),
            RuleArg::Str(self.user_name),
            RuleArg::Str(self.publish_type),
        ]
    }
}

/// What the host should do after a rule returns successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    /// Let later rule engines handle the same event.
    Continue,
    /// The event is fully handled.
    Done,
    /// The rule produced a value for the caller.
    Value(String),
}

/// Host-side routing of a policy name to whichever engine serves it.
#[async_trait]
pub trait PolicyInvoker: Send + Sync {
    /// Invokes `policy` with `args` in the caller's context.
    ///
    /// # Errors
    ///
    /// Returns the handler's error, or [`Error::UnsupportedRule`] when no
    /// engine serves `policy`.
    async fn invoke_policy(
        &self,
        policy: &str,
        args: Vec<RuleArg>,
        ctx: &mut RuleContext<'_>,
    ) -> Result<RuleOutcome>;
}

#[derive(Debug)]
struct Unrouted;

#[async_trait]
impl PolicyInvoker for Unrouted {
    async fn invoke_policy(
        &self,
        policy: &str,
        _args: Vec<RuleArg>,
        _ctx: &mut RuleContext<'_>,
    ) -> Result<RuleOutcome> {
        Err(Error::unsupported_rule(policy))
    }
}

static UNROUTED: Unrouted = Unrouted;

/// Per-invocation state the host hands to every rule call.
pub struct RuleContext<'a> {
    user_name: String,
    errors: Vec<(i32, String)>,
    pending_marking: Option<PendingMarking>,
    invoker: &'a dyn PolicyInvoker,
}

impl std::fmt::Debug for RuleContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleContext")
            .field("user_name", &self.user_name)
            .field("errors", &self.errors)
            .field("pending_marking", &self.pending_marking)
            .finish_non_exhaustive()
    }
}

impl<'a> RuleContext<'a> {
    /// Creates a context for `user_name` that routes policies through `invoker`.
    #[must_use]
    pub fn new(user_name: impl Into<String>, invoker: &'a dyn PolicyInvoker) -> Self {
        Self {
            user_name: user_name.into(),
            errors: Vec::new(),
            pending_marking: None,
            invoker,
        }
    }

    /// Returns the client user name.
    #[must_use]
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// Replaces the client user name (proxying a delayed invocation's user).
    pub fn set_user_name(&mut self, user_name: impl Into<String>) {
        self.user_name = user_name.into();
    }

    /// Pushes an error onto the client-visible error stack.
    pub fn push_error(&mut self, error: &Error) {
        self.errors.push((error.status_code(), error.to_string()));
    }

    /// Returns the error stack, oldest first.
    #[must_use]
    pub fn errors(&self) -> &[(i32, String)] {
        &self.errors
    }

    /// Stores the marking captured by a metadata pre-event.
    pub fn set_pending_marking(&mut self, marking: PendingMarking) {
        self.pending_marking = Some(marking);
    }

    /// Returns the pending marking without consuming it.
    #[must_use]
    pub fn pending_marking(&self) -> Option<&PendingMarking> {
        self.pending_marking.as_ref()
    }

    /// Takes the pending marking if it was captured for `target` and `avu`.
    ///
    /// A marking for a different target or AVU is left in place.
    pub fn take_pending_marking(
        &mut self,
        target: &MetadataTarget,
        avu: &Avu,
    ) -> Option<PendingMarking> {
        if self
            .pending_marking
            .as_ref()
            .is_some_and(|m| m.matches(target, avu))
        {
            self.pending_marking.take()
        } else {
            None
        }
    }

    /// Invokes another policy through the host.
    ///
    /// # Errors
    ///
    /// Propagates the invoked handler's error.
    pub async fn invoke_policy(&mut self, policy: &str, args: Vec<RuleArg>) -> Result<RuleOutcome> {
        let invoker = self.invoker;
        invoker.invoke_policy(policy, args, self).await
    }
}

impl RuleContext<'static> {
    /// Creates a context whose policy invocations are never routed.
    #[must_use]
    pub fn detached(user_name: impl Into<String>) -> Self {
        Self::new(user_name, &UNROUTED)
    }
}

/// A rule engine plugin loaded by the host.
///
/// `start` and `stop` run with exclusive access; every event call takes
/// `&self` and may run concurrently with others.
#[async_trait]
pub trait RuleEngine: Send + Sync {
    /// Loads configuration for `instance_name` and fixes the served rule names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the instance configuration is
    /// missing or mistyped.
    fn start(&mut self, instance_name: &str, properties: &ServerProperties) -> Result<()>;

    /// Releases anything acquired at `start`.
    ///
    /// # Errors
    ///
    /// Implementations may report teardown failures.
    fn stop(&mut self, instance_name: &str) -> Result<()>;

    /// Returns true if this engine serves `rule`.
    fn rule_exists(&self, rule: &str) -> bool;

    /// Lists the rules this engine serves.
    fn list_rules(&self) -> Vec<String>;

    /// Executes a named rule.
    async fn exec_rule(
        &self,
        rule: &str,
        args: &[RuleArg],
        ctx: &mut RuleContext<'_>,
    ) -> Result<RuleOutcome>;

    /// Executes free-form rule text.
    async fn exec_rule_text(&self, text: &str, ctx: &mut RuleContext<'_>) -> Result<RuleOutcome>;

    /// Executes a rule expression submitted through delayed execution.
    async fn exec_rule_expression(
        &self,
        expression: &str,
        ctx: &mut RuleContext<'_>,
    ) -> Result<RuleOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker() -> Avu {
        Avu::new("irods::publishing::publish", "dataworld", "")
    }

    #[test]
    fn open_flags_detect_write_access() {
        assert!(!DataObjectInput::new("/z/a", 0).is_write());
        assert!(DataObjectInput::new("/z/a", O_WRONLY).is_write());
        assert!(DataObjectInput::new("/z/a", O_RDWR).is_write());
        // O_CREAT | O_WRONLY
        assert!(DataObjectInput::new("/z/a", 0o100 | O_WRONLY).is_write());
    }

    #[test]
    fn policy_args_decode_requires_three_strings() {
        let ok = PolicyArgs::decode(&[
            RuleArg::Str("/z/a".into()),
            RuleArg::Str("alice".into()),
            RuleArg::Str("object".into()),
        ])
        .unwrap();
        assert_eq!(ok.user_name, "alice");

        let short = PolicyArgs::decode(&[RuleArg::Str("/z/a".into())]);
        assert!(matches!(short, Err(Error::InvalidArgument { .. })));

        let wrong = PolicyArgs::decode(&[
            RuleArg::Str("/z/a".into()),
            RuleArg::Comm {
                user_name: "alice".into(),
            },
            RuleArg::Str("object".into()),
        ]);
        assert!(matches!(wrong, Err(Error::InvalidArgument { .. })));
    }

    #[test]
    fn pending_marking_is_keyed_by_target_and_avu() {
        let mut ctx = RuleContext::detached("alice");
        let target = MetadataTarget::Collection("/z/home/alice/ds".into());
        ctx.set_pending_marking(PendingMarking {
            target: target.clone(),
            avu: marker(),
            is_new: true,
        });

        let other = MetadataTarget::Collection("/z/home/alice/other".into());
        assert!(ctx.take_pending_marking(&other, &marker()).is_none());
        assert!(ctx.pending_marking().is_some());

        let taken = ctx.take_pending_marking(&target, &marker()).unwrap();
        assert!(taken.is_new);
        assert!(ctx.pending_marking().is_none());
    }

    #[tokio::test]
    async fn detached_context_does_not_route() {
        let mut ctx = RuleContext::detached("alice");
        let err = ctx
            .invoke_policy("irods_policy_publishing_object_publish_x", Vec::new())
            .await
            .unwrap_err();
        assert!(err.is_continue());
    }

    #[test]
    fn error_stack_records_status() {
        let mut ctx = RuleContext::detached("alice");
        ctx.push_error(&Error::invalid_argument("bad"));
        assert_eq!(ctx.errors().len(), 1);
        assert_eq!(ctx.errors()[0].0, crate::error::status::INVALID_ARGUMENT);
    }
}
