//! Admin operations: functions that call privileged user-pool APIs
//!
//! Each operation is a plain [`FunctionFactory`] composed with an
//! [`AdminAccessHook`]. The hook looks up the auth resource through the
//! container; when auth is declared the function's role gets an inline
//! policy for the operation's actions on the user pool, and the function
//! learns the pool id through its environment. Without auth the function
//! is still built, just without the grant.

use super::auth::{BackendAuth, AUTH_TOKEN};
use super::function::{BackendFunction, FunctionFactory, FunctionProps, PostBuildHook};
use crate::core::container::downcast_instance;
use crate::core::context::BackendContext;
use crate::core::declaration::DeclarationSite;
use crate::core::error::Result;
use crate::core::iam::{Policy, Statement};
use crate::core::validation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Environment variable carrying the user pool id into admin handlers
pub const USER_POOL_ID_ENV: &str = "AMPLIFY_AUTH_USERPOOL_ID";

const ADMIN_TIMEOUT_SECONDS: u32 = 15;
const ADMIN_MEMORY_MB: u32 = 128;

/// GraphQL operation type exposed for an admin operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
}

/// Supported admin operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdminOperation {
    AddUserToGroup,
    ListGroupsForUser,
}

impl AdminOperation {
    pub fn all() -> [AdminOperation; 2] {
        [AdminOperation::AddUserToGroup, AdminOperation::ListGroupsForUser]
    }

    /// Schema field name, e.g. `AdminAddUserToGroup`
    pub fn operation_name(&self) -> &'static str {
        match self {
            AdminOperation::AddUserToGroup => "AdminAddUserToGroup",
            AdminOperation::ListGroupsForUser => "AdminListGroupsForUser",
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            AdminOperation::AddUserToGroup => OperationKind::Mutation,
            AdminOperation::ListGroupsForUser => OperationKind::Query,
        }
    }

    /// Function name used when the caller does not pick one
    pub fn default_function_name(&self) -> &'static str {
        match self {
            AdminOperation::AddUserToGroup => "add-user-to-group",
            AdminOperation::ListGroupsForUser => "list-groups-for-user",
        }
    }

    /// Provider actions the handler needs
    pub fn actions(&self) -> &'static [&'static str] {
        match self {
            AdminOperation::AddUserToGroup => &["cognito-idp:AdminAddUserToGroup"],
            AdminOperation::ListGroupsForUser => &["cognito-idp:AdminListGroupsForUser"],
        }
    }

    /// Required string arguments of the operation
    pub fn arguments(&self) -> &'static [&'static str] {
        match self {
            AdminOperation::AddUserToGroup => &["userId", "groupName"],
            AdminOperation::ListGroupsForUser => &["userId"],
        }
    }

    pub fn handler_entry(&self) -> String {
        format!("operations/{}/handler.js", self.default_function_name())
    }

    /// Declare the function backing this operation
    ///
    /// # Examples
    ///
    /// ```
    /// use backend_compose::resources::AdminOperation;
    /// use backend_compose::ConstructFactory;
    ///
    /// let factory = AdminOperation::AddUserToGroup.function(None).unwrap();
    /// assert_eq!(factory.token().as_str(), "function:add-user-to-group");
    /// ```
    #[track_caller]
    pub fn function(&self, custom_name: Option<&str>) -> Result<FunctionFactory> {
        self.function_at(custom_name, DeclarationSite::caller())
    }

    pub fn function_at(&self, custom_name: Option<&str>, site: DeclarationSite) -> Result<FunctionFactory> {
        let name = custom_name.unwrap_or(self.default_function_name());
        let props = FunctionProps::new(name, self.handler_entry())?
            .timeout(ADMIN_TIMEOUT_SECONDS)
            .memory(ADMIN_MEMORY_MB);
        let hook = AdminAccessHook::new(self.actions().iter().copied())?;
        Ok(FunctionFactory::with_site(props, site)?.with_hook(Arc::new(hook)))
    }
}

impl fmt::Display for AdminOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.operation_name())
    }
}

/// Grants fixed user-pool actions to a function when auth is declared
#[derive(Debug, Clone)]
pub struct AdminAccessHook {
    actions: Vec<String>,
}

impl AdminAccessHook {
    pub fn new<I, S>(actions: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let actions: Vec<String> = actions.into_iter().map(Into::into).collect();
        for action in &actions {
            validation::validate_action(action)?;
        }
        Ok(AdminAccessHook { actions })
    }

    pub fn actions(&self) -> &[String] {
        &self.actions
    }
}

impl PostBuildHook for AdminAccessHook {
    fn after_build(&self, function: &BackendFunction, ctx: &BackendContext) -> Result<()> {
        let Some(factory) = ctx.container().get_construct_factory(AUTH_TOKEN) else {
            warn!(
                "No auth resource declared; {} is built without admin access",
                function.token()
            );
            return Ok(());
        };

        let instance = factory.get_instance(ctx)?;
        let auth = downcast_instance::<BackendAuth>(factory.token(), instance)?;
        let user_pool = &auth.resources().user_pool;

        function.set_environment(USER_POOL_ID_ENV, &user_pool.id);
        function.role().attach_inline_policy(Policy::new(
            format!("{}-policy", function.name()),
            vec![Statement::allow(self.actions.iter().cloned(), [user_pool.arn.clone()])],
        ));
        debug!(
            "Granted {:?} on {} to {}",
            self.actions,
            user_pool.arn,
            function.token()
        );
        Ok(())
    }
}
