//! Reference auth: an imported user pool, identity pool and IAM roles
//!
//! Only one auth resource may be declared per backend. Building it
//! optionally runs the user's access callback and arbitrates the returned
//! definitions against the user pool.

use super::user_pool::{RoleArn, UserPool, UserPoolAccessPolicyFactory};
use crate::core::construct::FRIENDLY_NAME_TAG;
use crate::core::container::{
    downcast_instance, ConstructContainerEntryGenerator, ConstructFactory, ResourceInstance, ResourceSnapshot,
};
use crate::core::context::BackendContext;
use crate::core::declaration::DeclarationSite;
use crate::core::error::{CompositionError, Result};
use crate::core::iam::{
    AuthAccessBuilder, AuthAccessGenerator, PolicyArbiter, ResourceAccessAcceptor, ResourceAccessAcceptorFactory,
    Role, RoleAccessAcceptor,
};
use crate::core::token::{ResourceGroup, ResourceToken};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Token every consumer uses to find the auth resource
pub const AUTH_TOKEN: &str = "AuthResources";

/// Alias the reference auth factory also answers to
pub const REFERENCE_AUTH_PROVIDES: &str = "ReferenceAuthResources";

pub const AUTHENTICATED_ROLE: &str = "authenticatedUserIamRole";
pub const UNAUTHENTICATED_ROLE: &str = "unauthenticatedUserIamRole";

/// Singleton kind claimed by [`ReferenceAuthFactory`]
pub const REFERENCE_AUTH_KIND: &str = "referenceAuth";

/// Construct id of the auth resource
pub const AUTH_NAME: &str = "amplifyAuth";

const DECLARATION_PATH: &str = "amplify/auth/resource";

/// Identifiers of an existing auth setup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceAuthProps {
    pub user_pool_id: String,
    pub identity_pool_id: String,
    pub user_pool_client_id: String,
    pub auth_role_arn: String,
    pub unauth_role_arn: String,

    /// User pool group name -> group role ARN
    #[serde(default)]
    pub groups: BTreeMap<String, String>,
}

/// Realized auth resources
#[derive(Debug)]
pub struct AuthResources {
    pub user_pool: UserPool,
    pub identity_pool_id: String,
    pub user_pool_client_id: String,
    pub authenticated_user_iam_role: Arc<Role>,
    pub unauthenticated_user_iam_role: Arc<Role>,
    pub groups: BTreeMap<String, Arc<Role>>,
}

impl AuthResources {
    fn from_props(props: &ReferenceAuthProps) -> anyhow::Result<Self> {
        let user_pool = UserPool::from_reference(&props.user_pool_id, &props.auth_role_arn)?;
        if props.identity_pool_id.is_empty() {
            anyhow::bail!("identity pool id cannot be empty");
        }
        if props.user_pool_client_id.is_empty() {
            anyhow::bail!("user pool client id cannot be empty");
        }

        let mut groups = BTreeMap::new();
        for (group, arn) in &props.groups {
            groups.insert(group.clone(), Arc::new(role_from_arn(arn)?));
        }

        Ok(AuthResources {
            user_pool,
            identity_pool_id: props.identity_pool_id.clone(),
            user_pool_client_id: props.user_pool_client_id.clone(),
            authenticated_user_iam_role: Arc::new(role_from_arn(&props.auth_role_arn)?),
            unauthenticated_user_iam_role: Arc::new(role_from_arn(&props.unauth_role_arn)?),
            groups,
        })
    }
}

fn role_from_arn(arn: &str) -> anyhow::Result<Role> {
    let parsed = RoleArn::parse(arn)?;
    Ok(Role::new(parsed.name, arn))
}

/// The auth entry stored in the container
#[derive(Debug)]
pub struct BackendAuth {
    token: ResourceToken,
    construct_path: String,
    resources: AuthResources,
}

impl BackendAuth {
    pub fn resources(&self) -> &AuthResources {
        &self.resources
    }

    pub fn construct_path(&self) -> &str {
        &self.construct_path
    }

    fn role(&self, role_identifier: &str) -> Option<&Arc<Role>> {
        match role_identifier {
            AUTHENTICATED_ROLE => Some(&self.resources.authenticated_user_iam_role),
            UNAUTHENTICATED_ROLE => Some(&self.resources.unauthenticated_user_iam_role),
            group => self.resources.groups.get(group),
        }
    }
}

impl ResourceAccessAcceptorFactory for BackendAuth {
    /// `role_identifier` is the auth or unauth role name, or a user pool group name
    fn get_resource_access_acceptor(
        &self,
        role_identifier: Option<&str>,
    ) -> Result<Arc<dyn ResourceAccessAcceptor>> {
        let identifier = role_identifier.unwrap_or_default();
        let role = self
            .role(identifier)
            .ok_or_else(|| CompositionError::InvalidResourceAccessConfig {
                token: self.token.clone(),
                role: identifier.to_string(),
            })?;

        Ok(Arc::new(RoleAccessAcceptor::new(
            format!("{}ResourceAccessAcceptor", identifier),
            role.clone(),
        )))
    }
}

impl ResourceInstance for BackendAuth {
    fn resource_group(&self) -> ResourceGroup {
        ResourceGroup::auth()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn access_acceptor_factory(&self) -> Option<&dyn ResourceAccessAcceptorFactory> {
        Some(self)
    }

    fn snapshot(&self) -> ResourceSnapshot {
        let mut snapshot = ResourceSnapshot::new(ResourceGroup::auth(), &self.construct_path)
            .attribute("userPoolId", &self.resources.user_pool.id)
            .attribute("userPoolArn", &self.resources.user_pool.arn)
            .attribute("identityPoolId", &self.resources.identity_pool_id)
            .attribute("userPoolClientId", &self.resources.user_pool_client_id)
            .role(AUTHENTICATED_ROLE, &self.resources.authenticated_user_iam_role)
            .role(UNAUTHENTICATED_ROLE, &self.resources.unauthenticated_user_iam_role);
        for (group, role) in &self.resources.groups {
            snapshot = snapshot.role(group, role);
        }
        snapshot
    }
}

/// Singleton factory for the reference auth resource
pub struct ReferenceAuthFactory {
    token: ResourceToken,
    props: ReferenceAuthProps,
    access: Option<AuthAccessGenerator>,
    site: DeclarationSite,
    generator: OnceLock<Arc<ReferenceAuthGenerator>>,
}

impl ReferenceAuthFactory {
    /// Declare the auth resource of `ctx`'s backend
    ///
    /// # Errors
    ///
    /// `MultipleSingletonResources` if this backend already declares auth.
    #[track_caller]
    pub fn new(ctx: &BackendContext, props: ReferenceAuthProps) -> Result<Self> {
        Self::with_site(ctx, props, DeclarationSite::caller())
    }

    pub fn with_site(ctx: &BackendContext, props: ReferenceAuthProps, site: DeclarationSite) -> Result<Self> {
        let factory = Self::unclaimed(props, site)?;
        ctx.claim_singleton(REFERENCE_AUTH_KIND, factory.site.clone())?;
        debug!("Declared reference auth at {}", factory.site);
        Ok(factory)
    }

    /// Factory whose singleton slot is claimed by the caller, usually through
    /// `ConstructContainer::register_singleton_factory`
    pub(crate) fn unclaimed(props: ReferenceAuthProps, site: DeclarationSite) -> Result<Self> {
        Ok(ReferenceAuthFactory {
            token: ResourceToken::new(AUTH_TOKEN)?,
            props,
            access: None,
            site,
            generator: OnceLock::new(),
        })
    }

    /// Attach the access callback run when auth is built
    pub fn with_access(mut self, access: AuthAccessGenerator) -> Self {
        self.access = Some(access);
        self
    }

    pub fn declaration_site(&self) -> &DeclarationSite {
        &self.site
    }

    /// Typed variant of [`ConstructFactory::get_instance`]
    pub fn get_auth(&self, ctx: &BackendContext) -> Result<Arc<BackendAuth>> {
        let instance = self.get_instance(ctx)?;
        downcast_instance(&self.token, instance)
    }
}

impl fmt::Debug for ReferenceAuthFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceAuthFactory")
            .field("token", &self.token)
            .field("site", &self.site)
            .field("has_access", &self.access.is_some())
            .finish()
    }
}

impl ConstructFactory for ReferenceAuthFactory {
    fn token(&self) -> &ResourceToken {
        &self.token
    }

    fn provides(&self) -> Option<&str> {
        Some(REFERENCE_AUTH_PROVIDES)
    }

    fn get_instance(&self, ctx: &BackendContext) -> Result<Arc<dyn ResourceInstance>> {
        if let Some(verifier) = ctx.declaration_verifier() {
            verifier.verify(
                &self.site,
                DECLARATION_PATH,
                "Amplify Auth must be defined in amplify/auth/resource",
            )?;
        }

        let generator = self.generator.get_or_init(|| {
            Arc::new(ReferenceAuthGenerator {
                token: self.token.clone(),
                props: self.props.clone(),
                access: self.access.clone(),
            })
        });
        ctx.container().get_or_compute(generator.as_ref(), ctx)
    }
}

struct ReferenceAuthGenerator {
    token: ResourceToken,
    props: ReferenceAuthProps,
    access: Option<AuthAccessGenerator>,
}

impl ConstructContainerEntryGenerator for ReferenceAuthGenerator {
    fn resource_group(&self) -> ResourceGroup {
        ResourceGroup::auth()
    }

    fn token(&self) -> &ResourceToken {
        &self.token
    }

    fn generate_container_entry(&self, ctx: &BackendContext) -> Result<Arc<dyn ResourceInstance>> {
        let resources =
            AuthResources::from_props(&self.props).map_err(|source| CompositionError::ConstructInitialization {
                token: self.token.clone(),
                source: source.context("Failed to instantiate auth construct"),
            })?;

        let tree = ctx.construct_tree();
        let auth = Arc::new(BackendAuth {
            token: self.token.clone(),
            construct_path: format!("{}/{}", tree.root(), AUTH_NAME),
            resources,
        });

        // Access is arbitrated before the construct is recorded so a failed
        // build leaves the tree untouched and can be retried.
        if let Some(access) = &self.access {
            let definitions = access(&AuthAccessBuilder::new());
            let pool = &auth.resources.user_pool;
            let env_name = format!("{}_USERPOOL_ID", AUTH_NAME);
            let environment = ctx.generate_environment_entries([(env_name.as_str(), pool.id.as_str())]);

            PolicyArbiter::new()
                .with_environment(environment)
                .arbitrate_policies(
                    definitions,
                    ctx,
                    &UserPoolAccessPolicyFactory::new(pool.clone(), AUTH_NAME),
                )?;
        }

        let path = tree.add(None, AUTH_NAME, "auth")?;
        tree.add(Some(&path), "UserPool", "user-pool")?;
        tree.add(Some(&path), "UserPoolClient", "user-pool-client")?;
        tree.add(Some(&path), "IdentityPool", "identity-pool")?;
        tree.add(Some(&path), AUTHENTICATED_ROLE, "role")?;
        tree.add(Some(&path), UNAUTHENTICATED_ROLE, "role")?;
        tree.tag(&path, FRIENDLY_NAME_TAG, AUTH_NAME);

        info!("Auth resource {} ready (user pool {})", path, auth.resources.user_pool.id);
        Ok(auth)
    }
}
