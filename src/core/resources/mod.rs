//! Resource factories
//!
//! - [`auth`]: singleton reference auth (user pool, identity pool, roles)
//! - [`function`]: generic function primitive with post-build hooks
//! - [`admin`]: admin operations composed from a function and an access hook
//! - [`user_pool`]: user-pool ARNs and the user-pool access policy factory

pub mod admin;
pub mod auth;
pub mod function;
pub mod user_pool;

pub use admin::{AdminAccessHook, AdminOperation, OperationKind, USER_POOL_ID_ENV};
pub use auth::{
    AuthResources, BackendAuth, ReferenceAuthFactory, ReferenceAuthProps, AUTHENTICATED_ROLE, AUTH_NAME, AUTH_TOKEN,
    REFERENCE_AUTH_KIND, REFERENCE_AUTH_PROVIDES, UNAUTHENTICATED_ROLE,
};
pub use function::{BackendFunction, FunctionFactory, FunctionProps, PostBuildHook, Runtime, EXECUTION_ROLE};
pub use user_pool::{user_pool_actions, RoleArn, UserPool, UserPoolAccessPolicyFactory, SERVICE_PREFIX};
