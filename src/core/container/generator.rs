//! Contracts between the container and the resources it builds

use crate::core::context::BackendContext;
use crate::core::error::{CompositionError, Result};
use crate::core::iam::{Policy, ResourceAccessAcceptorFactory, Role};
use crate::core::token::{ResourceGroup, ResourceToken};
use serde::Serialize;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A realized node of the backend graph
pub trait ResourceInstance: Any + Send + Sync + fmt::Debug {
    /// Group this instance was generated for
    fn resource_group(&self) -> ResourceGroup;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    /// Policy-attachment capability, if this resource owns principals
    fn access_acceptor_factory(&self) -> Option<&dyn ResourceAccessAcceptorFactory> {
        None
    }

    /// Serializable view handed to the provisioning emitter
    fn snapshot(&self) -> ResourceSnapshot;
}

/// Deferred, memoizable build logic for one token
///
/// The container invokes [`generate_container_entry`] at most once per
/// successful build of [`token`].
///
/// [`generate_container_entry`]: ConstructContainerEntryGenerator::generate_container_entry
/// [`token`]: ConstructContainerEntryGenerator::token
pub trait ConstructContainerEntryGenerator: Send + Sync {
    fn resource_group(&self) -> ResourceGroup;

    fn token(&self) -> &ResourceToken;

    fn generate_container_entry(&self, ctx: &BackendContext) -> Result<Arc<dyn ResourceInstance>>;
}

/// Declared resource that produces its instance through the container
pub trait ConstructFactory: Send + Sync {
    fn token(&self) -> &ResourceToken;

    /// Alternative name the factory can be looked up by
    fn provides(&self) -> Option<&str> {
        None
    }

    fn get_instance(&self, ctx: &BackendContext) -> Result<Arc<dyn ResourceInstance>>;
}

/// Downcast a container entry to its concrete type
pub fn downcast_instance<T: ResourceInstance>(
    token: &ResourceToken,
    instance: Arc<dyn ResourceInstance>,
) -> Result<Arc<T>> {
    instance
        .into_any()
        .downcast::<T>()
        .map_err(|_| CompositionError::TypeMismatch {
            token: token.clone(),
            expected: std::any::type_name::<T>(),
        })
}

/// Role as seen by the provisioning emitter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleSnapshot {
    pub name: String,
    pub arn: String,
    pub policies: Vec<Policy>,
}

impl From<&Role> for RoleSnapshot {
    fn from(role: &Role) -> Self {
        RoleSnapshot {
            name: role.name().to_string(),
            arn: role.arn().to_string(),
            policies: role.policies(),
        }
    }
}

/// Resource as seen by the provisioning emitter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceSnapshot {
    pub group: ResourceGroup,
    pub construct_path: String,
    pub attributes: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub roles: BTreeMap<String, RoleSnapshot>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
}

impl ResourceSnapshot {
    pub fn new(group: ResourceGroup, construct_path: impl Into<String>) -> Self {
        ResourceSnapshot {
            group,
            construct_path: construct_path.into(),
            attributes: BTreeMap::new(),
            roles: BTreeMap::new(),
            environment: BTreeMap::new(),
        }
    }

    pub fn attribute(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn role(mut self, identifier: &str, role: &Role) -> Self {
        self.roles.insert(identifier.to_string(), RoleSnapshot::from(role));
        self
    }

    pub fn environment(mut self, environment: BTreeMap<String, String>) -> Self {
        self.environment = environment;
        self
    }
}
