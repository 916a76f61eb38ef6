//! Declarative access definitions
//!
//! Access callbacks receive an [`AuthAccessBuilder`] and return a list of
//! [`AccessDefinition`]s, e.g.
//!
//! ```
//! use backend_compose::iam::{AccessDefinition, AuthAccessBuilder};
//! use backend_compose::ResourceToken;
//!
//! let token = ResourceToken::new("function:add-user-to-group").unwrap();
//! let access = |allow: &AuthAccessBuilder| -> Vec<AccessDefinition> {
//!     vec![allow.resource(token.clone()).to(["addUserToGroup", "listGroupsForUser"])]
//! };
//! let defs = access(&AuthAccessBuilder::new());
//! assert_eq!(defs[0].actions.len(), 2);
//! ```

use crate::core::token::ResourceToken;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Reference to a principal: a resource, optionally narrowed to one of its roles
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PrincipalRef {
    pub token: ResourceToken,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl PrincipalRef {
    pub fn resource(token: ResourceToken) -> Self {
        PrincipalRef { token, role: None }
    }

    pub fn role(token: ResourceToken, role: impl Into<String>) -> Self {
        PrincipalRef {
            token,
            role: Some(role.into()),
        }
    }
}

impl fmt::Display for PrincipalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.role {
            Some(role) => write!(f, "{}#{}", self.token, role),
            None => write!(f, "{}", self.token),
        }
    }
}

/// Symbolic reference to a resource a principal wants access to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceRef {
    /// The user pool of the auth resource that arbitrates the definitions
    UserPool,
    /// A literal ARN
    Arn(String),
}

/// "principal wants actions on resources"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDefinition {
    pub principal: PrincipalRef,
    pub actions: BTreeSet<String>,
    pub resources: BTreeSet<ResourceRef>,
}

impl AccessDefinition {
    pub fn new<A, S>(principal: PrincipalRef, actions: A, resources: impl IntoIterator<Item = ResourceRef>) -> Self
    where
        A: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AccessDefinition {
            principal,
            actions: actions.into_iter().map(Into::into).collect(),
            resources: resources.into_iter().collect(),
        }
    }
}

/// User-supplied access callback, invoked once per auth build
pub type AuthAccessGenerator = Arc<dyn Fn(&AuthAccessBuilder) -> Vec<AccessDefinition> + Send + Sync>;

/// Capability handed to access callbacks
#[derive(Debug, Default, Clone, Copy)]
pub struct AuthAccessBuilder;

impl AuthAccessBuilder {
    pub fn new() -> Self {
        AuthAccessBuilder
    }

    /// Grant to the default principal of `token`
    pub fn resource(&self, token: ResourceToken) -> AccessRequest {
        AccessRequest {
            principal: PrincipalRef::resource(token),
        }
    }

    /// Grant to a named role of `token`
    pub fn role(&self, token: ResourceToken, role: impl Into<String>) -> AccessRequest {
        AccessRequest {
            principal: PrincipalRef::role(token, role),
        }
    }
}

/// Pending grant; finished by [`AccessRequest::to`]
#[derive(Debug, Clone)]
pub struct AccessRequest {
    principal: PrincipalRef,
}

impl AccessRequest {
    /// Request `actions` on the auth resource's user pool
    pub fn to<A, S>(self, actions: A) -> AccessDefinition
    where
        A: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AccessDefinition::new(self.principal, actions, [ResourceRef::UserPool])
    }

    /// Request `actions` on explicit resources
    pub fn to_resources<A, S>(self, actions: A, resources: impl IntoIterator<Item = ResourceRef>) -> AccessDefinition
    where
        A: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AccessDefinition::new(self.principal, actions, resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_targets_user_pool() {
        let token = ResourceToken::new("function:add-user-to-group").unwrap();
        let def = AuthAccessBuilder::new().resource(token.clone()).to(["addUserToGroup"]);

        assert_eq!(def.principal, PrincipalRef::resource(token));
        assert!(def.actions.contains("addUserToGroup"));
        assert_eq!(def.resources.iter().collect::<Vec<_>>(), vec![&ResourceRef::UserPool]);
    }

    #[test]
    fn test_principal_display() {
        let token = ResourceToken::new("AuthResources").unwrap();
        assert_eq!(PrincipalRef::resource(token.clone()).to_string(), "AuthResources");
        assert_eq!(
            PrincipalRef::role(token, "authenticatedUserIamRole").to_string(),
            "AuthResources#authenticatedUserIamRole"
        );
    }
}
