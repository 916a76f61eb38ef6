//! Principals and the access-acceptor capability
//!
//! A [`Role`] is the runtime identity that receives inline policies. A
//! resource that owns roles exposes them through
//! [`ResourceAccessAcceptorFactory`]; callers reach that capability via
//! `ResourceInstance::access_acceptor_factory`, which is `None` for
//! resources without a principal.

use super::{Policy, PolicyDocument};
use crate::core::error::Result;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Environment variable a policy grant injects into the principal's runtime
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct EnvironmentEntry {
    pub name: String,
    pub value: String,
}

impl EnvironmentEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        EnvironmentEntry {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Shared, mutable environment of a deployed resource
pub type SharedEnvironment = Arc<Mutex<BTreeMap<String, String>>>;

/// IAM role with inline policies keyed by policy name
#[derive(Debug)]
pub struct Role {
    name: String,
    arn: String,
    policies: Mutex<BTreeMap<String, PolicyDocument>>,
}

impl Role {
    pub fn new(name: impl Into<String>, arn: impl Into<String>) -> Self {
        Role {
            name: name.into(),
            arn: arn.into(),
            policies: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arn(&self) -> &str {
        &self.arn
    }

    /// Attach an inline policy; a policy with the same name is replaced
    ///
    /// Returns `true` if an existing policy was replaced.
    pub fn attach_inline_policy(&self, policy: Policy) -> bool {
        debug!("Attaching policy {} to role {}", policy.name, self.name);
        self.policies
            .lock()
            .insert(policy.name, policy.document)
            .is_some()
    }

    /// Snapshot of attached policies, ordered by name
    pub fn policies(&self) -> Vec<Policy> {
        self.policies
            .lock()
            .iter()
            .map(|(name, document)| Policy {
                name: name.clone(),
                document: document.clone(),
            })
            .collect()
    }

    pub fn policy(&self, name: &str) -> Option<PolicyDocument> {
        self.policies.lock().get(name).cloned()
    }
}

/// Receives policy attachments on behalf of one principal
pub trait ResourceAccessAcceptor: Send + Sync {
    /// Stable identifier, e.g. `authenticatedUserIamRoleResourceAccessAcceptor`
    fn identifier(&self) -> &str;

    /// Attach `policy` to the principal and expose `environment` to its runtime
    fn accept_resource_access(&self, policy: Policy, environment: &[EnvironmentEntry]) -> Result<()>;
}

/// Capability of a resource instance to route grants to its principals
pub trait ResourceAccessAcceptorFactory: Send + Sync {
    /// Acceptor for `role_identifier`, or for the default principal when `None`
    ///
    /// Unknown identifiers are a configuration error.
    fn get_resource_access_acceptor(
        &self,
        role_identifier: Option<&str>,
    ) -> Result<Arc<dyn ResourceAccessAcceptor>>;
}

/// Acceptor that attaches to a role and optionally merges environment entries
pub struct RoleAccessAcceptor {
    identifier: String,
    role: Arc<Role>,
    environment: Option<SharedEnvironment>,
}

impl RoleAccessAcceptor {
    pub fn new(identifier: impl Into<String>, role: Arc<Role>) -> Self {
        RoleAccessAcceptor {
            identifier: identifier.into(),
            role,
            environment: None,
        }
    }

    pub fn with_environment(mut self, environment: SharedEnvironment) -> Self {
        self.environment = Some(environment);
        self
    }
}

impl ResourceAccessAcceptor for RoleAccessAcceptor {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn accept_resource_access(&self, policy: Policy, environment: &[EnvironmentEntry]) -> Result<()> {
        self.role.attach_inline_policy(policy);
        if let Some(env) = &self.environment {
            let mut env = env.lock();
            for entry in environment {
                env.insert(entry.name.clone(), entry.value.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::iam::Statement;

    #[test]
    fn test_attach_replaces_same_name() {
        let role = Role::new("fnRole", "arn:aws:iam::123456789012:role/fnRole");
        let first = Policy::new("admin", vec![Statement::allow(["cognito-idp:ListUsers"], ["arn:pool"])]);
        let second = Policy::new(
            "admin",
            vec![Statement::allow(["cognito-idp:AdminAddUserToGroup"], ["arn:pool"])],
        );

        assert!(!role.attach_inline_policy(first));
        assert!(role.attach_inline_policy(second));
        assert_eq!(role.policies().len(), 1);
        let admin = role.policy("admin").unwrap();
        assert_eq!(admin.statement[0].action, vec!["cognito-idp:AdminAddUserToGroup"]);
    }

    #[test]
    fn test_acceptor_merges_environment() {
        let role = Arc::new(Role::new("fnRole", "arn:aws:iam::123456789012:role/fnRole"));
        let env: SharedEnvironment = Arc::new(Mutex::new(BTreeMap::new()));
        let acceptor = RoleAccessAcceptor::new("fnRoleAcceptor", role.clone()).with_environment(env.clone());

        acceptor
            .accept_resource_access(
                Policy::new("p", vec![Statement::allow(["s3:GetObject"], ["*"])]),
                &[EnvironmentEntry::new("amplifyAuth_USERPOOL_ID", "us-east-1_abc")],
            )
            .unwrap();

        assert_eq!(acceptor.identifier(), "fnRoleAcceptor");
        assert_eq!(env.lock()["amplifyAuth_USERPOOL_ID"], "us-east-1_abc");
        assert_eq!(role.policies().len(), 1);
    }
}
