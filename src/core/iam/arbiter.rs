//! Access-policy arbitration
//!
//! Turns a list of [`AccessDefinition`]s into one inline policy per
//! principal:
//! - definitions are grouped by principal, actions merged per resource
//! - resources with identical action sets share a statement
//! - every principal is resolved before anything is attached, so an
//!   unroutable principal leaves no partial grants behind
//! - a principal whose definitions grant nothing is still resolved, but
//!   receives no policy
//!
//! Merging goes through ordered maps, so the attached policies do not
//! depend on the order of the input list. Policies are attached under a
//! stable name, so arbitrating the same input twice replaces rather than
//! duplicates.

use super::{AccessDefinition, EnvironmentEntry, Policy, PrincipalRef, ResourceAccessAcceptor, ResourceRef, Statement};
use crate::core::context::BackendContext;
use crate::core::error::{CompositionError, Result};
use crate::core::validation;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Translates symbolic access into concrete policy content
pub trait AccessPolicyFactory: Send + Sync {
    /// Concrete ARN of a symbolic resource
    fn resource_arn(&self, resource: &ResourceRef) -> Result<String>;

    /// Provider actions granted for one declared action
    fn provider_actions(&self, principal: &PrincipalRef, action: &str) -> Result<Vec<String>>;

    /// Name of the inline policy attached to `principal`
    fn policy_name(&self, principal: &PrincipalRef) -> String;
}

/// A policy the arbiter attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub principal: PrincipalRef,
    pub acceptor: String,
    pub policy: Policy,
}

/// Merges access definitions and attaches the result to principals
#[derive(Debug, Default, Clone)]
pub struct PolicyArbiter {
    environment: Vec<EnvironmentEntry>,
}

type MergedAccess = BTreeMap<PrincipalRef, BTreeMap<String, BTreeSet<String>>>;

impl PolicyArbiter {
    pub fn new() -> Self {
        PolicyArbiter {
            environment: Vec::new(),
        }
    }

    /// Environment entries passed to every acceptor along with its policy
    pub fn with_environment(mut self, environment: Vec<EnvironmentEntry>) -> Self {
        self.environment = environment;
        self
    }

    /// Merge `definitions`, resolve their principals and attach one policy each
    pub fn arbitrate_policies(
        &self,
        definitions: Vec<AccessDefinition>,
        ctx: &BackendContext,
        policy_factory: &dyn AccessPolicyFactory,
    ) -> Result<Vec<Attachment>> {
        let merged = Self::merge(definitions, policy_factory)?;

        let mut routed: Vec<(PrincipalRef, Arc<dyn ResourceAccessAcceptor>, Vec<Statement>)> =
            Vec::with_capacity(merged.len());
        for (principal, access) in merged {
            let acceptor = Self::resolve_acceptor(&principal, ctx)?;
            routed.push((principal, acceptor, Self::statements(access)));
        }

        let mut attachments = Vec::with_capacity(routed.len());
        for (principal, acceptor, statements) in routed {
            if statements.is_empty() {
                debug!("Nothing to attach for {}", principal);
                continue;
            }
            let policy = Policy::new(policy_factory.policy_name(&principal), statements);
            debug!(
                "Attaching {} ({} statements) via {}",
                policy.name,
                policy.document.statement.len(),
                acceptor.identifier()
            );
            acceptor.accept_resource_access(policy.clone(), &self.environment)?;
            attachments.push(Attachment {
                principal,
                acceptor: acceptor.identifier().to_string(),
                policy,
            });
        }

        info!("Arbitrated access for {} principals", attachments.len());
        Ok(attachments)
    }

    /// Group by principal, then by concrete resource ARN
    ///
    /// Principals stay in the map even when every entry of theirs is empty.
    fn merge(
        definitions: Vec<AccessDefinition>,
        policy_factory: &dyn AccessPolicyFactory,
    ) -> Result<MergedAccess> {
        let mut merged: MergedAccess = BTreeMap::new();

        for definition in definitions {
            let mut actions = BTreeSet::new();
            for action in &definition.actions {
                for provider_action in policy_factory.provider_actions(&definition.principal, action)? {
                    validation::validate_action(&provider_action)?;
                    actions.insert(provider_action);
                }
            }

            let per_resource = merged.entry(definition.principal).or_default();
            for resource in &definition.resources {
                let arn = policy_factory.resource_arn(resource)?;
                per_resource
                    .entry(arn)
                    .or_default()
                    .extend(actions.iter().cloned());
            }
        }

        for access in merged.values_mut() {
            access.retain(|_, actions| !actions.is_empty());
        }
        Ok(merged)
    }

    /// One statement per distinct action set, covering every ARN that shares it
    fn statements(access: BTreeMap<String, BTreeSet<String>>) -> Vec<Statement> {
        let mut by_actions: BTreeMap<BTreeSet<String>, BTreeSet<String>> = BTreeMap::new();
        for (arn, actions) in access {
            by_actions.entry(actions).or_default().insert(arn);
        }

        by_actions
            .into_iter()
            .map(|(actions, arns)| Statement::allow(actions, arns))
            .collect()
    }

    fn resolve_acceptor(
        principal: &PrincipalRef,
        ctx: &BackendContext,
    ) -> Result<Arc<dyn ResourceAccessAcceptor>> {
        let instance = ctx.container().resolve(&principal.token, ctx)?;
        let factory = instance
            .access_acceptor_factory()
            .ok_or_else(|| CompositionError::NotAnAccessAcceptor {
                token: principal.token.clone(),
            })?;
        factory.get_resource_access_acceptor(principal.role.as_deref())
    }
}
