//! Identity and Access Management (IAM) for backend resources
//!
//! Provides least-privilege grants between resources with:
//! - AWS-style JSON policy documents
//! - Declarative access definitions built by user callbacks
//! - Arbitration of definitions into one inline policy per principal

mod access;
mod arbiter;
mod policy;
mod principal;

pub use access::{AccessDefinition, AccessRequest, AuthAccessBuilder, AuthAccessGenerator, PrincipalRef, ResourceRef};
pub use arbiter::{AccessPolicyFactory, Attachment, PolicyArbiter};
pub use policy::{Effect, Policy, PolicyDocument, Statement, POLICY_VERSION};
pub use principal::{
    EnvironmentEntry, ResourceAccessAcceptor, ResourceAccessAcceptorFactory, Role, RoleAccessAcceptor,
    SharedEnvironment,
};
