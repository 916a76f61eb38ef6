//! # backend-compose - Resource Composition and Access Arbitration
//!
//! `backend-compose` turns a declarative backend definition (auth, functions,
//! admin operations) into a fully wired resource graph:
//!
//! - **Construct container**: every resource is built at most once, on first
//!   demand, even when many consumers and threads ask for it
//! - **Factories**: auth is a per-definition singleton; functions are a
//!   generic primitive extended through post-build hooks
//! - **Policy arbiter**: declarative access grants are merged per principal
//!   into deterministic, least-privilege inline policies
//! - **Handlers**: the runtime side of the admin operations
//!
//! ## Quick Start
//!
//! ```rust
//! use backend_compose::iam::AuthAccessBuilder;
//! use backend_compose::resources::{AdminOperation, ReferenceAuthProps};
//! use backend_compose::{Backend, ResourceToken, Result};
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<()> {
//! let backend = Backend::new("sandbox");
//!
//! let lister = ResourceToken::new("function:user-directory")?;
//! backend.reference_auth(
//!     ReferenceAuthProps {
//!         user_pool_id: "us-east-1_AbC123".into(),
//!         identity_pool_id: "us-east-1:0000-1111".into(),
//!         user_pool_client_id: "client123".into(),
//!         auth_role_arn: "arn:aws:iam::123456789012:role/authRole".into(),
//!         unauth_role_arn: "arn:aws:iam::123456789012:role/unauthRole".into(),
//!         groups: BTreeMap::new(),
//!     },
//!     Some(Arc::new(move |allow: &AuthAccessBuilder| {
//!         vec![allow.resource(lister.clone()).to(["listUsers"])]
//!     })),
//! )?;
//! backend.admin_operation(AdminOperation::AddUserToGroup, None)?;
//! backend.function(backend_compose::resources::FunctionProps::new(
//!     "user-directory",
//!     "./directory.ts",
//! )?)?;
//!
//! let graph = backend.synthesize()?;
//! let admin = &graph.resources["function:add-user-to-group"];
//! assert_eq!(admin.environment["AMPLIFY_AUTH_USERPOOL_ID"], "us-east-1_AbC123");
//! # Ok(())
//! # }
//! ```

pub mod core;

pub use crate::core::{
    backend, config, construct, container, context, declaration, error, guard, handlers, iam, resources, token,
    validation,
};

// Re-export the types most callers need
pub use crate::core::{
    backend::{Backend, ResolvedGraph},
    config::BackendConfig,
    container::{ConstructContainer, ConstructContainerEntryGenerator, ConstructFactory, ResourceInstance},
    context::BackendContext,
    declaration::DeclarationSite,
    error::{CompositionError, ErrorKind, Result},
    iam::{AccessDefinition, PolicyArbiter},
    token::{ResourceGroup, ResourceToken},
    validation::FunctionName,
};
