//! Backend configuration file
//!
//! A backend can be declared in TOML instead of code:
//!
//! ```toml
//! backend_id = "sandbox"
//!
//! [auth]
//! user_pool_id = "us-east-1_AbC123"
//! identity_pool_id = "us-east-1:0000-1111"
//! user_pool_client_id = "client123"
//! auth_role_arn = "arn:aws:iam::123456789012:role/authRole"
//! unauth_role_arn = "arn:aws:iam::123456789012:role/unauthRole"
//!
//! [[auth.access]]
//! resource = "function:add-user-to-group"
//! actions = ["addUserToGroup"]
//!
//! [[function]]
//! name = "thermometer"
//! entry = "./thermometer.ts"
//!
//! [[admin_operation]]
//! operation = "list-groups-for-user"
//! ```
//!
//! Names and tokens are validated while parsing, so a loaded config only
//! fails later for cross-resource problems (unknown principals, cycles).

use crate::core::error::Result;
use crate::core::iam::{AccessDefinition, AuthAccessBuilder, AuthAccessGenerator};
use crate::core::resources::{AdminOperation, FunctionProps, ReferenceAuthProps};
use crate::core::token::ResourceToken;
use crate::core::validation::FunctionName;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

fn default_backend_id() -> String {
    "sandbox".to_string()
}

/// Declarative backend definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Root of the construct tree and prefix of generated role names
    #[serde(default = "default_backend_id")]
    pub backend_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,

    #[serde(default, rename = "function")]
    pub functions: Vec<FunctionProps>,

    #[serde(default, rename = "admin_operation")]
    pub admin_operations: Vec<AdminOperationConfig>,
}

/// `[auth]` section: reference props plus access grants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(flatten)]
    pub props: ReferenceAuthProps,

    #[serde(default)]
    pub access: Vec<AccessGrantConfig>,
}

/// One `[[auth.access]]` grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrantConfig {
    pub resource: ResourceToken,

    /// Role of `resource` to grant to; its default principal when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    pub actions: Vec<String>,
}

/// One `[[admin_operation]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminOperationConfig {
    pub operation: AdminOperation,

    /// Overrides the operation's default function name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<FunctionName>,
}

impl BackendConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: BackendConfig = toml::from_str(source)?;
        debug!(
            "Loaded backend config {} ({} functions, {} admin operations)",
            config.backend_id,
            config.functions.len(),
            config.admin_operations.len()
        );
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }
}

impl AuthConfig {
    /// Access callback replaying the configured grants
    pub fn access_generator(&self) -> Option<AuthAccessGenerator> {
        if self.access.is_empty() {
            return None;
        }

        let grants = self.access.clone();
        Some(Arc::new(move |allow: &AuthAccessBuilder| -> Vec<AccessDefinition> {
            grants
                .iter()
                .map(|grant| {
                    let request = match &grant.role {
                        Some(role) => allow.role(grant.resource.clone(), role.clone()),
                        None => allow.resource(grant.resource.clone()),
                    };
                    request.to(grant.actions.iter().cloned())
                })
                .collect()
        }))
    }
}
