//! Generic function resource
//!
//! A [`FunctionFactory`] builds one function with its own execution role.
//! Extra behavior (such as admin grants) is composed in through
//! [`PostBuildHook`]s, which run inside the generator after the function
//! exists and before it is published to the container.

use crate::core::container::{
    downcast_instance, ConstructContainerEntryGenerator, ConstructFactory, ResourceInstance, ResourceSnapshot,
};
use crate::core::context::BackendContext;
use crate::core::declaration::DeclarationSite;
use crate::core::error::{CompositionError, Result};
use crate::core::iam::{ResourceAccessAcceptor, ResourceAccessAcceptorFactory, Role, RoleAccessAcceptor, SharedEnvironment};
use crate::core::token::{ResourceGroup, ResourceToken};
use crate::core::validation::FunctionName;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Role identifier of a function's execution role
pub const EXECUTION_ROLE: &str = "executionRole";

const MAX_TIMEOUT_SECONDS: u32 = 900;
const MIN_MEMORY_MB: u32 = 128;
const MAX_MEMORY_MB: u32 = 10240;

/// Function runtime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Runtime {
    Nodejs18,
    #[default]
    Nodejs20,
    Nodejs22,
}

impl Runtime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Runtime::Nodejs18 => "nodejs18.x",
            Runtime::Nodejs20 => "nodejs20.x",
            Runtime::Nodejs22 => "nodejs22.x",
        }
    }
}

fn default_timeout() -> u32 {
    3
}

fn default_memory() -> u32 {
    512
}

/// Declared function properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionProps {
    pub name: FunctionName,

    /// Handler entry file
    pub entry: String,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,

    #[serde(default = "default_memory")]
    pub memory_mb: u32,

    #[serde(default)]
    pub runtime: Runtime,

    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

impl FunctionProps {
    pub fn new(name: &str, entry: impl Into<String>) -> Result<Self> {
        Ok(FunctionProps {
            name: FunctionName::new(name)?,
            entry: entry.into(),
            timeout_seconds: default_timeout(),
            memory_mb: default_memory(),
            runtime: Runtime::default(),
            environment: BTreeMap::new(),
        })
    }

    pub fn timeout(mut self, seconds: u32) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn memory(mut self, megabytes: u32) -> Self {
        self.memory_mb = megabytes;
        self
    }

    /// Validate property ranges
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.entry.is_empty() {
            return Err("entry cannot be empty".to_string());
        }
        if self.timeout_seconds == 0 || self.timeout_seconds > MAX_TIMEOUT_SECONDS {
            return Err(format!(
                "timeout must be between 1 and {} seconds, got {}",
                MAX_TIMEOUT_SECONDS, self.timeout_seconds
            ));
        }
        if !(MIN_MEMORY_MB..=MAX_MEMORY_MB).contains(&self.memory_mb) {
            return Err(format!(
                "memory must be between {} and {} MB, got {}",
                MIN_MEMORY_MB, MAX_MEMORY_MB, self.memory_mb
            ));
        }
        Ok(())
    }
}

/// Extra build step run on a freshly created function
pub trait PostBuildHook: Send + Sync {
    fn after_build(&self, function: &BackendFunction, ctx: &BackendContext) -> Result<()>;
}

/// The function entry stored in the container
#[derive(Debug)]
pub struct BackendFunction {
    token: ResourceToken,
    construct_path: String,
    props: FunctionProps,
    role: Arc<Role>,
    environment: SharedEnvironment,
}

impl BackendFunction {
    pub fn name(&self) -> &str {
        self.props.name.as_str()
    }

    pub fn token(&self) -> &ResourceToken {
        &self.token
    }

    pub fn props(&self) -> &FunctionProps {
        &self.props
    }

    pub fn construct_path(&self) -> &str {
        &self.construct_path
    }

    /// Execution role of the function
    pub fn role(&self) -> &Arc<Role> {
        &self.role
    }

    pub fn set_environment(&self, name: &str, value: &str) {
        self.environment
            .lock()
            .insert(name.to_string(), value.to_string());
    }

    /// Snapshot of the runtime environment
    pub fn environment(&self) -> BTreeMap<String, String> {
        self.environment.lock().clone()
    }
}

impl ResourceAccessAcceptorFactory for BackendFunction {
    fn get_resource_access_acceptor(
        &self,
        role_identifier: Option<&str>,
    ) -> Result<Arc<dyn ResourceAccessAcceptor>> {
        match role_identifier {
            None | Some(EXECUTION_ROLE) => Ok(Arc::new(
                RoleAccessAcceptor::new(
                    format!("{}LambdaResourceAccessAcceptor", self.name()),
                    self.role.clone(),
                )
                .with_environment(self.environment.clone()),
            )),
            Some(other) => Err(CompositionError::InvalidResourceAccessConfig {
                token: self.token.clone(),
                role: other.to_string(),
            }),
        }
    }
}

impl ResourceInstance for BackendFunction {
    fn resource_group(&self) -> ResourceGroup {
        ResourceGroup::function()
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
        ResourceSnapshot::new(ResourceGroup::function(), &self.construct_path)
            .attribute("name", self.name())
            .attribute("entry", &self.props.entry)
            .attribute("runtime", self.props.runtime.as_str())
            .attribute("timeoutSeconds", self.props.timeout_seconds.to_string())
            .attribute("memoryMb", self.props.memory_mb.to_string())
            .role(EXECUTION_ROLE, &self.role)
            .environment(self.environment())
    }
}

/// Factory for one function resource
pub struct FunctionFactory {
    token: ResourceToken,
    props: FunctionProps,
    hooks: Vec<Arc<dyn PostBuildHook>>,
    site: DeclarationSite,
    generator: OnceLock<Arc<FunctionGenerator>>,
}

impl FunctionFactory {
    #[track_caller]
    pub fn new(props: FunctionProps) -> Result<Self> {
        Self::with_site(props, DeclarationSite::caller())
    }

    pub fn with_site(props: FunctionProps, site: DeclarationSite) -> Result<Self> {
        let token = ResourceToken::scoped(&ResourceGroup::function(), props.name.as_str())?;
        Ok(FunctionFactory {
            token,
            props,
            hooks: Vec::new(),
            site,
            generator: OnceLock::new(),
        })
    }

    /// Compose an extra build step into this function
    pub fn with_hook(mut self, hook: Arc<dyn PostBuildHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn props(&self) -> &FunctionProps {
        &self.props
    }

    pub fn declaration_site(&self) -> &DeclarationSite {
        &self.site
    }

    /// Typed variant of [`ConstructFactory::get_instance`]
    pub fn get_function(&self, ctx: &BackendContext) -> Result<Arc<BackendFunction>> {
        let instance = self.get_instance(ctx)?;
        downcast_instance(&self.token, instance)
    }
}

impl fmt::Debug for FunctionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionFactory")
            .field("token", &self.token)
            .field("hooks", &self.hooks.len())
            .field("site", &self.site)
            .finish()
    }
}

impl ConstructFactory for FunctionFactory {
    fn token(&self) -> &ResourceToken {
        &self.token
    }

    fn get_instance(&self, ctx: &BackendContext) -> Result<Arc<dyn ResourceInstance>> {
        let generator = self.generator.get_or_init(|| {
            Arc::new(FunctionGenerator {
                token: self.token.clone(),
                props: self.props.clone(),
                hooks: self.hooks.clone(),
            })
        });
        ctx.container().get_or_compute(generator.as_ref(), ctx)
    }
}

struct FunctionGenerator {
    token: ResourceToken,
    props: FunctionProps,
    hooks: Vec<Arc<dyn PostBuildHook>>,
}

impl ConstructContainerEntryGenerator for FunctionGenerator {
    fn resource_group(&self) -> ResourceGroup {
        ResourceGroup::function()
    }

    fn token(&self) -> &ResourceToken {
        &self.token
    }

    fn generate_container_entry(&self, ctx: &BackendContext) -> Result<Arc<dyn ResourceInstance>> {
        self.props
            .validate()
            .map_err(|reason| CompositionError::InvalidProps {
                token: self.token.clone(),
                reason,
            })?;

        let name = self.props.name.as_str();
        let tree = ctx.construct_tree();
        let role_name = format!("{}-{}-lambdaRole", ctx.backend_id(), name);
        let role = Role::new(
            role_name.clone(),
            format!("arn:${{AWS::Partition}}:iam::${{AWS::AccountId}}:role/{}", role_name),
        );

        let function = BackendFunction {
            token: self.token.clone(),
            construct_path: format!("{}/{}", tree.root(), name),
            environment: Arc::new(Mutex::new(self.props.environment.clone())),
            props: self.props.clone(),
            role: Arc::new(role),
        };

        for hook in &self.hooks {
            hook.after_build(&function, ctx)?;
        }
        debug!("Ran {} post-build hooks for {}", self.hooks.len(), self.token);

        let path = tree.add(None, name, "function")?;
        tree.add(Some(&path), &format!("{}-lambda", name), "lambda")?;
        tree.add(Some(&path), EXECUTION_ROLE, "role")?;

        info!("Function {} ready", path);
        Ok(Arc::new(function))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_props_validation() {
        let props = FunctionProps::new("thermometer", "./thermometer.ts").unwrap();
        assert!(props.validate().is_ok());
        assert!(props.clone().timeout(0).validate().is_err());
        assert!(props.clone().timeout(901).validate().is_err());
        assert!(props.clone().memory(64).validate().is_err());
        assert!(FunctionProps::new("Thermometer", "x").is_err());
    }

    #[test]
    fn test_build_creates_role_and_constructs() {
        let ctx = BackendContext::new("sandbox");
        let factory = FunctionFactory::new(FunctionProps::new("thermometer", "./thermometer.ts").unwrap()).unwrap();

        let function = factory.get_function(&ctx).unwrap();
        assert_eq!(function.token().as_str(), "function:thermometer");
        assert_eq!(function.role().name(), "sandbox-thermometer-lambdaRole");
        assert!(function.role().policies().is_empty());
        assert!(ctx.construct_tree().get("sandbox/thermometer/executionRole").is_some());
    }

    #[test]
    fn test_invalid_props_not_cached() {
        let ctx = BackendContext::new("sandbox");
        let factory = FunctionFactory::new(
            FunctionProps::new("slow", "./slow.ts").unwrap().timeout(1000),
        )
        .unwrap();

        let err = factory.get_instance(&ctx).unwrap_err();
        assert!(matches!(err, CompositionError::InvalidProps { .. }));
        assert!(ctx.container().get(factory.token()).is_none());
        assert!(ctx.construct_tree().is_empty());
    }

    #[test]
    fn test_unknown_role_identifier() {
        let ctx = BackendContext::new("sandbox");
        let factory = FunctionFactory::new(FunctionProps::new("fn", "./fn.ts").unwrap()).unwrap();
        let function = factory.get_function(&ctx).unwrap();

        assert!(function.get_resource_access_acceptor(None).is_ok());
        assert!(function.get_resource_access_acceptor(Some(EXECUTION_ROLE)).is_ok());
        assert!(matches!(
            function.get_resource_access_acceptor(Some("authenticatedUserIamRole")),
            Err(CompositionError::InvalidResourceAccessConfig { .. })
        ));
    }
}
