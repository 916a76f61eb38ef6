//! Backend definition facade
//!
//! A [`Backend`] owns one [`BackendContext`]. Declaring a resource creates
//! its factory and registers it with the container; nothing is built until
//! [`Backend::synthesize`] (or a consumer) asks for an instance.

use crate::core::config::BackendConfig;
use crate::core::construct::ConstructNode;
use crate::core::container::{ConstructFactory, ResourceSnapshot};
use crate::core::context::BackendContext;
use crate::core::declaration::DeclarationSite;
use crate::core::error::Result;
use crate::core::iam::AuthAccessGenerator;
use crate::core::resources::{
    AdminOperation, FunctionFactory, FunctionProps, ReferenceAuthFactory, ReferenceAuthProps, REFERENCE_AUTH_KIND,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// One backend definition
pub struct Backend {
    ctx: BackendContext,
}

/// Everything the provisioning emitter needs from a synthesized backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedGraph {
    pub backend_id: String,
    /// Token -> resource
    pub resources: BTreeMap<String, ResourceSnapshot>,
    pub constructs: Vec<ConstructNode>,
}

impl ResolvedGraph {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Backend {
    pub fn new(backend_id: impl Into<String>) -> Self {
        Self::with_context(BackendContext::new(backend_id))
    }

    pub fn with_context(ctx: BackendContext) -> Self {
        Backend { ctx }
    }

    /// Build a backend from a loaded config
    ///
    /// Resources are declared in file order: auth, functions, admin operations.
    #[track_caller]
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let site = DeclarationSite::caller();
        let backend = Backend::new(config.backend_id.clone());

        if let Some(auth) = &config.auth {
            backend.reference_auth_at(auth.props.clone(), auth.access_generator(), site.clone())?;
        }
        for props in &config.functions {
            backend.add_factory(Arc::new(FunctionFactory::with_site(props.clone(), site.clone())?))?;
        }
        for admin in &config.admin_operations {
            let name = admin.name.as_ref().map(|n| n.as_str());
            backend.add_factory(Arc::new(admin.operation.function_at(name, site.clone())?))?;
        }

        Ok(backend)
    }

    pub fn context(&self) -> &BackendContext {
        &self.ctx
    }

    /// Declare the backend's reference auth
    ///
    /// # Errors
    ///
    /// `MultipleSingletonResources` when auth was already declared.
    #[track_caller]
    pub fn reference_auth(
        &self,
        props: ReferenceAuthProps,
        access: Option<AuthAccessGenerator>,
    ) -> Result<Arc<ReferenceAuthFactory>> {
        self.reference_auth_at(props, access, DeclarationSite::caller())
    }

    fn reference_auth_at(
        &self,
        props: ReferenceAuthProps,
        access: Option<AuthAccessGenerator>,
        site: DeclarationSite,
    ) -> Result<Arc<ReferenceAuthFactory>> {
        let mut factory = ReferenceAuthFactory::unclaimed(props, site.clone())?;
        if let Some(access) = access {
            factory = factory.with_access(access);
        }
        let factory = Arc::new(factory);
        self.ctx
            .container()
            .register_singleton_factory(REFERENCE_AUTH_KIND, site, factory.clone())?;
        debug!("Declared reference auth at {}", factory.declaration_site());
        Ok(factory)
    }

    #[track_caller]
    pub fn function(&self, props: FunctionProps) -> Result<Arc<FunctionFactory>> {
        let factory = Arc::new(FunctionFactory::new(props)?);
        self.add_factory(factory.clone())?;
        Ok(factory)
    }

    #[track_caller]
    pub fn admin_operation(&self, operation: AdminOperation, name: Option<&str>) -> Result<Arc<FunctionFactory>> {
        let factory = Arc::new(operation.function_at(name, DeclarationSite::caller())?);
        self.add_factory(factory.clone())?;
        Ok(factory)
    }

    /// Register any factory with this backend's container
    pub fn add_factory(&self, factory: Arc<dyn ConstructFactory>) -> Result<()> {
        self.ctx.container().register_construct_factory(factory)
    }

    /// Resolve every declared resource and collect the result
    ///
    /// Factories resolve in declaration order; each one pulls in its own
    /// dependencies through the container, so order only affects which
    /// build runs first, never the resulting graph. Snapshots are taken
    /// after every build since later builds may attach policies to
    /// earlier resources.
    pub fn synthesize(&self) -> Result<ResolvedGraph> {
        let factories = self.ctx.container().factories();
        let mut instances = Vec::with_capacity(factories.len());
        for factory in &factories {
            instances.push((factory.token().to_string(), factory.get_instance(&self.ctx)?));
        }

        let resources: BTreeMap<_, _> = instances
            .into_iter()
            .map(|(token, instance)| (token, instance.snapshot()))
            .collect();

        let graph = ResolvedGraph {
            backend_id: self.ctx.backend_id().to_string(),
            resources,
            constructs: self.ctx.construct_tree().nodes(),
        };
        info!(
            "Synthesized backend {} ({} resources, {} constructs)",
            graph.backend_id,
            graph.resources.len(),
            graph.constructs.len()
        );
        Ok(graph)
    }
}
