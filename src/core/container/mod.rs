//! Memoizing construct container
//!
//! The container is the single place where resource instances are created.
//! It guarantees:
//! - At most one successful build per [`ResourceToken`] for the lifetime of
//!   the backend definition
//! - Concurrent requests for an in-flight token wait for that build
//! - Failed builds are not cached; the next request retries
//! - Re-entrant or cross-thread cyclic resolution fails with the token chain
//!
//! All shared state (instances, in-flight builds, registries and singleton
//! claims) sits behind one mutex. Generators always run with the lock
//! released so they can resolve their own dependencies.

mod generator;

pub use generator::{
    downcast_instance, ConstructContainerEntryGenerator, ConstructFactory, ResourceInstance,
    ResourceSnapshot, RoleSnapshot,
};

use crate::core::context::BackendContext;
use crate::core::declaration::DeclarationSite;
use crate::core::error::{CompositionError, Result};
use crate::core::guard::SingletonGuard;
use crate::core::token::ResourceToken;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, info, warn};

/// Token-keyed, build-once resource cache
pub struct ConstructContainer {
    state: Mutex<ContainerState>,
    ready: Condvar,
}

#[derive(Default)]
struct ContainerState {
    instances: HashMap<ResourceToken, Arc<dyn ResourceInstance>>,
    build_counts: HashMap<ResourceToken, usize>,

    /// Token -> thread currently running its generator
    in_flight: HashMap<ResourceToken, ThreadId>,
    /// Per-thread stack of tokens being built
    stacks: HashMap<ThreadId, Vec<ResourceToken>>,
    /// Thread -> token it is blocked on
    waiting: HashMap<ThreadId, ResourceToken>,

    generators: HashMap<ResourceToken, Arc<dyn ConstructContainerEntryGenerator>>,
    factories: Vec<Arc<dyn ConstructFactory>>,
    factory_index: HashMap<String, usize>,

    singletons: SingletonGuard,
}

impl ContainerState {
    /// Chain for a thread re-entering a token it is already building
    fn reentry_chain(&self, thread: ThreadId, token: &ResourceToken) -> Vec<ResourceToken> {
        let stack = self.stacks.get(&thread).map(Vec::as_slice).unwrap_or(&[]);
        let start = stack.iter().position(|t| t == token).unwrap_or(0);
        let mut chain = stack[start..].to_vec();
        chain.push(token.clone());
        chain
    }

    /// Token and alias of `factory`, if none of them is taken yet
    fn free_factory_names(&self, factory: &dyn ConstructFactory) -> Result<Vec<String>> {
        let token = factory.token();
        let mut names = vec![token.as_str().to_string()];
        if let Some(alias) = factory.provides() {
            names.push(alias.to_string());
        }
        if self.generators.contains_key(token) || names.iter().any(|n| self.factory_index.contains_key(n)) {
            return Err(CompositionError::DuplicateToken(token.clone()));
        }
        Ok(names)
    }

    fn insert_factory(&mut self, factory: Arc<dyn ConstructFactory>, names: Vec<String>) {
        let index = self.factories.len();
        debug!("Registered factory for {}", factory.token());
        self.factories.push(factory);
        for name in names {
            self.factory_index.insert(name, index);
        }
    }

    /// Follow the wait-for graph from `token`; `Some(chain)` if it leads back to `thread`
    fn wait_cycle(&self, thread: ThreadId, token: &ResourceToken) -> Option<Vec<ResourceToken>> {
        let mut path = vec![token.clone()];
        let mut visited = HashSet::new();
        let mut current = token.clone();

        loop {
            let owner = *self.in_flight.get(&current)?;
            if owner == thread {
                let mut chain = vec![current];
                chain.extend(path);
                return Some(chain);
            }
            if !visited.insert(owner) {
                return None;
            }
            current = self.waiting.get(&owner)?.clone();
            path.push(current.clone());
        }
    }
}

/// Releases the in-flight marker of a build, also on unwind
struct BuildGuard<'a> {
    container: &'a ConstructContainer,
    token: ResourceToken,
    thread: ThreadId,
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.container.state.lock();
        state.in_flight.remove(&self.token);
        let empty = match state.stacks.get_mut(&self.thread) {
            Some(stack) => {
                stack.pop();
                stack.is_empty()
            }
            None => false,
        };
        if empty {
            state.stacks.remove(&self.thread);
        }
        drop(state);
        self.container.ready.notify_all();
    }
}

impl ConstructContainer {
    pub fn new() -> Self {
        ConstructContainer {
            state: Mutex::new(ContainerState::default()),
            ready: Condvar::new(),
        }
    }

    /// Return the instance for the generator's token, building it on first demand
    ///
    /// # Errors
    ///
    /// - `CyclicDependency` if the token is already being built further up
    ///   this thread's resolution stack, or if waiting for it would close a
    ///   wait-for cycle between threads
    /// - Any error returned by the generator, unchanged
    pub fn get_or_compute(
        &self,
        generator: &dyn ConstructContainerEntryGenerator,
        ctx: &BackendContext,
    ) -> Result<Arc<dyn ResourceInstance>> {
        let token = generator.token().clone();
        let me = thread::current().id();

        let mut state = self.state.lock();
        loop {
            if let Some(instance) = state.instances.get(&token) {
                debug!("Container hit for {}", token);
                return Ok(instance.clone());
            }

            match state.in_flight.get(&token).copied() {
                None => break,
                Some(owner) if owner == me => {
                    let chain = state.reentry_chain(me, &token);
                    return Err(CompositionError::CyclicDependency { chain });
                }
                Some(_) => {
                    if let Some(chain) = state.wait_cycle(me, &token) {
                        return Err(CompositionError::CyclicDependency { chain });
                    }
                    debug!("Waiting for in-flight build of {}", token);
                    state.waiting.insert(me, token.clone());
                    self.ready.wait(&mut state);
                    state.waiting.remove(&me);
                }
            }
        }

        state.in_flight.insert(token.clone(), me);
        state.stacks.entry(me).or_default().push(token.clone());
        drop(state);

        let guard = BuildGuard {
            container: self,
            token: token.clone(),
            thread: me,
        };

        debug!(
            "Building {} (group {})",
            token,
            generator.resource_group()
        );
        let result = generator.generate_container_entry(ctx);

        match result {
            Ok(instance) => {
                let mut state = self.state.lock();
                state.instances.insert(token.clone(), instance.clone());
                *state.build_counts.entry(token.clone()).or_insert(0) += 1;
                drop(state);
                drop(guard);
                info!("Built {}", token);
                Ok(instance)
            }
            Err(err) => {
                drop(guard);
                warn!("Build of {} failed: {}", token, err);
                Err(err)
            }
        }
    }

    /// Register a generator that can later be resolved by token
    ///
    /// `token` must be the generator's own token, since builds are cached
    /// under [`ConstructContainerEntryGenerator::token`].
    pub fn register_generator(
        &self,
        token: ResourceToken,
        generator: Arc<dyn ConstructContainerEntryGenerator>,
    ) -> Result<()> {
        if generator.token() != &token {
            return Err(CompositionError::InvalidToken(format!(
                "generator for {} is registered as {}",
                generator.token(),
                token
            )));
        }

        let mut state = self.state.lock();
        if state.generators.contains_key(&token) || state.factory_index.contains_key(token.as_str()) {
            return Err(CompositionError::DuplicateToken(token));
        }
        debug!("Registered generator for {}", token);
        state.generators.insert(token, generator);
        Ok(())
    }

    /// Register a declared factory under its token and `provides` alias
    pub fn register_construct_factory(&self, factory: Arc<dyn ConstructFactory>) -> Result<()> {
        let mut state = self.state.lock();
        let names = state.free_factory_names(factory.as_ref())?;
        state.insert_factory(factory, names);
        Ok(())
    }

    /// Claim the singleton slot for `kind` and register `factory` together
    ///
    /// Either both happen or neither does.
    pub fn register_singleton_factory(
        &self,
        kind: &str,
        site: DeclarationSite,
        factory: Arc<dyn ConstructFactory>,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.singletons.ensure_unclaimed(kind, &site)?;
        let names = state.free_factory_names(factory.as_ref())?;
        state.singletons.claim(kind, site)?;
        state.insert_factory(factory, names);
        Ok(())
    }

    /// Look up a factory by token or by its `provides` alias
    pub fn get_construct_factory(&self, name: &str) -> Option<Arc<dyn ConstructFactory>> {
        let state = self.state.lock();
        state
            .factory_index
            .get(name)
            .map(|&i| state.factories[i].clone())
    }

    /// Registered factories in declaration order
    pub fn factories(&self) -> Vec<Arc<dyn ConstructFactory>> {
        self.state.lock().factories.clone()
    }

    /// Resolve a token through the cache, its factory, or its registered generator
    pub fn resolve(&self, token: &ResourceToken, ctx: &BackendContext) -> Result<Arc<dyn ResourceInstance>> {
        if let Some(instance) = self.get(token) {
            return Ok(instance);
        }

        if let Some(factory) = self.get_construct_factory(token.as_str()) {
            return factory.get_instance(ctx);
        }

        let generator = self.state.lock().generators.get(token).cloned();
        match generator {
            Some(generator) => self.get_or_compute(generator.as_ref(), ctx),
            None => Err(CompositionError::UnknownResource(token.clone())),
        }
    }

    /// Peek at a built instance without building
    pub fn get(&self, token: &ResourceToken) -> Option<Arc<dyn ResourceInstance>> {
        self.state.lock().instances.get(token).cloned()
    }

    /// Number of successful builds of `token` (0 or 1)
    pub fn build_count(&self, token: &ResourceToken) -> usize {
        self.state
            .lock()
            .build_counts
            .get(token)
            .copied()
            .unwrap_or(0)
    }

    /// Claim the singleton slot for `kind` in this definition
    pub fn claim_singleton(&self, kind: &str, site: DeclarationSite) -> Result<()> {
        self.state.lock().singletons.claim(kind, site)
    }

    pub fn singleton_count(&self, kind: &str) -> usize {
        self.state.lock().singletons.count(kind)
    }

    /// Number of built instances
    pub fn len(&self) -> usize {
        self.state.lock().instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().instances.is_empty()
    }
}

impl Default for ConstructContainer {
    fn default() -> Self {
        Self::new()
    }
}
