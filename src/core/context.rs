//! Per-definition build context
//!
//! Everything one backend definition shares (container, construct tree,
//! singleton claims) hangs off a [`BackendContext`]. Independent contexts
//! never interfere, which keeps parallel tests isolated.

use crate::core::container::ConstructContainer;
use crate::core::construct::ConstructTree;
use crate::core::declaration::{DeclarationSite, DeclarationVerifier};
use crate::core::error::Result;
use crate::core::iam::EnvironmentEntry;

/// Build context passed to every factory and generator
pub struct BackendContext {
    backend_id: String,
    container: ConstructContainer,
    tree: ConstructTree,
    verifier: Option<DeclarationVerifier>,
}

impl BackendContext {
    pub fn new(backend_id: impl Into<String>) -> Self {
        let backend_id = backend_id.into();
        BackendContext {
            tree: ConstructTree::new(backend_id.clone()),
            backend_id,
            container: ConstructContainer::new(),
            verifier: None,
        }
    }

    /// Require conventional declaration files for resources that check them
    pub fn with_declaration_verifier(mut self) -> Self {
        self.verifier = Some(DeclarationVerifier::new());
        self
    }

    pub fn backend_id(&self) -> &str {
        &self.backend_id
    }

    pub fn container(&self) -> &ConstructContainer {
        &self.container
    }

    pub fn construct_tree(&self) -> &ConstructTree {
        &self.tree
    }

    pub fn declaration_verifier(&self) -> Option<&DeclarationVerifier> {
        self.verifier.as_ref()
    }

    /// Claim the single slot of a singleton resource kind
    pub fn claim_singleton(&self, kind: &str, site: DeclarationSite) -> Result<()> {
        self.container.claim_singleton(kind, site)
    }

    /// Environment entries a grant exposes to the receiving principal
    pub fn generate_environment_entries<'a, I>(&self, entries: I) -> Vec<EnvironmentEntry>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        entries
            .into_iter()
            .map(|(name, value)| EnvironmentEntry::new(name, value))
            .collect()
    }
}
