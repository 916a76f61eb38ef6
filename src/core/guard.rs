//! Cardinality guard for singleton resource kinds
//!
//! The guard is owned by one backend definition (inside its container), so
//! independent definitions never see each other's claims.

use crate::core::declaration::DeclarationSite;
use crate::core::error::{CompositionError, Result};
use std::collections::HashMap;

/// Counts declarations of singleton resource kinds
#[derive(Debug, Default)]
pub struct SingletonGuard {
    claims: HashMap<String, Claim>,
}

#[derive(Debug)]
struct Claim {
    count: usize,
    first: DeclarationSite,
}

impl SingletonGuard {
    pub fn new() -> Self {
        SingletonGuard {
            claims: HashMap::new(),
        }
    }

    /// Claim the single slot for `kind`
    ///
    /// Fails if `kind` was already claimed; the failed attempt is not counted.
    pub fn claim(&mut self, kind: &str, site: DeclarationSite) -> Result<()> {
        self.ensure_unclaimed(kind, &site)?;
        self.claims
            .insert(kind.to_string(), Claim { count: 1, first: site });
        Ok(())
    }

    /// Fail the way [`SingletonGuard::claim`] would, without claiming
    pub fn ensure_unclaimed(&self, kind: &str, site: &DeclarationSite) -> Result<()> {
        match self.claims.get(kind) {
            Some(existing) => Err(CompositionError::MultipleSingletonResources {
                kind: kind.to_string(),
                first: existing.first.clone(),
                conflicting: site.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Number of successful claims for `kind` (0 or 1)
    pub fn count(&self, kind: &str) -> usize {
        self.claims.get(kind).map_or(0, |c| c.count)
    }

    pub fn reset(&mut self) {
        self.claims.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_claim_fails() {
        let mut guard = SingletonGuard::new();
        guard.claim("referenceAuth", DeclarationSite::new("a.rs", 1, 1)).unwrap();

        let err = guard
            .claim("referenceAuth", DeclarationSite::new("b.rs", 2, 1))
            .unwrap_err();
        match err {
            CompositionError::MultipleSingletonResources { first, conflicting, .. } => {
                assert_eq!(first.file, "a.rs");
                assert_eq!(conflicting.file, "b.rs");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(guard.count("referenceAuth"), 1);
    }

    #[test]
    fn test_kinds_are_independent() {
        let mut guard = SingletonGuard::new();
        guard.claim("referenceAuth", DeclarationSite::caller()).unwrap();
        guard.claim("defineData", DeclarationSite::caller()).unwrap();
        assert_eq!(guard.count("defineStorage"), 0);
    }

    #[test]
    fn test_reset() {
        let mut guard = SingletonGuard::new();
        guard.claim("referenceAuth", DeclarationSite::caller()).unwrap();
        guard.reset();
        assert!(guard.claim("referenceAuth", DeclarationSite::caller()).is_ok());
    }
}
