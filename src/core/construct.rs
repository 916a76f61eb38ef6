//! Construct tree handed to the provisioning emitter
//!
//! Generators place their resources under a path in this tree. Construct
//! ids are unique per parent, and every node gets a stable logical id
//! derived from its path.

use crate::core::error::{CompositionError, Result};
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Tag carrying the user-facing name of a resource
pub const FRIENDLY_NAME_TAG: &str = "amplify:friendly-name";

/// Metadata recorded for one construct
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstructNode {
    pub path: String,
    pub kind: String,
    pub logical_id: String,
    pub tags: BTreeMap<String, String>,
}

/// Thread-safe construct tree
#[derive(Debug)]
pub struct ConstructTree {
    root: String,
    nodes: Mutex<BTreeMap<String, ConstructNode>>,
}

impl ConstructTree {
    pub fn new(root: impl Into<String>) -> Self {
        ConstructTree {
            root: root.into(),
            nodes: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Add a construct `id` under `parent` (the root when `None`)
    ///
    /// Returns the full path of the new construct.
    pub fn add(&self, parent: Option<&str>, id: &str, kind: &str) -> Result<String> {
        let parent = parent.unwrap_or(&self.root);
        let path = format!("{}/{}", parent, id);

        let mut nodes = self.nodes.lock();
        if nodes.contains_key(&path) {
            return Err(CompositionError::DuplicateConstructId {
                scope: parent.to_string(),
                id: id.to_string(),
            });
        }

        let node = ConstructNode {
            logical_id: logical_id(&path),
            path: path.clone(),
            kind: kind.to_string(),
            tags: BTreeMap::new(),
        };
        nodes.insert(path.clone(), node);
        Ok(path)
    }

    /// Tag a construct and all constructs below it
    pub fn tag(&self, path: &str, key: &str, value: &str) {
        let prefix = format!("{}/", path);
        let mut nodes = self.nodes.lock();
        for (node_path, node) in nodes.iter_mut() {
            if node_path == path || node_path.starts_with(&prefix) {
                node.tags.insert(key.to_string(), value.to_string());
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<ConstructNode> {
        self.nodes.lock().get(path).cloned()
    }

    /// Snapshot of every node, ordered by path
    pub fn nodes(&self) -> Vec<ConstructNode> {
        self.nodes.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.lock().is_empty()
    }
}

/// Stable logical id: alphanumeric path components plus an 8-char hash suffix
pub fn logical_id(path: &str) -> String {
    let human: String = path
        .split('/')
        .flat_map(|part| part.chars().filter(|c| c.is_ascii_alphanumeric()))
        .collect();

    let digest = Sha256::digest(path.as_bytes());
    let suffix: String = digest[..4].iter().map(|b| format!("{:02X}", b)).collect();

    format!("{}{}", human, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_id_rejected() {
        let tree = ConstructTree::new("backend");
        tree.add(None, "amplifyAuth", "auth").unwrap();
        let err = tree.add(None, "amplifyAuth", "auth").unwrap_err();
        assert!(matches!(err, CompositionError::DuplicateConstructId { .. }));
    }

    #[test]
    fn test_tags_apply_to_children() {
        let tree = ConstructTree::new("backend");
        let auth = tree.add(None, "amplifyAuth", "auth").unwrap();
        let pool = tree.add(Some(&auth), "UserPool", "user-pool").unwrap();
        let other = tree.add(None, "amplifyAuthOther", "auth").unwrap();

        tree.tag(&auth, FRIENDLY_NAME_TAG, "amplifyAuth");

        assert_eq!(tree.get(&pool).unwrap().tags[FRIENDLY_NAME_TAG], "amplifyAuth");
        assert!(tree.get(&other).unwrap().tags.is_empty());
    }

    #[test]
    fn test_logical_id_is_stable() {
        let a = logical_id("backend/amplifyAuth/UserPool");
        let b = logical_id("backend/amplifyAuth/UserPool");
        assert_eq!(a, b);
        assert!(a.starts_with("backendamplifyAuthUserPool"));
        assert_eq!(a.len(), "backendamplifyAuthUserPool".len() + 8);
        assert_ne!(a, logical_id("backend/amplifyAuth/UserPoolClient"));
    }
}
