//! Declaration-site metadata
//!
//! Factories record where they were declared so that conflicts can name
//! both declarations, and so that an optional verifier can require certain
//! resources to live in a conventional file.

use crate::core::error::{CompositionError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::Location;
use std::path::Path;

/// Source location of a resource declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationSite {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl DeclarationSite {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        DeclarationSite {
            file: file.into(),
            line,
            column,
        }
    }

    /// Capture the location of the caller
    ///
    /// Functions that declare resources are annotated with `#[track_caller]`
    /// so this resolves to the user's declaration, not to library code.
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        DeclarationSite::new(location.file(), location.line(), location.column())
    }
}

impl From<&Location<'_>> for DeclarationSite {
    fn from(location: &Location<'_>) -> Self {
        DeclarationSite::new(location.file(), location.line(), location.column())
    }
}

impl fmt::Display for DeclarationSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Verifies that declarations were made in an expected file
#[derive(Debug, Clone, Default)]
pub struct DeclarationVerifier;

impl DeclarationVerifier {
    pub fn new() -> Self {
        DeclarationVerifier
    }

    /// Check that `site` is a file whose extension-less path ends with `expected`
    ///
    /// # Examples
    ///
    /// ```
    /// use backend_compose::declaration::{DeclarationSite, DeclarationVerifier};
    ///
    /// let verifier = DeclarationVerifier::new();
    /// let site = DeclarationSite::new("project/amplify/auth/resource.rs", 3, 1);
    /// assert!(verifier.verify(&site, "amplify/auth/resource", "wrong file").is_ok());
    /// ```
    pub fn verify(&self, site: &DeclarationSite, expected: &str, message: &str) -> Result<()> {
        let declared = Path::new(&site.file).with_extension("");
        let declared: Vec<&str> = declared
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .collect();
        let expected: Vec<&str> = expected.split(['/', '\\']).filter(|s| !s.is_empty()).collect();

        if declared.len() >= expected.len() && declared[declared.len() - expected.len()..] == expected[..] {
            return Ok(());
        }

        Err(CompositionError::DeclarationLocation {
            message: message.to_string(),
            site: site.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_captures_this_file() {
        let site = DeclarationSite::caller();
        assert!(site.file.ends_with("declaration.rs"));
        assert!(site.line > 0);
    }

    #[test]
    fn test_verify_rejects_other_files() {
        let verifier = DeclarationVerifier::new();
        let site = DeclarationSite::new("amplify/data/resource.rs", 10, 5);
        let err = verifier
            .verify(&site, "amplify/auth/resource", "Auth must be defined in amplify/auth/resource")
            .unwrap_err();
        assert!(err.to_string().contains("amplify/data/resource.rs:10:5"));
    }

    #[test]
    fn test_verify_requires_whole_segments() {
        let verifier = DeclarationVerifier::new();
        let site = DeclarationSite::new("my-amplify/auth/resource.rs", 1, 1);
        assert!(verifier.verify(&site, "amplify/auth/resource", "msg").is_err());
    }
}
