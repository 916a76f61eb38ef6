//! Resource tokens and resource groups
//!
//! A [`ResourceToken`] is the identity under which the construct container
//! memoizes an instance. Tokens are validated once at creation and never
//! change afterwards.

use crate::core::error::Result;
use crate::core::validation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, validated identifier of a buildable resource
///
/// Two forms are accepted:
/// - a PascalCase provider name, e.g. `AuthResources`
/// - a group-qualified kebab-case name, e.g. `function:add-user-to-group`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceToken(String);

impl ResourceToken {
    /// Create a new validated token
    ///
    /// # Examples
    ///
    /// ```
    /// use backend_compose::ResourceToken;
    ///
    /// assert!(ResourceToken::new("AuthResources").is_ok());
    /// assert!(ResourceToken::new("function:add-user-to-group").is_ok());
    /// assert!(ResourceToken::new("function:Bad Name").is_err());
    /// ```
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        validation::validate_token(&token)?;
        Ok(ResourceToken(token))
    }

    /// Token for a resource inside a group, e.g. `function:<name>`
    pub fn scoped(group: &ResourceGroup, name: &str) -> Result<Self> {
        Self::new(format!("{}:{}", group.as_str(), name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ResourceToken {
    type Error = crate::core::error::CompositionError;

    fn try_from(value: String) -> Result<Self> {
        ResourceToken::new(value)
    }
}

impl From<ResourceToken> for String {
    fn from(token: ResourceToken) -> Self {
        token.0
    }
}

impl AsRef<str> for ResourceToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of the group a generated resource belongs to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceGroup(String);

impl ResourceGroup {
    pub const AUTH: &'static str = "auth";
    pub const FUNCTION: &'static str = "function";
    pub const DATA: &'static str = "data";
    pub const STORAGE: &'static str = "storage";

    pub fn new(name: impl Into<String>) -> Self {
        ResourceGroup(name.into())
    }

    pub fn auth() -> Self {
        Self::new(Self::AUTH)
    }

    pub fn function() -> Self {
        Self::new(Self::FUNCTION)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_token() {
        let token = ResourceToken::scoped(&ResourceGroup::function(), "list-groups-for-user").unwrap();
        assert_eq!(token.as_str(), "function:list-groups-for-user");
    }

    #[test]
    fn test_token_serde() {
        let token: ResourceToken = serde_json::from_str("\"AuthResources\"").unwrap();
        assert_eq!(token.as_str(), "AuthResources");
        assert!(serde_json::from_str::<ResourceToken>("\"not a token\"").is_err());
    }
}
