//! Validation for resource tokens, function names and provider actions
//!
//! Everything a backend definition names is validated once, when the value
//! is declared, so that later stages can treat names as trusted.

use crate::core::error::{CompositionError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pattern for resource tokens: `PascalCase` or `group:kebab-name`
const TOKEN_PATTERN: &str = r"^([A-Z][A-Za-z0-9]*|[a-z]+:[a-z0-9]([a-z0-9-]*[a-z0-9])?)$";

/// Pattern for provider actions, e.g. `cognito-idp:AdminAddUserToGroup` or `s3:Get*`
const ACTION_PATTERN: &str = r"^([a-z0-9-]+:[A-Za-z*]+|\*)$";

/// Validated function name (kebab-case identifier)
///
/// # Rules
/// - Lowercase letters (a-z), numbers (0-9), hyphens (-) only
/// - Must start and end with letter or number (not hyphen)
/// - No consecutive hyphens
/// - Length: 1-64 characters (function name limit)
///
/// # Examples
///
/// Valid names:
/// - "add-user-to-group"
/// - "thermometer"
///
/// Invalid names:
/// - "AddUserToGroup" (uppercase)
/// - "add_user" (underscores)
/// - "add--user" (consecutive hyphens)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FunctionName(String);

impl FunctionName {
    /// Pattern for valid kebab-case names
    const PATTERN: &'static str = r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$";

    const MAX_LENGTH: usize = 64;

    /// Create a new validated function name
    ///
    /// # Examples
    ///
    /// ```
    /// use backend_compose::validation::FunctionName;
    ///
    /// let name = FunctionName::new("add-user-to-group").unwrap();
    /// assert_eq!(name.as_str(), "add-user-to-group");
    ///
    /// assert!(FunctionName::new("AddUserToGroup").is_err());
    /// assert!(FunctionName::new("add--user").is_err());
    /// ```
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::validate_name(&name)?;
        Ok(FunctionName(name))
    }

    fn validate_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(CompositionError::InvalidFunctionName(
                "name cannot be empty".to_string(),
            ));
        }

        if name.len() > Self::MAX_LENGTH {
            return Err(CompositionError::InvalidFunctionName(format!(
                "name too long (max {} characters)",
                Self::MAX_LENGTH
            )));
        }

        if !is_match(Self::PATTERN, name)? {
            return Err(CompositionError::InvalidFunctionName(format!(
                "name '{}' must be kebab-case: lowercase letters, numbers, and hyphens only",
                name
            )));
        }

        if name.contains("--") {
            return Err(CompositionError::InvalidFunctionName(
                "name cannot contain consecutive hyphens".to_string(),
            ));
        }

        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for FunctionName {
    type Error = CompositionError;

    fn try_from(value: String) -> Result<Self> {
        FunctionName::new(value)
    }
}

impl From<FunctionName> for String {
    fn from(name: FunctionName) -> Self {
        name.0
    }
}

impl AsRef<str> for FunctionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validate a resource token string
pub fn validate_token(token: &str) -> Result<()> {
    if token.is_empty() {
        return Err(CompositionError::InvalidToken(
            "token cannot be empty".to_string(),
        ));
    }

    if !is_match(TOKEN_PATTERN, token)? {
        return Err(CompositionError::InvalidToken(format!(
            "'{}' must be PascalCase (e.g. AuthResources) or group:kebab-name (e.g. function:my-fn)",
            token
        )));
    }

    if token.contains("--") {
        return Err(CompositionError::InvalidToken(format!(
            "'{}' cannot contain consecutive hyphens",
            token
        )));
    }

    Ok(())
}

/// Validate a provider action such as `cognito-idp:AdminAddUserToGroup`
pub fn validate_action(action: &str) -> Result<()> {
    if !is_match(ACTION_PATTERN, action)? {
        return Err(CompositionError::InvalidAction(format!(
            "'{}' must have the form service:Action",
            action
        )));
    }
    Ok(())
}

fn is_match(pattern: &str, value: &str) -> Result<bool> {
    let re = Regex::new(pattern)
        .map_err(|e| CompositionError::InvalidToken(format!("bad validation pattern: {}", e)))?;
    Ok(re.is_match(value))
}
