//! IAM policy document structure
//!
//! Policies define what actions a principal may perform on which resources.
//! The JSON form matches the AWS IAM policy grammar, restricted to the
//! fields the arbiter emits. Grants are additive, so every statement allows.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// IAM policy language version
pub const POLICY_VERSION: &str = "2012-10-17";

/// Effect of a policy statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Allow the action
    Allow,
}

/// A single policy statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    /// Statement ID (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    /// Effect of this statement
    pub effect: Effect,

    /// Provider actions, sorted
    pub action: Vec<String>,

    /// Resource ARNs, sorted
    pub resource: Vec<String>,
}

impl Statement {
    /// Create an Allow statement with sorted, deduplicated actions and resources
    pub fn allow<A, R>(actions: A, resources: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        let action: BTreeSet<String> = actions.into_iter().map(Into::into).collect();
        let resource: BTreeSet<String> = resources.into_iter().map(Into::into).collect();
        Statement {
            sid: None,
            effect: Effect::Allow,
            action: action.into_iter().collect(),
            resource: resource.into_iter().collect(),
        }
    }
}

/// Complete IAM policy document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    /// Policy format version
    pub version: String,

    /// List of policy statements
    pub statement: Vec<Statement>,
}

impl PolicyDocument {
    pub fn with_statements(statements: Vec<Statement>) -> Self {
        PolicyDocument {
            version: POLICY_VERSION.to_string(),
            statement: statements,
        }
    }

    /// Serialize the document to a JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Named inline policy, the unit attached to a role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub name: String,
    pub document: PolicyDocument,
}

impl Policy {
    pub fn new(name: impl Into<String>, statements: Vec<Statement>) -> Self {
        Policy {
            name: name.into(),
            document: PolicyDocument::with_statements(statements),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_sorts_and_dedups() {
        let stmt = Statement::allow(
            ["cognito-idp:ListUsers", "cognito-idp:AdminGetUser", "cognito-idp:ListUsers"],
            ["arn:b", "arn:a"],
        );
        assert_eq!(stmt.action, vec!["cognito-idp:AdminGetUser", "cognito-idp:ListUsers"]);
        assert_eq!(stmt.resource, vec!["arn:a", "arn:b"]);
        assert_eq!(stmt.effect, Effect::Allow);
    }

    #[test]
    fn test_document_json_shape() {
        let doc = PolicyDocument::with_statements(vec![Statement::allow(
            ["cognito-idp:AdminAddUserToGroup"],
            ["arn:aws:cognito-idp:us-east-1:123456789012:userpool/us-east-1_abc"],
        )]);
        let json = doc.to_json().unwrap();
        assert!(json.contains("\"Version\": \"2012-10-17\""));
        assert!(json.contains("\"Effect\": \"Allow\""));
        assert!(!json.contains("Sid"));

        let parsed: PolicyDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, doc);
    }
}
