//! Error types for backend composition
//!
//! Every failure carries an [`ErrorKind`] and a one-line remediation hint
//! from [`CompositionError::resolution`].

use crate::core::declaration::DeclarationSite;
use crate::core::token::ResourceToken;
use thiserror::Error;

/// Coarse classification of a [`CompositionError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fatal misconfiguration of the backend definition, never retried
    Configuration,
    /// A single build attempt failed; not cached, may be retried
    Build,
    /// An identity-provider request made by a handler failed
    Handler,
    /// Reading configuration from disk failed
    Io,
}

/// Errors raised while composing a backend or running its handlers
#[derive(Error, Debug)]
pub enum CompositionError {
    /// A singleton resource kind was declared twice
    #[error("Multiple `{kind}` declarations are not allowed within a backend (first declared at {first})")]
    MultipleSingletonResources {
        kind: String,
        first: DeclarationSite,
        conflicting: DeclarationSite,
    },

    /// Resources depend on each other in a cycle
    #[error("Cyclic resource dependency: {}", format_chain(.chain))]
    CyclicDependency { chain: Vec<ResourceToken> },

    /// Token or alias already taken by another factory or generator
    #[error("Resource token {0} is already registered")]
    DuplicateToken(ResourceToken),

    /// Token does not exist in this backend
    #[error("No factory or generator registered for {0}")]
    UnknownResource(ResourceToken),

    /// Resource has no principal to receive a policy
    #[error("{token} does not accept resource access policies")]
    NotAnAccessAcceptor { token: ResourceToken },

    /// Role identifier not routable on the resource
    #[error("No IAM role found for \"{role}\" on {token}")]
    InvalidResourceAccessConfig { token: ResourceToken, role: String },

    /// Declared access action has no provider mapping
    #[error("Unknown access action \"{action}\" requested for {principal}")]
    UnknownAccessAction { principal: String, action: String },

    /// Instance is not of the requested concrete type
    #[error("{token} resolved to an instance that is not a {expected}")]
    TypeMismatch {
        token: ResourceToken,
        expected: &'static str,
    },

    /// Resource declared outside its expected file
    #[error("{message} (declared at {site})")]
    DeclarationLocation {
        message: String,
        site: DeclarationSite,
    },

    /// Construct id collides with a sibling
    #[error("Construct id \"{id}\" already exists under {scope}")]
    DuplicateConstructId { scope: String, id: String },

    /// Malformed resource token
    #[error("Invalid resource token: {0}")]
    InvalidToken(String),

    /// Malformed function name
    #[error("Invalid function name: {0}")]
    InvalidFunctionName(String),

    /// Malformed provider action
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// Declared properties out of range
    #[error("Invalid properties for {token}: {reason}")]
    InvalidProps { token: ResourceToken, reason: String },

    /// Generator failed to build its resource
    #[error("Failed to instantiate {token}")]
    ConstructInitialization {
        token: ResourceToken,
        #[source]
        source: anyhow::Error,
    },

    /// Handler environment lacks a required variable
    #[error("Missing environment variable {0}")]
    MissingEnvironment(String),

    /// Identity provider rejected a handler request
    #[error("Identity provider request {operation} failed")]
    IdentityProvider {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// JSON serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML configuration did not parse
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompositionError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompositionError::ConstructInitialization { .. } => ErrorKind::Build,
            CompositionError::IdentityProvider { .. } => ErrorKind::Handler,
            CompositionError::Io(_) => ErrorKind::Io,
            _ => ErrorKind::Configuration,
        }
    }

    /// One-line remediation hint shown alongside the message
    pub fn resolution(&self) -> String {
        match self {
            CompositionError::MultipleSingletonResources { kind, .. } => {
                format!("Remove all but one `{}` call", kind)
            }
            CompositionError::CyclicDependency { chain } => format!(
                "Break the dependency between {} so that neither resource resolves the other while building",
                format_chain(chain)
            ),
            CompositionError::DuplicateToken(token) => {
                format!("Give each resource a unique name; {} is used twice", token)
            }
            CompositionError::UnknownResource(token) => {
                format!("Declare {} in the backend before referencing it", token)
            }
            CompositionError::NotAnAccessAcceptor { token } => format!(
                "Only resources with an execution role can be granted access; {} has none",
                token
            ),
            CompositionError::InvalidResourceAccessConfig { .. } => {
                "If you are trying to configure UserPool group access, ensure that the group name is specified correctly."
                    .to_string()
            }
            CompositionError::UnknownAccessAction { .. } => {
                "Use one of the documented auth access actions, e.g. `addUserToGroup`".to_string()
            }
            CompositionError::TypeMismatch { token, .. } => {
                format!("Check that {} is declared with the expected factory", token)
            }
            CompositionError::DeclarationLocation { .. } => {
                "Move the declaration into the expected resource file".to_string()
            }
            CompositionError::DuplicateConstructId { .. } => {
                "Use a unique name for every resource of the same kind".to_string()
            }
            CompositionError::InvalidToken(_)
            | CompositionError::InvalidFunctionName(_)
            | CompositionError::InvalidAction(_)
            | CompositionError::InvalidProps { .. } => {
                "Fix the declared value and run the build again".to_string()
            }
            CompositionError::ConstructInitialization { .. } => {
                "See the underlying error message for more details.".to_string()
            }
            CompositionError::MissingEnvironment(name) => {
                format!("Set {} in the function environment", name)
            }
            CompositionError::IdentityProvider { .. } => {
                "Inspect the identity provider error; the request is not retried".to_string()
            }
            CompositionError::Serialization(_) | CompositionError::Config(_) => {
                "Check the backend configuration syntax".to_string()
            }
            CompositionError::Io(_) => "Check that the configuration file is readable".to_string(),
        }
    }
}

fn format_chain(chain: &[ResourceToken]) -> String {
    chain
        .iter()
        .map(ResourceToken::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub type Result<T> = std::result::Result<T, CompositionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_names_chain() {
        let chain = vec![
            ResourceToken::new("A").unwrap(),
            ResourceToken::new("B").unwrap(),
            ResourceToken::new("A").unwrap(),
        ];
        let err = CompositionError::CyclicDependency { chain };
        assert_eq!(err.to_string(), "Cyclic resource dependency: A -> B -> A");
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.resolution().contains("A -> B -> A"));
    }

    #[test]
    fn test_build_error_keeps_source() {
        let err = CompositionError::ConstructInitialization {
            token: ResourceToken::new("AuthResources").unwrap(),
            source: anyhow::anyhow!("malformed user pool id"),
        };
        assert_eq!(err.kind(), ErrorKind::Build);
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "malformed user pool id");
    }
}
