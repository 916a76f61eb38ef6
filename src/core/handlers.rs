//! Runtime handlers of the admin operations
//!
//! Each handler reads its arguments from the event, takes the user pool id
//! from the function environment and forwards one request to the identity
//! provider. The provider's response is returned verbatim.

use crate::core::error::{CompositionError, Result};
use crate::core::resources::USER_POOL_ID_ENV;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Invocation payload of a resolver-backed function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerEvent<A> {
    pub arguments: A,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddUserToGroupArguments {
    pub user_id: String,
    pub group_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListGroupsForUserArguments {
    pub user_id: String,
}

/// `AdminAddUserToGroup` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdminAddUserToGroupRequest {
    pub username: String,
    pub group_name: String,
    pub user_pool_id: String,
}

/// `AdminListGroupsForUser` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdminListGroupsForUserRequest {
    pub username: String,
    pub user_pool_id: String,
}

/// User-pool API used by the handlers
pub trait IdentityProviderClient: Send + Sync {
    fn admin_add_user_to_group(&self, request: &AdminAddUserToGroupRequest) -> anyhow::Result<Value>;

    fn admin_list_groups_for_user(&self, request: &AdminListGroupsForUserRequest) -> anyhow::Result<Value>;
}

/// Settings a handler reads from its runtime environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerEnvironment {
    user_pool_id: String,
}

impl HandlerEnvironment {
    pub fn new(user_pool_id: impl Into<String>) -> Self {
        HandlerEnvironment {
            user_pool_id: user_pool_id.into(),
        }
    }

    /// Read from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read through an arbitrary lookup, e.g. a function's synthesized environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup(USER_POOL_ID_ENV)
            .filter(|id| !id.is_empty())
            .map(Self::new)
            .ok_or_else(|| CompositionError::MissingEnvironment(USER_POOL_ID_ENV.to_string()))
    }

    pub fn user_pool_id(&self) -> &str {
        &self.user_pool_id
    }
}

/// Add a user to a user-pool group
pub fn add_user_to_group(
    client: &dyn IdentityProviderClient,
    env: &HandlerEnvironment,
    event: HandlerEvent<AddUserToGroupArguments>,
) -> Result<Value> {
    let AddUserToGroupArguments { user_id, group_name } = event.arguments;
    debug!("Adding {} to group {}", user_id, group_name);

    let request = AdminAddUserToGroupRequest {
        username: user_id,
        group_name,
        user_pool_id: env.user_pool_id.clone(),
    };
    client
        .admin_add_user_to_group(&request)
        .map_err(|source| CompositionError::IdentityProvider {
            operation: "AdminAddUserToGroup",
            source,
        })
}

/// List the groups a user belongs to
pub fn list_groups_for_user(
    client: &dyn IdentityProviderClient,
    env: &HandlerEnvironment,
    event: HandlerEvent<ListGroupsForUserArguments>,
) -> Result<Value> {
    let ListGroupsForUserArguments { user_id } = event.arguments;
    debug!("Listing groups for {}", user_id);

    let request = AdminListGroupsForUserRequest {
        username: user_id,
        user_pool_id: env.user_pool_id.clone(),
    };
    client
        .admin_list_groups_for_user(&request)
        .map_err(|source| CompositionError::IdentityProvider {
            operation: "AdminListGroupsForUser",
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct RecordingClient {
        requests: Mutex<Vec<Value>>,
        fail: bool,
    }

    impl IdentityProviderClient for RecordingClient {
        fn admin_add_user_to_group(&self, request: &AdminAddUserToGroupRequest) -> anyhow::Result<Value> {
            if self.fail {
                anyhow::bail!("UserNotFoundException");
            }
            self.requests.lock().push(serde_json::to_value(request)?);
            Ok(json!({ "$metadata": { "httpStatusCode": 200 } }))
        }

        fn admin_list_groups_for_user(&self, request: &AdminListGroupsForUserRequest) -> anyhow::Result<Value> {
            self.requests.lock().push(serde_json::to_value(request)?);
            Ok(json!({ "Groups": [{ "GroupName": "ADMINS" }] }))
        }
    }

    #[test]
    fn test_add_user_to_group_request() {
        let client = RecordingClient::default();
        let env = HandlerEnvironment::new("us-east-1_AbC123");
        let event: HandlerEvent<AddUserToGroupArguments> =
            serde_json::from_value(json!({ "arguments": { "userId": "alice", "groupName": "ADMINS" } })).unwrap();

        add_user_to_group(&client, &env, event).unwrap();
        assert_eq!(
            client.requests.lock()[0],
            json!({ "Username": "alice", "GroupName": "ADMINS", "UserPoolId": "us-east-1_AbC123" })
        );
    }

    #[test]
    fn test_list_groups_returns_response_verbatim() {
        let client = RecordingClient::default();
        let env = HandlerEnvironment::new("us-east-1_AbC123");
        let event = HandlerEvent {
            arguments: ListGroupsForUserArguments {
                user_id: "alice".to_string(),
            },
        };

        let response = list_groups_for_user(&client, &env, event).unwrap();
        assert_eq!(response["Groups"][0]["GroupName"], "ADMINS");
    }

    #[test]
    fn test_provider_failure() {
        let client = RecordingClient {
            fail: true,
            ..Default::default()
        };
        let event = HandlerEvent {
            arguments: AddUserToGroupArguments {
                user_id: "ghost".to_string(),
                group_name: "ADMINS".to_string(),
            },
        };

        let err = add_user_to_group(&client, &HandlerEnvironment::new("pool"), event).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Handler);
    }

    #[test]
    fn test_environment_lookup() {
        let env = HandlerEnvironment::from_lookup(|name| {
            (name == USER_POOL_ID_ENV).then(|| "us-east-1_AbC123".to_string())
        })
        .unwrap();
        assert_eq!(env.user_pool_id(), "us-east-1_AbC123");

        assert!(matches!(
            HandlerEnvironment::from_lookup(|_| None),
            Err(CompositionError::MissingEnvironment(_))
        ));
    }
}
