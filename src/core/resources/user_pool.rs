//! User pool references and user-pool access policies

use crate::core::error::{CompositionError, Result};
use crate::core::iam::{AccessPolicyFactory, PrincipalRef, ResourceRef};
use anyhow::{anyhow, Context};
use regex::Regex;
use serde::Serialize;

/// Action prefix of the user pool service
pub const SERVICE_PREFIX: &str = "cognito-idp";

const USER_POOL_ID_PATTERN: &str = r"^([a-z]{2}(-[a-z]+)+-\d)_[0-9A-Za-z]+$";
const ROLE_ARN_PATTERN: &str = r"^arn:(aws[a-z-]*):iam::(\d{12}):role/(.+)$";

/// Imported user pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserPool {
    pub id: String,
    pub arn: String,
    pub region: String,
    pub account: String,
}

impl UserPool {
    /// Reference an existing user pool by id, in the account of `role_arn`
    ///
    /// The region is taken from the pool id prefix (`us-east-1_AbC123`).
    pub fn from_reference(user_pool_id: &str, role_arn: &str) -> anyhow::Result<Self> {
        let id_re = Regex::new(USER_POOL_ID_PATTERN)?;
        let captures = id_re
            .captures(user_pool_id)
            .ok_or_else(|| anyhow!("malformed user pool id '{}'", user_pool_id))?;
        let region = captures[1].to_string();

        let role = RoleArn::parse(role_arn)?;
        Ok(UserPool {
            arn: format!(
                "arn:{}:cognito-idp:{}:{}:userpool/{}",
                role.partition, region, role.account, user_pool_id
            ),
            id: user_pool_id.to_string(),
            region,
            account: role.account,
        })
    }
}

/// Parsed IAM role ARN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleArn {
    pub partition: String,
    pub account: String,
    pub name: String,
}

impl RoleArn {
    pub fn parse(arn: &str) -> anyhow::Result<Self> {
        let re = Regex::new(ROLE_ARN_PATTERN)?;
        let captures = re
            .captures(arn)
            .ok_or_else(|| anyhow!("malformed role ARN '{}'", arn))?;
        let path = &captures[3];
        let name = path
            .rsplit('/')
            .next()
            .filter(|n| !n.is_empty())
            .with_context(|| format!("role ARN '{}' has no role name", arn))?;
        Ok(RoleArn {
            partition: captures[1].to_string(),
            account: captures[2].to_string(),
            name: name.to_string(),
        })
    }
}

/// Provider actions behind a friendly auth access action
pub fn user_pool_actions(action: &str) -> Option<&'static [&'static str]> {
    let actions: &'static [&'static str] = match action {
        "manageUsers" => &[
            "AdminConfirmSignUp",
            "AdminCreateUser",
            "AdminDeleteUser",
            "AdminDeleteUserAttributes",
            "AdminDisableUser",
            "AdminEnableUser",
            "AdminGetUser",
            "AdminListGroupsForUser",
            "AdminRespondToAuthChallenge",
            "AdminSetUserMFAPreference",
            "AdminSetUserSettings",
            "AdminUpdateUserAttributes",
            "AdminUserGlobalSignOut",
        ],
        "manageGroupMembership" => &["AdminAddUserToGroup", "AdminRemoveUserFromGroup"],
        "manageGroups" => &["GetGroup", "ListGroups", "CreateGroup", "DeleteGroup", "UpdateGroup"],
        "manageUserDevices" => &[
            "AdminForgetDevice",
            "AdminGetDevice",
            "AdminListDevices",
            "AdminUpdateDeviceStatus",
        ],
        "managePasswordRecovery" => &["AdminResetUserPassword", "AdminSetUserPassword"],
        "addUserToGroup" => &["AdminAddUserToGroup"],
        "createUser" => &["AdminCreateUser"],
        "deleteUser" => &["AdminDeleteUser"],
        "deleteUserAttributes" => &["AdminDeleteUserAttributes"],
        "disableUser" => &["AdminDisableUser"],
        "enableUser" => &["AdminEnableUser"],
        "forgetDevice" => &["AdminForgetDevice"],
        "getDevice" => &["AdminGetDevice"],
        "getUser" => &["AdminGetUser"],
        "listUsers" => &["ListUsers"],
        "listDevices" => &["AdminListDevices"],
        "listGroupsForUser" => &["AdminListGroupsForUser"],
        "listUsersInGroup" => &["ListUsersInGroup"],
        "removeUserFromGroup" => &["AdminRemoveUserFromGroup"],
        "resetUserPassword" => &["AdminResetUserPassword"],
        "setUserMfaPreference" => &["AdminSetUserMFAPreference"],
        "setUserPassword" => &["AdminSetUserPassword"],
        "setUserSettings" => &["AdminSetUserSettings"],
        "updateDeviceStatus" => &["AdminUpdateDeviceStatus"],
        "updateUserAttributes" => &["AdminUpdateUserAttributes"],
        _ => return None,
    };
    Some(actions)
}

/// Scopes access definitions to one user pool
pub struct UserPoolAccessPolicyFactory {
    user_pool: UserPool,
    policy_prefix: String,
}

impl UserPoolAccessPolicyFactory {
    pub fn new(user_pool: UserPool, policy_prefix: impl Into<String>) -> Self {
        UserPoolAccessPolicyFactory {
            user_pool,
            policy_prefix: policy_prefix.into(),
        }
    }

    pub fn user_pool(&self) -> &UserPool {
        &self.user_pool
    }
}

impl AccessPolicyFactory for UserPoolAccessPolicyFactory {
    fn resource_arn(&self, resource: &ResourceRef) -> Result<String> {
        Ok(match resource {
            ResourceRef::UserPool => self.user_pool.arn.clone(),
            ResourceRef::Arn(arn) => arn.clone(),
        })
    }

    /// Friendly actions expand through the catalog; `service:Action` strings pass through
    fn provider_actions(&self, principal: &PrincipalRef, action: &str) -> Result<Vec<String>> {
        if action.contains(':') {
            return Ok(vec![action.to_string()]);
        }

        user_pool_actions(action)
            .map(|actions| {
                actions
                    .iter()
                    .map(|a| format!("{}:{}", SERVICE_PREFIX, a))
                    .collect()
            })
            .ok_or_else(|| CompositionError::UnknownAccessAction {
                principal: principal.to_string(),
                action: action.to_string(),
            })
    }

    fn policy_name(&self, principal: &PrincipalRef) -> String {
        match &principal.role {
            Some(role) => format!("{}UserPoolAccess-{}", self.policy_prefix, role),
            None => format!("{}UserPoolAccess", self.policy_prefix),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::token::ResourceToken;

    const ROLE: &str = "arn:aws:iam::123456789012:role/amplify-authRole";

    #[test]
    fn test_user_pool_arn() {
        let pool = UserPool::from_reference("us-east-1_AbC123", ROLE).unwrap();
        assert_eq!(
            pool.arn,
            "arn:aws:cognito-idp:us-east-1:123456789012:userpool/us-east-1_AbC123"
        );
        assert_eq!(pool.region, "us-east-1");
        assert_eq!(pool.account, "123456789012");
    }

    #[test]
    fn test_malformed_references() {
        assert!(UserPool::from_reference("not-a-pool", ROLE).is_err());
        assert!(UserPool::from_reference("us-east-1_AbC123", "authRoleArn").is_err());
        assert!(RoleArn::parse("arn:aws:iam::123456789012:role/").is_err());
    }

    #[test]
    fn test_role_arn_with_path() {
        let role = RoleArn::parse("arn:aws:iam::123456789012:role/service/amplify-fn").unwrap();
        assert_eq!(role.name, "amplify-fn");
        assert_eq!(role.partition, "aws");
    }

    #[test]
    fn test_provider_actions() {
        let pool = UserPool::from_reference("us-east-1_AbC123", ROLE).unwrap();
        let factory = UserPoolAccessPolicyFactory::new(pool, "amplifyAuth");
        let principal = PrincipalRef::resource(ResourceToken::new("function:fn").unwrap());

        assert_eq!(
            factory.provider_actions(&principal, "addUserToGroup").unwrap(),
            vec!["cognito-idp:AdminAddUserToGroup"]
        );
        assert_eq!(
            factory
                .provider_actions(&principal, "cognito-idp:ListUsers")
                .unwrap(),
            vec!["cognito-idp:ListUsers"]
        );
        assert!(matches!(
            factory.provider_actions(&principal, "fly"),
            Err(CompositionError::UnknownAccessAction { .. })
        ));
        assert_eq!(factory.policy_name(&principal), "amplifyAuthUserPoolAccess");
    }
}
