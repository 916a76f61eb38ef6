//! Singleton enforcement and declaration-site checks for reference auth

use backend_compose::container::ResourceSnapshot;
use backend_compose::declaration::DeclarationSite;
use backend_compose::resources::{ReferenceAuthFactory, ReferenceAuthProps, REFERENCE_AUTH_KIND};
use backend_compose::{
    Backend, BackendContext, CompositionError, ConstructContainerEntryGenerator, ConstructFactory, ErrorKind,
    ResourceGroup, ResourceInstance, ResourceToken, Result,
};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

fn auth_props() -> ReferenceAuthProps {
    ReferenceAuthProps {
        user_pool_id: "us-east-1_AbC123".to_string(),
        identity_pool_id: "us-east-1:0000-1111".to_string(),
        user_pool_client_id: "client123".to_string(),
        auth_role_arn: "arn:aws:iam::123456789012:role/authRole".to_string(),
        unauth_role_arn: "arn:aws:iam::123456789012:role/unauthRole".to_string(),
        groups: BTreeMap::new(),
    }
}

#[test]
fn test_second_reference_auth_fails_before_any_build() {
    let backend = Backend::new("sandbox");
    backend.reference_auth(auth_props(), None).unwrap();

    let err = backend.reference_auth(auth_props(), None).unwrap_err();
    match &err {
        CompositionError::MultipleSingletonResources { kind, first, conflicting } => {
            assert_eq!(kind, REFERENCE_AUTH_KIND);
            assert!(first.file.ends_with("singleton_guard.rs"));
            assert!(conflicting.line > first.line);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(err.resolution(), "Remove all but one `referenceAuth` call");

    // Declaring is not building
    assert!(backend.context().container().is_empty());
    assert!(backend.context().construct_tree().is_empty());
}

#[test]
fn test_fresh_definition_accepts_auth_again() {
    let first = Backend::new("sandbox");
    first.reference_auth(auth_props(), None).unwrap();

    let second = Backend::new("sandbox");
    second.reference_auth(auth_props(), None).unwrap();
    second.synthesize().unwrap();

    assert_eq!(first.context().container().singleton_count(REFERENCE_AUTH_KIND), 1);
    assert_eq!(second.context().container().singleton_count(REFERENCE_AUTH_KIND), 1);
}

#[test]
fn test_auth_builds_once_for_many_consumers() {
    let ctx = BackendContext::new("sandbox");
    let factory = ReferenceAuthFactory::new(&ctx, auth_props()).unwrap();

    let first = factory.get_auth(&ctx).unwrap();
    let second = factory.get_auth(&ctx).unwrap();

    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(ctx.container().build_count(factory.token()), 1);
    assert_eq!(
        first.resources().user_pool.arn,
        "arn:aws:cognito-idp:us-east-1:123456789012:userpool/us-east-1_AbC123"
    );
}

#[test]
fn test_malformed_props_fail_the_build_only() {
    let ctx = BackendContext::new("sandbox");
    let mut props = auth_props();
    props.user_pool_id = "not-a-pool".to_string();
    let factory = ReferenceAuthFactory::new(&ctx, props).unwrap();

    let err = factory.get_instance(&ctx).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Build);
    let cause = format!("{:#}", anyhow::Error::from(err));
    assert!(cause.contains("Failed to instantiate auth construct"));
    assert!(ctx.container().is_empty());
}

#[test]
fn test_declaration_site_verification() {
    let ctx = BackendContext::new("sandbox").with_declaration_verifier();
    let factory = ReferenceAuthFactory::new(&ctx, auth_props()).unwrap();
    assert!(matches!(
        factory.get_instance(&ctx),
        Err(CompositionError::DeclarationLocation { .. })
    ));

    let ctx = BackendContext::new("sandbox").with_declaration_verifier();
    let site = DeclarationSite::new("project/amplify/auth/resource.rs", 12, 5);
    let factory = ReferenceAuthFactory::with_site(&ctx, auth_props(), site).unwrap();
    assert!(factory.get_instance(&ctx).is_ok());
}

#[test]
fn test_group_roles_are_routable() {
    let ctx = BackendContext::new("sandbox");
    let mut props = auth_props();
    props
        .groups
        .insert("ADMINS".to_string(), "arn:aws:iam::123456789012:role/adminsRole".to_string());
    let auth = ReferenceAuthFactory::new(&ctx, props).unwrap().get_auth(&ctx).unwrap();

    use backend_compose::iam::ResourceAccessAcceptorFactory;
    assert!(auth.get_resource_access_acceptor(Some("ADMINS")).is_ok());
    assert!(auth.get_resource_access_acceptor(Some("authenticatedUserIamRole")).is_ok());
    assert!(matches!(
        auth.get_resource_access_acceptor(Some("EDITORS")),
        Err(CompositionError::InvalidResourceAccessConfig { .. })
    ));
}

#[derive(Debug)]
struct Placeholder;

impl ResourceInstance for Placeholder {
    fn resource_group(&self) -> ResourceGroup {
        ResourceGroup::auth()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn snapshot(&self) -> ResourceSnapshot {
        ResourceSnapshot::new(self.resource_group(), "placeholder")
    }
}

struct PlaceholderGenerator(ResourceToken);

impl ConstructContainerEntryGenerator for PlaceholderGenerator {
    fn resource_group(&self) -> ResourceGroup {
        ResourceGroup::auth()
    }

    fn token(&self) -> &ResourceToken {
        &self.0
    }

    fn generate_container_entry(&self, _ctx: &BackendContext) -> Result<Arc<dyn ResourceInstance>> {
        Ok(Arc::new(Placeholder))
    }
}

#[test]
fn test_failed_registration_leaves_slot_unclaimed() {
    let ctx = BackendContext::new("sandbox");
    let token = ResourceToken::new("AuthResources").unwrap();
    ctx.container()
        .register_generator(token.clone(), Arc::new(PlaceholderGenerator(token)))
        .unwrap();
    let backend = Backend::with_context(ctx);

    assert!(matches!(
        backend.reference_auth(auth_props(), None),
        Err(CompositionError::DuplicateToken(_))
    ));
    let container = backend.context().container();
    assert_eq!(container.singleton_count(REFERENCE_AUTH_KIND), 0);
    assert!(container.get_construct_factory("AuthResources").is_none());
}
