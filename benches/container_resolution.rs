use backend_compose::iam::{AccessDefinition, AuthAccessBuilder, PolicyArbiter};
use backend_compose::resources::{
    AdminOperation, FunctionFactory, FunctionProps, ReferenceAuthProps, UserPool, UserPoolAccessPolicyFactory,
};
use backend_compose::{Backend, BackendContext, ConstructFactory, ResourceToken};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
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

/// Benchmark cache hits on an already built resource (hot path)
fn bench_cached_resolution(c: &mut Criterion) {
    let lookups = vec![100, 1_000, 10_000];
    let mut group = c.benchmark_group("container_cached");

    for count in lookups {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let ctx = BackendContext::new("bench");
            let factory = FunctionFactory::new(FunctionProps::new("hot", "./hot.ts").unwrap()).unwrap();
            factory.get_instance(&ctx).unwrap();

            b.iter(|| {
                for _ in 0..count {
                    black_box(factory.get_instance(&ctx).unwrap());
                }
            });
        });
    }

    group.finish();
}

/// Benchmark full synthesis of a backend with many admin functions (cold path)
fn bench_synthesis(c: &mut Criterion) {
    let sizes = vec![1, 10, 50];
    let mut group = c.benchmark_group("backend_synthesis");

    for size in sizes {
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let backend = Backend::new("bench");
                for i in 0..size {
                    let name = format!("admin-{}", i);
                    backend
                        .admin_operation(AdminOperation::AddUserToGroup, Some(&name))
                        .unwrap();
                }
                backend.reference_auth(auth_props(), None).unwrap();
                black_box(backend.synthesize().unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark arbitration of growing definition lists onto a fixed set of principals
fn bench_arbitration(c: &mut Criterion) {
    let definition_counts = vec![10, 100, 1_000];
    let actions = ["addUserToGroup", "listGroupsForUser", "getUser", "listUsers"];
    let mut group = c.benchmark_group("policy_arbitration");

    for count in definition_counts {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let ctx = BackendContext::new("bench");
            for i in 0..8 {
                let factory = FunctionFactory::new(FunctionProps::new(&format!("fn-{}", i), "./fn.ts").unwrap()).unwrap();
                ctx.container().register_construct_factory(Arc::new(factory)).unwrap();
            }
            let pool = UserPool::from_reference("us-east-1_AbC123", "arn:aws:iam::123456789012:role/authRole").unwrap();
            let policy_factory = UserPoolAccessPolicyFactory::new(pool, "amplifyAuth");

            let allow = AuthAccessBuilder::new();
            let definitions: Vec<AccessDefinition> = (0..count)
                .map(|i| {
                    let token = ResourceToken::new(format!("function:fn-{}", i % 8)).unwrap();
                    allow.resource(token).to([actions[i % actions.len()]])
                })
                .collect();

            b.iter(|| {
                let attachments = PolicyArbiter::new()
                    .arbitrate_policies(definitions.clone(), &ctx, &policy_factory)
                    .unwrap();
                black_box(attachments);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_cached_resolution, bench_synthesis, bench_arbitration);
criterion_main!(benches);
