//! Benchmarks for the registration store and reverse token index

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use push_broker::{MemoryStorage, RegisterRequest, RegistrationService, RegistrationStore};
use std::sync::Arc;

fn populated(rt: &tokio::runtime::Runtime, nodes: usize) -> (Arc<RegistrationStore>, RegistrationService) {
    let store = RegistrationStore::new(Arc::new(MemoryStorage::new()));
    let service = RegistrationService::new(store.clone());

    rt.block_on(async {
        for i in 0..nodes {
            let _ = service
                .register(RegisterRequest {
                    node: format!("node-{:04}", i),
                    push_type: "fcm".into(),
                    token: format!("token-{:04}", i),
                })
                .await;
        }
    });

    (store, service)
}

fn bench_register(c: &mut Criterion) {
    let mut group = c.benchmark_group("registration_store");
    group.throughput(Throughput::Elements(1));

    let rt = tokio::runtime::Runtime::new().unwrap();

    group.bench_function("register_new_node", |b| {
        let (_store, service) = populated(&rt, 0);
        let mut counter = 0u64;

        b.to_async(&rt).iter(|| {
            counter += 1;
            let request = RegisterRequest {
                node: format!("node-{}", counter),
                push_type: "fcm".into(),
                token: format!("token-{}", counter),
            };
            let service = &service;
            async move {
                let _ = service.register(black_box(request)).await;
            }
        });
    });

    group.bench_function("renew_existing_node", |b| {
        let (_store, service) = populated(&rt, 1000);
        let mut counter = 0u64;

        b.to_async(&rt).iter(|| {
            counter += 1;
            let i = counter % 1000;
            let request = RegisterRequest {
                node: format!("node-{:04}", i),
                push_type: "fcm".into(),
                token: format!("token-{:04}", i),
            };
            let service = &service;
            async move {
                let _ = service.register(black_box(request)).await;
            }
        });
    });

    group.finish();
}

fn bench_token_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("token_index");
    group.throughput(Throughput::Elements(1));

    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, _service) = populated(&rt, 1000);

    // Warm the index with a full scan
    rt.block_on(store.token_to_node("no-such-token"));

    group.bench_function("cached_token_to_node", |b| {
        let mut counter = 0u64;
        b.to_async(&rt).iter(|| {
            counter += 1;
            let token = format!("token-{:04}", counter % 1000);
            let store = &store;
            async move {
                let _ = store.token_to_node(black_box(&token)).await;
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_register, bench_token_lookup);
criterion_main!(benches);
