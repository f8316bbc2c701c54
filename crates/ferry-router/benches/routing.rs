//! Routing benchmarks.
//!
//! Run with: `cargo bench -p ferry-router`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ferry_router::Router;
use http::Method;

fn build_router(num_routes: usize) -> Router<usize> {
    let mut router = Router::new();
    let per_kind = num_routes / 3;

    for i in 0..per_kind {
        router
            .insert(Method::GET, &format!("/api/v1/widget{i}"), i)
            .unwrap();
        router
            .insert(Method::GET, &format!("/api/v1/widget{i}/:id"), per_kind + i)
            .unwrap();
        router
            .insert(
                Method::GET,
                &format!("/api/v1/org/:org/widget{i}/:id"),
                2 * per_kind + i,
            )
            .unwrap();
    }

    router
}

fn bench_lookups(c: &mut Criterion) {
    let router = build_router(100);

    c.bench_function("static_match", |b| {
        b.iter(|| black_box(router.at(&Method::GET, "/api/v1/widget20")));
    });
    c.bench_function("param_match", |b| {
        b.iter(|| black_box(router.at(&Method::GET, "/api/v1/widget20/12345")));
    });
    c.bench_function("nested_param_match", |b| {
        b.iter(|| black_box(router.at(&Method::GET, "/api/v1/org/acme/widget10/12345")));
    });
    c.bench_function("miss", |b| {
        b.iter(|| black_box(router.at(&Method::GET, "/api/v1/nonexistent/path")));
    });
}

fn bench_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("scaling");

    for num_routes in [30, 300, 3000] {
        let router = build_router(num_routes);
        let path = format!("/api/v1/widget{}/42", num_routes / 6);

        group.bench_with_input(BenchmarkId::new("param_match", num_routes), &path, |b, p| {
            b.iter(|| black_box(router.at(&Method::GET, p)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_lookups, bench_scaling);
criterion_main!(benches);
