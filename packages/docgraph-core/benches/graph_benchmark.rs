//! Benchmarks for generation forking
//!
//! Every edit forks the dependency graph and the analysis cache, so both
//! must stay cheap on large packages:
//! - Dependants closure of a widely imported file
//! - Graph invalidation (structural copy + placeholder)
//! - Readiness check over a long import chain

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use docgraph_core::{AnalysisCache, DependencyGraph, ResolvedUrl};
use std::sync::Arc;

fn url(i: usize) -> ResolvedUrl {
    ResolvedUrl::new(format!("src/file_{i}.doc"))
}

/// `n` files where file `i` imports files `i + 1` and `i + 2`, ending in a
/// shared root
fn layered_graph(n: usize) -> DependencyGraph {
    let graph = DependencyGraph::new();
    for i in 0..n {
        let deps: Vec<ResolvedUrl> = (i + 1..=(i + 2).min(n - 1)).map(url).collect();
        graph.add_document(&url(i), &deps);
    }
    graph
}

// ============================================================================
// Graph queries
// ============================================================================

fn bench_dependants(c: &mut Criterion) {
    let mut group = c.benchmark_group("dependants_of_root");

    for size in [100usize, 1_000, 5_000] {
        let graph = layered_graph(size);
        let root = url(size - 1);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &root, |b, root| {
            b.iter(|| black_box(graph.get_all_dependants_of(root)));
        });
    }

    group.finish();
}

fn bench_is_stabilized(c: &mut Criterion) {
    let graph = layered_graph(1_000);
    let top = url(0);
    c.bench_function("is_stabilized_1000", |b| {
        b.iter(|| black_box(graph.is_stabilized(&top)));
    });
}

// ============================================================================
// Forking
// ============================================================================

fn bench_invalidate_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("invalidate_paths");

    for size in [100usize, 1_000, 5_000] {
        let graph = layered_graph(size);
        let changed = vec![url(size / 2)];
        group.bench_with_input(BenchmarkId::from_parameter(size), &changed, |b, changed| {
            b.iter(|| black_box(graph.invalidate_paths(changed)));
        });
    }

    group.finish();
}

fn bench_cache_invalidate(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_invalidate");

    for size in [100usize, 1_000] {
        let cache = AnalysisCache::new(None, Some(Arc::new(layered_graph(size))));
        let changed = vec![url(size - 1)];
        group.bench_with_input(BenchmarkId::from_parameter(size), &changed, |b, changed| {
            b.iter(|| black_box(cache.invalidate(changed)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_dependants,
    bench_is_stabilized,
    bench_invalidate_paths,
    bench_cache_invalidate
);
criterion_main!(benches);
