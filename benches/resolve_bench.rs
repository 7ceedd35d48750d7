//! 依赖解析性能基准测试
//!
//! 使用 Criterion 框架进行性能测试，包括：
//! - 不同规模依赖图的激活顺序计算
//! - 链式依赖（最深递归）
//! - 版本号解析
//! - 完整生命周期编排

use std::collections::BTreeSet;

use chips_orchestrator::module::dependency::resolve;
use chips_orchestrator::{
    Dependency, DependencyGraph, LifecycleOrchestrator, Manifest, ModuleRegistry, NoopHooks,
    ResolutionMode, VersionSpec,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

// ============================================================================
// 测试辅助函数
// ============================================================================

/// 生成分层依赖图：每个模块依赖前面最多 `fan_out` 个模块
fn layered_graph(size: usize, fan_out: usize) -> Vec<Manifest> {
    (0..size)
        .map(|i| {
            let mut manifest = Manifest::new(
                format!("module.{:05}", i),
                format!("Module {}", i),
                VersionSpec::new(1, (i % 10) as u64, 0),
            );
            let targets: BTreeSet<usize> = (1..=fan_out.min(i)).map(|k| (i * 7 + k * 13) % i).collect();
            for target in targets {
                manifest = manifest.with_dependency(
                    Dependency::required(format!("module.{:05}", target))
                        .at_least(VersionSpec::new(1, 0, 0)),
                );
            }
            manifest
        })
        .rev()
        .collect()
}

/// 生成链式依赖：module.i 依赖 module.(i-1)
fn chain_graph(size: usize) -> Vec<Manifest> {
    (0..size)
        .map(|i| {
            let manifest = Manifest::new(
                format!("module.{:05}", i),
                format!("Module {}", i),
                VersionSpec::new(1, 0, 0),
            );
            if i == 0 {
                manifest
            } else {
                manifest.with_dependency(Dependency::required(format!("module.{:05}", i - 1)))
            }
        })
        .rev()
        .collect()
}

// ============================================================================
// 依赖解析基准测试
// ============================================================================

/// 不同规模的分层图
fn resolve_layered_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_layered");

    for size in [100usize, 1_000, 10_000] {
        let manifests = layered_graph(size, 4);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &manifests, |b, manifests| {
            b.iter(|| resolve(black_box(manifests), ResolutionMode::Validated).unwrap());
        });
    }

    group.finish();
}

/// 链式依赖
fn resolve_chain_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_chain");

    for size in [100usize, 1_000, 5_000] {
        let manifests = chain_graph(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &manifests, |b, manifests| {
            b.iter(|| resolve(black_box(manifests), ResolutionMode::Validated).unwrap());
        });
    }

    group.finish();
}

/// 构建图与计算顺序分开计时
fn graph_build_benchmark(c: &mut Criterion) {
    let manifests = layered_graph(1_000, 4);

    c.bench_function("graph_build_1000", |b| {
        b.iter(|| DependencyGraph::build(black_box(&manifests)));
    });

    let graph = DependencyGraph::build(&manifests);
    c.bench_function("activation_order_1000", |b| {
        b.iter(|| {
            let mut graph = graph.clone();
            graph.activation_order().unwrap()
        });
    });
}

/// 版本号解析
fn version_parse_benchmark(c: &mut Criterion) {
    c.bench_function("version_parse", |b| {
        b.iter(|| VersionSpec::parse(black_box("12.345.6789")).unwrap());
    });
}

// ============================================================================
// 生命周期编排基准测试
// ============================================================================

/// 完整的激活与停止流程
fn lifecycle_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let manifests = layered_graph(500, 3);
    let order = resolve(&manifests, ResolutionMode::Validated).unwrap();

    c.bench_function("lifecycle_activate_stop_500", |b| {
        b.iter(|| {
            let mut registry = ModuleRegistry::new();
            for manifest in &manifests {
                registry.register_static(manifest.clone(), NoopHooks).unwrap();
            }
            let mut orchestrator = LifecycleOrchestrator::new(registry, order.clone()).unwrap();
            rt.block_on(async {
                orchestrator.activate_all().await.unwrap();
                orchestrator.stop_all().await.unwrap();
            });
        });
    });
}

// ============================================================================
// 基准测试组
// ============================================================================

criterion_group!(
    name = resolve_benches;
    config = Criterion::default().sample_size(50);
    targets = resolve_layered_benchmark, resolve_chain_benchmark, graph_build_benchmark
);

criterion_group!(
    name = version_benches;
    config = Criterion::default().sample_size(200);
    targets = version_parse_benchmark
);

criterion_group!(
    name = lifecycle_benches;
    config = Criterion::default().sample_size(20);
    targets = lifecycle_benchmark
);

criterion_main!(resolve_benches, version_benches, lifecycle_benches);
