//! Criterion benchmarks for orgviz-core.
//!
//! ## Benchmark groups
//!
//! 1. **persistence**: Batch persistence and snapshot replacement.
//! 2. **tree_query**: Named, wildcard and complement tree queries.
//! 3. **tree_validate**: Depth check on synthetic trees.
//! 4. **cohort**: Entropy over fingerprint cohorts.
//!
//! ## Running
//!
//! ```sh
//! cargo bench --manifest-path crates/orgviz-core/Cargo.toml
//! # Run only the tree query group:
//! cargo bench --manifest-path crates/orgviz-core/Cargo.toml -- tree_query
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tempfile::TempDir;

use orgviz_core::analytics::analyze_cohort;
use orgviz_core::{
    AnalysisResultStore, AspectRegistry, Database, Fingerprint, Level, Payload, PlantedTree,
    ProjectAnalysis, ProjectAnalysisResult, RepoRef, RootName, SunburstNode, TreeQuery,
    TreeQueryEngine,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn setup_store() -> (TempDir, AnalysisResultStore) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(dir.path().join("bench.db")).unwrap();
    db.init_schema().unwrap();
    (dir, AnalysisResultStore::new(db))
}

/// One analysis per repo, each carrying `deps` npm fingerprints whose
/// versions rotate through a handful of values.
fn synthetic_results(repos: usize, deps: usize) -> Vec<ProjectAnalysisResult> {
    (0..repos)
        .map(|r| {
            let fingerprints = (0..deps)
                .map(|d| {
                    let version = format!("\"{}.{}\"", d % 7, (r + d) % 3);
                    Fingerprint::new("npm", format!("dep-{d}"), Payload::from_raw(version))
                })
                .collect();
            let repo = format!("repo-{r}");
            ProjectAnalysisResult::new(
                "bench",
                ProjectAnalysis {
                    id: Some(RepoRef::new(
                        "org",
                        repo.as_str(),
                        format!("https://github.com/org/{repo}"),
                        "c0ffee",
                    )),
                    fingerprints,
                    git_status: None,
                },
            )
        })
        .collect()
}

fn synthetic_tree(values: usize, repos_per_value: usize) -> SunburstNode {
    let children = (0..values)
        .map(|v| {
            let leaves = (0..repos_per_value)
                .map(|r| SunburstNode::leaf(format!("repo-{v}-{r}"), 1))
                .collect();
            SunburstNode::branch(format!("value-{v}"), leaves)
        })
        .collect();
    SunburstNode::branch("dep", children)
}

// ---------------------------------------------------------------------------
// Benchmark: Persistence
// ---------------------------------------------------------------------------

fn bench_persistence(c: &mut Criterion) {
    let mut group = c.benchmark_group("persistence");
    group.sample_size(20);

    for repos in [10usize, 100] {
        let results = synthetic_results(repos, 20);
        group.bench_with_input(BenchmarkId::new("persist_batch", repos), &results, |b, results| {
            let (_dir, store) = setup_store();
            b.iter(|| store.persist(black_box(results.clone())));
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: Tree queries
// ---------------------------------------------------------------------------

fn bench_tree_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_query");
    let (_dir, store) = setup_store();
    store.persist(synthetic_results(200, 30));
    let registry = AspectRegistry::empty();
    let engine = TreeQueryEngine::new(store.database(), &registry);

    let named = TreeQuery::new("bench", "npm", RootName::Named("dep-3".into()));
    group.bench_function("named", |b| {
        b.iter(|| engine.repo_tree(black_box(&named)).unwrap());
    });

    let complement = named.clone().with_complement("None");
    group.bench_function("named_with_complement", |b| {
        b.iter(|| engine.repo_tree(black_box(&complement)).unwrap());
    });

    let wildcard = TreeQuery::new("*", "npm", RootName::All);
    group.bench_function("wildcard_all_workspaces", |b| {
        b.iter(|| engine.repo_tree(black_box(&wildcard)).unwrap());
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: Tree validation
// ---------------------------------------------------------------------------

fn bench_tree_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_validate");
    let levels = vec![
        Level::new("fingerprint name"),
        Level::new("fingerprint value"),
        Level::new("repository"),
    ];

    for size in [10usize, 100, 1000] {
        let planted = PlantedTree {
            tree: synthetic_tree(size, 10),
            levels: levels.clone(),
        };
        group.bench_with_input(BenchmarkId::new("values", size), &planted, |b, planted| {
            b.iter(|| planted.validate().unwrap());
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: Cohort analysis
// ---------------------------------------------------------------------------

fn bench_cohort(c: &mut Criterion) {
    let mut group = c.benchmark_group("cohort");

    for size in [100usize, 10_000] {
        let cohort: Vec<Fingerprint> = (0..size)
            .map(|i| Fingerprint::with_sha("npm", "lodash", format!("v{}", i % 13), Payload::from_raw("{}")))
            .collect();
        group.bench_with_input(BenchmarkId::new("analyze", size), &cohort, |b, cohort| {
            b.iter(|| analyze_cohort(black_box(cohort)));
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Register all benchmark groups
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_persistence,
    bench_tree_query,
    bench_tree_validate,
    bench_cohort,
);
criterion_main!(benches);
