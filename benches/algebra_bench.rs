//! Throughput of the hot algebra and graph paths.

use std::collections::{BTreeMap, BTreeSet};

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use conflux::{
    find_merge_base, path_diffs, Commit, CommitGraph, Diff, OtSystem, TransformOutcome,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Add(i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct AddVariant;

impl Diff for Add {
    type Variant = AddVariant;

    fn variant(&self) -> AddVariant {
        AddVariant
    }
}

fn add_system() -> OtSystem<Add> {
    OtSystem::builder()
        .transform(AddVariant, AddVariant, |l, r| {
            TransformOutcome::transformed(vec![*l], vec![*r])
        })
        .squash(AddVariant, AddVariant, |a, b| Some(Add(a.0 + b.0)))
        .invert(AddVariant, |d| Add(-d.0))
        .empty_if(AddVariant, |d| d.0 == 0)
        .build()
}

fn bench_transform(c: &mut Criterion) {
    let sys = add_system();
    let left: Vec<Add> = (0..32).map(Add).collect();
    let right: Vec<Add> = (0..32).map(|n| Add(-n)).collect();

    c.bench_function("transform_32x32", |b| {
        b.iter(|| sys.transform(black_box(&left), black_box(&right)).unwrap())
    });
}

fn bench_squash(c: &mut Criterion) {
    let sys = add_system();
    let diffs: Vec<Add> = (0..256).map(Add).collect();

    c.bench_function("squash_256", |b| {
        b.iter(|| sys.squash(black_box(&diffs)).unwrap())
    });
}

fn linear_graph(len: u32) -> (CommitGraph<u32, Add>, u32, u32) {
    let mut graph = CommitGraph::new();
    graph.insert(Commit::root(0)).unwrap();
    for i in 1..=len {
        graph
            .insert(Commit::new(
                i,
                BTreeMap::from([(i - 1, vec![Add(1)])]),
                u64::from(i),
            ))
            .unwrap();
    }
    (graph, 0, len)
}

fn bench_graph_walks(c: &mut Criterion) {
    let (graph, root, tip) = linear_graph(512);
    // A second branch off the middle of the chain gives the merge base
    // walk something to do.
    let mut forked = graph.clone();
    forked
        .insert(Commit::new(
            10_000,
            BTreeMap::from([(256, vec![Add(7)])]),
            257,
        ))
        .unwrap();

    c.bench_function("path_diffs_512", |b| {
        b.iter(|| path_diffs(black_box(&graph), &root, &tip).unwrap())
    });
    c.bench_function("merge_base_forked_512", |b| {
        b.iter(|| find_merge_base(black_box(&forked), &BTreeSet::from([tip, 10_000])).unwrap())
    });
}

criterion_group!(benches, bench_transform, bench_squash, bench_graph_walks);
criterion_main!(benches);
