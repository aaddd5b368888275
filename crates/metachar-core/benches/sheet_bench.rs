//! # Sheet Benchmarks
//!
//! Performance benchmarks for metachar-core evaluation and persistence.
//!
//! Run with: `cargo bench -p metachar-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use metachar_core::{NodeId, PageId, Sheet, StatNode, ValueEngine, template};
use std::hint::black_box;

/// A chain of sums, each reading the one before it.
fn create_sum_chain(length: usize) -> (Sheet, NodeId) {
    let mut sheet = Sheet::new();
    let mut last = sheet
        .create_node(PageId(0), StatNode::simple("seed", "", 1).for_calc())
        .expect("seed");

    for i in 0..length {
        last = sheet
            .create_node(
                PageId(0),
                StatNode::sum(format!("link {i}"), "", vec![last]).for_calc(),
            )
            .expect("link");
    }

    (sheet, last)
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_refresh(c: &mut Criterion) {
    let sheet = template::dnd5e().expect("template");

    c.bench_function("refresh_all_dnd5e", |b| {
        b.iter(|| ValueEngine::refresh_all(black_box(sheet.registry())));
    });
}

fn bench_chain_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("sum_chain");

    for length in [10, 50, 200] {
        let (sheet, tail) = create_sum_chain(length);
        group.bench_with_input(BenchmarkId::from_parameter(length), &length, |b, _| {
            b.iter(|| ValueEngine::value_for_sum(black_box(sheet.registry()), black_box(tail)));
        });
    }

    group.finish();
}

fn bench_persistence(c: &mut Criterion) {
    let sheet = template::dnd5e().expect("template");
    let text = sheet.save();

    c.bench_function("save_dnd5e", |b| {
        b.iter(|| black_box(&sheet).save());
    });

    c.bench_function("load_dnd5e", |b| {
        b.iter(|| Sheet::from_text(black_box(&text)).expect("load"));
    });
}

criterion_group!(
    benches,
    bench_refresh,
    bench_chain_evaluation,
    bench_persistence
);
criterion_main!(benches);
