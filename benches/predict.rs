//! Prediction benchmarks.
//!
//! Scores a generated ensemble of full depth-6 trees row by row and in
//! batches, and measures text model parsing.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lightgbm_predict::*;
use rand::prelude::*;
use std::sync::Arc;

const NUM_FEATURES: usize = 32;
const DEPTH: u32 = 6;

/// Full binary tree with heap-ordered nodes: children of `i` are `2i+1`
/// and `2i+2`.
fn random_tree(rng: &mut StdRng) -> Tree {
    let num_internal = (1usize << DEPTH) - 1;
    let mut nodes = Vec::with_capacity(2 * num_internal + 1);
    for i in 0..num_internal {
        let split = NumericSplit::new(
            rng.gen_range(0..NUM_FEATURES),
            rng.gen_range(-1.0..1.0),
            2 * i + 1,
            2 * i + 2,
        )
        .with_missing(MissingType::NaN, rng.gen_bool(0.5));
        nodes.push(Node::Numeric(split));
    }
    for _ in 0..=num_internal {
        nodes.push(Node::leaf(rng.gen_range(-0.1..0.1)));
    }
    Tree::from_nodes(nodes, 0.1).unwrap()
}

fn random_ensemble(num_trees: usize) -> Ensemble {
    let mut rng = StdRng::seed_from_u64(42);
    let trees = (0..num_trees).map(|_| random_tree(&mut rng)).collect();
    Ensemble::builder(NUM_FEATURES, Objective::Binary { sigmoid: 1.0 })
        .trees(trees)
        .build()
        .unwrap()
}

fn random_rows(num_rows: usize) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(7);
    (0..num_rows * NUM_FEATURES)
        .map(|_| if rng.gen_bool(0.05) { f64::NAN } else { rng.gen_range(-1.5..1.5) })
        .collect()
}

fn bench_predict_row(c: &mut Criterion) {
    let ensemble = Arc::new(random_ensemble(200));
    let row = random_rows(1);

    let mut group = c.benchmark_group("predict_row");
    for kind in [PredictType::Normal, PredictType::LeafIndex, PredictType::Contrib] {
        let predictor = Predictor::new(
            Arc::clone(&ensemble),
            PredictionConfig::default().with_predict_type(kind),
        )
        .unwrap();
        let mut out = vec![0.0; predictor.num_predict_per_row()];
        group.bench_function(BenchmarkId::from_parameter(kind), |b| {
            b.iter(|| predictor.predict_row_into(black_box(&row), &mut out).unwrap())
        });
    }
    group.finish();
}

fn bench_predict_batch(c: &mut Criterion) {
    let ensemble = Arc::new(random_ensemble(200));
    let num_rows = 10_000;
    let data = random_rows(num_rows);

    let mut group = c.benchmark_group("predict_for_mat");
    group.throughput(Throughput::Elements(num_rows as u64));
    for num_threads in [1, 2, 4, 0] {
        let predictor = Predictor::new(
            Arc::clone(&ensemble),
            PredictionConfig::default().with_num_threads(num_threads),
        )
        .unwrap();
        group.bench_with_input(BenchmarkId::new("threads", num_threads), &data, |b, data| {
            b.iter(|| black_box(predictor.predict_for_mat(data, num_rows, NUM_FEATURES, true).unwrap()))
        });
    }
    group.finish();
}

fn bench_parse_model(c: &mut Criterion) {
    let text = random_ensemble(200).to_model_string();

    let mut group = c.benchmark_group("parse_model");
    group.throughput(Throughput::Bytes(text.len() as u64));
    group.bench_function("lightgbm_text", |b| {
        b.iter(|| black_box(text.parse::<Ensemble>().unwrap()))
    });
    group.finish();
}

criterion_group!(benches, bench_predict_row, bench_predict_batch, bench_parse_model);
criterion_main!(benches);
