use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use selfplay_mcts::games::gomoku::{Board, UniformEvaluator};
use selfplay_mcts::mcts::{MCTSConfig, MCTSSearch};
use selfplay_mcts::nn::EvaluationQueue;

const SIMULATIONS: u32 = 400;

fn bench_direct(c: &mut Criterion) {
    let mut group = c.benchmark_group("gomoku_search_direct");
    for threads in [1, 4] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            let evaluator = Arc::new(UniformEvaluator);
            b.iter_batched(
                || {
                    let config = MCTSConfig::default().with_threads(threads);
                    MCTSSearch::new(Board::gomoku(), Arc::clone(&evaluator), config)
                        .expect("engine starts")
                },
                |mut search| {
                    search.search(SIMULATIONS).expect("search completes");
                    search
                },
                BatchSize::PerIteration,
            );
        });
    }
    group.finish();
}

fn bench_queued(c: &mut Criterion) {
    let mut group = c.benchmark_group("gomoku_search_queued");
    for threads in [1, 4] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            let queue = Arc::new(
                EvaluationQueue::<Board, _>::single(UniformEvaluator).expect("queue starts"),
            );
            b.iter_batched(
                || {
                    let config = MCTSConfig::default().with_threads(threads);
                    MCTSSearch::new(Board::gomoku(), Arc::clone(&queue), config)
                        .expect("engine starts")
                },
                |mut search| {
                    search.search(SIMULATIONS).expect("search completes");
                    search
                },
                BatchSize::PerIteration,
            );
        });
    }
    group.finish();
}

fn bench_play(c: &mut Criterion) {
    let mut group = c.benchmark_group("gomoku_tree_reuse");
    group.bench_function("search_then_play", |b| {
        let evaluator = Arc::new(UniformEvaluator);
        b.iter_batched(
            || {
                let config = MCTSConfig::default().with_threads(2);
                let mut search = MCTSSearch::new(Board::gomoku(), Arc::clone(&evaluator), config)
                    .expect("engine starts");
                search.search(SIMULATIONS).expect("search completes");
                search
            },
            |mut search| {
                let action = search.best_action().expect("root expanded");
                search.play(action).expect("legal move");
                search
            },
            BatchSize::PerIteration,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_direct, bench_queued, bench_play);
criterion_main!(benches);
