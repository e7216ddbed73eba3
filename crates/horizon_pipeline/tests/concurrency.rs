//! Concurrency tests for the pipeline
//!
//! These tests hammer a shared pipeline from several threads and check the
//! properties callers rely on: nothing inserted is lost, nothing is removed
//! twice, and iterators running alongside mutation stay weakly consistent.

use horizon_pipeline::{Direction, Match, Pipeline, PipelineConfig};
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use tracing_subscriber::EnvFilter;

const THREADS: usize = 8;
const PER_THREAD: usize = 2_000;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn concurrent_appends_are_never_lost() {
    init_tracing();
    let pipeline = Pipeline::new();

    thread::scope(|s| {
        for t in 0..THREADS {
            let pipeline = &pipeline;
            s.spawn(move || {
                for i in 0..PER_THREAD {
                    let value = t * PER_THREAD + i;
                    if i % 2 == 0 {
                        pipeline.add_last(format!("t{t}"), value);
                    } else {
                        pipeline.add_first(format!("t{t}"), value);
                    }
                }
            });
        }
    });

    let values: Vec<usize> = pipeline.iter().map(|v| *v).collect();
    assert_eq!(values.len(), THREADS * PER_THREAD);
    let distinct: HashSet<usize> = values.iter().copied().collect();
    assert_eq!(distinct.len(), THREADS * PER_THREAD);
    assert_eq!(pipeline.len(), THREADS * PER_THREAD);

    // per thread, tail appends keep their relative order
    for t in 0..THREADS {
        let mine: Vec<usize> = values
            .iter()
            .copied()
            .filter(|v| v / PER_THREAD == t && v % 2 == 0)
            .collect();
        assert!(mine.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn concurrent_polls_remove_each_element_once() {
    init_tracing();
    let pipeline: Pipeline<usize> = (0..THREADS * PER_THREAD)
        .map(|i| (format!("n{i}"), i))
        .collect();

    let removed: Vec<Vec<usize>> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let pipeline = &pipeline;
                s.spawn(move || {
                    let mut mine = Vec::new();
                    loop {
                        let polled = if t % 2 == 0 {
                            pipeline.poll_first()
                        } else {
                            pipeline.poll_last()
                        };
                        match polled {
                            Some((_, value)) => mine.push(*value),
                            None => break,
                        }
                    }
                    mine
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let mut all: Vec<usize> = removed.into_iter().flatten().collect();
    all.sort_unstable();
    assert_eq!(all, (0..THREADS * PER_THREAD).collect::<Vec<_>>());
    assert!(pipeline.is_empty());
}

#[test]
fn racing_removals_of_one_name_have_one_winner() {
    for _ in 0..50 {
        let pipeline: Pipeline<u32> = [("a", 1), ("target", 2), ("b", 3)].into_iter().collect();
        let winners = AtomicUsize::new(0);

        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    if pipeline.remove_named("target").is_some() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.names(), ["a", "b"]);
    }
}

#[test]
fn iteration_is_weakly_consistent_under_churn() {
    init_tracing();
    let pipeline = Pipeline::new();
    // stable elements are never touched by the writers
    for i in 0..500usize {
        pipeline.add_last("stable", i * 2);
    }
    let stop = AtomicBool::new(false);

    thread::scope(|s| {
        for t in 0..4usize {
            let pipeline = &pipeline;
            let stop = &stop;
            s.spawn(move || {
                let mut round = 0usize;
                while !stop.load(Ordering::Relaxed) {
                    // odd values are churn: inserted next to stable anchors and removed again
                    let value = 1_000_001 + 2 * (t * 1_000_000 + round);
                    let _ = pipeline.insert_after("stable", "churn", value, round % 50, Direction::FromHead);
                    pipeline.add_first("churn", value + 2);
                    pipeline.add_last("churn", value + 4);
                    pipeline.remove(Match::Name("churn"), 0, Direction::FromTail, 2);
                    pipeline.remove_named("churn");
                    round += 1;
                }
            });
        }

        for _ in 0..50 {
            let forward: Vec<usize> = pipeline
                .iter()
                .map(|v| *v)
                .filter(|v| v % 2 == 0)
                .collect();
            assert_eq!(forward, (0..500).map(|i| i * 2).collect::<Vec<_>>());

            let backward: Vec<usize> = pipeline
                .iter_rev()
                .map(|v| *v)
                .filter(|v| v % 2 == 0)
                .collect();
            assert_eq!(backward, (0..500).rev().map(|i| i * 2).collect::<Vec<_>>());
        }
        stop.store(true, Ordering::Relaxed);
    });

    // everything the writers left behind is churn, stable elements intact
    let stable = pipeline.iter().filter(|v| **v % 2 == 0).count();
    assert_eq!(stable, 500);
    assert!(pipeline.iter().all(|v| *v < 500 * 2 || *v > 1_000_000));
}

#[test]
fn anchored_inserts_survive_anchor_removal() {
    init_tracing();
    for _ in 0..20 {
        let pipeline: Pipeline<usize> = (0..64).map(|i| ("anchor", i)).collect();
        let inserted = AtomicUsize::new(0);

        thread::scope(|s| {
            s.spawn(|| {
                while pipeline.remove_named("anchor").is_some() {}
            });
            for t in 0..3usize {
                let pipeline = &pipeline;
                let inserted = &inserted;
                s.spawn(move || {
                    for i in 0..64usize {
                        let value = 1_000 + t * 100 + i;
                        let result = if i % 2 == 0 {
                            pipeline.insert_before("anchor", "new", value, 0, Direction::FromHead)
                        } else {
                            pipeline.insert_after("anchor", "new", value, 0, Direction::FromTail)
                        };
                        if result.is_ok() {
                            inserted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        assert!(!pipeline.contains_key("anchor"));
        let values: Vec<usize> = pipeline.iter().map(|v| *v).collect();
        let distinct: HashSet<usize> = values.iter().copied().collect();
        assert_eq!(distinct.len(), values.len());
        assert!(values.len() <= inserted.load(Ordering::SeqCst));
    }
}

#[test]
fn parallel_scan_during_mutation_sees_stable_elements() {
    let pipeline = Pipeline::with_config(PipelineConfig::default().with_batch_bounds(2, 256));
    for i in 0..20_000u64 {
        pipeline.add_last("stable", i * 2);
    }

    thread::scope(|s| {
        let writer = s.spawn(|| {
            for i in 0..5_000u64 {
                pipeline.add_last("churn", i * 2 + 1);
                if i % 3 == 0 {
                    pipeline.remove_named("churn");
                }
            }
        });

        let stable_sum: u64 = pipeline
            .par_iter()
            .map(|v| *v)
            .filter(|v| v % 2 == 0)
            .sum();
        assert_eq!(stable_sum, (0..20_000u64).map(|i| i * 2).sum::<u64>());
        writer.join().unwrap();
    });
}
