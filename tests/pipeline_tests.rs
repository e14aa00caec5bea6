//! Pipeline: compute, run, adapters, configuration errors.

mod test_data_gen;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sluice::prelude::*;
use sluice::io::MemoryStorage;
use sluice::{ExecError, OpError, RunStats};
use test_data_gen::{is_sorted, random_ints};

fn numbers_pipeline(ctx: &Context) -> Pipeline<i64> {
    Pipeline::new(ctx.clone())
        .step("square", |s: Stream<i64>| s.map(|x| x * x))
        .step("drop_odd", |s: Stream<i64>| s.filter(|x| x % 2 == 0))
        .step("dedupe", |s: Stream<i64>| s.distinct())
}

#[test]
fn test_compute_applies_steps_to_existing_stream() {
    let ctx = Context::default();
    let p = numbers_pipeline(&ctx);
    let out: Vec<i64> = p.compute(ctx.from_iter(vec![1, 2, 3, 4, 2])).collect();
    assert_eq!(out, vec![4, 16]);
}

#[test]
fn test_run_moves_source_through_steps_into_sink() {
    let ctx = Context::default();
    let sink = VecSink::new();
    let mut p = numbers_pipeline(&ctx)
        .source(IterSource::new(1..=10i64))
        .sink(sink.clone());

    let stats: RunStats = p.run();
    assert_eq!(stats.steps, 3);
    assert_eq!(stats.rows_out, 5);
    assert_eq!(sink.take(), vec![4, 16, 36, 64, 100]);

    // Sources replay, so a second run sees the same data.
    let again = p.run();
    assert_eq!(again.rows_out, 5);
    assert_ne!(again.run_id, stats.run_id);
}

#[test]
fn test_closure_source_and_sink() {
    let ctx = Context::default();
    let total = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&total);

    let mut p = Pipeline::new(ctx.clone())
        .step("inc", |s: Stream<u32>| s.map(|x| x + 1))
        .source(|ctx: &Context| ctx.from_iter(0..100u32))
        .sink(move |s: Stream<u32>| {
            seen.fetch_add(s.map(|x| x as usize).sum::<usize>(), Ordering::SeqCst);
        });
    p.run();
    assert_eq!(total.load(Ordering::SeqCst), (1..=100).sum::<usize>());
}

#[test]
fn test_pipeline_with_external_sort_step() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_data_gen::test_context(dir.path(), 16);
    let sort = ExternalSort::new(&ctx, |a: &i64, b: &i64| a.cmp(b))
        .unwrap()
        .with_window_rows(64);
    let sink = VecSink::new();
    let mut p = Pipeline::new(ctx.clone())
        .sort_step("sort", sort)
        .source(IterSource::new(random_ints(8, 1_000, 10_000)))
        .sink(sink.clone());

    let stats = p.try_run().unwrap();
    assert_eq!(stats.rows_out, 1_000);
    assert!(is_sorted(&sink.take()));
}

#[test]
fn test_failing_sort_step_is_reported_by_try_run() {
    let ctx = Context::default();
    let storage = Arc::new(MemoryStorage::new());
    storage.fail_writes_after(0);
    let sort = ExternalSort::new(&ctx, |a: &i64, b: &i64| a.cmp(b))
        .unwrap()
        .with_storage(storage.clone())
        .with_window_rows(10);
    let sink = VecSink::new();
    let mut p = Pipeline::new(ctx)
        .step("negate", |s: Stream<i64>| s.map(|x| -x))
        .sort_step("sort", sort)
        .source(IterSource::new(random_ints(3, 100, 1_000)))
        .sink(sink.clone());

    match p.try_run() {
        Err(ExecError::Operator { step, source: OpError::Spill(_) }) => assert_eq!(step, "sort"),
        other => panic!("expected a spill failure from the sort step, got {other:?}"),
    }
    assert!(sink.is_empty());
    assert!(storage.is_empty());
}

#[test]
fn test_try_run_without_sink_is_an_error() {
    let ctx = Context::default();
    let mut p = numbers_pipeline(&ctx).source(IterSource::new(vec![1i64]));
    match p.try_run() {
        Err(ExecError::Config(msg)) => assert!(msg.contains("sink")),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn test_try_run_without_source_is_an_error() {
    let ctx = Context::default();
    let mut p = numbers_pipeline(&ctx).sink(VecSink::new());
    assert!(matches!(p.try_run(), Err(ExecError::Config(_))));
}

#[test]
#[should_panic(expected = "pipeline has no sink")]
fn test_run_without_sink_panics() {
    let ctx = Context::default();
    let mut p = numbers_pipeline(&ctx).source(IterSource::new(vec![1i64]));
    p.run();
}
