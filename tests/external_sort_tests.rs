//! External sort: correctness, scratch cleanup, memory bound, failures.

mod test_data_gen;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sluice::io::{FsStorage, MemoryStorage};
use sluice::mem::{Codec, ResidencyTracker};
use sluice::{Context, ExternalSort, OpError, SortError};
use test_data_gen::{files_under, is_sorted, random_ints, test_context};

fn asc(a: &i64, b: &i64) -> std::cmp::Ordering {
    a.cmp(b)
}

#[test]
fn test_sorts_ten_thousand_ints_and_removes_scratch_files() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(dir.path(), 32);
    let input = random_ints(2024, 10_000, 1_000_000);

    let mut sorted = ExternalSort::new(&ctx, asc)
        .unwrap()
        .with_window_rows(100)
        .sort(ctx.from_iter(input.clone()));
    let out: Vec<i64> = sorted.by_ref().collect();

    let summary = sorted.finish().unwrap();
    let mut expected = input;
    expected.sort();
    assert_eq!(out, expected);
    assert_eq!(summary.rows, 10_000);
    assert_eq!(summary.emitted, 10_000);
    assert_eq!(summary.runs, 100);
    assert!(summary.complete);
    assert!(summary.spilled_bytes > 0);
    assert!(files_under(dir.path()).is_empty(), "scratch files left behind");
}

#[test]
fn test_residency_stays_within_window_or_run_heads() {
    let window = 100;
    let frame = 16;
    let tracker = ResidencyTracker::new();
    let ctx = Context::default();
    let storage = Arc::new(MemoryStorage::new());

    let sorted = ExternalSort::new(&ctx, asc)
        .unwrap()
        .with_storage(storage.clone())
        .with_spill_dir("mem")
        .with_window_rows(window)
        .with_frame_rows(frame)
        .with_tracker(tracker.clone())
        .sort(ctx.from_iter(random_ints(5, 5_000, 10_000)));
    let (stream, handle) = sorted.into_parts();
    assert!(is_sorted(&stream.collect::<Vec<_>>()));

    let summary = handle.join().unwrap();
    let bound = window.max(summary.runs * (frame + 1));
    assert!(tracker.peak() > 0);
    assert!(tracker.peak() <= bound, "peak {} exceeds {}", tracker.peak(), bound);
    assert_eq!(tracker.current(), 0);
    assert!(storage.is_empty());
}

#[test]
fn test_failing_storage_reports_error_and_leaves_nothing() {
    let ctx = Context::default();
    let storage = Arc::new(MemoryStorage::new());
    storage.fail_writes_after(3);

    let sorted = ExternalSort::new(&ctx, asc)
        .unwrap()
        .with_storage(storage.clone())
        .with_window_rows(50)
        .sort(ctx.from_iter(random_ints(9, 1_000, 100)));
    let (stream, handle) = sorted.into_parts();
    let partial = stream.count();

    let err: SortError = handle.join().unwrap_err();
    assert!(matches!(err, OpError::Spill(_)), "unexpected error: {err}");
    assert!(err.to_string().contains("injected write failure"));
    assert_eq!(partial, 0);
    assert_eq!(storage.write_count(), 3);
    assert!(storage.is_empty());
}

#[test]
fn test_corrupted_frame_surfaces_error() {
    use sluice::mem::Storage;

    #[derive(Clone)]
    struct FlipOnRead(Arc<MemoryStorage>);

    impl Storage for FlipOnRead {
        fn write(&self, path: &str, bytes: &[u8]) -> sluice::mem::Result<()> {
            self.0.write(path, bytes)
        }
        fn read_range(&self, path: &str, offset: u64, len: usize) -> sluice::mem::Result<Vec<u8>> {
            let mut bytes = self.0.read_range(path, offset, len)?;
            // Corrupt frame payloads, never the fixed header.
            if offset > 0 && len > 8 {
                if let Some(b) = bytes.last_mut() {
                    *b ^= 0x20;
                }
            }
            Ok(bytes)
        }
        fn delete(&self, path: &str) -> sluice::mem::Result<()> {
            self.0.delete(path)
        }
        fn list(&self, prefix: &str) -> sluice::mem::Result<Vec<String>> {
            self.0.list(prefix)
        }
        fn size(&self, path: &str) -> sluice::mem::Result<u64> {
            self.0.size(path)
        }
    }

    let ctx = Context::default();
    let inner = Arc::new(MemoryStorage::new());
    let sorted = ExternalSort::new(&ctx, asc)
        .unwrap()
        .with_storage(Arc::new(FlipOnRead(inner.clone())))
        .with_window_rows(20)
        .with_frame_rows(5)
        .sort(ctx.from_iter(random_ints(13, 100, 1_000)));
    let (stream, handle) = sorted.into_parts();
    let _ = stream.count();

    assert!(matches!(handle.join(), Err(OpError::Spill(_))));
    assert!(inner.is_empty());
}

#[test]
fn test_cancellation_stops_sort_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(dir.path(), 16);
    let sorted = ExternalSort::new(&ctx, asc)
        .unwrap()
        .with_storage(Arc::new(FsStorage::new()))
        .with_window_rows(64)
        .sort(ctx.from_iter((0i64..).map(|i| (i * 31) % 1009)));

    std::thread::sleep(std::time::Duration::from_millis(30));
    ctx.cancel();
    assert!(matches!(sorted.finish(), Err(OpError::Cancelled)));
    assert!(files_under(dir.path()).is_empty());
}

#[test]
fn test_dropping_output_early_is_incomplete_not_an_error() {
    let ctx = Context::default();
    let storage = Arc::new(MemoryStorage::new());
    let mut sorted = ExternalSort::new(&ctx, asc)
        .unwrap()
        .with_storage(storage.clone())
        .with_window_rows(10)
        .sort(ctx.from_iter(random_ints(21, 500, 1_000)));
    let head: Vec<i64> = sorted.by_ref().take(5).collect();
    assert!(is_sorted(&head));

    let summary = sorted.finish().unwrap();
    assert!(!summary.complete);
    assert!(summary.emitted < 500);
    assert!(storage.is_empty());
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Event {
    key: String,
    seq: u32,
}

#[test]
fn test_sort_of_records_is_stable_within_runs_and_across_merge() {
    let ctx = Context::default();
    let events: Vec<Event> = (0..300)
        .map(|i| Event {
            key: format!("k{}", i % 7),
            seq: i,
        })
        .collect();

    let sorted = ExternalSort::new(&ctx, |a: &Event, b: &Event| a.key.cmp(&b.key))
        .unwrap()
        .with_storage(Arc::new(MemoryStorage::new()))
        .with_window_rows(40)
        .with_codec(Codec::None)
        .sort(ctx.from_iter(events));
    let out: Vec<Event> = sorted.collect();

    assert_eq!(out.len(), 300);
    for pair in out.windows(2) {
        assert!(pair[0].key <= pair[1].key);
        if pair[0].key == pair[1].key {
            assert!(pair[0].seq < pair[1].seq, "equal keys out of input order");
        }
    }
}

#[cfg(feature = "zstd")]
#[test]
fn test_zstd_codec_round_trip() {
    let ctx = Context::default();
    let input = random_ints(77, 2_000, 50);
    let out: Vec<i64> = ExternalSort::new(&ctx, asc)
        .unwrap()
        .with_storage(Arc::new(MemoryStorage::new()))
        .with_window_rows(128)
        .with_codec(Codec::Zstd)
        .sort(ctx.from_iter(input.clone()))
        .collect();
    let mut expected = input;
    expected.sort();
    assert_eq!(out, expected);
}
