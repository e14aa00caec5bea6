//! External sort: sorted runs on scratch storage, merged back lazily.
//!
//! 1. Fill a window of `window_rows` elements and sort it in memory.
//! 2. Spill each full window as one run under a scratch root private to this
//!    sort (`<spill_dir>/sort-<uuid>`).
//! 3. Re-open every run as a frame-at-a-time reader and k-way merge them into
//!    the output stream.
//! 4. Remove the scratch root on every exit path.
//!
//! An input that never fills a window is emitted straight from memory.
//! Failures stop the output early and are reported by
//! [`SortedStream::finish`].

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use sluice_core::id::RunId;
use sluice_io::FsStorage;
use sluice_mem::{Codec, ResidencyTracker, SpillManager, Storage};
use uuid::Uuid;

use super::run::{RunGenerator, Runs};
use super::SortError;
use crate::ordered::merge_sources;
use crate::stream::{Context, Emitter, Stream};
use crate::traits::{Compare, OpError};

static NEXT_SORT_ID: AtomicU64 = AtomicU64::new(1);

/// What one external sort did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSummary {
    /// Elements read from the input.
    pub rows: u64,
    /// Runs written to storage; 0 when the input fit in one window.
    pub runs: usize,
    pub spilled_bytes: u64,
    /// Elements written to the output.
    pub emitted: u64,
    /// False when every reader of the output went away before the end.
    pub complete: bool,
    pub elapsed: Duration,
}

/// Builder for one external sort.
pub struct ExternalSort<T, C> {
    ctx: Context,
    cmp: C,
    storage: Arc<dyn Storage>,
    codec: Codec,
    window_rows: usize,
    frame_rows: usize,
    spill_dir: String,
    tracker: ResidencyTracker,
    _marker: PhantomData<fn() -> T>,
}

impl<T, C> ExternalSort<T, C>
where
    T: Serialize + DeserializeOwned + Send + 'static,
    C: Compare<T>,
{
    /// Sort settings from `ctx`'s config, spilling to the local filesystem.
    pub fn new(ctx: &Context, cmp: C) -> Result<Self, OpError> {
        let cfg = ctx.config();
        Ok(Self {
            ctx: ctx.clone(),
            cmp,
            storage: Arc::new(FsStorage::new()),
            codec: Codec::from_name(&cfg.spill_codec)?,
            window_rows: cfg.sort_window_rows,
            frame_rows: cfg.spill_frame_rows,
            spill_dir: cfg.spill_dir.clone(),
            tracker: ResidencyTracker::new(),
            _marker: PhantomData,
        })
    }

    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_window_rows(mut self, rows: usize) -> Self {
        self.window_rows = rows.max(1);
        self
    }

    pub fn with_frame_rows(mut self, rows: usize) -> Self {
        self.frame_rows = rows.max(1);
        self
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_spill_dir(mut self, dir: impl Into<String>) -> Self {
        self.spill_dir = dir.into();
        self
    }

    /// Account resident elements against a caller-supplied tracker.
    pub fn with_tracker(mut self, tracker: ResidencyTracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn tracker(&self) -> &ResidencyTracker {
        &self.tracker
    }

    /// Start sorting `input` on its own task.
    pub fn sort(self, input: Stream<T>) -> SortedStream<T> {
        let ctx = self.ctx.clone();
        let (out, stream) = ctx.channel();
        let task = ctx
            .spawn_joinable("external_sort", move || self.execute(input, out))
            .map_err(|e| OpError::Spawn {
                name: "external_sort",
                reason: e.to_string(),
            });
        SortedStream {
            stream,
            handle: SortHandle { task },
        }
    }

    fn execute(self, input: Stream<T>, out: Emitter<T>) -> Result<SortSummary, SortError> {
        let started = Instant::now();
        let sort_id = NEXT_SORT_ID.fetch_add(1, AtomicOrdering::Relaxed);
        let root = format!(
            "{}/sort-{}",
            self.spill_dir.trim_end_matches('/'),
            Uuid::new_v4().simple()
        );
        let mut spill = SpillManager::new(Arc::clone(&self.storage), self.codec, root, RunId::new(sort_id))
            .with_frame_rows(self.frame_rows);

        let outcome = self.run(input, &out, &mut spill);
        drop(out);
        let cleaned = spill.cleanup();

        let mut summary = outcome?;
        if let Err(e) = cleaned {
            return Err(e.into());
        }
        summary.elapsed = started.elapsed();
        tracing::debug!(
            sort = sort_id,
            rows = summary.rows,
            runs = summary.runs,
            spilled_bytes = summary.spilled_bytes,
            complete = summary.complete,
            "external sort finished"
        );
        Ok(summary)
    }

    fn run(&self, input: Stream<T>, out: &Emitter<T>, spill: &mut SpillManager) -> Result<SortSummary, SortError> {
        let mut generator = RunGenerator::new(self.window_rows, &self.tracker);
        let mut rows = 0u64;
        while let Some(item) = input.recv() {
            rows += 1;
            generator.push(item, &self.cmp, spill)?;
        }
        // A cancelled input context ends `recv` early; that is a truncated
        // input, not the end of it.
        let input_cancelled = input.context().is_cancelled();
        drop(input);
        if input_cancelled || self.ctx.is_cancelled() {
            return Err(OpError::Cancelled);
        }

        let mut summary = SortSummary {
            rows,
            runs: 0,
            spilled_bytes: 0,
            emitted: 0,
            complete: true,
            elapsed: Duration::ZERO,
        };

        match generator.finish(&self.cmp, spill)? {
            Runs::InMemory(sorted, _residency) => {
                for item in sorted {
                    if out.send(item).is_err() {
                        break;
                    }
                    summary.emitted += 1;
                }
            }
            Runs::Spilled(segments) => {
                summary.runs = segments.len();
                summary.spilled_bytes = segments.iter().map(|m| m.bytes).sum();

                let mut readers = Vec::with_capacity(segments.len());
                for meta in &segments {
                    readers.push(spill.open_run::<T>(meta)?.track_with(&self.tracker));
                }
                let _heads = self.tracker.acquire(readers.len(), "merge_heads");
                tracing::trace!(runs = readers.len(), "merging spilled runs");

                let mut sent = 0u64;
                merge_sources(readers, &self.cmp, |item| {
                    let delivered = out.send(item).is_ok();
                    if delivered {
                        sent += 1;
                    }
                    delivered
                })?;
                summary.emitted = sent;
            }
        }

        if self.ctx.is_cancelled() {
            return Err(OpError::Cancelled);
        }
        summary.complete = summary.emitted == rows;
        Ok(summary)
    }
}

// Manual impl: `T` only appears behind `PhantomData` and needs no `Clone`.
impl<T, C: Clone> Clone for ExternalSort<T, C> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            cmp: self.cmp.clone(),
            storage: Arc::clone(&self.storage),
            codec: self.codec,
            window_rows: self.window_rows,
            frame_rows: self.frame_rows,
            spill_dir: self.spill_dir.clone(),
            tracker: self.tracker.clone(),
            _marker: PhantomData,
        }
    }
}

/// Completion handle of a running sort.
pub struct SortHandle {
    task: Result<JoinHandle<Result<SortSummary, SortError>>, OpError>,
}

impl SortHandle {
    /// Wait for the sort task and return its outcome. Blocks until the output
    /// is fully drained or every reader of it has been dropped.
    pub fn join(self) -> Result<SortSummary, SortError> {
        match self.task {
            Ok(handle) => handle
                .join()
                .map_err(|_| OpError::TaskPanicked("external_sort"))?,
            Err(e) => Err(e),
        }
    }

    pub fn is_finished(&self) -> bool {
        match &self.task {
            Ok(handle) => handle.is_finished(),
            Err(_) => true,
        }
    }
}

/// Sorted output of an [`ExternalSort`] plus its completion handle.
pub struct SortedStream<T> {
    stream: Stream<T>,
    handle: SortHandle,
}

impl<T> SortedStream<T> {
    /// A reader of the sorted output, for wiring into further operators.
    pub fn stream(&self) -> Stream<T> {
        self.stream.clone()
    }

    pub fn into_parts(self) -> (Stream<T>, SortHandle) {
        (self.stream, self.handle)
    }

    /// Drop this reader and wait for the sort. Elements not read by now are
    /// discarded unless another reader still holds the output.
    pub fn finish(self) -> Result<SortSummary, SortError> {
        drop(self.stream);
        self.handle.join()
    }
}

impl<T> Iterator for SortedStream<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.stream.recv()
    }
}

impl<T> Stream<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    /// External sort with the context's settings and local scratch storage.
    pub fn external_sort<C: Compare<T>>(self, cmp: C) -> Result<SortedStream<T>, SortError> {
        let ctx = self.context().clone();
        Ok(ExternalSort::new(&ctx, cmp)?.sort(self))
    }
}
