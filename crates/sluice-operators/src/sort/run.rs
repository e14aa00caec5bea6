//! Run generation for external sort.
//!
//! Accumulates up to `window_rows` elements, sorts the window, and writes it
//! to spill as one run. An input that never fills a window stays in memory.

use std::cmp::Ordering;

use serde::Serialize;
use sluice_mem::{ResidencyGuard, ResidencyTracker, SegmentMeta, SpillManager};

use super::in_memory::sort_by;
use crate::traits::OpError;

/// Result of run generation.
pub enum Runs<T> {
    /// Everything fit in one window; sorted, never spilled. The guard keeps
    /// the rows accounted for until they are emitted.
    InMemory(Vec<T>, ResidencyGuard),
    /// Sorted runs on storage, in the order they were written.
    Spilled(Vec<SegmentMeta>),
}

pub struct RunGenerator<T> {
    window_rows: usize,
    buffer: Vec<T>,
    residency: ResidencyGuard,
    runs: Vec<SegmentMeta>,
}

impl<T: Serialize> RunGenerator<T> {
    pub fn new(window_rows: usize, tracker: &ResidencyTracker) -> Self {
        let window_rows = window_rows.max(1);
        Self {
            window_rows,
            buffer: Vec::with_capacity(window_rows.min(64 * 1024)),
            residency: tracker.acquire(0, "sort_window"),
            runs: Vec::new(),
        }
    }

    /// Add one element; spills the window once it is full.
    pub fn push<C>(&mut self, item: T, cmp: &C, spill: &mut SpillManager) -> Result<(), OpError>
    where
        C: Fn(&T, &T) -> Ordering + ?Sized,
    {
        self.buffer.push(item);
        self.residency.resize(self.buffer.len());
        if self.buffer.len() >= self.window_rows {
            self.flush_run(cmp, spill)?;
        }
        Ok(())
    }

    pub fn spilled_runs(&self) -> usize {
        self.runs.len()
    }

    fn flush_run<C>(&mut self, cmp: &C, spill: &mut SpillManager) -> Result<(), OpError>
    where
        C: Fn(&T, &T) -> Ordering + ?Sized,
    {
        if self.buffer.is_empty() {
            return Ok(());
        }
        sort_by(&mut self.buffer, cmp);
        let meta = spill.write_run(&self.buffer)?;
        tracing::debug!(run = self.runs.len(), rows = meta.rows, bytes = meta.bytes, "spilled sorted run");
        self.runs.push(meta);
        self.buffer.clear();
        self.residency.resize(0);
        Ok(())
    }

    /// Flush what is left. Returns the in-memory window if nothing was spilled.
    pub fn finish<C>(mut self, cmp: &C, spill: &mut SpillManager) -> Result<Runs<T>, OpError>
    where
        C: Fn(&T, &T) -> Ordering + ?Sized,
    {
        if self.runs.is_empty() {
            sort_by(&mut self.buffer, cmp);
            return Ok(Runs::InMemory(self.buffer, self.residency));
        }
        self.flush_run(cmp, spill)?;
        Ok(Runs::Spilled(self.runs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::id::RunId;
    use sluice_io::MemoryStorage;
    use sluice_mem::Codec;
    use std::sync::Arc;

    fn cmp(a: &i64, b: &i64) -> Ordering {
        a.cmp(b)
    }

    fn manager(storage: Arc<MemoryStorage>) -> SpillManager {
        SpillManager::new(storage, Codec::None, "mem/sort-test".into(), RunId::new(7)).with_frame_rows(2)
    }

    #[test]
    fn small_input_stays_in_memory() {
        let storage = Arc::new(MemoryStorage::new());
        let mut spill = manager(storage.clone());
        let tracker = ResidencyTracker::new();
        let mut gen = RunGenerator::new(10, &tracker);
        for v in [3, 1, 2] {
            gen.push(v, &cmp, &mut spill).unwrap();
        }
        match gen.finish(&cmp, &mut spill).unwrap() {
            Runs::InMemory(rows, guard) => {
                assert_eq!(rows, vec![1, 2, 3]);
                assert_eq!(guard.count(), 3);
            }
            Runs::Spilled(_) => panic!("expected in-memory result"),
        }
        assert_eq!(storage.write_count(), 0);
        assert_eq!(tracker.current(), 0);
    }

    #[test]
    fn full_windows_are_spilled() {
        let storage = Arc::new(MemoryStorage::new());
        let mut spill = manager(storage.clone());
        let tracker = ResidencyTracker::new();
        let mut gen = RunGenerator::new(4, &tracker);
        for v in (0..10).rev() {
            gen.push(v, &cmp, &mut spill).unwrap();
        }
        assert_eq!(gen.spilled_runs(), 2);
        let Runs::Spilled(runs) = gen.finish(&cmp, &mut spill).unwrap() else {
            panic!("expected spilled runs");
        };
        assert_eq!(runs.iter().map(|m| m.rows).collect::<Vec<_>>(), vec![4, 4, 2]);
        assert_eq!(tracker.peak(), 4);

        let first: Vec<i64> = spill
            .open_run(&runs[0])
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(first, vec![6, 7, 8, 9]);
    }
}
