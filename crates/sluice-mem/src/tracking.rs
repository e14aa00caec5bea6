//! Residency tracking: how many elements an operator holds in memory.
//!
//! Operators acquire a [`ResidencyGuard`] for every buffer they keep alive and
//! resize it as the buffer grows or drains. Dropping the guard returns its
//! count (panic-safe). The tracker remembers the peak so callers can check an
//! operator's memory bound after the fact.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct TrackerInner {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl TrackerInner {
    fn add(&self, n: usize) {
        let now = self.current.fetch_add(n, Ordering::AcqRel) + n;
        self.record_peak(now);
    }

    fn sub(&self, n: usize) {
        self.current.fetch_sub(n, Ordering::AcqRel);
    }

    fn record_peak(&self, used: usize) {
        let mut cur = self.peak.load(Ordering::Relaxed);
        while used > cur {
            match self
                .peak
                .compare_exchange(cur, used, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(observed) => cur = observed,
            }
        }
    }
}

/// Shared counter of resident elements with peak tracking.
#[derive(Clone, Default)]
pub struct ResidencyTracker {
    inner: Arc<TrackerInner>,
}

impl ResidencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for `count` resident elements until the guard is dropped.
    pub fn acquire(&self, count: usize, tag: &'static str) -> ResidencyGuard {
        self.inner.add(count);
        ResidencyGuard {
            inner: Arc::clone(&self.inner),
            count,
            tag,
        }
    }

    /// Elements currently accounted for (advisory).
    pub fn current(&self) -> usize {
        self.inner.current.load(Ordering::Relaxed)
    }

    /// Highest simultaneous residency observed so far.
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for ResidencyTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResidencyTracker")
            .field("current", &self.current())
            .field("peak", &self.peak())
            .finish()
    }
}

/// RAII guard that accounts for a number of resident elements.
/// Dropping it returns the count to the tracker.
pub struct ResidencyGuard {
    inner: Arc<TrackerInner>,
    count: usize,
    tag: &'static str,
}

impl ResidencyGuard {
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    /// Adjust the accounted count to `new_count`.
    pub fn resize(&mut self, new_count: usize) {
        if new_count > self.count {
            self.inner.add(new_count - self.count);
        } else if new_count < self.count {
            self.inner.sub(self.count - new_count);
        }
        self.count = new_count;
    }
}

impl Drop for ResidencyGuard {
    fn drop(&mut self) {
        if self.count > 0 {
            self.inner.sub(self.count);
            self.count = 0;
        }
    }
}
