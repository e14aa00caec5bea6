//! Order-verifying pass-through for inputs of the ordered algorithms.

use std::cmp::Ordering;
use std::sync::{Arc, Mutex};

use crate::stream::Stream;
use crate::traits::Compare;

/// First out-of-order position seen by [`checked`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderViolation {
    /// Zero-based index of the element that compared less than its predecessor.
    pub position: u64,
}

#[derive(Debug, Default)]
struct ReportState {
    first: Option<OrderViolation>,
    violations: u64,
    seen: u64,
    finished: bool,
}

/// Shared view of what [`checked`] observed. Complete once the checked
/// stream has closed.
#[derive(Debug, Clone, Default)]
pub struct OrderReport {
    state: Arc<Mutex<ReportState>>,
}

impl OrderReport {
    fn with<R>(&self, f: impl FnOnce(&mut ReportState) -> R) -> R {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    pub fn first_violation(&self) -> Option<OrderViolation> {
        self.with(|s| s.first)
    }

    pub fn violations(&self) -> u64 {
        self.with(|s| s.violations)
    }

    pub fn elements_seen(&self) -> u64 {
        self.with(|s| s.seen)
    }

    /// Whether the checked stream has been fully forwarded.
    pub fn is_finished(&self) -> bool {
        self.with(|s| s.finished)
    }

    pub fn is_sorted(&self) -> bool {
        self.violations() == 0
    }
}

/// Forward `input` unchanged while checking it is non-decreasing under `cmp`.
pub fn checked<T, C>(input: Stream<T>, cmp: C) -> (Stream<T>, OrderReport)
where
    T: Clone + Send + 'static,
    C: Compare<T>,
{
    let report = OrderReport::default();
    let task_report = report.clone();
    let ctx = input.context().clone();
    let stream = ctx.stage("checked", input, move |input, out| {
        let mut prev: Option<T> = None;
        let mut position = 0u64;
        for item in input {
            if let Some(p) = prev.as_ref() {
                if cmp(&item, p) == Ordering::Less {
                    task_report.with(|s| {
                        s.violations += 1;
                        s.first.get_or_insert(OrderViolation { position });
                    });
                }
            }
            prev = Some(item.clone());
            position += 1;
            if out.send(item).is_err() {
                break;
            }
        }
        task_report.with(|s| {
            s.seen = position;
            s.finished = true;
        });
    });
    (stream, report)
}
