//! Stable in-memory sort.

use std::cmp::Ordering;

use crate::stream::Stream;
use crate::traits::Compare;

/// Stable sort of `items` under `cmp`.
pub fn sort_by<T, C>(items: &mut [T], cmp: &C)
where
    C: Fn(&T, &T) -> Ordering + ?Sized,
{
    items.sort_by(|a, b| cmp(a, b));
}

impl<T: Send + 'static> Stream<T> {
    /// Buffer the whole input, sort it, then emit it. Memory grows with the
    /// input; use [`external_sort`](Stream::external_sort) for large inputs.
    pub fn sort_in_memory<C: Compare<T>>(self, cmp: C) -> Stream<T> {
        let ctx = self.context().clone();
        ctx.stage("sort", self, move |input, out| {
            let mut items: Vec<T> = input.collect();
            if out.is_cancelled() {
                return;
            }
            sort_by(&mut items, &cmp);
            let _ = out.send_all(items);
        })
    }
}
