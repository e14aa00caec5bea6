//! Inner and left sort-merge join.
//!
//! The comparator relates a left element to a right element by join key.
//! For each left element the matching run of right elements (the "group")
//! is collected once and reused for every following left element with the
//! same key. A left element with no group produces nothing (inner) or one
//! `combine(left, None)` record (left join).
//!
//! The group buffer has no upper bound: a key with many duplicates on the
//! right is held in memory in full.

use std::cmp::Ordering;

use crate::stream::{Emitter, Stream};

impl<L: Send + 'static> Stream<L> {
    /// Emit `combine(l, r)` for every pair with equal keys.
    pub fn inner_join<R, O, C, F>(self, right: Stream<R>, cmp: C, mut combine: F) -> Stream<O>
    where
        R: Send + 'static,
        O: Send + 'static,
        C: Fn(&L, &R) -> Ordering + Send + 'static,
        F: FnMut(&L, &R) -> O + Send + 'static,
    {
        let ctx = self.context().clone();
        ctx.stage("inner_join", self, move |left, out| {
            merge_join(left, right, &cmp, &out, |l, r| r.map(|r| combine(l, r)));
        })
    }

    /// Like [`inner_join`](Self::inner_join), but every unmatched left element
    /// yields `combine(l, None)`.
    pub fn left_join<R, O, C, F>(self, right: Stream<R>, cmp: C, mut combine: F) -> Stream<O>
    where
        R: Send + 'static,
        O: Send + 'static,
        C: Fn(&L, &R) -> Ordering + Send + 'static,
        F: FnMut(&L, Option<&R>) -> O + Send + 'static,
    {
        let ctx = self.context().clone();
        ctx.stage("left_join", self, move |left, out| {
            merge_join(left, right, &cmp, &out, |l, r| Some(combine(l, r)));
        })
    }
}

/// Shared join loop. `emit` receives each left element with either one
/// matching right element or `None`, and returns the record to write, if any.
fn merge_join<L, R, O, C, E>(left: Stream<L>, right: Stream<R>, cmp: &C, out: &Emitter<O>, mut emit: E)
where
    C: Fn(&L, &R) -> Ordering,
    E: FnMut(&L, Option<&R>) -> Option<O>,
{
    let mut head = right.recv();
    let mut group: Vec<R> = Vec::new();

    for l in left {
        if group.first().is_some_and(|first| cmp(&l, first) == Ordering::Greater) {
            group.clear();
        }

        if group.is_empty() {
            while let Some(r) = head.take() {
                match cmp(&l, &r) {
                    Ordering::Greater => head = right.recv(),
                    Ordering::Equal => {
                        group.push(r);
                        head = right.recv();
                    }
                    Ordering::Less => {
                        head = Some(r);
                        break;
                    }
                }
            }
        }

        // A stale group only survives here when the left input is out of order.
        let matched = group.first().is_some_and(|r| cmp(&l, r) == Ordering::Equal);
        if matched {
            for r in &group {
                if let Some(rec) = emit(&l, Some(r)) {
                    if out.send(rec).is_err() {
                        return;
                    }
                }
            }
        } else if let Some(rec) = emit(&l, None) {
            if out.send(rec).is_err() {
                return;
            }
        }
    }
}
