//! k-way merge by linear scan over per-source heads.

use std::cmp::Ordering;
use std::convert::Infallible;

use crate::stream::{Context, Stream};
use crate::traits::Compare;

/// Current head of one source plus the rest of it.
struct MergeCursor<T, I> {
    head: T,
    source: I,
}

/// Merge sorted fallible sources, handing each output value to `emit`.
///
/// The minimal head is found by a linear scan. On ties the earliest source
/// wins, so merging a single sorted source returns it unchanged. A source
/// error aborts the merge. `emit` returns `false` to stop early. Returns the
/// number of values `emit` accepted.
pub fn merge_sources<T, E, I, C, F>(sources: Vec<I>, cmp: &C, mut emit: F) -> Result<u64, E>
where
    I: Iterator<Item = Result<T, E>>,
    C: Fn(&T, &T) -> Ordering + ?Sized,
    F: FnMut(T) -> bool,
{
    let mut cursors = Vec::with_capacity(sources.len());
    for mut source in sources {
        if let Some(first) = source.next() {
            cursors.push(MergeCursor {
                head: first?,
                source,
            });
        }
    }

    let mut emitted = 0u64;
    while !cursors.is_empty() {
        let mut best = 0;
        for i in 1..cursors.len() {
            if cmp(&cursors[i].head, &cursors[best].head) == Ordering::Less {
                best = i;
            }
        }

        let value = match cursors[best].source.next() {
            Some(next) => std::mem::replace(&mut cursors[best].head, next?),
            // `remove` keeps the remaining sources in order for tie-breaking.
            None => cursors.remove(best).head,
        };
        if !emit(value) {
            break;
        }
        emitted += 1;
    }
    Ok(emitted)
}

/// Merge sorted streams into one sorted stream.
pub fn merge<T, C>(ctx: &Context, cmp: C, inputs: Vec<Stream<T>>) -> Stream<T>
where
    T: Send + 'static,
    C: Compare<T>,
{
    let (out, stream) = ctx.channel();
    ctx.spawn("merge", move || {
        let sources: Vec<_> = inputs
            .into_iter()
            .map(|s| Iterator::map(s, Ok::<T, Infallible>))
            .collect();
        let merged = merge_sources(sources, &cmp, |value| out.send(value).is_ok());
        if let Ok(n) = merged {
            tracing::trace!(emitted = n, "merge finished");
        }
    });
    stream
}

impl<T: Send + 'static> Stream<T> {
    /// Merge two sorted streams; see [`merge`].
    pub fn merge_sorted<C: Compare<T>>(self, other: Stream<T>, cmp: C) -> Stream<T> {
        let ctx = self.context().clone();
        merge(&ctx, cmp, vec![self, other])
    }
}
