//! Hash-set backed intersection and subtraction.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use crate::stream::Stream;

impl<T> Stream<T>
where
    T: Eq + Hash + Send + Sync + 'static,
{
    /// Elements of `self` that also occur in `other`.
    ///
    /// `other` is fully drained into a lookup set before `self` is read.
    /// `self` is then filtered by `parallelism` concurrent readers, so output
    /// order is only preserved when the context's parallelism is 1.
    /// Duplicates in `self` are kept.
    pub fn intersection(self, other: Stream<T>) -> Stream<T> {
        self.membership("intersection", other, true)
    }

    /// Elements of `self` that do not occur in `other`. Same materialization
    /// and ordering rules as [`Stream::intersection`].
    pub fn subtraction(self, other: Stream<T>) -> Stream<T> {
        self.membership("subtraction", other, false)
    }

    fn membership(self, name: &'static str, other: Stream<T>, keep_present: bool) -> Stream<T> {
        let ctx = self.context().clone();
        let (out, stream) = ctx.channel();
        let spawner = ctx.clone();
        ctx.spawn(name, move || {
            let lookup: Arc<HashSet<T>> = Arc::new(other.collect());
            if spawner.is_cancelled() {
                return;
            }
            let workers = spawner.parallelism().max(1);
            tracing::trace!(op = name, set_size = lookup.len(), workers, "lookup set built");
            for _ in 0..workers {
                let input = self.clone();
                let out = out.clone();
                let lookup = Arc::clone(&lookup);
                spawner.spawn(name, move || {
                    for item in input {
                        if lookup.contains(&item) == keep_present && out.send(item).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        stream
    }
}
