//! Cartesian product against a materialized right-hand side.

use std::sync::Arc;

use crate::stream::Stream;

impl<T> Stream<T>
where
    T: Clone + Send + 'static,
{
    /// Every `(x, y)` pair with `x` from `self` and `y` from `other`.
    ///
    /// `other` is collected first. `self` is then read by `parallelism`
    /// concurrent workers; each worker emits the pairs of one `x`
    /// contiguously and in `other`'s order, but pairs of different `x` may
    /// interleave.
    pub fn cartesian<U>(self, other: Stream<U>) -> Stream<(T, U)>
    where
        U: Clone + Send + Sync + 'static,
    {
        let ctx = self.context().clone();
        let (out, stream) = ctx.channel();
        let spawner = ctx.clone();
        ctx.spawn("cartesian", move || {
            let right: Arc<Vec<U>> = Arc::new(other.collect());
            if spawner.is_cancelled() || right.is_empty() {
                return;
            }
            for _ in 0..spawner.parallelism().max(1) {
                let input = self.clone();
                let out = out.clone();
                let right = Arc::clone(&right);
                spawner.spawn("cartesian", move || {
                    for x in input {
                        for y in right.iter() {
                            if out.send((x.clone(), y.clone())).is_err() {
                                return;
                            }
                        }
                    }
                });
            }
        });
        stream
    }
}
