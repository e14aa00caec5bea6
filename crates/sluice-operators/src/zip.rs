//! Positional pairing of two streams.

use crate::stream::Stream;

impl<T: Send + 'static> Stream<T> {
    /// Pair the n-th element of `self` with the n-th element of `other`.
    /// Closes as soon as either side ends; the longer side is left unread.
    pub fn zip<U: Send + 'static>(self, other: Stream<U>) -> Stream<(T, U)> {
        let ctx = self.context().clone();
        ctx.stage("zip", self, move |left, out| {
            while let Some(a) = left.recv() {
                let Some(b) = other.recv() else {
                    break;
                };
                if out.send((a, b)).is_err() {
                    break;
                }
            }
        })
    }
}
