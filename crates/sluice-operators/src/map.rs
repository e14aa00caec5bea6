//! Element-wise transforms: map, flat_map, scan.

use crate::stream::Stream;

impl<T: Send + 'static> Stream<T> {
    /// Apply `f` to every element, preserving order.
    pub fn map<U, F>(self, mut f: F) -> Stream<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> U + Send + 'static,
    {
        let ctx = self.context().clone();
        ctx.stage("map", self, move |input, out| {
            for item in input {
                if out.send(f(item)).is_err() {
                    break;
                }
            }
        })
    }

    /// Expand every element into zero or more outputs, in order.
    pub fn flat_map<U, I, F>(self, mut f: F) -> Stream<U>
    where
        U: Send + 'static,
        I: IntoIterator<Item = U>,
        F: FnMut(T) -> I + Send + 'static,
    {
        let ctx = self.context().clone();
        ctx.stage("flat_map", self, move |input, out| {
            for item in input {
                if out.send_all(f(item)).is_err() {
                    break;
                }
            }
        })
    }

    /// Running fold: emits the accumulator after every element.
    ///
    /// `scan(0, |acc, x| acc + x)` over `[1, 2, 3]` yields `[1, 3, 6]`.
    pub fn scan<S, F>(self, init: S, mut f: F) -> Stream<S>
    where
        S: Clone + Send + 'static,
        F: FnMut(S, T) -> S + Send + 'static,
    {
        let ctx = self.context().clone();
        ctx.stage("scan", self, move |input, out| {
            let mut acc = init;
            for item in input {
                acc = f(acc, item);
                if out.send(acc.clone()).is_err() {
                    break;
                }
            }
        })
    }
}
