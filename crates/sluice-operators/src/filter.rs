//! Predicate-driven operators: filter, distinct, take_while, drop_while,
//! partition.

use std::collections::HashSet;
use std::hash::Hash;

use crate::stream::Stream;

impl<T: Send + 'static> Stream<T> {
    /// Forward elements satisfying `pred`, order preserved.
    pub fn filter<F>(self, mut pred: F) -> Stream<T>
    where
        F: FnMut(&T) -> bool + Send + 'static,
    {
        let ctx = self.context().clone();
        ctx.stage("filter", self, move |input, out| {
            for item in input {
                if pred(&item) && out.send(item).is_err() {
                    break;
                }
            }
        })
    }

    /// Drop repeats, keeping the first occurrence of every value.
    ///
    /// Remembers every distinct value seen, so memory grows with the number
    /// of distinct values.
    pub fn distinct(self) -> Stream<T>
    where
        T: Eq + Hash + Clone,
    {
        let ctx = self.context().clone();
        ctx.stage("distinct", self, move |input, out| {
            let mut seen = HashSet::new();
            for item in input {
                if seen.insert(item.clone()) && out.send(item).is_err() {
                    break;
                }
            }
        })
    }

    /// Forward elements until the first one failing `pred`, then close.
    ///
    /// The rest of the input is not drained. If other readers keep the input
    /// alive, its producer stays blocked once the buffer fills.
    pub fn take_while<F>(self, mut pred: F) -> Stream<T>
    where
        F: FnMut(&T) -> bool + Send + 'static,
    {
        let ctx = self.context().clone();
        ctx.stage("take_while", self, move |input, out| {
            for item in input {
                if !pred(&item) || out.send(item).is_err() {
                    break;
                }
            }
        })
    }

    /// Skip the leading run of elements satisfying `pred`; forward the first
    /// failing element and everything after it.
    pub fn drop_while<F>(self, mut pred: F) -> Stream<T>
    where
        F: FnMut(&T) -> bool + Send + 'static,
    {
        let ctx = self.context().clone();
        ctx.stage("drop_while", self, move |input, out| {
            let mut dropping = true;
            for item in input {
                if dropping {
                    if pred(&item) {
                        continue;
                    }
                    dropping = false;
                }
                if out.send(item).is_err() {
                    break;
                }
            }
        })
    }

    /// Split into `(matching, rest)`. Every element goes to exactly one side;
    /// both close when the input closes.
    ///
    /// Both outputs must be read: a full side blocks the task and with it the
    /// other side.
    pub fn partition<F>(self, mut pred: F) -> (Stream<T>, Stream<T>)
    where
        F: FnMut(&T) -> bool + Send + 'static,
    {
        let ctx = self.context().clone();
        let (yes, yes_stream) = ctx.channel();
        let (no, no_stream) = ctx.channel();
        ctx.spawn("partition", move || {
            for item in self {
                let side = if pred(&item) { &yes } else { &no };
                if side.send(item).is_err() {
                    break;
                }
            }
        });
        (yes_stream, no_stream)
    }
}
