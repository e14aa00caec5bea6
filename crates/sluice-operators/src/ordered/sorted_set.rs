//! Two-pointer intersect/subtract over sorted streams.
//!
//! Both use multiset semantics: each element of `other` cancels at most one
//! equal element of `self`. Memory use is one buffered value per side.

use std::cmp::Ordering;

use crate::stream::{Emitter, Stream};
use crate::traits::Compare;

#[derive(Clone, Copy, PartialEq, Eq)]
enum SetMode {
    Intersect,
    Subtract,
}

impl<T: Send + 'static> Stream<T> {
    /// Sorted intersection: `[1,2,2,3,5] ∩ [2,2,4,5] = [2,2,5]`.
    pub fn intersect_sorted<C: Compare<T>>(self, other: Stream<T>, cmp: C) -> Stream<T> {
        let ctx = self.context().clone();
        ctx.stage("intersect_sorted", self, move |a, out| {
            sorted_set(a, other, &cmp, &out, SetMode::Intersect);
        })
    }

    /// Sorted difference: `[1,2,2,3,5] − [2,2,4,5] = [1,3]`.
    pub fn subtract_sorted<C: Compare<T>>(self, other: Stream<T>, cmp: C) -> Stream<T> {
        let ctx = self.context().clone();
        ctx.stage("subtract_sorted", self, move |a, out| {
            sorted_set(a, other, &cmp, &out, SetMode::Subtract);
        })
    }
}

fn sorted_set<T, C>(a: Stream<T>, b: Stream<T>, cmp: &C, out: &Emitter<T>, mode: SetMode)
where
    C: Compare<T>,
{
    let mut x = a.recv();
    let mut y = b.recv();
    while let Some(left) = x.take() {
        let Some(right) = y.take() else {
            // `b` is exhausted: nothing left to intersect, everything left survives subtraction.
            if mode == SetMode::Subtract && out.send(left).is_ok() {
                for rest in a {
                    if out.send(rest).is_err() {
                        break;
                    }
                }
            }
            return;
        };

        match cmp(&left, &right) {
            Ordering::Less => {
                if mode == SetMode::Subtract && out.send(left).is_err() {
                    return;
                }
                x = a.recv();
                y = Some(right);
            }
            Ordering::Greater => {
                x = Some(left);
                y = b.recv();
            }
            Ordering::Equal => {
                if mode == SetMode::Intersect && out.send(left).is_err() {
                    return;
                }
                x = a.recv();
                y = b.recv();
            }
        }
    }
}
