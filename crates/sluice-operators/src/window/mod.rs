//! Count-based batching.

use crate::stream::Stream;

impl<T: Send + 'static> Stream<T> {
    /// Group elements into batches of `size` in arrival order. The final
    /// batch may be shorter and is emitted once the input closes. A size of
    /// zero is treated as one.
    pub fn window(self, size: usize) -> Stream<Vec<T>> {
        let size = size.max(1);
        let ctx = self.context().clone();
        ctx.stage("window", self, move |input, out| {
            let mut batch = Vec::with_capacity(size);
            for item in input {
                batch.push(item);
                if batch.len() == size {
                    let full = std::mem::replace(&mut batch, Vec::with_capacity(size));
                    if out.send(full).is_err() {
                        return;
                    }
                }
            }
            if !batch.is_empty() {
                let _ = out.send(batch);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::stream::Context;

    #[test]
    fn emits_full_batches_then_remainder() {
        let ctx = Context::default();
        let out: Vec<Vec<u32>> = ctx.from_iter(1..=7).window(3).collect();
        assert_eq!(out, vec![vec![1, 2, 3], vec![4, 5, 6], vec![7]]);
    }

    #[test]
    fn exact_multiple_has_no_trailing_batch() {
        let ctx = Context::default();
        let out: Vec<Vec<u32>> = ctx.from_iter(1..=4).window(2).collect();
        assert_eq!(out, vec![vec![1, 2], vec![3, 4]]);
    }

    #[test]
    fn empty_input_emits_nothing() {
        let ctx = Context::default();
        let out: Vec<Vec<u32>> = ctx.from_iter(Vec::new()).window(4).collect();
        assert!(out.is_empty());
    }
}
