use crate::stream::{Context, Stream};

/// Interleave every input into one output. One task per input; the output
/// closes after the last input is exhausted. No ordering between sources.
pub fn union<T: Send + 'static>(ctx: &Context, inputs: Vec<Stream<T>>) -> Stream<T> {
    let (out, stream) = ctx.channel();
    for input in inputs {
        let out = out.clone();
        ctx.spawn("union", move || {
            for item in input {
                if out.send(item).is_err() {
                    break;
                }
            }
        });
    }
    // Only the per-input clones keep the output open from here on.
    drop(out);
    stream
}

impl<T: Send + 'static> Stream<T> {
    /// Union of `self` and `other`; see [`union`].
    pub fn union(self, other: Stream<T>) -> Stream<T> {
        let ctx = self.context().clone();
        union(&ctx, vec![self, other])
    }
}
