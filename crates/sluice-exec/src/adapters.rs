//! Plug-in points for opaque producers and consumers.
//!
//! Readers and writers for files, tables or databases live outside the
//! engine; they reach a [`Pipeline`](crate::Pipeline) through these two
//! traits. Closures implement both.

use std::sync::{Arc, Mutex, MutexGuard};

use sluice_operators::{Context, Stream};

/// Produces the initial stream of a pipeline run.
pub trait Source<T>: Send {
    fn open(&mut self, ctx: &Context) -> Stream<T>;
}

impl<T, F> Source<T> for F
where
    F: FnMut(&Context) -> Stream<T> + Send,
{
    fn open(&mut self, ctx: &Context) -> Stream<T> {
        self(ctx)
    }
}

/// Consumes the final stream of a pipeline run. `consume` returns once the
/// sink is done with the stream.
pub trait Sink<T>: Send {
    fn consume(&mut self, stream: Stream<T>);
}

impl<T, F> Sink<T> for F
where
    F: FnMut(Stream<T>) + Send,
{
    fn consume(&mut self, stream: Stream<T>) {
        self(stream)
    }
}

/// Source that replays a cloneable collection on every run.
#[derive(Debug, Clone)]
pub struct IterSource<I> {
    items: I,
}

impl<I> IterSource<I> {
    pub fn new(items: I) -> Self {
        Self { items }
    }
}

impl<I> Source<I::Item> for IterSource<I>
where
    I: IntoIterator + Clone + Send + 'static,
    I::Item: Send + 'static,
{
    fn open(&mut self, ctx: &Context) -> Stream<I::Item> {
        ctx.from_iter(self.items.clone())
    }
}

/// Sink that collects everything into a shared vector.
///
/// Clones share the buffer, so keep one clone to read the results after the
/// pipeline has taken the other.
#[derive(Debug)]
pub struct VecSink<T> {
    items: Arc<Mutex<Vec<T>>>,
}

impl<T> VecSink<T> {
    pub fn new() -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Take the collected items, leaving the sink empty.
    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T> Clone for VecSink<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T> Default for VecSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> Sink<T> for VecSink<T> {
    fn consume(&mut self, stream: Stream<T>) {
        let mut items = self.lock();
        items.extend(stream);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iter_source_replays() {
        let ctx = Context::default();
        let mut source = IterSource::new(vec![1, 2, 3]);
        assert_eq!(source.open(&ctx).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(source.open(&ctx).count(), 3);
    }

    #[test]
    fn vec_sink_shares_buffer() {
        let ctx = Context::default();
        let sink = VecSink::new();
        let mut handle = sink.clone();
        handle.consume(ctx.from_iter(0..4));
        assert_eq!(sink.len(), 4);
        assert_eq!(sink.take(), vec![0, 1, 2, 3]);
        assert!(sink.is_empty());
    }

    #[test]
    fn closures_are_sources_and_sinks() {
        let ctx = Context::default();
        let mut source = |ctx: &Context| ctx.from_iter(vec!["a", "b"]);
        let mut seen = 0;
        let mut sink = |s: Stream<&'static str>| seen += s.count();
        Sink::consume(&mut sink, Source::open(&mut source, &ctx));
        assert_eq!(seen, 2);
    }
}
