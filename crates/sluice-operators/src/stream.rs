//! The stream primitive: a bounded, closable MPMC queue between tasks.
//!
//! A [`Stream`] is the reading side; cloning it adds another competing
//! reader, and every value is delivered to exactly one of them. The writing
//! side is an [`Emitter`], owned by the single producing task. The stream
//! closes when the last emitter is dropped; readers observe that as the end
//! of the sequence once the buffer is drained.
//!
//! Writes block while the stream is full. That is the only flow control in
//! the engine.
//!
//! Limitation: a consumer that stops reading but keeps its `Stream` alive
//! leaves the producer blocked on its next write. Cancel the [`Context`] to
//! release it, or drop every reader so the producer observes
//! [`Halted::Disconnected`].

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, select, Receiver, Sender};
use sluice_core::{CancelToken, StreamConfig};
use thiserror::Error;

/// Why a write could not be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Halted {
    #[error("stream context was cancelled")]
    Cancelled,
    #[error("every reader of the stream was dropped")]
    Disconnected,
}

struct ContextInner {
    config: StreamConfig,
    cancel: CancelToken,
    live_tasks: AtomicUsize,
}

/// Configuration and cancellation shared by every stream of one graph.
///
/// Cheap to clone. Operators inherit the context of their input stream, so a
/// whole pipeline built from one source shares one context.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// Build a context from a validated config.
    pub fn new(config: StreamConfig) -> sluice_core::Result<Self> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: StreamConfig) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                config,
                cancel: CancelToken::new(),
                live_tasks: AtomicUsize::new(0),
            }),
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.inner.config
    }

    pub fn capacity(&self) -> usize {
        self.inner.config.capacity
    }

    pub fn parallelism(&self) -> usize {
        self.inner.config.parallelism
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.inner.cancel
    }

    /// Cancel every task and blocked read or write in this graph.
    pub fn cancel(&self) {
        tracing::debug!("stream context cancelled");
        self.inner.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Number of operator tasks spawned from this context that are still running.
    pub fn active_tasks(&self) -> usize {
        self.inner.live_tasks.load(Ordering::Acquire)
    }

    /// Create a stream with the context's default capacity.
    pub fn channel<T>(&self) -> (Emitter<T>, Stream<T>) {
        self.channel_with_capacity(self.capacity())
    }

    pub fn channel_with_capacity<T>(&self, capacity: usize) -> (Emitter<T>, Stream<T>) {
        let (tx, rx) = bounded(capacity.max(1));
        (
            Emitter {
                tx,
                cancel: self.inner.cancel.clone(),
            },
            Stream {
                rx,
                ctx: self.clone(),
            },
        )
    }

    /// Source task that writes every item of `iter`, then closes the stream.
    pub fn from_iter<I>(&self, iter: I) -> Stream<I::Item>
    where
        I: IntoIterator + Send + 'static,
        I::Item: Send + 'static,
    {
        let (out, stream) = self.channel();
        self.spawn("source", move || {
            for item in iter {
                if out.send(item).is_err() {
                    break;
                }
            }
        });
        stream
    }

    /// Spawn a detached operator task. If the thread cannot be created the
    /// closure is dropped, which closes any stream it owned.
    pub fn spawn<F>(&self, name: &'static str, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Err(e) = self.spawn_joinable(name, f) {
            tracing::error!(task = name, error = %e, "failed to spawn operator task");
        }
    }

    /// Spawn an operator task and keep its handle.
    pub fn spawn_joinable<F, R>(&self, name: &'static str, f: F) -> std::io::Result<JoinHandle<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let live = LiveTask::enter(Arc::clone(&self.inner));
        std::thread::Builder::new()
            .name(format!("sluice-{name}"))
            .spawn(move || {
                let _live = live;
                tracing::trace!(task = name, "task started");
                let out = f();
                tracing::trace!(task = name, "task finished");
                out
            })
    }

    /// Spawn a task that drains `input` into a fresh output stream.
    pub(crate) fn stage<T, U, F>(&self, name: &'static str, input: Stream<T>, body: F) -> Stream<U>
    where
        T: Send + 'static,
        U: Send + 'static,
        F: FnOnce(Stream<T>, Emitter<U>) + Send + 'static,
    {
        let (out, stream) = self.channel();
        self.spawn(name, move || body(input, out));
        stream
    }
}

impl Default for Context {
    /// Context built from the process-wide defaults.
    fn default() -> Self {
        let config = StreamConfig::process_default();
        match config.validate() {
            Ok(()) => Self::from_valid(config),
            Err(e) => {
                tracing::warn!(error = %e, "invalid environment config, using built-in defaults");
                Self::from_valid(StreamConfig::default())
            }
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.inner.config)
            .field("cancelled", &self.is_cancelled())
            .field("active_tasks", &self.active_tasks())
            .finish()
    }
}

/// Counts a running task for `Context::active_tasks`.
struct LiveTask {
    inner: Arc<ContextInner>,
}

impl LiveTask {
    fn enter(inner: Arc<ContextInner>) -> Self {
        inner.live_tasks.fetch_add(1, Ordering::AcqRel);
        Self { inner }
    }
}

impl Drop for LiveTask {
    fn drop(&mut self) {
        self.inner.live_tasks.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Writing side of a stream. Dropping the last emitter closes the stream.
pub struct Emitter<T> {
    tx: Sender<T>,
    cancel: CancelToken,
}

impl<T> Emitter<T> {
    /// Write one value, blocking while the stream is full.
    pub fn send(&self, value: T) -> Result<(), Halted> {
        if self.cancel.is_cancelled() {
            return Err(Halted::Cancelled);
        }
        select! {
            send(self.tx, value) -> res => res.map_err(|_| Halted::Disconnected),
            recv(self.cancel.signal()) -> _ => Err(Halted::Cancelled),
        }
    }

    /// Write every item, stopping at the first halted write.
    pub fn send_all<I>(&self, items: I) -> Result<(), Halted>
    where
        I: IntoIterator<Item = T>,
    {
        for item in items {
            self.send(item)?;
        }
        Ok(())
    }

    /// Whether the owning context has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Values queued and not yet read.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

// Extra emitters are only handed to tasks that share one logical output
// (union, fanned-out filters); the stream closes when the last one drops.
impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

/// Reading side of a stream.
pub struct Stream<T> {
    rx: Receiver<T>,
    ctx: Context,
}

impl<T> Stream<T> {
    /// Next value, blocking until one arrives. `None` once the stream is
    /// closed and drained, or the context is cancelled.
    pub fn recv(&self) -> Option<T> {
        if self.ctx.is_cancelled() {
            return None;
        }
        select! {
            recv(self.rx) -> msg => msg.ok(),
            recv(self.ctx.cancel_token().signal()) -> _ => None,
        }
    }

    /// Next value if one is already queued.
    pub fn try_recv(&self) -> Option<T> {
        if self.ctx.is_cancelled() {
            return None;
        }
        self.rx.try_recv().ok()
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn capacity(&self) -> usize {
        self.rx.capacity().unwrap_or(usize::MAX)
    }

    /// Values queued and not yet read.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Read and discard everything; returns how many values were drained.
    pub fn drain(self) -> usize {
        self.count()
    }
}

impl<T> Clone for Stream<T> {
    /// Another competing reader of the same stream.
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
            ctx: self.ctx.clone(),
        }
    }
}

impl<T> Iterator for Stream<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.recv()
    }
}

impl<T> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ctx(capacity: usize) -> Context {
        Context::new(StreamConfig::default().with_capacity(capacity)).unwrap()
    }

    #[test]
    fn closes_when_last_emitter_drops() {
        let ctx = ctx(4);
        let (tx, rx) = ctx.channel::<u32>();
        let tx2 = tx.clone();
        tx.send(1).unwrap();
        drop(tx);
        tx2.send(2).unwrap();
        drop(tx2);
        assert_eq!(rx.collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn send_after_readers_dropped_is_disconnected() {
        let ctx = ctx(4);
        let (tx, rx) = ctx.channel::<u32>();
        drop(rx);
        assert_eq!(tx.send(1), Err(Halted::Disconnected));
    }

    #[test]
    fn cancel_releases_blocked_writer() {
        let ctx = ctx(1);
        let (tx, _rx) = ctx.channel::<u32>();
        tx.send(1).unwrap();

        let writer = std::thread::spawn(move || tx.send(2));
        std::thread::sleep(Duration::from_millis(20));
        ctx.cancel();
        assert_eq!(writer.join().unwrap(), Err(Halted::Cancelled));
    }

    #[test]
    fn from_iter_task_exits_after_close() {
        let ctx = ctx(2);
        let out: Vec<_> = ctx.from_iter(0..10).collect();
        assert_eq!(out, (0..10).collect::<Vec<_>>());

        for _ in 0..100 {
            if ctx.active_tasks() == 0 {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("source task still running");
    }

    #[test]
    fn zero_capacity_config_is_rejected() {
        assert!(Context::new(StreamConfig::default().with_capacity(0)).is_err());
    }
}
