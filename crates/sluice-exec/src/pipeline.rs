//! Pipeline: named steps folded over a stream, with optional source and sink.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use sluice_core::id::{RunId, StepId};
use sluice_operators::sort::{ExternalSort, SortHandle, SortedStream};
use sluice_operators::{Compare, Context, OpError, Stream};
use thiserror::Error;

use crate::adapters::{Sink, Source};
use crate::metrics::emit_span;

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("pipeline configuration: {0}")]
    Config(String),
    /// A sort step failed; joined after the sink returned.
    #[error("step '{step}': {source}")]
    Operator {
        step: String,
        #[source]
        source: OpError,
    },
}

enum Apply<T> {
    Stream(Box<dyn Fn(Stream<T>) -> Stream<T> + Send + Sync>),
    /// Steps whose task reports an outcome after its output is drained.
    Sort(Box<dyn Fn(Stream<T>) -> SortedStream<T> + Send + Sync>),
}

struct Step<T> {
    id: StepId,
    name: String,
    apply: Apply<T>,
}

/// Completion handles of the sort steps applied in one composition.
type Pending = Vec<(String, SortHandle)>;

/// Outcome of one [`Pipeline::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub run_id: RunId,
    pub steps: usize,
    /// Elements that reached the sink.
    pub rows_out: u64,
    /// The context was cancelled before the sink returned.
    pub cancelled: bool,
    pub elapsed: Duration,
}

pub struct Pipeline<T> {
    ctx: Context,
    steps: Vec<Step<T>>,
    source: Option<Box<dyn Source<T>>>,
    sink: Option<Box<dyn Sink<T>>>,
}

impl<T: Send + 'static> Pipeline<T> {
    /// Empty pipeline whose source streams are created from `ctx`.
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            steps: Vec::new(),
            source: None,
            sink: None,
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Append a step (builder form).
    pub fn step<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Stream<T>) -> Stream<T> + Send + Sync + 'static,
    {
        self.add_step(name, f);
        self
    }

    /// Append a step; returns its id.
    pub fn add_step<F>(&mut self, name: impl Into<String>, f: F) -> StepId
    where
        F: Fn(Stream<T>) -> Stream<T> + Send + Sync + 'static,
    {
        self.push_step(name.into(), Apply::Stream(Box::new(f)))
    }

    fn push_step(&mut self, name: String, apply: Apply<T>) -> StepId {
        let id = StepId::new(self.steps.len() as u64);
        self.steps.push(Step { id, name, apply });
        id
    }

    pub fn source(mut self, source: impl Source<T> + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn sink(mut self, sink: impl Sink<T> + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn set_source(&mut self, source: impl Source<T> + 'static) {
        self.source = Some(Box::new(source));
    }

    pub fn set_sink(&mut self, sink: impl Sink<T> + 'static) {
        self.sink = Some(Box::new(sink));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step names in application order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Apply every step, in order, to a stream the caller already has.
    ///
    /// Sort steps run detached here: a failed sort only shows up as a short
    /// output. Use [`try_run`](Self::try_run) to have their errors reported.
    pub fn compute(&self, input: Stream<T>) -> Stream<T> {
        self.compose(input).0
    }

    fn compose(&self, input: Stream<T>) -> (Stream<T>, Pending) {
        let mut pending = Pending::new();
        let output = self.steps.iter().fold(input, |stream, step| {
            tracing::trace!(step = %step.name, id = step.id.get(), "applying step");
            match &step.apply {
                Apply::Stream(f) => f(stream),
                Apply::Sort(f) => {
                    let (stream, handle) = f(stream).into_parts();
                    pending.push((step.name.clone(), handle));
                    stream
                }
            }
        });
        (output, pending)
    }

    /// Like [`run`](Self::run), but every failure is returned: a missing
    /// source or sink as [`ExecError::Config`], a failed sort step as
    /// [`ExecError::Operator`].
    pub fn try_run(&mut self) -> Result<RunStats, ExecError> {
        let run_id = RunId::new(NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed));
        let started = Instant::now();

        let source = self
            .source
            .as_mut()
            .ok_or_else(|| ExecError::Config("pipeline has no source".into()))?;
        if self.sink.is_none() {
            return Err(ExecError::Config("pipeline has no sink".into()));
        }

        tracing::debug!(run = %run_id, steps = self.steps.len(), "pipeline run started");
        let input = source.open(&self.ctx);
        let rows_out = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&rows_out);
        let (output, pending) = self.compose(input);
        let output = output.map(move |item| {
            counter.fetch_add(1, Ordering::Relaxed);
            item
        });

        if let Some(sink) = self.sink.as_mut() {
            sink.consume(output);
        }

        // The sink has dropped its reader, so every sort task can finish.
        let mut failure = None;
        for (step, handle) in pending {
            match handle.join() {
                Ok(summary) => {
                    tracing::trace!(step = %step, rows = summary.rows, runs = summary.runs, "sort step finished");
                }
                Err(OpError::Cancelled) if self.ctx.is_cancelled() => {}
                Err(source) => {
                    tracing::warn!(step = %step, error = %source, "sort step failed");
                    failure.get_or_insert(ExecError::Operator { step, source });
                }
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }

        let stats = RunStats {
            run_id,
            steps: self.steps.len(),
            rows_out: rows_out.load(Ordering::Relaxed),
            cancelled: self.ctx.is_cancelled(),
            elapsed: started.elapsed(),
        };
        emit_span(
            "pipeline_run",
            &[
                ("run", stats.run_id.to_string()),
                ("steps", stats.steps.to_string()),
                ("rows_out", stats.rows_out.to_string()),
                ("elapsed_ms", stats.elapsed.as_millis().to_string()),
            ],
        );
        Ok(stats)
    }

    /// Source, then every step, then sink. Returns when the sink and every
    /// sort step have finished.
    ///
    /// # Panics
    /// If the source or the sink was never set, or a sort step failed.
    pub fn run(&mut self) -> RunStats {
        match self.try_run() {
            Ok(stats) => stats,
            Err(e) => panic!("invalid pipeline: {e}"),
        }
    }
}

impl<T> Pipeline<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    /// Append an external sort step (builder form).
    pub fn sort_step<C>(mut self, name: impl Into<String>, sort: ExternalSort<T, C>) -> Self
    where
        C: Compare<T> + Clone,
    {
        self.add_sort_step(name, sort);
        self
    }

    /// Append an external sort step; its errors are reported by
    /// [`try_run`](Self::try_run). Each run sorts with a fresh copy of `sort`.
    pub fn add_sort_step<C>(&mut self, name: impl Into<String>, sort: ExternalSort<T, C>) -> StepId
    where
        C: Compare<T> + Clone,
    {
        self.push_step(name.into(), Apply::Sort(Box::new(move |s: Stream<T>| sort.clone().sort(s))))
    }
}

impl<T> fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("steps", &self.steps.iter().map(|s| &s.name).collect::<Vec<_>>())
            .field("has_source", &self.source.is_some())
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}
