use std::{pin::pin, sync::Arc};

use futures::{Stream, StreamExt, future::join_all};
use thiserror::Error;
use tokio::{
    sync::{
        Mutex,
        mpsc::{self, Receiver, Sender},
    },
    task::{JoinError, JoinHandle},
};
use tracing::{Instrument, debug, info_span, warn};

use crate::{
    httpipe::BoundaryError,
    model::{RequestDescriptor, ResultRecord},
    runtime::handler::{Execute, ResultSink},
};

/// Represents the kind of error that stops a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The pipeline was configured with zero workers.
    #[error("concurrency must be at least 1")]
    InvalidConcurrency,

    /// The request source failed. Requests read before the failure were still executed.
    #[error("failed to read requests: {0}")]
    Source(#[source] BoundaryError),

    /// The result sink failed.
    #[error("failed to write results: {0}")]
    Sink(#[source] BoundaryError),

    /// A pipeline task panicked or was cancelled.
    #[error("pipeline task failed: {0}")]
    Task(#[from] JoinError),
}

/// Counts of a finished run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Requests handed to the workers.
    pub dispatched: usize,
    /// Records delivered to the sink.
    pub completed: usize,
    /// Delivered records that carry a failure.
    pub failed: usize,
}

/// Runs requests through a fixed number of workers.
///
/// A producer task feeds requests in arrival order into a bounded queue shared by the workers.
/// Records come back through a second bounded queue and are handed to the sink in completion
/// order, which differs from arrival order once there is more than one worker.
#[derive(Debug)]
pub struct Pipeline<E> {
    executor: Arc<E>,
    concurrency: usize,
}

impl<E: Execute + 'static> Pipeline<E> {
    /// Creates a pipeline running `concurrency` requests at a time.
    ///
    /// # Errors
    ///
    /// Throws `PipelineError::InvalidConcurrency` if `concurrency` is 0.
    pub fn new(executor: E, concurrency: usize) -> Result<Self, PipelineError> {
        if concurrency == 0 {
            return Err(PipelineError::InvalidConcurrency);
        }
        Ok(Self { executor: Arc::new(executor), concurrency })
    }

    /// Executes every request of `source` and hands each record to `sink`.
    ///
    /// # Errors
    ///
    /// Throws a `PipelineError` if the source or the sink fails, or if a task panics. A source
    /// error is returned after every request read before it has been delivered. A sink error
    /// aborts the run immediately.
    pub async fn run<S, K>(&self, source: S, sink: &mut K) -> Result<PipelineReport, PipelineError>
    where
        S: Stream<Item = Result<RequestDescriptor, BoundaryError>> + Send + 'static,
        K: ResultSink,
    {
        let (request_tx, request_rx) = mpsc::channel(self.concurrency);
        let (result_tx, mut result_rx) = mpsc::channel(self.concurrency);

        let producer = tokio::spawn(produce(source, request_tx));
        let request_rx = Arc::new(Mutex::new(request_rx));
        let workers: Vec<JoinHandle<()>> = (0..self.concurrency)
            .map(|id| {
                let worker = work(Arc::clone(&self.executor), Arc::clone(&request_rx), result_tx.clone());
                tokio::spawn(worker.instrument(info_span!("worker", id)))
            })
            .collect();
        drop(result_tx);
        drop(request_rx);

        let mut report = PipelineReport::default();
        while let Some(record) = result_rx.recv().await {
            report.completed += 1;
            if !record.is_success() {
                report.failed += 1;
            }
            if let Err(error) = sink.accept(record).await {
                producer.abort();
                for worker in &workers {
                    worker.abort();
                }
                return Err(PipelineError::Sink(error));
            }
        }

        let (dispatched, source_error) = producer.await?;
        for result in join_all(workers).await {
            result?;
        }
        report.dispatched = dispatched;

        match source_error {
            Some(error) => Err(PipelineError::Source(error)),
            None => Ok(report),
        }
    }
}

async fn produce<S>(source: S, requests: Sender<RequestDescriptor>) -> (usize, Option<BoundaryError>)
where
    S: Stream<Item = Result<RequestDescriptor, BoundaryError>>,
{
    let mut source = pin!(source);
    let mut dispatched = 0;
    while let Some(item) = source.next().await {
        match item {
            Ok(request) => {
                if requests.send(request).await.is_err() {
                    warn!("all workers stopped, dropping the remaining requests");
                    break;
                }
                dispatched += 1;
            }
            Err(error) => {
                debug!(%error, dispatched, "request source failed");
                return (dispatched, Some(error));
            }
        }
    }
    debug!(dispatched, "request source exhausted");
    (dispatched, None)
}

async fn work<E: Execute>(
    executor: Arc<E>,
    requests: Arc<Mutex<Receiver<RequestDescriptor>>>,
    results: Sender<ResultRecord>,
) {
    loop {
        let next = requests.lock().await.recv().await;
        let Some(request) = next else {
            break;
        };
        let record = executor.execute(request).await;
        if results.send(record).await.is_err() {
            break;
        }
    }
    debug!("worker finished");
}
