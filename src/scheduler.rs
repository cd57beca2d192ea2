//! Bounded worker pool for upstream-bound jobs.
//! Jobs go through a bounded tokio mpsc queue; a fixed number of worker tasks share
//! the receiver and reply on a oneshot channel, so a request handler only ever awaits.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use crate::error::{RelayError, Result};
use crate::metrics::{metric_names, MetricsRegistry};
use crate::orchestrator::Relay;
use crate::segment::Segmentation;
use crate::translate::Translation;

/// Work executed on a pool worker.
#[derive(Debug)]
pub enum Job {
    Translate {
        request_id: String,
        text: String,
        from_language: String,
        to_language: String,
        enqueued_at: Instant,
        reply: oneshot::Sender<Translation>,
    },
    Segment {
        request_id: String,
        description: String,
        enqueued_at: Instant,
        reply: oneshot::Sender<Result<Segmentation>>,
    },
}

/// The scheduler owns the job queue and the worker tasks draining it.
pub struct Scheduler {
    tx: mpsc::Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl Scheduler {
    /// Spawn `workers` tasks executing jobs against `relay`. Must be called inside a
    /// tokio runtime.
    pub fn start(
        relay: Arc<Relay>,
        metrics: Arc<MetricsRegistry>,
        workers: usize,
        queue_depth: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let shutdown = CancellationToken::new();

        let handles = (0..workers.max(1))
            .map(|id| {
                run_worker(
                    id,
                    Arc::clone(&rx),
                    Arc::clone(&relay),
                    Arc::clone(&metrics),
                    shutdown.child_token(),
                )
            })
            .collect();

        info!(workers, queue_depth, "worker pool started");
        Self {
            tx,
            workers: handles,
            shutdown,
        }
    }

    /// Submit a job. Waits for a queue slot when the queue is full (back-pressure).
    pub async fn submit(&self, job: Job) -> Result<()> {
        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!("job queue full, awaiting slot");
                self.tx.send(job).await.map_err(|_| RelayError::QueueClosed)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!("job queue closed");
                Err(RelayError::QueueClosed)
            }
        }
    }

    /// Run a translation on a worker and wait for its result.
    pub async fn translate(&self, text: &str, from: &str, to: &str) -> Result<Translation> {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::Translate {
            request_id: uuid::Uuid::new_v4().to_string(),
            text: text.to_string(),
            from_language: from.to_string(),
            to_language: to.to_string(),
            enqueued_at: Instant::now(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| RelayError::WorkerDropped)
    }

    /// Run a segmentation on a worker and wait for its result.
    pub async fn segment(&self, description: &str) -> Result<Segmentation> {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::Segment {
            request_id: uuid::Uuid::new_v4().to_string(),
            description: description.to_string(),
            enqueued_at: Instant::now(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| RelayError::WorkerDropped)?
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop accepting work and wait for the workers to finish their current job.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        drop(self.tx);
        for handle in self.workers {
            if let Err(e) = handle.await {
                error!(error = %e, "worker task panicked");
            }
        }
        info!("worker pool stopped");
    }
}

fn run_worker(
    id: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    relay: Arc<Relay>,
    metrics: Arc<MetricsRegistry>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(worker = id, "worker started");
        loop {
            let job = tokio::select! {
                _ = shutdown.cancelled() => break,
                job = async { rx.lock().await.recv().await } => job,
            };
            let Some(job) = job else {
                break;
            };
            handle_job(job, &relay, &metrics).await;
        }
        debug!(worker = id, "worker exiting");
    })
}

async fn handle_job(job: Job, relay: &Relay, metrics: &MetricsRegistry) {
    match job {
        Job::Translate {
            request_id,
            text,
            from_language,
            to_language,
            enqueued_at,
            reply,
        } => {
            metrics.observe(metric_names::QUEUE_WAIT, enqueued_at.elapsed());
            let span = tracing::info_span!("translate", %request_id);
            let result = relay
                .translate(&text, &from_language, &to_language)
                .instrument(span)
                .await;
            if reply.send(result).is_err() {
                debug!(%request_id, "translation requester went away");
            }
        }
        Job::Segment {
            request_id,
            description,
            enqueued_at,
            reply,
        } => {
            metrics.observe(metric_names::QUEUE_WAIT, enqueued_at.elapsed());
            let span = tracing::info_span!("segment", %request_id);
            let result = relay.segment(&description).instrument(span).await;
            if reply.send(result).is_err() {
                debug!(%request_id, "segmentation requester went away");
            }
        }
    }
}
