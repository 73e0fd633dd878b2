//! Deferred deletion worker pool.
//!
//! Criteria-based deletes are accepted on the request path and executed later
//! by a fixed set of workers sharing one queue. Every queued or running task
//! holds a slot; with `worker_count + queue_capacity` slots taken, `submit`
//! waits for a worker to free one. Task failures are logged by the worker and
//! never reach the submitter.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::ports::BannerRepositoryError;
use crate::domain::{FeatureId, TagId};

/// Worker count used when nothing else is configured.
pub const DEFAULT_DELETION_WORKERS: usize = 5;

/// Sizing of the worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionPoolConfig {
    /// Number of long-lived workers.
    pub worker_count: usize,
    /// Tasks that may wait in the queue while every worker is busy. Zero means
    /// submitters wait for a free worker.
    pub queue_capacity: usize,
}

impl Default for DeletionPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_DELETION_WORKERS,
            queue_capacity: 0,
        }
    }
}

/// Errors raised when constructing or feeding the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeletionPoolError {
    /// The pool was configured without workers.
    #[error("deletion worker pool requires at least one worker")]
    NoWorkers,
    /// Every worker is busy and the queue is full.
    #[error("deletion worker pool is saturated")]
    Saturated,
    /// The pool has been shut down.
    #[error("deletion worker pool is closed")]
    Closed,
}

/// A unit of deferred deletion work for one `(feature, tag)` criterion.
pub struct DeletionTask {
    feature_id: FeatureId,
    tag_id: TagId,
    work: BoxFuture<'static, Result<(), BannerRepositoryError>>,
}

impl DeletionTask {
    /// Wrap the future that performs the delete.
    pub fn new<F>(feature_id: FeatureId, tag_id: TagId, work: F) -> Self
    where
        F: Future<Output = Result<(), BannerRepositoryError>> + Send + 'static,
    {
        Self {
            feature_id,
            tag_id,
            work: Box::pin(work),
        }
    }

    /// Feature criterion this task deletes by.
    pub fn feature_id(&self) -> FeatureId {
        self.feature_id
    }

    /// Tag criterion this task deletes by.
    pub fn tag_id(&self) -> TagId {
        self.tag_id
    }
}

impl std::fmt::Debug for DeletionTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeletionTask")
            .field("feature_id", &self.feature_id)
            .field("tag_id", &self.tag_id)
            .finish_non_exhaustive()
    }
}

struct QueuedTask {
    task: DeletionTask,
    _slot: OwnedSemaphorePermit,
}

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<QueuedTask>>>;

/// Fixed pool of deletion workers fed from a single queue.
///
/// Construct once at startup and hand it to the services that defer work.
/// Must be created inside a Tokio runtime.
pub struct DeletionWorkerPool {
    sender: Mutex<Option<mpsc::UnboundedSender<QueuedTask>>>,
    slots: Arc<Semaphore>,
    slot_count: usize,
    worker_count: usize,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl DeletionWorkerPool {
    /// Start the workers.
    pub fn new(config: DeletionPoolConfig) -> Result<Self, DeletionPoolError> {
        if config.worker_count == 0 {
            return Err(DeletionPoolError::NoWorkers);
        }

        let (sender, receiver) = mpsc::unbounded_channel::<QueuedTask>();
        let receiver: SharedReceiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let slot_count = config.worker_count + config.queue_capacity;

        let workers = (0..config.worker_count)
            .map(|worker| tokio::spawn(run_worker(worker, Arc::clone(&receiver))))
            .collect();

        info!(
            workers = config.worker_count,
            queue_capacity = config.queue_capacity,
            "deletion worker pool started"
        );

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            slots: Arc::new(Semaphore::new(slot_count)),
            slot_count,
            worker_count: config.worker_count,
            workers: Mutex::new(workers),
        })
    }

    /// Queue a task, waiting for a free slot when the pool is saturated.
    pub async fn submit(&self, task: DeletionTask) -> Result<(), DeletionPoolError> {
        let slot = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| DeletionPoolError::Closed)?;
        self.enqueue(task, slot)
    }

    /// Queue a task only if a slot is free right now.
    pub fn try_submit(&self, task: DeletionTask) -> Result<(), DeletionPoolError> {
        let slot = Arc::clone(&self.slots)
            .try_acquire_owned()
            .map_err(|err| match err {
                TryAcquireError::NoPermits => DeletionPoolError::Saturated,
                TryAcquireError::Closed => DeletionPoolError::Closed,
            })?;
        self.enqueue(task, slot)
    }

    fn enqueue(
        &self,
        task: DeletionTask,
        slot: OwnedSemaphorePermit,
    ) -> Result<(), DeletionPoolError> {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = guard.as_ref().ok_or(DeletionPoolError::Closed)?;
        sender
            .send(QueuedTask { task, _slot: slot })
            .map_err(|_| DeletionPoolError::Closed)
    }

    /// Tasks currently queued or running.
    pub fn pending(&self) -> usize {
        self.slot_count.saturating_sub(self.slots.available_permits())
    }

    /// Number of workers draining the queue.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Stop accepting tasks and wait for queued and running tasks to finish.
    ///
    /// Calling this more than once is harmless.
    pub async fn shutdown(&self) {
        self.slots.close();
        drop(
            self.sender
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        let workers = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for handle in workers {
            if let Err(err) = handle.await {
                warn!(error = %err, "deletion worker exited abnormally");
            }
        }
        info!("deletion worker pool drained");
    }
}

async fn run_worker(worker: usize, receiver: SharedReceiver) {
    loop {
        let next = {
            let mut queue = receiver.lock().await;
            queue.recv().await
        };
        let Some(QueuedTask { task, _slot }) = next else {
            debug!(worker, "deletion queue closed; worker exiting");
            return;
        };

        let DeletionTask {
            feature_id,
            tag_id,
            work,
        } = task;
        match AssertUnwindSafe(work).catch_unwind().await {
            Ok(Ok(())) => debug!(worker, %feature_id, %tag_id, "deferred deletion completed"),
            Ok(Err(err)) => error!(
                worker,
                %feature_id,
                %tag_id,
                error = %err,
                "deferred deletion failed"
            ),
            Err(_) => error!(worker, %feature_id, %tag_id, "deferred deletion panicked"),
        }
    }
}
