//! # Cover Fetch Pool
//!
//! Background cover-art lookups with bounded concurrency and a bounded queue.
//!
//! ## Overview
//!
//! - A fixed number of workers (default 3) share one job queue (default
//!   capacity 100)
//! - [`CoverFetchPool::submit`] waits for queue room; it fails with
//!   [`MetadataError::PoolClosed`] once the pool is shutting down
//! - [`CoverFetchPool::submit_async`] never waits and drops the job when the
//!   queue is full; dropped jobs are not retried
//! - Each job's callback runs on the worker that executed it, after the
//!   resolver returned
//!
//! ## Shutdown
//!
//! [`CoverFetchPool::stop`] closes the queue, lets the workers finish every
//! running and already-queued job, and returns once they have exited. No
//! callback runs after `stop` returns.
//!
//! ## Usage
//!
//! ```ignore
//! use core_metadata::{CoverFetchConfig, CoverFetchPool, CoverJob};
//!
//! let pool = CoverFetchPool::new(CoverFetchConfig::default(), resolver)?;
//!
//! let job = CoverJob::new(tab.id.clone(), request, covers_dir.join("cover.jpg"))
//!     .on_complete(|outcome| Box::pin(async move {
//!         println!("{:?}", outcome.result_path);
//!     }));
//! pool.submit(job).await?;
//!
//! pool.stop().await;
//! ```

use crate::error::{MetadataError, Result};
use bridge_traits::cover::{CoverRequest, CoverResolver};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_WORKERS: usize = 3;
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

// =============================================================================
// Configuration
// =============================================================================

/// Pool sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverFetchConfig {
    /// Number of worker tasks
    pub workers: usize,

    /// Jobs that may wait in the queue
    pub queue_capacity: usize,
}

impl Default for CoverFetchConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl CoverFetchConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(MetadataError::InvalidConfig(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(MetadataError::InvalidConfig(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Jobs
// =============================================================================

/// Result of one cover lookup, handed to the job callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverOutcome {
    pub tab_id: String,
    /// Destination file, set only on success
    pub result_path: Option<PathBuf>,
    /// Resolver error, set only on failure
    pub error: Option<String>,
}

impl CoverOutcome {
    pub fn is_success(&self) -> bool {
        self.result_path.is_some()
    }
}

/// Completion callback, awaited on the worker that ran the job.
pub type CoverCallback = Box<dyn FnOnce(CoverOutcome) -> BoxFuture<'static, ()> + Send>;

/// A single cover lookup.
pub struct CoverJob {
    pub tab_id: String,
    pub request: CoverRequest,
    /// Where the resolver writes the image
    pub destination: PathBuf,
    callback: Option<CoverCallback>,
}

impl CoverJob {
    pub fn new(tab_id: impl Into<String>, request: CoverRequest, destination: PathBuf) -> Self {
        Self {
            tab_id: tab_id.into(),
            request,
            destination,
            callback: None,
        }
    }

    /// Attach the completion callback.
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(CoverOutcome) -> BoxFuture<'static, ()> + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for CoverJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoverJob")
            .field("tab_id", &self.tab_id)
            .field("request", &self.request)
            .field("destination", &self.destination)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

// =============================================================================
// Pool
// =============================================================================

/// Counters since the pool started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverPoolStats {
    pub submitted: u64,
    pub dropped: u64,
    pub succeeded: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    dropped: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

/// Bounded worker pool for cover lookups.
///
/// Must be created inside a Tokio runtime; workers are spawned immediately.
pub struct CoverFetchPool {
    config: CoverFetchConfig,
    sender: Mutex<Option<mpsc::Sender<CoverJob>>>,
    workers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
    shutdown: CancellationToken,
    counters: Arc<Counters>,
}

impl CoverFetchPool {
    /// Start `config.workers` workers over `resolver`.
    pub fn new(config: CoverFetchConfig, resolver: Arc<dyn CoverResolver>) -> Result<Self> {
        config.validate()?;

        let (sender, receiver) = mpsc::channel::<CoverJob>(config.queue_capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let counters = Arc::new(Counters::default());

        let workers = (0..config.workers)
            .map(|worker_id| {
                let receiver = Arc::clone(&receiver);
                let resolver = Arc::clone(&resolver);
                let counters = Arc::clone(&counters);
                tokio::spawn(worker_loop(worker_id, receiver, resolver, counters))
            })
            .collect();

        info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "Cover fetch pool started"
        );

        Ok(Self {
            config,
            sender: Mutex::new(Some(sender)),
            workers: tokio::sync::Mutex::new(workers),
            shutdown: CancellationToken::new(),
            counters,
        })
    }

    pub fn config(&self) -> CoverFetchConfig {
        self.config
    }

    /// False once [`CoverFetchPool::stop`] has been called.
    pub fn is_running(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Jobs currently waiting in the queue.
    pub fn queued(&self) -> usize {
        self.sender
            .lock()
            .as_ref()
            .map(|sender| sender.max_capacity() - sender.capacity())
            .unwrap_or(0)
    }

    pub fn stats(&self) -> CoverPoolStats {
        CoverPoolStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Queue a job, waiting for room if the queue is full.
    ///
    /// # Errors
    ///
    /// [`MetadataError::PoolClosed`] if the pool is stopped, or starts
    /// stopping while this call waits.
    pub async fn submit(&self, job: CoverJob) -> Result<()> {
        let sender = self.sender.lock().clone().ok_or(MetadataError::PoolClosed)?;

        tokio::select! {
            sent = sender.send(job) => {
                sent.map_err(|_| MetadataError::PoolClosed)?;
            }
            _ = self.shutdown.cancelled() => return Err(MetadataError::PoolClosed),
        }

        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Queue a job without waiting.
    ///
    /// Returns `false` if the job was dropped because the queue is full or
    /// the pool is stopped.
    pub fn submit_async(&self, job: CoverJob) -> bool {
        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            debug!(tab_id = %job.tab_id, "Cover pool closed, dropping job");
            return false;
        };

        match sender.try_send(job) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(job)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(tab_id = %job.tab_id, "Cover queue full, dropping job");
                false
            }
            Err(TrySendError::Closed(job)) => {
                debug!(tab_id = %job.tab_id, "Cover queue closed, dropping job");
                false
            }
        }
    }

    /// Close the queue and wait for every running and queued job to finish.
    ///
    /// Calling `stop` again is a no-op.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        let sender = self.sender.lock().take();
        drop(sender);

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock().await);
        if handles.is_empty() {
            return;
        }

        debug!(workers = handles.len(), "Draining cover fetch pool");
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "Cover worker terminated abnormally");
            }
        }

        let stats = self.stats();
        info!(
            succeeded = stats.succeeded,
            failed = stats.failed,
            dropped = stats.dropped,
            "Cover fetch pool stopped"
        );
    }
}

async fn worker_loop(
    worker_id: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<CoverJob>>>,
    resolver: Arc<dyn CoverResolver>,
    counters: Arc<Counters>,
) {
    loop {
        let job = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };

        // Queue closed and drained
        let Some(job) = job else { break };

        run_job(worker_id, job, resolver.as_ref(), &counters).await;
    }

    debug!(worker_id, "Cover worker exiting");
}

async fn run_job(
    worker_id: usize,
    job: CoverJob,
    resolver: &dyn CoverResolver,
    counters: &Counters,
) {
    let CoverJob {
        tab_id,
        request,
        destination,
        callback,
    } = job;

    debug!(worker_id, tab_id = %tab_id, "Resolving cover");

    let result = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent)
            .await
            .map_err(|err| err.to_string()),
        _ => Ok(()),
    };
    let result = match result {
        Ok(()) => resolver
            .resolve(&request, &destination)
            .await
            .map_err(|err| err.to_string()),
        Err(err) => Err(err),
    };

    let outcome = match result {
        Ok(()) => {
            counters.succeeded.fetch_add(1, Ordering::Relaxed);
            CoverOutcome {
                tab_id,
                result_path: Some(destination),
                error: None,
            }
        }
        Err(error) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            debug!(worker_id, tab_id = %tab_id, error = %error, "No cover resolved");
            CoverOutcome {
                tab_id,
                result_path: None,
                error: Some(error),
            }
        }
    };

    if let Some(callback) = callback {
        callback(outcome).await;
    }
}
