//! Bounded background retry queue for cache writes
//!
//! Callers enqueue and move on. A single worker applies writes in order and
//! retries failures with exponential backoff; writes that exhaust their
//! attempts are logged and counted rather than dropped silently.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::manager::StateManager;
use super::messages::StateError;

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Set { key: String, value: String },
    Delete { key: String },
    Invalidate { pattern: String },
}

impl WriteOp {
    pub fn key(&self) -> &str {
        match self {
            Self::Set { key, .. } | Self::Delete { key } => key,
            Self::Invalidate { pattern } => pattern,
        }
    }
}

/// Destination for queued writes
#[async_trait]
pub trait WriteSink: Send + Sync {
    async fn apply(&self, op: &WriteOp) -> Result<(), StateError>;
}

#[async_trait]
impl WriteSink for StateManager {
    async fn apply(&self, op: &WriteOp) -> Result<(), StateError> {
        match op {
            WriteOp::Set { key, value } => self.set_value(key, value.clone()).await,
            WriteOp::Delete { key } => self.delete_value(key).await.map(|_| ()),
            WriteOp::Invalidate { pattern } => self.invalidate(pattern).await.map(|_| ()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WriteQueueConfig {
    pub capacity: usize,
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for WriteQueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff: DEFAULT_BASE_BACKOFF,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    applied: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> WriteQueueStats {
        WriteQueueStats {
            applied: self.applied.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of queue counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteQueueStats {
    pub applied: u64,
    pub retried: u64,
    pub failed: u64,
    /// Writes refused because the queue was full
    pub rejected: u64,
}

/// Handle to the write-behind worker
#[derive(Clone)]
pub struct WriteQueue {
    tx: mpsc::Sender<WriteOp>,
    counters: Arc<Counters>,
}

impl WriteQueue {
    /// Spawn the worker; it stops when every handle has been dropped
    pub fn spawn(sink: Arc<dyn WriteSink>, config: WriteQueueConfig) -> (Self, JoinHandle<()>) {
        debug!(?config, "WriteQueue::spawn: called");
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let counters = Arc::new(Counters::default());
        let handle = tokio::spawn(worker(sink, rx, config, counters.clone()));
        (Self { tx, counters }, handle)
    }

    /// Queue a write without waiting; returns false if the queue is full
    /// or the worker is gone
    pub fn enqueue(&self, op: WriteOp) -> bool {
        match self.tx.try_send(op) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(op)) => {
                warn!(key = op.key(), "WriteQueue::enqueue: queue full, write refused");
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(mpsc::error::TrySendError::Closed(op)) => {
                warn!(key = op.key(), "WriteQueue::enqueue: worker stopped, write refused");
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> bool {
        self.enqueue(WriteOp::Set {
            key: key.into(),
            value: value.into(),
        })
    }

    pub fn stats(&self) -> WriteQueueStats {
        self.counters.snapshot()
    }
}

async fn worker(
    sink: Arc<dyn WriteSink>,
    mut rx: mpsc::Receiver<WriteOp>,
    config: WriteQueueConfig,
    counters: Arc<Counters>,
) {
    debug!("WriteQueue worker started");
    while let Some(op) = rx.recv().await {
        let mut attempt = 1;
        loop {
            match sink.apply(&op).await {
                Ok(()) => {
                    counters.applied.fetch_add(1, Ordering::Relaxed);
                    break;
                }
                Err(e) if attempt < config.max_attempts => {
                    let delay = config.base_backoff * 2u32.saturating_pow(attempt - 1);
                    debug!(key = op.key(), attempt, ?delay, error = %e, "WriteQueue: write failed, retrying");
                    counters.retried.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(key = op.key(), attempts = attempt, error = %e, "WriteQueue: write failed permanently");
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }
        }
    }
    debug!("WriteQueue worker stopped");
}
