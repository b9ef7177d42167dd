//! In-process job queue
//!
//! Jobs carry an optional unique key: repeated enqueues of the same key
//! while the earlier job is still pending collapse into one execution.
//! Delivery to the worker is at-least-once; handler failures retry with
//! backoff before being dropped with an error log.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use shared::types::Timestamp;
use shared::util::now_secs;

/// Retry policy (matches the background-worker defaults elsewhere)
const MAX_RETRY_COUNT: u32 = 3;
const RETRY_BASE_DELAY_SECS: u64 = 5;

/// Well-known job kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobKind {
    AnalyzePatterns,
    ShipmentStatusUpdate,
    ShipmentStatusChange,
}

impl JobKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AnalyzePatterns => "analyzePatterns",
            Self::ShipmentStatusUpdate => "shipmentStatusUpdate",
            Self::ShipmentStatusChange => "shipmentStatusChange",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub kind: JobKind,
    /// Dedup key; enqueues of a pending key collapse
    pub unique_key: Option<String>,
    /// Earliest execution time (unix seconds)
    pub run_at: Timestamp,
    /// JSON payload: `{organizationId, businessUnitId, userId, timestamp, …}`
    pub payload: Value,
}

/// Something that executes jobs.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> anyhow::Result<()>;
}

/// Producer half of the queue. Cheap to clone.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
    pending_keys: Arc<DashMap<String, Timestamp>>,
}

impl JobQueue {
    /// Create the queue and its consumer channel.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Job>) {
        let (tx, rx) = mpsc::channel(buffer);
        (
            Self {
                tx,
                pending_keys: Arc::new(DashMap::new()),
            },
            rx,
        )
    }

    /// Enqueue a job. Returns false when a pending job with the same unique
    /// key absorbed this enqueue (dedup window), true when queued.
    pub async fn enqueue(&self, job: Job) -> bool {
        if let Some(key) = &job.unique_key {
            // collapse while an earlier enqueue is still pending
            let already_pending = self.pending_keys.contains_key(key);
            if already_pending {
                tracing::debug!(key = %key, kind = %job.kind, "duplicate enqueue collapsed");
                return false;
            }
            self.pending_keys.insert(key.clone(), job.run_at);
        }
        if let Err(err) = self.tx.send(job).await {
            // channel closed: at-least-once cannot hold during shutdown
            tracing::error!(error = %err, "job queue closed; job dropped");
            if let Some(key) = &err.0.unique_key {
                self.pending_keys.remove(key);
            }
            return false;
        }
        true
    }

    fn pending_keys(&self) -> Arc<DashMap<String, Timestamp>> {
        Arc::clone(&self.pending_keys)
    }
}

/// Consumer half: waits out each job's delay, then hands it to the handler
/// with bounded retries.
pub struct JobWorker {
    rx: mpsc::Receiver<Job>,
    handler: Arc<dyn JobHandler>,
    pending_keys: Arc<DashMap<String, Timestamp>>,
    shutdown: CancellationToken,
}

impl JobWorker {
    pub fn new(
        queue: &JobQueue,
        rx: mpsc::Receiver<Job>,
        handler: Arc<dyn JobHandler>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            rx,
            handler,
            pending_keys: queue.pending_keys(),
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("Job worker started");
        loop {
            let job = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Job worker stopping");
                    break;
                }
                job = self.rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            self.process(job).await;
        }
    }

    async fn process(&self, job: Job) {
        let wait = job.run_at - now_secs();
        if wait > 0 {
            tokio::select! {
                _ = self.shutdown.cancelled() => return,
                _ = tokio::time::sleep(Duration::from_secs(wait as u64)) => {}
            }
        }
        // the dedup window closes once execution starts
        if let Some(key) = &job.unique_key {
            self.pending_keys.remove(key);
        }

        let mut attempt = 0;
        loop {
            match self.handler.handle(&job).await {
                Ok(()) => return,
                Err(err) if attempt < MAX_RETRY_COUNT => {
                    attempt += 1;
                    let delay = RETRY_BASE_DELAY_SECS * u64::from(attempt);
                    tracing::warn!(
                        kind = %job.kind, attempt, error = %err,
                        "job failed, retrying in {delay}s"
                    );
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                }
                Err(err) => {
                    tracing::error!(kind = %job.kind, error = %err, "job failed permanently");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(AtomicUsize);

    #[async_trait]
    impl JobHandler for Counter {
        async fn handle(&self, _job: &Job) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn job(key: Option<&str>, run_at: Timestamp) -> Job {
        Job {
            kind: JobKind::AnalyzePatterns,
            unique_key: key.map(String::from),
            run_at,
            payload: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn duplicate_keys_collapse_within_window() {
        let (queue, _rx) = JobQueue::new(8);
        assert!(queue.enqueue(job(Some("k1"), now_secs() + 60)).await);
        assert!(!queue.enqueue(job(Some("k1"), now_secs() + 60)).await);
        // a different key is independent
        assert!(queue.enqueue(job(Some("k2"), now_secs() + 60)).await);
    }

    #[tokio::test]
    async fn keyless_jobs_never_collapse() {
        let (queue, _rx) = JobQueue::new(8);
        assert!(queue.enqueue(job(None, 0)).await);
        assert!(queue.enqueue(job(None, 0)).await);
    }

    #[tokio::test]
    async fn worker_runs_due_jobs() {
        let (queue, rx) = JobQueue::new(8);
        let handler = Arc::new(Counter(AtomicUsize::new(0)));
        let shutdown = CancellationToken::new();
        let worker = JobWorker::new(&queue, rx, handler.clone(), shutdown.clone());
        let handle = tokio::spawn(worker.run());

        queue.enqueue(job(Some("k"), 0)).await;
        queue.enqueue(job(None, 0)).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(handler.0.load(Ordering::SeqCst), 2);
        shutdown.cancel();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn key_frees_up_after_execution() {
        let (queue, rx) = JobQueue::new(8);
        let handler = Arc::new(Counter(AtomicUsize::new(0)));
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(JobWorker::new(&queue, rx, handler.clone(), shutdown.clone()).run());

        queue.enqueue(job(Some("k"), 0)).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        // window closed → same key queues again
        assert!(queue.enqueue(job(Some("k"), 0)).await);

        shutdown.cancel();
        let _ = handle.await;
    }

    #[test]
    fn job_kind_wire_form() {
        assert_eq!(
            serde_json::to_string(&JobKind::ShipmentStatusChange).unwrap(),
            "\"shipmentStatusChange\""
        );
    }
}
