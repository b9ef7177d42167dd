//! CDC consumer worker
//!
//! Pulls messages from a [`CdcStream`], filters to the `shipments` and
//! `customers` tables, and emits `shipmentStatusChange` workflow jobs for
//! shipment status flips. Offsets advance only after a message is fully
//! handled (or decided to be skippable), so transient failures redeliver.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use shared::util::now_secs;

use crate::jobs::{Job, JobKind, JobQueue};

use super::envelope::CdcEnvelope;

/// A positioned CDC message source. `commit` acknowledges everything
/// delivered so far; uncommitted messages are redelivered after a restart.
#[async_trait]
pub trait CdcStream: Send {
    /// Next raw message, or None when the stream is (currently) exhausted.
    async fn next_message(&mut self) -> anyhow::Result<Option<Vec<u8>>>;
    /// Advance the consumer offset past everything delivered.
    async fn commit(&mut self) -> anyhow::Result<()>;
}

/// Consumed tables; everything else is dropped on the floor.
const CONSUMED_TABLES: &[&str] = &["shipments", "customers"];

pub struct CdcConsumer<S: CdcStream> {
    stream: S,
    queue: JobQueue,
    shutdown: CancellationToken,
}

impl<S: CdcStream> CdcConsumer<S> {
    pub fn new(stream: S, queue: JobQueue, shutdown: CancellationToken) -> Self {
        Self {
            stream,
            queue,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("CDC consumer started");
        loop {
            let message = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("CDC consumer stopping");
                    break;
                }
                message = self.stream.next_message() => message,
            };
            match message {
                Ok(Some(bytes)) => {
                    if self.handle(&bytes).await {
                        if let Err(err) = self.stream.commit().await {
                            tracing::error!(error = %err, "CDC offset commit failed");
                        }
                    }
                    // on false: transient failure — leave the offset so the
                    // message redelivers
                }
                Ok(None) => {
                    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                }
                Err(err) => {
                    tracing::error!(error = %err, "CDC read failed");
                    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                }
            }
        }
    }

    /// Returns true when the offset may advance.
    async fn handle(&self, bytes: &[u8]) -> bool {
        let envelope = match CdcEnvelope::parse(bytes) {
            Ok(env) => env,
            Err(err) => {
                // malformed: log and skip, never poison the stream
                tracing::warn!(error = %err, "malformed CDC message skipped");
                return true;
            }
        };
        if !CONSUMED_TABLES.contains(&envelope.table()) {
            return true;
        }

        if let Some((before, after)) = envelope.shipment_status_change() {
            let shipment_id = envelope
                .payload
                .after
                .as_ref()
                .and_then(|v| v.get("id"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let job = Job {
                kind: JobKind::ShipmentStatusChange,
                unique_key: None,
                run_at: now_secs(),
                payload: json!({
                    "shipmentId": shipment_id,
                    "previousStatus": before,
                    "newStatus": after,
                    "timestamp": now_secs(),
                }),
            };
            // enqueue failure is transient: hold the offset and redeliver
            return self.queue.enqueue(job).await;
        }
        true
    }
}

/// File-backed stream: one JSON envelope per line, offset persisted next to
/// the file. Suits development and replay; production deployments plug a
/// broker-backed implementation into [`CdcStream`].
pub struct JsonlCdcStream {
    path: PathBuf,
    offset_path: PathBuf,
    delivered: u64,
    committed: u64,
}

impl JsonlCdcStream {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let offset_path = path.with_extension("offset");
        let committed = std::fs::read_to_string(&offset_path)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0);
        Self {
            path,
            offset_path,
            delivered: committed,
            committed,
        }
    }
}

#[async_trait]
impl CdcStream for JsonlCdcStream {
    async fn next_message(&mut self) -> anyhow::Result<Option<Vec<u8>>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match content.lines().nth(self.delivered as usize) {
            Some(line) if !line.trim().is_empty() => {
                self.delivered += 1;
                Ok(Some(line.as_bytes().to_vec()))
            }
            _ => Ok(None),
        }
    }

    async fn commit(&mut self) -> anyhow::Result<()> {
        if self.delivered != self.committed {
            tokio::fs::write(&self.offset_path, self.delivered.to_string()).await?;
            self.committed = self.delivered;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct VecStream {
        messages: VecDeque<Vec<u8>>,
        commits: usize,
    }

    #[async_trait]
    impl CdcStream for VecStream {
        async fn next_message(&mut self) -> anyhow::Result<Option<Vec<u8>>> {
            Ok(self.messages.pop_front())
        }

        async fn commit(&mut self) -> anyhow::Result<()> {
            self.commits += 1;
            Ok(())
        }
    }

    fn update(table: &str, before: &str, after: &str) -> Vec<u8> {
        format!(
            r#"{{"payload":{{"before":{{"id":"shp_1","status":"{before}"}},
                 "after":{{"id":"shp_1","status":"{after}"}},
                 "source":{{"table":"{table}"}},"op":"u"}}}}"#
        )
        .into_bytes()
    }

    #[tokio::test]
    async fn status_flip_emits_workflow_job() {
        let (queue, mut rx) = JobQueue::new(8);
        let stream = VecStream {
            messages: VecDeque::from(vec![
                update("shipments", "new", "in_transit"),
                update("shipments", "in_transit", "in_transit"), // unchanged → nothing
                update("workers", "a", "b"),                     // other table → nothing
                b"{malformed".to_vec(),                          // skipped with a warning
            ]),
            commits: 0,
        };
        let shutdown = CancellationToken::new();
        let consumer = CdcConsumer::new(stream, queue, shutdown.clone());

        let handle = tokio::spawn(consumer.run());
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        shutdown.cancel();
        let _ = handle.await;

        let job = rx.try_recv().unwrap();
        assert_eq!(job.kind, JobKind::ShipmentStatusChange);
        assert_eq!(job.payload["previousStatus"], "new");
        assert_eq!(job.payload["newStatus"], "in_transit");
        // exactly one job out of four messages
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn jsonl_stream_tracks_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cdc.jsonl");
        let line = String::from_utf8(update("shipments", "new", "assigned")).unwrap();
        tokio::fs::write(&path, format!("{line}\n{line}\n"))
            .await
            .unwrap();

        let mut stream = JsonlCdcStream::new(&path);
        assert!(stream.next_message().await.unwrap().is_some());
        stream.commit().await.unwrap();

        // a fresh stream resumes past the committed offset
        let mut resumed = JsonlCdcStream::new(&path);
        assert!(resumed.next_message().await.unwrap().is_some());
        assert!(resumed.next_message().await.unwrap().is_none());
    }
}
