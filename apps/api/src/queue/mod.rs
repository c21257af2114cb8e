//! Durable FIFO work queues over Redis lists.
//!
//! Each logical queue `q` is a pending list (`queue:q`) plus a processing
//! list (`queue:q:processing`). A dequeue atomically moves one entry from
//! pending to processing (`LMOVE`); a successful job is acknowledged with
//! `LREM` on the processing list. Failed jobs are re-enqueued with exponential
//! backoff until `max_attempts`, then pushed to `queue:q:dead`. Entries
//! stranded in a processing list by a crashed process are moved back to
//! pending at boot, which yields at-least-once delivery.

use std::time::Duration;

use redis::aio::ConnectionManager;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;

/// Queue fed by résumé uploads.
pub const PARSE_RESUME_QUEUE: &str = "parse_resume";
/// Queue fed by job-description submissions.
pub const PARSE_JOB_QUEUE: &str = "parse_job";
/// Queue fed by match creation.
pub const COMPUTE_MATCH_QUEUE: &str = "compute_match";

/// Payload for `parse_resume`. Carries enough metadata that the worker can
/// reach object storage and the NLP service without a DB round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseResumePayload {
    pub resume_id: Uuid,
    pub storage_key: String,
    pub filename: String,
    pub mime_type: String,
    pub user_id: Uuid,
}

/// Payload for `parse_job`. `source` is `"file"` or `"text"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseJobPayload {
    pub job_id: Uuid,
    pub source: String,
    pub storage_key: Option<String>,
    pub filename: Option<String>,
    pub mime_type: String,
    pub raw_text: Option<String>,
    pub user_id: Uuid,
    pub title: Option<String>,
}

/// Payload for `compute_match`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeMatchPayload {
    pub match_job_id: Uuid,
    pub resume_id: Uuid,
    pub job_id: Uuid,
    pub user_id: Uuid,
}

/// Wire envelope around every queued payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEnvelope<T> {
    pub id: Uuid,
    pub attempts: u32,
    pub payload: T,
}

fn pending_key(queue: &str) -> String {
    format!("queue:{queue}")
}

fn processing_key(queue: &str) -> String {
    format!("queue:{queue}:processing")
}

fn dead_key(queue: &str) -> String {
    format!("queue:{queue}:dead")
}

/// Shared gateway to the queue broker. Clones share one multiplexed
/// connection.
#[derive(Clone)]
pub struct QueueGateway {
    conn: ConnectionManager,
    max_attempts: u32,
    retry_base: Duration,
}

impl QueueGateway {
    pub async fn connect(
        redis_url: &str,
        max_attempts: u32,
        retry_base: Duration,
    ) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("Queue broker connection established");
        Ok(Self {
            conn,
            max_attempts,
            retry_base,
        })
    }

    /// Enqueues a payload as a fresh envelope. The caller only gets an `Ok`
    /// once the broker has durably accepted the entry.
    pub async fn enqueue<T: Serialize>(&self, queue: &str, payload: &T) -> Result<(), AppError> {
        let envelope = JobEnvelope {
            id: Uuid::new_v4(),
            attempts: 0,
            payload,
        };
        let raw = serde_json::to_string(&envelope)
            .map_err(|e| AppError::Queue(format!("serialize {queue} payload: {e}")))?;
        self.push_pending(queue, &raw).await?;
        info!(queue, job_id = %envelope.id, "job enqueued");
        Ok(())
    }

    async fn push_pending(&self, queue: &str, raw: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        redis::cmd("LPUSH")
            .arg(pending_key(queue))
            .arg(raw)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| AppError::Queue(format!("enqueue {queue}: {e}")))
    }

    /// Pops the oldest pending entry into the processing list. `None` when
    /// the queue is empty.
    pub async fn dequeue(&self, queue: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.conn.clone();
        redis::cmd("LMOVE")
            .arg(pending_key(queue))
            .arg(processing_key(queue))
            .arg("RIGHT")
            .arg("LEFT")
            .query_async::<_, Option<String>>(&mut conn)
            .await
            .map_err(|e| AppError::Queue(format!("dequeue {queue}: {e}")))
    }

    /// Acknowledges a delivered entry by removing it from the processing list.
    pub async fn ack(&self, queue: &str, raw: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        redis::cmd("LREM")
            .arg(processing_key(queue))
            .arg(1)
            .arg(raw)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| AppError::Queue(format!("ack {queue}: {e}")))
    }

    /// Handles a failed delivery: drops the entry from the processing list
    /// and either schedules a delayed re-enqueue with a bumped attempt count
    /// or, once attempts are exhausted, buries it in the dead-letter list.
    pub async fn retry_or_bury(&self, queue: &str, raw: &str) {
        if let Err(e) = self.ack(queue, raw).await {
            warn!(queue, "failed to drop entry from processing list: {e}");
        }

        let mut envelope: serde_json::Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                warn!(queue, "unparseable queue entry, burying: {e}");
                self.bury(queue, raw.to_string()).await;
                return;
            }
        };

        let attempts = envelope["attempts"].as_u64().unwrap_or(0) as u32 + 1;
        envelope["attempts"] = attempts.into();

        if attempts >= self.max_attempts {
            warn!(queue, attempts, "attempts exhausted, burying job");
            self.bury(queue, envelope.to_string()).await;
            return;
        }

        let delay = backoff_delay(self.retry_base, attempts);
        warn!(queue, attempts, delay_ms = delay.as_millis() as u64, "scheduling retry");

        let gateway = self.clone();
        let queue = queue.to_string();
        let raw = envelope.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = gateway.push_pending(&queue, &raw).await {
                warn!(queue, "retry re-enqueue failed: {e}");
            }
        });
    }

    async fn bury(&self, queue: &str, raw: String) {
        let mut conn = self.conn.clone();
        if let Err(e) = redis::cmd("LPUSH")
            .arg(dead_key(queue))
            .arg(raw)
            .query_async::<_, ()>(&mut conn)
            .await
        {
            warn!(queue, "dead-letter push failed: {e}");
        }
    }

    /// Moves every entry stranded in the processing list back to pending.
    /// Called once at boot, before consumers start; entries abandoned by a
    /// killed process are redelivered rather than lost.
    pub async fn recover(&self, queue: &str) -> Result<usize, AppError> {
        let mut recovered = 0;
        loop {
            let mut conn = self.conn.clone();
            let moved: Option<String> = redis::cmd("LMOVE")
                .arg(processing_key(queue))
                .arg(pending_key(queue))
                .arg("RIGHT")
                .arg("LEFT")
                .query_async(&mut conn)
                .await
                .map_err(|e| AppError::Queue(format!("recover {queue}: {e}")))?;
            match moved {
                Some(_) => recovered += 1,
                None => break,
            }
        }
        if recovered > 0 {
            info!(queue, recovered, "requeued orphaned processing entries");
        }
        Ok(recovered)
    }
}

/// Parses a raw queue entry into a typed envelope.
pub fn decode_envelope<T: DeserializeOwned>(raw: &str) -> Result<JobEnvelope<T>, serde_json::Error> {
    serde_json::from_str(raw)
}

/// Exponential backoff: base * 2^(attempt-1).
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * 2u32.saturating_pow(attempt.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let base = Duration::from_millis(5_000);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(5_000));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(10_000));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(20_000));
    }

    #[test]
    fn test_envelope_decodes_payload() {
        let raw = r#"{
            "id": "7f0a1e8e-2a67-4f21-bb2c-df6d64a6c8aa",
            "attempts": 1,
            "payload": {
                "match_job_id": "30c7b9a1-9f4b-4a53-90a6-0a35333c72cf",
                "resume_id": "d5d9f3c2-8f46-4f2d-9a3d-2a4a5a6b7c8d",
                "job_id": "2b8c7d6e-5f4a-4b3c-9d2e-1f0a9b8c7d6e",
                "user_id": "f0e1d2c3-b4a5-4968-8776-655443322110"
            }
        }"#;
        let envelope: JobEnvelope<ComputeMatchPayload> = decode_envelope(raw).unwrap();
        assert_eq!(envelope.attempts, 1);
        assert_eq!(
            envelope.payload.match_job_id.to_string(),
            "30c7b9a1-9f4b-4a53-90a6-0a35333c72cf"
        );
    }

    #[test]
    fn test_queue_key_layout() {
        assert_eq!(pending_key(PARSE_RESUME_QUEUE), "queue:parse_resume");
        assert_eq!(
            processing_key(PARSE_JOB_QUEUE),
            "queue:parse_job:processing"
        );
        assert_eq!(dead_key(COMPUTE_MATCH_QUEUE), "queue:compute_match:dead");
    }
}
