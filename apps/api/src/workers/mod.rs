//! Queue consumers.
//!
//! Each queue gets a configurable number of consumer slots; a slot processes
//! one job at a time. A handler returning `Err` has already recorded the
//! failure on the entity row; the queue then applies its retry policy.

pub mod compute_match;
pub mod parse_job;
pub mod parse_resume;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::status::{DocumentStatus, MatchStatus};
use crate::queue::{
    decode_envelope, COMPUTE_MATCH_QUEUE, PARSE_JOB_QUEUE, PARSE_RESUME_QUEUE,
};
use crate::state::AppState;

/// How long an idle consumer sleeps before polling again.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Spawns and owns the consumer tasks. `start` is idempotent: a second call
/// in the same process is a no-op, so re-running boot cannot double-start
/// workers.
#[derive(Clone, Default)]
pub struct WorkerPool {
    started: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn start(&self, state: &AppState) -> Result<(), AppError> {
        if self.started.swap(true, Ordering::SeqCst) {
            info!("worker pool already started, skipping");
            return Ok(());
        }

        // Requeue entries stranded by a previous process before consuming.
        for queue in [PARSE_RESUME_QUEUE, PARSE_JOB_QUEUE, COMPUTE_MATCH_QUEUE] {
            state.queue.recover(queue).await?;
        }

        for slot in 0..state.config.parse_queue_concurrency {
            tokio::spawn(consume_loop(
                state.clone(),
                PARSE_RESUME_QUEUE,
                slot,
                parse_resume::handle,
            ));
            tokio::spawn(consume_loop(
                state.clone(),
                PARSE_JOB_QUEUE,
                slot,
                parse_job::handle,
            ));
        }
        for slot in 0..state.config.match_queue_concurrency {
            tokio::spawn(consume_loop(
                state.clone(),
                COMPUTE_MATCH_QUEUE,
                slot,
                compute_match::handle,
            ));
        }

        info!(
            parse_slots = state.config.parse_queue_concurrency,
            match_slots = state.config.match_queue_concurrency,
            "worker pool started"
        );
        Ok(())
    }
}

async fn consume_loop<T, F, Fut>(state: AppState, queue: &'static str, slot: usize, handler: F)
where
    T: DeserializeOwned + Send,
    F: Fn(AppState, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), AppError>> + Send,
{
    info!(queue, slot, "consumer started");
    loop {
        match state.queue.dequeue(queue).await {
            Ok(Some(raw)) => match decode_envelope::<T>(&raw) {
                Ok(envelope) => {
                    let job_timeout = Duration::from_millis(state.config.queue_job_timeout_ms);
                    let outcome =
                        tokio::time::timeout(job_timeout, handler(state.clone(), envelope.payload))
                            .await;
                    match outcome {
                        Ok(Ok(())) => {
                            if let Err(e) = state.queue.ack(queue, &raw).await {
                                warn!(queue, job_id = %envelope.id, "ack failed: {e}");
                            }
                        }
                        Ok(Err(e)) => {
                            warn!(queue, job_id = %envelope.id, attempts = envelope.attempts, "job failed: {e}");
                            state.queue.retry_or_bury(queue, &raw).await;
                        }
                        Err(_) => {
                            warn!(queue, job_id = %envelope.id, "job exceeded {}ms, abandoning slot", job_timeout.as_millis());
                            let message = format!("job exceeded {}ms", job_timeout.as_millis());
                            mark_timed_out(&state, queue, &raw, &message).await;
                            state.queue.retry_or_bury(queue, &raw).await;
                        }
                    }
                }
                Err(e) => {
                    warn!(queue, "undecodable job payload: {e}");
                    state.queue.retry_or_bury(queue, &raw).await;
                }
            },
            Ok(None) => tokio::time::sleep(POLL_INTERVAL).await,
            Err(e) => {
                warn!(queue, slot, "dequeue failed: {e}");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// A timed-out handler future was dropped mid-flight, before it could write
/// a terminal status. Recover the entity id from the raw envelope and record
/// the failure the handler would have, so the entity cannot sit in
/// `processing`/`running` forever once the job is buried. A retried delivery
/// transitions it back out of `error`/`failed` the same way an ordinary
/// failed attempt would.
async fn mark_timed_out(state: &AppState, queue: &str, raw: &str, message: &str) {
    let Ok(envelope) = serde_json::from_str::<serde_json::Value>(raw) else {
        return;
    };
    let payload = &envelope["payload"];

    let result = match queue {
        PARSE_RESUME_QUEUE => match payload_id(payload, "resume_id") {
            Some(id) => state
                .repos
                .resumes
                .update_status(id, DocumentStatus::Error, Some(&json!({ "message": message })))
                .await
                .map(|_| ()),
            None => Ok(()),
        },
        PARSE_JOB_QUEUE => match payload_id(payload, "job_id") {
            Some(id) => state
                .repos
                .jobs
                .update_status(id, DocumentStatus::Error, Some(&json!({ "message": message })))
                .await
                .map(|_| ()),
            None => Ok(()),
        },
        COMPUTE_MATCH_QUEUE => match payload_id(payload, "match_job_id") {
            Some(id) => state
                .repos
                .matches
                .update_status(id, MatchStatus::Failed, Some(message), None)
                .await
                .map(|_| ()),
            None => Ok(()),
        },
        _ => Ok(()),
    };

    if let Err(e) = result {
        warn!(queue, "failed to record timeout status: {e}");
    }
}

fn payload_id(payload: &serde_json::Value, key: &str) -> Option<Uuid> {
    payload
        .get(key)
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_id_reads_envelope_payload() {
        let payload = json!({
            "resume_id": "d5d9f3c2-8f46-4f2d-9a3d-2a4a5a6b7c8d",
            "user_id": "f0e1d2c3-b4a5-4968-8776-655443322110"
        });
        assert_eq!(
            payload_id(&payload, "resume_id").unwrap().to_string(),
            "d5d9f3c2-8f46-4f2d-9a3d-2a4a5a6b7c8d"
        );
    }

    #[test]
    fn test_payload_id_is_none_for_missing_or_malformed() {
        assert!(payload_id(&json!({}), "resume_id").is_none());
        assert!(payload_id(&json!({"resume_id": "not-a-uuid"}), "resume_id").is_none());
        assert!(payload_id(&json!({"resume_id": 7}), "resume_id").is_none());
    }
}
