//! In-process domain event bus.
//!
//! Fans out `{resume,job,match}.status.changed` to listeners registered at
//! boot. Events are not durable: a missed event is reconstructed by polling
//! the owning repository. Publishing never fails; with no subscribers the
//! event is dropped.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

/// A committed status change on one of the three entity families.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    ResumeStatusChanged {
        id: Uuid,
        status: String,
        ts: DateTime<Utc>,
    },
    JobStatusChanged {
        id: Uuid,
        status: String,
        ts: DateTime<Utc>,
    },
    MatchStatusChanged {
        id: Uuid,
        status: String,
        ts: DateTime<Utc>,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::ResumeStatusChanged { .. } => "resume.status.changed",
            DomainEvent::JobStatusChanged { .. } => "job.status.changed",
            DomainEvent::MatchStatusChanged { .. } => "match.status.changed",
        }
    }
}

/// Process-wide publish/subscribe bus. Cheap to clone; all clones share the
/// same channel and registration markers.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
    registered: Arc<Mutex<HashSet<&'static str>>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            registered: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Publishes an event to all current subscribers. Lossy: subscriber lag or
    /// absence never propagates back to the emitting write path.
    pub fn publish(&self, event: DomainEvent) {
        debug!(event = event.name(), "publishing domain event");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }

    /// Spawns a listener task unless one with the same tag is already
    /// registered. Returns whether the listener was installed; duplicate
    /// registration is a no-op so boot can be re-run safely.
    ///
    /// Each listener runs on its own task with its own receiver, so a failing
    /// or slow subscriber cannot prevent others from observing events.
    pub fn register_listener<F, Fut>(&self, tag: &'static str, handler: F) -> bool
    where
        F: Fn(DomainEvent) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        {
            let mut registered = self.registered.lock().expect("bus marker lock poisoned");
            if !registered.insert(tag) {
                debug!(tag, "listener already registered, skipping");
                return false;
            }
        }

        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => handler(event).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(tag, missed, "listener lagged; events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn resume_event() -> DomainEvent {
        DomainEvent::ResumeStatusChanged {
            id: Uuid::new_v4(),
            status: "ready".to_string(),
            ts: Utc::now(),
        }
    }

    #[test]
    fn test_event_names() {
        assert_eq!(resume_event().name(), "resume.status.changed");
        let e = DomainEvent::MatchStatusChanged {
            id: Uuid::new_v4(),
            status: "completed".to_string(),
            ts: Utc::now(),
        };
        assert_eq!(e.name(), "match.status.changed");
    }

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let bus = EventBus::new(8);
        bus.publish(resume_event());
    }

    #[tokio::test]
    async fn test_subscriber_receives_published_event() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(resume_event());
        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "resume.status.changed");
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_a_no_op() {
        let bus = EventBus::new(8);
        let hits = Arc::new(AtomicUsize::new(0));

        let h1 = hits.clone();
        assert!(bus.register_listener("job.listener", move |_| {
            let h = h1.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
            }
        }));
        let h2 = hits.clone();
        assert!(!bus.register_listener("job.listener", move |_| {
            let h = h2.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
            }
        }));

        bus.publish(resume_event());
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_listeners_are_isolated() {
        let bus = EventBus::new(8);
        let hits = Arc::new(AtomicUsize::new(0));

        // First listener panics; the second must still observe the event.
        assert!(bus.register_listener("panicky", |_| async {
            panic!("subscriber failure");
        }));
        let h = hits.clone();
        assert!(bus.register_listener("healthy", move |_| {
            let h = h.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
            }
        }));

        bus.publish(resume_event());
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
