//! Room registry for realtime push.
//!
//! A room is the set of live sockets for one external subject. Emission is
//! lossy: dead or congested sockets are pruned, and a room with no sockets
//! swallows the message (clients reconcile by polling the REST reads).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

type Room = HashMap<Uuid, mpsc::UnboundedSender<String>>;

#[derive(Clone, Default)]
pub struct RealtimeHub {
    rooms: Arc<RwLock<HashMap<String, Room>>>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a socket under `user:<subject>` and returns its connection
    /// id plus the outbound message stream.
    pub async fn join(&self, subject: &str) -> (Uuid, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn_id = Uuid::new_v4();
        let mut rooms = self.rooms.write().await;
        rooms.entry(room_key(subject)).or_default().insert(conn_id, tx);
        debug!(subject, %conn_id, "socket joined room");
        (conn_id, rx)
    }

    pub async fn leave(&self, subject: &str, conn_id: Uuid) {
        let mut rooms = self.rooms.write().await;
        let key = room_key(subject);
        if let Some(room) = rooms.get_mut(&key) {
            room.remove(&conn_id);
            if room.is_empty() {
                rooms.remove(&key);
            }
        }
    }

    /// Pushes `{event, data}` to every socket in the subject's room.
    pub async fn emit(&self, subject: &str, event: &str, data: Value) {
        let message = json!({"event": event, "data": data}).to_string();
        let mut rooms = self.rooms.write().await;
        let key = room_key(subject);
        if let Some(room) = rooms.get_mut(&key) {
            room.retain(|_, tx| tx.send(message.clone()).is_ok());
            if room.is_empty() {
                rooms.remove(&key);
            }
        }
    }

    #[cfg(test)]
    pub async fn room_size(&self, subject: &str) -> usize {
        self.rooms
            .read()
            .await
            .get(&room_key(subject))
            .map(|r| r.len())
            .unwrap_or(0)
    }
}

fn room_key(subject: &str) -> String {
    format!("user:{subject}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_reaches_every_socket_in_the_room() {
        let hub = RealtimeHub::new();
        let (_id1, mut rx1) = hub.join("dev|user").await;
        let (_id2, mut rx2) = hub.join("dev|user").await;

        hub.emit("dev|user", "job:update", json!({"id": "j1", "status": "ready"}))
            .await;

        let msg: Value = serde_json::from_str(&rx1.recv().await.unwrap()).unwrap();
        assert_eq!(msg["event"], "job:update");
        assert_eq!(msg["data"]["status"], "ready");
        assert!(rx2.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_emit_is_scoped_to_the_subject_room() {
        let hub = RealtimeHub::new();
        let (_id, mut other_rx) = hub.join("other|user").await;

        hub.emit("dev|user", "resume:update", json!({"id": "r1"})).await;

        // Nothing may leak into a different subject's room.
        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_leave_removes_socket_and_empty_room() {
        let hub = RealtimeHub::new();
        let (conn_id, _rx) = hub.join("dev|user").await;
        assert_eq!(hub.room_size("dev|user").await, 1);

        hub.leave("dev|user", conn_id).await;
        assert_eq!(hub.room_size("dev|user").await, 0);
    }

    #[tokio::test]
    async fn test_dead_sockets_are_pruned_on_emit() {
        let hub = RealtimeHub::new();
        let (_conn_id, rx) = hub.join("dev|user").await;
        drop(rx);

        hub.emit("dev|user", "match:update", json!({})).await;
        assert_eq!(hub.room_size("dev|user").await, 0);
    }
}
