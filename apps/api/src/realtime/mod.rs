//! Realtime push: websocket endpoint + the bus-to-room bridge.

pub mod bridge;
pub mod hub;

pub use hub::RealtimeHub;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: Option<String>,
}

/// GET /ws. Authenticates the same bearer token as the REST surface
/// (header or `?token=`) and joins the socket to `user:<subject>`.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsAuthQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let header_token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let token = header_token.or(query.token.as_deref());

    let claims = state.auth.verify(token).await?;

    // Sockets join under the external subject; refuse subjects with no user
    // row rather than opening a room that can never receive events.
    if state.repos.users.get_user_id(&claims.sub).await?.is_none() {
        return Err(AppError::Unauthorized);
    }

    let subject = claims.sub;
    Ok(ws.on_upgrade(move |socket| handle_socket(state, subject, socket)))
}

async fn handle_socket(state: AppState, subject: String, socket: WebSocket) {
    let (conn_id, mut outbound) = state.realtime.join(&subject).await;
    info!(subject, %conn_id, "websocket connected");

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            message = outbound.recv() => {
                match message {
                    Some(text) => {
                        if sink.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Inbound frames carry no protocol; drain and ignore.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.realtime.leave(&subject, conn_id).await;
    debug!(subject, %conn_id, "websocket disconnected");
}
