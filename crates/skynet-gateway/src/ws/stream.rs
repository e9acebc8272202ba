//! `/ws/messages?token=…` — the live tail of the Event Bus.
//!
//! Auth travels as a query parameter rather than a header because the
//! browser `WebSocket` constructor can't set arbitrary headers during the
//! handshake. A bad or missing token closes the socket with code `4001`
//! instead of ever upgrading.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::app::AppState;
use crate::dashboard_auth::check_auth_query;

pub async fn ws_messages_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let token = params.get("token").map(String::as_str);
    if check_auth_query(&state, token).is_err() {
        return ws.on_upgrade(|socket| async move {
            let _ = reject(socket).await;
        });
    }
    ws.on_upgrade(move |socket| stream_events(socket, state))
}

async fn reject(mut socket: WebSocket) -> Result<(), axum::Error> {
    socket
        .send(Message::Close(Some(CloseFrame { code: 4001, reason: "unauthorized".into() })))
        .await
}

async fn stream_events(mut socket: WebSocket, state: Arc<AppState>) {
    let mut rx = state.broadcaster.subscribe();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(payload) => {
                        if socket.send(Message::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "dashboard ws subscriber lagged, skipping ahead");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(_)) => break,
                }
            }
        }
    }
}
