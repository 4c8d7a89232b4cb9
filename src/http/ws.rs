use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::Engine;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::state::AppState;
use crate::session::SessionEvent;

const EVENT_BUFFER: usize = 64;

/// Messages the live channel accepts. Chunk bytes may also arrive as raw
/// binary frames, which are treated as `chunk` with no format hint.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Start {
        session_id: Option<String>,
        display_name: Option<String>,
    },
    Chunk {
        data: String,
        format: Option<String>,
    },
    End,
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// GET /ws
/// The bearer credential is checked at upgrade time; unauthenticated
/// connections are rejected before any session state exists.
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    if !connection_authorized(state.bearer_token.as_deref(), query.token.as_deref(), &headers) {
        warn!("Rejected unauthenticated live channel connection");
        return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn connection_authorized(
    expected: Option<&str>,
    query_token: Option<&str>,
    headers: &HeaderMap,
) -> bool {
    let Some(expected) = expected else {
        return true;
    };

    let header_token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim);

    matches!(query_token.or(header_token), Some(token) if token == expected)
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (events_tx, mut events_rx) = mpsc::channel::<SessionEvent>(EVENT_BUFFER);
    let mut current: Option<String> = None;

    loop {
        tokio::select! {
            Some(event) = events_rx.recv() => {
                if send_event(&mut sink, &event).await.is_err() {
                    break;
                }
            }
            message = stream.next() => {
                let Some(Ok(message)) = message else { break };
                match message {
                    Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::Start { session_id, display_name }) => {
                            let ack = state
                                .registry
                                .start(session_id, display_name, events_tx.clone())
                                .await;
                            current = Some(ack.session_id.clone());
                            let started = SessionEvent::Started {
                                session_id: ack.session_id,
                                display_name: ack.display_name,
                            };
                            if send_event(&mut sink, &started).await.is_err() {
                                break;
                            }
                        }
                        Ok(ClientMessage::Chunk { data, format }) => {
                            let Some(id) = &current else { continue };
                            match base64::engine::general_purpose::STANDARD.decode(&data) {
                                Ok(bytes) => state.registry.chunk(id, bytes, format).await,
                                Err(e) => warn!(error = %e, "Undecodable chunk payload ignored"),
                            }
                        }
                        Ok(ClientMessage::End) => {
                            if let Some(id) = &current {
                                state.registry.end(id).await;
                            }
                        }
                        Err(e) => warn!(error = %e, "Unparseable channel message ignored"),
                    },
                    Message::Binary(bytes) => {
                        if let Some(id) = &current {
                            state.registry.chunk(id, bytes, None).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    // Disconnect without an end signal leaves the session live in the
    // registry; its events simply have nowhere to go.
    debug!(session_id = ?current, "Live channel closed");
}

async fn send_event(
    sink: &mut (impl futures::Sink<Message, Error = axum::Error> + Unpin),
    event: &SessionEvent,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event).map_err(axum::Error::new)?;
    sink.send(Message::Text(json)).await
}
