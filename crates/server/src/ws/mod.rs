//! The real-time gateway: `/ws` accepts a connection, authenticates it,
//! and from then on shuttles Event Hub traffic to the client while
//! accepting `subscribe`/`unsubscribe`/`ping` control messages back.
//!
//! Each subscription runs its own forwarding task that drains the hub's
//! per-subscriber queue into a connection-wide mpsc channel; the
//! connection's main loop only ever selects on that one channel plus the
//! socket, so adding or dropping subscriptions never touches a future
//! already being polled.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use kanban_core_services::events::Event;
use kanban_core_utils::config::WebsocketConfig;

use crate::middleware::auth::{authenticate_key, extract_key};
use crate::state::AppState;

const NORMAL: u16 = 1000;
const POLICY: u16 = 1008;
const BACKPRESSURE: u16 = 1013;

/// Authenticates off `Authorization`/`X-API-Key`, or (since browsers can't
/// set arbitrary headers on a WebSocket handshake) the single-shared
/// credential offered as the `Sec-WebSocket-Protocol` value, echoed back
/// so the handshake completes. Unauthenticated connections never reach
/// `on_upgrade` — they're rejected with a plain 401 before any socket
/// exists to close.
pub async fn upgrade(State(state): State<AppState>, headers: HeaderMap, ws: WebSocketUpgrade) -> Response {
    let header_key = extract_key(&headers);
    let subprotocol = headers
        .get(axum::http::header::SEC_WEBSOCKET_PROTOCOL)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let key = header_key.clone().or_else(|| subprotocol.clone());

    let Some(key) = key else {
        return (StatusCode::UNAUTHORIZED, "missing credential").into_response();
    };
    match authenticate_key(&state, &key).await {
        Ok(true) => {}
        _ => return (StatusCode::UNAUTHORIZED, "invalid credential").into_response(),
    }

    let ws = match (&header_key, &subprotocol) {
        (None, Some(token)) => ws.protocols([token.clone()]),
        _ => ws,
    };
    ws.on_upgrade(move |socket| run_ready(socket, state))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Subscribe { board_id: Option<Uuid> },
    Unsubscribe { board_id: Option<Uuid> },
    Ping,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    Pong,
    Subscribed { board_id: Option<Uuid> },
    Unsubscribed { board_id: Option<Uuid> },
    Error { message: String },
}

struct ForwardedEvent {
    board_id: Option<Uuid>,
    event: Arc<Event>,
    lost: u64,
}

async fn run_ready(mut socket: WebSocket, state: AppState) {
    let ws_config = state.config.websocket.clone();
    let (forward_tx, mut forward_rx) = mpsc::channel::<ForwardedEvent>(ws_config.write_queue_capacity);
    let mut subscription_count: usize = 0;
    let mut forwarders: Vec<(Option<Uuid>, tokio::task::JoinHandle<()>)> = Vec::new();

    let mut inbound_count: u32 = 0;
    let mut inbound_window_start = tokio::time::Instant::now();
    let mut heartbeat = tokio::time::interval(ws_config.heartbeat_interval);
    let mut last_pong = tokio::time::Instant::now();

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if last_pong.elapsed() > ws_config.heartbeat_timeout {
                    close(socket, NORMAL, "heartbeat timeout").await;
                    break;
                }
                if socket.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }

            incoming = socket.recv() => {
                let Some(incoming) = incoming else { break };
                let Ok(message) = incoming else { break };
                match message {
                    Message::Close(_) => break,
                    Message::Pong(_) => last_pong = tokio::time::Instant::now(),
                    Message::Text(text) => {
                        if inbound_window_start.elapsed() >= Duration::from_secs(60) {
                            inbound_window_start = tokio::time::Instant::now();
                            inbound_count = 0;
                        }
                        inbound_count += 1;
                        if inbound_count > ws_config.max_inbound_per_minute {
                            close(socket, POLICY, "inbound rate limit exceeded").await;
                            break;
                        }
                        let ok = handle_client_message(
                            &text,
                            &state,
                            &ws_config,
                            &forward_tx,
                            &mut subscription_count,
                            &mut forwarders,
                            &mut socket,
                        )
                        .await;
                        if !ok {
                            break;
                        }
                    }
                    _ => {}
                }
            }

            forwarded = forward_rx.recv() => {
                let Some(forwarded) = forwarded else { break };
                let text = render(&forwarded);
                if send_or_backpressure(&mut socket, text).await.is_err() {
                    close(socket, BACKPRESSURE, "write queue full").await;
                    break;
                }
            }
        }
    }

    for (_, forwarder) in forwarders {
        forwarder.abort();
    }
}

fn render(forwarded: &ForwardedEvent) -> String {
    let mut payload = forwarded.event.payload.clone();
    if let Some(obj) = payload.as_object_mut() {
        obj.insert("type".to_string(), serde_json::Value::String(forwarded.event.kind.wire_name().to_string()));
        obj.insert(
            "board_id".to_string(),
            serde_json::Value::String(forwarded.board_id.map(|b| b.to_string()).unwrap_or_default()),
        );
        obj.insert("seq".to_string(), serde_json::Value::from(forwarded.event.seq));
        obj.insert("timestamp".to_string(), serde_json::Value::String(forwarded.event.occurred_at.to_rfc3339()));
        if forwarded.lost > 0 {
            obj.insert("lost".to_string(), serde_json::Value::from(forwarded.lost));
        }
    }
    serde_json::to_string(&payload).unwrap_or_default()
}

#[allow(clippy::too_many_arguments)]
async fn handle_client_message(
    text: &str,
    state: &AppState,
    ws_config: &WebsocketConfig,
    forward_tx: &mpsc::Sender<ForwardedEvent>,
    subscription_count: &mut usize,
    forwarders: &mut Vec<(Option<Uuid>, tokio::task::JoinHandle<()>)>,
    socket: &mut WebSocket,
) -> bool {
    let parsed: Result<ClientMessage, _> = serde_json::from_str(text);
    let reply = match parsed {
        Ok(ClientMessage::Ping) => ServerMessage::Pong,
        Ok(ClientMessage::Subscribe { board_id }) => {
            if *subscription_count >= ws_config.max_subscriptions {
                ServerMessage::Error { message: "subscription limit reached".to_string() }
            } else {
                *subscription_count += 1;
                let topics: Option<HashSet<&'static str>> = None;
                let mut subscription = state.events.subscribe(board_id, topics);
                let tx = forward_tx.clone();
                let handle = tokio::spawn(async move {
                    loop {
                        let (event, lost) = subscription.recv().await;
                        if tx.send(ForwardedEvent { board_id, event, lost }).await.is_err() {
                            break;
                        }
                    }
                });
                forwarders.push((board_id, handle));
                ServerMessage::Subscribed { board_id }
            }
        }
        Ok(ClientMessage::Unsubscribe { board_id }) => {
            let before = forwarders.len();
            forwarders.retain(|(b, handle)| {
                let matches = *b == board_id;
                if matches {
                    handle.abort();
                }
                !matches
            });
            *subscription_count -= before - forwarders.len();
            ServerMessage::Unsubscribed { board_id }
        }
        Err(_) => ServerMessage::Error { message: "malformed message".to_string() },
    };

    let text = serde_json::to_string(&reply).unwrap_or_default();
    send_or_backpressure(socket, text).await.is_ok()
}

async fn send_or_backpressure(socket: &mut WebSocket, text: String) -> Result<(), ()> {
    tokio::time::timeout(Duration::from_secs(5), socket.send(Message::Text(text.into())))
        .await
        .map_err(|_| ())?
        .map_err(|_| ())
}

async fn close(mut socket: WebSocket, code: u16, reason: &str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame { code, reason: reason.to_string().into() })))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use kanban_core_services::events::EventKind;

    #[test]
    fn subscribe_and_unsubscribe_messages_round_trip() {
        let board_id = Some(Uuid::new_v4());
        let subscribe = serde_json::json!({"type": "subscribe", "board_id": board_id}).to_string();
        let parsed: ClientMessage = serde_json::from_str(&subscribe).expect("parses");
        assert!(matches!(parsed, ClientMessage::Subscribe { board_id: b } if b == board_id));

        let unsubscribe = serde_json::json!({"type": "unsubscribe", "board_id": board_id}).to_string();
        let parsed: ClientMessage = serde_json::from_str(&unsubscribe).expect("parses");
        assert!(matches!(parsed, ClientMessage::Unsubscribe { board_id: b } if b == board_id));

        let ping = serde_json::json!({"type": "ping"}).to_string();
        assert!(matches!(serde_json::from_str::<ClientMessage>(&ping), Ok(ClientMessage::Ping)));
    }

    #[test]
    fn malformed_client_message_fails_to_parse() {
        let garbage = "{\"type\": \"frobnicate\"}";
        assert!(serde_json::from_str::<ClientMessage>(garbage).is_err());
    }

    #[test]
    fn render_embeds_envelope_fields_and_omits_lost_when_zero() {
        let board_id = Some(Uuid::new_v4());
        let event = Arc::new(Event {
            board_id: board_id.unwrap_or_default(),
            seq: 7,
            kind: EventKind::TaskUpdated,
            payload: serde_json::json!({"task_id": "abc"}),
            occurred_at: chrono::Utc::now(),
        });
        let forwarded = ForwardedEvent { board_id, event: event.clone(), lost: 0 };
        let rendered: serde_json::Value = serde_json::from_str(&render(&forwarded)).expect("valid json");
        assert_eq!(rendered["type"], EventKind::TaskUpdated.wire_name());
        assert_eq!(rendered["seq"], 7);
        assert!(rendered.get("lost").is_none());

        let lossy = ForwardedEvent { board_id, event, lost: 3 };
        let rendered: serde_json::Value = serde_json::from_str(&render(&lossy)).expect("valid json");
        assert_eq!(rendered["lost"], 3);
    }
}
