//! WebSocket relay: joins connections to rooms, persists commits and fans them out.

use crate::rooms::{Relayed, RoomRegistry};
use axum::{
    Json, Router,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use inkroom_core::elements::Element;
use inkroom_core::store::{ElementStore, StoreError};
use inkroom_core::sync::{WireMessage, decode};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Shared application state
pub struct AppState {
    pub rooms: RoomRegistry,
    pub store: Arc<dyn ElementStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn ElementStore>, channel_capacity: usize) -> Self {
        Self {
            rooms: RoomRegistry::new(channel_capacity),
            store,
        }
    }
}

/// Per-socket state.
#[derive(Debug)]
pub struct Connection {
    pub peer_id: Uuid,
    pub room: Option<String>,
}

impl Connection {
    pub fn new() -> Self {
        Self {
            peer_id: Uuid::new_v4(),
            room: None,
        }
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

/// What the socket loop should do after a client frame.
pub enum Step {
    /// Send this back to the client only.
    Reply(WireMessage),
    /// Switch to the new room receiver and acknowledge.
    Joined {
        rx: broadcast::Receiver<Relayed>,
        ack: WireMessage,
    },
    /// Fanned out to the room.
    Relayed,
    Ignored,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .route("/rooms/{room_id}/elements", get(room_elements))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index(State(state): State<Arc<AppState>>) -> String {
    format!(
        "InkRoom Relay Server - Connect via WebSocket at /ws ({} active rooms)",
        state.rooms.room_count()
    )
}

async fn health() -> &'static str {
    "ok"
}

/// Store failure surfaced over HTTP.
pub struct ApiError(StoreError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.0.to_string()).into_response()
    }
}

/// Persisted live elements of a room, for hydration.
async fn room_elements(
    Path(room_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Element>>, ApiError> {
    let elements = state.store.fetch_room(&room_id).await.map_err(ApiError)?;
    debug!("serving {} element(s) for room {}", elements.len(), room_id);
    Ok(Json(elements))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn error_reply(message: impl Into<String>) -> Step {
    Step::Reply(WireMessage::Error {
        message: message.into(),
    })
}

impl AppState {
    /// Handle one text frame from a client.
    pub async fn handle_message(&self, conn: &mut Connection, text: &str) -> Step {
        let message = match decode(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Invalid message from {}: {}", conn.peer_id, e);
                return error_reply(format!("Invalid message: {e}"));
            }
        };

        if let WireMessage::JoinRoom { room_id } = &message {
            if let Some(old) = conn.room.take() {
                self.rooms.leave(&old, conn.peer_id);
                info!("Peer {} left room {}", conn.peer_id, old);
            }
            let (rx, peer_count) = self.rooms.join(room_id, conn.peer_id);
            conn.room = Some(room_id.clone());
            info!("Peer {} joined room {} ({} peers)", conn.peer_id, room_id, peer_count);
            return Step::Joined {
                rx,
                ack: WireMessage::Joined {
                    room_id: room_id.clone(),
                    peer_count,
                },
            };
        }

        let Some(target) = message.room_id() else {
            debug!("Ignoring {:?} from client {}", message, conn.peer_id);
            return Step::Ignored;
        };
        if conn.room.as_deref() != Some(target) {
            return error_reply(format!("not joined to room {target}"));
        }
        let room_id = target.to_string();

        match message {
            WireMessage::Draw { drawing: element, .. } | WireMessage::Update { updated_element: element, .. } => {
                if let Err(e) = element.validate() {
                    return error_reply(e.to_string());
                }
                if let Err(e) = self.store.persist(&room_id, element).await {
                    warn!("Failed to persist element in {}: {}", room_id, e);
                }
            }
            WireMessage::Erase { erased_ids, .. } => match self.store.erase(&room_id, erased_ids).await {
                Ok(erased) => debug!("Erased {} element(s) in {}", erased.len(), room_id),
                Err(StoreError::NotFound(_)) => debug!("Erase in empty room {}", room_id),
                Err(e) => warn!("Failed to erase in {}: {}", room_id, e),
            },
            WireMessage::Joined { .. } | WireMessage::JoinRoom { .. } | WireMessage::Error { .. } => {
                return Step::Ignored;
            }
        }

        self.rooms.broadcast(&room_id, conn.peer_id, Arc::from(text));
        Step::Relayed
    }
}

async fn next_relayed(rx: &mut Option<broadcast::Receiver<Relayed>>) -> Option<Relayed> {
    let Some(receiver) = rx else {
        // No room joined, just wait forever
        return std::future::pending().await;
    };
    loop {
        match receiver.recv().await {
            Ok(relayed) => return Some(relayed),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Receiver lagged, {} frame(s) dropped", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let mut conn = Connection::new();
    info!("New connection: {}", conn.peer_id);

    let (mut sender, mut receiver) = socket.split();
    let mut room_rx: Option<broadcast::Receiver<Relayed>> = None;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", conn.peer_id, e);
                        break;
                    }
                };
                let reply = match state.handle_message(&mut conn, text.as_str()).await {
                    Step::Reply(reply) => reply,
                    Step::Joined { rx, ack } => {
                        room_rx = Some(rx);
                        ack
                    }
                    Step::Relayed | Step::Ignored => continue,
                };
                let json = match serde_json::to_string(&reply) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to encode reply: {}", e);
                        continue;
                    }
                };
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }

            relayed = next_relayed(&mut room_rx) => {
                let Some((from, text)) = relayed else {
                    room_rx = None;
                    continue;
                };
                // Don't echo back to sender
                if from != conn.peer_id && sender.send(Message::Text(text.as_ref().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(room) = conn.room.take() {
        state.rooms.leave(&room, conn.peer_id);
        info!("Peer {} left room {} ({} remaining)", conn.peer_id, room, state.rooms.peer_count(&room));
    }
    info!("Connection closed: {}", conn.peer_id);
}
