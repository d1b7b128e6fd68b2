//! Room-scoped wire protocol and the channel that speaks it.
//!
//! Local commits go out as `draw`/`erase`/`update` messages; inbound messages
//! from peers are validated and written into the scene. Elements are keyed by
//! id on the wire, so peers never need to agree on ordering.

use crate::elements::{Element, ElementError, ElementId};
use crate::interaction::SceneChange;
use crate::scene::SceneWriter;
use crate::transport::{ConnectionState, Transport};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Messages exchanged between clients and the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WireMessage {
    /// Sent once on connect; the relay adds the connection to the room.
    JoinRoom { room_id: String },
    /// Relay acknowledgement of a join.
    Joined { room_id: String, peer_count: usize },
    /// A committed new element.
    Draw { room_id: String, drawing: Element },
    /// Elements tombstoned by one erase gesture (or undo).
    Erase { room_id: String, erased_ids: Vec<ElementId> },
    /// Full replacement of an existing element.
    Update { room_id: String, updated_element: Element },
    /// Relay-side problem report.
    Error { message: String },
}

impl WireMessage {
    /// Room the message belongs to, if it is room-scoped.
    pub fn room_id(&self) -> Option<&str> {
        match self {
            WireMessage::JoinRoom { room_id }
            | WireMessage::Joined { room_id, .. }
            | WireMessage::Draw { room_id, .. }
            | WireMessage::Erase { room_id, .. }
            | WireMessage::Update { room_id, .. } => Some(room_id),
            WireMessage::Error { .. } => None,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Decoding and application errors for inbound messages.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("message for room {got}, joined {expected}")]
    RoomMismatch { expected: String, got: String },
    #[error("invalid element: {0}")]
    Element(#[from] ElementError),
}

pub type SyncResult<T> = Result<T, SyncError>;

/// What an inbound message did to the scene.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Joined { peer_count: usize },
    Drawn(ElementId),
    Erased(Vec<ElementId>),
    Updated(ElementId),
    ServerError(String),
    /// Understood but nothing to apply.
    Ignored,
}

impl Inbound {
    /// Whether the scene changed.
    pub fn touched_scene(&self) -> bool {
        match self {
            Inbound::Drawn(_) | Inbound::Updated(_) => true,
            Inbound::Erased(ids) => !ids.is_empty(),
            _ => false,
        }
    }
}

/// Parse a wire message.
pub fn decode(text: &str) -> SyncResult<WireMessage> {
    Ok(serde_json::from_str(text)?)
}

/// Serializes local commits and applies peer messages for one room.
pub struct SyncChannel<T: Transport> {
    room_id: String,
    transport: T,
    joined: bool,
    peer_count: usize,
}

impl<T: Transport> SyncChannel<T> {
    pub fn new(room_id: impl Into<String>, transport: T) -> Self {
        Self {
            room_id: room_id.into(),
            transport,
            joined: false,
            peer_count: 0,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn state(&self) -> ConnectionState {
        self.transport.state()
    }

    /// Peer count from the last `joined` acknowledgement.
    pub fn peer_count(&self) -> usize {
        self.peer_count
    }

    /// Send `joinRoom`. Called once per connection.
    pub fn join(&mut self) {
        if self.joined {
            return;
        }
        let room_id = self.room_id.clone();
        self.send(WireMessage::JoinRoom { room_id });
        self.joined = true;
    }

    /// Forget the join so the next [`SyncChannel::join`] sends again, e.g. after a reconnect.
    pub fn reset_join(&mut self) {
        self.joined = false;
    }

    /// Broadcast committed changes. Send failures are logged and dropped.
    pub fn publish(&mut self, changes: &[SceneChange]) {
        for change in changes {
            let room_id = self.room_id.clone();
            let message = match change {
                SceneChange::Drawn(element) => WireMessage::Draw {
                    room_id,
                    drawing: element.clone(),
                },
                SceneChange::Updated(element) => WireMessage::Update {
                    room_id,
                    updated_element: element.clone(),
                },
                SceneChange::Erased(ids) if ids.is_empty() => continue,
                SceneChange::Erased(ids) => WireMessage::Erase {
                    room_id,
                    erased_ids: ids.clone(),
                },
            };
            self.send(message);
        }
    }

    fn send(&mut self, message: WireMessage) {
        let text = match message.to_json() {
            Ok(text) => text,
            Err(e) => {
                log::warn!("failed to encode wire message: {}", e);
                return;
            }
        };
        if let Err(e) = self.transport.send(text) {
            log::warn!("send to room {} failed: {}", self.room_id, e);
        }
    }

    /// Drain the transport and apply every message. Returns what was applied.
    pub fn pump(&mut self, scene: &mut impl SceneWriter) -> Vec<Inbound> {
        let frames = self.transport.poll_inbound();
        frames
            .iter()
            .filter_map(|text| self.receive(text, scene))
            .collect()
    }

    /// Apply one inbound frame, logging and dropping anything unusable.
    pub fn receive(&mut self, text: &str, scene: &mut impl SceneWriter) -> Option<Inbound> {
        match self.apply(text, scene) {
            Ok(inbound) => Some(inbound),
            Err(SyncError::RoomMismatch { expected, got }) => {
                log::debug!("dropping message for room {} (joined {})", got, expected);
                None
            }
            Err(e) => {
                log::warn!("dropping inbound message: {}", e);
                None
            }
        }
    }

    /// Apply one inbound frame to the scene.
    pub fn apply(&mut self, text: &str, scene: &mut impl SceneWriter) -> SyncResult<Inbound> {
        let message = decode(text)?;
        if let Some(room) = message.room_id() {
            if room != self.room_id {
                return Err(SyncError::RoomMismatch {
                    expected: self.room_id.clone(),
                    got: room.to_string(),
                });
            }
        }

        let inbound = match message {
            WireMessage::Joined { peer_count, .. } => {
                log::info!("joined room {} with {} peer(s)", self.room_id, peer_count);
                self.peer_count = peer_count;
                Inbound::Joined { peer_count }
            }
            WireMessage::Draw { drawing, .. } => {
                drawing.validate()?;
                if drawing.is_eraser_trail() {
                    return Ok(Inbound::Ignored);
                }
                let id = drawing.id;
                scene.add(drawing);
                Inbound::Drawn(id)
            }
            WireMessage::Update { updated_element, .. } => {
                updated_element.validate()?;
                if updated_element.is_eraser_trail() {
                    return Ok(Inbound::Ignored);
                }
                let id = updated_element.id;
                scene.update(updated_element);
                Inbound::Updated(id)
            }
            WireMessage::Erase { erased_ids, .. } => Inbound::Erased(scene.delete_many(&erased_ids)),
            WireMessage::Error { message } => {
                log::warn!("relay reported: {}", message);
                Inbound::ServerError(message)
            }
            WireMessage::JoinRoom { .. } => Inbound::Ignored,
        };
        Ok(inbound)
    }
}
