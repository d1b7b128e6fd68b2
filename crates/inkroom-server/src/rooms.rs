//! Room membership and fan-out.

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// A frame relayed inside a room, tagged with the sending connection.
pub type Relayed = (Uuid, Arc<str>);

struct Room {
    tx: broadcast::Sender<Relayed>,
    peers: HashSet<Uuid>,
}

impl Room {
    fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            peers: HashSet::new(),
        }
    }
}

/// Active rooms keyed by room id.
pub struct RoomRegistry {
    rooms: DashMap<String, Room>,
    capacity: usize,
}

impl RoomRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Add a peer to a room, creating it if needed.
    ///
    /// Returns the room's receiver and the member count including the new peer.
    pub fn join(&self, room_id: &str, peer: Uuid) -> (broadcast::Receiver<Relayed>, usize) {
        let mut room = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Room::new(self.capacity));
        room.peers.insert(peer);
        (room.tx.subscribe(), room.peers.len())
    }

    /// Remove a peer. Empty rooms are dropped.
    pub fn leave(&self, room_id: &str, peer: Uuid) {
        let now_empty = match self.rooms.get_mut(room_id) {
            Some(mut room) => {
                room.peers.remove(&peer);
                room.peers.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.rooms.remove_if(room_id, |_, room| room.peers.is_empty());
        }
    }

    /// Send a frame to every member of the room; receivers skip their own frames.
    ///
    /// Returns how many receivers it was queued for.
    pub fn broadcast(&self, room_id: &str, from: Uuid, text: Arc<str>) -> usize {
        match self.rooms.get(room_id) {
            Some(room) => room.tx.send((from, text)).unwrap_or(0),
            None => 0,
        }
    }

    pub fn peer_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map(|room| room.peers.len()).unwrap_or(0)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
