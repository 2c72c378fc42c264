//! Connection registry and room membership index.
//!
//! DESIGN
//! ======
//! `connections` is the source of truth for who is connected and which room
//! each connection is bound to. `rooms` is a secondary index from room id to
//! member connection ids, maintained by the same methods that change a
//! connection's `room_id`, so the two can never disagree. Empty member sets
//! are removed.
//!
//! A connection whose history replay is still in flight holds its live
//! frames back. `finish_replay` sends the history batch and the join
//! acknowledgment first and then the held frames, so a joiner never sees a
//! live action ahead of the history it belongs after.
//!
//! The registry does bookkeeping only. Deciding who to notify is the
//! protocol's job.

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::action::RoomId;
use crate::frame::ServerFrame;

pub type ConnectionId = Uuid;

/// Outbound channel to one websocket task.
pub type Outbound = mpsc::Sender<ServerFrame>;

/// One live connection.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    /// Externally supplied user id, or the connection id for guests.
    pub user_id: String,
    /// `None` while unbound.
    pub room_id: Option<RoomId>,
    outbound: Outbound,
    /// Frames held while a replay is in flight; `None` otherwise.
    held: Option<Vec<ServerFrame>>,
    replay_token: u64,
}

impl Connection {
    /// Queue a frame for this connection. Best-effort: a full or closed
    /// channel drops the frame. During a replay the frame is held instead,
    /// up to the outbound queue's capacity.
    pub fn send(&mut self, frame: ServerFrame) -> bool {
        let Some(held) = self.held.as_mut() else {
            return self.push(frame);
        };
        if held.len() >= self.outbound.max_capacity() {
            warn!(connection_id = %self.id, kind = frame.kind(), "held frames full during replay; dropping frame");
            return false;
        }
        held.push(frame);
        true
    }

    /// Start holding live frames. Returns the token that `finish_replay`
    /// must present; a later replay or a cancel invalidates it.
    pub fn begin_replay(&mut self) -> u64 {
        self.replay_token += 1;
        self.held = Some(Vec::new());
        self.replay_token
    }

    /// Send `history`, then `ack`, then every held frame. Returns `false`
    /// and sends nothing if `token` is stale.
    pub fn finish_replay(&mut self, token: u64, history: ServerFrame, ack: ServerFrame) -> bool {
        if token != self.replay_token {
            return false;
        }
        let Some(held) = self.held.take() else {
            return false;
        };
        self.push(history);
        self.push(ack);
        for frame in held {
            self.push(frame);
        }
        true
    }

    /// Drop any replay in flight along with its held frames.
    pub fn cancel_replay(&mut self) {
        if self.held.take().is_some() {
            self.replay_token += 1;
        }
    }

    #[must_use]
    pub fn is_replaying(&self) -> bool {
        self.held.is_some()
    }

    fn push(&self, frame: ServerFrame) -> bool {
        match self.outbound.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(frame)) => {
                warn!(connection_id = %self.id, kind = frame.kind(), "outbound queue full; dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    rooms: HashMap<RoomId, HashSet<ConnectionId>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an unbound connection and return its generated id.
    pub fn register(&mut self, user_id: Option<String>, outbound: Outbound) -> ConnectionId {
        let id = Uuid::new_v4();
        let user_id = user_id.unwrap_or_else(|| id.to_string());
        self.connections
            .insert(id, Connection { id, user_id, room_id: None, outbound, held: None, replay_token: 0 });
        id
    }

    /// Remove a connection, unbinding it first. `None` if already removed.
    pub fn unregister(&mut self, id: ConnectionId) -> Option<Connection> {
        let previous_room = self.unbind(id);
        let mut connection = self.connections.remove(&id)?;
        connection.room_id = previous_room;
        Some(connection)
    }

    #[must_use]
    pub fn lookup(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn lookup_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(&id)
    }

    /// Queue a frame for one connection. `false` if it is gone or the frame
    /// was dropped.
    pub fn send_to(&mut self, id: ConnectionId, frame: ServerFrame) -> bool {
        self.connections
            .get_mut(&id)
            .is_some_and(|connection| connection.send(frame))
    }

    /// Queue `frame` for every member of `room_id` except `exclude`.
    /// Returns how many members accepted it.
    pub fn broadcast(&mut self, room_id: &str, frame: &ServerFrame, exclude: ConnectionId) -> usize {
        let Some(members) = self.rooms.get(room_id) else {
            return 0;
        };
        let mut delivered = 0;
        for id in members.iter().filter(|id| **id != exclude) {
            if let Some(connection) = self.connections.get_mut(id)
                && connection.send(frame.clone())
            {
                delivered += 1;
            }
        }
        delivered
    }

    /// Bind a connection to `room_id`, leaving any previous room.
    /// Returns the previous room, or `None` if there was none. Binding to
    /// the current room changes nothing.
    pub fn bind(&mut self, id: ConnectionId, room_id: &str) -> Option<RoomId> {
        let current = self.connections.get(&id)?.room_id.clone();
        if current.as_deref() == Some(room_id) {
            return None;
        }
        let previous = self.unbind(id);
        let connection = self.connections.get_mut(&id)?;
        connection.room_id = Some(room_id.to_owned());
        self.rooms.entry(room_id.to_owned()).or_default().insert(id);
        previous
    }

    /// Unbind a connection. Returns the room it left, if any.
    pub fn unbind(&mut self, id: ConnectionId) -> Option<RoomId> {
        let room_id = self.connections.get_mut(&id)?.room_id.take()?;
        if let Some(members) = self.rooms.get_mut(&room_id) {
            members.remove(&id);
            if members.is_empty() {
                self.rooms.remove(&room_id);
            }
        }
        Some(room_id)
    }

    /// Connections currently bound to `room_id`.
    #[cfg(test)]
    pub(crate) fn members_of<'a>(&'a self, room_id: &str) -> impl Iterator<Item = &'a Connection> + 'a {
        self.rooms
            .get(room_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.connections.get(id))
    }

    #[must_use]
    pub fn count_of(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, HashSet::len)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Panic if the membership index disagrees with connection bindings.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let mut expected: HashMap<&str, HashSet<ConnectionId>> = HashMap::new();
        for connection in self.connections.values() {
            if let Some(room) = connection.room_id.as_deref() {
                expected.entry(room).or_default().insert(connection.id);
            }
        }
        assert_eq!(expected.len(), self.rooms.len(), "index has stale or missing rooms");
        for (room, members) in &self.rooms {
            assert_eq!(expected.get(room.as_str()), Some(members), "membership mismatch for room {room}");
        }
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
