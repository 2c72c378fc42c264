//! Join/leave protocol.
//!
//! STATES
//! ======
//! Each connection is `Unbound` or `Bound(room)`:
//! - `Unbound -> Bound(R)` on join: bind, tell R's other members, start a
//!   history replay of R for the joiner.
//! - `Bound(R) -> Bound(R2)`: leave R (members told, count updated) before
//!   joining R2. Re-joining R only replays history again.
//! - `Bound(R) -> Unbound` on leave; a no-op when already unbound.
//! - any -> removed on disconnect: leave if bound, then unregister. A
//!   second disconnect finds nothing and does nothing.
//!
//! HISTORY REPLAY
//! ==============
//! The join itself is synchronous. The history read runs on its own task:
//! it asks the persistence writer for a snapshot (ordered behind every
//! append queued so far), bounded by `history_timeout`, and posts the result
//! back as a `HistoryReady`. Until then the joiner's live frames are held.
//! On arrival the coordinator sends `history`, then the acknowledgment
//! (`session_joined` or `connected`), then the held frames. A result for a
//! connection that has since left, moved, or joined again is discarded.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use super::Coordinator;
use super::presence;
use super::registry::{ConnectionId, Outbound};
use crate::action::{Action, RoomId};
use crate::frame::{ErrorCode, ServerFrame};
use crate::services::action_log::ActionLog;
use crate::services::persistence::SnapshotReply;

/// Which acknowledgment follows the history batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinAck {
    /// Implicit join from the connect request.
    Connected,
    /// Explicit `join_session` frame.
    SessionJoined,
}

/// A finished history read, posted back to the coordinator.
#[derive(Debug)]
pub struct HistoryReady {
    pub connection_id: ConnectionId,
    pub room_id: RoomId,
    pub token: u64,
    pub actions: Vec<Action>,
    pub ack: JoinAck,
}

impl Coordinator {
    /// Register a connection. A room hint is an implicit join whose
    /// `connected` frame follows the history batch; without one,
    /// `connected` is queued immediately.
    pub(super) fn connect(
        &mut self,
        user_id: Option<String>,
        session_id: Option<RoomId>,
        outbound: Outbound,
    ) -> ConnectionId {
        let id = self.registry.register(user_id, outbound);
        info!(connection_id = %id, connections = self.registry.len(), "connection registered");

        match session_id {
            Some(room_id) => {
                self.join(id, &room_id, JoinAck::Connected);
            }
            None => {
                self.registry
                    .send_to(id, ServerFrame::Connected { client_id: id, session_id: None, online_users: 0 });
            }
        }
        id
    }

    /// Move a connection into `room_id` and start its history replay.
    /// Returns `false` if the connection is gone.
    pub(super) fn join(&mut self, id: ConnectionId, room_id: &str, ack: JoinAck) -> bool {
        let Some(connection) = self.registry.lookup(id) else {
            return false;
        };
        let current = connection.room_id.clone();

        if current.as_deref() == Some(room_id) {
            debug!(connection_id = %id, room = %room_id, "rejoin of current room; replaying history");
        } else {
            if current.is_some() {
                self.leave(id);
            }
            self.registry.bind(id, room_id);
            let online_users = presence::announce_joined(&mut self.registry, room_id, id);
            info!(connection_id = %id, room = %room_id, online_users, "connection joined room");
        }

        self.start_replay(id, room_id, ack);
        true
    }

    /// Unbind a connection and tell the room. Returns the room it left.
    pub(super) fn leave(&mut self, id: ConnectionId) -> Option<RoomId> {
        let room_id = self.registry.unbind(id)?;
        if let Some(connection) = self.registry.lookup_mut(id) {
            connection.cancel_replay();
        }
        let online_users = presence::announce_left(&mut self.registry, &room_id, id);
        info!(connection_id = %id, room = %room_id, online_users, "connection left room");
        Some(room_id)
    }

    /// Transport closed. Returns `false` if the connection was already gone.
    pub(super) fn disconnect(&mut self, id: ConnectionId) -> bool {
        if self.registry.lookup(id).is_none() {
            debug!(connection_id = %id, "disconnect for unknown connection ignored");
            return false;
        }
        self.leave(id);
        self.registry.unregister(id);
        info!(connection_id = %id, connections = self.registry.len(), "connection removed");
        true
    }

    /// Deliver a finished history read if the connection still waits for it.
    pub(super) fn finish_join(&mut self, ready: HistoryReady) {
        self.pending_replays = self.pending_replays.saturating_sub(1);
        let HistoryReady { connection_id: id, room_id, token, actions, ack } = ready;

        let online_users = self.registry.count_of(&room_id);
        let Some(connection) = self.registry.lookup_mut(id) else {
            debug!(connection_id = %id, room = %room_id, "history for removed connection discarded");
            return;
        };
        if connection.room_id.as_deref() != Some(room_id.as_str()) {
            debug!(connection_id = %id, room = %room_id, "history for a room no longer joined discarded");
            return;
        }

        let count = actions.len();
        let ack = match ack {
            JoinAck::Connected => {
                ServerFrame::Connected { client_id: id, session_id: Some(room_id.clone()), online_users }
            }
            JoinAck::SessionJoined => ServerFrame::SessionJoined { session_id: room_id.clone(), online_users },
        };
        if connection.finish_replay(token, ServerFrame::History { actions }, ack) {
            debug!(connection_id = %id, room = %room_id, count, "history replayed");
        } else {
            debug!(connection_id = %id, room = %room_id, "superseded history discarded");
        }
    }

    fn start_replay(&mut self, id: ConnectionId, room_id: &str, ack: JoinAck) {
        let Some(token) = self.registry.lookup_mut(id).map(|c| c.begin_replay()) else {
            return;
        };
        let snapshot = self.writer.snapshot(room_id);
        let log = Arc::clone(&self.log);
        let history_tx = self.history_tx.clone();
        let limit = self.history_timeout;
        let room_id = room_id.to_owned();
        self.pending_replays += 1;

        tokio::spawn(async move {
            let actions = read_history(log, snapshot, &room_id, limit).await;
            let ready = HistoryReady { connection_id: id, room_id, token, actions, ack };
            // Fails only once the coordinator has stopped.
            let _ = history_tx.send(ready).await;
        });
    }
}

/// Read a room's history through the writer snapshot when one was queued,
/// or straight from the log otherwise. Failures and timeouts yield an
/// empty history.
async fn read_history(
    log: Arc<dyn ActionLog>,
    snapshot: Option<SnapshotReply>,
    room_id: &str,
    limit: Duration,
) -> Vec<Action> {
    let read = async {
        match snapshot {
            Some(reply) => match reply.await {
                Ok(result) => result,
                // Writer stopped before reaching the snapshot.
                Err(_) => log.list_actions(room_id).await,
            },
            None => log.list_actions(room_id).await,
        }
    };

    match tokio::time::timeout(limit, read).await {
        Ok(Ok(actions)) => actions,
        Ok(Err(e)) => {
            error!(error = %e, code = e.error_code(), room = %room_id, "history read failed; replaying empty history");
            Vec::new()
        }
        Err(_) => {
            error!(
                room = %room_id,
                timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                "history read timed out; replaying empty history"
            );
            Vec::new()
        }
    }
}
