//! Realtime session coordinator.
//!
//! ARCHITECTURE
//! ============
//! One task owns the `Registry` and processes `Event`s one at a time from a
//! bounded queue. Websocket tasks and REST handlers talk to it only through
//! a cloneable `CoordinatorHandle`. Because events are serialized, every
//! registry mutation and every frame produced by one event completes before
//! the next event starts; per-room ordering equals arrival order.
//!
//! The coordinator never waits on storage. Appends are queued on the
//! persistence writer, and history reads for joins run on spawned tasks
//! that post a `HistoryReady` back on a second internal queue. Outbound
//! sends never block either, so a slow log cannot stall any room.
//!
//! MODULES
//! =======
//! - `registry`: connections plus the room membership index
//! - `protocol`: join/leave/disconnect state machine and history replay
//! - `broadcast`: live fan-out of draw/clear with queued persistence
//! - `presence`: joined/left notifications with updated counts

pub mod broadcast;
pub mod presence;
pub mod protocol;
pub mod registry;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::action::RoomId;
use crate::frame::{ClientFrame, ErrorCode};
use crate::services::action_log::ActionLog;
use crate::services::persistence::ActionWriter;
use protocol::{HistoryReady, JoinAck};
use registry::{ConnectionId, Outbound, Registry};

pub const DEFAULT_COORDINATOR_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_HISTORY_TIMEOUT_MS: u64 = 5000;
const HISTORY_QUEUE_CAPACITY: usize = 256;

// =============================================================================
// EVENTS
// =============================================================================

/// Everything the coordinator reacts to.
#[derive(Debug)]
pub enum Event {
    /// A transport was accepted. `session_id` is an implicit join.
    Connect {
        user_id: Option<String>,
        session_id: Option<RoomId>,
        outbound: Outbound,
        reply: oneshot::Sender<ConnectionId>,
    },
    Inbound {
        connection_id: ConnectionId,
        frame: ClientFrame,
    },
    Disconnect {
        connection_id: ConnectionId,
    },
    /// Presence counts for a set of rooms.
    OnlineCounts {
        room_ids: Vec<RoomId>,
        reply: oneshot::Sender<HashMap<RoomId, usize>>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("coordinator is not running")]
    Closed,
}

impl ErrorCode for CoordinatorError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Closed => "E_COORDINATOR_CLOSED",
        }
    }
}

// =============================================================================
// COORDINATOR
// =============================================================================

pub struct Coordinator {
    registry: Registry,
    log: Arc<dyn ActionLog>,
    writer: ActionWriter,
    history_timeout: Duration,
    history_tx: mpsc::Sender<HistoryReady>,
    history_rx: mpsc::Receiver<HistoryReady>,
    /// History reads started and not yet delivered.
    pending_replays: usize,
}

/// Next unit of work for the run loop.
enum Next {
    Event(Event),
    History(HistoryReady),
}

impl Coordinator {
    #[must_use]
    pub fn new(log: Arc<dyn ActionLog>, writer: ActionWriter) -> Self {
        let (history_tx, history_rx) = mpsc::channel(HISTORY_QUEUE_CAPACITY);
        Self {
            registry: Registry::new(),
            log,
            writer,
            history_timeout: Duration::from_millis(DEFAULT_HISTORY_TIMEOUT_MS),
            history_tx,
            history_rx,
            pending_replays: 0,
        }
    }

    /// Upper bound on one join's history read. A read that takes longer
    /// replays an empty history.
    #[must_use]
    pub fn with_history_timeout(mut self, history_timeout: Duration) -> Self {
        self.history_timeout = history_timeout;
        self
    }

    /// Move the coordinator onto its own task.
    #[must_use]
    pub fn spawn(self, queue_capacity: usize) -> (CoordinatorHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        info!(queue_capacity, "session coordinator started");
        (CoordinatorHandle { tx }, tokio::spawn(self.run(rx)))
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Event>) {
        loop {
            // The coordinator holds a history sender, so that arm never ends
            // the loop; only the event queue closing does.
            let next = tokio::select! {
                event = rx.recv() => event.map(Next::Event),
                Some(ready) = self.history_rx.recv() => Some(Next::History(ready)),
            };
            match next {
                Some(Next::Event(event)) => self.handle(event),
                Some(Next::History(ready)) => self.finish_join(ready),
                None => break,
            }
        }
        info!(
            connections = self.registry.len(),
            pending_replays = self.pending_replays,
            "session coordinator stopped"
        );
    }

    /// Process one event. History replays it starts complete later through
    /// `finish_join`.
    pub fn handle(&mut self, event: Event) {
        match event {
            Event::Connect { user_id, session_id, outbound, reply } => {
                let id = self.connect(user_id, session_id, outbound);
                if reply.send(id).is_err() {
                    // Transport went away before learning its id.
                    self.disconnect(id);
                }
            }
            Event::Inbound { connection_id, frame } => self.handle_frame(connection_id, frame),
            Event::Disconnect { connection_id } => {
                self.disconnect(connection_id);
            }
            Event::OnlineCounts { room_ids, reply } => {
                let counts = room_ids
                    .into_iter()
                    .map(|room_id| {
                        let count = self.registry.count_of(&room_id);
                        (room_id, count)
                    })
                    .collect();
                let _ = reply.send(counts);
            }
        }
    }

    fn handle_frame(&mut self, id: ConnectionId, frame: ClientFrame) {
        match frame {
            ClientFrame::JoinSession { session_id } => {
                if session_id.is_empty() {
                    debug!(connection_id = %id, "ignoring join with empty session id");
                    return;
                }
                self.join(id, &session_id, JoinAck::SessionJoined);
            }
            ClientFrame::LeaveSession => {
                self.leave(id);
            }
            action_frame => {
                if let Some(action) = action_frame.into_action() {
                    self.route_action(id, action);
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Deliver every history read started so far.
    #[cfg(test)]
    pub(crate) async fn settle(&mut self) {
        while self.pending_replays > 0 {
            match self.history_rx.recv().await {
                Some(ready) => self.finish_join(ready),
                None => break,
            }
        }
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// Cloneable sender side of the coordinator queue.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Event>,
}

impl CoordinatorHandle {
    /// Register a transport and return its connection id. `connected`
    /// arrives on `outbound` right away without a room, or after the room's
    /// `history` batch with one.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the coordinator task has stopped.
    pub async fn connect(
        &self,
        user_id: Option<String>,
        session_id: Option<RoomId>,
        outbound: Outbound,
    ) -> Result<ConnectionId, CoordinatorError> {
        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(Event::Connect { user_id, session_id, outbound, reply })
            .await
            .map_err(|_| CoordinatorError::Closed)?;
        reply_rx.await.map_err(|_| CoordinatorError::Closed)
    }

    /// # Errors
    ///
    /// Returns `Closed` if the coordinator task has stopped.
    pub async fn inbound(&self, connection_id: ConnectionId, frame: ClientFrame) -> Result<(), CoordinatorError> {
        self.tx
            .send(Event::Inbound { connection_id, frame })
            .await
            .map_err(|_| CoordinatorError::Closed)
    }

    /// # Errors
    ///
    /// Returns `Closed` if the coordinator task has stopped.
    pub async fn disconnect(&self, connection_id: ConnectionId) -> Result<(), CoordinatorError> {
        self.tx
            .send(Event::Disconnect { connection_id })
            .await
            .map_err(|_| CoordinatorError::Closed)
    }

    /// Presence count per requested room; rooms nobody is in map to zero.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the coordinator task has stopped.
    pub async fn online_counts(&self, room_ids: Vec<RoomId>) -> Result<HashMap<RoomId, usize>, CoordinatorError> {
        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(Event::OnlineCounts { room_ids, reply })
            .await
            .map_err(|_| CoordinatorError::Closed)?;
        reply_rx.await.map_err(|_| CoordinatorError::Closed)
    }
}

#[cfg(test)]
#[path = "coordinator_test.rs"]
mod tests;
