//! Persistence writer: single-task, FIFO queue of action appends.
//!
//! DESIGN
//! ======
//! The broadcast path never waits on storage: it enqueues an append with
//! `try_send` and moves on. One background task drains the queue in order
//! and retries transient failures with linear back-off.
//!
//! A join asks for a `Snapshot` of the room through the same queue. The
//! writer reads history when it reaches that command, so the snapshot holds
//! every append enqueued before the join and none after. The caller awaits
//! the reply on its own task; the coordinator never waits on storage.
//!
//! ERROR HANDLING
//! ==============
//! A full or closed queue drops the append with a warning, and an append
//! that still fails after retries is dropped the same way. The action was
//! already delivered live; it is only missing from later history.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::action_log::{ActionLog, ActionLogError};
use crate::action::{Action, ActionKind, RoomId};
use crate::frame::ErrorCode;

pub const DEFAULT_PERSIST_QUEUE_CAPACITY: usize = 8192;
pub const DEFAULT_PERSIST_RETRIES: usize = 2;
pub const DEFAULT_PERSIST_RETRY_BASE_MS: u64 = 20;

/// Tuning knobs for the persistence writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistConfig {
    /// Bounded channel capacity for pending appends.
    pub queue_capacity: usize,
    /// Extra attempts after the first failure.
    pub retries: usize,
    /// Base delay in milliseconds; attempt `n` waits `n * retry_base_ms`.
    pub retry_base_ms: u64,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_PERSIST_QUEUE_CAPACITY,
            retries: DEFAULT_PERSIST_RETRIES,
            retry_base_ms: DEFAULT_PERSIST_RETRY_BASE_MS,
        }
    }
}

#[derive(Debug)]
struct PendingAppend {
    room_id: RoomId,
    user_id: String,
    action: ActionKind,
}

/// Pending reply to a `snapshot` request.
pub type SnapshotReply = oneshot::Receiver<Result<Vec<Action>, ActionLogError>>;

#[derive(Debug)]
enum PersistCommand {
    Append(PendingAppend),
    Snapshot {
        room_id: RoomId,
        reply: oneshot::Sender<Result<Vec<Action>, ActionLogError>>,
    },
}

/// Cloneable handle to the writer task.
#[derive(Clone)]
pub struct ActionWriter {
    tx: mpsc::Sender<PersistCommand>,
}

impl ActionWriter {
    /// Spawn the writer task. The task exits once every handle is dropped
    /// and the queue is drained.
    #[must_use]
    pub fn spawn(log: Arc<dyn ActionLog>, config: PersistConfig) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<PersistCommand>(config.queue_capacity.max(1));

        info!(
            queue_capacity = config.queue_capacity,
            retries = config.retries,
            retry_base_ms = config.retry_base_ms,
            "action persistence writer configured"
        );

        let handle = tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    PersistCommand::Append(pending) => append_with_retry(log.as_ref(), &pending, config).await,
                    PersistCommand::Snapshot { room_id, reply } => {
                        // The requester may have timed out and gone.
                        let _ = reply.send(log.list_actions(&room_id).await);
                    }
                }
            }
            info!("action persistence writer stopped");
        });

        (Self { tx }, handle)
    }

    /// Best-effort, non-blocking enqueue. Returns `false` if the append was
    /// dropped.
    pub fn enqueue(&self, room_id: &str, user_id: &str, action: ActionKind) -> bool {
        let pending = PendingAppend { room_id: room_id.to_owned(), user_id: user_id.to_owned(), action };
        match self.tx.try_send(PersistCommand::Append(pending)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(room = %room_id, "action persist queue full; dropping action");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(room = %room_id, "action persist queue closed; dropping action");
                false
            }
        }
    }

    /// Queue a history read for `room_id` behind every append enqueued so
    /// far. `None` if the queue is full or closed; the caller then reads the
    /// log directly and may miss appends still in flight.
    pub fn snapshot(&self, room_id: &str) -> Option<SnapshotReply> {
        let (reply, reply_rx) = oneshot::channel();
        let command = PersistCommand::Snapshot { room_id: room_id.to_owned(), reply };
        match self.tx.try_send(command) {
            Ok(()) => Some(reply_rx),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(room = %room_id, "action persist queue full; reading history out of band");
                None
            }
            Err(mpsc::error::TrySendError::Closed(_)) => None,
        }
    }
}

async fn append_with_retry(log: &dyn ActionLog, pending: &PendingAppend, config: PersistConfig) {
    let attempts = config.retries + 1;
    for attempt in 1..=attempts {
        match log
            .append_action(&pending.room_id, &pending.action, &pending.user_id)
            .await
        {
            Ok(sequence) => {
                debug!(room = %pending.room_id, sequence, kind = pending.action.type_name(), "action persisted");
                return;
            }
            Err(e) if attempt < attempts && e.retryable() => {
                warn!(
                    error = %e,
                    code = e.error_code(),
                    attempt,
                    total = attempts,
                    room = %pending.room_id,
                    "action persist failed; retrying"
                );
                tokio::time::sleep(Duration::from_millis((attempt as u64) * config.retry_base_ms)).await;
            }
            Err(e) => {
                warn!(
                    error = %e,
                    code = e.error_code(),
                    room = %pending.room_id,
                    kind = pending.action.type_name(),
                    "action persist failed; action dropped from history"
                );
                return;
            }
        }
    }
}

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;
