//! In-process action log.
//!
//! Used by tests and when no `DATABASE_URL` is configured. Same ordering
//! and purge semantics as the Postgres log; nothing survives a restart.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::action_log::{ActionLog, ActionLogError};
use crate::action::{Action, ActionKind, Room, RoomId, RoomPage, RoomSummary};

#[derive(Default)]
struct Inner {
    next_sequence: i64,
    /// Insertion order; listing reverses it.
    rooms: Vec<Room>,
    actions: HashMap<RoomId, Vec<Action>>,
}

impl Inner {
    fn ensure_room(&mut self, room_id: &str) {
        if !self.rooms.iter().any(|r| r.id == room_id) {
            self.rooms.push(Room {
                id: room_id.to_owned(),
                name: room_id.to_owned(),
                creator_id: None,
                created_at: OffsetDateTime::now_utc(),
            });
        }
    }
}

#[derive(Default)]
pub struct MemoryActionLog {
    inner: Mutex<Inner>,
}

impl MemoryActionLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl ActionLog for MemoryActionLog {
    async fn append_action(&self, room_id: &str, action: &ActionKind, user_id: &str) -> Result<i64, ActionLogError> {
        let mut inner = self.lock();
        inner.ensure_room(room_id);
        inner.next_sequence += 1;
        let sequence = inner.next_sequence;
        inner
            .actions
            .entry(room_id.to_owned())
            .or_default()
            .push(Action { sequence, room_id: room_id.to_owned(), user_id: user_id.to_owned(), kind: action.clone() });
        Ok(sequence)
    }

    async fn list_actions(&self, room_id: &str) -> Result<Vec<Action>, ActionLogError> {
        Ok(self.lock().actions.get(room_id).cloned().unwrap_or_default())
    }

    async fn room_exists(&self, room_id: &str) -> Result<bool, ActionLogError> {
        Ok(self.lock().rooms.iter().any(|r| r.id == room_id))
    }

    async fn delete_room(&self, room_id: &str) -> Result<bool, ActionLogError> {
        let mut inner = self.lock();
        inner.actions.remove(room_id);
        let before = inner.rooms.len();
        inner.rooms.retain(|r| r.id != room_id);
        Ok(inner.rooms.len() != before)
    }

    async fn create_room(&self, name: &str, creator_id: Option<&str>) -> Result<Room, ActionLogError> {
        let room = Room {
            id: Uuid::new_v4().to_string(),
            name: name.to_owned(),
            creator_id: creator_id.map(str::to_owned),
            created_at: OffsetDateTime::now_utc(),
        };
        self.lock().rooms.push(room.clone());
        Ok(room)
    }

    async fn list_rooms(&self, limit: i64, offset: i64) -> Result<RoomPage, ActionLogError> {
        let inner = self.lock();
        let skip = usize::try_from(offset).unwrap_or(0);
        let take = usize::try_from(limit).unwrap_or(0);
        let rooms = inner
            .rooms
            .iter()
            .rev()
            .skip(skip)
            .take(take)
            .map(|room| RoomSummary {
                room: room.clone(),
                action_count: inner
                    .actions
                    .get(&room.id)
                    .map_or(0, |a| i64::try_from(a.len()).unwrap_or(i64::MAX)),
            })
            .collect();
        Ok(RoomPage { rooms, total: i64::try_from(inner.rooms.len()).unwrap_or(i64::MAX) })
    }

    async fn list_participants(&self, room_id: &str) -> Result<Vec<String>, ActionLogError> {
        let inner = self.lock();
        let users: BTreeSet<String> = inner
            .actions
            .get(room_id)
            .into_iter()
            .flatten()
            .map(|a| a.user_id.clone())
            .collect();
        Ok(users.into_iter().collect())
    }
}

#[cfg(test)]
#[path = "memory_log_test.rs"]
mod tests;
