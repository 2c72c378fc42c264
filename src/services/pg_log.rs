//! Postgres-backed action log.
//!
//! DESIGN
//! ======
//! `draw_actions.id` is a `BIGSERIAL`, so the row id doubles as the
//! replay sequence. Appends upsert the owning `sessions` row in the same
//! transaction; a client may draw in a session id that was never created
//! through the REST API.

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::action_log::{ActionLog, ActionLogError};
use crate::action::{Action, ActionKind, Room, RoomPage, RoomSummary};

#[derive(Clone)]
pub struct PgActionLog {
    pool: PgPool,
}

impl PgActionLog {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActionLog for PgActionLog {
    async fn append_action(&self, room_id: &str, action: &ActionKind, user_id: &str) -> Result<i64, ActionLogError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO sessions (id, name) VALUES ($1, $1) ON CONFLICT (id) DO NOTHING")
            .bind(room_id)
            .execute(tx.as_mut())
            .await?;
        let sequence: i64 = sqlx::query_scalar(
            "INSERT INTO draw_actions (session_id, action_type, data, user_id) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(room_id)
        .bind(action.type_name())
        .bind(action.payload())
        .bind(user_id)
        .fetch_one(tx.as_mut())
        .await?;
        tx.commit().await?;
        Ok(sequence)
    }

    async fn list_actions(&self, room_id: &str) -> Result<Vec<Action>, ActionLogError> {
        let rows = sqlx::query_as::<_, (i64, String, serde_json::Value, String)>(
            "SELECT id, action_type, data, user_id FROM draw_actions WHERE session_id = $1 ORDER BY id ASC",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(sequence, action_type, data, user_id)| {
                let kind = ActionKind::from_parts(&action_type, data)
                    .map_err(|source| ActionLogError::CorruptPayload { sequence, source })?;
                Ok(Action { sequence, room_id: room_id.to_owned(), user_id, kind })
            })
            .collect()
    }

    async fn room_exists(&self, room_id: &str) -> Result<bool, ActionLogError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sessions WHERE id = $1)")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn delete_room(&self, room_id: &str) -> Result<bool, ActionLogError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM draw_actions WHERE session_id = $1")
            .bind(room_id)
            .execute(tx.as_mut())
            .await?;
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(room_id)
            .execute(tx.as_mut())
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_room(&self, name: &str, creator_id: Option<&str>) -> Result<Room, ActionLogError> {
        let id = Uuid::new_v4().to_string();
        let created_at: OffsetDateTime =
            sqlx::query_scalar("INSERT INTO sessions (id, name, creator_id) VALUES ($1, $2, $3) RETURNING created_at")
                .bind(&id)
                .bind(name)
                .bind(creator_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(Room { id, name: name.to_owned(), creator_id: creator_id.map(str::to_owned), created_at })
    }

    async fn list_rooms(&self, limit: i64, offset: i64) -> Result<RoomPage, ActionLogError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, (String, String, Option<String>, OffsetDateTime, i64)>(
            "SELECT s.id, s.name, s.creator_id, s.created_at, \
                    (SELECT COUNT(*) FROM draw_actions a WHERE a.session_id = s.id) AS action_count \
             FROM sessions s \
             ORDER BY s.created_at DESC, s.id ASC \
             LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let rooms = rows
            .into_iter()
            .map(|(id, name, creator_id, created_at, action_count)| RoomSummary {
                room: Room { id, name, creator_id, created_at },
                action_count,
            })
            .collect();
        Ok(RoomPage { rooms, total })
    }

    async fn list_participants(&self, room_id: &str) -> Result<Vec<String>, ActionLogError> {
        let users: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT user_id FROM draw_actions WHERE session_id = $1 ORDER BY user_id ASC")
                .bind(room_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(users)
    }
}

#[cfg(all(test, feature = "live-db-tests"))]
#[path = "pg_log_test.rs"]
mod tests;
