//! Persistence gateway
//!
//! Commits finished sessions to the store and keeps the global counters in
//! step. The session insert and the counter update run in one transaction;
//! the counter update is a single upsert, so the first writer creates the
//! statistics row and every later writer increments it.

use mirage_common::db::{retry_on_busy, GLOBAL_STATISTICS_ID};
use mirage_common::{Error, ImageData, Result, Session, Statistics};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Longest a persist keeps retrying on a locked database
const MAX_LOCK_WAIT_MS: u64 = 3000;

#[derive(Clone)]
pub struct PersistenceGateway {
    pool: SqlitePool,
}

impl PersistenceGateway {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Store a finished session and count it; returns the store-assigned id
    pub async fn persist(&self, session: &Session) -> Result<String> {
        session.validate()?;
        if session.selected_image_index.is_none() {
            return Err(Error::InvalidInput(
                "Session has no selected image".to_string(),
            ));
        }

        let id = Uuid::new_v4().simple().to_string();
        let generated_images = serde_json::to_string(&session.generated_images)?;

        retry_on_busy("persist session", MAX_LOCK_WAIT_MS, || {
            self.write_session(&id, session, &generated_images)
        })
        .await?;

        tracing::info!(
            session_id = %id,
            local_id = %session.id,
            user_confirmed = ?session.user_confirmed,
            "Session persisted"
        );

        Ok(id)
    }

    async fn write_session(&self, id: &str, session: &Session, generated_images: &str) -> Result<()> {
        let selected_image_index = session.selected_image_index.map(|i| i as i64);
        let confirmed_increment: i64 = if session.user_confirmed == Some(true) { 1 } else { 0 };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sessions (
                id, selected_image_index, user_confirmed, revealed, timestamp, generated_images
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(selected_image_index)
        .bind(session.user_confirmed)
        .bind(session.revealed)
        .bind(session.timestamp)
        .bind(generated_images)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO statistics (id, total_participants, selected_ai, confirmed_as_real)
            VALUES (?, 1, 1, ?)
            ON CONFLICT(id) DO UPDATE SET
                total_participants = total_participants + 1,
                selected_ai = selected_ai + 1,
                confirmed_as_real = confirmed_as_real + excluded.confirmed_as_real,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(GLOBAL_STATISTICS_ID)
        .bind(confirmed_increment)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Load a persisted session; `None` when the id is unknown
    pub async fn fetch_by_id(&self, id: &str) -> Result<Option<Session>> {
        let row = sqlx::query(
            r#"
            SELECT id, selected_image_index, user_confirmed, revealed, timestamp, generated_images
            FROM sessions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let selected_image_index: Option<i64> = row.try_get("selected_image_index")?;
        let selected_image_index = selected_image_index
            .map(|i| {
                usize::try_from(i)
                    .map_err(|_| Error::Internal(format!("Stored selected_image_index {} is negative", i)))
            })
            .transpose()?;

        let generated_images: String = row.try_get("generated_images")?;
        let generated_images: Vec<ImageData> = serde_json::from_str(&generated_images)?;

        Ok(Some(Session {
            id: row.try_get("id")?,
            original_image: None,
            generated_images,
            selected_image_index,
            user_confirmed: row.try_get("user_confirmed")?,
            timestamp: row.try_get("timestamp")?,
            revealed: row.try_get("revealed")?,
        }))
    }

    /// Current counters; all zero until the first session is persisted
    pub async fn fetch_statistics(&self) -> Result<Statistics> {
        let row = sqlx::query_as::<_, (i64, i64, i64)>(
            "SELECT total_participants, selected_ai, confirmed_as_real FROM statistics WHERE id = ?",
        )
        .bind(GLOBAL_STATISTICS_ID)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .map(|(total_participants, selected_ai, confirmed_as_real)| Statistics {
                total_participants,
                selected_ai,
                confirmed_as_real,
            })
            .unwrap_or_default())
    }
}
