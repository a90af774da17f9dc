use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use teamcoach_core::domain::history::{HistoryId, HistoryRecord, QueryPayload};
use teamcoach_core::domain::user::UserId;

use super::{format_timestamp, parse_timestamp, HistoryPage, HistoryRepository, RepositoryError};
use crate::DbPool;

pub struct SqlHistoryRepository {
    pool: DbPool,
}

impl SqlHistoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch_by_id(&self, id: &HistoryId) -> Result<HistoryRecord, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, query_type, prompt, owned_characters, model_slug,
                   status, response, error_message, created_at, updated_at
            FROM query_history
            WHERE id = ?
            "#,
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_record(&row),
            None => Err(RepositoryError::NotFound { entity: "history record", id: id.0.clone() }),
        }
    }
}

fn row_to_record(row: &SqliteRow) -> Result<HistoryRecord, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_id: String =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let query_type: String =
        row.try_get("query_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let prompt: String =
        row.try_get("prompt").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let owned_raw: String =
        row.try_get("owned_characters").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let model_slug: Option<String> =
        row.try_get("model_slug").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let response_raw: Option<String> =
        row.try_get("response").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let error_message: Option<String> =
        row.try_get("error_message").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_raw: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_raw: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let owned_characters: Vec<String> = serde_json::from_str(&owned_raw)
        .map_err(|e| RepositoryError::Decode(format!("invalid owned_characters column: {e}")))?;
    let response: Option<QueryPayload> = match response_raw {
        Some(raw) => Some(
            serde_json::from_str(&raw)
                .map_err(|e| RepositoryError::Decode(format!("invalid response column: {e}")))?,
        ),
        None => None,
    };

    Ok(HistoryRecord {
        id: HistoryId(id),
        user_id: UserId(user_id),
        kind: query_type.parse().map_err(|e| RepositoryError::Decode(format!("{e}")))?,
        prompt,
        owned_characters,
        model: model_slug,
        status: status.parse().map_err(|e| RepositoryError::Decode(format!("{e}")))?,
        response,
        error_message,
        created_at: parse_timestamp(&created_at_raw)?,
        updated_at: parse_timestamp(&updated_at_raw)?,
    })
}

#[async_trait]
impl HistoryRepository for SqlHistoryRepository {
    async fn insert_pending(&self, record: &HistoryRecord) -> Result<(), RepositoryError> {
        let owned_json = serde_json::to_string(&record.owned_characters)
            .map_err(|e| RepositoryError::Decode(format!("owned_characters encode: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO query_history (
                id, user_id, query_type, prompt, owned_characters, model_slug,
                status, response, error_message, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, NULL, NULL, ?, ?)
            "#,
        )
        .bind(&record.id.0)
        .bind(&record.user_id.0)
        .bind(record.kind.as_str())
        .bind(&record.prompt)
        .bind(&owned_json)
        .bind(record.model.as_deref())
        .bind(record.status.as_str())
        .bind(format_timestamp(&record.created_at))
        .bind(format_timestamp(&record.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_success(
        &self,
        id: &HistoryId,
        payload: &QueryPayload,
        now: DateTime<Utc>,
    ) -> Result<HistoryRecord, RepositoryError> {
        let payload_json = serde_json::to_string(payload)
            .map_err(|e| RepositoryError::Decode(format!("response encode: {e}")))?;

        let result = sqlx::query(
            "UPDATE query_history
             SET status = 'success', response = ?, error_message = NULL, updated_at = ?
             WHERE id = ?",
        )
        .bind(&payload_json)
        .bind(format_timestamp(&now))
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound { entity: "history record", id: id.0.clone() });
        }

        self.fetch_by_id(id).await
    }

    async fn mark_error(
        &self,
        id: &HistoryId,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<HistoryRecord, RepositoryError> {
        let result = sqlx::query(
            "UPDATE query_history
             SET status = 'error', error_message = ?, response = NULL, updated_at = ?
             WHERE id = ?",
        )
        .bind(message)
        .bind(format_timestamp(&now))
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound { entity: "history record", id: id.0.clone() });
        }

        self.fetch_by_id(id).await
    }

    async fn find_for_user(
        &self,
        user: &UserId,
        id: &HistoryId,
    ) -> Result<HistoryRecord, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, query_type, prompt, owned_characters, model_slug,
                   status, response, error_message, created_at, updated_at
            FROM query_history
            WHERE user_id = ? AND id = ?
            "#,
        )
        .bind(&user.0)
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_record(&row),
            None => Err(RepositoryError::NotFound { entity: "history record", id: id.0.clone() }),
        }
    }

    async fn list_for_user(
        &self,
        user: &UserId,
        page: u32,
        per_page: u32,
    ) -> Result<HistoryPage, RepositoryError> {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let offset = i64::from(page - 1) * i64::from(per_page);

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM query_history WHERE user_id = ?")
                .bind(&user.0)
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query(
            r#"
            SELECT id, user_id, query_type, prompt, owned_characters, model_slug,
                   status, response, error_message, created_at, updated_at
            FROM query_history
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(&user.0)
        .bind(i64::from(per_page))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let records =
            rows.iter().map(row_to_record).collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(HistoryPage { records, page, per_page, total })
    }

    async fn count_created_between(
        &self,
        user: &UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM query_history
             WHERE user_id = ? AND created_at >= ? AND created_at < ?",
        )
        .bind(&user.0)
        .bind(format_timestamp(&start))
        .bind(format_timestamp(&end))
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
