use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use teamcoach_core::domain::history::{HistoryId, HistoryRecord, QueryPayload};
use teamcoach_core::domain::user::UserId;

use super::{HistoryPage, HistoryRepository, RepositoryError};

/// In-memory ledger used by orchestrator and handler tests.
#[derive(Default)]
pub struct InMemoryHistoryRepository {
    records: RwLock<HashMap<String, HistoryRecord>>,
}

impl InMemoryHistoryRepository {
    pub async fn all(&self) -> Vec<HistoryRecord> {
        self.records.read().await.values().cloned().collect()
    }

    async fn update<F>(&self, id: &HistoryId, apply: F) -> Result<HistoryRecord, RepositoryError>
    where
        F: FnOnce(&mut HistoryRecord),
    {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id.0)
            .ok_or_else(|| RepositoryError::NotFound { entity: "history record", id: id.0.clone() })?;
        apply(record);
        Ok(record.clone())
    }
}

#[async_trait]
impl HistoryRepository for InMemoryHistoryRepository {
    async fn insert_pending(&self, record: &HistoryRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        records.insert(record.id.0.clone(), record.clone());
        Ok(())
    }

    async fn mark_success(
        &self,
        id: &HistoryId,
        payload: &QueryPayload,
        now: DateTime<Utc>,
    ) -> Result<HistoryRecord, RepositoryError> {
        let payload = payload.clone();
        self.update(id, |record| {
            record.status = teamcoach_core::QueryStatus::Success;
            record.response = Some(payload);
            record.error_message = None;
            record.updated_at = now;
        })
        .await
    }

    async fn mark_error(
        &self,
        id: &HistoryId,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<HistoryRecord, RepositoryError> {
        let message = message.to_string();
        self.update(id, |record| {
            record.status = teamcoach_core::QueryStatus::Error;
            record.error_message = Some(message);
            record.response = None;
            record.updated_at = now;
        })
        .await
    }

    async fn find_for_user(
        &self,
        user: &UserId,
        id: &HistoryId,
    ) -> Result<HistoryRecord, RepositoryError> {
        let records = self.records.read().await;
        records
            .get(&id.0)
            .filter(|record| record.user_id == *user)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound { entity: "history record", id: id.0.clone() })
    }

    async fn list_for_user(
        &self,
        user: &UserId,
        page: u32,
        per_page: u32,
    ) -> Result<HistoryPage, RepositoryError> {
        let page = page.max(1);
        let per_page = per_page.max(1);

        let records = self.records.read().await;
        let mut owned: Vec<HistoryRecord> =
            records.values().filter(|record| record.user_id == *user).cloned().collect();
        owned.sort_by(|a, b| {
            b.created_at.cmp(&a.created_at).then_with(|| b.id.0.cmp(&a.id.0))
        });

        let total = owned.len() as i64;
        let offset = usize::try_from(i64::from(page - 1) * i64::from(per_page)).unwrap_or(usize::MAX);
        let records: Vec<HistoryRecord> =
            owned.into_iter().skip(offset).take(per_page as usize).collect();

        Ok(HistoryPage { records, page, per_page, total })
    }

    async fn count_created_between(
        &self,
        user: &UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64, RepositoryError> {
        let records = self.records.read().await;
        let count = records
            .values()
            .filter(|record| {
                record.user_id == *user && record.created_at >= start && record.created_at < end
            })
            .count();
        Ok(count as i64)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use teamcoach_core::domain::history::{HistoryRecord, QueryKind, QueryPayload, QueryStatus};
    use teamcoach_core::domain::user::UserId;

    use crate::repositories::{HistoryRepository, InMemoryHistoryRepository};

    fn pending(user: &str, prompt: &str) -> HistoryRecord {
        HistoryRecord::new_pending(
            UserId(user.to_string()),
            QueryKind::TeamSuggest,
            prompt.to_string(),
            vec!["Scorpion".to_string()],
            None,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn in_memory_history_round_trip() {
        let repo = InMemoryHistoryRepository::default();
        let record = pending("u-1", "tanky defensive core");
        repo.insert_pending(&record).await.expect("insert");

        let found = repo.find_for_user(&record.user_id, &record.id).await.expect("find");
        assert_eq!(found, record);

        let updated = repo
            .mark_success(
                &record.id,
                &QueryPayload::Text { text: "done".to_string() },
                Utc::now(),
            )
            .await
            .expect("mark success");
        assert_eq!(updated.status, QueryStatus::Success);
    }

    #[tokio::test]
    async fn in_memory_scoping_and_window_match_sql_semantics() {
        let repo = InMemoryHistoryRepository::default();
        let user = UserId("u-1".to_string());
        let now = Utc::now();

        let mut today = pending("u-1", "today");
        today.created_at = now;
        repo.insert_pending(&today).await.expect("insert today");

        let mut yesterday = pending("u-1", "yesterday");
        yesterday.created_at = now - Duration::hours(25);
        repo.insert_pending(&yesterday).await.expect("insert yesterday");

        repo.insert_pending(&pending("u-2", "other user")).await.expect("insert other");

        let count = repo
            .count_created_between(&user, now - Duration::hours(1), now + Duration::hours(1))
            .await
            .expect("count");
        assert_eq!(count, 1);

        let error = repo
            .find_for_user(&UserId("u-2".to_string()), &today.id)
            .await
            .expect_err("cross-user lookup fails");
        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn listing_far_beyond_the_last_page_is_empty_not_a_panic() {
        let repo = InMemoryHistoryRepository::default();
        let user = UserId("u-1".to_string());
        repo.insert_pending(&pending("u-1", "only record")).await.expect("insert");

        let page = repo.list_for_user(&user, u32::MAX, u32::MAX).await.expect("list");
        assert!(page.records.is_empty());
        assert_eq!(page.total, 1);
    }
}
