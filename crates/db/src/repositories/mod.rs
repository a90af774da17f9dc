use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use teamcoach_core::domain::history::{HistoryId, HistoryRecord, QueryPayload};
use teamcoach_core::domain::user::UserId;

pub mod history;
pub mod memory;

pub use history::SqlHistoryRepository;
pub use memory::InMemoryHistoryRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
}

impl RepositoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HistoryPage {
    pub records: Vec<HistoryRecord>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// Append/update-only store of request attempts and outcomes. Every call
/// persists or reads exactly one logical unit; no multi-record transactions.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Persist a freshly created pending record.
    async fn insert_pending(&self, record: &HistoryRecord) -> Result<(), RepositoryError>;

    /// Terminal update to `success`. A missing record is a fatal lookup
    /// error, never silently ignored.
    async fn mark_success(
        &self,
        id: &HistoryId,
        payload: &QueryPayload,
        now: DateTime<Utc>,
    ) -> Result<HistoryRecord, RepositoryError>;

    /// Terminal update to `error` with the diagnostic message.
    async fn mark_error(
        &self,
        id: &HistoryId,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<HistoryRecord, RepositoryError>;

    /// Fetch a single record scoped to its owner. A record belonging to a
    /// different user is `NotFound`, never another user's data.
    async fn find_for_user(
        &self,
        user: &UserId,
        id: &HistoryId,
    ) -> Result<HistoryRecord, RepositoryError>;

    /// Newest-first page of the user's records. `page` is 1-based.
    async fn list_for_user(
        &self,
        user: &UserId,
        page: u32,
        per_page: u32,
    ) -> Result<HistoryPage, RepositoryError>;

    /// Count of records created in the half-open `[start, end)` window,
    /// used by the quota check.
    async fn count_created_between(
        &self,
        user: &UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64, RepositoryError>;
}

/// Fixed-width RFC 3339 so stored timestamps compare lexicographically in
/// chronological order.
pub(crate) fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| RepositoryError::Decode(format!("invalid timestamp `{raw}`: {err}")))
}
