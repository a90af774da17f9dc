//! The per-request orchestration flow shared by both endpoints:
//! validate → quota check → persist pending → call the inference service →
//! persist the terminal state → shape the result.

use std::sync::Arc;

use chrono::{Local, Utc};
use thiserror::Error;
use tracing::{info, warn};

use teamcoach_core::domain::history::{HistoryId, HistoryRecord, QueryKind, QueryPayload};
use teamcoach_core::domain::user::UserId;
use teamcoach_core::{normalize, quota, validate, ValidationError};
use teamcoach_db::{HistoryRepository, RepositoryError};
use teamcoach_inference::{InferenceApi, InferenceError};

/// Terminal result of one orchestration. A dependency failure is a normal
/// outcome carried alongside the record id, not an escalated error.
#[derive(Clone, Debug, PartialEq)]
pub enum SubmitOutcome {
    Success { history_id: HistoryId, payload: QueryPayload },
    Failed { history_id: HistoryId, message: String },
}

/// Rejections and faults that prevent an orchestration from producing an
/// outcome. `Validation` and `QuotaExceeded` happen before any record is
/// created; `Repository` is an infrastructure fault.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("You have reached your daily limit of {limit} queries.")]
    QuotaExceeded { limit: u32 },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct SubmitService {
    history: Arc<dyn HistoryRepository>,
    inference: Arc<dyn InferenceApi>,
    daily_limit: u32,
    default_model: String,
}

impl SubmitService {
    pub fn new(
        history: Arc<dyn HistoryRepository>,
        inference: Arc<dyn InferenceApi>,
        daily_limit: u32,
        default_model: String,
    ) -> Self {
        Self { history, inference, daily_limit, default_model }
    }

    pub async fn submit_team_suggestion(
        &self,
        user: &UserId,
        strategy: &str,
        owned_raw: Option<&str>,
    ) -> Result<SubmitOutcome, SubmitError> {
        validate::validate_prompt("strategy", strategy)?;
        let owned_raw = owned_raw.unwrap_or("");
        validate::validate_owned_characters_raw(owned_raw)?;
        self.check_quota(user).await?;

        let owned_characters = normalize::split_owned_characters(owned_raw);

        let record = HistoryRecord::new_pending(
            user.clone(),
            QueryKind::TeamSuggest,
            strategy.to_string(),
            owned_characters.clone(),
            None,
            Utc::now(),
        );
        self.history.insert_pending(&record).await?;
        info!(
            event_name = "query.accepted",
            user_id = %user,
            history_id = %record.id,
            kind = record.kind.as_str(),
            "team suggestion accepted, calling inference service"
        );

        match self.inference.suggest_team(strategy, &owned_characters).await {
            Ok(team) => self.finish_success(record.id, QueryPayload::Team(team)).await,
            Err(error) => self.finish_error(record.id, error).await,
        }
    }

    pub async fn submit_question(
        &self,
        user: &UserId,
        question: &str,
        model: Option<&str>,
    ) -> Result<SubmitOutcome, SubmitError> {
        validate::validate_prompt("question", question)?;
        if let Some(model) = model {
            validate::validate_model_selector(model)?;
        }
        self.check_quota(user).await?;

        let model = model.unwrap_or(&self.default_model).to_string();

        let record = HistoryRecord::new_pending(
            user.clone(),
            QueryKind::AskQuestion,
            question.to_string(),
            vec![],
            Some(model.clone()),
            Utc::now(),
        );
        self.history.insert_pending(&record).await?;
        info!(
            event_name = "query.accepted",
            user_id = %user,
            history_id = %record.id,
            kind = record.kind.as_str(),
            model = %model,
            "question accepted, calling inference service"
        );

        match self.inference.ask_question(question, &model).await {
            Ok(text) => self.finish_success(record.id, QueryPayload::Text { text }).await,
            Err(error) => self.finish_error(record.id, error).await,
        }
    }

    /// The quota check and the subsequent insert are not atomic: two
    /// near-simultaneous requests from the same user can both pass before
    /// either record is counted. Accepted for a soft daily limit.
    async fn check_quota(&self, user: &UserId) -> Result<(), SubmitError> {
        if self.daily_limit == 0 {
            return Ok(());
        }

        let (start, end) = quota::day_bounds(Local::now());
        let count = self.history.count_created_between(user, start, end).await?;
        if quota::limit_reached(count, self.daily_limit) {
            info!(
                event_name = "query.quota_exceeded",
                user_id = %user,
                count_today = count,
                limit = self.daily_limit,
                "daily limit reached, rejecting before any record is created"
            );
            return Err(SubmitError::QuotaExceeded { limit: self.daily_limit });
        }

        Ok(())
    }

    async fn finish_success(
        &self,
        history_id: HistoryId,
        payload: QueryPayload,
    ) -> Result<SubmitOutcome, SubmitError> {
        self.history.mark_success(&history_id, &payload, Utc::now()).await?;
        info!(
            event_name = "query.succeeded",
            history_id = %history_id,
            "inference call succeeded, record moved to success"
        );
        Ok(SubmitOutcome::Success { history_id, payload })
    }

    async fn finish_error(
        &self,
        history_id: HistoryId,
        error: InferenceError,
    ) -> Result<SubmitOutcome, SubmitError> {
        let message = error.to_string();
        self.history.mark_error(&history_id, &message, Utc::now()).await?;
        warn!(
            event_name = "query.failed",
            history_id = %history_id,
            message = %message,
            "inference call failed, record moved to error"
        );
        Ok(SubmitOutcome::Failed { history_id, message })
    }
}
