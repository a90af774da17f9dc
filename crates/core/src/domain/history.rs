use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user::UserId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryId(pub String);

impl HistoryId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for HistoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    TeamSuggest,
    AskQuestion,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TeamSuggest => "team_suggest",
            Self::AskQuestion => "ask_question",
        }
    }
}

impl std::str::FromStr for QueryKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "team_suggest" => Ok(Self::TeamSuggest),
            "ask_question" => Ok(Self::AskQuestion),
            other => Err(DomainError::InvariantViolation(format!("unknown query kind `{other}`"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Pending,
    Success,
    Error,
}

impl QueryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::str::FromStr for QueryStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            other => {
                Err(DomainError::InvariantViolation(format!("unknown query status `{other}`")))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentPiece {
    pub slot: String,
    pub name: String,
    pub effect: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    pub rarity: String,
    pub passive: String,
    pub equipment: Vec<EquipmentPiece>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSuggestion {
    pub strategy: String,
    pub char1: Character,
    pub char2: Character,
    pub char3: Character,
}

/// Successful result of a query, stored as JSON in the history row. The
/// untagged encoding keeps the stored shapes identical to the wire payloads:
/// a team object for `team_suggest`, `{"text": ...}` for `ask_question`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryPayload {
    Team(TeamSuggestion),
    Text { text: String },
}

/// One orchestrated request: created Pending before the external call is
/// attempted, moved to exactly one terminal state afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: HistoryId,
    pub user_id: UserId,
    pub kind: QueryKind,
    pub prompt: String,
    pub owned_characters: Vec<String>,
    pub model: Option<String>,
    pub status: QueryStatus,
    pub response: Option<QueryPayload>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HistoryRecord {
    pub fn new_pending(
        user_id: UserId,
        kind: QueryKind,
        prompt: String,
        owned_characters: Vec<String>,
        model: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: HistoryId::generate(),
            user_id,
            kind,
            prompt,
            owned_characters,
            model,
            status: QueryStatus::Pending,
            response: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move a pending record to `Success`. The payload and the error message
    /// are mutually exclusive; a terminal record never transitions again.
    pub fn mark_success(
        &mut self,
        payload: QueryPayload,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.transition_to(QueryStatus::Success)?;
        self.response = Some(payload);
        self.error_message = None;
        self.updated_at = now;
        Ok(())
    }

    /// Move a pending record to `Error` with a diagnostic message.
    pub fn mark_error(
        &mut self,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.transition_to(QueryStatus::Error)?;
        self.error_message = Some(message.into());
        self.response = None;
        self.updated_at = now;
        Ok(())
    }

    fn transition_to(&mut self, next: QueryStatus) -> Result<(), DomainError> {
        if self.status == QueryStatus::Pending && next.is_terminal() {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidStatusTransition { from: self.status, to: next })
    }
}
