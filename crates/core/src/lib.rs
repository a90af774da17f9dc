pub mod config;
pub mod domain;
pub mod errors;
pub mod normalize;
pub mod quota;
pub mod validate;

pub use chrono;

pub use domain::history::{
    Character, EquipmentPiece, HistoryId, HistoryRecord, QueryKind, QueryPayload, QueryStatus,
    TeamSuggestion,
};
pub use domain::user::UserId;
pub use errors::DomainError;
pub use validate::ValidationError;
