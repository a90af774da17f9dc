use thiserror::Error;

use crate::domain::history::QueryStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid history status transition from {from:?} to {to:?}")]
    InvalidStatusTransition { from: QueryStatus, to: QueryStatus },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}
