//! Input validation for submitted prompts. Runs before any record is
//! persisted; a failure here never touches the ledger.

use thiserror::Error;

pub const PROMPT_MIN_CHARS: usize = 3;
pub const PROMPT_MAX_CHARS: usize = 2000;
pub const OWNED_CHARACTERS_MAX_CHARS: usize = 1000;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

/// The strategy/question text: required, 3 to 2000 characters.
pub fn validate_prompt(field: &'static str, prompt: &str) -> Result<(), ValidationError> {
    let length = prompt.chars().count();
    if length < PROMPT_MIN_CHARS {
        return Err(ValidationError::new(
            field,
            format!("must be at least {PROMPT_MIN_CHARS} characters"),
        ));
    }
    if length > PROMPT_MAX_CHARS {
        return Err(ValidationError::new(
            field,
            format!("must be at most {PROMPT_MAX_CHARS} characters"),
        ));
    }
    Ok(())
}

/// The raw comma-separated owned-characters string, bounded before splitting.
pub fn validate_owned_characters_raw(raw: &str) -> Result<(), ValidationError> {
    if raw.chars().count() > OWNED_CHARACTERS_MAX_CHARS {
        return Err(ValidationError::new(
            "ownedCharacters",
            format!("must be at most {OWNED_CHARACTERS_MAX_CHARS} characters"),
        ));
    }
    Ok(())
}

/// The model selector, when the caller provides one, must be non-empty.
pub fn validate_model_selector(model: &str) -> Result<(), ValidationError> {
    if model.trim().is_empty() {
        return Err(ValidationError::new("model", "must not be empty when provided"));
    }
    Ok(())
}
