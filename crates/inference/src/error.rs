use thiserror::Error;

/// Failure of the inference dependency. Both variants surface a
/// human-readable message through `Display`; the orchestrator records it
/// verbatim on the history record.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InferenceError {
    /// Transport-level failure: connect error, DNS failure, or timeout.
    /// `detail` carries the underlying cause for logs only.
    #[error("cannot reach the inference service; verify it is running.")]
    Unreachable { detail: String },
    /// The service responded, but with an explicit error or a shape the
    /// client does not recognize.
    #[error("{0}")]
    Service(String),
}
