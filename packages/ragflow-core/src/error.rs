//! Shared error taxonomy (§7): every failure in the engine, runners, and
//! pipeline is classified into one of these categories so callers can
//! decide whether to retry, fail the run, or degrade gracefully.

use thiserror::Error;

/// How a `FlowError` should be handled by its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Flow/graph shape is invalid. Never retryable; always fails the run
    /// before any node executes.
    Structural,
    /// A transient I/O failure from an external service (embedding,
    /// rerank). Retryable with bounded exponential backoff.
    TransientIo,
    /// A permanent I/O failure (auth, not-found, bad request). Fails the
    /// run; not retryable.
    PermanentIo,
    /// Bad or unexpected payload shape. Fails the node; the pipeline may
    /// still degrade gracefully around it.
    Payload,
    /// The run was cancelled. Terminal but not erroneous; persistence of
    /// partial results is suppressed.
    Cancelled,
}

/// The workspace-wide error type.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("cycle detected in flow graph")]
    CycleDetected,

    #[error("unknown node type: {0}")]
    NodeTypeUnknown(String),

    #[error("node {node} missing required input: {field}")]
    MissingRequiredInput { node: String, field: String },

    #[error("node {node} field {field}: expected {expected}, got {actual}")]
    TypeMismatch {
        node: String,
        field: String,
        expected: String,
        actual: String,
    },

    #[error("node {node} has duplicate binding for field {field}")]
    DuplicateBinding { node: String, field: String },

    #[error("node {node} binding for field {field} references unknown node {ref_node}")]
    UnknownBindingTarget {
        node: String,
        field: String,
        ref_node: String,
    },

    #[error("node {node} binding for field {field} references unknown global {name}")]
    UnknownGlobal { node: String, field: String, name: String },

    #[error("node {node} binding for field {field} references node {ref_node}'s output field {ref_field}, which is not in its output schema")]
    UnknownBindingField {
        node: String,
        field: String,
        ref_node: String,
        ref_field: String,
    },

    #[error("unknown merge strategy: {0}")]
    UnknownMergeStrategy(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("authentication failed: {0}")]
    AuthFailure(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("prompt too long for model context window")]
    PromptTooLong,

    #[error("too many documents submitted to rerank: {0} > {1}")]
    TooManyDocuments(usize, usize),

    #[error("empty input: {0}")]
    EmptyInput(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FlowError {
    pub fn category(&self) -> ErrorCategory {
        use FlowError::*;
        match self {
            CycleDetected
            | NodeTypeUnknown(_)
            | MissingRequiredInput { .. }
            | TypeMismatch { .. }
            | DuplicateBinding { .. }
            | UnknownBindingTarget { .. }
            | UnknownGlobal { .. }
            | UnknownBindingField { .. }
            | UnknownMergeStrategy(_) => ErrorCategory::Structural,

            ServiceUnavailable(_) | RateLimited(_) | Timeout(_) => ErrorCategory::TransientIo,

            AuthFailure(_) | QuotaExceeded(_) | ModelNotFound(_) | ProviderNotConfigured(_) => {
                ErrorCategory::PermanentIo
            }

            PromptTooLong | TooManyDocuments(_, _) | EmptyInput(_) | InvalidDocument(_)
            | Serialization(_) => ErrorCategory::Payload,

            Cancelled => ErrorCategory::Cancelled,

            Other(_) => ErrorCategory::PermanentIo,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::TransientIo
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_errors_are_not_retryable() {
        assert!(!FlowError::CycleDetected.is_retryable());
        assert_eq!(FlowError::CycleDetected.category(), ErrorCategory::Structural);
    }

    #[test]
    fn transient_io_errors_are_retryable() {
        assert!(FlowError::Timeout("embed".into()).is_retryable());
        assert!(FlowError::RateLimited("embed".into()).is_retryable());
    }

    #[test]
    fn cancelled_is_its_own_category() {
        assert_eq!(FlowError::Cancelled.category(), ErrorCategory::Cancelled);
        assert!(!FlowError::Cancelled.is_retryable());
    }
}
