//! Error types for the exam engine and its collaborators.
//!
//! `ServiceError` classifies transport failures from the question-bank
//! service. It lives in core so the engine and the CLI can downcast
//! collaborator errors without string matching.

use thiserror::Error;

/// Errors that can occur when talking to the question-bank service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The requested test bank or question does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The service returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ServiceError {
    /// Returns `true` if the failure is caused by the request itself rather
    /// than the transport, so re-issuing it unchanged will not help.
    pub fn is_permanent(&self) -> bool {
        match self {
            ServiceError::NotFound(_) | ServiceError::InvalidResponse(_) => true,
            ServiceError::ApiError { status, .. } => (400..500).contains(status),
            ServiceError::Timeout(_) | ServiceError::NetworkError(_) => false,
        }
    }
}

/// Errors raised by the session state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A session cannot be built from an empty question list.
    #[error("no questions available for this exam")]
    NoQuestions,

    /// Every question has already been answered.
    #[error("exam already completed")]
    Completed,

    /// The current question was already checked; the selection is frozen.
    #[error("answer already submitted for question {index}")]
    AlreadySubmitted { index: usize },

    /// The label does not name an option of the current question.
    #[error("option '{label}' does not exist on question {index}")]
    UnknownOption { index: usize, label: String },

    /// The current question cannot be scored because its data is broken.
    #[error("question {index} is in an invalid state: {reason}")]
    InvalidQuestionState { index: usize, reason: String },
}

/// Errors raised by the async exam engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No session is loaded yet, or the last load failed.
    #[error("exam is not ready: {0}")]
    NotReady(&'static str),

    /// Loading questions from the question bank failed.
    #[error("failed to load questions: {0:#}")]
    Load(anyhow::Error),

    /// Completing the exam needs a Tokio runtime to save the result.
    #[error("cannot complete the exam outside a Tokio runtime")]
    NoRuntime,

    #[error(transparent)]
    Session(#[from] SessionError),
}
