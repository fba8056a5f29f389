//! Service error mapping.
//!
//! `ServiceError` itself lives in `examomatic-core` so the engine and CLI can
//! inspect it; this module turns reqwest failures and HTTP error bodies into it.

use serde::Deserialize;

pub use examomatic_core::error::ServiceError;

/// FastAPI error body: `{"detail": "..."}`.
#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Classify a transport failure.
pub(crate) fn from_reqwest(err: &reqwest::Error, base_url: &str, timeout_secs: u64) -> ServiceError {
    if err.is_timeout() {
        ServiceError::Timeout(timeout_secs)
    } else if err.is_connect() {
        ServiceError::NetworkError(format!(
            "question bank not reachable at {base_url}. Is the service running?"
        ))
    } else if err.is_decode() {
        ServiceError::InvalidResponse(err.to_string())
    } else {
        ServiceError::NetworkError(err.to_string())
    }
}

/// Pull a readable message out of an error response body.
///
/// Uses the `detail` field when present, otherwise the raw body.
pub(crate) fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(detail),
        }) => detail,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) => body.trim().to_string(),
    }
}

/// Map an HTTP error status to a `ServiceError`.
pub(crate) fn from_status(status: u16, body: &str) -> ServiceError {
    let message = error_message(body);
    if status == 404 {
        ServiceError::NotFound(message)
    } else {
        ServiceError::ApiError { status, message }
    }
}
