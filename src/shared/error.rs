use axum::{response::IntoResponse, Json};

/// Error taxonomy for the orchestrator. State-machine and transactional
/// failures surface to the initiating actor; notification and best-effort
/// message failures are logged by their call sites and never reach here.
#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("Assistant service unavailable: {0}")]
    AssistantServiceUnavailable(String),
    #[error("Booking transaction failed: {0}")]
    BookingTransactionFailed(String),
    #[error("Archival transaction failed: {0}")]
    ArchivalTransactionFailed(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl IntoResponse for DeskError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let (status, message) = match &self {
            Self::InvalidTransition(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::AssistantServiceUnavailable(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            Self::BookingTransactionFailed(msg)
            | Self::ArchivalTransactionFailed(msg)
            | Self::Storage(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
