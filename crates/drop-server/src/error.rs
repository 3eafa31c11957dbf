use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use drop_ledger::LedgerError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("campaign not found: {0}")]
    CampaignNotFound(String),

    #[error("admin secret rejected")]
    Unauthorized,

    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("store error: {0}")]
    Store(#[from] drop_store::StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::CampaignNotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Ledger(e) => match e {
                LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
                LedgerError::NotEligible(_) => StatusCode::FORBIDDEN,
                LedgerError::PoolExhausted(_) => StatusCode::GONE,
                LedgerError::ExternalCommitFailure { .. } | LedgerError::NotStarted => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                LedgerError::InconsistentIndexState(_)
                | LedgerError::Inventory(_)
                | LedgerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Store(_) | Self::Config(_) | Self::Io(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Code returned to callers. Details stay in the logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::CampaignNotFound(_) => "campaign_not_found",
            Self::Unauthorized => "unauthorized",
            Self::BadRequest(_) => "validation_error",
            Self::Ledger(e) => e.code(),
            Self::Store(_) => "storage_error",
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => "internal_error",
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = %status, error = %self, "request failed");
        } else {
            warn!(status = %status, error = %self, "request rejected");
        }
        (status, Json(json!({ "error": self.code() }))).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
