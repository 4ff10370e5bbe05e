// File: src/error.rs
// Purpose: Error taxonomy shared by every layer, rendered as JSON responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Every failure a request can end in.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed request input
    #[error("{0}")]
    BadRequest(String),

    /// Missing, malformed or expired credentials
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    /// The caller exhausted its request allowance for the current window
    #[error("{0}")]
    TooManyRequests(String),

    /// A fault with a stable public message and a private detail
    #[error("{message}")]
    Internal { message: String, detail: String },

    /// Connection, pool or query failure
    #[error("Internal server error")]
    Database(#[from] sqlx::Error),
}

/// Private failure detail attached to error responses as an extension.
///
/// The server decides whether to surface it in the body.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::TooManyRequests(message.into())
    }

    pub fn internal(message: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Self::Internal {
            message: message.into(),
            detail: detail.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal { .. } | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }

    /// Detail that must never reach a production client
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::Internal { detail, .. } => Some(detail.clone()),
            Self::Database(err) => Some(err.to_string()),
            _ => None,
        }
    }

    /// Wrap a data-access fault under a stable public message.
    pub fn from_db(message: &str) -> impl FnOnce(sqlx::Error) -> AppError + '_ {
        move |err| AppError::internal(message, err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal("Internal server error", format!("{err:#}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        } else if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(reason = %self, "request rejected");
        }

        let detail = self.detail();
        let mut response = (status, Json(json!({ "message": self.to_string() }))).into_response();
        if let Some(detail) = detail {
            response.extensions_mut().insert(ErrorDetail(detail));
        }
        response
    }
}
