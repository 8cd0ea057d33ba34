//! JSON error envelope shared by every endpoint.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chatdesk_core::{ChatdeskError, ValidationCode};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// Body of every non-2xx response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

/// An error on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn missing_message() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ValidationCode::MissingMessage.as_str(),
            "Message is required and must be a string",
        )
    }

    pub fn rate_limited() -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            "RATE_LIMITED",
            "Too many requests, please try again later.",
        )
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "Internal server error",
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl From<ChatdeskError> for ApiError {
    fn from(err: ChatdeskError) -> Self {
        match err {
            ChatdeskError::Validation { code, message } => {
                warn!("Rejected request ({}): {}", code, message);
                Self::new(StatusCode::BAD_REQUEST, code.as_str(), message)
            }
            ChatdeskError::NotFound(what) => {
                warn!("{}", what);
                Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", what)
            }
            other => {
                error!("Request failed: {}", other);
                Self::internal()
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!("Unreadable request body: {}", rejection.body_text());
        Self::new(
            StatusCode::BAD_REQUEST,
            ValidationCode::InvalidRequest.as_str(),
            "Invalid request body",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            error: self.message,
            code: self.code.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}
