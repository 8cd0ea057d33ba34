//! Route handlers and their request/response bodies.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use chatdesk_agent::{HealthReport, LlmStatusSnapshot, ServiceHealth, SupportAgent};
use chatdesk_conversation::ConversationTranscript;
use chatdesk_core::ChatReply;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::error::ApiError;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<SupportAgent>,
}

/// Success envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ServiceStatuses {
    pub database: ServiceHealth,
    pub llm: ServiceHealth,
}

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub services: ServiceStatuses,
    pub llm_status: LlmStatusSnapshot,
}

impl From<HealthReport> for HealthResponse {
    fn from(report: HealthReport) -> Self {
        Self {
            status: if report.is_healthy() { "healthy" } else { "unhealthy" },
            timestamp: report.checked_at,
            services: ServiceStatuses {
                database: report.database,
                llm: report.llm,
            },
            llm_status: report.llm_status,
        }
    }
}

/// `{message, sessionId?}`, read leniently so a wrong field type gets its own
/// error code instead of a generic parse failure.
fn chat_fields(body: &Value) -> Result<(&str, Option<&str>), ApiError> {
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .ok_or_else(ApiError::missing_message)?;
    let session_id = body.get("sessionId").and_then(Value::as_str);
    Ok((message, session_id))
}

pub async fn post_message(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ApiResponse<ChatReply>>, ApiError> {
    let Json(body) = payload?;
    let (message, session_id) = chat_fields(&body)?;
    debug!("Chat message received (session: {:?})", session_id);

    let reply = state.agent.process_message(message, session_id).await?;
    Ok(ApiResponse::ok(reply))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<ConversationTranscript>>, ApiError> {
    let transcript = state.agent.get_conversation(&session_id).await?;
    Ok(ApiResponse::ok(transcript))
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let report = state.agent.health().await;
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(HealthResponse::from(report)))
}
