//! Map provider failures onto the three coarse [`LlmErrorKind`] buckets.

use chatdesk_core::LlmErrorKind;
use reqwest::StatusCode;

const AUTH_MARKERS: &[&str] = &[
    "api key",
    "api_key",
    "apikey",
    "unauthorized",
    "unauthenticated",
    "authentication",
    "permission denied",
    "invalid credentials",
    "security token",
];

const RATE_MARKERS: &[&str] = &[
    "quota",
    "rate limit",
    "rate_limit",
    "too many requests",
    "resource_exhausted",
    "throttl",
];

/// Classify free-form error text.
pub fn classify_message(message: &str) -> LlmErrorKind {
    let lower = message.to_ascii_lowercase();
    if AUTH_MARKERS.iter().any(|m| lower.contains(m)) {
        LlmErrorKind::Authentication
    } else if RATE_MARKERS.iter().any(|m| lower.contains(m)) {
        LlmErrorKind::RateLimited
    } else {
        LlmErrorKind::Unavailable
    }
}

/// Classify an HTTP error response. Some providers answer bad keys with 400,
/// so the body is consulted when the status alone is not conclusive.
pub fn classify_http_status(status: StatusCode, body: &str) -> LlmErrorKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmErrorKind::Authentication,
        StatusCode::TOO_MANY_REQUESTS => LlmErrorKind::RateLimited,
        _ if status.is_client_error() => classify_message(body),
        _ => LlmErrorKind::Unavailable,
    }
}

/// Classify an AWS-style error code such as `ThrottlingException`.
pub fn classify_error_code(code: Option<&str>, message: &str) -> LlmErrorKind {
    match code {
        Some(
            "AccessDeniedException"
            | "UnrecognizedClientException"
            | "InvalidSignatureException"
            | "ExpiredTokenException",
        ) => LlmErrorKind::Authentication,
        Some("ThrottlingException" | "ServiceQuotaExceededException") => LlmErrorKind::RateLimited,
        _ => classify_message(message),
    }
}
