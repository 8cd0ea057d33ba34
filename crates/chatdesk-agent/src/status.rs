use chatdesk_core::LlmErrorKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, PoisonError};

/// Point-in-time view of recent language model outcomes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmStatusSnapshot {
    pub consecutive_failures: u32,
    pub total_fallbacks: u64,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_error: Option<LlmErrorKind>,
}

/// Records whether replies came from the model or from the fallback text.
#[derive(Debug, Default)]
pub struct LlmStatus {
    inner: Mutex<LlmStatusSnapshot>,
}

impl LlmStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.consecutive_failures = 0;
        state.last_success_at = Some(Utc::now());
    }

    pub fn record_fallback(&self, kind: LlmErrorKind) {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.total_fallbacks += 1;
        state.last_failure_at = Some(Utc::now());
        state.last_error = Some(kind);
    }

    pub fn snapshot(&self) -> LlmStatusSnapshot {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
