use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::DownloadError;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorInfo {
    // NETWORK_ERROR / API_ERROR / VALIDATION_ERROR / TIMEOUT_ERROR / UNKNOWN_ERROR
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl From<&DownloadError> for ErrorInfo {
    fn from(err: &DownloadError) -> Self {
        let info = ErrorInfo::new(err.code(), err.to_string());
        match std::error::Error::source(err) {
            Some(source) => info.with_details(source.to_string()),
            None => info,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct LoadingState {
    pub is_loading: bool,
    pub loading_text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ErrorState {
    pub has_error: bool,
    pub error: Option<ErrorInfo>,
    // 连续出错的次数，clear_error 时归零
    pub retry_count: u32,
}

/// 给界面层用的加载/错误状态
#[derive(Debug, Default)]
pub struct StateTracker {
    loading: RwLock<LoadingState>,
    error: RwLock<ErrorState>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_loading(&self, is_loading: bool, text: Option<&str>) {
        let mut loading = self.loading.write().unwrap_or_else(PoisonError::into_inner);
        loading.is_loading = is_loading;
        loading.loading_text = if is_loading {
            text.map(str::to_string)
        } else {
            None
        };
    }

    pub fn set_error(&self, info: ErrorInfo) {
        let mut state = self.error.write().unwrap_or_else(PoisonError::into_inner);
        state.has_error = true;
        state.error = Some(info);
        state.retry_count = state.retry_count.saturating_add(1);
    }

    pub fn clear_error(&self) {
        let mut state = self.error.write().unwrap_or_else(PoisonError::into_inner);
        *state = ErrorState::default();
    }

    pub fn loading(&self) -> LoadingState {
        self.loading
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn error(&self) -> ErrorState {
        self.error
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
