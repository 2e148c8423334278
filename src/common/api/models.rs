use serde::{Deserialize, Serialize};

use crate::common::models::{BatchOperation, DownloadFormat, TaskStatus};

/// 服务端通用响应格式 `{status, data, message}`
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// 服务端错误响应，FastAPI 使用 detail 字段
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn reason(&self) -> Option<String> {
        self.detail.clone().or_else(|| self.message.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

// 开始下载请求
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StartDownloadRequest {
    pub novel_url: String,
    pub book_name: String,
    pub start_chapter: u32,
    pub end_chapter: u32,
    pub mode: DownloadFormat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartDownloadResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchOperationRequest<'a> {
    pub operation: BatchOperation,
    pub task_ids: &'a [String],
}

#[derive(Debug, Clone, Serialize)]
pub struct RetryChaptersRequest<'a> {
    pub chapters: &'a [u32],
}

/// 服务端报告的任务状态
///
/// 状态接口与任务列表接口的字段不完全一致（列表使用 `current_chapter` 与 `start_time`），
/// 这里统一成一个结构，缺失的字段在写入任务表时补齐。列表接口不带
/// `percentage` 和 `failed_chapters`，这两个字段为 `None` 时沿用本地已有的值。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DownloadStatus {
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub book_name: Option<String>,
    #[serde(default)]
    pub novel_url: Option<String>,
    #[serde(default)]
    pub start_chapter: Option<u32>,
    #[serde(default)]
    pub end_chapter: Option<u32>,
    #[serde(default, alias = "current_chapter")]
    pub current: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub percentage: Option<f64>,
    #[serde(default)]
    pub failed_chapters: Option<Vec<u32>>,
    #[serde(default, alias = "start_time")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub download_speed: Option<String>,
    #[serde(default)]
    pub estimated_time: Option<String>,
}

impl DownloadStatus {
    pub fn new(task_id: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            task_id: task_id.into(),
            status,
            ..Default::default()
        }
    }
}
