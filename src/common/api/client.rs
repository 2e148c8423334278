use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    Client, ClientBuilder, Response, StatusCode,
    header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue},
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};
use url::Url;

use super::error::ApiError;
use super::models::{
    ApiResponse, BatchOperationRequest, DownloadStatus, ErrorBody, HealthResponse,
    RetryChaptersRequest, StartDownloadRequest, StartDownloadResponse,
};
use super::service::RemoteService;
use crate::common::models::BatchOperation;

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:8000";

// 创建任务时服务端需要先抓取目录，耗时较长
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

// 访问下载服务的 HTTP 客户端
#[derive(Debug, Clone)]
pub struct BookClient {
    inner: Client,
    base_url: Url,
}

impl BookClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url)?;
        let inner = ClientBuilder::new()
            .timeout(timeout)
            .default_headers(Self::get_default_headers())
            .build()?;

        Ok(Self { inner, base_url })
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // 在服务地址后追加路径段，任务ID会被正确转义
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidResponse(format!("服务地址不能作为基础路径: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let url = self.endpoint(segments)?;
        debug!("GET {}", url);

        let resp = self.inner.get(url).send().await.map_err(|e| {
            error!("请求失败: {}", e);
            ApiError::Reqwest(e)
        })?;

        Self::handle_response::<T>(resp).await
    }

    async fn post<B, T>(&self, segments: &[&str], body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        debug!("POST {}", url);

        let resp = self.inner.post(url).json(body).send().await.map_err(|e| {
            error!("请求失败: {}", e);
            ApiError::Reqwest(e)
        })?;

        Self::handle_response::<T>(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
        let status = resp.status();
        let raw_body = resp.bytes().await?;
        debug!("Status: {:?}, 响应长度: {}", status, raw_body.len());

        if !status.is_success() {
            let reason = serde_json::from_slice::<ErrorBody>(&raw_body)
                .ok()
                .and_then(|body| body.reason())
                .unwrap_or_else(|| status.to_string());

            return Err(match status {
                StatusCode::NOT_FOUND => ApiError::NotFound(reason),
                StatusCode::BAD_GATEWAY
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT => {
                    warn!("服务暂时不可用: {}", reason);
                    ApiError::RetryLater
                }
                _ => ApiError::Rejected(status.as_u16(), reason),
            });
        }

        serde_json::from_slice::<T>(&raw_body).map_err(|e| {
            ApiError::InvalidResponse(format!(
                "解析响应失败: {}. 原始响应: {}",
                e,
                String::from_utf8_lossy(&raw_body)
            ))
        })
    }

    // 处理 `{status: "success" | "error", ...}` 格式
    fn ensure_success<T>(resp: ApiResponse<T>) -> Result<ApiResponse<T>, ApiError> {
        if resp.is_success() {
            Ok(resp)
        } else {
            Err(ApiError::Rejected(
                StatusCode::OK.as_u16(),
                resp.message.unwrap_or_else(|| format!("服务端返回状态: {}", resp.status)),
            ))
        }
    }

    // 健康检查
    pub async fn health(&self) -> Result<HealthResponse, ApiError> {
        self.get(&["health"]).await
    }
}

#[async_trait]
impl RemoteService for BookClient {
    async fn create_task(&self, request: &StartDownloadRequest) -> Result<String, ApiError> {
        let resp: StartDownloadResponse = self.post(&["api", "download", "start"], request).await?;

        if resp.status != "success" {
            return Err(ApiError::Rejected(
                StatusCode::OK.as_u16(),
                resp.message.unwrap_or_else(|| "下载任务创建失败".to_string()),
            ));
        }

        match resp.task_id {
            Some(task_id) if !task_id.is_empty() => Ok(task_id),
            _ => Err(ApiError::InvalidResponse(
                "下载任务创建失败：未返回任务ID".to_string(),
            )),
        }
    }

    async fn query_status(&self, task_id: &str) -> Result<DownloadStatus, ApiError> {
        let resp: ApiResponse<DownloadStatus> =
            self.get(&["api", "download", "status", task_id]).await?;
        let resp = Self::ensure_success(resp)?;

        let mut status = resp.data.ok_or_else(|| {
            ApiError::InvalidResponse("获取下载状态失败：响应数据为空".to_string())
        })?;
        if status.task_id.is_empty() {
            status.task_id = task_id.to_string();
        }
        Ok(status)
    }

    async fn cancel_task(&self, task_id: &str) -> Result<(), ApiError> {
        let resp: ApiResponse<Value> = self
            .post(&["api", "download", "stop", task_id], &serde_json::json!({}))
            .await?;
        Self::ensure_success(resp).map(|_| ())
    }

    async fn list_tasks(&self) -> Result<Vec<DownloadStatus>, ApiError> {
        let resp: ApiResponse<Vec<DownloadStatus>> = self.get(&["api", "download", "tasks"]).await?;
        let resp = Self::ensure_success(resp)?;
        Ok(resp
            .data
            .unwrap_or_default()
            .into_iter()
            .filter(|task| !task.task_id.is_empty())
            .collect())
    }

    async fn batch_apply(
        &self,
        operation: BatchOperation,
        task_ids: &[String],
    ) -> Result<(), ApiError> {
        let body = BatchOperationRequest {
            operation,
            task_ids,
        };
        let resp: ApiResponse<Value> = self.post(&["api", "download", "batch"], &body).await?;
        Self::ensure_success(resp).map(|_| ())
    }

    async fn retry_submit(&self, task_id: &str, chapters: &[u32]) -> Result<(), ApiError> {
        let body = RetryChaptersRequest { chapters };
        let resp: ApiResponse<Value> = self
            .post(&["api", "download", "retry", task_id], &body)
            .await?;
        Self::ensure_success(resp).map(|_| ())
    }
}
