use async_trait::async_trait;

use super::error::ApiError;
use super::models::{DownloadStatus, StartDownloadRequest};
use crate::common::models::BatchOperation;

/// 远程下载服务
///
/// 服务端负责真正执行抓取与合并章节，这里只描述客户端会发出的命令。
/// `BookClient` 是基于 HTTP 的实现，测试中使用脚本化的替身。
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// 创建下载任务，返回服务端分配的任务ID
    async fn create_task(&self, request: &StartDownloadRequest) -> Result<String, ApiError>;

    /// 查询任务状态，任务不存在时返回 `ApiError::NotFound`
    async fn query_status(&self, task_id: &str) -> Result<DownloadStatus, ApiError>;

    async fn cancel_task(&self, task_id: &str) -> Result<(), ApiError>;

    async fn list_tasks(&self) -> Result<Vec<DownloadStatus>, ApiError>;

    async fn batch_apply(
        &self,
        operation: BatchOperation,
        task_ids: &[String],
    ) -> Result<(), ApiError>;

    /// 重新提交失败的章节
    async fn retry_submit(&self, task_id: &str, chapters: &[u32]) -> Result<(), ApiError>;
}
