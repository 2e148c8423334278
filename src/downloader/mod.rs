use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::common::api::service::RemoteService;
use crate::common::models::{BatchOperation, DownloadFormat, TaskStatus};
use crate::common::storage::StorageError;
use crate::config::{ConfigPatch, ConfigStore, DownloadConfig};

pub mod batch;
pub mod error;
pub mod models;
pub mod progress;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod state;

#[cfg(test)]
mod test_support;

pub use batch::{BatchCoordinator, BatchReport};
pub use error::{DownloadError, Result};
pub use models::{CreateTaskRequest, DownloadStats, DownloadTask};
pub use registry::TaskRegistry;
pub use retry::RetryCoordinator;
pub use scheduler::{DEFAULT_POLL_INTERVAL, PollingScheduler};
pub use state::{ErrorInfo, ErrorState, LoadingState, StateTracker};

/// 新建下载任务的输入，没给出的章节范围和格式使用配置中的默认值
#[derive(Debug, Clone, Default)]
pub struct NewDownload {
    pub source_url: String,
    pub book_name: String,
    pub start_chapter: Option<u32>,
    pub end_chapter: Option<u32>,
    pub format: Option<DownloadFormat>,
}

impl NewDownload {
    pub fn new(source_url: impl Into<String>, book_name: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            book_name: book_name.into(),
            ..Default::default()
        }
    }

    fn resolve(self, config: &DownloadConfig) -> CreateTaskRequest {
        CreateTaskRequest {
            source_url: self.source_url,
            book_name: self.book_name,
            start_chapter: self.start_chapter.unwrap_or(config.start_chapter),
            end_chapter: self.end_chapter.unwrap_or(config.end_chapter),
            format: self.format.unwrap_or(config.format),
        }
    }
}

/// 下载任务管理器
///
/// 持有任务表、轮询调度、重试与批量操作，界面层只通过它发起操作、读取视图。
/// 结束时调用 [`DownloadManager::shutdown`] 取消所有轮询。
#[derive(Clone)]
pub struct DownloadManager {
    registry: TaskRegistry,
    scheduler: PollingScheduler,
    retry: RetryCoordinator,
    batch: BatchCoordinator,
    tracker: Arc<StateTracker>,
    config: Arc<ConfigStore>,
    service: Arc<dyn RemoteService>,
}

impl DownloadManager {
    pub fn new(service: Arc<dyn RemoteService>, config: Arc<ConfigStore>) -> Self {
        Self::with_interval(service, config, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_interval(
        service: Arc<dyn RemoteService>,
        config: Arc<ConfigStore>,
        interval: Duration,
    ) -> Self {
        let registry = TaskRegistry::new();
        let scheduler = PollingScheduler::with_interval(registry.clone(), service.clone(), interval);
        let retry = RetryCoordinator::new(registry.clone(), scheduler.clone(), service.clone());
        let batch = BatchCoordinator::new(registry.clone(), scheduler.clone(), service.clone());

        Self {
            registry,
            scheduler,
            retry,
            batch,
            tracker: Arc::new(StateTracker::new()),
            config,
            service,
        }
    }

    // 出错时记录到状态跟踪器
    fn track<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_user_facing() {
                error!("{}", e);
                self.tracker.set_error(ErrorInfo::from(e));
            }
        }
        result
    }

    /// 创建远程下载任务并开始轮询
    pub async fn create_task(&self, new: NewDownload) -> Result<DownloadTask> {
        let request = new.resolve(&self.config.get());
        info!(
            "创建下载任务: {} (第{}-{}章, {})",
            request.book_name, request.start_chapter, request.end_chapter, request.format
        );

        self.tracker.set_loading(true, Some("正在创建下载任务..."));
        let created = self.service.create_task(&request.to_wire()).await;
        self.tracker.set_loading(false, None);

        let task_id = self.track(created.map_err(DownloadError::Creation))?;
        let task = DownloadTask::pending(task_id.clone(), &request);
        self.registry.upsert(task.clone());
        self.scheduler.start_polling(&task_id);

        info!("下载任务已创建: {}", task_id);
        Ok(self.registry.get(&task_id).unwrap_or(task))
    }

    /// 停止单个任务
    pub async fn stop_task(&self, task_id: &str) -> Result<DownloadTask> {
        let result = self.stop_inner(task_id).await;
        self.track(result)
    }

    async fn stop_inner(&self, task_id: &str) -> Result<DownloadTask> {
        if !self.registry.contains(task_id) {
            return Err(DownloadError::TaskNotFound(task_id.to_string()));
        }

        self.service
            .cancel_task(task_id)
            .await
            .map_err(|e| DownloadError::operation("停止下载", e))?;

        self.scheduler.stop_polling(task_id);
        self.registry
            .update(task_id, |task| task.status = TaskStatus::Stopped)
            .ok_or_else(|| DownloadError::TaskNotFound(task_id.to_string()))
    }

    /// 重试失败章节，`chapters` 为 None 时重试全部失败章节
    pub async fn retry_failed(&self, task_id: &str, chapters: Option<Vec<u32>>) -> Result<Vec<u32>> {
        self.tracker.set_loading(true, Some("正在重试失败章节..."));
        let result = self.retry.retry_failed(task_id, chapters).await;
        self.tracker.set_loading(false, None);
        self.track(result)
    }

    pub async fn batch(&self, operation: BatchOperation, task_ids: &[String]) -> Result<BatchReport> {
        self.tracker.set_loading(true, Some("正在执行批量操作..."));
        let result = self.batch.apply(operation, task_ids).await;
        self.tracker.set_loading(false, None);
        self.track(result)
    }

    /// 从服务端拉取任务列表写入任务表，进行中的任务开始轮询
    pub async fn sync_tasks(&self) -> Result<usize> {
        self.tracker.set_loading(true, Some("正在同步任务列表..."));
        let listed = self.service.list_tasks().await;
        self.tracker.set_loading(false, None);

        let listed = self.track(listed.map_err(|e| DownloadError::operation("同步任务列表", e)))?;
        let count = listed.len();
        for status in listed {
            let task_id = status.task_id.clone();
            let previous = self.registry.get(&task_id);
            let task = DownloadTask::from_status(status, previous.as_ref());
            let active = task.status.is_active();
            self.registry.upsert(task);

            if active {
                if !self.scheduler.is_polling(&task_id) {
                    self.scheduler.start_polling(&task_id);
                }
            } else {
                self.scheduler.stop_polling(&task_id);
            }
        }

        info!("已同步 {} 个任务", count);
        Ok(count)
    }

    /// 只从本地任务表删除，不通知服务端
    pub fn remove_task(&self, task_id: &str) -> Option<DownloadTask> {
        self.scheduler.stop_polling(task_id);
        let removed = self.registry.remove(task_id);
        if removed.is_none() {
            warn!("任务 {} 不在任务表中", task_id);
        }
        removed
    }

    /// 清除已完成的任务，返回清除的数量
    pub fn clear_completed(&self) -> usize {
        let completed = self.registry.completed_tasks();
        for task in &completed {
            self.scheduler.stop_polling(&task.task_id);
            self.registry.remove(&task.task_id);
        }
        completed.len()
    }

    pub fn task(&self, task_id: &str) -> Option<DownloadTask> {
        self.registry.get(task_id)
    }

    pub fn tasks(&self) -> Vec<DownloadTask> {
        self.registry.all()
    }

    pub fn active_tasks(&self) -> Vec<DownloadTask> {
        self.registry.active_tasks()
    }

    pub fn completed_tasks(&self) -> Vec<DownloadTask> {
        self.registry.completed_tasks()
    }

    pub fn failed_tasks(&self) -> Vec<DownloadTask> {
        self.registry.failed_tasks()
    }

    pub fn stats(&self) -> DownloadStats {
        self.registry.stats()
    }

    pub fn is_polling(&self, task_id: &str) -> bool {
        self.scheduler.is_polling(task_id)
    }

    /// 任务表每次变化都会推送新的修订号
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.registry.subscribe()
    }

    pub fn loading(&self) -> LoadingState {
        self.tracker.loading()
    }

    pub fn error_state(&self) -> ErrorState {
        self.tracker.error()
    }

    pub fn clear_error(&self) {
        self.tracker.clear_error();
    }

    pub fn config(&self) -> DownloadConfig {
        self.config.get()
    }

    pub fn update_config(&self, patch: ConfigPatch) -> std::result::Result<DownloadConfig, StorageError> {
        self.config.update(patch)
    }

    pub fn reset_config(&self) -> std::result::Result<DownloadConfig, StorageError> {
        self.config.reset()
    }

    /// 取消所有轮询
    pub fn shutdown(&self) {
        self.scheduler.stop_all();
    }
}
