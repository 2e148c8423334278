use std::sync::Arc;

use tracing::{info, warn};

use super::error::{DownloadError, Result};
use super::registry::TaskRegistry;
use super::scheduler::PollingScheduler;
use crate::common::api::service::RemoteService;
use crate::common::models::TaskStatus;

/// 重新提交失败的章节
#[derive(Clone)]
pub struct RetryCoordinator {
    registry: TaskRegistry,
    scheduler: PollingScheduler,
    service: Arc<dyn RemoteService>,
}

impl RetryCoordinator {
    pub fn new(
        registry: TaskRegistry,
        scheduler: PollingScheduler,
        service: Arc<dyn RemoteService>,
    ) -> Self {
        Self {
            registry,
            scheduler,
            service,
        }
    }

    /// 重试任务的失败章节，`chapters` 为空时重试全部失败章节
    ///
    /// 服务端接受后任务回到 running 并恢复轮询；`failed_chapters` 保持不变，
    /// 等下一次轮询由服务端更新。返回实际提交的章节。
    pub async fn retry_failed(&self, task_id: &str, chapters: Option<Vec<u32>>) -> Result<Vec<u32>> {
        let task = self
            .registry
            .get(task_id)
            .ok_or_else(|| DownloadError::TaskNotFound(task_id.to_string()))?;

        let chapters: Vec<u32> = match chapters {
            Some(mut chapters) => {
                chapters.sort_unstable();
                chapters.dedup();
                chapters
            }
            None => task.failed_chapters.iter().copied().collect(),
        };
        if chapters.is_empty() {
            return Err(DownloadError::NoFailedChapters(task_id.to_string()));
        }

        info!("重试任务 {} 的 {} 个章节: {:?}", task_id, chapters.len(), chapters);
        self.service
            .retry_submit(task_id, &chapters)
            .await
            .map_err(|e| DownloadError::operation("重试失败章节", e))?;

        // 提交期间任务可能已被删除，重新从任务表读取
        let updated = self
            .registry
            .update(task_id, |task| task.status = TaskStatus::Running);
        if updated.is_none() {
            warn!("任务 {} 在重试期间已被删除，不再恢复轮询", task_id);
            return Ok(chapters);
        }

        self.scheduler.start_polling(task_id);
        Ok(chapters)
    }
}
