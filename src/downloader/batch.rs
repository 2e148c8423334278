use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::error::{DownloadError, Result};
use super::registry::TaskRegistry;
use super::scheduler::PollingScheduler;
use crate::common::api::service::RemoteService;
use crate::common::models::{BatchOperation, TaskStatus};

/// 一次批量操作在本地的处理结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub applied: Vec<String>,
    // 服务端已接受，但本地任务表中没有的任务
    pub skipped: Vec<String>,
}

#[derive(Clone)]
pub struct BatchCoordinator {
    registry: TaskRegistry,
    scheduler: PollingScheduler,
    service: Arc<dyn RemoteService>,
}

impl BatchCoordinator {
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

    /// 对一组任务执行批量操作
    ///
    /// 整组任务通过一次请求提交给服务端；服务端拒绝时本地不做任何修改。
    /// 接受后逐个更新本地任务：
    ///
    /// * `stop`   -> stopped，停止轮询
    /// * `start` / `resume` -> running，重新开始轮询
    /// * `pause`  -> paused，停止轮询
    /// * `delete` -> 停止轮询并从任务表删除
    pub async fn apply(&self, operation: BatchOperation, task_ids: &[String]) -> Result<BatchReport> {
        let mut seen = HashSet::new();
        let task_ids: Vec<String> = task_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();

        if task_ids.is_empty() {
            debug!("批量{}: 没有选中的任务", operation);
            return Ok(BatchReport::default());
        }

        info!("批量{}: {} 个任务", operation, task_ids.len());
        self.service
            .batch_apply(operation, &task_ids)
            .await
            .map_err(|e| DownloadError::operation(format!("批量{}", operation), e))?;

        let mut report = BatchReport::default();
        for task_id in task_ids {
            if self.apply_local(operation, &task_id) {
                report.applied.push(task_id);
            } else {
                warn!("批量{}: 任务 {} 不在任务表中，跳过", operation, task_id);
                report.skipped.push(task_id);
            }
        }
        Ok(report)
    }

    fn apply_local(&self, operation: BatchOperation, task_id: &str) -> bool {
        if !self.registry.contains(task_id) {
            return false;
        }

        match operation {
            BatchOperation::Stop => {
                self.scheduler.stop_polling(task_id);
                self.set_status(task_id, TaskStatus::Stopped)
            }
            BatchOperation::Pause => {
                self.scheduler.stop_polling(task_id);
                self.set_status(task_id, TaskStatus::Paused)
            }
            BatchOperation::Start | BatchOperation::Resume => {
                let found = self.set_status(task_id, TaskStatus::Running);
                if found {
                    self.scheduler.start_polling(task_id);
                }
                found
            }
            BatchOperation::Delete => {
                self.scheduler.stop_polling(task_id);
                self.registry.remove(task_id).is_some()
            }
        }
    }

    fn set_status(&self, task_id: &str, status: TaskStatus) -> bool {
        self.registry
            .update(task_id, |task| task.status = status)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::models::DownloadFormat;
    use crate::downloader::models::{CreateTaskRequest, DownloadTask};
    use crate::downloader::test_support::{Reply, ScriptedService, assert_polling_invariant};
    use std::time::Duration;
    use tokio::time::sleep;

    struct Fixture {
        registry: TaskRegistry,
        service: Arc<ScriptedService>,
        scheduler: PollingScheduler,
        batch: BatchCoordinator,
    }

    fn setup() -> Fixture {
        let registry = TaskRegistry::new();
        let service = ScriptedService::new();
        let scheduler = PollingScheduler::new(registry.clone(), service.clone());
        let batch = BatchCoordinator::new(registry.clone(), scheduler.clone(), service.clone());
        Fixture {
            registry,
            service,
            scheduler,
            batch,
        }
    }

    impl Fixture {
        // 创建一个正在轮询的任务
        fn running(&self, task_id: &str) {
            let mut task = DownloadTask::pending(
                task_id,
                &CreateTaskRequest {
                    source_url: "https://example.com/book".to_string(),
                    book_name: task_id.to_string(),
                    start_chapter: 1,
                    end_chapter: 10,
                    format: DownloadFormat::Txt,
                },
            );
            task.status = TaskStatus::Running;
            self.registry.upsert(task);
            self.service.push(task_id, Reply::status(TaskStatus::Running, 1));
            self.scheduler.start_polling(task_id);
        }
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_batch_changes_nothing() {
        let f = setup();
        f.running("A");
        f.running("B");
        f.service.reject_commands(true);

        let err = f.batch.apply(BatchOperation::Stop, &ids(&["A", "B"])).await.unwrap_err();
        assert!(matches!(err, DownloadError::Operation { .. }));
        for id in ["A", "B"] {
            assert_eq!(f.registry.get(id).unwrap().status, TaskStatus::Running);
            assert!(f.scheduler.is_polling(id));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stop_marks_tasks_stopped_and_cancels_polling() {
        let f = setup();
        f.running("A");
        f.running("B");
        f.running("C");

        let report = f.batch.apply(BatchOperation::Stop, &ids(&["A", "B", "A"])).await.unwrap();
        assert_eq!(report.applied, ids(&["A", "B"]));
        assert_eq!(f.service.calls(), vec!["batch:stop:A,B".to_string()]);

        assert_eq!(f.registry.get("A").unwrap().status, TaskStatus::Stopped);
        assert_eq!(f.registry.get("B").unwrap().status, TaskStatus::Stopped);
        assert!(f.scheduler.is_polling("C"));
        assert_polling_invariant(&f.registry, &f.scheduler);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_leaves_no_residual_timer() {
        let f = setup();
        f.running("A");
        f.service.set_query_delay(Duration::from_secs(1));

        // 2s 发出的查询在 3s 才返回
        sleep(Duration::from_millis(2500)).await;
        f.batch.apply(BatchOperation::Delete, &ids(&["A"])).await.unwrap();
        assert!(f.registry.all().is_empty());
        assert!(!f.scheduler.is_polling("A"));

        sleep(Duration::from_secs(5)).await;
        assert!(f.registry.get("A").is_none());
        assert!(f.scheduler.polling_tasks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn pause_then_resume_round_trip() {
        let f = setup();
        f.running("A");

        f.batch.apply(BatchOperation::Pause, &ids(&["A"])).await.unwrap();
        assert_eq!(f.registry.get("A").unwrap().status, TaskStatus::Paused);
        assert!(!f.scheduler.is_polling("A"));
        assert_polling_invariant(&f.registry, &f.scheduler);

        f.batch.apply(BatchOperation::Resume, &ids(&["A"])).await.unwrap();
        assert_eq!(f.registry.get("A").unwrap().status, TaskStatus::Running);
        assert!(f.scheduler.is_polling("A"));
        assert_polling_invariant(&f.registry, &f.scheduler);
    }

    #[tokio::test(start_paused = true)]
    async fn start_restarts_stopped_task() {
        let f = setup();
        f.running("A");
        f.batch.apply(BatchOperation::Stop, &ids(&["A"])).await.unwrap();

        f.batch.apply(BatchOperation::Start, &ids(&["A"])).await.unwrap();
        assert_eq!(f.registry.get("A").unwrap().status, TaskStatus::Running);

        sleep(Duration::from_millis(2500)).await;
        assert_eq!(f.registry.get("A").unwrap().current, 1);
        assert!(f.scheduler.is_polling("A"));
    }

    #[tokio::test]
    async fn empty_selection_does_not_call_remote() {
        let f = setup();
        let report = f.batch.apply(BatchOperation::Delete, &[]).await.unwrap();
        assert_eq!(report, BatchReport::default());
        assert!(f.service.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_ids_are_skipped() {
        let f = setup();
        f.running("A");

        let report = f
            .batch
            .apply(BatchOperation::Stop, &ids(&["A", "ghost"]))
            .await
            .unwrap();
        assert_eq!(report.applied, ids(&["A"]));
        assert_eq!(report.skipped, ids(&["ghost"]));
        assert!(f.registry.get("ghost").is_none());
    }
}
