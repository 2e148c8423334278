use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::registry::TaskRegistry;
use super::scheduler::PollingScheduler;
use crate::common::api::error::ApiError;
use crate::common::api::models::{DownloadStatus, StartDownloadRequest};
use crate::common::api::service::RemoteService;
use crate::common::models::{BatchOperation, TaskStatus};

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Status(DownloadStatus),
    NotFound,
    Transient,
}

impl Reply {
    pub(crate) fn status(status: TaskStatus, current: u32) -> Self {
        let mut reply = DownloadStatus::new("", status);
        reply.current = current;
        Reply::Status(reply)
    }
}

/// 按脚本回复的远程服务
///
/// 每个任务的回复按顺序消费，最后一条会一直重复。
#[derive(Default)]
pub(crate) struct ScriptedService {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    listed: Mutex<Vec<DownloadStatus>>,
    query_delay: Mutex<Option<Duration>>,
    reject_commands: AtomicBool,
    reject_create: AtomicBool,
    next_id: AtomicUsize,
    queries: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl ScriptedService {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn push(&self, task_id: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .entry(task_id.to_string())
            .or_default()
            .push_back(reply);
    }

    pub(crate) fn set_query_delay(&self, delay: Duration) {
        *self.query_delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn reject_commands(&self, reject: bool) {
        self.reject_commands.store(reject, Ordering::SeqCst);
    }

    pub(crate) fn reject_create(&self, reject: bool) {
        self.reject_create.store(reject, Ordering::SeqCst);
    }

    pub(crate) fn set_listed(&self, tasks: Vec<DownloadStatus>) {
        *self.listed.lock().unwrap() = tasks;
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn command_result(&self) -> Result<(), ApiError> {
        if self.reject_commands.load(Ordering::SeqCst) {
            Err(ApiError::Rejected(500, "服务端拒绝操作".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteService for ScriptedService {
    async fn create_task(&self, request: &StartDownloadRequest) -> Result<String, ApiError> {
        self.record(format!("create:{}", request.book_name));
        if self.reject_create.load(Ordering::SeqCst) {
            return Err(ApiError::Rejected(400, "必须提供小说URL".to_string()));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("task-{}", n))
    }

    async fn query_status(&self, task_id: &str) -> Result<DownloadStatus, ApiError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let delay = *self.query_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let reply = {
            let mut replies = self.replies.lock().unwrap();
            match replies.get_mut(task_id) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match reply {
            Some(Reply::Status(mut status)) => {
                status.task_id = task_id.to_string();
                Ok(status)
            }
            Some(Reply::NotFound) => Err(ApiError::NotFound("任务不存在".to_string())),
            Some(Reply::Transient) | None => Err(ApiError::RetryLater),
        }
    }

    async fn cancel_task(&self, task_id: &str) -> Result<(), ApiError> {
        self.record(format!("cancel:{}", task_id));
        self.command_result()
    }

    async fn list_tasks(&self) -> Result<Vec<DownloadStatus>, ApiError> {
        self.record("list".to_string());
        Ok(self.listed.lock().unwrap().clone())
    }

    async fn batch_apply(
        &self,
        operation: BatchOperation,
        task_ids: &[String],
    ) -> Result<(), ApiError> {
        self.record(format!("batch:{}:{}", operation, task_ids.join(",")));
        self.command_result()
    }

    async fn retry_submit(&self, task_id: &str, chapters: &[u32]) -> Result<(), ApiError> {
        self.record(format!("retry:{}:{:?}", task_id, chapters));
        self.command_result()
    }
}

/// 有轮询 <=> 状态为 pending/running
pub(crate) fn assert_polling_invariant(registry: &TaskRegistry, scheduler: &PollingScheduler) {
    for task in registry.all() {
        assert_eq!(
            task.status.is_active(),
            scheduler.is_polling(&task.task_id),
            "任务 {} 状态 {} 与轮询状态不一致",
            task.task_id,
            task.status
        );
    }
    for task_id in scheduler.polling_tasks() {
        assert!(registry.contains(&task_id), "任务 {} 已删除但仍在轮询", task_id);
    }
}
