use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::watch;

use super::models::{DownloadStats, DownloadTask};
use crate::common::models::TaskStatus;

/// 任务表：task_id -> 当前快照
///
/// 所有组件只能通过这里读写任务；每次写入都会刷新 `updated_at` 并递增修订号，
/// 界面层通过 [`TaskRegistry::subscribe`] 得知需要重新读取。
#[derive(Clone)]
pub struct TaskRegistry {
    tasks: Arc<DashMap<String, DownloadTask>>,
    revision: Arc<watch::Sender<u64>>,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            tasks: Arc::new(DashMap::new()),
            revision: Arc::new(revision),
        }
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }

    /// 插入或替换任务
    pub fn upsert(&self, mut task: DownloadTask) {
        task.updated_at = Utc::now();
        self.tasks.insert(task.task_id.clone(), task);
        self.bump();
    }

    /// 原地修改一个任务，任务不存在时返回 None
    pub fn update<F>(&self, task_id: &str, f: F) -> Option<DownloadTask>
    where
        F: FnOnce(&mut DownloadTask),
    {
        let updated = {
            let mut entry = self.tasks.get_mut(task_id)?;
            f(entry.value_mut());
            entry.updated_at = Utc::now();
            entry.value().clone()
        };
        self.bump();
        Some(updated)
    }

    pub fn get(&self, task_id: &str) -> Option<DownloadTask> {
        self.tasks.get(task_id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.tasks.contains_key(task_id)
    }

    /// 删除任务；调用方需要先停止该任务的轮询
    pub fn remove(&self, task_id: &str) -> Option<DownloadTask> {
        let removed = self.tasks.remove(task_id).map(|(_, task)| task);
        if removed.is_some() {
            self.bump();
        }
        removed
    }

    /// 所有任务的快照，按创建时间排序
    pub fn all(&self) -> Vec<DownloadTask> {
        let mut tasks: Vec<DownloadTask> = self
            .tasks
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        tasks.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.task_id.cmp(&b.task_id))
        });
        tasks
    }

    pub fn by_status(&self, status: TaskStatus) -> Vec<DownloadTask> {
        self.all()
            .into_iter()
            .filter(|task| task.status == status)
            .collect()
    }

    /// 等待中或进行中的任务
    pub fn active_tasks(&self) -> Vec<DownloadTask> {
        self.all()
            .into_iter()
            .filter(|task| task.status.is_active())
            .collect()
    }

    pub fn completed_tasks(&self) -> Vec<DownloadTask> {
        self.by_status(TaskStatus::Completed)
    }

    pub fn failed_tasks(&self) -> Vec<DownloadTask> {
        self.by_status(TaskStatus::Failed)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn stats(&self) -> DownloadStats {
        let mut stats = DownloadStats::default();
        for entry in self.tasks.iter() {
            stats.total_tasks += 1;
            match entry.status {
                TaskStatus::Pending => stats.pending_tasks += 1,
                TaskStatus::Running => stats.running_tasks += 1,
                TaskStatus::Completed => stats.completed_tasks += 1,
                TaskStatus::Failed => stats.failed_tasks += 1,
                TaskStatus::Stopped | TaskStatus::Paused => {}
            }
        }
        if stats.total_tasks > 0 {
            stats.success_rate = stats.completed_tasks as f64 / stats.total_tasks as f64;
        }
        stats
    }

    /// 订阅任务表的修订号
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}
