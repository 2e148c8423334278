use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::DownloadError;
use super::models::DownloadTask;
use super::registry::TaskRegistry;
use crate::common::api::error::ApiError;
use crate::common::api::models::DownloadStatus;
use crate::common::api::service::RemoteService;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// 轮询间隔下限，更小的值会被提升到这里
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

// 一个任务的轮询句柄；generation 用来识别过期的轮询结果
struct PollHandle {
    generation: u64,
    cancel: CancellationToken,
}

struct SchedulerInner {
    registry: TaskRegistry,
    service: Arc<dyn RemoteService>,
    interval: Duration,
    timers: Mutex<HashMap<String, PollHandle>>,
    next_generation: AtomicU64,
}

/// 每个任务一个定时轮询
///
/// 每个任务最多只有一个有效的轮询：`start_polling` 会先取消旧的再创建新的。
/// 取消只阻止以后的轮询，已经发出的状态查询仍会返回，写入任务表之前要确认
/// 自己的 generation 仍然有效，否则丢弃结果。检查与写入都在 `timers` 锁内完成，
/// 所以不会和 `stop_polling` 交错。
#[derive(Clone)]
pub struct PollingScheduler {
    inner: Arc<SchedulerInner>,
}

impl PollingScheduler {
    pub fn new(registry: TaskRegistry, service: Arc<dyn RemoteService>) -> Self {
        Self::with_interval(registry, service, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_interval(
        registry: TaskRegistry,
        service: Arc<dyn RemoteService>,
        interval: Duration,
    ) -> Self {
        if interval < MIN_POLL_INTERVAL {
            warn!("轮询间隔 {:?} 过小，改用 {:?}", interval, MIN_POLL_INTERVAL);
        }
        let interval = interval.max(MIN_POLL_INTERVAL);
        Self {
            inner: Arc::new(SchedulerInner {
                registry,
                service,
                interval,
                timers: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    fn timers(&self) -> MutexGuard<'_, HashMap<String, PollHandle>> {
        self.inner
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// 开始轮询任务状态，已有的轮询会被替换
    ///
    /// 需要在 tokio 运行时中调用。
    pub fn start_polling(&self, task_id: &str) {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = CancellationToken::new();

        {
            let mut timers = self.timers();
            let handle = PollHandle {
                generation,
                cancel: cancel.clone(),
            };
            if let Some(old) = timers.insert(task_id.to_string(), handle) {
                old.cancel.cancel();
                debug!("替换任务 {} 的轮询 (generation {} -> {})", task_id, old.generation, generation);
            }
        }

        debug!("开始轮询任务: {}", task_id);
        let scheduler = self.clone();
        let task_id = task_id.to_string();
        tokio::spawn(async move {
            scheduler.poll_loop(task_id, generation, cancel).await;
        });
    }

    /// 停止轮询，没有轮询时什么也不做
    pub fn stop_polling(&self, task_id: &str) -> bool {
        let handle = self.timers().remove(task_id);
        match handle {
            Some(handle) => {
                handle.cancel.cancel();
                debug!("停止轮询任务: {}", task_id);
                true
            }
            None => false,
        }
    }

    /// 取消所有轮询
    pub fn stop_all(&self) {
        let handles: Vec<(String, PollHandle)> = self.timers().drain().collect();
        for (_, handle) in &handles {
            handle.cancel.cancel();
        }
        if !handles.is_empty() {
            info!("已停止 {} 个任务的轮询", handles.len());
        }
    }

    pub fn is_polling(&self, task_id: &str) -> bool {
        self.timers().contains_key(task_id)
    }

    pub fn polling_tasks(&self) -> Vec<String> {
        self.timers().keys().cloned().collect()
    }

    async fn poll_loop(&self, task_id: String, generation: u64, cancel: CancellationToken) {
        let period = self.inner.interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // 查询期间不响应取消，结果由 apply_tick 判断是否仍然有效
            let result = self.inner.service.query_status(&task_id).await;
            if !self.apply_tick(&task_id, generation, result) {
                break;
            }
        }

        debug!("任务 {} 的轮询已结束 (generation {})", task_id, generation);
    }

    // 把一次轮询结果写入任务表，返回是否继续轮询
    fn apply_tick(
        &self,
        task_id: &str,
        generation: u64,
        result: Result<DownloadStatus, ApiError>,
    ) -> bool {
        let mut timers = self.timers();
        let live = timers
            .get(task_id)
            .is_some_and(|handle| handle.generation == generation);
        if !live {
            debug!("丢弃任务 {} 的过期轮询结果", task_id);
            return false;
        }

        let registry = &self.inner.registry;
        match result {
            Ok(status) => {
                // 轮询只更新已有任务，不会让已删除的任务重新出现
                let Some(previous) = registry.get(task_id) else {
                    timers.remove(task_id);
                    warn!("任务 {} 已不在任务表中，停止轮询", task_id);
                    return false;
                };

                let mut task = DownloadTask::from_status(status, Some(&previous));
                task.task_id = task_id.to_string();
                let reported = task.status;
                debug!(
                    "任务 {} 状态: {} ({}/{})",
                    task_id, reported, task.current, task.total
                );
                registry.upsert(task);

                if reported.is_active() {
                    true
                } else {
                    timers.remove(task_id);
                    info!("任务 {} 状态为 {}，停止轮询", task_id, reported);
                    false
                }
            }
            Err(e) if e.is_not_found() => {
                timers.remove(task_id);
                registry.remove(task_id);
                warn!("{}，已从任务表移除", DownloadError::NotFound(task_id.to_string()));
                false
            }
            Err(e) => {
                warn!("任务 {} {}", task_id, DownloadError::Transient(e));
                true
            }
        }
    }
}
