use std::collections::HashMap;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::models::DownloadTask;
use crate::common::models::TaskStatus;

const BAR_TEMPLATE: &str =
    "{spinner:.green} {prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len}章 {msg}";

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

// 进度条右侧的文字
fn bar_message(task: &DownloadTask) -> String {
    let mut parts = vec![task.status.to_string()];
    if let Some(speed) = &task.speed {
        parts.push(speed.clone());
    }
    if let Some(eta) = &task.estimated_time {
        parts.push(format!("剩余 {}", eta));
    }
    if !task.failed_chapters.is_empty() {
        parts.push(format!("失败 {} 章", task.failed_chapters.len()));
    }
    if let Some(err) = &task.error_message {
        parts.push(err.clone());
    }
    parts.join(" | ")
}

/// 多任务进度面板，每个任务一个进度条
pub struct ProgressBoard {
    multi: MultiProgress,
    bars: HashMap<String, ProgressBar>,
}

impl Default for ProgressBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressBoard {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// 不输出到终端，测试用
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: HashMap::new(),
        }
    }

    /// 按任务快照刷新面板
    pub fn render(&mut self, tasks: &[DownloadTask]) {
        self.bars.retain(|id, bar| {
            let keep = tasks.iter().any(|task| &task.task_id == id);
            if !keep {
                bar.finish_and_clear();
            }
            keep
        });

        for task in tasks {
            let bar = self
                .bars
                .entry(task.task_id.clone())
                .or_insert_with(|| {
                    let bar = self.multi.add(ProgressBar::new(u64::from(task.total)));
                    bar.set_style(bar_style());
                    bar.set_prefix(task.book_name.clone());
                    bar
                });

            if bar.is_finished() {
                if task.status.is_active() {
                    // 重试后任务重新开始，换一根新的进度条
                    bar.finish_and_clear();
                    self.multi.remove(bar);
                    *bar = self.multi.add(ProgressBar::new(u64::from(task.total)));
                    bar.set_style(bar_style());
                    bar.set_prefix(task.book_name.clone());
                } else {
                    continue;
                }
            }

            bar.set_length(u64::from(task.total));
            bar.set_position(u64::from(task.current));
            let message = bar_message(task);
            match task.status {
                TaskStatus::Completed => bar.finish_with_message(message),
                TaskStatus::Failed | TaskStatus::Stopped | TaskStatus::Paused => {
                    bar.abandon_with_message(message)
                }
                TaskStatus::Pending | TaskStatus::Running => {
                    bar.set_message(message);
                    bar.tick();
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn position(&self, task_id: &str) -> Option<u64> {
        self.bars.get(task_id).map(|bar| bar.position())
    }

    pub fn is_finished(&self, task_id: &str) -> Option<bool> {
        self.bars.get(task_id).map(|bar| bar.is_finished())
    }

    pub fn clear(&mut self) {
        for (_, bar) in self.bars.drain() {
            bar.finish_and_clear();
        }
        // 面板已清空，忽略终端错误
        let _ = self.multi.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::models::DownloadFormat;
    use crate::downloader::models::CreateTaskRequest;

    fn task(id: &str, status: TaskStatus, current: u32) -> DownloadTask {
        let mut task = DownloadTask::pending(
            id,
            &CreateTaskRequest {
                source_url: "https://example.com/book".to_string(),
                book_name: id.to_string(),
                start_chapter: 1,
                end_chapter: 10,
                format: DownloadFormat::Txt,
            },
        );
        task.status = status;
        task.current = current;
        task
    }

    #[test]
    fn bars_follow_task_snapshots() {
        let mut board = ProgressBoard::hidden();
        board.render(&[task("a", TaskStatus::Running, 3), task("b", TaskStatus::Pending, 0)]);
        assert_eq!(board.len(), 2);
        assert_eq!(board.position("a"), Some(3));
        assert_eq!(board.is_finished("a"), Some(false));

        board.render(&[task("a", TaskStatus::Completed, 10)]);
        assert_eq!(board.len(), 1);
        assert_eq!(board.position("a"), Some(10));
        assert_eq!(board.is_finished("a"), Some(true));
        assert!(board.position("b").is_none());
    }

    #[test]
    fn restarted_task_gets_a_live_bar() {
        let mut board = ProgressBoard::hidden();
        board.render(&[task("a", TaskStatus::Failed, 6)]);
        assert_eq!(board.is_finished("a"), Some(true));

        board.render(&[task("a", TaskStatus::Running, 7)]);
        assert_eq!(board.is_finished("a"), Some(false));
        assert_eq!(board.position("a"), Some(7));
    }

    #[test]
    fn message_lists_advisory_fields() {
        let mut t = task("a", TaskStatus::Running, 2);
        t.speed = Some("3 章/秒".to_string());
        t.failed_chapters.insert(4);
        assert_eq!(bar_message(&t), "running | 3 章/秒 | 失败 1 章");
    }
}
