use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::api::models::{DownloadStatus, StartDownloadRequest};
use crate::common::models::{DownloadFormat, TaskStatus};

const UNKNOWN_BOOK: &str = "未知书名";

/// 章节范围 [start, end] 包含的章节数，范围颠倒时为 0
pub fn chapter_count(start_chapter: u32, end_chapter: u32) -> u32 {
    end_chapter
        .checked_sub(start_chapter)
        .map_or(0, |span| span.saturating_add(1))
}

// 服务端时间可能是 RFC3339，也可能是 "%Y-%m-%d %H:%M:%S"
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|t| t.and_utc())
        })
}

// 创建下载任务的参数
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTaskRequest {
    pub source_url: String,
    pub book_name: String,
    pub start_chapter: u32,
    pub end_chapter: u32,
    pub format: DownloadFormat,
}

impl CreateTaskRequest {
    pub fn to_wire(&self) -> StartDownloadRequest {
        StartDownloadRequest {
            novel_url: self.source_url.clone(),
            book_name: self.book_name.clone(),
            start_chapter: self.start_chapter,
            end_chapter: self.end_chapter,
            mode: self.format,
        }
    }
}

/// 任务表中一个远程下载任务的当前快照
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadTask {
    pub task_id: String,
    pub status: TaskStatus,
    pub book_name: String,
    pub source_url: String,
    pub start_chapter: u32,
    pub end_chapter: u32,
    pub current: u32,
    pub total: u32,
    pub percentage: f64,
    pub failed_chapters: BTreeSet<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error_message: Option<String>,
    pub speed: Option<String>,
    pub estimated_time: Option<String>,
}

impl DownloadTask {
    /// 刚创建、尚未轮询过的任务
    pub fn pending(task_id: impl Into<String>, request: &CreateTaskRequest) -> Self {
        let now = Utc::now();
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Pending,
            book_name: request.book_name.clone(),
            source_url: request.source_url.clone(),
            start_chapter: request.start_chapter,
            end_chapter: request.end_chapter,
            current: 0,
            total: chapter_count(request.start_chapter, request.end_chapter),
            percentage: 0.0,
            failed_chapters: BTreeSet::new(),
            created_at: now,
            updated_at: now,
            error_message: None,
            speed: None,
            estimated_time: None,
        }
    }

    /// 用服务端报告的状态生成新的快照
    ///
    /// 任务参数（书名、地址、章节范围、总章节数、创建时间）在任务创建后不再变化，
    /// 已有快照时沿用旧值；进度相关字段以服务端为准，`current` 不会超过 `total`。
    /// 服务端没有给出百分比或失败章节时，沿用旧快照中的值。
    pub fn from_status(status: DownloadStatus, previous: Option<&DownloadTask>) -> Self {
        let now = Utc::now();

        let percentage = status
            .percentage
            .or_else(|| previous.map(|prev| prev.percentage))
            .unwrap_or(0.0);
        let failed_chapters = match status.failed_chapters {
            Some(failed) => failed.into_iter().collect(),
            None => previous
                .map(|prev| prev.failed_chapters.clone())
                .unwrap_or_default(),
        };

        let (book_name, source_url, start_chapter, end_chapter, total, created_at) = match previous
        {
            Some(prev) => (
                prev.book_name.clone(),
                prev.source_url.clone(),
                prev.start_chapter,
                prev.end_chapter,
                prev.total,
                prev.created_at,
            ),
            None => {
                let start = status.start_chapter.unwrap_or(1);
                let end = status.end_chapter.unwrap_or(start);
                let total = match (status.start_chapter, status.end_chapter) {
                    (Some(s), Some(e)) => chapter_count(s, e),
                    _ => status.total,
                };
                let created_at = status
                    .created_at
                    .as_deref()
                    .and_then(parse_timestamp)
                    .unwrap_or(now);
                (
                    status
                        .book_name
                        .clone()
                        .filter(|name| !name.is_empty())
                        .unwrap_or_else(|| UNKNOWN_BOOK.to_string()),
                    status.novel_url.clone().unwrap_or_default(),
                    start,
                    end,
                    total,
                    created_at,
                )
            }
        };

        Self {
            task_id: status.task_id,
            status: status.status,
            book_name,
            source_url,
            start_chapter,
            end_chapter,
            current: status.current.min(total),
            total,
            percentage,
            failed_chapters,
            created_at,
            updated_at: now,
            error_message: status.error_message,
            speed: status.download_speed,
            estimated_time: status.estimated_time,
        }
    }

    /// 0.0 ~ 1.0 的进度，优先使用服务端给出的百分比
    pub fn progress_ratio(&self) -> f64 {
        if self.percentage > 0.0 {
            (self.percentage / 100.0).clamp(0.0, 1.0)
        } else if self.total > 0 {
            f64::from(self.current) / f64::from(self.total)
        } else {
            0.0
        }
    }
}

/// 下载统计信息
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct DownloadStats {
    pub total_tasks: usize,
    pub pending_tasks: usize,
    pub running_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    // completed / total，没有任务时为 0
    pub success_rate: f64,
}
