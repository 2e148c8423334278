use colored::*;

use crate::common::models::TaskStatus;
use crate::common::utils::FormatTool;
use crate::downloader::models::{DownloadStats, DownloadTask};

fn colored_status(status: TaskStatus) -> ColoredString {
    let text = format!("{:<9}", status.as_str());
    match status {
        TaskStatus::Pending => text.bright_black(),
        TaskStatus::Running => text.cyan(),
        TaskStatus::Completed => text.green(),
        TaskStatus::Failed => text.red(),
        TaskStatus::Stopped | TaskStatus::Paused => text.yellow(),
    }
}

/// 终端输出工具
pub struct PrettyLogger;

impl PrettyLogger {
    /// 显示成功消息
    pub fn success(message: impl AsRef<str>) {
        println!("{} {}", "✓".green().bold(), message.as_ref());
    }

    /// 显示信息消息
    pub fn info(message: impl AsRef<str>) {
        println!("{} {}", "ℹ".blue().bold(), message.as_ref());
    }

    /// 显示警告消息
    pub fn warning(message: impl AsRef<str>) {
        println!("{} {}", "⚠".yellow().bold(), message.as_ref());
    }

    /// 显示错误消息
    pub fn error(message: impl AsRef<str>) {
        eprintln!("{} {}", "✗".red().bold(), message.as_ref());
    }

    /// 显示步骤开始
    pub fn step_start(step: impl AsRef<str>) {
        println!("\n{} {}", "▶".cyan().bold(), step.as_ref().bold());
    }

    pub fn waiting(message: impl AsRef<str>) {
        println!("{} {}", "⏳".yellow().bold(), message.as_ref());
    }

    /// 显示分割线
    pub fn separator() {
        println!("{}", "─".repeat(60).bright_black());
    }

    /// 任务列表中的一行
    pub fn task_line(task: &DownloadTask) {
        println!(
            "{} {} {:>7} {}/{}  {}",
            task.task_id.bright_black(),
            colored_status(task.status),
            FormatTool::format_percentage(task.progress_ratio()),
            task.current,
            task.total,
            task.book_name.bold()
        );
    }

    /// 单个任务的详细信息
    pub fn task_detail(task: &DownloadTask) {
        Self::field("任务ID", &task.task_id);
        println!("  {:<8} {}", "状态".bold(), colored_status(task.status));
        Self::field("书名", &task.book_name);
        Self::field("地址", &task.source_url);
        Self::field(
            "章节范围",
            format!("{}-{}", task.start_chapter, task.end_chapter),
        );
        Self::field(
            "进度",
            format!(
                "{}/{} ({})",
                task.current,
                task.total,
                FormatTool::format_percentage(task.progress_ratio())
            ),
        );
        if !task.failed_chapters.is_empty() {
            Self::field("失败章节", FormatTool::format_chapters(&task.failed_chapters));
        }
        if let Some(speed) = &task.speed {
            Self::field("速度", speed);
        }
        if let Some(eta) = &task.estimated_time {
            Self::field("剩余时间", eta);
        }
        if let Some(err) = &task.error_message {
            println!("  {:<8} {}", "错误".bold(), err.red());
        }
        Self::field("创建时间", FormatTool::format_timestamp(&task.created_at));
        Self::field("更新时间", FormatTool::format_timestamp(&task.updated_at));
    }

    /// 键值对
    pub fn field(label: impl AsRef<str>, value: impl AsRef<str>) {
        println!("  {:<8} {}", label.as_ref().bold(), value.as_ref());
    }

    /// 任务统计
    pub fn stats_summary(stats: &DownloadStats) {
        println!(
            "{} 共 {} 个任务: {} 等待, {} 进行中, {} 完成, {} 失败, 成功率 {}",
            "📊".bold(),
            stats.total_tasks,
            stats.pending_tasks,
            stats.running_tasks.to_string().cyan(),
            stats.completed_tasks.to_string().green(),
            stats.failed_tasks.to_string().red(),
            FormatTool::format_percentage(stats.success_rate)
        );
    }
}

/// 便捷宏用于漂亮的日志输出
#[macro_export]
macro_rules! log_success {
    ($($arg:tt)*) => {
        $crate::common::logger::PrettyLogger::success(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::common::logger::PrettyLogger::info(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)*) => {
        $crate::common::logger::PrettyLogger::warning(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::common::logger::PrettyLogger::error(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_step {
    ($($arg:tt)*) => {
        $crate::common::logger::PrettyLogger::step_start(format!($($arg)*))
    };
}
