use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// -----------------------------------------------------------------------------------------------

/// 下载任务状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    // 旧版前端使用 downloading 表示进行中
    #[serde(alias = "downloading")]
    Running,
    Completed,
    Failed,
    Stopped,
    Paused,
}

impl TaskStatus {
    /// 需要持续轮询的状态
    pub fn is_active(self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Running)
    }

    /// 远程报告后应当停止轮询的终止状态
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Stopped
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Stopped => "stopped",
            TaskStatus::Paused => "paused",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -----------------------------------------------------------------------------------------------

/// 输出格式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DownloadFormat {
    #[default]
    Txt,
    Epub,
}

impl DownloadFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            DownloadFormat::Txt => "txt",
            DownloadFormat::Epub => "epub",
        }
    }
}

impl fmt::Display for DownloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DownloadFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "txt" => Ok(DownloadFormat::Txt),
            "epub" => Ok(DownloadFormat::Epub),
            other => Err(format!("不支持的格式: {}", other)),
        }
    }
}

// -----------------------------------------------------------------------------------------------

/// 批量操作类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BatchOperation {
    Start,
    Stop,
    Pause,
    Resume,
    Delete,
}

impl BatchOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchOperation::Start => "start",
            BatchOperation::Stop => "stop",
            BatchOperation::Pause => "pause",
            BatchOperation::Resume => "resume",
            BatchOperation::Delete => "delete",
        }
    }
}

impl fmt::Display for BatchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(BatchOperation::Start),
            "stop" => Ok(BatchOperation::Stop),
            "pause" => Ok(BatchOperation::Pause),
            "resume" => Ok(BatchOperation::Resume),
            "delete" => Ok(BatchOperation::Delete),
            other => Err(format!("未知的批量操作: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_downloading_maps_to_running() {
        let status: TaskStatus = serde_json::from_str("\"downloading\"").unwrap();
        assert_eq!(status, TaskStatus::Running);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"running\"");
    }

    #[test]
    fn active_and_terminal_sets_are_disjoint() {
        let all = [
            TaskStatus::Pending,
            TaskStatus::Running,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Stopped,
            TaskStatus::Paused,
        ];
        for status in all {
            assert!(!(status.is_active() && status.is_terminal()), "{}", status);
        }
        assert!(!TaskStatus::Paused.is_active());
        assert!(!TaskStatus::Paused.is_terminal());
    }

    #[test]
    fn batch_operation_parses_case_insensitively() {
        assert_eq!("Stop".parse::<BatchOperation>(), Ok(BatchOperation::Stop));
        assert!("archive".parse::<BatchOperation>().is_err());
        assert_eq!("EPUB".parse::<DownloadFormat>(), Ok(DownloadFormat::Epub));
    }
}
