use thiserror::Error;

use crate::common::api::error::ApiError;

#[derive(Debug, Error)]
pub enum DownloadError {
    // 服务端拒绝创建任务，任务不会进入任务表
    #[error("创建下载任务失败: {0}")]
    Creation(#[source] ApiError),

    // 服务端已经没有这个任务了
    #[error("远程任务不存在: {0}")]
    NotFound(String),

    // 单次轮询失败，只记录日志
    #[error("查询任务状态失败: {0}")]
    Transient(#[source] ApiError),

    // 停止/重试/批量操作被服务端拒绝
    #[error("{operation}失败: {source}")]
    Operation {
        operation: String,
        #[source]
        source: ApiError,
    },

    #[error("任务未找到: {0}")]
    TaskNotFound(String),

    #[error("任务 {0} 没有需要重试的章节")]
    NoFailedChapters(String),
}

impl DownloadError {
    pub fn operation(operation: impl Into<String>, source: ApiError) -> Self {
        DownloadError::Operation {
            operation: operation.into(),
            source,
        }
    }

    /// 对应前端错误类型的错误码
    pub fn code(&self) -> &'static str {
        match self {
            DownloadError::Creation(e)
            | DownloadError::Transient(e)
            | DownloadError::Operation { source: e, .. } => e.code(),
            DownloadError::NotFound(_) => "API_ERROR",
            DownloadError::TaskNotFound(_) | DownloadError::NoFailedChapters(_) => {
                "VALIDATION_ERROR"
            }
        }
    }

    /// 是否需要展示给用户
    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            DownloadError::NotFound(_) | DownloadError::Transient(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;
