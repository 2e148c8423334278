use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("网络请求失败: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("响应解析失败: {0}")]
    InvalidResponse(String),

    #[error("无效的服务地址: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("任务不存在: {0}")]
    NotFound(String),

    #[error("服务暂时不可用，请稍后重试")]
    RetryLater,

    // 服务端拒绝了请求（HTTP 状态码, 服务端给出的原因）
    #[error("服务端拒绝请求 ({0}): {1}")]
    Rejected(u16, String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    /// 对应前端错误类型的错误码
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Reqwest(e) if e.is_timeout() => "TIMEOUT_ERROR",
            ApiError::Reqwest(_) | ApiError::RetryLater => "NETWORK_ERROR",
            ApiError::InvalidUrl(_) => "VALIDATION_ERROR",
            ApiError::Rejected(status, _) if *status == 400 || *status == 422 => {
                "VALIDATION_ERROR"
            }
            ApiError::InvalidResponse(_) | ApiError::NotFound(_) | ApiError::Rejected(..) => {
                "API_ERROR"
            }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidResponse(e.to_string())
    }
}
