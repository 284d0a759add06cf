use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;

/// 同步器错误类型
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SyncError {
    /// 网络错误
    Network(String),
    /// 超时错误
    Timeout(String),
    /// 会话过期（携带 token 仍收到 401）
    SessionExpired,
    /// 未认证（无 token 的匿名请求收到 401，不作为错误向用户呈现）
    Unauthenticated,
    /// 远端返回非预期状态码
    Api(u16, String),
    /// 响应格式错误
    Serialization(String),
    /// 配置错误
    Configuration(String),
    /// 身份解析失败（无法判定消息方向归属，轮询不得启动）
    Identity(String),
    /// 内部错误
    Internal(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Network(msg) => write!(f, "Network error: {}", msg),
            SyncError::Timeout(msg) => write!(f, "Timeout error: {}", msg),
            SyncError::SessionExpired => write!(f, "Session expired"),
            SyncError::Unauthenticated => write!(f, "Unauthenticated"),
            SyncError::Api(status, msg) => write!(f, "API error: status={}, {}", status, msg),
            SyncError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            SyncError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            SyncError::Identity(msg) => write!(f, "Identity resolution failed: {}", msg),
            SyncError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for SyncError {}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout(err.to_string())
        } else if err.is_decode() {
            SyncError::Serialization(err.to_string())
        } else {
            SyncError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Internal(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::Configuration(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for SyncError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        SyncError::Timeout(err.to_string())
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// 后台轮询中可吸收的错误（仅记录日志，不向用户呈现）
    ///
    /// 会话过期是唯一的全局性失败，必须上抛并停止同步。
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SyncError::SessionExpired)
    }
}
