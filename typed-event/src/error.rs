//! 事件层统一错误定义
//!
//! 仅包含最小必要集合：
//! - 监听器执行失败（返回 `Err` 或 panic），由 `dispatch` 捕获并记录日志，不向调用方传播；
//! - 事件已关闭（所有句柄被释放），用于 `pull` 等等待型接口。
//!
use thiserror::Error;

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EventError {
    #[error("listener failure: listener={listener}, reason={source}")]
    ListenerFailure {
        listener: String,
        source: anyhow::Error,
    },

    #[error("event closed: {reason}")]
    Closed { reason: String },
}

impl EventError {
    pub fn listener_failure(listener: impl Into<String>, source: anyhow::Error) -> Self {
        EventError::ListenerFailure {
            listener: listener.into(),
            source,
        }
    }

    pub fn closed(reason: impl Into<String>) -> Self {
        EventError::Closed {
            reason: reason.into(),
        }
    }
}

/// 统一 Result 类型别名
pub type EventResult<T> = Result<T, EventError>;
