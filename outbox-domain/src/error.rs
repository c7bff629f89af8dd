//! Outbox 统一错误定义
//!
//! 覆盖事件序列化、暂存存储、事件锁与消息代理等最小必要集合，
//! 各适配器实现（内存 / Postgres / NATS）统一转换为 `OutboxError`。
//!
use thiserror::Error;

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum OutboxError {
    // --- 序列化/事件模型 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error("invalid event: {reason}")]
    InvalidEvent { reason: String },

    // --- 存储 ---
    #[error("outbox store error: {reason}")]
    Store { reason: String },
    #[error("database error: {reason}")]
    Database { reason: String },

    // --- 事件锁 ---
    #[error("event lock error: {reason}")]
    Lock { reason: String },

    // --- 消息代理 ---
    #[error("broker error: {reason}")]
    Broker { reason: String },
    #[error("broker confirm timeout after {millis}ms")]
    ConfirmTimeout { millis: u128 },
}

impl OutboxError {
    pub fn invalid_event(reason: impl Into<String>) -> Self {
        Self::InvalidEvent {
            reason: reason.into(),
        }
    }

    pub fn store(reason: impl Into<String>) -> Self {
        Self::Store {
            reason: reason.into(),
        }
    }

    pub fn lock(reason: impl Into<String>) -> Self {
        Self::Lock {
            reason: reason.into(),
        }
    }

    pub fn broker(reason: impl Into<String>) -> Self {
        Self::Broker {
            reason: reason.into(),
        }
    }
}

/// 统一 Result 类型别名
pub type OutboxResult<T> = Result<T, OutboxError>;

// ---- 基础设施层错误转换 ----
// 允许在 Postgres 适配器中直接使用 `?`

#[cfg(feature = "infra-sqlx")]
impl From<sqlx::Error> for OutboxError {
    fn from(err: sqlx::Error) -> Self {
        OutboxError::Database {
            reason: err.to_string(),
        }
    }
}
