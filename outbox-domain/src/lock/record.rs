use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// 事件锁名称（唯一键）
pub const EVENT_LOCK_NAME: &str = "event_lock";

/// 锁记录自动过期窗口
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(30);

/// 进程实例的持有者令牌
///
/// 每个进程启动时生成一次，显式传入中继。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerToken(String);

impl OwnerToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 锁记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    lock: String,
    owner: OwnerToken,
    created: DateTime<Utc>,
}

impl LockRecord {
    pub fn new(lock: impl Into<String>, owner: OwnerToken, created: DateTime<Utc>) -> Self {
        Self {
            lock: lock.into(),
            owner,
            created,
        }
    }

    pub fn lock(&self) -> &str {
        &self.lock
    }

    pub fn owner(&self) -> &OwnerToken {
        &self.owner
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    Acquired,
    AlreadyHeld,
}

impl LockOutcome {
    pub fn is_acquired(&self) -> bool {
        matches!(self, LockOutcome::Acquired)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    NotFound,
}
