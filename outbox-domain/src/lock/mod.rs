//! 事件锁（lock）
//!
//! 跨进程互斥：唯一约束 + 定时过期，保证任一时刻至多一个进程在排空 Outbox。

mod coordinator;
mod record;

pub use coordinator::LockCoordinator;
pub use record::{
    DEFAULT_LOCK_TTL, EVENT_LOCK_NAME, LockOutcome, LockRecord, OwnerToken, ReleaseOutcome,
};
