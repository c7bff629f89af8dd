//! 事件锁协调器协议
//!
//! 以存储的唯一约束选出唯一的中继进程，并依赖按创建时间的自动过期
//! 在持有者崩溃后恢复可用。
//!
use super::{LockOutcome, LockRecord, OwnerToken, ReleaseOutcome};
use crate::error::OutboxResult as Result;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait LockCoordinator: Send + Sync {
    /// 尝试插入锁记录；已存在未过期记录时返回 `AlreadyHeld`
    async fn try_acquire(&self, owner: &OwnerToken) -> Result<LockOutcome>;

    /// 删除锁名与持有者令牌同时匹配的记录
    async fn release(&self, owner: &OwnerToken) -> Result<ReleaseOutcome>;

    /// 清理已过期的锁记录，返回清理条数
    async fn purge_expired(&self) -> Result<u64>;

    /// 当前未过期的持有者
    async fn holder(&self) -> Result<Option<LockRecord>>;
}

#[async_trait]
impl<T> LockCoordinator for Arc<T>
where
    T: LockCoordinator + ?Sized,
{
    async fn try_acquire(&self, owner: &OwnerToken) -> Result<LockOutcome> {
        (**self).try_acquire(owner).await
    }

    async fn release(&self, owner: &OwnerToken) -> Result<ReleaseOutcome> {
        (**self).release(owner).await
    }

    async fn purge_expired(&self) -> Result<u64> {
        (**self).purge_expired().await
    }

    async fn holder(&self) -> Result<Option<LockRecord>> {
        (**self).holder().await
    }
}
