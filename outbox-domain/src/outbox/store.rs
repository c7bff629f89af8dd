//! Outbox 存储协议
//!
//! 持久、有序的事件暂存集合：批量写入，以及“按 id 升序取出并删除”的原子排空。
//!
use super::{NewOutboxRecord, OutboxRecord};
use crate::error::OutboxResult as Result;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// 一次性写入整批记录，失败时不留下部分可见的批次
    async fn stage(&self, records: Vec<NewOutboxRecord>) -> Result<Vec<OutboxRecord>>;

    /// 原子地选出最多 `limit` 条最早的记录并在同一操作中删除
    ///
    /// 并发调用返回的批次互不相交；无待处理记录时返回空集合。
    async fn drain_oldest(&self, limit: usize) -> Result<Vec<OutboxRecord>>;

    /// 只读地查看最多 `limit` 条最早的记录（确认后删除模式使用）
    async fn peek_oldest(&self, limit: usize) -> Result<Vec<OutboxRecord>>;

    /// 按 id 删除记录，返回实际删除条数
    async fn remove(&self, ids: &[i64]) -> Result<u64>;

    /// 待投递记录数
    async fn pending(&self) -> Result<u64>;
}

#[async_trait]
impl<T> OutboxStore for Arc<T>
where
    T: OutboxStore + ?Sized,
{
    async fn stage(&self, records: Vec<NewOutboxRecord>) -> Result<Vec<OutboxRecord>> {
        (**self).stage(records).await
    }

    async fn drain_oldest(&self, limit: usize) -> Result<Vec<OutboxRecord>> {
        (**self).drain_oldest(limit).await
    }

    async fn peek_oldest(&self, limit: usize) -> Result<Vec<OutboxRecord>> {
        (**self).peek_oldest(limit).await
    }

    async fn remove(&self, ids: &[i64]) -> Result<u64> {
        (**self).remove(ids).await
    }

    async fn pending(&self) -> Result<u64> {
        (**self).pending().await
    }
}
