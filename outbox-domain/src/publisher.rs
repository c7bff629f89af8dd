//! 事务性事件发布器（TransactionalEventPublisher）
//!
//! 在业务事务内把事件序列化并暂存到 Outbox，不直接触达消息代理；
//! 投递由中继在事务提交之后异步完成。
//!
use crate::error::OutboxResult as Result;
use crate::event::{Event, EventSuppliers};
use crate::outbox::{NewOutboxRecord, OutboxRecord, OutboxStore};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

#[async_trait]
pub trait TransactionalEventPublisher: Send + Sync {
    /// 暂存整批事件；空集合直接成功
    async fn publish(&self, suppliers: &EventSuppliers) -> Result<()>;

    async fn publish_one(&self, event: Event) -> Result<()> {
        self.publish(&EventSuppliers::of(event)).await
    }
}

#[async_trait]
impl<T> TransactionalEventPublisher for Arc<T>
where
    T: TransactionalEventPublisher + ?Sized,
{
    async fn publish(&self, suppliers: &EventSuppliers) -> Result<()> {
        (**self).publish(suppliers).await
    }

    async fn publish_one(&self, event: Event) -> Result<()> {
        (**self).publish_one(event).await
    }
}

/// 基于 `OutboxStore` 的发布器
pub struct OutboxEventPublisher<S> {
    store: S,
}

impl<S> OutboxEventPublisher<S>
where
    S: OutboxStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// 依次取出事件并编码为待暂存记录，同一次调用共享一个暂存时间
    ///
    /// 任一提供者失败则整批失败，不产生任何记录。
    pub fn prepare(&self, suppliers: &EventSuppliers) -> Result<Vec<NewOutboxRecord>> {
        let timestamp = Utc::now().timestamp_millis();
        suppliers
            .supply_all()?
            .iter()
            .map(|event| NewOutboxRecord::encode(event, timestamp))
            .collect()
    }

    /// 暂存并返回带 id 的记录
    pub async fn stage(&self, suppliers: &EventSuppliers) -> Result<Vec<OutboxRecord>> {
        if suppliers.is_empty() {
            return Ok(Vec::new());
        }

        let records = self.prepare(suppliers)?;
        let staged = self.store.stage(records).await.inspect_err(|e| {
            warn!(count = suppliers.len(), error = %e, "failed to stage events");
        })?;
        debug!(count = staged.len(), "events staged to outbox");
        Ok(staged)
    }
}

#[async_trait]
impl<S> TransactionalEventPublisher for OutboxEventPublisher<S>
where
    S: OutboxStore,
{
    async fn publish(&self, suppliers: &EventSuppliers) -> Result<()> {
        self.stage(suppliers).await.map(|_| ())
    }
}
