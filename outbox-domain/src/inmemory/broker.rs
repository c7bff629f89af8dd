//! 内存版消息代理
//!
//! 记录每条已确认的消息，并通过 `tokio::sync::broadcast` 推送给订阅者：
//! - `publish`：整批写入记录并广播，视为立即确认；
//! - `subscribe`：返回 `'static` 消息流，便于在 `tokio::spawn` 中消费；
//! - 典型用途：测试环境、示例与本地开发。
//!
//! 注意：无订阅者时广播会被忽略，但记录仍然保留。
//! 记录最多保留 `history_limit` 条（默认 10 000），超出后丢弃最旧的；
//! 长时间运行时可用 `take_published` 定期取走。

use super::guard;
use crate::broker::{BrokerMessage, BrokerPublisher};
use crate::error::{OutboxError, OutboxResult as Result};
use async_trait::async_trait;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

const DEFAULT_HISTORY_LIMIT: usize = 10_000;

pub struct InMemoryBroker {
    published: Mutex<VecDeque<BrokerMessage>>,
    history_limit: usize,
    tx: broadcast::Sender<BrokerMessage>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::with_capacity(1024)
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// `capacity` 为广播缓冲区容量
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self {
            published: Mutex::new(VecDeque::new()),
            history_limit: DEFAULT_HISTORY_LIMIT,
            tx,
        }
    }

    /// 记录保留上限，0 表示不保留
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// 仍保留的已确认消息（按发布顺序）
    pub fn published(&self) -> Vec<BrokerMessage> {
        guard(&self.published).iter().cloned().collect()
    }

    /// 取走并清空已保留的消息
    pub fn take_published(&self) -> Vec<BrokerMessage> {
        guard(&self.published).drain(..).collect()
    }

    pub fn clear(&self) {
        guard(&self.published).clear();
    }

    pub fn subscribe(&self) -> BoxStream<'static, Result<BrokerMessage>> {
        let rx = self.tx.subscribe();
        let stream = BroadcastStream::new(rx).map(|r| r.map_err(|e| OutboxError::broker(e.to_string())));
        Box::pin(stream)
    }
}

#[async_trait]
impl BrokerPublisher for InMemoryBroker {
    async fn publish(&self, messages: &[BrokerMessage]) -> Result<()> {
        {
            let mut published = guard(&self.published);
            published.extend(messages.iter().cloned());
            let overflow = published.len().saturating_sub(self.history_limit);
            published.drain(..overflow);
        }
        for message in messages {
            let _ = self.tx.send(message.clone());
        }
        Ok(())
    }
}
