//! NATS JetStream 版消息代理发布器
//!
//! 交换区映射为主题前缀，路由键即事件主题：`{exchange}.{topic}`。
//! 整批消息依次发布后等待全部 ack，任一失败即整批失败。
//!
use crate::broker::{BrokerMessage, BrokerPublisher};
use crate::error::{OutboxError, OutboxResult as Result};
use async_nats::Client;
use async_nats::jetstream::{self, Context as JetStreamContext};
use async_nats::jetstream::stream::{Config as StreamConfig, StorageType};
use async_trait::async_trait;
use futures_util::future::try_join_all;
use std::future::IntoFuture;
use tracing::{debug, info};

pub struct JetStreamPublisher {
    jetstream: JetStreamContext,
    exchange: String,
}

impl JetStreamPublisher {
    pub fn new(client: Client, exchange: impl Into<String>) -> Self {
        Self {
            jetstream: jetstream::new(client),
            exchange: exchange.into(),
        }
    }

    pub async fn connect(url: &str, exchange: impl Into<String>) -> Result<Self> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| OutboxError::broker(e.to_string()))?;
        Ok(Self::new(client, exchange))
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// 确保覆盖 `{exchange}.>` 的持久化流存在
    pub async fn declare_exchange(&self) -> Result<()> {
        let name = stream_name(&self.exchange);
        self.jetstream
            .get_or_create_stream(StreamConfig {
                name: name.clone(),
                subjects: vec![format!("{}.>", self.exchange)],
                storage: StorageType::File,
                ..Default::default()
            })
            .await
            .map_err(|e| OutboxError::broker(e.to_string()))?;

        info!(stream = %name, exchange = %self.exchange, "exchange declared");
        Ok(())
    }
}

#[async_trait]
impl BrokerPublisher for JetStreamPublisher {
    async fn publish(&self, messages: &[BrokerMessage]) -> Result<()> {
        let mut acks = Vec::with_capacity(messages.len());
        for message in messages {
            let ack = self
                .jetstream
                .publish(subject(&self.exchange, message.topic()), message.payload().to_vec().into())
                .await
                .map_err(|e| OutboxError::broker(e.to_string()))?;
            acks.push(ack);
        }

        try_join_all(acks.into_iter().map(IntoFuture::into_future))
            .await
            .map_err(|e| OutboxError::broker(e.to_string()))?;

        debug!(count = messages.len(), exchange = %self.exchange, "batch confirmed");
        Ok(())
    }
}

fn subject(exchange: &str, topic: &str) -> String {
    format!("{exchange}.{topic}")
}

// 流名不允许出现 `.`、空白与通配符
fn stream_name(exchange: &str) -> String {
    exchange.replace(['.', ' ', '*', '>'], "_").to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_and_stream_follow_exchange() {
        assert_eq!(
            subject("event.exchange", "order.created"),
            "event.exchange.order.created"
        );
        assert_eq!(stream_name("event.exchange"), "EVENT_EXCHANGE");
    }
}
