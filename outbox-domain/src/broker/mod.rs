//! 消息代理发布器（BrokerPublisher）协议
//!
//! 将一批消息发送到同一个 topic 交换区，以事件主题作为路由键，
//! 并等待每条消息的投递确认。对调用方而言整批成功或整批失败。
//!
use crate::error::OutboxResult as Result;
use crate::event::Event;
use async_trait::async_trait;
use std::sync::Arc;

/// 发往消息代理的一条消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    topic: String,
    payload: Vec<u8>,
}

impl BrokerMessage {
    pub fn new(topic: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }

    /// 以事件的统一文本编码作为载荷
    pub fn from_event(event: &Event) -> Result<Self> {
        Ok(Self::new(event.topic(), event.to_json()?.into_bytes()))
    }

    /// 路由键
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

#[async_trait]
pub trait BrokerPublisher: Send + Sync {
    /// 按顺序发布整批消息；任何一条未确认或被拒绝都视为整批失败
    async fn publish(&self, messages: &[BrokerMessage]) -> Result<()>;
}

#[async_trait]
impl<T> BrokerPublisher for Arc<T>
where
    T: BrokerPublisher + ?Sized,
{
    async fn publish(&self, messages: &[BrokerMessage]) -> Result<()> {
        (**self).publish(messages).await
    }
}
