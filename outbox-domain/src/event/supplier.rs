use super::Event;
use crate::error::OutboxResult;
use serde::Serialize;

/// 事件提供者：延迟产生恰好一个事件
///
/// 多次调用应得到主题与载荷一致的事件。
pub trait EventSupplier: Send + Sync {
    fn supply(&self) -> OutboxResult<Event>;
}

impl EventSupplier for Event {
    fn supply(&self) -> OutboxResult<Event> {
        Ok(self.clone())
    }
}

/// 具体事件类型：按主题字符串区分，自身序列化为载荷
///
/// 通常由 `#[event(topic = "...")]` 宏实现。
pub trait TopicEvent: Serialize + Send + Sync {
    fn topic(&self) -> &str;

    fn to_event(&self) -> OutboxResult<Event> {
        Event::from_payload(self.topic(), self)
    }
}

/// 基于闭包的延迟事件
pub struct LazyEvent<F> {
    build: F,
}

impl<F> LazyEvent<F>
where
    F: Fn() -> OutboxResult<Event> + Send + Sync,
{
    pub fn new(build: F) -> Self {
        Self { build }
    }
}

impl<F> EventSupplier for LazyEvent<F>
where
    F: Fn() -> OutboxResult<Event> + Send + Sync,
{
    fn supply(&self) -> OutboxResult<Event> {
        (self.build)()
    }
}
