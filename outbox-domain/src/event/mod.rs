//! 事件模型（Event）与事件提供者
//!
//! 定义在 Outbox 中暂存、随后投递到消息代理的通用事件 `Event`，以及把事件的
//! 构造时机与序列化时机解耦的 `EventSupplier` 能力与辅助集合类型。

mod general_event;
mod supplier;
mod suppliers;

pub use general_event::{Event, RESERVED_KEYS};
pub use supplier::{EventSupplier, LazyEvent, TopicEvent};
pub use suppliers::{EventSuppliers, EventTuple};
