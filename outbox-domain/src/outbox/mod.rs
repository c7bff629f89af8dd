//! Outbox 暂存（outbox）
//!
//! 业务事务内写入、由中继异步排空的事件暂存记录与存储协议。

mod record;
mod store;

pub use record::{NewOutboxRecord, OutboxRecord};
pub use store::OutboxStore;
