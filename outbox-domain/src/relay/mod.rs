//! 中继（relay）
//!
//! 将已提交的 Outbox 记录搬运到消息代理的后台工作者。
//!
mod config;
mod stats;
mod worker;

pub use config::{DeliveryMode, RelayConfig, RetryPolicy};
pub use stats::RelayStatsSnapshot;
pub use worker::{CycleOutcome, OutboxRelay, RelayHandle};
