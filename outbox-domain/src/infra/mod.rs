//! 基础设施适配（infra）
//!
//! - `postgres`（feature `infra-sqlx`）：Outbox 存储与事件锁；
//! - `nats`（feature `infra-nats`）：JetStream 消息代理发布器。
//!
#[cfg(feature = "infra-nats")]
pub mod nats;
#[cfg(feature = "infra-sqlx")]
pub mod postgres;

#[cfg(feature = "infra-nats")]
pub use nats::JetStreamPublisher;
#[cfg(feature = "infra-sqlx")]
pub use postgres::{PgLockCoordinator, PgOutboxStore, migrate};
