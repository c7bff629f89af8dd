//! 事务性 Outbox 基础库（outbox-domain）
//!
//! 业务写入与“事件待发布”记录在同一事务内提交，再由后台中继把已提交的记录
//! 可靠地搬运到消息代理，从而避免双写不一致：
//! - 事件模型（`event`）：扁平 JSON 事件、事件提供者与集合
//! - Outbox 存储（`outbox`）：有序暂存与原子排空
//! - 事件锁（`lock`）：跨进程互斥与过期接管
//! - 消息代理（`broker`）：带确认的整批发布
//! - 中继（`relay`）：抢锁 → 排空 → 发布重试 → 释放锁 的长驻循环
//! - 发布器（`publisher`）：业务事务内的暂存入口
//!
//! 本 crate 只依赖协议，具体实现见 `inmemory`（测试与示例）与
//! `infra`（Postgres / NATS，按 feature 启用）。
//!
//! 典型用法：
//! 1. 选择 `OutboxStore`、`LockCoordinator` 与 `BrokerPublisher` 的实现；
//! 2. 用 `OutboxEventPublisher` 在业务事务内暂存事件；
//! 3. 以进程级 `OwnerToken` 构建 `OutboxRelay` 并 `start`；
//! 4. 退出时调用 `RelayHandle::stop` 等待当前周期结束。
//!
pub mod broker;
pub mod error;
pub mod event;
pub mod infra;
pub mod inmemory;
pub mod lock;
pub mod outbox;
pub mod publisher;
pub mod relay;

// 允许在本 crate 内部通过 ::outbox_domain 进行自引用，
// 以便过程宏在本 crate 的单元测试中也能解析到 ::outbox_domain 路径。
extern crate self as outbox_domain;
