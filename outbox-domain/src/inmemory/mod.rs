//! 内存实现（inmemory）
//!
//! Outbox 存储、事件锁与消息代理的进程内实现，用于测试、示例与本地开发。
//! 多个中继共享同一组实例即可模拟多进程竞争。
//!
mod broker;
mod lock;
mod outbox_store;

pub use broker::InMemoryBroker;
pub use lock::InMemoryLockCoordinator;
pub use outbox_store::InMemoryOutboxStore;

use std::sync::{Mutex, MutexGuard, PoisonError};

// 临界区内不会出现 panic 之外的中断，中毒后沿用内部状态
fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
