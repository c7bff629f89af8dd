//! 内存版事件锁
//!
//! 单条锁记录 + 惰性过期：每次访问时先清理超过 TTL 的记录。
//! 过期判断使用 `tokio::time::Instant`，暂停时钟的测试中可精确推进。
//!
use super::guard;
use crate::error::OutboxResult as Result;
use crate::lock::{
    DEFAULT_LOCK_TTL, EVENT_LOCK_NAME, LockCoordinator, LockOutcome, LockRecord, OwnerToken,
    ReleaseOutcome,
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

struct Slot {
    record: LockRecord,
    acquired_at: Instant,
}

pub struct InMemoryLockCoordinator {
    ttl: Duration,
    slot: Mutex<Option<Slot>>,
}

impl Default for InMemoryLockCoordinator {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_LOCK_TTL)
    }
}

impl InMemoryLockCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn expire(&self, slot: &mut Option<Slot>) -> u64 {
        let expired = slot
            .as_ref()
            .is_some_and(|s| s.acquired_at.elapsed() >= self.ttl);
        if expired {
            *slot = None;
            1
        } else {
            0
        }
    }
}

#[async_trait]
impl LockCoordinator for InMemoryLockCoordinator {
    async fn try_acquire(&self, owner: &OwnerToken) -> Result<LockOutcome> {
        let mut slot = guard(&self.slot);
        self.expire(&mut slot);

        if slot.is_some() {
            return Ok(LockOutcome::AlreadyHeld);
        }

        *slot = Some(Slot {
            record: LockRecord::new(EVENT_LOCK_NAME, owner.clone(), Utc::now()),
            acquired_at: Instant::now(),
        });
        Ok(LockOutcome::Acquired)
    }

    async fn release(&self, owner: &OwnerToken) -> Result<ReleaseOutcome> {
        let mut slot = guard(&self.slot);
        self.expire(&mut slot);

        match slot.as_ref() {
            Some(s) if s.record.owner() == owner => {
                *slot = None;
                Ok(ReleaseOutcome::Released)
            }
            _ => Ok(ReleaseOutcome::NotFound),
        }
    }

    async fn purge_expired(&self) -> Result<u64> {
        let mut slot = guard(&self.slot);
        Ok(self.expire(&mut slot))
    }

    async fn holder(&self) -> Result<Option<LockRecord>> {
        let mut slot = guard(&self.slot);
        self.expire(&mut slot);
        Ok(slot.as_ref().map(|s| s.record.clone()))
    }
}
