use std::sync::atomic::{AtomicU64, Ordering};

use super::CycleOutcome;

/// 中继运行计数
#[derive(Debug, Default)]
pub(crate) struct RelayStats {
    cycles: AtomicU64,
    lock_contended: AtomicU64,
    delivered: AtomicU64,
    abandoned: AtomicU64,
    failed: AtomicU64,
}

impl RelayStats {
    pub(crate) fn record(&self, outcome: &CycleOutcome) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        match outcome {
            CycleOutcome::LockBusy => {
                self.lock_contended.fetch_add(1, Ordering::Relaxed);
            }
            CycleOutcome::Empty => {}
            CycleOutcome::Delivered { published, .. } => {
                self.delivered.fetch_add(*published as u64, Ordering::Relaxed);
            }
            CycleOutcome::Abandoned { drained, .. } => {
                self.abandoned.fetch_add(*drained as u64, Ordering::Relaxed);
            }
            CycleOutcome::Failed { .. } => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub(crate) fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            lock_contended: self.lock_contended.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            failed_cycles: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// 计数快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStatsSnapshot {
    /// 已执行的周期数
    pub cycles: u64,
    /// 未抢到锁的周期数
    pub lock_contended: u64,
    /// 已确认投递的事件数
    pub delivered: u64,
    /// 重试耗尽而放弃的事件数
    pub abandoned: u64,
    /// 出现异常的周期数
    pub failed_cycles: u64,
}
