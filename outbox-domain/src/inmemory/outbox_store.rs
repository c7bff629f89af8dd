//! 内存版 Outbox 存储
//!
//! 以 `BTreeMap<id, record>` 保存记录，`id` 单调递增；
//! 整个排空过程在同一把互斥锁内完成，并发排空得到互不相交的批次。
//!
use super::guard;
use crate::error::OutboxResult as Result;
use crate::outbox::{NewOutboxRecord, OutboxRecord, OutboxStore};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Default)]
struct State {
    last_id: i64,
    records: BTreeMap<i64, OutboxRecord>,
}

#[derive(Default)]
pub struct InMemoryOutboxStore {
    state: Mutex<State>,
}

impl InMemoryOutboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前所有记录（按 id 升序）
    pub fn snapshot(&self) -> Vec<OutboxRecord> {
        guard(&self.state).records.values().cloned().collect()
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn stage(&self, records: Vec<NewOutboxRecord>) -> Result<Vec<OutboxRecord>> {
        let mut state = guard(&self.state);
        let mut staged = Vec::with_capacity(records.len());
        for record in records {
            state.last_id += 1;
            let record = record.with_id(state.last_id);
            state.records.insert(record.id(), record.clone());
            staged.push(record);
        }
        Ok(staged)
    }

    async fn drain_oldest(&self, limit: usize) -> Result<Vec<OutboxRecord>> {
        let mut state = guard(&self.state);
        let ids: Vec<i64> = state.records.keys().take(limit).copied().collect();
        Ok(ids
            .iter()
            .filter_map(|id| state.records.remove(id))
            .collect())
    }

    async fn peek_oldest(&self, limit: usize) -> Result<Vec<OutboxRecord>> {
        let state = guard(&self.state);
        Ok(state.records.values().take(limit).cloned().collect())
    }

    async fn remove(&self, ids: &[i64]) -> Result<u64> {
        let mut state = guard(&self.state);
        let removed = ids
            .iter()
            .filter(|id| state.records.remove(*id).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn pending(&self) -> Result<u64> {
        Ok(guard(&self.state).records.len() as u64)
    }
}
