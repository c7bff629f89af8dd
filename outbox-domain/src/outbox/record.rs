use crate::error::OutboxResult;
use crate::event::Event;
use serde::{Deserialize, Serialize};

/// 已暂存的 Outbox 记录
///
/// `id` 由存储分配、按插入顺序单调递增；记录从不原地更新，
/// 只由中继在一次排空周期内读取并删除。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxRecord {
    id: i64,
    event_info: String,
    timestamp: i64,
}

impl OutboxRecord {
    pub fn new(id: i64, event_info: String, timestamp: i64) -> Self {
        Self {
            id,
            event_info,
            timestamp,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    /// 序列化后的事件文本
    pub fn event_info(&self) -> &str {
        &self.event_info
    }

    /// 暂存时间（毫秒）
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn decode(&self) -> OutboxResult<Event> {
        Event::from_json(&self.event_info)
    }
}

/// 待暂存的记录（尚未分配 id）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOutboxRecord {
    event_info: String,
    timestamp: i64,
}

impl NewOutboxRecord {
    pub fn new(event_info: String, timestamp: i64) -> Self {
        Self {
            event_info,
            timestamp,
        }
    }

    pub fn encode(event: &Event, timestamp: i64) -> OutboxResult<Self> {
        Ok(Self::new(event.to_json()?, timestamp))
    }

    pub fn event_info(&self) -> &str {
        &self.event_info
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn with_id(self, id: i64) -> OutboxRecord {
        OutboxRecord::new(id, self.event_info, self.timestamp)
    }
}
