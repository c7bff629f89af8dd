use crate::error::{OutboxError, OutboxResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 事件保留字段，载荷中不允许出现
pub const RESERVED_KEYS: [&str; 3] = ["uuid", "topic", "eventTime"];

/// 通用事件
///
/// JSON 形态为一个扁平对象：`{"uuid": .., "topic": .., "eventTime": .., <载荷字段>}`。
/// 暂存到 Outbox 与投递到消息代理使用同一编码。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// 事件唯一标识（32 位十六进制）
    #[serde(default)]
    uuid: String,
    /// 事件主题，同时作为消息代理的路由键
    #[serde(default)]
    topic: String,
    /// 事件产生时间（毫秒）
    #[serde(default)]
    event_time: i64,
    /// 事件载荷
    #[serde(flatten)]
    payload: Map<String, Value>,
}

impl Event {
    /// 以主题与载荷字段构造事件，自动生成 uuid 与产生时间
    pub fn new(topic: impl Into<String>, payload: Map<String, Value>) -> OutboxResult<Self> {
        let topic = topic.into();
        if topic.trim().is_empty() {
            return Err(OutboxError::invalid_event("topic must not be blank"));
        }
        if let Some(key) = RESERVED_KEYS.iter().find(|k| payload.contains_key(**k)) {
            return Err(OutboxError::invalid_event(format!(
                "payload uses reserved key '{key}'"
            )));
        }

        Ok(Self {
            uuid: uuid::Uuid::new_v4().simple().to_string(),
            topic,
            event_time: Utc::now().timestamp_millis(),
            payload,
        })
    }

    /// 将任意可序列化的值展开为载荷字段
    ///
    /// 值必须序列化为 JSON 对象（或 `null`，视为空载荷）。
    pub fn from_payload<T>(topic: impl Into<String>, payload: &T) -> OutboxResult<Self>
    where
        T: Serialize + ?Sized,
    {
        let fields = match serde_json::to_value(payload)? {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(OutboxError::invalid_event(format!(
                    "payload must serialize to an object, got {other}"
                )));
            }
        };

        Self::new(topic, fields)
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = uuid.into();
        self
    }

    pub fn with_event_time(mut self, event_time: i64) -> Self {
        self.event_time = event_time;
        self
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn event_time(&self) -> i64 {
        self.event_time
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// 编码为文本（Outbox 暂存与消息代理载荷共用）
    pub fn to_json(&self) -> OutboxResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> OutboxResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
