//! 事件配置（EventProperties）
//!
//! 默认值：交换区 `event.exchange`，启用事务性发布，中继按 500 条一批、
//! 空闲 1 秒、最多 5 次间隔 5 秒的发布尝试，每次等待确认 1 秒，锁有效期 30 秒。
//!
//! 发布阶段的最长耗时必须小于锁有效期，否则锁会在周期中途过期。
//!
//! 环境变量（可选 `.env`）：
//! `OUTBOX_EXCHANGE`、`OUTBOX_TRANSACTION_ENABLED`、
//! `OUTBOX_RELAY_BATCH_SIZE`、`OUTBOX_RELAY_IDLE_INTERVAL_MS`、
//! `OUTBOX_RELAY_MAX_ATTEMPTS`、`OUTBOX_RELAY_RETRY_DELAY_MS`、
//! `OUTBOX_RELAY_CONFIRM_TIMEOUT_MS`、`OUTBOX_RELAY_LOCK_TTL_SECS`、
//! `OUTBOX_RELAY_REMOVE_AFTER_CONFIRM`。
//!
use crate::error::{AppError, AppResult};
use outbox_domain::relay::{DeliveryMode, RelayConfig, RetryPolicy};
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EventProperties {
    /// 消息代理上的 topic 交换区
    pub exchange: String,
    pub transaction: TransactionProperties,
    pub relay: RelayProperties,
}

impl Default for EventProperties {
    fn default() -> Self {
        Self {
            exchange: "event.exchange".to_string(),
            transaction: TransactionProperties::default(),
            relay: RelayProperties::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransactionProperties {
    /// 关闭后不启动中继
    pub enabled: bool,
}

impl Default for TransactionProperties {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RelayProperties {
    pub batch_size: usize,
    pub idle_interval_ms: u64,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub confirm_timeout_ms: u64,
    pub lock_ttl_secs: u64,
    pub remove_after_confirm: bool,
}

impl Default for RelayProperties {
    fn default() -> Self {
        Self {
            batch_size: 500,
            idle_interval_ms: 1_000,
            max_attempts: 5,
            retry_delay_ms: 5_000,
            confirm_timeout_ms: 1_000,
            lock_ttl_secs: 30,
            remove_after_confirm: false,
        }
    }
}

impl EventProperties {
    /// 加载 `.env`（若存在）后读取 `OUTBOX_*` 环境变量并校验
    pub fn from_env() -> AppResult<Self> {
        // .env 缺失不是错误
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源读取，未给出的键使用默认值
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut props = Self::default();
        let relay = &mut props.relay;

        if let Some(v) = lookup("OUTBOX_EXCHANGE") {
            props.exchange = v;
        }
        read(&lookup, "OUTBOX_TRANSACTION_ENABLED", &mut props.transaction.enabled)?;
        read(&lookup, "OUTBOX_RELAY_BATCH_SIZE", &mut relay.batch_size)?;
        read(&lookup, "OUTBOX_RELAY_IDLE_INTERVAL_MS", &mut relay.idle_interval_ms)?;
        read(&lookup, "OUTBOX_RELAY_MAX_ATTEMPTS", &mut relay.max_attempts)?;
        read(&lookup, "OUTBOX_RELAY_RETRY_DELAY_MS", &mut relay.retry_delay_ms)?;
        read(&lookup, "OUTBOX_RELAY_CONFIRM_TIMEOUT_MS", &mut relay.confirm_timeout_ms)?;
        read(&lookup, "OUTBOX_RELAY_LOCK_TTL_SECS", &mut relay.lock_ttl_secs)?;
        read(&lookup, "OUTBOX_RELAY_REMOVE_AFTER_CONFIRM", &mut relay.remove_after_confirm)?;

        props.validate()?;
        Ok(props)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.exchange.trim().is_empty() {
            return Err(AppError::config("exchange", "must not be blank"));
        }
        let relay = &self.relay;
        if relay.batch_size == 0 {
            return Err(AppError::config("relay.batch_size", "must be greater than 0"));
        }
        if relay.max_attempts == 0 {
            return Err(AppError::config("relay.max_attempts", "must be greater than 0"));
        }
        if relay.confirm_timeout_ms == 0 {
            return Err(AppError::config("relay.confirm_timeout_ms", "must be greater than 0"));
        }
        if relay.lock_ttl_secs == 0 {
            return Err(AppError::config("relay.lock_ttl_secs", "must be greater than 0"));
        }

        let budget = self.to_relay_config().max_publish_duration();
        if budget >= self.lock_ttl() {
            return Err(AppError::config(
                "relay.lock_ttl_secs",
                format!(
                    "must exceed the worst-case publish time of {}ms (attempts * confirm timeout + retry delays)",
                    budget.as_millis()
                ),
            ));
        }
        Ok(())
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.relay.lock_ttl_secs)
    }

    pub fn to_relay_config(&self) -> RelayConfig {
        let relay = &self.relay;
        RelayConfig {
            batch_size: relay.batch_size,
            idle_interval: Duration::from_millis(relay.idle_interval_ms),
            retry: RetryPolicy {
                max_attempts: relay.max_attempts,
                delay: Duration::from_millis(relay.retry_delay_ms),
            },
            confirm_timeout: Duration::from_millis(relay.confirm_timeout_ms),
            delivery_mode: if relay.remove_after_confirm {
                DeliveryMode::RemoveAfterConfirm
            } else {
                DeliveryMode::RemoveBeforePublish
            },
        }
    }
}

fn read<F, T>(lookup: &F, key: &str, slot: &mut T) -> AppResult<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|e: T::Err| AppError::config(key, format!("invalid value '{raw}': {e}")))?;
    }
    Ok(())
}
