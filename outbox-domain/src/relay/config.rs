use std::time::Duration;

/// 中继配置
#[derive(Clone, Copy, Debug)]
pub struct RelayConfig {
    /// 单次排空的最大记录数；排空数量达到该值时立即进入下一轮
    pub batch_size: usize,
    /// 未抢到锁或批次不满时的休眠间隔
    pub idle_interval: Duration,
    /// 发布失败后的重试策略
    pub retry: RetryPolicy,
    /// 单次发布等待代理确认的上限
    ///
    /// 默认 1 秒：5 次尝试加 4 次 5 秒间隔最长 25 秒，小于 30 秒的锁有效期。
    pub confirm_timeout: Duration,
    /// 记录删除时机
    pub delivery_mode: DeliveryMode,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            idle_interval: Duration::from_secs(1),
            retry: RetryPolicy::default(),
            confirm_timeout: Duration::from_secs(1),
            delivery_mode: DeliveryMode::default(),
        }
    }
}

impl RelayConfig {
    /// 一次发布阶段的最长耗时：每次尝试都等满确认上限，且走完全部重试间隔
    ///
    /// 该值需小于锁有效期，否则周期未结束时锁可能过期并被其他实例接管。
    pub fn max_publish_duration(&self) -> Duration {
        let attempts = self.retry.max_attempts.max(1);
        self.confirm_timeout
            .saturating_mul(attempts)
            .saturating_add(self.retry.delay.saturating_mul(attempts - 1))
    }
}

/// 固定间隔重试
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 总尝试次数（含首次）
    pub max_attempts: u32,
    /// 两次尝试之间的间隔
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(5),
        }
    }
}

/// Outbox 记录的删除时机
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeliveryMode {
    /// 先取出并删除，再发布；重试耗尽的批次会丢失
    #[default]
    RemoveBeforePublish,
    /// 先发布，确认后再删除；重试耗尽的批次保留到下一轮（可能重复投递）
    RemoveAfterConfirm,
}
