//! 中继工作者（OutboxRelay）
//!
//! 单个长驻任务循环执行投递周期：
//! - 抢占事件锁，未抢到则休眠后重试；
//! - 按 id 升序排空至多 `batch_size` 条记录；
//! - 以固定间隔重试的方式整批发布并等待代理确认；
//! - 无论成败都释放本实例持有的锁；
//! - 排空数量不足一批时休眠，否则立即进入下一轮。
//!
//! 关闭信号只打断休眠与重试间隔，正在进行的存储调用与发布尝试会执行完毕，
//! 随后释放锁并退出。
//!
use super::config::{DeliveryMode, RelayConfig};
use super::stats::{RelayStats, RelayStatsSnapshot};
use crate::broker::{BrokerMessage, BrokerPublisher};
use crate::error::{OutboxError, OutboxResult};
use crate::lock::{LockCoordinator, LockOutcome, OwnerToken, ReleaseOutcome};
use crate::outbox::{OutboxRecord, OutboxStore};
use bon::Builder;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// 一次投递周期的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// 锁被其他实例持有
    LockBusy,
    /// 抢到锁但没有待投递记录
    Empty,
    /// 整批已确认
    Delivered { drained: usize, published: usize },
    /// 重试耗尽或被关闭打断，批次未确认
    Abandoned { drained: usize, attempts: u32 },
    /// 存储异常或周期内部出现 panic
    Failed { drained: usize, reason: String },
}

impl CycleOutcome {
    /// 本周期从存储中取出的记录数
    pub fn drained(&self) -> usize {
        match self {
            CycleOutcome::LockBusy | CycleOutcome::Empty => 0,
            CycleOutcome::Delivered { drained, .. }
            | CycleOutcome::Abandoned { drained, .. }
            | CycleOutcome::Failed { drained, .. } => *drained,
        }
    }

    /// 批次不满（含未抢到锁）时应休眠
    pub fn should_idle(&self, batch_size: usize) -> bool {
        self.drained() < batch_size
    }
}

#[derive(Builder)]
pub struct OutboxRelay {
    outbox: Arc<dyn OutboxStore>,
    lock: Arc<dyn LockCoordinator>,
    broker: Arc<dyn BrokerPublisher>,
    owner: OwnerToken,
    #[builder(default)]
    config: RelayConfig,
    #[builder(skip)]
    stats: RelayStats,
}

struct Delivery {
    confirmed: bool,
    attempts: u32,
}

impl OutboxRelay {
    pub fn owner(&self) -> &OwnerToken {
        &self.owner
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn stats(&self) -> RelayStatsSnapshot {
        self.stats.snapshot()
    }

    /// 启动中继循环，返回可用于关闭/等待的句柄
    pub fn start(self: Arc<Self>) -> RelayHandle {
        let token = CancellationToken::new();
        let task = tokio::spawn(Self::relay_loop(self, token.clone()));

        RelayHandle {
            token,
            task: Some(task),
        }
    }

    async fn relay_loop(self: Arc<Self>, token: CancellationToken) {
        info!(
            owner = %self.owner,
            batch_size = self.config.batch_size,
            mode = ?self.config.delivery_mode,
            "outbox relay started"
        );

        while !token.is_cancelled() {
            let outcome = self.run_cycle(&token).await;
            if !outcome.should_idle(self.config.batch_size) {
                continue;
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = time::sleep(self.config.idle_interval) => {}
            }
        }

        info!(owner = %self.owner, "outbox relay stopped");
    }

    /// 执行一次完整的投递周期
    ///
    /// 抢到锁之后，无论排空与发布是否成功（包括 panic），都会释放锁。
    pub async fn run_cycle(&self, token: &CancellationToken) -> CycleOutcome {
        match self.lock.try_acquire(&self.owner).await {
            Ok(LockOutcome::Acquired) => {
                trace!(owner = %self.owner, "event lock acquired");
            }
            Ok(LockOutcome::AlreadyHeld) => {
                trace!(owner = %self.owner, "event lock held by another instance");
                let outcome = CycleOutcome::LockBusy;
                self.stats.record(&outcome);
                return outcome;
            }
            Err(e) => {
                warn!(owner = %self.owner, error = %e, "failed to acquire event lock");
                let outcome = CycleOutcome::Failed {
                    drained: 0,
                    reason: e.to_string(),
                };
                self.stats.record(&outcome);
                return outcome;
            }
        }

        // 排空后立即记下数量，panic 时仍能如实上报
        let fetched = AtomicUsize::new(0);
        let outcome = AssertUnwindSafe(self.drain_and_publish(token, &fetched))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let reason = panic_message(panic.as_ref());
                let drained = fetched.load(Ordering::Acquire);
                error!(owner = %self.owner, drained, %reason, "outbox relay cycle panicked");
                if drained > 0 {
                    self.report_undelivered(drained, None, None, 0);
                }
                CycleOutcome::Failed { drained, reason }
            });

        self.release_lock().await;
        self.stats.record(&outcome);
        outcome
    }

    async fn drain_and_publish(
        &self,
        token: &CancellationToken,
        fetched: &AtomicUsize,
    ) -> CycleOutcome {
        let limit = self.config.batch_size;
        let fetch_result = match self.config.delivery_mode {
            DeliveryMode::RemoveBeforePublish => self.outbox.drain_oldest(limit).await,
            DeliveryMode::RemoveAfterConfirm => self.outbox.peek_oldest(limit).await,
        };

        let records = match fetch_result {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "failed to read outbox");
                return CycleOutcome::Failed {
                    drained: 0,
                    reason: e.to_string(),
                };
            }
        };

        if records.is_empty() {
            return CycleOutcome::Empty;
        }

        let drained = records.len();
        fetched.store(drained, Ordering::Release);
        let messages = Self::encode(&records);
        debug!(drained, messages = messages.len(), "outbox batch fetched");

        let delivery = if messages.is_empty() {
            Delivery {
                confirmed: true,
                attempts: 0,
            }
        } else {
            self.publish_with_retry(&messages, token).await
        };

        if !delivery.confirmed {
            self.report_undelivered(
                drained,
                records.first().map(OutboxRecord::id),
                records.last().map(OutboxRecord::id),
                delivery.attempts,
            );
            return CycleOutcome::Abandoned {
                drained,
                attempts: delivery.attempts,
            };
        }

        if self.config.delivery_mode == DeliveryMode::RemoveAfterConfirm {
            let ids: Vec<i64> = records.iter().map(OutboxRecord::id).collect();
            if let Err(e) = self.outbox.remove(&ids).await {
                error!(error = %e, drained, "confirmed batch could not be removed, it will be redelivered");
                return CycleOutcome::Failed {
                    drained,
                    reason: e.to_string(),
                };
            }
        }

        info!(
            published = messages.len(),
            attempts = delivery.attempts,
            "outbox batch delivered"
        );
        CycleOutcome::Delivered {
            drained,
            published: messages.len(),
        }
    }

    fn report_undelivered(
        &self,
        drained: usize,
        first_id: Option<i64>,
        last_id: Option<i64>,
        attempts: u32,
    ) {
        match self.config.delivery_mode {
            DeliveryMode::RemoveBeforePublish => error!(
                drained,
                attempts,
                ?first_id,
                ?last_id,
                "outbox batch abandoned, events are lost"
            ),
            DeliveryMode::RemoveAfterConfirm => error!(
                drained,
                attempts,
                ?first_id,
                ?last_id,
                "outbox batch not confirmed, kept for next cycle"
            ),
        }
    }

    /// 解码记录为代理消息，无法解码的记录记录错误后跳过
    fn encode(records: &[OutboxRecord]) -> Vec<BrokerMessage> {
        records
            .iter()
            .filter_map(|record| {
                match record.decode().and_then(|event| BrokerMessage::from_event(&event)) {
                    Ok(message) => Some(message),
                    Err(e) => {
                        error!(
                            id = record.id(),
                            event_info = record.event_info(),
                            error = %e,
                            "skip undecodable outbox record"
                        );
                        None
                    }
                }
            })
            .collect()
    }

    async fn publish_with_retry(
        &self,
        messages: &[BrokerMessage],
        token: &CancellationToken,
    ) -> Delivery {
        let policy = self.config.retry;
        let max_attempts = policy.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.publish_once(messages).await {
                Ok(()) => {
                    return Delivery {
                        confirmed: true,
                        attempts,
                    };
                }
                Err(e) => {
                    warn!(attempt = attempts, max_attempts, error = %e, "publish attempt failed");
                }
            }

            if attempts >= max_attempts {
                break;
            }

            tokio::select! {
                _ = token.cancelled() => {
                    warn!(attempts, "shutdown requested, retries stopped");
                    break;
                }
                _ = time::sleep(policy.delay) => {}
            }
        }

        Delivery {
            confirmed: false,
            attempts,
        }
    }

    async fn publish_once(&self, messages: &[BrokerMessage]) -> OutboxResult<()> {
        let limit = self.config.confirm_timeout;
        match time::timeout(limit, self.broker.publish(messages)).await {
            Ok(result) => result,
            Err(_) => Err(OutboxError::ConfirmTimeout {
                millis: limit.as_millis(),
            }),
        }
    }

    async fn release_lock(&self) {
        match self.lock.release(&self.owner).await {
            Ok(ReleaseOutcome::Released) => {
                trace!(owner = %self.owner, "event lock released");
            }
            Ok(ReleaseOutcome::NotFound) => {
                warn!(owner = %self.owner, "event lock not released, it may have expired or been taken over");
            }
            Err(e) => {
                warn!(owner = %self.owner, error = %e, "failed to release event lock");
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// 中继运行句柄：用于优雅关闭与等待任务结束
pub struct RelayHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RelayHandle {
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "outbox relay task terminated abnormally");
            }
        }
    }

    /// 发出关闭信号并等待当前周期结束
    pub async fn stop(self) {
        self.shutdown();
        self.join().await;
    }
}

impl Drop for RelayHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
