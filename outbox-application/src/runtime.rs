//! 事件运行时（EventingRuntime）
//!
//! 宿主应用的生命周期钩子：
//! - `start`：消息代理连接就绪后调用，启动中继（`transaction.enabled` 为 false 时跳过）；
//! - `stop`：发出关闭信号并等待当前周期结束（锁已释放）后返回；
//! - `publisher`：业务代码在事务内暂存事件的入口。
//!
//! 持有者令牌在构造时生成一次，整个进程生命周期内不变。
//!
use crate::config::EventProperties;
use crate::error::{AppError, AppResult};
use outbox_domain::broker::BrokerPublisher;
use outbox_domain::lock::{LockCoordinator, OwnerToken};
use outbox_domain::outbox::OutboxStore;
use outbox_domain::publisher::{OutboxEventPublisher, TransactionalEventPublisher};
use outbox_domain::relay::{OutboxRelay, RelayHandle, RelayStatsSnapshot};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

pub struct EventingRuntime {
    properties: EventProperties,
    relay: Arc<OutboxRelay>,
    publisher: Arc<dyn TransactionalEventPublisher>,
    handle: Mutex<Option<RelayHandle>>,
}

impl EventingRuntime {
    pub fn new(
        properties: EventProperties,
        outbox: Arc<dyn OutboxStore>,
        lock: Arc<dyn LockCoordinator>,
        broker: Arc<dyn BrokerPublisher>,
    ) -> AppResult<Self> {
        properties.validate()?;

        let relay = OutboxRelay::builder()
            .outbox(outbox.clone())
            .lock(lock)
            .broker(broker)
            .owner(OwnerToken::generate())
            .config(properties.to_relay_config())
            .build();

        Ok(Self {
            properties,
            relay: Arc::new(relay),
            publisher: Arc::new(OutboxEventPublisher::new(outbox)),
            handle: Mutex::new(None),
        })
    }

    pub fn properties(&self) -> &EventProperties {
        &self.properties
    }

    pub fn owner(&self) -> &OwnerToken {
        self.relay.owner()
    }

    pub fn publisher(&self) -> Arc<dyn TransactionalEventPublisher> {
        self.publisher.clone()
    }

    pub fn stats(&self) -> RelayStatsSnapshot {
        self.relay.stats()
    }

    pub async fn is_running(&self) -> bool {
        self.handle
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// 启动钩子：需在 tokio 运行时内调用
    pub async fn start(&self) -> AppResult<()> {
        if !self.properties.transaction.enabled {
            info!("transactional events disabled, relay not started");
            return Ok(());
        }

        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            return Err(AppError::Lifecycle("relay already started".to_string()));
        }

        *handle = Some(self.relay.clone().start());
        info!(
            owner = %self.owner(),
            exchange = %self.properties.exchange,
            "eventing runtime started"
        );
        Ok(())
    }

    /// 停止钩子：未启动时直接返回
    pub async fn stop(&self) -> AppResult<()> {
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            handle.stop().await;
            info!(owner = %self.owner(), "eventing runtime stopped");
        }
        Ok(())
    }
}
