use anyhow::Result as AnyResult;
use async_trait::async_trait;
use outbox_domain::broker::{BrokerMessage, BrokerPublisher};
use outbox_domain::error::{OutboxError, OutboxResult};
use outbox_domain::event::{Event, EventSuppliers};
use outbox_domain::inmemory::{InMemoryBroker, InMemoryLockCoordinator, InMemoryOutboxStore};
use outbox_domain::lock::{
    DEFAULT_LOCK_TTL, LockCoordinator, LockOutcome, LockRecord, OwnerToken, ReleaseOutcome,
};
use outbox_domain::outbox::OutboxStore;
use outbox_domain::publisher::{OutboxEventPublisher, TransactionalEventPublisher};
use outbox_domain::relay::{CycleOutcome, DeliveryMode, OutboxRelay, RelayConfig, RetryPolicy};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::field::{Field, Visit};
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

// ---- stubs ----

/// 前 `failures` 次发布失败，记录每次调用的时刻
struct FlakyBroker {
    failures: AtomicU32,
    calls: Mutex<Vec<Instant>>,
    inner: InMemoryBroker,
}

impl FlakyBroker {
    fn new(failures: u32) -> Self {
        Self {
            failures: AtomicU32::new(failures),
            calls: Mutex::new(Vec::new()),
            inner: InMemoryBroker::new(),
        }
    }

    fn calls(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrokerPublisher for FlakyBroker {
    async fn publish(&self, messages: &[BrokerMessage]) -> OutboxResult<()> {
        self.calls.lock().unwrap().push(Instant::now());
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(OutboxError::broker("nack"));
        }
        self.inner.publish(messages).await
    }
}

/// 进入发布后阻塞，直到测试放行
#[derive(Default)]
struct GatedBroker {
    entered: Notify,
    release: Notify,
    inner: InMemoryBroker,
}

#[async_trait]
impl BrokerPublisher for GatedBroker {
    async fn publish(&self, messages: &[BrokerMessage]) -> OutboxResult<()> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.publish(messages).await
    }
}

struct PanickingBroker;

#[async_trait]
impl BrokerPublisher for PanickingBroker {
    async fn publish(&self, _messages: &[BrokerMessage]) -> OutboxResult<()> {
        panic!("broker exploded");
    }
}

struct SilentBroker;

#[async_trait]
impl BrokerPublisher for SilentBroker {
    async fn publish(&self, _messages: &[BrokerMessage]) -> OutboxResult<()> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// 记录每次抢锁的时刻
#[derive(Default)]
struct SpyLock {
    inner: InMemoryLockCoordinator,
    attempts: Mutex<Vec<Instant>>,
}

impl SpyLock {
    fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LockCoordinator for SpyLock {
    async fn try_acquire(&self, owner: &OwnerToken) -> OutboxResult<LockOutcome> {
        self.attempts.lock().unwrap().push(Instant::now());
        self.inner.try_acquire(owner).await
    }
    async fn release(&self, owner: &OwnerToken) -> OutboxResult<ReleaseOutcome> {
        self.inner.release(owner).await
    }
    async fn purge_expired(&self) -> OutboxResult<u64> {
        self.inner.purge_expired().await
    }
    async fn holder(&self) -> OutboxResult<Option<LockRecord>> {
        self.inner.holder().await
    }
}

/// 收集当前线程上输出的日志（级别 + message）
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<(Level, String)>>>);

impl CapturedLogs {
    /// 安装为当前线程的默认订阅者，guard 存活期间有效
    fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::registry().with(self.clone());
        tracing::subscriber::set_default(subscriber)
    }

    fn contains(&self, level: Level, needle: &str) -> bool {
        self.0
            .lock()
            .unwrap()
            .iter()
            .any(|(l, msg)| *l == level && msg.contains(needle))
    }
}

impl<S: Subscriber> Layer<S> for CapturedLogs {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut message = MessageVisitor(String::new());
        event.record(&mut message);
        self.0
            .lock()
            .unwrap()
            .push((*event.metadata().level(), message.0));
    }
}

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

// ---- helpers ----

fn mk_event(topic: &str, n: i64) -> Event {
    Event::from_payload(topic, &json!({ "n": n })).unwrap()
}

async fn stage(store: &Arc<InMemoryOutboxStore>, topics: &[&str]) -> AnyResult<()> {
    let publisher = OutboxEventPublisher::new(store.clone());
    let suppliers: EventSuppliers = topics
        .iter()
        .enumerate()
        .map(|(i, t)| mk_event(t, i as i64))
        .collect();
    publisher.publish(&suppliers).await?;
    Ok(())
}

fn relay(
    store: Arc<dyn OutboxStore>,
    lock: Arc<dyn LockCoordinator>,
    broker: Arc<dyn BrokerPublisher>,
    owner: &str,
    config: RelayConfig,
) -> Arc<OutboxRelay> {
    Arc::new(
        OutboxRelay::builder()
            .outbox(store)
            .lock(lock)
            .broker(broker)
            .owner(OwnerToken::new(owner))
            .config(config)
            .build(),
    )
}

fn topics_of(messages: &[BrokerMessage]) -> Vec<String> {
    messages.iter().map(|m| m.topic().to_string()).collect()
}

// ---- scenarios ----

#[tokio::test]
async fn delivers_staged_events_in_order() -> AnyResult<()> {
    let store = Arc::new(InMemoryOutboxStore::new());
    let lock = Arc::new(InMemoryLockCoordinator::new());
    let broker = Arc::new(InMemoryBroker::new());
    stage(&store, &["a.created", "b.created", "c.created"]).await?;

    let relay = relay(store.clone(), lock.clone(), broker.clone(), "p1", RelayConfig::default());
    let outcome = relay.run_cycle(&CancellationToken::new()).await;

    assert_eq!(
        outcome,
        CycleOutcome::Delivered {
            drained: 3,
            published: 3
        }
    );
    assert_eq!(store.pending().await?, 0);
    assert_eq!(
        topics_of(&broker.published()),
        vec!["a.created", "b.created", "c.created"]
    );
    assert!(lock.holder().await?.is_none());

    // 载荷就是暂存时的事件文本
    let first = Event::from_json(std::str::from_utf8(broker.published()[0].payload())?)?;
    assert_eq!(first.get("n"), Some(&json!(0)));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_drop_the_batch() -> AnyResult<()> {
    let store = Arc::new(InMemoryOutboxStore::new());
    let lock = Arc::new(InMemoryLockCoordinator::new());
    let broker = Arc::new(FlakyBroker::new(u32::MAX));
    stage(&store, &["order.created"]).await?;

    let logs = CapturedLogs::default();
    let _guard = logs.install();

    let relay = relay(store.clone(), lock.clone(), broker.clone(), "p1", RelayConfig::default());
    let outcome = relay.run_cycle(&CancellationToken::new()).await;

    assert_eq!(
        outcome,
        CycleOutcome::Abandoned {
            drained: 1,
            attempts: 5
        }
    );
    assert_eq!(broker.calls().len(), 5);
    assert_eq!(store.pending().await?, 0);
    assert!(lock.holder().await?.is_none());
    assert_eq!(relay.stats().abandoned, 1);
    assert!(logs.contains(Level::WARN, "publish attempt failed"));
    assert!(logs.contains(Level::ERROR, "events are lost"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn fifth_attempt_success_counts_as_delivered() -> AnyResult<()> {
    let store = Arc::new(InMemoryOutboxStore::new());
    let lock = Arc::new(InMemoryLockCoordinator::new());
    let broker = Arc::new(FlakyBroker::new(4));
    stage(&store, &["order.created", "order.paid"]).await?;

    let relay = relay(store.clone(), lock, broker.clone(), "p1", RelayConfig::default());
    let outcome = relay.run_cycle(&CancellationToken::new()).await;

    assert_eq!(
        outcome,
        CycleOutcome::Delivered {
            drained: 2,
            published: 2
        }
    );
    let calls = broker.calls();
    assert_eq!(calls.len(), 5);
    for pair in calls.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_secs(5));
    }
    assert_eq!(broker.inner.published().len(), 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn only_lock_holder_drains() -> AnyResult<()> {
    let store = Arc::new(InMemoryOutboxStore::new());
    let lock = Arc::new(InMemoryLockCoordinator::new());
    let broker = Arc::new(GatedBroker::default());
    stage(&store, &["a", "b", "c"]).await?;

    let first = relay(store.clone(), lock.clone(), broker.clone(), "p1", RelayConfig::default());
    let second = relay(store.clone(), lock.clone(), broker.clone(), "p2", RelayConfig::default());

    let token = CancellationToken::new();
    let running = tokio::spawn({
        let token = token.clone();
        async move { first.run_cycle(&token).await }
    });

    // 第一个进程已持锁并卡在发布阶段
    tokio::time::timeout(Duration::from_secs(2), broker.entered.notified()).await?;
    let holder = lock.holder().await?.expect("lock must be held");
    assert_eq!(holder.owner().as_str(), "p1");

    assert_eq!(second.run_cycle(&token).await, CycleOutcome::LockBusy);
    assert_eq!(second.stats().lock_contended, 1);
    assert_eq!(second.stats().delivered, 0);

    broker.release.notify_one();
    let outcome = tokio::time::timeout(Duration::from_secs(2), running).await??;
    assert_eq!(
        outcome,
        CycleOutcome::Delivered {
            drained: 3,
            published: 3
        }
    );
    assert_eq!(broker.inner.published().len(), 3);
    assert!(lock.holder().await?.is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn full_batch_skips_idle_wait() -> AnyResult<()> {
    let store = Arc::new(InMemoryOutboxStore::new());
    let lock = Arc::new(SpyLock::default());
    let broker = Arc::new(InMemoryBroker::new());
    stage(&store, &["a", "b", "c", "d", "e"]).await?;

    let config = RelayConfig {
        batch_size: 2,
        idle_interval: Duration::from_secs(1),
        ..RelayConfig::default()
    };
    let handle = relay(store.clone(), lock.clone(), broker.clone(), "p1", config).start();

    while lock.attempts().len() < 4 {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    handle.stop().await;

    // 2 + 2 条满批立即重试，第三轮只取到 1 条后才休眠
    let attempts = lock.attempts();
    assert_eq!(attempts[1], attempts[0]);
    assert_eq!(attempts[2], attempts[1]);
    assert!(attempts[3] - attempts[2] >= Duration::from_secs(1));
    assert_eq!(broker.published().len(), 5);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn confirm_timeout_counts_as_failed_attempt() -> AnyResult<()> {
    let store = Arc::new(InMemoryOutboxStore::new());
    let lock = Arc::new(InMemoryLockCoordinator::new());
    stage(&store, &["a"]).await?;

    let config = RelayConfig {
        confirm_timeout: Duration::from_secs(10),
        retry: RetryPolicy {
            max_attempts: 2,
            delay: Duration::from_secs(1),
        },
        ..RelayConfig::default()
    };
    let relay = relay(store, lock.clone(), Arc::new(SilentBroker), "p1", config);

    let started = Instant::now();
    let outcome = relay.run_cycle(&CancellationToken::new()).await;

    assert_eq!(
        outcome,
        CycleOutcome::Abandoned {
            drained: 1,
            attempts: 2
        }
    );
    assert!(started.elapsed() >= Duration::from_secs(21));
    assert!(lock.holder().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn panic_in_cycle_still_releases_lock() -> AnyResult<()> {
    let store = Arc::new(InMemoryOutboxStore::new());
    let lock = Arc::new(InMemoryLockCoordinator::new());
    stage(&store, &["a"]).await?;

    let logs = CapturedLogs::default();
    let _guard = logs.install();

    let relay = relay(store.clone(), lock.clone(), Arc::new(PanickingBroker), "p1", RelayConfig::default());
    let outcome = relay.run_cycle(&CancellationToken::new()).await;

    match &outcome {
        CycleOutcome::Failed { drained, reason } => {
            assert_eq!(*drained, 1);
            assert!(reason.contains("broker exploded"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(lock.holder().await?.is_none());
    assert_eq!(relay.stats().failed_cycles, 1);

    // 已排空的记录随 panic 丢失，需要有错误日志
    assert_eq!(store.pending().await?, 0);
    assert!(logs.contains(Level::ERROR, "cycle panicked"));
    assert!(logs.contains(Level::ERROR, "events are lost"));
    Ok(())
}

#[tokio::test]
async fn panic_after_full_drain_skips_idle_wait() -> AnyResult<()> {
    let store = Arc::new(InMemoryOutboxStore::new());
    let lock = Arc::new(InMemoryLockCoordinator::new());
    stage(&store, &["a", "b"]).await?;

    let config = RelayConfig {
        batch_size: 2,
        ..RelayConfig::default()
    };
    let relay = relay(store, lock, Arc::new(PanickingBroker), "p1", config);
    let outcome = relay.run_cycle(&CancellationToken::new()).await;

    assert_eq!(outcome.drained(), 2);
    assert!(!outcome.should_idle(2));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn default_publish_budget_ends_before_lock_expires() -> AnyResult<()> {
    let store = Arc::new(InMemoryOutboxStore::new());
    let lock = Arc::new(InMemoryLockCoordinator::new());
    stage(&store, &["a"]).await?;

    let first = relay(store.clone(), lock.clone(), Arc::new(SilentBroker), "p1", RelayConfig::default());
    let second = relay(store.clone(), lock.clone(), Arc::new(InMemoryBroker::new()), "p2", RelayConfig::default());

    let started = Instant::now();
    let running = tokio::spawn(async move { first.run_cycle(&CancellationToken::new()).await });

    // 第一个进程仍在等待确认或重试间隔中，锁不可被接管
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(!running.is_finished());
    assert_eq!(second.run_cycle(&CancellationToken::new()).await, CycleOutcome::LockBusy);

    let outcome = running.await?;
    assert_eq!(
        outcome,
        CycleOutcome::Abandoned {
            drained: 1,
            attempts: 5
        }
    );
    assert!(started.elapsed() < DEFAULT_LOCK_TTL);
    assert!(lock.holder().await?.is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn remove_after_confirm_keeps_unconfirmed_batch() -> AnyResult<()> {
    let store = Arc::new(InMemoryOutboxStore::new());
    let lock = Arc::new(InMemoryLockCoordinator::new());
    let broker = Arc::new(FlakyBroker::new(2));
    stage(&store, &["a", "b"]).await?;

    let config = RelayConfig {
        delivery_mode: DeliveryMode::RemoveAfterConfirm,
        retry: RetryPolicy {
            max_attempts: 2,
            delay: Duration::from_secs(5),
        },
        ..RelayConfig::default()
    };
    let relay = relay(store.clone(), lock, broker.clone(), "p1", config);
    let token = CancellationToken::new();

    assert_eq!(
        relay.run_cycle(&token).await,
        CycleOutcome::Abandoned {
            drained: 2,
            attempts: 2
        }
    );
    assert_eq!(store.pending().await?, 2);

    assert_eq!(
        relay.run_cycle(&token).await,
        CycleOutcome::Delivered {
            drained: 2,
            published: 2
        }
    );
    assert_eq!(store.pending().await?, 0);
    assert_eq!(topics_of(&broker.inner.published()), vec!["a", "b"]);
    Ok(())
}

#[tokio::test]
async fn shutdown_interrupts_idle_wait() -> AnyResult<()> {
    let store = Arc::new(InMemoryOutboxStore::new());
    let lock = Arc::new(InMemoryLockCoordinator::new());
    let config = RelayConfig {
        idle_interval: Duration::from_secs(3600),
        ..RelayConfig::default()
    };
    let relay = relay(store, lock.clone(), Arc::new(InMemoryBroker::new()), "p1", config);
    let handle = relay.clone().start();

    tokio::time::timeout(Duration::from_secs(2), async {
        while relay.stats().cycles == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;

    tokio::time::timeout(Duration::from_secs(2), handle.stop()).await?;
    assert!(lock.holder().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn shutdown_interrupts_retry_backoff_and_releases_lock() -> AnyResult<()> {
    let store = Arc::new(InMemoryOutboxStore::new());
    let lock = Arc::new(InMemoryLockCoordinator::new());
    let broker = Arc::new(FlakyBroker::new(u32::MAX));
    stage(&store, &["a"]).await?;

    let config = RelayConfig {
        retry: RetryPolicy {
            max_attempts: 5,
            delay: Duration::from_secs(3600),
        },
        ..RelayConfig::default()
    };
    let relay = relay(store, lock.clone(), broker.clone(), "p1", config);
    let handle = relay.clone().start();

    tokio::time::timeout(Duration::from_secs(2), async {
        while broker.calls().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;

    tokio::time::timeout(Duration::from_secs(2), handle.stop()).await?;

    assert_eq!(broker.calls().len(), 1);
    assert!(lock.holder().await?.is_none());
    assert_eq!(relay.stats().abandoned, 1);
    Ok(())
}
