use futures_util::StreamExt;
use outbox_application::config::EventProperties;
use outbox_application::runtime::EventingRuntime;
use outbox_application::telemetry::init_tracing;
use outbox_domain::event::{EventSuppliers, EventTuple};
use outbox_domain::inmemory::{InMemoryBroker, InMemoryLockCoordinator, InMemoryOutboxStore};
use outbox_domain::publisher::TransactionalEventPublisher;
use outbox_macros::event;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

#[derive(Debug, thiserror::Error)]
enum AccountError {
    #[error("account already opened: {0}")]
    AlreadyOpened(String),
    #[error("account not opened: {0}")]
    NotOpened(String),
    #[error("insufficient funds: balance={balance}, amount={amount}")]
    InsufficientFunds { balance: i64, amount: i64 },
}

#[event]
#[derive(Debug, Clone)]
enum AccountEvent {
    #[event(topic = "account.opened")]
    Opened { account_id: String, initial_balance: i64 },
    #[event(topic = "account.deposited")]
    Deposited { account_id: String, amount: i64 },
    #[event(topic = "account.withdrawn")]
    Withdrawn { account_id: String, amount: i64 },
}

#[event(topic = "account.large_withdrawal")]
#[derive(Debug, Clone)]
struct LargeWithdrawal {
    account_id: String,
    amount: i64,
}

/// 业务写入与事件暂存在同一临界区内完成，模拟同一事务
struct AccountService {
    balances: Mutex<HashMap<String, i64>>,
    publisher: Arc<dyn TransactionalEventPublisher>,
}

impl AccountService {
    fn new(publisher: Arc<dyn TransactionalEventPublisher>) -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            publisher,
        }
    }

    fn open(&self, id: &str, initial_balance: i64) -> Result<EventTuple<i64>, AccountError> {
        let mut balances = self.balances.lock().unwrap_or_else(|e| e.into_inner());
        if balances.contains_key(id) {
            return Err(AccountError::AlreadyOpened(id.to_string()));
        }
        balances.insert(id.to_string(), initial_balance);

        Ok(EventTuple::of(initial_balance).add(AccountEvent::Opened {
            account_id: id.to_string(),
            initial_balance,
        }))
    }

    fn deposit(&self, id: &str, amount: i64) -> Result<EventTuple<i64>, AccountError> {
        let mut balances = self.balances.lock().unwrap_or_else(|e| e.into_inner());
        let balance = balances
            .get_mut(id)
            .ok_or_else(|| AccountError::NotOpened(id.to_string()))?;
        *balance += amount;

        Ok(EventTuple::of(*balance).add(AccountEvent::Deposited {
            account_id: id.to_string(),
            amount,
        }))
    }

    fn withdraw(&self, id: &str, amount: i64) -> Result<EventTuple<i64>, AccountError> {
        let mut balances = self.balances.lock().unwrap_or_else(|e| e.into_inner());
        let balance = balances
            .get_mut(id)
            .ok_or_else(|| AccountError::NotOpened(id.to_string()))?;
        if *balance < amount {
            return Err(AccountError::InsufficientFunds {
                balance: *balance,
                amount,
            });
        }
        *balance -= amount;

        let mut events = EventSuppliers::of(AccountEvent::Withdrawn {
            account_id: id.to_string(),
            amount,
        });
        if amount >= 1_000 {
            events.add(LargeWithdrawal {
                account_id: id.to_string(),
                amount,
            });
        }
        Ok(EventTuple::with_events(*balance, events))
    }

    async fn commit(&self, tuple: EventTuple<i64>) -> anyhow::Result<i64> {
        let (balance, events) = tuple.into_parts();
        self.publisher.publish(&events).await?;
        Ok(balance)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("info,outbox_domain=debug")?;

    let properties = EventProperties::from_env()?;
    let store = Arc::new(InMemoryOutboxStore::new());
    let lock = Arc::new(InMemoryLockCoordinator::with_ttl(properties.lock_ttl()));
    let broker = Arc::new(InMemoryBroker::new());

    // 下游消费者
    let mut stream = broker.subscribe();
    let consumer = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            info!(
                topic = message.topic(),
                payload = %String::from_utf8_lossy(message.payload()),
                "consumer received"
            );
        }
    });

    let runtime = EventingRuntime::new(properties, store, lock, broker.clone())?;
    runtime.start().await?;

    let service = AccountService::new(runtime.publisher());
    let balance = service.commit(service.open("acc-1", 100)?).await?;
    info!(balance, "opened");
    let balance = service.commit(service.deposit("acc-1", 2_000)?).await?;
    info!(balance, "deposited");
    let balance = service.commit(service.withdraw("acc-1", 1_500)?).await?;
    info!(balance, "withdrawn");

    if let Err(e) = service.withdraw("acc-1", 10_000) {
        info!(error = %e, "rejected, nothing staged");
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("ctrl-c received"),
        _ = tokio::time::sleep(Duration::from_secs(3)) => {}
    }

    runtime.stop().await?;
    consumer.abort();

    info!(
        published = broker.take_published().len(),
        stats = ?runtime.stats(),
        "demo finished"
    );
    Ok(())
}
