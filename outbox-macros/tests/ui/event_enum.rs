use outbox_domain::event::{EventSupplier, TopicEvent};
use outbox_macros::event;

#[event(topic = "account.changed")]
enum AccountEvent {
    #[event(topic = "account.opened")]
    Opened { account_id: String },
    Renamed { account_id: String, name: String },
    Closed(Closed),
    Frozen,
}

#[derive(serde::Serialize)]
struct Closed {
    account_id: String,
}

fn main() {
    let ev = AccountEvent::Frozen;
    let _: &str = ev.topic();
    let _ = ev.supply();
    let _ = AccountEvent::Closed(Closed {
        account_id: "a-1".into(),
    });
    let _ = AccountEvent::Opened {
        account_id: "a-1".into(),
    };
    let _ = AccountEvent::Renamed {
        account_id: "a-1".into(),
        name: "n".into(),
    };
}
