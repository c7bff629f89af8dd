use outbox_domain::event::{EventSupplier, TopicEvent};
use outbox_macros::event;

#[event(topic = "order.created")]
#[derive(Debug, Clone)]
struct OrderCreated {
    order_id: String,
    amount: i64,
}

fn main() {
    let ev = OrderCreated {
        order_id: "o-1".into(),
        amount: 12,
    };
    let _: &str = ev.topic();
    let _ = ev.supply();
}
