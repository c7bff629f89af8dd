use outbox_macros::event;
use serde::Serialize;

#[event(topic = "user.registered")]
#[derive(Debug, Serialize)]
struct UserRegistered {
    user_id: String,
}

fn main() {
    let _ = UserRegistered {
        user_id: "u-1".into(),
    };
}
