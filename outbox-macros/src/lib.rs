use proc_macro::TokenStream;

mod topic_event;
mod utils;

/// 事件宏
/// - 为结构体或枚举生成 `TopicEvent` 与 `EventSupplier` 实现
/// - 字段序列化后即为事件载荷，`topic` 作为消息代理的路由键
/// - 结构体：`#[event(topic = "order.created")]`
/// - 枚举：变体上 `#[event(topic = "...")]`，或在枚举上给出共用主题
///
/// ```ignore
/// #[event(topic = "order.created")]
/// struct OrderCreated {
///     order_id: String,
///     amount: i64,
/// }
/// ```
#[proc_macro_attribute]
pub fn event(attr: TokenStream, item: TokenStream) -> TokenStream {
    topic_event::expand(attr, item)
}
