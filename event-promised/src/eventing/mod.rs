//! 事件子系统（eventing）
//!
//! - `EventKey`：事件名（字符串或数字编码）；
//! - `EventHistory`：按序、可限容的事件历史；
//! - `ReplayEventBus`：同步发布/订阅，新订阅者可先回放历史再接收实时事件。
//!
pub mod bus;
pub mod event_key;
pub mod history;

pub use bus::{Listener, ReplayEventBus, Subscription};
pub use event_key::EventKey;
pub use history::{EventHistory, EventRecord};
