//! 带事件侧信道的 Future（event-promised）
//!
//! 提供一个“可订阅进度事件的一次性 Future”，用于同一个异步单元既需要最终结果、
//! 又需要在执行过程中持续推送事件的场景：
//! - 事件历史（`eventing::EventHistory`）：有界、按序记录已发出的事件；
//! - 回放总线（`eventing::ReplayEventBus`）：发布/订阅，迟到的订阅者可同步回放历史；
//! - 复合 Future（`promise::EventPromise`）：执行器获得 resolve/reject/emit 三种能力，
//!   链式 `then`/`catch` 保留事件与取消能力，结算时自动解除订阅。
//!
//! 本 crate 不绑定任何异步运行时，挂起与唤醒完全交给宿主的 `Future` 机制。
//!
//! 典型用法：
//! 1. 通过 `EventPromise::new` 传入执行器，在执行器中 `emit` 事件并最终 `resolve`/`reject`；
//! 2. 使用 `on`/`once` 订阅事件（自动回放历史）；
//! 3. 使用 `then`/`catch` 组合后续逻辑，最后 `.await` 得到结果。
//!
pub mod config;
pub mod error;
pub mod eventing;
pub mod promise;

pub use config::{HistoryCapacity, LateEmitPolicy, PromiseOptions};
pub use error::{PromiseError, PromiseResult};
pub use eventing::{EventHistory, EventKey, EventRecord, ReplayEventBus, Subscription};
pub use promise::{
    Continuation, Emitter, EventPromise, PromiseId, PromiseStatus, Rejecter, Resolver,
};

use std::sync::{Mutex, MutexGuard, PoisonError};

// 监听器在锁外执行，即便某个回调 panic 也不会让内部状态处于半更新状态，
// 因此中毒后直接取回内部数据继续使用。
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
