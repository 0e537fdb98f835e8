//! 执行器能力（resolve / reject / emit）
//!
//! 三种能力均可克隆、可跨线程移动，执行器可以把它们交给后台任务在稍后使用。
//!
use super::state::{PromiseId, Shared};
use crate::config::LateEmitPolicy;
use crate::eventing::{EventKey, ReplayEventBus};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 以成功值结算
pub struct Resolver<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Resolver<T, E> {
    pub(crate) fn new(shared: Arc<Shared<T, E>>) -> Self {
        Self { shared }
    }

    /// 仍处于 Pending 时解除总线订阅并迁移到 Fulfilled；返回本次是否生效
    pub fn resolve(&self, value: T) -> bool {
        self.shared.settle(Ok(value))
    }

    pub fn is_settled(&self) -> bool {
        self.shared.status().is_settled()
    }
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.shared))
    }
}

impl<T, E> fmt::Debug for Resolver<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("promise", &self.shared.id())
            .finish()
    }
}

/// 以失败原因结算；也是 `cancel` 所使用的能力
pub struct Rejecter<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Rejecter<T, E> {
    pub(crate) fn new(shared: Arc<Shared<T, E>>) -> Self {
        Self { shared }
    }

    /// 仍处于 Pending 时解除总线订阅并迁移到 Rejected；返回本次是否生效
    pub fn reject(&self, error: E) -> bool {
        self.shared.settle(Err(error))
    }

    pub fn is_settled(&self) -> bool {
        self.shared.status().is_settled()
    }

    pub fn promise_id(&self) -> PromiseId {
        self.shared.id()
    }
}

impl<T, E> Clone for Rejecter<T, E> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.shared))
    }
}

impl<T, E> fmt::Debug for Rejecter<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejecter")
            .field("promise", &self.shared.id())
            .finish()
    }
}

/// 向 Future 的事件总线发布事件
pub struct Emitter<A> {
    bus: ReplayEventBus<A>,
    promise: PromiseId,
    settled: Arc<AtomicBool>,
    late_emit: LateEmitPolicy,
}

impl<A> Emitter<A> {
    pub(crate) fn new(
        bus: ReplayEventBus<A>,
        promise: PromiseId,
        settled: Arc<AtomicBool>,
        late_emit: LateEmitPolicy,
    ) -> Self {
        Self {
            bus,
            promise,
            settled,
            late_emit,
        }
    }

    pub fn bus(&self) -> &ReplayEventBus<A> {
        &self.bus
    }
}

impl<A> Emitter<A>
where
    A: Send + Sync + 'static,
{
    /// 记录并分发事件；按 `LateEmitPolicy::Ignore` 丢弃时返回 false
    ///
    /// 结算后总线上已无监听器，`Record` 策略下的事件只会进入历史。
    /// `Ignore` 的判断与记录在同一把总线锁内完成，结算返回后不会再有事件写入历史。
    pub fn emit<K, I>(&self, name: K, args: I) -> bool
    where
        K: Into<EventKey>,
        I: IntoIterator<Item = A>,
    {
        if self.late_emit == LateEmitPolicy::Record {
            self.bus.emit(name, args);
            return true;
        }
        let key: EventKey = name.into();
        let settled = &self.settled;
        let emitted = self
            .bus
            .emit_unless(key.clone(), args, || settled.load(Ordering::Acquire));
        if emitted.is_none() {
            tracing::debug!(promise = %self.promise, event = %key, "late emit ignored");
        }
        emitted.is_some()
    }
}

impl<A> Clone for Emitter<A> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
            promise: self.promise,
            settled: Arc::clone(&self.settled),
            late_emit: self.late_emit,
        }
    }
}

impl<A> fmt::Debug for Emitter<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("promise", &self.promise)
            .field("late_emit", &self.late_emit)
            .finish()
    }
}
