//! 带事件侧信道的 Future（EventPromise）
//!
//! 构造时同步执行执行器，执行器获得 `Resolver`/`Rejecter`/`Emitter` 三种能力：
//! - `emit` 的事件经由内部的 `ReplayEventBus` 记录并分发；
//! - 结算（resolve / reject / cancel）时解除总线上的全部订阅；
//! - 执行器返回 `Err(e)` 视为 `reject(e)`。
//!
//! `EventPromise` 实现 `Future<Output = Result<T, E>>`，可以直接 `.await`。
//!
use super::capability::{Emitter, Rejecter, Resolver};
use super::state::{PromiseId, PromiseStatus, Shared};
use crate::config::PromiseOptions;
use crate::error::{PromiseError, PromiseResult};
use crate::eventing::{EventKey, ReplayEventBus, Subscription};
use futures_core::future::{BoxFuture, FusedFuture};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// 带事件侧信道的一次性 Future
///
/// - `T`：成功值类型；
/// - `E`：失败原因类型；
/// - `A`：事件参数类型，默认 `serde_json::Value`。
pub struct EventPromise<T, E, A = Value> {
    shared: Arc<Shared<T, E>>,
    bus: ReplayEventBus<A>,
    canceller: Option<Rejecter<T, E>>,
    // 链式子 Future 的驱动：等待上游结算并执行处理器，结束时必然完成结算
    driver: Option<BoxFuture<'static, ()>>,
    options: PromiseOptions,
}

impl<T, E> EventPromise<T, E, Value>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// 使用默认配置与独立总线构造
    ///
    /// ```
    /// use event_promised::EventPromise;
    /// use serde_json::json;
    ///
    /// let promise = EventPromise::<u32, String>::new(|resolve, _reject, emit| {
    ///     emit.emit("progress", [json!(50)]);
    ///     resolve.resolve(42);
    ///     Ok(())
    /// });
    /// assert!(promise.status().is_settled());
    /// assert_eq!(promise.bus().history_len(), 1);
    /// ```
    pub fn new<F>(executor: F) -> Self
    where
        F: FnOnce(Resolver<T, E>, Rejecter<T, E>, Emitter<Value>) -> Result<(), E>,
    {
        Self::with_options(executor, PromiseOptions::default())
    }

    pub fn with_options<F>(executor: F, options: PromiseOptions) -> Self
    where
        F: FnOnce(Resolver<T, E>, Rejecter<T, E>, Emitter<Value>) -> Result<(), E>,
    {
        let bus = ReplayEventBus::with_capacity(options.history);
        Self::with_bus_and_options(executor, bus, options)
    }

    /// 已成功结算的 Future
    pub fn resolved(value: T) -> Self {
        Self::new(move |resolve, _, _| {
            resolve.resolve(value);
            Ok(())
        })
    }

    /// 已失败结算的 Future
    pub fn rejected(error: E) -> Self {
        Self::new(move |_, _, _| Err(error))
    }

    /// 接管任意 Future 的结果
    pub fn from_future<Fut>(future: Fut) -> Self
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::chained(PromiseOptions::default(), future)
    }
}

impl<T, E, A> EventPromise<T, E, A>
where
    T: Send + 'static,
    E: Send + 'static,
    A: Send + Sync + 'static,
{
    /// 使用外部传入的总线构造；多个 Future 共享同一总线时共享历史与订阅
    pub fn with_bus<F>(executor: F, bus: ReplayEventBus<A>) -> Self
    where
        F: FnOnce(Resolver<T, E>, Rejecter<T, E>, Emitter<A>) -> Result<(), E>,
    {
        Self::with_bus_and_options(executor, bus, PromiseOptions::default())
    }

    /// `options.history` 不作用于外部总线，容量以总线自身设置为准
    pub fn with_bus_and_options<F>(
        executor: F,
        bus: ReplayEventBus<A>,
        options: PromiseOptions,
    ) -> Self
    where
        F: FnOnce(Resolver<T, E>, Rejecter<T, E>, Emitter<A>) -> Result<(), E>,
    {
        let (promise, resolve, reject, emit) = Self::pending(bus, options);
        let fallback = reject.clone();
        if let Err(error) = executor(resolve, reject, emit) {
            fallback.reject(error);
        }
        promise
    }

    /// 由上游 Future 驱动的子 Future，拥有独立总线
    pub(crate) fn chained<Fut>(options: PromiseOptions, upstream: Fut) -> Self
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let bus = ReplayEventBus::with_capacity(options.history);
        let (mut promise, resolve, reject, _emit) = Self::pending(bus, options);
        promise.driver = Some(Box::pin(async move {
            match upstream.await {
                Ok(value) => resolve.resolve(value),
                Err(error) => reject.reject(error),
            };
        }));
        promise
    }

    fn pending(
        bus: ReplayEventBus<A>,
        options: PromiseOptions,
    ) -> (Self, Resolver<T, E>, Rejecter<T, E>, Emitter<A>) {
        let teardown_bus = bus.clone();
        let shared = Arc::new(Shared::new(move || teardown_bus.remove_all_listeners()));

        let resolve = Resolver::new(Arc::clone(&shared));
        let reject = Rejecter::new(Arc::clone(&shared));
        let emit = Emitter::new(
            bus.clone(),
            shared.id(),
            shared.settled_flag(),
            options.late_emit,
        );
        let canceller = options.cancellable.then(|| reject.clone());

        let promise = Self {
            shared,
            bus,
            canceller,
            driver: None,
            options,
        };
        (promise, resolve, reject, emit)
    }

    /// 订阅事件（先回放历史），返回自身以便链式调用
    pub fn on<K, F>(self, name: K, listener: F) -> Self
    where
        K: Into<EventKey>,
        F: Fn(&[A]) + Send + Sync + 'static,
    {
        self.bus.on(name, listener);
        self
    }

    /// 只接收一次事件（优先使用历史中最早的一条），返回自身以便链式调用
    pub fn once<K, F>(self, name: K, listener: F) -> Self
    where
        K: Into<EventKey>,
        F: FnOnce(&[A]) + Send + 'static,
    {
        self.bus.once(name, listener);
        self
    }

    /// 与 `on` 相同，但不消耗自身，返回可解除的订阅句柄
    pub fn subscribe<K, F>(&self, name: K, listener: F) -> Subscription
    where
        K: Into<EventKey>,
        F: Fn(&[A]) + Send + Sync + 'static,
    {
        self.bus.on(name, listener)
    }

    /// 与 `once` 相同，但不消耗自身
    pub fn subscribe_once<K, F>(&self, name: K, listener: F) -> Subscription
    where
        K: Into<EventKey>,
        F: FnOnce(&[A]) + Send + 'static,
    {
        self.bus.once(name, listener)
    }
}

impl<T, E, A> EventPromise<T, E, A> {
    /// 强制以 `reason` 失败结算；已结算时为空操作
    ///
    /// 未保存 reject 能力（`cancellable = false`）时返回 `PromiseError::NotCancellable`。
    pub fn cancel(&self, reason: E) -> PromiseResult<&Self> {
        let canceller = self.require_canceller()?;
        if canceller.reject(reason) {
            tracing::debug!(promise = %self.id(), "promise cancelled");
        }
        Ok(self)
    }

    /// 可克隆的取消能力，Future 被移入链或其他任务后仍可取消
    pub fn cancel_handle(&self) -> PromiseResult<Rejecter<T, E>> {
        self.require_canceller().cloned()
    }

    fn require_canceller(&self) -> PromiseResult<&Rejecter<T, E>> {
        self.canceller.as_ref().ok_or(PromiseError::NotCancellable {
            promise: self.shared.id(),
        })
    }

    pub fn id(&self) -> PromiseId {
        self.shared.id()
    }

    pub fn status(&self) -> PromiseStatus {
        self.shared.status()
    }

    pub fn bus(&self) -> &ReplayEventBus<A> {
        &self.bus
    }

    pub fn options(&self) -> &PromiseOptions {
        &self.options
    }
}

impl<T, E, A> Future for EventPromise<T, E, A> {
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        loop {
            if let Some(outcome) = this.shared.take_or_register(cx.waker()) {
                this.driver = None;
                return Poll::Ready(outcome);
            }
            let Some(driver) = this.driver.as_mut() else {
                return Poll::Pending;
            };
            match driver.as_mut().poll(cx) {
                Poll::Ready(()) => this.driver = None,
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl<T, E, A> FusedFuture for EventPromise<T, E, A> {
    fn is_terminated(&self) -> bool {
        self.shared.is_consumed()
    }
}

impl<T, E, A> fmt::Debug for EventPromise<T, E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventPromise")
            .field("id", &self.shared.id())
            .field("status", &self.shared.status())
            .field("cancellable", &self.canceller.is_some())
            .field("bus", &self.bus)
            .finish()
    }
}
