//! 链式续接（then / catch）
//!
//! 每次 `then`/`catch` 都返回一个拥有独立总线的新 `EventPromise`，继承父级配置
//! （历史容量、emit 策略、可取消性）。处理器在子 Future 被轮询时才执行，
//! 因而总是晚于触发结算的调用栈。
//!
//! 处理器的返回值通过 `Continuation` 统一：
//! - `Result<T, E>`：`Ok` 为新值，`Err` 相当于在处理器中抛出；
//! - `EventPromise` 或装箱的 Future：等待其结算并采用其结果（扁平化）。
//!
use super::event_promise::EventPromise;
use futures_core::future::BoxFuture;
use futures_util::future;

/// `then`/`catch` 处理器可返回的值
pub trait Continuation: Send + 'static {
    type Output: Send + 'static;
    type Error: Send + 'static;

    fn into_outcome(self) -> BoxFuture<'static, Result<Self::Output, Self::Error>>;
}

impl<T, E> Continuation for Result<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    type Output = T;
    type Error = E;

    fn into_outcome(self) -> BoxFuture<'static, Result<T, E>> {
        Box::pin(future::ready(self))
    }
}

impl<T, E, A> Continuation for EventPromise<T, E, A>
where
    T: Send + 'static,
    E: Send + 'static,
    A: Send + Sync + 'static,
{
    type Output = T;
    type Error = E;

    fn into_outcome(self) -> BoxFuture<'static, Result<T, E>> {
        Box::pin(self)
    }
}

impl<T, E> Continuation for BoxFuture<'static, Result<T, E>>
where
    T: Send + 'static,
    E: Send + 'static,
{
    type Output = T;
    type Error = E;

    fn into_outcome(self) -> BoxFuture<'static, Result<T, E>> {
        self
    }
}

impl<T, E, A> EventPromise<T, E, A>
where
    T: Send + 'static,
    E: Send + 'static,
    A: Send + Sync + 'static,
{
    /// 成功时以值调用 `on_fulfilled`；失败原样向下传递并跳过处理器
    pub fn then<F, C>(self, on_fulfilled: F) -> EventPromise<C::Output, E, A>
    where
        F: FnOnce(T) -> C + Send + 'static,
        C: Continuation<Error = E>,
    {
        let options = self.options().clone();
        EventPromise::chained(options, async move {
            match self.await {
                Ok(value) => on_fulfilled(value).into_outcome().await,
                Err(error) => Err(error),
            }
        })
    }

    /// 失败时以原因调用 `on_rejected`，其返回值使子 Future 成功结算；成功原样向下传递
    pub fn catch<F, C>(self, on_rejected: F) -> EventPromise<T, C::Error, A>
    where
        F: FnOnce(E) -> C + Send + 'static,
        C: Continuation<Output = T>,
    {
        let options = self.options().clone();
        EventPromise::chained(options, async move {
            match self.await {
                Ok(value) => Ok(value),
                Err(error) => on_rejected(error).into_outcome().await,
            }
        })
    }
}
