//! 结算状态机
//!
//! `Pending --resolve/reject/cancel--> Fulfilled | Rejected`，终态不可再迁移。
//! 第二次及之后的结算调用均为空操作。
//!
use crate::lock;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::Waker;

/// 进程内唯一的 Future 标识，用于日志字段与错误信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PromiseId(u64);

impl PromiseId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PromiseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "promise-{}", self.0)
    }
}

/// 结算状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromiseStatus {
    Pending,
    Fulfilled,
    Rejected,
}

impl PromiseStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, PromiseStatus::Pending)
    }

    pub fn is_settled(&self) -> bool {
        !self.is_pending()
    }
}

struct Slot<T, E> {
    status: PromiseStatus,
    outcome: Option<Result<T, E>>,
    consumed: bool,
    waker: Option<Waker>,
}

/// Future 与其各项能力共享的结算状态
pub(crate) struct Shared<T, E> {
    id: PromiseId,
    slot: Mutex<Slot<T, E>>,
    settled: Arc<AtomicBool>,
    teardown: Box<dyn Fn() + Send + Sync>,
}

impl<T, E> Shared<T, E> {
    /// `teardown` 在状态迁移的同一临界区内执行，用于解除总线订阅
    pub(crate) fn new(teardown: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            id: PromiseId::next(),
            slot: Mutex::new(Slot {
                status: PromiseStatus::Pending,
                outcome: None,
                consumed: false,
                waker: None,
            }),
            settled: Arc::new(AtomicBool::new(false)),
            teardown: Box::new(teardown),
        }
    }

    pub(crate) fn id(&self) -> PromiseId {
        self.id
    }

    pub(crate) fn status(&self) -> PromiseStatus {
        lock(&self.slot).status
    }

    pub(crate) fn settled_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.settled)
    }

    /// 结果已被 `poll` 取走
    pub(crate) fn is_consumed(&self) -> bool {
        lock(&self.slot).consumed
    }

    /// 尝试结算；仅第一次调用生效，返回本次是否生效
    pub(crate) fn settle(&self, outcome: Result<T, E>) -> bool {
        let (status, waker) = {
            let mut slot = lock(&self.slot);
            if slot.status.is_settled() {
                return false;
            }
            // 先置位再解除订阅：teardown 获取总线锁之后的 emit 必然看到已结算
            self.settled.store(true, Ordering::Release);
            (self.teardown)();
            slot.status = match outcome {
                Ok(_) => PromiseStatus::Fulfilled,
                Err(_) => PromiseStatus::Rejected,
            };
            slot.outcome = Some(outcome);
            (slot.status, slot.waker.take())
        };

        tracing::debug!(promise = %self.id, ?status, "promise settled");
        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }

    /// 取走结果；尚未结算时登记 waker 并返回 `None`
    pub(crate) fn take_or_register(&self, waker: &Waker) -> Option<Result<T, E>> {
        let mut slot = lock(&self.slot);
        if let Some(outcome) = slot.outcome.take() {
            slot.consumed = true;
            slot.waker = None;
            return Some(outcome);
        }
        match &slot.waker {
            Some(existing) if existing.will_wake(waker) => {}
            _ => slot.waker = Some(waker.clone()),
        }
        None
    }
}
