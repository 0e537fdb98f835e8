//! 回放事件总线（ReplayEventBus）
//!
//! 同步的发布/订阅实现，所有事件在分发前先写入 `EventHistory`：
//! - `emit`：记录事件，然后按订阅顺序同步调用该事件的全部监听器；
//! - `on`：注册实时监听，并可先同步回放历史中的全部匹配记录；
//! - `once`：历史中已有匹配时立即以最早一条调用且不再订阅，否则只接收下一次实时事件；
//! - 每次订阅返回 `Subscription`，通过它显式解除订阅。
//!
//! 每个订阅拥有一个投递队列（`Mailbox`）。记录历史、回放入队与实时入队都在同一把
//! 状态锁内完成，因此队列顺序就是发出顺序；锁外同一时刻只有一个线程排空某个队列，
//! 监听器看到的事件严格按发出顺序到达，不受并发 emit 影响。
//!
//! 监听器总是在锁外调用，回调中可以再次 emit、订阅或解除订阅。
//! 若某个队列正被其他线程（或外层回调）排空，emit 只负责入队，由正在排空的一方
//! 按顺序投递。
//!
use crate::config::HistoryCapacity;
use crate::eventing::{EventHistory, EventKey, EventRecord};
use crate::lock;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// 事件监听器
pub type Listener<A> = Arc<dyn Fn(&[A]) + Send + Sync>;

/// 回放事件总线
///
/// 克隆得到的是同一总线的句柄，可在多个 `EventPromise` 之间共享历史与订阅。
pub struct ReplayEventBus<A = serde_json::Value> {
    inner: Arc<BusInner<A>>,
}

struct BusInner<A> {
    state: Mutex<BusState<A>>,
    next_id: AtomicU64,
}

struct BusState<A> {
    history: EventHistory<A>,
    listeners: HashMap<EventKey, Vec<Registered<A>>>,
}

struct Registered<A> {
    id: u64,
    mailbox: Arc<Mailbox<A>>,
}

/// 单个订阅的有序投递队列
struct Mailbox<A> {
    listener: Listener<A>,
    queue: Mutex<MailboxQueue<A>>,
}

struct MailboxQueue<A> {
    pending: VecDeque<Arc<[A]>>,
    draining: bool,
}

impl<A> Mailbox<A> {
    /// 新建队列时由订阅方占有排空权，保证回放先于任何实时事件投递
    fn claimed(listener: Listener<A>, replay: VecDeque<Arc<[A]>>) -> Arc<Self> {
        Arc::new(Self {
            listener,
            queue: Mutex::new(MailboxQueue {
                pending: replay,
                draining: true,
            }),
        })
    }

    /// 只能在持有总线状态锁时调用
    fn enqueue(&self, args: Arc<[A]>) {
        lock(&self.queue).pending.push_back(args);
    }

    /// 若无人排空则接管并投递；否则交由当前排空方
    fn pump(&self) {
        {
            let mut queue = lock(&self.queue);
            if queue.draining {
                return;
            }
            queue.draining = true;
        }
        self.drain();
    }

    /// 调用方必须已占有排空权
    fn drain(&self) {
        let guard = DrainGuard(self);
        while let Some(args) = guard.next() {
            (self.listener)(&args[..]);
        }
        // 队列为空时 next 已在锁内释放排空权
        std::mem::forget(guard);
    }
}

/// 监听器 panic 时释放排空权，避免队列永久停滞
struct DrainGuard<'a, A>(&'a Mailbox<A>);

impl<A> DrainGuard<'_, A> {
    /// 取出下一条；队列为空时在同一临界区内释放排空权
    fn next(&self) -> Option<Arc<[A]>> {
        let mut queue = lock(&self.0.queue);
        let next = queue.pending.pop_front();
        queue.draining = next.is_some();
        next
    }
}

impl<A> Drop for DrainGuard<'_, A> {
    fn drop(&mut self) {
        lock(&self.0.queue).draining = false;
    }
}

impl<A> Clone for ReplayEventBus<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A> Default for ReplayEventBus<A> {
    fn default() -> Self {
        Self::with_capacity(HistoryCapacity::Unbounded)
    }
}

impl<A> fmt::Debug for ReplayEventBus<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("ReplayEventBus")
            .field("history_len", &state.history.len())
            .field("capacity", &state.history.capacity())
            .field("events", &state.listeners.len())
            .finish()
    }
}

impl<A> ReplayEventBus<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: HistoryCapacity) -> Self {
        Self {
            inner: Arc::new(BusInner {
                state: Mutex::new(BusState {
                    history: EventHistory::new(capacity),
                    listeners: HashMap::new(),
                }),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// 两个句柄是否指向同一条总线
    pub fn same_bus(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// 清空历史，已有订阅不受影响
    pub fn reset_history(&self) {
        lock(&self.inner.state).history.clear();
    }

    /// 仅保留最近 `size` 条历史，超出部分立即从最旧处淘汰
    pub fn set_history_size(&self, size: usize) {
        self.set_history_capacity(HistoryCapacity::Bounded(size));
    }

    /// 设置历史容量（可恢复为不限容量），超出部分立即淘汰
    pub fn set_history_capacity(&self, capacity: HistoryCapacity) {
        let evicted = lock(&self.inner.state).history.set_capacity(capacity);
        tracing::trace!(?capacity, evicted, "history capacity changed");
    }

    pub fn history_capacity(&self) -> HistoryCapacity {
        lock(&self.inner.state).history.capacity()
    }

    pub fn history_len(&self) -> usize {
        lock(&self.inner.state).history.len()
    }

    /// 历史记录快照（按写入顺序）
    pub fn history(&self) -> Vec<EventRecord<A>> {
        lock(&self.inner.state).history.iter().cloned().collect()
    }

    /// 某事件当前的实时订阅数
    pub fn listener_count(&self, name: impl Into<EventKey>) -> usize {
        let key = name.into();
        lock(&self.inner.state)
            .listeners
            .get(&key)
            .map_or(0, Vec::len)
    }

    /// 解除所有事件的全部订阅，历史保持不变
    pub fn remove_all_listeners(&self) {
        let removed: usize = {
            let mut state = lock(&self.inner.state);
            let removed = state.listeners.values().map(Vec::len).sum();
            state.listeners.clear();
            removed
        };
        if removed > 0 {
            tracing::trace!(removed, "all listeners removed");
        }
    }
}

impl<A> ReplayEventBus<A>
where
    A: Send + Sync + 'static,
{
    /// 记录并同步分发事件，返回投递到的监听器数量
    ///
    /// 没有其他调用方正在投递这些订阅时，返回前全部监听器都已被调用。
    pub fn emit<K, I>(&self, name: K, args: I) -> usize
    where
        K: Into<EventKey>,
        I: IntoIterator<Item = A>,
    {
        self.emit_unless(name, args, || false).unwrap_or_default()
    }

    /// 在状态锁内先求值 `skip`，为 true 时既不记录也不分发，返回 `None`
    pub(crate) fn emit_unless<K, I>(
        &self,
        name: K,
        args: I,
        skip: impl FnOnce() -> bool,
    ) -> Option<usize>
    where
        K: Into<EventKey>,
        I: IntoIterator<Item = A>,
    {
        let key = name.into();
        let args: Arc<[A]> = args.into_iter().collect();

        let targets: Vec<Arc<Mailbox<A>>> = {
            let mut state = lock(&self.inner.state);
            if skip() {
                return None;
            }
            let evicted = state.history.record(key.clone(), Arc::clone(&args));
            if evicted > 0 {
                tracing::trace!(event = %key, evicted, "history evicted");
            }
            state
                .listeners
                .get(&key)
                .map(|list| {
                    list.iter()
                        .map(|r| {
                            r.mailbox.enqueue(Arc::clone(&args));
                            Arc::clone(&r.mailbox)
                        })
                        .collect()
                })
                .unwrap_or_default()
        };

        tracing::trace!(event = %key, listeners = targets.len(), "event emitted");
        for mailbox in &targets {
            mailbox.pump();
        }
        Some(targets.len())
    }

    /// 订阅事件并回放历史
    pub fn on<K, F>(&self, name: K, listener: F) -> Subscription
    where
        K: Into<EventKey>,
        F: Fn(&[A]) + Send + Sync + 'static,
    {
        self.on_with(name, listener, true)
    }

    /// 订阅事件；`use_history` 为 true 时先同步回放历史中的全部匹配记录
    ///
    /// 回放与注册在同一临界区内入队，并发发出的新事件只会排在回放之后。
    pub fn on_with<K, F>(&self, name: K, listener: F, use_history: bool) -> Subscription
    where
        K: Into<EventKey>,
        F: Fn(&[A]) + Send + Sync + 'static,
    {
        let key = name.into();
        let id = self.next_id();

        let mailbox = {
            let mut state = lock(&self.inner.state);
            let replay: VecDeque<Arc<[A]>> = if use_history {
                state.history.matching(&key).map(EventRecord::shared_args).collect()
            } else {
                VecDeque::new()
            };
            if !replay.is_empty() {
                tracing::trace!(event = %key, replayed = replay.len(), "history replayed");
            }
            let mailbox = Mailbox::claimed(Arc::new(listener), replay);
            state
                .listeners
                .entry(key.clone())
                .or_default()
                .push(Registered {
                    id,
                    mailbox: Arc::clone(&mailbox),
                });
            mailbox
        };
        mailbox.drain();

        self.subscription(key, id)
    }

    /// 只接收一次事件，优先使用历史
    pub fn once<K, F>(&self, name: K, listener: F) -> Subscription
    where
        K: Into<EventKey>,
        F: FnOnce(&[A]) + Send + 'static,
    {
        self.once_with(name, listener, true)
    }

    /// 只接收一次事件
    ///
    /// `use_history` 为 true 且历史中存在匹配时，立即以最早一条记录调用监听器，
    /// 返回空操作的 `Subscription`，之后的实时事件不会再触达该监听器。
    /// 否则注册一个实时订阅，在第一次被调用时自动解除。
    pub fn once_with<K, F>(&self, name: K, listener: F, use_history: bool) -> Subscription
    where
        K: Into<EventKey>,
        F: FnOnce(&[A]) + Send + 'static,
    {
        let key = name.into();
        let mut state = lock(&self.inner.state);

        let first = if use_history {
            state.history.first_matching(&key).map(EventRecord::shared_args)
        } else {
            None
        };
        if let Some(args) = first {
            drop(state);
            tracing::trace!(event = %key, "once satisfied from history");
            listener(&args[..]);
            return Subscription::noop();
        }

        let id = self.next_id();
        let slot = Mutex::new(Some(listener));
        let weak = Arc::downgrade(&self.inner);
        let owned_key = key.clone();
        let wrapped: Listener<A> = Arc::new(move |args: &[A]| {
            let Some(listener) = lock(&slot).take() else {
                return;
            };
            if let Some(inner) = weak.upgrade() {
                inner.detach(&owned_key, id);
            }
            listener(args);
        });
        let mailbox = Mailbox::claimed(wrapped, VecDeque::new());
        state.listeners.entry(key.clone()).or_default().push(Registered {
            id,
            mailbox: Arc::clone(&mailbox),
        });
        drop(state);
        mailbox.drain();

        self.subscription(key, id)
    }

    fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn subscription(&self, key: EventKey, id: u64) -> Subscription {
        let weak: Weak<BusInner<A>> = Arc::downgrade(&self.inner);
        Subscription {
            detach: Some(Arc::new(move || {
                weak.upgrade().is_some_and(|inner| inner.detach(&key, id))
            })),
        }
    }
}

impl<A> BusInner<A> {
    fn detach(&self, key: &EventKey, id: u64) -> bool {
        let mut state = lock(&self.state);
        let Some(list) = state.listeners.get_mut(key) else {
            return false;
        };
        let before = list.len();
        list.retain(|r| r.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            state.listeners.remove(key);
        }
        removed
    }
}

/// 订阅句柄：持有解除该订阅的能力
///
/// 丢弃句柄不会解除订阅，需显式调用 `detach`。
#[derive(Clone, Default)]
pub struct Subscription {
    detach: Option<Arc<dyn Fn() -> bool + Send + Sync>>,
}

impl Subscription {
    /// 不对应任何实时订阅的空句柄
    pub fn noop() -> Self {
        Self::default()
    }

    pub fn is_noop(&self) -> bool {
        self.detach.is_none()
    }

    /// 解除订阅；返回本次调用是否实际移除了监听器
    pub fn detach(&self) -> bool {
        self.detach.as_ref().is_some_and(|detach| detach())
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("noop", &self.is_noop())
            .finish()
    }
}
