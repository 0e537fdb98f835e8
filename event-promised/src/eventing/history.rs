//! 事件历史（EventHistory）
//!
//! 追加写入的有序日志，超出容量时从队首（最旧）开始淘汰，始终保留最近 N 条。
//!
use crate::config::HistoryCapacity;
use crate::eventing::EventKey;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// 一条事件记录，写入后不可变
pub struct EventRecord<A> {
    /// 单调递增的写入序号（淘汰后不重用）
    sequence: u64,
    name: EventKey,
    args: Arc<[A]>,
    recorded_at: DateTime<Utc>,
}

impl<A> EventRecord<A> {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn name(&self) -> &EventKey {
        &self.name
    }

    pub fn args(&self) -> &[A] {
        &self.args
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    pub(crate) fn shared_args(&self) -> Arc<[A]> {
        Arc::clone(&self.args)
    }
}

// 参数以 Arc 共享，克隆记录不要求 A: Clone
impl<A> Clone for EventRecord<A> {
    fn clone(&self) -> Self {
        Self {
            sequence: self.sequence,
            name: self.name.clone(),
            args: Arc::clone(&self.args),
            recorded_at: self.recorded_at,
        }
    }
}

impl<A: fmt::Debug> fmt::Debug for EventRecord<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRecord")
            .field("sequence", &self.sequence)
            .field("name", &self.name)
            .field("args", &&*self.args)
            .field("recorded_at", &self.recorded_at)
            .finish()
    }
}

/// 有界事件历史
pub struct EventHistory<A> {
    records: VecDeque<EventRecord<A>>,
    capacity: HistoryCapacity,
    next_sequence: u64,
}

impl<A> Default for EventHistory<A> {
    fn default() -> Self {
        Self::new(HistoryCapacity::Unbounded)
    }
}

impl<A> EventHistory<A> {
    pub fn new(capacity: HistoryCapacity) -> Self {
        Self {
            records: VecDeque::new(),
            capacity,
            next_sequence: 0,
        }
    }

    pub fn capacity(&self) -> HistoryCapacity {
        self.capacity
    }

    /// 修改容量，并立即淘汰超出新容量的旧记录
    pub fn set_capacity(&mut self, capacity: HistoryCapacity) -> usize {
        self.capacity = capacity;
        self.evict()
    }

    /// 追加一条记录，返回淘汰的记录数
    pub fn record(&mut self, name: EventKey, args: Arc<[A]>) -> usize {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.records.push_back(EventRecord {
            sequence,
            name,
            args,
            recorded_at: Utc::now(),
        });
        self.evict()
    }

    /// 清空记录；序号继续递增
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventRecord<A>> {
        self.records.iter()
    }

    /// 按写入顺序返回所有匹配 `name` 的记录
    pub fn matching<'a>(&'a self, name: &'a EventKey) -> impl Iterator<Item = &'a EventRecord<A>> {
        self.records.iter().filter(move |r| &r.name == name)
    }

    /// 最早一条匹配 `name` 的记录
    pub fn first_matching<'a>(&'a self, name: &'a EventKey) -> Option<&'a EventRecord<A>> {
        self.matching(name).next()
    }

    fn evict(&mut self) -> usize {
        let mut evicted = 0;
        while self.capacity.exceeded_by(self.records.len()) {
            self.records.pop_front();
            evicted += 1;
        }
        evicted
    }
}
