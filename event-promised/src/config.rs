//! 配置（PromiseOptions）
//!
//! 控制事件历史容量、结算后的 emit 策略以及是否允许外部取消。
//! `then`/`catch` 产生的子 Future 继承父级配置。
//!
use crate::error::PromiseResult;
use bon::Builder;
use serde::{Deserialize, Serialize};

/// 事件历史容量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryCapacity {
    /// 不限容量
    #[default]
    Unbounded,
    /// 仅保留最近 N 条记录
    Bounded(usize),
}

impl HistoryCapacity {
    /// 容量上限，`None` 表示不限
    pub fn limit(&self) -> Option<usize> {
        match self {
            HistoryCapacity::Unbounded => None,
            HistoryCapacity::Bounded(n) => Some(*n),
        }
    }

    /// 给定长度是否超出容量
    pub fn exceeded_by(&self, len: usize) -> bool {
        self.limit().is_some_and(|limit| len > limit)
    }
}

impl From<usize> for HistoryCapacity {
    fn from(n: usize) -> Self {
        HistoryCapacity::Bounded(n)
    }
}

/// Future 结算后再次 emit 的处理策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LateEmitPolicy {
    /// 照常写入历史（已无监听器可接收）
    #[default]
    Record,
    /// 丢弃并记录一条 debug 日志
    Ignore,
}

/// EventPromise 配置
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
pub struct PromiseOptions {
    /// 自建总线时使用的历史容量；外部传入共享总线时以总线自身设置为准
    #[builder(default)]
    #[serde(default)]
    pub history: HistoryCapacity,
    /// 结算后 emit 的处理策略
    #[builder(default)]
    #[serde(default)]
    pub late_emit: LateEmitPolicy,
    /// 是否保存 reject 能力以支持 `cancel`
    #[builder(default = true)]
    #[serde(default = "default_cancellable")]
    pub cancellable: bool,
}

fn default_cancellable() -> bool {
    true
}

impl Default for PromiseOptions {
    fn default() -> Self {
        Self {
            history: HistoryCapacity::default(),
            late_emit: LateEmitPolicy::default(),
            cancellable: default_cancellable(),
        }
    }
}

impl PromiseOptions {
    /// 从 JSON 文本解析配置，缺省字段取默认值
    pub fn from_json(raw: &str) -> PromiseResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}
