//! 统一错误定义
//!
//! 仅覆盖库自身的误用与配置错误；执行器产生的业务错误由 `EventPromise` 的
//! 泛型参数 `E` 承载，不会被包装进 `PromiseError`。
//!
use crate::promise::PromiseId;
use thiserror::Error;

/// 库级错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PromiseError {
    // --- 误用 ---
    #[error("promise is not cancellable: promise={promise}")]
    NotCancellable { promise: PromiseId },

    // --- 配置 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
}

/// 统一 Result 类型别名
pub type PromiseResult<T> = Result<T, PromiseError>;
