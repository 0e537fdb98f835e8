//! 复合 Future（promise）
//!
//! - `EventPromise`：一次性结算的 Future，内部持有一条 `ReplayEventBus`；
//! - `Resolver`/`Rejecter`/`Emitter`：传入执行器的三种能力；
//! - `Continuation`：`then`/`catch` 处理器的返回值约定，支持扁平化。
//!
pub mod capability;
pub mod continuation;
pub mod event_promise;
pub mod state;

pub use capability::{Emitter, Rejecter, Resolver};
pub use continuation::Continuation;
pub use event_promise::EventPromise;
pub use state::{PromiseId, PromiseStatus};
