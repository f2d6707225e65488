//! 驱动层模块
//!
//! 本模块提供控制会话的三个并发/可靠性组件：
//! - 时钟偏差估计（ArcSwap 无锁读取）
//! - 独占控制租约与后台心跳线程
//! - 带截止时间的指令调度与过期重试
//!
//! # 使用场景
//!
//! 适用于需要直接管理租约和指令时序的场景。
//! 大多数用户应该使用 `stride-client` 提供的会话接口，它保证退出时的安全收尾。

pub mod clock;
pub mod dispatch;
mod error;
pub mod lease;
pub mod state;

pub use clock::{ClockOffset, ClockSync, ClockSyncConfig};
pub use dispatch::{
    CommandReceipt, DeadlineDispatcher, DispatchConfig, ExpiryRetryPolicy, MAX_DISPATCH_ATTEMPTS,
};
pub use error::DriverError;
pub use lease::{ControlLease, HeartbeatStats, LeaseConfig, LeaseEvent, LeaseStateHandle};
pub use state::{AtomicLeaseState, LeaseState};
