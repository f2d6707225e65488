//! 客户端接口模块
//!
//! 本模块提供控制会话的用户友好接口，包括：
//! - Type State Pattern（编译期保证 上电 → 站立 → 坐下 → 下电 的顺序）
//! - 收尾守卫（任何退出路径都会 坐下 → 下电 → 释放租约）
//! - TOML 会话配置
//! - 位姿日志回放和状态记录
//!
//! # 使用场景
//!
//! 这是大多数用户应该使用的模块。如果需要直接管理租约和指令时序，
//! 可以使用 `stride-driver`。

pub mod builder;
pub mod config;
pub mod control;
mod error;
pub mod interrupt;
pub mod observer;
pub mod session;

pub use builder::{SessionBuilder, run_session, start_session};
pub use config::{MotionConfig, SessionConfig};
pub use control::{MotionSink, ReplayConfig, ReplayEngine, ReplayStats};
pub use error::{Result, SessionError, StartupStage};
pub use interrupt::InterruptSignal;
pub use observer::{ObserverConfig, ObserverStats, StateLogger};
pub use session::{
    LeaseAcquired, PoweredOn, SessionHandle, SessionPhase, Standing, StepOutcome, TeardownReport,
};
