//! Stride SDK - 足式机器人安全控制会话
//!
//! 在远程机器人控制服务之上提供"获取租约 → 上电 → 站立 → 应用 → 坐下 → 下电 → 释放租约"
//! 的会话生命周期，并保证任何退出路径都会执行收尾。
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **协议层** (`protocol`): 运动指令、机器人时钟、状态快照
//! - **链路层** (`link`): `RobotLink` 抽象与模拟机器人
//! - **驱动层** (`driver`): 时钟同步、租约心跳、截止时间调度
//! - **客户端层** (`client`): 类型状态会话、回放、状态记录
//! - **工具** (`tools`): 状态日志格式与位姿运动学
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use stride_sdk::prelude::*;
//! use std::time::Duration;
//!
//! stride_sdk::init_logger();
//! let connector = SimConnector::new(SimConfig::default());
//! let credentials = Credentials::new("user", "password");
//!
//! run_session("192.168.80.3", &credentials, SessionConfig::default(), &connector, |session| {
//!     session.dispatch(MotionCommand::velocity(0.4, 0.0, 0.0), Some(Duration::from_secs(4)))?;
//!     session.hold(Duration::from_secs(4))
//! })?;
//! # Ok::<(), SessionError>(())
//! ```

pub use stride_client as client;
pub use stride_driver as driver;
pub use stride_link as link;
pub use stride_protocol as protocol;
pub use stride_tools as tools;

pub mod prelude;

// --- 用户以此为界 ---
// 以下是通过 Facade Pattern 提供的公共 API

// 客户端层（推荐入口）
pub use client::{
    InterruptSignal, SessionBuilder, SessionConfig, SessionError, SessionHandle, SessionPhase,
    TeardownReport, run_session, start_session,
};

// 驱动层错误
pub use driver::DriverError;

// 链路层
pub use link::{Credentials, LinkConnector, LinkError, RobotLink};

// 协议层
pub use protocol::{MotionCommand, ProtocolError};

/// 初始化日志
///
/// 安装 `tracing-subscriber` fmt 输出，级别由 `RUST_LOG` 控制（缺省 `info`），
/// 同时把 `log` crate 的记录转发到 tracing。重复调用无副作用。
pub fn init_logger() {
    let _ = tracing_log::LogTracer::init();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
