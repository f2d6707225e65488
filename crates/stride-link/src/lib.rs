//! # Stride Link Layer
//!
//! 远端机器人控制接口的抽象层。
//!
//! 核心层（租约、截止时间调度、会话生命周期）只通过 [`RobotLink`] 与机器人交互；
//! 传输和序列化细节由具体实现负责。本 crate 自带一个模拟后端（`sim` feature），
//! 用于测试和离线演示。
//!
//! # 调用原子性
//!
//! 心跳线程和前台控制序列会并发使用同一个 link，因此 [`RobotLink`] 的所有方法都以
//! `&self` 调用，实现必须保证**单次调用**（一次请求、一次响应）的原子性。
//! 阻塞式调用（如 `blocking_stand`）在等待期间不得独占 link，否则会饿死心跳。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use stride_protocol::{ClockSkew, Command, RobotState};
use thiserror::Error;

#[cfg(feature = "sim")]
pub mod sim;

#[cfg(feature = "sim")]
pub use sim::{SimCall, SimConfig, SimConnector, SimulatedRobot};

/// Link 层统一错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// 认证失败
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// 远端判定指令在执行前已过期
    #[error("Command expired before execution")]
    Expired,

    /// 租约被其他客户端持有
    #[error("Lease unavailable (held by {holder})")]
    LeaseUnavailable { holder: String },

    /// 远端已收回租约（心跳中断或被抢占）
    #[error("Lease revoked by robot")]
    LeaseRevoked,

    /// 调用超时
    #[error("Call timed out")]
    Timeout,

    /// 传输层错误
    #[error("Transport error: {0}")]
    Transport(String),

    /// 远端拒绝执行（状态不满足等）
    #[error("Rejected by robot: {0}")]
    Rejected(String),
}

impl LinkError {
    /// 是否属于可重试的瞬时错误
    pub fn is_transient(&self) -> bool {
        matches!(self, LinkError::Timeout | LinkError::Transport(_))
    }
}

/// 登录凭据
///
/// 作为显式的配置值传入会话构造过程，而不是模块级常量。
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// 远端签发的租约凭证
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LeaseToken {
    pub resource: String,
    pub sequence: u64,
}

impl fmt::Display for LeaseToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.resource, self.sequence)
    }
}

/// 远端机器人控制接口
pub trait RobotLink: Send + Sync {
    fn authenticate(&self, credentials: &Credentials) -> Result<(), LinkError>;

    /// 估计远端时钟偏差，最多等待 `timeout`
    fn time_sync(&self, timeout: Duration) -> Result<ClockSkew, LinkError>;

    /// 获取独占控制租约
    ///
    /// `must_acquire == true` 时不抢占其他持有者，直接返回 `LeaseUnavailable`。
    fn acquire_lease(&self, must_acquire: bool, timeout: Duration)
    -> Result<LeaseToken, LinkError>;

    fn heartbeat(&self, lease: &LeaseToken) -> Result<(), LinkError>;

    fn release_lease(&self, lease: &LeaseToken) -> Result<(), LinkError>;

    /// 发送一条运动指令（截止时间已是机器人时钟）
    fn command(&self, command: &Command) -> Result<(), LinkError>;

    fn power_on(&self, timeout: Duration) -> Result<(), LinkError>;

    fn power_off(&self, timeout: Duration) -> Result<(), LinkError>;

    fn blocking_stand(&self, timeout: Duration) -> Result<(), LinkError>;

    fn blocking_sit(&self, timeout: Duration) -> Result<(), LinkError>;

    fn get_state(&self) -> Result<RobotState, LinkError>;
}

/// 心跳线程和前台共享的 link 句柄
pub type SharedLink = Arc<dyn RobotLink>;

/// 按地址打开 link
pub trait LinkConnector {
    type Link: RobotLink + 'static;

    fn connect(&self, address: &str) -> Result<Self::Link, LinkError>;
}
