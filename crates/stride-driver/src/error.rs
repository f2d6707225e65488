//! 驱动层错误类型定义

use crate::state::LeaseState;
use stride_link::LinkError;
use std::time::Duration;
use stride_protocol::ProtocolError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// Link 层错误
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// 指令载荷无效（NaN、退化四元数等）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 时钟同步在限定时间内没有完成
    #[error("Clock sync timed out after {timeout_ms}ms")]
    SyncTimeout { timeout_ms: u64 },

    /// 尚未完成过时钟同步，无法换算截止时间
    #[error("Clock not synchronized")]
    NotSynced,

    /// 租约被其他客户端持有，且不允许抢占
    #[error("Lease unavailable (held by {holder})")]
    LeaseUnavailable { holder: String },

    /// 租约不处于 Active 状态，禁止发送指令
    #[error("Lease not active (state: {state:?})")]
    LeaseNotActive { state: LeaseState },

    /// 会话期间租约丢失
    #[error("Lease lost")]
    LeaseLost,

    /// 重同步后指令仍被判定过期
    #[error("Command rejected as expired after {attempts} attempts")]
    CommandRejected { attempts: u32 },

    /// 截止时长超出时钟可表示的范围
    #[error("Duration out of range: {0:?}")]
    InvalidDuration(Duration),

    /// 配置无效
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// 后台线程启动失败
    #[error("Failed to spawn thread: {0}")]
    ThreadSpawn(String),

    /// 操作超时
    #[error("Operation timeout")]
    Timeout,
}

impl DriverError {
    /// 把 link 错误映射到驱动层语义（租约不可用、超时单独区分）
    pub(crate) fn from_link(err: LinkError) -> Self {
        match err {
            LinkError::LeaseUnavailable { holder } => DriverError::LeaseUnavailable { holder },
            LinkError::Timeout => DriverError::Timeout,
            other => DriverError::Link(other),
        }
    }
}
