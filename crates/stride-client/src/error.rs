//! 会话层错误类型

use std::fmt;
use stride_driver::{DriverError, LeaseState};
use stride_link::LinkError;
use thiserror::Error;

/// 启动阶段（获取租约之前）的步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupStage {
    Config,
    Connect,
    Authenticate,
    ClockSync,
    AcquireLease,
}

impl fmt::Display for StartupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StartupStage::Config => "config",
            StartupStage::Connect => "connect",
            StartupStage::Authenticate => "authenticate",
            StartupStage::ClockSync => "clock sync",
            StartupStage::AcquireLease => "acquire lease",
        };
        f.write_str(name)
    }
}

/// 会话层错误类型
#[derive(Error, Debug)]
pub enum SessionError {
    /// 认证失败（启动阶段，未获取任何资源）
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// 驱动层错误
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// 外部中断（Ctrl-C 等）
    #[error("Session interrupted")]
    Interrupted,

    /// 会话期间租约丢失
    #[error("Control lease lost")]
    LeaseLost,

    /// 配置无效
    #[error("Config error: {0}")]
    Config(String),

    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 状态日志读写失败
    #[error("Record error: {0}")]
    Record(String),

    /// 启动失败：租约尚未获取，无需收尾
    #[error("Session startup failed ({stage}): {source}")]
    Startup {
        stage: StartupStage,
        #[source]
        source: Box<SessionError>,
    },
}

impl From<LinkError> for SessionError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::Auth(reason) => SessionError::Auth(reason),
            LinkError::LeaseRevoked => SessionError::LeaseLost,
            other => SessionError::Driver(DriverError::Link(other)),
        }
    }
}

impl SessionError {
    /// 驱动层的租约丢失统一归为 `LeaseLost`
    pub(crate) fn from_driver(err: DriverError) -> Self {
        match err {
            DriverError::LeaseLost
            | DriverError::LeaseNotActive {
                state: LeaseState::Lost,
            } => SessionError::LeaseLost,
            DriverError::Link(LinkError::Auth(reason)) => SessionError::Auth(reason),
            other => SessionError::Driver(other),
        }
    }

    /// 把启动阶段的错误包装为 [`SessionError::Startup`]
    pub(crate) fn startup(stage: StartupStage, err: impl Into<SessionError>) -> Self {
        SessionError::Startup {
            stage,
            source: Box::new(err.into()),
        }
    }

    /// 是否发生在获取租约之前（启动失败，无需收尾）
    ///
    /// 按发生阶段判断，与具体错误类型无关。
    pub fn is_startup_failure(&self) -> bool {
        matches!(self, SessionError::Startup { .. })
    }

    /// 去掉启动阶段包装后的错误
    pub fn root(&self) -> &SessionError {
        match self {
            SessionError::Startup { source, .. } => source.root(),
            other => other,
        }
    }
}

/// 会话层 Result 类型
pub type Result<T> = std::result::Result<T, SessionError>;
