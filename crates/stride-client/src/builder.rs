//! Session Builder - 会话构建与作用域执行
//!
//! 启动顺序：连接 → 认证 → 首次时钟同步 → 获取租约。
//! 这些步骤失败属于启动失败：不会获得任何需要收尾的资源，错误包装为
//! `SessionError::Startup` 直接返回。

use crate::config::SessionConfig;
use crate::error::{Result, SessionError, StartupStage};
use crate::interrupt::InterruptSignal;
use crate::session::{LeaseAcquired, SessionCore, SessionHandle, Standing};
use std::path::Path;
use std::sync::Arc;
use stride_driver::{ClockSync, ControlLease};
use stride_link::{Credentials, LinkConnector, SharedLink};
use tracing::{error, info};

/// 会话构建器
///
/// # 示例
///
/// ```rust,no_run
/// use stride_client::{InterruptSignal, SessionBuilder};
/// use stride_link::{Credentials, SimConfig, SimConnector};
///
/// let connector = SimConnector::new(SimConfig::default());
/// let interrupt = InterruptSignal::new();
///
/// let session = SessionBuilder::new("192.168.80.3", Credentials::new("user", "pw"))
///     .interrupt(interrupt.clone())
///     .start(&connector)?;
/// let session = session.power_on()?;
/// # Ok::<(), stride_client::SessionError>(())
/// ```
pub struct SessionBuilder {
    address: String,
    credentials: Credentials,
    config: SessionConfig,
    interrupt: InterruptSignal,
}

impl SessionBuilder {
    pub fn new(address: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            address: address.into(),
            credentials,
            config: SessionConfig::default(),
            interrupt: InterruptSignal::new(),
        }
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// 从 TOML 文件加载配置
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        self.config = SessionConfig::load(path)?;
        Ok(self)
    }

    /// 共享外部中断信号（通常由 Ctrl-C 处理器触发）
    pub fn interrupt(mut self, interrupt: InterruptSignal) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// 建立会话并获取租约
    ///
    /// # 错误
    ///
    /// 所有错误都是 `SessionError::Startup { stage, source }`，`source` 例如：
    ///
    /// - `Config`: 配置校验失败
    /// - `Interrupted`: 连接前已被中断
    /// - `Auth`: 认证失败
    /// - `Driver(SyncTimeout)`: 首次时钟同步超时
    /// - `Driver(LeaseUnavailable)`: 租约被其他客户端持有且不允许抢占
    /// - `Driver(Timeout)`: 获取租约超时
    pub fn start<C: LinkConnector>(self, connector: &C) -> Result<SessionHandle<LeaseAcquired>> {
        self.config
            .validate()
            .map_err(|e| SessionError::startup(StartupStage::Config, e))?;
        if self.interrupt.is_triggered() {
            return Err(SessionError::startup(StartupStage::Connect, SessionError::Interrupted));
        }

        info!(address = %self.address, user = %self.credentials.username, "Connecting to robot");
        let link = connector
            .connect(&self.address)
            .map_err(|e| SessionError::startup(StartupStage::Connect, e))?;
        let link: SharedLink = Arc::new(link);
        link.authenticate(&self.credentials)
            .map_err(|e| SessionError::startup(StartupStage::Authenticate, e))?;
        info!("Authenticated");

        let clock = Arc::new(ClockSync::new(link.clone(), self.config.clock.clone()));
        clock
            .sync()
            .map_err(|e| SessionError::startup(StartupStage::ClockSync, SessionError::from_driver(e)))?;

        let lease = ControlLease::acquire(link.clone(), self.config.lease.clone())
            .map_err(|e| SessionError::startup(StartupStage::AcquireLease, SessionError::from_driver(e)))?;
        info!(token = %lease.token(), "Session started");

        Ok(SessionHandle {
            core: SessionCore::new(link, clock, lease, self.config, self.interrupt),
            _state: LeaseAcquired,
        })
    }

    /// 作用域执行：启动 → 上电 → 站立 → `app` → 坐下 → 下电 → 释放租约
    ///
    /// `app` 返回错误（或 panic）时跳过正常的坐下/下电，改为执行收尾流程，
    /// 原始错误原样返回。
    pub fn run<C, T, F>(self, connector: &C, app: F) -> Result<T>
    where
        C: LinkConnector,
        F: FnOnce(&mut SessionHandle<Standing>) -> Result<T>,
    {
        let session = self.start(connector)?;
        let session = session.power_on()?;
        let mut session = session.stand()?;

        match app(&mut session) {
            Ok(value) => {
                let session = session.sit()?;
                let mut session = session.power_off()?;
                session.end();
                Ok(value)
            },
            Err(e) => {
                error!(error = %e, phase = %session.phase(), "Session failed, tearing down");
                session.end();
                Err(e)
            },
        }
    }
}

/// 建立会话并获取租约，等价于 `SessionBuilder::new(..).config(..).start(..)`
pub fn start_session<C: LinkConnector>(
    address: &str,
    credentials: &Credentials,
    config: SessionConfig,
    connector: &C,
) -> Result<SessionHandle<LeaseAcquired>> {
    SessionBuilder::new(address, credentials.clone())
        .config(config)
        .start(connector)
}

/// 作用域会话，见 [`SessionBuilder::run`]
pub fn run_session<C, T, F>(
    address: &str,
    credentials: &Credentials,
    config: SessionConfig,
    connector: &C,
    app: F,
) -> Result<T>
where
    C: LinkConnector,
    F: FnOnce(&mut SessionHandle<Standing>) -> Result<T>,
{
    SessionBuilder::new(address, credentials.clone())
        .config(config)
        .run(connector, app)
}
