//! 状态记录器
//!
//! 不获取租约，只读取机器人状态：按固定周期调用 `get_state()`，
//! 每个采样写成一行 JSON（见 `stride_tools::record`）。单次读取失败只记录警告并退避，
//! 写文件失败则立即结束。

use crate::error::{Result, SessionError};
use crate::interrupt::InterruptSignal;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stride_driver::{ClockOffset, ClockSync, ClockSyncConfig};
use stride_link::{Credentials, LinkConnector, SharedLink};
use stride_tools::{StateRecord, StateRecordWriter};
use tracing::{info, warn};

/// 采样参数（毫秒）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    pub period_ms: u64,
    /// 读取失败后的等待
    pub error_backoff_ms: u64,
    /// 采样条数上限，`None` 表示一直运行到中断
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_samples: Option<u64>,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            period_ms: 100,
            error_backoff_ms: 500,
            max_samples: None,
        }
    }
}

impl ObserverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.period_ms == 0 {
            return Err(SessionError::Config("observer.period_ms must be positive".into()));
        }
        if self.error_backoff_ms == 0 {
            return Err(SessionError::Config(
                "observer.error_backoff_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// 记录统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserverStats {
    /// 写入的记录数
    pub samples: u64,
    /// 读取失败次数
    pub errors: u64,
}

/// 周期性状态记录器
pub struct StateLogger {
    link: SharedLink,
    config: ObserverConfig,
    interrupt: InterruptSignal,
    clock_offset: ClockOffset,
}

impl StateLogger {
    /// 使用已认证的 link 创建
    pub fn new(link: SharedLink, config: ObserverConfig) -> Self {
        Self {
            link,
            config,
            interrupt: InterruptSignal::new(),
            clock_offset: ClockOffset::UNSYNCED,
        }
    }

    /// 连接、认证并同步一次时钟
    pub fn connect<C: LinkConnector>(
        connector: &C,
        address: &str,
        credentials: &Credentials,
        clock_config: ClockSyncConfig,
        config: ObserverConfig,
    ) -> Result<Self> {
        config.validate()?;
        info!(%address, user = %credentials.username, "Connecting observer");
        let link: SharedLink = Arc::new(connector.connect(address)?);
        link.authenticate(credentials)?;

        let clock = ClockSync::new(link.clone(), clock_config);
        let offset = clock.sync().map_err(SessionError::from_driver)?;

        let mut logger = Self::new(link, config);
        logger.clock_offset = offset;
        Ok(logger)
    }

    pub fn with_interrupt(mut self, interrupt: InterruptSignal) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn interrupt(&self) -> &InterruptSignal {
        &self.interrupt
    }

    pub fn clock_offset(&self) -> ClockOffset {
        self.clock_offset
    }

    /// 采样直到中断或达到 `max_samples`
    ///
    /// 中断属于正常结束，返回 `Ok`。
    pub fn run<W: Write>(&self, writer: &mut StateRecordWriter<W>) -> Result<ObserverStats> {
        let period = Duration::from_millis(self.config.period_ms);
        let backoff = Duration::from_millis(self.config.error_backoff_ms);
        let mut stats = ObserverStats::default();
        let mut next_tick = Instant::now();

        info!(period_ms = self.config.period_ms, "State logging started");
        loop {
            if self.interrupt.is_triggered() {
                info!("State logging interrupted");
                break;
            }
            if self.config.max_samples.is_some_and(|max| stats.samples >= max) {
                break;
            }

            match self.link.get_state() {
                Ok(state) => {
                    let record = StateRecord::from_state(Utc::now(), &state);
                    writer
                        .write(&record)
                        .map_err(|e| SessionError::Record(format!("{e:#}")))?;
                    stats.samples += 1;

                    next_tick += period;
                    let now = Instant::now();
                    if next_tick <= now {
                        next_tick = now;
                    } else {
                        self.interrupt.sleep(next_tick - now);
                    }
                },
                Err(e) => {
                    stats.errors += 1;
                    warn!(error = %e, "Failed to read robot state, backing off");
                    self.interrupt.sleep(backoff);
                    next_tick = Instant::now();
                },
            }
        }

        info!(
            samples = stats.samples,
            errors = stats.errors,
            "State logging stopped"
        );
        Ok(stats)
    }
}
