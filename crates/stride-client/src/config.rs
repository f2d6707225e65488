//! 会话配置
//!
//! 所有时间以毫秒为单位。TOML 中缺失的段落和字段使用默认值：
//!
//! ```toml
//! [lease]
//! acquire_timeout_ms = 5000
//! heartbeat_interval_ms = 1000
//! remote_lease_timeout_ms = 3000
//! heartbeat_retry_budget = 2
//! must_acquire = true
//!
//! [clock]
//! sync_timeout_ms = 5000
//! # max_staleness_ms = 60000   # 缺省：同步一次后永久有效
//!
//! [dispatch]
//! max_attempts = 2
//!
//! [motion]
//! power_on_timeout_ms = 20000
//! power_off_timeout_ms = 25000
//! stand_timeout_ms = 15000
//! sit_timeout_ms = 15000
//! teardown_command_deadline_ms = 2000
//!
//! [replay]
//! period_ms = 100
//! command_deadline_ms = 200
//! stop_deadline_ms = 500
//!
//! [observer]
//! period_ms = 100
//! error_backoff_ms = 500
//! ```

use crate::control::ReplayConfig;
use crate::error::{Result, SessionError};
use crate::observer::ObserverConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use stride_driver::{ClockSyncConfig, DispatchConfig, LeaseConfig};

/// 上电、站立等阻塞动作的超时
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub power_on_timeout_ms: u64,
    pub power_off_timeout_ms: u64,
    pub stand_timeout_ms: u64,
    pub sit_timeout_ms: u64,
    /// 收尾时坐下指令的截止时间
    pub teardown_command_deadline_ms: u64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            power_on_timeout_ms: 20_000,
            power_off_timeout_ms: 25_000,
            stand_timeout_ms: 15_000,
            sit_timeout_ms: 15_000,
            teardown_command_deadline_ms: 2_000,
        }
    }
}

impl MotionConfig {
    pub fn power_on_timeout(&self) -> Duration {
        Duration::from_millis(self.power_on_timeout_ms)
    }

    pub fn power_off_timeout(&self) -> Duration {
        Duration::from_millis(self.power_off_timeout_ms)
    }

    pub fn stand_timeout(&self) -> Duration {
        Duration::from_millis(self.stand_timeout_ms)
    }

    pub fn sit_timeout(&self) -> Duration {
        Duration::from_millis(self.sit_timeout_ms)
    }

    pub fn teardown_command_deadline(&self) -> Duration {
        Duration::from_millis(self.teardown_command_deadline_ms)
    }

    fn validate(&self) -> Result<()> {
        let fields = [
            ("motion.power_on_timeout_ms", self.power_on_timeout_ms),
            ("motion.power_off_timeout_ms", self.power_off_timeout_ms),
            ("motion.stand_timeout_ms", self.stand_timeout_ms),
            ("motion.sit_timeout_ms", self.sit_timeout_ms),
            (
                "motion.teardown_command_deadline_ms",
                self.teardown_command_deadline_ms,
            ),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(SessionError::Config(format!("{name} must be positive")));
            }
        }
        Ok(())
    }
}

/// 完整会话配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub lease: LeaseConfig,
    pub clock: ClockSyncConfig,
    pub dispatch: DispatchConfig,
    pub motion: MotionConfig,
    pub replay: ReplayConfig,
    pub observer: ObserverConfig,
}

impl SessionConfig {
    /// 从 TOML 文件加载并校验
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| SessionError::Config(format!("{}: {}", path.display(), e)))
    }

    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SessionConfig =
            toml::from_str(content).map_err(|e| SessionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| SessionError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |e: stride_driver::DriverError| SessionError::Config(e.to_string());
        self.lease.validate().map_err(invalid)?;
        self.clock.validate().map_err(invalid)?;
        self.dispatch.validate().map_err(invalid)?;
        self.motion.validate()?;
        self.replay.validate()?;
        self.observer.validate()?;
        Ok(())
    }
}
