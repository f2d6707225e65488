//! 本地/远端时钟偏差估计
//!
//! 指令的截止时间必须用机器人时钟表示。`ClockSync` 向 link 请求偏差估计，
//! 把结果保存在 `ArcSwap` 中，读取方（调度器）拿到的总是一个完整快照。

use crate::DriverError;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};
use stride_link::{LinkError, SharedLink};
use stride_protocol::{ClockSkew, RobotTime};
use tracing::{debug, info};

/// 时钟同步配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSyncConfig {
    /// 单次同步最长等待（毫秒）
    pub sync_timeout_ms: u64,
    /// 偏差估计的有效期（毫秒）
    ///
    /// `None` 表示同步一次后永久有效。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_staleness_ms: Option<u64>,
}

impl Default for ClockSyncConfig {
    fn default() -> Self {
        Self {
            sync_timeout_ms: 5000,
            max_staleness_ms: None,
        }
    }
}

impl ClockSyncConfig {
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.sync_timeout_ms == 0 {
            return Err(DriverError::InvalidConfig(
                "clock.sync_timeout_ms must be positive".to_string(),
            ));
        }
        if self.max_staleness_ms == Some(0) {
            return Err(DriverError::InvalidConfig(
                "clock.max_staleness_ms must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// 偏差估计快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockOffset {
    /// 远端时钟 - 本地时钟
    pub estimate: ClockSkew,
    pub synced: bool,
    /// 最近一次成功同步的单调时间
    pub last_sync: Option<Instant>,
}

impl ClockOffset {
    pub const UNSYNCED: ClockOffset = ClockOffset {
        estimate: ClockSkew::ZERO,
        synced: false,
        last_sync: None,
    };

    /// 距离上次同步的时间
    pub fn age(&self) -> Option<Duration> {
        self.last_sync.map(|t| t.elapsed())
    }
}

/// 时钟偏差估计器
///
/// 线程安全；`sync()` 可以在任意线程调用，读取方无锁。
pub struct ClockSync {
    link: SharedLink,
    config: ClockSyncConfig,
    offset: ArcSwap<ClockOffset>,
    sync_count: AtomicU64,
}

impl ClockSync {
    pub fn new(link: SharedLink, config: ClockSyncConfig) -> Self {
        Self {
            link,
            config,
            offset: ArcSwap::from_pointee(ClockOffset::UNSYNCED),
            sync_count: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ClockSyncConfig {
        &self.config
    }

    /// 立即与远端同步一次
    ///
    /// # 错误
    ///
    /// - `SyncTimeout`: 在 `sync_timeout_ms` 内没有得到估计
    /// - `Link`: 其它 link 错误
    ///
    /// 失败时保留原有估计。
    pub fn sync(&self) -> Result<ClockOffset, DriverError> {
        let timeout = Duration::from_millis(self.config.sync_timeout_ms);
        let estimate = self.link.time_sync(timeout).map_err(|e| match e {
            LinkError::Timeout => DriverError::SyncTimeout {
                timeout_ms: self.config.sync_timeout_ms,
            },
            other => DriverError::Link(other),
        })?;

        let offset = ClockOffset {
            estimate,
            synced: true,
            last_sync: Some(Instant::now()),
        };
        let previous = self.offset.swap(Arc::new(offset));
        let count = self.sync_count.fetch_add(1, Ordering::Relaxed) + 1;

        if previous.synced && previous.estimate != estimate {
            info!(
                previous = %previous.estimate,
                current = %estimate,
                "Clock offset changed after resync"
            );
        } else {
            info!(offset = %estimate, sync_count = count, "Clock synchronized");
        }
        Ok(offset)
    }

    pub fn offset(&self) -> ClockOffset {
        **self.offset.load()
    }

    pub fn is_synced(&self) -> bool {
        self.offset.load().synced
    }

    /// 估计是否仍在有效期内
    pub fn is_fresh(&self) -> bool {
        let offset = self.offset();
        if !offset.synced {
            return false;
        }
        match (self.config.max_staleness_ms, offset.age()) {
            (None, _) => true,
            (Some(max_ms), Some(age)) => age <= Duration::from_millis(max_ms),
            (Some(_), None) => false,
        }
    }

    /// 估计过期时重新同步
    pub fn ensure_fresh(&self) -> Result<(), DriverError> {
        if !self.is_fresh() {
            debug!("Clock offset stale, resyncing");
            self.sync()?;
        }
        Ok(())
    }

    /// 本地墙钟时间换算到机器人时钟
    ///
    /// 必须先完成一次同步，否则返回 `NotSynced`。
    pub fn convert_to_remote(&self, local: SystemTime) -> Result<RobotTime, DriverError> {
        let offset = self.offset();
        if !offset.synced {
            return Err(DriverError::NotSynced);
        }
        Ok(RobotTime::from_local(local, offset.estimate))
    }

    /// 成功同步的次数（包括首次同步）
    pub fn sync_count(&self) -> u64 {
        self.sync_count.load(Ordering::Relaxed)
    }
}
