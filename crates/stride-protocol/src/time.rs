//! # 时间类型
//!
//! 指令截止时间必须用**机器人时钟**表达：判断指令是否过期的是机器人，而不是调用方。
//!
//! | 类型 | 含义 |
//! |------|------|
//! | `SystemTime` | 本地墙钟 |
//! | `ClockSkew` | 远端时钟 - 本地时钟（有符号，纳秒） |
//! | `RobotTime` | 机器人时钟上的绝对时间（Unix 纪元起的纳秒数） |

use std::fmt;
use std::ops::{Add, Sub};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// 本地墙钟时间转换为 Unix 纪元起的纳秒数（早于纪元的时间为负数）
pub fn unix_nanos(time: SystemTime) -> i128 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_nanos() as i128,
        Err(before) => -(before.duration().as_nanos() as i128),
    }
}

/// 本地时钟与远端时钟的偏差（`remote - local`）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockSkew {
    nanos: i64,
}

impl ClockSkew {
    pub const ZERO: ClockSkew = ClockSkew { nanos: 0 };

    pub const fn from_nanos(nanos: i64) -> Self {
        Self { nanos }
    }

    pub const fn from_millis(millis: i64) -> Self {
        Self {
            nanos: millis * 1_000_000,
        }
    }

    pub const fn from_secs(secs: i64) -> Self {
        Self {
            nanos: secs * 1_000_000_000,
        }
    }

    pub const fn as_nanos(&self) -> i64 {
        self.nanos
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.nanos as f64 / 1e9
    }

    /// 远端时钟是否领先本地时钟
    pub const fn is_ahead(&self) -> bool {
        self.nanos > 0
    }
}

impl fmt::Display for ClockSkew {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+.6}s", self.as_secs_f64())
    }
}

/// 机器人时钟上的绝对时间
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RobotTime {
    nanos: i128,
}

impl RobotTime {
    pub const fn from_unix_nanos(nanos: i128) -> Self {
        Self { nanos }
    }

    pub const fn as_unix_nanos(&self) -> i128 {
        self.nanos
    }

    /// 把本地墙钟时间换算到机器人时钟
    pub fn from_local(local: SystemTime, skew: ClockSkew) -> Self {
        Self {
            nanos: unix_nanos(local) + skew.as_nanos() as i128,
        }
    }

    /// 按给定偏差换算回本地墙钟（仅用于日志和测试）
    pub fn to_local(&self, skew: ClockSkew) -> SystemTime {
        let local = self.nanos - skew.as_nanos() as i128;
        if local >= 0 {
            UNIX_EPOCH + Duration::from_nanos(local as u64)
        } else {
            UNIX_EPOCH - Duration::from_nanos(local.unsigned_abs() as u64)
        }
    }

    /// `self` 距离 `other` 还有多久；`other` 已经晚于 `self` 时返回 `None`
    pub fn checked_duration_since(&self, other: RobotTime) -> Option<Duration> {
        let diff = self.nanos - other.nanos;
        if diff < 0 {
            None
        } else {
            Some(Duration::from_nanos(diff as u64))
        }
    }
}

impl Add<Duration> for RobotTime {
    type Output = RobotTime;

    fn add(self, rhs: Duration) -> RobotTime {
        RobotTime {
            nanos: self.nanos + rhs.as_nanos() as i128,
        }
    }
}

impl Sub for RobotTime {
    /// 两个时间点之间的有符号纳秒差
    type Output = i128;

    fn sub(self, rhs: RobotTime) -> i128 {
        self.nanos - rhs.nanos
    }
}

impl fmt::Display for RobotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "robot@{:.6}", self.nanos as f64 / 1e9)
    }
}
