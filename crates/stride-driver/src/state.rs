//! 租约状态定义
//!
//! 心跳线程和前台控制序列都需要读取租约状态，因此状态保存在原子变量中，读取无锁。

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// 租约状态
///
/// # 状态转换
///
/// ```text
/// Unacquired --acquire--> Acquiring --ok--> Active
/// Acquiring --fail/timeout--> Unacquired
/// Active --heartbeat ok--> Active
/// Active --heartbeat failure / revoke--> Lost
/// Active | Lost --release--> Released
/// ```
///
/// `Lost` 和 `Released` 对同一个租约实例是终态，重新获取会得到新实例。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum LeaseState {
    #[default]
    Unacquired = 0,
    Acquiring = 1,
    /// 只有此状态下允许发送指令
    Active = 2,
    Lost = 3,
    Released = 4,
}

impl LeaseState {
    /// 从 u8 转换
    ///
    /// 无效值按 `Lost` 处理（不允许继续发送指令）。
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Unacquired,
            1 => Self::Acquiring,
            2 => Self::Active,
            4 => Self::Released,
            _ => Self::Lost,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_active(self) -> bool {
        self == Self::Active
    }

    /// 是否为终态
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Lost | Self::Released)
    }
}

impl fmt::Display for LeaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unacquired => "unacquired",
            Self::Acquiring => "acquiring",
            Self::Active => "active",
            Self::Lost => "lost",
            Self::Released => "released",
        };
        f.write_str(name)
    }
}

/// 租约状态（原子版本，用于线程间共享）
///
/// # 示例
///
/// ```rust
/// use stride_driver::state::{AtomicLeaseState, LeaseState};
/// use std::sync::atomic::Ordering;
///
/// let state = AtomicLeaseState::new(LeaseState::Active);
///
/// // 心跳线程：只有仍处于 Active 时才转为 Lost
/// assert!(state.compare_exchange(
///     LeaseState::Active,
///     LeaseState::Lost,
///     Ordering::AcqRel,
///     Ordering::Acquire,
/// ));
/// assert_eq!(state.get(Ordering::Acquire), LeaseState::Lost);
/// ```
#[derive(Debug)]
pub struct AtomicLeaseState {
    inner: AtomicU8,
}

impl AtomicLeaseState {
    pub fn new(state: LeaseState) -> Self {
        Self {
            inner: AtomicU8::new(state.as_u8()),
        }
    }

    pub fn get(&self, ordering: Ordering) -> LeaseState {
        LeaseState::from_u8(self.inner.load(ordering))
    }

    pub fn set(&self, state: LeaseState, ordering: Ordering) {
        self.inner.store(state.as_u8(), ordering);
    }

    /// 比较并交换
    ///
    /// 当前值等于 `current` 时设置为 `new` 并返回 true，否则返回 false。
    pub fn compare_exchange(
        &self,
        current: LeaseState,
        new: LeaseState,
        success: Ordering,
        failure: Ordering,
    ) -> bool {
        self.inner
            .compare_exchange(current.as_u8(), new.as_u8(), success, failure)
            .is_ok()
    }

    /// 无条件设置新状态，返回旧状态
    pub fn swap(&self, state: LeaseState, ordering: Ordering) -> LeaseState {
        LeaseState::from_u8(self.inner.swap(state.as_u8(), ordering))
    }
}

impl Default for AtomicLeaseState {
    fn default() -> Self {
        Self::new(LeaseState::Unacquired)
    }
}
