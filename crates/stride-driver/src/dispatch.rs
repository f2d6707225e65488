//! Deadline Command Dispatcher - 带截止时间的指令发送
//!
//! 每条指令携带一个机器人时钟上的绝对截止时间：`deadline = 本地发出时间 + duration`，
//! 再按当前时钟偏差换算到远端。远端以自己的时钟判断是否过期，因此时钟偏差估计
//! 不准时指令会被拒绝为 `Expired`。此时调度器重新同步时钟、按**当前**本地时间
//! 重新计算截止时间并重发一次。
//!
//! 调度器不排队：调用方线程直接完成发送，同一时刻最多一个在途调用。

use crate::DriverError;
use crate::clock::ClockSync;
use crate::lease::LeaseStateHandle;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use stride_link::{LinkError, SharedLink};
use stride_protocol::{Command, MotionCommand, RobotTime};
use tracing::{debug, warn};

/// 单次调度的发送次数上限：首次发送 + 一次重同步后的重发
pub const MAX_DISPATCH_ATTEMPTS: u32 = 2;

/// 调度配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// 单次调度最多发送的次数（含首次），只能是 1 或 2
    pub max_attempts: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_DISPATCH_ATTEMPTS,
        }
    }
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<(), DriverError> {
        if !(1..=MAX_DISPATCH_ATTEMPTS).contains(&self.max_attempts) {
            return Err(DriverError::InvalidConfig(format!(
                "dispatch.max_attempts must be between 1 and {}, got {}",
                MAX_DISPATCH_ATTEMPTS, self.max_attempts
            )));
        }
        Ok(())
    }
}

/// 过期重试策略
///
/// 只有 `Expired` 会触发重试，且每次重试前先重新同步时钟。
/// 其它错误（包括重试时出现的其它错误）原样返回。
///
/// # 示例
///
/// ```rust
/// use stride_driver::{DriverError, ExpiryRetryPolicy};
/// use stride_link::LinkError;
///
/// let policy = ExpiryRetryPolicy::default();
/// let mut resyncs = 0;
/// let (value, attempts) = policy.execute(
///     |attempt| {
///         if attempt == 1 {
///             Err(DriverError::Link(LinkError::Expired))
///         } else {
///             Ok("sent")
///         }
///     },
///     || {
///         resyncs += 1;
///         Ok(())
///     },
/// )?;
/// assert_eq!((value, attempts, resyncs), ("sent", 2, 1));
/// # Ok::<(), DriverError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryRetryPolicy {
    max_attempts: u32,
}

impl Default for ExpiryRetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 2 }
    }
}

impl ExpiryRetryPolicy {
    /// `max_attempts` 被限制在 `1..=MAX_DISPATCH_ATTEMPTS`
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.clamp(1, MAX_DISPATCH_ATTEMPTS),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 执行发送，返回 `(结果, 实际发送次数)`
    ///
    /// `send` 的参数为从 1 开始的尝试序号。最后一次尝试仍然过期时返回
    /// `CommandRejected { attempts }`。
    pub fn execute<T>(
        &self,
        mut send: impl FnMut(u32) -> Result<T, DriverError>,
        mut resync: impl FnMut() -> Result<(), DriverError>,
    ) -> Result<(T, u32), DriverError> {
        let mut attempt = 1;
        loop {
            match send(attempt) {
                Ok(value) => return Ok((value, attempt)),
                Err(DriverError::Link(LinkError::Expired)) if attempt < self.max_attempts => {
                    warn!(attempt, "Command expired on robot clock, resyncing and retrying");
                    resync()?;
                    attempt += 1;
                },
                Err(DriverError::Link(LinkError::Expired)) => {
                    return Err(DriverError::CommandRejected { attempts: attempt });
                },
                Err(e) => return Err(e),
            }
        }
    }
}

/// 一次成功调度的回执
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandReceipt {
    pub command_id: u64,
    /// 实际发送次数（1 或 2）
    pub attempts: u32,
    /// 最后一次发送的本地时间
    pub issued_at: SystemTime,
    /// 最后一次发送携带的远端截止时间
    pub deadline: Option<RobotTime>,
}

/// 截止时间指令调度器
pub struct DeadlineDispatcher {
    link: SharedLink,
    clock: Arc<ClockSync>,
    lease: LeaseStateHandle,
    policy: ExpiryRetryPolicy,
    next_id: AtomicU64,
}

impl DeadlineDispatcher {
    pub fn new(
        link: SharedLink,
        clock: Arc<ClockSync>,
        lease: LeaseStateHandle,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            link,
            clock,
            lease,
            policy: ExpiryRetryPolicy::new(config.max_attempts),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn clock(&self) -> &Arc<ClockSync> {
        &self.clock
    }

    pub fn policy(&self) -> ExpiryRetryPolicy {
        self.policy
    }

    /// 发送一条在 `duration` 后过期的指令
    ///
    /// # 错误
    ///
    /// - `LeaseNotActive`: 租约不处于 Active 状态
    /// - `CommandRejected`: 重同步后仍然过期
    /// - `LeaseLost`: 远端已收回租约
    /// - 其它 link 错误原样返回，不重试
    pub fn dispatch(
        &self,
        payload: MotionCommand,
        duration: Duration,
    ) -> Result<CommandReceipt, DriverError> {
        self.send(payload, Some(duration))
    }

    /// 发送不带截止时间的指令（一直保持，直到被覆盖）
    pub fn dispatch_persistent(&self, payload: MotionCommand) -> Result<CommandReceipt, DriverError> {
        self.send(payload, None)
    }

    fn require_active(&self) -> Result<(), DriverError> {
        let state = self.lease.state();
        if state.is_active() {
            Ok(())
        } else {
            Err(DriverError::LeaseNotActive { state })
        }
    }

    fn send(
        &self,
        payload: MotionCommand,
        duration: Option<Duration>,
    ) -> Result<CommandReceipt, DriverError> {
        self.require_active()?;
        payload.validate()?;
        if duration.is_some() {
            self.clock.ensure_fresh()?;
        }

        let command_id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let ((issued_at, deadline), attempts) = self.policy.execute(
            |attempt| {
                if attempt > 1 {
                    self.require_active()?;
                }
                let issued_at = SystemTime::now();
                let deadline = duration
                    .map(|d| {
                        let local = issued_at
                            .checked_add(d)
                            .ok_or(DriverError::InvalidDuration(d))?;
                        self.clock.convert_to_remote(local)
                    })
                    .transpose()?;
                let command = Command {
                    id: command_id,
                    payload: payload.clone(),
                    issued_at,
                    deadline,
                };
                debug!(
                    id = command_id,
                    command = payload.name(),
                    attempt,
                    deadline = ?deadline,
                    "Dispatching command"
                );

                match self.link.command(&command) {
                    Ok(()) => Ok((issued_at, deadline)),
                    Err(LinkError::LeaseRevoked) => {
                        self.lease.mark_lost("robot revoked the lease during command");
                        Err(DriverError::LeaseLost)
                    },
                    Err(e) => Err(DriverError::Link(e)),
                }
            },
            || self.clock.sync().map(|_| ()),
        )?;

        Ok(CommandReceipt {
            command_id,
            attempts,
            issued_at,
            deadline,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn expired<T>() -> Result<T, DriverError> {
        Err(DriverError::Link(LinkError::Expired))
    }

    #[test]
    fn test_success_on_first_attempt_never_resyncs() {
        let resyncs = Cell::new(0);
        let (_, attempts) = ExpiryRetryPolicy::default()
            .execute(
                |_| Ok(()),
                || {
                    resyncs.set(resyncs.get() + 1);
                    Ok(())
                },
            )
            .unwrap();
        assert_eq!(attempts, 1);
        assert_eq!(resyncs.get(), 0);
    }

    #[test]
    fn test_expired_twice_is_rejected_without_third_attempt() {
        let sends = Cell::new(0);
        let resyncs = Cell::new(0);
        let result: Result<((), u32), _> = ExpiryRetryPolicy::default().execute(
            |_| {
                sends.set(sends.get() + 1);
                expired()
            },
            || {
                resyncs.set(resyncs.get() + 1);
                Ok(())
            },
        );
        assert!(matches!(
            result,
            Err(DriverError::CommandRejected { attempts: 2 })
        ));
        assert_eq!(sends.get(), 2);
        assert_eq!(resyncs.get(), 1);
    }

    #[test]
    fn test_other_errors_are_not_retried() {
        let sends = Cell::new(0);
        let result: Result<((), u32), _> = ExpiryRetryPolicy::default().execute(
            |_| {
                sends.set(sends.get() + 1);
                Err(DriverError::Link(LinkError::Transport("reset".into())))
            },
            || Ok(()),
        );
        assert!(matches!(
            result,
            Err(DriverError::Link(LinkError::Transport(_)))
        ));
        assert_eq!(sends.get(), 1);
    }

    #[test]
    fn test_error_on_retry_propagates_unchanged() {
        let result: Result<((), u32), _> = ExpiryRetryPolicy::default().execute(
            |attempt| {
                if attempt == 1 {
                    expired()
                } else {
                    Err(DriverError::LeaseLost)
                }
            },
            || Ok(()),
        );
        assert!(matches!(result, Err(DriverError::LeaseLost)));
    }

    #[test]
    fn test_resync_failure_aborts_retry() {
        let sends = Cell::new(0);
        let result: Result<((), u32), _> = ExpiryRetryPolicy::default().execute(
            |_| {
                sends.set(sends.get() + 1);
                expired()
            },
            || Err(DriverError::SyncTimeout { timeout_ms: 5000 }),
        );
        assert!(matches!(result, Err(DriverError::SyncTimeout { .. })));
        assert_eq!(sends.get(), 1);
    }

    #[test]
    fn test_single_attempt_policy() {
        let result: Result<((), u32), _> =
            ExpiryRetryPolicy::new(1).execute(|_| expired(), || Ok(()));
        assert!(matches!(
            result,
            Err(DriverError::CommandRejected { attempts: 1 })
        ));
        assert_eq!(ExpiryRetryPolicy::new(0).max_attempts(), 1);
    }

    #[test]
    fn test_policy_never_exceeds_two_sends() {
        let sends = Cell::new(0);
        let result: Result<((), u32), _> = ExpiryRetryPolicy::new(5).execute(
            |_| {
                sends.set(sends.get() + 1);
                expired()
            },
            || Ok(()),
        );
        assert!(matches!(
            result,
            Err(DriverError::CommandRejected { attempts: 2 })
        ));
        assert_eq!(sends.get(), 2);
        assert_eq!(ExpiryRetryPolicy::new(u32::MAX).max_attempts(), 2);
    }

    #[test]
    fn test_dispatch_config_validation() {
        assert!(DispatchConfig::default().validate().is_ok());
        assert!(DispatchConfig { max_attempts: 1 }.validate().is_ok());
        assert!(DispatchConfig { max_attempts: 0 }.validate().is_err());
        assert!(DispatchConfig { max_attempts: 3 }.validate().is_err());
        assert!(DispatchConfig { max_attempts: 5 }.validate().is_err());
    }
}
