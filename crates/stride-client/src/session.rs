//! Type State Session - 编译期保证的会话生命周期
//!
//! 正向流程：
//!
//! ```text
//! start ──> LeaseAcquired ──power_on──> PoweredOn ──stand──> Standing
//!                 ^                        │  ^                 │
//!                 └───────power_off────────┘  └──────sit────────┘
//! ```
//!
//! 状态标记是零大小类型，非法的调用顺序（例如未上电就站立）无法通过编译。
//!
//! # 收尾
//!
//! 获得租约之后，无论正常结束、返回错误、panic 展开还是外部中断，都会按顺序执行：
//!
//! 1. 如果曾请求站立且租约仍有效：发送带短截止时间的坐下指令
//! 2. 如果曾请求上电：下电
//! 3. 释放租约（之后才停止心跳线程）
//!
//! 每一步失败只记录警告，不影响后续步骤。收尾由内部守卫的 `Drop` 保证，
//! `end()` 可以提前显式执行，重复调用没有副作用。

use crate::config::SessionConfig;
use crate::control::MotionSink;
use crate::error::{Result, SessionError};
use crate::interrupt::InterruptSignal;
use crossbeam_channel::Receiver;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use stride_driver::{
    ClockOffset, ClockSync, CommandReceipt, ControlLease, DeadlineDispatcher, DriverError,
    HeartbeatStats, LeaseEvent, LeaseState,
};
use stride_link::{LinkError, SharedLink};
use stride_protocol::{MotionCommand, RobotState};
use tracing::{error, info, warn};

// ==================== 状态类型（零大小类型）====================

/// 已获得租约，未上电
pub struct LeaseAcquired;

/// 已上电
pub struct PoweredOn;

/// 站立中，可以发送运动指令
pub struct Standing;

/// 会话所处阶段（运行时视图，用于日志和诊断）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Init,
    LeaseAcquired,
    PoweredOn,
    Standing,
    Sitting,
    PoweredOff,
    LeaseReleased,
    Done,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Init => "init",
            SessionPhase::LeaseAcquired => "lease_acquired",
            SessionPhase::PoweredOn => "powered_on",
            SessionPhase::Standing => "standing",
            SessionPhase::Sitting => "sitting",
            SessionPhase::PoweredOff => "powered_off",
            SessionPhase::LeaseReleased => "lease_released",
            SessionPhase::Done => "done",
        };
        f.write_str(name)
    }
}

// ==================== 收尾报告 ====================

/// 单个收尾步骤的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    /// 条件不满足或已执行过
    Skipped,
    /// 失败原因（已记录日志并忽略）
    Failed(String),
}

impl StepOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }
}

/// 收尾流程的逐步结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownReport {
    pub stop: StepOutcome,
    pub power_off: StepOutcome,
    pub release: StepOutcome,
}

impl TeardownReport {
    fn skipped() -> Self {
        Self {
            stop: StepOutcome::Skipped,
            power_off: StepOutcome::Skipped,
            release: StepOutcome::Skipped,
        }
    }

    /// 没有任何步骤失败
    pub fn is_clean(&self) -> bool {
        !(self.stop.is_failed() || self.power_off.is_failed() || self.release.is_failed())
    }
}

// ==================== 会话核心（收尾守卫）====================

pub(crate) struct SessionCore {
    pub(crate) link: SharedLink,
    pub(crate) clock: Arc<ClockSync>,
    pub(crate) lease: ControlLease,
    pub(crate) dispatcher: DeadlineDispatcher,
    pub(crate) config: SessionConfig,
    pub(crate) interrupt: InterruptSignal,
    pub(crate) phase: SessionPhase,
    power_requested: bool,
    stand_requested: bool,
    torn_down: bool,
}

impl SessionCore {
    pub(crate) fn new(
        link: SharedLink,
        clock: Arc<ClockSync>,
        lease: ControlLease,
        config: SessionConfig,
        interrupt: InterruptSignal,
    ) -> Self {
        let dispatcher = DeadlineDispatcher::new(
            link.clone(),
            clock.clone(),
            lease.state_handle(),
            &config.dispatch,
        );
        Self {
            link,
            clock,
            lease,
            dispatcher,
            config,
            interrupt,
            phase: SessionPhase::LeaseAcquired,
            power_requested: false,
            stand_requested: false,
            torn_down: false,
        }
    }

    fn check_interrupt(&self) -> Result<()> {
        if self.interrupt.is_triggered() {
            return Err(SessionError::Interrupted);
        }
        Ok(())
    }

    /// 租约不可用时对应的错误
    fn lease_error(&self) -> SessionError {
        match self.lease.state() {
            LeaseState::Lost => SessionError::LeaseLost,
            state => SessionError::Driver(DriverError::LeaseNotActive { state }),
        }
    }

    fn require_lease(&self) -> Result<()> {
        if self.lease.is_active() {
            Ok(())
        } else {
            Err(self.lease_error())
        }
    }

    /// 执行一次阻塞的 link 调用；远端收回租约时同步更新本地状态
    fn blocking<F>(&self, action: F) -> Result<()>
    where
        F: FnOnce(&SharedLink) -> std::result::Result<(), LinkError>,
    {
        self.require_lease()?;
        action(&self.link).map_err(|e| {
            if e == LinkError::LeaseRevoked {
                self.lease.state_handle().mark_lost("robot revoked the lease");
            }
            SessionError::from(e)
        })
    }

    fn dispatch(
        &self,
        payload: MotionCommand,
        duration: Option<Duration>,
    ) -> Result<CommandReceipt> {
        self.check_interrupt()?;
        let result = match duration {
            Some(duration) => self.dispatcher.dispatch(payload, duration),
            None => self.dispatcher.dispatch_persistent(payload),
        };
        result.map_err(SessionError::from_driver)
    }

    fn hold(&self, duration: Duration) -> Result<()> {
        let lease = self.lease.state_handle();
        if self.interrupt.sleep_unless(duration, || !lease.is_active()) {
            return Ok(());
        }
        if self.interrupt.is_triggered() {
            Err(SessionError::Interrupted)
        } else {
            Err(self.lease_error())
        }
    }

    fn teardown(&mut self) -> TeardownReport {
        if self.torn_down {
            return TeardownReport::skipped();
        }
        self.torn_down = true;
        info!(phase = %self.phase, "Session teardown started");

        let stop = if !self.stand_requested {
            StepOutcome::Skipped
        } else if !self.lease.is_active() {
            warn!(lease = %self.lease.state(), "Lease not active, skipping sit command");
            StepOutcome::Skipped
        } else {
            self.phase = SessionPhase::Sitting;
            let deadline = self.config.motion.teardown_command_deadline();
            match self.dispatcher.dispatch(MotionCommand::Sit, deadline) {
                Ok(receipt) => {
                    info!(command_id = receipt.command_id, "Sit command sent");
                    self.stand_requested = false;
                    StepOutcome::Completed
                },
                Err(e) => {
                    warn!(error = %e, "Sit command failed during teardown (ignored)");
                    StepOutcome::Failed(e.to_string())
                },
            }
        };

        let power_off = if !self.power_requested {
            StepOutcome::Skipped
        } else {
            match self.link.power_off(self.config.motion.power_off_timeout()) {
                Ok(()) => {
                    info!("Robot powered off");
                    self.power_requested = false;
                    self.phase = SessionPhase::PoweredOff;
                    StepOutcome::Completed
                },
                Err(e) => {
                    warn!(error = %e, "Power off failed during teardown (ignored)");
                    StepOutcome::Failed(e.to_string())
                },
            }
        };

        let release = match self.lease.release() {
            Ok(()) => StepOutcome::Completed,
            Err(e) => StepOutcome::Failed(e.to_string()),
        };
        self.phase = SessionPhase::LeaseReleased;

        let report = TeardownReport {
            stop,
            power_off,
            release,
        };
        self.phase = SessionPhase::Done;
        if report.is_clean() {
            info!(?report, "Session teardown finished");
        } else {
            warn!(?report, "Session teardown finished with failures");
        }
        report
    }
}

impl Drop for SessionCore {
    fn drop(&mut self) {
        if !self.torn_down {
            if std::thread::panicking() {
                error!(phase = %self.phase, "Session dropped during panic, tearing down");
            }
            self.teardown();
        }
    }
}

// ==================== 会话句柄 ====================

/// 控制会话
///
/// # 类型参数
///
/// - `State`: 当前阶段（`LeaseAcquired`, `PoweredOn`, `Standing`）
///
/// 状态转换消耗 `self`；转换失败时旧句柄被丢弃，收尾随即执行。
pub struct SessionHandle<State = LeaseAcquired> {
    pub(crate) core: SessionCore,
    pub(crate) _state: State,
}

impl<State> SessionHandle<State> {
    fn into_state<Next>(self, next: Next, phase: SessionPhase) -> SessionHandle<Next> {
        let mut core = self.core;
        core.phase = phase;
        info!(phase = %phase, "Session phase changed");
        SessionHandle { core, _state: next }
    }

    /// 发送一条指令
    ///
    /// `duration` 为 `Some` 时指令在该时长后（按机器人时钟）失效；`None` 时一直保持。
    ///
    /// # 错误
    ///
    /// - `Interrupted`: 已收到中断，指令未发送
    /// - `LeaseLost`: 租约已丢失
    /// - `Driver(CommandRejected)`: 重新同步时钟后仍被判定过期
    pub fn dispatch(
        &self,
        payload: MotionCommand,
        duration: Option<Duration>,
    ) -> Result<CommandReceipt> {
        self.core.dispatch(payload, duration)
    }

    /// 等待 `duration`；中断或租约丢失时提前返回错误
    pub fn hold(&self, duration: Duration) -> Result<()> {
        self.core.hold(duration)
    }

    /// 读取机器人状态（不需要租约）
    pub fn robot_state(&self) -> Result<RobotState> {
        Ok(self.core.link.get_state()?)
    }

    pub fn phase(&self) -> SessionPhase {
        self.core.phase
    }

    pub fn lease_state(&self) -> LeaseState {
        self.core.lease.state()
    }

    pub fn lease_events(&self) -> Receiver<LeaseEvent> {
        self.core.lease.events()
    }

    pub fn heartbeat_stats(&self) -> HeartbeatStats {
        self.core.lease.stats()
    }

    pub fn clock_offset(&self) -> ClockOffset {
        self.core.clock.offset()
    }

    pub fn interrupt(&self) -> &InterruptSignal {
        &self.core.interrupt
    }

    pub fn config(&self) -> &SessionConfig {
        &self.core.config
    }

    /// 立即执行收尾流程
    ///
    /// 幂等：第二次调用不会访问机器人，返回全部为 `Skipped` 的报告。
    pub fn end(&mut self) -> TeardownReport {
        self.core.teardown()
    }
}

impl SessionHandle<LeaseAcquired> {
    /// 上电
    pub fn power_on(mut self) -> Result<SessionHandle<PoweredOn>> {
        self.core.check_interrupt()?;
        self.core.power_requested = true;
        let timeout = self.core.config.motion.power_on_timeout();
        info!(timeout_ms = timeout.as_millis() as u64, "Powering on");
        self.core.blocking(|link| link.power_on(timeout))?;
        Ok(self.into_state(PoweredOn, SessionPhase::PoweredOn))
    }
}

impl SessionHandle<PoweredOn> {
    /// 站立（阻塞直到完成或超时）
    pub fn stand(mut self) -> Result<SessionHandle<Standing>> {
        self.core.check_interrupt()?;
        self.core.stand_requested = true;
        let timeout = self.core.config.motion.stand_timeout();
        info!(timeout_ms = timeout.as_millis() as u64, "Standing up");
        self.core.blocking(|link| link.blocking_stand(timeout))?;
        Ok(self.into_state(Standing, SessionPhase::Standing))
    }

    /// 下电，回到仅持有租约的状态
    ///
    /// 收尾方向的转换不检查中断。
    pub fn power_off(mut self) -> Result<SessionHandle<LeaseAcquired>> {
        let timeout = self.core.config.motion.power_off_timeout();
        info!(timeout_ms = timeout.as_millis() as u64, "Powering off");
        self.core.blocking(|link| link.power_off(timeout))?;
        self.core.power_requested = false;
        Ok(self.into_state(LeaseAcquired, SessionPhase::PoweredOff))
    }
}

impl SessionHandle<Standing> {
    /// 坐下（阻塞直到完成或超时）
    ///
    /// 收尾方向的转换不检查中断。
    pub fn sit(mut self) -> Result<SessionHandle<PoweredOn>> {
        self.core.phase = SessionPhase::Sitting;
        let timeout = self.core.config.motion.sit_timeout();
        info!(timeout_ms = timeout.as_millis() as u64, "Sitting down");
        self.core.blocking(|link| link.blocking_sit(timeout))?;
        self.core.stand_requested = false;
        Ok(self.into_state(PoweredOn, SessionPhase::PoweredOn))
    }
}

impl MotionSink for SessionHandle<Standing> {
    fn send(&self, payload: MotionCommand, deadline: Duration) -> Result<()> {
        self.dispatch(payload, Some(deadline)).map(|_| ())
    }

    fn wait(&self, duration: Duration) -> Result<()> {
        self.hold(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_type_sizes() {
        assert_eq!(std::mem::size_of::<LeaseAcquired>(), 0);
        assert_eq!(std::mem::size_of::<PoweredOn>(), 0);
        assert_eq!(std::mem::size_of::<Standing>(), 0);
    }

    #[test]
    fn test_report_cleanliness() {
        assert!(TeardownReport::skipped().is_clean());
        let report = TeardownReport {
            stop: StepOutcome::Failed("connection reset".into()),
            power_off: StepOutcome::Completed,
            release: StepOutcome::Completed,
        };
        assert!(!report.is_clean());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(SessionPhase::LeaseAcquired.to_string(), "lease_acquired");
        assert_eq!(SessionPhase::Done.to_string(), "done");
    }
}
