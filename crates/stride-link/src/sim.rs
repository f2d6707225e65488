//! 模拟机器人后端
//!
//! `SimulatedRobot` 在进程内模拟远端机器人的关键行为：
//!
//! - **远端时钟**：本地时钟 + 可配置偏差，截止时间按远端时钟判定
//! - **租约超时**：超过 `lease_timeout` 没有心跳，租约被远端收回
//! - **阻塞动作**：上电/站立/坐下/断电需要一段时间，等待期间不持锁
//! - **故障注入**：过期、传输错误、心跳失败、断电失败、收回租约
//! - **调用日志**：按顺序记录最近的调用及其结果（容量有限，超出时丢弃最旧的），供测试断言
//!
//! `SimulatedRobot` 可以廉价克隆，所有克隆共享同一个机器人状态。

use crate::{Credentials, LeaseToken, LinkConnector, LinkError, RobotLink};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use stride_protocol::{
    BodyPose, BodyVelocity, ClockSkew, Command, JointState, MotionCommand, Quaternion, RobotState,
    RobotTime, Vec3, VelocityCommand,
};
use tracing::{debug, warn};

const LEG_JOINTS: [&str; 12] = [
    "fl.hx", "fl.hy", "fl.kn", "fr.hx", "fr.hy", "fr.kn", "hl.hx", "hl.hy", "hl.kn", "hr.hx",
    "hr.hy", "hr.kn",
];

/// 模拟机器人配置
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// 远端时钟相对本地时钟的偏差
    pub clock_offset: ClockSkew,
    /// 远端强制执行的租约超时
    pub lease_timeout: Duration,
    /// 一次时钟同步需要的时间
    pub sync_delay: Duration,
    pub power_on_duration: Duration,
    pub power_off_duration: Duration,
    pub stand_duration: Duration,
    pub sit_duration: Duration,
    /// 只接受这组凭据；`None` 表示接受任意凭据
    pub accepted_credentials: Option<Credentials>,
    /// 已有其他客户端持有租约
    pub foreign_holder: Option<String>,
    /// 调用日志最多保留的条数
    pub record_capacity: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            clock_offset: ClockSkew::ZERO,
            lease_timeout: Duration::from_secs(3),
            sync_delay: Duration::ZERO,
            power_on_duration: Duration::from_millis(200),
            power_off_duration: Duration::from_millis(200),
            stand_duration: Duration::from_millis(100),
            sit_duration: Duration::from_millis(100),
            accepted_credentials: None,
            foreign_holder: None,
            record_capacity: 10_000,
        }
    }
}

impl SimConfig {
    /// 所有动作瞬时完成的配置（单元测试使用）
    pub fn instant() -> Self {
        Self {
            power_on_duration: Duration::ZERO,
            power_off_duration: Duration::ZERO,
            stand_duration: Duration::ZERO,
            sit_duration: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn with_clock_offset(mut self, offset: ClockSkew) -> Self {
        self.clock_offset = offset;
        self
    }

    pub fn with_lease_timeout(mut self, timeout: Duration) -> Self {
        self.lease_timeout = timeout;
        self
    }

    pub fn with_sync_delay(mut self, delay: Duration) -> Self {
        self.sync_delay = delay;
        self
    }

    pub fn with_stand_duration(mut self, duration: Duration) -> Self {
        self.stand_duration = duration;
        self
    }

    pub fn with_power_on_duration(mut self, duration: Duration) -> Self {
        self.power_on_duration = duration;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.accepted_credentials = Some(credentials);
        self
    }

    pub fn with_foreign_holder(mut self, holder: impl Into<String>) -> Self {
        self.foreign_holder = Some(holder.into());
        self
    }

    /// 调用日志容量（至少 1）
    pub fn with_record_capacity(mut self, capacity: usize) -> Self {
        self.record_capacity = capacity.max(1);
        self
    }
}

/// 一次调用
#[derive(Debug, Clone, PartialEq)]
pub enum SimCall {
    Authenticate,
    TimeSync,
    AcquireLease { must_acquire: bool },
    Heartbeat,
    ReleaseLease,
    Command(Command),
    PowerOn,
    PowerOff,
    Stand,
    Sit,
    GetState,
}

/// 调用日志条目
#[derive(Debug, Clone)]
pub struct SimRecord {
    pub call: SimCall,
    pub result: Result<(), LinkError>,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct Faults {
    expire_commands: u32,
    fail_commands: u32,
    fail_heartbeats: bool,
    fail_power_off: bool,
    fail_time_sync: bool,
}

#[derive(Debug)]
struct HeldLease {
    token: LeaseToken,
    last_renewal: Instant,
}

#[derive(Debug)]
struct SimState {
    clock_offset: ClockSkew,
    authenticated: bool,
    lease: Option<HeldLease>,
    lease_sequence: u64,
    foreign_holder: Option<String>,
    powered: bool,
    standing: bool,
    velocity: Option<(VelocityCommand, Option<RobotTime>)>,
    position: Vec3,
    yaw: f64,
    last_integration: Instant,
    max_heartbeat_gap: Duration,
    faults: Faults,
    records: VecDeque<SimRecord>,
    record_capacity: usize,
}

impl SimState {
    fn record(&mut self, call: SimCall, result: Result<(), LinkError>) -> Result<(), LinkError> {
        while self.records.len() >= self.record_capacity {
            self.records.pop_front();
        }
        self.records.push_back(SimRecord {
            call,
            result: result.clone(),
            at: Instant::now(),
        });
        result
    }

    fn fail<T>(&mut self, call: SimCall, err: LinkError) -> Result<T, LinkError> {
        self.record(call, Err(err.clone()))?;
        Err(err)
    }

    fn remote_now(&self) -> RobotTime {
        RobotTime::from_local(SystemTime::now(), self.clock_offset)
    }

    fn require_auth(&self) -> Result<(), LinkError> {
        if self.authenticated {
            Ok(())
        } else {
            Err(LinkError::Auth("not authenticated".to_string()))
        }
    }

    /// 检查租约是否仍然有效，超时则由远端收回
    fn require_lease(&mut self, lease_timeout: Duration) -> Result<(), LinkError> {
        let Some(held) = &self.lease else {
            return Err(LinkError::LeaseRevoked);
        };
        if held.last_renewal.elapsed() > lease_timeout {
            warn!(
                token = %held.token,
                "simulated robot: lease lapsed after {:?} without heartbeat",
                held.last_renewal.elapsed()
            );
            self.lease = None;
            self.velocity = None;
            return Err(LinkError::LeaseRevoked);
        }
        Ok(())
    }

    fn integrate(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_integration).as_secs_f64();
        self.last_integration = now;

        let remote_now = self.remote_now();
        let Some((velocity, deadline)) = self.velocity else {
            return;
        };
        if deadline.is_some_and(|deadline| remote_now >= deadline) {
            self.velocity = None;
            return;
        }

        let (sin, cos) = self.yaw.sin_cos();
        self.position.x += (velocity.v_x * cos - velocity.v_y * sin) * dt;
        self.position.y += (velocity.v_x * sin + velocity.v_y * cos) * dt;
        self.yaw += velocity.v_yaw * dt;
    }

    fn joint_states(&self) -> BTreeMap<String, JointState> {
        let (hy, kn) = if self.standing { (0.8, -1.6) } else { (1.2, -2.5) };
        LEG_JOINTS
            .iter()
            .map(|name| {
                let position = if name.ends_with(".hy") {
                    hy
                } else if name.ends_with(".kn") {
                    kn
                } else {
                    0.0
                };
                (
                    name.to_string(),
                    JointState {
                        position,
                        velocity: 0.0,
                        torque: 0.0,
                    },
                )
            })
            .collect()
    }
}

struct SimShared {
    config: SimConfig,
    state: Mutex<SimState>,
}

/// 进程内模拟机器人
#[derive(Clone)]
pub struct SimulatedRobot {
    shared: Arc<SimShared>,
}

impl SimulatedRobot {
    pub fn new(config: SimConfig) -> Self {
        let state = SimState {
            clock_offset: config.clock_offset,
            authenticated: false,
            lease: None,
            lease_sequence: 0,
            foreign_holder: config.foreign_holder.clone(),
            powered: false,
            standing: false,
            velocity: None,
            position: Vec3::ZERO,
            yaw: 0.0,
            last_integration: Instant::now(),
            max_heartbeat_gap: Duration::ZERO,
            faults: Faults::default(),
            records: VecDeque::new(),
            record_capacity: config.record_capacity.max(1),
        };
        Self {
            shared: Arc::new(SimShared {
                config,
                state: Mutex::new(state),
            }),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.shared.config
    }

    // ==================== 故障注入 ====================

    /// 接下来 `count` 条指令无论截止时间如何都返回 `Expired`
    pub fn expire_next_commands(&self, count: u32) {
        self.shared.state.lock().faults.expire_commands = count;
    }

    /// 接下来 `count` 条指令返回传输错误
    pub fn fail_next_commands(&self, count: u32) {
        self.shared.state.lock().faults.fail_commands = count;
    }

    pub fn set_heartbeat_failure(&self, failing: bool) {
        self.shared.state.lock().faults.fail_heartbeats = failing;
    }

    pub fn set_power_off_failure(&self, failing: bool) {
        self.shared.state.lock().faults.fail_power_off = failing;
    }

    pub fn set_time_sync_failure(&self, failing: bool) {
        self.shared.state.lock().faults.fail_time_sync = failing;
    }

    /// 远端时钟跳变（模拟时钟漂移）
    pub fn set_clock_offset(&self, offset: ClockSkew) {
        self.shared.state.lock().clock_offset = offset;
    }

    /// 远端主动收回租约（例如被平板抢占）
    pub fn revoke_lease(&self) {
        let mut state = self.shared.state.lock();
        state.lease = None;
        state.velocity = None;
    }

    // ==================== 观察 ====================

    pub fn records(&self) -> Vec<SimRecord> {
        self.shared.state.lock().records.iter().cloned().collect()
    }

    /// 清空调用日志（长时间运行时释放内存，或在测试中划分阶段）
    pub fn clear_records(&self) {
        self.shared.state.lock().records.clear();
    }

    pub fn calls(&self) -> Vec<SimCall> {
        self.shared
            .state
            .lock()
            .records
            .iter()
            .map(|record| record.call.clone())
            .collect()
    }

    /// 除心跳以外的调用（心跳的数量取决于时序，断言顺序时通常要过滤掉）
    pub fn foreground_calls(&self) -> Vec<SimCall> {
        self.calls().into_iter().filter(|call| *call != SimCall::Heartbeat).collect()
    }

    /// 收到的全部指令（包括被拒绝的）
    pub fn commands(&self) -> Vec<Command> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SimCall::Command(command) => Some(command),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&SimCall) -> bool) -> usize {
        self.shared.state.lock().records.iter().filter(|r| predicate(&r.call)).count()
    }

    pub fn successful_heartbeats(&self) -> usize {
        self.shared
            .state
            .lock()
            .records
            .iter()
            .filter(|r| r.call == SimCall::Heartbeat && r.result.is_ok())
            .count()
    }

    /// 两次成功续约之间的最大间隔（获取租约视为第一次续约）
    pub fn max_heartbeat_gap(&self) -> Duration {
        self.shared.state.lock().max_heartbeat_gap
    }

    pub fn lease_held(&self) -> bool {
        self.shared.state.lock().lease.is_some()
    }

    pub fn is_powered(&self) -> bool {
        self.shared.state.lock().powered
    }

    pub fn is_standing(&self) -> bool {
        self.shared.state.lock().standing
    }

    /// 阻塞动作：检查前置条件后释放锁等待，再回写结果
    fn timed_action(
        &self,
        call: SimCall,
        duration: Duration,
        timeout: Duration,
        precheck: impl FnOnce(&mut SimState, &SimConfig) -> Result<(), LinkError>,
        apply: impl FnOnce(&mut SimState),
    ) -> Result<(), LinkError> {
        {
            let mut state = self.shared.state.lock();
            if let Err(e) = precheck(&mut state, &self.shared.config) {
                return state.record(call, Err(e));
            }
        }

        std::thread::sleep(duration.min(timeout));

        let mut state = self.shared.state.lock();
        if duration > timeout {
            return state.record(call, Err(LinkError::Timeout));
        }
        apply(&mut state);
        state.record(call, Ok(()))
    }
}

impl RobotLink for SimulatedRobot {
    fn authenticate(&self, credentials: &Credentials) -> Result<(), LinkError> {
        let mut state = self.shared.state.lock();
        let result = match &self.shared.config.accepted_credentials {
            Some(accepted) if accepted != credentials => Err(LinkError::Auth(format!(
                "invalid username or password for `{}`",
                credentials.username
            ))),
            _ => {
                state.authenticated = true;
                Ok(())
            },
        };
        state.record(SimCall::Authenticate, result)
    }

    fn time_sync(&self, timeout: Duration) -> Result<ClockSkew, LinkError> {
        let (failing, delay) = {
            let state = self.shared.state.lock();
            (state.faults.fail_time_sync, self.shared.config.sync_delay)
        };

        let timed_out = failing || delay > timeout;
        std::thread::sleep(if timed_out { timeout } else { delay });

        let mut state = self.shared.state.lock();
        let result = if timed_out {
            Err(LinkError::Timeout)
        } else {
            state.require_auth()
        };
        let offset = state.clock_offset;
        state.record(SimCall::TimeSync, result).map(|()| offset)
    }

    fn acquire_lease(
        &self,
        must_acquire: bool,
        _timeout: Duration,
    ) -> Result<LeaseToken, LinkError> {
        let mut state = self.shared.state.lock();
        let call = SimCall::AcquireLease { must_acquire };

        if let Err(e) = state.require_auth() {
            return state.fail(call, e);
        }
        if let Some(holder) = state.foreign_holder.clone() {
            if must_acquire {
                let err = LinkError::LeaseUnavailable { holder };
                return state.fail(call, err);
            }
            debug!(%holder, "simulated robot: lease taken from foreign holder");
            state.foreign_holder = None;
        }

        state.lease_sequence += 1;
        let token = LeaseToken {
            resource: "body".to_string(),
            sequence: state.lease_sequence,
        };
        state.lease = Some(HeldLease {
            token: token.clone(),
            last_renewal: Instant::now(),
        });
        state.record(call, Ok(()))?;
        Ok(token)
    }

    fn heartbeat(&self, lease: &LeaseToken) -> Result<(), LinkError> {
        let mut state = self.shared.state.lock();
        if state.faults.fail_heartbeats {
            return state.record(
                SimCall::Heartbeat,
                Err(LinkError::Transport("heartbeat dropped".to_string())),
            );
        }
        if let Err(e) = state.require_lease(self.shared.config.lease_timeout) {
            return state.record(SimCall::Heartbeat, Err(e));
        }

        let now = Instant::now();
        let renewed = state.lease.as_mut().filter(|held| held.token == *lease).map(|held| {
            let gap = now.duration_since(held.last_renewal);
            held.last_renewal = now;
            gap
        });
        let Some(gap) = renewed else {
            return state.record(SimCall::Heartbeat, Err(LinkError::LeaseRevoked));
        };
        state.max_heartbeat_gap = state.max_heartbeat_gap.max(gap);
        state.record(SimCall::Heartbeat, Ok(()))
    }

    fn release_lease(&self, lease: &LeaseToken) -> Result<(), LinkError> {
        let mut state = self.shared.state.lock();
        let held = state.lease.as_ref().is_some_and(|held| held.token == *lease);
        let result = if held {
            state.lease = None;
            state.velocity = None;
            Ok(())
        } else {
            Err(LinkError::LeaseRevoked)
        };
        state.record(SimCall::ReleaseLease, result)
    }

    fn command(&self, command: &Command) -> Result<(), LinkError> {
        let mut state = self.shared.state.lock();
        let call = SimCall::Command(command.clone());

        if let Err(e) = state.require_lease(self.shared.config.lease_timeout) {
            return state.record(call, Err(e));
        }
        if state.faults.expire_commands > 0 {
            state.faults.expire_commands -= 1;
            return state.record(call, Err(LinkError::Expired));
        }
        if state.faults.fail_commands > 0 {
            state.faults.fail_commands -= 1;
            return state.record(
                call,
                Err(LinkError::Transport("connection reset".to_string())),
            );
        }
        let remote_now = state.remote_now();
        if command.deadline.is_some_and(|deadline| deadline <= remote_now) {
            debug!(
                id = command.id,
                "simulated robot: command deadline already passed on robot clock"
            );
            return state.record(call, Err(LinkError::Expired));
        }
        if !state.powered {
            return state.record(call, Err(LinkError::Rejected("robot is not powered".into())));
        }

        state.integrate();
        match &command.payload {
            MotionCommand::Sit => {
                state.standing = false;
                state.velocity = None;
            },
            MotionCommand::Stand => state.standing = true,
            MotionCommand::Stop => state.velocity = None,
            MotionCommand::ArmPose(_) => {},
            payload @ (MotionCommand::Velocity { .. } | MotionCommand::Synchro { .. }) => {
                if !state.standing {
                    return state.record(
                        call,
                        Err(LinkError::Rejected("robot is not standing".into())),
                    );
                }
                state.velocity = payload.base_velocity().map(|v| (v, command.deadline));
            },
        }
        state.record(call, Ok(()))
    }

    fn power_on(&self, timeout: Duration) -> Result<(), LinkError> {
        self.timed_action(
            SimCall::PowerOn,
            self.shared.config.power_on_duration,
            timeout,
            |state, config| state.require_lease(config.lease_timeout),
            |state| state.powered = true,
        )
    }

    fn power_off(&self, timeout: Duration) -> Result<(), LinkError> {
        self.timed_action(
            SimCall::PowerOff,
            self.shared.config.power_off_duration,
            timeout,
            |state, config| {
                if state.faults.fail_power_off {
                    return Err(LinkError::Transport("power service unavailable".into()));
                }
                state.require_lease(config.lease_timeout)
            },
            |state| {
                state.powered = false;
                state.standing = false;
                state.velocity = None;
            },
        )
    }

    fn blocking_stand(&self, timeout: Duration) -> Result<(), LinkError> {
        self.timed_action(
            SimCall::Stand,
            self.shared.config.stand_duration,
            timeout,
            |state, config| {
                state.require_lease(config.lease_timeout)?;
                if state.powered {
                    Ok(())
                } else {
                    Err(LinkError::Rejected("robot is not powered".into()))
                }
            },
            |state| state.standing = true,
        )
    }

    fn blocking_sit(&self, timeout: Duration) -> Result<(), LinkError> {
        self.timed_action(
            SimCall::Sit,
            self.shared.config.sit_duration,
            timeout,
            |state, config| state.require_lease(config.lease_timeout),
            |state| {
                state.standing = false;
                state.velocity = None;
            },
        )
    }

    fn get_state(&self) -> Result<RobotState, LinkError> {
        let mut state = self.shared.state.lock();
        if let Err(e) = state.require_auth() {
            return state.fail(SimCall::GetState, e);
        }
        state.integrate();

        let velocity = state.velocity.map(|(v, _)| v).unwrap_or(VelocityCommand::ZERO);
        let (sin, cos) = state.yaw.sin_cos();
        let snapshot = RobotState {
            body_pose_vision: BodyPose {
                position: state.position,
                rotation: Quaternion::from_yaw(state.yaw),
            },
            body_velocity: BodyVelocity {
                linear: Vec3::new(
                    velocity.v_x * cos - velocity.v_y * sin,
                    velocity.v_x * sin + velocity.v_y * cos,
                    0.0,
                ),
                angular: Vec3::new(0.0, 0.0, velocity.v_yaw),
            },
            joint_states: state.joint_states(),
        };
        state.record(SimCall::GetState, Ok(()))?;
        Ok(snapshot)
    }
}

/// 总是连接到同一个模拟机器人的 connector
#[derive(Clone)]
pub struct SimConnector {
    robot: SimulatedRobot,
}

impl SimConnector {
    pub fn new(config: SimConfig) -> Self {
        Self {
            robot: SimulatedRobot::new(config),
        }
    }

    pub fn from_robot(robot: SimulatedRobot) -> Self {
        Self { robot }
    }

    pub fn robot(&self) -> &SimulatedRobot {
        &self.robot
    }
}

impl LinkConnector for SimConnector {
    type Link = SimulatedRobot;

    fn connect(&self, address: &str) -> Result<SimulatedRobot, LinkError> {
        if address.trim().is_empty() {
            return Err(LinkError::Transport("empty robot address".to_string()));
        }
        debug!(%address, "connected to simulated robot");
        Ok(self.robot.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authed(config: SimConfig) -> SimulatedRobot {
        let robot = SimulatedRobot::new(config);
        robot.authenticate(&Credentials::new("user", "pw")).unwrap();
        robot
    }

    fn command(payload: MotionCommand, deadline: Option<RobotTime>) -> Command {
        Command {
            id: 1,
            payload,
            issued_at: SystemTime::now(),
            deadline,
        }
    }

    #[test]
    fn test_rejects_wrong_credentials() {
        let robot =
            SimulatedRobot::new(SimConfig::instant().with_credentials(Credentials::new("a", "b")));
        let err = robot.authenticate(&Credentials::new("a", "wrong")).unwrap_err();
        assert!(matches!(err, LinkError::Auth(_)));
        assert!(robot.get_state().is_err());
    }

    #[test]
    fn test_time_sync_reports_offset() {
        let robot = authed(SimConfig::instant().with_clock_offset(ClockSkew::from_secs(3)));
        let skew = robot.time_sync(Duration::from_secs(1)).unwrap();
        assert_eq!(skew, ClockSkew::from_secs(3));
    }

    #[test]
    fn test_time_sync_timeout() {
        let robot = authed(SimConfig::instant().with_sync_delay(Duration::from_millis(50)));
        let err = robot.time_sync(Duration::from_millis(5)).unwrap_err();
        assert_eq!(err, LinkError::Timeout);
    }

    #[test]
    fn test_foreign_holder_blocks_must_acquire() {
        let robot = authed(SimConfig::instant().with_foreign_holder("tablet"));
        let err = robot.acquire_lease(true, Duration::from_secs(1)).unwrap_err();
        assert_eq!(
            err,
            LinkError::LeaseUnavailable {
                holder: "tablet".into()
            }
        );

        // 允许抢占时可以拿到租约
        assert!(robot.acquire_lease(false, Duration::from_secs(1)).is_ok());
        assert!(robot.lease_held());
    }

    #[test]
    fn test_lease_lapses_without_heartbeat() {
        let robot = authed(SimConfig::instant().with_lease_timeout(Duration::from_millis(30)));
        let token = robot.acquire_lease(true, Duration::from_secs(1)).unwrap();
        assert!(robot.heartbeat(&token).is_ok());

        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(robot.heartbeat(&token), Err(LinkError::LeaseRevoked));
        assert!(!robot.lease_held());
    }

    #[test]
    fn test_deadline_checked_against_robot_clock() {
        // 远端时钟领先 3s：按本地时间 + 2s 计算的截止时间在远端看来已过期
        let robot = authed(SimConfig::instant().with_clock_offset(ClockSkew::from_secs(3)));
        robot.acquire_lease(true, Duration::from_secs(1)).unwrap();
        robot.power_on(Duration::from_secs(1)).unwrap();

        let local_deadline =
            RobotTime::from_local(SystemTime::now() + Duration::from_secs(2), ClockSkew::ZERO);
        assert_eq!(
            robot.command(&command(MotionCommand::Stand, Some(local_deadline))),
            Err(LinkError::Expired)
        );

        let remote_deadline = RobotTime::from_local(
            SystemTime::now() + Duration::from_secs(2),
            ClockSkew::from_secs(3),
        );
        assert!(robot.command(&command(MotionCommand::Stand, Some(remote_deadline))).is_ok());
        assert!(robot.is_standing());
    }

    #[test]
    fn test_velocity_requires_standing() {
        let robot = authed(SimConfig::instant());
        robot.acquire_lease(true, Duration::from_secs(1)).unwrap();
        robot.power_on(Duration::from_secs(1)).unwrap();
        let result = robot.command(&command(MotionCommand::velocity(0.4, 0.0, 0.0), None));
        assert!(matches!(result, Err(LinkError::Rejected(_))));
    }

    #[test]
    fn test_blocking_action_times_out() {
        let robot = authed(SimConfig::instant().with_power_on_duration(Duration::from_millis(50)));
        robot.acquire_lease(true, Duration::from_secs(1)).unwrap();
        assert_eq!(
            robot.power_on(Duration::from_millis(5)),
            Err(LinkError::Timeout)
        );
        assert!(!robot.is_powered());
    }

    #[test]
    fn test_injected_faults_are_consumed() {
        let robot = authed(SimConfig::instant());
        robot.acquire_lease(true, Duration::from_secs(1)).unwrap();
        robot.power_on(Duration::from_secs(1)).unwrap();
        robot.expire_next_commands(1);

        assert_eq!(
            robot.command(&command(MotionCommand::Stop, None)),
            Err(LinkError::Expired)
        );
        assert!(robot.command(&command(MotionCommand::Stop, None)).is_ok());
        assert_eq!(robot.commands().len(), 2);
    }

    #[test]
    fn test_connector_rejects_empty_address() {
        let connector = SimConnector::new(SimConfig::instant());
        assert!(connector.connect("").is_err());
        assert!(connector.connect("192.168.80.3").is_ok());
    }

    #[test]
    fn test_record_log_keeps_most_recent_calls() {
        let robot = authed(SimConfig::instant().with_record_capacity(3));
        robot.time_sync(Duration::from_secs(1)).unwrap();
        for _ in 0..5 {
            robot.get_state().unwrap();
        }

        let records = robot.records();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.call == SimCall::GetState));
        assert_eq!(robot.count(|c| *c == SimCall::Authenticate), 0);

        robot.clear_records();
        assert!(robot.records().is_empty());
        robot.get_state().unwrap();
        assert_eq!(robot.calls(), vec![SimCall::GetState]);
    }
}
