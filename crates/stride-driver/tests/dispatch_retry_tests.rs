//! 截止时间调度与过期重试集成测试（模拟机器人）

use std::sync::Arc;
use std::time::Duration;
use stride_driver::{
    ClockSync, ClockSyncConfig, ControlLease, DeadlineDispatcher, DispatchConfig, DriverError,
    LeaseConfig, LeaseState,
};
use stride_link::{Credentials, LinkError, RobotLink, SharedLink, SimConfig, SimulatedRobot};
use stride_protocol::{ClockSkew, MotionCommand, unix_nanos};

struct Rig {
    robot: SimulatedRobot,
    lease: ControlLease,
    dispatcher: DeadlineDispatcher,
}

fn rig(sim: SimConfig) -> Rig {
    rig_with(sim, DispatchConfig::default())
}

fn rig_with(sim: SimConfig, dispatch: DispatchConfig) -> Rig {
    let robot = SimulatedRobot::new(sim);
    robot.authenticate(&Credentials::new("operator", "pw")).unwrap();
    let link: SharedLink = Arc::new(robot.clone());

    let clock = Arc::new(ClockSync::new(link.clone(), ClockSyncConfig::default()));
    clock.sync().unwrap();
    let lease = ControlLease::acquire(link.clone(), LeaseConfig::default()).unwrap();
    link.power_on(Duration::from_secs(1)).unwrap();
    let dispatcher = DeadlineDispatcher::new(
        link,
        clock,
        lease.state_handle(),
        &dispatch,
    );
    Rig {
        robot,
        lease,
        dispatcher,
    }
}

#[test]
fn test_deadline_uses_robot_clock() {
    let rig = rig(SimConfig::instant().with_clock_offset(ClockSkew::from_secs(3)));

    let receipt = rig.dispatcher.dispatch(MotionCommand::Stand, Duration::from_secs(4)).unwrap();
    assert_eq!(receipt.attempts, 1);

    let sent = rig.robot.commands();
    assert_eq!(sent.len(), 1);
    let deadline = sent[0].deadline.unwrap();
    assert_eq!(
        deadline.as_unix_nanos() - unix_nanos(sent[0].issued_at),
        7_000_000_000
    );
    assert_eq!(receipt.deadline, Some(deadline));
}

#[test]
fn test_single_expiry_resyncs_and_resends_once() {
    let rig = rig(SimConfig::instant());
    rig.robot.expire_next_commands(1);

    let receipt = rig.dispatcher.dispatch(MotionCommand::Stand, Duration::from_secs(1)).unwrap();
    assert_eq!(receipt.attempts, 2);
    assert_eq!(rig.dispatcher.clock().sync_count(), 2);

    let sent = rig.robot.commands();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].id, sent[1].id);
    // 重发时按当前时间重新计算截止时间
    assert!(sent[1].issued_at >= sent[0].issued_at);
    assert!(sent[1].deadline.unwrap() >= sent[0].deadline.unwrap());
}

#[test]
fn test_second_expiry_is_rejected_without_third_attempt() {
    let rig = rig(SimConfig::instant());
    rig.robot.expire_next_commands(5);

    let result = rig.dispatcher.dispatch(MotionCommand::Stand, Duration::from_secs(1));
    assert!(matches!(
        result,
        Err(DriverError::CommandRejected { attempts: 2 })
    ));
    assert_eq!(rig.robot.commands().len(), 2);
    assert_eq!(rig.dispatcher.clock().sync_count(), 2);
}

#[test]
fn test_oversized_attempt_budget_still_sends_at_most_twice() {
    let rig = rig_with(SimConfig::instant(), DispatchConfig { max_attempts: 5 });
    rig.robot.expire_next_commands(4);

    let result = rig.dispatcher.dispatch(MotionCommand::Stand, Duration::from_secs(1));
    assert!(matches!(
        result,
        Err(DriverError::CommandRejected { attempts: 2 })
    ));
    assert_eq!(rig.robot.commands().len(), 2);
}

#[test]
fn test_unrepresentable_deadline_is_an_error() {
    let rig = rig(SimConfig::instant());

    let result = rig
        .dispatcher
        .dispatch(MotionCommand::Stop, Duration::from_secs(u64::MAX));
    assert!(matches!(result, Err(DriverError::InvalidDuration(_))));
    assert!(rig.robot.commands().is_empty());
    assert!(rig.lease.is_active());
}

#[test]
fn test_clock_drift_recovered_by_resync() {
    let rig = rig(SimConfig::instant());
    // 远端时钟在同步之后跳快 10s：按旧偏差算出的截止时间已过期
    rig.robot.set_clock_offset(ClockSkew::from_secs(10));

    let receipt = rig.dispatcher.dispatch(MotionCommand::Stand, Duration::from_secs(1)).unwrap();
    assert_eq!(receipt.attempts, 2);
    assert_eq!(
        rig.dispatcher.clock().offset().estimate,
        ClockSkew::from_secs(10)
    );
}

#[test]
fn test_transport_error_is_not_retried() {
    let rig = rig(SimConfig::instant());
    rig.robot.fail_next_commands(1);

    let result = rig.dispatcher.dispatch(MotionCommand::Stand, Duration::from_secs(1));
    assert!(matches!(
        result,
        Err(DriverError::Link(LinkError::Transport(_)))
    ));
    assert_eq!(rig.robot.commands().len(), 1);
    assert_eq!(rig.dispatcher.clock().sync_count(), 1);
}

#[test]
fn test_dispatch_requires_active_lease() {
    let mut rig = rig(SimConfig::instant());
    rig.lease.release().unwrap();

    let result = rig.dispatcher.dispatch(MotionCommand::Stop, Duration::from_secs(1));
    assert!(matches!(
        result,
        Err(DriverError::LeaseNotActive {
            state: LeaseState::Released
        })
    ));
    assert!(rig.robot.commands().is_empty());
}

#[test]
fn test_revoked_during_command_marks_lease_lost() {
    let rig = rig(SimConfig::instant());
    rig.robot.revoke_lease();

    let result = rig.dispatcher.dispatch(MotionCommand::Stand, Duration::from_secs(1));
    assert!(matches!(result, Err(DriverError::LeaseLost)));
    assert_eq!(rig.lease.state(), LeaseState::Lost);
}

#[test]
fn test_persistent_command_has_no_deadline() {
    let rig = rig(SimConfig::instant());
    rig.dispatcher.dispatch_persistent(MotionCommand::Stand).unwrap();

    let sent = rig.robot.commands();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].deadline.is_none());
}

#[test]
fn test_invalid_payload_never_reaches_robot() {
    let rig = rig(SimConfig::instant());
    let result = rig
        .dispatcher
        .dispatch(MotionCommand::velocity(f64::NAN, 0.0, 0.0), Duration::from_secs(1));
    assert!(matches!(result, Err(DriverError::Protocol(_))));
    assert!(rig.robot.commands().is_empty());
}
