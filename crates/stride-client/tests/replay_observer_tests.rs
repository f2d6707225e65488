//! 回放与状态记录集成测试（模拟机器人）

use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;
use stride_client::{
    InterruptSignal, ObserverConfig, ReplayConfig, ReplayEngine, SessionConfig, StateLogger,
    run_session,
};
use stride_driver::ClockSyncConfig;
use stride_link::{Credentials, SimCall, SimConfig, SimConnector};
use stride_protocol::{ClockSkew, MotionCommand, Quaternion, Vec3, unix_nanos};
use stride_tools::{PoseSample, StateRecordWriter, read_records};

const ADDRESS: &str = "192.168.80.3";

fn credentials() -> Credentials {
    Credentials::new("operator", "pw")
}

fn walk_samples(count: usize) -> Vec<PoseSample> {
    let start = Utc::now();
    (0..count)
        .map(|i| PoseSample {
            timestamp: start + ChronoDuration::milliseconds(100 * i as i64),
            position: Vec3::new(0.02 * i as f64, 0.0, 0.0),
            orientation: Quaternion::IDENTITY,
        })
        .collect()
}

#[test]
fn test_replay_sends_velocity_commands_then_stop() {
    let connector = SimConnector::new(SimConfig::instant());
    let robot = connector.robot().clone();
    let engine = ReplayEngine::new(ReplayConfig {
        period_ms: 10,
        ..ReplayConfig::default()
    });
    let samples = walk_samples(5);

    let stats = run_session(
        ADDRESS,
        &credentials(),
        SessionConfig::default(),
        &connector,
        |session| engine.run(&*session, &samples),
    )
    .unwrap();
    assert_eq!(stats.commands, 4);

    let commands = robot.commands();
    assert_eq!(commands.len(), 5);
    for command in &commands[..4] {
        assert!(matches!(command.payload, MotionCommand::Velocity { .. }));
        let deadline = command.deadline.unwrap();
        assert_eq!(
            deadline.as_unix_nanos() - unix_nanos(command.issued_at),
            200_000_000
        );
    }
    assert_eq!(commands[4].payload, MotionCommand::Stop);
    assert_eq!(
        commands[4].deadline.unwrap().as_unix_nanos() - unix_nanos(commands[4].issued_at),
        500_000_000
    );
    assert!(!robot.lease_held());
}

#[test]
fn test_replay_deadlines_follow_robot_clock() {
    let connector =
        SimConnector::new(SimConfig::instant().with_clock_offset(ClockSkew::from_secs(3)));
    let robot = connector.robot().clone();
    let engine = ReplayEngine::new(ReplayConfig {
        period_ms: 10,
        ..ReplayConfig::default()
    });

    run_session(
        ADDRESS,
        &credentials(),
        SessionConfig::default(),
        &connector,
        |session| engine.run(&*session, &walk_samples(2)),
    )
    .unwrap();

    let first = &robot.commands()[0];
    assert_eq!(
        first.deadline.unwrap().as_unix_nanos() - unix_nanos(first.issued_at),
        3_200_000_000
    );
}

#[test]
fn test_state_logger_writes_one_line_per_sample() {
    let connector = SimConnector::new(SimConfig::instant());
    let robot = connector.robot().clone();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("spot_state_log.jsonl");

    let logger = StateLogger::connect(
        &connector,
        ADDRESS,
        &credentials(),
        ClockSyncConfig::default(),
        ObserverConfig {
            period_ms: 5,
            error_backoff_ms: 5,
            max_samples: Some(3),
        },
    )
    .unwrap();
    assert!(logger.clock_offset().synced);

    let mut writer = StateRecordWriter::create(&path).unwrap();
    let stats = logger.run(&mut writer).unwrap();
    drop(writer);
    assert_eq!(stats.samples, 3);
    assert_eq!(stats.errors, 0);

    let records = read_records(&path).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].joint_states.len(), 12);
    assert!(records[0].timestamp <= records[2].timestamp);

    // 只读：不获取租约
    assert_eq!(robot.count(|c| matches!(c, SimCall::AcquireLease { .. })), 0);
}

#[test]
fn test_state_logger_stops_on_interrupt() {
    let connector = SimConnector::new(SimConfig::instant());
    let interrupt = InterruptSignal::new();
    let logger = StateLogger::connect(
        &connector,
        ADDRESS,
        &credentials(),
        ClockSyncConfig::default(),
        ObserverConfig {
            period_ms: 5,
            ..ObserverConfig::default()
        },
    )
    .unwrap()
    .with_interrupt(interrupt.clone());

    let trigger = interrupt.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(60));
        trigger.trigger();
    });

    let mut writer = StateRecordWriter::new(Vec::new());
    let stats = logger.run(&mut writer).unwrap();
    handle.join().unwrap();
    assert!(stats.samples >= 1);
    assert_eq!(stats.samples, writer.records_written());
}
