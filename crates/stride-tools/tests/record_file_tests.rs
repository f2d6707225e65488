//! 状态日志文件读写测试

use chrono::{TimeZone, Utc};
use std::collections::BTreeMap;
use std::io::Write;
use std::time::Duration;
use stride_protocol::{BodyPose, BodyVelocity, JointState, Quaternion, RobotState, Vec3};
use stride_tools::{
    StateRecord, StateRecordWriter, VelocityLimits, estimate_velocity, read_records,
};
use tempfile::NamedTempFile;

fn state_at(x: f64, yaw: f64) -> RobotState {
    let mut joint_states = BTreeMap::new();
    joint_states.insert(
        "fl.kn".to_string(),
        JointState {
            position: -1.6,
            velocity: 0.0,
            torque: 3.5,
        },
    );
    RobotState {
        body_pose_vision: BodyPose {
            position: Vec3::new(x, 0.0, 0.45),
            rotation: Quaternion::from_yaw(yaw),
        },
        body_velocity: BodyVelocity::default(),
        joint_states,
    }
}

#[test]
fn test_written_log_is_readable_for_replay() {
    let file = NamedTempFile::new().unwrap();
    let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();

    let mut writer = StateRecordWriter::create(file.path()).unwrap();
    for i in 0..3 {
        let record = StateRecord::from_state(
            t0 + chrono::Duration::milliseconds(100 * i),
            &state_at(0.04 * i as f64, 0.0),
        );
        writer.write(&record).unwrap();
    }
    assert_eq!(writer.records_written(), 3);
    drop(writer);

    let records = read_records(file.path()).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[2].timestamp, t0 + chrono::Duration::milliseconds(200));
    assert_eq!(records[1].joint_states["fl.kn"].torque, 3.5);

    let estimate = estimate_velocity(
        &records[0].pose_sample(),
        &records[1].pose_sample(),
        Duration::from_millis(100),
        &VelocityLimits::default(),
    );
    assert!((estimate.command.v_x - 0.4).abs() < 1e-9);
}

#[test]
fn test_each_line_is_one_json_object() {
    let file = NamedTempFile::new().unwrap();
    let mut writer = StateRecordWriter::create(file.path()).unwrap();
    writer.write(&StateRecord::from_state(Utc::now(), &state_at(1.0, 0.3))).unwrap();
    writer.write(&StateRecord::from_state(Utc::now(), &state_at(2.0, 0.3))).unwrap();
    drop(writer);

    let text = std::fs::read_to_string(file.path()).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    for line in lines {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(value["body_pose_vision_frame"]["rotation"]["w"].is_number());
        assert!(value["timestamp"].as_str().unwrap().ends_with('Z'));
    }
}

#[test]
fn test_read_rejects_corrupt_line() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "not json").unwrap();
    let err = read_records(file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("第 1 行"));
}

#[test]
fn test_read_missing_file_fails_with_path() {
    let err = read_records("/nonexistent/stride/log.jsonl").unwrap_err();
    assert!(format!("{err:#}").contains("/nonexistent/stride/log.jsonl"));
}
