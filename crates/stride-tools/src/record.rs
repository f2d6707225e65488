//! # 状态日志格式
//!
//! JSON lines：每行一个 JSON 对象，对应一次状态采样。
//!
//! ```text
//! {"timestamp":"2025-01-01T12:00:00.100000Z",
//!  "body_pose_vision_frame":{"position":{"x":..,"y":..,"z":..},
//!                            "rotation":{"w":..,"x":..,"y":..,"z":..}},
//!  "body_velocity":{"linear":{..},"angular":{..}},
//!  "joint_states":{"fl.hx":{"position":..,"velocity":..,"torque":..}, ...}}
//! ```
//!
//! 写入时时间戳为带 `Z` 的 RFC 3339 UTC；读取时同时接受不带时区的 ISO 8601
//! （按 UTC 解释），兼容旧日志。

use crate::kinematics::PoseSample;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use stride_protocol::{BodyPose, BodyVelocity, JointState, RobotState};

/// 一条状态记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    #[serde(with = "iso_utc")]
    pub timestamp: DateTime<Utc>,
    pub body_pose_vision_frame: BodyPose,
    pub body_velocity: BodyVelocity,
    #[serde(default)]
    pub joint_states: BTreeMap<String, JointState>,
}

impl StateRecord {
    pub fn from_state(timestamp: DateTime<Utc>, state: &RobotState) -> Self {
        Self {
            timestamp,
            body_pose_vision_frame: state.body_pose_vision,
            body_velocity: state.body_velocity,
            joint_states: state.joint_states.clone(),
        }
    }

    pub fn pose_sample(&self) -> PoseSample {
        PoseSample {
            timestamp: self.timestamp,
            position: self.body_pose_vision_frame.position,
            orientation: self.body_pose_vision_frame.rotation,
        }
    }
}

mod iso_utc {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let text = String::deserialize(deserializer)?;
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&text) {
            return Ok(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|e| de::Error::custom(format!("invalid timestamp `{text}`: {e}")))
    }
}

/// 状态日志写入器
///
/// 每写一行立即 flush，进程被中断时已写入的记录不会丢失。
pub struct StateRecordWriter<W: Write> {
    inner: W,
    written: u64,
}

impl StateRecordWriter<BufWriter<File>> {
    /// 创建（覆盖）日志文件
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("创建状态日志失败: {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> StateRecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    pub fn write(&mut self, record: &StateRecord) -> Result<()> {
        serde_json::to_writer(&mut self.inner, record).context("序列化状态记录失败")?;
        self.inner.write_all(b"\n").context("写入状态日志失败")?;
        self.inner.flush().context("刷新状态日志失败")?;
        self.written += 1;
        Ok(())
    }

    pub fn records_written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// 从 reader 解析所有记录
///
/// 跳过空行；解析失败时报告从 1 开始的行号。
pub fn parse_records<R: BufRead>(reader: R) -> Result<Vec<StateRecord>> {
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.with_context(|| format!("读取第 {line_no} 行失败"))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: StateRecord = serde_json::from_str(&line)
            .with_context(|| format!("第 {line_no} 行不是有效的状态记录"))?;
        records.push(record);
    }
    Ok(records)
}

/// 读取状态日志文件
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<StateRecord>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("打开状态日志失败: {}", path.display()))?;
    parse_records(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use stride_protocol::{Quaternion, Vec3};

    const LEGACY_LINE: &str = r#"{"timestamp": "2025-03-14T09:26:53.589793", "body_pose_vision_frame": {"position": {"x": 1.5, "y": -0.25, "z": 0.48}, "rotation": {"w": 1.0, "x": 0.0, "y": 0.0, "z": 0.0}}, "body_velocity": {"linear": {"x": 0.1, "y": 0.0, "z": 0.0}, "angular": {"x": 0.0, "y": 0.0, "z": 0.2}}, "joint_states": {"arm0.sh0": {"position": 0.1, "velocity": 0.0, "torque": 1.25}}}"#;

    #[test]
    fn test_parse_naive_timestamp_as_utc() {
        let record: StateRecord = serde_json::from_str(LEGACY_LINE).unwrap();
        let expected = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap()
            + chrono::Duration::microseconds(589_793);
        assert_eq!(record.timestamp, expected);
        assert_eq!(record.body_pose_vision_frame.position.y, -0.25);
        assert_eq!(record.joint_states["arm0.sh0"].torque, 1.25);
    }

    #[test]
    fn test_written_timestamp_is_rfc3339_utc() {
        let record = StateRecord {
            timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap(),
            body_pose_vision_frame: BodyPose {
                position: Vec3::new(1.0, 2.0, 0.5),
                rotation: Quaternion::IDENTITY,
            },
            body_velocity: BodyVelocity::default(),
            joint_states: BTreeMap::new(),
        };
        let line = serde_json::to_string(&record).unwrap();
        assert!(line.contains(r#""timestamp":"2025-01-01T12:00:00.000000Z""#), "{line}");
        assert!(line.contains(r#""rotation":{"w":1.0,"x":0.0,"y":0.0,"z":0.0}"#), "{line}");
    }

    #[test]
    fn test_missing_joint_states_defaults_to_empty() {
        let line = r#"{"timestamp":"2025-01-01T00:00:00Z","body_pose_vision_frame":{"position":{"x":0,"y":0,"z":0},"rotation":{"w":1,"x":0,"y":0,"z":0}},"body_velocity":{"linear":{"x":0,"y":0,"z":0},"angular":{"x":0,"y":0,"z":0}}}"#;
        let record: StateRecord = serde_json::from_str(line).unwrap();
        assert!(record.joint_states.is_empty());
    }

    #[test]
    fn test_parse_reports_line_number() {
        let input = format!("{LEGACY_LINE}\n\n{{\"timestamp\": 3}}\n");
        let err = parse_records(input.as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("第 3 行"), "{err:#}");
    }

    #[test]
    fn test_blank_lines_skipped() {
        let input = format!("\n{LEGACY_LINE}\n   \n{LEGACY_LINE}\n");
        let records = parse_records(input.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
    }
}
