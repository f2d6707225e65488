//! 机器人状态快照
//!
//! 字段命名与 JSON-lines 记录格式保持一致，启用 `serde` feature 后可直接序列化。

use crate::command::{Quaternion, Vec3};
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 机身在视觉坐标系下的位姿
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyPose {
    pub position: Vec3,
    pub rotation: Quaternion,
}

/// 机身速度（视觉坐标系）
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyVelocity {
    pub linear: Vec3,
    pub angular: Vec3,
}

/// 单个关节状态
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointState {
    pub position: f64,
    pub velocity: f64,
    /// 关节负载（N·m）
    pub torque: f64,
}

/// `get_state()` 返回的完整快照
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotState {
    pub body_pose_vision: BodyPose,
    pub body_velocity: BodyVelocity,
    /// 关节名 -> 状态（按名称排序，保证输出稳定）
    pub joint_states: BTreeMap<String, JointState>,
}
