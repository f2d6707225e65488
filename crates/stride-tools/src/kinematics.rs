//! # 位姿运动学
//!
//! 回放时把相邻两条记录的位姿差分换算成机身速度指令。
//! 只做有限差分，不做任何滤波或轨迹规划。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::time::Duration;
use stride_protocol::{Quaternion, Vec3, VelocityCommand};

/// 差分时间下限，避免除零
pub const MIN_DT: Duration = Duration::from_millis(1);

/// 一条位姿样本
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSample {
    pub timestamp: DateTime<Utc>,
    pub position: Vec3,
    pub orientation: Quaternion,
}

/// 回放速度上限
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityLimits {
    /// 线速度上限（m/s），对 x、y 分别限幅
    pub max_linear: f64,
    /// 角速度上限（rad/s）
    pub max_angular: f64,
}

impl Default for VelocityLimits {
    fn default() -> Self {
        Self {
            max_linear: 0.8,
            max_angular: 1.5,
        }
    }
}

/// 速度估计结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityEstimate {
    pub command: VelocityCommand,
    /// 是否有分量被限幅
    pub clipped: bool,
}

/// 四元数的偏航角（绕 z 轴）
///
/// ```
/// use stride_protocol::Quaternion;
/// use stride_tools::quat_to_yaw;
///
/// let q = Quaternion::from_yaw(0.5);
/// assert!((quat_to_yaw(&q) - 0.5).abs() < 1e-12);
/// ```
pub fn quat_to_yaw(q: &Quaternion) -> f64 {
    (2.0 * (q.w * q.z + q.x * q.y)).atan2(1.0 - 2.0 * (q.y * q.y + q.z * q.z))
}

/// 对称限幅到 `[-limit, limit]`
pub fn clip(value: f64, limit: f64) -> f64 {
    value.clamp(-limit, limit)
}

/// 角度归一化到 `(-π, π]`
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped <= -PI { wrapped + 2.0 * PI } else { wrapped }
}

/// 由相邻两条位姿估计机身速度
///
/// `dt` 为两次发送之间实际经过的时间，小于 [`MIN_DT`] 时按 `MIN_DT` 计算。
/// 偏航差先归一化到 `(-π, π]`，跨越 ±π 时不会产生反向的大角速度。
pub fn estimate_velocity(
    prev: &PoseSample,
    cur: &PoseSample,
    dt: Duration,
    limits: &VelocityLimits,
) -> VelocityEstimate {
    let dt = dt.max(MIN_DT).as_secs_f64();

    let raw_x = (cur.position.x - prev.position.x) / dt;
    let raw_y = (cur.position.y - prev.position.y) / dt;
    let dyaw = wrap_angle(quat_to_yaw(&cur.orientation) - quat_to_yaw(&prev.orientation));
    let raw_yaw = dyaw / dt;

    let command = VelocityCommand::new(
        clip(raw_x, limits.max_linear),
        clip(raw_y, limits.max_linear),
        clip(raw_yaw, limits.max_angular),
    );
    let clipped = command.v_x != raw_x || command.v_y != raw_y || command.v_yaw != raw_yaw;

    VelocityEstimate { command, clipped }
}
