//! # Stride Protocol
//!
//! 与远端机器人交互时使用的纯数据类型（无 IO、无状态）：
//!
//! - `command` - 运动指令载荷（速度、坐下、站立、机械臂位姿、同步指令）
//! - `time` - 机器人时钟上的绝对时间与本地/远端时钟偏差
//! - `state` - 机器人状态快照（机身位姿、速度、关节状态）
//!
//! 上层（`stride-driver`、`stride-client`）把这些类型当作不透明的载荷传递，
//! 只有远端机器人和 `stride-tools` 会解读其中的几何含义。

pub mod command;
pub mod state;
pub mod time;

pub use command::{ArmPose, Command, Frame, MotionCommand, Quaternion, Vec3, VelocityCommand};
pub use state::{BodyPose, BodyVelocity, JointState, RobotState};
pub use time::{ClockSkew, RobotTime, unix_nanos};

use thiserror::Error;

/// 协议层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// 指令中出现 NaN 或无穷大
    #[error("Non-finite value in field `{field}`")]
    NonFinite { field: &'static str },

    /// 四元数无法归一化（模长为 0）
    #[error("Degenerate quaternion (norm = {norm})")]
    DegenerateQuaternion { norm: f64 },
}
