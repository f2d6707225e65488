//! # Stride Tools - 共享数据结构和算法
//!
//! **依赖原则**: 只依赖 `stride-protocol`，避免依赖 `stride-client`
//!
//! ## 包含模块
//!
//! - `record` - 状态日志格式（JSON lines，每行一个快照）
//! - `kinematics` - 位姿差分到速度指令的换算（纯函数）

pub mod kinematics;
pub mod record;

pub use kinematics::{
    MIN_DT, PoseSample, VelocityEstimate, VelocityLimits, clip, estimate_velocity, quat_to_yaw,
    wrap_angle,
};
pub use record::{StateRecord, StateRecordWriter, parse_records, read_records};
