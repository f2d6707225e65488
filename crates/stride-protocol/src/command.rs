//! # 运动指令
//!
//! 对核心层（租约、截止时间调度、会话生命周期）而言，`MotionCommand` 是不透明载荷；
//! 这里只定义其结构和少量构造辅助函数。

use crate::ProtocolError;
use crate::time::RobotTime;
use std::time::SystemTime;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 三维向量（米 / 米每秒 / 弧度每秒，视上下文而定）
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// 单位四元数（字段顺序与记录格式一致：w, x, y, z）
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// 绕 Z 轴旋转 `yaw` 弧度的纯偏航四元数
    pub fn from_yaw(yaw: f64) -> Self {
        let half = yaw / 2.0;
        Self {
            w: half.cos(),
            x: 0.0,
            y: 0.0,
            z: half.sin(),
        }
    }

    pub fn norm(&self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn normalized(&self) -> Result<Self, ProtocolError> {
        let norm = self.norm();
        if !norm.is_finite() || norm < f64::EPSILON {
            return Err(ProtocolError::DegenerateQuaternion { norm });
        }
        Ok(Self {
            w: self.w / norm,
            x: self.x / norm,
            y: self.y / norm,
            z: self.z / norm,
        })
    }
}

/// 参考坐标系
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Frame {
    /// 机身坐标系（默认）
    #[default]
    Body,
    /// 视觉里程计坐标系
    Vision,
    /// 腿式里程计坐标系
    Odom,
}

impl Frame {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frame::Body => "body",
            Frame::Vision => "vision",
            Frame::Odom => "odom",
        }
    }
}

/// 机身速度指令
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VelocityCommand {
    /// 前向速度（m/s）
    pub v_x: f64,
    /// 侧向速度（m/s）
    pub v_y: f64,
    /// 偏航角速度（rad/s）
    pub v_yaw: f64,
}

impl VelocityCommand {
    pub const ZERO: VelocityCommand = VelocityCommand {
        v_x: 0.0,
        v_y: 0.0,
        v_yaw: 0.0,
    };

    pub const fn new(v_x: f64, v_y: f64, v_yaw: f64) -> Self {
        Self { v_x, v_y, v_yaw }
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        for (field, value) in [("v_x", self.v_x), ("v_y", self.v_y), ("v_yaw", self.v_yaw)] {
            if !value.is_finite() {
                return Err(ProtocolError::NonFinite { field });
            }
        }
        Ok(())
    }
}

/// 机械臂末端位姿指令
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ArmPose {
    pub position: Vec3,
    pub rotation: Quaternion,
    pub frame: Frame,
}

impl ArmPose {
    pub fn new(position: Vec3, rotation: Quaternion, frame: Frame) -> Self {
        Self {
            position,
            rotation,
            frame,
        }
    }

    /// 机身坐标系下、只带偏航的末端位姿
    ///
    /// ```
    /// use stride_protocol::ArmPose;
    ///
    /// // 机械臂指向左侧（yaw = +90°）
    /// let pose = ArmPose::with_yaw(0.5, 0.5, 0.215, std::f64::consts::FRAC_PI_2);
    /// assert!((pose.rotation.w - pose.rotation.z).abs() < 1e-12);
    /// ```
    pub fn with_yaw(x: f64, y: f64, z: f64, yaw: f64) -> Self {
        Self {
            position: Vec3::new(x, y, z),
            rotation: Quaternion::from_yaw(yaw),
            frame: Frame::Body,
        }
    }
}

/// 运动指令载荷
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MotionCommand {
    /// 机身速度，`body_height` 为相对标称站高的偏移（米）
    Velocity {
        velocity: VelocityCommand,
        body_height: f64,
    },
    /// 原地停止（保持站立）
    Stop,
    /// 坐下
    Sit,
    /// 站立
    Stand,
    /// 机械臂末端位姿
    ArmPose(ArmPose),
    /// 机身运动与机械臂同步执行
    Synchro {
        base: Box<MotionCommand>,
        arm: ArmPose,
    },
}

impl MotionCommand {
    /// 标称站高下的速度指令
    pub fn velocity(v_x: f64, v_y: f64, v_yaw: f64) -> Self {
        MotionCommand::Velocity {
            velocity: VelocityCommand::new(v_x, v_y, v_yaw),
            body_height: 0.0,
        }
    }

    /// 修改速度指令的站高偏移；对其它指令无效
    pub fn with_body_height(self, height: f64) -> Self {
        match self {
            MotionCommand::Velocity { velocity, .. } => MotionCommand::Velocity {
                velocity,
                body_height: height,
            },
            other => other,
        }
    }

    pub fn synchro(base: MotionCommand, arm: ArmPose) -> Self {
        MotionCommand::Synchro {
            base: Box::new(base),
            arm,
        }
    }

    /// 指令名称（用于日志）
    pub fn name(&self) -> &'static str {
        match self {
            MotionCommand::Velocity { .. } => "velocity",
            MotionCommand::Stop => "stop",
            MotionCommand::Sit => "sit",
            MotionCommand::Stand => "stand",
            MotionCommand::ArmPose(_) => "arm_pose",
            MotionCommand::Synchro { .. } => "synchro",
        }
    }

    /// 提取机身速度（同步指令取其机身部分）
    pub fn base_velocity(&self) -> Option<VelocityCommand> {
        match self {
            MotionCommand::Velocity { velocity, .. } => Some(*velocity),
            MotionCommand::Synchro { base, .. } => base.base_velocity(),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            MotionCommand::Velocity {
                velocity,
                body_height,
            } => {
                velocity.validate()?;
                if !body_height.is_finite() {
                    return Err(ProtocolError::NonFinite {
                        field: "body_height",
                    });
                }
                Ok(())
            },
            MotionCommand::ArmPose(pose) => pose.rotation.normalized().map(|_| ()),
            MotionCommand::Synchro { base, arm } => {
                base.validate()?;
                arm.rotation.normalized().map(|_| ())
            },
            MotionCommand::Stop | MotionCommand::Sit | MotionCommand::Stand => Ok(()),
        }
    }
}

/// 一次发送的完整指令
///
/// 每次调度时创建，不做持久化。`deadline` 为 `None` 表示指令一直保持，直到被覆盖或停止。
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// 进程内单调递增的指令编号
    pub id: u64,
    pub payload: MotionCommand,
    /// 本地墙钟上的发出时间
    pub issued_at: SystemTime,
    /// 机器人时钟上的截止时间
    pub deadline: Option<RobotTime>,
}
