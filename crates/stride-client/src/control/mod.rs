//! 控制器模块
//!
//! - `MotionSink` - 运动指令的发送端（会话实现，测试中可替换）
//! - `ReplayEngine` - 状态日志回放：由相邻位姿估计速度并按固定节拍发送

pub mod replay;

pub use replay::{MotionSink, ReplayConfig, ReplayEngine, ReplayStats};
