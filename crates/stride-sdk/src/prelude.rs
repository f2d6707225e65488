//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use stride_sdk::prelude::*;
//! ```

// 客户端层（推荐使用）
pub use crate::client::{
    InterruptSignal, LeaseAcquired, PoweredOn, ReplayConfig, ReplayEngine, SessionBuilder,
    SessionConfig, SessionHandle, Standing, StateLogger, run_session, start_session,
};

// 链路层
pub use crate::link::{Credentials, LinkConnector, RobotLink, SharedLink};
#[cfg(feature = "sim")]
pub use crate::link::{SimConfig, SimConnector, SimulatedRobot};

// 协议层
pub use crate::protocol::{ArmPose, MotionCommand, VelocityCommand};

// 工具
pub use crate::tools::{PoseSample, StateRecord};

// 错误类型
pub use crate::client::SessionError;
pub use crate::driver::DriverError;
pub use crate::link::LinkError;
pub use crate::protocol::ProtocolError;
