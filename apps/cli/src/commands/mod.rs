//! 命令定义和实现

pub mod arm;
pub mod config;
pub mod observe;
pub mod replay;
pub mod walk;

pub use arm::ArmCommand;
pub use config::ConfigCommand;
pub use observe::ObserveCommand;
pub use replay::ReplayCommand;
pub use walk::WalkCommand;
