//! arm 命令
//!
//! 行走中先压低、再抬高机身，同时把机械臂末端移到左前方。

use crate::connection::{ConnectionArgs, connector, run_interruptible};
use crate::validation::{validate_secs, validate_speed};
use anyhow::Result;
use clap::Args;
use stride_sdk::client::SessionBuilder;
use stride_sdk::protocol::{ArmPose, MotionCommand};

/// 机身高度偏移序列（米）
const BODY_HEIGHTS: [f64; 2] = [-0.25, 0.25];

/// 机械臂末端目标（机身坐标系）
fn arm_target() -> ArmPose {
    ArmPose::with_yaw(0.5, 0.5, 0.215, 1.57)
}

/// arm 命令参数
#[derive(Args, Debug)]
pub struct ArmCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// 前进速度（m/s）
    #[arg(long, default_value_t = 0.5)]
    pub speed: f64,

    /// 每个机身高度保持的时长（秒）
    #[arg(long, default_value_t = 4.0)]
    pub step_secs: f64,
}

impl ArmCommand {
    pub async fn execute(self) -> Result<()> {
        let speed = validate_speed("--speed", self.speed)?;
        let step = validate_secs("--step-secs", self.step_secs)?;
        let credentials = self.connection.credentials()?;
        let config = self.connection.session_config()?;
        let address = self.connection.address.clone();

        println!("🦾 机身高度 {:?} m，每段 {:.1}s", BODY_HEIGHTS, step.as_secs_f64());

        run_interruptible(move |interrupt| {
            SessionBuilder::new(address, credentials)
                .config(config)
                .interrupt(interrupt)
                .run(&connector(), |session| {
                    for height in BODY_HEIGHTS {
                        println!("⏳ 机身高度 {:+.2} m", height);
                        let base =
                            MotionCommand::velocity(speed, 0.0, 0.0).with_body_height(height);
                        session.dispatch(MotionCommand::synchro(base, arm_target()), Some(step))?;
                        session.hold(step)?;
                    }
                    Ok(())
                })?;
            Ok(())
        })
        .await?;

        println!("✅ 动作完成");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arm_target_points_left() {
        let pose = arm_target();
        assert_eq!(pose.position.y, 0.5);
        assert!(pose.rotation.z > 0.7 && pose.rotation.w > 0.7);
    }
}
