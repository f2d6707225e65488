//! walk 命令
//!
//! 两段前进：站立 → 前进 → 坐下，两段之间坐着等待，最后下电并释放租约。

use crate::connection::{ConnectionArgs, connector, run_interruptible};
use crate::validation::{validate_secs, validate_speed};
use anyhow::Result;
use clap::Args;
use std::time::Duration;
use stride_sdk::client::{SessionBuilder, SessionHandle, TeardownReport};
use stride_sdk::protocol::MotionCommand;

/// 速度指令的有效期比行走时长多出的余量
const COMMAND_MARGIN: Duration = Duration::from_secs(1);
/// 坐下指令的有效期
const SIT_DEADLINE: Duration = Duration::from_secs(2);
/// 坐下指令发出后到阻塞坐下之间的等待
const SIT_SETTLE: Duration = Duration::from_millis(500);
/// 行走段数
const LEGS: u32 = 2;

/// walk 命令参数
#[derive(Args, Debug)]
pub struct WalkCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// 前进速度（m/s）
    #[arg(long, default_value_t = 0.4)]
    pub speed: f64,

    /// 每段行走时长（秒）
    #[arg(long, default_value_t = 4.0)]
    pub walk_secs: f64,

    /// 两段之间坐着等待的时长（秒）
    #[arg(long, default_value_t = 5.0)]
    pub pause_secs: f64,
}

#[derive(Debug, Clone, Copy)]
struct WalkPlan {
    speed: f64,
    walk: Duration,
    pause: Duration,
}

impl WalkCommand {
    pub async fn execute(self) -> Result<()> {
        let plan = WalkPlan {
            speed: validate_speed("--speed", self.speed)?,
            walk: validate_secs("--walk-secs", self.walk_secs)?,
            pause: validate_secs("--pause-secs", self.pause_secs)?,
        };
        let credentials = self.connection.credentials()?;
        let config = self.connection.session_config()?;
        let address = self.connection.address.clone();

        println!(
            "🚶 行走任务: {} 段 × {:.1}s @ {:.2} m/s",
            LEGS,
            plan.walk.as_secs_f64(),
            plan.speed
        );
        println!("💡 提示: 按 Ctrl-C 会坐下、下电并释放租约");

        let report = run_interruptible(move |interrupt| {
            let session = SessionBuilder::new(address, credentials)
                .config(config)
                .interrupt(interrupt)
                .start(&connector())?;
            Ok(walk(session, plan)?)
        })
        .await?;

        print_report(&report);
        println!("✅ 行走完成");
        Ok(())
    }
}

fn walk(session: SessionHandle, plan: WalkPlan) -> stride_sdk::client::Result<TeardownReport> {
    let mut powered = session.power_on()?;
    for leg in 1..=LEGS {
        println!("⏳ 第 {}/{} 段：站立", leg, LEGS);
        let standing = powered.stand()?;

        standing.dispatch(
            MotionCommand::velocity(plan.speed, 0.0, 0.0),
            Some(plan.walk + COMMAND_MARGIN),
        )?;
        standing.hold(plan.walk)?;

        println!("⏳ 第 {}/{} 段：坐下", leg, LEGS);
        standing.dispatch(MotionCommand::Sit, Some(SIT_DEADLINE))?;
        standing.hold(SIT_SETTLE)?;
        powered = standing.sit()?;

        if leg < LEGS {
            powered.hold(plan.pause)?;
        }
    }

    let mut session = powered.power_off()?;
    Ok(session.end())
}

/// 打印收尾报告
pub(crate) fn print_report(report: &TeardownReport) {
    if report.is_clean() {
        return;
    }
    println!("⚠️  收尾未完全成功:");
    println!("   坐下: {:?}", report.stop);
    println!("   下电: {:?}", report.power_off);
    println!("   释放租约: {:?}", report.release);
}
