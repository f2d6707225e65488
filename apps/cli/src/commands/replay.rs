//! replay 命令
//!
//! 把 observe 记录的位姿轨迹转换为速度指令并回放

use crate::connection::{ConnectionArgs, connector, run_interruptible};
use crate::validation::validate_input_file;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use stride_sdk::client::{ReplayEngine, SessionBuilder};
use stride_sdk::tools::{PoseSample, read_records};

/// 回放命令参数
#[derive(Args, Debug)]
pub struct ReplayCommand {
    /// 状态日志路径（observe 的输出）
    #[arg(default_value = "spot_state_log.jsonl")]
    pub log: PathBuf,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// 跳过回放前确认
    #[arg(short, long)]
    pub yes: bool,
}

impl ReplayCommand {
    /// 执行回放
    pub async fn execute(self) -> Result<()> {
        // === 1. 读取日志 ===

        validate_input_file(&self.log)?;
        let records = read_records(&self.log)?;
        let samples: Vec<PoseSample> = records.iter().map(|r| r.pose_sample()).collect();

        let config = self.connection.session_config()?;
        let replay = config.replay.clone();
        replay.validate()?;

        println!("📂 回放文件: {}", self.log.display());
        println!("   采样: {}", samples.len());
        if let (Some(first), Some(last)) = (records.first(), records.last()) {
            let span = last.timestamp - first.timestamp;
            println!("   时长: {:.2}s", span.num_milliseconds() as f64 / 1000.0);
        }
        println!(
            "   周期: {}ms，限幅: {:.2} m/s / {:.2} rad/s",
            replay.period_ms, replay.limits.max_linear, replay.limits.max_angular
        );

        if samples.is_empty() {
            println!("⚠️  日志为空，无需回放");
            return Ok(());
        }

        // === 2. 确认 ===

        if !self.yes {
            let confirmed = inquire::Confirm::new("即将驱动机器人回放轨迹，确定要继续吗？")
                .with_default(false)
                .prompt()?;
            if !confirmed {
                println!("❌ 用户取消");
                return Ok(());
            }
        }

        // === 3. 回放 ===

        let credentials = self.connection.credentials()?;
        let address = self.connection.address.clone();
        println!("🔄 开始回放...");
        println!("💡 提示: 按 Ctrl-C 会停止回放并安全收尾");

        let stats = run_interruptible(move |interrupt| {
            let engine = ReplayEngine::new(replay);
            let stats = SessionBuilder::new(address, credentials)
                .config(config)
                .interrupt(interrupt)
                .run(&connector(), |session| engine.run(&*session, &samples))?;
            Ok(stats)
        })
        .await?;

        println!("✅ 回放完成");
        println!("   指令: {}（限幅 {}）", stats.commands, stats.clipped);
        println!("   耗时: {:.2}s", stats.elapsed.as_secs_f64());
        Ok(())
    }
}
