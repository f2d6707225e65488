//! observe 命令
//!
//! 周期读取机器人状态并写入 JSONL 日志，不获取租约。

use crate::connection::{ConnectionArgs, connector, run_interruptible};
use crate::validation::validate_output_path;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use stride_sdk::client::StateLogger;
use stride_sdk::tools::StateRecordWriter;

/// observe 命令参数
#[derive(Args, Debug)]
pub struct ObserveCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// 输出文件路径
    #[arg(short, long, default_value = "spot_state_log.jsonl")]
    pub output: PathBuf,

    /// 采样数量上限（不指定则持续记录直到 Ctrl-C）
    #[arg(short = 'n', long)]
    pub samples: Option<u64>,
}

impl ObserveCommand {
    pub async fn execute(self) -> Result<()> {
        validate_output_path(&self.output)?;
        let credentials = self.connection.credentials()?;
        let config = self.connection.session_config()?;
        let address = self.connection.address.clone();

        let mut observer = config.observer.clone();
        if self.samples.is_some() {
            observer.max_samples = self.samples;
        }
        let clock = config.clock.clone();
        let output = self.output.clone();

        println!("📝 记录状态到: {}", output.display());
        if observer.max_samples.is_none() {
            println!("💡 提示: 按 Ctrl-C 停止记录");
        }

        let stats = run_interruptible(move |interrupt| {
            let logger =
                StateLogger::connect(&connector(), &address, &credentials, clock, observer)?
                    .with_interrupt(interrupt);
            let mut writer = StateRecordWriter::create(&output)?;
            Ok(logger.run(&mut writer)?)
        })
        .await?;

        println!("✅ 记录完成");
        println!("   采样: {}", stats.samples);
        if stats.errors > 0 {
            println!("   读取失败: {}", stats.errors);
        }
        Ok(())
    }
}
