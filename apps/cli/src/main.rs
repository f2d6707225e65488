//! # Stride CLI
//!
//! 基于租约的四足机器人会话命令行工具。
//!
//! 每个子命令都是一个完整的会话：连接 → 获取租约 → 执行 → 坐下 → 下电 → 释放租约。
//! 运行中按 Ctrl-C 会立即进入收尾流程。
//!
//! ```bash
//! # 前进 → 坐下 → 再前进 → 坐下
//! stride-cli walk 192.168.80.3 --username admin
//!
//! # 记录状态日志（不获取租约）
//! stride-cli observe --output spot_state_log.jsonl
//!
//! # 按记录的位姿轨迹回放
//! stride-cli replay spot_state_log.jsonl --yes
//!
//! # 查看生效的会话配置
//! stride-cli config show
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod connection;
mod validation;

use commands::{ArmCommand, ConfigCommand, ObserveCommand, ReplayCommand, WalkCommand};

/// Stride CLI - 四足机器人会话工具
#[derive(Parser, Debug)]
#[command(name = "stride-cli")]
#[command(about = "Command-line interface for leased legged-robot sessions", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 两段前进行走（每段结束后坐下）
    Walk {
        #[command(flatten)]
        args: WalkCommand,
    },

    /// 行走中调整机身高度并摆动机械臂
    Arm {
        #[command(flatten)]
        args: ArmCommand,
    },

    /// 记录机器人状态日志（只读）
    Observe {
        #[command(flatten)]
        args: ObserveCommand,
    },

    /// 回放状态日志中的位姿轨迹
    Replay {
        #[command(flatten)]
        args: ReplayCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stride_cli=info".parse()?)
                .add_directive("stride_client=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config(cmd) => cmd.execute(),
        Commands::Walk { args } => args.execute().await,
        Commands::Arm { args } => args.execute().await,
        Commands::Observe { args } => args.execute().await,
        Commands::Replay { args } => args.execute().await,
    }
}
