//! 配置管理命令
//!
//! 查看和检查会话配置（租约、时钟同步、指令下发、回放、状态记录）

use crate::connection::{default_config_file, load_session_config};
use anyhow::{Context, Result};
use clap::Subcommand;
use std::fs;
use std::path::{Path, PathBuf};
use stride_sdk::client::SessionConfig;

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 打印生效的配置（TOML）
    Show {
        /// 配置文件（默认: <config_dir>/stride/session.toml）
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// 检查配置文件是否有效
    Check {
        /// 配置文件（默认: <config_dir>/stride/session.toml）
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// 写入默认配置
    Init {
        /// 目标文件（默认: <config_dir>/stride/session.toml）
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// 覆盖已存在的文件
        #[arg(long)]
        force: bool,
    },

    /// 打印默认配置文件路径
    Path,
}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        match self {
            ConfigCommand::Show { file } => {
                let config = load_session_config(file.as_deref())?;
                print!("{}", config.to_toml_string()?);
                Ok(())
            },
            ConfigCommand::Check { file } => {
                let path = resolve(file)?;
                SessionConfig::load(&path)
                    .with_context(|| format!("❌ 配置无效: {}", path.display()))?;
                println!("✅ 配置有效: {}", path.display());
                Ok(())
            },
            ConfigCommand::Init { file, force } => {
                let path = resolve(file)?;
                init(&path, force)?;
                println!("✅ 已写入默认配置: {}", path.display());
                Ok(())
            },
            ConfigCommand::Path => {
                println!("{}", default_config_file()?.display());
                Ok(())
            },
        }
    }
}

fn resolve(file: Option<PathBuf>) -> Result<PathBuf> {
    match file {
        Some(path) => Ok(path),
        None => default_config_file(),
    }
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("❌ 文件已存在（使用 --force 覆盖）: {}", path.display());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("创建配置目录失败")?;
    }
    let content = SessionConfig::default().to_toml_string()?;
    fs::write(path, content).with_context(|| format!("写入配置文件失败: {}", path.display()))?;
    Ok(())
}
