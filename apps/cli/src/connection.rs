//! 连接参数和会话执行辅助
//!
//! 所有会话类命令共享同一组连接参数，并通过 [`run_interruptible`] 在阻塞线程上执行，
//! 同时监听 Ctrl-C。

use anyhow::{Context, Result, anyhow};
use clap::Args;
use std::path::{Path, PathBuf};
use stride_sdk::client::{InterruptSignal, SessionConfig};
use stride_sdk::link::{Credentials, SimConfig, SimConnector};
use tokio::task::spawn_blocking;

/// 默认机器人地址
pub const DEFAULT_ADDRESS: &str = "192.168.80.3";

/// 连接参数
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// 机器人地址
    #[arg(default_value = DEFAULT_ADDRESS)]
    pub address: String,

    /// 用户名（未提供时交互输入）
    #[arg(short, long, env = "STRIDE_USERNAME")]
    pub username: Option<String>,

    /// 密码（未提供时交互输入）
    #[arg(short, long, env = "STRIDE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// 会话配置文件（TOML，覆盖默认位置）
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl ConnectionArgs {
    /// 解析登录凭据，缺失的部分交互输入
    pub fn credentials(&self) -> Result<Credentials> {
        let username = match &self.username {
            Some(username) => username.clone(),
            None => inquire::Text::new("用户名:")
                .prompt()
                .context("读取用户名失败")?,
        };
        let password = match &self.password {
            Some(password) => password.clone(),
            None => inquire::Password::new("密码:")
                .without_confirmation()
                .prompt()
                .context("读取密码失败")?,
        };
        Ok(Credentials::new(username, password))
    }

    /// 加载会话配置
    pub fn session_config(&self) -> Result<SessionConfig> {
        load_session_config(self.config.as_deref())
    }
}

/// 默认配置文件路径：`<config_dir>/stride/session.toml`
pub fn default_config_file() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow!("无法确定配置目录"))?;
    path.push("stride");
    path.push("session.toml");
    Ok(path)
}

/// 加载会话配置
///
/// 显式指定的文件必须存在；否则尝试默认位置，默认位置没有文件时使用内置默认值。
pub fn load_session_config(path: Option<&Path>) -> Result<SessionConfig> {
    match path {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("加载会话配置失败: {}", path.display())),
        None => match default_config_file() {
            Ok(path) if path.exists() => SessionConfig::load(&path)
                .with_context(|| format!("加载会话配置失败: {}", path.display())),
            _ => Ok(SessionConfig::default()),
        },
    }
}

/// 链路连接器
///
/// 当前构建只包含模拟机器人后端。
pub fn connector() -> SimConnector {
    SimConnector::new(SimConfig::default())
}

/// 在阻塞线程上执行会话任务，Ctrl-C 触发中断信号
pub async fn run_interruptible<T, F>(task: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(InterruptSignal) -> Result<T> + Send + 'static,
{
    let interrupt = InterruptSignal::new();
    let trigger = interrupt.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!();
            println!("🛑 收到停止信号，正在坐下、下电并释放租约...");
            trigger.trigger();
        }
    });

    let result = spawn_blocking(move || task(interrupt)).await;
    watcher.abort();
    result.map_err(|e| anyhow!("会话任务异常退出: {}", e))?
}
