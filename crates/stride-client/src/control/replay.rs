//! Trajectory Replay - 位姿日志回放
//!
//! 对每一对相邻采样 `(prev, cur)`，用上一次发送到现在的实际间隔 `dt` 估计机身速度，
//! 限幅后作为带截止时间的速度指令发送。开环执行：不读取机器人反馈。
//!
//! ```text
//! v_x   = clip(Δx / dt, ±max_linear)
//! v_y   = clip(Δy / dt, ±max_linear)
//! v_yaw = clip(wrap(Δyaw) / dt, ±max_angular)
//! ```
//!
//! 第一条指令没有"上一次发送"，按标称周期 `period_ms` 计算。
//! 所有采样发送完毕后补发一条停止指令。
//!
//! # 示例
//!
//! ```rust,no_run
//! use stride_client::control::{ReplayConfig, ReplayEngine};
//! # fn demo(session: &mut stride_client::SessionHandle<stride_client::Standing>,
//! #         samples: Vec<stride_tools::PoseSample>) -> stride_client::Result<()> {
//! let engine = ReplayEngine::new(ReplayConfig::default());
//! let stats = engine.run(&*session, &samples)?;
//! println!("sent {} commands ({} clipped)", stats.commands, stats.clipped);
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, SessionError};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use stride_protocol::MotionCommand;
use stride_tools::{PoseSample, VelocityLimits, estimate_velocity};
use tracing::{debug, info};

/// 回放参数（毫秒）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// 发送周期
    pub period_ms: u64,
    /// 每条速度指令的有效期
    pub command_deadline_ms: u64,
    /// 结束时停止指令的有效期
    pub stop_deadline_ms: u64,
    pub limits: VelocityLimits,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            period_ms: 100,
            command_deadline_ms: 200,
            stop_deadline_ms: 500,
            limits: VelocityLimits::default(),
        }
    }
}

impl ReplayConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn command_deadline(&self) -> Duration {
        Duration::from_millis(self.command_deadline_ms)
    }

    pub fn stop_deadline(&self) -> Duration {
        Duration::from_millis(self.stop_deadline_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.period_ms == 0 {
            return Err(SessionError::Config("replay.period_ms must be positive".into()));
        }
        if self.command_deadline_ms == 0 || self.stop_deadline_ms == 0 {
            return Err(SessionError::Config(
                "replay deadlines must be positive".into(),
            ));
        }
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.limits.max_linear) || !positive(self.limits.max_angular) {
            return Err(SessionError::Config(
                "replay.limits must be finite and positive".into(),
            ));
        }
        Ok(())
    }
}

/// 回放引擎的指令出口
///
/// `SessionHandle<Standing>` 实现了该 trait；两个方法都应在中断或租约丢失时返回错误。
pub trait MotionSink {
    /// 发送一条在 `deadline` 后失效的指令
    fn send(&self, payload: MotionCommand, deadline: Duration) -> Result<()>;

    /// 可中断的等待
    fn wait(&self, duration: Duration) -> Result<()>;
}

/// 回放统计
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReplayStats {
    /// 已发送的速度指令数（不含结尾的停止指令）
    pub commands: u64,
    /// 其中触发限幅的条数
    pub clipped: u64,
    pub elapsed: Duration,
}

/// 位姿日志回放引擎
#[derive(Debug, Clone, Default)]
pub struct ReplayEngine {
    config: ReplayConfig,
}

impl ReplayEngine {
    pub fn new(config: ReplayConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// 回放全部采样
    ///
    /// - 没有采样：不发送任何指令
    /// - 只有一条采样：只发送停止指令
    ///
    /// 中断或发送失败时立即返回错误，不再发送停止指令（由会话收尾负责）。
    pub fn run<S: MotionSink + ?Sized>(
        &self,
        sink: &S,
        samples: &[PoseSample],
    ) -> Result<ReplayStats> {
        let start = Instant::now();
        let mut stats = ReplayStats::default();
        if samples.is_empty() {
            info!("Replay log is empty, nothing to send");
            return Ok(stats);
        }

        let period = self.config.period();
        info!(
            samples = samples.len(),
            period_ms = self.config.period_ms,
            "Replay started"
        );

        let mut last_send: Option<Instant> = None;
        let mut next_tick = Instant::now();
        for (index, pair) in samples.windows(2).enumerate() {
            let now = Instant::now();
            let dt = last_send.map_or(period, |t| now.duration_since(t));
            let estimate = estimate_velocity(&pair[0], &pair[1], dt, &self.config.limits);

            sink.send(
                MotionCommand::Velocity {
                    velocity: estimate.command,
                    body_height: 0.0,
                },
                self.config.command_deadline(),
            )?;
            last_send = Some(now);
            stats.commands += 1;
            if estimate.clipped {
                stats.clipped += 1;
            }
            debug!(
                step = index,
                dt_ms = dt.as_secs_f64() * 1000.0,
                v_x = estimate.command.v_x,
                v_y = estimate.command.v_y,
                v_yaw = estimate.command.v_yaw,
                clipped = estimate.clipped,
                "Replay step"
            );

            // 按固定节拍调度；落后时从当前时间重新计时
            next_tick += period;
            let now = Instant::now();
            if next_tick <= now {
                next_tick = now;
            } else {
                sink.wait(next_tick - now)?;
            }
        }

        sink.send(MotionCommand::Stop, self.config.stop_deadline())?;
        stats.elapsed = start.elapsed();
        info!(
            commands = stats.commands,
            clipped = stats.clipped,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "Replay finished"
        );
        Ok(stats)
    }
}
