//! Exclusive Control Lease - 独占控制租约与后台心跳
//!
//! 远端机器人只接受租约持有者的运动指令，并且在 `remote_lease_timeout_ms` 内没有收到心跳时
//! 自动收回租约（机器人随即进入安全状态）。`ControlLease` 负责：
//!
//! - 获取租约（可选是否允许抢占其他持有者）
//! - 在独立线程中按固定周期续约，不受前台阻塞调用影响
//! - 心跳失败时把状态切换为 `Lost` 并通过 channel 通知：瞬时错误（超时、传输）
//!   按 `heartbeat_retry_budget` 重试，其它错误立即判定丢失
//! - 释放租约（幂等，`Drop` 时自动执行；远端确认前心跳不中断）
//!
//! # 时间基准
//!
//! 心跳统计使用以应用启动为锚点的单调时间（微秒），不受系统时钟调整影响，
//! 可以直接存入 `AtomicU64` 无锁读取。

use crate::DriverError;
use crate::state::{AtomicLeaseState, LeaseState};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use stride_link::{LeaseToken, LinkError, SharedLink};
use tracing::{debug, error, info, trace, warn};

/// 单调时间锚点（首次访问时设置）
static APP_START: OnceLock<Instant> = OnceLock::new();

fn monotonic_micros() -> u64 {
    let start = APP_START.get_or_init(Instant::now);
    start.elapsed().as_micros() as u64
}

/// 租约配置（毫秒）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaseConfig {
    /// 获取租约的最长等待
    pub acquire_timeout_ms: u64,
    /// 心跳周期
    pub heartbeat_interval_ms: u64,
    /// 远端收回租约的超时
    pub remote_lease_timeout_ms: u64,
    /// 允许连续瞬时失败的心跳次数，超过后判定租约丢失
    pub heartbeat_retry_budget: u32,
    /// `true` 时不抢占其他持有者
    pub must_acquire: bool,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            acquire_timeout_ms: 5000,
            heartbeat_interval_ms: 1000,
            remote_lease_timeout_ms: 3000,
            heartbeat_retry_budget: 2,
            must_acquire: true,
        }
    }
}

impl LeaseConfig {
    /// 检查心跳周期是否给远端超时留出了至少一次丢包的余量
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.heartbeat_interval_ms == 0 {
            return Err(DriverError::InvalidConfig(
                "lease.heartbeat_interval_ms must be positive".to_string(),
            ));
        }
        if self.acquire_timeout_ms == 0 {
            return Err(DriverError::InvalidConfig(
                "lease.acquire_timeout_ms must be positive".to_string(),
            ));
        }
        if 2 * self.heartbeat_interval_ms >= self.remote_lease_timeout_ms {
            return Err(DriverError::InvalidConfig(format!(
                "lease.heartbeat_interval_ms ({}) must be less than half of \
                 lease.remote_lease_timeout_ms ({})",
                self.heartbeat_interval_ms, self.remote_lease_timeout_ms
            )));
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

/// 租约事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseEvent {
    Acquired { token: LeaseToken },
    Lost { reason: String },
    Released,
}

/// 心跳统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatStats {
    /// 成功续约次数
    pub beats: u64,
    /// 失败次数（包括导致租约丢失的那一次）
    pub failures: u64,
    /// 距离最近一次成功续约（或获取）的时间
    pub last_beat_age: Duration,
}

/// 心跳健康度监视
///
/// 记录最近一次成功续约的时间，读写全部无锁。
#[derive(Debug)]
struct HeartbeatMonitor {
    last_beat: AtomicU64,
    beats: AtomicU64,
    failures: AtomicU64,
}

impl HeartbeatMonitor {
    fn new() -> Self {
        Self {
            last_beat: AtomicU64::new(monotonic_micros()),
            beats: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// 获取成功时重置基准，不计入续约次数
    fn reset(&self) {
        self.last_beat.store(monotonic_micros(), Ordering::Relaxed);
    }

    fn register_beat(&self) {
        self.last_beat.store(monotonic_micros(), Ordering::Relaxed);
        self.beats.fetch_add(1, Ordering::Relaxed);
    }

    fn register_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    fn time_since_last_beat(&self) -> Duration {
        let last_us = self.last_beat.load(Ordering::Relaxed);
        Duration::from_micros(monotonic_micros().saturating_sub(last_us))
    }

    fn snapshot(&self) -> HeartbeatStats {
        HeartbeatStats {
            beats: self.beats.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            last_beat_age: self.time_since_last_beat(),
        }
    }
}

struct LeaseShared {
    state: AtomicLeaseState,
    monitor: HeartbeatMonitor,
    events_tx: Sender<LeaseEvent>,
    /// 本地已发起释放，远端调用尚未返回
    releasing: AtomicBool,
}

impl LeaseShared {
    fn is_releasing(&self) -> bool {
        self.releasing.load(Ordering::Acquire)
    }

    /// 只有仍处于 Active 时才转为 Lost，已释放（或正在释放）的租约不会再报告丢失
    fn mark_lost(&self, reason: String) -> bool {
        if self.is_releasing() {
            return false;
        }
        let changed = self.state.compare_exchange(
            LeaseState::Active,
            LeaseState::Lost,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if changed {
            error!(%reason, "Control lease lost");
            let _ = self.events_tx.send(LeaseEvent::Lost { reason });
        }
        changed
    }
}

/// 租约状态的只读句柄
///
/// 调度器和会话持有它来判断能否发送指令，不拥有租约本身。
#[derive(Clone)]
pub struct LeaseStateHandle {
    shared: Arc<LeaseShared>,
}

impl LeaseStateHandle {
    pub fn state(&self) -> LeaseState {
        self.shared.state.get(Ordering::Acquire)
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// 前台调用发现远端已收回租约时上报
    pub fn mark_lost(&self, reason: impl Into<String>) -> bool {
        self.shared.mark_lost(reason.into())
    }
}

/// 独占控制租约
///
/// 获取成功后立即启动心跳线程 `stride-lease-heartbeat`。
/// 心跳线程只在单次 link 调用期间占用 link，等待下一次心跳时不持有任何锁。
///
/// # 示例
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use stride_driver::{ControlLease, LeaseConfig, LeaseEvent};
/// use stride_link::{SharedLink, SimConfig, SimulatedRobot};
///
/// let link: SharedLink = Arc::new(SimulatedRobot::new(SimConfig::default()));
/// let mut lease = ControlLease::acquire(link, LeaseConfig::default())?;
///
/// let events = lease.events();
/// if let Ok(LeaseEvent::Lost { reason }) = events.try_recv() {
///     eprintln!("lease lost: {reason}");
/// }
///
/// lease.release()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ControlLease {
    link: SharedLink,
    token: LeaseToken,
    config: LeaseConfig,
    shared: Arc<LeaseShared>,
    events_rx: Receiver<LeaseEvent>,
    shutdown_tx: Option<Sender<()>>,
    heartbeat: Option<JoinHandle<()>>,
    released: bool,
}

impl ControlLease {
    /// 获取租约并启动心跳
    ///
    /// # 错误
    ///
    /// - `InvalidConfig`: 心跳周期不满足 `2 * interval < remote_lease_timeout`
    /// - `LeaseUnavailable`: 其他客户端持有租约且 `must_acquire == true`
    /// - `Timeout`: 在 `acquire_timeout_ms` 内没有完成
    /// - `ThreadSpawn`: 心跳线程启动失败（此时已获得的租约会被释放）
    pub fn acquire(link: SharedLink, config: LeaseConfig) -> Result<Self, DriverError> {
        config.validate()?;

        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let shared = Arc::new(LeaseShared {
            state: AtomicLeaseState::new(LeaseState::Acquiring),
            monitor: HeartbeatMonitor::new(),
            events_tx,
            releasing: AtomicBool::new(false),
        });

        debug!(must_acquire = config.must_acquire, "Acquiring control lease");
        let timeout = Duration::from_millis(config.acquire_timeout_ms);
        let token = match link.acquire_lease(config.must_acquire, timeout) {
            Ok(token) => token,
            Err(e) => {
                shared.state.set(LeaseState::Unacquired, Ordering::Release);
                return Err(DriverError::from_link(e));
            },
        };

        shared.monitor.reset();
        shared.state.set(LeaseState::Active, Ordering::Release);
        let _ = shared.events_tx.send(LeaseEvent::Acquired {
            token: token.clone(),
        });
        info!(%token, interval_ms = config.heartbeat_interval_ms, "Control lease acquired");

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let spawned = {
            let link = link.clone();
            let token = token.clone();
            let config = config.clone();
            let shared = shared.clone();
            thread::Builder::new()
                .name("stride-lease-heartbeat".into())
                .spawn(move || heartbeat_loop(link, token, config, shared, shutdown_rx))
        };

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                shared.state.set(LeaseState::Released, Ordering::Release);
                if let Err(release_err) = link.release_lease(&token) {
                    warn!("Failed to release lease after spawn failure: {}", release_err);
                }
                return Err(DriverError::ThreadSpawn(e.to_string()));
            },
        };

        Ok(Self {
            link,
            token,
            config,
            shared,
            events_rx,
            shutdown_tx: Some(shutdown_tx),
            heartbeat: Some(handle),
            released: false,
        })
    }

    pub fn token(&self) -> &LeaseToken {
        &self.token
    }

    pub fn config(&self) -> &LeaseConfig {
        &self.config
    }

    pub fn state(&self) -> LeaseState {
        self.shared.state.get(Ordering::Acquire)
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    pub fn state_handle(&self) -> LeaseStateHandle {
        LeaseStateHandle {
            shared: self.shared.clone(),
        }
    }

    /// 租约事件流（Acquired / Lost / Released）
    pub fn events(&self) -> Receiver<LeaseEvent> {
        self.events_rx.clone()
    }

    pub fn stats(&self) -> HeartbeatStats {
        self.shared.monitor.snapshot()
    }

    /// 心跳线程是否仍在运行
    pub fn is_heartbeat_running(&self) -> bool {
        self.heartbeat.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// 释放租约
    ///
    /// 幂等：无论当前处于 Active 还是 Lost，都会尝试通知远端；重复调用直接返回 `Ok`。
    /// 远端调用期间状态保持不变，心跳照常续约；调用返回后才置为 `Released`
    /// 并停止、回收心跳线程。远端调用失败时记录警告并返回该错误，本地状态仍然是 `Released`。
    pub fn release(&mut self) -> Result<(), LinkError> {
        if self.released {
            self.stop_heartbeat();
            return Ok(());
        }
        self.released = true;
        self.shared.releasing.store(true, Ordering::Release);

        let previous = self.state();
        let result = self.link.release_lease(&self.token);
        match &result {
            Ok(()) => info!(token = %self.token, "Control lease released"),
            Err(e) => warn!(
                token = %self.token,
                previous = %previous,
                "Lease release failed (ignored): {}",
                e
            ),
        }
        self.shared.state.set(LeaseState::Released, Ordering::Release);
        let _ = self.shared.events_tx.send(LeaseEvent::Released);
        self.stop_heartbeat();
        result
    }

    fn stop_heartbeat(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.try_send(());
        }
        if let Some(handle) = self.heartbeat.take()
            && handle.join().is_err()
        {
            warn!("Heartbeat thread panicked");
        }
    }
}

impl Drop for ControlLease {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

/// 心跳循环
///
/// 按绝对时间排程（`next_beat += interval`），单次调用耗时不会累积成漂移。
fn heartbeat_loop(
    link: SharedLink,
    token: LeaseToken,
    config: LeaseConfig,
    shared: Arc<LeaseShared>,
    shutdown_rx: Receiver<()>,
) {
    let interval = config.heartbeat_interval();
    let mut next_beat = Instant::now() + interval;
    let mut consecutive_failures: u32 = 0;

    loop {
        let wait = next_beat.saturating_duration_since(Instant::now());
        match shutdown_rx.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => {},
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
        if !shared.state.get(Ordering::Acquire).is_active() {
            break;
        }

        next_beat += interval;
        match link.heartbeat(&token) {
            Ok(()) => {
                consecutive_failures = 0;
                shared.monitor.register_beat();
                trace!(%token, "Heartbeat ok");
            },
            Err(e) => {
                shared.monitor.register_failure();
                if shared.is_releasing() {
                    debug!(%token, "Heartbeat failed during release: {}", e);
                    break;
                }
                // 远端明确拒绝（收回、被抢占、认证失效等）不会因重试恢复
                if !e.is_transient() {
                    shared.mark_lost(e.to_string());
                    break;
                }
                consecutive_failures += 1;
                warn!(
                    attempt = consecutive_failures,
                    budget = config.heartbeat_retry_budget,
                    "Heartbeat failed: {}",
                    e
                );
                if consecutive_failures > config.heartbeat_retry_budget {
                    shared.mark_lost(format!(
                        "{consecutive_failures} consecutive heartbeat failures, last: {e}"
                    ));
                    break;
                }
            },
        }

        let now = Instant::now();
        if next_beat < now {
            next_beat = now;
        }
    }

    debug!(%token, "Heartbeat thread exiting");
}
