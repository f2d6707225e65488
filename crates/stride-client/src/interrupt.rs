//! 外部中断信号
//!
//! CLI 在 Ctrl-C 时触发，会话在每条指令之前和等待期间检查。
//! 触发后会话返回 `SessionError::Interrupted`，随后照常执行收尾流程。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// 检查中断的最大间隔
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// 可克隆的中断标志，所有克隆共享同一状态
#[derive(Debug, Clone, Default)]
pub struct InterruptSignal {
    flag: Arc<AtomicBool>,
}

impl InterruptSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// 等待 `duration`，期间每次轮询调用 `abort`
    ///
    /// 中断或 `abort` 返回 true 时提前结束，返回 false；完整等待结束返回 true。
    /// `Instant` 无法表示的超长等待视为无限期，只能被中断结束。
    pub fn sleep_unless(&self, duration: Duration, mut abort: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now().checked_add(duration);
        loop {
            if self.is_triggered() || abort() {
                return false;
            }
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => POLL_INTERVAL,
            };
            if remaining.is_zero() {
                return true;
            }
            spin_sleep::sleep(remaining.min(POLL_INTERVAL));
        }
    }

    /// 可被中断的等待
    pub fn sleep(&self, duration: Duration) -> bool {
        self.sleep_unless(duration, || false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_clones_share_state() {
        let signal = InterruptSignal::new();
        let clone = signal.clone();
        assert!(!signal.is_triggered());
        clone.trigger();
        assert!(signal.is_triggered());
    }

    #[test]
    fn test_sleep_completes_without_interrupt() {
        let signal = InterruptSignal::new();
        let start = Instant::now();
        assert!(signal.sleep(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_sleep_wakes_on_trigger() {
        let signal = InterruptSignal::new();
        let trigger = signal.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            trigger.trigger();
        });

        let start = Instant::now();
        assert!(!signal.sleep(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(1));
        handle.join().unwrap();
    }

    #[test]
    fn test_sleep_unless_aborts() {
        let signal = InterruptSignal::new();
        let mut polls = 0;
        let completed = signal.sleep_unless(Duration::from_secs(5), || {
            polls += 1;
            polls > 2
        });
        assert!(!completed);
    }

    #[test]
    fn test_unbounded_sleep_still_interruptible() {
        let signal = InterruptSignal::new();
        let mut polls = 0;
        let completed = signal.sleep_unless(Duration::MAX, || {
            polls += 1;
            polls > 2
        });
        assert!(!completed);
        assert_eq!(polls, 3);
    }
}
