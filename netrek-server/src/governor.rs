//! Resource governor (§4.9): a task-count ceiling, a memory watchdog, and a
//! bounded graceful shutdown. Carried across the process, not per-session.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::error::GovernorError;

/// Read-only snapshot for health probes.
#[derive(Debug, Clone, Copy)]
pub struct GovernorStats {
    pub active_tasks: usize,
    pub max_tasks: usize,
    pub healthy: bool,
}

struct Inner {
    active_tasks: AtomicUsize,
    max_tasks: usize,
    healthy: AtomicBool,
    idle: Notify,
}

/// Enforces the task ceiling and exposes the memory/health flag checked by
/// the watchdog task spawned in `main`.
#[derive(Clone)]
pub struct ResourceGovernor {
    inner: Arc<Inner>,
}

/// RAII guard returned by [`ResourceGovernor::start_task`]; decrements the
/// active count and wakes any shutdown waiter when dropped.
pub struct TaskGuard {
    inner: Arc<Inner>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        let remaining = self.inner.active_tasks.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 {
            self.inner.idle.notify_waiters();
        }
    }
}

impl ResourceGovernor {
    pub fn new(max_tasks: usize) -> Self {
        ResourceGovernor {
            inner: Arc::new(Inner {
                active_tasks: AtomicUsize::new(0),
                max_tasks,
                healthy: AtomicBool::new(true),
                idle: Notify::new(),
            }),
        }
    }

    /// Denies admission once the active count reaches `maxGoroutines`;
    /// otherwise reserves a slot and returns a guard that releases it when
    /// the task exits (or panics — callers should spawn under
    /// `tokio::spawn`, whose own panic catch keeps this guard's `Drop`
    /// running regardless).
    pub fn start_task(&self) -> Result<TaskGuard, GovernorError> {
        let current = self.inner.active_tasks.load(Ordering::SeqCst);
        if current >= self.inner.max_tasks {
            return Err(GovernorError::TaskCeilingReached {
                current,
                max: self.inner.max_tasks,
            });
        }
        self.inner.active_tasks.fetch_add(1, Ordering::SeqCst);
        Ok(TaskGuard {
            inner: self.inner.clone(),
        })
    }

    pub fn stats(&self) -> GovernorStats {
        GovernorStats {
            active_tasks: self.inner.active_tasks.load(Ordering::SeqCst),
            max_tasks: self.inner.max_tasks,
            healthy: self.inner.healthy.load(Ordering::SeqCst),
        }
    }

    fn mark_unhealthy(&self) {
        self.inner.healthy.store(false, Ordering::SeqCst);
    }

    fn mark_healthy(&self) {
        self.inner.healthy.store(true, Ordering::SeqCst);
    }

    /// Samples `sample_rss_mb` every `interval`, marking the governor
    /// unhealthy for as long as RSS stays above `max_memory_mb`. Runs until
    /// `shutdown` fires.
    pub async fn run_memory_watchdog(
        &self,
        interval: Duration,
        max_memory_mb: u64,
        sample_rss_mb: impl Fn() -> u64,
        shutdown: impl Future<Output = ()>,
    ) {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let rss = sample_rss_mb();
                    if rss > max_memory_mb {
                        tracing::warn!(rss_mb = rss, max_mb = max_memory_mb, "memory ceiling exceeded");
                        self.mark_unhealthy();
                    } else {
                        self.mark_healthy();
                    }
                }
                _ = &mut shutdown => break,
            }
        }
    }

    /// Waits up to `timeout` for the active task count to reach zero.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), GovernorError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = self.inner.active_tasks.load(Ordering::SeqCst);
            if remaining == 0 {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(GovernorError::ShutdownTimedOut { remaining });
            }
            let _ = tokio::time::timeout(deadline - now, self.inner.idle.notified()).await;
        }
    }
}

/// Best-effort RSS sample in MiB; returns 0 (never trips the watchdog) on
/// platforms without `/proc/self/status`.
pub fn sample_rss_mb() -> u64 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if let Some(rest) = line.strip_prefix("VmRSS:") {
                    if let Some(kb) = rest.trim().split_whitespace().next() {
                        if let Ok(kb) = kb.parse::<u64>() {
                            return kb / 1024;
                        }
                    }
                }
            }
        }
        0
    }
    #[cfg(not(target_os = "linux"))]
    {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_task_denies_at_ceiling() {
        let gov = ResourceGovernor::new(2);
        let _a = gov.start_task().unwrap();
        let _b = gov.start_task().unwrap();
        assert!(gov.start_task().is_err());
    }

    #[test]
    fn dropping_a_guard_frees_a_slot() {
        let gov = ResourceGovernor::new(1);
        {
            let _a = gov.start_task().unwrap();
            assert!(gov.start_task().is_err());
        }
        assert!(gov.start_task().is_ok());
    }

    #[tokio::test]
    async fn shutdown_resolves_once_tasks_drain() {
        let gov = ResourceGovernor::new(4);
        let guard = gov.start_task().unwrap();
        let gov2 = gov.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(guard);
        });
        gov2.shutdown(Duration::from_secs(1)).await.unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_times_out_with_remaining_count() {
        let gov = ResourceGovernor::new(4);
        let _guard = gov.start_task().unwrap();
        let err = gov.shutdown(Duration::from_millis(10)).await.unwrap_err();
        assert!(matches!(err, GovernorError::ShutdownTimedOut { remaining: 1 }));
    }
}
