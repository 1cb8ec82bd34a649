//! Engine capability trait and loop lifecycle
//!
//! Every spoofing state machine (and the neighbor tracker) implements
//! [`Engine`]. The loop itself lives in an [`EngineLoop`], which owns the
//! cancellation token and the join handle of the single task an engine may
//! run at any time.

use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Uniform control surface shared by all engines
#[async_trait]
pub trait Engine: Send + Sync {
    /// Short name used for registry dispatch (e.g. `arp.spoof`)
    fn name(&self) -> &'static str;

    /// One-line human readable description
    fn description(&self) -> &'static str;

    /// Validate configuration, apply side effects and spawn the loop
    ///
    /// Returns [`Error::AlreadyStarted`] if the loop is already running.
    async fn start(&self) -> Result<()>;

    /// Cancel the loop and wait until it has finished its cleanup
    async fn stop(&self) -> Result<()>;

    fn is_running(&self) -> bool;

    fn stats(&self) -> EngineStats;
}

/// Engine statistics snapshot
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    /// Frames handed to the sink
    pub packets_sent: u64,
    /// Bytes handed to the sink
    pub bytes_sent: u64,
    /// Frames received from a capture (if applicable)
    pub packets_received: u64,
    /// Build, send or resolution errors absorbed by the loop
    pub errors: u64,
    /// When the loop was last started
    pub started_at: Option<SystemTime>,
    pub is_running: bool,
}

/// Thread-safe statistics counters
#[derive(Debug, Default)]
pub struct EngineStatsCounters {
    pub packets_sent: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub packets_received: AtomicU64,
    pub errors: AtomicU64,
}

impl EngineStatsCounters {
    pub fn record_sent(&self, bytes: usize) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn increment_received(&self) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn to_stats(&self, started_at: Option<SystemTime>, running: bool) -> EngineStats {
        EngineStats {
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            started_at,
            is_running: running,
        }
    }
}

struct RunningLoop {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Owner of an engine's single background task
pub struct EngineLoop {
    name: &'static str,
    running: Mutex<Option<RunningLoop>>,
    started_at: Mutex<Option<SystemTime>>,
    stats: Arc<EngineStatsCounters>,
}

impl EngineLoop {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            running: Mutex::new(None),
            started_at: Mutex::new(None),
            stats: Arc::new(EngineStatsCounters::default()),
        }
    }

    /// Whether a loop task exists and has not finished
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .map(|r| !r.task.is_finished())
            .unwrap_or(false)
    }

    /// Fail with [`Error::AlreadyStarted`] if a loop is live
    pub fn ensure_stopped(&self) -> Result<()> {
        if self.is_running() {
            return Err(Error::already_started(self.name));
        }
        Ok(())
    }

    /// Counters shared with the loop body
    pub fn counters(&self) -> Arc<EngineStatsCounters> {
        Arc::clone(&self.stats)
    }

    /// Spawn the loop body on the tokio runtime
    ///
    /// The closure receives the cancellation token it must honour. Spawning
    /// while a previous loop is still live fails without running `body`.
    pub fn spawn<F, Fut>(&self, body: F) -> Result<()>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.try_spawn(|token| Ok(body(token)))
    }

    /// Like [`spawn`](Self::spawn), for bodies that acquire resources first
    ///
    /// `setup` runs under the loop lock and only when no loop is live, so a
    /// losing concurrent start never touches the winner's resources. If it
    /// fails, nothing is spawned.
    pub fn try_spawn<F, Fut>(&self, setup: F) -> Result<()>
    where
        F: FnOnce(CancellationToken) -> Result<Fut>,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut running = self.running.lock();
        if running.as_ref().map(|r| !r.task.is_finished()).unwrap_or(false) {
            return Err(Error::already_started(self.name));
        }

        let token = CancellationToken::new();
        let body = setup(token.clone())?;
        let task = tokio::spawn(body);
        *running = Some(RunningLoop { token, task });
        *self.started_at.lock() = Some(SystemTime::now());

        debug!(engine = self.name, "loop spawned");
        Ok(())
    }

    /// Cancel the loop and await its completion
    pub async fn shutdown(&self) -> Result<()> {
        let running = self
            .running
            .lock()
            .take()
            .ok_or_else(|| Error::NotRunning(self.name.to_string()))?;

        running.token.cancel();
        if let Err(e) = running.task.await {
            warn!(engine = self.name, error = %e, "loop task ended abnormally");
            return Err(Error::ExecutionFailed(format!("{} loop: {}", self.name, e)));
        }

        debug!(engine = self.name, "loop joined");
        Ok(())
    }

    pub fn stats(&self) -> EngineStats {
        self.stats.to_stats(*self.started_at.lock(), self.is_running())
    }
}

/// Run blocking work (commands, sysctl, file I/O) off the async workers
pub async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::ExecutionFailed(format!("blocking task: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[tokio::test]
    async fn test_spawn_twice_is_rejected() {
        let lp = EngineLoop::new("test.engine");
        lp.spawn(|token| async move { token.cancelled().await })
            .unwrap();

        let second = lp.spawn(|token| async move { token.cancelled().await });
        assert!(matches!(second, Err(Error::AlreadyStarted(_))));

        lp.shutdown().await.unwrap();
        assert!(!lp.is_running());
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_cleanup() {
        let lp = EngineLoop::new("test.engine");
        let cleaned = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cleaned);

        lp.spawn(move |token| async move {
            token.cancelled().await;
            tokio::task::yield_now().await;
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();

        lp.shutdown().await.unwrap();
        assert!(cleaned.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_shutdown_when_stopped() {
        let lp = EngineLoop::new("test.engine");
        assert!(matches!(lp.shutdown().await, Err(Error::NotRunning(_))));
    }

    #[tokio::test]
    async fn test_restart_after_shutdown() {
        let lp = EngineLoop::new("test.engine");
        lp.spawn(|token| async move { token.cancelled().await })
            .unwrap();
        lp.shutdown().await.unwrap();

        lp.spawn(|token| async move { token.cancelled().await })
            .unwrap();
        assert!(lp.is_running());
        assert!(lp.stats().started_at.is_some());
        lp.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_try_spawn_skips_setup_while_live() {
        let lp = EngineLoop::new("test.engine");
        lp.spawn(|token| async move { token.cancelled().await })
            .unwrap();

        let ran = AtomicBool::new(false);
        let second = lp.try_spawn(|token| {
            ran.store(true, Ordering::SeqCst);
            Ok(async move { token.cancelled().await })
        });
        assert!(matches!(second, Err(Error::AlreadyStarted(_))));
        assert!(!ran.load(Ordering::SeqCst));
        assert!(lp.is_running());

        lp.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_try_spawn_setup_failure() {
        let lp = EngineLoop::new("test.engine");
        let result = lp.try_spawn(|_| -> Result<std::future::Ready<()>> {
            Err(Error::Capture("no such device".into()))
        });

        assert!(matches!(result, Err(Error::Capture(_))));
        assert!(!lp.is_running());
        assert!(lp.stats().started_at.is_none());
    }

    #[tokio::test]
    async fn test_run_blocking() {
        let value = run_blocking(|| Ok(6 * 7)).await.unwrap();
        assert_eq!(value, 42);

        let err = run_blocking(|| -> Result<()> { Err(Error::not_found("route")) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_counters_snapshot() {
        let counters = EngineStatsCounters::default();
        counters.record_sent(42);
        counters.record_sent(60);
        counters.increment_errors();

        let stats = counters.to_stats(None, false);
        assert_eq!(stats.packets_sent, 2);
        assert_eq!(stats.bytes_sent, 102);
        assert_eq!(stats.errors, 1);
    }
}
