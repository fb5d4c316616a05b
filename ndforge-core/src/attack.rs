//! Worker trait, control flags and counters shared by every spoofing run

use crate::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Notify;

/// A long-running sender of forged frames
#[async_trait]
pub trait Attack: Send + Sync {
    /// Execute the attack
    ///
    /// Runs until the work is done or `ctx.running` is cleared. A stop
    /// request is only honoured between transmits.
    async fn execute(&self, ctx: AttackContext) -> Result<()>;

    /// Get attack name
    fn name(&self) -> &str;
}

/// Attack statistics
#[derive(Debug, Clone, Default)]
pub struct AttackStats {
    /// Frames sent
    pub packets_sent: u64,
    /// Bytes sent
    pub bytes_sent: u64,
    /// Failed transmits and builds
    pub errors: u64,
    /// Failures since the last successful transmit
    pub consecutive_failures: u64,
    /// When the attack started
    pub started_at: Option<SystemTime>,
    /// Duration in seconds (if finished)
    pub duration_secs: Option<u64>,
    /// Is the attack currently running?
    pub is_running: bool,
    /// Is the attack paused?
    pub is_paused: bool,
}

/// Control flags and counters a worker is started with
#[derive(Clone)]
pub struct AttackContext {
    /// Running flag (attack should stop when this is false)
    pub running: Arc<AtomicBool>,
    /// Paused flag
    pub paused: Arc<AtomicBool>,
    /// Woken when the attack is stopped, so sleeps end early
    pub stop: Arc<Notify>,
    /// Statistics counters
    pub stats: Arc<AttackStatsCounters>,
}

impl AttackContext {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            paused: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(Notify::new()),
            stats: Arc::new(AttackStatsCounters::default()),
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }
}

impl Default for AttackContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters updated by the worker and read through its handle
#[derive(Default)]
pub struct AttackStatsCounters {
    pub packets_sent: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub errors: AtomicU64,
    pub consecutive_failures: AtomicU64,
}

impl AttackStatsCounters {
    /// Count one successful transmit of `bytes` bytes
    pub fn record_sent(&self, bytes: u64) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    /// Count one failure; returns the consecutive failure count including it
    pub fn record_failure(&self) -> u64 {
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn to_stats(&self, started_at: SystemTime, running: bool, paused: bool) -> AttackStats {
        let duration_secs = if !running {
            SystemTime::now()
                .duration_since(started_at)
                .ok()
                .map(|d| d.as_secs())
        } else {
            None
        };

        AttackStats {
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            started_at: Some(started_at),
            duration_secs,
            is_running: running,
            is_paused: paused,
        }
    }
}

/// Manager-side handle to a spawned worker
pub struct AttackHandle {
    /// Attack ID (UUID v7 for time-ordered tracking)
    pub id: uuid::Uuid,
    /// Attack name
    pub attack_name: String,
    /// What the attack is aimed at, for display
    pub target: String,
    /// Running flag
    pub running: Arc<AtomicBool>,
    /// Paused flag
    pub paused: Arc<AtomicBool>,
    /// Stop wakeup
    pub stop: Arc<Notify>,
    /// Statistics
    pub stats: Arc<AttackStatsCounters>,
    /// Start time
    pub started_at: SystemTime,
    /// Task handle (for async runtime)
    pub task_handle: Option<tokio::task::JoinHandle<Result<()>>>,
}

impl AttackHandle {
    /// Stop the attack after its current transmit
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
        self.stop.notify_waiters();
    }

    /// Pause the attack
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
    }

    /// Resume the attack
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
    }

    /// Has the task returned?
    pub fn is_finished(&self) -> bool {
        self.task_handle.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Get current statistics
    pub fn stats(&self) -> AttackStats {
        let running = self.running.load(Ordering::Relaxed) && !self.is_finished();
        let paused = self.paused.load(Ordering::Relaxed);
        self.stats.to_stats(self.started_at, running, paused)
    }
}
