//! Attack manager for orchestrating concurrent spoofing workers
//!
//! The `AttackManager` is the main entry point for running spoofing targets.
//! It provides:
//!
//! - One tokio task per target, all sharing a single `SenderMap`
//! - Attack lifecycle management (launch, pause, resume, stop)
//! - Thread-safe attack tracking with DashMap
//! - Interfaces that failed once are refused for later launches
//! - Bounded runs and graceful shutdown

use crate::executor::{join_attack_task, stop_and_wait, AttackExecutor};
use crate::spoof::{FailurePolicy, SpoofAttack, SpoofTarget};
use async_trait::async_trait;
use dashmap::DashMap;
use ndforge_core::{Attack, AttackContext, AttackHandle, AttackStats, Error, Result, SenderMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Information about a running attack
#[derive(Debug, Clone)]
pub struct AttackInfo {
    /// Unique attack instance ID
    pub id: Uuid,
    /// Attack name
    pub attack_name: String,
    /// Display form of the target
    pub target: String,
    /// When the attack started
    pub started_at: SystemTime,
    /// Is the attack running?
    pub is_running: bool,
    /// Is the attack paused?
    pub is_paused: bool,
    /// Current statistics
    pub stats: AttackStats,
}

/// How a worker ended
#[derive(Debug)]
pub struct AttackOutcome {
    pub id: Uuid,
    pub target: String,
    pub stats: AttackStats,
    pub result: Result<()>,
}

/// Counts live workers and wakes waiters when the last one ends
#[derive(Default)]
struct ActiveWorkers {
    count: AtomicUsize,
    idle: Notify,
}

impl ActiveWorkers {
    async fn wait_idle(&self) {
        loop {
            let idle = self.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();
            if self.count.load(Ordering::Acquire) == 0 {
                return;
            }
            idle.await;
        }
    }
}

/// Decrements the live count even if the worker panics
struct ActiveGuard(Arc<ActiveWorkers>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Runs a worker and records its interface as unusable when it fails with
/// an interface error.
struct TrackedAttack {
    inner: SpoofAttack,
    unusable: Arc<DashMap<String, String>>,
    active: Arc<ActiveWorkers>,
}

#[async_trait]
impl Attack for TrackedAttack {
    async fn execute(&self, ctx: AttackContext) -> Result<()> {
        let _guard = ActiveGuard(self.active.clone());
        let result = self.inner.execute(ctx).await;
        if let Err(e) = &result {
            if e.is_interface_error() {
                let interface = &self.inner.target().interface;
                warn!(interface = %interface, error = %e, "Marking interface unusable");
                self.unusable.insert(interface.clone(), e.to_string());
            }
        }
        result
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Attack manager that orchestrates multiple concurrent attacks
pub struct AttackManager {
    /// Map of active attacks (UUID -> AttackHandle)
    attacks: Arc<DashMap<Uuid, AttackHandle>>,
    /// Senders shared by every worker
    senders: Arc<SenderMap>,
    /// Interfaces that failed, with the reason
    unusable: Arc<DashMap<String, String>>,
    active: Arc<ActiveWorkers>,
    policy: FailurePolicy,
    /// Is the manager shutting down?
    shutting_down: Arc<AtomicBool>,
}

impl AttackManager {
    /// Manager that opens real raw sockets
    pub fn new() -> Self {
        Self::with_senders(Arc::new(SenderMap::new()))
    }

    /// Manager whose workers take their senders from `senders`
    pub fn with_senders(senders: Arc<SenderMap>) -> Self {
        info!("Creating new AttackManager");
        Self {
            attacks: Arc::new(DashMap::new()),
            senders,
            unusable: Arc::new(DashMap::new()),
            active: Arc::new(ActiveWorkers::default()),
            policy: FailurePolicy::default(),
            shutting_down: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn senders(&self) -> &Arc<SenderMap> {
        &self.senders
    }

    /// Launch a worker for `target`
    ///
    /// Returns the UUID of the launched attack instance. Fails immediately
    /// when the manager is shutting down or the target's interface already
    /// failed.
    pub fn launch(&self, target: SpoofTarget) -> Result<Uuid> {
        if self.shutting_down.load(Ordering::Relaxed) {
            return Err(Error::ExecutionFailed(
                "Manager is shutting down".to_string(),
            ));
        }
        if let Some(reason) = self.unusable.get(&target.interface) {
            return Err(Error::interface(
                target.interface.clone(),
                reason.value().clone(),
            ));
        }

        let description = target.to_string();
        let attack = SpoofAttack::new(target, self.senders.clone(), self.policy);
        let executor = AttackExecutor::new(attack.name().to_string(), description);

        self.active.count.fetch_add(1, Ordering::AcqRel);
        let tracked = Arc::new(TrackedAttack {
            inner: attack,
            unusable: self.unusable.clone(),
            active: self.active.clone(),
        });
        let handle = executor.execute(tracked, AttackContext::new());
        let attack_uuid = handle.id;

        self.attacks.insert(attack_uuid, handle);
        debug!(id = %attack_uuid, "Attack launched");

        Ok(attack_uuid)
    }

    /// Launch one worker per target
    pub fn launch_all<I>(&self, targets: I) -> Result<Vec<Uuid>>
    where
        I: IntoIterator<Item = SpoofTarget>,
    {
        targets.into_iter().map(|t| self.launch(t)).collect()
    }

    /// Pause an attack
    pub fn pause(&self, id: Uuid) -> Result<()> {
        debug!(id = %id, "Pausing attack");

        if let Some(handle) = self.attacks.get(&id) {
            handle.pause();
            info!(id = %id, "Attack paused");
            Ok(())
        } else {
            warn!(id = %id, "Attack not found");
            Err(Error::NotFound(format!("Attack {} not found", id)))
        }
    }

    /// Resume a paused attack
    pub fn resume(&self, id: Uuid) -> Result<()> {
        debug!(id = %id, "Resuming attack");

        if let Some(handle) = self.attacks.get(&id) {
            handle.resume();
            info!(id = %id, "Attack resumed");
            Ok(())
        } else {
            warn!(id = %id, "Attack not found");
            Err(Error::NotFound(format!("Attack {} not found", id)))
        }
    }

    /// Stop an attack and wait for its current transmit to finish
    pub async fn stop(&self, id: Uuid) -> Result<()> {
        info!(id = %id, "Stopping attack");

        if let Some((_, mut handle)) = self.attacks.remove(&id) {
            stop_and_wait(&mut handle).await
        } else {
            warn!(id = %id, "Attack not found");
            Err(Error::NotFound(format!("Attack {} not found", id)))
        }
    }

    /// Ask every worker to stop without waiting for them
    pub fn signal_stop_all(&self) {
        self.shutting_down.store(true, Ordering::Relaxed);
        for entry in self.attacks.iter() {
            entry.value().stop();
        }
    }

    /// Stop all workers and collect how they ended
    pub async fn stop_all(&self) -> Vec<AttackOutcome> {
        info!("Stopping all attacks");
        self.signal_stop_all();
        self.wait_all().await
    }

    /// Wait for every launched worker to end, in launch order
    ///
    /// A handle stays registered while its task is joined, so
    /// [`signal_stop_all`](Self::signal_stop_all) still reaches the worker
    /// being waited on.
    pub async fn wait_all(&self) -> Vec<AttackOutcome> {
        let mut ids: Vec<Uuid> = self.attacks.iter().map(|entry| *entry.key()).collect();
        // v7 ids sort by creation time
        ids.sort();

        let mut outcomes = Vec::with_capacity(ids.len());
        for id in ids {
            let task = match self.attacks.get_mut(&id) {
                Some(mut handle) => handle.task_handle.take(),
                None => continue,
            };
            // Another caller is already joining this worker
            let Some(task) = task else {
                continue;
            };
            let result = join_attack_task(id, task).await;

            let Some((_, handle)) = self.attacks.remove(&id) else {
                continue;
            };
            if let Err(e) = &result {
                error!(id = %id, spoof = %handle.target, error = %e, "Worker failed");
            }
            outcomes.push(AttackOutcome {
                id,
                target: handle.target.clone(),
                stats: handle.stats(),
                result,
            });
        }
        outcomes
    }

    /// Let the workers run for at most `duration`, then stop them
    ///
    /// With `None` the workers run until they finish on their own or are
    /// stopped from elsewhere.
    pub async fn run_for(&self, duration: Option<Duration>) -> Vec<AttackOutcome> {
        if let Some(duration) = duration {
            if tokio::time::timeout(duration, self.active.wait_idle())
                .await
                .is_err()
            {
                info!(secs = duration.as_secs_f64(), "Run duration elapsed");
                self.signal_stop_all();
            }
        }
        self.wait_all().await
    }

    /// Stop everything and close every sender
    pub async fn shutdown(&self) -> Vec<AttackOutcome> {
        let outcomes = self.stop_all().await;
        let closed = self.senders.clear();
        info!(senders = closed, "Manager shut down");
        outcomes
    }

    /// Interfaces refused for new launches, with the recorded error
    pub fn unusable_interfaces(&self) -> Vec<(String, String)> {
        let mut list: Vec<(String, String)> = self
            .unusable
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        list.sort();
        list
    }

    /// List all active attacks
    pub fn list_active(&self) -> Vec<AttackInfo> {
        self.attacks
            .iter()
            .map(|entry| {
                let handle = entry.value();
                let is_running = is_live(handle);
                let mut stats = handle.stats();
                stats.is_running = is_running;
                AttackInfo {
                    id: handle.id,
                    attack_name: handle.attack_name.clone(),
                    target: handle.target.clone(),
                    started_at: handle.started_at,
                    is_running,
                    is_paused: handle.paused.load(Ordering::Relaxed),
                    stats,
                }
            })
            .collect()
    }

    /// Get statistics for a specific attack
    pub fn get_stats(&self, id: Uuid) -> Result<AttackStats> {
        if let Some(handle) = self.attacks.get(&id) {
            Ok(handle.stats())
        } else {
            Err(Error::NotFound(format!("Attack {} not found", id)))
        }
    }

    /// Get the number of tracked attacks
    pub fn active_count(&self) -> usize {
        self.attacks.len()
    }

    /// Check if an attack is running
    pub fn is_running(&self, id: Uuid) -> bool {
        self.attacks
            .get(&id)
            .map(|h| is_live(&h))
            .unwrap_or(false)
    }

    /// Check if an attack is paused
    pub fn is_paused(&self, id: Uuid) -> bool {
        self.attacks
            .get(&id)
            .map(|h| h.paused.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Drop handles of workers that already ended
    pub fn cleanup_completed(&self) -> usize {
        let before = self.attacks.len();
        self.attacks.retain(|id, handle| {
            // a handle whose task is being joined is not done yet
            let keep = handle
                .task_handle
                .as_ref()
                .map_or(true, |task| !task.is_finished());
            if !keep {
                debug!(id = %id, "Cleaned up completed attack");
            }
            keep
        });

        let count = before.saturating_sub(self.attacks.len());
        if count > 0 {
            info!(count = count, "Cleaned up completed attacks");
        }

        count
    }
}

/// Running flag set and task not yet returned. A task taken out for joining
/// counts as live until the join removes the handle.
fn is_live(handle: &AttackHandle) -> bool {
    handle.running.load(Ordering::Relaxed)
        && handle
            .task_handle
            .as_ref()
            .map_or(true, |task| !task.is_finished())
}

impl Default for AttackManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AttackManager {
    fn drop(&mut self) {
        self.signal_stop_all();
        let closed = self.senders.clear();
        if !self.attacks.is_empty() || closed > 0 {
            warn!(senders = closed, "AttackManager dropped, all attacks stopped");
        }
    }
}
