//! Spawning spoofing workers
//!
//! [`AttackExecutor`] puts one worker on the tokio runtime, logs how it ended
//! and returns the [`AttackHandle`] the manager steers it through.

use ndforge_core::{Attack, AttackContext, AttackHandle, Error, Result};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Spawns one worker and owns its id until the handle exists
pub struct AttackExecutor {
    /// Worker id, also the handle id
    id: Uuid,
    /// Attack name
    attack_name: String,
    /// Display form of the target
    target: String,
}

impl AttackExecutor {
    /// New executor with a fresh v7 id
    pub fn new(attack_name: String, target: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            attack_name,
            target,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Spawn the worker and return its handle
    ///
    /// Spawns a tokio task that runs the attack's execute method. A panic
    /// inside the attack surfaces as an error from [`wait_for_attack`].
    pub fn execute(self, attack: Arc<dyn Attack>, context: AttackContext) -> AttackHandle {
        let id = self.id;
        let running = context.running.clone();
        let paused = context.paused.clone();
        let stop = context.stop.clone();
        let stats = context.stats.clone();
        let started_at = SystemTime::now();

        info!(
            id = %id,
            attack = %self.attack_name,
            spoof = %self.target,
            "Starting attack"
        );

        let attack_name = self.attack_name.clone();
        let target = self.target.clone();
        let task_handle = tokio::spawn(async move {
            let result = attack.execute(context).await;

            match &result {
                Ok(_) => {
                    info!(
                        id = %id,
                        attack = %attack_name,
                        spoof = %target,
                        "Attack completed successfully"
                    );
                }
                Err(e) => {
                    error!(
                        id = %id,
                        attack = %attack_name,
                        spoof = %target,
                        error = %e,
                        "Attack failed"
                    );
                }
            }

            result
        });

        AttackHandle {
            id,
            attack_name: self.attack_name,
            target: self.target,
            running,
            paused,
            stop,
            stats,
            started_at,
            task_handle: Some(task_handle),
        }
    }
}

/// Join a worker and return its result. A second join is a no-op.
pub async fn wait_for_attack(handle: &mut AttackHandle) -> Result<()> {
    match handle.task_handle.take() {
        Some(task_handle) => join_attack_task(handle.id, task_handle).await,
        None => {
            warn!(id = %handle.id, "Attack task already joined");
            Ok(())
        }
    }
}

/// Await a worker task taken out of its handle, mapping a panic or
/// cancellation to `ExecutionFailed`.
pub async fn join_attack_task(id: Uuid, task_handle: JoinHandle<Result<()>>) -> Result<()> {
    match task_handle.await {
        Ok(result) => result,
        Err(e) => {
            if e.is_panic() {
                error!(id = %id, "Attack task panicked");
                Err(Error::ExecutionFailed("Attack task panicked".to_string()))
            } else {
                error!(id = %id, error = %e, "Failed to join attack task");
                Err(Error::ExecutionFailed(format!(
                    "Failed to join attack task: {}",
                    e
                )))
            }
        }
    }
}

/// Signal stop, then join
pub async fn stop_and_wait(handle: &mut AttackHandle) -> Result<()> {
    debug!(id = %handle.id, "Stopping attack");

    handle.stop();
    wait_for_attack(handle).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    struct TestAttack {
        should_panic: bool,
        should_error: bool,
        duration: Duration,
    }

    #[async_trait]
    impl Attack for TestAttack {
        async fn execute(&self, ctx: AttackContext) -> Result<()> {
            if self.should_panic {
                panic!("Test panic");
            }

            if self.should_error {
                return Err(Error::ExecutionFailed("Test error".to_string()));
            }

            let mut count = 0;
            while ctx.is_running() && count < 10 {
                tokio::time::sleep(self.duration).await;
                ctx.stats.record_sent(64);
                count += 1;
            }

            Ok(())
        }

        fn name(&self) -> &str {
            "test_attack"
        }
    }

    fn executor() -> AttackExecutor {
        AttackExecutor::new("test_attack".to_string(), "test0".to_string())
    }

    #[tokio::test]
    async fn test_executor_success() {
        let attack = Arc::new(TestAttack {
            should_panic: false,
            should_error: false,
            duration: Duration::from_millis(10),
        });

        let mut handle = executor().execute(attack, AttackContext::new());
        assert_eq!(handle.target, "test0");

        // Wait a bit for some packets to be sent
        tokio::time::sleep(Duration::from_millis(100)).await;

        let result = stop_and_wait(&mut handle).await;
        assert!(result.is_ok());

        let stats = handle.stats();
        assert!(stats.packets_sent > 0);
        assert!(!stats.is_running);
    }

    #[tokio::test]
    async fn test_executor_handles_error() {
        let attack = Arc::new(TestAttack {
            should_panic: false,
            should_error: true,
            duration: Duration::from_millis(10),
        });

        let mut handle = executor().execute(attack, AttackContext::new());
        let result = wait_for_attack(&mut handle).await;

        assert!(result.is_err());
        // second join is a no-op
        assert!(wait_for_attack(&mut handle).await.is_ok());
    }

    #[tokio::test]
    async fn test_executor_handles_panic() {
        let attack = Arc::new(TestAttack {
            should_panic: true,
            should_error: false,
            duration: Duration::from_millis(10),
        });

        let mut handle = executor().execute(attack, AttackContext::new());
        let result = wait_for_attack(&mut handle).await;

        assert!(matches!(result, Err(Error::ExecutionFailed(_))));
    }
}
