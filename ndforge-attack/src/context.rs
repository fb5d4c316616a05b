//! Worker-side attack context
//!
//! Wraps the [`AttackContext`] a worker is started with together with the
//! [`Sender`] it transmits through, and provides the pause, interval and
//! send primitives every spoofing loop needs.

use ndforge_core::{AttackContext, Result, Sender};
use ndforge_packet::Frame;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// How often a paused worker re-checks its flags
const PAUSE_POLL: Duration = Duration::from_millis(100);

/// Attack context bound to one interface's sender
pub struct EnhancedAttackContext {
    /// Flags, stop wakeup and counters shared with the handle
    pub base: AttackContext,
    /// Sender for the interface this worker targets
    pub sender: Arc<Sender>,
    /// Attack name (for logging)
    pub attack_name: String,
}

impl EnhancedAttackContext {
    pub fn new(base: AttackContext, sender: Arc<Sender>, attack_name: String) -> Self {
        Self {
            base,
            sender,
            attack_name,
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.base.is_running()
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.base.is_paused()
    }

    /// Wait while the attack is paused
    pub async fn wait_if_paused(&self) {
        if self.is_paused() {
            debug!(attack = %self.attack_name, "Attack paused, waiting...");
        }
        while self.is_paused() && self.is_running() {
            self.sleep_or_stop(PAUSE_POLL).await;
        }
    }

    /// Sleep for `interval`, returning early on stop.
    ///
    /// Returns `true` when the full interval elapsed.
    pub async fn sleep_or_stop(&self, interval: Duration) -> bool {
        // Registered before the flag check so a stop between the two is not lost
        let stopped = self.base.stop.notified();
        tokio::pin!(stopped);
        stopped.as_mut().enable();
        if !self.is_running() {
            return false;
        }

        tokio::select! {
            _ = sleep(interval) => self.is_running(),
            _ = &mut stopped => false,
        }
    }

    /// Transmit a finished frame and count the outcome
    ///
    /// Returns the number of bytes written. Failures are counted before the
    /// error is handed back.
    pub fn send_frame(&self, frame: &Frame) -> Result<usize> {
        match self.sender.transmit(frame) {
            Ok(written) => {
                self.base.stats.record_sent(written as u64);
                debug!(
                    attack = %self.attack_name,
                    interface = %self.sender.name(),
                    size = written,
                    "Frame sent"
                );
                Ok(written)
            }
            Err(e) => {
                let consecutive = self.base.stats.record_failure();
                warn!(
                    attack = %self.attack_name,
                    interface = %self.sender.name(),
                    consecutive,
                    error = %e,
                    "Transmit failed"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndforge_core::{Interface, MacAddr, MemoryLink};
    use ndforge_packet::{build_neighbor_advertisement, NeighborAdvertisementParams};
    use std::sync::atomic::Ordering;
    use std::time::Instant;

    fn create_test_context() -> (EnhancedAttackContext, MemoryLink) {
        let interface = Interface::new(
            "test0".to_string(),
            7,
            MacAddr([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
        );
        let link = MemoryLink::new();
        let sender = Sender::with_link(interface, Box::new(link.clone()));
        let ctx = EnhancedAttackContext::new(
            AttackContext::new(),
            Arc::new(sender),
            "test_attack".to_string(),
        );
        (ctx, link)
    }

    fn test_frame() -> Frame {
        let params = NeighborAdvertisementParams::new(
            MacAddr([0x02, 0, 0, 0, 0, 1]),
            "fe80::1".parse().unwrap(),
        );
        build_neighbor_advertisement(&params)
            .unwrap()
            .finalize()
            .unwrap()
    }

    #[tokio::test]
    async fn test_send_frame_updates_stats() {
        let (ctx, link) = create_test_context();

        let written = ctx.send_frame(&test_frame()).unwrap();
        assert_eq!(written, 86);
        assert_eq!(link.count(), 1);
        assert_eq!(ctx.base.stats.packets_sent.load(Ordering::Relaxed), 1);
        assert_eq!(ctx.base.stats.bytes_sent.load(Ordering::Relaxed), 86);
    }

    #[tokio::test]
    async fn test_send_on_closed_sender_counts_failure() {
        let (ctx, _link) = create_test_context();
        ctx.sender.close();

        assert!(ctx.send_frame(&test_frame()).is_err());
        assert!(ctx.send_frame(&test_frame()).is_err());
        assert_eq!(ctx.base.stats.errors.load(Ordering::Relaxed), 2);
        assert_eq!(
            ctx.base.stats.consecutive_failures.load(Ordering::Relaxed),
            2
        );
    }

    #[tokio::test]
    async fn test_stop_cuts_interval_short() {
        let (ctx, _link) = create_test_context();
        let running = ctx.base.running.clone();
        let stop = ctx.base.stop.clone();

        let waker = tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            running.store(false, Ordering::Relaxed);
            stop.notify_waiters();
        });

        let start = Instant::now();
        assert!(!ctx.sleep_or_stop(Duration::from_secs(30)).await);
        assert!(start.elapsed() < Duration::from_secs(5));
        waker.await.unwrap();
    }

    #[tokio::test]
    async fn test_interval_elapses_when_running() {
        let (ctx, _link) = create_test_context();
        assert!(ctx.sleep_or_stop(Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn test_pause_resume() {
        let (ctx, _link) = create_test_context();
        let paused = ctx.base.paused.clone();

        paused.store(true, Ordering::Relaxed);
        assert!(ctx.is_paused());

        let resumer = tokio::spawn(async move {
            sleep(Duration::from_millis(150)).await;
            paused.store(false, Ordering::Relaxed);
        });

        ctx.wait_if_paused().await;
        assert!(!ctx.is_paused());
        resumer.await.unwrap();
    }
}
