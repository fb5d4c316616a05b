//! Spoofing workers and their orchestration for ndforge
//!
//! This crate turns [`SpoofTarget`]s into running workers. It includes:
//!
//! - `AttackManager`: Runs one tokio task per target over a shared `SenderMap`
//! - `AttackExecutor`: Spawns an attack and hands back its handle
//! - `EnhancedAttackContext`: Pause, interval and send primitives for a worker
//! - `SpoofAttack`: The worker that builds and transmits one kind of frame
//!
//! # Example
//!
//! ```no_run
//! use ndforge_attack::{AttackManager, FrameTemplate, MessageTemplate, SpoofTarget};
//! use ndforge_packet::NaFlags;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = AttackManager::new();
//!
//!     let template = FrameTemplate::new(MessageTemplate::NeighborAdvertisement {
//!         target_ip: Some("fe80::1".parse()?),
//!         target_mac: None,
//!         flags: NaFlags { override_flag: true, ..Default::default() },
//!     });
//!     let mut target = SpoofTarget::new("eth0", template);
//!     target.repeat = None;
//!
//!     manager.launch(target)?;
//!     for outcome in manager.run_for(Some(Duration::from_secs(10))).await {
//!         println!("{}: {} frames", outcome.target, outcome.stats.packets_sent);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod executor;
pub mod manager;
pub mod spoof;

pub use context::EnhancedAttackContext;
pub use executor::{join_attack_task, stop_and_wait, wait_for_attack, AttackExecutor};
pub use manager::{AttackInfo, AttackManager, AttackOutcome};
pub use spoof::{FailurePolicy, FrameTemplate, MessageTemplate, SpoofAttack, SpoofTarget};
