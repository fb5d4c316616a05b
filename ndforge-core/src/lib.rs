//! ndforge core library
//!
//! This crate provides the error taxonomy, address types, interface lookup,
//! raw-socket senders and the per-interface sender registry shared by the
//! rest of the ndforge workspace.

pub mod attack;
pub mod error;
pub mod interface;
pub mod sender;
pub mod sender_map;
pub mod types;

// Re-export commonly used types
pub use attack::{Attack, AttackContext, AttackHandle, AttackStats, AttackStatsCounters};
pub use error::{Error, ErrorCode, Result};
pub use interface::Interface;
pub use sender::{FrameLink, MemoryLink, RawSocketLink, Sender};
pub use sender_map::SenderMap;
pub use types::*;
