//! Per-interface sender registry
//!
//! [`SenderMap`] hands out at most one open [`Sender`] per interface name and
//! shares it between every caller that targets that interface. Entries live
//! in a `BTreeMap`, so iteration and teardown happen in interface-name order.
//!
//! Locking is two-level. The structural `RwLock` is only held long enough to
//! find or insert a slot; opening the socket happens under the slot's own
//! mutex. Two callers opening different interfaces therefore never wait on
//! each other, while two callers opening the same interface share one open.
//! `remove` and `clear` take a slot's mutex before closing it, so an open in
//! progress finishes first, and mark the slot evicted so a caller still
//! holding it starts over on a fresh slot.

use crate::{Result, Sender};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

type Opener = dyn Fn(&str) -> Result<Sender> + Send + Sync;

#[derive(Default)]
struct SlotState {
    sender: Option<Arc<Sender>>,
    /// Set once the slot has left the map; it must never be filled again
    evicted: bool,
}

#[derive(Default)]
struct SenderSlot {
    state: Mutex<SlotState>,
}

impl SenderSlot {
    /// Mark evicted and hand back the sender, if one was open
    fn evict(&self) -> Option<Arc<Sender>> {
        let mut state = self.state.lock();
        state.evicted = true;
        state.sender.take()
    }
}

/// Ordered map from interface name to its shared [`Sender`]
pub struct SenderMap {
    entries: RwLock<BTreeMap<String, Arc<SenderSlot>>>,
    opener: Box<Opener>,
}

impl SenderMap {
    /// Map that opens real raw sockets
    pub fn new() -> Self {
        Self::with_opener(Sender::open)
    }

    /// Map that creates senders with `opener` instead of [`Sender::open`]
    pub fn with_opener<F>(opener: F) -> Self
    where
        F: Fn(&str) -> Result<Sender> + Send + Sync + 'static,
    {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            opener: Box::new(opener),
        }
    }

    /// Return the sender for `interface`, opening it on first use.
    ///
    /// If the open fails the error is returned and the map is left without an
    /// entry for `interface`.
    pub fn get_or_create(&self, interface: &str) -> Result<Arc<Sender>> {
        loop {
            let slot = self.slot_or_insert(interface);
            let mut state = slot.state.lock();
            if state.evicted || !self.is_current(interface, &slot) {
                // removed while we waited; look the interface up again
                continue;
            }
            if let Some(sender) = state.sender.as_ref() {
                return Ok(Arc::clone(sender));
            }

            return match (self.opener)(interface) {
                Ok(sender) => {
                    let sender = Arc::new(sender);
                    state.sender = Some(Arc::clone(&sender));
                    debug!(interface = %interface, "Registered sender");
                    Ok(sender)
                }
                Err(e) => {
                    drop(state);
                    self.discard_empty_slot(interface, slot);
                    warn!(interface = %interface, error = %e, "Failed to open sender");
                    Err(e)
                }
            };
        }
    }

    fn slot_or_insert(&self, interface: &str) -> Arc<SenderSlot> {
        if let Some(slot) = self.entries.read().get(interface) {
            return Arc::clone(slot);
        }
        let mut entries = self.entries.write();
        Arc::clone(entries.entry(interface.to_string()).or_default())
    }

    // Called with the slot's mutex held. Slot before structure: nothing holds
    // the structural lock while waiting on a slot.
    fn is_current(&self, interface: &str, slot: &Arc<SenderSlot>) -> bool {
        self.entries
            .read()
            .get(interface)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    /// Drop a slot whose open failed, unless another caller is still using
    /// it or has since filled it.
    fn discard_empty_slot(&self, interface: &str, slot: Arc<SenderSlot>) {
        let mut entries = self.entries.write();
        let unused = match entries.get(interface) {
            // map + our clone; nobody else can reach the slot while we hold
            // the write lock, so try_lock cannot contend.
            Some(current) if Arc::ptr_eq(current, &slot) => {
                Arc::strong_count(&slot) == 2
                    && slot.state.try_lock().is_some_and(|s| s.sender.is_none())
            }
            _ => false,
        };
        drop(slot);
        if unused {
            entries.remove(interface);
        }
    }

    /// Sender for `interface` if one is already open. Waits for an open in
    /// progress on that interface.
    pub fn get(&self, interface: &str) -> Option<Arc<Sender>> {
        let slot = self.entries.read().get(interface).cloned()?;
        let state = slot.state.lock();
        state.sender.clone()
    }

    /// Close and evict the sender for `interface`. Returns whether one was open.
    ///
    /// An open already in progress for `interface` completes first and its
    /// sender is the one closed.
    pub fn remove(&self, interface: &str) -> bool {
        let sender = loop {
            let Some(slot) = self.entries.read().get(interface).cloned() else {
                return false;
            };
            let mut state = slot.state.lock();
            if state.evicted {
                continue;
            }
            {
                let mut entries = self.entries.write();
                if entries
                    .get(interface)
                    .is_some_and(|current| Arc::ptr_eq(current, &slot))
                {
                    entries.remove(interface);
                }
            }
            state.evicted = true;
            break state.sender.take();
        };
        match sender {
            Some(sender) => {
                sender.close();
                info!(interface = %interface, "Removed sender");
                true
            }
            None => false,
        }
    }

    /// Close and evict every sender, in interface-name order. Returns how many
    /// were open.
    pub fn clear(&self) -> usize {
        let slots = std::mem::take(&mut *self.entries.write());
        let mut closed = 0;
        for (interface, slot) in slots {
            if let Some(sender) = slot.evict() {
                sender.close();
                debug!(interface = %interface, "Closed sender during clear");
                closed += 1;
            }
        }
        if closed > 0 {
            info!(count = closed, "Cleared sender map");
        }
        closed
    }

    /// Names of interfaces with an open sender, in order
    pub fn interfaces(&self) -> Vec<String> {
        self.snapshot()
            .into_iter()
            .filter(|(_, slot)| slot.state.lock().sender.is_some())
            .map(|(name, _)| name)
            .collect()
    }

    /// Number of open senders
    pub fn len(&self) -> usize {
        self.interfaces().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, interface: &str) -> bool {
        self.get(interface).is_some()
    }

    // Slot locks are taken only after the structural lock is released.
    fn snapshot(&self) -> Vec<(String, Arc<SenderSlot>)> {
        self.entries
            .read()
            .iter()
            .map(|(name, slot)| (name.clone(), Arc::clone(slot)))
            .collect()
    }
}

impl Default for SenderMap {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SenderMap {
    fn drop(&mut self) {
        self.clear();
    }
}
