//! Per-identity async locks.
//!
//! Multi-step operations on one plugin hold its lock across awaits; other
//! identities are unaffected.

use crate::core::sync::lock;
use crate::core::PluginId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slot = Arc<AsyncMutex<()>>;

/// Lock table keyed by plugin identity.
#[derive(Clone, Default)]
pub struct IdentityLocks {
    slots: Arc<Mutex<HashMap<PluginId, Slot>>>,
}

impl IdentityLocks {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`.
    pub async fn acquire(&self, id: &PluginId) -> IdentityGuard {
        let slot = {
            let mut slots = lock(&self.slots);
            // A waiter dropped after the holder released leaves its slot behind.
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            slots.entry(id.clone()).or_default().clone()
        };
        let guard = slot.lock_owned().await;
        IdentityGuard {
            id: id.clone(),
            slots: Arc::clone(&self.slots),
            guard: Some(guard),
        }
    }

    /// Identities with a holder or a waiter.
    pub fn active(&self) -> usize {
        lock(&self.slots).len()
    }
}

/// Exclusive access to one identity; released on drop.
pub struct IdentityGuard {
    id: PluginId,
    slots: Arc<Mutex<HashMap<PluginId, Slot>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl IdentityGuard {
    /// Identity held by this guard.
    pub fn id(&self) -> &PluginId {
        &self.id
    }
}

impl Drop for IdentityGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut slots = lock(&self.slots);
        // Only the table still references the slot: nobody holds or awaits it.
        if let Some(slot) = slots.get(&self.id) {
            if Arc::strong_count(slot) == 1 {
                slots.remove(&self.id);
            }
        }
    }
}
