//! In-memory device registry.
//!
//! Holds the authoritative list of known devices for the current session.
//! Per-device records live behind their own lock, so mutation is serialized
//! per device but never blocks across devices. Nothing here persists across
//! restarts.
//!
//! # Fleet-wide invalidation
//!
//! When any device reports an authentication failure, the *entire* cached
//! device list is cleared, not just the failing device: the observed
//! failure mode is a fleet-wide credential rotation, so the next poll
//! cycle must re-run discovery and re-acquire fresh tokens for everyone.
//! The clear is guarded by a compare-and-set so that concurrent failures
//! within one cycle invalidate exactly once.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use homecast_types::CastDevice;

/// A device record shared between the registry and in-flight poll tasks.
pub type SharedDevice = Arc<Mutex<CastDevice>>;

#[derive(Default)]
struct Inner {
    /// Insertion order of device ids, for stable snapshots.
    order: Vec<String>,
    devices: HashMap<String, SharedDevice>,
}

/// Registry of known devices, keyed by stable device id.
///
/// Created once by the orchestrating caller and shared with the poller.
/// De-duplicates on rebuild, supports per-device in-place mutation, and
/// owns the fleet-wide invalidation guard.
#[derive(Default)]
pub struct DeviceRegistry {
    inner: RwLock<Inner>,
    /// Bumped on every rebuild, cycle start, and invalidation. Poll tasks
    /// record the generation at cycle start and drop their results if a
    /// newer cycle has superseded them (last-cycle-wins).
    generation: AtomicU64,
    /// Set by the first auth failure of the current cycle; re-armed at
    /// cycle start.
    invalidated_this_cycle: AtomicBool,
}

impl DeviceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the device list from a fresh discovery pass.
    ///
    /// Duplicate ids keep the first occurrence. Bumps the generation so
    /// that results from cycles still in flight are dropped.
    pub async fn replace_all(&self, devices: Vec<CastDevice>) {
        let mut inner = self.inner.write().await;
        inner.order.clear();
        inner.devices.clear();

        for device in devices {
            if inner.devices.contains_key(&device.device_id) {
                warn!(
                    device_id = %device.device_id,
                    name = %device.name,
                    "Duplicate device id in discovery pass, keeping the first"
                );
                continue;
            }
            inner.order.push(device.device_id.clone());
            inner
                .devices
                .insert(device.device_id.clone(), Arc::new(Mutex::new(device)));
        }
        drop(inner);

        // A rebuild carries fresh tokens, so the invalidation guard re-arms.
        self.invalidated_this_cycle.store(false, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Begin a poll cycle: re-arm the invalidation guard and return the
    /// new generation for staleness checks.
    pub fn begin_cycle(&self) -> u64 {
        self.invalidated_this_cycle.store(false, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The current generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Clear the entire device list so the next cycle re-discovers the
    /// fleet with fresh tokens.
    ///
    /// At most one invalidation happens per cycle: concurrent auth
    /// failures race on a compare-and-set and only the winner clears.
    /// Returns whether this call performed the clear.
    pub async fn invalidate_fleet(&self) -> bool {
        if self
            .invalidated_this_cycle
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let mut inner = self.inner.write().await;
        inner.order.clear();
        inner.devices.clear();
        drop(inner);

        // Supersede any in-flight results from this cycle.
        self.generation.fetch_add(1, Ordering::SeqCst);
        debug!("Fleet invalidated, next cycle will re-discover devices");
        true
    }

    /// Look up a device by id.
    pub async fn get(&self, device_id: &str) -> Option<SharedDevice> {
        self.inner.read().await.devices.get(device_id).cloned()
    }

    /// Ids of all known devices, in insertion order.
    pub async fn device_ids(&self) -> Vec<String> {
        self.inner.read().await.order.clone()
    }

    /// Number of known devices.
    pub async fn len(&self) -> usize {
        self.inner.read().await.devices.len()
    }

    /// Whether the registry holds no devices.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.devices.is_empty()
    }

    /// Mark one device unavailable without touching its other state.
    pub async fn mark_unavailable(&self, device_id: &str) {
        if let Some(device) = self.get(device_id).await {
            device.lock().await.available = false;
        }
    }

    /// Cloned snapshot of all devices, in insertion order.
    ///
    /// Device locks are taken one at a time, so a snapshot never blocks
    /// concurrent mutation of other devices.
    pub async fn snapshot(&self) -> Vec<CastDevice> {
        let shared: Vec<SharedDevice> = {
            let inner = self.inner.read().await;
            inner
                .order
                .iter()
                .filter_map(|id| inner.devices.get(id).cloned())
                .collect()
        };

        let mut snapshot = Vec::with_capacity(shared.len());
        for device in shared {
            snapshot.push(device.lock().await.clone());
        }
        snapshot
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("generation", &self.generation())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str) -> CastDevice {
        CastDevice::new(id, format!("Device {id}"), None, None, None)
    }

    #[tokio::test]
    async fn test_replace_all_deduplicates_by_id() {
        let registry = DeviceRegistry::new();
        registry
            .replace_all(vec![device("a"), device("b"), device("a")])
            .await;

        assert_eq!(registry.len().await, 2);
        assert_eq!(registry.device_ids().await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_snapshot_preserves_insertion_order() {
        let registry = DeviceRegistry::new();
        registry
            .replace_all(vec![device("c"), device("a"), device("b")])
            .await;

        let ids: Vec<String> = registry
            .snapshot()
            .await
            .into_iter()
            .map(|d| d.device_id)
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_invalidate_fleet_clears_all_devices() {
        let registry = DeviceRegistry::new();
        registry.replace_all(vec![device("a"), device("b")]).await;
        registry.begin_cycle();

        assert!(registry.invalidate_fleet().await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalidation_happens_once_per_cycle() {
        let registry = DeviceRegistry::new();
        registry.replace_all(vec![device("a")]).await;
        registry.begin_cycle();

        assert!(registry.invalidate_fleet().await);
        assert!(!registry.invalidate_fleet().await);
        assert!(!registry.invalidate_fleet().await);

        // A new cycle re-arms the guard.
        registry.begin_cycle();
        assert!(registry.invalidate_fleet().await);
    }

    #[tokio::test]
    async fn test_concurrent_invalidations_clear_exactly_once() {
        let registry = Arc::new(DeviceRegistry::new());
        registry.replace_all(vec![device("a")]).await;
        registry.begin_cycle();
        let before = registry.generation();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.invalidate_fleet().await })
            })
            .collect();

        let mut cleared = 0;
        for task in tasks {
            if task.await.unwrap() {
                cleared += 1;
            }
        }

        assert_eq!(cleared, 1);
        assert_eq!(registry.generation(), before + 1);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_mark_unavailable_touches_only_that_device() {
        let registry = DeviceRegistry::new();
        registry.replace_all(vec![device("a"), device("b")]).await;

        registry.mark_unavailable("a").await;

        let snapshot = registry.snapshot().await;
        assert!(!snapshot[0].available);
        assert!(snapshot[1].available);
    }

    #[tokio::test]
    async fn test_generation_moves_forward() {
        let registry = DeviceRegistry::new();
        let g0 = registry.generation();

        registry.replace_all(vec![device("a")]).await;
        let g1 = registry.generation();
        assert!(g1 > g0);

        let g2 = registry.begin_cycle();
        assert!(g2 > g1);
        assert_eq!(registry.generation(), g2);
    }
}
