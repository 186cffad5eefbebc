//! Poll orchestration across the device fleet.
//!
//! One [`Poller::run_cycle`] call refreshes every pollable device:
//! concurrently across devices, sequentially within a device (the three
//! state reads rewrite different slices of the same record). One device's
//! failure never blocks or fails the cycle for the others; the only
//! cross-device effect is fleet-wide token invalidation on an auth
//! failure, which happens at most once per cycle.
//!
//! This engine performs no internal retry or backoff. Callers needing
//! resilience add it at the scheduling layer; the next scheduled cycle is
//! the retry.

use std::sync::Arc;

use futures::future::join_all;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use homecast_types::{CastDevice, ItemId};

use crate::client::{ClockData, ControlSurface, PollTarget};
use crate::error::{Error, Result};
use crate::registry::{DeviceRegistry, SharedDevice};

/// Configuration for the poller.
#[derive(Debug, Clone, Default)]
pub struct PollerConfig {
    /// Optional cap on concurrent device polls. The baseline design fans
    /// out one task per pollable device; large fleets can bound that here.
    pub max_concurrency: Option<usize>,
}

impl PollerConfig {
    /// Create a config with defaults (unbounded fan-out).
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of devices polled concurrently.
    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit.max(1));
        self
    }
}

/// State gathered for one device during a cycle, committed in a single
/// critical section so a cancelled or superseded cycle never leaves the
/// record half-updated.
#[derive(Debug, Default)]
struct StagedState {
    available: bool,
    clocks: Option<ClockData>,
    volume: Option<u8>,
    do_not_disturb: Option<bool>,
}

enum DeviceOutcome {
    Completed,
    Unauthorized,
    Cancelled,
}

/// Orchestrates poll cycles and on-demand write operations.
pub struct Poller {
    registry: Arc<DeviceRegistry>,
    control: Arc<dyn ControlSurface>,
    config: PollerConfig,
}

impl Poller {
    /// Create a poller with default configuration.
    pub fn new(registry: Arc<DeviceRegistry>, control: Arc<dyn ControlSurface>) -> Self {
        Self::with_config(registry, control, PollerConfig::default())
    }

    /// Create a poller with custom configuration.
    pub fn with_config(
        registry: Arc<DeviceRegistry>,
        control: Arc<dyn ControlSurface>,
        config: PollerConfig,
    ) -> Self {
        Self {
            registry,
            control,
            config,
        }
    }

    /// The registry this poller feeds.
    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// Run one refresh cycle and return the updated device list.
    pub async fn run_cycle(&self) -> Vec<CastDevice> {
        self.run_cycle_with_cancel(CancellationToken::new()).await
    }

    /// Run one refresh cycle under a cancellation token.
    ///
    /// Cancellation abandons in-flight requests; a device whose calls were
    /// cut short is left exactly as the previous cycle wrote it.
    pub async fn run_cycle_with_cancel(&self, cancel: CancellationToken) -> Vec<CastDevice> {
        let generation = self.registry.begin_cycle();

        // Partition: devices without an IP address and token are marked
        // unavailable right away, with no network call, and stay in the
        // registry for the next discovery pass to refresh.
        let mut targets = Vec::new();
        for device_id in self.registry.device_ids().await {
            let Some(shared) = self.registry.get(&device_id).await else {
                continue;
            };
            let mut device = shared.lock().await;
            match PollTarget::from_device(&device) {
                Ok(target) => targets.push(target),
                Err(err) => {
                    if device.available {
                        debug!(
                            device = %device.name,
                            %err,
                            "Cannot fetch state: device is offline or not compatible, will try again later"
                        );
                    }
                    device.available = false;
                }
            }
        }

        debug!(pollable = targets.len(), "Starting poll cycle");

        let polls = targets
            .into_iter()
            .map(|target| self.poll_device(target, generation, cancel.clone()));

        match self.config.max_concurrency {
            Some(limit) => {
                stream::iter(polls)
                    .buffer_unordered(limit)
                    .collect::<Vec<_>>()
                    .await;
            }
            None => {
                join_all(polls).await;
            }
        }

        self.registry.snapshot().await
    }

    /// Poll one device: three sequential reads, then a single commit.
    async fn poll_device(&self, target: PollTarget, generation: u64, cancel: CancellationToken) {
        let mut staged = StagedState {
            available: true,
            ..StagedState::default()
        };

        match self.collect_device_state(&target, &mut staged, &cancel).await {
            DeviceOutcome::Completed => {}
            DeviceOutcome::Cancelled => {
                debug!(device = %target.name, "Poll cancelled, discarding partial state");
                return;
            }
            DeviceOutcome::Unauthorized => {
                if self.registry.invalidate_fleet().await {
                    debug!(
                        device = %target.name,
                        "Auth failure during polling, cleared fleet to force token refresh"
                    );
                }
                return;
            }
        }

        if cancel.is_cancelled() {
            debug!(device = %target.name, "Poll cancelled, discarding completed state");
            return;
        }

        // Last-cycle-wins: a newer cycle or an invalidation supersedes
        // this result.
        if self.registry.generation() != generation {
            debug!(device = %target.name, "Dropping stale poll result from an earlier cycle");
            return;
        }

        let Some(shared) = self.registry.get(&target.device_id).await else {
            return;
        };
        let mut device = shared.lock().await;
        device.available = staged.available;
        if let Some(clocks) = staged.clocks {
            device.set_alarms(clocks.alarms);
            device.set_timers(clocks.timers);
        }
        if let Some(volume) = staged.volume {
            device.alarm_volume = volume;
        }
        if let Some(do_not_disturb) = staged.do_not_disturb {
            device.do_not_disturb = do_not_disturb;
        }
    }

    /// The three per-device reads, sequential so no two writers race on
    /// the same record's slices.
    async fn collect_device_state(
        &self,
        target: &PollTarget,
        staged: &mut StagedState,
        cancel: &CancellationToken,
    ) -> DeviceOutcome {
        let result = tokio::select! {
            _ = cancel.cancelled() => return DeviceOutcome::Cancelled,
            result = self.control.fetch_clocks(target) => result,
        };
        match result {
            Ok(clocks) => staged.clocks = Some(clocks),
            Err(Error::Unauthorized) => return DeviceOutcome::Unauthorized,
            Err(err) => note_failure(&target.name, "alarms and timers", &err, staged),
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => return DeviceOutcome::Cancelled,
            result = self.control.fetch_alarm_volume(target) => result,
        };
        match result {
            Ok(volume) => staged.volume = Some(volume),
            Err(Error::Unauthorized) => return DeviceOutcome::Unauthorized,
            Err(err) => note_failure(&target.name, "alarm volume", &err, staged),
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => return DeviceOutcome::Cancelled,
            result = self.control.fetch_do_not_disturb(target) => result,
        };
        match result {
            Ok(enabled) => staged.do_not_disturb = Some(enabled),
            Err(Error::Unauthorized) => return DeviceOutcome::Unauthorized,
            Err(err) => note_failure(&target.name, "do-not-disturb", &err, staged),
        }

        DeviceOutcome::Completed
    }

    // ======================================================================
    // Write path: on-demand operations, not part of the scheduled cycle.
    // A successful write does not force a re-poll; the caller decides.
    // ======================================================================

    /// Set the alarm volume (0-100) on one device.
    pub async fn set_alarm_volume(&self, device_id: &str, percent: u8) -> Result<()> {
        let percent = percent.min(100);
        let (shared, target) = self.writable_target(device_id).await?;

        match self.control.set_alarm_volume(&target, percent).await {
            Ok(()) => {
                let mut device = shared.lock().await;
                device.alarm_volume = percent;
                device.available = true;
                debug!(device = %target.name, percent, "Alarm volume set");
                Ok(())
            }
            Err(err) => Err(self.write_failed(&target, err).await),
        }
    }

    /// Enable or disable do-not-disturb on one device.
    pub async fn set_do_not_disturb(&self, device_id: &str, enabled: bool) -> Result<()> {
        let (shared, target) = self.writable_target(device_id).await?;

        match self.control.set_do_not_disturb(&target, enabled).await {
            Ok(()) => {
                let mut device = shared.lock().await;
                device.do_not_disturb = enabled;
                device.available = true;
                debug!(device = %target.name, enabled, "Do-not-disturb set");
                Ok(())
            }
            Err(err) => Err(self.write_failed(&target, err).await),
        }
    }

    /// Delete an alarm or timer on one device.
    ///
    /// The id is validated locally first; a malformed id is rejected with
    /// [`Error::InvalidItemId`] and zero network calls. Returns whether
    /// the device confirmed the deletion. The cached alarm/timer lists are
    /// refreshed by the next cycle, not here.
    pub async fn delete_item(&self, device_id: &str, raw_id: &str) -> Result<bool> {
        let item = ItemId::parse(raw_id).map_err(Error::from)?;
        let (_shared, target) = self.writable_target(device_id).await?;

        match self.control.delete_item(&target, &item).await {
            Ok(confirmed) => {
                if !confirmed {
                    error!(
                        device = %target.name,
                        kind = %item.kind(),
                        "Device did not confirm the deletion"
                    );
                }
                Ok(confirmed)
            }
            Err(err) => Err(self.write_failed(&target, err).await),
        }
    }

    /// Reboot one device. Devices without reboot support still report
    /// success.
    pub async fn reboot(&self, device_id: &str) -> Result<()> {
        let (_shared, target) = self.writable_target(device_id).await?;

        match self.control.reboot(&target).await {
            Ok(()) => {
                debug!(device = %target.name, "Device asked to reboot");
                Ok(())
            }
            Err(err) => Err(self.write_failed(&target, err).await),
        }
    }

    async fn writable_target(&self, device_id: &str) -> Result<(SharedDevice, PollTarget)> {
        let shared = self
            .registry
            .get(device_id)
            .await
            .ok_or_else(|| Error::UnknownDevice {
                device_id: device_id.to_string(),
            })?;
        let target = {
            let device = shared.lock().await;
            PollTarget::from_device(&device)?
        };
        Ok((shared, target))
    }

    /// Convert a write failure into registry effects, then hand the error
    /// back to the caller.
    async fn write_failed(&self, target: &PollTarget, err: Error) -> Error {
        if err.is_auth_failure() {
            if self.registry.invalidate_fleet().await {
                warn!(
                    device = %target.name,
                    "Auth failure on a write, cleared fleet to force token refresh"
                );
            }
        } else if err.marks_unavailable() {
            self.registry.mark_unavailable(&target.device_id).await;
        }
        err
    }
}

/// Record a per-call failure against the staged state. Malformed bodies
/// arrived over a working connection, so they discard only that call's
/// slice; transport and status failures mark the device unavailable.
fn note_failure(device_name: &str, what: &str, err: &Error, staged: &mut StagedState) {
    if err.marks_unavailable() {
        staged.available = false;
    }
    match err {
        Error::MalformedResponse { .. } | Error::Parse(_) => {
            error!(device = %device_name, what, %err, "Discarding unparseable device state");
        }
        _ => {
            debug!(device = %device_name, what, %err, "Call failed, state slice left unchanged");
        }
    }
}
