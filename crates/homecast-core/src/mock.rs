//! Mock control surface for testing.
//!
//! Implements [`ControlSurface`] without any network, so registry and
//! poller behavior can be exercised deterministically:
//!
//! - **Scripted state**: per-device alarms/timers, volume, and DND
//! - **Failure injection**: make every call for a device fail a given way
//! - **Latency simulation**: artificial delay for cancellation tests
//! - **Call counting**: verify which devices were (not) contacted

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use homecast_types::ItemId;

use crate::client::{ClockData, ControlSurface, PollTarget};
use crate::error::{Error, Result};

/// How an injected failure should present itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// HTTP 401: the token was rejected.
    Unauthorized,
    /// HTTP 404: endpoint unsupported by this hardware.
    NotFound,
    /// Connection refused / device offline.
    Unreachable,
    /// Request timed out.
    Timeout,
    /// An unexpected status code.
    UnexpectedStatus(u16),
    /// A 200 whose body is missing required fields.
    Malformed,
}

impl MockFailure {
    fn to_error(self, endpoint: &str) -> Error {
        match self {
            MockFailure::Unauthorized => Error::Unauthorized,
            MockFailure::NotFound => Error::NotFound {
                endpoint: endpoint.to_string(),
            },
            MockFailure::Unreachable => Error::Unreachable {
                message: "connection refused".to_string(),
            },
            MockFailure::Timeout => Error::timeout(endpoint, Duration::from_secs(2)),
            MockFailure::UnexpectedStatus(status) => Error::UnexpectedStatus {
                status,
                body: "mock failure".to_string(),
            },
            MockFailure::Malformed => Error::malformed(endpoint, "missing expected fields"),
        }
    }
}

struct DeviceScript {
    clocks: ClockData,
    volume: u8,
    do_not_disturb: bool,
    delete_confirmed: bool,
    failure: Option<MockFailure>,
    requests: u32,
}

impl Default for DeviceScript {
    fn default() -> Self {
        Self {
            clocks: ClockData::default(),
            volume: 0,
            do_not_disturb: false,
            delete_confirmed: true,
            failure: None,
            requests: 0,
        }
    }
}

/// A scripted, in-memory control surface.
#[derive(Default)]
pub struct MockControl {
    scripts: RwLock<HashMap<String, DeviceScript>>,
    total_requests: AtomicU32,
    latency_ms: AtomicU64,
}

impl MockControl {
    /// Create a mock with no scripted devices; unscripted devices answer
    /// with empty defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the alarms and timers a device reports.
    pub async fn script_clocks(&self, device_id: &str, clocks: ClockData) {
        self.scripts
            .write()
            .await
            .entry(device_id.to_string())
            .or_default()
            .clocks = clocks;
    }

    /// Script the alarm volume a device reports.
    pub async fn script_volume(&self, device_id: &str, percent: u8) {
        self.scripts
            .write()
            .await
            .entry(device_id.to_string())
            .or_default()
            .volume = percent;
    }

    /// Script the do-not-disturb flag a device reports.
    pub async fn script_do_not_disturb(&self, device_id: &str, enabled: bool) {
        self.scripts
            .write()
            .await
            .entry(device_id.to_string())
            .or_default()
            .do_not_disturb = enabled;
    }

    /// Script whether the device confirms deletions.
    pub async fn script_delete_result(&self, device_id: &str, confirmed: bool) {
        self.scripts
            .write()
            .await
            .entry(device_id.to_string())
            .or_default()
            .delete_confirmed = confirmed;
    }

    /// Make every call for a device fail the given way.
    pub async fn fail_device(&self, device_id: &str, failure: MockFailure) {
        self.scripts
            .write()
            .await
            .entry(device_id.to_string())
            .or_default()
            .failure = Some(failure);
    }

    /// Remove an injected failure.
    pub async fn clear_failure(&self, device_id: &str) {
        if let Some(script) = self.scripts.write().await.get_mut(device_id) {
            script.failure = None;
        }
    }

    /// Add artificial latency to every call.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Total calls across all devices.
    pub fn request_count(&self) -> u32 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Calls made for one device.
    pub async fn requests_for(&self, device_id: &str) -> u32 {
        self.scripts
            .read()
            .await
            .get(device_id)
            .map_or(0, |script| script.requests)
    }

    /// Count the call, apply latency, and raise any injected failure.
    async fn begin(&self, target: &PollTarget, endpoint: &str) -> Result<()> {
        let latency = self.latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let mut scripts = self.scripts.write().await;
        let script = scripts.entry(target.device_id.clone()).or_default();
        script.requests += 1;
        match script.failure {
            Some(failure) => Err(failure.to_error(endpoint)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ControlSurface for MockControl {
    async fn fetch_clocks(&self, target: &PollTarget) -> Result<ClockData> {
        self.begin(target, "setup/assistant/alarms").await?;
        Ok(self
            .scripts
            .read()
            .await
            .get(&target.device_id)
            .map(|script| script.clocks.clone())
            .unwrap_or_default())
    }

    async fn fetch_alarm_volume(&self, target: &PollTarget) -> Result<u8> {
        self.begin(target, "setup/assistant/alarms/volume").await?;
        Ok(self
            .scripts
            .read()
            .await
            .get(&target.device_id)
            .map_or(0, |script| script.volume))
    }

    async fn set_alarm_volume(&self, target: &PollTarget, percent: u8) -> Result<()> {
        self.begin(target, "setup/assistant/alarms/volume").await?;
        self.script_volume(&target.device_id, percent).await;
        Ok(())
    }

    async fn fetch_do_not_disturb(&self, target: &PollTarget) -> Result<bool> {
        self.begin(target, "setup/assistant/notifications").await?;
        Ok(self
            .scripts
            .read()
            .await
            .get(&target.device_id)
            .is_some_and(|script| script.do_not_disturb))
    }

    async fn set_do_not_disturb(&self, target: &PollTarget, enabled: bool) -> Result<()> {
        self.begin(target, "setup/assistant/notifications").await?;
        self.script_do_not_disturb(&target.device_id, enabled).await;
        Ok(())
    }

    async fn delete_item(&self, target: &PollTarget, _item: &ItemId) -> Result<bool> {
        self.begin(target, "setup/assistant/alarms/delete").await?;
        Ok(self
            .scripts
            .read()
            .await
            .get(&target.device_id)
            .is_none_or(|script| script.delete_confirmed))
    }

    async fn reboot(&self, target: &PollTarget) -> Result<()> {
        self.begin(target, "setup/reboot").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(device_id: &str) -> PollTarget {
        PollTarget {
            device_id: device_id.to_string(),
            name: format!("Device {device_id}"),
            ip_address: "192.168.1.10".parse().unwrap(),
            auth_token: "token".to_string(),
        }
    }

    #[tokio::test]
    async fn test_mock_returns_scripted_state() {
        let mock = MockControl::new();
        mock.script_volume("a", 70).await;
        mock.script_do_not_disturb("a", true).await;

        assert_eq!(mock.fetch_alarm_volume(&target("a")).await.unwrap(), 70);
        assert!(mock.fetch_do_not_disturb(&target("a")).await.unwrap());
        assert_eq!(mock.request_count(), 2);
        assert_eq!(mock.requests_for("a").await, 2);
    }

    #[tokio::test]
    async fn test_mock_unscripted_device_answers_defaults() {
        let mock = MockControl::new();
        let clocks = mock.fetch_clocks(&target("nobody")).await.unwrap();
        assert!(clocks.alarms.is_empty());
        assert!(clocks.timers.is_empty());
    }

    #[tokio::test]
    async fn test_mock_failure_injection_and_clear() {
        let mock = MockControl::new();
        mock.fail_device("a", MockFailure::NotFound).await;

        let err = mock.fetch_clocks(&target("a")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));

        mock.clear_failure("a").await;
        assert!(mock.fetch_clocks(&target("a")).await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_writes_update_scripted_state() {
        let mock = MockControl::new();
        mock.set_alarm_volume(&target("a"), 33).await.unwrap();
        assert_eq!(mock.fetch_alarm_volume(&target("a")).await.unwrap(), 33);
    }
}
