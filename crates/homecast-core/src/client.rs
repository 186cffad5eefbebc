//! Token-gated HTTPS client for the device's local control surface.
//!
//! Requests target `https://{ip}:8443/{endpoint}` with the device's local
//! auth token in a custom header. The devices present self-signed
//! certificates, so TLS verification is disabled. Timeouts are short and
//! fixed: these are LAN calls to embedded hardware, and the next scheduled
//! poll cycle is the retry — this client never retries on its own.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, header::CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, warn};

use homecast_types::{
    Alarm, AlarmPayload, CastDevice, ItemId, Timer, TimerPayload, fraction_to_volume,
    volume_to_fraction,
};

use crate::endpoints::{
    CONTROL_PORT, DEFAULT_TIMEOUT, ENDPOINT_ALARM_DELETE, ENDPOINT_ALARM_VOLUME, ENDPOINT_ALARMS,
    ENDPOINT_DO_NOT_DISTURB, ENDPOINT_REBOOT, HEADER_LOCAL_AUTH, MAX_TIMEOUT, MIN_TIMEOUT,
};
use crate::error::{Error, Result};

/// The data a request needs from a device record: identity plus the
/// network coordinates that make it pollable.
#[derive(Debug, Clone)]
pub struct PollTarget {
    /// Stable device identifier.
    pub device_id: String,
    /// Display name, for logging.
    pub name: String,
    /// Local IP address.
    pub ip_address: IpAddr,
    /// Local auth token.
    pub auth_token: String,
}

impl PollTarget {
    /// Extract a poll target from a device record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingIpAddress`] or [`Error::MissingAuthToken`]
    /// if the device cannot be addressed.
    pub fn from_device(device: &CastDevice) -> Result<Self> {
        let ip_address = device.ip_address.ok_or_else(|| Error::MissingIpAddress {
            device: device.name.clone(),
        })?;
        let auth_token = device
            .auth_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::MissingAuthToken {
                device: device.name.clone(),
            })?
            .to_string();

        Ok(Self {
            device_id: device.device_id.clone(),
            name: device.name.clone(),
            ip_address,
            auth_token,
        })
    }
}

/// Alarms and timers fetched in a single call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClockData {
    /// Alarms, replacing the device's list wholesale.
    pub alarms: Vec<Alarm>,
    /// Timers, replacing the device's list wholesale.
    pub timers: Vec<Timer>,
}

/// Abstraction over the device control surface.
///
/// The orchestrator talks to devices exclusively through this trait, so
/// tests can drive it with [`crate::mock::MockControl`] instead of real
/// hardware.
#[async_trait]
pub trait ControlSurface: Send + Sync {
    /// Fetch alarms and timers.
    async fn fetch_clocks(&self, target: &PollTarget) -> Result<ClockData>;

    /// Fetch the alarm volume as a percentage (0-100).
    async fn fetch_alarm_volume(&self, target: &PollTarget) -> Result<u8>;

    /// Set the alarm volume from a percentage (0-100).
    async fn set_alarm_volume(&self, target: &PollTarget, percent: u8) -> Result<()>;

    /// Fetch the do-not-disturb flag.
    async fn fetch_do_not_disturb(&self, target: &PollTarget) -> Result<bool>;

    /// Enable or disable do-not-disturb.
    async fn set_do_not_disturb(&self, target: &PollTarget, enabled: bool) -> Result<()>;

    /// Delete an alarm or timer by validated id. Returns whether the
    /// device confirmed the deletion.
    async fn delete_item(&self, target: &PollTarget, item: &ItemId) -> Result<bool>;

    /// Ask the device to reboot. Devices without reboot support still
    /// return success.
    async fn reboot(&self, target: &PollTarget) -> Result<()>;
}

/// Options for the HTTPS client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Per-request timeout, clamped to 2-10 seconds.
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-request timeout. Values outside 2-10 seconds are clamped.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.clamp(MIN_TIMEOUT, MAX_TIMEOUT);
        self
    }
}

/// HTTPS client for the local control surface.
#[derive(Debug, Clone)]
pub struct CastClient {
    http: Client,
    options: ClientOptions,
}

/// Build the control URL for an endpoint. All requests go to the fixed
/// control port, regardless of any port value attached to the device.
fn control_url(ip_address: IpAddr, endpoint: &str) -> String {
    match ip_address {
        IpAddr::V4(ip) => format!("https://{}:{}/{}", ip, CONTROL_PORT, endpoint),
        IpAddr::V6(ip) => format!("https://[{}]:{}/{}", ip, CONTROL_PORT, endpoint),
    }
}

impl CastClient {
    /// Create a client with default options.
    pub fn new() -> Result<Self> {
        Self::with_options(ClientOptions::default())
    }

    /// Create a client with custom options.
    pub fn with_options(options: ClientOptions) -> Result<Self> {
        // Devices present self-signed certificates with non-matching names.
        let http = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(options.timeout)
            .build()
            .map_err(|e| Error::Unreachable {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { http, options })
    }

    /// The configured per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        self.options.timeout
    }

    /// Shared request path: build the URL, attach the auth header, issue
    /// the request, and classify the outcome.
    ///
    /// A 200 with an empty or non-JSON body is an empty success
    /// (`Ok(None)`), not an error. `polling` selects log severity for
    /// transport failures: routine polling logs at debug, user-initiated
    /// writes at warn.
    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        target: &PollTarget,
        body: Option<serde_json::Value>,
        polling: bool,
    ) -> Result<Option<serde_json::Value>> {
        let url = control_url(target.ip_address, endpoint);
        debug!(device = %target.name, %url, "Requesting control endpoint");

        let mut request = self
            .http
            .request(method, &url)
            .header(HEADER_LOCAL_AUTH, &target.auth_token)
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                debug!(device = %target.name, endpoint, "Device timed out");
                return Err(Error::timeout(endpoint, self.options.timeout));
            }
            Err(err) => {
                if polling {
                    debug!(device = %target.name, %err, "Failed to connect to device, probably offline");
                } else {
                    warn!(device = %target.name, %err, "Failed to connect to device, probably offline");
                }
                return Err(Error::Unreachable {
                    message: err.to_string(),
                });
            }
        };

        let status = response.status();
        if status == StatusCode::OK {
            let value = response
                .bytes()
                .await
                .ok()
                .and_then(|bytes| serde_json::from_slice(&bytes).ok());
            Ok(value)
        } else if status == StatusCode::UNAUTHORIZED {
            // Token is invalid; the caller forces rediscovery with fresh
            // tokens for the whole fleet.
            if polling {
                debug!(
                    device = %target.name,
                    "Invalid token while polling; fleet tokens will be refreshed"
                );
            } else {
                warn!(
                    device = %target.name,
                    "Invalid token on a write; fleet tokens will be refreshed, retry later"
                );
            }
            Err(Error::Unauthorized)
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                device = %target.name,
                endpoint,
                "Endpoint not supported; device is possibly not assistant-capable"
            );
            Err(Error::NotFound {
                endpoint: endpoint.to_string(),
            })
        } else {
            let body = response.text().await.unwrap_or_default();
            error!(device = %target.name, %status, %body, "Unexpected response status");
            Err(Error::UnexpectedStatus {
                status: status.as_u16(),
                body,
            })
        }
    }
}

// ==========================================================================
// Response envelopes
// ==========================================================================

#[derive(Debug, Deserialize)]
struct ClocksResponse {
    alarm: Vec<AlarmPayload>,
    timer: Vec<TimerPayload>,
}

#[derive(Debug, Deserialize)]
struct VolumeResponse {
    volume: f64,
}

#[derive(Debug, Deserialize)]
struct NotificationsResponse {
    notifications_enabled: bool,
}

#[derive(Debug, Deserialize)]
struct DeleteResponse {
    success: bool,
}

/// Deserialize a read response, requiring a body with the expected fields.
fn parse_body<T: serde::de::DeserializeOwned>(
    endpoint: &str,
    body: Option<serde_json::Value>,
) -> Result<T> {
    let value = body.ok_or_else(|| Error::malformed(endpoint, "empty response body"))?;
    serde_json::from_value(value).map_err(|e| Error::malformed(endpoint, e.to_string()))
}

fn parse_clocks(endpoint: &str, body: Option<serde_json::Value>) -> Result<ClockData> {
    let response: ClocksResponse = parse_body(endpoint, body)?;

    let alarms = response
        .alarm
        .into_iter()
        .map(Alarm::try_from)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let timers = response
        .timer
        .into_iter()
        .map(Timer::try_from)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(ClockData { alarms, timers })
}

#[async_trait]
impl ControlSurface for CastClient {
    async fn fetch_clocks(&self, target: &PollTarget) -> Result<ClockData> {
        let body = self
            .request(Method::GET, ENDPOINT_ALARMS, target, None, true)
            .await?;
        let clocks = parse_clocks(ENDPOINT_ALARMS, body)?;
        debug!(
            device = %target.name,
            alarms = clocks.alarms.len(),
            timers = clocks.timers.len(),
            "Retrieved alarms and timers"
        );
        Ok(clocks)
    }

    async fn fetch_alarm_volume(&self, target: &PollTarget) -> Result<u8> {
        let body = self
            .request(Method::POST, ENDPOINT_ALARM_VOLUME, target, None, true)
            .await?;
        let response: VolumeResponse = parse_body(ENDPOINT_ALARM_VOLUME, body)?;
        let percent = fraction_to_volume(response.volume);
        debug!(device = %target.name, percent, raw = response.volume, "Received alarm volume");
        Ok(percent)
    }

    async fn set_alarm_volume(&self, target: &PollTarget, percent: u8) -> Result<()> {
        let fraction = volume_to_fraction(percent);
        debug!(device = %target.name, percent, fraction, "Setting alarm volume");
        self.request(
            Method::POST,
            ENDPOINT_ALARM_VOLUME,
            target,
            Some(json!({ "volume": fraction })),
            false,
        )
        .await?;
        Ok(())
    }

    async fn fetch_do_not_disturb(&self, target: &PollTarget) -> Result<bool> {
        let body = self
            .request(Method::POST, ENDPOINT_DO_NOT_DISTURB, target, None, true)
            .await?;
        let response: NotificationsResponse = parse_body(ENDPOINT_DO_NOT_DISTURB, body)?;
        // The wire flag is inverted: notifications enabled means DND off.
        let enabled = !response.notifications_enabled;
        debug!(device = %target.name, enabled, "Received do-not-disturb setting");
        Ok(enabled)
    }

    async fn set_do_not_disturb(&self, target: &PollTarget, enabled: bool) -> Result<()> {
        debug!(device = %target.name, enabled, "Setting do-not-disturb");
        self.request(
            Method::POST,
            ENDPOINT_DO_NOT_DISTURB,
            target,
            Some(json!({ "notifications_enabled": !enabled })),
            false,
        )
        .await?;
        Ok(())
    }

    async fn delete_item(&self, target: &PollTarget, item: &ItemId) -> Result<bool> {
        debug!(device = %target.name, kind = %item.kind(), id = %item, "Deleting item");
        let body = self
            .request(
                Method::POST,
                ENDPOINT_ALARM_DELETE,
                target,
                Some(json!({ "ids": [item.as_str()] })),
                false,
            )
            .await?;
        let response: DeleteResponse = parse_body(ENDPOINT_ALARM_DELETE, body)?;
        if !response.success {
            warn!(device = %target.name, kind = %item.kind(), "Device refused the deletion");
        }
        Ok(response.success)
    }

    async fn reboot(&self, target: &PollTarget) -> Result<()> {
        debug!(device = %target.name, "Asking device to reboot");
        // "now" reboots; devices without reboot support still answer 200.
        self.request(
            Method::POST,
            ENDPOINT_REBOOT,
            target,
            Some(json!({ "params": "now" })),
            false,
        )
        .await?;
        Ok(())
    }
}
