//! Core types for locally controlled smart-speaker devices.

use core::fmt;
use std::net::IpAddr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::ParseError;

/// Total length of a valid alarm/timer deletion id, prefix included.
pub const ITEM_ID_LENGTH: usize = 42;

/// Status of an alarm as reported by the device.
///
/// Wire codes map 1:1 onto the variants; an out-of-range code is a hard
/// parse error (see [`ParseError::UnknownAlarmStatus`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum AlarmStatus {
    /// No alarm state.
    None = 0,
    /// Alarm is scheduled.
    Set = 1,
    /// Alarm is currently ringing.
    Ringing = 2,
    /// Alarm was snoozed.
    Snoozed = 3,
    /// Alarm is disabled.
    Inactive = 4,
    /// Alarm fired without being dismissed.
    Missed = 5,
}

impl AlarmStatus {
    /// Lowercase label, matching what rendering layers expose.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmStatus::None => "none",
            AlarmStatus::Set => "set",
            AlarmStatus::Ringing => "ringing",
            AlarmStatus::Snoozed => "snoozed",
            AlarmStatus::Inactive => "inactive",
            AlarmStatus::Missed => "missed",
        }
    }
}

impl TryFrom<i64> for AlarmStatus {
    type Error = ParseError;

    /// Convert a wire status code to an [`AlarmStatus`].
    ///
    /// # Examples
    ///
    /// ```
    /// use homecast_types::AlarmStatus;
    ///
    /// assert_eq!(AlarmStatus::try_from(1), Ok(AlarmStatus::Set));
    /// assert!(AlarmStatus::try_from(6).is_err());
    /// ```
    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AlarmStatus::None),
            1 => Ok(AlarmStatus::Set),
            2 => Ok(AlarmStatus::Ringing),
            3 => Ok(AlarmStatus::Snoozed),
            4 => Ok(AlarmStatus::Inactive),
            5 => Ok(AlarmStatus::Missed),
            other => Err(ParseError::UnknownAlarmStatus(other)),
        }
    }
}

impl fmt::Display for AlarmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a timer as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum TimerStatus {
    /// No timer state.
    None = 0,
    /// Timer is counting down.
    Set = 1,
    /// Timer is paused and has no fire time.
    Paused = 2,
    /// Timer is currently ringing.
    Ringing = 3,
}

impl TimerStatus {
    /// Lowercase label, matching what rendering layers expose.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerStatus::None => "none",
            TimerStatus::Set => "set",
            TimerStatus::Paused => "paused",
            TimerStatus::Ringing => "ringing",
        }
    }
}

impl TryFrom<i64> for TimerStatus {
    type Error = ParseError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TimerStatus::None),
            1 => Ok(TimerStatus::Set),
            2 => Ok(TimerStatus::Paused),
            3 => Ok(TimerStatus::Ringing),
            other => Err(ParseError::UnknownTimerStatus(other)),
        }
    }
}

impl fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Convert a wire timestamp in milliseconds to whole seconds,
/// rounding to the nearest second.
#[must_use]
pub fn ms_to_s(milliseconds: i64) -> i64 {
    (milliseconds + 500).div_euclid(1000)
}

/// Format a span of whole seconds as `H:MM:SS` (hours unpadded).
///
/// # Examples
///
/// ```
/// use homecast_types::format_duration;
///
/// assert_eq!(format_duration(300), "0:05:00");
/// assert_eq!(format_duration(3661), "1:01:01");
/// ```
#[must_use]
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{}:{:02}:{:02}", hours, minutes, secs)
}

/// Convert a volume percentage (0-100) to the wire fraction (0.0-1.0).
#[must_use]
pub fn volume_to_fraction(percent: u8) -> f64 {
    f64::from(percent.min(100)) / 100.0
}

/// Convert a wire volume fraction (0.0-1.0) to a percentage (0-100),
/// rounding to the nearest integer.
///
/// The wire value is a float with limited precision, so standard rounding
/// is used rather than truncation.
#[must_use]
pub fn fraction_to_volume(fraction: f64) -> u8 {
    (fraction * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Which kind of schedulable item a deletion id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ItemKind {
    /// An alarm (`alarm/...` id).
    Alarm,
    /// A timer (`timer/...` id).
    Timer,
}

impl ItemKind {
    /// The id prefix for this kind, without the separator.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Alarm => "alarm",
            ItemKind::Timer => "timer",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated alarm/timer deletion id.
///
/// Device-assigned ids have the shape `alarm/<36 hex-like chars>` or
/// `timer/<36 hex-like chars>` with a fixed total length of 42 characters.
/// Malformed ids are rejected locally, before any network call.
///
/// # Examples
///
/// ```
/// use homecast_types::{ItemId, ItemKind};
///
/// let id = ItemId::parse(&format!("alarm/{}", "a".repeat(36))).unwrap();
/// assert_eq!(id.kind(), ItemKind::Alarm);
///
/// assert!(ItemId::parse("alarm/tooshort").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ItemId {
    raw: String,
    kind: ItemKind,
}

impl ItemId {
    /// Validate a raw deletion id.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let kind = if raw.starts_with("alarm/") {
            ItemKind::Alarm
        } else if raw.starts_with("timer/") {
            ItemKind::Timer
        } else {
            return Err(ParseError::InvalidItemId {
                id: raw.to_string(),
                reason: "id must start with 'alarm/' or 'timer/'".to_string(),
            });
        };

        if raw.len() != ITEM_ID_LENGTH {
            return Err(ParseError::InvalidItemId {
                id: raw.to_string(),
                reason: format!(
                    "id must be exactly {} characters, got {}",
                    ITEM_ID_LENGTH,
                    raw.len()
                ),
            });
        }

        Ok(Self {
            raw: raw.to_string(),
            kind,
        })
    }

    /// The validated id string, as sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether this id refers to an alarm or a timer.
    #[must_use]
    pub fn kind(&self) -> ItemKind {
        self.kind
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// An alarm scheduled on a device.
///
/// Immutable once constructed; the full alarm list is replaced wholesale
/// on each poll rather than patched incrementally.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Alarm {
    /// Server-assigned id (also the deletion id).
    pub alarm_id: String,
    /// When the alarm fires, in epoch seconds.
    pub fire_time: i64,
    /// Current status.
    pub status: AlarmStatus,
    /// Optional user label.
    pub label: Option<String>,
    /// Optional recurrence descriptor (crontab-like day list).
    pub recurrence: Option<String>,
}

impl Alarm {
    /// Fire time as a UTC timestamp, if representable.
    #[must_use]
    pub fn fire_datetime(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp(self.fire_time).ok()
    }

    /// Fire time as an RFC 3339 string, for rendering layers.
    #[must_use]
    pub fn fire_time_iso(&self) -> Option<String> {
        self.fire_datetime()?.format(&Rfc3339).ok()
    }

    /// Sort key for "next alarm" ordering.
    ///
    /// Inactive and missed alarms sort as if their fire time were the
    /// maximum representable value, so they never surface as "next".
    #[must_use]
    pub fn effective_fire_time(&self) -> i64 {
        match self.status {
            AlarmStatus::Inactive | AlarmStatus::Missed => i64::MAX,
            _ => self.fire_time,
        }
    }
}

/// A timer counting down on a device.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Timer {
    /// Server-assigned id (also the deletion id).
    pub timer_id: String,
    /// When the timer fires, in epoch seconds. A paused timer has none.
    pub fire_time: Option<i64>,
    /// Original duration, rendered as `H:MM:SS`.
    pub duration: String,
    /// Current status.
    pub status: TimerStatus,
    /// Optional user label.
    pub label: Option<String>,
}

impl Timer {
    /// Fire time as a UTC timestamp, if set and representable.
    #[must_use]
    pub fn fire_datetime(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp(self.fire_time?).ok()
    }

    /// Fire time as an RFC 3339 string, for rendering layers.
    #[must_use]
    pub fn fire_time_iso(&self) -> Option<String> {
        self.fire_datetime()?.format(&Rfc3339).ok()
    }

    /// Sort key for "next timer" ordering; paused timers sort last.
    #[must_use]
    pub fn effective_fire_time(&self) -> i64 {
        self.fire_time.unwrap_or(i64::MAX)
    }
}

/// A nearby Bluetooth peer captured in a device's vicinity.
///
/// Ephemeral: rebuilt on every capture batch, never merged with prior state.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BluetoothPeer {
    /// Hardware address as captured (may be a rotating private address).
    pub mac_address: String,
    /// Signal strength in dBm; higher means closer.
    pub rssi: i16,
    /// Raw class-of-device bitfield.
    pub device_class: u32,
    /// Raw device type classification.
    pub device_type: u32,
    /// Raw expected-profiles bitfield.
    pub expected_profiles: u32,
    /// Advertised name, if any.
    pub name: Option<String>,
}

/// Local representation of a smart-speaker device.
///
/// Created once per discovery pass and mutated in place by poll results.
/// A device absent from a fresh discovery pass is dropped at the next
/// registry rebuild; devices are never individually destroyed mid-session.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CastDevice {
    /// Stable device identifier.
    pub device_id: String,
    /// Display name.
    pub name: String,
    /// Local IP address; absent means undiscovered or unreachable.
    pub ip_address: Option<IpAddr>,
    /// Local auth token; cleared fleet-wide on auth failure.
    pub auth_token: Option<String>,
    /// Hardware tag (capability hint).
    pub hardware: Option<String>,
    /// Whether the device responded to its last request.
    pub available: bool,
    /// Do-not-disturb flag.
    pub do_not_disturb: bool,
    /// Alarm volume percentage (0-100).
    pub alarm_volume: u8,
    /// Alarms, replaced wholesale each poll.
    pub alarms: Vec<Alarm>,
    /// Timers, replaced wholesale each poll.
    pub timers: Vec<Timer>,
    /// Bluetooth peers from the latest capture batch.
    pub bluetooth_peers: Vec<BluetoothPeer>,
}

impl CastDevice {
    /// Create a device record from a discovery pass.
    pub fn new(
        device_id: impl Into<String>,
        name: impl Into<String>,
        auth_token: Option<String>,
        ip_address: Option<IpAddr>,
        hardware: Option<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            name: name.into(),
            ip_address,
            auth_token,
            hardware,
            available: true,
            do_not_disturb: false,
            alarm_volume: 0,
            alarms: Vec::new(),
            timers: Vec::new(),
            bluetooth_peers: Vec::new(),
        }
    }

    /// Whether the device can be polled: it needs both an IP address and
    /// a non-empty auth token.
    #[must_use]
    pub fn is_pollable(&self) -> bool {
        self.ip_address.is_some()
            && self.auth_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Replace the alarm list wholesale.
    pub fn set_alarms(&mut self, alarms: Vec<Alarm>) {
        self.alarms = alarms;
    }

    /// Replace the timer list wholesale.
    pub fn set_timers(&mut self, timers: Vec<Timer>) {
        self.timers = timers;
    }

    /// Replace the Bluetooth peer list with a fresh capture batch.
    pub fn set_bluetooth_peers(&mut self, peers: Vec<BluetoothPeer>) {
        self.bluetooth_peers = peers;
    }

    /// Alarms in rendering order: ascending fire time, with inactive and
    /// missed alarms last. Ties keep original order.
    #[must_use]
    pub fn sorted_alarms(&self) -> Vec<Alarm> {
        let mut alarms = self.alarms.clone();
        alarms.sort_by_key(Alarm::effective_fire_time);
        alarms
    }

    /// The next alarm to fire, or `None` if there are no alarms.
    #[must_use]
    pub fn next_alarm(&self) -> Option<Alarm> {
        self.alarms
            .iter()
            .min_by_key(|a| a.effective_fire_time())
            .cloned()
    }

    /// Status of the next alarm, defaulting to [`AlarmStatus::None`]
    /// when the list is empty.
    #[must_use]
    pub fn next_alarm_status(&self) -> AlarmStatus {
        self.next_alarm()
            .map_or(AlarmStatus::None, |alarm| alarm.status)
    }

    /// Timers in rendering order: ascending fire time, paused timers last.
    /// Ties keep original order.
    #[must_use]
    pub fn sorted_timers(&self) -> Vec<Timer> {
        let mut timers = self.timers.clone();
        timers.sort_by_key(Timer::effective_fire_time);
        timers
    }

    /// The next timer to fire, or `None` if there are no timers.
    #[must_use]
    pub fn next_timer(&self) -> Option<Timer> {
        self.timers
            .iter()
            .min_by_key(|t| t.effective_fire_time())
            .cloned()
    }

    /// Status of the next timer, defaulting to [`TimerStatus::None`]
    /// when the list is empty.
    #[must_use]
    pub fn next_timer_status(&self) -> TimerStatus {
        self.next_timer()
            .map_or(TimerStatus::None, |timer| timer.status)
    }
}
