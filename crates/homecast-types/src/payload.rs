//! Wire payloads reported by the device's local control endpoints.
//!
//! These mirror the JSON shapes the device emits. Conversion into the
//! domain types happens through `TryFrom`, where status codes are mapped
//! through the exhaustive enumerations; an unknown code rejects the record.

use serde::Deserialize;

use crate::error::ParseError;
use crate::types::{
    Alarm, AlarmStatus, BluetoothPeer, Timer, TimerStatus, format_duration, ms_to_s,
};

/// JSON shape of one alarm in the `setup/assistant/alarms` response.
#[derive(Debug, Clone, Deserialize)]
pub struct AlarmPayload {
    /// Server-assigned id.
    pub id: String,
    /// Fire time in epoch milliseconds.
    pub fire_time: i64,
    /// Raw status code.
    pub status: i64,
    /// Optional user label.
    #[serde(default)]
    pub label: Option<String>,
    /// Optional recurrence descriptor.
    #[serde(default)]
    pub recurrence: Option<String>,
}

impl TryFrom<AlarmPayload> for Alarm {
    type Error = ParseError;

    fn try_from(payload: AlarmPayload) -> Result<Self, Self::Error> {
        Ok(Alarm {
            alarm_id: payload.id,
            fire_time: ms_to_s(payload.fire_time),
            status: AlarmStatus::try_from(payload.status)?,
            label: payload.label,
            recurrence: payload.recurrence,
        })
    }
}

/// JSON shape of one timer in the `setup/assistant/alarms` response.
///
/// A paused timer has no `fire_time`.
#[derive(Debug, Clone, Deserialize)]
pub struct TimerPayload {
    /// Server-assigned id.
    pub id: String,
    /// Fire time in epoch milliseconds; absent while paused.
    #[serde(default)]
    pub fire_time: Option<i64>,
    /// Original duration in milliseconds.
    pub original_duration: i64,
    /// Raw status code.
    pub status: i64,
    /// Optional user label.
    #[serde(default)]
    pub label: Option<String>,
}

impl TryFrom<TimerPayload> for Timer {
    type Error = ParseError;

    fn try_from(payload: TimerPayload) -> Result<Self, Self::Error> {
        Ok(Timer {
            timer_id: payload.id,
            fire_time: payload.fire_time.map(ms_to_s),
            duration: format_duration(ms_to_s(payload.original_duration)),
            status: TimerStatus::try_from(payload.status)?,
            label: payload.label,
        })
    }
}

/// JSON shape of one captured Bluetooth peer.
#[derive(Debug, Clone, Deserialize)]
pub struct BluetoothPeerPayload {
    /// Hardware address as captured.
    pub mac_address: String,
    /// Signal strength in dBm.
    pub rssi: i16,
    /// Raw class-of-device bitfield.
    #[serde(default)]
    pub device_class: u32,
    /// Raw device type classification.
    #[serde(default)]
    pub device_type: u32,
    /// Raw expected-profiles bitfield.
    #[serde(default)]
    pub expected_profiles: u32,
    /// Advertised name, if any.
    #[serde(default)]
    pub name: Option<String>,
}

impl From<BluetoothPeerPayload> for BluetoothPeer {
    fn from(payload: BluetoothPeerPayload) -> Self {
        BluetoothPeer {
            mac_address: payload.mac_address,
            rssi: payload.rssi,
            device_class: payload.device_class,
            device_type: payload.device_type,
            expected_profiles: payload.expected_profiles,
            name: payload.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alarm_payload_round_trip() {
        let json = r#"{
            "id": "alarm/abcdef1234567890abcdef1234567890abcd",
            "fire_time": 1612994116000,
            "status": 1,
            "label": "wake up"
        }"#;

        let payload: AlarmPayload = serde_json::from_str(json).unwrap();
        let alarm = Alarm::try_from(payload).unwrap();

        assert_eq!(alarm.fire_time, 1612994116);
        assert_eq!(alarm.status, AlarmStatus::Set);
        assert_eq!(alarm.label.as_deref(), Some("wake up"));
        assert!(alarm.recurrence.is_none());
    }

    #[test]
    fn test_alarm_payload_unknown_status_rejected() {
        let json = r#"{"id": "alarm/x", "fire_time": 0, "status": 42}"#;

        let payload: AlarmPayload = serde_json::from_str(json).unwrap();
        let err = Alarm::try_from(payload).unwrap_err();

        assert!(matches!(err, ParseError::UnknownAlarmStatus(42)));
    }

    #[test]
    fn test_alarm_payload_missing_fire_time_is_parse_failure() {
        let json = r#"{"id": "alarm/x", "status": 1}"#;

        assert!(serde_json::from_str::<AlarmPayload>(json).is_err());
    }

    #[test]
    fn test_timer_payload_paused_has_no_fire_time() {
        let json = r#"{
            "id": "timer/abcdef1234567890abcdef1234567890abcd",
            "original_duration": 300000,
            "status": 2
        }"#;

        let payload: TimerPayload = serde_json::from_str(json).unwrap();
        let timer = Timer::try_from(payload).unwrap();

        assert_eq!(timer.fire_time, None);
        assert_eq!(timer.status, TimerStatus::Paused);
        assert_eq!(timer.duration, "0:05:00");
    }

    #[test]
    fn test_timer_payload_unknown_status_rejected() {
        let json = r#"{"id": "timer/x", "fire_time": 1000, "original_duration": 1000, "status": 7}"#;

        let payload: TimerPayload = serde_json::from_str(json).unwrap();
        let err = Timer::try_from(payload).unwrap_err();

        assert!(matches!(err, ParseError::UnknownTimerStatus(7)));
    }

    #[test]
    fn test_bluetooth_peer_payload_defaults() {
        let json = r#"{"mac_address": "AA:BB:CC:DD:EE:FF", "rssi": -42}"#;

        let payload: BluetoothPeerPayload = serde_json::from_str(json).unwrap();
        let peer = BluetoothPeer::from(payload);

        assert_eq!(peer.mac_address, "AA:BB:CC:DD:EE:FF");
        assert_eq!(peer.rssi, -42);
        assert_eq!(peer.device_class, 0);
        assert!(peer.name.is_none());
    }
}
