//! Integration tests for homecast-core.
//!
//! These drive full poll cycles and write operations against the mock
//! control surface; no hardware or network is involved.

use std::net::IpAddr;
use std::sync::Arc;

use homecast_core::{
    ClockData, ControlSurface, DeviceRegistry, Error, MockControl, MockFailure, Poller,
};
use homecast_types::{Alarm, AlarmStatus, CastDevice, Timer, TimerStatus};

fn pollable(id: &str, ip: &str) -> CastDevice {
    let ip: IpAddr = ip.parse().unwrap();
    CastDevice::new(
        id,
        format!("Device {id}"),
        Some(format!("token-{id}")),
        Some(ip),
        Some("speaker_hw".to_string()),
    )
}

fn alarm(id: &str, fire_time: i64, status: AlarmStatus) -> Alarm {
    Alarm {
        alarm_id: id.to_string(),
        fire_time,
        status,
        label: None,
        recurrence: None,
    }
}

async fn setup(devices: Vec<CastDevice>) -> (Arc<DeviceRegistry>, Arc<MockControl>, Poller) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let registry = Arc::new(DeviceRegistry::new());
    let control = Arc::new(MockControl::new());
    let poller = Poller::new(
        Arc::clone(&registry),
        Arc::clone(&control) as Arc<dyn ControlSurface>,
    );
    registry.replace_all(devices).await;
    (registry, control, poller)
}

#[tokio::test]
async fn test_cycle_applies_scripted_state() {
    let (_registry, control, poller) = setup(vec![pollable("a", "192.168.1.10")]).await;

    control
        .script_clocks(
            "a",
            ClockData {
                alarms: vec![
                    alarm("alarm/one", 300, AlarmStatus::Set),
                    alarm("alarm/two", 100, AlarmStatus::Missed),
                    alarm("alarm/three", 200, AlarmStatus::Set),
                ],
                timers: vec![Timer {
                    timer_id: "timer/one".to_string(),
                    fire_time: Some(500),
                    duration: "0:05:00".to_string(),
                    status: TimerStatus::Set,
                    label: Some("pasta".to_string()),
                }],
            },
        )
        .await;
    control.script_volume("a", 40).await;
    control.script_do_not_disturb("a", true).await;

    let devices = poller.run_cycle().await;
    assert_eq!(devices.len(), 1);

    let device = &devices[0];
    assert!(device.available);
    assert_eq!(device.alarm_volume, 40);
    assert!(device.do_not_disturb);
    assert_eq!(device.alarms.len(), 3);
    assert_eq!(device.timers.len(), 1);

    // Derivation over the polled state: missed alarms never surface first.
    let next = device.next_alarm().unwrap();
    assert_eq!(next.alarm_id, "alarm/three");
    assert_eq!(device.next_timer().unwrap().timer_id, "timer/one");

    // Three reads, nothing else.
    assert_eq!(control.requests_for("a").await, 3);
}

#[tokio::test]
async fn test_unpollable_device_gets_no_network_calls() {
    let no_ip = CastDevice::new("b", "Device b", None, None, None);

    let (_registry, control, poller) = setup(vec![pollable("a", "1.2.3.4"), no_ip]).await;

    let devices = poller.run_cycle().await;

    // Both devices come back; only the pollable one was contacted.
    assert_eq!(devices.len(), 2);
    let a = devices.iter().find(|d| d.device_id == "a").unwrap();
    let b = devices.iter().find(|d| d.device_id == "b").unwrap();
    assert!(a.available);
    assert!(!b.available);

    assert_eq!(control.requests_for("a").await, 3);
    assert_eq!(control.requests_for("b").await, 0);
}

#[tokio::test]
async fn test_auth_failure_clears_fleet_exactly_once() {
    let (registry, control, poller) = setup(vec![
        pollable("a", "192.168.1.10"),
        pollable("b", "192.168.1.11"),
        pollable("c", "192.168.1.12"),
    ])
    .await;

    for id in ["a", "b", "c"] {
        control.fail_device(id, MockFailure::Unauthorized).await;
    }

    let generation_before = registry.generation();
    let devices = poller.run_cycle().await;

    // The fleet is gone, forcing rediscovery with fresh tokens.
    assert!(devices.is_empty());
    assert!(registry.is_empty().await);

    // Cycle start bumps the generation once and the single invalidation
    // once more: three concurrent 401s still clear exactly once.
    assert_eq!(registry.generation(), generation_before + 2);

    // Each device stopped at its first 401.
    assert_eq!(control.request_count(), 3);
}

#[tokio::test]
async fn test_not_found_never_triggers_rediscovery() {
    let (registry, control, poller) = setup(vec![
        pollable("a", "192.168.1.10"),
        pollable("b", "192.168.1.11"),
    ])
    .await;

    control.fail_device("a", MockFailure::NotFound).await;
    control.script_volume("b", 25).await;

    let devices = poller.run_cycle().await;

    // Incompatible hardware is expected: the fleet stays put.
    assert_eq!(devices.len(), 2);
    assert_eq!(registry.len().await, 2);

    let a = devices.iter().find(|d| d.device_id == "a").unwrap();
    let b = devices.iter().find(|d| d.device_id == "b").unwrap();
    assert!(!a.available);
    assert!(b.available);
    assert_eq!(b.alarm_volume, 25);
}

#[tokio::test]
async fn test_transient_failures_mark_unavailable_until_next_cycle() {
    let (_registry, control, poller) = setup(vec![pollable("a", "192.168.1.10")]).await;

    control.fail_device("a", MockFailure::Timeout).await;
    let devices = poller.run_cycle().await;
    assert!(!devices[0].available);

    // The next cycle is the retry; the device recovered.
    control.clear_failure("a").await;
    control.script_volume("a", 60).await;
    let devices = poller.run_cycle().await;
    assert!(devices[0].available);
    assert_eq!(devices[0].alarm_volume, 60);
}

#[tokio::test]
async fn test_malformed_response_discards_state_but_keeps_device_available() {
    let (_registry, control, poller) = setup(vec![pollable("a", "192.168.1.10")]).await;

    control.fail_device("a", MockFailure::Malformed).await;
    let devices = poller.run_cycle().await;

    // The connection worked; only the unparseable state was discarded.
    assert!(devices[0].available);
    assert!(devices[0].alarms.is_empty());
    assert_eq!(devices[0].alarm_volume, 0);
}

#[tokio::test]
async fn test_one_device_failing_does_not_block_the_batch() {
    let (_registry, control, poller) = setup(vec![
        pollable("a", "192.168.1.10"),
        pollable("b", "192.168.1.11"),
    ])
    .await;

    control.fail_device("a", MockFailure::Unreachable).await;
    control.script_volume("b", 80).await;
    control.script_do_not_disturb("b", true).await;

    let devices = poller.run_cycle().await;

    let a = devices.iter().find(|d| d.device_id == "a").unwrap();
    let b = devices.iter().find(|d| d.device_id == "b").unwrap();
    assert!(!a.available);
    assert!(b.available);
    assert_eq!(b.alarm_volume, 80);
    assert!(b.do_not_disturb);
}

#[tokio::test]
async fn test_delete_with_malformed_id_makes_no_network_call() {
    let (_registry, control, poller) = setup(vec![pollable("a", "192.168.1.10")]).await;

    let bad_id = format!("alarm/{}", "a".repeat(30));
    let err = poller.delete_item("a", &bad_id).await.unwrap_err();

    assert!(matches!(err, Error::InvalidItemId { .. }));
    assert_eq!(control.request_count(), 0);
}

#[tokio::test]
async fn test_delete_with_valid_id_reaches_the_device() {
    let (_registry, control, poller) = setup(vec![pollable("a", "192.168.1.10")]).await;

    let good_id = format!("timer/{}", "f".repeat(36));
    assert_eq!(good_id.len(), 42);

    let confirmed = poller.delete_item("a", &good_id).await.unwrap();
    assert!(confirmed);
    assert_eq!(control.requests_for("a").await, 1);
}

#[tokio::test]
async fn test_write_path_updates_registry_record() {
    let (registry, _control, poller) = setup(vec![pollable("a", "192.168.1.10")]).await;

    poller.set_alarm_volume("a", 75).await.unwrap();
    poller.set_do_not_disturb("a", true).await.unwrap();

    let snapshot = registry.snapshot().await;
    assert_eq!(snapshot[0].alarm_volume, 75);
    assert!(snapshot[0].do_not_disturb);
    assert!(snapshot[0].available);
}

#[tokio::test]
async fn test_write_auth_failure_invalidates_fleet() {
    let (registry, control, poller) = setup(vec![
        pollable("a", "192.168.1.10"),
        pollable("b", "192.168.1.11"),
    ])
    .await;

    control.fail_device("a", MockFailure::Unauthorized).await;

    let err = poller.set_alarm_volume("a", 10).await.unwrap_err();
    assert!(err.is_auth_failure());
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn test_write_transport_failure_marks_device_unavailable() {
    let (registry, control, poller) = setup(vec![pollable("a", "192.168.1.10")]).await;

    control.fail_device("a", MockFailure::Unreachable).await;

    let err = poller.set_do_not_disturb("a", true).await.unwrap_err();
    assert!(matches!(err, Error::Unreachable { .. }));

    let snapshot = registry.snapshot().await;
    assert!(!snapshot[0].available);
    // The write never landed.
    assert!(!snapshot[0].do_not_disturb);
}

#[tokio::test]
async fn test_write_to_unknown_device_fails_locally() {
    let (_registry, control, poller) = setup(vec![pollable("a", "192.168.1.10")]).await;

    let err = poller.reboot("nope").await.unwrap_err();
    assert!(matches!(err, Error::UnknownDevice { .. }));
    assert_eq!(control.request_count(), 0);
}

#[tokio::test]
async fn test_reboot_succeeds_for_known_device() {
    let (_registry, control, poller) = setup(vec![pollable("a", "192.168.1.10")]).await;

    poller.reboot("a").await.unwrap();
    assert_eq!(control.requests_for("a").await, 1);
}

#[tokio::test]
async fn test_volume_set_clamps_to_valid_range() {
    let (registry, _control, poller) = setup(vec![pollable("a", "192.168.1.10")]).await;

    poller.set_alarm_volume("a", 255).await.unwrap();

    let snapshot = registry.snapshot().await;
    assert_eq!(snapshot[0].alarm_volume, 100);
}

#[tokio::test]
async fn test_rebuild_after_invalidation_restores_polling() {
    let (registry, control, poller) = setup(vec![pollable("a", "192.168.1.10")]).await;

    control.fail_device("a", MockFailure::Unauthorized).await;
    assert!(poller.run_cycle().await.is_empty());

    // A fresh discovery pass with new tokens brings the fleet back.
    control.clear_failure("a").await;
    control.script_volume("a", 45).await;
    registry
        .replace_all(vec![pollable("a", "192.168.1.10")])
        .await;

    let devices = poller.run_cycle().await;
    assert_eq!(devices.len(), 1);
    assert!(devices[0].available);
    assert_eq!(devices[0].alarm_volume, 45);
}
