//! Platform-agnostic types for locally controlled smart-speaker devices.
//!
//! This crate provides the domain model shared by the polling engine
//! (homecast-core) and any rendering layer built on top of it:
//!
//! - Device, alarm, timer, and Bluetooth peer value objects
//! - Status enumerations with fail-fast wire-code mapping
//! - Wire payload parsing (serde feature)
//! - Deletion-id validation
//! - Sorting and "next occurrence" derivation
//!
//! # Example
//!
//! ```
//! use homecast_types::{Alarm, AlarmStatus, CastDevice};
//!
//! let mut device = CastDevice::new("abc123", "Kitchen speaker", None, None, None);
//! device.set_alarms(vec![Alarm {
//!     alarm_id: "alarm/1".to_string(),
//!     fire_time: 1_700_000_000,
//!     status: AlarmStatus::Set,
//!     label: None,
//!     recurrence: None,
//! }]);
//!
//! assert_eq!(device.next_alarm().unwrap().fire_time, 1_700_000_000);
//! ```

pub mod error;
#[cfg(feature = "serde")]
pub mod payload;
pub mod types;

pub use error::{ParseError, ParseResult};
#[cfg(feature = "serde")]
pub use payload::{AlarmPayload, BluetoothPeerPayload, TimerPayload};
pub use types::{
    Alarm, AlarmStatus, BluetoothPeer, CastDevice, ITEM_ID_LENGTH, ItemId, ItemKind, Timer,
    TimerStatus, format_duration, fraction_to_volume, ms_to_s, volume_to_fraction,
};
