//! Control endpoint constants.
//!
//! All requests go to the device's local HTTPS control surface on a fixed
//! port, regardless of any port value attached to the device record.

use std::time::Duration;

/// The local control port. Every endpoint lives here.
pub const CONTROL_PORT: u16 = 8443;

/// Header carrying the device's local auth token.
pub const HEADER_LOCAL_AUTH: &str = "cast-local-authorization-token";

/// Alarm and timer listing (GET).
pub const ENDPOINT_ALARMS: &str = "setup/assistant/alarms";

/// Alarm/timer deletion (POST `{ids: [...]}`).
pub const ENDPOINT_ALARM_DELETE: &str = "setup/assistant/alarms/delete";

/// Alarm volume read/write (POST; empty body reads).
pub const ENDPOINT_ALARM_VOLUME: &str = "setup/assistant/alarms/volume";

/// Notifications toggle read/write (POST; empty body reads).
/// The wire flag is inverted: `notifications_enabled: true` means DND off.
pub const ENDPOINT_DO_NOT_DISTURB: &str = "setup/assistant/notifications";

/// Device reboot (POST `{params: "now"}`).
pub const ENDPOINT_REBOOT: &str = "setup/reboot";

/// Default per-request timeout. These are LAN calls to embedded devices,
/// so a short timeout keeps a dead device from stalling the cycle.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Lower bound for the tunable request timeout.
pub const MIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound for the tunable request timeout.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(10);
