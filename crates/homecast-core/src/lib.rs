//! Polling, token-lifecycle, and state-aggregation engine for local
//! smart-speaker fleets.
//!
//! Given a set of discovered devices with IP addresses and per-device auth
//! tokens, this crate concurrently fetches and mutates their state over the
//! local HTTPS control surface, classifies failures per device without
//! aborting the batch, invalidates tokens fleet-wide on auth failure, and
//! maintains the derived data model (sorted alarms/timers, next
//! alarm/timer, do-not-disturb, alarm volume, closest Bluetooth peer)
//! consumed by a rendering layer.
//!
//! # Features
//!
//! - **Device registry**: de-duplicated, per-device-serialized fleet state
//! - **Token-gated client**: bearer-style local auth, outcome classification
//! - **Poll orchestration**: concurrent across devices, sequential within
//! - **Fleet invalidation**: one 401 anywhere re-auths everyone, once per cycle
//! - **Proximity resolution**: signal ranking and private-address matching
//! - **Mock control surface**: deterministic tests without hardware
//!
//! Token acquisition, the scheduling cadence, Bluetooth radio capture, and
//! all rendering are external collaborators. Nothing here persists across
//! restarts, and no failure in this crate is fatal: the worst outcome is a
//! device marked unavailable until the next successful cycle.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use homecast_core::{CastClient, DeviceRegistry, Poller};
//! use homecast_types::CastDevice;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(DeviceRegistry::new());
//!     registry
//!         .replace_all(vec![CastDevice::new(
//!             "abc123",
//!             "Kitchen speaker",
//!             Some("local-auth-token".to_string()),
//!             Some("192.168.1.10".parse()?),
//!             Some("speaker_hw".to_string()),
//!         )])
//!         .await;
//!
//!     let client = Arc::new(CastClient::new()?);
//!     let poller = Poller::new(Arc::clone(&registry), client);
//!
//!     let devices = poller.run_cycle().await;
//!     for device in devices {
//!         if let Some(alarm) = device.next_alarm() {
//!             println!("{}: next alarm at {}", device.name, alarm.fire_time);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod endpoints;
pub mod error;
pub mod mock;
pub mod poller;
pub mod proximity;
pub mod registry;

// Re-export the domain model for convenience.
pub use homecast_types as types;

pub use client::{CastClient, ClientOptions, ClockData, ControlSurface, PollTarget};
pub use error::{Error, Result};
pub use mock::{MockControl, MockFailure};
pub use poller::{Poller, PollerConfig};
pub use proximity::{IdentityKey, address_matches_key, closest_peer, rank_by_signal, resolve_peer};
pub use registry::{DeviceRegistry, SharedDevice};
