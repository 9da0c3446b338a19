#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

//! # brewlink
//!
//! Bluetooth Low Energy protocol layer for two pieces of coffee gear: an Acaia
//! scale and a Fellow Stagg EKG Pro kettle.
//!
//! Each device gets a synchronous, I/O-free protocol core plus an async façade
//! that drives any [`GattTransport`]:
//!
//! - **Scale**: `EF DD`-framed commands with a two-byte parity checksum, a
//!   lenient notification decoder (weight, timer, battery, buttons, heartbeat
//!   acks), a session state machine that records a de-duplicated brew curve,
//!   and a cancellable heartbeat.
//! - **Kettle**: a 17-byte configuration blob decoded into a typed snapshot
//!   and mutated by clone-and-patch, with a rolling counter on every write and
//!   an optional two-phase write for once/daily schedule switches.
//!
//! Malformed or unknown notifications are dropped, never reported as errors.
//! Write failures are returned to the caller and never retried.
//!
//! ## Quick Start
//!
//! ```no_run
//! use brewlink::{BtleplugTransport, ScaleDevice};
//! # async fn run(peripheral: btleplug::platform::Peripheral) -> brewlink::Result<()> {
//! // `peripheral` is an already-connected btleplug peripheral
//! let scale = ScaleDevice::new(BtleplugTransport::acaia(peripheral).await?);
//! scale.connect().await?;
//!
//! scale.subscribe(|session| {
//!     println!("{:.1} g at {:.1} s", session.weight, session.timer);
//! });
//!
//! scale.tare().await?;
//! scale.start_timer().await?;
//! # Ok(())
//! # }
//! ```

/// GATT transport abstraction and its btleplug implementation
pub mod ble;
/// Error types and handling
pub mod error;
/// Kettle blob codec and device façade
pub mod kettle;
/// Synchronous observer fan-out
pub mod observer;
/// Scale frame codec, session state and device façade
pub mod scale;
/// Shared configuration and transport types
pub mod types;

use uuid::Uuid;

pub use ble::{BtleplugTransport, GattTransport, NotificationStream};
pub use error::{BrewLinkError, Result};
pub use kettle::{
    protocol::{KettleBlob, KettleCommand, KettleState, WritePlan},
    KettleDevice, KettleProtocol,
};
pub use observer::ListenerId;
pub use scale::{
    protocol::{Command, ScaleEvent},
    session::ScaleSession,
    ScaleDevice, ScaleProtocol,
};
pub use types::{KettleConfig, ScaleConfig, ScheduleSwitch, WriteKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Acaia scale GATT service
pub const ACAIA_SERVICE_UUID: Uuid = Uuid::from_u128(0x4953_5343_fe7d_4ae5_8fa9_9faf_d205_e455);

/// Acaia characteristic that receives command frames
pub const ACAIA_WRITE_CHAR_UUID: Uuid = Uuid::from_u128(0x4953_5343_8841_43f4_a8d4_ecbe_3472_9bb3);

/// Acaia characteristic that carries notifications
pub const ACAIA_NOTIFY_CHAR_UUID: Uuid = Uuid::from_u128(0x4953_5343_1e4d_4bd9_ba61_23c6_4724_9616);

/// Stagg EKG Pro GATT service
pub const STAGG_SERVICE_UUID: Uuid = Uuid::from_u128(0x7aeb_f330_6cb1_46e4_b23b_7cc2_262c_605e);

/// Stagg EKG Pro configuration characteristic, read, written and notified as one blob
pub const STAGG_CONFIG_CHAR_UUID: Uuid = Uuid::from_u128(0x2291_c4b5_5d7f_4477_a88b_b266_edb9_7142);

/// Advertised name fragments of Acaia scales, matched case-insensitively
pub const ACAIA_NAME_PATTERNS: [&str; 4] = ["ACAIA", "PEARL", "LUNAR", "PYXIS"];

/// Advertised name fragments of the Stagg kettle
pub const STAGG_NAME_PATTERNS: [&str; 3] = ["Stagg", "Fellow", "EKG"];
