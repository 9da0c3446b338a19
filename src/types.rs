use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

use crate::scale::protocol::{IDENTIFY_PAYLOAD, NOTIFICATION_REQUEST};

/// How a buffer is written to a GATT characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteKind {
    /// Acknowledged write; the transport waits for the peripheral
    WithResponse,
    /// Fire-and-forget write
    WithoutResponse,
}

impl fmt::Display for WriteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WithResponse => write!(f, "with response"),
            Self::WithoutResponse => write!(f, "without response"),
        }
    }
}

/// How the kettle encoder switches an enabled schedule between once and daily
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScheduleSwitch {
    /// Write the new schedule in one go
    #[default]
    SingleWrite,
    /// Write a schedule-off blob first, then the new schedule
    DisableThenEnable,
}

/// Scale connection settings
#[derive(Debug, Clone)]
pub struct ScaleConfig {
    /// Interval between heartbeat frames in milliseconds
    pub heartbeat_interval_ms: u64,
    /// Pause between the identify frame and the notification request
    pub handshake_delay_ms: u64,
    /// Payload of the identify (handshake) frame
    pub identify_payload: [u8; 15],
    /// Payload of the notification subscription frame
    pub notification_request: Vec<u8>,
}

impl ScaleConfig {
    /// Heartbeat interval as a [`Duration`]
    #[must_use]
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Handshake delay as a [`Duration`]
    #[must_use]
    pub const fn handshake_delay(&self) -> Duration {
        Duration::from_millis(self.handshake_delay_ms)
    }
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 2_500,
            handshake_delay_ms: 500,
            identify_payload: IDENTIFY_PAYLOAD,
            notification_request: NOTIFICATION_REQUEST.to_vec(),
        }
    }
}

/// Kettle write settings
#[derive(Debug, Clone, Default)]
pub struct KettleConfig {
    /// Strategy for once/daily schedule switches
    pub schedule_switch: ScheduleSwitch,
    /// Pause between the two writes of a two-phase plan
    pub two_phase_delay_ms: u64,
}

impl KettleConfig {
    /// Config that disables the schedule before switching its mode
    #[must_use]
    pub fn two_phase() -> Self {
        Self {
            schedule_switch: ScheduleSwitch::DisableThenEnable,
            two_phase_delay_ms: 300,
        }
    }

    /// Two-phase pause as a [`Duration`]
    #[must_use]
    pub const fn two_phase_delay(&self) -> Duration {
        Duration::from_millis(self.two_phase_delay_ms)
    }
}
