use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    error::{BrewLinkError, Result},
    types::ScheduleSwitch,
};

/// Minimum length of the configuration blob
pub const BLOB_LEN: usize = 17;

// Byte offsets into the configuration blob
const STATUS_FLAGS: usize = 0;
const CONTROL_FLAGS: usize = 1;
const ALTITUDE_LOW: usize = 2;
const ALTITUDE_HIGH: usize = 3;
const TARGET_TEMP: usize = 4;
const SCHEDULE_TEMP: usize = 6;
const SCHEDULE_MINUTE: usize = 8;
const SCHEDULE_HOUR: usize = 9;
const CLOCK_MINUTE: usize = 10;
const CLOCK_HOUR: usize = 11;
const CLOCK_MODE: usize = 12;
const HOLD_TIME: usize = 13;
const CHIME_VOLUME: usize = 14;
const LANGUAGE: usize = 15;
const COUNTER: usize = 16;

// Flag bits
const UNITS_CELSIUS: u8 = 0x02;
const PRE_BOIL: u8 = 0x08;
const SCHEDULE_ENABLED: u8 = 0x08;
// Shares the counter byte; the kettle sets it, writes overwrite it with the counter
const SCHEDULE_ONCE: u8 = 0x08;

/// Schedule temperature byte written when the schedule is switched off
pub const SCHEDULE_OFF_TEMP: u8 = 0xC0;

const MAX_TEMPERATURE: f64 = 100.0;
const MAX_HOLD_TIME: i32 = 60;
const MAX_CHIME_VOLUME: i32 = 10;
const ALTITUDE_STEP: u16 = 30;

/// Display unit; the blob always stores Celsius
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemperatureUnit {
    /// Degrees Celsius
    Celsius,
    /// Degrees Fahrenheit
    Fahrenheit,
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Celsius => write!(f, "°C"),
            Self::Fahrenheit => write!(f, "°F"),
        }
    }
}

/// Kettle auto-start schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleMode {
    /// No schedule
    Off,
    /// Single future trigger
    Once,
    /// Recurring trigger
    Daily,
}

impl fmt::Display for ScheduleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Once => write!(f, "once"),
            Self::Daily => write!(f, "daily"),
        }
    }
}

/// Clock face shown on the base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockMode {
    /// Clock hidden
    Off,
    /// Digital clock
    Digital,
    /// Analog clock
    Analog,
    /// Value not known to this crate
    Unknown(u8),
}

impl From<u8> for ClockMode {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Off,
            1 => Self::Digital,
            2 => Self::Analog,
            other => Self::Unknown(other),
        }
    }
}

impl From<ClockMode> for u8 {
    fn from(mode: ClockMode) -> Self {
        match mode {
            ClockMode::Off => 0,
            ClockMode::Digital => 1,
            ClockMode::Analog => 2,
            ClockMode::Unknown(raw) => raw,
        }
    }
}

/// Menu language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    /// English
    English,
    /// French
    French,
    /// Spanish
    Spanish,
    /// Simplified Chinese
    SimplifiedChinese,
    /// Traditional Chinese
    TraditionalChinese,
    /// Value not known to this crate
    Unknown(u8),
}

impl From<u8> for Language {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::English,
            1 => Self::French,
            2 => Self::Spanish,
            3 => Self::SimplifiedChinese,
            4 => Self::TraditionalChinese,
            other => Self::Unknown(other),
        }
    }
}

impl From<Language> for u8 {
    fn from(language: Language) -> Self {
        match language {
            Language::English => 0,
            Language::French => 1,
            Language::Spanish => 2,
            Language::SimplifiedChinese => 3,
            Language::TraditionalChinese => 4,
            Language::Unknown(raw) => raw,
        }
    }
}

/// Decoded snapshot of the kettle configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KettleState {
    /// Display unit
    pub units: TemperatureUnit,
    /// Pre-boil enabled
    pub pre_boil: bool,
    /// Altitude compensation, rounded to 30 m
    pub altitude_m: u16,
    /// Target temperature in Celsius, half-degree resolution
    pub target_temperature: f64,
    /// Schedule mode
    pub schedule_mode: ScheduleMode,
    /// Scheduled temperature in Celsius
    pub schedule_temperature: f64,
    /// Scheduled hour
    pub schedule_hour: u8,
    /// Scheduled minute
    pub schedule_minute: u8,
    /// Clock hour
    pub clock_hour: u8,
    /// Clock minute
    pub clock_minute: u8,
    /// Clock face
    pub clock_mode: ClockMode,
    /// Hold time in minutes, 0 when off
    pub hold_time: u8,
    /// Chime volume, 0 when muted
    pub chime_volume: u8,
    /// Menu language
    pub language: Language,
    /// Raw rolling counter
    pub counter: u8,
}

impl KettleState {
    /// Extract every documented field from a blob
    ///
    /// # Errors
    ///
    /// Returns [`BrewLinkError::InvalidBlob`] for blobs shorter than
    /// [`BLOB_LEN`].
    pub fn decode(data: &[u8]) -> Result<Self> {
        check_len(data)?;
        Ok(Self::from_fields(data))
    }

    /// Caller guarantees `data.len() >= BLOB_LEN`
    fn from_fields(data: &[u8]) -> Self {
        let schedule_mode = if data[STATUS_FLAGS] & SCHEDULE_ENABLED == 0 {
            ScheduleMode::Off
        } else if data[COUNTER] & SCHEDULE_ONCE != 0 {
            ScheduleMode::Once
        } else {
            ScheduleMode::Daily
        };

        let units = if data[CONTROL_FLAGS] & UNITS_CELSIUS != 0 {
            TemperatureUnit::Celsius
        } else {
            TemperatureUnit::Fahrenheit
        };

        Self {
            units,
            pre_boil: data[CONTROL_FLAGS] & PRE_BOIL != 0,
            altitude_m: decode_altitude(data[ALTITUDE_LOW], data[ALTITUDE_HIGH]),
            target_temperature: f64::from(data[TARGET_TEMP]) / 2.0,
            schedule_mode,
            schedule_temperature: f64::from(data[SCHEDULE_TEMP]) / 2.0,
            schedule_hour: data[SCHEDULE_HOUR],
            schedule_minute: data[SCHEDULE_MINUTE],
            clock_hour: data[CLOCK_HOUR],
            clock_minute: data[CLOCK_MINUTE],
            clock_mode: ClockMode::from(data[CLOCK_MODE]),
            hold_time: data[HOLD_TIME],
            chime_volume: data[CHIME_VOLUME],
            language: Language::from(data[LANGUAGE]),
            counter: data[COUNTER],
        }
    }
}

/// 15-bit altitude with the top bit of the high byte masked off, rounded half up to 30 m
const fn decode_altitude(low: u8, high: u8) -> u16 {
    let raw = ((high as u16 & 0x7F) << 8) | low as u16;
    (raw + ALTITUDE_STEP / 2) / ALTITUDE_STEP * ALTITUDE_STEP
}

fn check_len(data: &[u8]) -> Result<()> {
    if data.len() < BLOB_LEN {
        return Err(BrewLinkError::InvalidBlob {
            len: data.len(),
            expected: BLOB_LEN,
        });
    }
    Ok(())
}

/// Celsius to half-degree units, clamped to 0–100 °C
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn half_degrees(celsius: f64) -> u8 {
    (celsius.clamp(0.0, MAX_TEMPERATURE) * 2.0).round() as u8
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn clamp_byte(value: i32, max: i32) -> u8 {
    if value < 0 {
        0
    } else if value > max {
        max as u8
    } else {
        value as u8
    }
}

fn check_time(hour: u8, minute: u8) -> Result<()> {
    if hour > 23 || minute > 59 {
        return Err(BrewLinkError::InvalidParameters(format!(
            "time {hour:02}:{minute:02} out of range"
        )));
    }
    Ok(())
}

/// A single mutation of the kettle configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KettleCommand {
    /// Target temperature in Celsius, clamped to 0–100
    SetTemperature(f64),
    /// Hold time in minutes, clamped to 0–60
    SetHoldTime(i32),
    /// Auto-start schedule
    SetSchedule {
        /// Schedule mode; `Off` ignores the other fields
        ///
        /// Once and daily share the enabled flag. The kettle tells them apart
        /// by bit `0x08` of the counter byte, which every write overwrites
        /// with the rolling counter, so the mode read back follows the counter.
        mode: ScheduleMode,
        /// Hour, 0–23
        hour: u8,
        /// Minute, 0–59
        minute: u8,
        /// Temperature in Celsius, clamped to 0–100
        temperature: f64,
    },
    /// Display unit
    SetUnits(TemperatureUnit),
    /// Pre-boil on or off
    SetPreBoil(bool),
    /// Clock time and, optionally, clock face
    SetClock {
        /// Hour, 0–23
        hour: u8,
        /// Minute, 0–59
        minute: u8,
        /// Clock face to switch to
        mode: Option<ClockMode>,
    },
    /// Clock face
    SetClockMode(ClockMode),
    /// Chime volume, clamped to 0–10
    SetChimeVolume(i32),
    /// Menu language
    SetLanguage(Language),
}

impl KettleCommand {
    /// Schedule-off mutation
    #[must_use]
    pub const fn disable_schedule() -> Self {
        Self::SetSchedule {
            mode: ScheduleMode::Off,
            hour: 0,
            minute: 0,
            temperature: 0.0,
        }
    }

    fn validate(&self) -> Result<()> {
        match *self {
            Self::SetSchedule {
                mode: ScheduleMode::Once | ScheduleMode::Daily,
                hour,
                minute,
                ..
            }
            | Self::SetClock { hour, minute, .. } => check_time(hour, minute),
            _ => Ok(()),
        }
    }

    /// Patch the fields this command owns; the counter byte is left alone
    fn patch(&self, data: &mut [u8]) {
        match *self {
            Self::SetTemperature(celsius) => data[TARGET_TEMP] = half_degrees(celsius),
            Self::SetHoldTime(minutes) => data[HOLD_TIME] = clamp_byte(minutes, MAX_HOLD_TIME),
            Self::SetSchedule {
                mode: ScheduleMode::Off,
                ..
            } => {
                data[STATUS_FLAGS] &= !SCHEDULE_ENABLED;
                data[SCHEDULE_TEMP] = SCHEDULE_OFF_TEMP;
                data[SCHEDULE_HOUR] = 0;
                data[SCHEDULE_MINUTE] = 0;
            }
            Self::SetSchedule {
                hour,
                minute,
                temperature,
                ..
            } => {
                data[STATUS_FLAGS] |= SCHEDULE_ENABLED;
                data[SCHEDULE_TEMP] = half_degrees(temperature);
                data[SCHEDULE_HOUR] = hour;
                data[SCHEDULE_MINUTE] = minute;
            }
            Self::SetUnits(units) => match units {
                TemperatureUnit::Celsius => data[CONTROL_FLAGS] |= UNITS_CELSIUS,
                TemperatureUnit::Fahrenheit => data[CONTROL_FLAGS] &= !UNITS_CELSIUS,
            },
            Self::SetPreBoil(enabled) => {
                if enabled {
                    data[CONTROL_FLAGS] |= PRE_BOIL;
                } else {
                    data[CONTROL_FLAGS] &= !PRE_BOIL;
                }
            }
            Self::SetClock { hour, minute, mode } => {
                data[CLOCK_HOUR] = hour;
                data[CLOCK_MINUTE] = minute;
                if let Some(mode) = mode {
                    data[CLOCK_MODE] = mode.into();
                }
            }
            Self::SetClockMode(mode) => data[CLOCK_MODE] = mode.into(),
            Self::SetChimeVolume(volume) => {
                data[CHIME_VOLUME] = clamp_byte(volume, MAX_CHIME_VOLUME);
            }
            Self::SetLanguage(language) => data[LANGUAGE] = language.into(),
        }
    }
}

/// The kettle's configuration characteristic value
///
/// Immutable: every mutation clones the bytes, patches the copy and advances
/// the rolling counter, so readers of the current blob never see a write in
/// progress. Bytes past the documented fields are carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KettleBlob(Bytes);

impl KettleBlob {
    /// Wrap a blob read from the kettle
    ///
    /// # Errors
    ///
    /// Returns [`BrewLinkError::InvalidBlob`] for blobs shorter than
    /// [`BLOB_LEN`].
    pub fn new(data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        check_len(&data)?;
        Ok(Self(data))
    }

    /// Raw bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Shared handle to the raw bytes
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        self.0.clone()
    }

    /// Rolling counter
    #[must_use]
    pub fn counter(&self) -> u8 {
        self.0[COUNTER]
    }

    /// Decode the documented fields
    #[must_use]
    pub fn state(&self) -> KettleState {
        KettleState::from_fields(&self.0)
    }

    /// Produce the next blob for `command`, counter advanced by one
    ///
    /// # Errors
    ///
    /// Returns [`BrewLinkError::InvalidParameters`] for an out-of-range
    /// schedule or clock time.
    pub fn apply(&self, command: &KettleCommand) -> Result<Self> {
        command.validate()?;
        Ok(self.patched(command))
    }

    fn patched(&self, command: &KettleCommand) -> Self {
        let mut data = BytesMut::from(&self.0[..]);
        command.patch(&mut data);
        data[COUNTER] = self.counter().wrapping_add(1);
        Self(data.freeze())
    }
}

impl AsRef<[u8]> for KettleBlob {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Ordered blobs to write for one mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WritePlan {
    disable: Option<KettleBlob>,
    blob: KettleBlob,
}

impl WritePlan {
    /// One write
    #[must_use]
    pub const fn single(blob: KettleBlob) -> Self {
        Self {
            disable: None,
            blob,
        }
    }

    /// Schedule-off write followed by the target write
    #[must_use]
    pub const fn two_phase(disable: KettleBlob, blob: KettleBlob) -> Self {
        Self {
            disable: Some(disable),
            blob,
        }
    }

    /// Whether the plan writes a schedule-off blob first
    #[must_use]
    pub const fn is_two_phase(&self) -> bool {
        self.disable.is_some()
    }

    /// Number of writes
    #[must_use]
    pub const fn len(&self) -> usize {
        if self.is_two_phase() {
            2
        } else {
            1
        }
    }

    /// Always `false`; a plan holds at least one write
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Blob the kettle holds once the plan completes
    #[must_use]
    pub const fn final_blob(&self) -> &KettleBlob {
        &self.blob
    }

    /// Blobs in write order
    pub fn steps(&self) -> impl Iterator<Item = &KettleBlob> {
        self.disable.iter().chain(std::iter::once(&self.blob))
    }

    /// Consume the plan into blobs in write order
    #[must_use]
    pub fn into_steps(self) -> Vec<KettleBlob> {
        self.disable.into_iter().chain(std::iter::once(self.blob)).collect()
    }
}

/// Turns commands into write plans against the current blob
#[derive(Debug, Clone, Copy, Default)]
pub struct KettleEncoder {
    schedule_switch: ScheduleSwitch,
}

impl KettleEncoder {
    /// Encoder with the given once/daily switch strategy
    #[must_use]
    pub const fn new(schedule_switch: ScheduleSwitch) -> Self {
        Self { schedule_switch }
    }

    /// Active switch strategy
    #[must_use]
    pub const fn schedule_switch(&self) -> ScheduleSwitch {
        self.schedule_switch
    }

    /// Plan the writes for `command`
    ///
    /// # Errors
    ///
    /// See [`KettleBlob::apply`].
    pub fn plan(&self, current: &KettleBlob, command: &KettleCommand) -> Result<WritePlan> {
        if let KettleCommand::SetSchedule { mode, .. } = *command {
            let previous = current.state().schedule_mode;
            let switching = previous != ScheduleMode::Off
                && mode != ScheduleMode::Off
                && previous != mode;

            if switching && self.schedule_switch == ScheduleSwitch::DisableThenEnable {
                command.validate()?;
                let disabled = current.apply(&KettleCommand::disable_schedule())?;
                let enabled = disabled.apply(command)?;
                return Ok(WritePlan::two_phase(disabled, enabled));
            }
        }

        Ok(WritePlan::single(current.apply(command)?))
    }
}

/// Decode a raw blob
///
/// # Errors
///
/// See [`KettleState::decode`].
pub fn decode(data: &[u8]) -> Result<KettleState> {
    KettleState::decode(data)
}

/// Next blob with a new target temperature
#[must_use]
pub fn encode_set_temperature(current: &KettleBlob, celsius: f64) -> KettleBlob {
    current.patched(&KettleCommand::SetTemperature(celsius))
}

/// Next blob with a new hold time
#[must_use]
pub fn encode_set_hold_time(current: &KettleBlob, minutes: i32) -> KettleBlob {
    current.patched(&KettleCommand::SetHoldTime(minutes))
}

/// Next blob with a new schedule, as a single write
///
/// # Errors
///
/// Returns [`BrewLinkError::InvalidParameters`] for an out-of-range time
/// when the schedule is enabled.
pub fn encode_set_schedule(
    current: &KettleBlob,
    mode: ScheduleMode,
    hour: u8,
    minute: u8,
    celsius: f64,
) -> Result<KettleBlob> {
    current.apply(&KettleCommand::SetSchedule {
        mode,
        hour,
        minute,
        temperature: celsius,
    })
}
