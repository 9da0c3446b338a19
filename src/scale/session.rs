use serde::{Deserialize, Serialize};
use std::fmt;

use super::protocol::{ButtonKind, ScaleEvent};

/// One point of the brew curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Timer value in seconds
    pub t: f64,
    /// Weight in grams
    pub w: f64,
}

/// Coarse connection state derived from a [`ScaleSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    /// No scale connected
    Disconnected,
    /// Connected, timer not running
    Idle,
    /// Connected and recording samples
    Recording,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Idle => write!(f, "Idle"),
            Self::Recording => write!(f, "Recording"),
        }
    }
}

/// In-memory state for one scale connection
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScaleSession {
    /// Last reported weight in grams
    pub weight: f64,
    /// Last reported timer in seconds
    pub timer: f64,
    /// Battery level in percent, once reported
    pub battery: Option<u8>,
    /// Whether a connection is active
    pub is_connected: bool,
    /// Whether the timer is running and samples are recorded
    pub is_recording: bool,
    /// Recorded `(t, w)` samples, de-duplicated against the previous sample
    pub samples: Vec<Sample>,
}

impl ScaleSession {
    /// Create a disconnected session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase of the state machine
    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        match (self.is_connected, self.is_recording) {
            (false, _) => SessionPhase::Disconnected,
            (true, false) => SessionPhase::Idle,
            (true, true) => SessionPhase::Recording,
        }
    }

    /// Enter the connected state with an empty sample log and zero timer
    pub fn connect(&mut self) {
        self.is_connected = true;
        self.is_recording = false;
        self.timer = 0.0;
        self.samples.clear();
    }

    /// Drop the connection and clear every field
    pub fn disconnect(&mut self) {
        *self = Self::default();
    }

    /// Explicit timer reset: stops recording and zeroes the timer
    pub fn reset_timer(&mut self) {
        self.is_recording = false;
        self.timer = 0.0;
    }

    /// Discard the recorded samples
    pub fn clear_samples(&mut self) {
        self.samples.clear();
    }

    /// Fold a decoded event into the session
    ///
    /// Returns `true` when a field changed and observers should hear about
    /// it. Readings recorded while the timer is running append a sample.
    pub fn apply(&mut self, event: &ScaleEvent) -> bool {
        match *event {
            ScaleEvent::Weight(weight) => self.weight = weight,
            ScaleEvent::Timer(timer) => {
                self.timer = timer;
                if timer > 0.0 {
                    self.is_recording = true;
                }
            }
            ScaleEvent::Button {
                kind,
                weight,
                timer,
            } => {
                self.weight = weight;
                if let Some(timer) = timer {
                    self.timer = timer;
                }
                match kind {
                    ButtonKind::Tare => {}
                    ButtonKind::Start => self.is_recording = true,
                    ButtonKind::Stop | ButtonKind::Reset => self.is_recording = false,
                }
            }
            ScaleEvent::Battery(level) => {
                self.battery = Some(level);
                return true;
            }
            ScaleEvent::HandshakeAck => return false,
        }

        if self.is_recording && self.timer > 0.0 {
            self.record_sample();
        }
        true
    }

    fn record_sample(&mut self) {
        let sample = Sample {
            t: self.timer,
            w: self.weight,
        };
        if self.samples.last() != Some(&sample) {
            self.samples.push(sample);
        }
    }
}
