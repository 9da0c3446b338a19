use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur when talking to a scale or kettle
///
/// Malformed or unknown notifications are never reported here; they are
/// dropped by the decoders. Only transport failures and invalid arguments to
/// the encoders surface as errors.
#[derive(Error, Debug)]
pub enum BrewLinkError {
    /// Bluetooth Low Energy related errors
    #[error("BLE error: {0}")]
    Ble(#[from] btleplug::Error),

    /// An operation needed a live connection but none is active
    #[error("Device not connected")]
    NotConnected,

    /// Device disconnected while an operation was in flight
    #[error("Device disconnected")]
    Disconnected,

    /// The transport rejected a write
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// A required GATT characteristic is missing on the peripheral
    #[error("Characteristic {0} not found")]
    CharacteristicNotFound(Uuid),

    /// Invalid command parameters
    #[error("Invalid command parameters: {0}")]
    InvalidParameters(String),

    /// Kettle state blob is too short to carry the documented fields
    #[error("Kettle blob is {len} bytes, expected at least {expected}")]
    InvalidBlob {
        /// Length of the rejected blob
        len: usize,
        /// Minimum accepted length
        expected: usize,
    },

    /// A kettle mutation was requested before any state was read
    #[error("No kettle state available - read the configuration first")]
    NoKettleState,
}

/// Result type for brewlink operations
pub type Result<T> = std::result::Result<T, BrewLinkError>;

impl BrewLinkError {
    /// Check if this error indicates a connection issue
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Ble(_) | Self::NotConnected | Self::Disconnected | Self::WriteFailed(_)
        )
    }

    /// Check if the caller can reasonably try the operation again
    ///
    /// Nothing in this crate retries on its own; this only classifies.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::WriteFailed(_) | Self::NoKettleState | Self::InvalidParameters(_)
        )
    }
}
