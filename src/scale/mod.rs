//! Acaia scale protocol: frame codec, notification decoder, session state and
//! the async device façade.

/// Async device façade driving a [`GattTransport`](crate::ble::GattTransport)
pub mod device;
/// Frame codec and notification decoder
pub mod protocol;
/// Session state machine
pub mod session;

use bytes::Bytes;
use tracing::{debug, info};

use crate::{
    observer::{Listener, ListenerId, Observers},
    types::ScaleConfig,
};
use protocol::{decode_notification, Command, ScaleEvent};
use session::ScaleSession;

pub use device::ScaleDevice;
pub use protocol::{ButtonKind, Frame};
pub use session::{Sample, SessionPhase};

/// Caller-owned scale protocol state: one session plus its observers
///
/// Decoding is synchronous and never blocks; the caller feeds notification
/// buffers in and writes encoded frames out.
///
/// ```
/// use brewlink::scale::ScaleProtocol;
///
/// let mut scale = ScaleProtocol::new();
/// scale.connect();
///
/// // Direct weight notification: 150 / 10 = 15.0 g
/// let events = scale.decode(&[0xEF, 0xDD, 0x05, 0x96, 0x00, 0x00, 0x00, 0x01, 0x00]);
/// assert_eq!(events.len(), 1);
/// assert_eq!(scale.session().weight, 15.0);
/// ```
#[derive(Debug, Default)]
pub struct ScaleProtocol {
    config: ScaleConfig,
    session: ScaleSession,
    observers: Observers<ScaleSession>,
}

impl ScaleProtocol {
    /// Create a protocol instance with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a protocol instance with custom configuration
    #[must_use]
    pub fn with_config(config: ScaleConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &ScaleConfig {
        &self.config
    }

    /// Current session state
    #[must_use]
    pub const fn session(&self) -> &ScaleSession {
        &self.session
    }

    /// Enter the connected state and notify observers
    pub fn connect(&mut self) {
        info!("Scale session connected");
        self.session.connect();
        self.observers.notify(&self.session);
    }

    /// Clear the session and notify observers
    pub fn disconnect(&mut self) {
        info!("Scale session disconnected");
        self.session.disconnect();
        self.observers.notify(&self.session);
    }

    /// Decode a notification, update the session and notify observers
    pub fn decode(&mut self, data: &[u8]) -> Vec<ScaleEvent> {
        let (events, changed) = self.ingest(data);
        if changed {
            self.observers.notify(&self.session);
        }
        events
    }

    /// Decode a notification and update the session without notifying
    ///
    /// Returns the decoded events and whether the session changed. Events are
    /// only folded into the session while it is connected.
    pub fn ingest(&mut self, data: &[u8]) -> (Vec<ScaleEvent>, bool) {
        let events = decode_notification(data);
        if !self.session.is_connected {
            if !events.is_empty() {
                debug!("Ignoring {} event(s) while disconnected", events.len());
            }
            return (events, false);
        }

        let mut changed = false;
        for event in &events {
            debug!("Scale event: {:?}", event);
            changed |= self.session.apply(event);
        }
        (events, changed)
    }

    /// Apply an explicit timer reset to the session and notify observers
    pub fn reset_timer(&mut self) {
        self.session.reset_timer();
        self.observers.notify(&self.session);
    }

    /// Discard recorded samples and notify observers
    pub fn clear_samples(&mut self) {
        self.session.clear_samples();
        self.observers.notify(&self.session);
    }

    /// Register a listener; it is called once right away with the current state
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&ScaleSession) + Send + Sync + 'static,
    {
        listener(&self.session);
        self.observers.subscribe(listener)
    }

    /// Remove a listener
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Listeners to call outside a lock, in registration order
    #[must_use]
    pub fn listeners(&self) -> Vec<Listener<ScaleSession>> {
        self.observers.listeners()
    }

    /// Tare frame
    #[must_use]
    pub fn encode_tare() -> Bytes {
        Command::Tare.to_bytes()
    }

    /// Start-timer frame
    #[must_use]
    pub fn encode_start_timer() -> Bytes {
        Command::StartTimer.to_bytes()
    }

    /// Stop-timer frame
    #[must_use]
    pub fn encode_stop_timer() -> Bytes {
        Command::StopTimer.to_bytes()
    }

    /// Reset-timer frame
    #[must_use]
    pub fn encode_reset_timer() -> Bytes {
        Command::ResetTimer.to_bytes()
    }

    /// Heartbeat frame
    #[must_use]
    pub fn encode_heartbeat() -> Bytes {
        Command::Heartbeat.to_bytes()
    }

    /// Settings request frame
    #[must_use]
    pub fn encode_request_settings() -> Bytes {
        Command::RequestSettings.to_bytes()
    }

    /// Identify frame with the configured payload
    #[must_use]
    pub fn encode_handshake(&self) -> Bytes {
        self.handshake_command().to_bytes()
    }

    /// Notification request frame with the configured payload
    #[must_use]
    pub fn encode_notification_request(&self) -> Bytes {
        self.notification_request_command().to_bytes()
    }

    pub(crate) fn session_mut(&mut self) -> &mut ScaleSession {
        &mut self.session
    }

    /// Register without the initial call, for callers that deliver it outside a lock
    pub(crate) fn register(&mut self, listener: Listener<ScaleSession>) -> ListenerId {
        self.observers.subscribe(move |session: &ScaleSession| listener(session))
    }

    pub(crate) const fn handshake_command(&self) -> Command {
        Command::Identify(self.config.identify_payload)
    }

    pub(crate) fn notification_request_command(&self) -> Command {
        Command::RequestNotifications(self.config.notification_request.clone())
    }
}
