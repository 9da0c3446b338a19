//! Stagg EKG Pro kettle protocol: configuration blob codec, write planning and
//! the async device façade.

/// Async device façade driving a [`GattTransport`](crate::ble::GattTransport)
pub mod device;
/// Blob codec, commands and write plans
pub mod protocol;

use tracing::{debug, info};

use crate::{
    error::{BrewLinkError, Result},
    observer::{Listener, ListenerId, Observers},
    types::ScheduleSwitch,
};
use protocol::{KettleBlob, KettleCommand, KettleEncoder, KettleState, WritePlan, BLOB_LEN};

pub use device::KettleDevice;
pub use protocol::{ClockMode, Language, ScheduleMode, TemperatureUnit};

/// Caller-owned kettle state: the last accepted blob plus its observers
///
/// Every mutation is planned against the most recently observed blob. The
/// caller writes each planned blob and then commits it.
///
/// ```
/// use brewlink::kettle::{protocol::KettleCommand, KettleProtocol};
///
/// let mut kettle = KettleProtocol::new();
/// kettle.update(&[0, 0x02, 0, 0x80, 180, 0, 0xC0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 5]);
///
/// let plan = kettle.plan(&KettleCommand::SetTemperature(96.0)).unwrap();
/// for blob in plan.into_steps() {
///     // write `blob` to the kettle, then:
///     kettle.commit(blob);
/// }
/// assert_eq!(kettle.state().unwrap().target_temperature, 96.0);
/// assert_eq!(kettle.current_blob().unwrap().counter(), 6);
/// ```
#[derive(Debug, Default)]
pub struct KettleProtocol {
    encoder: KettleEncoder,
    blob: Option<KettleBlob>,
    observers: Observers<KettleState>,
}

impl KettleProtocol {
    /// Single-write schedule switches
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Custom once/daily switch strategy
    #[must_use]
    pub fn with_schedule_switch(schedule_switch: ScheduleSwitch) -> Self {
        Self {
            encoder: KettleEncoder::new(schedule_switch),
            ..Self::default()
        }
    }

    /// Last accepted blob
    #[must_use]
    pub const fn current_blob(&self) -> Option<&KettleBlob> {
        self.blob.as_ref()
    }

    /// Decoded last accepted blob
    #[must_use]
    pub fn state(&self) -> Option<KettleState> {
        self.blob.as_ref().map(KettleBlob::state)
    }

    /// Replace the current blob from a read or notification and notify observers
    ///
    /// Buffers shorter than the blob are dropped.
    pub fn update(&mut self, data: &[u8]) -> Option<KettleState> {
        let state = self.ingest(data)?;
        self.observers.notify(&state);
        Some(state)
    }

    /// Replace the current blob without notifying
    pub fn ingest(&mut self, data: &[u8]) -> Option<KettleState> {
        if data.len() < BLOB_LEN {
            debug!("Dropping {}-byte kettle notification", data.len());
            return None;
        }

        let blob = KettleBlob::new(data.to_vec()).ok()?;
        let state = blob.state();
        debug!("Kettle state: {:?}", state);
        self.blob = Some(blob);
        Some(state)
    }

    /// Plan the writes for `command` against the current blob
    ///
    /// # Errors
    ///
    /// Returns [`BrewLinkError::NoKettleState`] before any blob was seen, or
    /// [`BrewLinkError::InvalidParameters`] for an out-of-range time.
    pub fn plan(&self, command: &KettleCommand) -> Result<WritePlan> {
        let current = self.blob.as_ref().ok_or(BrewLinkError::NoKettleState)?;
        self.encoder.plan(current, command)
    }

    /// Record a blob the kettle accepted and notify observers
    pub fn commit(&mut self, blob: KettleBlob) -> KettleState {
        let state = self.commit_silently(blob);
        self.observers.notify(&state);
        state
    }

    pub(crate) fn commit_silently(&mut self, blob: KettleBlob) -> KettleState {
        let state = blob.state();
        info!("Kettle counter now {}", blob.counter());
        self.blob = Some(blob);
        state
    }

    /// Forget the current blob
    pub fn clear(&mut self) {
        self.blob = None;
    }

    /// Register a listener; it is called right away if a state is known
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&KettleState) + Send + Sync + 'static,
    {
        if let Some(state) = self.state() {
            listener(&state);
        }
        self.observers.subscribe(listener)
    }

    /// Remove a listener
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Listeners to call outside a lock, in registration order
    #[must_use]
    pub fn listeners(&self) -> Vec<Listener<KettleState>> {
        self.observers.listeners()
    }

    pub(crate) fn register(&mut self, listener: Listener<KettleState>) -> ListenerId {
        self.observers.subscribe(move |state: &KettleState| listener(state))
    }
}
