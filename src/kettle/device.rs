use futures::StreamExt;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex as StdMutex, MutexGuard, PoisonError,
    },
    time::Duration,
};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, info, warn};

use super::{
    protocol::{ClockMode, KettleBlob, KettleCommand, KettleState, Language, ScheduleMode, TemperatureUnit},
    KettleProtocol,
};
use crate::{
    ble::GattTransport,
    error::{BrewLinkError, Result},
    observer::{Listener, ListenerId},
    types::{KettleConfig, WriteKind},
};

/// Async kettle client driving a [`GattTransport`]
///
/// Writes are strictly sequential: each one is planned against the blob the
/// previous write left behind, so the rolling counter never skips or repeats.
pub struct KettleDevice<T: GattTransport> {
    shared: Arc<Shared<T>>,
    writer: Mutex<()>,
    two_phase_delay: Duration,
    pump: StdMutex<Option<JoinHandle<()>>>,
}

struct Shared<T> {
    transport: T,
    protocol: StdMutex<KettleProtocol>,
    connected: AtomicBool,
}

fn lock<V>(mutex: &StdMutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: GattTransport> Shared<T> {
    fn publish(&self, state: &KettleState) {
        let listeners = lock(&self.protocol).listeners();
        for listener in listeners {
            listener(state);
        }
    }

    fn handle_notification(&self, data: &[u8]) {
        let state = lock(&self.protocol).ingest(data);
        if let Some(state) = state {
            self.publish(&state);
        }
    }

    fn teardown(&self) -> bool {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return false;
        }
        lock(&self.protocol).clear();
        info!("Kettle disconnected");
        true
    }
}

impl<T: GattTransport> KettleDevice<T> {
    /// Wrap a transport with single-write schedule switches
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, KettleConfig::default())
    }

    /// Wrap a transport with a custom configuration
    pub fn with_config(transport: T, config: KettleConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                protocol: StdMutex::new(KettleProtocol::with_schedule_switch(
                    config.schedule_switch,
                )),
                connected: AtomicBool::new(false),
            }),
            writer: Mutex::new(()),
            two_phase_delay: config.two_phase_delay(),
            pump: StdMutex::new(None),
        }
    }

    /// Subscribe to notifications and read the initial blob
    ///
    /// # Errors
    ///
    /// Returns the transport error if the subscription or the read fails, or
    /// [`BrewLinkError::InvalidBlob`] if the kettle returns a short blob.
    pub async fn connect(&self) -> Result<KettleState> {
        let mut notifications = self.shared.transport.notifications().await?;
        let state = self.read_blob().await?;
        self.shared.connected.store(true, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let pump = tokio::spawn(async move {
            while let Some(value) = notifications.next().await {
                shared.handle_notification(&value);
            }
            info!("Kettle notification stream ended");
            shared.teardown();
        });
        if let Some(previous) = lock(&self.pump).replace(pump) {
            previous.abort();
        }

        info!(
            "Kettle connected: {}{}, counter {}",
            state.target_temperature, state.units, state.counter
        );
        self.shared.publish(&state);
        Ok(state)
    }

    async fn read_blob(&self) -> Result<KettleState> {
        let blob = KettleBlob::new(self.shared.transport.read().await?)?;
        Ok(lock(&self.shared.protocol).commit_silently(blob))
    }

    /// Re-read the blob from the kettle
    ///
    /// # Errors
    ///
    /// See [`KettleDevice::connect`].
    pub async fn refresh(&self) -> Result<KettleState> {
        if !self.is_connected() {
            return Err(BrewLinkError::NotConnected);
        }
        let _writer = self.writer.lock().await;
        let state = self.read_blob().await?;
        self.shared.publish(&state);
        Ok(state)
    }

    /// Plan `command` against the current blob and write every step in order
    ///
    /// The current blob advances after each accepted write, so a failure in
    /// the second phase of a two-phase plan leaves the first one recorded.
    ///
    /// # Errors
    ///
    /// Returns [`BrewLinkError::NotConnected`] before `connect`,
    /// [`BrewLinkError::Disconnected`] if the link drops mid-plan, encoder
    /// errors for invalid arguments, or the transport error of a failed write.
    pub async fn apply(&self, command: KettleCommand) -> Result<KettleState> {
        if !self.is_connected() {
            return Err(BrewLinkError::NotConnected);
        }

        let _writer = self.writer.lock().await;
        let plan = lock(&self.shared.protocol).plan(&command)?;
        let two_phase = plan.is_two_phase();
        let mut state = None;

        for (step, blob) in plan.into_steps().into_iter().enumerate() {
            if step > 0 {
                tokio::time::sleep(self.two_phase_delay).await;
            }
            if !self.is_connected() {
                return Err(BrewLinkError::Disconnected);
            }

            debug!("Writing kettle blob {:02X?}", blob.as_bytes());
            self.shared
                .transport
                .write(blob.as_bytes(), WriteKind::WithResponse)
                .await?;

            // Checked under the lock: teardown drops the flag before clearing the blob
            let accepted = {
                let mut protocol = lock(&self.shared.protocol);
                if !self.is_connected() {
                    warn!("Kettle disconnected during write, dropping blob");
                    return Err(BrewLinkError::Disconnected);
                }
                protocol.commit_silently(blob)
            };
            self.shared.publish(&accepted);
            state = Some(accepted);
        }

        if two_phase {
            info!("Applied {:?} in two phases", command);
        } else {
            info!("Applied {:?}", command);
        }
        state.ok_or(BrewLinkError::NoKettleState)
    }

    /// Set the target temperature in Celsius, clamped to 0–100
    ///
    /// # Errors
    ///
    /// See [`KettleDevice::apply`].
    pub async fn set_temperature(&self, celsius: f64) -> Result<KettleState> {
        self.apply(KettleCommand::SetTemperature(celsius)).await
    }

    /// Set the hold time in minutes, clamped to 0–60
    ///
    /// # Errors
    ///
    /// See [`KettleDevice::apply`].
    pub async fn set_hold_time(&self, minutes: i32) -> Result<KettleState> {
        self.apply(KettleCommand::SetHoldTime(minutes)).await
    }

    /// Configure the auto-start schedule
    ///
    /// # Errors
    ///
    /// See [`KettleDevice::apply`].
    pub async fn set_schedule(
        &self,
        mode: ScheduleMode,
        hour: u8,
        minute: u8,
        celsius: f64,
    ) -> Result<KettleState> {
        self.apply(KettleCommand::SetSchedule {
            mode,
            hour,
            minute,
            temperature: celsius,
        })
        .await
    }

    /// Set the display unit
    ///
    /// # Errors
    ///
    /// See [`KettleDevice::apply`].
    pub async fn set_units(&self, units: TemperatureUnit) -> Result<KettleState> {
        self.apply(KettleCommand::SetUnits(units)).await
    }

    /// Turn pre-boil on or off
    ///
    /// # Errors
    ///
    /// See [`KettleDevice::apply`].
    pub async fn set_pre_boil(&self, enabled: bool) -> Result<KettleState> {
        self.apply(KettleCommand::SetPreBoil(enabled)).await
    }

    /// Set the clock, and optionally its face
    ///
    /// # Errors
    ///
    /// See [`KettleDevice::apply`].
    pub async fn set_clock(
        &self,
        hour: u8,
        minute: u8,
        mode: Option<ClockMode>,
    ) -> Result<KettleState> {
        self.apply(KettleCommand::SetClock { hour, minute, mode }).await
    }

    /// Set the clock face
    ///
    /// # Errors
    ///
    /// See [`KettleDevice::apply`].
    pub async fn set_clock_mode(&self, mode: ClockMode) -> Result<KettleState> {
        self.apply(KettleCommand::SetClockMode(mode)).await
    }

    /// Set the chime volume, clamped to 0–10
    ///
    /// # Errors
    ///
    /// See [`KettleDevice::apply`].
    pub async fn set_chime_volume(&self, volume: i32) -> Result<KettleState> {
        self.apply(KettleCommand::SetChimeVolume(volume)).await
    }

    /// Set the menu language
    ///
    /// # Errors
    ///
    /// See [`KettleDevice::apply`].
    pub async fn set_language(&self, language: Language) -> Result<KettleState> {
        self.apply(KettleCommand::SetLanguage(language)).await
    }

    /// Decoded current blob
    #[must_use]
    pub fn state(&self) -> Option<KettleState> {
        lock(&self.shared.protocol).state()
    }

    /// Current blob
    #[must_use]
    pub fn current_blob(&self) -> Option<KettleBlob> {
        lock(&self.shared.protocol).current_blob().cloned()
    }

    /// Register a listener; it is called right away if a state is known
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&KettleState) + Send + Sync + 'static,
    {
        let listener: Listener<KettleState> = Arc::new(listener);
        let (id, state) = {
            let mut protocol = lock(&self.shared.protocol);
            (protocol.register(Arc::clone(&listener)), protocol.state())
        };
        if let Some(state) = state {
            listener(&state);
        }
        id
    }

    /// Remove a listener
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        lock(&self.shared.protocol).unsubscribe(id)
    }

    /// Whether the connection is up
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Report a link loss detected outside the notification stream
    pub fn on_disconnected(&self) {
        if self.shared.teardown() {
            warn!("Kettle link lost");
        }
    }

    /// Stop the notification pump, forget the blob and close the link
    ///
    /// # Errors
    ///
    /// Returns the transport error if closing the link fails.
    pub async fn disconnect(&self) -> Result<()> {
        self.shared.teardown();
        if let Some(pump) = lock(&self.pump).take() {
            pump.abort();
        }
        self.shared.transport.disconnect().await
    }

    /// The underlying transport
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.shared.transport
    }
}

impl<T: GattTransport> Drop for KettleDevice<T> {
    fn drop(&mut self) {
        if let Some(pump) = lock(&self.pump).take() {
            pump.abort();
        }
    }
}
