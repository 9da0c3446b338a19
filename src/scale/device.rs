use futures::StreamExt;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex as StdMutex, MutexGuard, PoisonError,
    },
    time::Duration,
};
use tokio::{sync::Mutex, task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{
    protocol::Command,
    session::{ScaleSession, SessionPhase},
    ScaleProtocol,
};
use crate::{
    ble::GattTransport,
    error::{BrewLinkError, Result},
    observer::{Listener, ListenerId},
    types::ScaleConfig,
};

/// Async scale client driving a [`GattTransport`]
///
/// Owns the notification pump and the heartbeat task. Every write goes
/// through a single-writer guard, and nothing is written once the connection
/// has been torn down.
pub struct ScaleDevice<T: GattTransport> {
    shared: Arc<Shared<T>>,
    pump: StdMutex<Option<JoinHandle<()>>>,
}

struct Shared<T> {
    transport: T,
    config: ScaleConfig,
    protocol: StdMutex<ScaleProtocol>,
    writer: Mutex<()>,
    connected: AtomicBool,
    heartbeat: StdMutex<Option<JoinHandle<()>>>,
}

fn lock<V>(mutex: &StdMutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: GattTransport> Shared<T> {
    async fn send(&self, command: &Command) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(BrewLinkError::NotConnected);
        }

        let _writer = self.writer.lock().await;
        if !self.connected.load(Ordering::SeqCst) {
            return Err(BrewLinkError::Disconnected);
        }

        let bytes = command.to_bytes();
        debug!(
            "Sending {:?} ({}): {:02X?}",
            command.message_type(),
            command.write_kind(),
            &bytes[..]
        );
        self.transport.write(&bytes, command.write_kind()).await
    }

    /// Apply `update` under the lock, then call listeners outside it
    fn publish(&self, update: impl FnOnce(&mut ScaleProtocol) -> bool) {
        let (snapshot, listeners) = {
            let mut protocol = lock(&self.protocol);
            if !update(&mut protocol) {
                return;
            }
            (protocol.session().clone(), protocol.listeners())
        };

        for listener in listeners {
            listener(&snapshot);
        }
    }

    fn handle_notification(&self, data: &[u8]) {
        self.publish(|protocol| protocol.ingest(data).1);
    }

    /// Single transition to disconnected; later calls are no-ops
    fn teardown(&self) -> bool {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return false;
        }

        if let Some(heartbeat) = lock(&self.heartbeat).take() {
            heartbeat.abort();
        }
        self.publish(|protocol| {
            protocol.session_mut().disconnect();
            true
        });
        info!("Scale disconnected");
        true
    }
}

impl<T: GattTransport> ScaleDevice<T> {
    /// Wrap a transport with the default configuration
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ScaleConfig::default())
    }

    /// Wrap a transport with a custom configuration
    pub fn with_config(transport: T, config: ScaleConfig) -> Self {
        let protocol = ScaleProtocol::with_config(config.clone());
        Self {
            shared: Arc::new(Shared {
                transport,
                config,
                protocol: StdMutex::new(protocol),
                writer: Mutex::new(()),
                connected: AtomicBool::new(false),
                heartbeat: StdMutex::new(None),
            }),
            pump: StdMutex::new(None),
        }
    }

    /// Subscribe to notifications, run the handshake and start the heartbeat
    ///
    /// # Errors
    ///
    /// Returns the transport error if the subscription or a handshake write
    /// fails. The device is left disconnected in that case.
    pub async fn connect(&self) -> Result<()> {
        if self.is_connected() {
            debug!("Scale already connected");
            return Ok(());
        }

        let mut notifications = self.shared.transport.notifications().await?;
        self.shared.connected.store(true, Ordering::SeqCst);
        self.shared.publish(|protocol| {
            protocol.session_mut().connect();
            true
        });

        let shared = Arc::clone(&self.shared);
        let pump = tokio::spawn(async move {
            while let Some(value) = notifications.next().await {
                shared.handle_notification(&value);
            }
            info!("Scale notification stream ended");
            shared.teardown();
        });
        if let Some(previous) = lock(&self.pump).replace(pump) {
            previous.abort();
        }

        if let Err(e) = self.handshake().await {
            warn!("Scale handshake failed: {}", e);
            self.shared.teardown();
            return Err(e);
        }

        self.start_heartbeat();
        info!("Scale connected");
        Ok(())
    }

    async fn handshake(&self) -> Result<()> {
        let (identify, request) = {
            let protocol = lock(&self.shared.protocol);
            (
                protocol.handshake_command(),
                protocol.notification_request_command(),
            )
        };

        self.shared.send(&identify).await?;
        tokio::time::sleep(self.shared.config.handshake_delay()).await;
        self.shared.send(&request).await
    }

    fn start_heartbeat(&self) {
        let shared = Arc::clone(&self.shared);
        let period = shared.config.heartbeat_interval().max(Duration::from_millis(1));

        let heartbeat = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if !shared.connected.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = shared.send(&Command::Heartbeat).await {
                    warn!("Heartbeat write failed: {}", e);
                }
            }
            debug!("Heartbeat stopped");
        });

        if let Some(previous) = lock(&self.shared.heartbeat).replace(heartbeat) {
            previous.abort();
        }
    }

    /// Zero the scale
    ///
    /// # Errors
    ///
    /// Returns [`BrewLinkError::NotConnected`] before `connect`, or the
    /// transport error if the write fails.
    pub async fn tare(&self) -> Result<()> {
        self.shared.send(&Command::Tare).await
    }

    /// Start the scale timer
    ///
    /// # Errors
    ///
    /// See [`ScaleDevice::tare`].
    pub async fn start_timer(&self) -> Result<()> {
        self.shared.send(&Command::StartTimer).await
    }

    /// Stop the scale timer
    ///
    /// # Errors
    ///
    /// See [`ScaleDevice::tare`].
    pub async fn stop_timer(&self) -> Result<()> {
        self.shared.send(&Command::StopTimer).await
    }

    /// Reset the scale timer and stop recording
    ///
    /// # Errors
    ///
    /// See [`ScaleDevice::tare`]. The session is left untouched if the write fails.
    pub async fn reset_timer(&self) -> Result<()> {
        self.shared.send(&Command::ResetTimer).await?;
        self.shared.publish(|protocol| {
            protocol.session_mut().reset_timer();
            true
        });
        Ok(())
    }

    /// Stop the timer while recording, start it otherwise
    ///
    /// # Errors
    ///
    /// See [`ScaleDevice::tare`].
    pub async fn start_stop_timer(&self) -> Result<()> {
        if self.session().is_recording {
            self.stop_timer().await
        } else {
            self.start_timer().await
        }
    }

    /// Ask the scale for a settings report
    ///
    /// # Errors
    ///
    /// See [`ScaleDevice::tare`].
    pub async fn request_settings(&self) -> Result<()> {
        self.shared.send(&Command::RequestSettings).await
    }

    /// Discard recorded samples
    pub fn clear_samples(&self) {
        self.shared.publish(|protocol| {
            protocol.session_mut().clear_samples();
            true
        });
    }

    /// Snapshot of the session
    #[must_use]
    pub fn session(&self) -> ScaleSession {
        lock(&self.shared.protocol).session().clone()
    }

    /// Current session phase
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        lock(&self.shared.protocol).session().phase()
    }

    /// Register a listener; it is called once right away with the current state
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ScaleSession) + Send + Sync + 'static,
    {
        let listener: Listener<ScaleSession> = Arc::new(listener);
        let (id, snapshot) = {
            let mut protocol = lock(&self.shared.protocol);
            (
                protocol.register(Arc::clone(&listener)),
                protocol.session().clone(),
            )
        };
        listener(&snapshot);
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

    /// Whether the heartbeat task is running
    #[must_use]
    pub fn is_heartbeat_active(&self) -> bool {
        lock(&self.shared.heartbeat)
            .as_ref()
            .is_some_and(|heartbeat| !heartbeat.is_finished())
    }

    /// Report a link loss detected outside the notification stream
    pub fn on_disconnected(&self) {
        if self.shared.teardown() {
            warn!("Scale link lost");
        }
    }

    /// Stop background tasks, clear the session and close the link
    ///
    /// # Errors
    ///
    /// Returns the transport error if closing the link fails. Local state is
    /// torn down regardless.
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

impl<T: GattTransport> Drop for ScaleDevice<T> {
    fn drop(&mut self) {
        self.shared.connected.store(false, Ordering::SeqCst);
        if let Some(heartbeat) = lock(&self.shared.heartbeat).take() {
            heartbeat.abort();
        }
        if let Some(pump) = lock(&self.pump).take() {
            pump.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ble::mock::MockTransport, types::WriteKind};

    const WEIGHT_15G: [u8; 9] = [0xEF, 0xDD, 0x05, 0x96, 0x00, 0x00, 0x00, 0x01, 0x00];

    fn quiet_config() -> ScaleConfig {
        ScaleConfig {
            heartbeat_interval_ms: 60_000,
            handshake_delay_ms: 0,
            ..ScaleConfig::default()
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    async fn connected_device(config: ScaleConfig) -> ScaleDevice<MockTransport> {
        let device = ScaleDevice::with_config(MockTransport::new(), config);
        device.connect().await.unwrap();
        device
    }

    #[tokio::test]
    async fn test_connect_runs_handshake() {
        let device = connected_device(quiet_config()).await;

        let writes = device.transport().writes();
        assert_eq!(device.transport().written_types(), vec![11, 12]);
        assert!(writes
            .iter()
            .all(|(_, kind)| *kind == WriteKind::WithoutResponse));
        assert_eq!(device.phase(), SessionPhase::Idle);
        assert!(device.is_heartbeat_active());
    }

    #[tokio::test]
    async fn test_notifications_reach_session_and_listeners() {
        let device = connected_device(quiet_config()).await;
        let seen = Arc::new(StdMutex::new(Vec::new()));

        let weights = Arc::clone(&seen);
        device.subscribe(move |session: &ScaleSession| weights.lock().unwrap().push(session.weight));

        device.transport().push_notification(&WEIGHT_15G);
        device.transport().push_notification(&[0xEF, 0xDD, 0x07, 0, 2, 0]);
        settle().await;

        let session = device.session();
        assert_eq!(session.weight, 15.0);
        assert_eq!(session.samples.len(), 1);
        assert_eq!(*seen.lock().unwrap(), vec![0.0, 15.0, 15.0]);
    }

    #[tokio::test]
    async fn test_commands_write_with_response() {
        let device = connected_device(quiet_config()).await;

        tokio_test::assert_ok!(device.tare().await);
        tokio_test::assert_ok!(device.start_stop_timer().await);
        tokio_test::assert_ok!(device.stop_timer().await);

        let writes = device.transport().writes();
        assert_eq!(writes[2], (vec![0xEF, 0xDD, 4, 0, 0, 0], WriteKind::WithResponse));
        assert_eq!(writes[3].0, vec![0xEF, 0xDD, 13, 0, 0, 0, 0]);
        assert_eq!(writes[4].0, vec![0xEF, 0xDD, 13, 0, 2, 0, 2]);
    }

    #[tokio::test]
    async fn test_reset_timer_clears_recording() {
        let device = connected_device(quiet_config()).await;
        device.transport().push_notification(&[0xEF, 0xDD, 0x07, 0, 5, 0]);
        settle().await;
        assert_eq!(device.phase(), SessionPhase::Recording);

        device.reset_timer().await.unwrap();
        assert_eq!(device.phase(), SessionPhase::Idle);
        assert_eq!(device.session().timer, 0.0);
    }

    #[tokio::test]
    async fn test_heartbeat_stops_on_disconnect() {
        let device = connected_device(ScaleConfig {
            heartbeat_interval_ms: 20,
            ..quiet_config()
        })
        .await;

        tokio::time::sleep(Duration::from_millis(110)).await;
        let heartbeats = || {
            device
                .transport()
                .written_types()
                .iter()
                .filter(|t| **t == 0)
                .count()
        };
        assert!(heartbeats() >= 2);

        device.disconnect().await.unwrap();
        assert!(!device.is_heartbeat_active());
        let after_disconnect = heartbeats();

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(heartbeats(), after_disconnect);
        assert_eq!(device.session(), ScaleSession::default());
    }

    #[tokio::test]
    async fn test_link_loss_tears_down_once() {
        let device = connected_device(quiet_config()).await;
        let transitions = Arc::new(StdMutex::new(0));

        let counter = Arc::clone(&transitions);
        device.subscribe(move |session: &ScaleSession| {
            if !session.is_connected {
                *counter.lock().unwrap() += 1;
            }
        });

        device.transport().drop_link();
        settle().await;
        device.on_disconnected();

        assert!(!device.is_connected());
        assert!(!device.is_heartbeat_active());
        assert_eq!(*transitions.lock().unwrap(), 1);
        assert!(matches!(device.tare().await, Err(BrewLinkError::NotConnected)));
    }

    #[tokio::test]
    async fn test_single_writer() {
        let device = Arc::new(connected_device(quiet_config()).await);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let device = Arc::clone(&device);
                tokio::spawn(async move { device.tare().await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(device.transport().max_in_flight(), 1);
        assert_eq!(device.transport().writes().len(), 10);
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let device = connected_device(quiet_config()).await;
        device.transport().fail_writes(true);

        let error = tokio_test::assert_err!(device.tare().await);
        assert!(matches!(error, BrewLinkError::WriteFailed(_)));
        assert!(device.is_connected());
    }

    #[tokio::test]
    async fn test_failed_handshake_leaves_disconnected() {
        let device = ScaleDevice::with_config(MockTransport::new(), quiet_config());
        device.transport().fail_writes(true);

        assert!(device.connect().await.is_err());
        assert!(!device.is_connected());
        assert!(!device.is_heartbeat_active());
        assert_eq!(device.phase(), SessionPhase::Disconnected);
    }
}
