use async_trait::async_trait;
use btleplug::{
    api::{Characteristic, Peripheral as _, WriteType},
    platform::Peripheral,
};
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    error::{BrewLinkError, Result},
    types::WriteKind,
    ACAIA_NOTIFY_CHAR_UUID, ACAIA_WRITE_CHAR_UUID, STAGG_CONFIG_CHAR_UUID,
};

/// Stream of raw notification values from one characteristic
pub type NotificationStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// The narrow slice of a GATT client the protocol layer needs
///
/// Implementations wrap an already-connected peripheral. Discovery and
/// connection are the platform's business.
#[async_trait]
pub trait GattTransport: Send + Sync + 'static {
    /// Write a buffer to the command characteristic
    async fn write(&self, data: &[u8], kind: WriteKind) -> Result<()>;

    /// Read the current value of the state characteristic
    async fn read(&self) -> Result<Vec<u8>>;

    /// Subscribe to notifications; the stream ends when the link drops
    async fn notifications(&self) -> Result<NotificationStream>;

    /// Tear down the link
    async fn disconnect(&self) -> Result<()>;
}

impl From<WriteKind> for WriteType {
    fn from(kind: WriteKind) -> Self {
        match kind {
            WriteKind::WithResponse => Self::WithResponse,
            WriteKind::WithoutResponse => Self::WithoutResponse,
        }
    }
}

/// [`GattTransport`] backed by a connected btleplug peripheral
pub struct BtleplugTransport {
    peripheral: Peripheral,
    write_char: Characteristic,
    notify_char: Characteristic,
}

impl BtleplugTransport {
    /// Resolve the write and notify characteristics and subscribe to notifications
    ///
    /// # Errors
    ///
    /// Returns [`BrewLinkError::CharacteristicNotFound`] if either
    /// characteristic is missing, or [`BrewLinkError::Ble`] if service
    /// discovery or the subscription fails.
    pub async fn new(peripheral: Peripheral, write_uuid: Uuid, notify_uuid: Uuid) -> Result<Self> {
        peripheral.discover_services().await?;

        let write_char = find_characteristic(&peripheral, write_uuid)?;
        let notify_char = find_characteristic(&peripheral, notify_uuid)?;

        peripheral.subscribe(&notify_char).await?;
        info!("Subscribed to notifications on {}", notify_uuid);

        Ok(Self {
            peripheral,
            write_char,
            notify_char,
        })
    }

    /// Transport for an Acaia scale
    ///
    /// # Errors
    ///
    /// See [`BtleplugTransport::new`].
    pub async fn acaia(peripheral: Peripheral) -> Result<Self> {
        Self::new(peripheral, ACAIA_WRITE_CHAR_UUID, ACAIA_NOTIFY_CHAR_UUID).await
    }

    /// Transport for a Stagg EKG Pro kettle; one characteristic carries the whole state
    ///
    /// # Errors
    ///
    /// See [`BtleplugTransport::new`].
    pub async fn stagg(peripheral: Peripheral) -> Result<Self> {
        Self::new(peripheral, STAGG_CONFIG_CHAR_UUID, STAGG_CONFIG_CHAR_UUID).await
    }

    /// The wrapped peripheral
    #[must_use]
    pub const fn peripheral(&self) -> &Peripheral {
        &self.peripheral
    }
}

#[async_trait]
impl GattTransport for BtleplugTransport {
    async fn write(&self, data: &[u8], kind: WriteKind) -> Result<()> {
        debug!("Writing {} ({}): {:02X?}", self.write_char.uuid, kind, data);

        self.peripheral
            .write(&self.write_char, data, kind.into())
            .await
            .map_err(|e| BrewLinkError::WriteFailed(e.to_string()))
    }

    async fn read(&self) -> Result<Vec<u8>> {
        Ok(self.peripheral.read(&self.notify_char).await?)
    }

    async fn notifications(&self) -> Result<NotificationStream> {
        let uuid = self.notify_char.uuid;
        let stream = self.peripheral.notifications().await?;

        Ok(Box::pin(stream.filter_map(move |notification| async move {
            (notification.uuid == uuid).then_some(notification.value)
        })))
    }

    async fn disconnect(&self) -> Result<()> {
        self.peripheral.disconnect().await?;
        Ok(())
    }
}

fn find_characteristic(peripheral: &Peripheral, uuid: Uuid) -> Result<Characteristic> {
    peripheral
        .characteristics()
        .into_iter()
        .find(|c| c.uuid == uuid)
        .ok_or(BrewLinkError::CharacteristicNotFound(uuid))
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::{
        sync::{
            atomic::{AtomicBool, AtomicUsize, Ordering},
            Mutex,
        },
        time::Duration,
    };
    use tokio::sync::mpsc;

    /// In-memory transport that records writes and replays notifications
    pub(crate) struct MockTransport {
        writes: Mutex<Vec<(Vec<u8>, WriteKind)>>,
        read_value: Mutex<Vec<u8>>,
        sender: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
        receiver: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
        fail_writes: AtomicBool,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        write_delay: Duration,
    }

    impl MockTransport {
        pub(crate) fn new() -> Self {
            Self::with_read_value(Vec::new())
        }

        pub(crate) fn with_read_value(value: Vec<u8>) -> Self {
            let (sender, receiver) = mpsc::unbounded_channel();
            Self {
                writes: Mutex::new(Vec::new()),
                read_value: Mutex::new(value),
                sender: Mutex::new(Some(sender)),
                receiver: Mutex::new(Some(receiver)),
                fail_writes: AtomicBool::new(false),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                write_delay: Duration::from_millis(2),
            }
        }

        pub(crate) fn with_write_delay(mut self, delay: Duration) -> Self {
            self.write_delay = delay;
            self
        }

        pub(crate) fn push_notification(&self, value: &[u8]) {
            if let Some(sender) = self.sender.lock().unwrap().as_ref() {
                let _ = sender.send(value.to_vec());
            }
        }

        /// Ends the notification stream, as a dropped link would
        pub(crate) fn drop_link(&self) {
            self.sender.lock().unwrap().take();
        }

        pub(crate) fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub(crate) fn writes(&self) -> Vec<(Vec<u8>, WriteKind)> {
            self.writes.lock().unwrap().clone()
        }

        pub(crate) fn written_types(&self) -> Vec<u8> {
            self.writes().iter().map(|(data, _)| data[2]).collect()
        }

        pub(crate) fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GattTransport for MockTransport {
        async fn write(&self, data: &[u8], kind: WriteKind) -> Result<()> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(self.write_delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(BrewLinkError::WriteFailed("mock rejected write".to_string()));
            }
            self.writes.lock().unwrap().push((data.to_vec(), kind));
            Ok(())
        }

        async fn read(&self) -> Result<Vec<u8>> {
            Ok(self.read_value.lock().unwrap().clone())
        }

        async fn notifications(&self) -> Result<NotificationStream> {
            let receiver = self
                .receiver
                .lock()
                .unwrap()
                .take()
                .ok_or(BrewLinkError::NotConnected)?;

            Ok(Box::pin(futures::stream::unfold(
                receiver,
                |mut receiver| async move { receiver.recv().await.map(|value| (value, receiver)) },
            )))
        }

        async fn disconnect(&self) -> Result<()> {
            self.drop_link();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;

    #[test]
    fn test_write_kind_mapping() {
        assert_eq!(WriteType::from(WriteKind::WithResponse), WriteType::WithResponse);
        assert_eq!(
            WriteType::from(WriteKind::WithoutResponse),
            WriteType::WithoutResponse
        );
    }

    #[tokio::test]
    async fn test_mock_notification_stream_ends_on_drop() {
        let transport = MockTransport::new();
        let mut stream = transport.notifications().await.unwrap();

        transport.push_notification(&[1, 2, 3]);
        transport.drop_link();

        assert_eq!(stream.next().await, Some(vec![1, 2, 3]));
        assert_eq!(stream.next().await, None);
        assert!(transport.notifications().await.is_err());
    }
}
