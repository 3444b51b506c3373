//! Bounded, timeout-aware channel endpoints connecting pipeline stages.
//!
//! The core only assumes blocking send/receive with a distinguished timeout
//! outcome; a timed-out receive is a normal quiet period, a timed-out send is
//! a transient downstream stall. The `ChannelHub` wires endpoints together by
//! the string uids that appear in stage configuration.

use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

/// Default bound for stage-to-stage channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default bound on a single send/receive call.
pub const DEFAULT_QUEUE_TIMEOUT: Duration = Duration::from_millis(100);

/// Create a bounded endpoint pair.
pub fn channel<T>(capacity: usize) -> (StreamSender<T>, StreamReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (StreamSender { inner: tx }, StreamReceiver { inner: rx })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("send timed out")]
    Timeout,
    #[error("channel closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RecvError {
    #[error("receive timed out")]
    Timeout,
    #[error("channel closed")]
    Closed,
}

/// Sending half of a stage channel.
#[derive(Debug)]
pub struct StreamSender<T> {
    inner: mpsc::Sender<T>,
}

impl<T> Clone for StreamSender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> StreamSender<T> {
    /// Send `value`, waiting at most `timeout` for channel capacity.
    pub async fn send_timeout(&self, value: T, timeout: Duration) -> Result<(), SendError> {
        self.inner
            .send_timeout(value, timeout)
            .await
            .map_err(|err| match err {
                mpsc::error::SendTimeoutError::Timeout(_) => SendError::Timeout,
                mpsc::error::SendTimeoutError::Closed(_) => SendError::Closed,
            })
    }
}

/// Receiving half of a stage channel. Exactly one consumer per channel.
#[derive(Debug)]
pub struct StreamReceiver<T> {
    inner: mpsc::Receiver<T>,
}

impl<T> StreamReceiver<T> {
    /// Receive the next message, waiting at most `timeout`.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<T, RecvError> {
        match tokio::time::timeout(timeout, self.inner.recv()).await {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(RecvError::Closed),
            Err(_) => Err(RecvError::Timeout),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelHubError {
    #[error("channel already exists: {0}")]
    AlreadyExists(String),
    #[error("channel not found: {0}")]
    NotFound(String),
    #[error("channel {0} has a different element type")]
    WrongType(String),
    #[error("receiver for channel {0} already taken")]
    ReceiverTaken(String),
}

struct HubEntry {
    sender: Box<dyn Any + Send + Sync>,
    receiver: Option<Box<dyn Any + Send>>,
}

/// Registry of named channels, keyed by the uid strings used in stage
/// configuration.
#[derive(Default)]
pub struct ChannelHub {
    entries: Mutex<HashMap<String, HubEntry>>,
}

impl ChannelHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new bounded channel under `uid`.
    pub fn create<T: Send + 'static>(
        &self,
        uid: impl Into<String>,
        capacity: usize,
    ) -> Result<(), ChannelHubError> {
        let uid = uid.into();
        let mut entries = self.entries.lock();
        if entries.contains_key(&uid) {
            return Err(ChannelHubError::AlreadyExists(uid));
        }
        let (tx, rx) = channel::<T>(capacity);
        entries.insert(
            uid,
            HubEntry {
                sender: Box::new(tx),
                receiver: Some(Box::new(rx)),
            },
        );
        Ok(())
    }

    /// Clone the send side of channel `uid`.
    pub fn sender<T: Send + 'static>(&self, uid: &str) -> Result<StreamSender<T>, ChannelHubError> {
        let entries = self.entries.lock();
        let entry = entries
            .get(uid)
            .ok_or_else(|| ChannelHubError::NotFound(uid.to_string()))?;
        entry
            .sender
            .downcast_ref::<StreamSender<T>>()
            .cloned()
            .ok_or_else(|| ChannelHubError::WrongType(uid.to_string()))
    }

    /// Move the receive side of channel `uid` out of the hub.
    pub fn take_receiver<T: Send + 'static>(
        &self,
        uid: &str,
    ) -> Result<StreamReceiver<T>, ChannelHubError> {
        let mut entries = self.entries.lock();
        let entry = entries
            .get_mut(uid)
            .ok_or_else(|| ChannelHubError::NotFound(uid.to_string()))?;
        // Probe the type before consuming so a mismatch leaves the entry intact.
        match entry.receiver.as_ref() {
            Some(receiver) if !receiver.is::<StreamReceiver<T>>() => {
                return Err(ChannelHubError::WrongType(uid.to_string()));
            }
            Some(_) => {}
            None => return Err(ChannelHubError::ReceiverTaken(uid.to_string())),
        }
        let receiver = entry.receiver.take().expect("probed above");
        Ok(*receiver
            .downcast::<StreamReceiver<T>>()
            .expect("probed above"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_and_receive_within_timeout() {
        let (tx, mut rx) = channel::<u32>(4);
        tx.send_timeout(7, DEFAULT_QUEUE_TIMEOUT).await.unwrap();
        assert_eq!(rx.recv_timeout(DEFAULT_QUEUE_TIMEOUT).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn receive_times_out_when_quiet() {
        let (_tx, mut rx) = channel::<u32>(4);
        let err = rx.recv_timeout(Duration::from_millis(10)).await.unwrap_err();
        assert_eq!(err, RecvError::Timeout);
    }

    #[tokio::test]
    async fn receive_reports_closed_channel() {
        let (tx, mut rx) = channel::<u32>(4);
        drop(tx);
        let err = rx.recv_timeout(Duration::from_millis(10)).await.unwrap_err();
        assert_eq!(err, RecvError::Closed);
    }

    #[tokio::test]
    async fn send_times_out_when_full() {
        let (tx, _rx) = channel::<u32>(1);
        tx.send_timeout(1, Duration::from_millis(10)).await.unwrap();
        let err = tx
            .send_timeout(2, Duration::from_millis(10))
            .await
            .unwrap_err();
        assert_eq!(err, SendError::Timeout);
    }

    #[tokio::test]
    async fn hub_wires_endpoints_by_uid() {
        let hub = ChannelHub::new();
        hub.create::<u32>("tps", 4).unwrap();
        let tx = hub.sender::<u32>("tps").unwrap();
        let mut rx = hub.take_receiver::<u32>("tps").unwrap();
        tx.send_timeout(11, DEFAULT_QUEUE_TIMEOUT).await.unwrap();
        assert_eq!(rx.recv_timeout(DEFAULT_QUEUE_TIMEOUT).await.unwrap(), 11);
    }

    #[test]
    fn hub_rejects_duplicate_uid() {
        let hub = ChannelHub::new();
        hub.create::<u32>("tps", 4).unwrap();
        assert!(matches!(
            hub.create::<u32>("tps", 4),
            Err(ChannelHubError::AlreadyExists(_))
        ));
    }

    #[test]
    fn hub_rejects_second_receiver_take() {
        let hub = ChannelHub::new();
        hub.create::<u32>("tps", 4).unwrap();
        let _rx = hub.take_receiver::<u32>("tps").unwrap();
        assert!(matches!(
            hub.take_receiver::<u32>("tps"),
            Err(ChannelHubError::ReceiverTaken(_))
        ));
    }

    #[test]
    fn hub_rejects_type_mismatch() {
        let hub = ChannelHub::new();
        hub.create::<u32>("tps", 4).unwrap();
        assert!(matches!(
            hub.sender::<String>("tps"),
            Err(ChannelHubError::WrongType(_))
        ));
        assert!(matches!(
            hub.take_receiver::<String>("tps"),
            Err(ChannelHubError::WrongType(_))
        ));
        // Entry must survive the failed take.
        assert!(hub.take_receiver::<u32>("tps").is_ok());
    }
}
