//! Bounded, size-limited outcome channel.

use crate::core::OutcomeMessage;
use crate::errors::DeliveryError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Configuration shared by the success and dead-letter channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Maximum number of queued messages per channel.
    pub capacity: usize,
    /// Maximum serialized message size in bytes; oversize payloads are
    /// rejected at publish time.
    pub max_message_bytes: usize,
    /// How long an unconsumed message stays deliverable. Expiry is a safety
    /// valve, not the primary consumption path.
    pub retention: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            capacity: 128,
            max_message_bytes: 256 * 1024,
            retention: Duration::from_secs(14 * 24 * 60 * 60),
        }
    }
}

impl ChannelConfig {
    /// Creates a new channel config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the queue capacity.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the message size limit.
    #[must_use]
    pub fn with_max_message_bytes(mut self, bytes: usize) -> Self {
        self.max_message_bytes = bytes;
        self
    }

    /// Sets the retention window.
    #[must_use]
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }
}

/// Delivery counters for one channel.
#[derive(Debug, Default)]
pub struct ChannelMetrics {
    published: AtomicU64,
    delivered: AtomicU64,
    expired: AtomicU64,
    rejected: AtomicU64,
}

impl ChannelMetrics {
    /// Records an accepted publish.
    pub fn record_publish(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a message handed to the consumer.
    pub fn record_delivery(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a message discarded past its retention window.
    pub fn record_expiry(&self) {
        self.expired.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a rejected publish (oversize or full).
    pub fn record_rejection(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of accepted publishes.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Returns the number of delivered messages.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Returns the number of expired messages.
    #[must_use]
    pub fn expired(&self) -> u64 {
        self.expired.load(Ordering::Relaxed)
    }

    /// Returns the number of rejected publishes.
    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

/// A queued message with its retention deadline.
#[derive(Debug)]
pub struct Envelope {
    /// The outcome payload.
    pub message: OutcomeMessage,
    /// When the message stops being deliverable.
    pub expires_at: Instant,
}

impl Envelope {
    /// Returns true if the retention window has elapsed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// One durable, at-least-once outcome channel.
///
/// Publishing enforces the size limit; the consumer side discards messages
/// whose retention window elapsed before consumption. A message is handed
/// out at most once: receiving consumes it, there is no redelivery.
#[derive(Debug)]
pub struct OutcomeChannel {
    tx: mpsc::Sender<Envelope>,
    rx: RwLock<Option<mpsc::Receiver<Envelope>>>,
    config: ChannelConfig,
    metrics: Arc<ChannelMetrics>,
}

impl OutcomeChannel {
    /// Creates a new channel with the given config.
    #[must_use]
    pub fn new(config: ChannelConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        Self {
            tx,
            rx: RwLock::new(Some(rx)),
            config,
            metrics: Arc::new(ChannelMetrics::default()),
        }
    }

    /// Publishes an outcome message.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::OversizeMessage`] when the serialized payload
    /// exceeds the configured limit, [`DeliveryError::Full`] when the queue
    /// is at capacity, and [`DeliveryError::Closed`] when the consumer is
    /// gone.
    pub fn publish(&self, message: OutcomeMessage) -> Result<(), DeliveryError> {
        let size = serde_json::to_vec(&message).map(|b| b.len()).unwrap_or(0);
        if size > self.config.max_message_bytes {
            self.metrics.record_rejection();
            return Err(DeliveryError::OversizeMessage {
                size,
                limit: self.config.max_message_bytes,
            });
        }

        let envelope = Envelope {
            message,
            expires_at: Instant::now() + self.config.retention,
        };

        match self.tx.try_send(envelope) {
            Ok(()) => {
                self.metrics.record_publish();
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.metrics.record_rejection();
                Err(DeliveryError::Full {
                    capacity: self.config.capacity,
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.metrics.record_rejection();
                Err(DeliveryError::Closed)
            }
        }
    }

    /// Takes the consumer half of the channel.
    ///
    /// Returns `None` if a consumer already took it; a channel has at most
    /// one consumer for its whole lifetime.
    #[must_use]
    pub fn take_receiver(&self) -> Option<mpsc::Receiver<Envelope>> {
        self.rx.write().take()
    }

    /// Returns a handle to this channel's metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<ChannelMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Returns the channel config.
    #[must_use]
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageName;
    use tokio_test::assert_ok;
    use uuid::Uuid;

    fn config() -> ChannelConfig {
        ChannelConfig::new().with_capacity(4)
    }

    #[tokio::test]
    async fn test_publish_and_receive() {
        let channel = OutcomeChannel::new(config());
        let msg = OutcomeMessage::success(Uuid::new_v4(), StageName::Ingest, 1);

        assert_ok!(channel.publish(msg.clone()));

        let mut rx = channel.take_receiver().unwrap();
        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.message, msg);
        assert_eq!(channel.metrics().published(), 1);
    }

    #[tokio::test]
    async fn test_oversize_message_rejected() {
        let channel = OutcomeChannel::new(config().with_max_message_bytes(64));
        let msg = OutcomeMessage::failure(
            Uuid::new_v4(),
            StageName::Ingest,
            1,
            "x".repeat(256),
        );

        let err = channel.publish(msg).unwrap_err();
        assert!(matches!(err, DeliveryError::OversizeMessage { .. }));
        assert_eq!(channel.metrics().rejected(), 1);
    }

    #[tokio::test]
    async fn test_full_channel_rejects() {
        let channel = OutcomeChannel::new(ChannelConfig::new().with_capacity(1));
        let run_id = Uuid::new_v4();

        channel
            .publish(OutcomeMessage::success(run_id, StageName::Ingest, 1))
            .unwrap();
        let err = channel
            .publish(OutcomeMessage::success(run_id, StageName::Ingest, 2))
            .unwrap_err();

        assert!(matches!(err, DeliveryError::Full { capacity: 1 }));
    }

    #[tokio::test]
    async fn test_closed_channel_rejects() {
        let channel = OutcomeChannel::new(config());
        drop(channel.take_receiver().unwrap());

        let err = channel
            .publish(OutcomeMessage::success(Uuid::new_v4(), StageName::Ingest, 1))
            .unwrap_err();
        assert_eq!(err, DeliveryError::Closed);
    }

    #[tokio::test]
    async fn test_receiver_taken_once() {
        let channel = OutcomeChannel::new(config());
        assert!(channel.take_receiver().is_some());
        assert!(channel.take_receiver().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_envelope_expiry() {
        let channel = OutcomeChannel::new(config().with_retention(Duration::from_secs(60)));
        channel
            .publish(OutcomeMessage::success(Uuid::new_v4(), StageName::Ingest, 1))
            .unwrap();

        let mut rx = channel.take_receiver().unwrap();
        tokio::time::advance(Duration::from_secs(120)).await;

        let envelope = rx.recv().await.unwrap();
        assert!(envelope.is_expired());
    }
}
