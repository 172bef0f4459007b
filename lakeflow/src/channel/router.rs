//! Channel pair and outcome routing with duplicate suppression.

use super::outcome::{ChannelConfig, ChannelMetrics, Envelope, OutcomeChannel};
use crate::core::{attempt_key, OutcomeMessage, StageName};
use crate::errors::DeliveryError;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

/// The success and dead-letter channels receiving stage outcomes.
///
/// Success outcomes and failure signals travel on separate channels so a
/// failing worker cannot crowd out healthy completions. The dead-letter
/// channel is strictly single-delivery: a failure signal reaches the
/// orchestrator's handler at most once and is never redelivered, which
/// leaves retry authority entirely with the pipeline's own retry loop.
#[derive(Debug)]
pub struct ChannelPair {
    success: OutcomeChannel,
    dead_letter: OutcomeChannel,
}

impl ChannelPair {
    /// Creates a channel pair with the same config on both channels.
    #[must_use]
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            success: OutcomeChannel::new(config.clone()),
            dead_letter: OutcomeChannel::new(config),
        }
    }

    /// Publishes a success outcome for a stage attempt.
    ///
    /// # Errors
    ///
    /// Returns a [`DeliveryError`] when the message is oversize or the
    /// channel is full or closed.
    pub fn publish_success(
        &self,
        run_id: Uuid,
        stage: StageName,
        attempt: u32,
    ) -> Result<(), DeliveryError> {
        self.success
            .publish(OutcomeMessage::success(run_id, stage, attempt))
    }

    /// Publishes a failure signal for a stage attempt.
    ///
    /// Exactly one signal is published per failed attempt, covering both
    /// application errors and invocation-level errors.
    ///
    /// # Errors
    ///
    /// Returns a [`DeliveryError`] when the message is oversize or the
    /// channel is full or closed.
    pub fn publish_failure(
        &self,
        run_id: Uuid,
        stage: StageName,
        attempt: u32,
        reason: impl Into<String>,
    ) -> Result<(), DeliveryError> {
        self.dead_letter
            .publish(OutcomeMessage::failure(run_id, stage, attempt, reason))
    }

    /// Returns the success channel.
    #[must_use]
    pub fn success(&self) -> &OutcomeChannel {
        &self.success
    }

    /// Returns the dead-letter channel.
    #[must_use]
    pub fn dead_letter(&self) -> &OutcomeChannel {
        &self.dead_letter
    }
}

/// Routes channel outcomes to per-attempt waiters, exactly once.
///
/// Delivery upstream is at-least-once, so the router keeps a seen-set keyed
/// by `run:stage:attempt` and drops duplicates; replaying a failure signal
/// can therefore never trigger a second retry.
#[derive(Debug, Default)]
pub struct OutcomeRouter {
    waiters: DashMap<String, oneshot::Sender<OutcomeMessage>>,
    seen: DashMap<String, ()>,
    duplicates: AtomicU64,
    unclaimed: AtomicU64,
}

impl OutcomeRouter {
    /// Creates a new router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a waiter for one stage attempt.
    ///
    /// Must be called before the attempt's worker is invoked, so the
    /// outcome cannot arrive unclaimed.
    #[must_use]
    pub fn register(
        &self,
        run_id: Uuid,
        stage: StageName,
        attempt: u32,
    ) -> oneshot::Receiver<OutcomeMessage> {
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(attempt_key(run_id, stage, attempt), tx);
        rx
    }

    /// Removes a waiter whose attempt was abandoned.
    pub fn deregister(&self, run_id: Uuid, stage: StageName, attempt: u32) {
        self.waiters.remove(&attempt_key(run_id, stage, attempt));
    }

    /// Dispatches one message to its waiter.
    ///
    /// Returns true if a waiter consumed the message. Duplicates and
    /// unclaimed outcomes are counted and dropped.
    pub fn dispatch(&self, message: OutcomeMessage) -> bool {
        let key = message.dedup_key();

        if self.seen.insert(key.clone(), ()).is_some() {
            self.duplicates.fetch_add(1, Ordering::Relaxed);
            debug!(
                run_id = %message.run_id,
                stage = %message.stage,
                attempt = message.attempt,
                "Dropped duplicate outcome delivery"
            );
            return false;
        }

        match self.waiters.remove(&key) {
            Some((_, tx)) => {
                if tx.send(message).is_err() {
                    self.unclaimed.fetch_add(1, Ordering::Relaxed);
                    return false;
                }
                true
            }
            None => {
                self.unclaimed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    run_id = %message.run_id,
                    stage = %message.stage,
                    attempt = message.attempt,
                    "Outcome arrived with no registered waiter"
                );
                false
            }
        }
    }

    /// Returns the number of duplicate deliveries dropped.
    #[must_use]
    pub fn duplicates_dropped(&self) -> u64 {
        self.duplicates.load(Ordering::Relaxed)
    }

    /// Returns the number of outcomes that found no waiter.
    #[must_use]
    pub fn unclaimed(&self) -> u64 {
        self.unclaimed.load(Ordering::Relaxed)
    }

    /// Starts the consumer task over both channels of a pair.
    ///
    /// Each channel's receiver can be taken once; calling this a second time
    /// on the same pair returns a task that exits immediately.
    pub fn spawn(self: &Arc<Self>, pair: &ChannelPair) -> tokio::task::JoinHandle<()> {
        let success_rx = pair.success().take_receiver();
        let dead_rx = pair.dead_letter().take_receiver();
        let success_metrics = pair.success().metrics();
        let dead_metrics = pair.dead_letter().metrics();
        let router = Arc::clone(self);

        tokio::spawn(async move {
            let (Some(mut success_rx), Some(mut dead_rx)) = (success_rx, dead_rx) else {
                warn!("Outcome channels already consumed; router not started");
                return;
            };

            let mut success_open = true;
            let mut dead_open = true;

            while success_open || dead_open {
                tokio::select! {
                    envelope = success_rx.recv(), if success_open => {
                        match envelope {
                            Some(envelope) => router.consume(envelope, &success_metrics),
                            None => success_open = false,
                        }
                    }
                    envelope = dead_rx.recv(), if dead_open => {
                        match envelope {
                            Some(envelope) => router.consume(envelope, &dead_metrics),
                            None => dead_open = false,
                        }
                    }
                }
            }
        })
    }

    fn consume(&self, envelope: Envelope, metrics: &ChannelMetrics) {
        if envelope.is_expired() {
            metrics.record_expiry();
            debug!(
                run_id = %envelope.message.run_id,
                stage = %envelope.message.stage,
                "Discarded outcome past its retention window"
            );
            return;
        }
        metrics.record_delivery();
        self.dispatch(envelope.message);
    }
}
