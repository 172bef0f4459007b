//! Outcome message type carried on the success and dead-letter channels.

use super::{StageName, StageOutcome};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// The outcome of one stage attempt, as published by the invocation wrapper.
///
/// Messages stay small by design: identifiers and status only, never data
/// payloads. The channel enforces a size limit at publish time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeMessage {
    /// The run this outcome belongs to.
    pub run_id: Uuid,
    /// The stage that was attempted.
    pub stage: StageName,
    /// The attempt number (1-based).
    pub attempt: u32,
    /// Whether the attempt succeeded or failed.
    pub status: StageOutcome,
    /// Failure reason, present only on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// When the outcome was observed (ISO 8601).
    pub timestamp: String,
}

impl OutcomeMessage {
    /// Creates a success outcome for a stage attempt.
    #[must_use]
    pub fn success(run_id: Uuid, stage: StageName, attempt: u32) -> Self {
        Self {
            run_id,
            stage,
            attempt,
            status: StageOutcome::Success,
            reason: None,
            timestamp: crate::utils::iso_timestamp(),
        }
    }

    /// Creates a failure outcome for a stage attempt.
    ///
    /// A failure message is what the dead-letter channel calls a failure
    /// signal: exactly one is published per failed attempt.
    #[must_use]
    pub fn failure(
        run_id: Uuid,
        stage: StageName,
        attempt: u32,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            run_id,
            stage,
            attempt,
            status: StageOutcome::Failure,
            reason: Some(reason.into()),
            timestamp: crate::utils::iso_timestamp(),
        }
    }

    /// Returns true if this is a failure signal.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status == StageOutcome::Failure
    }

    /// Returns the deduplication key for this attempt.
    ///
    /// Delivery is at-least-once, so consumers must treat messages with the
    /// same key as one outcome. The key covers `run_id`, `stage` and
    /// `attempt` but not the status: a given attempt resolves exactly once.
    #[must_use]
    pub fn dedup_key(&self) -> String {
        attempt_key(self.run_id, self.stage, self.attempt)
    }
}

/// Builds the dedup key for a `(run, stage, attempt)` triple.
#[must_use]
pub fn attempt_key(run_id: Uuid, stage: StageName, attempt: u32) -> String {
    let combined = format!("{run_id}:{stage}:{attempt}");
    let mut hasher = Sha256::new();
    hasher.update(combined.as_bytes());
    let digest = hasher.finalize();
    format!("attempt:{}", hex::encode(&digest[..16]))
}
