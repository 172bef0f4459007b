//! Error types for the lakeflow orchestrator.
//!
//! Stage-level errors are absorbed by the pipeline's retry loop and never
//! propagate past the run boundary; this taxonomy exists for classification
//! inside the engine and for the tracker/event record.

use crate::core::StageName;
use std::time::Duration;
use thiserror::Error;

/// The main error type for orchestrator operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// An external worker failed to start or returned an error.
    #[error("Invocation error in {stage} stage: {reason}")]
    Invocation {
        /// The stage whose worker failed.
        stage: StageName,
        /// The failure reason.
        reason: String,
    },

    /// A stage or the overall run exceeded its allotted time.
    #[error("{0}")]
    Timeout(#[from] TimeoutError),

    /// An outcome message could not be delivered.
    #[error("{0}")]
    Delivery(#[from] DeliveryError),

    /// A malformed pipeline definition, detected at build time.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),
}

/// The scope in which a timeout fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutScope {
    /// A single stage exceeded its bound while awaiting an outcome.
    Stage(StageName),
    /// The run as a whole exceeded its wall-clock bound.
    Run,
}

/// Error raised when a stage or run exceeds its allotted time.
///
/// Timeouts are never retried automatically; the run is forced to
/// `timed_out` and a fresh scheduled run picks up from there.
#[derive(Debug, Clone, Error)]
#[error("Timed out after {elapsed:?} ({})", scope_label(.scope))]
pub struct TimeoutError {
    /// Where the timeout fired.
    pub scope: TimeoutScope,
    /// The configured bound that was exceeded.
    pub elapsed: Duration,
}

impl TimeoutError {
    /// Creates a stage-scoped timeout error.
    #[must_use]
    pub fn stage(stage: StageName, elapsed: Duration) -> Self {
        Self {
            scope: TimeoutScope::Stage(stage),
            elapsed,
        }
    }

    /// Creates a run-scoped timeout error.
    #[must_use]
    pub fn run(elapsed: Duration) -> Self {
        Self {
            scope: TimeoutScope::Run,
            elapsed,
        }
    }
}

fn scope_label(scope: &TimeoutScope) -> String {
    match scope {
        TimeoutScope::Stage(stage) => format!("{stage} stage"),
        TimeoutScope::Run => "run".to_string(),
    }
}

/// Errors raised when publishing to an outcome channel.
///
/// For retry accounting these count as invocation failures: the
/// orchestrator cannot distinguish a lost outcome from a failed worker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The serialized message exceeded the channel's size limit.
    #[error("Outcome message of {size} bytes exceeds channel limit of {limit} bytes")]
    OversizeMessage {
        /// Serialized message size in bytes.
        size: usize,
        /// The configured limit in bytes.
        limit: usize,
    },

    /// The channel has no consumer left.
    #[error("Outcome channel is closed")]
    Closed,

    /// The channel is at capacity.
    #[error("Outcome channel is full (capacity {capacity})")]
    Full {
        /// The configured channel capacity.
        capacity: usize,
    },
}

/// Error raised when a pipeline definition fails validation.
///
/// Configuration errors are fatal at build time and never surface mid-run.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ConfigurationError {
    /// The error message.
    pub message: String,
    /// The configuration field involved, if known.
    pub field: Option<String>,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: None,
        }
    }

    /// Sets the field involved.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}
