//! Invocation contracts for the external ingestion and transform workers.
//!
//! The orchestrator never implements fetch or transform logic itself; it
//! drives these two seams. The ingestion worker's outcome reaches the
//! orchestrator indirectly through the outcome channel pair, while the
//! transform worker reports completion directly from its invocation.

use crate::core::StageOutcome;
use crate::layers::LayerLocation;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use thiserror::Error;
use uuid::Uuid;

/// Error raised when a worker fails to start or reports a failure.
#[derive(Debug, Clone, Error)]
#[error("Worker '{worker}' failed: {reason}")]
pub struct WorkerError {
    /// The worker that failed.
    pub worker: String,
    /// The failure reason.
    pub reason: String,
}

impl WorkerError {
    /// Creates a new worker error.
    #[must_use]
    pub fn new(worker: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            worker: worker.into(),
            reason: reason.into(),
        }
    }
}

/// Invocation input for the ingestion worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    /// The run this invocation belongs to.
    pub run_id: Uuid,
    /// The attempt number (1-based); retries are fresh invocations.
    pub attempt: u32,
    /// Source identifiers to fetch (e.g. ticker symbols).
    pub symbols: Vec<String>,
    /// Destination location in the landing layer.
    pub target: LayerLocation,
}

/// Trait for the external unit of compute that fetches source records.
///
/// A successful return means the worker wrote its records to the landing
/// layer. The invocation wrapper publishes the outcome to the channel pair
/// as soon as the worker returns or is observed to have failed; the worker
/// itself never talks to the orchestrator.
#[async_trait]
pub trait IngestWorker: Send + Sync + Debug {
    /// Invokes the worker for one attempt.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker could not be started or reported a
    /// failure. Invocation-level errors and application errors are treated
    /// identically by the caller.
    async fn invoke(&self, request: &IngestRequest) -> Result<(), WorkerError>;
}

/// Invocation input for the transform worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformRequest {
    /// Job name passed through to the batch runtime.
    pub job_name: String,
    /// Source location (the landing layer).
    pub source: LayerLocation,
    /// Destination location (the bronze layer).
    pub target: LayerLocation,
    /// Worker concurrency hint for the batch runtime.
    pub worker_hint: u32,
}

/// Completion report of a transform invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformCompletion {
    /// Whether the batch job succeeded.
    pub status: StageOutcome,
    /// Error detail, present on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl TransformCompletion {
    /// Creates a success completion.
    #[must_use]
    pub fn success() -> Self {
        Self {
            status: StageOutcome::Success,
            error_detail: None,
        }
    }

    /// Creates a failure completion with detail.
    #[must_use]
    pub fn failure(detail: impl Into<String>) -> Self {
        Self {
            status: StageOutcome::Failure,
            error_detail: Some(detail.into()),
        }
    }

    /// Returns true if the job succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == StageOutcome::Success
    }
}

/// Trait for the external batch job that refines landing data into bronze.
///
/// Completion is awaited (or polled) by the orchestrator directly; the
/// orchestrator enforces its own stage timeout independent of the worker's
/// internal one.
#[async_trait]
pub trait TransformWorker: Send + Sync + Debug {
    /// Runs the batch job to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the job could not be started or was lost before
    /// reporting completion.
    async fn run(&self, request: &TransformRequest) -> Result<TransformCompletion, WorkerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::DataLayer;

    #[test]
    fn test_worker_error_display() {
        let err = WorkerError::new("ticker-fetcher", "missing env var: TICKERS");
        assert!(err.to_string().contains("ticker-fetcher"));
        assert!(err.to_string().contains("TICKERS"));
    }

    #[test]
    fn test_transform_completion() {
        assert!(TransformCompletion::success().is_success());

        let failed = TransformCompletion::failure("executor lost");
        assert!(!failed.is_success());
        assert_eq!(failed.error_detail.as_deref(), Some("executor lost"));
    }

    #[test]
    fn test_ingest_request_serialization() {
        let request = IngestRequest {
            run_id: Uuid::new_v4(),
            attempt: 1,
            symbols: vec!["AAPL".to_string(), "MSFT".to_string()],
            target: LayerLocation::new(DataLayer::Landing, "s3://lake-landing"),
        };

        let json = serde_json::to_string(&request).unwrap();
        let deserialized: IngestRequest = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.symbols, request.symbols);
        assert_eq!(deserialized.target.layer, DataLayer::Landing);
    }
}
