//! Scripted worker doubles.

use crate::workers::{
    IngestRequest, IngestWorker, TransformCompletion, TransformRequest, TransformWorker,
    WorkerError,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

/// Behavior of one scripted ingest invocation.
#[derive(Debug, Clone)]
pub enum IngestBehavior {
    /// Return success immediately.
    Succeed,
    /// Return success after a delay.
    SucceedAfter(Duration),
    /// Fail with the given reason.
    Fail(String),
    /// Fail with the given reason after a delay.
    FailAfter(Duration, String),
    /// Never return.
    Hang,
}

/// An ingest worker that replays a script of behaviors, one per attempt.
///
/// When the script runs out, the fallback behavior applies. Every request
/// is recorded for assertions.
#[derive(Debug)]
pub struct ScriptedIngestWorker {
    script: Mutex<VecDeque<IngestBehavior>>,
    fallback: IngestBehavior,
    requests: Mutex<Vec<IngestRequest>>,
}

impl Default for ScriptedIngestWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedIngestWorker {
    /// Creates a worker that succeeds on every attempt.
    #[must_use]
    pub fn new() -> Self {
        Self::with_fallback(IngestBehavior::Succeed)
    }

    /// Creates a worker with a fallback behavior for unscripted attempts.
    #[must_use]
    pub fn with_fallback(fallback: IngestBehavior) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Appends behaviors to the script.
    #[must_use]
    pub fn with_script(self, behaviors: impl IntoIterator<Item = IngestBehavior>) -> Self {
        self.script.lock().extend(behaviors);
        self
    }

    /// Returns how many times the worker was invoked.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Returns the recorded requests.
    #[must_use]
    pub fn requests(&self) -> Vec<IngestRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl IngestWorker for ScriptedIngestWorker {
    async fn invoke(&self, request: &IngestRequest) -> Result<(), WorkerError> {
        self.requests.lock().push(request.clone());
        let behavior = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match behavior {
            IngestBehavior::Succeed => Ok(()),
            IngestBehavior::SucceedAfter(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            IngestBehavior::Fail(reason) => Err(WorkerError::new("scripted-ingest", reason)),
            IngestBehavior::FailAfter(delay, reason) => {
                tokio::time::sleep(delay).await;
                Err(WorkerError::new("scripted-ingest", reason))
            }
            IngestBehavior::Hang => futures::future::pending().await,
        }
    }
}

/// Behavior of one scripted transform invocation.
#[derive(Debug, Clone)]
pub enum TransformBehavior {
    /// Complete successfully.
    Complete,
    /// Complete successfully after a delay.
    CompleteAfter(Duration),
    /// Complete with a failed status and error detail.
    Fail(String),
    /// Fail at the invocation level.
    Error(String),
    /// Never complete.
    Hang,
}

/// A transform worker that replays a script of behaviors, one per attempt.
#[derive(Debug)]
pub struct ScriptedTransformWorker {
    script: Mutex<VecDeque<TransformBehavior>>,
    fallback: TransformBehavior,
    requests: Mutex<Vec<TransformRequest>>,
}

impl Default for ScriptedTransformWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransformWorker {
    /// Creates a worker that completes successfully on every attempt.
    #[must_use]
    pub fn new() -> Self {
        Self::with_fallback(TransformBehavior::Complete)
    }

    /// Creates a worker with a fallback behavior for unscripted attempts.
    #[must_use]
    pub fn with_fallback(fallback: TransformBehavior) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Appends behaviors to the script.
    #[must_use]
    pub fn with_script(self, behaviors: impl IntoIterator<Item = TransformBehavior>) -> Self {
        self.script.lock().extend(behaviors);
        self
    }

    /// Returns how many times the worker was invoked.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Returns the recorded requests.
    #[must_use]
    pub fn requests(&self) -> Vec<TransformRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl TransformWorker for ScriptedTransformWorker {
    async fn run(&self, request: &TransformRequest) -> Result<TransformCompletion, WorkerError> {
        self.requests.lock().push(request.clone());
        let behavior = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match behavior {
            TransformBehavior::Complete => Ok(TransformCompletion::success()),
            TransformBehavior::CompleteAfter(delay) => {
                tokio::time::sleep(delay).await;
                Ok(TransformCompletion::success())
            }
            TransformBehavior::Fail(detail) => Ok(TransformCompletion::failure(detail)),
            TransformBehavior::Error(reason) => Err(WorkerError::new("scripted-transform", reason)),
            TransformBehavior::Hang => futures::future::pending().await,
        }
    }
}
