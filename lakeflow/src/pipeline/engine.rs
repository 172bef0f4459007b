//! Run driver: sequences the two stages, routes outcomes, enforces
//! timeouts and retry budgets.
//!
//! Stage-level errors are absorbed by the retry loop and never escape the
//! run boundary; terminal states surface only through the tracker and the
//! event sink, since the scheduler that starts runs is fire-and-forget.

use super::config::OrchestratorConfig;
use super::run::{advance, NextAction, PipelineRun};
use crate::channel::{ChannelPair, OutcomeRouter};
use crate::core::{RunStatus, StageName, StageOutcome};
use crate::errors::{OrchestratorError, TimeoutError};
use crate::events::{EventSink, RunEvent};
use crate::layers::{DataLayer, LayerRegistry};
use crate::tracker::ExecutionTracker;
use crate::utils::{now_utc, Timestamp};
use crate::workers::{IngestRequest, IngestWorker, TransformRequest, TransformWorker};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Slack on top of a stage's time bound to let a published outcome reach
/// the router before the wait is declared lost.
const DELIVERY_GRACE: Duration = Duration::from_secs(5);

/// Everything a pipeline needs, assembled by the builder.
pub(super) struct PipelineParts {
    pub name: String,
    pub config: OrchestratorConfig,
    pub symbols: Vec<String>,
    pub worker_hint: u32,
    pub ingest: Arc<dyn IngestWorker>,
    pub transform: Arc<dyn TransformWorker>,
    pub layers: Arc<LayerRegistry>,
    pub channels: Arc<ChannelPair>,
    pub router: Arc<OutcomeRouter>,
    pub tracker: Arc<ExecutionTracker>,
    pub sink: Arc<dyn EventSink>,
}

/// A compiled two-stage pipeline: ingest, then transform.
///
/// Compiled once and executed per trigger; each trigger produces an
/// independent run, and overlapping runs share nothing but the channel
/// pair and the tracker.
pub struct Pipeline {
    name: String,
    config: OrchestratorConfig,
    symbols: Vec<String>,
    worker_hint: u32,
    ingest: Arc<dyn IngestWorker>,
    transform: Arc<dyn TransformWorker>,
    layers: Arc<LayerRegistry>,
    channels: Arc<ChannelPair>,
    router: Arc<OutcomeRouter>,
    tracker: Arc<ExecutionTracker>,
    sink: Arc<dyn EventSink>,
    router_started: AtomicBool,
    router_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Pipeline {
    pub(super) fn from_parts(parts: PipelineParts) -> Self {
        Self {
            name: parts.name,
            config: parts.config,
            symbols: parts.symbols,
            worker_hint: parts.worker_hint,
            ingest: parts.ingest,
            transform: parts.transform,
            layers: parts.layers,
            channels: parts.channels,
            router: parts.router,
            tracker: parts.tracker,
            sink: parts.sink,
            router_started: AtomicBool::new(false),
            router_task: Mutex::new(None),
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the execution tracker.
    #[must_use]
    pub fn tracker(&self) -> &Arc<ExecutionTracker> {
        &self.tracker
    }

    /// Returns the outcome channel pair.
    #[must_use]
    pub fn channels(&self) -> &Arc<ChannelPair> {
        &self.channels
    }

    /// Returns the outcome router.
    #[must_use]
    pub fn router(&self) -> &Arc<OutcomeRouter> {
        &self.router
    }

    /// Returns the orchestrator config.
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Starts a new run for a trigger that fired at `trigger_time`.
    ///
    /// The run executes in the background; the returned handle can be
    /// awaited for the terminal record, or dropped for fire-and-forget use.
    /// Overlapping runs are independent and no mutual exclusion is applied
    /// here.
    pub fn start(self: &Arc<Self>, trigger_time: Timestamp) -> RunHandle {
        self.ensure_router();

        let run = PipelineRun::new(&self.name, trigger_time);
        let run_id = run.run_id;
        self.tracker.record_run_created(run);

        let pipeline = Arc::clone(self);
        let join = tokio::spawn(async move { pipeline.drive(run_id, trigger_time).await });

        RunHandle {
            run_id,
            tracker: Arc::clone(&self.tracker),
            join,
        }
    }

    fn ensure_router(&self) {
        if self
            .router_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let task = self.router.spawn(&self.channels);
            *self.router_task.lock() = Some(task);
        }
    }

    async fn drive(self: Arc<Self>, run_id: Uuid, trigger_time: Timestamp) -> PipelineRun {
        self.tracker.record_run_started(run_id);
        self.emit(RunEvent::run_started(run_id));

        // The run bound is measured from the trigger, not from task start.
        let elapsed = (now_utc() - trigger_time).to_std().unwrap_or_default();
        let budget = self.config.run_timeout.saturating_sub(elapsed);

        let result = tokio::time::timeout(budget, self.execute_stages(run_id)).await;

        match result {
            Ok(Ok(())) => {
                self.tracker.record_run_terminal(run_id, RunStatus::Succeeded);
                self.emit(RunEvent::run_succeeded(run_id));
                info!(%run_id, pipeline = %self.name, "Run succeeded");
            }
            Ok(Err(OrchestratorError::Timeout(err))) => {
                self.tracker.record_run_terminal(run_id, RunStatus::TimedOut);
                self.emit(RunEvent::run_timed_out(run_id));
                warn!(%run_id, pipeline = %self.name, error = %err, "Run timed out");
            }
            Ok(Err(err)) => {
                let stage = match &err {
                    OrchestratorError::Invocation { stage, .. } => *stage,
                    _ => StageName::Ingest,
                };
                self.tracker.record_run_terminal(run_id, RunStatus::Failed);
                self.emit(RunEvent::run_failed(run_id, stage));
                warn!(%run_id, pipeline = %self.name, error = %err, "Run failed");
            }
            Err(_) => {
                // In-flight stage work is abandoned, not killed; a worker
                // may keep running and its eventual outcome is disregarded.
                self.tracker.record_run_terminal(run_id, RunStatus::TimedOut);
                self.emit(RunEvent::run_timed_out(run_id));
                warn!(%run_id, pipeline = %self.name, "Run exceeded its wall-clock bound");
            }
        }

        self.tracker
            .get(run_id)
            .unwrap_or_else(|| PipelineRun::with_id(run_id, &self.name, trigger_time))
    }

    async fn execute_stages(&self, run_id: Uuid) -> Result<(), OrchestratorError> {
        let mut stage = StageName::ORDER[0];
        loop {
            match stage {
                StageName::Ingest => self.run_ingest(run_id).await?,
                StageName::Transform => self.run_transform(run_id).await?,
            }
            match advance(stage, StageOutcome::Success) {
                NextAction::Start(next) => stage = next,
                NextAction::Complete | NextAction::Halt => return Ok(()),
            }
        }
    }

    /// Runs the ingest stage through its retry budget.
    ///
    /// Outcomes arrive indirectly through the channel pair. A wait window
    /// that elapses without any delivery is indistinguishable from a failed
    /// worker, so it consumes retry budget like an invocation failure.
    async fn run_ingest(&self, run_id: Uuid) -> Result<(), OrchestratorError> {
        let policy = self.config.ingest.clone();

        for attempt in 1..=policy.max_attempts {
            self.tracker
                .record_stage_start(run_id, StageName::Ingest, attempt);
            self.emit(RunEvent::stage_started(run_id, StageName::Ingest, attempt));

            let waiter = self.router.register(run_id, StageName::Ingest, attempt);
            self.spawn_ingest_invocation(run_id, attempt, policy.timeout);

            let wait_window = policy.timeout + DELIVERY_GRACE;
            match tokio::time::timeout(wait_window, waiter).await {
                Ok(Ok(message)) if message.status == StageOutcome::Success => {
                    self.tracker.record_stage_outcome(
                        run_id,
                        StageName::Ingest,
                        attempt,
                        StageOutcome::Success,
                        None,
                    );
                    self.emit(RunEvent::stage_succeeded(run_id, StageName::Ingest, attempt));
                    return Ok(());
                }
                Ok(Ok(message)) => {
                    let reason = message
                        .reason
                        .unwrap_or_else(|| "unspecified worker failure".to_string());
                    self.tracker.record_stage_outcome(
                        run_id,
                        StageName::Ingest,
                        attempt,
                        StageOutcome::Failure,
                        Some(&reason),
                    );
                    self.emit(RunEvent::stage_failed(
                        run_id,
                        StageName::Ingest,
                        attempt,
                        &reason,
                    ));
                }
                Ok(Err(_)) | Err(_) => {
                    self.router.deregister(run_id, StageName::Ingest, attempt);
                    let reason = "outcome not delivered within stage window";
                    self.tracker.record_stage_outcome(
                        run_id,
                        StageName::Ingest,
                        attempt,
                        StageOutcome::Failure,
                        Some(reason),
                    );
                    self.emit(RunEvent::stage_failed(
                        run_id,
                        StageName::Ingest,
                        attempt,
                        reason,
                    ));
                }
            }

            if attempt < policy.max_attempts {
                tokio::time::sleep(policy.retry.delay_for(attempt)).await;
            }
        }

        Err(OrchestratorError::Invocation {
            stage: StageName::Ingest,
            reason: format!("retry budget exhausted after {} attempts", policy.max_attempts),
        })
    }

    /// Spawns one ingestion invocation and publishes its outcome.
    ///
    /// The wrapper observes the worker's return (or its failure to report
    /// within the stage bound) and publishes exactly one outcome message
    /// per attempt: success to the success channel, anything else to the
    /// dead-letter channel.
    fn spawn_ingest_invocation(&self, run_id: Uuid, attempt: u32, bound: Duration) {
        let worker = Arc::clone(&self.ingest);
        let channels = Arc::clone(&self.channels);
        let request = IngestRequest {
            run_id,
            attempt,
            symbols: self.symbols.clone(),
            target: self.layers.location(DataLayer::Landing).clone(),
        };

        tokio::spawn(async move {
            let outcome = tokio::time::timeout(bound, worker.invoke(&request)).await;
            let published = match outcome {
                Ok(Ok(())) => channels.publish_success(run_id, StageName::Ingest, attempt),
                Ok(Err(err)) => {
                    channels.publish_failure(run_id, StageName::Ingest, attempt, err.to_string())
                }
                Err(_) => channels.publish_failure(
                    run_id,
                    StageName::Ingest,
                    attempt,
                    "worker did not report within stage timeout",
                ),
            };
            if let Err(err) = published {
                error!(%run_id, attempt, error = %err, "Failed to publish ingest outcome");
            }
        });
    }

    /// Runs the transform stage through its retry budget.
    ///
    /// Completion is awaited directly. A worker failure consumes retry
    /// budget; an attempt exceeding the stage bound forces the run to
    /// `timed_out` and is never retried.
    async fn run_transform(&self, run_id: Uuid) -> Result<(), OrchestratorError> {
        let policy = self.config.transform.clone();
        let request = TransformRequest {
            job_name: format!("{}-transform", self.name),
            source: self.layers.location(DataLayer::Landing).clone(),
            target: self.layers.location(DataLayer::Bronze).clone(),
            worker_hint: self.worker_hint,
        };

        for attempt in 1..=policy.max_attempts {
            self.tracker
                .record_stage_start(run_id, StageName::Transform, attempt);
            self.emit(RunEvent::stage_started(run_id, StageName::Transform, attempt));

            match tokio::time::timeout(policy.timeout, self.transform.run(&request)).await {
                Ok(Ok(completion)) if completion.is_success() => {
                    self.tracker.record_stage_outcome(
                        run_id,
                        StageName::Transform,
                        attempt,
                        StageOutcome::Success,
                        None,
                    );
                    self.emit(RunEvent::stage_succeeded(
                        run_id,
                        StageName::Transform,
                        attempt,
                    ));
                    return Ok(());
                }
                Ok(Ok(completion)) => {
                    let reason = completion
                        .error_detail
                        .unwrap_or_else(|| "unspecified transform failure".to_string());
                    self.tracker.record_stage_outcome(
                        run_id,
                        StageName::Transform,
                        attempt,
                        StageOutcome::Failure,
                        Some(&reason),
                    );
                    self.emit(RunEvent::stage_failed(
                        run_id,
                        StageName::Transform,
                        attempt,
                        &reason,
                    ));
                }
                Ok(Err(err)) => {
                    let reason = err.to_string();
                    self.tracker.record_stage_outcome(
                        run_id,
                        StageName::Transform,
                        attempt,
                        StageOutcome::Failure,
                        Some(&reason),
                    );
                    self.emit(RunEvent::stage_failed(
                        run_id,
                        StageName::Transform,
                        attempt,
                        &reason,
                    ));
                }
                Err(_) => {
                    let reason = "did not complete within stage timeout";
                    self.tracker.record_stage_outcome(
                        run_id,
                        StageName::Transform,
                        attempt,
                        StageOutcome::Failure,
                        Some(reason),
                    );
                    self.emit(RunEvent::stage_failed(
                        run_id,
                        StageName::Transform,
                        attempt,
                        reason,
                    ));
                    return Err(TimeoutError::stage(StageName::Transform, policy.timeout).into());
                }
            }

            if attempt < policy.max_attempts {
                tokio::time::sleep(policy.retry.delay_for(attempt)).await;
            }
        }

        Err(OrchestratorError::Invocation {
            stage: StageName::Transform,
            reason: format!("retry budget exhausted after {} attempts", policy.max_attempts),
        })
    }

    fn emit(&self, event: RunEvent) {
        self.sink.try_emit(event.event_type, Some(event.data));
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("symbols", &self.symbols.len())
            .finish()
    }
}

/// Handle to one background run.
#[derive(Debug)]
pub struct RunHandle {
    run_id: Uuid,
    tracker: Arc<ExecutionTracker>,
    join: tokio::task::JoinHandle<PipelineRun>,
}

impl RunHandle {
    /// Returns the run's identifier.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Waits for the run to reach a terminal state and returns its record.
    pub async fn wait(self) -> PipelineRun {
        match self.join.await {
            Ok(run) => run,
            Err(err) => {
                error!(run_id = %self.run_id, error = %err, "Run driver task did not complete");
                self.tracker
                    .get(self.run_id)
                    .unwrap_or_else(|| PipelineRun::with_id(self.run_id, "unknown", now_utc()))
            }
        }
    }
}
