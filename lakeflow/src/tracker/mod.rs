//! Durable record of run and stage state.
//!
//! The tracker is the observability surface of the orchestrator: every
//! stage start, stage outcome and terminal transition is recorded here, and
//! the engine's timeout/retry decisions are reconstructible from these
//! records alone. Updates are append-only; once a run is terminal its
//! history never changes (corrections require a new run).

use crate::core::{RunStatus, StageName, StageOutcome};
use crate::pipeline::{PipelineRun, StageExecution};
use crate::utils::{now_utc, Timestamp};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Filter for querying recorded runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunFilter {
    /// Restrict to one pipeline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
    /// Restrict to one status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    /// Restrict to runs triggered at or after this instant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<Timestamp>,
    /// Restrict to runs triggered before this instant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<Timestamp>,
}

impl RunFilter {
    /// Creates an empty filter matching every run.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to one pipeline.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: impl Into<String>) -> Self {
        self.pipeline = Some(pipeline.into());
        self
    }

    /// Restricts to one status.
    #[must_use]
    pub fn with_status(mut self, status: RunStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restricts to runs triggered at or after the instant.
    #[must_use]
    pub fn since(mut self, instant: Timestamp) -> Self {
        self.since = Some(instant);
        self
    }

    /// Restricts to runs triggered before the instant.
    #[must_use]
    pub fn until(mut self, instant: Timestamp) -> Self {
        self.until = Some(instant);
        self
    }

    /// Returns true if the run matches the filter.
    #[must_use]
    pub fn matches(&self, run: &PipelineRun) -> bool {
        if let Some(ref pipeline) = self.pipeline {
            if run.pipeline != *pipeline {
                return false;
            }
        }
        if let Some(status) = self.status {
            if run.status != status {
                return false;
            }
        }
        if let Some(since) = self.since {
            if run.trigger_time < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if run.trigger_time >= until {
                return false;
            }
        }
        true
    }
}

/// Thread-safe, append-only store of pipeline runs.
#[derive(Debug, Default)]
pub struct ExecutionTracker {
    runs: DashMap<Uuid, PipelineRun>,
}

impl ExecutionTracker {
    /// Creates a new tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a freshly created run.
    pub fn record_run_created(&self, run: PipelineRun) {
        self.runs.insert(run.run_id, run);
    }

    /// Transitions a pending run to running.
    pub fn record_run_started(&self, run_id: Uuid) {
        if let Some(mut run) = self.runs.get_mut(&run_id) {
            if run.status == RunStatus::Pending {
                run.status = RunStatus::Running;
            }
        }
    }

    /// Records the start of one stage attempt.
    pub fn record_stage_start(&self, run_id: Uuid, stage: StageName, attempt: u32) {
        if let Some(mut run) = self.runs.get_mut(&run_id) {
            if run.status.is_terminal() {
                warn!(%run_id, %stage, attempt, "Ignored stage start on terminal run");
                return;
            }
            run.stages.push(StageExecution::new(stage, attempt));
        }
    }

    /// Records the outcome of one stage attempt.
    ///
    /// The attempt must already have a start record; outcomes for unknown
    /// attempts and resolved attempts are ignored with a warning.
    pub fn record_stage_outcome(
        &self,
        run_id: Uuid,
        stage: StageName,
        attempt: u32,
        outcome: StageOutcome,
        reason: Option<&str>,
    ) {
        if let Some(mut run) = self.runs.get_mut(&run_id) {
            if run.status.is_terminal() {
                warn!(%run_id, %stage, attempt, "Ignored stage outcome on terminal run");
                return;
            }
            match run
                .stages
                .iter_mut()
                .find(|e| e.stage == stage && e.attempt == attempt)
            {
                Some(execution) if !execution.is_resolved() => {
                    execution.resolve(outcome, reason);
                }
                Some(_) => {
                    warn!(%run_id, %stage, attempt, "Ignored outcome for resolved attempt");
                }
                None => {
                    warn!(%run_id, %stage, attempt, "Ignored outcome for unknown attempt");
                }
            }
        }
    }

    /// Records the terminal status of a run.
    ///
    /// Terminal states are write-once: a second terminal transition is
    /// ignored with a warning. In-flight stage attempts are left as they
    /// are; a `timed_out` run may carry an unresolved attempt, which is the
    /// only way one can remain unresolved.
    pub fn record_run_terminal(&self, run_id: Uuid, status: RunStatus) {
        if !status.is_terminal() {
            warn!(%run_id, %status, "Ignored non-terminal status in terminal record");
            return;
        }
        if let Some(mut run) = self.runs.get_mut(&run_id) {
            if run.status.is_terminal() {
                warn!(%run_id, %status, previous = %run.status, "Ignored second terminal transition");
                return;
            }
            run.status = status;
            run.finished_at = Some(now_utc());
        }
    }

    /// Returns a snapshot of one run.
    #[must_use]
    pub fn get(&self, run_id: Uuid) -> Option<PipelineRun> {
        self.runs.get(&run_id).map(|r| r.value().clone())
    }

    /// Returns snapshots of all runs matching the filter.
    ///
    /// Read-only; results are clones and mutating them never touches the
    /// recorded history.
    #[must_use]
    pub fn query(&self, filter: &RunFilter) -> Vec<PipelineRun> {
        let mut runs: Vec<PipelineRun> = self
            .runs
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        runs.sort_by_key(|r| r.trigger_time);
        runs
    }

    /// Returns how many runs of a pipeline are not yet terminal.
    #[must_use]
    pub fn active_count(&self, pipeline: &str) -> usize {
        self.runs
            .iter()
            .filter(|entry| entry.pipeline == pipeline && !entry.status.is_terminal())
            .count()
    }

    /// Returns the number of recorded runs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Returns true if no runs are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}
