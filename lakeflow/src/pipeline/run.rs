//! Per-run state: the run record, its stage executions, and the advance
//! transition.

use crate::core::{RunStatus, StageName, StageOutcome};
use crate::utils::{new_run_id, now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One attempt of one stage, owned exclusively by its parent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageExecution {
    /// The stage attempted.
    pub stage: StageName,
    /// The attempt number (1-based).
    pub attempt: u32,
    /// When the attempt started.
    pub started_at: Timestamp,
    /// When the attempt resolved, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Timestamp>,
    /// The attempt outcome.
    pub outcome: StageOutcome,
    /// Failure reason, present on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StageExecution {
    /// Creates a pending execution for an attempt starting now.
    #[must_use]
    pub fn new(stage: StageName, attempt: u32) -> Self {
        Self {
            stage,
            attempt,
            started_at: now_utc(),
            finished_at: None,
            outcome: StageOutcome::Pending,
            reason: None,
        }
    }

    /// Resolves the attempt with its outcome.
    pub fn resolve(&mut self, outcome: StageOutcome, reason: Option<&str>) {
        self.outcome = outcome;
        self.reason = reason.map(ToString::to_string);
        self.finished_at = Some(now_utc());
    }

    /// Returns true if the attempt has resolved.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.outcome.is_terminal()
    }
}

/// One end-to-end execution instance of the pipeline.
///
/// Runs are independent of each other: overlapping runs never share stage
/// executions, and a run's history is immutable once it reaches a terminal
/// status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Unique run identifier.
    pub run_id: Uuid,
    /// The pipeline this run belongs to.
    pub pipeline: String,
    /// When the trigger fired.
    pub trigger_time: Timestamp,
    /// Current lifecycle status.
    pub status: RunStatus,
    /// Stage executions in start order.
    pub stages: Vec<StageExecution>,
    /// When the run reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Timestamp>,
}

impl PipelineRun {
    /// Creates a pending run with a fresh ID.
    #[must_use]
    pub fn new(pipeline: impl Into<String>, trigger_time: Timestamp) -> Self {
        Self::with_id(new_run_id(), pipeline, trigger_time)
    }

    /// Creates a pending run with a specific ID.
    #[must_use]
    pub fn with_id(run_id: Uuid, pipeline: impl Into<String>, trigger_time: Timestamp) -> Self {
        Self {
            run_id,
            pipeline: pipeline.into(),
            trigger_time,
            status: RunStatus::Pending,
            stages: Vec::new(),
            finished_at: None,
        }
    }

    /// Returns all executions of one stage, in attempt order.
    pub fn executions(&self, stage: StageName) -> impl Iterator<Item = &StageExecution> {
        self.stages.iter().filter(move |e| e.stage == stage)
    }

    /// Returns the latest execution of one stage, if any.
    #[must_use]
    pub fn last_execution(&self, stage: StageName) -> Option<&StageExecution> {
        self.stages.iter().rev().find(|e| e.stage == stage)
    }

    /// Returns how many attempts a stage has made.
    #[must_use]
    pub fn attempt_count(&self, stage: StageName) -> u32 {
        self.executions(stage).count() as u32
    }

    /// Returns true if the transform stage ever started.
    #[must_use]
    pub fn transform_started(&self) -> bool {
        self.attempt_count(StageName::Transform) > 0
    }
}

/// What the engine does once a stage resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    /// Start the next stage.
    Start(StageName),
    /// All stages done; mark the run succeeded.
    Complete,
    /// Stage failed; mark the run failed, no skip-ahead.
    Halt,
}

/// Computes the transition after a stage resolves.
///
/// A later stage starts only on success of the current one; anything else
/// halts the run.
#[must_use]
pub fn advance(current: StageName, outcome: StageOutcome) -> NextAction {
    match outcome {
        StageOutcome::Success => current
            .downstream()
            .map_or(NextAction::Complete, NextAction::Start),
        StageOutcome::Failure | StageOutcome::Pending => NextAction::Halt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_run_is_pending() {
        let run = PipelineRun::new("tickers", now_utc());
        assert_eq!(run.status, RunStatus::Pending);
        assert!(run.stages.is_empty());
        assert!(run.finished_at.is_none());
    }

    #[test]
    fn test_stage_execution_resolve() {
        let mut execution = StageExecution::new(StageName::Ingest, 1);
        assert!(!execution.is_resolved());

        execution.resolve(StageOutcome::Failure, Some("worker crashed"));

        assert!(execution.is_resolved());
        assert!(execution.finished_at.is_some());
        assert_eq!(execution.reason.as_deref(), Some("worker crashed"));
    }

    #[test]
    fn test_attempt_count_per_stage() {
        let mut run = PipelineRun::new("tickers", now_utc());
        run.stages.push(StageExecution::new(StageName::Ingest, 1));
        run.stages.push(StageExecution::new(StageName::Ingest, 2));
        run.stages.push(StageExecution::new(StageName::Transform, 1));

        assert_eq!(run.attempt_count(StageName::Ingest), 2);
        assert_eq!(run.attempt_count(StageName::Transform), 1);
        assert!(run.transform_started());
    }

    #[test]
    fn test_last_execution() {
        let mut run = PipelineRun::new("tickers", now_utc());
        run.stages.push(StageExecution::new(StageName::Ingest, 1));
        run.stages.push(StageExecution::new(StageName::Ingest, 2));

        let last = run.last_execution(StageName::Ingest).unwrap();
        assert_eq!(last.attempt, 2);
        assert!(run.last_execution(StageName::Transform).is_none());
    }

    #[test]
    fn test_advance_success_chains() {
        assert_eq!(
            advance(StageName::Ingest, StageOutcome::Success),
            NextAction::Start(StageName::Transform)
        );
        assert_eq!(
            advance(StageName::Transform, StageOutcome::Success),
            NextAction::Complete
        );
    }

    #[test]
    fn test_advance_failure_halts() {
        assert_eq!(
            advance(StageName::Ingest, StageOutcome::Failure),
            NextAction::Halt
        );
        assert_eq!(
            advance(StageName::Transform, StageOutcome::Pending),
            NextAction::Halt
        );
    }

    #[test]
    fn test_run_serialization() {
        let mut run = PipelineRun::new("tickers", now_utc());
        run.stages.push(StageExecution::new(StageName::Ingest, 1));

        let json = serde_json::to_string(&run).unwrap();
        let deserialized: PipelineRun = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.run_id, run.run_id);
        assert_eq!(deserialized.stages.len(), 1);
    }
}
