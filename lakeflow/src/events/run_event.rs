//! Lifecycle event constructors for run and stage transitions.

use crate::core::StageName;
use uuid::Uuid;

/// A lifecycle event with its payload, ready for an [`super::EventSink`].
#[derive(Debug, Clone)]
pub struct RunEvent {
    /// The event type (e.g., "run.started").
    pub event_type: &'static str,
    /// The event payload.
    pub data: serde_json::Value,
}

impl RunEvent {
    /// Creates a "trigger.fired" event.
    #[must_use]
    pub fn trigger_fired(pipeline: &str, run_id: Uuid) -> Self {
        Self {
            event_type: "trigger.fired",
            data: serde_json::json!({ "pipeline": pipeline, "run_id": run_id }),
        }
    }

    /// Creates a "trigger.skipped" event for overlap suppression.
    #[must_use]
    pub fn trigger_skipped(pipeline: &str, active_runs: usize) -> Self {
        Self {
            event_type: "trigger.skipped",
            data: serde_json::json!({ "pipeline": pipeline, "active_runs": active_runs }),
        }
    }

    /// Creates a "run.started" event.
    #[must_use]
    pub fn run_started(run_id: Uuid) -> Self {
        Self {
            event_type: "run.started",
            data: serde_json::json!({ "run_id": run_id }),
        }
    }

    /// Creates a "stage.started" event.
    #[must_use]
    pub fn stage_started(run_id: Uuid, stage: StageName, attempt: u32) -> Self {
        Self {
            event_type: "stage.started",
            data: serde_json::json!({
                "run_id": run_id,
                "stage": stage.to_string(),
                "attempt": attempt,
            }),
        }
    }

    /// Creates a "stage.succeeded" event.
    #[must_use]
    pub fn stage_succeeded(run_id: Uuid, stage: StageName, attempt: u32) -> Self {
        Self {
            event_type: "stage.succeeded",
            data: serde_json::json!({
                "run_id": run_id,
                "stage": stage.to_string(),
                "attempt": attempt,
            }),
        }
    }

    /// Creates a "stage.failed" event.
    #[must_use]
    pub fn stage_failed(run_id: Uuid, stage: StageName, attempt: u32, reason: &str) -> Self {
        Self {
            event_type: "stage.failed",
            data: serde_json::json!({
                "run_id": run_id,
                "stage": stage.to_string(),
                "attempt": attempt,
                "reason": reason,
            }),
        }
    }

    /// Creates a "run.succeeded" event.
    #[must_use]
    pub fn run_succeeded(run_id: Uuid) -> Self {
        Self {
            event_type: "run.succeeded",
            data: serde_json::json!({ "run_id": run_id }),
        }
    }

    /// Creates a "run.failed" event.
    #[must_use]
    pub fn run_failed(run_id: Uuid, stage: StageName) -> Self {
        Self {
            event_type: "run.failed",
            data: serde_json::json!({ "run_id": run_id, "stage": stage.to_string() }),
        }
    }

    /// Creates a "run.timed_out" event.
    #[must_use]
    pub fn run_timed_out(run_id: Uuid) -> Self {
        Self {
            event_type: "run.timed_out",
            data: serde_json::json!({ "run_id": run_id }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_started_payload() {
        let run_id = Uuid::new_v4();
        let event = RunEvent::run_started(run_id);

        assert_eq!(event.event_type, "run.started");
        assert_eq!(event.data["run_id"], serde_json::json!(run_id));
    }

    #[test]
    fn test_stage_failed_payload() {
        let event = RunEvent::stage_failed(Uuid::new_v4(), StageName::Ingest, 2, "no outcome");

        assert_eq!(event.event_type, "stage.failed");
        assert_eq!(event.data["stage"], "ingest");
        assert_eq!(event.data["attempt"], 2);
        assert_eq!(event.data["reason"], "no outcome");
    }

    #[test]
    fn test_trigger_skipped_payload() {
        let event = RunEvent::trigger_skipped("tickers", 1);

        assert_eq!(event.event_type, "trigger.skipped");
        assert_eq!(event.data["active_runs"], 1);
    }
}
