//! Recurring trigger that starts pipeline runs on a fixed cadence.
//!
//! The trigger is decoupled from run completion: each fire starts a fresh,
//! independent run. Missed ticks are skipped, never queued, and overlap
//! between runs is governed by an explicit policy.

mod schedule;

pub use schedule::Schedule;

use crate::events::{EventSink, NoOpEventSink, RunEvent};
use crate::pipeline::{Pipeline, RunHandle};
use crate::utils::now_utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// What to do when the trigger fires while a run is still in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Start a fresh run regardless of in-flight runs.
    #[default]
    Allow,
    /// Suppress the trigger while any run of this pipeline is live.
    Skip,
}

/// Fires pipeline starts on a recurring cadence.
pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    schedule: Schedule,
    overlap: OverlapPolicy,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("pipeline", &self.pipeline.name())
            .field("schedule", &self.schedule)
            .field("overlap", &self.overlap)
            .finish()
    }
}

impl Scheduler {
    /// Creates a scheduler for a pipeline and cadence.
    #[must_use]
    pub fn new(pipeline: Arc<Pipeline>, schedule: Schedule) -> Self {
        Self {
            pipeline,
            schedule,
            overlap: OverlapPolicy::default(),
            sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the overlap policy.
    #[must_use]
    pub fn with_overlap_policy(mut self, overlap: OverlapPolicy) -> Self {
        self.overlap = overlap;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the configured schedule.
    #[must_use]
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Fires one trigger.
    ///
    /// Applies the overlap policy, then starts a fresh run with its own run
    /// ID. Returns `None` when the trigger was suppressed. The scheduler is
    /// fire-and-forget: it never awaits the run it started.
    pub fn tick(&self) -> Option<RunHandle> {
        if self.overlap == OverlapPolicy::Skip {
            let active = self.pipeline.tracker().active_count(self.pipeline.name());
            if active > 0 {
                self.emit(RunEvent::trigger_skipped(self.pipeline.name(), active));
                debug!(
                    pipeline = %self.pipeline.name(),
                    active,
                    "Trigger suppressed while runs are live"
                );
                return None;
            }
        }

        let handle = self.pipeline.start(now_utc());
        self.emit(RunEvent::trigger_fired(self.pipeline.name(), handle.run_id()));
        debug!(
            pipeline = %self.pipeline.name(),
            run_id = %handle.run_id(),
            "Trigger fired"
        );
        Some(handle)
    }

    /// Starts the recurring trigger loop in the background.
    ///
    /// Ticks that cannot fire on time (e.g. the process was stalled) are
    /// skipped rather than replayed.
    #[must_use]
    pub fn start(self) -> SchedulerHandle {
        let first_fire = tokio::time::Instant::now() + self.schedule.delay_until_first_fire();
        let period = self.schedule.period();

        info!(
            pipeline = %self.pipeline.name(),
            schedule = %self.schedule,
            "Scheduler started"
        );

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(first_fire, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                let _ = self.tick();
            }
        });

        SchedulerHandle { handle }
    }

    fn emit(&self, event: RunEvent) {
        self.sink.try_emit(event.event_type, Some(event.data));
    }
}

/// Handle to a running scheduler loop.
#[derive(Debug)]
pub struct SchedulerHandle {
    handle: tokio::task::JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stops the trigger loop. In-flight runs are unaffected.
    pub async fn shutdown(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::layers::{AccessPolicy, DataLayer, LayerRegistry};
    use crate::pipeline::{OrchestratorConfig, PipelineBuilder, StagePolicy};
    use crate::testing::{IngestBehavior, ScriptedIngestWorker, ScriptedTransformWorker};
    use std::time::Duration;

    fn registry() -> Arc<LayerRegistry> {
        Arc::new(
            LayerRegistry::builder()
                .location(DataLayer::Landing, "s3://lake-landing")
                .location(DataLayer::Bronze, "s3://lake-bronze")
                .location(DataLayer::Silver, "s3://lake-silver")
                .location(DataLayer::Gold, "s3://lake-gold")
                .policy(AccessPolicy::new("readers", "writers"))
                .build()
                .unwrap(),
        )
    }

    fn fast_config() -> OrchestratorConfig {
        OrchestratorConfig::new()
            .with_run_timeout(Duration::from_secs(60))
            .with_ingest_policy(StagePolicy::new(1, Duration::from_secs(5)))
            .with_transform_policy(StagePolicy::new(1, Duration::from_secs(5)))
    }

    fn pipeline(ingest: Arc<ScriptedIngestWorker>) -> Arc<Pipeline> {
        PipelineBuilder::new("tickers")
            .symbols(["AAPL"])
            .layers(registry())
            .ingest_worker(ingest)
            .transform_worker(Arc::new(ScriptedTransformWorker::new()))
            .config(fast_config())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_tick_starts_independent_runs() {
        let pipeline = pipeline(Arc::new(ScriptedIngestWorker::new()));
        let scheduler = Scheduler::new(
            Arc::clone(&pipeline),
            Schedule::parse("rate(6 hours)").unwrap(),
        );

        let first = scheduler.tick().unwrap();
        let second = scheduler.tick().unwrap();

        assert_ne!(first.run_id(), second.run_id());
        assert_eq!(pipeline.tracker().len(), 2);

        first.wait().await;
        second.wait().await;
    }

    #[tokio::test]
    async fn test_allow_policy_overlaps() {
        let ingest = Arc::new(ScriptedIngestWorker::with_fallback(IngestBehavior::Hang));
        let pipeline = pipeline(ingest);
        let scheduler = Scheduler::new(
            Arc::clone(&pipeline),
            Schedule::parse("rate(1 minutes)").unwrap(),
        );

        assert!(scheduler.tick().is_some());
        assert!(scheduler.tick().is_some());
        assert_eq!(pipeline.tracker().active_count("tickers"), 2);
    }

    #[tokio::test]
    async fn test_skip_policy_suppresses_overlap() {
        let ingest = Arc::new(ScriptedIngestWorker::with_fallback(IngestBehavior::Hang));
        let pipeline = pipeline(ingest);
        let sink = Arc::new(CollectingEventSink::new());
        let scheduler = Scheduler::new(
            Arc::clone(&pipeline),
            Schedule::parse("rate(1 minutes)").unwrap(),
        )
        .with_overlap_policy(OverlapPolicy::Skip)
        .with_event_sink(Arc::clone(&sink) as Arc<dyn EventSink>);

        assert!(scheduler.tick().is_some());
        assert!(scheduler.tick().is_none());

        assert_eq!(pipeline.tracker().len(), 1);
        assert_eq!(sink.events_of_type("trigger.skipped").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_loop_fires_repeatedly() {
        let pipeline = pipeline(Arc::new(ScriptedIngestWorker::new()));
        let scheduler = Scheduler::new(
            Arc::clone(&pipeline),
            Schedule::parse("rate(10 minutes)").unwrap(),
        );

        let handle = scheduler.start();
        tokio::time::sleep(Duration::from_secs(35 * 60)).await;
        handle.shutdown().await;

        // Three fires in 35 minutes at a 10-minute cadence.
        assert_eq!(pipeline.tracker().len(), 3);
    }
}
