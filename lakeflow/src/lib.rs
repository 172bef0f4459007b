//! # Lakeflow
//!
//! A scheduled, two-stage orchestration engine for medallion-lake
//! ingestion pipelines.
//!
//! Lakeflow sequences an ingestion worker and a transform worker over the
//! ordered storage tiers (landing, bronze, silver, gold), with:
//!
//! - **Failure isolation**: the ingestion worker's outcome travels through
//!   a success/dead-letter channel pair instead of a direct return
//! - **Retry budgets**: per-stage attempt limits with backoff, owned by the
//!   pipeline rather than the channel
//! - **Timeout enforcement**: per-stage bounds and a run-level wall-clock
//!   bound that forces `timed_out`
//! - **Recurring triggers**: cadence expressions firing independent runs,
//!   with an explicit overlap policy
//! - **Append-only tracking**: every orchestration decision reconstructible
//!   from the execution tracker
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lakeflow::prelude::*;
//!
//! let pipeline = PipelineBuilder::new("tickers")
//!     .symbols(["AAPL", "MSFT"])
//!     .layers(layers)
//!     .ingest_worker(fetcher)
//!     .transform_worker(analysis)
//!     .build()?;
//!
//! let scheduler = Scheduler::new(pipeline, Schedule::parse("rate(6 hours)")?);
//! let handle = scheduler.start();
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod channel;
pub mod core;
pub mod errors;
pub mod events;
pub mod layers;
pub mod observability;
pub mod pipeline;
pub mod scheduler;
pub mod testing;
pub mod tracker;
pub mod utils;
pub mod workers;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::channel::{ChannelConfig, ChannelPair, OutcomeRouter};
    pub use crate::core::{OutcomeMessage, RunStatus, StageName, StageOutcome};
    pub use crate::errors::{
        ConfigurationError, DeliveryError, OrchestratorError, TimeoutError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::layers::{
        AccessOp, AccessPolicy, DataLayer, LayerLocation, LayerRegistry, ResourceTags,
    };
    pub use crate::pipeline::{
        OrchestratorConfig, Pipeline, PipelineBuilder, PipelineRun, RunHandle,
        StageExecution, StagePolicy,
    };
    pub use crate::scheduler::{OverlapPolicy, Schedule, Scheduler};
    pub use crate::tracker::{ExecutionTracker, RunFilter};
    pub use crate::workers::{
        IngestRequest, IngestWorker, TransformCompletion, TransformRequest, TransformWorker,
        WorkerError,
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn library_compiles() {
        assert!(true);
    }
}
