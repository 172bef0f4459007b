//! Scripted worker doubles for exercising the orchestrator without real
//! external compute.

mod workers;

pub use workers::{
    IngestBehavior, ScriptedIngestWorker, ScriptedTransformWorker, TransformBehavior,
};
