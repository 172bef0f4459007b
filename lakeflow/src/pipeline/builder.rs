//! Pipeline builder with build-time validation.

use super::config::OrchestratorConfig;
use super::engine::{Pipeline, PipelineParts};
use crate::channel::{ChannelPair, OutcomeRouter};
use crate::errors::ConfigurationError;
use crate::events::{EventSink, NoOpEventSink};
use crate::layers::LayerRegistry;
use crate::tracker::ExecutionTracker;
use crate::workers::{IngestWorker, TransformWorker};
use std::sync::Arc;

/// Builds a [`Pipeline`], validating the definition before anything runs.
///
/// Malformed definitions are rejected here and never surface mid-run.
pub struct PipelineBuilder {
    name: String,
    symbols: Vec<String>,
    worker_hint: u32,
    config: OrchestratorConfig,
    layers: Option<Arc<LayerRegistry>>,
    ingest: Option<Arc<dyn IngestWorker>>,
    transform: Option<Arc<dyn TransformWorker>>,
    tracker: Option<Arc<ExecutionTracker>>,
    sink: Option<Arc<dyn EventSink>>,
}

impl PipelineBuilder {
    /// Starts building a pipeline with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbols: Vec::new(),
            worker_hint: 10,
            config: OrchestratorConfig::default(),
            layers: None,
            ingest: None,
            transform: None,
            tracker: None,
            sink: None,
        }
    }

    /// Sets the source identifiers passed to the ingestion worker.
    #[must_use]
    pub fn symbols(mut self, symbols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.symbols = symbols.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the storage layer registry.
    #[must_use]
    pub fn layers(mut self, layers: Arc<LayerRegistry>) -> Self {
        self.layers = Some(layers);
        self
    }

    /// Sets the ingestion worker.
    #[must_use]
    pub fn ingest_worker(mut self, worker: Arc<dyn IngestWorker>) -> Self {
        self.ingest = Some(worker);
        self
    }

    /// Sets the transform worker.
    #[must_use]
    pub fn transform_worker(mut self, worker: Arc<dyn TransformWorker>) -> Self {
        self.transform = Some(worker);
        self
    }

    /// Sets the orchestrator config.
    #[must_use]
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the concurrency hint passed to the transform worker.
    #[must_use]
    pub fn worker_hint(mut self, hint: u32) -> Self {
        self.worker_hint = hint;
        self
    }

    /// Sets a shared execution tracker.
    #[must_use]
    pub fn tracker(mut self, tracker: Arc<ExecutionTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Validates the definition and builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] for an empty name, missing workers
    /// or layers, empty symbol list, or a zero retry budget / time bound.
    pub fn build(self) -> Result<Arc<Pipeline>, ConfigurationError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::new(
                "Pipeline name cannot be empty or whitespace-only",
            )
            .with_field("name"));
        }
        if self.symbols.is_empty() {
            return Err(
                ConfigurationError::new("At least one source symbol is required")
                    .with_field("symbols"),
            );
        }

        let layers = self
            .layers
            .ok_or_else(|| ConfigurationError::new("Missing layer registry").with_field("layers"))?;
        let ingest = self.ingest.ok_or_else(|| {
            ConfigurationError::new("Missing ingestion worker").with_field("ingest_worker")
        })?;
        let transform = self.transform.ok_or_else(|| {
            ConfigurationError::new("Missing transform worker").with_field("transform_worker")
        })?;

        for (stage, policy) in [("ingest", &self.config.ingest), ("transform", &self.config.transform)]
        {
            if policy.max_attempts == 0 {
                return Err(ConfigurationError::new(format!(
                    "{stage} max_attempts must be at least 1"
                ))
                .with_field(format!("{stage}.max_attempts")));
            }
            if policy.timeout.is_zero() {
                return Err(ConfigurationError::new(format!(
                    "{stage} timeout must be non-zero"
                ))
                .with_field(format!("{stage}.timeout")));
            }
        }
        if self.config.run_timeout.is_zero() {
            return Err(ConfigurationError::new("Run timeout must be non-zero")
                .with_field("run_timeout"));
        }
        if self.config.channel.capacity == 0 {
            return Err(ConfigurationError::new("Channel capacity must be at least 1")
                .with_field("channel.capacity"));
        }

        let channels = Arc::new(ChannelPair::new(self.config.channel.clone()));
        let router = Arc::new(OutcomeRouter::new());

        Ok(Arc::new(Pipeline::from_parts(PipelineParts {
            name: self.name,
            config: self.config,
            symbols: self.symbols,
            worker_hint: self.worker_hint,
            ingest,
            transform,
            layers,
            channels,
            router,
            tracker: self.tracker.unwrap_or_else(|| Arc::new(ExecutionTracker::new())),
            sink: self.sink.unwrap_or_else(|| Arc::new(NoOpEventSink)),
        })))
    }
}
