//! Orchestrator configuration: run and stage time bounds, retry budgets,
//! and channel limits.

use super::retry::RetryPolicy;
use crate::channel::ChannelConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-stage retry budget and time bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagePolicy {
    /// Maximum attempts before the run is marked failed (including the
    /// initial one).
    pub max_attempts: u32,
    /// Time bound for one attempt, enforced by the orchestrator
    /// independently of the worker's internal timeout.
    pub timeout: Duration,
    /// Delay shaping between attempts.
    pub retry: RetryPolicy,
}

impl StagePolicy {
    /// Creates a policy with the given budget and bound.
    #[must_use]
    pub fn new(max_attempts: u32, timeout: Duration) -> Self {
        Self {
            max_attempts,
            timeout,
            retry: RetryPolicy::default(),
        }
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Configuration for the whole orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Wall-clock bound for a whole run, measured from its trigger time.
    /// Exceeding it forces the run to `timed_out` regardless of in-flight
    /// stage state.
    pub run_timeout: Duration,
    /// Policy for the ingest stage.
    pub ingest: StagePolicy,
    /// Policy for the transform stage.
    pub transform: StagePolicy,
    /// Limits for the success and dead-letter channels.
    pub channel: ChannelConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            run_timeout: Duration::from_secs(60 * 60),
            ingest: StagePolicy::new(3, Duration::from_secs(10 * 60)),
            transform: StagePolicy::new(2, Duration::from_secs(30 * 60)),
            channel: ChannelConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Creates a config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the run timeout.
    #[must_use]
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    /// Sets the ingest stage policy.
    #[must_use]
    pub fn with_ingest_policy(mut self, policy: StagePolicy) -> Self {
        self.ingest = policy;
        self
    }

    /// Sets the transform stage policy.
    #[must_use]
    pub fn with_transform_policy(mut self, policy: StagePolicy) -> Self {
        self.transform = policy;
        self
    }

    /// Sets the channel config.
    #[must_use]
    pub fn with_channel_config(mut self, channel: ChannelConfig) -> Self {
        self.channel = channel;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.run_timeout, Duration::from_secs(3600));
        assert_eq!(config.ingest.max_attempts, 3);
        assert_eq!(config.transform.max_attempts, 2);
        assert_eq!(config.transform.timeout, Duration::from_secs(1800));
    }

    #[test]
    fn test_builder() {
        let config = OrchestratorConfig::new()
            .with_run_timeout(Duration::from_secs(300))
            .with_ingest_policy(StagePolicy::new(2, Duration::from_secs(60)));

        assert_eq!(config.run_timeout, Duration::from_secs(300));
        assert_eq!(config.ingest.max_attempts, 2);
    }

    #[test]
    fn test_serialization_round_trip() {
        let config = OrchestratorConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: OrchestratorConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.run_timeout, config.run_timeout);
        assert_eq!(deserialized.ingest.max_attempts, config.ingest.max_attempts);
    }
}
