//! Storage layer registry for the medallion tiers.
//!
//! Layers are named, access-controlled locations provisioned once and
//! immutable afterwards; only their object contents change. The orchestrator
//! addresses them by tier and never touches access policy at runtime.

use crate::errors::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The ordered medallion storage tiers.
///
/// Each tier is written by exactly one upstream stage and read by the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataLayer {
    /// Raw staging area written by the ingestion worker.
    Landing,
    /// First refinement, written by the transform worker.
    Bronze,
    /// Cleaned and conformed data.
    Silver,
    /// Consumption-ready data.
    Gold,
}

impl DataLayer {
    /// All tiers in refinement order.
    pub const ORDER: [Self; 4] = [Self::Landing, Self::Bronze, Self::Silver, Self::Gold];

    /// Returns the tier that refines this one, if any.
    #[must_use]
    pub fn downstream(&self) -> Option<Self> {
        match self {
            Self::Landing => Some(Self::Bronze),
            Self::Bronze => Some(Self::Silver),
            Self::Silver => Some(Self::Gold),
            Self::Gold => None,
        }
    }

    /// Returns the tier this one refines, if any.
    #[must_use]
    pub fn upstream(&self) -> Option<Self> {
        match self {
            Self::Landing => None,
            Self::Bronze => Some(Self::Landing),
            Self::Silver => Some(Self::Bronze),
            Self::Gold => Some(Self::Silver),
        }
    }
}

impl fmt::Display for DataLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Landing => write!(f, "landing"),
            Self::Bronze => write!(f, "bronze"),
            Self::Silver => write!(f, "silver"),
            Self::Gold => write!(f, "gold"),
        }
    }
}

/// A named, access-controlled storage location for one tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerLocation {
    /// The tier this location backs.
    pub layer: DataLayer,
    /// The location URI (e.g. an object-store bucket prefix).
    pub uri: String,
}

impl LayerLocation {
    /// Creates a new layer location.
    #[must_use]
    pub fn new(layer: DataLayer, uri: impl Into<String>) -> Self {
        Self {
            layer,
            uri: uri.into(),
        }
    }
}

/// Operations a principal group may perform on a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessOp {
    /// Read objects.
    Read,
    /// Write objects.
    Write,
    /// Delete objects.
    Delete,
}

/// The two principal groups granted access to all layers.
///
/// Readers get read-only access; writers get read, write and delete.
/// Assigned once at provisioning, never mutated by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    /// The read-only principal group.
    pub readers: String,
    /// The read/write/delete principal group.
    pub writers: String,
}

impl AccessPolicy {
    /// Creates a new access policy.
    #[must_use]
    pub fn new(readers: impl Into<String>, writers: impl Into<String>) -> Self {
        Self {
            readers: readers.into(),
            writers: writers.into(),
        }
    }

    /// Returns true if the given group may perform the operation.
    #[must_use]
    pub fn allows(&self, group: &str, op: AccessOp) -> bool {
        if group == self.writers {
            return true;
        }
        if group == self.readers {
            return op == AccessOp::Read;
        }
        false
    }
}

/// Stateless metadata attached to every provisioned resource.
///
/// Applied once at construction; not runtime-mutable state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTags {
    /// Deployment environment name (e.g. `dev`, `prod`).
    pub environment: String,
    /// Owning organisation, if tagged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organisation: Option<String>,
    /// Business domain, if tagged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Solution name, if tagged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
}

impl ResourceTags {
    /// Creates tags for an environment.
    #[must_use]
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            ..Default::default()
        }
    }

    /// Sets the organisation tag.
    #[must_use]
    pub fn with_organisation(mut self, organisation: impl Into<String>) -> Self {
        self.organisation = Some(organisation.into());
        self
    }

    /// Sets the domain tag.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Sets the solution tag.
    #[must_use]
    pub fn with_solution(mut self, solution: impl Into<String>) -> Self {
        self.solution = Some(solution.into());
        self
    }
}

/// Immutable registry of the four provisioned layer locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerRegistry {
    locations: HashMap<DataLayer, LayerLocation>,
    policy: AccessPolicy,
    tags: ResourceTags,
}

impl LayerRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> LayerRegistryBuilder {
        LayerRegistryBuilder::default()
    }

    /// Returns the location for a tier.
    ///
    /// All four tiers are guaranteed present by construction.
    #[must_use]
    pub fn location(&self, layer: DataLayer) -> &LayerLocation {
        &self.locations[&layer]
    }

    /// Returns the access policy shared by all tiers.
    #[must_use]
    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Returns the resource tags applied at provisioning.
    #[must_use]
    pub fn tags(&self) -> &ResourceTags {
        &self.tags
    }

    /// Returns true if the group may perform the operation on any tier.
    #[must_use]
    pub fn allows(&self, group: &str, op: AccessOp) -> bool {
        self.policy.allows(group, op)
    }
}

/// Builder for [`LayerRegistry`], validated on build.
#[derive(Debug, Default)]
pub struct LayerRegistryBuilder {
    locations: HashMap<DataLayer, LayerLocation>,
    policy: Option<AccessPolicy>,
    tags: Option<ResourceTags>,
}

impl LayerRegistryBuilder {
    /// Registers a tier location.
    #[must_use]
    pub fn location(mut self, layer: DataLayer, uri: impl Into<String>) -> Self {
        self.locations.insert(layer, LayerLocation::new(layer, uri));
        self
    }

    /// Sets the access policy.
    #[must_use]
    pub fn policy(mut self, policy: AccessPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Sets the resource tags.
    #[must_use]
    pub fn tags(mut self, tags: ResourceTags) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Builds the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if any tier is missing or no access policy was set.
    pub fn build(self) -> Result<LayerRegistry, ConfigurationError> {
        for layer in DataLayer::ORDER {
            if !self.locations.contains_key(&layer) {
                return Err(ConfigurationError::new(format!(
                    "Missing location for {layer} layer"
                ))
                .with_field(format!("layers.{layer}")));
            }
        }

        let policy = self.policy.ok_or_else(|| {
            ConfigurationError::new("Missing access policy").with_field("layers.policy")
        })?;

        Ok(LayerRegistry {
            locations: self.locations,
            policy,
            tags: self.tags.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> LayerRegistry {
        LayerRegistry::builder()
            .location(DataLayer::Landing, "s3://lake-landing")
            .location(DataLayer::Bronze, "s3://lake-bronze")
            .location(DataLayer::Silver, "s3://lake-silver")
            .location(DataLayer::Gold, "s3://lake-gold")
            .policy(AccessPolicy::new("datalayer-readers", "datalayer-writers"))
            .tags(ResourceTags::new("dev").with_organisation("tgedr"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_layer_order() {
        assert_eq!(DataLayer::Landing.downstream(), Some(DataLayer::Bronze));
        assert_eq!(DataLayer::Gold.downstream(), None);
        assert_eq!(DataLayer::Bronze.upstream(), Some(DataLayer::Landing));
        assert_eq!(DataLayer::Landing.upstream(), None);
    }

    #[test]
    fn test_layer_display() {
        assert_eq!(DataLayer::Landing.to_string(), "landing");
        assert_eq!(DataLayer::Gold.to_string(), "gold");
    }

    #[test]
    fn test_registry_lookup() {
        let registry = registry();
        assert_eq!(registry.location(DataLayer::Landing).uri, "s3://lake-landing");
        assert_eq!(registry.location(DataLayer::Bronze).layer, DataLayer::Bronze);
    }

    #[test]
    fn test_registry_missing_layer() {
        let result = LayerRegistry::builder()
            .location(DataLayer::Landing, "s3://lake-landing")
            .policy(AccessPolicy::new("readers", "writers"))
            .build();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("bronze"));
    }

    #[test]
    fn test_registry_missing_policy() {
        let result = LayerRegistry::builder()
            .location(DataLayer::Landing, "a")
            .location(DataLayer::Bronze, "b")
            .location(DataLayer::Silver, "c")
            .location(DataLayer::Gold, "d")
            .build();

        assert!(result.is_err());
    }

    #[test]
    fn test_access_policy() {
        let policy = AccessPolicy::new("datalayer-readers", "datalayer-writers");

        assert!(policy.allows("datalayer-readers", AccessOp::Read));
        assert!(!policy.allows("datalayer-readers", AccessOp::Write));
        assert!(!policy.allows("datalayer-readers", AccessOp::Delete));

        assert!(policy.allows("datalayer-writers", AccessOp::Read));
        assert!(policy.allows("datalayer-writers", AccessOp::Write));
        assert!(policy.allows("datalayer-writers", AccessOp::Delete));

        assert!(!policy.allows("strangers", AccessOp::Read));
    }

    #[test]
    fn test_tags_builder() {
        let tags = ResourceTags::new("prod")
            .with_organisation("tgedr")
            .with_domain("it")
            .with_solution("tickers");

        assert_eq!(tags.environment, "prod");
        assert_eq!(tags.domain.as_deref(), Some("it"));
    }

    #[test]
    fn test_registry_serialization() {
        let registry = registry();
        let json = serde_json::to_string(&registry).unwrap();
        let deserialized: LayerRegistry = serde_json::from_str(&json).unwrap();

        assert_eq!(
            deserialized.location(DataLayer::Gold).uri,
            registry.location(DataLayer::Gold).uri
        );
    }
}
