//! Artifact registry trait and the static registry.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::collections::HashMap;
use tracing::debug;

use crate::error::{LookupError, Result};

/// Read-only lookup of approved artifacts.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ArtifactRegistry: Send + Sync {
    /// Returns the identifier of the newest approved artifact in `group`.
    ///
    /// # Errors
    ///
    /// Returns a lookup failure if the registry cannot be queried or the
    /// group holds no approved artifact.
    async fn get_latest_approved(&self, region: &str, group: &str) -> Result<String>;

    /// Gets the registry type name.
    fn registry_type(&self) -> &'static str;
}

#[async_trait]
impl ArtifactRegistry for Box<dyn ArtifactRegistry> {
    async fn get_latest_approved(&self, region: &str, group: &str) -> Result<String> {
        (**self).get_latest_approved(region, group).await
    }

    fn registry_type(&self) -> &'static str {
        (**self).registry_type()
    }
}

/// A registry backed by pinned mappings.
///
/// Mappings are keyed by group and apply to every region.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    /// Group name to artifact identifier.
    pinned: HashMap<String, String>,
}

impl StaticRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins the latest approved artifact of a group.
    #[must_use]
    pub fn with_artifact(mut self, group: impl Into<String>, arn: impl Into<String>) -> Self {
        self.pinned.insert(group.into(), arn.into());
        self
    }
}

#[async_trait]
impl ArtifactRegistry for StaticRegistry {
    async fn get_latest_approved(&self, region: &str, group: &str) -> Result<String> {
        debug!("Static lookup of group {group} in {region}");
        self.pinned.get(group).cloned().ok_or_else(|| {
            LookupError::NoApprovedArtifact {
                region: region.to_string(),
                group: group.to_string(),
            }
            .into()
        })
    }

    fn registry_type(&self) -> &'static str {
        "static"
    }
}
