//! Provisioning engine trait definition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{HandoffBackend, HandoffConfig};
use crate::error::{ConfigError, HandoffError, PlannerError, Result};
use crate::planner::DeploymentPlan;

use super::local::LocalHandoff;
use super::s3::S3Handoff;

/// Name of the copy of the most recent plan of a deployment.
pub const LATEST_PLAN: &str = "latest.json";

/// Acknowledgement of a submitted plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffReceipt {
    /// Plan that was submitted.
    pub plan_id: Uuid,
    /// Where the plan was written.
    pub location: String,
    /// When the plan was written.
    pub submitted_at: DateTime<Utc>,
}

/// An engine that accepts deployment plans.
#[async_trait]
pub trait ProvisioningEngine: Send + Sync {
    /// Hands a plan to the engine.
    async fn submit(&self, plan: &DeploymentPlan) -> Result<HandoffReceipt>;

    /// Loads the most recently submitted plan of a deployment.
    ///
    /// Returns `None` if nothing was submitted yet.
    async fn load_latest(&self, deployment_id: &str) -> Result<Option<DeploymentPlan>>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}

#[async_trait]
impl ProvisioningEngine for Box<dyn ProvisioningEngine> {
    async fn submit(&self, plan: &DeploymentPlan) -> Result<HandoffReceipt> {
        (**self).submit(plan).await
    }

    async fn load_latest(&self, deployment_id: &str) -> Result<Option<DeploymentPlan>> {
        (**self).load_latest(deployment_id).await
    }

    fn backend_type(&self) -> &'static str {
        (**self).backend_type()
    }
}

/// Returns the file name a plan is stored under.
#[must_use]
pub fn plan_file(plan: &DeploymentPlan) -> String {
    format!("{}.json", plan.plan_id())
}

/// Checks that a deployment id is usable as a single path or key segment.
///
/// # Errors
///
/// Returns a storage error for empty ids and ids containing `/`, `\` or `..`.
pub(super) fn deployment_segment(deployment_id: &str) -> Result<&str> {
    if deployment_id.is_empty()
        || deployment_id.contains(['/', '\\'])
        || deployment_id.contains("..")
    {
        return Err(HandoffError::storage(format!(
            "Deployment id '{deployment_id}' cannot be used as a handoff location"
        ))
        .into());
    }
    Ok(deployment_id)
}

/// Serializes a plan for handoff.
pub(super) fn encode(plan: &DeploymentPlan) -> Result<String> {
    serde_json::to_string_pretty(plan).map_err(|e| {
        PlannerError::Handoff(HandoffError::serialization(format!(
            "Failed to serialize plan: {e}"
        )))
    })
}

/// Parses a stored plan.
pub(super) fn decode(content: &str) -> Result<DeploymentPlan> {
    serde_json::from_str(content).map_err(|e| {
        PlannerError::Handoff(HandoffError::Corrupted {
            message: format!("Failed to parse plan: {e}"),
        })
    })
}

/// Creates the engine described by the handoff configuration.
///
/// # Errors
///
/// Returns an error if the S3 backend has no bucket.
pub async fn create_engine(config: &HandoffConfig) -> Result<Box<dyn ProvisioningEngine>> {
    match config.backend {
        HandoffBackend::Local => {
            let engine = match config.path.as_deref() {
                Some(path) => LocalHandoff::with_base_dir(path),
                None => LocalHandoff::new()?,
            };
            Ok(Box::new(engine))
        }
        HandoffBackend::S3 => {
            let bucket = config.bucket.as_deref().ok_or_else(|| {
                ConfigError::validation("S3 handoff requires a bucket", "handoff.bucket")
            })?;
            let engine =
                S3Handoff::new(bucket, config.prefix.as_deref(), config.region.as_deref()).await;
            Ok(Box::new(engine))
        }
    }
}
