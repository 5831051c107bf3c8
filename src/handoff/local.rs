//! Local directory handoff backend.
//!
//! Plans are written to `{base_dir}/{deployment_id}/{plan_id}.json`, and a
//! copy is kept as `latest.json` next to it. Both writes go through a temp
//! file and a rename.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{HandoffError, PlannerError, Result};
use crate::planner::DeploymentPlan;

use super::engine::{
    HandoffReceipt, LATEST_PLAN, ProvisioningEngine, decode, deployment_segment, encode, plan_file,
};

/// Default handoff directory, relative to the working directory.
const HANDOFF_DIR: &str = ".endpoint-planner/plans";

/// Local file-based handoff.
#[derive(Debug)]
pub struct LocalHandoff {
    /// Base directory for plan files.
    base_dir: PathBuf,
}

impl LocalHandoff {
    /// Creates a handoff rooted in the working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the working directory cannot be determined.
    pub fn new() -> Result<Self> {
        let base_dir = std::env::current_dir()
            .map_err(|e| PlannerError::internal(format!("Cannot determine current directory: {e}")))?
            .join(HANDOFF_DIR);

        Ok(Self::with_base_dir(base_dir))
    }

    /// Creates a handoff with a custom base directory.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Returns the directory holding a deployment's plans.
    ///
    /// # Errors
    ///
    /// Returns an error if the id would leave the base directory.
    pub fn deployment_dir(&self, deployment_id: &str) -> Result<PathBuf> {
        Ok(self.base_dir.join(deployment_segment(deployment_id)?))
    }

    /// Writes `content` to `path` through a temp file and a rename.
    async fn write_atomic(path: &Path, content: &str) -> Result<()> {
        let temp_path = path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            HandoffError::storage(format!("Failed to create temp plan file: {e}"))
        })?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| HandoffError::storage(format!("Failed to write plan file: {e}")))?;

        file.sync_all()
            .await
            .map_err(|e| HandoffError::storage(format!("Failed to sync plan file: {e}")))?;

        fs::rename(&temp_path, path)
            .await
            .map_err(|e| HandoffError::storage(format!("Failed to rename plan file: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl ProvisioningEngine for LocalHandoff {
    async fn submit(&self, plan: &DeploymentPlan) -> Result<HandoffReceipt> {
        let dir = self.deployment_dir(plan.deployment_id())?;
        if !dir.exists() {
            debug!("Creating handoff directory: {}", dir.display());
            fs::create_dir_all(&dir).await.map_err(|e| {
                HandoffError::storage(format!("Failed to create handoff directory: {e}"))
            })?;
        }

        let content = encode(plan)?;
        let path = dir.join(plan_file(plan));
        info!("Writing plan to: {}", path.display());

        Self::write_atomic(&path, &content).await?;
        Self::write_atomic(&dir.join(LATEST_PLAN), &content).await?;

        Ok(HandoffReceipt {
            plan_id: plan.plan_id(),
            location: path.display().to_string(),
            submitted_at: Utc::now(),
        })
    }

    async fn load_latest(&self, deployment_id: &str) -> Result<Option<DeploymentPlan>> {
        let path = self.deployment_dir(deployment_id)?.join(LATEST_PLAN);
        if !path.exists() {
            debug!("No submitted plan at: {}", path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await.map_err(|e| {
            HandoffError::Corrupted {
                message: format!("Failed to read plan file: {e}"),
            }
        })?;

        decode(&content).map(Some)
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{ArtifactOrigin, PlanParts, ResolvedArtifact, ResolvedRole, ResourceKind, ResourceNode};
    use tempfile::TempDir;
    use uuid::Uuid;

    fn create_test_handoff() -> (LocalHandoff, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let handoff = LocalHandoff::with_base_dir(temp_dir.path());
        (handoff, temp_dir)
    }

    fn plan(endpoint: &str) -> DeploymentPlan {
        plan_for("churn", endpoint)
    }

    fn plan_for(deployment_id: &str, endpoint: &str) -> DeploymentPlan {
        DeploymentPlan::assemble(PlanParts {
            plan_id: Uuid::new_v4(),
            deployment_id: deployment_id.to_string(),
            created_at: Utc::now(),
            request_hash: String::from("abc"),
            region: String::from("us-east-1"),
            role: ResolvedRole::Reference {
                arn: String::from("arn:role:X"),
            },
            artifact: ResolvedArtifact {
                arn: String::from("pkg-1"),
                origin: ArtifactOrigin::Explicit,
            },
            nodes: vec![ResourceNode::new(ResourceKind::Endpoint, endpoint)],
            advisories: vec![],
        })
    }

    #[tokio::test]
    async fn test_submit_and_load_latest() {
        let (handoff, temp) = create_test_handoff();

        let first = plan("churn-endpoint-1");
        let receipt = handoff.submit(&first).await.expect("Failed to submit plan");
        assert_eq!(receipt.plan_id, first.plan_id());
        assert!(temp.path().join("churn").join(plan_file(&first)).exists());

        let second = plan("churn-endpoint-2");
        handoff.submit(&second).await.expect("Failed to submit plan");

        let loaded = handoff
            .load_latest("churn")
            .await
            .expect("Failed to load plan")
            .expect("Plan should exist");
        assert_eq!(loaded, second);
        assert!(temp.path().join("churn").join(plan_file(&first)).exists());
    }

    #[tokio::test]
    async fn test_load_nothing_submitted() {
        let (handoff, _temp) = create_test_handoff();
        let result = handoff.load_latest("churn").await.expect("Load should not fail");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_corrupted_latest() {
        let (handoff, _temp) = create_test_handoff();
        let dir = handoff.deployment_dir("churn").expect("valid id");
        std::fs::create_dir_all(&dir).expect("Failed to create dir");
        std::fs::write(dir.join(LATEST_PLAN), "garbage").expect("Failed to write file");

        let err = handoff.load_latest("churn").await.expect_err("corrupted plan");
        assert!(matches!(err, PlannerError::Handoff(HandoffError::Corrupted { .. })));
    }

    #[tokio::test]
    async fn test_submit_rejects_id_outside_base_dir() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let base = temp.path().join("a").join("b");
        let handoff = LocalHandoff::with_base_dir(&base);

        let err = handoff
            .submit(&plan_for("../../escaped", "escaped-endpoint"))
            .await
            .expect_err("escaping id must be rejected");
        assert!(matches!(err, PlannerError::Handoff(HandoffError::Storage { .. })));
        assert!(!temp.path().join("escaped").exists());
        assert!(!base.exists());
    }

    #[tokio::test]
    async fn test_load_rejects_id_outside_base_dir() {
        let (handoff, _temp) = create_test_handoff();
        let err = handoff.load_latest("../x").await.expect_err("escaping id must be rejected");
        assert!(matches!(err, PlannerError::Handoff(HandoffError::Storage { .. })));
    }
}
