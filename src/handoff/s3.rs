//! S3 handoff backend.
//!
//! Plans are uploaded to `s3://{bucket}/{prefix}{deployment_id}/{plan_id}.json`
//! and copied to `latest.json` under the same prefix.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use chrono::Utc;
use tracing::{debug, info};

use crate::error::{HandoffError, Result};
use crate::planner::DeploymentPlan;

use super::engine::{
    HandoffReceipt, LATEST_PLAN, ProvisioningEngine, decode, deployment_segment, encode, plan_file,
};

/// S3-based handoff.
#[derive(Debug)]
pub struct S3Handoff {
    /// S3 client.
    client: Client,
    /// Bucket name.
    bucket: String,
    /// Key prefix, empty or ending with `/`.
    prefix: String,
}

/// Normalizes a key prefix to empty or `segment/`.
fn normalize_prefix(prefix: Option<&str>) -> String {
    prefix
        .map(|p| {
            let p = p.trim_matches('/');
            if p.is_empty() {
                String::new()
            } else {
                format!("{p}/")
            }
        })
        .unwrap_or_default()
}

impl S3Handoff {
    /// Creates a handoff with a client loaded from the environment.
    pub async fn new(bucket: &str, prefix: Option<&str>, region: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region.to_string()));
        }
        let config = loader.load().await;

        Self::with_client(Client::new(&config), bucket, prefix)
    }

    /// Creates a handoff with an existing client.
    #[must_use]
    pub fn with_client(client: Client, bucket: &str, prefix: Option<&str>) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            prefix: normalize_prefix(prefix),
        }
    }

    /// Gets the full S3 key of a deployment's file.
    fn key(&self, deployment_id: &str, file: &str) -> Result<String> {
        let segment = deployment_segment(deployment_id)?;
        Ok(format!("{}{segment}/{file}", self.prefix))
    }

    /// Gets an object from S3.
    async fn get_object(&self, key: &str) -> Result<Option<String>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(response) => {
                let bytes = response.body.collect().await.map_err(|e| {
                    HandoffError::storage(format!("Failed to read S3 object: {e}"))
                })?;

                let content = String::from_utf8(bytes.to_vec()).map_err(|e| {
                    HandoffError::Corrupted {
                        message: format!("Invalid UTF-8 in S3 object: {e}"),
                    }
                })?;

                Ok(Some(content))
            }
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                if service_err.is_no_such_key() {
                    Ok(None)
                } else {
                    Err(HandoffError::storage(format!("S3 get error: {service_err}")).into())
                }
            }
        }
    }

    /// Puts an object to S3.
    async fn put_object(&self, key: &str, content: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(content.as_bytes().to_vec().into())
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| HandoffError::storage(format!("S3 put error: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl ProvisioningEngine for S3Handoff {
    async fn submit(&self, plan: &DeploymentPlan) -> Result<HandoffReceipt> {
        let key = self.key(plan.deployment_id(), &plan_file(plan))?;
        info!("Uploading plan to s3://{}/{key}", self.bucket);

        let content = encode(plan)?;
        self.put_object(&key, &content).await?;
        self.put_object(&self.key(plan.deployment_id(), LATEST_PLAN)?, &content)
            .await?;

        debug!("Plan uploaded successfully");
        Ok(HandoffReceipt {
            plan_id: plan.plan_id(),
            location: format!("s3://{}/{key}", self.bucket),
            submitted_at: Utc::now(),
        })
    }

    async fn load_latest(&self, deployment_id: &str) -> Result<Option<DeploymentPlan>> {
        let key = self.key(deployment_id, LATEST_PLAN)?;
        debug!("Loading plan from s3://{}/{key}", self.bucket);

        match self.get_object(&key).await? {
            Some(content) => decode(&content).map(Some),
            None => {
                debug!("No plan found in S3");
                Ok(None)
            }
        }
    }

    fn backend_type(&self) -> &'static str {
        "s3"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlannerError;
    use aws_sdk_s3::config::{BehaviorVersion, Region};

    fn handoff(prefix: Option<&str>) -> S3Handoff {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        S3Handoff::with_client(Client::from_conf(config), "plans-bucket", prefix)
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix(None), "");
        assert_eq!(normalize_prefix(Some("/")), "");
        assert_eq!(normalize_prefix(Some("plans")), "plans/");
        assert_eq!(normalize_prefix(Some("/team/plans/")), "team/plans/");
    }

    #[test]
    fn test_key_layout() {
        let handoff = handoff(Some("/team/plans/"));
        assert_eq!(
            handoff.key("churn", LATEST_PLAN).expect("valid id"),
            "team/plans/churn/latest.json"
        );
    }

    #[tokio::test]
    async fn test_load_rejects_id_outside_prefix() {
        let handoff = handoff(Some("plans"));
        assert!(handoff.key("../../escaped", LATEST_PLAN).is_err());

        let err = handoff
            .load_latest("../other/churn")
            .await
            .expect_err("escaping id must be rejected");
        assert!(matches!(err, PlannerError::Handoff(HandoffError::Storage { .. })));
    }
}
