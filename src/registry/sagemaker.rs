//! Model registry lookups through the AWS SDK.

use async_trait::async_trait;
use aws_sdk_sagemaker::Client;
use aws_sdk_sagemaker::error::DisplayErrorContext;
use aws_sdk_sagemaker::types::{ModelApprovalStatus, ModelPackageSortBy, SortOrder};
use tracing::{debug, info};

use crate::error::{LookupError, Result};

use super::lookup::ArtifactRegistry;

/// Registry backed by the SageMaker model registry.
///
/// Without an injected client, one is built for the region of each lookup.
#[derive(Debug, Clone, Default)]
pub struct SageMakerRegistry {
    /// Pre-built client, used for every region.
    client: Option<Client>,
}

impl SageMakerRegistry {
    /// Creates a registry that loads credentials per lookup region.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with an existing client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self {
            client: Some(client),
        }
    }

    async fn client_for(&self, region: &str) -> Client {
        if let Some(client) = &self.client {
            return client.clone();
        }
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;
        Client::new(&config)
    }
}

/// Treats a blank package ARN as no package.
fn non_blank(arn: &str) -> Option<String> {
    (!arn.is_empty()).then(|| arn.to_string())
}

#[async_trait]
impl ArtifactRegistry for SageMakerRegistry {
    async fn get_latest_approved(&self, region: &str, group: &str) -> Result<String> {
        debug!("Querying approved packages of {group} in {region}");
        let client = self.client_for(region).await;

        let output = client
            .list_model_packages()
            .model_package_group_name(group)
            .model_approval_status(ModelApprovalStatus::Approved)
            .sort_by(ModelPackageSortBy::CreationTime)
            .sort_order(SortOrder::Descending)
            .max_results(1)
            .send()
            .await
            .map_err(|e| LookupError::registry(group, DisplayErrorContext(&e).to_string()))?;

        let arn = output
            .model_package_summary_list()
            .first()
            .and_then(|summary| summary.model_package_arn().and_then(non_blank))
            .ok_or_else(|| LookupError::NoApprovedArtifact {
                region: region.to_string(),
                group: group.to_string(),
            })?;

        info!("Latest approved package in {group}: {arn}");
        Ok(arn)
    }

    fn registry_type(&self) -> &'static str {
        "sagemaker"
    }
}
