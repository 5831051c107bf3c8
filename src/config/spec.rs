//! Deployment request types.
//!
//! This module defines the structs that map to the `endpoint.deploy.yaml` file.
//! A request is immutable input to the planner: it names what should be
//! served and where, and leaves every derived decision to planning.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The root structure of a deployment file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeployConfig {
    /// The deployment request handed to the planner.
    pub deployment: DeploymentRequest,
    /// Where finished plans are handed off to the provisioning engine.
    #[serde(default)]
    pub handoff: HandoffConfig,
}

/// A single logical deployment request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentRequest {
    /// Identifier used as the prefix of every generated resource name.
    pub id: String,
    /// Explicit region/account context.
    pub context: DeploymentContext,
    /// Existing execution role to reuse as-is.
    #[serde(default)]
    pub execution_role_arn: Option<String>,
    /// Explicit artifact (model package) to deploy.
    #[serde(default)]
    pub model_package_arn: Option<String>,
    /// Artifact group to resolve the latest approved artifact from.
    #[serde(default)]
    pub model_package_group_name: Option<String>,
    /// Network placement of the endpoint.
    pub network: NetworkConfig,
    /// Bucket holding model assets; narrows the synthesized role's read scope.
    #[serde(default)]
    pub model_artifacts_bucket_arn: Option<String>,
    /// Image repository; narrows the synthesized role's pull scope.
    #[serde(default)]
    pub ecr_repo_arn: Option<String>,
    /// Serving variant parameters, merged verbatim into the endpoint config.
    #[serde(default)]
    pub variant: BTreeMap<String, serde_json::Value>,
    /// Optional project tracking tags.
    #[serde(default)]
    pub project: Option<ProjectTags>,
}

/// Region and account the deployment targets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentContext {
    /// Cloud region (e.g., "us-east-1").
    pub region: String,
    /// Account identifier.
    pub account_id: String,
    /// ARN partition.
    #[serde(default = "default_partition")]
    pub partition: String,
}

/// Network placement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Virtual network identifier.
    pub vpc_id: String,
    /// Subnets the model containers attach to.
    #[serde(default)]
    pub subnet_ids: Vec<String>,
    /// Address range of the network, when known up front.
    #[serde(default)]
    pub vpc_cidr: Option<String>,
}

/// Project tracking tags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ProjectTags {
    /// Project identifier.
    #[serde(default)]
    pub id: Option<String>,
    /// Project name.
    #[serde(default)]
    pub name: Option<String>,
}

/// Plan handoff configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct HandoffConfig {
    /// Backend type (local or s3).
    #[serde(default)]
    pub backend: HandoffBackend,
    /// Local directory for plans (local backend).
    #[serde(default)]
    pub path: Option<String>,
    /// S3 bucket name (required for s3 backend).
    #[serde(default)]
    pub bucket: Option<String>,
    /// S3 key prefix.
    #[serde(default)]
    pub prefix: Option<String>,
    /// S3 region (uses the AWS default if not specified).
    #[serde(default)]
    pub region: Option<String>,
}

/// Handoff backend types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HandoffBackend {
    /// Plans are written to a local directory.
    #[default]
    Local,
    /// Plans are uploaded to S3.
    S3,
}

/// How the execution role is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleSource<'a> {
    /// Reuse a caller-supplied role.
    Existing(&'a str),
    /// Synthesize a new role.
    Synthesize,
}

/// How the deployed artifact is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactSource<'a> {
    /// The caller named the artifact.
    Explicit(&'a str),
    /// Resolve the latest approved artifact from a group.
    LatestApproved {
        /// Artifact group name.
        group: &'a str,
    },
}

fn default_partition() -> String {
    String::from("aws")
}

/// Treats blank strings the same as missing values.
fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.trim().is_empty())
}

impl DeploymentRequest {
    /// Creates a request with only the required fields set.
    #[must_use]
    pub fn new(id: impl Into<String>, context: DeploymentContext, network: NetworkConfig) -> Self {
        Self {
            id: id.into(),
            context,
            execution_role_arn: None,
            model_package_arn: None,
            model_package_group_name: None,
            network,
            model_artifacts_bucket_arn: None,
            ecr_repo_arn: None,
            variant: BTreeMap::new(),
            project: None,
        }
    }

    /// Sets an existing execution role.
    #[must_use]
    pub fn with_execution_role(mut self, arn: impl Into<String>) -> Self {
        self.execution_role_arn = Some(arn.into());
        self
    }

    /// Sets an explicit artifact.
    #[must_use]
    pub fn with_model_package(mut self, arn: impl Into<String>) -> Self {
        self.model_package_arn = Some(arn.into());
        self
    }

    /// Sets the artifact group to resolve from.
    #[must_use]
    pub fn with_model_package_group(mut self, name: impl Into<String>) -> Self {
        self.model_package_group_name = Some(name.into());
        self
    }

    /// Sets the model assets bucket.
    #[must_use]
    pub fn with_artifacts_bucket(mut self, arn: impl Into<String>) -> Self {
        self.model_artifacts_bucket_arn = Some(arn.into());
        self
    }

    /// Sets the image repository.
    #[must_use]
    pub fn with_ecr_repo(mut self, arn: impl Into<String>) -> Self {
        self.ecr_repo_arn = Some(arn.into());
        self
    }

    /// Adds one serving variant parameter.
    #[must_use]
    pub fn with_variant_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.variant.insert(key.into(), value);
        self
    }

    /// Sets the project tags.
    #[must_use]
    pub fn with_project(mut self, id: Option<String>, name: Option<String>) -> Self {
        self.project = Some(ProjectTags { id, name });
        self
    }

    /// Returns how the execution role should be obtained.
    #[must_use]
    pub fn role_source(&self) -> RoleSource<'_> {
        non_empty(self.execution_role_arn.as_ref())
            .map_or(RoleSource::Synthesize, RoleSource::Existing)
    }

    /// Returns how the artifact should be obtained, or `None` if neither
    /// path is usable.
    #[must_use]
    pub fn artifact_source(&self) -> Option<ArtifactSource<'_>> {
        non_empty(self.model_package_arn.as_ref())
            .map(ArtifactSource::Explicit)
            .or_else(|| {
                non_empty(self.model_package_group_name.as_ref())
                    .map(|group| ArtifactSource::LatestApproved { group })
            })
    }

    /// Returns the asset bucket, if one was supplied.
    #[must_use]
    pub fn artifacts_bucket(&self) -> Option<&str> {
        non_empty(self.model_artifacts_bucket_arn.as_ref())
    }

    /// Returns the image repository, if one was supplied.
    #[must_use]
    pub fn ecr_repo(&self) -> Option<&str> {
        non_empty(self.ecr_repo_arn.as_ref())
    }

    /// Returns the tags every planned resource carries.
    #[must_use]
    pub fn resource_tags(&self) -> BTreeMap<String, String> {
        let mut tags = BTreeMap::new();
        if let Some(project) = &self.project {
            if let Some(id) = non_empty(project.id.as_ref()) {
                tags.insert(String::from("sagemaker:project-id"), id.to_string());
            }
            if let Some(name) = non_empty(project.name.as_ref()) {
                tags.insert(String::from("sagemaker:project-name"), name.to_string());
            }
        }
        tags
    }
}

impl DeploymentContext {
    /// Creates a context in the default partition.
    #[must_use]
    pub fn new(region: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            account_id: account_id.into(),
            partition: default_partition(),
        }
    }

    /// Returns the account root principal ARN.
    #[must_use]
    pub fn account_root(&self) -> String {
        format!("arn:{}:iam::{}:root", self.partition, self.account_id)
    }

    /// Returns the ARN pattern covering every key in the account.
    #[must_use]
    pub fn key_namespace(&self) -> String {
        format!(
            "arn:{}:kms:{}:{}:key/*",
            self.partition, self.region, self.account_id
        )
    }

    /// Returns the ARN of a virtual network in this account.
    #[must_use]
    pub fn vpc_arn(&self, vpc_id: &str) -> String {
        format!(
            "arn:{}:ec2:{}:{}:vpc/{vpc_id}",
            self.partition, self.region, self.account_id
        )
    }
}

impl NetworkConfig {
    /// Creates a network placement.
    #[must_use]
    pub fn new(vpc_id: impl Into<String>, subnet_ids: Vec<String>) -> Self {
        Self {
            vpc_id: vpc_id.into(),
            subnet_ids,
            vpc_cidr: None,
        }
    }
}
