//! Validation of deployment files.
//!
//! The planner accepts requests as-is apart from the artifact-source rule.
//! This validator runs ahead of planning from the command line and reports
//! structural problems as errors and likely mistakes as warnings.

use crate::error::{ConfigError, PlannerError, Result};
use tracing::debug;

use super::spec::{DeployConfig, DeploymentRequest, HandoffBackend, HandoffConfig, RoleSource};

/// Maximum length of a generated resource name.
pub const MAX_RESOURCE_NAME_LEN: usize = 63;

/// Length of `-{longest suffix}-{timestamp}` appended to the deployment id.
const GENERATED_SUFFIX_LEN: usize = "-endpoint-".len() + "YYYYMMDDHHMMSS".len();

/// Field reported when no artifact source is usable.
const ARTIFACT_FIELD: &str = "deployment.model_package_group_name";

/// Validator for deployment files.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all problems found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a deployment file.
    ///
    /// # Errors
    ///
    /// Returns the first error found. A missing artifact source is reported
    /// as the dedicated configuration error rather than a field error.
    pub fn validate(&self, config: &DeployConfig) -> Result<ValidationResult> {
        let result = self.inspect(config);

        if result.errors.is_empty() {
            debug!(
                "Deployment file validation passed with {} warnings",
                result.warnings.len()
            );
            return Ok(result);
        }

        if result.errors.iter().any(|e| e.field == ARTIFACT_FIELD) {
            return Err(PlannerError::Config(ConfigError::MissingArtifactSource {
                deployment_id: config.deployment.id.clone(),
            }));
        }

        let first = &result.errors[0];

        Err(PlannerError::Config(ConfigError::validation(
            first.message.clone(),
            first.field.clone(),
        )))
    }

    /// Collects every error and warning without failing.
    #[must_use]
    pub fn inspect(&self, config: &DeployConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_deployment(&config.deployment, &mut result);
        Self::validate_permissions(&config.deployment, &mut result);
        Self::validate_handoff(&config.handoff, &mut result);

        result
    }

    /// Validates the request itself.
    fn validate_deployment(deployment: &DeploymentRequest, result: &mut ValidationResult) {
        if deployment.id.is_empty() {
            result.error("deployment.id", "Deployment id cannot be empty");
        } else {
            if !is_valid_name(&deployment.id) {
                result.error(
                    "deployment.id",
                    "Deployment id must be alphanumeric with single hyphens",
                );
            }

            let longest = deployment.id.len() + GENERATED_SUFFIX_LEN;
            if longest > MAX_RESOURCE_NAME_LEN {
                result.warnings.push(format!(
                    "deployment.id: generated names reach {longest} characters, \
                     the limit is {MAX_RESOURCE_NAME_LEN}"
                ));
            }
        }

        if deployment.context.region.is_empty() {
            result.error("deployment.context.region", "Region cannot be empty");
        }

        if deployment.context.account_id.is_empty() {
            result.error("deployment.context.account_id", "Account id cannot be empty");
        }

        if deployment.artifact_source().is_none() {
            result.error(
                ARTIFACT_FIELD,
                "Either model_package_arn or model_package_group_name is required",
            );
        }

        if deployment.network.subnet_ids.is_empty() {
            result
                .warnings
                .push(String::from("deployment.network.subnet_ids: no subnets listed"));
        }

        if deployment.variant.is_empty() {
            result.warnings.push(String::from(
                "deployment.variant: no serving parameters, the engine defaults apply",
            ));
        }
    }

    /// Previews the unscoped fallbacks a synthesized role would take.
    fn validate_permissions(deployment: &DeploymentRequest, result: &mut ValidationResult) {
        if deployment.role_source() != RoleSource::Synthesize {
            return;
        }

        if deployment.artifacts_bucket().is_none() {
            result.warnings.push(String::from(
                "deployment.model_artifacts_bucket_arn: not set, the role will read from any bucket",
            ));
        }

        if deployment.ecr_repo().is_none() {
            result.warnings.push(String::from(
                "deployment.ecr_repo_arn: not set, the role will pull from any repository",
            ));
        }
    }

    /// Validates handoff configuration.
    fn validate_handoff(handoff: &HandoffConfig, result: &mut ValidationResult) {
        match handoff.backend {
            HandoffBackend::S3 => {
                if handoff.bucket.as_ref().is_none_or(String::is_empty) {
                    result.error(
                        "handoff.bucket",
                        "S3 bucket name is required when using the s3 backend",
                    );
                }
            }
            HandoffBackend::Local => {}
        }
    }
}

/// Validates that a name is usable as a resource-name prefix.
/// Names are ASCII alphanumeric with single hyphens, not starting or ending with one.
fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name.starts_with('-') || name.ends_with('-') {
        return false;
    }

    if name.contains("--") {
        return false;
    }

    name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

impl ValidationResult {
    /// Records an error.
    fn error(&mut self, field: &str, message: &str) {
        self.errors.push(ValidationError {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::spec::{DeploymentContext, NetworkConfig};

    fn config(request: DeploymentRequest) -> DeployConfig {
        DeployConfig {
            deployment: request,
            handoff: HandoffConfig::default(),
        }
    }

    fn request() -> DeploymentRequest {
        DeploymentRequest::new(
            "churn-endpoint",
            DeploymentContext::new("us-east-1", "111122223333"),
            NetworkConfig::new("vpc-1", vec![String::from("subnet-a")]),
        )
        .with_variant_param("instance_type", serde_json::json!("ml.m5.large"))
    }

    #[test]
    fn test_valid_name() {
        assert!(is_valid_name("churn-endpoint"));
        assert!(is_valid_name("Model2"));
        assert!(is_valid_name("a"));
    }

    #[test]
    fn test_invalid_name() {
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("-churn"));
        assert!(!is_valid_name("churn-"));
        assert!(!is_valid_name("churn--endpoint"));
        assert!(!is_valid_name("churn_endpoint"));
    }

    #[test]
    fn test_path_like_id_is_rejected() {
        let mut req = request().with_model_package("pkg-1");
        req.id = String::from("../../escaped");

        let err = ConfigValidator::new()
            .validate(&config(req))
            .expect_err("path-like id must fail");

        match err {
            PlannerError::Config(ConfigError::ValidationError { field, .. }) => {
                assert_eq!(field.as_deref(), Some("deployment.id"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_artifact_source_is_dedicated_error() {
        let err = ConfigValidator::new()
            .validate(&config(request()))
            .expect_err("missing artifact source must fail");
        assert!(err.is_missing_artifact());
    }

    #[test]
    fn test_broad_permission_preview() {
        let result = ConfigValidator::new().inspect(&config(request().with_model_package("pkg-1")));
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 2);

        let scoped = request()
            .with_model_package("pkg-1")
            .with_artifacts_bucket("arn:aws:s3:::assets")
            .with_ecr_repo("arn:aws:ecr:us-east-1:111122223333:repository/churn");
        let result = ConfigValidator::new().inspect(&config(scoped));
        assert_eq!(result.warning_count(), 0);
    }

    #[test]
    fn test_existing_role_skips_permission_preview() {
        let req = request()
            .with_model_package("pkg-1")
            .with_execution_role("arn:role:X");
        let result = ConfigValidator::new().inspect(&config(req));
        assert_eq!(result.warning_count(), 0);
    }

    #[test]
    fn test_long_id_warns() {
        let mut req = request().with_execution_role("arn:role:X").with_model_package("pkg-1");
        req.id = "a".repeat(45);
        let result = ConfigValidator::new().inspect(&config(req));
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.contains("limit is 63")));
    }

    #[test]
    fn test_s3_handoff_requires_bucket() {
        let mut cfg = config(request().with_model_package("pkg-1"));
        cfg.handoff.backend = HandoffBackend::S3;

        let err = ConfigValidator::new()
            .validate(&cfg)
            .expect_err("s3 backend without bucket must fail");
        assert!(err.to_string().contains("S3 bucket name is required"));
    }
}
