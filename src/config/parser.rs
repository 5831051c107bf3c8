//! Configuration parser for loading deployment files.
//!
//! This module handles loading deployment files from YAML and applying
//! environment variable overrides, with proper precedence and error handling.

use crate::error::{ConfigError, PlannerError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::DeployConfig;

/// Prefix of every environment override.
const ENV_PREFIX: &str = "ENDPOINT_PLANNER_";

/// Configuration parser for loading deployment files.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads a deployment file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<DeployConfig> {
        let path = path.as_ref();
        info!("Loading deployment file: {}", path.display());

        if !path.exists() {
            return Err(PlannerError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            PlannerError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses a deployment file from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<DeployConfig> {
        debug!("Parsing YAML deployment file");

        let config: DeployConfig = serde_yaml::from_str(content).map_err(|e| {
            PlannerError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })?;

        debug!("Parsed deployment '{}'", config.deployment.id);
        Ok(config)
    }

    /// Loads a deployment file with environment variable overrides.
    ///
    /// Overrides use the `ENDPOINT_PLANNER_<KEY>` form
    /// (e.g., `ENDPOINT_PLANNER_REGION`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<DeployConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_overrides(&mut config, |key| std::env::var(format!("{ENV_PREFIX}{key}")).ok());
        Ok(config)
    }

    /// Applies overrides looked up by key (without the prefix).
    fn apply_overrides(config: &mut DeployConfig, lookup: impl Fn(&str) -> Option<String>) {
        let deployment = &mut config.deployment;

        if let Some(region) = lookup("REGION") {
            debug!("Overriding context.region from environment");
            deployment.context.region = region;
        }

        if let Some(account) = lookup("ACCOUNT_ID") {
            debug!("Overriding context.account_id from environment");
            deployment.context.account_id = account;
        }

        if let Some(role) = lookup("EXECUTION_ROLE_ARN") {
            debug!("Overriding execution_role_arn from environment");
            deployment.execution_role_arn = Some(role);
        }

        if let Some(package) = lookup("MODEL_PACKAGE_ARN") {
            debug!("Overriding model_package_arn from environment");
            deployment.model_package_arn = Some(package);
        }

        if let Some(group) = lookup("MODEL_PACKAGE_GROUP_NAME") {
            debug!("Overriding model_package_group_name from environment");
            deployment.model_package_group_name = Some(group);
        }

        if let Some(bucket) = lookup("HANDOFF_BUCKET") {
            debug!("Overriding handoff.bucket from environment");
            config.handoff.bucket = Some(bucket);
        }

        if let Some(prefix) = lookup("HANDOFF_PREFIX") {
            debug!("Overriding handoff.prefix from environment");
            config.handoff.prefix = Some(prefix);
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                PlannerError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Default deployment file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "endpoint.deploy.yaml",
    "endpoint.deploy.yml",
    "deploy.yaml",
    "deploy.yml",
];

/// Finds the deployment file in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no deployment file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found deployment file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(PlannerError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::spec::HandoffBackend;
    use std::collections::HashMap;

    const MINIMAL: &str = r"
deployment:
  id: churn-endpoint
  context:
    region: us-east-1
    account_id: '111122223333'
  model_package_group_name: churn-models
  network:
    vpc_id: vpc-0abc
    subnet_ids: [subnet-a, subnet-b]
";

    #[test]
    fn test_parse_minimal_config() {
        let config = ConfigParser::new()
            .parse_yaml(MINIMAL, None)
            .expect("minimal config should parse");

        assert_eq!(config.deployment.id, "churn-endpoint");
        assert_eq!(config.deployment.context.partition, "aws");
        assert_eq!(config.deployment.network.subnet_ids.len(), 2);
        assert!(config.deployment.variant.is_empty());
        assert_eq!(config.handoff.backend, HandoffBackend::Local);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r"
deployment:
  id: churn-endpoint
  context:
    region: eu-west-1
    account_id: '111122223333'
    partition: aws
  execution_role_arn: arn:aws:iam::111122223333:role/serving
  model_package_arn: arn:aws:sagemaker:eu-west-1:111122223333:model-package/churn/3
  network:
    vpc_id: vpc-0abc
    vpc_cidr: 10.0.0.0/16
    subnet_ids: [subnet-a]
  model_artifacts_bucket_arn: arn:aws:s3:::churn-assets
  ecr_repo_arn: arn:aws:ecr:eu-west-1:111122223333:repository/churn
  variant:
    variant_name: AllTraffic
    initial_instance_count: 1
    instance_type: ml.m5.large
    initial_variant_weight: 1.0
  project:
    id: p-123
    name: churn
handoff:
  backend: s3
  bucket: plans-bucket
  prefix: endpoints/
";
        let config = ConfigParser::new()
            .parse_yaml(yaml, None)
            .expect("full config should parse");

        let deployment = &config.deployment;
        assert_eq!(deployment.network.vpc_cidr.as_deref(), Some("10.0.0.0/16"));
        assert_eq!(deployment.variant.len(), 4);
        assert_eq!(
            deployment.variant.get("initial_instance_count"),
            Some(&serde_json::json!(1))
        );
        assert_eq!(config.handoff.backend, HandoffBackend::S3);
        assert_eq!(config.handoff.bucket.as_deref(), Some("plans-bucket"));
    }

    #[test]
    fn test_parse_error_reports_location() {
        let err = ConfigParser::new()
            .parse_yaml("deployment: [", Some(Path::new("broken.yaml")))
            .expect_err("invalid YAML must fail");

        match err {
            PlannerError::Config(ConfigError::ParseError { location, .. }) => {
                assert_eq!(location.as_deref(), Some("broken.yaml"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = ConfigParser::new()
            .parse_yaml(MINIMAL, None)
            .expect("minimal config should parse");

        let env: HashMap<&str, &str> = [
            ("REGION", "ap-southeast-2"),
            ("MODEL_PACKAGE_ARN", "pkg-9"),
            ("HANDOFF_BUCKET", "override-bucket"),
        ]
        .into_iter()
        .collect();

        ConfigParser::apply_overrides(&mut config, |key| env.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.deployment.context.region, "ap-southeast-2");
        assert_eq!(config.deployment.model_package_arn.as_deref(), Some("pkg-9"));
        assert_eq!(config.handoff.bucket.as_deref(), Some("override-bucket"));
        assert_eq!(config.deployment.context.account_id, "111122223333");
    }

    #[test]
    fn test_init_template_is_valid() {
        let config = ConfigParser::new()
            .parse_yaml(include_str!("../../templates/endpoint.deploy.yaml"), None)
            .expect("template should parse");
        crate::config::ConfigValidator::new()
            .validate(&config)
            .expect("template should validate");
        assert_eq!(config.deployment.variant.len(), 4);
    }

    #[test]
    fn test_find_config_file_walks_up() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("create nested dirs");
        std::fs::write(dir.path().join("endpoint.deploy.yaml"), MINIMAL).expect("write file");

        let found = find_config_file(&nested).expect("file should be found");
        assert_eq!(found, dir.path().join("endpoint.deploy.yaml"));
    }
}
