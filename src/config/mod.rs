//! Configuration module for the endpoint planner.
//!
//! This module handles all configuration-related functionality:
//! - Deployment request types and their YAML mapping
//! - Parsing `endpoint.deploy.yaml` with environment overrides
//! - Validation ahead of planning
//! - Request fingerprints for plan tracking

mod spec;
mod parser;
mod validator;
mod hash;

pub use spec::{
    ArtifactSource, DeployConfig, DeploymentContext, DeploymentRequest, HandoffBackend,
    HandoffConfig, NetworkConfig, ProjectTags, RoleSource,
};
pub use parser::{ConfigParser, DEFAULT_CONFIG_FILES, find_config_file};
pub use validator::{ConfigValidator, MAX_RESOURCE_NAME_LEN, ValidationError, ValidationResult};
pub use hash::RequestHasher;
