// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![forbid(unsafe_code)]               // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Endpoint Planner
//!
//! Deterministic deployment planning for machine-learning model-serving
//! endpoints.
//!
//! ## Overview
//!
//! For one deployment request the planner decides:
//!
//! - Which supporting resources are created and which are reused
//! - Which artifact version is deployed (explicit or latest approved)
//! - The generated name of every resource
//! - The order resources must be created in
//!
//! The result is an explicit resource graph that an external provisioning
//! engine applies. The planner itself never creates anything.
//!
//! ## Pipeline
//!
//! 1. **Role resolution**: reuse the caller's role or synthesize one
//! 2. **Artifact resolution**: explicit id or a registry lookup
//! 3. **Naming**: `{deployment_id}-{kind}-{YYYYMMDDHHMMSS}`
//! 4. **Graph assembly**: role, security group, key, model, endpoint
//!    config, endpoint
//!
//! ## Modules
//!
//! - [`config`]: Deployment file parsing and validation
//! - [`planner`]: Role resolution, naming and graph assembly
//! - [`registry`]: Latest-approved artifact lookups
//! - [`handoff`]: Plan handoff backends (local, S3)
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! deployment:
//!   id: churn
//!   context:
//!     region: us-east-1
//!     account_id: "111122223333"
//!   model_package_group_name: churn-models
//!   network:
//!     vpc_id: vpc-0abc
//!     subnet_ids: [subnet-0a, subnet-0b]
//!   variant:
//!     variant_name: AllTraffic
//!     instance_type: ml.m5.large
//!     initial_instance_count: 1
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod error;
pub mod handoff;
pub mod planner;
pub mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, DeployConfig, DeploymentRequest, RequestHasher};
pub use error::{PlannerError, Result};
pub use handoff::{HandoffReceipt, LocalHandoff, ProvisioningEngine, S3Handoff};
pub use planner::{DeploymentPlan, DeploymentPlanner, ResolvedRole, ResourceKind, ResourceNode};
pub use registry::{ArtifactRegistry, SageMakerRegistry, StaticRegistry};
